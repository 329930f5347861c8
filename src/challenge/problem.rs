//! Problem records and problem-set loading.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProblemError;
use crate::scoring::split_lines;

/// A start text, the end text it should become, and descriptive metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_text: String,
    pub end_text: String,
    /// Best known keystroke count, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_score: Option<u32>,
}

impl Problem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_text: impl Into<String>,
        end_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            start_text: start_text.into(),
            end_text: end_text.into(),
            best_score: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_best_score(mut self, best_score: u32) -> Self {
        self.best_score = Some(best_score);
        self
    }

    pub fn start_lines(&self) -> Vec<String> {
        split_lines(&self.start_text)
    }

    pub fn end_lines(&self) -> Vec<String> {
        split_lines(&self.end_text)
    }

    fn validate(&self) -> Result<(), ProblemError> {
        let invalid = |reason: &str| ProblemError::Invalid {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id is empty"));
        }
        if self.title.trim().is_empty() {
            return Err(invalid("title is empty"));
        }
        Ok(())
    }
}

/// Checks ids are present and unique.
pub fn validate_problems(problems: &[Problem]) -> Result<(), ProblemError> {
    let mut seen = HashSet::new();
    for problem in problems {
        problem.validate()?;
        if !seen.insert(problem.id.as_str()) {
            return Err(ProblemError::DuplicateId(problem.id.clone()));
        }
    }
    Ok(())
}

pub fn find_problem<'a>(problems: &'a [Problem], id: &str) -> Result<&'a Problem, ProblemError> {
    problems
        .iter()
        .find(|p| p.id == id)
        .ok_or_else(|| ProblemError::NotFound(id.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProblemFile {
    List(Vec<Problem>),
    Wrapped { problems: Vec<Problem> },
}

/// Parses a problem set from YAML or JSON text.
///
/// Accepts either a bare list or a mapping with a `problems` list.
pub fn parse_problems(content: &str) -> Result<Vec<Problem>, ProblemError> {
    let problems = match serde_yaml::from_str::<ProblemFile>(content)? {
        ProblemFile::List(problems) => problems,
        ProblemFile::Wrapped { problems } => problems,
    };
    validate_problems(&problems)?;
    Ok(problems)
}

/// Loads a problem set from a YAML or JSON file.
pub fn load_problems(path: &Path) -> Result<Vec<Problem>, ProblemError> {
    let content = std::fs::read_to_string(path)?;
    let problems = parse_problems(&content)?;
    debug!(path = %path.display(), count = problems.len(), "Loaded problem set");
    Ok(problems)
}

/// The ten curated challenges.
pub fn builtin_problems() -> Vec<Problem> {
    vec![
        Problem::new(
            "9v00669b3ff1",
            "Rearrange array to single level",
            "[[1,2],[3,4,[]],[5,6,[7,8]]]",
            "[1,2,3,4,5,6,7,8]",
        )
        .with_description("Flatten nested array structure and remove empty elements"),
        Problem::new(
            "9v00680e54330",
            "Create json from a .env file",
            "API_KEY=abc123\nDATABASE_URL=postgres://localhost\nDEBUG=true",
            "{\n  \"API_KEY\": \"abc123\",\n  \"DATABASE_URL\": \"postgres://localhost\",\n  \"DEBUG\": \"true\"\n}",
        )
        .with_description("Convert environment variables to JSON format"),
        Problem::new(
            "9v0067a47b9200",
            "Reordering properties",
            "color: red;\nbackground-color: blue;\nmargin: 10px;\npadding-top: 5px;",
            "margin: 10px;\ncolor: red;\npadding-top: 5px;\nbackground-color: blue;",
        )
        .with_description("Sort CSS properties by line length"),
        Problem::new(
            "9v00674f1bfb00",
            "YAML to dotenv",
            "database:\n  host: localhost\n  port: 5432\napi:\n  key: secret",
            "DATABASE_HOST=localhost\nDATABASE_PORT=5432\nAPI_KEY=secret",
        )
        .with_description("Convert YAML configuration to .env format"),
        Problem::new(
            "9v0067255515",
            "Nested JSON Flattener",
            r#"{"user": {"name": "John", "settings": {"theme": "dark"}}}"#,
            r#"{"user.name": "John", "user.settings.theme": "dark"}"#,
        )
        .with_description("Transform deeply nested JSON to dot-notation"),
        Problem::new(
            "9v0066d89856",
            "Fix timezone format",
            "2023-10-15 14:30:00\n2023-10-16 09:15:30",
            "2023-10-15T14:30:00Z\n2023-10-16T09:15:30Z",
        )
        .with_description("Add 'T' and 'Z' to datetime strings"),
        Problem::new(
            "9v0067056336",
            "Change class fields from camel case to snake case",
            "firstName = 'John'\nlastName = 'Doe'\nphoneNumber = '555-1234'",
            "first_name = 'John'\nlast_name = 'Doe'\nphone_number = '555-1234'",
        )
        .with_description("Convert camelCase variable names to snake_case"),
        Problem::new(
            "9v0066dd4c36",
            "Markdown Blog Editing",
            "Visit our website at https://example.com for more info.\nCheck out https://github.com/user/repo for the code.",
            "Visit our website at [https://example.com](https://example.com) for more info.\nCheck out [https://github.com/user/repo](https://github.com/user/repo) for the code.",
        )
        .with_description("Convert link text to markdown link format"),
        Problem::new(
            "9v0066cbb6a1",
            "Remove adjacent duplicates",
            "aabbccddee\nhhellooo wwoorlld",
            "abcde\nhelo world",
        )
        .with_description("Remove consecutive repeated characters"),
        Problem::new(
            "9v0066daede5",
            "Word completion",
            "func main() {\n    var msg str = \"Hello\"\n    fmt.Println(msg)\n}",
            "function main() {\n    var message string = \"Hello\"\n    fmt.Println(message)\n}",
        )
        .with_description("Complete abbreviated words with full versions"),
    ]
}
