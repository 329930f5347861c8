//! Locating a keystroke sequence inside free-form model output.
//!
//! Rules are tried in a fixed priority order and the first candidate that
//! also looks like a command wins:
//!
//! 1. [`ExtractionRule::InlineSolutionLabel`]: text after a `Solution:` label
//! 2. [`ExtractionRule::FencedBlock`]: the interior of the first fenced block
//! 3. [`ExtractionRule::InlineBacktick`]: the first single-line backtick span
//! 4. [`ExtractionRule::HeuristicLine`]: the first line that looks like a command
//!
//! Finding nothing is a normal outcome, reported as `None` (or an empty
//! string from [`extract_solution`]).

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Lead-ins that mark a line as prose rather than keystrokes.
const PROSE_LEAD_INS: &[&str] = &[
    "the vim keystrokes are:",
    "i would use",
    "here's",
    "this will",
    "explanation:",
    "keystrokes:",
    "step",
    "first",
    "then",
    "next",
];

/// Shapes that suggest keystrokes. Any one match is enough.
const COMMAND_PATTERNS: &[&str] = &[
    // Ex command
    r"^:",
    // Normal-mode command with optional count
    r"^[0-9]*[a-zA-Z]",
    // Special key
    r"<[A-Za-z][A-Za-z0-9-]*>",
    // Insert-mode entry
    r"[ijaoIO]",
    // Search
    r"[/?]",
    // Marks and registers
    r#"['"`]"#,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionRule {
    InlineSolutionLabel,
    FencedBlock,
    InlineBacktick,
    HeuristicLine,
}

impl ExtractionRule {
    /// All rules, highest priority first.
    pub const PRIORITY: [ExtractionRule; 4] = [
        ExtractionRule::InlineSolutionLabel,
        ExtractionRule::FencedBlock,
        ExtractionRule::InlineBacktick,
        ExtractionRule::HeuristicLine,
    ];

    /// Applies this rule alone and returns its accepted candidate, if any.
    pub fn apply(self, text: &str) -> Option<String> {
        match self {
            ExtractionRule::InlineSolutionLabel => from_solution_label(text),
            ExtractionRule::FencedBlock => from_fenced_block(text),
            ExtractionRule::InlineBacktick => from_inline_backtick(text),
            ExtractionRule::HeuristicLine => from_heuristic_line(text),
        }
    }
}

impl fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionRule::InlineSolutionLabel => "solution_label",
            ExtractionRule::FencedBlock => "fenced_block",
            ExtractionRule::InlineBacktick => "inline_backtick",
            ExtractionRule::HeuristicLine => "heuristic_line",
        };
        f.write_str(name)
    }
}

/// An accepted candidate and the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub candidate: String,
    pub rule: ExtractionRule,
}

/// Ordered rule list applied to model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionExtractor {
    rules: Vec<ExtractionRule>,
}

impl SolutionExtractor {
    pub fn new() -> Self {
        Self {
            rules: ExtractionRule::PRIORITY.to_vec(),
        }
    }

    /// Uses only `rules`, in the given order.
    pub fn with_rules(rules: impl IntoIterator<Item = ExtractionRule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Returns the first accepted candidate, or `None` if no rule yields one.
    pub fn extract(&self, text: &str) -> Option<Extraction> {
        self.rules.iter().find_map(|&rule| {
            let candidate = rule.apply(text)?;
            trace!(rule = %rule, candidate = %candidate, "Candidate accepted");
            Some(Extraction { candidate, rule })
        })
    }
}

impl Default for SolutionExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts a keystroke sequence with the default rules; empty when none is found.
pub fn extract_solution(text: &str) -> String {
    SolutionExtractor::new()
        .extract(text)
        .map(|e| e.candidate)
        .unwrap_or_default()
}

fn command_regexes() -> &'static [Regex] {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        COMMAND_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("command pattern is valid"))
            .collect()
    })
}

/// Whether `text` plausibly is a keystroke sequence rather than prose.
pub fn looks_like_command(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }

    let lowered = text.to_lowercase();
    if PROSE_LEAD_INS.iter().any(|lead| lowered.starts_with(lead)) {
        return false;
    }

    command_regexes().iter().any(|re| re.is_match(text))
}

/// Trims `text` and strips one pair of surrounding backticks.
pub fn clean_backticks(text: &str) -> &str {
    let text = text.trim();
    if text.len() >= 2 && text.starts_with('`') && text.ends_with('`') {
        text[1..text.len() - 1].trim()
    } else {
        text
    }
}

fn accept(candidate: &str) -> Option<String> {
    (!candidate.is_empty() && looks_like_command(candidate)).then(|| candidate.to_string())
}

fn solution_label_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    // `\s*` may cross line breaks, so a label followed by a fence opener on
    // the next line captures the opener.
    REGEX.get_or_init(|| Regex::new(r"Solution:\s*([^\n]+)").expect("label pattern is valid"))
}

fn fence_marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^```[A-Za-z0-9_+-]*$").expect("fence pattern is valid"))
}

fn fenced_block_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```")
            .expect("fenced block pattern is valid")
    })
}

fn inline_backtick_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("backtick pattern is valid"))
}

const SOLUTION_LABEL: &str = "Solution:";

fn from_solution_label(text: &str) -> Option<String> {
    let caps = solution_label_regex().captures(text)?;
    let raw = caps[1].trim();
    if fence_marker_regex().is_match(raw) {
        return None;
    }
    accept(clean_backticks(raw))
}

fn from_fenced_block(text: &str) -> Option<String> {
    let caps = fenced_block_regex().captures(text)?;
    accept(caps[1].trim())
}

fn from_inline_backtick(text: &str) -> Option<String> {
    let caps = inline_backtick_regex().captures(text)?;
    accept(caps[1].trim())
}

fn from_heuristic_line(text: &str) -> Option<String> {
    // A label line reaching here already failed the label rule.
    text.lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("```") && !line.starts_with(SOLUTION_LABEL)
        })
        .find_map(|line| accept(clean_backticks(line)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_prose() {
        assert_eq!(extract_solution(""), "");
        assert_eq!(extract_solution("   \n\n"), "");
        assert_eq!(extract_solution("123 456\n---\n!!!"), "");
        assert_eq!(
            extract_solution("Here's my answer\nExplanation: none\nThen done"),
            ""
        );
    }

    #[test]
    fn test_solution_label() {
        assert_eq!(extract_solution("Solution: dd"), "dd");
        assert_eq!(
            extract_solution("Solution: `:%s/test/TEST/g<CR>`\nKeystrokes: 17"),
            ":%s/test/TEST/g<CR>"
        );

        let extraction = SolutionExtractor::new().extract("Solution: ggdG").unwrap();
        assert_eq!(extraction.rule, ExtractionRule::InlineSolutionLabel);
    }

    #[test]
    fn test_label_followed_by_fence_falls_through() {
        assert_eq!(
            extract_solution("Solution: \n```\n:%s/a/b/g<CR>\n```"),
            ":%s/a/b/g<CR>"
        );

        let extraction = SolutionExtractor::new()
            .extract("Solution: ```vim\ndd\n```")
            .unwrap();
        assert_eq!(extraction.candidate, "dd");
        assert_eq!(extraction.rule, ExtractionRule::FencedBlock);
    }

    #[test]
    fn test_bare_label_yields_nothing() {
        assert_eq!(extract_solution("Solution:"), "");
        assert_eq!(extract_solution("Solution: ```"), "");
        assert_eq!(extract_solution("Solution: ```vim\n"), "");
        assert_eq!(extract_solution("Solution:\n\nggdG"), "ggdG");
    }

    #[test]
    fn test_realistic_multiline_response() {
        let response = r#"Solution:
```
ggO{<Esc>:%s/\(.*\)=\(.*\)/  "\1": "\2",/<CR>ggddG$xO}<Esc>
```

Keystrokes: 45

Explanation:

1. `gg`: Go to the first line.
2. `O`: Open a new line above the current line and enter insert mode."#;

        assert_eq!(
            extract_solution(response),
            r#"ggO{<Esc>:%s/\(.*\)=\(.*\)/  "\1": "\2",/<CR>ggddG$xO}<Esc>"#
        );
    }

    #[test]
    fn test_fenced_block_takes_first_block() {
        let text = "```vim\n:g/^$/d<CR>\n```\n\n```\nxx\n```";
        assert_eq!(extract_solution(text), ":g/^$/d<CR>");
    }

    #[test]
    fn test_fenced_block_with_unknown_tag() {
        assert_eq!(extract_solution("```vimscript\n3dd\n```"), "3dd");
    }

    #[test]
    fn test_inline_backtick() {
        let extraction = SolutionExtractor::new()
            .extract("You can just press `xp` here.")
            .unwrap();
        assert_eq!(extraction.candidate, "xp");
        assert_eq!(extraction.rule, ExtractionRule::InlineBacktick);
    }

    #[test]
    fn test_rejected_candidate_continues_search() {
        // The label text is prose, so the later backtick span wins.
        let text = "Solution: first, go to the top\nthen `ggdd`";
        assert_eq!(extract_solution(text), "ggdd");
    }

    #[test]
    fn test_heuristic_line() {
        let text = "```\n```\n\n  `3J`  \nmore text";
        let extraction = SolutionExtractor::with_rules([ExtractionRule::HeuristicLine])
            .extract(text)
            .unwrap();
        assert_eq!(extraction.candidate, "3J");
    }

    #[test]
    fn test_custom_rule_order() {
        let text = "Solution: dd\n```\nyyp\n```";
        let fenced_first = SolutionExtractor::with_rules([
            ExtractionRule::FencedBlock,
            ExtractionRule::InlineSolutionLabel,
        ]);
        assert_eq!(fenced_first.extract(text).unwrap().candidate, "yyp");
        assert_eq!(
            SolutionExtractor::new().extract(text).unwrap().candidate,
            "dd"
        );
        let no_rules = SolutionExtractor::with_rules(Vec::new());
        assert!(no_rules.extract(text).is_none());
    }

    #[test]
    fn test_looks_like_command() {
        for text in [":wq", "dd", "3J", "<Esc>", "/foo", "'a", "\"ap", "ggVG"] {
            assert!(looks_like_command(text), "{text}");
        }
        for text in [
            "",
            "Step 1: go",
            "Keystrokes: 4",
            "I would use dd",
            "123",
            "!!!",
        ] {
            assert!(!looks_like_command(text), "{text}");
        }
    }

    #[test]
    fn test_clean_backticks() {
        assert_eq!(clean_backticks("  `dd`  "), "dd");
        assert_eq!(clean_backticks("` x `"), "x");
        assert_eq!(clean_backticks("`"), "`");
        assert_eq!(clean_backticks("dd`"), "dd`");
    }
}
