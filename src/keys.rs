//! Keystroke notation: counting and engine encoding.
//!
//! A keystroke sequence is a plain string. Printable characters are literal
//! key presses; a bracketed name such as `<CR>`, `<Esc>` or `<C-a>` is a single
//! special key. Bracketed text that is not a recognized key name is typed
//! literally, one key per character.

use std::sync::OnceLock;

use regex::Regex;

/// The canonical keystroke that returns the engine to normal mode.
pub const ESCAPE_KEY: &str = "<Esc>";

/// Recognized special-key shapes, applied in this order when counting.
const SPECIAL_KEY_PATTERNS: &[&str] = &[
    r"<CR>|<Enter>|<Return>",
    r"<Esc>|<Escape>",
    r"<Tab>|<S-Tab>",
    r"<BS>|<Backspace>",
    r"<Del>|<Delete>",
    r"<Up>|<Down>|<Left>|<Right>",
    r"<C-[a-zA-Z0-9]>",
    r"<S-[a-zA-Z]>",
    r"<A-[a-zA-Z]>",
    r"<F[0-9]+>",
    r"<Home>|<End>",
    r"<PageUp>|<PageDown>",
    r"<Insert>",
];

fn special_key_regexes() -> &'static [Regex] {
    static REGEXES: OnceLock<Vec<Regex>> = OnceLock::new();
    REGEXES.get_or_init(|| {
        SPECIAL_KEY_PATTERNS
            .iter()
            .map(|pattern| {
                Regex::new(&format!("(?i){pattern}")).expect("special key pattern is valid")
            })
            .collect()
    })
}

fn whole_token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        let alternatives = SPECIAL_KEY_PATTERNS.join("|");
        Regex::new(&format!("(?i)^(?:{alternatives})$")).expect("special key pattern is valid")
    })
}

/// Stands in for a special key once it has been counted.
///
/// It is a single character that no pattern can match or complete, so the
/// text on either side of a consumed key never joins into a new token.
const CONSUMED_KEY: &str = "\u{fffc}";

/// Counts the key presses in a keystroke sequence.
///
/// Each recognized special key counts once; everything else counts once per
/// character. Patterns are applied one after another and every match is
/// collapsed to a single placeholder before the next pattern runs, so a span
/// is never counted twice.
pub fn count_keystrokes(sequence: &str) -> usize {
    let mut remaining = sequence.to_string();

    for regex in special_key_regexes() {
        if regex.is_match(&remaining) {
            remaining = regex.replace_all(&remaining, CONSUMED_KEY).into_owned();
        }
    }

    remaining.chars().count()
}

/// Returns true if `token` is exactly one recognized special key.
pub fn is_special_key(token: &str) -> bool {
    whole_token_regex().is_match(token)
}

/// Prepares a keystroke sequence for delivery to the engine.
///
/// Bracketed notation is left for the engine's own termcode translation.
/// Raw control characters are rewritten to their bracketed names so the
/// sequence can travel as a single-line string.
pub fn encode_for_engine(sequence: &str) -> String {
    let mut encoded = String::with_capacity(sequence.len());
    for ch in sequence.chars() {
        match ch {
            '\n' => encoded.push_str("<NL>"),
            '\r' => encoded.push_str("<CR>"),
            '\t' => encoded.push_str("<Tab>"),
            '\u{1b}' => encoded.push_str("<Esc>"),
            other => encoded.push(other),
        }
    }
    encoded
}
