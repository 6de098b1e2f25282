//! Macro expansion for quest definition files
//!
//! Runs over the raw file text before it is parsed. A macro reference looks like
//! `<$m NAME $>`; known names are replaced by their value from `global-macros`,
//! unknown references are left untouched.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

static MACRO_REGEX: OnceLock<Regex> = OnceLock::new();

fn macro_regex() -> &'static Regex {
    MACRO_REGEX.get_or_init(|| Regex::new(r"<\$m\s*(\S+)\s*\$>").expect("macro pattern is valid"))
}

/// Expand every macro reference in `text` in a single left-to-right pass.
///
/// Replacement values are not scanned again, so a macro expanding to another
/// macro reference leaves that reference in the output.
pub fn expand_macros(text: &str, macros: &HashMap<String, String>) -> String {
    if macros.is_empty() {
        return text.to_string();
    }

    macro_regex()
        .replace_all(text, |caps: &regex::Captures| {
            let name = &caps[1];
            match macros.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
