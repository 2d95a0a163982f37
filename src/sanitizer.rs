//! Input sanitization for speech and notification text.
//!
//! Everything that reaches the TTS provider or a platform utility passes
//! through here first. Markup is unwrapped to its inner text; shell and
//! scripting metacharacters are removed outright.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ValidationError;

/// Maximum accepted length, in characters, before and after sanitization.
pub const MAX_CHARS: usize = 500;

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<script").unwrap());
static SHELL_META: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[;&|><`$\\]").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#{1,6}\s+").unwrap());

/// Strip dangerous content and markdown from `raw`.
///
/// The single pass is repeated until the text stops changing, so removals
/// cannot splice a new `../` or heading together and the result is
/// idempotent.
pub fn sanitize(raw: &str) -> String {
    let mut current = sanitize_pass(raw);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_pass(input: &str) -> String {
    let text = SCRIPT_TAG.replace_all(input, "");
    let text = text.replace("../", "");
    // Backticks go here too, which unwraps inline code.
    let text = SHELL_META.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");
    let text = text.replace('*', "");
    let text = HEADING.replace_all(&text, "");

    let truncated: String = text.trim().chars().take(MAX_CHARS).collect();
    truncated.trim_end().to_string()
}

/// Validate a JSON field and return its sanitized text.
pub fn validate(raw: &Value) -> Result<String, ValidationError> {
    match raw {
        Value::String(s) => validate_str(s),
        _ => Err(ValidationError::InvalidType),
    }
}

/// Validate a string: length is checked before sanitization, emptiness after.
pub fn validate_str(raw: &str) -> Result<String, ValidationError> {
    if raw.chars().count() > MAX_CHARS {
        return Err(ValidationError::TooLong { max: MAX_CHARS });
    }

    let sanitized = sanitize(raw);
    if sanitized.is_empty() {
        return Err(ValidationError::Empty);
    }

    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FORBIDDEN: [&str; 10] = [";", "&", "|", ">", "<", "`", "$", "\\", "<script", "../"];

    fn assert_clean(output: &str) {
        for needle in FORBIDDEN {
            assert!(
                !output.to_lowercase().contains(needle),
                "{output:?} still contains {needle:?}"
            );
        }
    }

    #[test]
    fn removes_shell_metacharacters() {
        let out = sanitize("rm -rf / ; echo $HOME | cat > out && `whoami` \\n");
        assert_clean(&out);
        assert!(out.contains("rm -rf /"));
    }

    #[test]
    fn removes_script_tags_and_traversal() {
        assert_clean(&sanitize("<SCRIPT>alert(1)</script> ../../etc/passwd"));
        assert_clean(&sanitize("<scr<scriptipt>"));
    }

    #[test]
    fn traversal_cannot_be_reassembled() {
        // Removing the inner "../" would otherwise leave a fresh "../".
        let out = sanitize("..././..././secret");
        assert_clean(&out);
    }

    #[test]
    fn unwraps_markdown() {
        assert_eq!(sanitize("**Build** finished"), "Build finished");
        assert_eq!(sanitize("an *important* note"), "an important note");
        assert_eq!(sanitize("run `cargo build` now"), "run cargo build now");
        assert_eq!(sanitize("### Summary of work"), "Summary of work");
    }

    #[test]
    fn bare_emphasis_sanitizes_to_empty() {
        assert_eq!(sanitize("***"), "");
        assert_eq!(validate_str("***"), Err(ValidationError::Empty));
    }

    #[test]
    fn keeps_natural_punctuation() {
        assert_eq!(
            sanitize("Done! Tests pass, 3 of 3 (100%). Next?"),
            "Done! Tests pass, 3 of 3 (100%). Next?"
        );
    }

    #[test]
    fn keeps_emotion_markers_intact() {
        assert_eq!(sanitize("[✨ success] Build finished"), "[✨ success] Build finished");
    }

    #[test]
    fn truncates_to_max_chars() {
        let long = "a".repeat(MAX_CHARS + 1);
        assert_eq!(sanitize(&long).chars().count(), MAX_CHARS);
    }

    #[test]
    fn idempotent_on_assorted_inputs() {
        let inputs = [
            "**bold** and *italic* `code`",
            "## heading ../x; y | z",
            "a####### #b",
            "  padded  ",
            "***",
            "..././..././",
            "plain text",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn length_is_checked_before_emptiness() {
        let too_long = "*".repeat(MAX_CHARS + 1);
        assert_eq!(
            validate_str(&too_long),
            Err(ValidationError::TooLong { max: MAX_CHARS })
        );
    }

    #[test]
    fn exactly_max_chars_is_accepted() {
        let at_limit = "b".repeat(MAX_CHARS);
        assert_eq!(validate_str(&at_limit).unwrap().chars().count(), MAX_CHARS);
    }

    #[test]
    fn non_string_values_are_rejected() {
        assert_eq!(validate(&json!(42)), Err(ValidationError::InvalidType));
        assert_eq!(validate(&json!(null)), Err(ValidationError::InvalidType));
        assert_eq!(validate(&json!(["a"])), Err(ValidationError::InvalidType));
        assert_eq!(validate(&json!("hello")).unwrap(), "hello");
    }

    #[test]
    fn distinct_error_messages() {
        let messages = [
            ValidationError::InvalidType.to_string(),
            ValidationError::TooLong { max: MAX_CHARS }.to_string(),
            ValidationError::Empty.to_string(),
        ];
        assert_eq!(messages[2], "Message contains no valid content after sanitization");
        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
    }
}
