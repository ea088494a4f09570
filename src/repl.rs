use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Helper, Highlighter, Hinter, Result};

/// Helper that extends editor
///
/// Only implements `Validator`, to keep reading lines while the input ends with a `\`.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplHelper {}

impl ReplHelper {
    pub fn new() -> Self {
        ReplHelper {}
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        if ctx.input().ends_with('\\') {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Join lines continued with a trailing `\` back into one expression
pub fn fixup_input(input: &str) -> String {
    input.replace("\\\n", " ").trim().to_string()
}

#[test]
fn test_fixup_input() {
    let data = vec![
        ("1 +\\\n2", "1 + 2"),
        ("1 + \\\n 2 * \\\n3", "1 +   2 *  3"),
        ("1 \\ \n+ 2", "1 \\ \n+ 2"),
        ("  3.5  ", "3.5"),
        ("", ""),
    ];

    for (input, expected) in data {
        assert_eq!(fixup_input(input), expected);
    }
}
