//! Arithmetic expression engine for a math scratchpad.
//!
//! A line of text goes through three stages, each reporting failures both through its return
//! value and through the shared [`Context`]:
//!
//! 1. [`tokenize`] splits UTF-8 text into tokens
//! 2. [`parse`] builds a [`Group`] tree with precedence climbing
//! 3. [`evaluate`] computes the tree to an `f64`
//!
//! ```
//! use mathpad::{calculate, Context};
//!
//! let mut ctx = Context::new();
//! assert_eq!(calculate(&mut ctx, "3 + 7 * 5"), Ok(38.0));
//! assert!(calculate(&mut ctx, "3 +").is_err());
//! assert_eq!(ctx.last_error(), "the operator is missing an operand");
//! ```

pub mod math;

pub use math::context::Context;
pub use math::error::{ErrorKind, MathError, Result};
pub use math::eval::evaluate;
pub use math::functions::{Function, Native};
pub use math::group::{free_tree, BinaryOperator, Group};
pub use math::parse::parse;
pub use math::sample::{sample_grid, Bounds, Formula, Grid, ImplicitFunction};
pub use math::token::{tokenize, Keyword, Token, TokenKind};

/// Tokenize, parse and evaluate `text` in one go
pub fn calculate(ctx: &mut Context, text: &str) -> Result<f64> {
    let tokens = tokenize(ctx, text)?;
    let tree = parse(ctx, &tokens)?;
    let value = evaluate(ctx, &tree);
    free_tree(tree);

    value
}

#[test]
fn test_calculate() {
    let data = vec![
        ("3.5", 3.5),
        ("3 + 7 * 5", 38.0),
        ("3 * 7 + 5", 26.0),
        ("10 - 3 - 2", 5.0),
        ("2 * (3 + 4) / 7", 2.0),
        ("+4 - -1", 5.0),
        ("PI", std::f64::consts::PI),
        ("1\u{a0}+\u{2003}1", 2.0),
    ];

    for (input, expected) in data {
        let mut ctx = Context::new();
        assert_eq!(calculate(&mut ctx, input), Ok(expected), "{}", input);
    }
}

#[test]
fn test_calculate_nested_signs() {
    let mut ctx = Context::new();
    let value = calculate(&mut ctx, "-(-3.1) * -(7 * (3 - 2) + 5)").unwrap();
    assert!((value + 37.2).abs() < 1e-9);
}

#[test]
fn test_calculate_errors() {
    let data = vec![
        ("", ErrorKind::EmptyExpression),
        ("3 +", ErrorKind::HangingOperator),
        ("+-3", ErrorKind::DoublePlusMinus),
        ("3 + ☃", ErrorKind::InvalidToken),
        ("(1 + 2", ErrorKind::UnclosedParenthesis),
        ("7 mod 2", ErrorKind::Unsupported),
        ("1 and 0", ErrorKind::Unsupported),
    ];

    for (input, kind) in data {
        let mut ctx = Context::new();
        let err = calculate(&mut ctx, input).unwrap_err();
        assert_eq!(err.kind, kind, "{}", input);
        assert_eq!(ctx.last_error(), kind.message());
    }
}

#[test]
fn test_success_clears_previous_error() {
    let mut ctx = Context::new();
    assert!(calculate(&mut ctx, "3 +").is_err());
    assert_eq!(ctx.error().kind, ErrorKind::HangingOperator);

    assert_eq!(calculate(&mut ctx, "1 + 1"), Ok(2.0));
    assert_eq!(ctx.error().kind, ErrorKind::Success);
    assert_eq!(ctx.last_error(), "success");

    // A tree built by hand starts its own cycle too
    assert!(calculate(&mut ctx, "(").is_err());
    assert_eq!(evaluate(&mut ctx, &Group::Number(4.0)), Ok(4.0));
    assert_eq!(ctx.error().kind, ErrorKind::Success);
}
