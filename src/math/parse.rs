use log::debug;

use crate::math::context::Context;
use crate::math::error::{ErrorKind, MathError, Result};
use crate::math::group::{BinaryOperator, Group};
use crate::math::token::{Token, TokenKind};

/// Deepest allowed parenthesis nesting
pub const MAX_NESTING: usize = 256;

struct Parser<'a> {
    ctx: &'a mut Context,
    tokens: &'a [Token],
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(ctx: &'a mut Context, tokens: &'a [Token]) -> Self {
        Self {
            ctx,
            tokens,
            pos: 0,
            nesting: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        let tokens = self.tokens;
        tokens.get(self.pos)
    }

    fn fail(&mut self, kind: ErrorKind, position: usize) -> MathError {
        self.ctx.fail(MathError::new(kind).at(position))
    }

    /// Position to blame when input ends early
    fn end_position(&self) -> usize {
        self.tokens.last().map(|t| t.position).unwrap_or(0)
    }

    /// Precedence climbing: keep folding operators that bind tighter than `min`
    fn parse_expression(&mut self, min: u8) -> Result<Group> {
        let mut left = self.parse_unary()?;

        while let Some(token) = self.peek() {
            let op = match BinaryOperator::from_token(&token.kind) {
                Some(op) if op.precedence() > min => op,
                _ => break,
            };

            self.pos += 1;
            if self.peek().is_none() {
                return Err(self.fail(ErrorKind::HangingOperator, token.position));
            }

            let right = self.parse_expression(op.precedence())?;
            left = Group::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Group> {
        let sign = match self.peek() {
            Some(token) => token,
            None => return Err(self.fail(ErrorKind::HangingOperator, self.end_position())),
        };

        let negate = match sign.kind {
            TokenKind::Add => false,
            TokenKind::Subtract => true,
            _ => return self.parse_primary(),
        };

        self.pos += 1;
        match self.peek() {
            None => return Err(self.fail(ErrorKind::HangingOperator, sign.position)),
            Some(next) if matches!(next.kind, TokenKind::Add | TokenKind::Subtract) => {
                return Err(self.fail(ErrorKind::DoublePlusMinus, next.position))
            }
            Some(_) => (),
        }

        let primary = self.parse_primary()?;
        if negate {
            Ok(Group::negate(primary))
        } else {
            Ok(primary)
        }
    }

    fn parse_primary(&mut self) -> Result<Group> {
        let token = match self.peek() {
            Some(token) => token,
            None => return Err(self.fail(ErrorKind::HangingOperator, self.end_position())),
        };

        match token.kind {
            TokenKind::Number(n) => {
                self.pos += 1;
                Ok(Group::Number(n))
            }
            TokenKind::OpenRound => self.parse_paren(token),
            _ => Err(self.fail(ErrorKind::InvalidToken, token.position)),
        }
    }

    fn parse_paren(&mut self, open: &'a Token) -> Result<Group> {
        self.pos += 1;
        if self.nesting >= MAX_NESTING {
            return Err(self.fail(ErrorKind::InvalidToken, open.position));
        }
        if self.peek().is_none() {
            return Err(self.fail(ErrorKind::UnclosedParenthesis, open.position));
        }

        self.nesting += 1;
        let inner = self.parse_expression(0)?;
        self.nesting -= 1;

        match self.peek() {
            Some(token) if token.kind == TokenKind::ClosedRound => {
                self.pos += 1;
                Ok(inner)
            }
            Some(token) => Err(self.fail(ErrorKind::InvalidToken, token.position)),
            None => Err(self.fail(ErrorKind::UnclosedParenthesis, open.position)),
        }
    }
}

/// Build an expression tree from `tokens`
///
/// The whole token sequence must form one expression. On failure any partially built tree is
/// released and the error is recorded in `ctx`.
pub fn parse(ctx: &mut Context, tokens: &[Token]) -> Result<Group> {
    if tokens.is_empty() {
        return Err(ctx.fail(MathError::new(ErrorKind::EmptyExpression)));
    }

    let mut parser = Parser::new(ctx, tokens);
    let group = parser.parse_expression(0)?;
    if let Some(token) = parser.peek() {
        return Err(parser.fail(ErrorKind::InvalidToken, token.position));
    }

    debug!(
        "parsed {} tokens into {} nodes",
        tokens.len(),
        group.node_count()
    );
    Ok(group)
}

#[cfg(test)]
fn parse_str(input: &str) -> Result<Group> {
    let mut ctx = Context::new();
    let tokens = crate::math::token::tokenize(&mut ctx, input)?;
    parse(&mut ctx, &tokens)
}

#[test]
fn test_precedence() {
    use BinaryOperator::*;

    let n = Group::Number;
    let data = vec![
        ("3", n(3.0)),
        ("(3)", n(3.0)),
        (
            "3 + 7 * 5",
            Group::binary(Add, n(3.0), Group::binary(Multiply, n(7.0), n(5.0))),
        ),
        (
            "(3 + 10) * 2",
            Group::binary(Multiply, Group::binary(Add, n(3.0), n(10.0)), n(2.0)),
        ),
        (
            "10 - 3 - 2",
            Group::binary(Subtract, Group::binary(Subtract, n(10.0), n(3.0)), n(2.0)),
        ),
        (
            "8 / 4 / 2",
            Group::binary(Divide, Group::binary(Divide, n(8.0), n(4.0)), n(2.0)),
        ),
        (
            "1 or 2 + 3 mod 4 * 5",
            Group::binary(
                Or,
                n(1.0),
                Group::binary(
                    Add,
                    n(2.0),
                    Group::binary(Mod, n(3.0), Group::binary(Multiply, n(4.0), n(5.0))),
                ),
            ),
        ),
    ];

    for (input, expected) in data {
        assert_eq!(parse_str(input), Ok(expected), "{}", input);
    }
}

#[test]
fn test_signs() {
    use BinaryOperator::*;

    let n = Group::Number;
    let data = vec![
        ("+3", n(3.0)),
        ("-3", Group::negate(n(3.0))),
        // The sign applies to the primary only
        ("-2 * 3", Group::binary(Multiply, Group::negate(n(2.0)), n(3.0))),
        ("3 * -2", Group::binary(Multiply, n(3.0), Group::negate(n(2.0)))),
        ("3 - -2", Group::binary(Subtract, n(3.0), Group::negate(n(2.0)))),
        (
            "-(-3.1)",
            Group::negate(Group::negate(n(3.1))),
        ),
    ];

    for (input, expected) in data {
        assert_eq!(parse_str(input), Ok(expected), "{}", input);
    }
}

#[test]
fn test_errors() {
    let data = vec![
        ("3 +", ErrorKind::HangingOperator, 2),
        ("-", ErrorKind::HangingOperator, 0),
        ("+-3", ErrorKind::DoublePlusMinus, 1),
        ("3 - - -2", ErrorKind::DoublePlusMinus, 6),
        ("(3", ErrorKind::UnclosedParenthesis, 0),
        ("2 * (3 + (4)", ErrorKind::UnclosedParenthesis, 4),
        ("(", ErrorKind::UnclosedParenthesis, 0),
        ("3 4", ErrorKind::InvalidToken, 2),
        ("(3 4)", ErrorKind::InvalidToken, 3),
        ("()", ErrorKind::InvalidToken, 1),
        ("3)", ErrorKind::InvalidToken, 1),
        ("sin", ErrorKind::InvalidToken, 0),
        ("x + 1", ErrorKind::InvalidToken, 0),
        ("* 2", ErrorKind::InvalidToken, 0),
    ];

    for (input, kind, position) in data {
        let err = parse_str(input).unwrap_err();
        assert_eq!(err.kind, kind, "{}", input);
        assert_eq!(err.position, Some(position), "{}", input);
    }
}

#[test]
fn test_empty() {
    let mut ctx = Context::new();
    let err = parse(&mut ctx, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::EmptyExpression);
    assert_eq!(ctx.last_error(), "the expression is empty");
}

#[test]
fn test_nesting_limit() {
    let ok = format!("{}1{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
    assert_eq!(parse_str(&ok), Ok(Group::Number(1.0)));

    let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
    assert_eq!(parse_str(&deep).unwrap_err().kind, ErrorKind::InvalidToken);
}
