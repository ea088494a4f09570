use std::fmt;

use nix::errno::Errno;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    Success,
    /// Allocation failed. Carries the system error.
    Memory,
    /// Source text is not valid UTF-8. Carries the system error.
    InvalidUtf8,
    InvalidToken,
    /// An operator or sign is not followed by an operand
    HangingOperator,
    /// A sign is directly followed by another sign, eg. `+-3`
    DoublePlusMinus,
    /// Unknown function or variable name, or an arity mismatch
    InvalidCall,
    /// `(` without a matching `)`
    UnclosedParenthesis,
    EmptyExpression,
    /// The tree node has no evaluation rule (`mod`, `and`, `or`, `xor`)
    Unsupported,
}

impl ErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Success => "success",
            ErrorKind::Memory => "failed allocating memory",
            ErrorKind::InvalidUtf8 => "the utf8 sequence is invalid",
            ErrorKind::InvalidToken => "the token is invalid",
            ErrorKind::HangingOperator => "the operator is missing an operand",
            ErrorKind::DoublePlusMinus => "a sign cannot follow another sign",
            ErrorKind::InvalidCall => "the call is invalid",
            ErrorKind::UnclosedParenthesis => "the parenthesis is never closed",
            ErrorKind::EmptyExpression => "the expression is empty",
            ErrorKind::Unsupported => "the operation is not supported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Error record shared by the tokenizer, parser and evaluator
///
/// `errno` is the underlying system error, if any. `position` is the byte offset into the source
/// text when the error can be pinned to a token.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MathError {
    pub kind: ErrorKind,
    pub errno: Option<Errno>,
    pub position: Option<usize>,
}

impl MathError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            errno: None,
            position: None,
        }
    }

    pub fn with_errno(kind: ErrorKind, errno: Errno) -> Self {
        Self {
            kind,
            errno: Some(errno),
            position: None,
        }
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn success() -> Self {
        Self::new(ErrorKind::Success)
    }
}

impl Default for MathError {
    fn default() -> Self {
        Self::success()
    }
}

impl fmt::Display for MathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errno {
            Some(errno) => write!(f, "{}: {}", self.kind, errno.desc()),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for MathError {}

pub type Result<T> = std::result::Result<T, MathError>;

#[test]
fn test_display() {
    let data = vec![
        (MathError::success(), "success"),
        (MathError::new(ErrorKind::InvalidToken), "the token is invalid"),
        (
            MathError::new(ErrorKind::HangingOperator).at(3),
            "the operator is missing an operand",
        ),
    ];

    for (error, expected) in data {
        assert_eq!(error.to_string(), expected);
    }
}

#[test]
fn test_errno_is_appended() {
    let data = vec![
        (ErrorKind::InvalidUtf8, Errno::EILSEQ, "the utf8 sequence is invalid: "),
        (ErrorKind::Memory, Errno::ENOMEM, "failed allocating memory: "),
    ];

    for (kind, errno, prefix) in data {
        let msg = MathError::with_errno(kind, errno).to_string();
        assert!(msg.starts_with(prefix));
        assert_eq!(&msg[prefix.len()..], errno.desc());
    }
}
