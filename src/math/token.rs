//! Tokenizer for a single line of math input.
//!
//! Scanning happens byte-wise over UTF-8 text. ASCII symbols and numeric literals are handled
//! first, then the keyword table, and only then is a full code point decoded for variable names
//! and the Unicode math symbols.
//!
//! Developer notes:
//!
//! * Keywords win over variables at the position they start. `sinx` is `sin` followed by the
//!   variable `x`, but `xsin` is a single variable since a variable swallows the whole alphabetic
//!   run.
//!
//! * The keyword table is searched longest keyword first so `log10` is never read as `log`
//!   followed by the number `10`, and `sinh` is never read as `sin` followed by `h`.

use std::cmp::Reverse;
use std::fmt;

use lazy_static::lazy_static;
use log::{debug, error, trace};
use nix::errno::Errno;
use pom::parser::{is_a, sym, Parser};

use crate::math::context::Context;
use crate::math::error::{ErrorKind, MathError, Result};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    Floor,
    Ceil,
    Exp,
    Pow,
    Erfc,
    Sqrt,
    Cbrt,
    Root,
    Log10,
    Log,
    Ln,
    Sin,
    Cos,
    Tan,
    Cot,
    Sec,
    Csc,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Gamma,
    And,
    Or,
    Xor,
    Mod,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Floor => "floor",
            Keyword::Ceil => "ceil",
            Keyword::Exp => "exp",
            Keyword::Pow => "pow",
            Keyword::Erfc => "erfc",
            Keyword::Sqrt => "sqrt",
            Keyword::Cbrt => "cbrt",
            Keyword::Root => "root",
            Keyword::Log10 => "log10",
            Keyword::Log => "log",
            Keyword::Ln => "ln",
            Keyword::Sin => "sin",
            Keyword::Cos => "cos",
            Keyword::Tan => "tan",
            Keyword::Cot => "cot",
            Keyword::Sec => "sec",
            Keyword::Csc => "csc",
            Keyword::Sinh => "sinh",
            Keyword::Cosh => "cosh",
            Keyword::Tanh => "tanh",
            Keyword::Asinh => "asinh",
            Keyword::Acosh => "acosh",
            Keyword::Atanh => "atanh",
            Keyword::Gamma => "gamma",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Xor => "xor",
            Keyword::Mod => "mod",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `/`
    Divide,
    /// `*`
    Multiply,
    /// `%`
    Percent,
    /// `!`
    Bang,
    /// `^`
    Raise,
    /// `_`
    Lower,
    /// `(`
    OpenRound,
    /// `)`
    ClosedRound,
    /// `{`
    OpenCurly,
    /// `}`
    ClosedCurly,
    /// `[`
    OpenCorner,
    /// `]`
    ClosedCorner,
    /// `°`
    Degrees,
    /// `∈`
    ElementOf,
    /// `∩`
    Intersection,
    /// `∪`
    Union,
    /// `ℝ`
    RealNumbers,
    /// `ℂ`
    ComplexNumbers,
    /// `ℤ`
    Integers,
    /// `ℕ`
    NaturalNumbers,
    /// `↦`
    MapsTo,
    /// `⊆`
    SubsetOf,
    /// `⇒`
    Implies,
    Keyword(Keyword),
    /// Numeric literal or a constant resolved while tokenizing
    Number(f64),
    Variable(String),
}

impl TokenKind {
    /// Short category name, used when dumping tokens
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Add => "add",
            TokenKind::Subtract => "subtract",
            TokenKind::Divide => "divide",
            TokenKind::Multiply => "multiply",
            TokenKind::Percent => "percent",
            TokenKind::Bang => "bang",
            TokenKind::Raise => "raise",
            TokenKind::Lower => "lower",
            TokenKind::OpenRound => "open_round",
            TokenKind::ClosedRound => "closed_round",
            TokenKind::OpenCurly => "open_curly",
            TokenKind::ClosedCurly => "closed_curly",
            TokenKind::OpenCorner => "open_corner",
            TokenKind::ClosedCorner => "closed_corner",
            TokenKind::Degrees => "degrees",
            TokenKind::ElementOf => "element_of",
            TokenKind::Intersection => "intersection",
            TokenKind::Union => "union",
            TokenKind::RealNumbers => "real_numbers",
            TokenKind::ComplexNumbers => "complex_numbers",
            TokenKind::Integers => "integers",
            TokenKind::NaturalNumbers => "natural_numbers",
            TokenKind::MapsTo => "maps_to",
            TokenKind::SubsetOf => "subset_of",
            TokenKind::Implies => "implies",
            TokenKind::Keyword(_) => "keyword",
            TokenKind::Number(_) => "number",
            TokenKind::Variable(_) => "variable",
        }
    }

    fn from_ascii(byte: u8) -> Option<Self> {
        Some(match byte {
            b'+' => TokenKind::Add,
            b'-' => TokenKind::Subtract,
            b'/' => TokenKind::Divide,
            b'*' => TokenKind::Multiply,
            b'%' => TokenKind::Percent,
            b'!' => TokenKind::Bang,
            b'^' => TokenKind::Raise,
            b'_' => TokenKind::Lower,
            b'(' => TokenKind::OpenRound,
            b')' => TokenKind::ClosedRound,
            b'{' => TokenKind::OpenCurly,
            b'}' => TokenKind::ClosedCurly,
            b'[' => TokenKind::OpenCorner,
            b']' => TokenKind::ClosedCorner,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Keyword(k) => write!(f, "keyword {}", k),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::Variable(name) => write!(f, "variable {}", name),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset into the source text
    pub position: usize,
}

lazy_static! {
    /// Keywords ordered longest first
    static ref KEYWORDS: Vec<(&'static str, TokenKind)> = {
        let mut keywords = vec![
            ("PI", TokenKind::Number(std::f64::consts::PI)),
            ("and", TokenKind::Keyword(Keyword::And)),
            ("or", TokenKind::Keyword(Keyword::Or)),
            ("xor", TokenKind::Keyword(Keyword::Xor)),
            ("mod", TokenKind::Keyword(Keyword::Mod)),
        ];
        for keyword in &[
            Keyword::Floor, Keyword::Ceil, Keyword::Exp, Keyword::Pow, Keyword::Erfc,
            Keyword::Sqrt, Keyword::Cbrt, Keyword::Root, Keyword::Log10, Keyword::Log,
            Keyword::Ln, Keyword::Sin, Keyword::Cos, Keyword::Tan, Keyword::Cot,
            Keyword::Sec, Keyword::Csc, Keyword::Sinh, Keyword::Cosh, Keyword::Tanh,
            Keyword::Asinh, Keyword::Acosh, Keyword::Atanh, Keyword::Gamma,
        ] {
            keywords.push((keyword.as_str(), TokenKind::Keyword(*keyword)));
        }

        keywords.sort_by_key(|(word, _)| Reverse(word.len()));
        keywords
    };

    static ref SYMBOLS: Vec<(char, TokenKind)> = vec![
        ('°', TokenKind::Degrees),
        ('∈', TokenKind::ElementOf),
        ('∩', TokenKind::Intersection),
        ('∪', TokenKind::Union),
        ('ℝ', TokenKind::RealNumbers),
        ('ℂ', TokenKind::ComplexNumbers),
        ('ℤ', TokenKind::Integers),
        ('ℕ', TokenKind::NaturalNumbers),
        ('↦', TokenKind::MapsTo),
        ('⊆', TokenKind::SubsetOf),
        ('⇒', TokenKind::Implies),
    ];
}

fn symbol(c: char) -> Option<&'static TokenKind> {
    SYMBOLS
        .iter()
        .find(|(symbol, _)| *symbol == c)
        .map(|(_, kind)| kind)
}

/// Letters that are not claimed by the symbol table, eg. `ℝ` is a symbol
fn is_name_char(c: char) -> bool {
    c.is_alphabetic() && symbol(c).is_none()
}

/// `isspace` in the C locale
fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn digit<'a>() -> Parser<'a, u8, u8> {
    is_a(|b: u8| b.is_ascii_digit())
}

/// Longest numeric literal at the start of the input: `12`, `12.`, `12.5`, `.5`, `1e-3`
fn numeric_literal<'a>() -> Parser<'a, u8, &'a [u8]> {
    let integer = digit().repeat(1..) + (sym(b'.') + digit().repeat(0..)).opt();
    let fraction = sym(b'.') + digit().repeat(1..);
    let exponent = is_a(|b: u8| b == b'e' || b == b'E')
        + is_a(|b: u8| b == b'+' || b == b'-').opt()
        + digit().repeat(1..);

    ((integer.discard() | fraction.discard()) + exponent.opt()).collect()
}

/// Decode the code point at the start of `bytes`
fn decode_char(bytes: &[u8]) -> Option<char> {
    let chunk = &bytes[..bytes.len().min(4)];
    let valid = match std::str::from_utf8(chunk) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&chunk[..e.valid_up_to()]).ok()?,
    };

    valid.chars().next()
}

enum Lexeme {
    Token(TokenKind, usize),
    Space(usize),
}

struct Tokenizer<'a> {
    ctx: &'a mut Context,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(ctx: &'a mut Context, bytes: &'a [u8]) -> Self {
        Self {
            ctx,
            bytes,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn fail(&mut self, err: MathError) -> MathError {
        self.ctx.fail(err.at(self.pos))
    }

    fn number(&mut self) -> Result<Lexeme> {
        let bytes = self.bytes;
        let rest = &bytes[self.pos..];
        let literal = match numeric_literal().parse(rest) {
            Ok(l) => l,
            Err(_) => return Err(self.fail(MathError::new(ErrorKind::InvalidToken))),
        };
        let value = std::str::from_utf8(literal)
            .ok()
            .and_then(|s| s.parse::<f64>().ok());

        match value {
            Some(v) => Ok(Lexeme::Token(TokenKind::Number(v), literal.len())),
            None => Err(self.fail(MathError::new(ErrorKind::InvalidToken))),
        }
    }

    fn keyword(&self) -> Option<Lexeme> {
        let bytes = self.bytes;
        let rest = &bytes[self.pos..];
        KEYWORDS
            .iter()
            .find(|(word, _)| rest.starts_with(word.as_bytes()))
            .map(|(word, kind)| Lexeme::Token(kind.clone(), word.len()))
    }

    /// Maximal run of name code points starting with `first`
    fn variable(&self, first: char) -> Lexeme {
        let mut name = String::new();
        let mut len = 0;
        let mut next = Some(first);
        while let Some(c) = next.filter(|c| is_name_char(*c)) {
            name.push(c);
            len += c.len_utf8();
            next = decode_char(&self.bytes[self.pos + len..]);
        }

        Lexeme::Token(TokenKind::Variable(name), len)
    }

    fn next_lexeme(&mut self) -> Result<Lexeme> {
        let byte = self.bytes[self.pos];
        if byte.is_ascii_digit() || byte == b'.' {
            return self.number();
        }

        if let Some(kind) = TokenKind::from_ascii(byte) {
            return Ok(Lexeme::Token(kind, 1));
        }

        if let Some(lexeme) = self.keyword() {
            return Ok(lexeme);
        }

        let c = match decode_char(&self.bytes[self.pos..]) {
            Some(c) => c,
            None => {
                return Err(self.fail(MathError::with_errno(
                    ErrorKind::InvalidUtf8,
                    Errno::EILSEQ,
                )))
            }
        };

        if c.is_whitespace() {
            return Ok(Lexeme::Space(c.len_utf8()));
        }

        if let Some(kind) = symbol(c) {
            return Ok(Lexeme::Token(kind.clone(), c.len_utf8()));
        }

        if c.is_alphabetic() {
            return Ok(self.variable(c));
        }

        Err(self.fail(MathError::new(ErrorKind::InvalidToken)))
    }

    fn push(&mut self, kind: TokenKind) -> Result<()> {
        if self.tokens.try_reserve(1).is_err() {
            return Err(self.fail(MathError::with_errno(ErrorKind::Memory, Errno::ENOMEM)));
        }

        trace!("token {} at {}", kind, self.pos);
        self.tokens.push(Token {
            kind,
            position: self.pos,
        });

        Ok(())
    }

    fn run(mut self) -> Result<Vec<Token>> {
        while self.pos < self.bytes.len() {
            if is_space(self.bytes[self.pos]) {
                self.pos += 1;
                continue;
            }

            let len = match self.next_lexeme()? {
                Lexeme::Space(len) => len,
                Lexeme::Token(kind, len) => {
                    self.push(kind)?;
                    len
                }
            };

            if len == 0 {
                error!("tokenizer made no progress at byte {}", self.pos);
                return Err(self.fail(MathError::new(ErrorKind::InvalidToken)));
            }
            self.pos += len;
        }

        debug!(
            "tokenized {} bytes into {} tokens",
            self.bytes.len(),
            self.tokens.len()
        );
        Ok(self.tokens)
    }
}

/// Split `text` into tokens
///
/// Starts a new cycle, so the error slot of `ctx` is reset first. Empty (or all whitespace) input
/// yields no tokens. On failure the error is also recorded in `ctx`.
pub fn tokenize<T: AsRef<[u8]> + ?Sized>(ctx: &mut Context, text: &T) -> Result<Vec<Token>> {
    ctx.clear_error();
    Tokenizer::new(ctx, text.as_ref()).run()
}

#[cfg(test)]
fn kinds(input: &str) -> Vec<TokenKind> {
    let mut ctx = Context::new();
    tokenize(&mut ctx, input)
        .expect("tokenize failed")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_number() {
    let data = vec![
        ("3.5", 3.5),
        ("0", 0.0),
        ("42", 42.0),
        ("12.", 12.0),
        (".5", 0.5),
        ("1e3", 1000.0),
        ("2.5E-1", 0.25),
        ("007", 7.0),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), vec![TokenKind::Number(expected)]);
    }
}

#[test]
fn test_number_stops_at_non_digit() {
    assert_eq!(
        kinds("2exp"),
        vec![TokenKind::Number(2.0), TokenKind::Keyword(Keyword::Exp)]
    );
    assert_eq!(
        kinds("1e"),
        vec![TokenKind::Number(1.0), TokenKind::Variable("e".to_string())]
    );
    assert_eq!(
        kinds("1.2.3"),
        vec![TokenKind::Number(1.2), TokenKind::Number(0.3)]
    );
}

#[test]
fn test_operators() {
    assert_eq!(
        kinds("3 * 7 + 5"),
        vec![
            TokenKind::Number(3.0),
            TokenKind::Multiply,
            TokenKind::Number(7.0),
            TokenKind::Add,
            TokenKind::Number(5.0),
        ]
    );
    assert_eq!(
        kinds("+-/*%!^_(){}[]"),
        vec![
            TokenKind::Add,
            TokenKind::Subtract,
            TokenKind::Divide,
            TokenKind::Multiply,
            TokenKind::Percent,
            TokenKind::Bang,
            TokenKind::Raise,
            TokenKind::Lower,
            TokenKind::OpenRound,
            TokenKind::ClosedRound,
            TokenKind::OpenCurly,
            TokenKind::ClosedCurly,
            TokenKind::OpenCorner,
            TokenKind::ClosedCorner,
        ]
    );
}

#[test]
fn test_keywords_longest_first() {
    let data = vec![
        ("log10", vec![TokenKind::Keyword(Keyword::Log10)]),
        ("log", vec![TokenKind::Keyword(Keyword::Log)]),
        ("sinh", vec![TokenKind::Keyword(Keyword::Sinh)]),
        ("asinh", vec![TokenKind::Keyword(Keyword::Asinh)]),
        ("xor", vec![TokenKind::Keyword(Keyword::Xor)]),
        (
            "sinx",
            vec![
                TokenKind::Keyword(Keyword::Sin),
                TokenKind::Variable("x".to_string()),
            ],
        ),
        (
            "log10log10",
            vec![
                TokenKind::Keyword(Keyword::Log10),
                TokenKind::Keyword(Keyword::Log10),
            ],
        ),
        ("PI", vec![TokenKind::Number(std::f64::consts::PI)]),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), expected);
    }
}

#[test]
fn test_truncated_keyword_is_variable() {
    // Only the full keyword text matches
    assert_eq!(kinds("si"), vec![TokenKind::Variable("si".to_string())]);
    assert_eq!(kinds("l"), vec![TokenKind::Variable("l".to_string())]);
}

#[test]
fn test_variables() {
    let data = vec![
        ("x", "x"),
        ("abc", "abc"),
        ("αβγ", "αβγ"),
        ("xsin", "xsin"),
    ];

    for (input, expected) in data {
        assert_eq!(kinds(input), vec![TokenKind::Variable(expected.to_string())]);
    }

    assert_eq!(
        kinds("x2"),
        vec![TokenKind::Variable("x".to_string()), TokenKind::Number(2.0)]
    );
}

#[test]
fn test_symbols() {
    assert_eq!(
        kinds("°∈∩∪ℝℂℤℕ↦⊆⇒"),
        vec![
            TokenKind::Degrees,
            TokenKind::ElementOf,
            TokenKind::Intersection,
            TokenKind::Union,
            TokenKind::RealNumbers,
            TokenKind::ComplexNumbers,
            TokenKind::Integers,
            TokenKind::NaturalNumbers,
            TokenKind::MapsTo,
            TokenKind::SubsetOf,
            TokenKind::Implies,
        ]
    );

    // Letter-like symbols end a variable name
    assert_eq!(
        kinds("xℝ"),
        vec![TokenKind::Variable("x".to_string()), TokenKind::RealNumbers]
    );
    assert_eq!(
        kinds("n∈ℕ"),
        vec![
            TokenKind::Variable("n".to_string()),
            TokenKind::ElementOf,
            TokenKind::NaturalNumbers,
        ]
    );
}

#[test]
fn test_positions() {
    let mut ctx = Context::new();
    let tokens = tokenize(&mut ctx, " 3 +\tx∈ 10").expect("tokenize failed");
    let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![1, 3, 5, 6, 10]);
}

#[test]
fn test_whitespace() {
    assert_eq!(kinds(""), vec![]);
    assert_eq!(kinds(" \t\r\n\x0b\x0c"), vec![]);
    assert_eq!(
        kinds("1\u{a0}2"),
        vec![TokenKind::Number(1.0), TokenKind::Number(2.0)]
    );
}

#[test]
fn test_invalid() {
    let data: Vec<(&[u8], ErrorKind, usize)> = vec![
        ("3 + ☃".as_bytes(), ErrorKind::InvalidToken, 4),
        ("?".as_bytes(), ErrorKind::InvalidToken, 0),
        ("1 + .".as_bytes(), ErrorKind::InvalidToken, 4),
        (&b"1 \xff"[..], ErrorKind::InvalidUtf8, 2),
        (&b"\xe2\x88"[..], ErrorKind::InvalidUtf8, 0),
    ];

    for (input, kind, position) in data {
        let mut ctx = Context::new();
        let err = tokenize(&mut ctx, input).expect_err("tokenize should fail");
        assert_eq!(err.kind, kind);
        assert_eq!(err.position, Some(position));
        assert_eq!(*ctx.error(), err);
    }
}

#[test]
fn test_invalid_utf8_carries_errno() {
    let mut ctx = Context::new();
    let err = tokenize(&mut ctx, b"\xc3(").expect_err("tokenize should fail");
    assert_eq!(err.errno, Some(Errno::EILSEQ));
    assert!(ctx.last_error().starts_with("the utf8 sequence is invalid: "));
}
