use std::fmt::Display;

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

use crate::line_number;

#[derive(Error, Debug, Diagnostic)]
pub enum LexError {
    #[error("Unexpected character '{token}'")]
    #[diagnostic(
        code(auron::lex::unexpected_character),
        help("remove or correct this character")
    )]
    UnexpectedCharacter {
        #[source_code]
        src: NamedSource<String>,

        #[label("this character")]
        bad_bit: SourceSpan,

        token: char,
    },

    #[error("unterminated double quote string")]
    #[diagnostic(code(auron::lex::unterminated_string))]
    UnterminatedString {
        #[source_code]
        src: NamedSource<String>,

        #[label("Missing trailing `\"` symbol to terminate the string literal")]
        bad_bit: SourceSpan,
    },

    #[error("unterminated block comment")]
    #[diagnostic(code(auron::lex::unterminated_comment))]
    UnterminatedComment {
        #[source_code]
        src: NamedSource<String>,

        #[label("this comment is never closed with `*/`")]
        bad_bit: SourceSpan,
    },

    #[error("invalid numeric literal: {reason}")]
    #[diagnostic(code(auron::lex::invalid_number))]
    InvalidNumber {
        #[source_code]
        src: NamedSource<String>,

        #[label("this numeric literal")]
        bad_bit: SourceSpan,

        reason: String,
    },
}

impl LexError {
    pub fn span(&self) -> SourceSpan {
        match self {
            LexError::UnexpectedCharacter { bad_bit, .. }
            | LexError::UnterminatedString { bad_bit, .. }
            | LexError::UnterminatedComment { bad_bit, .. }
            | LexError::InvalidNumber { bad_bit, .. } => *bad_bit,
        }
    }

    pub fn line(&self) -> usize {
        let src = match self {
            LexError::UnexpectedCharacter { src, .. }
            | LexError::UnterminatedString { src, .. }
            | LexError::UnterminatedComment { src, .. }
            | LexError::InvalidNumber { src, .. } => src,
        };
        line_number(src.inner(), self.span().offset())
    }
}

/// Which of the optional lexical forms are recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerOptions {
    /// `/* ... */` comments.
    pub block_comments: bool,
    /// A backslash inside a string skips the character after it.
    pub string_escapes: bool,
    /// `+=`, `-=`, `*=` and `/=`.
    pub compound_assignment: bool,
    /// Decode every numeric literal as a float.
    pub float_numbers: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        LexerOptions {
            block_comments: false,
            string_escapes: true,
            compound_assignment: false,
            float_numbers: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'de> {
    pub kind: TokenKind,
    pub literal: &'de str,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident,
    Number(Number),
    String,
    Operator(Operator),
    Eof,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Keyword(keyword) => format!("`{keyword}`"),
            TokenKind::Ident => "an identifier".to_string(),
            TokenKind::Number(_) => "a number".to_string(),
            TokenKind::String => "a string".to_string(),
            TokenKind::Operator(op) => format!("`{op}`"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(n) if n.is_finite() && *n == n.trunc() => write!(f, "{n}.0"),
            Number::Float(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    While,
    For,
    Fn,
    Return,
    Var,
    Let,
    Const,
    Print,
}

impl Keyword {
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        Some(match ident {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "while" => Keyword::While,
            "for" => Keyword::For,
            "fn" => Keyword::Fn,
            "return" => Keyword::Return,
            "var" => Keyword::Var,
            "let" => Keyword::Let,
            "const" => Keyword::Const,
            "print" => Keyword::Print,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::Fn => "fn",
            Keyword::Return => "return",
            Keyword::Var => "var",
            Keyword::Let => "let",
            Keyword::Const => "const",
            Keyword::Print => "print",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Semicolon,
    Comma,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Star => "*",
            Operator::Slash => "/",
            Operator::Equal => "=",
            Operator::EqualEqual => "==",
            Operator::BangEqual => "!=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::PlusEqual => "+=",
            Operator::MinusEqual => "-=",
            Operator::StarEqual => "*=",
            Operator::SlashEqual => "/=",
            Operator::LeftParen => "(",
            Operator::RightParen => ")",
            Operator::LeftBrace => "{",
            Operator::RightBrace => "}",
            Operator::Semicolon => ";",
            Operator::Comma => ",",
        }
    }

    /// Punctuation that structures statements and can never start an expression.
    pub fn is_delimiter(&self) -> bool {
        matches!(
            self,
            Operator::LeftParen
                | Operator::RightParen
                | Operator::LeftBrace
                | Operator::RightBrace
                | Operator::Semicolon
                | Operator::Comma
        )
    }

    /// The arithmetic operator a compound assignment applies, `+` for `+=` and so on.
    pub fn compound_base(&self) -> Option<Operator> {
        match self {
            Operator::PlusEqual => Some(Operator::Plus),
            Operator::MinusEqual => Some(Operator::Minus),
            Operator::StarEqual => Some(Operator::Star),
            Operator::SlashEqual => Some(Operator::Slash),
            _ => None,
        }
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.literal;
        match self.kind {
            TokenKind::Keyword(_) => write!(f, "KEYWORD {lit} null"),
            TokenKind::Ident => write!(f, "IDENTIFIER {lit} null"),
            TokenKind::Number(n) => write!(f, "NUMBER {lit} {n}"),
            TokenKind::String => write!(f, "STRING \"{lit}\" {lit}"),
            TokenKind::Operator(_) => write!(f, "OPERATOR {lit} null"),
            TokenKind::Eof => write!(f, "EOF  null"),
        }
    }
}

pub struct Lexer<'de> {
    filename: Option<&'de str>,
    whole: &'de str,
    rest: &'de str,
    pub byte: usize,
    options: LexerOptions,
    peeked: Option<Result<Token<'de>, Error>>,
}

impl<'de> Lexer<'de> {
    pub fn new(filename: Option<&'de str>, input: &'de str) -> Self {
        Self::with_options(filename, input, LexerOptions::default())
    }

    pub fn with_options(filename: Option<&'de str>, input: &'de str, options: LexerOptions) -> Self {
        Lexer {
            filename,
            whole: input,
            rest: input,
            byte: 0,
            options,
            peeked: None,
        }
    }

    pub fn peek(&mut self) -> Option<&Result<Token<'de>, Error>> {
        if self.peeked.is_some() {
            return self.peeked.as_ref();
        }
        self.peeked = self.next();
        self.peeked.as_ref()
    }

    /// The sentinel handed out once the input is exhausted; never yielded by the iterator itself.
    pub fn eof(&self) -> Token<'de> {
        let end = self.whole.len();
        Token {
            kind: TokenKind::Eof,
            literal: &self.whole[end..],
            span: SourceSpan::from(end..end),
        }
    }

    /// Scans the whole input, stopping at the first error.
    pub fn tokenize(self) -> Result<Vec<Token<'de>>, Error> {
        self.collect()
    }

    fn named_source(&self) -> NamedSource<String> {
        NamedSource::new(self.filename.unwrap_or("<input>"), self.whole.to_string())
    }

    fn operator_pair(&mut self, cur: &'de str, start: usize, op: Operator) -> Token<'de> {
        self.rest = &self.rest[1..];
        self.byte += 1;
        Token {
            kind: TokenKind::Operator(op),
            literal: &cur[..2],
            span: SourceSpan::from(start..self.byte),
        }
    }

    fn skip_to_end(&mut self) {
        self.byte = self.whole.len();
        self.rest = &self.whole[self.whole.len()..];
    }
}

impl<'de> Iterator for Lexer<'de> {
    type Item = Result<Token<'de>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(peeked) = self.peeked.take() {
            return Some(peeked);
        }
        loop {
            let mut chars = self.rest.chars();
            let c = chars.next()?;
            let start = self.byte;
            let cur = self.rest;
            let literal = &cur[..c.len_utf8()];
            self.rest = chars.as_str();
            self.byte += c.len_utf8();

            enum Start {
                String,
                Slash,
                Ident,
                Number,
                IfEqualElse(Operator, Operator),
            }

            let process = |op: Operator| {
                Some(Ok(Token {
                    kind: TokenKind::Operator(op),
                    literal,
                    span: SourceSpan::from(start..start + literal.len()),
                }))
            };
            let compound = self.options.compound_assignment;

            let started = match c {
                '(' => return process(Operator::LeftParen),
                ')' => return process(Operator::RightParen),
                '{' => return process(Operator::LeftBrace),
                '}' => return process(Operator::RightBrace),
                ',' => return process(Operator::Comma),
                ';' => return process(Operator::Semicolon),
                '+' if compound => Start::IfEqualElse(Operator::PlusEqual, Operator::Plus),
                '-' if compound => Start::IfEqualElse(Operator::MinusEqual, Operator::Minus),
                '*' if compound => Start::IfEqualElse(Operator::StarEqual, Operator::Star),
                '+' => return process(Operator::Plus),
                '-' => return process(Operator::Minus),
                '*' => return process(Operator::Star),
                '/' => Start::Slash,
                '=' => Start::IfEqualElse(Operator::EqualEqual, Operator::Equal),
                '<' => Start::IfEqualElse(Operator::LessEqual, Operator::Less),
                '>' => Start::IfEqualElse(Operator::GreaterEqual, Operator::Greater),
                '!' if self.rest.starts_with('=') => {
                    return Some(Ok(self.operator_pair(cur, start, Operator::BangEqual)));
                }
                '#' => {
                    let new_line = self.rest.find('\n').unwrap_or(self.rest.len());
                    self.byte += new_line;
                    self.rest = &self.rest[new_line..];
                    continue; // Skip line comment
                }
                '0'..='9' => Start::Number,
                '"' => Start::String,
                c if c.is_alphabetic() || c == '_' => Start::Ident,
                c if c.is_whitespace() => continue,
                c => {
                    return Some(Err(LexError::UnexpectedCharacter {
                        src: self.named_source(),
                        bad_bit: SourceSpan::from(start..self.byte),
                        token: c,
                    }
                    .into()));
                }
            };

            match started {
                Start::String => {
                    let rest = self.rest;
                    let mut end = None;
                    let mut chars = rest.char_indices();
                    while let Some((i, ch)) = chars.next() {
                        match ch {
                            '\\' if self.options.string_escapes => {
                                chars.next();
                            }
                            '"' => {
                                end = Some(i);
                                break;
                            }
                            _ => {}
                        }
                    }

                    let Some(end) = end else {
                        let err = LexError::UnterminatedString {
                            src: self.named_source(),
                            bad_bit: SourceSpan::from(start..self.whole.len()),
                        };
                        self.skip_to_end();
                        return Some(Err(err.into()));
                    };

                    let literal = &rest[..end];
                    self.byte += end + 1;
                    self.rest = &rest[end + 1..];
                    return Some(Ok(Token {
                        kind: TokenKind::String,
                        literal,
                        span: SourceSpan::from(start..self.byte),
                    }));
                }
                Start::Slash => {
                    if self.options.block_comments && self.rest.starts_with('*') {
                        match self.rest[1..].find("*/") {
                            Some(end) => {
                                let skipped = 1 + end + 2;
                                self.byte += skipped;
                                self.rest = &self.rest[skipped..];
                                continue;
                            }
                            None => {
                                let err = LexError::UnterminatedComment {
                                    src: self.named_source(),
                                    bad_bit: SourceSpan::from(start..self.whole.len()),
                                };
                                self.skip_to_end();
                                return Some(Err(err.into()));
                            }
                        }
                    }
                    if compound && self.rest.starts_with('=') {
                        return Some(Ok(self.operator_pair(cur, start, Operator::SlashEqual)));
                    }
                    return process(Operator::Slash);
                }
                Start::Ident => {
                    let first_non_ident = cur
                        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_ident];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    let kind = Keyword::from_ident(literal).map_or(TokenKind::Ident, TokenKind::Keyword);

                    return Some(Ok(Token {
                        kind,
                        literal,
                        span: SourceSpan::from(start..self.byte),
                    }));
                }
                Start::Number => {
                    // digits with at most one decimal point; a second `.` ends the literal
                    let mut seen_dot = false;
                    let first_non_digit = cur
                        .find(|c: char| match c {
                            '0'..='9' => false,
                            '.' if !seen_dot => {
                                seen_dot = true;
                                false
                            }
                            _ => true,
                        })
                        .unwrap_or(cur.len());

                    let literal = &cur[..first_non_digit];

                    let extra_bytes = literal.len() - c.len_utf8();
                    self.byte += extra_bytes;
                    self.rest = &self.rest[extra_bytes..];

                    let number = if self.options.float_numbers || literal.contains('.') {
                        literal
                            .parse()
                            .map(Number::Float)
                            .map_err(|e: std::num::ParseFloatError| e.to_string())
                    } else {
                        literal
                            .parse()
                            .map(Number::Int)
                            .map_err(|e: std::num::ParseIntError| e.to_string())
                    };

                    return Some(match number {
                        Ok(n) => Ok(Token {
                            kind: TokenKind::Number(n),
                            literal,
                            span: SourceSpan::from(start..self.byte),
                        }),
                        Err(reason) => Err(LexError::InvalidNumber {
                            src: self.named_source(),
                            bad_bit: SourceSpan::from(start..self.byte),
                            reason,
                        }
                        .into()),
                    });
                }
                Start::IfEqualElse(yes, no) => {
                    if self.rest.starts_with('=') {
                        return Some(Ok(self.operator_pair(cur, start, yes)));
                    }
                    return process(no);
                }
            }
        }
    }
}
