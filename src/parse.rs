use std::{
    fmt::{self, Display},
    rc::Rc,
};

use miette::{Diagnostic, Error, NamedSource, SourceSpan};
use thiserror::Error;

use crate::{
    Lexer, Source,
    lex::{Keyword, LexerOptions, Number, Operator, Token, TokenKind},
    line_number,
};

#[derive(Error, Debug, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(auron::parse))]
pub struct ParseError {
    #[source_code]
    src: NamedSource<String>,

    #[label("{label}")]
    bad_bit: SourceSpan,

    message: String,
    label: String,

    #[help]
    help: Option<String>,
}

impl ParseError {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> SourceSpan {
        self.bad_bit
    }

    pub fn line(&self) -> usize {
        line_number(self.src.inner(), self.bad_bit.offset())
    }
}

/// The statements of one source text, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub source: Rc<Source>,
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    VarAssign {
        name: String,
        value: TokenTree,
    },
    Print {
        value: TokenTree,
    },
    If {
        condition: TokenTree,
        then_branch: Vec<Node>,
        else_branch: Option<Vec<Node>>,
    },
    FunctionDecl(Rc<FunctionDecl>),
    FunctionCall {
        name: String,
        arguments: Vec<TokenTree>,
        span: SourceSpan,
    },
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
    /// Text the body was parsed from, so errors raised inside a call point at the declaration.
    pub source: Rc<Source>,
}

/// A prefix expression, kept unevaluated until the node holding it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Atom(Atom, SourceSpan),
    Cons(Operator, Vec<TokenTree>, SourceSpan),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Int(i64),
    Float(f64),
    String(String),
    Ident(String),
}

impl TokenTree {
    pub fn span(&self) -> SourceSpan {
        match self {
            TokenTree::Atom(_, span) | TokenTree::Cons(_, _, span) => *span,
        }
    }
}

fn cover(first: SourceSpan, last: SourceSpan) -> SourceSpan {
    SourceSpan::from(first.offset()..last.offset() + last.len())
}

pub struct Parser<'de> {
    source: Rc<Source>,
    lexer: Lexer<'de>,
}

impl<'de> Parser<'de> {
    pub fn new(filename: Option<&'de str>, whole: &'de str) -> Self {
        Self::with_options(filename, whole, LexerOptions::default())
    }

    pub fn with_options(filename: Option<&'de str>, whole: &'de str, options: LexerOptions) -> Self {
        Parser {
            source: Rc::new(Source::new(filename, whole)),
            lexer: Lexer::with_options(filename, whole, options),
        }
    }

    pub fn source(&self) -> Rc<Source> {
        Rc::clone(&self.source)
    }

    pub fn parse(mut self) -> Result<Program, Error> {
        let nodes = self.parse_statements(None)?;
        Ok(Program {
            source: self.source,
            nodes,
        })
    }

    /// Parses input holding exactly one expression.
    pub fn parse_expr(mut self) -> Result<TokenTree, Error> {
        let expr = self.parse_expression()?;
        let token = self.peek()?;
        if token.kind != TokenKind::Eof {
            return Err(self.error(
                &token,
                format!("Unexpected token '{}' after the expression", token.literal),
                "expected end of input here",
                None,
            ));
        }
        Ok(expr)
    }

    /// Statements up to end of input, or up to (not including) the `}` closing `open`.
    fn parse_statements(&mut self, open: Option<Token<'de>>) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::new();
        loop {
            let token = self.peek()?;
            match token.kind {
                TokenKind::Eof => {
                    if let Some(open) = open {
                        return Err(self.error(
                            &open,
                            "Unexpected end of file",
                            "this block is never closed",
                            Some("add a matching `}`"),
                        ));
                    }
                    break;
                }
                TokenKind::Operator(Operator::RightBrace) => {
                    if open.is_some() {
                        break;
                    }
                    return Err(self.error(
                        &token,
                        "Unexpected token '}'",
                        "no block is open here",
                        Some("remove this `}`"),
                    ));
                }
                TokenKind::Operator(Operator::Semicolon) => {
                    self.advance()?;
                }
                _ => nodes.push(self.parse_statement()?),
            }
        }
        Ok(nodes)
    }

    fn parse_statement(&mut self) -> Result<Node, Error> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Keyword(Keyword::Var | Keyword::Let) => {
                let name = self.expect(TokenKind::Ident, "Expected a variable name")?;
                self.expect(
                    TokenKind::Operator(Operator::Equal),
                    "Expected `=` after the variable name",
                )?;
                let value = self.parse_expression()?;
                self.expect(
                    TokenKind::Operator(Operator::Semicolon),
                    "Expected `;` after the assigned value",
                )?;
                Ok(Node::VarAssign {
                    name: name.literal.to_string(),
                    value,
                })
            }
            TokenKind::Keyword(Keyword::Print) => {
                self.expect(
                    TokenKind::Operator(Operator::LeftParen),
                    "Expected `(` after `print`",
                )?;
                let value = self.parse_expression()?;
                self.expect(
                    TokenKind::Operator(Operator::RightParen),
                    "Expected `)` after the printed value",
                )?;
                Ok(Node::Print { value })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Fn) => self.parse_function(),
            TokenKind::Ident => self.parse_call_or_assignment(token),
            TokenKind::Keyword(
                keyword @ (Keyword::While | Keyword::For | Keyword::Return | Keyword::Const),
            ) => Err(self.error(
                &token,
                format!("`{keyword}` is reserved but not supported"),
                "this keyword",
                None,
            )),
            _ => Err(self.error(
                &token,
                format!("Unexpected token '{}'", token.literal),
                "expected a statement here",
                Some("statements start with `var`, `let`, `print`, `if`, `fn` or a function name"),
            )),
        }
    }

    // `if` already consumed
    fn parse_if(&mut self) -> Result<Node, Error> {
        self.expect(
            TokenKind::Operator(Operator::LeftParen),
            "Expected `(` after `if`",
        )?;
        let condition = self.parse_expression()?;
        self.expect(
            TokenKind::Operator(Operator::RightParen),
            "Expected `)` after the condition",
        )?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.peek()?.kind == TokenKind::Keyword(Keyword::Else) {
            self.advance()?;
            if self.peek()?.kind == TokenKind::Keyword(Keyword::If) {
                self.advance()?;
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(Node::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    // `fn` already consumed
    fn parse_function(&mut self) -> Result<Node, Error> {
        let name = self.expect(TokenKind::Ident, "Expected a function name after `fn`")?;
        self.expect(
            TokenKind::Operator(Operator::LeftParen),
            "Expected `(` after the function name",
        )?;

        let mut params: Vec<String> = Vec::new();
        if self.peek()?.kind == TokenKind::Operator(Operator::RightParen) {
            self.advance()?;
        } else {
            loop {
                let param = self.expect(TokenKind::Ident, "Expected a parameter name")?;
                if params.iter().any(|p| p == param.literal) {
                    return Err(self.error(
                        &param,
                        format!("Duplicate parameter `{}`", param.literal),
                        "declared twice",
                        Some("rename one of the parameters"),
                    ));
                }
                params.push(param.literal.to_string());

                let separator = self.advance()?;
                match separator.kind {
                    TokenKind::Operator(Operator::Comma) => continue,
                    TokenKind::Operator(Operator::RightParen) => break,
                    _ => {
                        return Err(self.error(
                            &separator,
                            "Expected `,` or `)` in the parameter list",
                            "here",
                            None,
                        ));
                    }
                }
            }
        }

        let body = self.parse_block()?;
        Ok(Node::FunctionDecl(Rc::new(FunctionDecl {
            name: name.literal.to_string(),
            params,
            body,
            source: self.source(),
        })))
    }

    fn parse_call_or_assignment(&mut self, name: Token<'de>) -> Result<Node, Error> {
        let next = self.advance()?;
        match next.kind {
            TokenKind::Operator(Operator::LeftParen) => {
                let (arguments, close) = self.parse_arguments()?;
                Ok(Node::FunctionCall {
                    name: name.literal.to_string(),
                    arguments,
                    span: cover(name.span, close.span),
                })
            }
            TokenKind::Operator(op) if op.compound_base().is_some() => {
                let value = self.parse_expression()?;
                self.expect(
                    TokenKind::Operator(Operator::Semicolon),
                    "Expected `;` after the assigned value",
                )?;
                let base = op.compound_base().unwrap_or(op);
                let target = TokenTree::Atom(Atom::Ident(name.literal.to_string()), name.span);
                let span = cover(next.span, value.span());
                Ok(Node::VarAssign {
                    name: name.literal.to_string(),
                    value: TokenTree::Cons(base, vec![target, value], span),
                })
            }
            _ => Err(self.error(
                &next,
                format!("Expected `(` after `{}`", name.literal),
                "here",
                Some("a bare identifier is not a statement; call it as a function"),
            )),
        }
    }

    /// Comma-separated expressions after an already consumed `(`, with the closing `)`.
    fn parse_arguments(&mut self) -> Result<(Vec<TokenTree>, Token<'de>), Error> {
        let mut arguments = Vec::new();
        if self.peek()?.kind == TokenKind::Operator(Operator::RightParen) {
            let close = self.advance()?;
            return Ok((arguments, close));
        }
        loop {
            arguments.push(self.parse_expression()?);
            let separator = self.advance()?;
            match separator.kind {
                TokenKind::Operator(Operator::Comma) => continue,
                TokenKind::Operator(Operator::RightParen) => return Ok((arguments, separator)),
                _ => {
                    return Err(self.error(
                        &separator,
                        "Expected `,` or `)` in the argument list",
                        "here",
                        Some("expressions are prefix: write `+ a b`, not `a + b`"),
                    ));
                }
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Node>, Error> {
        let open = self.expect(
            TokenKind::Operator(Operator::LeftBrace),
            "Expected `{` to open a block",
        )?;
        let body = self.parse_statements(Some(open))?;
        self.expect(
            TokenKind::Operator(Operator::RightBrace),
            "Expected `}` to close the block",
        )?;
        Ok(body)
    }

    /// expr := NUMBER | STRING | IDENTIFIER | OP expr expr
    fn parse_expression(&mut self) -> Result<TokenTree, Error> {
        let token = self.advance()?;
        Ok(match token.kind {
            TokenKind::Number(Number::Int(n)) => TokenTree::Atom(Atom::Int(n), token.span),
            TokenKind::Number(Number::Float(n)) => TokenTree::Atom(Atom::Float(n), token.span),
            TokenKind::String => {
                TokenTree::Atom(Atom::String(token.literal.to_string()), token.span)
            }
            TokenKind::Ident => TokenTree::Atom(Atom::Ident(token.literal.to_string()), token.span),
            TokenKind::Operator(op) if !op.is_delimiter() => {
                let lhs = self.parse_expression()?;
                let rhs = self.parse_expression()?;
                let span = cover(token.span, rhs.span());
                TokenTree::Cons(op, vec![lhs, rhs], span)
            }
            TokenKind::Eof => {
                return Err(self.error(
                    &token,
                    "Unexpected end of file",
                    "expected an expression here",
                    None,
                ));
            }
            _ => {
                return Err(self.error(
                    &token,
                    format!("Invalid expression token '{}'", token.literal),
                    "expected a number, string, variable or prefix operator",
                    Some("expressions are prefix: write `+ a b`, not `a + b`"),
                ));
            }
        })
    }

    fn peek(&mut self) -> Result<Token<'de>, Error> {
        if matches!(self.lexer.peek(), Some(Err(_))) {
            if let Some(Err(e)) = self.lexer.next() {
                return Err(e);
            }
        }
        let eof = self.lexer.eof();
        match self.lexer.peek() {
            Some(Ok(token)) => Ok(*token),
            _ => Ok(eof),
        }
    }

    fn advance(&mut self) -> Result<Token<'de>, Error> {
        match self.lexer.next() {
            Some(token) => token,
            None => Ok(self.lexer.eof()),
        }
    }

    fn expect(&mut self, expected: TokenKind, error: &str) -> Result<Token<'de>, Error> {
        let token = self.advance()?;
        if token.kind == expected {
            return Ok(token);
        }
        let label = match token.kind {
            TokenKind::Eof => "input ends here",
            _ => "here",
        };
        let help = format!("use {} here instead", expected.describe());
        Err(self.error(&token, error, label, Some(&help)))
    }

    fn error(
        &self,
        token: &Token<'_>,
        message: impl Into<String>,
        label: impl Into<String>,
        help: Option<&str>,
    ) -> Error {
        // point at the last character when the input simply ran out
        let end = token.span.offset();
        let span = if token.span.is_empty() && end > 0 {
            let last = self.source.text()[..end]
                .chars()
                .next_back()
                .map_or(1, char::len_utf8);
            SourceSpan::from(end - last..end)
        } else {
            token.span
        };
        ParseError {
            src: self.source.named(),
            bad_bit: span,
            message: message.into(),
            label: label.into(),
            help: help.map(str::to_string),
        }
        .into()
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(n) => write!(f, "{}", Number::Int(*n)),
            Atom::Float(n) => write!(f, "{}", Number::Float(*n)),
            Atom::String(s) => write!(f, "\"{s}\""),
            Atom::Ident(name) => write!(f, "{name}"),
        }
    }
}

impl Display for TokenTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenTree::Atom(atom, _) => write!(f, "{atom}"),
            TokenTree::Cons(op, operands, _) => {
                write!(f, "({op}")?;
                for operand in operands {
                    write!(f, " {operand}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    write!(f, "{{")?;
    for node in nodes {
        write!(f, " {node}")?;
    }
    write!(f, " }}")
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::VarAssign { name, value } => write!(f, "var {name} = {value};"),
            Node::Print { value } => write!(f, "print({value});"),
            Node::If {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({condition}) ")?;
                write_block(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    write!(f, " else ")?;
                    write_block(f, else_branch)?;
                }
                Ok(())
            }
            Node::FunctionDecl(decl) => {
                write!(f, "fn {}({}) ", decl.name, decl.params.join(", "))?;
                write_block(f, &decl.body)
            }
            Node::FunctionCall {
                name, arguments, ..
            } => {
                write!(f, "{name}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ");")
            }
        }
    }
}
