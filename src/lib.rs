use miette::{Error, IntoDiagnostic, NamedSource};

pub mod eval;
pub mod lex;
pub mod parse;

pub use eval::{Interpreter, InterpreterOptions, UnboundVariables, Value};
pub use lex::{Lexer, LexerOptions};
pub use parse::Parser;

/// Source text together with the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    name: String,
    text: String,
}

impl Source {
    pub fn new(filename: Option<&str>, text: &str) -> Self {
        Source {
            name: filename.unwrap_or("<input>").to_string(),
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.text.clone())
    }
}

/// Which stage of the pipeline rejected a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Eval,
    Name,
}

pub fn error_kind(error: &Error) -> Option<ErrorKind> {
    if error.downcast_ref::<lex::LexError>().is_some() {
        Some(ErrorKind::Lex)
    } else if error.downcast_ref::<parse::ParseError>().is_some() {
        Some(ErrorKind::Parse)
    } else if error.downcast_ref::<eval::EvalError>().is_some() {
        Some(ErrorKind::Eval)
    } else if error.downcast_ref::<eval::NameError>().is_some() {
        Some(ErrorKind::Name)
    } else {
        None
    }
}

/// Lexes, parses and runs `whole` in a fresh interpreter, returning everything it printed.
pub fn run(whole: &str) -> Result<String, Error> {
    let mut interpreter = Interpreter::with_output(Vec::new());
    interpreter.run_source(None, whole)?;
    String::from_utf8(interpreter.into_output()).into_diagnostic()
}

pub(crate) fn line_number(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
