use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use auron::lex::LexError;
use auron::{ErrorKind, Interpreter, InterpreterOptions, Lexer, LexerOptions, UnboundVariables};
use clap::Parser;
use clap::Subcommand;
use miette::IntoDiagnostic;
use miette::WrapErr;

#[derive(Parser, Debug)]
#[command(version, about = "Lexer, parser and interpreter for the Auron scripting language")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    dialect: Dialect,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print every token of the file
    Tokenize { filename: PathBuf },
    /// Print the parsed statements of the file
    Parse { filename: PathBuf },
    /// Execute the file
    Run { filename: PathBuf },
}

#[derive(Debug, clap::Args)]
struct Dialect {
    /// Accept `/* ... */` block comments
    #[arg(long, global = true)]
    block_comments: bool,

    /// Treat backslashes in strings as ordinary characters
    #[arg(long, global = true)]
    no_escapes: bool,

    /// Accept `+=`, `-=`, `*=` and `/=`
    #[arg(long, global = true)]
    compound_assignment: bool,

    /// Read every numeric literal as a float
    #[arg(long, global = true)]
    float_numbers: bool,

    /// Fail on variables that were never assigned instead of reading them as 0
    #[arg(long, global = true)]
    strict: bool,
}

impl Dialect {
    fn lexer_options(&self) -> LexerOptions {
        LexerOptions {
            block_comments: self.block_comments,
            string_escapes: !self.no_escapes,
            compound_assignment: self.compound_assignment,
            float_numbers: self.float_numbers,
        }
    }

    fn interpreter_options(&self) -> InterpreterOptions {
        InterpreterOptions {
            lexer: self.lexer_options(),
            unbound: if self.strict {
                UnboundVariables::Error
            } else {
                UnboundVariables::Zero
            },
        }
    }
}

fn main() -> miette::Result<()> {
    let args = Args::parse();
    let dialect = &args.dialect;

    match &args.command {
        Commands::Tokenize { filename } => {
            let file_contents = read(filename)?;

            let lexer = Lexer::with_options(filename.to_str(), &file_contents, dialect.lexer_options());
            for token in lexer {
                match token {
                    Ok(token) => println!("{token}"),
                    Err(e) => fail(e),
                }
            }
            println!("EOF  null");
        }
        Commands::Parse { filename } => {
            let file_contents = read(filename)?;

            let program =
                auron::Parser::with_options(filename.to_str(), &file_contents, dialect.lexer_options())
                    .parse()
                    .unwrap_or_else(|e| fail(e));
            for node in &program.nodes {
                println!("{node}");
            }
        }
        Commands::Run { filename } => {
            let file_contents = read(filename)?;

            let mut interpreter = Interpreter::new().with_options(dialect.interpreter_options());
            if let Err(e) = interpreter.run_source(filename.to_str(), &file_contents) {
                fail(e);
            }
        }
    }
    Ok(())
}

fn read(filename: &Path) -> miette::Result<String> {
    fs::read_to_string(filename)
        .into_diagnostic()
        .wrap_err_with(|| format!("reading `{}` failed", filename.display()))
}

/// Reports a fatal error and exits: 65 for malformed source, 70 for runtime failures.
fn fail(e: miette::Error) -> ! {
    let code = match auron::error_kind(&e) {
        Some(ErrorKind::Lex) => {
            if let Some(lex_error) = e.downcast_ref::<LexError>() {
                eprintln!("[line {}] Error: {lex_error}", lex_error.line());
            }
            65
        }
        Some(ErrorKind::Parse) => 65,
        Some(ErrorKind::Eval | ErrorKind::Name) => 70,
        None => 1,
    };
    eprintln!("{e:?}");
    process::exit(code);
}
