use std::{
    cmp::Ordering,
    collections::HashMap,
    fmt::Display,
    io::{self, Stdout, Write},
    mem,
    rc::Rc,
};

use miette::{Diagnostic, Error, IntoDiagnostic, NamedSource, SourceSpan, miette};
use thiserror::Error;

use crate::{
    Parser, Source,
    lex::{LexerOptions, Number, Operator},
    line_number,
    parse::{Atom, FunctionDecl, Node, Program, TokenTree},
};

#[derive(Error, Debug, Diagnostic)]
pub enum EvalError {
    #[error("Division by zero")]
    #[diagnostic(code(auron::eval::division_by_zero))]
    DivisionByZero {
        #[source_code]
        src: NamedSource<String>,

        #[label("this divisor is zero")]
        bad_bit: SourceSpan,
    },

    #[error("`{op}` cannot be applied to {lhs} and {rhs}")]
    #[diagnostic(
        code(auron::eval::type_mismatch),
        help("arithmetic needs numbers; only `+` also joins two strings")
    )]
    TypeMismatch {
        #[source_code]
        src: NamedSource<String>,

        #[label("in this expression")]
        bad_bit: SourceSpan,

        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("Unknown operator `{op}`")]
    #[diagnostic(code(auron::eval::unknown_operator))]
    UnknownOperator {
        #[source_code]
        src: NamedSource<String>,

        #[label("not an arithmetic or comparison operator")]
        bad_bit: SourceSpan,

        op: String,
    },

    #[error("Integer overflow in `{op}`")]
    #[diagnostic(code(auron::eval::overflow))]
    Overflow {
        #[source_code]
        src: NamedSource<String>,

        #[label("result does not fit in 64 bits")]
        bad_bit: SourceSpan,

        op: String,
    },
}

impl EvalError {
    pub fn line(&self) -> usize {
        let (src, bad_bit) = match self {
            EvalError::DivisionByZero { src, bad_bit }
            | EvalError::TypeMismatch { src, bad_bit, .. }
            | EvalError::UnknownOperator { src, bad_bit, .. }
            | EvalError::Overflow { src, bad_bit, .. } => (src, bad_bit),
        };
        line_number(src.inner(), bad_bit.offset())
    }
}

#[derive(Error, Debug, Diagnostic)]
pub enum NameError {
    #[error("Function `{name}` is not defined")]
    #[diagnostic(
        code(auron::name::undefined_function),
        help("functions can only be called after their declaration has run")
    )]
    UndefinedFunction {
        #[source_code]
        src: NamedSource<String>,

        #[label("called here")]
        bad_bit: SourceSpan,

        name: String,
    },

    #[error("Function `{name}` expects {expected} arguments but got {found}")]
    #[diagnostic(code(auron::name::arity_mismatch))]
    ArityMismatch {
        #[source_code]
        src: NamedSource<String>,

        #[label("called here")]
        bad_bit: SourceSpan,

        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Variable `{name}` is not defined")]
    #[diagnostic(code(auron::name::undefined_variable))]
    UndefinedVariable {
        #[source_code]
        src: NamedSource<String>,

        #[label("never assigned")]
        bad_bit: SourceSpan,

        name: String,
    },
}

impl NameError {
    pub fn line(&self) -> usize {
        let (src, bad_bit) = match self {
            NameError::UndefinedFunction { src, bad_bit, .. }
            | NameError::ArityMismatch { src, bad_bit, .. }
            | NameError::UndefinedVariable { src, bad_bit, .. } => (src, bad_bit),
        };
        line_number(src.inner(), bad_bit.offset())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Value::Int(n) => *n == 0,
            Value::Float(n) => *n == 0.0,
            _ => false,
        }
    }

    /// Language equality: integers and floats compare by numeric value.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(l), Value::Float(r)) | (Value::Float(r), Value::Int(l)) => *l as f64 == *r,
            _ => self == other,
        }
    }

    fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
            _ => self.as_float()?.partial_cmp(&other.as_float()?),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", Number::Int(*n)),
            Value::Float(n) => write!(f, "{}", Number::Float(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// What reading a variable that was never assigned yields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnboundVariables {
    #[default]
    Zero,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpreterOptions {
    pub lexer: LexerOptions,
    pub unbound: UnboundVariables,
}

/// The single, flat variable table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    values: HashMap<String, Value>,
}

impl Environment {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn snapshot(&self) -> Environment {
        self.clone()
    }

    pub fn restore(&mut self, snapshot: Environment) {
        *self = snapshot;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct Interpreter<W = Stdout> {
    environment: Environment,
    functions: HashMap<String, Rc<FunctionDecl>>,
    options: InterpreterOptions,
    // text that spans in the currently executing nodes refer to
    source: Rc<Source>,
    out: W,
}

impl Interpreter<Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        Self {
            environment: Environment::default(),
            functions: HashMap::new(),
            options: InterpreterOptions::default(),
            source: Rc::new(Source::new(None, "")),
            out,
        }
    }

    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.environment.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name).map(Rc::as_ref)
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn run_source(&mut self, filename: Option<&str>, whole: &str) -> Result<(), Error> {
        let program = Parser::with_options(filename, whole, self.options.lexer).parse()?;
        self.run(&program)
    }

    pub fn run(&mut self, program: &Program) -> Result<(), Error> {
        let previous = mem::replace(&mut self.source, Rc::clone(&program.source));
        let result = self.run_nodes(&program.nodes);
        self.source = previous;
        result
    }

    /// Parses `whole` as a single expression and evaluates it against the current tables.
    pub fn eval_expr(&mut self, whole: &str) -> Result<Value, Error> {
        let parser = Parser::with_options(None, whole, self.options.lexer);
        let source = parser.source();
        let expr = parser.parse_expr()?;

        let previous = mem::replace(&mut self.source, source);
        let value = self.evaluate_expression(&expr);
        self.source = previous;
        value
    }

    fn run_nodes(&mut self, nodes: &[Node]) -> Result<(), Error> {
        for node in nodes {
            #[cfg(feature = "trace_execution")]
            eprintln!("[trace] {node}");

            match node {
                Node::VarAssign { name, value } => {
                    let value = self.evaluate_expression(value)?;
                    self.environment.define(name.as_str(), value);
                }
                Node::Print { value } => {
                    let value = self.evaluate_expression(value)?;
                    writeln!(self.out, "{value}").into_diagnostic()?;
                }
                Node::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    if self.evaluate_expression(condition)?.is_truthy() {
                        self.run_nodes(then_branch)?;
                    } else if let Some(else_branch) = else_branch {
                        self.run_nodes(else_branch)?;
                    }
                }
                Node::FunctionDecl(decl) => {
                    self.functions.insert(decl.name.clone(), Rc::clone(decl));
                }
                Node::FunctionCall {
                    name,
                    arguments,
                    span,
                } => self.call_function(name, arguments, *span)?,
            }
        }
        Ok(())
    }

    /// Arguments are evaluated in the caller's scope; the callee then sees the whole variable
    /// table with its parameters bound on top, and the table is put back wholesale on return.
    fn call_function(
        &mut self,
        name: &str,
        arguments: &[TokenTree],
        span: SourceSpan,
    ) -> Result<(), Error> {
        let values = arguments
            .iter()
            .map(|argument| self.evaluate_expression(argument))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(decl) = self.functions.get(name).cloned() else {
            return Err(NameError::UndefinedFunction {
                src: self.source.named(),
                bad_bit: span,
                name: name.to_string(),
            }
            .into());
        };
        if values.len() != decl.params.len() {
            return Err(NameError::ArityMismatch {
                src: self.source.named(),
                bad_bit: span,
                name: name.to_string(),
                expected: decl.params.len(),
                found: values.len(),
            }
            .into());
        }

        #[cfg(feature = "trace_execution")]
        eprintln!("[trace] enter {name}");

        let saved = self.environment.snapshot();
        for (param, value) in decl.params.iter().zip(values) {
            self.environment.define(param.as_str(), value);
        }

        let caller = mem::replace(&mut self.source, Rc::clone(&decl.source));
        let result = self.run_nodes(&decl.body);
        self.source = caller;
        self.environment.restore(saved);
        result?;

        #[cfg(feature = "trace_execution")]
        eprintln!("[trace] leave {name}");

        Ok(())
    }

    pub fn evaluate_expression(&mut self, expr: &TokenTree) -> Result<Value, Error> {
        match expr {
            TokenTree::Atom(atom, span) => Ok(match atom {
                Atom::Int(n) => Value::Int(*n),
                Atom::Float(n) => Value::Float(*n),
                Atom::String(s) => Value::Str(s.clone()),
                Atom::Ident(name) => match self.environment.get(name) {
                    Some(value) => value.clone(),
                    None => match self.options.unbound {
                        UnboundVariables::Zero => Value::Int(0),
                        UnboundVariables::Error => {
                            return Err(NameError::UndefinedVariable {
                                src: self.source.named(),
                                bad_bit: *span,
                                name: name.clone(),
                            }
                            .into());
                        }
                    },
                },
            }),
            TokenTree::Cons(op, operands, span) => {
                let [lhs, rhs] = operands.as_slice() else {
                    return Err(miette!(
                        "`{op}` expects exactly two operands, got {}",
                        operands.len()
                    ));
                };
                let left = self.evaluate_expression(lhs)?;
                let right = self.evaluate_expression(rhs)?;
                self.apply_operator(*op, left, right, *span, rhs.span())
            }
        }
    }

    fn apply_operator(
        &self,
        op: Operator,
        lhs: Value,
        rhs: Value,
        span: SourceSpan,
        rhs_span: SourceSpan,
    ) -> Result<Value, Error> {
        let mismatch = |lhs: &Value, rhs: &Value| -> Error {
            EvalError::TypeMismatch {
                src: self.source.named(),
                bad_bit: span,
                op: op.to_string(),
                lhs: lhs.type_name(),
                rhs: rhs.type_name(),
            }
            .into()
        };

        Ok(match op {
            Operator::Plus | Operator::Minus | Operator::Star => match (&lhs, &rhs) {
                (Value::Str(l), Value::Str(r)) if op == Operator::Plus => Value::Str(format!("{l}{r}")),
                (Value::Int(l), Value::Int(r)) => {
                    let result = match op {
                        Operator::Plus => l.checked_add(*r),
                        Operator::Minus => l.checked_sub(*r),
                        _ => l.checked_mul(*r),
                    };
                    let Some(result) = result else {
                        return Err(EvalError::Overflow {
                            src: self.source.named(),
                            bad_bit: span,
                            op: op.to_string(),
                        }
                        .into());
                    };
                    Value::Int(result)
                }
                _ => match (lhs.as_float(), rhs.as_float()) {
                    (Some(l), Some(r)) => Value::Float(match op {
                        Operator::Plus => l + r,
                        Operator::Minus => l - r,
                        _ => l * r,
                    }),
                    _ => return Err(mismatch(&lhs, &rhs)),
                },
            },
            Operator::Slash => {
                if rhs.is_zero() {
                    return Err(EvalError::DivisionByZero {
                        src: self.source.named(),
                        bad_bit: rhs_span,
                    }
                    .into());
                }
                match (lhs.as_float(), rhs.as_float()) {
                    (Some(l), Some(r)) => Value::Float(l / r),
                    _ => return Err(mismatch(&lhs, &rhs)),
                }
            }
            Operator::EqualEqual => Value::Bool(lhs.equals(&rhs)),
            Operator::BangEqual => Value::Bool(!lhs.equals(&rhs)),
            Operator::Less | Operator::LessEqual | Operator::Greater | Operator::GreaterEqual => {
                let Some(ordering) = lhs.compare(&rhs) else {
                    // NaN is unordered against every number
                    if lhs.as_float().is_some() && rhs.as_float().is_some() {
                        return Ok(Value::Bool(false));
                    }
                    return Err(mismatch(&lhs, &rhs));
                };
                Value::Bool(match op {
                    Operator::Less => ordering.is_lt(),
                    Operator::LessEqual => ordering.is_le(),
                    Operator::Greater => ordering.is_gt(),
                    _ => ordering.is_ge(),
                })
            }
            _ => {
                return Err(EvalError::UnknownOperator {
                    src: self.source.named(),
                    bad_bit: span,
                    op: op.to_string(),
                }
                .into());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpreter(options: InterpreterOptions) -> Interpreter<Vec<u8>> {
        Interpreter::with_output(Vec::new()).with_options(options)
    }

    fn printed(interpreter: &Interpreter<Vec<u8>>) -> String {
        String::from_utf8_lossy(interpreter.output()).into_owned()
    }

    fn run(input: &str) -> (Interpreter<Vec<u8>>, Result<(), Error>) {
        let mut interpreter = interpreter(InterpreterOptions::default());
        let result = interpreter.run_source(None, input);
        (interpreter, result)
    }

    fn output(input: &str) -> String {
        let (interpreter, result) = run(input);
        result.unwrap();
        printed(&interpreter)
    }

    fn eval(input: &str) -> Result<Value, Error> {
        interpreter(InterpreterOptions::default()).eval_expr(input)
    }

    fn eval_error(input: &str) -> EvalError {
        eval(input).unwrap_err().downcast::<EvalError>().unwrap()
    }

    fn name_error(input: &str) -> NameError {
        let (_, result) = run(input);
        result.unwrap_err().downcast::<NameError>().unwrap()
    }

    #[test]
    fn assignment_then_lookup() {
        let (mut interpreter, result) = run("var x = + 2 3;");
        result.unwrap();
        assert_eq!(interpreter.variable("x"), Some(&Value::Int(5)));
        assert_eq!(interpreter.eval_expr("x").unwrap(), Value::Int(5));
    }

    #[test]
    fn reassignment_overwrites() {
        let (interpreter, result) = run("var x = 1; var x = \"two\";");
        result.unwrap();
        assert_eq!(interpreter.variable("x"), Some(&Value::Str("two".to_string())));
        assert_eq!(interpreter.environment().len(), 1);
    }

    #[test]
    fn if_takes_the_true_branch() {
        assert_eq!(
            output("if ( > 5 3 ) { print(\"yes\"); } else { print(\"no\"); }"),
            "yes\n"
        );
        assert_eq!(
            output("if ( < 5 3 ) { print(\"yes\"); } else { print(\"no\"); }"),
            "no\n"
        );
        assert_eq!(output("if (0) { print(\"never\"); }"), "");
    }

    #[test]
    fn else_if_chain() {
        let program = "var n = 2;
            if (== n 1) { print(\"one\"); }
            else if (== n 2) { print(\"two\"); }
            else { print(\"many\"); }";
        assert_eq!(output(program), "two\n");
    }

    #[test]
    fn condition_sees_assignments_made_earlier_in_the_run() {
        assert_eq!(
            output("var x = 10; if (> x 3) { print(\"big\"); } else { print(\"small\"); }"),
            "big\n"
        );
    }

    #[test]
    fn call_binds_parameters_then_restores() {
        let (interpreter, result) = run("var a = 10;
             fn add(a, b) { print(+ a b); }
             add(2, 3);
             print(a);
             print(b);");
        result.unwrap();
        assert_eq!(printed(&interpreter), "5\n10\n0\n");
        assert_eq!(interpreter.variable("a"), Some(&Value::Int(10)));
        assert_eq!(interpreter.variable("b"), None);
    }

    #[test]
    fn assignments_inside_a_body_are_discarded() {
        let (interpreter, result) = run("var g = 1; fn set() { var g = 2; var h = 3; } set();");
        result.unwrap();
        assert_eq!(interpreter.variable("g"), Some(&Value::Int(1)));
        assert_eq!(interpreter.variable("h"), None);
    }

    #[test]
    fn callee_reads_caller_variables() {
        assert_eq!(
            output("fn show() { print(greeting); } var greeting = \"hi\"; show();"),
            "hi\n"
        );
    }

    #[test]
    fn recursion_unwinds_in_order() {
        let program = "fn countdown(n) {
                if (> n 0) { print(n); countdown(- n 1); print(n); }
            }
            countdown(3);";
        assert_eq!(output(program), "3\n2\n1\n1\n2\n3\n");
    }

    #[test]
    fn nested_declaration_registers_when_the_body_runs() {
        let err = name_error("fn outer() { fn inner() { print(\"inner\"); } } inner();");
        assert!(matches!(err, NameError::UndefinedFunction { name, .. } if name == "inner"));

        let (interpreter, result) =
            run("fn outer() { fn inner() { print(\"inner\"); } } outer(); inner();");
        result.unwrap();
        assert_eq!(printed(&interpreter), "inner\n");
        assert!(interpreter.function("inner").is_some());
    }

    #[test]
    fn redefinition_overwrites() {
        assert_eq!(
            output("fn f() { print(1); } fn f() { print(2); } f();"),
            "2\n"
        );
    }

    #[test]
    fn undeclared_function() {
        let err = name_error("missing(1);");
        match err {
            NameError::UndefinedFunction { name, bad_bit, .. } => {
                assert_eq!(name, "missing");
                assert_eq!(bad_bit, SourceSpan::from(0..10));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn forward_reference_fails() {
        let (interpreter, result) = run("greet(); fn greet() { print(\"hi\"); }");
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NameError>(),
            Some(NameError::UndefinedFunction { .. })
        ));
        assert_eq!(printed(&interpreter), "");
    }

    #[test]
    fn wrong_argument_count() {
        let err = name_error("fn add(a, b) { print(+ a b); } add(1);");
        match err {
            NameError::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => {
                assert_eq!(name, "add");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn division_by_zero() {
        assert!(matches!(eval_error("/ 1 0"), EvalError::DivisionByZero { .. }));
        assert!(matches!(eval_error("/ 1 0.0"), EvalError::DivisionByZero { .. }));
        assert!(matches!(
            eval_error("/ 1 - 2 2"),
            EvalError::DivisionByZero { bad_bit, .. } if bad_bit == SourceSpan::from(4..9)
        ));
    }

    #[test]
    fn division_is_true_division() {
        assert_eq!(eval("/ 7 2").unwrap(), Value::Float(3.5));
        assert_eq!(eval("/ 6 3").unwrap().to_string(), "2.0");
    }

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(eval("- 2 5").unwrap(), Value::Int(-3));
        assert_eq!(eval("* + 1 2 4").unwrap(), Value::Int(12));
    }

    #[test]
    fn mixed_arithmetic_widens_to_float() {
        assert_eq!(eval("+ 1 2.5").unwrap(), Value::Float(3.5));
        assert_eq!(eval("* 2.0 3").unwrap().to_string(), "6.0");
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(matches!(
            eval_error("* 9223372036854775807 2"),
            EvalError::Overflow { .. }
        ));
    }

    #[test]
    fn strings_concatenate() {
        let (interpreter, result) = run("var name = \"World\"; print(+ + \"Hello, \" name \"!\");");
        result.unwrap();
        assert_eq!(printed(&interpreter), "Hello, World!\n");
    }

    #[test]
    fn non_numeric_operands_are_rejected() {
        match eval_error("+ \"a\" 1") {
            EvalError::TypeMismatch { op, lhs, rhs, .. } => {
                assert_eq!(op, "+");
                assert_eq!(lhs, "string");
                assert_eq!(rhs, "integer");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(eval_error("* \"ab\" 2"), EvalError::TypeMismatch { .. }));
        assert!(matches!(eval_error("- > 2 1 1"), EvalError::TypeMismatch { .. }));
        assert!(matches!(eval_error("> \"a\" 1"), EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn unknown_operator() {
        match eval_error("= 1 2") {
            EvalError::UnknownOperator { op, .. } => assert_eq!(op, "="),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("== 1 1.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("!= \"a\" \"b\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("== \"1\" 1").unwrap(), Value::Bool(false));
        assert_eq!(eval("< \"apple\" \"banana\"").unwrap(), Value::Bool(true));
        assert_eq!(eval(">= 2 2.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("<= 3 2").unwrap(), Value::Bool(false));
    }

    #[test]
    fn ordering_against_nan_is_false() {
        let mut interpreter = interpreter(InterpreterOptions::default());
        interpreter.environment.define("inf", Value::Float(f64::INFINITY));
        for op in ["<", "<=", ">", ">="] {
            assert_eq!(
                interpreter.eval_expr(&format!("{op} - inf inf 1")).unwrap(),
                Value::Bool(false),
                "{op}"
            );
        }
        assert_eq!(interpreter.eval_expr("!= - inf inf 0").unwrap(), Value::Bool(true));
        assert!(matches!(
            interpreter.eval_expr("< - inf inf \"a\"").unwrap_err().downcast::<EvalError>().unwrap(),
            EvalError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn unbound_reads_as_zero_by_default() {
        assert_eq!(eval("nothing").unwrap(), Value::Int(0));
        assert_eq!(eval("+ nothing 1").unwrap(), Value::Int(1));
    }

    #[test]
    fn unbound_is_an_error_when_strict() {
        let options = InterpreterOptions {
            unbound: UnboundVariables::Error,
            ..InterpreterOptions::default()
        };
        let err = interpreter(options)
            .eval_expr("+ 1 nothing")
            .unwrap_err()
            .downcast::<NameError>()
            .unwrap();
        match err {
            NameError::UndefinedVariable { name, bad_bit, .. } => {
                assert_eq!(name, "nothing");
                assert_eq!(bad_bit, SourceSpan::from(4..11));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn float_numbers_option() {
        let options = InterpreterOptions {
            lexer: LexerOptions {
                float_numbers: true,
                ..LexerOptions::default()
            },
            ..InterpreterOptions::default()
        };
        let mut interpreter = interpreter(options);
        interpreter.run_source(None, "print(+ 1 2);").unwrap();
        assert_eq!(printed(&interpreter), "3.0\n");
    }

    #[test]
    fn compound_assignment() {
        let options = InterpreterOptions {
            lexer: LexerOptions {
                compound_assignment: true,
                ..LexerOptions::default()
            },
            ..InterpreterOptions::default()
        };
        let mut interpreter = interpreter(options);
        interpreter
            .run_source(None, "var x = 4; x *= 3; x -= 2; print(x);")
            .unwrap();
        assert_eq!(printed(&interpreter), "10\n");
    }

    #[test]
    fn error_stops_the_run() {
        let (interpreter, result) = run("print(1);\nprint(/ 1 0);\nprint(2);");
        let err = result.unwrap_err().downcast::<EvalError>().unwrap();
        assert_eq!(err.line(), 2);
        assert_eq!(printed(&interpreter), "1\n");
    }

    #[test]
    fn failed_call_still_restores_the_variable_table() {
        let mut interpreter = interpreter(InterpreterOptions::default());
        interpreter
            .run_source(None, "var n = 1; fn div(n, d) { var q = / n d; }")
            .unwrap();
        let err = interpreter.run_source(None, "div(10, 0);").unwrap_err();
        assert!(err.downcast_ref::<EvalError>().is_some());
        assert_eq!(interpreter.variable("n"), Some(&Value::Int(1)));
        assert_eq!(interpreter.variable("d"), None);
        assert_eq!(interpreter.environment().len(), 1);

        interpreter.run_source(None, "print(+ n d);").unwrap();
        assert_eq!(printed(&interpreter), "1\n");
    }

    #[test]
    fn errors_inside_a_call_point_at_the_declaration() {
        let mut interpreter = interpreter(InterpreterOptions::default());
        interpreter
            .run_source(Some("lib.au"), "fn boom() {\n print(/ 1 0);\n}")
            .unwrap();
        let err = interpreter
            .run_source(Some("main.au"), "boom();")
            .unwrap_err()
            .downcast::<EvalError>()
            .unwrap();
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn separate_interpreters_do_not_share_tables() {
        let (first, result) = run("var x = 1; fn f() { }");
        result.unwrap();
        let (second, result) = run("print(x);");
        result.unwrap();
        assert_eq!(printed(&second), "0\n");
        assert!(first.function("f").is_some());
        assert!(second.function("f").is_none());
    }

    #[test]
    fn value_display() {
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::Float(5.0).to_string(), "5.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("raw \\n".to_string()).to_string(), "raw \\n");
    }

    #[test]
    fn truthiness() {
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Str("x".to_string()).is_truthy());
        assert!(!Value::Bool(false).is_truthy());
    }
}
