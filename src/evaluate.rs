use crate::environment::Environment;
use crate::function::{Function, FunctionTable};
use crate::parse::{BinaryOp, Expr, Stmt};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::fmt;
use std::io::{BufRead, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Nesting limit for user function calls. Deep limits need a matching
/// native stack, see `run::with_eval_stack`.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Str(String),
    List(Vec<Value>),
    /// Result of `/\` and `\/`.
    Bool(bool),
    Nil,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Bool(_) => "boolean",
            Value::Nil => "nil",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
            Value::List(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::Bool(value) => write!(f, "{}", value),
            Value::Nil => write!(f, "nil"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeErrorKind {
    #[error("Undefined variable '{0}'.")]
    UndefinedIdentifier(String),
    #[error("Undefined function '{0}'.")]
    UndefinedFunction(String),
    #[error("Function '{name}' expects {expected} arguments but got {found}.")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Division by zero.")]
    DivisionByZero,
    #[error("'{operation}' requires integer operands, found {found}.")]
    TypeMismatch {
        operation: &'static str,
        found: String,
    },
    #[error("Integer overflow in '{0}'.")]
    IntegerOverflow(&'static str),
    #[error("Random bound must not be negative, got {0}.")]
    NegativeRandomBound(i64),
    #[error("Maximum call depth of {0} exceeded.")]
    StackOverflow(usize),
    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Runtime Error: {kind}{}", in_statement(.statement))]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: usize,
    /// Nearest statement that was executing when the error occurred.
    pub statement: Option<String>,
}

fn in_statement(statement: &Option<String>) -> String {
    match statement {
        Some(statement) => format!(" (in {})", statement),
        None => String::new(),
    }
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, line: usize) -> Self {
        RuntimeError {
            kind,
            line,
            statement: None,
        }
    }

    fn within(mut self, stmt: &Stmt) -> Self {
        if self.statement.is_none() {
            self.statement = Some(stmt.describe());
        }
        self
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Tree-walking interpreter state: globals, call frames, function table and
/// the program's input, output and random source.
///
/// All of it is plain owned data mutated in place. An instance must not be
/// shared between threads without external synchronization.
pub struct Evaluate<W: Write, R: BufRead> {
    globals: Environment,
    frames: Vec<Environment>,
    functions: FunctionTable,
    output: W,
    input: R,
    rng: Box<dyn RngCore>,
    max_depth: usize,
}

impl<W: Write, R: BufRead> Evaluate<W, R> {
    /// Interpreter with an entropy-seeded random source.
    pub fn new(output: W, input: R) -> Self {
        Self::with_rng(output, input, StdRng::from_entropy())
    }

    pub fn with_seed(output: W, input: R, seed: u64) -> Self {
        Self::with_rng(output, input, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(output: W, input: R, rng: impl RngCore + 'static) -> Self {
        Evaluate {
            globals: Environment::new(),
            frames: Vec::new(),
            functions: FunctionTable::new(),
            output,
            input,
            rng: Box::new(rng),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Executes `program` top to bottom, stopping at the first error.
    /// Returns the value of the last statement.
    pub fn run(&mut self, program: &[Stmt]) -> Result<Value> {
        let mut last = Value::Nil;
        for stmt in program {
            last = self.execute(stmt)?;
        }
        self.output
            .flush()
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Io(e.to_string()), 0))?;
        Ok(last)
    }

    fn environment(&mut self) -> &mut Environment {
        self.frames.last_mut().unwrap_or(&mut self.globals)
    }

    fn current(&self) -> &Environment {
        self.frames.last().unwrap_or(&self.globals)
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Value> {
        trace!(line = stmt.line(), depth = self.frames.len(), "{}", stmt.describe());
        self.visit_stmt(stmt).map_err(|error| error.within(stmt))
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> Result<Value> {
        match stmt {
            Stmt::Assign { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.environment().define(name.clone(), value.clone());
                Ok(value)
            }
            Stmt::Write { value, line } => {
                let value = self.evaluate(value)?;
                writeln!(self.output, "{}", value)
                    .map_err(|e| RuntimeError::new(RuntimeErrorKind::Io(e.to_string()), *line))?;
                Ok(value)
            }
            Stmt::Read { name, line } => {
                let value = Value::Str(self.read_line(*line)?);
                self.environment().define(name.clone(), value.clone());
                Ok(value)
            }
            Stmt::RandomAssign { name, bound, line } => {
                let value = match self.evaluate(bound)? {
                    Value::Int(bound) if bound >= 0 => Value::Int(self.rng.gen_range(0..=bound)),
                    Value::Int(bound) => {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::NegativeRandomBound(bound),
                            *line,
                        ))
                    }
                    other => {
                        return Err(RuntimeError::new(
                            RuntimeErrorKind::TypeMismatch {
                                operation: "random",
                                found: other.type_name().to_string(),
                            },
                            *line,
                        ))
                    }
                };
                self.environment().define(name.clone(), value.clone());
                Ok(value)
            }
            Stmt::FunctionDef {
                name, params, body, ..
            } => {
                debug!(function = %name, arity = params.len(), "defining function");
                let function = Function::new(name.clone(), params.clone(), Rc::clone(body));
                if self.functions.define(function).is_some() {
                    warn!(function = %name, "function redefined");
                }
                Ok(Value::Nil)
            }
            Stmt::Expression { expr, .. } => self.evaluate(expr),
        }
    }

    fn read_line(&mut self, line: usize) -> Result<String> {
        let mut buffer = String::new();
        let read = self
            .input
            .read_line(&mut buffer)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::Io(e.to_string()), line))?;
        if read == 0 {
            return Err(RuntimeError::new(
                RuntimeErrorKind::Io("Unexpected end of input stream.".to_string()),
                line,
            ));
        }
        if buffer.ends_with('\n') {
            buffer.pop();
            if buffer.ends_with('\r') {
                buffer.pop();
            }
        }
        Ok(buffer)
    }

    /// Runs a function body in its own call frame; the frame is dropped on return.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Environment,
    ) -> Result<Value> {
        self.frames.push(environment);
        let mut result = Ok(Value::Nil);
        for stmt in statements {
            result = self.execute(stmt);
            if result.is_err() {
                break;
            }
        }
        self.frames.pop();
        result
    }

    fn visit_call_expr(&mut self, name: &str, arguments: &[Expr], line: usize) -> Result<Value> {
        let function = self.functions.get(name).ok_or_else(|| {
            RuntimeError::new(RuntimeErrorKind::UndefinedFunction(name.to_string()), line)
        })?;

        if arguments.len() != function.arity() {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ArityMismatch {
                    name: name.to_string(),
                    expected: function.arity(),
                    found: arguments.len(),
                },
                line,
            ));
        }

        let mut evaluated_args = Vec::with_capacity(arguments.len());
        for arg in arguments {
            evaluated_args.push(self.evaluate(arg)?);
        }

        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::new(
                RuntimeErrorKind::StackOverflow(self.max_depth),
                line,
            ));
        }

        debug!(function = function.name(), depth = self.frames.len() + 1, "calling function");
        function.call(self, evaluated_args)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(Value::Int(*value)),
            Expr::StringLiteral(text) => Ok(Value::Str(self.current().interpolate(text))),
            Expr::Identifier { name, line } => self.current().get(name, *line),
            Expr::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::List(values))
            }
            Expr::Call {
                name,
                arguments,
                line,
            } => self.visit_call_expr(name, arguments, *line),
            Expr::Binary {
                operator,
                left,
                right,
                line,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                let symbol = operator.symbol();

                match operator {
                    BinaryOp::Add => integer_operation(&left, &right, symbol, *line, |a, b| {
                        a.checked_add(b)
                            .ok_or(RuntimeErrorKind::IntegerOverflow("+"))
                    }),
                    BinaryOp::Subtract => integer_operation(&left, &right, symbol, *line, |a, b| {
                        a.checked_sub(b)
                            .ok_or(RuntimeErrorKind::IntegerOverflow("-"))
                    }),
                    BinaryOp::Multiply => integer_operation(&left, &right, symbol, *line, |a, b| {
                        a.checked_mul(b)
                            .ok_or(RuntimeErrorKind::IntegerOverflow("*"))
                    }),
                    BinaryOp::Divide => integer_operation(&left, &right, symbol, *line, floor_div),
                    BinaryOp::Greater => {
                        integer_operation(&left, &right, symbol, *line, |a, b| Ok(a > b))
                    }
                    BinaryOp::Less => {
                        integer_operation(&left, &right, symbol, *line, |a, b| Ok(a < b))
                    }
                    BinaryOp::Concat => Ok(Value::Str(format!("{}{}", left, right))),
                }
            }
        }
    }
}

fn integer_operation<T, F>(
    left: &Value,
    right: &Value,
    operation: &'static str,
    line: usize,
    op: F,
) -> Result<Value>
where
    F: Fn(i64, i64) -> std::result::Result<T, RuntimeErrorKind>,
    T: Into<Value>,
{
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => op(*a, *b)
            .map(Into::into)
            .map_err(|kind| RuntimeError::new(kind, line)),
        _ => Err(RuntimeError::new(
            RuntimeErrorKind::TypeMismatch {
                operation,
                found: format!("{} and {}", left.type_name(), right.type_name()),
            },
            line,
        )),
    }
}

/// Integer division rounding toward negative infinity.
fn floor_div(a: i64, b: i64) -> std::result::Result<i64, RuntimeErrorKind> {
    if b == 0 {
        return Err(RuntimeErrorKind::DivisionByZero);
    }
    let quotient = a
        .checked_div(b)
        .ok_or(RuntimeErrorKind::IntegerOverflow("/"))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}
