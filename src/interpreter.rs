//! Tree-walking evaluator.
//!
//! Statements execute against a current environment frame; the globals
//! frame is pinned separately so resolved locals and unresolved globals
//! never race each other.  Non-local control flow (`return`, `break`,
//! runtime errors) travels through the [`Unwind`] sum type threaded through
//! every visit, never through panics, so every block entry has a matching
//! environment restore on every exit path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};

/// An abrupt completion unwinding zero or more statement frames.
///
/// `Return` is caught only at the user-function call boundary, `Break`
/// only by the innermost `while` loop; `Error` propagates to the top.
/// The carried lines back the diagnostics for signals that escape all
/// the way out (the resolver normally rejects those programs).
enum Unwind {
    Return { value: Value, line: usize },
    Break { line: usize },
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(err: LoxError) -> Self {
        Unwind::Error(err)
    }
}

impl Unwind {
    fn into_error(self) -> LoxError {
        match self {
            Unwind::Error(err) => err,

            Unwind::Return { line, .. } => {
                LoxError::runtime_at(line, "Cannot return from top-level code.")
            }

            Unwind::Break { line } => {
                LoxError::runtime_at(line, "Cannot use 'break' outside of a loop.")
            }
        }
    }
}

type ExecResult = std::result::Result<(), Unwind>;
type EvalResult = std::result::Result<Value, Unwind>;

pub struct Interpreter {
    environment: Rc<RefCell<Environment>>,
    globals: Rc<RefCell<Environment>>,

    /// Resolver side-table: expression identity to scope distance.
    locals: HashMap<ExprId, usize>,

    /// Program output sink (`print`).  Diagnostics never go through here.
    out: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Build an interpreter writing program output to the given sink.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction(Rc::new(NativeFunction {
                name: "clock".to_string(),
                arity: 0,
                func: clock_native,
            })),
        );

        Interpreter {
            environment: globals.clone(),
            globals,
            locals: HashMap::new(),
            out,
        }
    }

    /// Record a resolved local: `id` reads from the frame `depth` parent
    /// links up.  Called by the resolver; unresolved names fall back to
    /// globals at lookup time.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("note_local: {:?} at depth {}", id, depth);

        self.locals.insert(id, depth);
    }

    /// Run a program.  The first runtime error aborts execution.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for statement in statements {
            self.execute(statement).map_err(Unwind::into_error)?;
        }

        Ok(())
    }

    /// Evaluate a single expression and hand back its value.  Used by the
    /// prompt; running a program never implicitly prints.
    pub fn interpret_expression(&mut self, expr: &Expr) -> Result<Value> {
        self.evaluate(expr).map_err(Unwind::into_error)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;

                writeln!(self.out, "{}", value).map_err(LoxError::Io)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(
                    self.environment.clone(),
                )));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while is_truthy(&self.evaluate(condition)?) {
                    match self.execute(body) {
                        // A break unwinds exactly this loop.
                        Err(Unwind::Break { .. }) => break,

                        other => other?,
                    }
                }

                Ok(())
            }

            Stmt::Break(keyword) => Err(Unwind::Break { line: keyword.line }),

            Stmt::Function(declaration) => {
                let function = LoxFunction {
                    declaration: declaration.clone(),
                    closure: self.environment.clone(),
                    is_initializer: false,
                };

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Return { keyword, value } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return {
                    value,
                    line: keyword.line,
                })
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Execute statements in a fresh child frame, restoring the previous
    /// frame on every exit path, abrupt ones included.
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> ExecResult {
        let previous = std::mem::replace(&mut self.environment, environment);

        let mut result: ExecResult = Ok(());

        for statement in statements {
            result = self.execute(statement);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> ExecResult {
        // 1. Evaluate the superclass, which must itself be a class.
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),

                _ => {
                    return Err(LoxError::runtime("Superclass must be a class.").into());
                }
            },

            None => None,
        };

        // 2. Pre-define the class name so methods can refer to it.
        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Nil);

        // 3. With a superclass, methods close over a synthetic frame
        //    binding `super`.
        let enclosing = self.environment.clone();

        if let Some(superclass) = &superclass_value {
            let super_env = Rc::new(RefCell::new(Environment::with_enclosing(
                self.environment.clone(),
            )));

            super_env
                .borrow_mut()
                .define("super", Value::Class(superclass.clone()));

            self.environment = super_env;
        }

        // 4. Build the method table; `init` is the initializer.
        let mut method_table: HashMap<String, Rc<LoxFunction>> = HashMap::new();

        for method in methods {
            let function = LoxFunction {
                declaration: method.clone(),
                closure: self.environment.clone(),
                is_initializer: method.name.lexeme == "init",
            };

            method_table.insert(method.name.lexeme.clone(), Rc::new(function));
        }

        let class = Value::Class(Rc::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_value,
            methods: method_table,
        }));

        // 5. Pop the `super` frame and fill in the pre-defined name.
        self.environment = enclosing;

        debug!("Defined class '{}'", name.lexeme);

        if !self.environment.borrow_mut().assign(&name.lexeme, class) {
            return Err(self.undefined_variable(name).into());
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(literal) => Ok(evaluate_literal(literal)),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right),

            Expr::Variable { id, name } => Ok(self.look_up_variable(*id, name)?),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                if let Some(&distance) = self.locals.get(id) {
                    if !Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                    ) {
                        return Err(self.undefined_variable(name).into());
                    }
                } else if !self.globals.borrow_mut().assign(&name.lexeme, value.clone()) {
                    return Err(self.undefined_variable(name).into());
                }

                Ok(value)
            }

            Expr::Call {
                callee, arguments, ..
            } => self.evaluate_call(callee, arguments),

            Expr::Get { object, name } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => LoxInstance::get(&instance, &name.lexeme)
                        .ok_or_else(|| {
                            LoxError::runtime_at(
                                name.line,
                                format!("Undefined property '{}'.", name.lexeme),
                            )
                            .into()
                        }),

                    _ => Err(LoxError::runtime_at(
                        name.line,
                        "Only instances have properties.",
                    )
                    .into()),
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object = self.evaluate(object)?;

                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;

                        instance.set(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => Err(
                        LoxError::runtime_at(name.line, "Only instances have fields.").into()
                    ),
                }
            }

            Expr::This { id, keyword } => Ok(self.look_up_variable(*id, keyword)?),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime("Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!is_truthy(&value))),

            _ => Err(LoxError::runtime("Invalid unary operator.").into()),
        }
    }

    fn evaluate_logical(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left_value: Value = self.evaluate(left)?;

        // Short-circuit: the left operand decides whether the right one is
        // evaluated at all, and operands come back unchanged.
        match operator.token_type {
            TokenType::OR if is_truthy(&left_value) => Ok(left_value),

            TokenType::AND if !is_truthy(&left_value) => Ok(left_value),

            _ => self.evaluate(right),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left_value: Value = self.evaluate(left)?;
        let right_value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),

                _ => Err(
                    LoxError::runtime("Operands must be two numbers or two strings.").into()
                ),
            },

            TokenType::MINUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a - b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::STAR => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a * b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::SLASH => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => {
                    if b == 0.0 {
                        Err(LoxError::runtime("Division by zero.").into())
                    } else {
                        Ok(Value::Number(a / b))
                    }
                }

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::GREATER => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a > b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::GREATER_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a >= b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::LESS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a < b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::LESS_EQUAL => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(a <= b)),

                _ => Err(self.numbers_expected().into()),
            },

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(is_equal(&left_value, &right_value))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!is_equal(&left_value, &right_value))),

            _ => Err(LoxError::runtime("Invalid binary operator.").into()),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, arguments: &[Expr]) -> EvalResult {
        let callee_value = self.evaluate(callee)?;

        let mut args: Vec<Value> = Vec::with_capacity(arguments.len());

        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        match callee_value {
            Value::Function(function) => {
                self.check_arity(function.arity(), args.len())?;

                self.call_function(&function, args)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), args.len())?;

                self.instantiate(&class, args)
            }

            Value::NativeFunction(native) => {
                self.check_arity(native.arity, args.len())?;

                (native.func)(&args).map_err(Unwind::from)
            }

            _ => Err(LoxError::runtime("Can only call functions and classes.").into()),
        }
    }

    fn check_arity(&self, expected: usize, got: usize) -> std::result::Result<(), Unwind> {
        if expected != got {
            return Err(LoxError::runtime(format!(
                "Expected {} arguments but got {}.",
                expected, got
            ))
            .into());
        }

        Ok(())
    }

    /// The user-function call boundary: binds parameters in a child of the
    /// closure, runs the body, and catches `Return`.  Initializers yield
    /// the bound `this` no matter what the body did.
    fn call_function(&mut self, function: &LoxFunction, arguments: Vec<Value>) -> EvalResult {
        debug!("Calling <fn {}>", function.declaration.name.lexeme);

        let mut environment = Environment::with_enclosing(function.closure.clone());

        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            environment.define(&param.lexeme, argument);
        }

        let result = self.execute_block(
            &function.declaration.body,
            Rc::new(RefCell::new(environment)),
        );

        match result {
            Ok(()) => {
                if function.is_initializer {
                    Ok(self.bound_this(function))
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Unwind::Return { value, .. }) => {
                if function.is_initializer {
                    Ok(self.bound_this(function))
                } else {
                    Ok(value)
                }
            }

            Err(other) => Err(other),
        }
    }

    /// `this` as bound into an initializer's closure frame.
    fn bound_this(&self, function: &LoxFunction) -> Value {
        Environment::get_at(&function.closure, 0, "this").unwrap_or(Value::Nil)
    }

    /// Calling a class constructs an instance and runs `init` when the
    /// class chain defines one.
    fn instantiate(&mut self, class: &Rc<LoxClass>, arguments: Vec<Value>) -> EvalResult {
        debug!("Instantiating {}", class.name);

        let instance = LoxInstance::new(class.clone());

        if let Some(initializer) = class.find_method("init") {
            let bound = initializer.bind(instance.clone());

            self.call_function(&bound, arguments)?;
        }

        Ok(Value::Instance(instance))
    }

    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> EvalResult {
        let distance = match self.locals.get(&id) {
            Some(&distance) => distance,

            None => {
                return Err(LoxError::runtime_at(
                    keyword.line,
                    "Cannot use 'super' outside of a class.",
                )
                .into());
            }
        };

        // The resolver placed `super` in its own synthetic frame, with
        // `this` one frame below.
        let superclass = match Environment::get_at(&self.environment, distance, "super") {
            Some(Value::Class(class)) => class,

            _ => {
                return Err(LoxError::runtime_at(
                    keyword.line,
                    "Cannot use 'super' outside of a class.",
                )
                .into());
            }
        };

        // `this` lives one frame inside the synthetic `super` frame.
        let this_distance = distance.checked_sub(1);

        let instance = match this_distance
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        {
            Some(Value::Instance(instance)) => instance,

            _ => {
                return Err(LoxError::runtime_at(
                    keyword.line,
                    "Cannot use 'super' outside of a class.",
                )
                .into());
            }
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),

            None => Err(LoxError::runtime_at(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
            .into()),
        }
    }

    /// Resolved locals read at their recorded distance; everything else
    /// falls back to globals.
    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        if let Some(&distance) = self.locals.get(&id) {
            Environment::get_at(&self.environment, distance, &name.lexeme)
                .ok_or_else(|| self.undefined_variable(name))
        } else {
            self.globals
                .borrow()
                .get(&name.lexeme)
                .ok_or_else(|| self.undefined_variable(name))
        }
    }

    fn undefined_variable(&self, name: &Token) -> LoxError {
        LoxError::runtime(format!("Undefined variable '{}'.", name.lexeme))
    }

    fn numbers_expected(&self) -> LoxError {
        LoxError::runtime("Operands must be numbers.")
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn evaluate_literal(literal: &LiteralValue) -> Value {
    match literal {
        LiteralValue::Nil => Value::Nil,

        LiteralValue::True => Value::Bool(true),

        LiteralValue::False => Value::Bool(false),

        LiteralValue::Number(n) => Value::Number(*n),

        LiteralValue::Str(s) => Value::Str(s.clone()),
    }
}

/// nil and false are falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Nil => false,

        Value::Bool(b) => *b,

        _ => true,
    }
}

/// Structural equality for nil/bool/number/string; identity for
/// functions, classes, and instances.
fn is_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Nil, Value::Nil) => true,

        (Value::Bool(a), Value::Bool(b)) => a == b,

        (Value::Number(a), Value::Number(b)) => a == b,

        (Value::Str(a), Value::Str(b)) => a == b,

        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

        (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

        (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

        (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),

        _ => false,
    }
}

fn clock_native(_args: &[Value]) -> Result<Value> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LoxError::runtime(format!("Clock error: {}", e)))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
