//! Static resolution pass.
//!
//! A single AST walk that:
//! 1. **Builds lexical scopes**: a stack of `HashMap<String, bool>` maps
//!    each name to declared (false) or fully defined (true) in its block
//!    or function body.
//! 2. **Enforces static rules**: redeclaration in the same scope, reading
//!    a local in its own initializer, `return` outside a function,
//!    returning a value from an initializer, `this`/`super` misuse, and
//!    `break` outside a loop.
//! 3. **Records binding distances**: every variable-using expression is
//!    either noted in the interpreter's side-table with its scope distance
//!    (innermost = 0) or left to the globals fallback.
//!
//! Resolution halts on the first static error; the driver then refuses to
//! run the program.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{LoxError, Result};
use crate::expr::{Expr, ExprId};
use crate::interpreter::Interpreter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::Token;

/// What kind of function body, if any, is being resolved.  Validates
/// `return` placement and initializer rules.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class.
    None,

    /// Inside a class declaration without a superclass.
    Class,

    /// Inside a class declaration with a superclass.
    Subclass,
}

/// Tracks scopes, enforces static rules, and records binding distances by
/// calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
    loop_depth: usize,
}

impl<'interp> Resolver<'interp> {
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            loop_depth: 0,
        }
    }

    /// Walk all top-level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }

        Ok(())
    }

    /// Walk a single bare expression (prompt expression mode).
    pub fn resolve_expression(&mut self, expr: &Expr) -> Result<()> {
        self.resolve_expr(expr)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),

            Stmt::Block(statements) => {
                self.begin_scope();

                let result = statements.iter().try_for_each(|s| self.resolve_stmt(s));

                self.end_scope();

                result
            }

            Stmt::Var { name, initializer } => {
                // Declare first so `var x = x;` is caught as a read of a
                // declared-but-undefined local.
                self.declare(name)?;

                if let Some(expr) = initializer {
                    self.resolve_expr(expr)?;
                }

                self.define(name);

                Ok(())
            }

            Stmt::Function(declaration) => {
                // Declare and define eagerly so the body can recurse.
                self.declare(&declaration.name)?;
                self.define(&declaration.name);

                self.resolve_function(FunctionType::Function, declaration)
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition)?;

                self.loop_depth += 1;
                let result = self.resolve_stmt(body);
                self.loop_depth -= 1;

                result
            }

            Stmt::Break(keyword) => {
                if self.loop_depth == 0 {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'break' outside of a loop.",
                    ));
                }

                Ok(())
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot return from top-level code.",
                    ));
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword.line,
                            "Can't return a value from an initializer.",
                        ));
                    }

                    self.resolve_expr(expr)?;
                }

                Ok(())
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<()> {
        let enclosing_class: ClassType = self.current_class;

        self.declare(name)?;
        self.define(name);

        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        if let Some(super_expr) = superclass {
            if let Expr::Variable {
                name: super_name, ..
            } = super_expr
            {
                if super_name.lexeme == name.lexeme {
                    self.current_class = enclosing_class;

                    return Err(LoxError::resolve(
                        super_name.line,
                        "A class can't inherit from itself.",
                    ));
                }
            }

            // Resolve the superclass name itself, then open the synthetic
            // frame methods will find `super` in.
            if let Err(e) = self.resolve_expr(super_expr) {
                self.current_class = enclosing_class;

                return Err(e);
            }

            self.begin_scope();
            self.scope_insert("super");
        }

        // The implicit `this` scope wraps every method body.
        self.begin_scope();
        self.scope_insert("this");

        let mut result: Result<()> = Ok(());

        for method in methods {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            result = self.resolve_function(kind, method);

            if result.is_err() {
                break;
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;

        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => Ok(()),

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name.line,
                            "Cannot read local variable in its own initializer.",
                        ));
                    }
                }

                self.resolve_local(*id, name);

                Ok(())
            }

            Expr::Assign { id, name, value } => {
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);

                Ok(())
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;

                for arg in arguments {
                    self.resolve_expr(arg)?;
                }

                Ok(())
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'this' outside of a class.",
                    ));
                }

                self.resolve_local(*id, keyword);

                Ok(())
            }

            Expr::Super { id, keyword, .. } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'super' outside of a class.",
                    ));
                }

                if self.current_class != ClassType::Subclass {
                    return Err(LoxError::resolve(
                        keyword.line,
                        "Cannot use 'super' in a class with no superclass.",
                    ));
                }

                self.resolve_local(*id, keyword);

                Ok(())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters and body.
    ///
    /// The surrounding loop depth is parked at zero: a `break` inside a
    /// function body never targets a loop outside it.
    fn resolve_function(&mut self, kind: FunctionType, declaration: &FunctionDecl) -> Result<()> {
        let enclosing = self.current_function;
        let enclosing_loop_depth = self.loop_depth;

        self.current_function = kind;
        self.loop_depth = 0;

        self.begin_scope();

        let mut result: Result<()> = Ok(());

        for param in &declaration.params {
            result = self.declare(param);

            if result.is_err() {
                break;
            }

            self.define(param);
        }

        if result.is_ok() {
            result = declaration.body.iter().try_for_each(|s| self.resolve_stmt(s));
        }

        self.end_scope();

        self.current_function = enclosing;
        self.loop_depth = enclosing_loop_depth;

        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Directly mark a synthetic name (`this`/`super`) as defined in the
    /// innermost scope.
    fn scope_insert(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), true);
        }
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(LoxError::resolve(
                    name.line,
                    "Variable already declared in this scope.",
                ));
            }

            scope.insert(name.lexeme.clone(), false);
        }

        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at its depth, or leave it for the
    /// globals fallback when no scope declares the name.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                self.interpreter.note_local(id, depth);

                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
