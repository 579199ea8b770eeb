use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::environment::Environment;
use crate::error::Result;
use crate::stmt::FunctionDecl;

/// Any value a Lox program can produce.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    NativeFunction(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
    Instance(Rc<LoxInstance>),
}

/// A host-provided callable.
#[derive(Debug)]
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: fn(&[Value]) -> Result<Value>,
}

/// A user-declared function plus the environment captured at its point of
/// declaration.
#[derive(Debug)]
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produce a copy of this function whose closure is a child frame
    /// binding `this` to the instance.
    pub fn bind(&self, instance: Rc<LoxInstance>) -> LoxFunction {
        debug!(
            "Binding method '{}' to an instance of {}",
            self.declaration.name.lexeme, instance.class.name
        );

        let mut environment = Environment::with_enclosing(self.closure.clone());
        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: self.declaration.clone(),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }
}

/// A runtime class value: name, optional superclass, method table.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Method lookup descends this class, then the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(method) = self.methods.get(name) {
            return Some(method.clone());
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// A class's arity is its initializer's, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map_or(0, |initializer| initializer.arity())
    }
}

/// An instance: its class plus a mutable field table.
#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    pub fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Rc<Self> {
        Rc::new(LoxInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        })
    }

    /// Property lookup: fields shadow methods; methods come back bound to
    /// the receiving instance.
    pub fn get(instance: &Rc<LoxInstance>, name: &str) -> Option<Value> {
        if let Some(value) = instance.fields.borrow().get(name) {
            return Some(value.clone());
        }

        instance
            .class
            .find_method(name)
            .map(|method| Value::Function(Rc::new(method.bind(instance.clone()))))
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::Str(s) => write!(f, "{}", s),

            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),

            Value::Function(function) => write!(f, "<fn {}>", function.declaration.name.lexeme),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.class.name),
        }
    }
}
