use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::value::Value;

/// A mutable binding frame with an optional parent link.  Frames are
/// shared (`Rc<RefCell<..>>`) because closures keep their defining frame
/// alive past block exit.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}'", name);

        self.values.insert(name.to_string(), value);
    }

    /// Read a binding, searching enclosing frames outward.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.values.get(name) {
            Some(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            None
        }
    }

    /// Overwrite an existing binding, searching enclosing frames outward.
    /// Returns false when the name is bound nowhere on the chain.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);

            true
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            false
        }
    }

    /// The frame exactly `distance` parent links up from `env`.
    ///
    /// The resolver guarantees the chain is at least that deep for every
    /// distance it records.
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = env.clone();

        for _ in 0..distance {
            let parent = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// Read a binding from the frame at the given distance, without
    /// searching further up.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Option<Value> {
        debug!("get_at distance={} name={}", distance, name);

        let frame = Environment::ancestor(env, distance)?;
        let value = frame.borrow().values.get(name).cloned();

        value
    }

    /// Write a binding into the frame at the given distance.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
    ) -> bool {
        debug!("assign_at distance={} name={}", distance, name);

        match Environment::ancestor(env, distance) {
            Some(frame) => {
                frame.borrow_mut().values.insert(name.to_string(), value);

                true
            }

            None => false,
        }
    }
}
