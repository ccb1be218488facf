//! Native actions that can be called from datamodel expressions.
//!
//! This is a rfsm extension, not part of the W3C recommendation: it lets embedding
//! applications register Rust closures/objects under a name and call them from
//! ECMAScript (or the expression extension) the same way a JS function would be called.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::datamodel::{Data, GlobalDataAccess};

/// A single native action, callable by name from a datamodel expression.
pub trait Action: Send {
    /// Executes the action with the given (already evaluated) arguments.
    fn execute(&mut self, args: &[Data], global: &GlobalDataAccess) -> Result<Data, String>;
}

/// Registry of native actions, shared (via [crate::fsm::GlobalData]) across all datamodel
/// implementations of a session.
pub struct ActionMap {
    pub actions: Mutex<HashMap<String, Box<dyn Action>>>,
}

impl ActionMap {
    pub fn new() -> ActionMap {
        ActionMap {
            actions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) an action under the given name.
    pub fn add(&self, name: &str, action: Box<dyn Action>) {
        self.actions.lock().unwrap().insert(name.to_string(), action);
    }

    /// Returns the names of all currently registered actions.
    pub fn keys(&self) -> Vec<String> {
        self.actions.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap::new()
    }
}
