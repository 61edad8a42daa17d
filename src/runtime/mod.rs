//! Runtime environment for learner scripts
//!
//! This module provides the execution environment: values, objects,
//! scopes, the tree-walking interpreter and the built-in objects. A
//! [`Runtime`] owns one interpreter; nothing is shared between runtimes.

pub(crate) mod builtins;
mod eval;
pub mod inspect;
pub mod interpreter;
pub mod object;
pub mod scope;
mod value;

pub use interpreter::{error_parts, Interpreter, Interrupt, JsResult, Limits};
pub use object::{NativeFn, Object, ObjectKind, ObjectRef, PropertyFlags};
pub use value::{number_to_string, Value};

use crate::error::{Error, Result};
use tracing::debug;

/// A JavaScript runtime with its own global scope and event loop
pub struct Runtime {
    interpreter: Interpreter,
}

impl Runtime {
    /// Create a new runtime with the default limits
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Create a runtime with explicit execution limits
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            interpreter: Interpreter::new(limits),
        }
    }

    /// Evaluate JavaScript source code, then run the event loop until idle.
    /// Returns the completion value of the last statement.
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let program = crate::parser::parse(source)?;
        debug!(statements = program.body.len(), "evaluating program");
        let interp = &mut self.interpreter;
        interp.set_deadline(interp.limits().timeout_ms);
        let result = interp
            .exec_program(&program)
            .and_then(|value| interp.run_until_idle().map(|_| value));
        interp.clear_deadline();
        result.map_err(|interrupt| self.interpreter.interrupt_to_error(interrupt))
    }

    /// Get a global value
    pub fn get_global(&self, name: &str) -> Option<Value> {
        match scope::lookup(&self.interpreter.global, name) {
            scope::Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Set a global value
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.interpreter
            .global
            .borrow_mut()
            .declare(name, value, true);
    }

    /// Register a native function as a global
    pub fn register_function<F>(&mut self, name: &str, arity: usize, func: F)
    where
        F: Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
    {
        let function = self.interpreter.native_function(name, arity, func);
        self.set_global(name, function);
    }

    /// Call a global function by name
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let callee = self
            .get_global(name)
            .ok_or_else(|| Error::reference_error(crate::error::messages::not_defined(name)))?;
        let interp = &mut self.interpreter;
        interp.set_deadline(interp.limits().timeout_ms);
        let result = interp
            .call(&callee, Value::Undefined, args)
            .and_then(|value| interp.run_until_idle().map(|_| value));
        interp.clear_deadline();
        result.map_err(|interrupt| self.interpreter.interrupt_to_error(interrupt))
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_eval() {
        let mut runtime = Runtime::new();
        let result = runtime.eval("1 + 2").unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn test_runtime_variables() {
        let mut runtime = Runtime::new();
        let result = runtime.eval("let x = 10; x * 2").unwrap();
        assert_eq!(result, Value::Number(20.0));
    }

    #[test]
    fn test_globals_persist_between_evals() {
        let mut runtime = Runtime::new();
        runtime
            .eval("function add(a, b) { return a + b; }")
            .unwrap();
        let result = runtime
            .call_function("add", &[Value::Number(3.0), Value::Number(4.0)])
            .unwrap();
        assert_eq!(result, Value::Number(7.0));
    }

    #[test]
    fn test_register_function() {
        let mut runtime = Runtime::new();
        runtime.register_function("double", 1, |interp, _, args| {
            let n = interp.to_number(&args.first().cloned().unwrap_or_default())?;
            Ok(Value::Number(n * 2.0))
        });
        assert_eq!(runtime.eval("double(21)").unwrap(), Value::Number(42.0));
    }

    #[test]
    fn test_uncaught_errors_surface() {
        let mut runtime = Runtime::new();
        let err = runtime.eval("undefinedName + 1").unwrap_err();
        assert_eq!(err.to_string(), "ReferenceError: undefinedName is not defined");
        let err = runtime.eval("throw 'plain'").unwrap_err();
        assert_eq!(err.to_string(), "Uncaught plain");
    }

    #[test]
    fn test_infinite_loop_times_out() {
        let mut runtime = Runtime::with_limits(Limits {
            timeout_ms: 50,
            ..Limits::default()
        });
        let err = runtime.eval("while (true) {}").unwrap_err();
        assert!(matches!(err, Error::Timeout { limit_ms: 50 }));
    }
}
