//! Sandboxed evaluation of learner code
//!
//! A [`Sandbox`] owns an isolated [`Runtime`]. Learner code sees the
//! language intrinsics, a capturing `console`, and exactly the bindings the
//! host hands over with [`Sandbox::bind`] / [`Sandbox::bind_function`].
//! There is no filesystem, network, process or module access.

use crate::config::RunnerConfig;
use crate::error::Result;
use crate::runtime::inspect::display;
use crate::runtime::{Interpreter, JsResult, Limits, Runtime, Value};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// Console method that produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Log,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Debug,
    ];

    /// Name of the `console` method
    pub fn method(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// A single captured console call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Arguments rendered and joined with spaces
    pub message: String,
}

// ---------------------------------------------------------------------------
// SandboxConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Sandbox`]
#[derive(Debug, Clone, Copy)]
pub struct SandboxConfig {
    /// Interpreter limits
    pub limits: Limits,
    /// Console entries kept; later entries are dropped
    pub max_log_entries: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for SandboxConfig {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            limits: config.limits(),
            max_log_entries: config.max_log_entries,
        }
    }
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// Console capture shared with the native `console` methods
#[derive(Debug, Default)]
struct LogBuffer {
    entries: Vec<LogEntry>,
    dropped: usize,
}

/// An isolated evaluation environment
pub struct Sandbox {
    runtime: Runtime,
    logs: Rc<RefCell<LogBuffer>>,
}

impl Sandbox {
    /// Create a sandbox with a capturing `console`
    pub fn new(config: SandboxConfig) -> Self {
        let mut sandbox = Self {
            runtime: Runtime::with_limits(config.limits),
            logs: Rc::new(RefCell::new(LogBuffer::default())),
        };
        sandbox.install_console(config.max_log_entries);
        sandbox
    }

    fn install_console(&mut self, max_entries: usize) {
        let interp = self.runtime.interpreter();
        let console = interp.new_object();
        for level in LogLevel::ALL {
            let logs = self.logs.clone();
            interp.define_method(&console, level.method(), 0, move |_, _, args| {
                let message = args.iter().map(display).collect::<Vec<_>>().join(" ");
                let mut buffer = logs.borrow_mut();
                if buffer.entries.len() < max_entries {
                    trace!(%level, %message, "console");
                    buffer.entries.push(LogEntry { level, message });
                } else {
                    buffer.dropped += 1;
                }
                Ok(Value::Undefined)
            });
        }
        self.bind("console", Value::Object(console));
    }

    /// Expose `value` to learner code as the global `name`
    pub fn bind(&mut self, name: &str, value: Value) {
        self.runtime.set_global(name, value);
    }

    /// Expose a native function to learner code as the global `name`
    pub fn bind_function<F>(&mut self, name: &str, arity: usize, f: F)
    where
        F: Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
    {
        self.runtime.register_function(name, arity, f);
    }

    /// Evaluate `source` and run the event loop until idle
    pub fn evaluate(&mut self, source: &str) -> Result<Value> {
        self.runtime.eval(source)
    }

    /// Console output captured so far
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.borrow().entries.clone()
    }

    /// Take the captured console output, leaving the buffer empty
    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        let mut buffer = self.logs.borrow_mut();
        buffer.dropped = 0;
        std::mem::take(&mut buffer.entries)
    }

    /// Console entries discarded after the buffer filled up
    pub fn dropped_logs(&self) -> usize {
        self.logs.borrow().dropped
    }

    pub fn interpreter(&self) -> &Interpreter {
        self.runtime.interpreter()
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        self.runtime.interpreter_mut()
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(SandboxConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_console_capture() {
        let mut sandbox = Sandbox::default();
        sandbox
            .evaluate("console.log('sum', 1 + 2, [1, 'a'], { k: true }); console.warn('careful');")
            .unwrap();
        assert_eq!(
            sandbox.logs(),
            vec![
                LogEntry {
                    level: LogLevel::Log,
                    message: "sum 3 [ 1, 'a' ] { k: true }".to_string(),
                },
                LogEntry {
                    level: LogLevel::Warn,
                    message: "careful".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_log_limit() {
        let mut sandbox = Sandbox::new(SandboxConfig {
            max_log_entries: 2,
            ..SandboxConfig::default()
        });
        sandbox
            .evaluate("for (let i = 0; i < 5; i++) console.log(i);")
            .unwrap();
        assert_eq!(sandbox.logs().len(), 2);
        assert_eq!(sandbox.dropped_logs(), 3);
        assert_eq!(sandbox.take_logs().len(), 2);
        assert!(sandbox.logs().is_empty());
    }

    #[test]
    fn test_bindings() {
        let mut sandbox = Sandbox::default();
        sandbox.bind("answer", Value::Number(42.0));
        sandbox.bind_function("twice", 1, |interp, _, args| {
            let n = interp.to_number(&args.first().cloned().unwrap_or_default())?;
            Ok(Value::Number(n * 2.0))
        });
        assert_eq!(sandbox.evaluate("twice(answer)").unwrap(), Value::Number(84.0));
    }

    #[test]
    fn test_no_host_capabilities() {
        let mut sandbox = Sandbox::default();
        for name in ["require", "process", "fetch", "import_module", "window"] {
            let result = sandbox.evaluate(&format!("typeof {}", name)).unwrap();
            assert_eq!(result, Value::from("undefined"), "{} leaked", name);
        }
    }
}
