//! Sandboxed test runner
//!
//! Runs learner-authored `describe` / `it` declarations against learner code.
//! A run has two passes:
//!
//! 1. **Registration**: the whole source is evaluated in a fresh
//!    [`Sandbox`]. `describe` callbacks run immediately; `it` / `test` only
//!    record the case.
//! 2. **Execution**: cases run one after another in registration order. Each
//!    gets its own deadline; a returned promise is awaited by driving the
//!    event loop until it settles or the budget runs out.
//!
//! ```
//! use codegrade::test_runner::run_tests;
//!
//! let result = run_tests("
//!     describe('math', () => {
//!         it('adds', () => expect(1 + 2).toBe(3));
//!     });
//! ");
//! assert!(result.passed);
//! assert_eq!(result.results[0].name, "math > adds");
//! ```

use crate::assertion;
use crate::config::RunnerConfig;
use crate::runtime::inspect::inspect;
use crate::runtime::interpreter::Abort;
use crate::runtime::{error_parts, Interpreter, Interrupt, JsResult, Value};
use crate::sandbox::{LogEntry, Sandbox, SandboxConfig};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, warn};

/// Name of the synthetic entry reported when registration fails
pub const REGISTRATION_FAILURE: &str = "Test execution";

// ---------------------------------------------------------------------------
// TestResult
// ---------------------------------------------------------------------------

/// Outcome of a single test case
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Suite path and case name joined with `" > "`
    pub name: String,
    pub passed: bool,
    pub error: Option<String>,
    /// Wall-clock time, advisory only
    pub duration_ms: u64,
}

impl TestResult {
    pub fn pass(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            passed: true,
            error: None,
            duration_ms,
        }
    }

    pub fn fail(name: impl Into<String>, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            passed: false,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// TestRunResult
// ---------------------------------------------------------------------------

/// Aggregated results of one [`run_tests`] call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunResult {
    /// `true` when every case passed
    pub passed: bool,
    pub results: Vec<TestResult>,
    pub total: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    /// Set only when the registration pass failed
    pub error: Option<String>,
    /// Console output in emission order
    pub logs: Vec<LogEntry>,
}

impl TestRunResult {
    fn from_results(results: Vec<TestResult>, logs: Vec<LogEntry>) -> Self {
        let passed_count = results.iter().filter(|r| r.passed).count();
        let total = results.len();
        Self {
            passed: passed_count == total,
            total,
            passed_count,
            failed_count: total - passed_count,
            results,
            error: None,
            logs,
        }
    }

    fn registration_failure(message: String, duration_ms: u64, logs: Vec<LogEntry>) -> Self {
        let mut run = Self::from_results(
            vec![TestResult::fail(REGISTRATION_FAILURE, message.clone(), duration_ms)],
            logs,
        );
        run.error = Some(message);
        run
    }

    /// The failing cases, in registration order
    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for TestRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Test Report")?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;

        for result in &self.results {
            let icon = if result.passed { "✓" } else { "✗" };
            writeln!(f, "  {} {} ({}ms)", icon, result.name, result.duration_ms)?;
            if let Some(error) = &result.error {
                writeln!(f, "      {}", error)?;
            }
        }

        if !self.logs.is_empty() {
            writeln!(f, "\n  Console")?;
            for entry in &self.logs {
                writeln!(f, "    [{}] {}", entry.level, entry.message)?;
            }
        }

        writeln!(f, "\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "  Total: {}  Passed: {}  Failed: {}",
            self.total, self.passed_count, self.failed_count
        )?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// `beforeEach` / `afterEach` callbacks of one `describe` scope. Shared by
/// every case registered in that scope, so hooks declared after a case still
/// apply to it.
#[derive(Debug, Default)]
struct Hooks {
    before_each: Vec<Value>,
    after_each: Vec<Value>,
}

type HooksRef = Rc<RefCell<Hooks>>;

/// A registered case (`it` / `test` call)
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Enclosing `describe` names joined with `" > "`, empty at top level
    pub suite_name: String,
    pub name: String,
    /// The callable registered for the case
    pub body: Value,
    /// Row arguments of `each` cases
    args: Vec<Value>,
    /// Hook scopes from outermost to innermost
    hooks: Vec<HooksRef>,
}

impl TestCase {
    /// The name reported in [`TestResult::name`]
    pub fn full_name(&self) -> String {
        if self.suite_name.is_empty() {
            self.name.clone()
        } else {
            format!("{} > {}", self.suite_name, self.name)
        }
    }
}

/// State shared by the registration bindings
struct Registry {
    /// Open `describe` scopes; the first entry is the file scope
    scopes: Vec<(String, HooksRef)>,
    cases: Vec<TestCase>,
    /// Set once the execution pass starts
    sealed: bool,
}

impl Registry {
    fn new() -> Self {
        Self {
            scopes: vec![(String::new(), HooksRef::default())],
            cases: Vec::new(),
            sealed: false,
        }
    }

    fn suite_name(&self) -> String {
        self.scopes
            .iter()
            .skip(1)
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn current_hooks(&self) -> HooksRef {
        self.scopes
            .last()
            .map(|(_, hooks)| hooks.clone())
            .unwrap_or_default()
    }

    fn register(&mut self, name: String, body: Value, args: Vec<Value>) {
        let case = TestCase {
            suite_name: self.suite_name(),
            name,
            body,
            args,
            hooks: self.scopes.iter().map(|(_, hooks)| hooks.clone()).collect(),
        };
        self.cases.push(case);
    }
}

type RegistryRef = Rc<RefCell<Registry>>;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn name_arg(interp: &mut Interpreter, args: &[Value]) -> JsResult<String> {
    match args.first() {
        Some(Value::Object(_)) => interp.get(&args[0], "name").and_then(|n| interp.to_string(&n)),
        Some(value) => interp.to_string(value),
        None => Ok(String::new()),
    }
}

fn ensure_open(interp: &Interpreter, registry: &RegistryRef, what: &str) -> JsResult<()> {
    if registry.borrow().sealed {
        return Err(interp.throw(
            crate::error::ErrorKind::GenericError,
            format!("Cannot call {} while tests are running", what),
        ));
    }
    Ok(())
}

fn ensure_callable(interp: &Interpreter, value: &Value, what: &str) -> JsResult<()> {
    if !value.is_callable() {
        return Err(interp.type_error(format!(
            "{} expects a function but got {}",
            what,
            inspect(value)
        )));
    }
    Ok(())
}

/// Install `describe`, `it`, `test`, hooks and `expect` into `sandbox`
fn install_bindings(sandbox: &mut Sandbox, registry: &RegistryRef) {
    let reg = registry.clone();
    sandbox.bind_function("describe", 2, move |interp, _, args| {
        ensure_open(interp, &reg, "describe")?;
        let name = name_arg(interp, args)?;
        let callback = arg(args, 1);
        ensure_callable(interp, &callback, "describe")?;
        reg.borrow_mut()
            .scopes
            .push((name, HooksRef::default()));
        let result = interp.call(&callback, Value::Undefined, &[]);
        reg.borrow_mut().scopes.pop();
        result.map(|_| Value::Undefined)
    });

    for name in ["it", "test"] {
        let interp = sandbox.interpreter();
        let reg = registry.clone();
        let register = interp.native_function(name, 2, move |interp, _, args| {
            ensure_open(interp, &reg, name)?;
            let case_name = name_arg(interp, args)?;
            let body = arg(args, 1);
            ensure_callable(interp, &body, name)?;
            reg.borrow_mut().register(case_name, body, Vec::new());
            Ok(Value::Undefined)
        });

        if let Value::Object(function) = &register {
            let reg = registry.clone();
            interp.define_method(function, "each", 1, move |interp, _, args| {
                let rows = interp.iterate(&arg(args, 0))?;
                let reg = reg.clone();
                Ok(interp.native_function(name, 2, move |interp, _, args| {
                    ensure_open(interp, &reg, name)?;
                    let template = interp.to_string(&arg(args, 0))?;
                    let body = arg(args, 1);
                    ensure_callable(interp, &body, name)?;
                    for (index, row) in rows.iter().enumerate() {
                        let row_args = if row.is_array() {
                            interp.iterate(row)?
                        } else {
                            vec![row.clone()]
                        };
                        let case_name = format_each_name(interp, &template, &row_args, index)?;
                        reg.borrow_mut().register(case_name, body.clone(), row_args);
                    }
                    Ok(Value::Undefined)
                }))
            });
        }
        sandbox.bind(name, register);
    }

    for (name, after) in [("beforeEach", false), ("afterEach", true)] {
        let reg = registry.clone();
        sandbox.bind_function(name, 1, move |interp, _, args| {
            ensure_open(interp, &reg, name)?;
            let callback = arg(args, 0);
            ensure_callable(interp, &callback, name)?;
            let hooks = reg.borrow().current_hooks();
            let mut hooks = hooks.borrow_mut();
            if after {
                hooks.after_each.push(callback);
            } else {
                hooks.before_each.push(callback);
            }
            Ok(Value::Undefined)
        });
    }

    let expect = assertion::expect_function(sandbox.interpreter());
    sandbox.bind("expect", expect);
}

/// Substitute `printf`-style placeholders of an `each` case name
fn format_each_name(
    interp: &mut Interpreter,
    template: &str,
    args: &[Value],
    index: usize,
) -> JsResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut next = 0;
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let Some(&conversion) = chars.peek() else {
            out.push('%');
            break;
        };
        if conversion == '#' {
            chars.next();
            out.push_str(&index.to_string());
            continue;
        }
        if conversion == '%' {
            chars.next();
            out.push('%');
            continue;
        }
        if !matches!(conversion, 's' | 'd' | 'i' | 'f' | 'p' | 'j' | 'o') || next >= args.len() {
            out.push('%');
            continue;
        }
        chars.next();
        let value = &args[next];
        next += 1;
        let text = match conversion {
            's' => match value {
                Value::String(s) => s.to_string(),
                Value::Object(_) => inspect(value),
                other => other.to_js_string(),
            },
            'd' | 'i' => {
                let n = interp.to_number(value)?;
                let n = if conversion == 'i' { n.trunc() } else { n };
                crate::runtime::number_to_string(n)
            }
            'f' => crate::runtime::number_to_string(interp.to_number(value)?),
            'p' => inspect(value),
            _ => crate::runtime::builtins::json::stringify(interp, value)?
                .unwrap_or_else(|| "undefined".to_string()),
        };
        out.push_str(&text);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// TestRunner
// ---------------------------------------------------------------------------

/// Runs test files in a fresh sandbox per run
#[derive(Debug, Clone, Default)]
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runner with explicit limits
    pub fn with_config(config: &RunnerConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Register and run every case declared in `source`
    pub fn run(&self, source: &str) -> TestRunResult {
        let start = Instant::now();
        let registry: RegistryRef = Rc::new(RefCell::new(Registry::new()));
        let mut sandbox = Sandbox::new(SandboxConfig::from(&self.config));
        install_bindings(&mut sandbox, &registry);

        if let Err(e) = sandbox.evaluate(source) {
            let message = e.to_string();
            warn!(error = %message, "test registration failed");
            return TestRunResult::registration_failure(
                message,
                elapsed_ms(start),
                sandbox.take_logs(),
            );
        }

        let cases = {
            let mut registry = registry.borrow_mut();
            registry.sealed = true;
            std::mem::take(&mut registry.cases)
        };
        debug!(cases = cases.len(), "registered test cases");

        let results = cases
            .iter()
            .map(|case| self.run_case(sandbox.interpreter_mut(), case))
            .collect();
        let run = TestRunResult::from_results(results, sandbox.take_logs());
        debug!(
            total = run.total,
            passed = run.passed_count,
            failed = run.failed_count,
            "test run finished"
        );
        run
    }

    fn run_case(&self, interp: &mut Interpreter, case: &TestCase) -> TestResult {
        let name = case.full_name();
        let start = Instant::now();
        interp.set_deadline(self.config.timeout_ms);
        let outcome = run_body(interp, case);
        interp.clear_deadline();
        // Work left behind by a case never leaks into the next one
        interp.event_loop.clear();
        let duration_ms = elapsed_ms(start);

        match outcome {
            Ok(()) => {
                debug!(test = %name, duration_ms, "test passed");
                TestResult::pass(name, duration_ms)
            }
            Err(Interrupt::Abort(Abort::Timeout)) => {
                warn!(test = %name, limit_ms = self.config.timeout_ms, "test timed out");
                TestResult::fail(
                    name,
                    format!("Test timeout: exceeded {}ms", self.config.timeout_ms),
                    duration_ms,
                )
            }
            Err(Interrupt::Throw(value)) => {
                let message = error_message(interp, &value);
                debug!(test = %name, error = %message, "test failed");
                TestResult::fail(name, message, duration_ms)
            }
        }
    }
}

/// Hooks, then the body, then the after hooks. After hooks run even when the
/// body fails; the first error wins.
fn run_body(interp: &mut Interpreter, case: &TestCase) -> JsResult<()> {
    let before: Vec<Value> = case
        .hooks
        .iter()
        .flat_map(|hooks| hooks.borrow().before_each.clone())
        .collect();
    let after: Vec<Value> = case
        .hooks
        .iter()
        .rev()
        .flat_map(|hooks| hooks.borrow().after_each.iter().rev().cloned().collect::<Vec<_>>())
        .collect();

    let mut outcome = Ok(());
    for hook in &before {
        outcome = call_and_settle(interp, hook, &[]);
        if outcome.is_err() {
            break;
        }
    }
    if outcome.is_ok() {
        outcome = call_and_settle(interp, &case.body, &case.args);
    }
    if matches!(outcome, Err(Interrupt::Abort(_))) {
        return outcome;
    }
    for hook in &after {
        let result = call_and_settle(interp, hook, &[]);
        if outcome.is_ok() || matches!(result, Err(Interrupt::Abort(_))) {
            outcome = result;
        }
    }
    outcome
}

fn call_and_settle(interp: &mut Interpreter, callee: &Value, args: &[Value]) -> JsResult<()> {
    let value = interp.call(callee, Value::Undefined, args)?;
    if Interpreter::promise_state(&value).is_some() {
        interp.await_value(value)?;
    } else {
        interp.run_microtasks()?;
    }
    Ok(())
}

/// Message of a thrown value: an error's `message`, anything else converted
/// to a string
fn error_message(interp: &mut Interpreter, value: &Value) -> String {
    if let Some((_, message)) = error_parts(value) {
        return message;
    }
    interp
        .to_string(value)
        .unwrap_or_else(|_| inspect(value))
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Run `source` with the default configuration
pub fn run_tests(source: &str) -> TestRunResult {
    TestRunner::new().run(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(run: &TestRunResult) -> Vec<&str> {
        run.results.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_counts_and_failure_message() {
        let run = run_tests(
            "
            describe('calc', () => {
                it('one', () => expect(1).toBe(1));
                it('two', () => { throw new Error('boom'); });
                it('three', () => expect([1, 2]).toHaveLength(2));
            });
            ",
        );
        assert_eq!(run.total, 3);
        assert_eq!(run.passed_count, 2);
        assert_eq!(run.failed_count, 1);
        assert!(!run.passed);
        assert_eq!(run.results[1].error.as_deref(), Some("boom"));
        assert_eq!(names(&run), vec!["calc > one", "calc > two", "calc > three"]);
    }

    #[test]
    fn test_nested_suites_and_top_level_cases() {
        let run = run_tests(
            "
            test('alone', () => {});
            describe('outer', () => {
                describe('inner', () => { it('deep', () => {}); });
            });
            ",
        );
        assert_eq!(names(&run), vec!["alone", "outer > inner > deep"]);
        assert!(run.passed);
    }

    #[test]
    fn test_non_error_throw_uses_string_conversion() {
        let run = run_tests("it('raw', () => { throw 42; });");
        assert_eq!(run.results[0].error.as_deref(), Some("42"));
    }

    #[test]
    fn test_assertion_failure_message() {
        let run = run_tests("it('eq', () => expect(2).toBe(3));");
        assert_eq!(run.results[0].error.as_deref(), Some("Expected 3 but got 2"));
    }

    #[test]
    fn test_registration_failure() {
        let run = run_tests("describe('x', () => { missing(); it('never', () => {}); });");
        assert_eq!(run.total, 1);
        assert_eq!(run.failed_count, 1);
        assert_eq!(run.results[0].name, REGISTRATION_FAILURE);
        assert_eq!(
            run.error.as_deref(),
            Some("ReferenceError: missing is not defined")
        );

        let run = run_tests("it('broken', () => {");
        assert_eq!(run.total, 1);
        assert!(run.error.is_some());
    }

    #[test]
    fn test_async_cases() {
        let run = run_tests(
            "
            const later = (v) => new Promise(r => setTimeout(() => r(v), 100));
            it('awaits', async () => { expect(await later(5)).toBe(5); });
            it('rejects', () => Promise.reject(new Error('nope')));
            it('resolves matcher', () => expect(later(1)).resolves.toBe(1));
            ",
        );
        assert_eq!(run.passed_count, 2);
        assert_eq!(run.results[1].error.as_deref(), Some("nope"));
    }

    #[test]
    fn test_timeout_then_continue() {
        let config = RunnerConfig {
            timeout_ms: 100,
            ..RunnerConfig::default()
        };
        let run = TestRunner::with_config(&config).run(
            "
            it('hangs', () => new Promise(() => {}));
            it('spins', () => { while (true) {} });
            it('runs after', () => expect(true).toBeTruthy());
            ",
        );
        assert_eq!(
            run.results[0].error.as_deref(),
            Some("Test timeout: exceeded 100ms")
        );
        assert_eq!(
            run.results[1].error.as_deref(),
            Some("Test timeout: exceeded 100ms")
        );
        assert!(run.results[2].passed);
    }

    #[test]
    fn test_hooks_are_scoped() {
        let run = run_tests(
            "
            const calls = [];
            beforeEach(() => calls.push('root'));
            describe('a', () => {
                beforeEach(() => calls.push('a'));
                afterEach(() => calls.push('after-a'));
                it('first', () => expect(calls.join()).toBe('root,a'));
            });
            describe('b', () => {
                it('second', () => expect(calls.join()).toBe('root,a,after-a,root'));
            });
            ",
        );
        assert!(run.passed, "{:?}", run.results);
    }

    #[test]
    fn test_each_rows() {
        let run = run_tests(
            "
            test.each([[1, 1, 2], [2, 3, 5]])('add(%i, %i) = %d', (a, b, sum) => {
                expect(a + b).toBe(sum);
            });
            it.each(['x', { k: 1 }])('case %# is %j', (v) => expect(v).toBeDefined());
            it.each([[1, 2]])('%s and %p and %%', () => {});
            ",
        );
        assert_eq!(
            names(&run),
            vec![
                "add(1, 1) = 2",
                "add(2, 3) = 5",
                "case 0 is \"x\"",
                "case 1 is {\"k\":1}",
                "1 and 2 and %",
            ]
        );
        assert!(run.passed);
    }

    #[test]
    fn test_console_is_captured() {
        let run = run_tests("console.log('registering'); it('logs', () => console.info('inside'));");
        let messages: Vec<_> = run.logs.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["registering", "inside"]);
    }

    #[test]
    fn test_cannot_register_while_running() {
        let run = run_tests("it('outer', () => { it('inner', () => {}); });");
        assert_eq!(run.total, 1);
        assert_eq!(
            run.results[0].error.as_deref(),
            Some("Cannot call it while tests are running")
        );
    }

    #[test]
    fn test_deeply_nested_source_is_a_registration_failure() {
        let source = format!(
            "it('x', () => {{ const v = {}1{}; }});",
            "(".repeat(1500),
            ")".repeat(1500)
        );
        let run = run_tests(&source);
        assert_eq!(run.total, 1);
        assert_eq!(run.results[0].name, REGISTRATION_FAILURE);
        assert!(run
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Maximum nesting depth exceeded")));
    }

    #[test]
    fn test_deep_object_graphs_do_not_crash() {
        let run = run_tests(
            "
            const chain = (n) => { let o = {}; for (let i = 0; i < n; i++) o = { n: o }; return o; };
            it('compares', () => { const o = chain(5000); expect(o).toEqual(o); });
            it('drops', () => { chain(50000); expect(1).toBe(1); });
            it('logs', () => console.log(chain(50000)));
            ",
        );
        assert!(run.passed, "{}", run);
        assert_eq!(run.logs[0].message, "{ n: { n: { n: [Object] } } }");
    }

    #[test]
    fn test_serializes_camel_case() {
        let run = run_tests("it('ok', () => {});");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["passedCount"], 1);
        assert_eq!(json["failedCount"], 0);
        assert!(json["results"][0]["durationMs"].is_number());
    }
}
