//! Codegrade: code-quality analyzers and an exercise test runner
//!
//! Codegrade grades source text typed by learners. Static analyzers turn
//! HTML, CSS and JavaScript into scored [`Report`]s, and a sandboxed test
//! runner executes learner-written `describe` / `it` / `expect` suites
//! against learner code. Failing tests can be turned into progressive
//! hints.
//!
//! # Quick Start
//!
//! ```no_run
//! use codegrade::{analyze_script, run_tests, validate_markup};
//!
//! let report = validate_markup("<!DOCTYPE html><html lang=\"en\"><title>x</title><h1>Hi</h1></html>");
//! println!("markup score: {}", report.score);
//!
//! let report = analyze_script("var x = 1; if (x == '1') { console.log(x); }");
//! for issue in &report.issues {
//!     println!("{}", issue);
//! }
//!
//! let run = run_tests(r#"
//!     function add(a, b) { return a + b; }
//!     describe("add", () => {
//!         it("adds", () => expect(add(1, 2)).toBe(3));
//!     });
//! "#);
//! assert!(run.passed);
//! ```
//!
//! # Module Overview
//!
//! Learner scripts flow: Source → [`lexer`] → [`parser`] → [`ast`] → [`runtime`] → Result
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Analyzers** | [`analysis`], [`dom`] |
//! | **Test execution** | [`test_runner`], [`assertion`], [`sandbox`] |
//! | **Interpreter** | [`lexer`], [`parser`], [`ast`], [`runtime`], [`event_loop`] |
//! | **Feedback** | [`hints`] |
//! | **Support** | [`config`], [`error`](Error), [`prelude`] |
//!
//! Every public entry point returns a value; nothing panics on bad input.
//! The library emits `tracing` events but never installs a subscriber.

// - type_complexity: interpreter helpers return nested Result<Option<Value>>
// - too_many_arguments: function calls carry the full call context
// - new_without_default: some types need explicit limits at construction
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::new_without_default)]

pub mod analysis;
pub mod assertion;
pub mod ast;
pub mod config;
pub mod dom;
pub mod event_loop;
pub mod hints;
pub mod lexer;
pub mod parser;
pub mod prelude;
pub mod runtime;
pub mod sandbox;
pub mod test_runner;

mod error;

pub use analysis::{
    analyze_script, audit_accessibility, validate_markup, validate_style, AccessibilityReport,
    Category, ComplianceLevel, Issue, Report, Severity,
};
pub use config::GraderConfig;
pub use error::{Error, ErrorKind, Result};
pub use hints::{hints_for, quick_fix_for, Hint, HintGenerator, HintKind, QuickFix};
pub use runtime::{Runtime, Value};
pub use test_runner::{run_tests, TestResult, TestRunResult, TestRunner};

/// Codegrade version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
