//! Prelude module for convenient imports
//!
//! This module provides the most commonly used types for grading learner
//! code. Import everything from this module for quick access:
//!
//! ```no_run
//! use codegrade::prelude::*;
//!
//! let run = run_tests("describe('math', () => { it('adds', () => expect(1 + 1).toBe(2)); });");
//! for failure in run.failures() {
//!     for hint in hints_for(failure, 2) {
//!         println!("{}", hint);
//!     }
//! }
//! let report: Report = validate_style("a { color: red; }");
//! assert!(report.score <= 100);
//! ```

// Analyzers and their reports
pub use crate::analysis::{
    analyze_script, audit_accessibility, validate_markup, validate_style, AccessibilityReport,
    Category, ComplianceLevel, Issue, LevelCounts, QualityLevel, Report, Severity, Summary,
    WcagLevel,
};

// Test execution
pub use crate::test_runner::{run_tests, TestResult, TestRunResult, TestRunner};
pub use crate::sandbox::{LogEntry, LogLevel, Sandbox, SandboxConfig};

// Hints
pub use crate::hints::{hints_for, quick_fix_for, Hint, HintGenerator, HintKind, QuickFix};

// Configuration
pub use crate::config::{GraderConfig, HintConfig, RunnerConfig};

// Core runtime types
pub use crate::runtime::{Runtime, Value};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};

// Version constant
pub use crate::VERSION;
