//! Remediation hints for failing tests
//!
//! A failing [`TestResult`] is matched against an ordered catalog of known
//! failure signatures. The first matching record supplies the hints; when
//! nothing matches, generic fallbacks keyed on the assertion text are used.
//!
//! Hints are disclosed progressively:
//!
//! | Level | Hints |
//! |---|---|
//! | 1 | at most one observation |
//! | 2 | at most two observations or suggestions |
//! | 3 | every hint plus one documentation link |
//!
//! ```
//! use codegrade::hints::{hints_for, HintKind};
//! use codegrade::test_runner::TestResult;
//!
//! let result = TestResult::fail("sum > adds", "total is not defined", 1);
//! let hints = hints_for(&result, 1);
//! assert_eq!(hints.len(), 1);
//! assert_eq!(hints[0].kind, HintKind::Observation);
//! ```

use crate::config::HintConfig;
use crate::test_runner::TestResult;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use tracing::trace;
use HintKind::{Observation as Obs, Suggestion as Sug};

/// What a hint does for the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintKind {
    /// Describes what went wrong
    Observation,
    /// Proposes a change
    Suggestion,
    /// Points at reference material
    Documentation,
}

/// One remediation hint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: HintKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Hint {
    fn new(kind: HintKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            link: None,
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.link {
            Some(link) => write!(f, "{} ({})", self.text, link),
            None => f.write_str(&self.text),
        }
    }
}

/// One-line remediation for a recognized error shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickFix {
    pub issue: String,
    pub fix: String,
}

/// Topic of a failure, used to pick a documentation page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintCategory {
    Reference,
    Type,
    Constant,
    Recursion,
    Timeout,
    Async,
    Return,
    Assertion,
    Loop,
    General,
}

impl HintCategory {
    /// Path of the documentation page, relative to the docs base URL
    fn doc_path(&self) -> &'static str {
        match self {
            Self::Reference => "/Web/JavaScript/Reference/Errors/Not_defined",
            Self::Type => "/Web/JavaScript/Reference/Errors/Not_a_function",
            Self::Constant => "/Web/JavaScript/Reference/Errors/Invalid_const_assignment",
            Self::Recursion => "/Web/JavaScript/Reference/Errors/Too_much_recursion",
            Self::Timeout => "/Web/JavaScript/Guide/Loops_and_iteration",
            Self::Async => "/Web/JavaScript/Reference/Statements/async_function",
            Self::Return => "/Web/JavaScript/Reference/Statements/return",
            Self::Assertion => "/Web/JavaScript/Guide/Expressions_and_operators",
            Self::Loop => "/Web/JavaScript/Guide/Loops_and_iteration",
            Self::General => "/Web/JavaScript/Guide",
        }
    }

    fn doc_title(&self) -> &'static str {
        match self {
            Self::Reference => "ReferenceError: is not defined",
            Self::Type => "TypeError reference",
            Self::Constant => "const reassignment",
            Self::Recursion => "Too much recursion",
            Self::Timeout | Self::Loop => "Loops and iteration",
            Self::Async => "async functions",
            Self::Return => "The return statement",
            Self::Assertion => "Expressions and operators",
            Self::General => "JavaScript Guide",
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A known failure signature
pub struct HintRule {
    pattern: Regex,
    /// Templates; `{0}` is replaced by the first capture group
    hints: &'static [(HintKind, &'static str)],
    category: HintCategory,
}

/// Ordered, immutable list of failure signatures
pub struct HintCatalog {
    rules: Vec<HintRule>,
}

const CATALOG: &[(&str, &[(HintKind, &str)], HintCategory)] = &[
    (
        r"(\w+) is not defined",
        &[
            (Obs, "`{0}` is used but never declared in a scope the test can reach"),
            (Sug, "Check the spelling of `{0}` and declare it with let, const or function before use"),
            (Sug, "If `{0}` is declared inside another function or block, move it up or pass it in as a parameter"),
        ],
        HintCategory::Reference,
    ),
    (
        r"([\w.$]+) is not a function",
        &[
            (Obs, "`{0}` is called like a function but holds something else"),
            (Sug, "Log `typeof {0}` right before the call to see what it holds"),
            (Sug, "Look for a typo in the method name or a function that forgot to return another function"),
        ],
        HintCategory::Type,
    ),
    (
        r"cannot read properties of (undefined|null)",
        &[
            (Obs, "A property was read from a value that is {0}"),
            (Sug, "Find which variable is {0} just before the property access"),
            (Sug, "Guard the access with optional chaining (`?.`) or return early when the value is missing"),
        ],
        HintCategory::Type,
    ),
    (
        r"assignment to constant variable",
        &[
            (Obs, "A variable declared with `const` is being reassigned"),
            (Sug, "Declare it with `let` if its value needs to change"),
        ],
        HintCategory::Constant,
    ),
    (
        r"maximum call stack|too much recursion",
        &[
            (Obs, "A function keeps calling itself without stopping"),
            (Sug, "Check that the recursion has a base case and that every call moves toward it"),
        ],
        HintCategory::Recursion,
    ),
    (
        r"test timeout|exceeded \d+ms",
        &[
            (Obs, "The test did not finish in the time allowed"),
            (Sug, "Check loop conditions for a case that never becomes false"),
            (Sug, "Make sure every promise settles and async work is awaited"),
        ],
        HintCategory::Timeout,
    ),
    (
        r"expected a promise|to resolve but got|to reject but got",
        &[
            (Obs, "The value was not the promise the test expected"),
            (Sug, "Mark the function `async` or return the promise instead of its result"),
        ],
        HintCategory::Async,
    ),
    (
        r"but got undefined|missing return",
        &[
            (Obs, "The function produced `undefined`"),
            (Sug, "Add a `return` statement with the computed value"),
            (Sug, "Check that every branch of the function returns something"),
        ],
        HintCategory::Return,
    ),
];

impl HintCatalog {
    /// The built-in catalog, constructed on first use
    pub fn builtin() -> &'static HintCatalog {
        static CELL: OnceLock<HintCatalog> = OnceLock::new();
        CELL.get_or_init(|| HintCatalog {
            rules: CATALOG
                .iter()
                .map(|(pattern, hints, category)| HintRule {
                    pattern: Regex::new(pattern).expect("valid hint pattern"),
                    hints,
                    category: *category,
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Hints of the first matching record, with captures filled in.
    /// `text` is matched case-insensitively; captures keep the original case.
    fn lookup(&self, text: &str) -> Option<(Vec<Hint>, HintCategory)> {
        let lowered = text.to_ascii_lowercase();
        for rule in &self.rules {
            if let Some(captures) = rule.pattern.captures(&lowered) {
                let capture = captures
                    .get(1)
                    .map(|m| &text[m.range()])
                    .unwrap_or_default();
                let hints = rule
                    .hints
                    .iter()
                    .map(|(kind, template)| Hint::new(*kind, template.replace("{0}", capture)))
                    .collect();
                trace!(pattern = rule.pattern.as_str(), "hint rule matched");
                return Some((hints, rule.category));
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Fallbacks
// ---------------------------------------------------------------------------

fn assertion_fallback(error: &str) -> Option<Vec<Hint>> {
    static EXPECTED: OnceLock<Regex> = OnceLock::new();
    let expected = EXPECTED.get_or_init(|| {
        Regex::new(r"(?i)expected (.+?) but got (.+)").expect("valid assertion pattern")
    });
    let captures = expected.captures(error)?;
    let (want, got) = (captures[1].trim(), captures[2].trim());

    let mut hints = vec![Hint::new(
        Obs,
        format!("The test expected {} but the code produced {}", want, got),
    )];
    if let (Ok(a), Ok(b)) = (want.parse::<f64>(), got.parse::<f64>()) {
        if (a - b).abs() == 1.0 {
            hints.push(Hint::new(
                Sug,
                "The result is off by one: check loop bounds (`<` versus `<=`) and starting indexes",
            ));
        }
    }
    hints.push(Hint::new(
        Sug,
        "Trace the function by hand with the test's input and compare each step",
    ));
    Some(hints)
}

fn loop_fallback(text: &str) -> Option<Vec<Hint>> {
    let lowered = text.to_ascii_lowercase();
    if !(lowered.contains("loop") || lowered.contains("iterate")) {
        return None;
    }
    Some(vec![
        Hint::new(Obs, "The failure involves a loop"),
        Hint::new(Sug, "Check the loop's start value, end condition and step"),
        Hint::new(Sug, "Log the loop variable on each pass to see where it diverges"),
    ])
}

fn default_hints() -> Vec<Hint> {
    vec![
        Hint::new(Obs, "Read the error message closely; it names what the test checked"),
        Hint::new(Sug, "Log intermediate values with console.log to find where they go wrong"),
        Hint::new(Sug, "Run the function by hand with the test's input"),
    ]
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Produces hints for failing tests
pub struct HintGenerator<'c> {
    catalog: &'c HintCatalog,
    max_level: u8,
    docs_base_url: String,
}

impl Default for HintGenerator<'static> {
    fn default() -> Self {
        Self::new(&HintConfig::default())
    }
}

impl HintGenerator<'static> {
    /// Generator over the built-in catalog
    pub fn new(config: &HintConfig) -> Self {
        Self::with_catalog(HintCatalog::builtin(), config)
    }
}

impl<'c> HintGenerator<'c> {
    pub fn with_catalog(catalog: &'c HintCatalog, config: &HintConfig) -> Self {
        Self {
            catalog,
            max_level: config.max_level.clamp(1, 3),
            docs_base_url: config.docs_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Every hint for a result, in disclosure order, with the category used
    /// for the documentation link
    fn all_hints(&self, result: &TestResult) -> Option<(Vec<Hint>, HintCategory)> {
        if result.passed {
            return None;
        }
        let error = result.error.as_deref().unwrap_or_default();
        let text = format!("{} {}", error, result.name);
        if let Some(found) = self.catalog.lookup(&text) {
            return Some(found);
        }
        if let Some(hints) = assertion_fallback(error) {
            return Some((hints, HintCategory::Assertion));
        }
        if let Some(hints) = loop_fallback(&text) {
            return Some((hints, HintCategory::Loop));
        }
        Some((default_hints(), HintCategory::General))
    }

    /// Hints disclosed at `level` (1-3, clamped to the configured maximum)
    pub fn progressive_hints(&self, result: &TestResult, level: u8) -> Vec<Hint> {
        let Some((hints, category)) = self.all_hints(result) else {
            return Vec::new();
        };
        match level.clamp(1, self.max_level) {
            1 => hints
                .into_iter()
                .filter(|h| h.kind == HintKind::Observation)
                .take(1)
                .collect(),
            2 => hints.into_iter().take(2).collect(),
            _ => {
                let mut hints = hints;
                hints.push(Hint {
                    text: format!("Read more: {}", category.doc_title()),
                    kind: HintKind::Documentation,
                    link: Some(format!("{}{}", self.docs_base_url, category.doc_path())),
                });
                hints
            }
        }
    }

    /// A one-line fix for a recognized error shape
    pub fn quick_fix(&self, result: &TestResult) -> Option<QuickFix> {
        if result.passed {
            return None;
        }
        let error = result.error.as_deref()?;
        let lowered = error.to_ascii_lowercase();

        static NOT_DEFINED: OnceLock<Regex> = OnceLock::new();
        static NOT_FUNCTION: OnceLock<Regex> = OnceLock::new();
        let not_defined = NOT_DEFINED
            .get_or_init(|| Regex::new(r"([\w$]+) is not defined").expect("valid quick-fix pattern"));
        let not_function = NOT_FUNCTION.get_or_init(|| {
            Regex::new(r"([\w.$]+) is not a function").expect("valid quick-fix pattern")
        });

        if let Some(captures) = not_defined.captures(error) {
            let name = &captures[1];
            let fix = match closest_global(name) {
                Some(global) => format!("Did you mean `{}`?", global),
                None => format!("Declare `{}` before using it, e.g. `const {} = ...;`", name, name),
            };
            return Some(QuickFix {
                issue: format!("`{}` is not defined", name),
                fix,
            });
        }
        if lowered.contains("missing return") || lowered.contains("but got undefined") {
            return Some(QuickFix {
                issue: "The function returns undefined".to_string(),
                fix: "Add a `return` statement with the result".to_string(),
            });
        }
        if let Some(captures) = not_function.captures(error) {
            let name = &captures[1];
            return Some(QuickFix {
                issue: format!("`{}` is not a function", name),
                fix: format!("Check the spelling of `{}` and that it holds a function", name),
            });
        }
        if lowered.contains("cannot read properties of undefined")
            || lowered.contains("cannot read properties of null")
        {
            return Some(QuickFix {
                issue: "Property access on a missing value".to_string(),
                fix: "Use optional chaining (`obj?.prop`) or check the value first".to_string(),
            });
        }
        if lowered.contains("assignment to constant variable") {
            return Some(QuickFix {
                issue: "Reassigning a `const` variable".to_string(),
                fix: "Change `const` to `let`".to_string(),
            });
        }
        if lowered.contains("timeout") {
            return Some(QuickFix {
                issue: "The test timed out".to_string(),
                fix: "Make sure loops terminate and promises resolve".to_string(),
            });
        }
        None
    }
}

const COMMON_GLOBALS: &[&str] = &[
    "console", "Math", "JSON", "Date", "Array", "Object", "String", "Number", "Boolean", "Map",
    "Set", "Promise", "Error", "parseInt", "parseFloat", "isNaN", "setTimeout", "undefined",
];

/// Global within two edits of `name`, for typos like `cosole`
fn closest_global(name: &str) -> Option<&'static str> {
    COMMON_GLOBALS
        .iter()
        .filter(|g| **g != name)
        .map(|g| (levenshtein_distance(name, g), *g))
        .filter(|(distance, _)| *distance <= 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, g)| g)
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Hints for a result at `level`, using the default configuration
pub fn hints_for(result: &TestResult, level: u8) -> Vec<Hint> {
    HintGenerator::default().progressive_hints(result, level)
}

/// Quick fix for a result, if its error shape is recognized
pub fn quick_fix_for(result: &TestResult) -> Option<QuickFix> {
    HintGenerator::default().quick_fix(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn failing(name: &str, error: &str) -> TestResult {
        TestResult::fail(name, error, 0)
    }

    #[test]
    fn test_catalog_match_keeps_identifier_case() {
        let hints = hints_for(&failing("math > sum", "ReferenceError: totalSum is not defined"), 3);
        assert_eq!(
            hints[0].text,
            "`totalSum` is used but never declared in a scope the test can reach"
        );
        let doc = hints.last().unwrap();
        assert_eq!(doc.kind, HintKind::Documentation);
        assert_eq!(
            doc.link.as_deref(),
            Some("https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Errors/Not_defined")
        );
    }

    #[test]
    fn test_first_match_wins() {
        // "is not defined" comes before "but got undefined" in the catalog
        let hints = hints_for(&failing("t", "x is not defined but got undefined"), 1);
        assert!(hints[0].text.contains("`x`"));
    }

    #[test]
    fn test_levels_are_nested() {
        let result = failing("counter > counts", "Expected 3 but got 2");
        let one = hints_for(&result, 1);
        let two = hints_for(&result, 2);
        let three = hints_for(&result, 3);
        assert_eq!(one.len(), 1);
        assert!(two.len() <= 2);
        assert!(two.iter().all(|h| h.kind != HintKind::Documentation));
        for hint in one.iter().chain(two.iter()) {
            assert!(three.contains(hint));
        }
        assert_eq!(
            three.iter().filter(|h| h.kind == HintKind::Documentation).count(),
            1
        );
    }

    #[test]
    fn test_off_by_one_fallback() {
        let hints = hints_for(&failing("range", "Expected 10 but got 9"), 2);
        assert_eq!(hints[0].text, "The test expected 10 but the code produced 9");
        assert!(hints[1].text.contains("off by one"));
    }

    #[test]
    fn test_loop_and_default_fallbacks() {
        let hints = hints_for(&failing("should iterate all items", "boom"), 2);
        assert_eq!(hints[0].text, "The failure involves a loop");

        let hints = hints_for(&failing("misc", "boom"), 3);
        assert_eq!(hints.len(), 4);
        assert_eq!(hints[3].link.as_deref(), Some("https://developer.mozilla.org/en-US/docs/Web/JavaScript/Guide"));
    }

    #[test]
    fn test_passing_result_has_nothing() {
        let result = TestResult::pass("ok", 1);
        assert!(hints_for(&result, 3).is_empty());
        assert_eq!(quick_fix_for(&result), None);
    }

    #[test]
    fn test_max_level_clamps() {
        let config = HintConfig {
            max_level: 1,
            ..HintConfig::default()
        };
        let generator = HintGenerator::new(&config);
        let hints = generator.progressive_hints(&failing("t", "y is not a function"), 3);
        assert_eq!(hints.len(), 1);
    }

    #[test]
    fn test_quick_fixes() {
        let fix = quick_fix_for(&failing("t", "ReferenceError: cosole is not defined")).unwrap();
        assert_eq!(fix.issue, "`cosole` is not defined");
        assert_eq!(fix.fix, "Did you mean `console`?");

        let fix = quick_fix_for(&failing("t", "total is not defined")).unwrap();
        assert_eq!(fix.fix, "Declare `total` before using it, e.g. `const total = ...;`");

        let fix = quick_fix_for(&failing("t", "Expected 5 but got undefined")).unwrap();
        assert_eq!(fix.fix, "Add a `return` statement with the result");

        let fix = quick_fix_for(&failing("t", "TypeError: list.mapp is not a function")).unwrap();
        assert_eq!(fix.issue, "`list.mapp` is not a function");

        assert!(quick_fix_for(&failing("t", "TypeError: Cannot read properties of null (reading 'x')")).is_some());
        assert!(quick_fix_for(&failing("t", "Assignment to constant variable.")).is_some());
        assert!(quick_fix_for(&failing("t", "Test timeout: exceeded 5000ms")).is_some());
        assert_eq!(quick_fix_for(&failing("t", "Expected 1 but got 2")), None);
    }

    #[test]
    fn test_catalog_is_built_once() {
        let a = HintCatalog::builtin() as *const HintCatalog;
        let b = HintCatalog::builtin() as *const HintCatalog;
        assert_eq!(a, b);
        assert!(!HintCatalog::builtin().is_empty());
    }

    #[test]
    fn test_hint_json_shape() {
        let hints = hints_for(&failing("t", "total is not defined"), 3);
        let json = serde_json::to_value(&hints).unwrap();
        assert_eq!(json[0]["type"], "observation");
        assert!(json[0].get("kind").is_none());
        assert!(json
            .as_array()
            .unwrap()
            .iter()
            .any(|h| h["type"] == "documentation" && h["link"].is_string()));
    }
}
