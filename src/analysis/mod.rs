//! Static analyzers for learner markup, stylesheets and scripts
//!
//! Every analyzer is a pure function of its input text and returns a fresh
//! [`Report`]: a 0-100 score (100 minus accumulated penalties, floored at
//! zero), the issues found, and per-severity counts.
//!
//! | Analyzer | Input | Entry point |
//! |---|---|---|
//! | Script | JavaScript | [`analyze_script`] |
//! | Markup | HTML | [`validate_markup`] |
//! | Style | CSS | [`validate_style`] |
//! | Accessibility | HTML | [`audit_accessibility`] |

pub mod accessibility;
pub mod markup;
pub mod script;
pub mod style;

pub use accessibility::{audit_accessibility, AccessibilityReport, ComplianceLevel, LevelCounts};
pub use markup::validate_markup;
pub use script::analyze_script;
pub use style::validate_style;

use crate::dom::ElementRef;
use crate::dom::ElementTree;
use serde::Serialize;
use std::fmt;
use tracing::debug;

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// How serious an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    /// Positive feedback, never penalized
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an issue is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "criterion", rename_all = "kebab-case")]
pub enum Category {
    Structure,
    BestPractice,
    Performance,
    Compatibility,
    /// Tagged with the WCAG success criterion, e.g. `1.1.1`
    Accessibility(String),
    Complexity,
    Maintainability,
    Naming,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structure => f.write_str("structure"),
            Self::BestPractice => f.write_str("best-practice"),
            Self::Performance => f.write_str("performance"),
            Self::Compatibility => f.write_str("compatibility"),
            Self::Accessibility(criterion) => write!(f, "accessibility {}", criterion),
            Self::Complexity => f.write_str("complexity"),
            Self::Maintainability => f.write_str("maintainability"),
            Self::Naming => f.write_str("naming"),
        }
    }
}

/// WCAG conformance level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum WcagLevel {
    A,
    AA,
    AAA,
}

impl fmt::Display for WcagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::A => "A",
            Self::AA => "AA",
            Self::AAA => "AAA",
        })
    }
}

/// A single finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub category: Category,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conformance_level: Option<WcagLevel>,
    pub fixable: bool,
}

impl Issue {
    pub fn new(category: Category, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            severity,
            rule_id: None,
            conformance_level: None,
            fixable: false,
        }
    }

    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Error, message)
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, message)
    }

    pub fn info(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Info, message)
    }

    pub fn success(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Success, message)
    }

    #[must_use]
    pub fn rule(mut self, rule_id: &str) -> Self {
        self.rule_id = Some(rule_id.to_string());
        self
    }

    #[must_use]
    pub fn level(mut self, level: WcagLevel) -> Self {
        self.conformance_level = Some(level);
        self
    }

    #[must_use]
    pub fn fixable(mut self) -> Self {
        self.fixable = true;
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(rule) = &self.rule_id {
            write!(f, " ({})", rule)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Qualitative reading of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum QualityLevel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 85 => Self::Excellent,
            s if s >= 70 => Self::Good,
            s if s >= 50 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poor => "Poor",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        })
    }
}

/// Issue counts of a [`Report`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub successes: usize,
    pub level: QualityLevel,
    /// Accessibility reports only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_level: Option<LevelCounts>,
}

/// Result of one analyzer run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub score: u8,
    pub issues: Vec<Issue>,
    pub summary: Summary,
}

impl Report {
    fn new(score: u8, issues: Vec<Issue>) -> Self {
        let count = |severity| issues.iter().filter(|i| i.severity == severity).count();
        let summary = Summary {
            errors: count(Severity::Error),
            warnings: count(Severity::Warning),
            info: count(Severity::Info),
            successes: count(Severity::Success),
            level: QualityLevel::from_score(score),
            by_level: None,
        };
        Self {
            score,
            issues,
            summary,
        }
    }

    /// Report for blank input: a single info issue and a zero score
    pub(crate) fn empty_input(what: &str) -> Self {
        Self::new(
            0,
            vec![Issue::info(
                Category::Structure,
                format!("No {} to analyze", what),
            )
            .rule("empty-input")],
        )
    }

    /// Issues of the given severity
    pub fn issues_with(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// The issue raised by `rule_id`, if any
    pub fn find_rule(&self, rule_id: &str) -> Option<&Issue> {
        self.issues
            .iter()
            .find(|i| i.rule_id.as_deref() == Some(rule_id))
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Score: {}/100 ({})", self.score, self.summary.level)?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        write!(
            f,
            "{} error(s), {} warning(s), {} info",
            self.summary.errors, self.summary.warnings, self.summary.info
        )
    }
}

/// Issues plus accumulated penalty, collected during one analyzer pass
#[derive(Debug, Default)]
pub(crate) struct Findings {
    issues: Vec<Issue>,
    penalty: u32,
}

impl Findings {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record an issue and its score penalty
    pub(crate) fn add(&mut self, issue: Issue, penalty: u32) {
        self.penalty += penalty;
        self.issues.push(issue);
    }

    /// Record an issue without a penalty
    pub(crate) fn note(&mut self, issue: Issue) {
        self.add(issue, 0);
    }

    pub(crate) fn finish(self, analyzer: &str) -> Report {
        let score = 100u32.saturating_sub(self.penalty) as u8;
        let report = Report::new(score, self.issues);
        debug!(
            analyzer,
            score = report.score,
            issues = report.issues.len(),
            "analysis finished"
        );
        report
    }
}

/// `min(cap, per × count)`
pub(crate) fn capped(count: usize, per: u32, cap: u32) -> u32 {
    (per.saturating_mul(count as u32)).min(cap)
}

/// `ceil(10 × part / total)`
pub(crate) fn proportional(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((10 * part).div_ceil(total)) as u32
}

pub(crate) fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{} {}", count, one)
    } else {
        format!("{} {}", count, many)
    }
}

// ---------------------------------------------------------------------------
// Shared markup helpers
// ---------------------------------------------------------------------------

/// Link texts that say nothing about the destination
pub(crate) const GENERIC_LINK_TEXT: &[&str] = &["click here", "here", "link", "read more"];

/// `h1`..`h6` level of an element
pub(crate) fn heading_level(element: &ElementRef<'_>) -> Option<u8> {
    match element.tag() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// First heading that skips a level (e.g. `h2` followed by `h4`), as
/// `(previous, skipped_to)`
pub(crate) fn skipped_heading(tree: &ElementTree) -> Option<(u8, u8)> {
    let mut previous: Option<u8> = None;
    for level in tree.elements().filter_map(|e| heading_level(&e)) {
        if let Some(prev) = previous {
            if level > prev + 1 {
                return Some((prev, level));
            }
        }
        previous = Some(level);
    }
    None
}

/// Whether a form control has a label: `<label for>`, a wrapping `<label>`,
/// `aria-label`, `aria-labelledby` or `title`
pub(crate) fn has_label(tree: &ElementTree, control: &ElementRef<'_>) -> bool {
    if control.non_empty_attr("aria-label").is_some()
        || control.non_empty_attr("aria-labelledby").is_some()
        || control.non_empty_attr("title").is_some()
    {
        return true;
    }
    if control.has_ancestor(&["label"]) {
        return true;
    }
    match control.non_empty_attr("id") {
        Some(id) => tree
            .elements_by_tag("label")
            .any(|label| label.attr("for") == Some(id)),
        None => false,
    }
}

/// Whether an element has text or an explicit accessible name
pub(crate) fn has_accessible_name(element: &ElementRef<'_>) -> bool {
    !element.text().is_empty()
        || element.non_empty_attr("aria-label").is_some()
        || element.non_empty_attr("aria-labelledby").is_some()
        || element.non_empty_attr("title").is_some()
        || element
            .descendants()
            .any(|d| d.tag() == "img" && d.non_empty_attr("alt").is_some())
}

/// Input types that are not labeled form fields
const UNLABELED_INPUT_TYPES: &[&str] = &["hidden", "submit", "button", "reset", "image"];

/// `type` of an `<input>`, lower-cased, `text` when missing
pub(crate) fn input_type<'a>(element: &ElementRef<'a>) -> String {
    element
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "text".to_string())
}

/// Inputs, selects and textareas that need a label
pub(crate) fn form_controls(tree: &ElementTree) -> Vec<ElementRef<'_>> {
    tree.elements_by_tags(&["input", "select", "textarea"])
        .filter(|e| e.tag() != "input" || !UNLABELED_INPUT_TYPES.contains(&input_type(e).as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quality_levels() {
        assert_eq!(QualityLevel::from_score(100), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(85), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(84), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(70), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(50), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(49), QualityLevel::Poor);
    }

    #[test]
    fn test_score_is_floored() {
        let mut findings = Findings::new();
        for _ in 0..8 {
            findings.add(Issue::error(Category::Structure, "bad"), 20);
        }
        let report = findings.finish("test");
        assert_eq!(report.score, 0);
        assert_eq!(report.summary.errors, 8);
        assert_eq!(report.summary.level, QualityLevel::Poor);
    }

    #[test]
    fn test_penalty_helpers() {
        assert_eq!(capped(3, 2, 10), 6);
        assert_eq!(capped(9, 2, 10), 10);
        assert_eq!(proportional(1, 3), 4);
        assert_eq!(proportional(3, 3), 10);
        assert_eq!(proportional(0, 0), 0);
    }

    #[test]
    fn test_issue_serialization() {
        let issue = Issue::warning(Category::Accessibility("1.1.1".into()), "missing alt")
            .rule("image-alt")
            .level(WcagLevel::A);
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["category"]["kind"], "accessibility");
        assert_eq!(json["category"]["criterion"], "1.1.1");
        assert_eq!(json["ruleId"], "image-alt");
        assert_eq!(json["conformanceLevel"], "A");
        assert_eq!(json["severity"], "warning");

        let plain = serde_json::to_value(Issue::info(Category::BestPractice, "x")).unwrap();
        assert_eq!(plain["category"]["kind"], "best-practice");
        assert!(plain.get("ruleId").is_none());
    }

    #[test]
    fn test_empty_input_report() {
        let report = Report::empty_input("markup");
        assert_eq!(report.score, 0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Info);
    }
}
