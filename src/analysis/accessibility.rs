//! WCAG audit of an HTML document
//!
//! Checks are grouped the way WCAG groups its principles: perceivable,
//! operable, understandable and robust. Every rule reports at most one
//! aggregated issue, tagged with its success criterion and conformance
//! level. The overall compliance level is the highest level with no
//! failures at or below it.

use super::{
    form_controls, has_accessible_name, has_label, input_type, plural, skipped_heading, Category,
    Findings, Issue, Report, Severity, WcagLevel, GENERIC_LINK_TEXT,
};
use crate::dom::{ElementRef, ElementTree};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Highest WCAG level a document conforms to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComplianceLevel {
    NotCompliant,
    A,
    AA,
    AAA,
}

impl ComplianceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotCompliant => "Not Compliant",
            Self::A => "A",
            Self::AA => "AA",
            Self::AAA => "AAA",
        }
    }

    /// Level implied by the issues found
    pub fn from_issues(issues: &[Issue]) -> Self {
        let failed = |level| issues.iter().any(|i| i.conformance_level == Some(level));
        if failed(WcagLevel::A) {
            Self::NotCompliant
        } else if failed(WcagLevel::AA) {
            Self::A
        } else if failed(WcagLevel::AAA) {
            Self::AA
        } else {
            Self::AAA
        }
    }
}

impl fmt::Display for ComplianceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComplianceLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Issue counts per WCAG level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelCounts {
    pub a: usize,
    pub aa: usize,
    pub aaa: usize,
}

impl LevelCounts {
    fn tally(issues: &[Issue]) -> Self {
        let mut counts = Self::default();
        for issue in issues {
            match issue.conformance_level {
                Some(WcagLevel::A) => counts.a += 1,
                Some(WcagLevel::AA) => counts.aa += 1,
                Some(WcagLevel::AAA) => counts.aaa += 1,
                None => {}
            }
        }
        counts
    }
}

/// A [`Report`] plus the derived compliance level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityReport {
    #[serde(flatten)]
    pub report: Report,
    pub compliance_level: ComplianceLevel,
}

impl AccessibilityReport {
    fn from_report(mut report: Report) -> Self {
        report.summary.by_level = Some(LevelCounts::tally(&report.issues));
        let compliance_level = ComplianceLevel::from_issues(&report.issues);
        Self {
            report,
            compliance_level,
        }
    }
}

impl std::ops::Deref for AccessibilityReport {
    type Target = Report;

    fn deref(&self) -> &Report {
        &self.report
    }
}

impl fmt::Display for AccessibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "WCAG compliance: {}", self.compliance_level)?;
        write!(f, "{}", self.report)
    }
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

struct Rule {
    id: &'static str,
    criterion: &'static str,
    level: WcagLevel,
    severity: Severity,
    penalty: u32,
}

macro_rules! rules {
    ($($name:ident = $id:literal, $criterion:literal, $level:ident, $severity:ident, $penalty:literal;)*) => {
        $(
            const $name: Rule = Rule {
                id: $id,
                criterion: $criterion,
                level: WcagLevel::$level,
                severity: Severity::$severity,
                penalty: $penalty,
            };
        )*
    };
}

rules! {
    IMAGE_ALT = "image-alt", "1.1.1", A, Error, 10;
    BUTTON_NAME = "button-name", "1.1.1", A, Error, 8;
    INPUT_IMAGE_ALT = "input-image-alt", "1.1.1", A, Error, 8;
    USE_OF_COLOR = "use-of-color", "1.4.1", A, Warning, 5;
    TABLE_CAPTION = "table-caption", "1.3.1", A, Warning, 3;
    TABLE_HEADERS = "table-headers", "1.3.1", A, Error, 8;
    HEADING_ORDER = "heading-order", "1.3.1", A, Warning, 3;
    AUTOCOMPLETE = "autocomplete", "1.3.5", AA, Info, 3;
    KEYBOARD = "keyboard-access", "2.1.1", A, Error, 8;
    TABINDEX_NEGATIVE = "tabindex-negative", "2.4.3", A, Warning, 5;
    TABINDEX_POSITIVE = "tabindex-positive", "2.4.3", A, Warning, 5;
    BYPASS_BLOCKS = "bypass-blocks", "2.4.1", A, Warning, 5;
    PAGE_TITLE = "page-title", "2.4.2", A, Error, 8;
    LINK_NAME = "link-name", "2.4.4", A, Error, 8;
    LINK_PURPOSE = "link-purpose", "2.4.4", A, Warning, 5;
    CONTROL_LABEL = "control-label", "2.4.6", AA, Error, 5;
    HTML_LANG = "html-lang", "3.1.1", A, Error, 10;
    ON_CHANGE = "on-change", "3.2.2", A, Warning, 5;
    NEW_WINDOW = "new-window", "3.2.5", AAA, Info, 3;
    ERROR_IDENTIFICATION = "error-identification", "3.3.1", A, Warning, 5;
    INPUT_LABEL = "input-label", "3.3.2", A, Error, 10;
    PARSING = "parsing", "4.1.1", A, Error, 10;
    DUPLICATE_ID = "duplicate-id", "4.1.1", A, Error, 8;
    ROLE_NAME = "role-name", "4.1.2", A, Error, 8;
}

struct Audit<'t> {
    tree: &'t ElementTree,
    findings: Findings,
}

impl<'t> Audit<'t> {
    fn flag(&mut self, rule: &Rule, message: impl Into<String>) {
        let issue = Issue::new(
            Category::Accessibility(rule.criterion.to_string()),
            rule.severity,
            format!("{} (WCAG {})", message.into(), rule.criterion),
        )
        .rule(rule.id)
        .level(rule.level);
        self.findings.add(issue, rule.penalty);
    }
}

/// Audit an HTML document against WCAG 2.1
pub fn audit_accessibility(source: &str) -> AccessibilityReport {
    if source.trim().is_empty() {
        // Nothing to audit counts against Level A: there is no title and no language
        let mut report = Report::empty_input("HTML");
        for issue in &mut report.issues {
            issue.conformance_level = Some(WcagLevel::A);
        }
        return AccessibilityReport::from_report(report);
    }
    debug!(analyzer = "accessibility", bytes = source.len(), "analysis started");

    let tree = ElementTree::parse(source);
    let mut audit = Audit {
        tree: &tree,
        findings: Findings::new(),
    };
    perceivable(&mut audit);
    operable(&mut audit);
    understandable(&mut audit);
    robust(&mut audit);

    AccessibilityReport::from_report(audit.findings.finish("accessibility"))
}

// ---------------------------------------------------------------------------
// Perceivable
// ---------------------------------------------------------------------------

const COLOR_WORDS: &str = "red|green|blue|yellow|orange|purple|pink|grey|gray";

fn perceivable(audit: &mut Audit<'_>) {
    let tree = audit.tree;

    let images: Vec<_> = tree.elements_by_tag("img").collect();
    let missing = images.iter().filter(|img| !img.has_attr("alt")).count();
    if missing > 0 {
        audit.flag(
            &IMAGE_ALT,
            format!("{} of {} images have no alt text", missing, images.len()),
        );
    }

    let unnamed_buttons = tree
        .elements_by_tag("button")
        .filter(|b| !has_accessible_name(b))
        .count()
        + tree
            .elements_by_tag("input")
            .filter(|i| input_type(i) == "button" && i.non_empty_attr("value").is_none())
            .filter(|i| i.non_empty_attr("aria-label").is_none())
            .count();
    if unnamed_buttons > 0 {
        audit.flag(
            &BUTTON_NAME,
            format!("{} without an accessible name", plural(unnamed_buttons, "button", "buttons")),
        );
    }

    let image_inputs = tree
        .elements_by_tag("input")
        .filter(|i| input_type(i) == "image" && i.non_empty_attr("alt").is_none())
        .count();
    if image_inputs > 0 {
        audit.flag(
            &INPUT_IMAGE_ALT,
            format!("{} without alt text", plural(image_inputs, "image input", "image inputs")),
        );
    }

    static COLOR_ONLY: OnceLock<Regex> = OnceLock::new();
    let color_only = COLOR_ONLY.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)\b(?:{c})\s+(?:button|link|text|field|fields|item|items|box|boxes|one|ones)\b|\b(?:shown|marked|highlighted|labeled|labelled)\s+in\s+(?:{c})\b",
            c = COLOR_WORDS
        ))
        .expect("valid color pattern")
    });
    if let Some(found) = color_only.find(&tree.text()) {
        audit.flag(
            &USE_OF_COLOR,
            format!("Instructions rely on color alone: \"{}\"", found.as_str()),
        );
    }

    let tables: Vec<_> = tree
        .elements_by_tag("table")
        .filter(|t| !matches!(t.attr("role"), Some("presentation") | Some("none")))
        .collect();
    let uncaptioned = tables
        .iter()
        .filter(|t| !t.descendants().any(|d| d.tag() == "caption") && t.non_empty_attr("aria-label").is_none())
        .count();
    if uncaptioned > 0 {
        audit.flag(
            &TABLE_CAPTION,
            format!("{} without a caption", plural(uncaptioned, "data table", "data tables")),
        );
    }
    let headerless = tables
        .iter()
        .filter(|t| !t.descendants().any(|d| d.tag() == "th"))
        .count();
    if headerless > 0 {
        audit.flag(
            &TABLE_HEADERS,
            format!("{} without header cells", plural(headerless, "data table", "data tables")),
        );
    }

    if let Some((previous, next)) = skipped_heading(tree) {
        audit.flag(
            &HEADING_ORDER,
            format!("Heading level skipped from <h{}> to <h{}>", previous, next),
        );
    }

    let personal = tree
        .elements_by_tag("input")
        .filter(|i| is_personal_data(i) && !i.has_attr("autocomplete"))
        .count();
    if personal > 0 {
        audit.flag(
            &AUTOCOMPLETE,
            format!(
                "{} collecting personal data without autocomplete",
                plural(personal, "input", "inputs")
            ),
        );
    }
}

const PERSONAL_TYPES: &[&str] = &["email", "tel"];
const PERSONAL_NAMES: &[&str] = &[
    "name", "email", "phone", "tel", "address", "street", "city", "zip", "postal", "country",
    "birthday", "username",
];

fn is_personal_data(input: &ElementRef<'_>) -> bool {
    if PERSONAL_TYPES.contains(&input_type(input).as_str()) {
        return true;
    }
    ["name", "id"].iter().filter_map(|a| input.attr(a)).any(|value| {
        let value = value.to_ascii_lowercase();
        PERSONAL_NAMES.iter().any(|p| value.contains(p))
    })
}

// ---------------------------------------------------------------------------
// Operable
// ---------------------------------------------------------------------------

const INTERACTIVE: &[&str] = &["a", "button", "input", "select", "textarea", "summary"];

fn is_interactive(element: &ElementRef<'_>) -> bool {
    match element.tag() {
        "a" => element.has_attr("href"),
        tag => INTERACTIVE.contains(&tag),
    }
}

fn tabindex(element: &ElementRef<'_>) -> Option<i64> {
    element.attr("tabindex").and_then(|v| v.trim().parse().ok())
}

fn operable(audit: &mut Audit<'_>) {
    let tree = audit.tree;

    let mouse_only = tree
        .elements()
        .filter(|e| e.has_attr("onclick") && !is_interactive(e))
        .filter(|e| !["onkeydown", "onkeyup", "onkeypress"].iter().any(|k| e.has_attr(k)))
        .count();
    if mouse_only > 0 {
        audit.flag(
            &KEYBOARD,
            format!(
                "{} a click handler but no keyboard handler",
                plural(mouse_only, "element has", "elements have")
            ),
        );
    }

    let negative = tree
        .elements()
        .filter(|e| is_interactive(e) && tabindex(e).is_some_and(|t| t < 0))
        .count();
    if negative > 0 {
        audit.flag(
            &TABINDEX_NEGATIVE,
            format!(
                "{} removed from the tab order",
                plural(negative, "interactive element is", "interactive elements are")
            ),
        );
    }
    let positive = tree.elements().filter(|e| tabindex(e).is_some_and(|t| t > 0)).count();
    if positive > 0 {
        audit.flag(
            &TABINDEX_POSITIVE,
            format!(
                "{} a positive tabindex",
                plural(positive, "element has", "elements have")
            ),
        );
    }

    let has_main = tree.count("main") > 0 || tree.elements().any(|e| e.attr("role") == Some("main"));
    let has_skip_link = tree.elements_by_tag("a").any(|a| {
        a.attr("href").is_some_and(|h| h.starts_with('#'))
            && a.text().to_ascii_lowercase().contains("skip")
    });
    if !has_main && !has_skip_link {
        audit.flag(&BYPASS_BLOCKS, "No skip link or <main> landmark");
    }

    let titled = tree
        .elements_by_tag("title")
        .any(|t| !t.text().trim().is_empty());
    if !titled {
        audit.flag(&PAGE_TITLE, "Page has no title");
    }

    let links: Vec<_> = tree
        .elements_by_tag("a")
        .filter(|a| a.has_attr("href"))
        .collect();
    let empty_links = links.iter().filter(|a| !has_accessible_name(a)).count();
    if empty_links > 0 {
        audit.flag(
            &LINK_NAME,
            format!("{} no text", plural(empty_links, "link has", "links have")),
        );
    }
    let generic: Vec<String> = links
        .iter()
        .map(|a| a.text().to_ascii_lowercase())
        .filter(|t| GENERIC_LINK_TEXT.contains(&t.as_str()))
        .collect();
    if let Some(first) = generic.first() {
        audit.flag(
            &LINK_PURPOSE,
            format!(
                "{} with text like \"{}\" that does not describe the destination",
                plural(generic.len(), "link", "links"),
                first
            ),
        );
    }

    let unlabeled_choices = form_controls(tree)
        .iter()
        .filter(|c| !is_text_entry(c) && !has_label(tree, c))
        .count();
    if unlabeled_choices > 0 {
        audit.flag(
            &CONTROL_LABEL,
            format!(
                "{} without a label",
                plural(unlabeled_choices, "choice control", "choice controls")
            ),
        );
    }
}

const TEXT_TYPES: &[&str] = &[
    "text", "email", "password", "search", "tel", "url", "number", "date", "datetime-local",
    "month", "week", "time",
];

/// Single-line text entry, as opposed to choice controls, selects and
/// textareas
fn is_text_entry(control: &ElementRef<'_>) -> bool {
    control.tag() == "input" && TEXT_TYPES.contains(&input_type(control).as_str())
}

// ---------------------------------------------------------------------------
// Understandable
// ---------------------------------------------------------------------------

fn understandable(audit: &mut Audit<'_>) {
    let tree = audit.tree;

    let lang = tree
        .root_element()
        .and_then(|html| html.non_empty_attr("lang"));
    if lang.is_none() {
        audit.flag(&HTML_LANG, "Page language is not set on <html>");
    }

    let surprising = tree
        .elements()
        .filter_map(|e| e.attr("onchange"))
        .filter(|handler| {
            let handler = handler.to_ascii_lowercase();
            ["submit", "location", "navigate", "window.open"]
                .iter()
                .any(|k| handler.contains(k))
        })
        .count();
    if surprising > 0 {
        audit.flag(
            &ON_CHANGE,
            format!(
                "{} on change without warning",
                plural(surprising, "control submits or navigates", "controls submit or navigate")
            ),
        );
    }

    let unannounced = tree
        .elements_by_tag("a")
        .filter(|a| a.attr("target").is_some_and(|t| t.eq_ignore_ascii_case("_blank")))
        .filter(|a| {
            let name = format!(
                "{} {} {}",
                a.text(),
                a.attr("aria-label").unwrap_or_default(),
                a.attr("title").unwrap_or_default()
            )
            .to_ascii_lowercase();
            !(name.contains("new window") || name.contains("new tab") || name.contains("opens in"))
        })
        .count();
    if unannounced > 0 {
        audit.flag(
            &NEW_WINDOW,
            format!(
                "{} a new window without saying so",
                plural(unannounced, "link opens", "links open")
            ),
        );
    }

    let required = tree
        .elements_by_tags(&["input", "select", "textarea"])
        .filter(|c| c.has_attr("required") || c.attr("aria-required") == Some("true"))
        .count();
    let reports_errors = tree.elements().any(|e| {
        e.has_attr("aria-invalid")
            || e.has_attr("aria-errormessage")
            || e.has_attr("aria-live")
            || e.attr("role") == Some("alert")
    });
    if required > 0 && !reports_errors {
        audit.flag(
            &ERROR_IDENTIFICATION,
            format!(
                "{} but no error messages are announced",
                plural(required, "field is required", "fields are required")
            ),
        );
    }

    let unlabeled_text = form_controls(tree)
        .iter()
        .filter(|c| is_text_entry(c) && !has_label(tree, c))
        .count();
    if unlabeled_text > 0 {
        audit.flag(
            &INPUT_LABEL,
            format!("{} without a label", plural(unlabeled_text, "text input", "text inputs")),
        );
    }
}

// ---------------------------------------------------------------------------
// Robust
// ---------------------------------------------------------------------------

const NAMED_ROLES: &[&str] = &["button", "link", "checkbox", "radio"];

fn robust(audit: &mut Audit<'_>) {
    let tree = audit.tree;

    if let Some(first) = tree.structural_errors().first() {
        let count = tree.structural_errors().len();
        audit.flag(
            &PARSING,
            format!("{}, first: {}", plural(count, "markup error", "markup errors"), first),
        );
    }

    let duplicates = tree.duplicate_ids();
    if !duplicates.is_empty() {
        audit.flag(
            &DUPLICATE_ID,
            format!("Duplicate id values: {}", duplicates.join(", ")),
        );
    }

    let unnamed_roles = tree
        .elements()
        .filter(|e| e.attr("role").is_some_and(|r| NAMED_ROLES.contains(&r)))
        .filter(|e| !has_accessible_name(e))
        .count();
    if unnamed_roles > 0 {
        audit.flag(
            &ROLE_NAME,
            format!(
                "{} an interactive role but no accessible name",
                plural(unnamed_roles, "element has", "elements have")
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html lang=\"en\"><head><title>Recipes</title></head><body><main>{}</main></body></html>",
            body
        )
    }

    fn rules(report: &AccessibilityReport) -> Vec<&str> {
        report
            .issues
            .iter()
            .filter_map(|i| i.rule_id.as_deref())
            .collect()
    }

    #[test]
    fn test_clean_page_is_aaa() {
        let report = audit_accessibility(&page("<h1>Soup</h1><img src=\"soup.png\" alt=\"Tomato soup\">"));
        assert!(report.issues.is_empty(), "{:?}", report.issues);
        assert_eq!(report.score, 100);
        assert_eq!(report.compliance_level, ComplianceLevel::AAA);
        assert_eq!(report.summary.by_level, Some(LevelCounts::default()));
    }

    #[test]
    fn test_single_missing_alt() {
        let report = audit_accessibility(&page("<h1>Soup</h1><img src=\"soup.png\">"));
        assert_eq!(report.summary.errors, 1);
        assert_eq!(rules(&report), vec!["image-alt"]);
        let issue = &report.issues[0];
        assert_eq!(issue.category, Category::Accessibility("1.1.1".to_string()));
        assert_eq!(issue.conformance_level, Some(WcagLevel::A));
        assert_eq!(issue.message, "1 of 1 images have no alt text (WCAG 1.1.1)");
        assert_eq!(report.score, 90);
        assert_eq!(report.compliance_level, ComplianceLevel::NotCompliant);
    }

    #[test]
    fn test_no_images_no_alt_issue() {
        let report = audit_accessibility(&page("<p>Text only</p>"));
        assert!(report.find_rule("image-alt").is_none());
    }

    #[test]
    fn test_many_images_one_issue() {
        let report = audit_accessibility(&page("<img src=a><img src=b><img src=c alt=\"\">"));
        let alt: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("image-alt"))
            .collect();
        assert_eq!(alt.len(), 1);
        assert!(alt[0].message.starts_with("2 of 3 images"));
    }

    #[test]
    fn test_compliance_levels() {
        let report = audit_accessibility(&page("<select><option>One</option></select>"));
        assert_eq!(rules(&report), vec!["control-label"]);
        assert_eq!(report.compliance_level, ComplianceLevel::A);
        assert_eq!(
            report.summary.by_level,
            Some(LevelCounts { a: 0, aa: 1, aaa: 0 })
        );

        let report = audit_accessibility(&page("<a href=\"/x\" target=\"_blank\">Docs</a>"));
        assert_eq!(rules(&report), vec!["new-window"]);
        assert_eq!(report.compliance_level, ComplianceLevel::AA);

        let report = audit_accessibility(&page(
            "<a href=\"/x\" target=\"_blank\">Docs (opens in new tab)</a>",
        ));
        assert_eq!(report.compliance_level, ComplianceLevel::AAA);
    }

    #[test]
    fn test_document_level_rules() {
        let report = audit_accessibility("<div>hello</div>");
        let found = rules(&report);
        assert!(found.contains(&"html-lang"));
        assert!(found.contains(&"page-title"));
        assert!(found.contains(&"bypass-blocks"));

        let report = audit_accessibility(
            "<html lang=\"en\"><head><title>x</title></head><body><a href=\"#content\">Skip to content</a><div id=\"content\"></div></body></html>",
        );
        assert!(report.find_rule("bypass-blocks").is_none());
    }

    #[test]
    fn test_operable_rules() {
        let report = audit_accessibility(&page(
            "<div onclick=\"go()\">Go</div>\
             <button tabindex=\"-1\">Hidden</button>\
             <span tabindex=\"3\">Jump</span>\
             <a href=\"/a\"></a><a href=\"/b\">click here</a>",
        ));
        let found = rules(&report);
        for rule in [
            "keyboard-access",
            "tabindex-negative",
            "tabindex-positive",
            "link-name",
            "link-purpose",
        ] {
            assert!(found.contains(&rule), "missing {}", rule);
        }
    }

    #[test]
    fn test_forms() {
        let report = audit_accessibility(&page(
            "<form><input type=\"email\" name=\"email\" required>\
             <input type=\"checkbox\" id=\"c\"><label for=\"c\">Subscribe</label>\
             <select onchange=\"this.form.submit()\"><option>1</option></select></form>",
        ));
        let found = rules(&report);
        assert!(found.contains(&"input-label"));
        assert!(found.contains(&"autocomplete"));
        assert!(found.contains(&"error-identification"));
        assert!(found.contains(&"on-change"));
        assert!(found.contains(&"control-label"));
        assert_eq!(
            report.find_rule("control-label").unwrap().message,
            "1 choice control without a label (WCAG 2.4.6)"
        );
    }

    #[test]
    fn test_tables_and_color() {
        let report = audit_accessibility(&page(
            "<p>Press the green button to continue.</p>\
             <table><tr><td>1</td></tr></table>\
             <table role=\"presentation\"><tr><td>layout</td></tr></table>",
        ));
        let found = rules(&report);
        assert!(found.contains(&"use-of-color"));
        assert!(found.contains(&"table-caption"));
        assert!(found.contains(&"table-headers"));
        assert_eq!(
            report.find_rule("table-headers").unwrap().message,
            "1 data table without header cells (WCAG 1.3.1)"
        );
    }

    #[test]
    fn test_robust_rules() {
        let report = audit_accessibility(&page(
            "<p id=\"a\">1</p><p id=\"a\">2</p><div role=\"button\"></div><div><span></div>",
        ));
        let found = rules(&report);
        assert!(found.contains(&"duplicate-id"));
        assert!(found.contains(&"role-name"));
        assert!(found.contains(&"parsing"));
    }

    #[test]
    fn test_empty_input() {
        let report = audit_accessibility("  ");
        assert_eq!(report.score, 0);
        assert_eq!(report.compliance_level, ComplianceLevel::NotCompliant);
        assert_eq!(
            report.compliance_level,
            ComplianceLevel::from_issues(&report.issues)
        );
        assert_eq!(report.summary.by_level.map(|c| c.a), Some(1));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["complianceLevel"], "Not Compliant");
        assert_eq!(json["summary"]["byLevel"]["a"], 1);
        assert_eq!(json["score"], 0);
    }
}
