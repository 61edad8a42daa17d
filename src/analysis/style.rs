//! CSS checks
//!
//! Comments are stripped and string contents blanked before anything else.
//! A brace imbalance makes every later check unreliable, so it ends the
//! analysis early.

use super::{capped, plural, Category, Findings, Issue, Report};
use regex::Regex;
use rustc_hash::FxHashSet as HashSet;
use std::sync::OnceLock;
use tracing::debug;

const NAMED_COLORS: &[&str] = &[
    "aqua", "black", "blue", "brown", "coral", "crimson", "cyan", "fuchsia", "gold", "gray",
    "green", "grey", "indigo", "lime", "magenta", "maroon", "navy", "olive", "orange", "pink",
    "purple", "red", "salmon", "silver", "teal", "tomato", "violet", "white", "yellow",
];

const VENDOR_PREFIXES: &[&str] = &["-webkit-", "-moz-", "-ms-", "-o-"];

/// Validate a stylesheet
pub fn validate_style(source: &str) -> Report {
    if source.trim().is_empty() {
        return Report::empty_input("CSS");
    }
    debug!(analyzer = "style", bytes = source.len(), "analysis started");

    let mut findings = Findings::new();
    let stripped = strip_comments(source);
    let (masked, unterminated) = mask_strings(&stripped);

    if let Some(message) = brace_imbalance(&masked) {
        findings.add(
            Issue::error(Category::Structure, message).rule("brace-balance"),
            20,
        );
        return findings.finish("style");
    }
    for quote in unterminated {
        findings.add(
            Issue::error(
                Category::Structure,
                format!("Unterminated string opened with {}", quote),
            )
            .rule("unterminated-string"),
            15,
        );
    }

    let sheet = Stylesheet::parse(&masked);
    check_semicolons(&masked, &mut findings);
    check_important(&sheet, &mut findings);
    check_selectors(&sheet, &mut findings);
    check_units(&sheet, &mut findings);
    check_animation(&sheet, &mut findings);
    check_duplicates(&sheet, &mut findings);
    check_vendor_prefixes(&sheet, &mut findings);
    check_colors(&sheet, &mut findings);

    findings.finish("style")
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Replace `/* ... */` with spaces, keeping newlines
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_comment = false;
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_comment = false;
                out.push_str("  ");
            } else {
                out.push(if c == '\n' { '\n' } else { ' ' });
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            in_comment = true;
            out.push_str("  ");
        } else {
            out.push(c);
        }
    }
    out
}

/// Blank string contents. Returns the masked text and the quote kinds of
/// strings left open at the end of a line.
fn mask_strings(source: &str) -> (String, Vec<char>) {
    let mut out = String::with_capacity(source.len());
    let mut unterminated: Vec<char> = Vec::new();
    let mut open: Option<char> = None;
    let mut escaped = false;
    for c in source.chars() {
        match open {
            Some(quote) => {
                if c == '\n' {
                    if !unterminated.contains(&quote) {
                        unterminated.push(quote);
                    }
                    open = None;
                    out.push('\n');
                } else if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == quote {
                    open = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    open = Some(c);
                }
                out.push(c);
            }
        }
    }
    if let Some(quote) = open {
        if !unterminated.contains(&quote) {
            unterminated.push(quote);
        }
    }
    (out, unterminated)
}

fn brace_imbalance(masked: &str) -> Option<String> {
    let mut depth: i64 = 0;
    for (index, line) in masked.lines().enumerate() {
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Some(format!("Unexpected '}}' on line {}", index + 1));
                    }
                }
                _ => {}
            }
        }
    }
    if depth > 0 {
        return Some(format!("{} not closed", plural(depth as usize, "block is", "blocks are")));
    }
    None
}

// ---------------------------------------------------------------------------
// Rule tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Declaration {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Rule {
    /// Selector list or at-rule prelude
    pub prelude: String,
    /// Style rule, as opposed to an at-rule or keyframe selector
    pub is_style_rule: bool,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Default)]
pub(crate) struct Stylesheet {
    pub rules: Vec<Rule>,
}

impl Stylesheet {
    /// Split masked, balanced CSS into blocks and their declarations
    pub(crate) fn parse(masked: &str) -> Self {
        struct Frame {
            rule: Rule,
            in_keyframes: bool,
        }

        let mut sheet = Self::default();
        let mut stack: Vec<Frame> = Vec::new();
        let mut pending = String::new();

        for c in masked.chars() {
            match c {
                '{' => {
                    let prelude = pending.trim().to_string();
                    pending.clear();
                    let parent_keyframes = stack.last().is_some_and(|f| f.in_keyframes);
                    let at_rule = prelude.starts_with('@');
                    stack.push(Frame {
                        in_keyframes: at_rule && prelude.contains("keyframes"),
                        rule: Rule {
                            is_style_rule: !at_rule && !parent_keyframes,
                            prelude,
                            declarations: Vec::new(),
                        },
                    });
                }
                ';' => {
                    if let Some(frame) = stack.last_mut() {
                        push_declaration(&mut frame.rule, &pending);
                    }
                    pending.clear();
                }
                '}' => {
                    if let Some(mut frame) = stack.pop() {
                        push_declaration(&mut frame.rule, &pending);
                        sheet.rules.push(frame.rule);
                    }
                    pending.clear();
                }
                _ => pending.push(c),
            }
        }
        sheet
    }

    fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.rules.iter().flat_map(|r| r.declarations.iter())
    }

    /// Individual selectors of every style rule
    fn selectors(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|r| r.is_style_rule)
            .flat_map(|r| r.prelude.split(','))
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn push_declaration(rule: &mut Rule, text: &str) {
    let text = text.trim();
    if let Some((property, value)) = text.split_once(':') {
        let property = property.trim();
        if !property.is_empty() && !property.contains(char::is_whitespace) {
            rule.declarations.push(Declaration {
                property: property.to_ascii_lowercase(),
                value: value.trim().to_string(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid style pattern"))
}

/// Declarations on their own line that do not end with `;`. The last
/// declaration of a block may omit it.
fn check_semicolons(masked: &str, findings: &mut Findings) {
    static DECLARATION: OnceLock<Regex> = OnceLock::new();
    let declaration = regex(&DECLARATION, r"^-?[A-Za-z][\w-]*\s*:\s*\S");

    let lines: Vec<&str> = masked.lines().collect();
    let mut depth = 0usize;
    let mut missing = 0;
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        let inside = depth > 0;
        depth += trimmed.matches('{').count();
        depth = depth.saturating_sub(trimmed.matches('}').count());
        if !inside || !declaration.is_match(trimmed) {
            continue;
        }
        if trimmed.ends_with(';') || trimmed.ends_with('{') || trimmed.ends_with('}') || trimmed.ends_with(',') {
            continue;
        }
        let next = lines[index + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        match next {
            Some(l) if !l.starts_with('}') && !l.starts_with('{') => missing += 1,
            _ => {}
        }
    }
    if missing > 0 {
        findings.add(
            Issue::warning(
                Category::Structure,
                format!("{} missing a semicolon", plural(missing, "declaration is", "declarations are")),
            )
            .rule("declaration-semicolon")
            .fixable(),
            capped(missing, 2, 10),
        );
    }
}

fn check_important(sheet: &Stylesheet, findings: &mut Findings) {
    let count = sheet
        .declarations()
        .filter(|d| d.value.contains("!important"))
        .count();
    if count > 3 {
        findings.add(
            Issue::warning(
                Category::Maintainability,
                format!("{} uses of !important; fix the selector specificity instead", count),
            )
            .rule("no-important"),
            5,
        );
    }
}

fn compound_count(selector: &str) -> usize {
    selector
        .replace(['>', '+', '~'], " ")
        .split_whitespace()
        .count()
}

fn check_selectors(sheet: &Stylesheet, findings: &mut Findings) {
    static ID: OnceLock<Regex> = OnceLock::new();
    let id = regex(&ID, r"#[A-Za-z_-][\w-]*");

    let ids: usize = sheet.selectors().map(|s| id.find_iter(s).count()).sum();
    if ids > 5 {
        findings.note(
            Issue::info(
                Category::Maintainability,
                format!("{} id selectors; prefer classes for styling", ids),
            )
            .rule("id-selectors"),
        );
    }
    if sheet.selectors().any(|s| s.split_whitespace().any(|part| part.starts_with('*'))) {
        findings.note(
            Issue::info(Category::Performance, "Universal selector `*` matches every element")
                .rule("universal-selector"),
        );
    }
    let deep: Vec<&str> = sheet.selectors().filter(|s| compound_count(s) > 3).collect();
    if !deep.is_empty() {
        findings.note(
            Issue::info(
                Category::Complexity,
                format!("Overly specific selector: {}", deep[0]),
            )
            .rule("selector-depth"),
        );
    }
}

fn check_units(sheet: &Stylesheet, findings: &mut Findings) {
    static PX: OnceLock<Regex> = OnceLock::new();
    static RELATIVE: OnceLock<Regex> = OnceLock::new();
    let px = regex(&PX, r"\d(?:px)\b");
    let relative = regex(&RELATIVE, r"\d(?:r?em|%|vw|vh|vmin|vmax|ch)\b|\d%");
    let values: Vec<&str> = sheet.declarations().map(|d| d.value.as_str()).collect();
    let uses_px = values.iter().any(|v| px.is_match(v));
    let uses_relative = values.iter().any(|v| relative.is_match(v));
    if uses_px && !uses_relative {
        findings.note(
            Issue::info(
                Category::BestPractice,
                "Only px units used; rem, em or % scale with user settings",
            )
            .rule("relative-units"),
        );
    }
}

fn check_animation(sheet: &Stylesheet, findings: &mut Findings) {
    let animated = sheet
        .declarations()
        .any(|d| d.property.starts_with("animation") || d.property.starts_with("transition"));
    let will_change = sheet.declarations().any(|d| d.property == "will-change");
    if will_change {
        findings.note(
            Issue::success(Category::Performance, "Uses will-change to hint animations")
                .rule("will-change"),
        );
    } else if animated {
        findings.note(
            Issue::info(
                Category::Performance,
                "Animations or transitions without will-change",
            )
            .rule("will-change"),
        );
    }
}

fn check_duplicates(sheet: &Stylesheet, findings: &mut Findings) {
    for rule in &sheet.rules {
        let mut seen: HashSet<&str> = HashSet::default();
        let mut reported: HashSet<&str> = HashSet::default();
        for declaration in &rule.declarations {
            let property = declaration.property.as_str();
            if !seen.insert(property) && reported.insert(property) {
                findings.add(
                    Issue::warning(
                        Category::Maintainability,
                        format!("Duplicate property `{}` in `{}`", property, rule.prelude),
                    )
                    .rule("duplicate-property")
                    .fixable(),
                    3,
                );
            }
        }
    }
}

fn check_vendor_prefixes(sheet: &Stylesheet, findings: &mut Findings) {
    for prefix in VENDOR_PREFIXES {
        let used = sheet
            .declarations()
            .any(|d| d.property.starts_with(prefix) || d.value.contains(prefix));
        if used {
            findings.note(
                Issue::info(
                    Category::Compatibility,
                    format!("Vendor prefix `{}` in use; check whether it is still needed", prefix),
                )
                .rule("vendor-prefix"),
            );
        }
    }
}

fn check_colors(sheet: &Stylesheet, findings: &mut Findings) {
    static LITERAL: OnceLock<Regex> = OnceLock::new();
    static WORD: OnceLock<Regex> = OnceLock::new();
    let literal = regex(&LITERAL, r"#[0-9A-Fa-f]{3,8}\b|\b(?:rgba?|hsla?)\(");
    let word = regex(&WORD, r"[A-Za-z-]+");

    let custom_properties = sheet
        .declarations()
        .any(|d| d.property.starts_with("--") || d.value.contains("var(--"));
    let mut literals = 0;
    let mut named = 0;
    for declaration in sheet.declarations().filter(|d| !d.property.starts_with("--")) {
        literals += literal.find_iter(&declaration.value).count();
        named += word
            .find_iter(&declaration.value)
            .filter(|w| NAMED_COLORS.contains(&w.as_str().to_ascii_lowercase().as_str()))
            .count();
    }

    if custom_properties {
        findings.note(
            Issue::success(Category::Maintainability, "Uses custom properties for shared values")
                .rule("custom-properties"),
        );
    } else if literals + named > 5 {
        findings.note(
            Issue::info(
                Category::Maintainability,
                format!("{} literal colors; define them once as custom properties", literals + named),
            )
            .rule("custom-properties"),
        );
    }
    if named > 3 {
        findings.note(
            Issue::info(
                Category::BestPractice,
                format!("{} named colors; prefer exact hex or hsl values", named),
            )
            .rule("named-colors"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Severity;
    use pretty_assertions::assert_eq;

    fn rules(report: &Report) -> Vec<&str> {
        report
            .issues
            .iter()
            .filter_map(|i| i.rule_id.as_deref())
            .collect()
    }

    #[test]
    fn test_double_semicolon_is_not_brace_error() {
        let report = validate_style("a{color:red;;}");
        assert!(report.find_rule("brace-balance").is_none());
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_brace_imbalance_short_circuits() {
        let report = validate_style(".a { color: red;\n.b { color: blue; }");
        assert_eq!(rules(&report), vec!["brace-balance"]);
        assert_eq!(report.score, 80);

        let report = validate_style(".a { color: red; } }");
        assert_eq!(report.issues[0].message, "Unexpected '}' on line 1");
    }

    #[test]
    fn test_braces_in_comments_and_strings_ignored() {
        let report = validate_style("/* { */ .a::before { content: \"}\"; }");
        assert!(report.find_rule("brace-balance").is_none());
    }

    #[test]
    fn test_unterminated_strings() {
        let report = validate_style(".a { content: \"open;\n}\n.b { content: 'x;\n}\n.c { content: \"y\"; }");
        let strings: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("unterminated-string"))
            .collect();
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn test_missing_semicolons() {
        let source = ".a {\n  color: red\n  margin: 0\n}\n.b {\n  padding: 0;\n  border: none\n}";
        let report = validate_style(source);
        let issue = report.find_rule("declaration-semicolon").unwrap();
        assert_eq!(issue.message, "1 declaration is missing a semicolon");
        assert_eq!(report.score, 98);
    }

    #[test]
    fn test_selector_checks() {
        let source = "#a{} #b{} #c{} #d{} #e{} #f{} * { margin: 0; } nav ul li a span { color: #333; }";
        let report = validate_style(source);
        assert!(report.find_rule("id-selectors").is_some());
        assert!(report.find_rule("universal-selector").is_some());
        assert!(report.find_rule("selector-depth").unwrap().message.contains("nav ul li a span"));
    }

    #[test]
    fn test_important_and_duplicates() {
        let source = ".a { color: red !important; color: blue !important; margin: 0 !important; padding: 0 !important; }";
        let report = validate_style(source);
        assert!(report.find_rule("no-important").is_some());
        assert_eq!(
            report.find_rule("duplicate-property").unwrap().message,
            "Duplicate property `color` in `.a`"
        );
        assert_eq!(report.score, 100 - 5 - 3);
    }

    #[test]
    fn test_units_animation_prefixes() {
        let report = validate_style(".a { width: 10px; transition: all 1s; -webkit-transition: all 1s; }");
        assert!(report.find_rule("relative-units").is_some());
        assert_eq!(report.find_rule("will-change").unwrap().severity, Severity::Info);
        assert!(report.find_rule("vendor-prefix").unwrap().message.contains("-webkit-"));

        let report = validate_style(".a { width: 2rem; transition: opacity 1s; will-change: opacity; }");
        assert!(report.find_rule("relative-units").is_none());
        assert_eq!(report.find_rule("will-change").unwrap().severity, Severity::Success);
    }

    #[test]
    fn test_colors() {
        let source = ".a { color: red; background: blue; border-color: green; outline-color: white; }\n\
                      .b { color: #fff; background: rgb(0, 0, 0); }";
        let report = validate_style(source);
        assert!(report.find_rule("named-colors").is_some());
        assert_eq!(
            report.find_rule("custom-properties").unwrap().severity,
            Severity::Info
        );

        let report = validate_style(":root { --brand: #123456; }\n.a { color: var(--brand); }");
        assert_eq!(
            report.find_rule("custom-properties").unwrap().severity,
            Severity::Success
        );
    }

    #[test]
    fn test_keyframes_are_not_selectors() {
        let sheet = Stylesheet::parse("@keyframes spin { from { opacity: 0; } to { opacity: 1; } } .x { top: 0 }");
        let style_rules: Vec<_> = sheet.rules.iter().filter(|r| r.is_style_rule).map(|r| r.prelude.as_str()).collect();
        assert_eq!(style_rules, vec![".x"]);
        assert_eq!(sheet.rules.last().unwrap().declarations.len(), 1);
    }
}
