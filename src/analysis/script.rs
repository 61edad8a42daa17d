//! Heuristic quality checks for JavaScript
//!
//! The source is first masked: comments and the contents of strings,
//! template literals and regex literals become spaces (newlines are kept), so
//! the checks below never match inside text. Each check is an independent
//! predicate over the masked code; together they approximate a linter without
//! building a syntax tree, which keeps them usable on code that does not
//! parse yet.

use super::{capped, plural, Category, Findings, Issue, Report};
use regex::Regex;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::sync::OnceLock;
use tracing::debug;

/// Globals a browser or Node script may assign without declaring
const HOST_GLOBALS: &[&str] = &[
    "window",
    "document",
    "console",
    "globalThis",
    "module",
    "exports",
    "self",
    "localStorage",
    "sessionStorage",
    "location",
    "navigator",
    "history",
    "process",
];

/// Conventional single-letter names
const SHORT_NAMES: &[&str] = &["i", "j", "k", "x", "y"];

const MAX_BRACE_DEPTH: usize = 4;
const MAX_CALLBACK_DEPTH: usize = 2;
const MAX_AVERAGE_FUNCTION_LINES: f64 = 50.0;

/// Analyze JavaScript source
pub fn analyze_script(source: &str) -> Report {
    if source.trim().is_empty() {
        return Report::empty_input("JavaScript code");
    }
    debug!(analyzer = "script", bytes = source.len(), "analysis started");

    let masked = mask(source);
    let shape = Shape::scan(&masked.code);
    let declared = declarations(&masked.code);
    let mut findings = Findings::new();

    check_var(&masked.code, &mut findings);
    check_implicit_globals(&masked.code, &declared, &mut findings);
    check_console_and_debugger(&masked.code, &mut findings);
    check_unused(&declared, &shape, &mut findings);
    check_complexity(&masked, &shape, &mut findings);
    check_equality(&masked.code, &mut findings);
    check_naming(&declared, &mut findings);
    check_comment_ratio(&masked, &mut findings);
    check_async(&masked.code, &shape, &mut findings);

    findings.finish("script")
}

// ---------------------------------------------------------------------------
// Masking
// ---------------------------------------------------------------------------

/// Source with comments and literal contents blanked out
#[derive(Debug)]
pub(crate) struct Masked {
    pub code: String,
    /// Lines with at least one code character
    pub code_lines: usize,
    /// Lines with at least one comment character
    pub comment_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Template,
    Regex { in_class: bool },
}

/// Whether a `/` after `prev` (last significant character) starts a regex
fn regex_allowed(prev: Option<char>, last_word: &str) -> bool {
    match prev {
        None => true,
        Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => {
            matches!(last_word, "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "void")
        }
        Some(')') | Some(']') | Some('}') => false,
        Some(_) => true,
    }
}

pub(crate) fn mask(source: &str) -> Masked {
    let chars: Vec<char> = source.chars().collect();
    let mut code = String::with_capacity(source.len());
    let mut modes = vec![Mode::Code];
    // Brace depth inside each open `${ ... }` substitution
    let mut substitution_depths: Vec<usize> = Vec::new();
    let mut prev: Option<char> = None;
    let mut last_word = String::new();
    let mut line_has_code = false;
    let mut line_has_comment = false;
    let mut code_lines = 0;
    let mut comment_lines = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        if c == '\n' {
            code_lines += usize::from(line_has_code);
            comment_lines += usize::from(line_has_comment);
            line_has_code = false;
            line_has_comment = false;
            // Comments, strings and regexes never span lines
            if let Some(Mode::LineComment | Mode::Str(_) | Mode::Regex { .. }) = modes.last() {
                modes.pop();
            }
            code.push('\n');
            i += 1;
            continue;
        }
        let mode = modes.last().copied().unwrap_or(Mode::Code);
        match mode {
            Mode::Code => {
                if c == '/' && next == Some('/') {
                    modes.push(Mode::LineComment);
                    line_has_comment = true;
                    code.push_str("  ");
                    i += 2;
                    continue;
                }
                if c == '/' && next == Some('*') {
                    modes.push(Mode::BlockComment);
                    line_has_comment = true;
                    code.push_str("  ");
                    i += 2;
                    continue;
                }
                if !c.is_whitespace() {
                    line_has_code = true;
                }
                match c {
                    '\'' | '"' => modes.push(Mode::Str(c)),
                    '`' => modes.push(Mode::Template),
                    '/' if regex_allowed(prev, &last_word) => {
                        modes.push(Mode::Regex { in_class: false })
                    }
                    '{' => {
                        if let Some(depth) = substitution_depths.last_mut() {
                            *depth += 1;
                        }
                    }
                    '}' => match substitution_depths.last_mut() {
                        Some(0) => {
                            substitution_depths.pop();
                            modes.pop();
                        }
                        Some(depth) => *depth -= 1,
                        None => {}
                    },
                    _ => {}
                }
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    if !prev.is_some_and(|p| p.is_alphanumeric() || p == '_' || p == '$') {
                        last_word.clear();
                    }
                    last_word.push(c);
                } else if !c.is_whitespace() {
                    last_word.clear();
                }
                if !c.is_whitespace() {
                    prev = Some(c);
                }
                code.push(c);
            }
            Mode::LineComment => {
                line_has_comment = true;
                code.push(' ');
            }
            Mode::BlockComment => {
                line_has_comment = true;
                if c == '*' && next == Some('/') {
                    modes.pop();
                    code.push_str("  ");
                    i += 2;
                    continue;
                }
                code.push(' ');
            }
            Mode::Str(quote) => {
                line_has_code = true;
                if c == '\\' {
                    code.push(' ');
                    if next.is_some_and(|n| n != '\n') {
                        code.push(' ');
                        i += 1;
                    }
                } else if c == quote {
                    modes.pop();
                    code.push(c);
                    prev = Some(c);
                    last_word.clear();
                } else {
                    code.push(' ');
                }
            }
            Mode::Template => {
                line_has_code = true;
                if c == '\\' {
                    code.push(' ');
                    if next.is_some_and(|n| n != '\n') {
                        code.push(' ');
                        i += 1;
                    }
                } else if c == '`' {
                    modes.pop();
                    code.push(c);
                    prev = Some(c);
                    last_word.clear();
                } else if c == '$' && next == Some('{') {
                    modes.push(Mode::Code);
                    substitution_depths.push(0);
                    code.push_str("${");
                    prev = Some('{');
                    i += 2;
                    continue;
                } else {
                    code.push(' ');
                }
            }
            Mode::Regex { in_class } => {
                line_has_code = true;
                match c {
                    '\\' => {
                        code.push(' ');
                        if next.is_some_and(|n| n != '\n') {
                            code.push(' ');
                            i += 1;
                        }
                    }
                    '[' => {
                        modes.pop();
                        modes.push(Mode::Regex { in_class: true });
                        code.push(' ');
                    }
                    ']' if in_class => {
                        modes.pop();
                        modes.push(Mode::Regex { in_class: false });
                        code.push(' ');
                    }
                    '/' if !in_class => {
                        modes.pop();
                        code.push('/');
                        prev = Some(')');
                        last_word.clear();
                    }
                    _ => code.push(' '),
                }
            }
        }
        i += 1;
    }
    code_lines += usize::from(line_has_code);
    comment_lines += usize::from(line_has_comment);

    Masked {
        code,
        code_lines,
        comment_lines,
    }
}

// ---------------------------------------------------------------------------
// Token-level shape of the code
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Paren { params: bool },
    Bracket,
    Brace { callback: bool, try_block: bool },
}

/// Nesting and identifier facts gathered in one pass over masked code
#[derive(Debug, Default)]
pub(crate) struct Shape {
    pub max_brace_depth: usize,
    pub max_callback_depth: usize,
    pub functions: usize,
    pub awaits_outside_try: usize,
    /// Occurrences of each identifier, excluding property names after `.`
    pub identifier_counts: HashMap<String, usize>,
}

impl Shape {
    pub(crate) fn scan(code: &str) -> Self {
        let chars: Vec<char> = code.chars().collect();
        let mut shape = Self::default();
        let mut stack: Vec<Delimiter> = Vec::new();
        let mut function_pending = false;
        let mut try_pending = false;
        let mut body_next = false;
        let mut after_arrow = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            if is_ident_start(c) {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let property = start > 0
                    && chars[start - 1] == '.'
                    && !(start > 1 && chars[start - 2] == '.');
                match word.as_str() {
                    "function" => {
                        function_pending = true;
                        shape.functions += 1;
                    }
                    "try" => try_pending = true,
                    "await" if !property => {
                        let in_try = stack
                            .iter()
                            .any(|d| matches!(d, Delimiter::Brace { try_block: true, .. }));
                        if !in_try {
                            shape.awaits_outside_try += 1;
                        }
                    }
                    _ => {}
                }
                if !property && !word.starts_with(|ch: char| ch.is_ascii_digit()) {
                    *shape.identifier_counts.entry(word).or_insert(0) += 1;
                }
                body_next = false;
                after_arrow = false;
                continue;
            }

            if c == '=' && chars.get(i + 1) == Some(&'>') {
                shape.functions += 1;
                after_arrow = true;
                body_next = false;
                i += 2;
                continue;
            }

            match c {
                '(' => {
                    stack.push(Delimiter::Paren {
                        params: function_pending,
                    });
                    function_pending = false;
                }
                ')' => {
                    if let Some(Delimiter::Paren { params }) = stack.pop() {
                        body_next = params;
                        i += 1;
                        after_arrow = false;
                        continue;
                    }
                }
                '[' => stack.push(Delimiter::Bracket),
                ']' => {
                    stack.pop();
                }
                '{' => {
                    let function_body = body_next || after_arrow;
                    let callback = function_body
                        && matches!(stack.last(), Some(Delimiter::Paren { params: false }));
                    stack.push(Delimiter::Brace {
                        callback,
                        try_block: try_pending,
                    });
                    try_pending = false;
                    let braces = stack
                        .iter()
                        .filter(|d| matches!(d, Delimiter::Brace { .. }))
                        .count();
                    let callbacks = stack
                        .iter()
                        .filter(|d| matches!(d, Delimiter::Brace { callback: true, .. }))
                        .count();
                    shape.max_brace_depth = shape.max_brace_depth.max(braces);
                    shape.max_callback_depth = shape.max_callback_depth.max(callbacks);
                }
                '}' => {
                    stack.pop();
                }
                _ => {}
            }
            body_next = false;
            after_arrow = false;
            i += 1;
        }
        shape
    }

    fn occurrences(&self, name: &str) -> usize {
        self.identifier_counts.get(name).copied().unwrap_or(0)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid script pattern"))
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

/// Names introduced by declarations, in first-declaration order
#[derive(Debug, Default)]
pub(crate) struct Declared {
    /// `var`/`let`/`const`, function and class names
    pub bindings: Vec<String>,
    /// Bindings plus parameters and catch bindings
    pub all: HashSet<String>,
}

impl Declared {
    fn add_binding(&mut self, name: &str) {
        if !self.all.contains(name) {
            self.bindings.push(name.to_string());
        }
        self.all.insert(name.to_string());
    }

    fn add_parameter(&mut self, name: &str) {
        self.all.insert(name.to_string());
    }
}

fn identifiers_in(pattern: &str) -> impl Iterator<Item = &str> {
    static IDENTS: OnceLock<Regex> = OnceLock::new();
    regex(&IDENTS, IDENT).find_iter(pattern).map(|m| m.as_str())
}

/// Names bound by a destructuring pattern or parameter list. Default values
/// are dropped and `key: alias` binds only the alias.
fn pattern_names(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    for part in pattern.split(',') {
        let part = part.split('=').next().unwrap_or("");
        let part = part.rsplit(':').next().unwrap_or("");
        names.extend(identifiers_in(part));
    }
    names
}

pub(crate) fn declarations(code: &str) -> Declared {
    static SIMPLE: OnceLock<Regex> = OnceLock::new();
    static DESTRUCTURED: OnceLock<Regex> = OnceLock::new();
    static FUNCTION: OnceLock<Regex> = OnceLock::new();
    static CLASS: OnceLock<Regex> = OnceLock::new();
    static ARROW_PARAMS: OnceLock<Regex> = OnceLock::new();
    static ARROW_SINGLE: OnceLock<Regex> = OnceLock::new();
    static CATCH: OnceLock<Regex> = OnceLock::new();
    static METHOD: OnceLock<Regex> = OnceLock::new();

    let mut declared = Declared::default();

    let simple = regex(
        &SIMPLE,
        r"\b(?:var|let|const)\s+([A-Za-z_$][\w$]*(?:\s*(?:=[^,;()\[\]{}]*)?\s*,\s*[A-Za-z_$][\w$]*)*)",
    );
    let destructured = regex(&DESTRUCTURED, r"\b(?:var|let|const)\s*[\[{]([^=;]*?)[\]}]\s*=");
    let function = regex(
        &FUNCTION,
        r"\bfunction\b\s*\*?\s*([A-Za-z_$][\w$]*)?\s*\(([^)]*)\)",
    );
    let class = regex(&CLASS, r"\bclass\s+([A-Za-z_$][\w$]*)");
    let arrow_params = regex(&ARROW_PARAMS, r"\(([^()]*)\)\s*=>");
    let arrow_single = regex(&ARROW_SINGLE, r"([A-Za-z_$][\w$]*)\s*=>");
    let catch = regex(&CATCH, r"\bcatch\s*\(\s*([A-Za-z_$][\w$]*)");
    let method = regex(&METHOD, r"(?m)^\s*(?:static\s+|async\s+|get\s+|set\s+)*([A-Za-z_$][\w$]*)\s*\(([^()]*)\)\s*\{");

    let mut positioned: Vec<(usize, String)> = Vec::new();
    for caps in simple.captures_iter(code) {
        if let Some(list) = caps.get(1) {
            // `a = 1, b` keeps the names before each `=`
            for part in list.as_str().split(',') {
                if let Some(name) = identifiers_in(part.split('=').next().unwrap_or("")).next() {
                    positioned.push((list.start(), name.to_string()));
                }
            }
        }
    }
    for caps in destructured.captures_iter(code) {
        if let Some(pattern) = caps.get(1) {
            for name in pattern_names(pattern.as_str()) {
                positioned.push((pattern.start(), name.to_string()));
            }
        }
    }
    for caps in function.captures_iter(code) {
        if let Some(name) = caps.get(1) {
            positioned.push((name.start(), name.as_str().to_string()));
        }
        if let Some(params) = caps.get(2) {
            for name in pattern_names(params.as_str()) {
                declared.add_parameter(name);
            }
        }
    }
    for caps in class.captures_iter(code) {
        if let Some(name) = caps.get(1) {
            positioned.push((name.start(), name.as_str().to_string()));
        }
    }
    positioned.sort_by_key(|(pos, _)| *pos);
    for (_, name) in positioned {
        declared.add_binding(&name);
    }

    for caps in arrow_params.captures_iter(code) {
        if let Some(params) = caps.get(1) {
            for name in pattern_names(params.as_str()) {
                declared.add_parameter(name);
            }
        }
    }
    for caps in arrow_single.captures_iter(code) {
        if let Some(name) = caps.get(1) {
            declared.add_parameter(name.as_str());
        }
    }
    for caps in catch.captures_iter(code) {
        if let Some(name) = caps.get(1) {
            declared.add_parameter(name.as_str());
        }
    }
    for caps in method.captures_iter(code) {
        let is_keyword = caps
            .get(1)
            .is_some_and(|m| matches!(m.as_str(), "if" | "for" | "while" | "switch" | "catch" | "function"));
        if is_keyword {
            continue;
        }
        if let Some(params) = caps.get(2) {
            for name in pattern_names(params.as_str()) {
                declared.add_parameter(name);
            }
        }
    }
    declared
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

fn check_var(code: &str, findings: &mut Findings) {
    static VAR: OnceLock<Regex> = OnceLock::new();
    let count = regex(&VAR, r"\bvar\s+").find_iter(code).count();
    if count > 0 {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                format!(
                    "Found {}; use `let` or `const` instead",
                    plural(count, "`var` declaration", "`var` declarations")
                ),
            )
            .rule("no-var")
            .fixable(),
            capped(count, 2, 10),
        );
    }
}

fn check_implicit_globals(code: &str, declared: &Declared, findings: &mut Findings) {
    static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
    let assignment = regex(
        &ASSIGNMENT,
        r"(?m)(?:^|[;{}])\s*([A-Za-z_$][\w$]*)\s*(?:[-+*/%]|\*\*|&&|\|\||\?\?)?=[^=>]",
    );
    let mut names: Vec<&str> = Vec::new();
    for caps in assignment.captures_iter(code) {
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if matches!(name, "this" | "let" | "const" | "var" | "return")
            || HOST_GLOBALS.contains(&name)
            || declared.all.contains(name)
            || names.contains(&name)
        {
            continue;
        }
        names.push(name);
    }
    if !names.is_empty() {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                format!(
                    "Assignment to undeclared {}: {}",
                    if names.len() == 1 { "variable" } else { "variables" },
                    names.join(", ")
                ),
            )
            .rule("no-implicit-globals"),
            8,
        );
    }
}

fn check_console_and_debugger(code: &str, findings: &mut Findings) {
    static CONSOLE: OnceLock<Regex> = OnceLock::new();
    static DEBUGGER: OnceLock<Regex> = OnceLock::new();
    let console = regex(&CONSOLE, r"\bconsole\s*\.\s*[A-Za-z]+\s*\(")
        .find_iter(code)
        .count();
    if console > 0 {
        findings.note(
            Issue::info(
                Category::BestPractice,
                format!(
                    "Found {}; remove debugging output before shipping",
                    plural(console, "console call", "console calls")
                ),
            )
            .rule("no-console"),
        );
    }
    let debugger = regex(&DEBUGGER, r"\bdebugger\b").find_iter(code).count();
    if debugger > 0 {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                format!("Found {}", plural(debugger, "`debugger` statement", "`debugger` statements")),
            )
            .rule("no-debugger")
            .fixable(),
            5,
        );
    }
}

fn check_unused(declared: &Declared, shape: &Shape, findings: &mut Findings) {
    let unused: Vec<&str> = declared
        .bindings
        .iter()
        .map(String::as_str)
        .filter(|name| !name.starts_with('_') && shape.occurrences(name) == 1)
        .collect();
    if !unused.is_empty() {
        findings.add(
            Issue::warning(
                Category::Maintainability,
                format!("Declared but never used: {}", unused.join(", ")),
            )
            .rule("no-unused-vars"),
            capped(unused.len(), 2, 8),
        );
    }
}

fn check_complexity(masked: &Masked, shape: &Shape, findings: &mut Findings) {
    if shape.max_brace_depth > MAX_BRACE_DEPTH {
        findings.add(
            Issue::warning(
                Category::Complexity,
                format!(
                    "Code is nested {} levels deep (limit {}); extract helper functions or return early",
                    shape.max_brace_depth, MAX_BRACE_DEPTH
                ),
            )
            .rule("max-depth"),
            10,
        );
    }
    if shape.functions > 0 {
        let average = masked.code_lines as f64 / shape.functions as f64;
        if average > MAX_AVERAGE_FUNCTION_LINES {
            findings.note(
                Issue::info(
                    Category::Complexity,
                    format!(
                        "Functions average {:.0} lines; consider splitting them up",
                        average
                    ),
                )
                .rule("max-lines-per-function"),
            );
        }
    }
}

/// Count `==` and `!=` that are not part of `===` / `!==`
fn loose_equality_counts(code: &str) -> (usize, usize) {
    let bytes = code.as_bytes();
    let mut eq = 0;
    let mut ne = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i + 1] == b'=' && bytes.get(i + 2) != Some(&b'=') {
            let before = if i > 0 { bytes[i - 1] } else { b' ' };
            match bytes[i] {
                b'=' if !matches!(before, b'=' | b'!' | b'<' | b'>') => {
                    eq += 1;
                    i += 2;
                    continue;
                }
                b'!' => {
                    ne += 1;
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        if bytes[i] == b'=' && bytes[i + 1] == b'=' {
            // Skip the rest of a strict operator
            while i < bytes.len() && bytes[i] == b'=' {
                i += 1;
            }
            continue;
        }
        i += 1;
    }
    (eq, ne)
}

fn check_equality(code: &str, findings: &mut Findings) {
    let (eq, ne) = loose_equality_counts(code);
    for (count, loose, strict) in [(eq, "==", "==="), (ne, "!=", "!==")] {
        if count > 0 {
            findings.add(
                Issue::warning(
                    Category::BestPractice,
                    format!(
                        "Use `{}` instead of `{}` ({})",
                        strict,
                        loose,
                        plural(count, "occurrence", "occurrences")
                    ),
                )
                .rule("eqeqeq")
                .fixable(),
                capped(count, 2, 8),
            );
        }
    }
}

fn is_snake_case(name: &str) -> bool {
    let trimmed = name.trim_matches('_');
    trimmed.contains('_')
        && trimmed.chars().any(|c| c.is_ascii_lowercase())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn check_naming(declared: &Declared, findings: &mut Findings) {
    let snake: Vec<&str> = declared
        .bindings
        .iter()
        .map(String::as_str)
        .filter(|n| is_snake_case(n))
        .collect();
    if !snake.is_empty() {
        findings.note(
            Issue::info(
                Category::Naming,
                format!("Use camelCase instead of snake_case: {}", snake.join(", ")),
            )
            .rule("naming-convention"),
        );
    }
    let short: Vec<&str> = declared
        .bindings
        .iter()
        .map(String::as_str)
        .filter(|n| n.chars().count() == 1 && *n != "_" && !SHORT_NAMES.contains(n))
        .collect();
    if !short.is_empty() {
        findings.note(
            Issue::info(
                Category::Naming,
                format!("Use descriptive names instead of: {}", short.join(", ")),
            )
            .rule("naming-convention"),
        );
    }
}

fn check_comment_ratio(masked: &Masked, findings: &mut Findings) {
    let ratio = masked.comment_lines as f64 / masked.code_lines.max(1) as f64;
    if masked.code_lines > 20 && ratio < 0.05 {
        findings.note(
            Issue::info(
                Category::Maintainability,
                "Few comments; explain the intent of non-obvious code",
            )
            .rule("comment-ratio"),
        );
    } else if ratio > 0.5 {
        findings.note(
            Issue::info(
                Category::Maintainability,
                "Comments outweigh code; let clear names carry the explanation",
            )
            .rule("comment-ratio"),
        );
    }
}

fn check_async(code: &str, shape: &Shape, findings: &mut Findings) {
    static THEN: OnceLock<Regex> = OnceLock::new();
    static CATCH: OnceLock<Regex> = OnceLock::new();
    let then = regex(&THEN, r"\.\s*then\s*\(").is_match(code);
    let catch = regex(&CATCH, r"\.\s*catch\s*\(").is_match(code);
    if then && !catch {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                "Promise chain has no `.catch()`; rejected promises will go unhandled",
            )
            .rule("promise-catch"),
            8,
        );
    }
    if shape.awaits_outside_try > 0 {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                format!(
                    "{} outside try/catch",
                    plural(shape.awaits_outside_try, "`await` is", "`await`s are")
                ),
            )
            .rule("await-try-catch"),
            8,
        );
    }
    if shape.max_callback_depth > MAX_CALLBACK_DEPTH {
        findings.add(
            Issue::warning(
                Category::Complexity,
                format!(
                    "Callbacks nested {} levels deep; use promises or async/await",
                    shape.max_callback_depth
                ),
            )
            .rule("callback-nesting"),
            10,
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
    fn test_mask_hides_literals_and_comments() {
        let masked = mask("var a = 'var b'; // var c\nconst r = /==/g; `x ${a == 1} y`");
        assert!(!masked.code.contains("var b"));
        assert!(!masked.code.contains("var c"));
        assert!(masked.code.contains("a == 1"));
        assert_eq!(masked.code.matches("==").count(), 1);
        assert_eq!(masked.code_lines, 2);
        assert_eq!(masked.comment_lines, 1);
    }

    #[test]
    fn test_division_is_not_regex() {
        let masked = mask("const half = total / 2; const q = a / b / c;");
        assert!(masked.code.contains("total / 2"));
        assert!(masked.code.contains("a / b / c"));
    }

    #[test]
    fn test_literal_contents_are_ignored() {
        let source = "const pattern = /a == b/;\nconst text = `debugger ${pattern.source}`;\nuse(text);";
        let report = analyze_script(source);
        assert!(rules(&report).is_empty(), "{:?}", report.issues);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_unparseable_source_is_still_analyzed() {
        let report = analyze_script("function broken( {\n  var total = 1 == 2;\n");
        assert!(report.find_rule("no-var").is_some());
        assert!(report.find_rule("eqeqeq").is_some());
        assert!(report.score < 100);
    }

    #[test]
    fn test_var_declarations() {
        let report = analyze_script("var x = 1; var y = 2;\nconsole.log(x + y);");
        let issue = report.find_rule("no-var").unwrap();
        assert!(issue.fixable);
        assert_eq!(issue.severity, Severity::Warning);
        assert!(report.score < 100);
    }

    #[test]
    fn test_clean_code_scores_full() {
        let source = "
            const total = (items) => items.reduce((sum, item) => sum + item.price, 0);
            const format = (value) => `$${total([value])}`;
            module.exports = { format };
        ";
        let report = analyze_script(source);
        assert_eq!(report.score, 100, "{:?}", report.issues);
    }

    #[test]
    fn test_implicit_globals_and_unused() {
        let report = analyze_script("function run() {\n  counter = 1;\n  const unused_value = 2;\n}\nrun();");
        assert_eq!(
            rules(&report),
            vec!["no-implicit-globals", "no-unused-vars", "naming-convention"]
        );
        assert!(report
            .find_rule("no-implicit-globals")
            .unwrap()
            .message
            .contains("counter"));
    }

    #[test]
    fn test_host_globals_are_allowed() {
        let report = analyze_script("window.app = {};\ndocument.title = 'x';\nprocess = null;");
        assert!(report.find_rule("no-implicit-globals").is_none());
    }

    #[test]
    fn test_equality_operators() {
        let report = analyze_script("const a = 1;\nif (a == 2 || a != 3 || a === 4 || a !== 5 || a <= 6) {}");
        let eq: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("eqeqeq"))
            .collect();
        assert_eq!(eq.len(), 2);
        assert!(eq[0].message.contains("`===`"));
        assert!(eq[1].message.contains("`!==`"));
    }

    #[test]
    fn test_debugger_and_console() {
        let report = analyze_script("debugger;\nconsole.log('hi');");
        assert_eq!(report.find_rule("no-console").unwrap().severity, Severity::Info);
        assert!(report.find_rule("no-debugger").unwrap().fixable);
        assert_eq!(report.score, 95);
    }

    #[test]
    fn test_depth_and_callbacks() {
        let source = "
            load(function (a) {
                parse(a, function (b) {
                    save(b, (c) => {
                        if (c) { if (c.ok) { done(); } }
                    });
                });
            });
        ";
        let report = analyze_script(source);
        assert!(report.find_rule("max-depth").is_some());
        assert!(report.find_rule("callback-nesting").is_some());
    }

    #[test]
    fn test_async_rules() {
        let report = analyze_script("fetch(url).then(r => r.json());\nasync function go() { await fetch(url); }\ngo();");
        assert!(report.find_rule("promise-catch").is_some());
        assert!(report.find_rule("await-try-catch").is_some());

        let report = analyze_script(
            "async function go() {\n  try { await fetch(url); } catch (err) { report(err); }\n}\ngo();",
        );
        assert!(report.find_rule("await-try-catch").is_none());
    }

    #[test]
    fn test_naming_rules() {
        let report = analyze_script("const MAX_SIZE = 3;\nlet q = MAX_SIZE;\nfor (let i = 0; i < q; i++) {}");
        let naming: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("naming-convention"))
            .collect();
        assert_eq!(naming.len(), 1);
        assert!(naming[0].message.contains("q"));
    }

    #[test]
    fn test_comment_ratio() {
        let report = analyze_script("// one\n// two\n// three\nconst a = 1;\nuse(a);");
        assert!(report.find_rule("comment-ratio").is_some());
    }

    #[test]
    fn test_empty_input() {
        let report = analyze_script("  \n ");
        assert_eq!(report.score, 0);
        assert_eq!(rules(&report), vec!["empty-input"]);
    }

    #[test]
    fn test_deterministic() {
        let source = "var a = 1; b = a == 2; debugger;";
        let first = serde_json::to_string(&analyze_script(source)).unwrap();
        let second = serde_json::to_string(&analyze_script(source)).unwrap();
        assert_eq!(first, second);
    }
}
