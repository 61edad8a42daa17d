//! HTML structure and best-practice checks

use super::{
    form_controls, has_accessible_name, has_label, plural, proportional, skipped_heading,
    Category, Findings, Issue, Report, GENERIC_LINK_TEXT,
};
use crate::dom::ElementTree;
use tracing::debug;

const SEMANTIC_ELEMENTS: &[&str] = &[
    "header", "nav", "main", "article", "section", "aside", "footer", "figure", "figcaption",
    "time", "mark", "details", "summary",
];

/// Sectioning elements that scope `<header>` / `<footer>`
const SECTIONING: &[&str] = &["article", "aside", "nav", "section", "main"];

const DEPRECATED_ELEMENTS: &[&str] = &[
    "acronym", "applet", "basefont", "big", "blink", "center", "dir", "font", "frame",
    "frameset", "marquee", "strike", "tt",
];

const PRESENTATIONAL_ATTRIBUTES: &[&str] =
    &["style", "align", "bgcolor", "border", "color", "face", "valign"];

/// Tags whose empty instances are reported
const CONTAINER_ELEMENTS: &[&str] = &[
    "div", "span", "p", "section", "article", "aside", "li", "ul", "ol", "td", "h1", "h2", "h3",
    "h4", "h5", "h6",
];

/// Validate an HTML document
pub fn validate_markup(source: &str) -> Report {
    if source.trim().is_empty() {
        return Report::empty_input("markup");
    }
    debug!(analyzer = "markup", bytes = source.len(), "analysis started");

    let tree = ElementTree::parse(source);
    let mut findings = Findings::new();

    check_document(&tree, &mut findings);

    let errors = tree.structural_errors();
    if !errors.is_empty() {
        let listed: Vec<String> = errors.iter().take(3).map(ToString::to_string).collect();
        findings.add(
            Issue::error(
                Category::Structure,
                format!(
                    "Found {}: {}",
                    plural(errors.len(), "structural error", "structural errors"),
                    listed.join("; ")
                ),
            )
            .rule("well-formed"),
            20,
        );
        return findings.finish("markup");
    }

    check_semantics(&tree, &mut findings);
    check_landmarks(&tree, &mut findings);
    check_headings(&tree, &mut findings);
    check_images(&tree, &mut findings);
    check_forms(&tree, &mut findings);
    check_buttons_and_links(&tree, &mut findings);
    check_presentation(&tree, &mut findings);
    check_empty_elements(&tree, &mut findings);

    findings.finish("markup")
}

fn check_document(tree: &ElementTree, findings: &mut Findings) {
    if !tree.has_doctype() {
        findings.add(
            Issue::warning(Category::Structure, "Missing <!DOCTYPE html> declaration")
                .rule("doctype")
                .fixable(),
            5,
        );
    }
    let has_lang = tree
        .root_element()
        .and_then(|html| html.non_empty_attr("lang"))
        .is_some();
    if !has_lang {
        findings.add(
            Issue::warning(Category::BestPractice, "Missing lang attribute on <html>")
                .rule("html-lang")
                .fixable(),
            5,
        );
    }
    let has_charset = tree.elements_by_tag("meta").any(|meta| {
        meta.has_attr("charset")
            || (meta
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("content-type"))
                && meta
                    .attr("content")
                    .is_some_and(|c| c.to_ascii_lowercase().contains("charset")))
    });
    if !has_charset {
        findings.add(
            Issue::warning(Category::BestPractice, "Missing <meta charset> declaration")
                .rule("meta-charset")
                .fixable(),
            3,
        );
    }
    let has_title = tree
        .elements_by_tag("title")
        .any(|title| !title.text().is_empty());
    if !has_title {
        findings.add(
            Issue::warning(Category::BestPractice, "Missing or empty <title>").rule("document-title"),
            3,
        );
    }
}

fn check_semantics(tree: &ElementTree, findings: &mut Findings) {
    let divs = tree.count("div");
    let semantic = tree.elements_by_tags(SEMANTIC_ELEMENTS).count();
    if semantic > 0 {
        findings.note(
            Issue::success(
                Category::Structure,
                format!("Uses {}", plural(semantic, "semantic element", "semantic elements")),
            )
            .rule("semantic-html"),
        );
    } else if divs > 5 {
        findings.add(
            Issue::warning(
                Category::Structure,
                format!(
                    "{} <div> elements and no semantic elements; use header, nav, main, section or article",
                    divs
                ),
            )
            .rule("semantic-html"),
            15,
        );
    }
}

fn check_landmarks(tree: &ElementTree, findings: &mut Findings) {
    let mains = tree.count("main");
    if mains > 1 {
        findings.add(
            Issue::error(
                Category::Structure,
                format!("{} <main> elements; a page has exactly one", mains),
            )
            .rule("landmark-unique"),
            10,
        );
    }
    for tag in ["header", "footer"] {
        let top_level = tree
            .elements_by_tag(tag)
            .filter(|e| !e.has_ancestor(SECTIONING))
            .count();
        if top_level > 1 {
            findings.add(
                Issue::error(
                    Category::Structure,
                    format!("{} top-level <{}> elements; a page has at most one", top_level, tag),
                )
                .rule("landmark-unique"),
                10,
            );
        }
    }
}

fn check_headings(tree: &ElementTree, findings: &mut Findings) {
    match tree.count("h1") {
        0 => findings.add(
            Issue::warning(Category::Structure, "No <h1> heading").rule("heading-h1"),
            5,
        ),
        1 => {}
        n => findings.add(
            Issue::warning(
                Category::Structure,
                format!("{} <h1> headings; use one per page", n),
            )
            .rule("heading-h1"),
            3,
        ),
    }
    if let Some((from, to)) = skipped_heading(tree) {
        findings.add(
            Issue::warning(
                Category::Structure,
                format!("Heading level skipped from <h{}> to <h{}>", from, to),
            )
            .rule("heading-order"),
            3,
        );
    }
}

fn check_images(tree: &ElementTree, findings: &mut Findings) {
    let total = tree.count("img");
    let missing = tree
        .elements_by_tag("img")
        .filter(|img| !img.has_attr("alt"))
        .count();
    if missing > 0 {
        findings.add(
            Issue::error(
                Category::BestPractice,
                format!("{} of {} images have no alt attribute", missing, total),
            )
            .rule("img-alt")
            .fixable(),
            proportional(missing, total),
        );
    }
}

fn check_forms(tree: &ElementTree, findings: &mut Findings) {
    let controls = form_controls(tree);
    let unlabeled = controls.iter().filter(|c| !has_label(tree, c)).count();
    if unlabeled > 0 {
        findings.add(
            Issue::error(
                Category::BestPractice,
                format!(
                    "{} of {} form controls have no label",
                    unlabeled,
                    controls.len()
                ),
            )
            .rule("form-label"),
            proportional(unlabeled, controls.len()),
        );
    }
}

fn check_buttons_and_links(tree: &ElementTree, findings: &mut Findings) {
    let unnamed = tree
        .elements_by_tag("button")
        .filter(|b| !has_accessible_name(b))
        .count();
    if unnamed > 0 {
        findings.add(
            Issue::error(
                Category::BestPractice,
                format!("{} without text or accessible name", plural(unnamed, "button", "buttons")),
            )
            .rule("button-name"),
            8,
        );
    }

    let generic: Vec<String> = tree
        .elements_by_tag("a")
        .map(|a| a.text().to_lowercase())
        .filter(|text| GENERIC_LINK_TEXT.contains(&text.as_str()))
        .collect();
    if !generic.is_empty() {
        findings.add(
            Issue::warning(
                Category::BestPractice,
                format!(
                    "{} with generic text (\"{}\"); describe the destination",
                    plural(generic.len(), "link", "links"),
                    generic[0]
                ),
            )
            .rule("link-text"),
            5,
        );
    }
}

fn check_presentation(tree: &ElementTree, findings: &mut Findings) {
    let styled = tree
        .elements()
        .filter(|e| {
            e.attrs()
                .iter()
                .any(|(name, _)| PRESENTATIONAL_ATTRIBUTES.contains(&name.as_str()))
        })
        .count();
    if styled > 5 {
        findings.note(
            Issue::info(
                Category::Maintainability,
                format!("{} elements use inline presentational attributes; move styling to CSS", styled),
            )
            .rule("inline-styles"),
        );
    }

    for tag in DEPRECATED_ELEMENTS {
        if tree.count(tag) > 0 {
            findings.add(
                Issue::warning(
                    Category::Compatibility,
                    format!("<{}> is deprecated; use CSS instead", tag),
                )
                .rule("deprecated-element"),
                5,
            );
        }
    }
}

fn check_empty_elements(tree: &ElementTree, findings: &mut Findings) {
    for tag in CONTAINER_ELEMENTS {
        let empty = tree
            .elements_by_tag(tag)
            .filter(|e| e.is_empty() && e.attrs().is_empty())
            .count();
        if empty > 3 {
            findings.note(
                Issue::info(
                    Category::Performance,
                    format!("{} empty <{}> elements; remove unused markup", empty, tag),
                )
                .rule("empty-elements"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Severity;
    use pretty_assertions::assert_eq;

    const GOOD_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Recipes</title></head>
<body>
  <header><h1>Recipes</h1></header>
  <main>
    <article>
      <h2>Pancakes</h2>
      <img src="pancakes.jpg" alt="Stack of pancakes">
      <form>
        <label for="servings">Servings</label>
        <input id="servings" type="number">
        <button type="submit">Scale</button>
      </form>
    </article>
  </main>
  <footer><a href="/about">About the authors</a></footer>
</body>
</html>"#;

    #[test]
    fn test_good_page_scores_full() {
        let report = validate_markup(GOOD_PAGE);
        assert_eq!(report.score, 100, "{:#?}", report.issues);
        assert_eq!(report.summary.successes, 1);
    }

    #[test]
    fn test_document_basics() {
        let report = validate_markup("<p>hello</p>");
        let rules: Vec<_> = report.issues.iter().filter_map(|i| i.rule_id.as_deref()).collect();
        assert_eq!(
            rules,
            vec!["doctype", "html-lang", "meta-charset", "document-title", "heading-h1"]
        );
        assert_eq!(report.score, 100 - 5 - 5 - 3 - 3 - 5);
    }

    #[test]
    fn test_structural_errors_short_circuit() {
        let report = validate_markup("<!DOCTYPE html><html lang=\"en\"><div><span></div><img src=x>");
        let issue = report.find_rule("well-formed").unwrap();
        assert_eq!(issue.severity, Severity::Error);
        assert!(report.find_rule("img-alt").is_none());
    }

    #[test]
    fn test_image_alt_penalty_is_proportional() {
        let one_of_three = validate_markup(
            "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\"><title>t</title></head>\
             <body><h1>x</h1><img src=a alt=\"\"><img src=b alt=\"b\"><img src=c></body></html>",
        );
        assert_eq!(one_of_three.score, 100 - 4);
        let issue = one_of_three.find_rule("img-alt").unwrap();
        assert_eq!(issue.message, "1 of 3 images have no alt attribute");
    }

    #[test]
    fn test_div_soup_and_landmarks() {
        let divs = "<div></div>".repeat(6);
        let report = validate_markup(&format!("<main></main><main></main>{}", divs));
        assert!(report.find_rule("landmark-unique").is_some());
        // <main> counts as semantic
        assert!(report.find_rule("semantic-html").unwrap().severity == Severity::Success);
        assert!(report.find_rule("empty-elements").is_some());

        let report = validate_markup(&divs);
        assert_eq!(
            report.find_rule("semantic-html").unwrap().severity,
            Severity::Warning
        );
    }

    #[test]
    fn test_nested_headers_are_not_top_level() {
        let report = validate_markup(
            "<header></header><article><header></header></article><section><footer></footer></section><footer></footer>",
        );
        assert!(report.find_rule("landmark-unique").is_none());
    }

    #[test]
    fn test_headings() {
        let report = validate_markup("<h1>a</h1><h1>b</h1><h3>c</h3>");
        let h1 = report.find_rule("heading-h1").unwrap();
        assert!(h1.message.contains("2 <h1>"));
        assert_eq!(
            report.find_rule("heading-order").unwrap().message,
            "Heading level skipped from <h1> to <h3>"
        );
    }

    #[test]
    fn test_forms_buttons_links() {
        let report = validate_markup(
            "<label>Name <input></label><input id=\"e\"><input type=\"hidden\">\
             <button></button><button aria-label=\"Close\"></button><a href=\"/x\">Click here</a>",
        );
        assert_eq!(
            report.find_rule("form-label").unwrap().message,
            "1 of 2 form controls have no label"
        );
        assert!(report.find_rule("button-name").is_some());
        assert!(report.find_rule("link-text").unwrap().message.contains("click here"));
    }

    #[test]
    fn test_deprecated_and_inline_styles() {
        let styled = "<p style=\"color:red\">x</p>".repeat(6);
        let report = validate_markup(&format!("<center>a</center><font>b</font>{}", styled));
        let deprecated: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("deprecated-element"))
            .collect();
        assert_eq!(deprecated.len(), 2);
        assert!(report.find_rule("inline-styles").is_some());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(validate_markup("").score, 0);
    }
}
