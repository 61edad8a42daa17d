//! Integration tests for the static analyzers

mod common;
use codegrade::analysis::{LevelCounts, QualityLevel};
use codegrade::{
    analyze_script, audit_accessibility, validate_markup, validate_style, Category,
    ComplianceLevel, Severity,
};
use common::{ACCESSIBLE_PAGE, BROKEN_PAGE, CLEAN_CSS};
use pretty_assertions::assert_eq;

mod scoring {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scores_stay_in_range() {
        let terrible_script = "var a = 1; var b = 2; var c = 3; var d = 4; var e = 5; var f = 6;\n".repeat(20)
            + &"if (a == b) { debugger; }\n".repeat(20);
        for score in [
            analyze_script(&terrible_script).score,
            validate_markup(&"<center><font>x</font></center><div><span></div>".repeat(10)).score,
            validate_style(&".a { color: red\n".repeat(10)).score,
            audit_accessibility(BROKEN_PAGE).score,
        ] {
            assert!(score <= 100);
        }
    }

    #[test]
    fn test_adding_violations_never_raises_score() {
        let base = "const total = 1;\nmodule.exports = { total };\n";
        let worse = format!("{}var extra = 2;\nextra == total;\n", base);
        assert!(analyze_script(&worse).score <= analyze_script(base).score);

        let page = ACCESSIBLE_PAGE.replace("</main>", "<img src=\"x.png\"></main>");
        assert!(audit_accessibility(&page).score <= audit_accessibility(ACCESSIBLE_PAGE).score);
    }

    #[test]
    fn test_reports_are_deterministic() {
        let first = serde_json::to_string(&audit_accessibility(BROKEN_PAGE)).unwrap();
        let second = serde_json::to_string(&audit_accessibility(BROKEN_PAGE)).unwrap();
        assert_eq!(first, second);
        assert_eq!(validate_markup(BROKEN_PAGE), validate_markup(BROKEN_PAGE));
    }

    #[test]
    fn test_empty_input_everywhere() {
        for report in [
            analyze_script(""),
            validate_markup("   "),
            validate_style("\n\t"),
            audit_accessibility("").report,
        ] {
            assert_eq!(report.score, 0);
            assert_eq!(report.issues.len(), 1);
            assert_eq!(report.issues[0].severity, Severity::Info);
        }
    }
}

mod script {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_var_declarations() {
        let report = analyze_script("var x = 1; var y = 2;");
        let issue = report.find_rule("no-var").unwrap();
        assert!(issue.fixable);
        assert!(report.score < 100);
    }

    #[test]
    fn test_issue_json_shape() {
        let report = analyze_script("let a = 1;\nif (a == 2) { console.log(a); }\n");
        let json = serde_json::to_value(&report).unwrap();
        let eqeqeq = json["issues"]
            .as_array()
            .unwrap()
            .iter()
            .find(|i| i["ruleId"] == "eqeqeq")
            .unwrap();
        assert_eq!(eqeqeq["severity"], "warning");
        assert_eq!(eqeqeq["fixable"], true);
        assert!(eqeqeq.get("conformanceLevel").is_none());
    }
}

mod markup {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessible_page_is_clean() {
        let report = validate_markup(ACCESSIBLE_PAGE);
        assert_eq!(report.score, 100);
        assert_eq!(report.summary.errors + report.summary.warnings, 0);
        assert_eq!(report.summary.level, QualityLevel::Excellent);
    }

    #[test]
    fn test_broken_page() {
        let report = validate_markup(BROKEN_PAGE);
        for rule in ["doctype", "html-lang", "document-title", "img-alt", "form-label"] {
            assert!(report.find_rule(rule).is_some(), "missing {}", rule);
        }
        assert!(report.score < 70);
    }
}

mod style {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_stylesheet() {
        let report = validate_style(CLEAN_CSS);
        assert_eq!(report.score, 100);
        assert_eq!(report.summary.successes, 1);
    }

    #[test]
    fn test_double_semicolon() {
        let report = validate_style("a{color:red;;}");
        assert!(report.find_rule("brace-balance").is_none());
    }

    #[test]
    fn test_unbalanced_braces_short_circuit() {
        let report = validate_style(".a { color: red !important;\n");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].category, Category::Structure);
        assert_eq!(report.score, 80);
    }
}

mod accessibility {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_accessible_page_is_aaa() {
        let report = audit_accessibility(ACCESSIBLE_PAGE);
        assert_eq!(report.compliance_level, ComplianceLevel::AAA);
        assert_eq!(report.score, 100);
    }

    #[test]
    fn test_one_image_without_alt() {
        let page = ACCESSIBLE_PAGE.replace(" alt=\"A stack of pancakes\"", "");
        let report = audit_accessibility(&page);
        let alt: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.rule_id.as_deref() == Some("image-alt"))
            .collect();
        assert_eq!(alt.len(), 1);
        assert_eq!(alt[0].severity, Severity::Error);
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.compliance_level, ComplianceLevel::NotCompliant);
    }

    #[test]
    fn test_no_images_no_alt_issue() {
        let report = audit_accessibility("<html lang=\"en\"><title>t</title><main><p>hi</p></main></html>");
        assert!(report.find_rule("image-alt").is_none());
    }

    #[test]
    fn test_broken_page_groups() {
        let report = audit_accessibility(BROKEN_PAGE);
        for rule in [
            "image-alt",
            "heading-order",
            "keyboard-access",
            "page-title",
            "link-purpose",
            "html-lang",
            "input-label",
            "duplicate-id",
        ] {
            assert!(report.find_rule(rule).is_some(), "missing {}", rule);
        }
        let counts = report.summary.by_level.unwrap();
        assert!(counts.a >= 8);
        assert_eq!(report.compliance_level.to_string(), "Not Compliant");
    }

    #[test]
    fn test_json_flattens_report() {
        let json = serde_json::to_value(audit_accessibility(ACCESSIBLE_PAGE)).unwrap();
        assert_eq!(json["complianceLevel"], "AAA");
        assert_eq!(json["score"], 100);
        assert_eq!(
            json["summary"]["byLevel"],
            serde_json::to_value(LevelCounts::default()).unwrap()
        );
    }
}
