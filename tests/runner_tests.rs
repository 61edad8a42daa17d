//! Integration tests for the test runner, matchers and hints

use codegrade::config::RunnerConfig;
use codegrade::hints::{hints_for, quick_fix_for, HintKind};
use codegrade::sandbox::LogLevel;
use codegrade::{run_tests, TestRunner};
use pretty_assertions::assert_eq;

mod runner {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_second_of_three_fails() {
        let run = run_tests(
            r#"
            describe("cart", () => {
                it("starts empty", () => expect([].length).toBe(0));
                it("throws", () => { throw new Error("cart exploded"); });
                it("adds", () => expect([1].length).toBe(1));
            });
            "#,
        );
        assert_eq!(run.total, 3);
        assert_eq!(run.passed_count, 2);
        assert_eq!(run.failed_count, 1);
        assert!(!run.passed);
        assert_eq!(run.error, None);
        let failure = run.failures().next().unwrap();
        assert_eq!(failure.name, "cart > throws");
        assert!(failure.error.as_deref().unwrap().contains("cart exploded"));
    }

    #[test]
    fn test_never_settling_case_times_out() {
        let runner = TestRunner::with_config(&RunnerConfig {
            timeout_ms: 200,
            ..RunnerConfig::default()
        });
        let run = runner.run(
            r#"
            test("hangs", () => new Promise(() => {}));
            test("spins", () => { while (true) {} });
            test("still runs", () => expect(1).toBe(1));
            "#,
        );
        assert_eq!(run.total, 3);
        assert_eq!(
            run.results[0].error.as_deref(),
            Some("Test timeout: exceeded 200ms")
        );
        assert_eq!(
            run.results[1].error.as_deref(),
            Some("Test timeout: exceeded 200ms")
        );
        assert!(run.results[2].passed);
    }

    #[test]
    fn test_registration_error_is_reported() {
        let run = run_tests("describe('x', () => { it('a', () => {}); });\nnotAFunction();");
        assert!(!run.passed);
        assert_eq!(
            run.error.as_deref(),
            Some("ReferenceError: notAFunction is not defined")
        );
        assert_eq!(run.total, 1);
    }

    #[test]
    fn test_async_tests_and_timers() {
        let run = run_tests(
            r#"
            const delay = (ms, v) => new Promise(r => setTimeout(() => r(v), ms));
            test("awaits", async () => {
                const v = await delay(1000, 7);
                expect(v).toBe(7);
            });
            test("resolves", () => expect(delay(10, "ok")).resolves.toBe("ok"));
            test("rejects", async () => {
                await expect(Promise.reject(new Error("nope"))).rejects.toThrow("nope");
            });
            "#,
        );
        assert!(run.passed, "{}", run);
    }

    #[test]
    fn test_console_is_captured() {
        let run = run_tests("console.log('setup', 1);\ntest('t', () => console.warn({ a: 1 }));");
        let levels: Vec<LogLevel> = run.logs.iter().map(|l| l.level).collect();
        assert_eq!(levels, vec![LogLevel::Log, LogLevel::Warn]);
        assert_eq!(run.logs[0].message, "setup 1");
    }

    #[test]
    fn test_json_field_names() {
        let run = run_tests("test('a', () => {});");
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["passedCount"], 1);
        assert_eq!(json["failedCount"], 0);
        assert!(json["results"][0]["durationMs"].is_number());
    }
}

mod matchers {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    fn outcome(assertion: &str) -> Result<(), String> {
        let run = run_tests(&format!("test('m', () => {{ {} }});", assertion));
        match run.results[0].error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    #[test]
    fn test_to_be_on_primitives() {
        for value in ["1", "'a'", "true", "null", "undefined", "NaN", "-0"] {
            assert_eq!(outcome(&format!("expect({0}).toBe({0});", value)), Ok(()));
        }
    }

    #[test]
    fn test_not_inverts() {
        for (a, b) in [("1", "1"), ("1", "2"), ("'x'", "'x'"), ("{}", "{}")] {
            let positive = outcome(&format!("expect({}).toBe({});", a, b));
            let negative = outcome(&format!("expect({}).not.toBe({});", a, b));
            assert_eq!(positive.is_ok(), negative.is_err(), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            outcome("expect(2 + 2).toBe(5);"),
            Err("Expected 5 but got 4".to_string())
        );
        assert_eq!(
            outcome("expect({ a: 1 }).toEqual({ a: 2 });"),
            Err("Expected {\"a\":2} (deep equality) but got {\"a\":1}".to_string())
        );
        assert!(outcome("expect(0.1 + 0.2).toBeCloseTo(0.3);").is_ok());
        assert!(outcome("expect({ a: { b: 1 }, c: 2 }).toMatchObject({ a: { b: 1 } });").is_ok());
        assert!(outcome("expect(() => { throw new TypeError('bad input'); }).toThrow('bad');").is_ok());
        assert!(outcome("expect([1, 2, 3]).toContain(2);").is_ok());
        assert!(outcome("expect('abc').toHaveLength(3);").is_ok());
        assert!(outcome("expect({ a: { b: 2 } }).toHaveProperty('a.b', 2);").is_ok());
    }

    #[test]
    fn test_not_with_settled_promises() {
        assert_eq!(
            outcome("expect(Promise.resolve(1)).not.resolves.toBe(1);"),
            Err("Expected 1 not to be 1".to_string())
        );
        assert_eq!(
            outcome("expect(Promise.resolve(1)).resolves.not.toBe(1);"),
            Err("Expected 1 not to be 1".to_string())
        );
        assert_eq!(outcome("expect(Promise.resolve(1)).not.resolves.toBe(2);"), Ok(()));
        let negated = outcome("expect(Promise.reject(new Error('late'))).not.rejects.toThrow('late');");
        assert!(negated.unwrap_err().contains("not to throw"));
    }
}

mod robustness {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deeply_nested_learner_source() {
        for depth in [1500, 20_000] {
            let source = format!(
                "it('x', () => {{ const v = {}1{}; }});",
                "(".repeat(depth),
                ")".repeat(depth)
            );
            let run = run_tests(&source);
            assert_eq!(run.total, 1);
            assert_eq!(run.failed_count, 1);
            assert!(run.error.is_some());
        }
    }

    #[test]
    fn test_deep_object_chains() {
        let run = run_tests(
            r#"
            function chain(n) { let o = {}; for (let i = 0; i < n; i++) o = { n: o }; return o; }
            test("deep equality", () => { const o = chain(5000); expect(o).toEqual(o); });
            test("serializes", () => expect(JSON.stringify(chain(3))).toBe('{"n":{"n":{"n":{}}}}'));
            test("too deep to serialize", () => JSON.stringify(chain(20000)));
            "#,
        );
        assert!(run.results[0].passed);
        assert!(run.results[1].passed);
        assert_eq!(
            run.results[2].error.as_deref(),
            Some("Maximum call stack size exceeded")
        );
    }
}

mod hints {
    use super::*;
    #[allow(unused_imports)]
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hints_for_real_failures() {
        let run = run_tests(
            r#"
            function sum(list) { let total = 0; for (let i = 1; i < list.length; i++) total += list[i]; }
            test("sum > returns", () => expect(sum([1, 2])).toBe(3));
            test("uses helper", () => helper());
            "#,
        );
        let failures: Vec<_> = run.failures().collect();
        assert_eq!(failures.len(), 2);

        let fix = quick_fix_for(failures[0]).unwrap();
        assert_eq!(fix.fix, "Add a `return` statement with the result");
        let fix = quick_fix_for(failures[1]).unwrap();
        assert_eq!(fix.issue, "`helper` is not defined");

        let one = hints_for(failures[1], 1);
        let three = hints_for(failures[1], 3);
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].kind, HintKind::Observation);
        assert!(three.contains(&one[0]));
        assert!(three.iter().any(|h| h.link.is_some()));
    }

    #[test]
    fn test_passing_run_has_no_hints() {
        let run = run_tests("test('ok', () => expect(true).toBeTruthy());");
        assert!(hints_for(&run.results[0], 3).is_empty());
        assert!(quick_fix_for(&run.results[0]).is_none());
    }
}
