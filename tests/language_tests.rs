//! Integration tests for the script interpreter

mod common;
use codegrade::Value;
use common::{run_js, run_then};

mod try_catch {
    use super::*;

    #[test]
    fn test_try_catch_with_error_value() {
        let result = run_js("
            let caught = '';
            try {
                throw 'my error';
            } catch (e) {
                caught = e;
            }
            caught
        ").unwrap();
        assert_eq!(result, Value::String("my error".to_string()));
    }

    #[test]
    fn test_try_finally() {
        let result = run_js("
            let result = 0;
            try {
                result = 1;
            } finally {
                result = result + 10;
            }
            result
        ").unwrap();
        assert_eq!(result, Value::Number(11.0));
    }

    #[test]
    fn test_nested_try_catch() {
        let result = run_js("
            let outer = 0;
            let inner = 0;
            try {
                try {
                    throw 'inner error';
                } catch (e) {
                    inner = 1;
                    throw 'outer error';
                }
            } catch (e) {
                outer = 1;
            }
            outer + inner * 10
        ").unwrap();
        assert_eq!(result, Value::Number(11.0));
    }

    #[test]
    fn test_error_subclasses() {
        let result = run_js("
            const names = [];
            for (const f of [() => null.x, () => missing, () => { throw new RangeError('r'); }]) {
                try { f(); } catch (e) { names.push(e.name + (e instanceof Error)); }
            }
            names.join(',')
        ").unwrap();
        assert_eq!(
            result,
            Value::String("TypeErrortrue,ReferenceErrortrue,RangeErrortrue".to_string())
        );
    }
}

mod recursion {
    use super::*;

    #[test]
    fn test_fibonacci_recursive() {
        let result = run_js("
            function fib(n) {
                if (n <= 1) return n;
                return fib(n - 1) + fib(n - 2);
            }
            fib(10)
        ");
        assert_eq!(result.unwrap(), Value::Number(55.0));
    }

    #[test]
    fn test_mutual_recursion() {
        let result = run_js("
            function isEven(n) {
                if (n === 0) return true;
                return isOdd(n - 1);
            }
            function isOdd(n) {
                if (n === 0) return false;
                return isEven(n - 1);
            }
            isEven(10)
        ");
        assert_eq!(result.unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_runaway_recursion_is_catchable() {
        let result = run_js("
            function down() { return down(); }
            let message = '';
            try { down(); } catch (e) { message = e.name + ': ' + e.message; }
            message
        ");
        assert_eq!(
            result.unwrap(),
            Value::String("RangeError: Maximum call stack size exceeded".to_string())
        );
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn test_syntax_error_unexpected_token() {
        let err = run_js("let x = ;").unwrap_err();
        assert!(err.to_string().contains("Unexpected"));
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["let x = (1 + 2", "function foo() { return 1;", "let x = \"unclosed", "1 = 2"] {
            assert!(run_js(source).is_err(), "{} should not parse", source);
        }
    }

    #[test]
    fn test_generators_are_rejected() {
        assert!(run_js("function* gen() { yield 1; }").is_err());
    }

    #[test]
    fn test_property_of_undefined() {
        let err = run_js("let x;\nx.property").unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Cannot read properties of undefined (reading 'property')"
        );
    }
}

mod edge_cases {
    use super::*;

    #[test]
    fn test_nan_and_infinity() {
        assert_eq!(run_js("let x = 0 / 0; x === x").unwrap(), Value::Boolean(false));
        assert_eq!(run_js("1 / 0 === Infinity").unwrap(), Value::Boolean(true));
        assert_eq!(run_js("-0 === 0").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_coercions() {
        assert_eq!(run_js("typeof null").unwrap(), Value::String("object".to_string()));
        assert_eq!(run_js("[] ? 'truthy' : 'falsy'").unwrap(), Value::String("truthy".to_string()));
        assert_eq!(run_js("'5' + 3").unwrap(), Value::String("53".to_string()));
        assert_eq!(run_js("'5' - 3").unwrap(), Value::Number(2.0));
        assert_eq!(run_js("1 == '1'").unwrap(), Value::Boolean(true));
        assert_eq!(run_js("null == undefined").unwrap(), Value::Boolean(true));
    }
}

mod builtins {
    use super::*;

    #[test]
    fn test_array_pipeline() {
        let result = run_js("
            [5, 1, 4, 2, 3]
                .filter(n => n > 1)
                .map(n => n * 10)
                .sort((a, b) => a - b)
                .reduce((acc, n) => acc + n, 0)
        ");
        assert_eq!(result.unwrap(), Value::Number(140.0));
    }

    #[test]
    fn test_strings_and_json() {
        let result = run_js("
            const word = '  Hello World '.trim().toLowerCase().split(' ').join('-');
            JSON.stringify({ word, padded: '7'.padStart(3, '0'), list: [1, 'a', null] })
        ");
        assert_eq!(
            result.unwrap(),
            Value::String(r#"{"word":"hello-world","padded":"007","list":[1,"a",null]}"#.to_string())
        );
    }

    #[test]
    fn test_map_set_and_spread() {
        let result = run_js("
            const counts = new Map();
            for (const c of 'banana') counts.set(c, (counts.get(c) || 0) + 1);
            const unique = [...new Set('banana')].join('');
            unique + ':' + counts.get('a')
        ");
        assert_eq!(result.unwrap(), Value::String("ban:3".to_string()));
    }
}

mod async_execution {
    use super::*;

    #[test]
    fn test_microtasks_before_timers() {
        let result = run_then(
            "
            const order = [];
            setTimeout(() => order.push('timer'), 0);
            Promise.resolve().then(() => order.push('micro'));
            order.push('sync');
            ",
            "order.join(',')",
        );
        assert_eq!(result, Value::String("sync,micro,timer".to_string()));
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let result = run_then(
            "
            const fired = [];
            setTimeout(() => fired.push(3), 300);
            setTimeout(() => fired.push(1), 100);
            const cancelled = setTimeout(() => fired.push('never'), 50);
            clearTimeout(cancelled);
            setTimeout(() => fired.push(2), 200);
            ",
            "fired.join(',')",
        );
        assert_eq!(result, Value::String("1,2,3".to_string()));
    }

    #[test]
    fn test_async_await_and_combinators() {
        let result = run_then(
            "
            let out = '';
            async function total() {
                const values = await Promise.all([1, Promise.resolve(2), new Promise(r => setTimeout(() => r(3), 10))]);
                return values.reduce((a, b) => a + b, 0);
            }
            total().then(v => { out += v; });
            Promise.race([new Promise(r => setTimeout(() => r('slow'), 50)), Promise.resolve('fast')])
                .then(v => { out += ':' + v; });
            Promise.reject(new Error('boom')).catch(e => { out += ':' + e.message; }).finally(() => { out += ':done'; });
            ",
            "out",
        );
        let text = result.to_js_string();
        // timers settle after every microtask chain
        assert!(text.ends_with('6'), "{}", text);
        assert!(text.contains(":fast"), "{}", text);
        let boom = text.find(":boom").unwrap();
        let done = text.find(":done").unwrap();
        assert!(boom < done);
    }
}
