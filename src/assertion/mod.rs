//! `expect()` and its matchers
//!
//! `expect(actual)` returns a matcher object. Each matcher either returns
//! `undefined` or throws an `AssertionError` whose message names the
//! expected and the received value, rendered as JSON-like text:
//!
//! ```text
//! Expected 5 but got 4
//! Expected {"a":1} (deep equality) but got {"a":2}
//! ```
//!
//! `.not` inverts a matcher: it passes exactly when the positive matcher
//! throws. `.resolves` / `.rejects` first settle the received promise by
//! driving the event loop, then apply the matcher to the outcome.

use crate::runtime::builtins::json;
use crate::runtime::inspect::inspect;
use crate::runtime::{error_parts, number_to_string, Interpreter, Interrupt, JsResult, Value};
use std::rc::Rc;

/// Constructor name carried by matcher failures
pub const ASSERTION_ERROR: &str = "AssertionError";

/// Default `toBeCloseTo` precision
const DEFAULT_PRECISION: i32 = 2;

/// Every matcher, with the verb used in negated failure messages
const MATCHERS: [(&str, &str); 21] = [
    ("toBe", "be"),
    ("toEqual", "equal"),
    ("toStrictEqual", "strictly equal"),
    ("toBeTruthy", "be truthy"),
    ("toBeFalsy", "be falsy"),
    ("toBeNull", "be null"),
    ("toBeUndefined", "be undefined"),
    ("toBeDefined", "be defined"),
    ("toBeNaN", "be NaN"),
    ("toContain", "contain"),
    ("toHaveLength", "have length"),
    ("toBeGreaterThan", "be greater than"),
    ("toBeGreaterThanOrEqual", "be greater than or equal to"),
    ("toBeLessThan", "be less than"),
    ("toBeLessThanOrEqual", "be less than or equal to"),
    ("toBeCloseTo", "be close to"),
    ("toHaveProperty", "have property"),
    ("toMatchObject", "match object"),
    ("toMatch", "match"),
    ("toThrow", "throw"),
    ("toBeInstanceOf", "be an instance of"),
];

/// How the received value is settled before matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settle {
    Now,
    Resolves,
    Rejects,
}

#[derive(Debug, Clone, Copy)]
struct Mode {
    negated: bool,
    settle: Settle,
}

/// The `expect` function handed to learner code
pub fn expect_function(interp: &Interpreter) -> Value {
    interp.native_function("expect", 1, |interp, _, args| {
        let actual = args.first().cloned().unwrap_or_default();
        Ok(matcher_object(
            interp,
            actual,
            Mode {
                negated: false,
                settle: Settle::Now,
            },
        ))
    })
}

/// Build the matcher object for `actual`
fn matcher_object(interp: &Interpreter, actual: Value, mode: Mode) -> Value {
    let obj = interp.new_object();
    let actual = Rc::new(actual);

    for (name, verb) in MATCHERS {
        let actual = actual.clone();
        interp.define_method(&obj, name, 1, move |interp, _, args| {
            let received = match mode.settle {
                Settle::Now => (*actual).clone(),
                Settle::Rejects if name == "toThrow" => {
                    // `rejects.toThrow` matches the rejection reason as if thrown
                    let reason = settle_promise(interp, &actual, Settle::Rejects)?;
                    interp.native_function("", 0, move |_, _, _| {
                        Err(Interrupt::Throw(reason.clone()))
                    })
                }
                settle => settle_promise(interp, &actual, settle)?,
            };
            run_matcher(interp, name, verb, &received, args, mode.negated)?;
            Ok(match mode.settle {
                Settle::Now => Value::Undefined,
                _ => {
                    let done = interp.promise_resolve(Value::Undefined)?;
                    interp.promise_object(done)
                }
            })
        });
    }

    if !mode.negated {
        let not_actual = actual.clone();
        interp.define_getter(&obj, "not", move |interp, _, _| {
            Ok(matcher_object(
                interp,
                (*not_actual).clone(),
                Mode {
                    negated: true,
                    ..mode
                },
            ))
        });
    }
    if mode.settle == Settle::Now {
        for (name, settle) in [("resolves", Settle::Resolves), ("rejects", Settle::Rejects)] {
            let actual = actual.clone();
            interp.define_getter(&obj, name, move |interp, _, _| {
                Ok(matcher_object(
                    interp,
                    (*actual).clone(),
                    Mode { settle, ..mode },
                ))
            });
        }
    }
    Value::Object(obj)
}

/// Await the received promise and pick the side `settle` asks for
fn settle_promise(interp: &mut Interpreter, actual: &Value, settle: Settle) -> JsResult<Value> {
    if Interpreter::promise_state(actual).is_none() {
        let then = match actual {
            Value::Object(_) => interp.get(actual, "then")?,
            _ => Value::Undefined,
        };
        if !then.is_callable() {
            let message = format!("Expected a promise but got {}", render(interp, actual)?);
            return Err(fail(interp, message));
        }
    }
    let message = match (interp.await_value(actual.clone()), settle) {
        (Ok(value), Settle::Resolves) => return Ok(value),
        (Err(Interrupt::Throw(reason)), Settle::Rejects) => return Ok(reason),
        (Ok(value), _) => format!(
            "Expected promise to reject but got resolved value {}",
            render(interp, &value)?
        ),
        (Err(Interrupt::Throw(reason)), _) => format!(
            "Expected promise to resolve but got rejection {}",
            render(interp, &reason)?
        ),
        (Err(abort), _) => return Err(abort),
    };
    Err(fail(interp, message))
}

/// Apply matcher `name`, inverting the outcome when `negated`
fn run_matcher(
    interp: &mut Interpreter,
    name: &str,
    verb: &str,
    actual: &Value,
    args: &[Value],
    negated: bool,
) -> JsResult<()> {
    let outcome = check(interp, name, actual, args);
    if !negated {
        return outcome;
    }
    match outcome {
        Err(Interrupt::Throw(_)) => Ok(()),
        Err(abort) => Err(abort),
        Ok(()) => {
            let mut message = format!("Expected {} not to {}", render(interp, actual)?, verb);
            if let Some(expected) = args.first() {
                message.push(' ');
                message.push_str(&render(interp, expected)?);
            }
            Err(fail(interp, message))
        }
    }
}

/// The positive form of every matcher
fn check(interp: &mut Interpreter, name: &str, actual: &Value, args: &[Value]) -> JsResult<()> {
    let expected = args.first().cloned().unwrap_or_default();
    let passed = match name {
        "toBe" => actual.same_value(&expected),
        "toEqual" => {
            let left = render(interp, actual)?;
            let right = render(interp, &expected)?;
            if left != right {
                return Err(fail(
                    interp,
                    format!("Expected {} (deep equality) but got {}", right, left),
                ));
            }
            true
        }
        "toStrictEqual" => strict_equal(interp, actual, &expected, 0)?,
        "toBeTruthy" => return expect_that(interp, actual.to_boolean(), "a truthy value", actual),
        "toBeFalsy" => return expect_that(interp, !actual.to_boolean(), "a falsy value", actual),
        "toBeNull" => return expect_that(interp, matches!(actual, Value::Null), "null", actual),
        "toBeUndefined" => return expect_that(interp, actual.is_undefined(), "undefined", actual),
        "toBeDefined" => return expect_that(interp, !actual.is_undefined(), "a defined value", actual),
        "toBeNaN" => {
            let nan = matches!(actual, Value::Number(n) if n.is_nan());
            return expect_that(interp, nan, "NaN", actual);
        }
        "toContain" => return check_contain(interp, actual, &expected),
        "toHaveLength" => return check_length(interp, actual, &expected),
        "toBeGreaterThan" | "toBeGreaterThanOrEqual" | "toBeLessThan" | "toBeLessThanOrEqual" => {
            return check_comparison(interp, name, actual, &expected)
        }
        "toBeCloseTo" => return check_close_to(interp, actual, &expected, args.get(1)),
        "toHaveProperty" => return check_property(interp, actual, args),
        "toMatchObject" => {
            if !matches_object(interp, actual, &expected, 0)? {
                let message = format!(
                    "Expected object matching {} but got {}",
                    render(interp, &expected)?,
                    render(interp, actual)?
                );
                return Err(fail(interp, message));
            }
            true
        }
        "toMatch" => return check_match(interp, actual, &expected),
        "toThrow" => return check_throw(interp, actual, args.first()),
        "toBeInstanceOf" => {
            if !expected.is_callable() {
                return Err(interp.type_error(format!(
                    "toBeInstanceOf expects a constructor but got {}",
                    inspect(&expected)
                )));
            }
            if !interp.instance_of(actual, &expected)? {
                let ctor = interp.get(&expected, "name")?.to_js_string();
                let message = format!(
                    "Expected instance of {} but got {}",
                    ctor,
                    render(interp, actual)?
                );
                return Err(fail(interp, message));
            }
            true
        }
        _ => true,
    };
    if passed {
        return Ok(());
    }
    let message = format!(
        "Expected {} but got {}",
        render(interp, &expected)?,
        render(interp, actual)?
    );
    Err(fail(interp, message))
}

fn expect_that(interp: &mut Interpreter, ok: bool, description: &str, actual: &Value) -> JsResult<()> {
    if ok {
        return Ok(());
    }
    let message = format!("Expected {} but got {}", description, render(interp, actual)?);
    Err(fail(interp, message))
}

fn check_contain(interp: &mut Interpreter, actual: &Value, item: &Value) -> JsResult<()> {
    let found = match actual {
        Value::String(s) => s.contains(&interp.to_string(item)?),
        Value::Object(_) if actual.is_array() => interp
            .iterate(actual)?
            .iter()
            .any(|element| element.strict_equals(item)),
        Value::Object(obj) => match &obj.borrow().kind {
            crate::runtime::ObjectKind::Set(values) => {
                values.iter().any(|v| v.same_value_zero(item))
            }
            _ => false,
        },
        _ => false,
    };
    if found {
        return Ok(());
    }
    let message = format!(
        "Expected value containing {} but got {}",
        render(interp, item)?,
        render(interp, actual)?
    );
    Err(fail(interp, message))
}

fn check_length(interp: &mut Interpreter, actual: &Value, expected: &Value) -> JsResult<()> {
    let length = match actual {
        Value::Undefined | Value::Null => Value::Undefined,
        _ => interp.get(actual, "length")?,
    };
    let Value::Number(length) = length else {
        let message = format!(
            "Expected value with length {} but got {}",
            render(interp, expected)?,
            render(interp, actual)?
        );
        return Err(fail(interp, message));
    };
    if Value::Number(length).same_value(expected) {
        return Ok(());
    }
    let message = format!(
        "Expected length {} but got {}",
        render(interp, expected)?,
        number_to_string(length)
    );
    Err(fail(interp, message))
}

fn check_comparison(
    interp: &mut Interpreter,
    name: &str,
    actual: &Value,
    expected: &Value,
) -> JsResult<()> {
    let (Value::Number(a), Value::Number(e)) = (actual, expected) else {
        let message = format!(
            "Expected numbers but got {} and {}",
            render(interp, actual)?,
            render(interp, expected)?
        );
        return Err(fail(interp, message));
    };
    let (passed, relation) = match name {
        "toBeGreaterThan" => (a > e, "greater than"),
        "toBeGreaterThanOrEqual" => (a >= e, "greater than or equal to"),
        "toBeLessThan" => (a < e, "less than"),
        _ => (a <= e, "less than or equal to"),
    };
    if passed {
        return Ok(());
    }
    Err(fail(
        interp,
        format!(
            "Expected value {} {} but got {}",
            relation,
            number_to_string(*e),
            number_to_string(*a)
        ),
    ))
}

fn check_close_to(
    interp: &mut Interpreter,
    actual: &Value,
    expected: &Value,
    precision: Option<&Value>,
) -> JsResult<()> {
    let precision = match precision {
        Some(Value::Number(p)) => *p as i32,
        _ => DEFAULT_PRECISION,
    };
    let epsilon = 10f64.powi(-precision) / 2.0;
    let (Value::Number(a), Value::Number(e)) = (actual, expected) else {
        let message = format!(
            "Expected numbers but got {} and {}",
            render(interp, actual)?,
            render(interp, expected)?
        );
        return Err(fail(interp, message));
    };
    let close = (a == e) || (a - e).abs() < epsilon;
    if close {
        return Ok(());
    }
    Err(fail(
        interp,
        format!(
            "Expected {} (within {}) but got {}",
            number_to_string(*e),
            number_to_string(epsilon),
            number_to_string(*a)
        ),
    ))
}

fn check_property(interp: &mut Interpreter, actual: &Value, args: &[Value]) -> JsResult<()> {
    let path_arg = args.first().cloned().unwrap_or_default();
    let path: Vec<String> = if path_arg.is_array() {
        let mut keys = Vec::new();
        for key in interp.iterate(&path_arg)? {
            keys.push(interp.to_property_key(&key)?);
        }
        keys
    } else {
        interp
            .to_string(&path_arg)?
            .split('.')
            .map(str::to_string)
            .collect()
    };
    let display_path = path.join(".");

    let mut current = actual.clone();
    for key in &path {
        let present = match &current {
            Value::Object(obj) => interp.has_property(obj, key),
            Value::String(s) => key == "length" || key.parse::<usize>().is_ok_and(|i| i < s.chars().count()),
            _ => false,
        };
        if !present {
            let message = format!(
                "Expected property '{}' but got {}",
                display_path,
                render(interp, actual)?
            );
            return Err(fail(interp, message));
        }
        current = interp.get(&current, key)?;
    }

    if let Some(expected) = args.get(1) {
        let left = render(interp, &current)?;
        let right = render(interp, expected)?;
        if left != right {
            return Err(fail(
                interp,
                format!(
                    "Expected property '{}' to be {} but got {}",
                    display_path, right, left
                ),
            ));
        }
    }
    Ok(())
}

fn check_match(interp: &mut Interpreter, actual: &Value, pattern: &Value) -> JsResult<()> {
    let Value::String(text) = actual else {
        let message = format!("Expected a string but got {}", render(interp, actual)?);
        return Err(fail(interp, message));
    };
    let matched = match crate::runtime::builtins::regexp::regexp_parts(pattern) {
        Some((regex, _)) => regex.is_match(text),
        None => text.contains(&interp.to_string(pattern)?),
    };
    if matched {
        return Ok(());
    }
    let message = format!(
        "Expected string matching {} but got {}",
        inspect(pattern),
        render(interp, actual)?
    );
    Err(fail(interp, message))
}

fn check_throw(interp: &mut Interpreter, actual: &Value, expected: Option<&Value>) -> JsResult<()> {
    if !actual.is_callable() {
        let message = format!("Expected a function but got {}", render(interp, actual)?);
        return Err(fail(interp, message));
    }
    let thrown = match interp.call(actual, Value::Undefined, &[]) {
        Ok(_) => {
            return Err(fail(
                interp,
                "Expected function to throw but got no error".to_string(),
            ))
        }
        Err(Interrupt::Throw(value)) => value,
        Err(abort) => return Err(abort),
    };
    let Some(expected) = expected.filter(|e| !e.is_undefined()) else {
        return Ok(());
    };
    let message = match error_parts(&thrown) {
        Some((_, message)) => message,
        None => interp.to_string(&thrown)?,
    };

    if let Some((regex, _)) = crate::runtime::builtins::regexp::regexp_parts(expected) {
        if regex.is_match(&message) {
            return Ok(());
        }
    } else if expected.is_callable() {
        if interp.instance_of(&thrown, expected)? {
            return Ok(());
        }
        let ctor = interp.get(expected, "name")?.to_js_string();
        let got = render(interp, &thrown)?;
        return Err(fail(
            interp,
            format!("Expected error of type {} but got {}", ctor, got),
        ));
    } else {
        let needle = match error_parts(expected) {
            Some((_, m)) => m,
            None => interp.to_string(expected)?,
        };
        if message.contains(&needle) {
            return Ok(());
        }
    }
    let message = format!(
        "Expected error message {} but got {}",
        render(interp, expected)?,
        render(interp, &Value::String(message))?
    );
    Err(fail(interp, message))
}

/// `toStrictEqual`: deep equality that also compares prototypes and
/// `undefined` properties
fn strict_equal(interp: &mut Interpreter, a: &Value, b: &Value, depth: usize) -> JsResult<bool> {
    let (Value::Object(x), Value::Object(y)) = (a, b) else {
        return Ok(a.same_value(b));
    };
    if Rc::ptr_eq(x, y) {
        return Ok(true);
    }
    let same_proto = match (&x.borrow().prototype, &y.borrow().prototype) {
        (Some(p), Some(q)) => Rc::ptr_eq(p, q),
        (None, None) => true,
        _ => false,
    };
    if !same_proto || a.is_array() != b.is_array() {
        return Ok(false);
    }
    let keys_a = interp.own_keys(a);
    let keys_b = interp.own_keys(b);
    if keys_a.len() != keys_b.len() || keys_a.iter().any(|k| !keys_b.contains(k)) {
        return Ok(false);
    }
    if a.is_array() {
        let (xs, ys) = (interp.iterate(a)?, interp.iterate(b)?);
        if xs.len() != ys.len() {
            return Ok(false);
        }
    }
    for key in keys_a {
        let va = interp.get(a, &key)?;
        let vb = interp.get(b, &key)?;
        if !interp.descend(depth, |interp| strict_equal(interp, &va, &vb, depth + 1))? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Recursive partial match used by `toMatchObject`
fn matches_object(
    interp: &mut Interpreter,
    actual: &Value,
    expected: &Value,
    depth: usize,
) -> JsResult<bool> {
    match (actual, expected) {
        (Value::Object(_), Value::Object(_)) if expected.is_array() => {
            if !actual.is_array() {
                return Ok(false);
            }
            let xs = interp.iterate(actual)?;
            let ys = interp.iterate(expected)?;
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (x, y) in xs.iter().zip(&ys) {
                if !interp.descend(depth, |interp| matches_object(interp, x, y, depth + 1))? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        (Value::Object(obj), Value::Object(_)) if !expected.is_callable() => {
            for key in interp.own_keys(expected) {
                if !interp.has_property(obj, &key) {
                    return Ok(false);
                }
                let x = interp.get(actual, &key)?;
                let y = interp.get(expected, &key)?;
                if !interp.descend(depth, |interp| matches_object(interp, &x, &y, depth + 1))? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(actual.same_value(expected)),
    }
}

/// Serialized form of a value for messages and `toEqual`
pub fn render(interp: &mut Interpreter, value: &Value) -> JsResult<String> {
    Ok(match value {
        Value::Undefined => "undefined".to_string(),
        Value::Number(n) => number_to_string(*n),
        Value::Object(obj) if obj.borrow().is_callable() => inspect(value),
        Value::Object(_) => {
            if let Some((name, message)) = error_parts(value) {
                return Ok(format!("{}: {}", name, message));
            }
            match json::stringify(interp, value) {
                Ok(Some(text)) => text,
                Ok(None) => inspect(value),
                Err(Interrupt::Throw(_)) => inspect(value),
                Err(abort) => return Err(abort),
            }
        }
        other => json::stringify(interp, other)?.unwrap_or_else(|| inspect(other)),
    })
}

/// An `AssertionError` throw
fn fail(interp: &Interpreter, message: String) -> Interrupt {
    Interrupt::Throw(interp.make_error(ASSERTION_ERROR, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn runtime() -> Runtime {
        let mut runtime = Runtime::new();
        let expect = expect_function(runtime.interpreter());
        runtime.set_global("expect", expect);
        runtime
    }

    fn assert_passes(source: &str) {
        if let Err(e) = runtime().eval(source) {
            panic!("{} failed: {}", source, e);
        }
    }

    fn failure(source: &str) -> String {
        runtime()
            .eval(source)
            .expect_err("assertion should fail")
            .to_string()
    }

    #[test]
    fn test_to_be() {
        assert_passes("expect(1).toBe(1); expect('a').toBe('a'); expect(NaN).toBe(NaN);");
        assert_eq!(failure("expect(4).toBe(5)"), "AssertionError: Expected 5 but got 4");
        assert_eq!(
            failure("expect('4').toBe(4)"),
            "AssertionError: Expected 4 but got \"4\""
        );
        assert!(failure("expect({}).toBe({})").contains("Expected {} but got {}"));
    }

    #[test]
    fn test_to_equal() {
        assert_passes("expect({ a: [1, 2] }).toEqual({ a: [1, 2] });");
        assert_eq!(
            failure("expect({ a: 2 }).toEqual({ a: 1 })"),
            r#"AssertionError: Expected {"a":1} (deep equality) but got {"a":2}"#
        );
    }

    #[test]
    fn test_not_inverts() {
        assert_passes("expect(1).not.toBe(2); expect([1]).not.toContain(3);");
        assert_eq!(
            failure("expect(2).not.toBe(2)"),
            "AssertionError: Expected 2 not to be 2"
        );
        assert_eq!(
            failure("expect(null).not.toBeNull()"),
            "AssertionError: Expected null not to be null"
        );
    }

    #[test]
    fn test_truthiness_and_definedness() {
        assert_passes(
            "expect(1).toBeTruthy(); expect('').toBeFalsy(); expect(null).toBeNull();
             expect(undefined).toBeUndefined(); expect(0).toBeDefined();",
        );
        assert_eq!(
            failure("expect(0).toBeTruthy()"),
            "AssertionError: Expected a truthy value but got 0"
        );
    }

    #[test]
    fn test_collections_and_numbers() {
        assert_passes(
            "expect([1, 2, 3]).toContain(2); expect('hello').toContain('ell');
             expect([1, 2]).toHaveLength(2); expect('abc').toHaveLength(3);
             expect(5).toBeGreaterThan(4); expect(5).toBeGreaterThanOrEqual(5);
             expect(1).toBeLessThan(2); expect(2).toBeLessThanOrEqual(2);
             expect(0.1 + 0.2).toBeCloseTo(0.3); expect(3.14159).toBeCloseTo(3.14, 2);",
        );
        assert_eq!(
            failure("expect([1, 2]).toHaveLength(3)"),
            "AssertionError: Expected length 3 but got 2"
        );
        assert!(failure("expect(3.2).toBeCloseTo(3.1, 2)").contains("Expected 3.1 (within 0.005) but got 3.2"));
    }

    #[test]
    fn test_object_matchers() {
        assert_passes(
            "const user = { name: 'Ada', address: { city: 'London', zip: 'N1' }, tags: ['x'] };
             expect(user).toHaveProperty('address.city');
             expect(user).toHaveProperty('address.city', 'London');
             expect(user).toMatchObject({ address: { city: 'London' } });
             expect(user).not.toHaveProperty('age');
             expect([1, 2]).toBeInstanceOf(Array);",
        );
        assert_eq!(
            failure("expect({ a: 1 }).toHaveProperty('b')"),
            r#"AssertionError: Expected property 'b' but got {"a":1}"#
        );
    }

    #[test]
    fn test_to_throw() {
        assert_passes(
            "expect(() => { throw new Error('boom happened'); }).toThrow();
             expect(() => { throw new Error('boom happened'); }).toThrow('boom');
             expect(() => { throw new TypeError('x'); }).toThrow(TypeError);
             expect(() => 1).not.toThrow();",
        );
        assert_eq!(
            failure("expect(() => 1).toThrow()"),
            "AssertionError: Expected function to throw but got no error"
        );
        assert!(failure("expect(() => { throw new Error('a'); }).toThrow('b')")
            .contains("Expected error message \"b\" but got \"a\""));
    }

    #[test]
    fn test_resolves_and_rejects() {
        assert_passes(
            "expect(Promise.resolve(3)).resolves.toBe(3);
             expect(Promise.reject(new Error('no'))).rejects.toHaveProperty('message', 'no');
             expect(Promise.reject(new Error('no'))).rejects.toThrow('no');
             expect(new Promise(r => setTimeout(() => r('late'), 50))).resolves.toBe('late');
             expect(Promise.resolve(1)).resolves.not.toBe(2);",
        );
        assert_eq!(
            failure("expect(Promise.resolve(1)).rejects.toBe(1)"),
            "AssertionError: Expected promise to reject but got resolved value 1"
        );
    }

    #[test]
    fn test_negation_applies_after_settling() {
        assert_passes(
            "expect(Promise.resolve(1)).not.resolves.toBe(2);
             expect(Promise.reject(new Error('no'))).not.rejects.toThrow('other');",
        );
        for chain in ["not.resolves", "resolves.not"] {
            assert_eq!(
                failure(&format!("expect(Promise.resolve(1)).{}.toBe(1)", chain)),
                "AssertionError: Expected 1 not to be 1"
            );
        }
    }

    #[test]
    fn test_deep_object_graphs() {
        assert_passes(
            "const chain = () => { let o = {}; for (let i = 0; i < 5000; i++) o = { n: o }; return o; };
             const a = chain();
             expect(a).toEqual(a);
             expect(a).toEqual(chain());
             expect(a).toStrictEqual(chain());
             expect(a).toMatchObject(chain());",
        );
        assert_eq!(
            failure(
                "const chain = () => { let o = {}; for (let i = 0; i < 20000; i++) o = { n: o }; return o; };
                 expect(chain()).toStrictEqual(chain())"
            ),
            "RangeError: Maximum call stack size exceeded"
        );
    }
}
