//! JavaScript value types
//!
//! This module defines the runtime representation of JavaScript values and
//! the primitive conversions that need no interpreter access.

use super::object::{Object, ObjectKind, ObjectRef};
use crate::lexer::numeric::string_to_number;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A JavaScript value
#[derive(Clone, Default)]
pub enum Value {
    /// undefined
    #[default]
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Object (includes arrays, functions, etc.)
    Object(ObjectRef),
}

impl Value {
    /// Check if value is undefined
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is nullish (null or undefined)
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// The object behind this value, if it is one
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Check if value can be called
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|o| o.borrow().is_callable())
    }

    /// Check if value is an array
    pub fn is_array(&self) -> bool {
        self.as_object()
            .is_some_and(|o| matches!(o.borrow().kind, ObjectKind::Array(_)))
    }

    /// Convert to boolean (truthiness)
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// `ToNumber` for primitives; objects must be converted to a primitive
    /// by the interpreter first
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(true) => 1.0,
            Value::Boolean(false) => 0.0,
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => f64::NAN,
        }
    }

    /// `ToString` for primitives. Objects render as their tag; the
    /// interpreter applies `toString()` where learner code can observe it.
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Array(_) => "[object Array]".to_string(),
                ObjectKind::Function(_) | ObjectKind::Native(_) => "[object Function]".to_string(),
                _ => "[object Object]".to_string(),
            },
        }
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `Object.is` semantics: like `===` except `NaN` equals itself and the
    /// two zeros differ
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                (a.is_nan() && b.is_nan()) || (a == b && a.is_sign_negative() == b.is_sign_negative())
            }
            _ => self.strict_equals(other),
        }
    }

    /// SameValueZero, used by `includes`, `Map` and `Set`
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.strict_equals(other),
        }
    }

    /// Create a new empty ordinary object with the given prototype
    pub fn new_object(prototype: Option<ObjectRef>) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::with_prototype(
            ObjectKind::Ordinary,
            prototype,
        ))))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => match obj.try_borrow() {
                Ok(o) => write!(f, "[object {}]", o.class_name()),
                Err(_) => write!(f, "[object]"),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}

/// Number-to-string conversion following the ECMAScript algorithm: the
/// shortest round-tripping digits, positional notation for exponents in
/// [-7, 21) and exponential notation otherwise.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if n < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e4"
    let sci = format!("{:e}", n.abs());
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let k = digits.len() as i32;
    let point = exponent + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        format!("{}.{}", &digits[..point as usize], &digits[point as usize..])
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 >= 0 { "+" } else { "-" };
        let rest = if k > 1 {
            format!("{}.{}", &digits[..1], &digits[1..])
        } else {
            digits.clone()
        };
        format!("{}e{}{}", rest, exp_sign, (point - 1).abs())
    };
    format!("{}{}", sign, body)
}

/// Canonical string form of an array index, if `key` is one
pub fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// `ToInt32` as used by the bitwise operators
pub fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc() % 4294967296.0;
    let n = if n < 0.0 { n + 4294967296.0 } else { n };
    n as u32 as i32
}

/// `ToUint32`
pub fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

/// Relative index used by `slice`, `splice` and friends
pub fn relative_index(value: f64, len: usize) -> usize {
    let len_f = len as f64;
    let v = if value.is_nan() { 0.0 } else { value.trunc() };
    if v < 0.0 {
        (len_f + v).max(0.0) as usize
    } else {
        v.min(len_f) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-1.5), "-1.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012.0), "123456789012");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(2.5e-8), "2.5e-8");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_equality() {
        let nan = Value::Number(f64::NAN);
        assert!(!nan.strict_equals(&nan));
        assert!(nan.same_value(&nan));
        assert!(!Value::Number(0.0).same_value(&Value::Number(-0.0)));
        assert!(Value::Number(0.0).same_value_zero(&Value::Number(-0.0)));
        assert!(Value::from("a").strict_equals(&Value::from("a")));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from("").to_boolean());
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(Value::new_object(None).to_boolean());
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(to_int32(4294967297.0), 1);
        assert_eq!(to_int32(-1.0), -1);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(relative_index(-2.0, 5), 3);
        assert_eq!(relative_index(10.0, 5), 5);
    }

    #[test]
    fn test_array_index() {
        assert_eq!(array_index("3"), Some(3));
        assert_eq!(array_index("03"), None);
        assert_eq!(array_index("length"), None);
    }
}
