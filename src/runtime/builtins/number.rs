//! `Number`, `Boolean` and `Math`

use super::{arg, define_constructor, define_global, native};
use crate::lexer::numeric::{parse_float_prefix, parse_int_prefix};
use crate::runtime::eval::js_pow;
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::object::PropertyFlags;
use crate::runtime::value::{number_to_string, to_int32, Value};

/// Largest integer `n` such that `n` and `n + 1` are both exact doubles
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn register_number(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.number_prototype.clone();
    let constructor = define_constructor(
        interp,
        "Number",
        1,
        &prototype,
        native(|interp, _, args| to_number_arg(interp, args)),
        native(|interp, _, args| to_number_arg(interp, args)),
    );

    {
        let mut ctor = constructor.borrow_mut();
        for (name, value) in [
            ("MAX_SAFE_INTEGER", MAX_SAFE_INTEGER),
            ("MIN_SAFE_INTEGER", -MAX_SAFE_INTEGER),
            ("EPSILON", f64::EPSILON),
            ("MAX_VALUE", f64::MAX),
            ("MIN_VALUE", 5e-324),
            ("POSITIVE_INFINITY", f64::INFINITY),
            ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
            ("NaN", f64::NAN),
        ] {
            ctor.define(name, Value::Number(value), PropertyFlags::empty());
        }
    }

    interp.define_method(&constructor, "isInteger", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.trunc() == n
        )))
    });
    interp.define_method(&constructor, "isSafeInteger", 1, |_, _, args| {
        Ok(Value::Boolean(matches!(
            arg(args, 0),
            Value::Number(n) if n.is_finite() && n.trunc() == n && n.abs() <= MAX_SAFE_INTEGER
        )))
    });
    interp.define_method(&constructor, "isFinite", 1, |_, _, args| {
        Ok(Value::Boolean(
            matches!(arg(args, 0), Value::Number(n) if n.is_finite()),
        ))
    });
    interp.define_method(&constructor, "isNaN", 1, |_, _, args| {
        Ok(Value::Boolean(
            matches!(arg(args, 0), Value::Number(n) if n.is_nan()),
        ))
    });
    interp.define_method(&constructor, "parseFloat", 1, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float_prefix(&text)))
    });
    interp.define_method(&constructor, "parseInt", 2, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let radix = match arg(args, 1) {
            Value::Undefined => None,
            other => match to_int32(interp.to_number(&other)?) {
                0 => None,
                r @ 2..=36 => Some(r as u32),
                _ => return Ok(Value::Number(f64::NAN)),
            },
        };
        Ok(Value::Number(parse_int_prefix(&text, radix)))
    });

    interp.define_method(&prototype, "toString", 1, |interp, this, args| {
        let n = this_number(interp, this, "toString")?;
        let radix = match arg(args, 0) {
            Value::Undefined => 10,
            other => interp.to_number(&other)? as u32,
        };
        if !(2..=36).contains(&radix) {
            return Err(interp.range_error("toString() radix must be between 2 and 36"));
        }
        Ok(Value::String(if radix == 10 {
            number_to_string(n)
        } else {
            to_radix_string(n, radix)
        }))
    });

    interp.define_method(&prototype, "toFixed", 1, |interp, this, args| {
        let n = this_number(interp, this, "toFixed")?;
        let digits = interp.to_number(&arg(args, 0))?;
        let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
        if !(0.0..=100.0).contains(&digits) {
            return Err(interp.range_error("toFixed() digits argument must be between 0 and 100"));
        }
        Ok(Value::String(to_fixed(n, digits as usize)))
    });

    interp.define_method(&prototype, "valueOf", 0, |interp, this, _| {
        this_number(interp, this, "valueOf").map(Value::Number)
    });
}

fn to_number_arg(interp: &mut Interpreter, args: &[Value]) -> JsResult<Value> {
    match args.first() {
        None => Ok(Value::Number(0.0)),
        Some(value) => interp.to_number(value).map(Value::Number),
    }
}

fn this_number(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        _ => Err(interp.type_error(format!(
            "Number.prototype.{} requires that 'this' be a Number",
            method
        ))),
    }
}

/// `Number.prototype.toFixed`. Exact ties round away from zero.
pub(crate) fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let scaled = n.abs() * 10f64.powi(digits as i32);
    if scaled < MAX_SAFE_INTEGER && scaled - scaled.trunc() == 0.5 {
        let units = format!("{:0>width$}", scaled.trunc() as u64 + 1, width = digits + 1);
        let (int_part, frac_part) = units.split_at(units.len() - digits);
        let sign = if n < 0.0 { "-" } else { "" };
        return if digits == 0 {
            format!("{}{}", sign, int_part)
        } else {
            format!("{}{}.{}", sign, int_part, frac_part)
        };
    }
    let formatted = format!("{:.*}", digits, n);
    // "-0.00" prints as "0.00" once rounded to zero
    if formatted.starts_with('-') && formatted[1..].chars().all(|c| c == '0' || c == '.') {
        formatted[1..].to_string()
    } else {
        formatted
    }
}

fn to_radix_string(n: f64, radix: u32) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let negative = n < 0.0;
    let n = n.abs();
    let mut int_part = n.trunc();
    let mut frac = n - int_part;

    let mut digits = Vec::new();
    if int_part == 0.0 {
        digits.push('0');
    }
    while int_part >= 1.0 {
        let d = (int_part % radix as f64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        int_part = (int_part / radix as f64).trunc();
    }
    digits.reverse();
    let mut out: String = digits.into_iter().collect();

    if frac > 0.0 {
        out.push('.');
        for _ in 0..52 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(std::char::from_digit(d, radix).unwrap_or('0'));
            frac -= d as f64;
            if frac == 0.0 {
                break;
            }
        }
    }
    if negative {
        out.insert(0, '-');
    }
    out
}

pub fn register_boolean(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.boolean_prototype.clone();
    define_constructor(
        interp,
        "Boolean",
        1,
        &prototype,
        native(|_, _, args| Ok(Value::Boolean(arg(args, 0).to_boolean()))),
        native(|_, _, args| Ok(Value::Boolean(arg(args, 0).to_boolean()))),
    );

    interp.define_method(&prototype, "toString", 0, |interp, this, _| match this {
        Value::Boolean(b) => Ok(Value::String(b.to_string())),
        _ => Err(interp.type_error("Boolean.prototype.toString requires that 'this' be a Boolean")),
    });
    interp.define_method(&prototype, "valueOf", 0, |interp, this, _| match this {
        Value::Boolean(b) => Ok(Value::Boolean(*b)),
        _ => Err(interp.type_error("Boolean.prototype.valueOf requires that 'this' be a Boolean")),
    });
}

pub fn register_math(interp: &mut Interpreter) {
    let math = interp.new_object();
    {
        let mut m = math.borrow_mut();
        for (name, value) in [
            ("PI", std::f64::consts::PI),
            ("E", std::f64::consts::E),
            ("LN2", std::f64::consts::LN_2),
            ("LN10", std::f64::consts::LN_10),
            ("LOG2E", std::f64::consts::LOG2_E),
            ("LOG10E", std::f64::consts::LOG10_E),
            ("SQRT2", std::f64::consts::SQRT_2),
            ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ] {
            m.define(name, Value::Number(value), PropertyFlags::empty());
        }
    }

    let unary: [(&str, fn(f64) -> f64); 20] = [
        ("abs", f64::abs),
        ("floor", f64::floor),
        ("ceil", f64::ceil),
        ("round", js_round),
        ("trunc", f64::trunc),
        ("sign", js_sign),
        ("sqrt", f64::sqrt),
        ("cbrt", f64::cbrt),
        ("sin", f64::sin),
        ("cos", f64::cos),
        ("tan", f64::tan),
        ("asin", f64::asin),
        ("acos", f64::acos),
        ("atan", f64::atan),
        ("log", f64::ln),
        ("log2", f64::log2),
        ("log10", f64::log10),
        ("exp", f64::exp),
        ("fround", |n| n as f32 as f64),
        ("log1p", f64::ln_1p),
    ];
    for (name, f) in unary {
        interp.define_method(&math, name, 1, move |interp, _, args| {
            let n = interp.to_number(&arg(args, 0))?;
            Ok(Value::Number(f(n)))
        });
    }

    interp.define_method(&math, "pow", 2, |interp, _, args| {
        let base = interp.to_number(&arg(args, 0))?;
        let exponent = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(js_pow(base, exponent)))
    });
    interp.define_method(&math, "atan2", 2, |interp, _, args| {
        let y = interp.to_number(&arg(args, 0))?;
        let x = interp.to_number(&arg(args, 1))?;
        Ok(Value::Number(y.atan2(x)))
    });
    interp.define_method(&math, "hypot", 2, |interp, _, args| {
        let mut sum = 0.0;
        for value in args {
            let n = interp.to_number(value)?;
            sum += n * n;
        }
        Ok(Value::Number(sum.sqrt()))
    });
    interp.define_method(&math, "min", 2, |interp, _, args| {
        let mut min = f64::INFINITY;
        for value in args {
            let n = interp.to_number(value)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if n < min || (n == 0.0 && min == 0.0 && n.is_sign_negative()) {
                min = n;
            }
        }
        Ok(Value::Number(min))
    });
    interp.define_method(&math, "max", 2, |interp, _, args| {
        let mut max = f64::NEG_INFINITY;
        for value in args {
            let n = interp.to_number(value)?;
            if n.is_nan() {
                return Ok(Value::Number(f64::NAN));
            }
            if n > max || (n == 0.0 && max == 0.0 && n.is_sign_positive()) {
                max = n;
            }
        }
        Ok(Value::Number(max))
    });
    interp.define_method(&math, "random", 0, |_, _, _| {
        Ok(Value::Number(rand::random::<f64>()))
    });

    define_global(interp, "Math", Value::Object(math));
}

/// `Math.round`: halves round towards +Infinity
fn js_round(n: f64) -> f64 {
    if !n.is_finite() || n.trunc() == n {
        return n;
    }
    (n + 0.5).floor()
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_to_fixed() {
        assert_eq!(to_fixed(3.14159, 2), "3.14");
        assert_eq!(to_fixed(2.5, 0), "3");
        assert_eq!(to_fixed(-2.5, 0), "-3");
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(-0.001, 2), "0.00");
        assert_eq!(to_fixed(10.0, 1), "10.0");
    }

    #[test]
    fn test_radix_strings() {
        assert_eq!(eval_string("(255).toString(16)"), "ff");
        assert_eq!(eval_string("(5).toString(2)"), "101");
        assert_eq!(eval_string("(0.5).toString(2)"), "0.1");
        assert_eq!(eval_string("(-8).toString(8)"), "-10");
    }

    #[test]
    fn test_number_statics() {
        assert_eq!(eval_string("Number.isInteger(5) && !Number.isInteger('5')"), "true");
        assert_eq!(eval_string("Number('12.5') + Number('')"), "12.5");
        assert_eq!(eval_string("Number.isNaN(Number('x'))"), "true");
        assert_eq!(eval_string("Number.MAX_SAFE_INTEGER"), "9007199254740991");
    }

    #[test]
    fn test_math() {
        assert_eq!(eval_string("Math.max(1, 5, 3) + Math.min(4, 2)"), "7");
        assert_eq!(eval_string("Math.round(2.5) + Math.round(-2.5)"), "1");
        assert_eq!(eval_string("Math.max()"), "-Infinity");
        assert_eq!(eval_string("Math.abs(-3) * Math.pow(2, 3)"), "24");
        assert_eq!(
            eval_string("const r = Math.random(); r >= 0 && r < 1"),
            "true"
        );
    }
}
