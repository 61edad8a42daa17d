//! Global constants and functions

use super::{arg, define_global};
use crate::lexer::numeric::{parse_float_prefix, parse_int_prefix};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::value::{to_int32, Value};

pub fn register_globals(interp: &mut Interpreter) {
    define_global(interp, "undefined", Value::Undefined);
    define_global(interp, "NaN", Value::Number(f64::NAN));
    define_global(interp, "Infinity", Value::Number(f64::INFINITY));

    let parse_int = interp.native_function("parseInt", 2, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let radix = match arg(args, 1) {
            Value::Undefined => None,
            other => {
                let radix = to_int32(interp.to_number(&other)?);
                if radix == 0 {
                    None
                } else if !(2..=36).contains(&radix) {
                    return Ok(Value::Number(f64::NAN));
                } else {
                    Some(radix as u32)
                }
            }
        };
        Ok(Value::Number(parse_int_prefix(&text, radix)))
    });
    define_global(interp, "parseInt", parse_int);

    let parse_float = interp.native_function("parseFloat", 1, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        Ok(Value::Number(parse_float_prefix(&text)))
    });
    define_global(interp, "parseFloat", parse_float);

    let is_nan = interp.native_function("isNaN", 1, |interp, _, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_nan()))
    });
    define_global(interp, "isNaN", is_nan);

    let is_finite = interp.native_function("isFinite", 1, |interp, _, args| {
        Ok(Value::Boolean(interp.to_number(&arg(args, 0))?.is_finite()))
    });
    define_global(interp, "isFinite", is_finite);
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_number(source: &str) -> f64 {
        Runtime::new().eval(source).expect("eval").to_number()
    }

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!(eval_number("parseInt('42px')"), 42.0);
        assert_eq!(eval_number("parseInt('ff', 16)"), 255.0);
        assert_eq!(eval_number("parseInt('0x1A')"), 26.0);
        assert!(eval_number("parseInt('abc')").is_nan());
        assert_eq!(eval_number("parseFloat('3.14abc')"), 3.14);
    }

    #[test]
    fn test_is_nan_coerces() {
        assert_eq!(eval_number("isNaN('abc') ? 1 : 0"), 1.0);
        assert_eq!(eval_number("isFinite('12') ? 1 : 0"), 1.0);
    }
}
