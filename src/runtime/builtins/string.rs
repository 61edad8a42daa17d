//! `String` and `String.prototype`
//!
//! Indices count Unicode scalar values rather than UTF-16 code units; the
//! two agree for all text outside the astral planes.

use super::regexp::{apply_replacement, match_string, regexp_parts, replace_regex, split_regex};
use super::{arg, define_constructor, native};
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::value::{relative_index, Value};

pub fn register_string(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.string_prototype.clone();
    let constructor = define_constructor(
        interp,
        "String",
        1,
        &prototype,
        native(|interp, _, args| match args.first() {
            None => Ok(Value::from("")),
            Some(value) => interp.to_string(value).map(Value::String),
        }),
        native(|interp, _, args| match args.first() {
            None => Ok(Value::from("")),
            Some(value) => interp.to_string(value).map(Value::String),
        }),
    );

    interp.define_method(&constructor, "fromCharCode", 1, |interp, _, args| {
        let mut out = String::new();
        for code in args {
            let code = interp.to_number(code)? as u32 & 0xFFFF;
            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
        }
        Ok(Value::String(out))
    });

    register_access(interp);
    register_search(interp);
    register_transform(interp);
}

fn this_string(interp: &mut Interpreter, this: &Value, method: &str) -> JsResult<String> {
    match this {
        Value::String(s) => Ok(s.clone()),
        Value::Undefined | Value::Null => Err(interp.type_error(format!(
            "String.prototype.{} called on null or undefined",
            method
        ))),
        other => interp.to_string(other),
    }
}

fn chars(s: &str) -> Vec<char> {
    s.chars().collect()
}

/// Character index of `needle` in `haystack` at or after `from`
fn index_of(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn integer_arg(interp: &mut Interpreter, args: &[Value], i: usize) -> JsResult<f64> {
    let n = interp.to_number(&arg(args, i))?;
    Ok(if n.is_nan() { 0.0 } else { n.trunc() })
}

fn register_access(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.string_prototype.clone();

    interp.define_method(&prototype, "toString", 0, |interp, this, _| {
        this_string(interp, this, "toString").map(Value::String)
    });

    interp.define_method(&prototype, "valueOf", 0, |interp, this, _| {
        this_string(interp, this, "valueOf").map(Value::String)
    });

    interp.define_method(&prototype, "charAt", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "charAt")?);
        let i = integer_arg(interp, args, 0)?;
        Ok(Value::String(if i >= 0.0 {
            s.get(i as usize).map(|c| c.to_string()).unwrap_or_default()
        } else {
            String::new()
        }))
    });

    interp.define_method(&prototype, "charCodeAt", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "charCodeAt")?);
        let i = integer_arg(interp, args, 0)?;
        Ok(Value::Number(if i >= 0.0 {
            s.get(i as usize).map(|c| *c as u32 as f64).unwrap_or(f64::NAN)
        } else {
            f64::NAN
        }))
    });

    interp.define_method(&prototype, "at", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "at")?);
        let i = integer_arg(interp, args, 0)?;
        let i = if i < 0.0 { s.len() as f64 + i } else { i };
        Ok(if i < 0.0 {
            Value::Undefined
        } else {
            s.get(i as usize)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default()
        })
    });

    interp.define_method(&prototype, "slice", 2, |interp, this, args| {
        let s = chars(&this_string(interp, this, "slice")?);
        let start = relative_index(interp.to_number(&arg(args, 0))?, s.len());
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            other => relative_index(interp.to_number(&other)?, s.len()),
        };
        Ok(Value::String(if start < end {
            s[start..end].iter().collect()
        } else {
            String::new()
        }))
    });

    interp.define_method(&prototype, "substring", 2, |interp, this, args| {
        let s = chars(&this_string(interp, this, "substring")?);
        let clamp = |n: f64| n.max(0.0).min(s.len() as f64) as usize;
        let start = clamp(integer_arg(interp, args, 0)?);
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            other => {
                let n = interp.to_number(&other)?;
                clamp(if n.is_nan() { 0.0 } else { n.trunc() })
            }
        };
        let (lo, hi) = if start <= end { (start, end) } else { (end, start) };
        Ok(Value::String(s[lo..hi].iter().collect()))
    });

    interp.define_method(&prototype, "concat", 1, |interp, this, args| {
        let mut s = this_string(interp, this, "concat")?;
        for value in args {
            s.push_str(&interp.to_string(value)?);
        }
        Ok(Value::String(s))
    });
}

fn register_search(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.string_prototype.clone();

    interp.define_method(&prototype, "indexOf", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "indexOf")?);
        let needle = chars(&interp.to_string(&arg(args, 0))?);
        let from = integer_arg(interp, args, 1)?.max(0.0) as usize;
        Ok(Value::Number(
            index_of(&s, &needle, from).map(|i| i as f64).unwrap_or(-1.0),
        ))
    });

    interp.define_method(&prototype, "lastIndexOf", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "lastIndexOf")?);
        let needle = chars(&interp.to_string(&arg(args, 0))?);
        if needle.len() > s.len() {
            return Ok(Value::Number(-1.0));
        }
        let found = (0..=s.len() - needle.len())
            .rev()
            .find(|&i| s[i..i + needle.len()] == *needle);
        Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
    });

    interp.define_method(&prototype, "includes", 1, |interp, this, args| {
        let s = this_string(interp, this, "includes")?;
        if regexp_parts(&arg(args, 0)).is_some() {
            return Err(interp.type_error(
                "First argument to String.prototype.includes must not be a regular expression",
            ));
        }
        let needle = interp.to_string(&arg(args, 0))?;
        Ok(Value::Boolean(s.contains(&needle)))
    });

    interp.define_method(&prototype, "startsWith", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "startsWith")?);
        let needle = chars(&interp.to_string(&arg(args, 0))?);
        let from = (integer_arg(interp, args, 1)?.max(0.0) as usize).min(s.len());
        Ok(Value::Boolean(s[from..].starts_with(&needle)))
    });

    interp.define_method(&prototype, "endsWith", 1, |interp, this, args| {
        let s = chars(&this_string(interp, this, "endsWith")?);
        let needle = chars(&interp.to_string(&arg(args, 0))?);
        let end = match arg(args, 1) {
            Value::Undefined => s.len(),
            other => (interp.to_number(&other)?.max(0.0) as usize).min(s.len()),
        };
        Ok(Value::Boolean(s[..end].ends_with(&needle)))
    });

    interp.define_method(&prototype, "match", 1, |interp, this, args| {
        let s = this_string(interp, this, "match")?;
        let pattern = arg(args, 0);
        if regexp_parts(&pattern).is_some() {
            return match_string(interp, &pattern, &s);
        }
        let source = match pattern {
            Value::Undefined => String::new(),
            other => regex::escape(&interp.to_string(&other)?),
        };
        let regexp = super::regexp::create_regexp(interp, &source, "")?;
        match_string(interp, &regexp, &s)
    });

    interp.define_method(&prototype, "search", 1, |interp, this, args| {
        let s = this_string(interp, this, "search")?;
        let Some((regex, _)) = regexp_parts(&arg(args, 0)) else {
            let needle = interp.to_string(&arg(args, 0))?;
            let found = index_of(&chars(&s), &chars(&needle), 0);
            return Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)));
        };
        Ok(Value::Number(
            regex
                .find(&s)
                .map(|m| super::regexp::char_index(&s, m.start()) as f64)
                .unwrap_or(-1.0),
        ))
    });
}

fn register_transform(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.string_prototype.clone();

    interp.define_method(&prototype, "toUpperCase", 0, |interp, this, _| {
        Ok(Value::String(this_string(interp, this, "toUpperCase")?.to_uppercase()))
    });

    interp.define_method(&prototype, "toLowerCase", 0, |interp, this, _| {
        Ok(Value::String(this_string(interp, this, "toLowerCase")?.to_lowercase()))
    });

    interp.define_method(&prototype, "trim", 0, |interp, this, _| {
        Ok(Value::String(this_string(interp, this, "trim")?.trim().to_string()))
    });

    interp.define_method(&prototype, "trimStart", 0, |interp, this, _| {
        Ok(Value::String(
            this_string(interp, this, "trimStart")?.trim_start().to_string(),
        ))
    });

    interp.define_method(&prototype, "trimEnd", 0, |interp, this, _| {
        Ok(Value::String(
            this_string(interp, this, "trimEnd")?.trim_end().to_string(),
        ))
    });

    interp.define_method(&prototype, "repeat", 1, |interp, this, args| {
        let s = this_string(interp, this, "repeat")?;
        let count = integer_arg(interp, args, 0)?;
        if count < 0.0 || count.is_infinite() {
            return Err(interp.range_error(format!("Invalid count value: {}", count)));
        }
        Ok(Value::String(s.repeat(count as usize)))
    });

    interp.define_method(&prototype, "padStart", 2, |interp, this, args| {
        let s = this_string(interp, this, "padStart")?;
        let padding = padding(interp, &s, args)?;
        Ok(Value::String(format!("{}{}", padding, s)))
    });

    interp.define_method(&prototype, "padEnd", 2, |interp, this, args| {
        let s = this_string(interp, this, "padEnd")?;
        let padding = padding(interp, &s, args)?;
        Ok(Value::String(format!("{}{}", s, padding)))
    });

    interp.define_method(&prototype, "split", 2, |interp, this, args| {
        let s = this_string(interp, this, "split")?;
        let separator = arg(args, 0);
        let limit = match arg(args, 1) {
            Value::Undefined => usize::MAX,
            other => interp.to_number(&other)?.max(0.0) as usize,
        };
        let parts: Vec<String> = if regexp_parts(&separator).is_some() {
            split_regex(&separator, &s)
        } else if separator.is_undefined() {
            vec![s]
        } else {
            let separator = interp.to_string(&separator)?;
            if separator.is_empty() {
                s.chars().map(|c| c.to_string()).collect()
            } else {
                s.split(separator.as_str()).map(str::to_string).collect()
            }
        };
        let parts = parts.into_iter().take(limit).map(Value::String).collect();
        Ok(interp.new_array(parts))
    });

    interp.define_method(&prototype, "replace", 2, |interp, this, args| {
        let s = this_string(interp, this, "replace")?;
        replace(interp, &s, &arg(args, 0), &arg(args, 1), false).map(Value::String)
    });

    interp.define_method(&prototype, "replaceAll", 2, |interp, this, args| {
        let s = this_string(interp, this, "replaceAll")?;
        replace(interp, &s, &arg(args, 0), &arg(args, 1), true).map(Value::String)
    });
}

/// Filler for `padStart` / `padEnd`
fn padding(interp: &mut Interpreter, s: &str, args: &[Value]) -> JsResult<String> {
    let target = integer_arg(interp, args, 0)?.max(0.0) as usize;
    let filler = match arg(args, 1) {
        Value::Undefined => " ".to_string(),
        other => interp.to_string(&other)?,
    };
    let len = s.chars().count();
    if target <= len || filler.is_empty() {
        return Ok(String::new());
    }
    Ok(filler.chars().cycle().take(target - len).collect())
}

fn replace(
    interp: &mut Interpreter,
    s: &str,
    pattern: &Value,
    replacement: &Value,
    all: bool,
) -> JsResult<String> {
    if regexp_parts(pattern).is_some() {
        return replace_regex(interp, pattern, s, replacement, all);
    }
    let needle = interp.to_string(pattern)?;
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    let positions: Vec<usize> = if needle.is_empty() {
        vec![0]
    } else if all {
        s.match_indices(needle.as_str()).map(|(i, _)| i).collect()
    } else {
        s.find(needle.as_str()).into_iter().collect()
    };
    for position in positions {
        out.push_str(&s[last..position]);
        let char_position = super::regexp::char_index(s, position);
        let replaced =
            apply_replacement(interp, replacement, &needle, &[], char_position, s, |_| None)?;
        out.push_str(&replaced);
        last = position + needle.len();
    }
    out.push_str(&s[last..]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_basic_methods() {
        assert_eq!(eval_string("'Hello'.length"), "5");
        assert_eq!(eval_string("'Hello'.charAt(1) + 'Hello'[4]"), "eo");
        assert_eq!(eval_string("'Hello'.slice(-3)"), "llo");
        assert_eq!(eval_string("'Hello'.substring(3, 1)"), "el");
        assert_eq!(eval_string("'  pad  '.trim() + '|'"), "pad|");
        assert_eq!(eval_string("'5'.padStart(3, '0')"), "005");
        assert_eq!(eval_string("'ab'.repeat(3)"), "ababab");
    }

    #[test]
    fn test_search_methods() {
        assert_eq!(eval_string("'banana'.indexOf('an')"), "1");
        assert_eq!(eval_string("'banana'.lastIndexOf('an')"), "3");
        assert_eq!(eval_string("'banana'.includes('nan')"), "true");
        assert_eq!(eval_string("'banana'.startsWith('ban') && 'banana'.endsWith('na')"), "true");
    }

    #[test]
    fn test_split_and_replace() {
        assert_eq!(eval_string("'a,b,,c'.split(',').length"), "4");
        assert_eq!(eval_string("'abc'.split('').join('-')"), "a-b-c");
        assert_eq!(eval_string("'aaa'.replace('a', 'b')"), "baa");
        assert_eq!(eval_string("'aaa'.replaceAll('a', 'b')"), "bbb");
        assert_eq!(eval_string("'price: 5'.replace('5', '$&0')"), "price: 50");
    }

    #[test]
    fn test_unicode_indices() {
        assert_eq!(eval_string("'héllo'.length"), "5");
        assert_eq!(eval_string("'héllo'.toUpperCase()"), "HÉLLO");
    }
}
