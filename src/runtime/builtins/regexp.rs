//! `RegExp` backed by the `regex` crate
//!
//! JavaScript flags map onto builder options: `i` case-insensitive, `m`
//! multi-line anchors, `s` dot matches newline. `g` and `y` only affect
//! `lastIndex` handling. Patterns the `regex` crate cannot express
//! (lookaround, backreferences) raise a `SyntaxError`.

use super::{arg, define_constructor, native};
use crate::error::ErrorKind;
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::object::{Object, ObjectKind, PropertyFlags, RegExpData};
use crate::runtime::value::Value;
use regex::{Captures, Regex, RegexBuilder};

pub fn register_regexp(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.regexp_prototype.clone();
    define_constructor(
        interp,
        "RegExp",
        2,
        &prototype,
        native(construct_regexp),
        native(construct_regexp),
    );

    interp.define_method(&prototype, "exec", 1, |interp, this, args| {
        let input = interp.to_string(&arg(args, 0))?;
        exec(interp, this, &input)
    });

    interp.define_method(&prototype, "test", 1, |interp, this, args| {
        let input = interp.to_string(&arg(args, 0))?;
        Ok(Value::Boolean(!matches!(
            exec(interp, this, &input)?,
            Value::Null
        )))
    });

    interp.define_method(&prototype, "toString", 0, |interp, this, _| {
        let (source, flags) = with_data(interp, this, |d| (d.source.clone(), d.flags.clone()))?;
        Ok(Value::String(format!("/{}/{}", source, flags)))
    });

    interp.define_getter(&prototype, "source", |interp, this, _| {
        with_data(interp, this, |d| Value::String(d.source.clone()))
    });
    interp.define_getter(&prototype, "flags", |interp, this, _| {
        with_data(interp, this, |d| Value::String(d.flags.clone()))
    });
    interp.define_getter(&prototype, "global", |interp, this, _| {
        with_data(interp, this, |d| Value::Boolean(d.global()))
    });
}

fn construct_regexp(interp: &mut Interpreter, _: &Value, args: &[Value]) -> JsResult<Value> {
    let pattern = arg(args, 0);
    // RegExp(existingRegex) copies the pattern
    if let Ok((source, flags)) = with_data(interp, &pattern, |d| (d.source.clone(), d.flags.clone()))
    {
        let flags = match arg(args, 1) {
            Value::Undefined => flags,
            other => interp.to_string(&other)?,
        };
        return create_regexp(interp, &source, &flags);
    }
    let source = match pattern {
        Value::Undefined => "(?:)".to_string(),
        other => interp.to_string(&other)?,
    };
    let flags = match arg(args, 1) {
        Value::Undefined => String::new(),
        other => interp.to_string(&other)?,
    };
    create_regexp(interp, &source, &flags)
}

/// Compile a JavaScript pattern into a `RegExp` object
pub(crate) fn create_regexp(interp: &Interpreter, source: &str, flags: &str) -> JsResult<Value> {
    if let Some(bad) = flags.chars().find(|c| !"gimsuy".contains(*c)) {
        return Err(interp.throw(
            ErrorKind::SyntaxError,
            format!("Invalid flags supplied to RegExp constructor '{}'", bad),
        ));
    }
    let regex = RegexBuilder::new(source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| {
            interp.throw(
                ErrorKind::SyntaxError,
                format!("Invalid regular expression: /{}/: {}", source, first_line(&e.to_string())),
            )
        })?;
    let mut obj = Object::with_prototype(
        ObjectKind::RegExp(Box::new(RegExpData {
            source: source.to_string(),
            flags: flags.to_string(),
            regex,
        })),
        Some(interp.intrinsics.regexp_prototype.clone()),
    );
    obj.define("lastIndex", Value::Number(0.0), PropertyFlags::WRITABLE);
    Ok(Value::Object(obj.into_ref()))
}

fn first_line(message: &str) -> &str {
    message
        .lines()
        .rev()
        .find(|l| l.starts_with("error:"))
        .map(|l| l.trim_start_matches("error:").trim())
        .unwrap_or_else(|| message.lines().next().unwrap_or(message))
}

fn with_data<R>(
    interp: &Interpreter,
    value: &Value,
    f: impl FnOnce(&RegExpData) -> R,
) -> JsResult<R> {
    if let Value::Object(obj) = value {
        if let ObjectKind::RegExp(data) = &obj.borrow().kind {
            return Ok(f(data));
        }
    }
    Err(interp.type_error("Receiver is not a RegExp"))
}

/// The compiled regex and flags behind a `RegExp` value
pub(crate) fn regexp_parts(value: &Value) -> Option<(Regex, String)> {
    match value {
        Value::Object(obj) => match &obj.borrow().kind {
            ObjectKind::RegExp(data) => Some((data.regex.clone(), data.flags.clone())),
            _ => None,
        },
        _ => None,
    }
}

/// Character index of a byte offset
pub(crate) fn char_index(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

/// Byte offset of a character index
pub(crate) fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(b, _)| b).unwrap_or(s.len())
}

/// `RegExp.prototype.exec`, honouring `lastIndex` for `g` and `y`
fn exec(interp: &mut Interpreter, this: &Value, input: &str) -> JsResult<Value> {
    let (regex, flags) = match regexp_parts(this) {
        Some(parts) => parts,
        None => return Err(interp.type_error("Receiver is not a RegExp")),
    };
    let stateful = flags.contains('g') || flags.contains('y');
    let start = if stateful {
        let last = interp.get(this, "lastIndex")?;
        let last = interp.to_number(&last)?;
        if last.is_nan() || last < 0.0 {
            0
        } else {
            last as usize
        }
    } else {
        0
    };
    if start > input.chars().count() {
        interp.set(this, "lastIndex", Value::Number(0.0))?;
        return Ok(Value::Null);
    }

    let captures = regex
        .captures_at(input, byte_offset(input, start))
        .filter(|c| !flags.contains('y') || c.get(0).is_some_and(|m| m.start() == byte_offset(input, start)));
    let Some(captures) = captures else {
        if stateful {
            interp.set(this, "lastIndex", Value::Number(0.0))?;
        }
        return Ok(Value::Null);
    };
    if stateful {
        let end = captures.get(0).map(|m| m.end()).unwrap_or(0);
        interp.set(this, "lastIndex", Value::Number(char_index(input, end) as f64))?;
    }
    Ok(match_array(interp, &regex, &captures, input))
}

/// The array `exec` and non-global `match` return
pub(crate) fn match_array(
    interp: &Interpreter,
    regex: &Regex,
    captures: &Captures<'_>,
    input: &str,
) -> Value {
    let groups: Vec<Value> = captures
        .iter()
        .map(|m| {
            m.map(|m| Value::String(m.as_str().to_string()))
                .unwrap_or_default()
        })
        .collect();
    let result = interp.new_array(groups);
    if let Value::Object(obj) = &result {
        let index = captures.get(0).map(|m| char_index(input, m.start())).unwrap_or(0);
        let named = named_groups(interp, regex, captures);
        let mut obj = obj.borrow_mut();
        obj.define("index", Value::Number(index as f64), PropertyFlags::DEFAULT);
        obj.define("input", Value::from(input), PropertyFlags::DEFAULT);
        obj.define("groups", named, PropertyFlags::DEFAULT);
    }
    result
}

fn named_groups(interp: &Interpreter, regex: &Regex, captures: &Captures<'_>) -> Value {
    let names: Vec<&str> = regex.capture_names().flatten().collect();
    if names.is_empty() {
        return Value::Undefined;
    }
    let groups = interp.new_object();
    for name in names {
        let value = captures
            .name(name)
            .map(|m| Value::String(m.as_str().to_string()))
            .unwrap_or_default();
        groups
            .borrow_mut()
            .define(name, value, PropertyFlags::DEFAULT);
    }
    Value::Object(groups)
}

/// `String.prototype.match` with a regex argument
pub(crate) fn match_string(interp: &mut Interpreter, regexp: &Value, input: &str) -> JsResult<Value> {
    let Some((regex, flags)) = regexp_parts(regexp) else {
        return Ok(Value::Null);
    };
    if !flags.contains('g') {
        return Ok(regex
            .captures(input)
            .map(|c| match_array(interp, &regex, &c, input))
            .unwrap_or(Value::Null));
    }
    let matches: Vec<Value> = regex
        .find_iter(input)
        .map(|m| Value::String(m.as_str().to_string()))
        .collect();
    if matches.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(interp.new_array(matches))
    }
}

/// `String.prototype.replace` / `replaceAll` with a regex pattern
pub(crate) fn replace_regex(
    interp: &mut Interpreter,
    regexp: &Value,
    input: &str,
    replacement: &Value,
    force_all: bool,
) -> JsResult<String> {
    let Some((regex, flags)) = regexp_parts(regexp) else {
        return Ok(input.to_string());
    };
    if force_all && !flags.contains('g') {
        return Err(interp.type_error("replaceAll must be called with a global RegExp"));
    }
    let all = flags.contains('g');
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    for captures in regex.captures_iter(input) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        out.push_str(&input[last..whole.start()]);
        let groups: Vec<Option<String>> = captures
            .iter()
            .skip(1)
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let position = char_index(input, whole.start());
        let replaced = apply_replacement(
            interp,
            replacement,
            whole.as_str(),
            &groups,
            position,
            input,
            |name| captures.name(name).map(|m| m.as_str().to_string()),
        )?;
        out.push_str(&replaced);
        last = whole.end();
        if !all {
            break;
        }
    }
    out.push_str(&input[last..]);
    Ok(out)
}

/// Compute the replacement text for one match: call a replacer function
/// or expand `$&`, `$1`…`$99`, `$<name>` and `$$` in a template
pub(crate) fn apply_replacement(
    interp: &mut Interpreter,
    replacement: &Value,
    matched: &str,
    groups: &[Option<String>],
    position: usize,
    input: &str,
    named: impl Fn(&str) -> Option<String>,
) -> JsResult<String> {
    if replacement.is_callable() {
        let mut args = vec![Value::from(matched)];
        args.extend(
            groups
                .iter()
                .map(|g| g.clone().map(Value::String).unwrap_or_default()),
        );
        args.push(Value::Number(position as f64));
        args.push(Value::from(input));
        let result = interp.call(replacement, Value::Undefined, &args)?;
        return interp.to_string(&result);
    }
    let template = interp.to_string(replacement)?;
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(matched);
                i += 2;
            }
            '<' => match chars[i + 2..].iter().position(|c| *c == '>') {
                Some(len) => {
                    let name: String = chars[i + 2..i + 2 + len].iter().collect();
                    out.push_str(&named(&name).unwrap_or_default());
                    i += len + 3;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            d if d.is_ascii_digit() => {
                let one = d.to_digit(10).unwrap_or(0) as usize;
                let two = chars
                    .get(i + 2)
                    .and_then(|c| c.to_digit(10))
                    .map(|second| one * 10 + second as usize)
                    .filter(|n| *n >= 1 && *n <= groups.len());
                if let Some(n) = two {
                    out.push_str(groups[n - 1].as_deref().unwrap_or(""));
                    i += 3;
                } else if one >= 1 && one <= groups.len() {
                    out.push_str(groups[one - 1].as_deref().unwrap_or(""));
                    i += 2;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    Ok(out)
}

/// `String.prototype.split` with a regex separator
pub(crate) fn split_regex(regexp: &Value, input: &str) -> Vec<String> {
    let Some((regex, _)) = regexp_parts(regexp) else {
        return vec![input.to_string()];
    };
    if input.is_empty() {
        return if regex.is_match(input) {
            Vec::new()
        } else {
            vec![String::new()]
        };
    }
    let mut parts = Vec::new();
    let mut last = 0;
    for captures in regex.captures_iter(input) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        // empty matches at the edges do not split
        if whole.as_str().is_empty() && (whole.start() == 0 || whole.start() >= input.len()) {
            continue;
        }
        if whole.as_str().is_empty() && whole.start() == last && last != 0 {
            continue;
        }
        parts.push(input[last..whole.start()].to_string());
        for group in captures.iter().skip(1) {
            parts.push(group.map(|m| m.as_str().to_string()).unwrap_or_default());
        }
        last = whole.end();
    }
    parts.push(input[last..].to_string());
    parts
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_literal_test_and_exec() {
        assert_eq!(eval_string("/^h.llo$/i.test('HELLO')"), "true");
        assert_eq!(
            eval_string("const m = /(\\d+)-(\\d+)/.exec('call 555-1234 now'); [m[0], m[1], m.index].join('|')"),
            "555-1234|555|5"
        );
    }

    #[test]
    fn test_global_exec_advances_last_index() {
        let source = "
            const re = /o/g;
            const seen = [];
            let m;
            while ((m = re.exec('foo boo')) !== null) seen.push(m.index);
            seen.join()
        ";
        assert_eq!(eval_string(source), "1,2,5,6");
    }

    #[test]
    fn test_string_methods_with_regex() {
        assert_eq!(eval_string("'a1b22c333'.match(/\\d+/g).join()"), "1,22,333");
        assert_eq!(eval_string("'john smith'.replace(/(\\w+) (\\w+)/, '$2, $1')"), "smith, john");
        assert_eq!(eval_string("'a-b_c'.split(/[-_]/).join(' ')"), "a b c");
        assert_eq!(
            eval_string("'x1y2'.replace(/\\d/g, d => d * 2)"),
            "x2y4"
        );
    }

    #[test]
    fn test_unsupported_pattern_is_syntax_error() {
        let err = Runtime::new().eval("new RegExp('(?<=a)b')").unwrap_err();
        assert!(err.to_string().starts_with("SyntaxError: Invalid regular expression"));
    }
}
