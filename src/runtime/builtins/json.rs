//! `JSON.stringify` and `JSON.parse`
//!
//! Parsing and string escaping go through `serde_json`; the object walk is
//! done here so that getters, `toJSON`, replacers and cycles behave as in
//! JavaScript.

use super::{arg, define_global};
use crate::error::ErrorKind;
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::object::{ObjectKind, ObjectRef, PropertyFlags};
use crate::runtime::value::{number_to_string, Value};
use std::rc::Rc;

pub fn register_json(interp: &mut Interpreter) {
    let json = interp.new_object();

    interp.define_method(&json, "stringify", 3, |interp, _, args| {
        let replacer = arg(args, 1);
        let indent = match arg(args, 2) {
            Value::Number(n) => " ".repeat(n.clamp(0.0, 10.0) as usize),
            Value::String(s) => s.chars().take(10).collect(),
            _ => String::new(),
        };
        let allow_list = match &replacer {
            value if value.is_array() => {
                let mut keys = Vec::new();
                for item in interp.iterate(value)? {
                    if matches!(item, Value::String(_) | Value::Number(_)) {
                        keys.push(interp.to_string(&item)?);
                    }
                }
                Some(keys)
            }
            _ => None,
        };
        let mut writer = JsonWriter {
            replacer: replacer.is_callable().then_some(replacer),
            allow_list,
            indent,
            stack: Vec::new(),
        };
        match writer.serialize_root(interp, arg(args, 0))? {
            Some(text) => Ok(Value::String(text)),
            None => Ok(Value::Undefined),
        }
    });

    interp.define_method(&json, "parse", 2, |interp, _, args| {
        let text = interp.to_string(&arg(args, 0))?;
        let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
            interp.throw(
                ErrorKind::SyntaxError,
                format!("Unexpected token in JSON at line {} column {}", e.line(), e.column()),
            )
        })?;
        let value = from_json(interp, &parsed);
        let reviver = arg(args, 1);
        if !reviver.is_callable() {
            return Ok(value);
        }
        let holder = interp.new_object();
        holder
            .borrow_mut()
            .define("", value, PropertyFlags::DEFAULT);
        revive(interp, &Value::Object(holder), "", &reviver)
    });

    define_global(interp, "JSON", Value::Object(json));
}

/// `JSON.stringify(value)`; `None` when the value is not serializable
pub(crate) fn stringify(interp: &mut Interpreter, value: &Value) -> JsResult<Option<String>> {
    let mut writer = JsonWriter {
        replacer: None,
        allow_list: None,
        indent: String::new(),
        stack: Vec::new(),
    };
    writer.serialize_root(interp, value.clone())
}

/// Convert parsed JSON into interpreter values; key order is preserved
fn from_json(interp: &Interpreter, json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => {
            interp.new_array(items.iter().map(|item| from_json(interp, item)).collect())
        }
        serde_json::Value::Object(map) => {
            let obj = interp.new_object();
            {
                let mut o = obj.borrow_mut();
                for (key, value) in map {
                    o.define(key, from_json(interp, value), PropertyFlags::DEFAULT);
                }
            }
            Value::Object(obj)
        }
    }
}

/// Apply a `JSON.parse` reviver bottom-up
fn revive(interp: &mut Interpreter, holder: &Value, key: &str, reviver: &Value) -> JsResult<Value> {
    let value = interp.get(holder, key)?;
    if let Value::Object(obj) = &value {
        let keys = if value.is_array() {
            let len = obj.borrow().array_elements().map(Vec::len).unwrap_or(0);
            (0..len).map(|i| i.to_string()).collect()
        } else {
            obj.borrow().own_enumerable_keys()
        };
        for k in keys {
            let revived = revive(interp, &value, &k, reviver)?;
            if revived.is_undefined() {
                obj.borrow_mut().delete(&k);
            } else {
                interp.set(&value, &k, revived)?;
            }
        }
    }
    interp.call(
        reviver,
        holder.clone(),
        &[Value::String(key.to_string()), value],
    )
}

struct JsonWriter {
    replacer: Option<Value>,
    allow_list: Option<Vec<String>>,
    indent: String,
    /// Objects currently being serialized, for cycle detection
    stack: Vec<ObjectRef>,
}

impl JsonWriter {
    fn serialize_root(&mut self, interp: &mut Interpreter, value: Value) -> JsResult<Option<String>> {
        let holder = interp.new_object();
        holder
            .borrow_mut()
            .define("", value.clone(), PropertyFlags::DEFAULT);
        self.serialize(interp, &Value::Object(holder), "", value, "")
    }

    /// Serialize `holder[key]`. `None` means the value is skipped
    /// (`undefined`, functions).
    fn serialize(
        &mut self,
        interp: &mut Interpreter,
        holder: &Value,
        key: &str,
        mut value: Value,
        current_indent: &str,
    ) -> JsResult<Option<String>> {
        if let Value::Object(_) = &value {
            let to_json = interp.get(&value, "toJSON")?;
            if to_json.is_callable() {
                value = interp.call(&to_json, value, &[Value::String(key.to_string())])?;
            }
        }
        if let Some(replacer) = &self.replacer {
            value = interp.call(
                replacer,
                holder.clone(),
                &[Value::String(key.to_string()), value],
            )?;
        }

        let obj = match &value {
            Value::Undefined => return Ok(None),
            Value::Null => return Ok(Some("null".to_string())),
            Value::Boolean(b) => return Ok(Some(b.to_string())),
            Value::Number(n) if n.is_finite() => return Ok(Some(number_to_string(*n))),
            Value::Number(_) => return Ok(Some("null".to_string())),
            Value::String(s) => return Ok(Some(quote(s))),
            Value::Object(obj) => obj.clone(),
        };
        if obj.borrow().is_callable() {
            return Ok(None);
        }
        if self.stack.iter().any(|seen| Rc::ptr_eq(seen, &obj)) {
            return Err(interp.type_error("Converting circular structure to JSON"));
        }

        let depth = self.stack.len();
        self.stack.push(obj.clone());
        let inner_indent = format!("{}{}", current_indent, self.indent);
        let is_array = matches!(obj.borrow().kind, ObjectKind::Array(_));
        let result = interp.descend(depth, |interp| {
            if is_array {
                self.serialize_array(interp, &value, &obj, &inner_indent, current_indent)
            } else {
                self.serialize_object(interp, &value, &obj, &inner_indent, current_indent)
            }
        });
        self.stack.pop();
        result.map(Some)
    }

    fn serialize_array(
        &mut self,
        interp: &mut Interpreter,
        value: &Value,
        obj: &ObjectRef,
        inner_indent: &str,
        current_indent: &str,
    ) -> JsResult<String> {
        let len = obj.borrow().array_elements().map(Vec::len).unwrap_or(0);
        let mut parts = Vec::with_capacity(len);
        for i in 0..len {
            let key = i.to_string();
            let element = interp.get(value, &key)?;
            let part = self.serialize(interp, value, &key, element, inner_indent)?;
            parts.push(part.unwrap_or_else(|| "null".to_string()));
        }
        Ok(self.wrap('[', ']', parts, inner_indent, current_indent))
    }

    fn serialize_object(
        &mut self,
        interp: &mut Interpreter,
        value: &Value,
        obj: &ObjectRef,
        inner_indent: &str,
        current_indent: &str,
    ) -> JsResult<String> {
        let keys = match &self.allow_list {
            Some(keys) => keys.clone(),
            None => obj.borrow().own_enumerable_keys(),
        };
        let separator = if self.indent.is_empty() { ":" } else { ": " };
        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            if !obj.borrow().has_own(&key) {
                continue;
            }
            let property = interp.get(value, &key)?;
            if let Some(text) = self.serialize(interp, value, &key, property, inner_indent)? {
                parts.push(format!("{}{}{}", quote(&key), separator, text));
            }
        }
        Ok(self.wrap('{', '}', parts, inner_indent, current_indent))
    }

    fn wrap(
        &self,
        open: char,
        close: char,
        parts: Vec<String>,
        inner_indent: &str,
        current_indent: &str,
    ) -> String {
        if parts.is_empty() {
            return format!("{}{}", open, close);
        }
        if self.indent.is_empty() {
            return format!("{}{}{}", open, parts.join(","), close);
        }
        let separator = format!(",\n{}", inner_indent);
        format!(
            "{}\n{}{}\n{}{}",
            open,
            inner_indent,
            parts.join(&separator),
            current_indent,
            close
        )
    }
}

/// JSON string literal for `s`
fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;
    use pretty_assertions::assert_eq;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_stringify() {
        assert_eq!(
            eval_string("JSON.stringify({ a: 1, b: [true, null, 'x'], c: undefined })"),
            r#"{"a":1,"b":[true,null,"x"]}"#
        );
        assert_eq!(eval_string("JSON.stringify([undefined, NaN])"), "[null,null]");
        assert_eq!(eval_string("JSON.stringify('a\"b')"), r#""a\"b""#);
        assert_eq!(eval_string("typeof JSON.stringify(undefined)"), "undefined");
    }

    #[test]
    fn test_stringify_indent() {
        assert_eq!(
            eval_string("JSON.stringify({ a: [1, 2] }, null, 2)"),
            "{\n  \"a\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_stringify_replacer_and_to_json() {
        assert_eq!(
            eval_string("JSON.stringify({ a: 1, b: 2 }, ['b'])"),
            r#"{"b":2}"#
        );
        assert_eq!(
            eval_string("JSON.stringify({ a: 1, b: 'x' }, (k, v) => typeof v === 'number' ? v * 10 : v)"),
            r#"{"a":10,"b":"x"}"#
        );
        assert_eq!(
            eval_string("JSON.stringify({ d: { toJSON() { return 'D'; } } })"),
            r#"{"d":"D"}"#
        );
    }

    #[test]
    fn test_stringify_cycle() {
        let err = Runtime::new()
            .eval("const a = {}; a.self = a; JSON.stringify(a)")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: Converting circular structure to JSON"
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            eval_string("const o = JSON.parse('{\"z\":1,\"a\":[1,2,{\"k\":\"v\"}]}'); Object.keys(o).join() + o.a[2].k"),
            "z,av"
        );
        assert_eq!(
            eval_string("JSON.parse('[1,2,3]', (k, v) => typeof v === 'number' ? v + 1 : v).join()"),
            "2,3,4"
        );
        assert!(Runtime::new().eval("JSON.parse('{bad')").is_err());
    }

    #[test]
    fn test_stringify_deep_chain() {
        let text = eval_string(
            "let o = {}; for (let i = 0; i < 5000; i++) o = { n: o }; JSON.stringify(o).length",
        );
        assert_eq!(text, (5000 * 6 + 2).to_string());
    }

    #[test]
    fn test_stringify_past_depth_limit_throws() {
        let err = Runtime::new()
            .eval("let o = {}; for (let i = 0; i < 20000; i++) o = { n: o }; JSON.stringify(o)")
            .unwrap_err();
        assert_eq!(err.to_string(), "RangeError: Maximum call stack size exceeded");
    }
}
