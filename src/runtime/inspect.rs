//! Console-style rendering of values
//!
//! Produces the compact, node-like representation used by `console.log`
//! capture and by error messages that mention a value.

use super::object::{ObjectKind, ObjectRef, PropertySlot};
use super::value::Value;
use std::rc::Rc;

/// Nesting depth after which objects render as `[Object]`
const MAX_DEPTH: usize = 2;

/// Render a value the way a console prints a single argument
pub fn inspect(value: &Value) -> String {
    let mut seen = Vec::new();
    render(value, 0, &mut seen, true)
}

/// Render a value as `console.log` prints it among other arguments:
/// strings appear without quotes at the top level
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => inspect(other),
    }
}

fn render(value: &Value, depth: usize, seen: &mut Vec<ObjectRef>, top: bool) -> String {
    match value {
        Value::String(s) if top => s.clone(),
        Value::String(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Object(obj) => {
            if seen.iter().any(|o| Rc::ptr_eq(o, obj)) {
                return "[Circular]".to_string();
            }
            seen.push(obj.clone());
            let out = render_object(obj, depth, seen);
            seen.pop();
            out
        }
        other => other.to_js_string(),
    }
}

fn data_property(obj: &ObjectRef, key: &str) -> Option<Value> {
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        if let Some(PropertySlot::Data(value)) = o.borrow().get_own(key) {
            return Some(value);
        }
        current = o.borrow().prototype.clone();
    }
    None
}

fn render_object(obj: &ObjectRef, depth: usize, seen: &mut Vec<ObjectRef>) -> String {
    let borrowed = obj.borrow();
    match &borrowed.kind {
        ObjectKind::Function(_) | ObjectKind::Native(_) => {
            drop(borrowed);
            let name = data_property(obj, "name")
                .map(|v| v.to_js_string())
                .unwrap_or_default();
            if name.is_empty() {
                "[Function (anonymous)]".to_string()
            } else {
                format!("[Function: {}]", name)
            }
        }
        ObjectKind::Error => {
            drop(borrowed);
            let name = data_property(obj, "name")
                .map(|v| v.to_js_string())
                .unwrap_or_else(|| "Error".to_string());
            let message = data_property(obj, "message")
                .map(|v| v.to_js_string())
                .unwrap_or_default();
            if message.is_empty() {
                name
            } else {
                format!("{}: {}", name, message)
            }
        }
        ObjectKind::RegExp(data) => format!("/{}/{}", data.source, data.flags),
        ObjectKind::Promise(promise) => {
            let promise = promise.borrow();
            let state = match promise.state {
                crate::event_loop::PromiseInternalState::Pending => "<pending>".to_string(),
                crate::event_loop::PromiseInternalState::Fulfilled => {
                    render(&promise.result, depth + 1, seen, false)
                }
                crate::event_loop::PromiseInternalState::Rejected => {
                    format!("<rejected> {}", render(&promise.result, depth + 1, seen, false))
                }
            };
            format!("Promise {{ {} }}", state)
        }
        ObjectKind::Array(elements) => {
            if depth > MAX_DEPTH {
                return "[Array]".to_string();
            }
            let elements = elements.clone();
            drop(borrowed);
            let parts: Vec<String> = elements
                .iter()
                .map(|v| render(v, depth + 1, seen, false))
                .collect();
            if parts.is_empty() {
                "[]".to_string()
            } else {
                format!("[ {} ]", parts.join(", "))
            }
        }
        ObjectKind::Map(_) | ObjectKind::Set(_) if depth > MAX_DEPTH => {
            format!("[{}]", borrowed.class_name())
        }
        ObjectKind::Map(entries) => {
            let entries = entries.clone();
            drop(borrowed);
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| {
                    format!(
                        "{} => {}",
                        render(k, depth + 1, seen, false),
                        render(v, depth + 1, seen, false)
                    )
                })
                .collect();
            format!("Map({}) {{{}}}", parts.len(), wrap(&parts))
        }
        ObjectKind::Set(values) => {
            let values = values.clone();
            drop(borrowed);
            let parts: Vec<String> = values
                .iter()
                .map(|v| render(v, depth + 1, seen, false))
                .collect();
            format!("Set({}) {{{}}}", parts.len(), wrap(&parts))
        }
        ObjectKind::Ordinary => {
            if depth > MAX_DEPTH {
                return "[Object]".to_string();
            }
            let keys = borrowed.own_enumerable_keys();
            let slots: Vec<(String, Option<PropertySlot>)> = keys
                .into_iter()
                .map(|k| {
                    let slot = borrowed.get_own(&k);
                    (k, slot)
                })
                .collect();
            drop(borrowed);
            let parts: Vec<String> = slots
                .into_iter()
                .map(|(key, slot)| {
                    let rendered = match slot {
                        Some(PropertySlot::Data(v)) => render(&v, depth + 1, seen, false),
                        Some(PropertySlot::Accessor { .. }) => "[Getter/Setter]".to_string(),
                        None => "undefined".to_string(),
                    };
                    format!("{}: {}", render_key(&key), rendered)
                })
                .collect();
            format!("{{{}}}", wrap(&parts))
        }
    }
}

fn wrap(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" {} ", parts.join(", "))
    }
}

fn render_key(key: &str) -> String {
    let plain = key
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
    if plain {
        key.to_string()
    } else {
        format!("'{}'", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;

    fn show(source: &str) -> String {
        let mut runtime = Runtime::new();
        let value = runtime.eval(source).expect("eval");
        inspect(&value)
    }

    #[test]
    fn test_inspect_nested_values() {
        assert_eq!(show("({ a: 1, b: 'x', c: [1, 2] })"), "{ a: 1, b: 'x', c: [ 1, 2 ] }");
        assert_eq!(show("[]"), "[]");
        assert_eq!(show("({})"), "{}");
        assert_eq!(show("'top'"), "top");
    }

    #[test]
    fn test_inspect_special_objects() {
        assert_eq!(show("function named() {}; named"), "[Function: named]");
        assert_eq!(show("new TypeError('bad')"), "TypeError: bad");
        assert_eq!(show("new Map([[1, 'a']])"), "Map(1) { 1 => 'a' }");
        assert_eq!(show("const o = {}; o.self = o; o"), "{ self: [Circular] }");
    }

    #[test]
    fn test_inspect_stops_at_depth() {
        assert_eq!(
            show("let m = new Map(); for (let i = 0; i < 10000; i++) m = new Map([[i, m]]); m"),
            "Map(1) { 9999 => Map(1) { 9998 => Map(1) { 9997 => [Map] } } }"
        );
        assert_eq!(show("({ a: { b: { c: { d: {} } } } })"), "{ a: { b: { c: [Object] } } }");
    }
}
