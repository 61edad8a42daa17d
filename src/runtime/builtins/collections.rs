//! `Map` and `Set`
//!
//! Both keep entries in insertion order in a plain vector and compare keys
//! with SameValueZero. Learner programs hold few entries, so lookups are
//! linear.

use super::{arg, define_constructor, native};
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::value::Value;

pub fn register_map(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.map_prototype.clone();
    define_constructor(
        interp,
        "Map",
        0,
        &prototype,
        native(|interp, _, _| Err(interp.type_error("Constructor Map requires 'new'"))),
        native(|interp, _, args| {
            let map = Object::with_prototype(
                ObjectKind::Map(Vec::new()),
                Some(interp.intrinsics.map_prototype.clone()),
            )
            .into_ref();
            let init = arg(args, 0);
            if !init.is_nullish() {
                for entry in interp.iterate(&init)? {
                    if !matches!(entry, Value::Object(_)) {
                        return Err(interp.type_error(format!(
                            "Iterator value {} is not an entry object",
                            entry.to_js_string()
                        )));
                    }
                    let key = interp.get(&entry, "0")?;
                    let value = interp.get(&entry, "1")?;
                    map_set(&map, key, value);
                }
            }
            Ok(Value::Object(map))
        }),
    );

    interp.define_method(&prototype, "get", 1, |interp, this, args| {
        let map = this_collection(interp, this, "Map", "get")?;
        let key = arg(args, 0);
        let found = match &map.borrow().kind {
            ObjectKind::Map(entries) => entries
                .iter()
                .find(|(k, _)| k.same_value_zero(&key))
                .map(|(_, v)| v.clone()),
            _ => None,
        };
        Ok(found.unwrap_or_default())
    });

    interp.define_method(&prototype, "set", 2, |interp, this, args| {
        let map = this_collection(interp, this, "Map", "set")?;
        map_set(&map, arg(args, 0), arg(args, 1));
        Ok(this.clone())
    });

    interp.define_method(&prototype, "has", 1, |interp, this, args| {
        let map = this_collection(interp, this, "Map", "has")?;
        let key = arg(args, 0);
        let found = matches!(
            &map.borrow().kind,
            ObjectKind::Map(entries) if entries.iter().any(|(k, _)| k.same_value_zero(&key))
        );
        Ok(Value::Boolean(found))
    });

    interp.define_method(&prototype, "delete", 1, |interp, this, args| {
        let map = this_collection(interp, this, "Map", "delete")?;
        let key = arg(args, 0);
        let mut obj = map.borrow_mut();
        let ObjectKind::Map(entries) = &mut obj.kind else {
            return Ok(Value::Boolean(false));
        };
        let before = entries.len();
        entries.retain(|(k, _)| !k.same_value_zero(&key));
        Ok(Value::Boolean(entries.len() != before))
    });

    interp.define_method(&prototype, "clear", 0, |interp, this, _| {
        let map = this_collection(interp, this, "Map", "clear")?;
        if let ObjectKind::Map(entries) = &mut map.borrow_mut().kind {
            entries.clear();
        }
        Ok(Value::Undefined)
    });

    interp.define_getter(&prototype, "size", |interp, this, _| {
        let map = this_collection(interp, this, "Map", "size")?;
        Ok(Value::Number(map_entries(&map).len() as f64))
    });

    interp.define_method(&prototype, "forEach", 1, |interp, this, args| {
        let map = this_collection(interp, this, "Map", "forEach")?;
        let callback = arg(args, 0);
        for (key, value) in map_entries(&map) {
            interp.call(&callback, arg(args, 1), &[value, key, this.clone()])?;
        }
        Ok(Value::Undefined)
    });

    interp.define_method(&prototype, "keys", 0, |interp, this, _| {
        let map = this_collection(interp, this, "Map", "keys")?;
        let keys = map_entries(&map).into_iter().map(|(k, _)| k).collect();
        Ok(interp.new_array(keys))
    });

    interp.define_method(&prototype, "values", 0, |interp, this, _| {
        let map = this_collection(interp, this, "Map", "values")?;
        let values = map_entries(&map).into_iter().map(|(_, v)| v).collect();
        Ok(interp.new_array(values))
    });

    interp.define_method(&prototype, "entries", 0, |interp, this, _| {
        let map = this_collection(interp, this, "Map", "entries")?;
        let entries = map_entries(&map)
            .into_iter()
            .map(|(k, v)| interp.new_array(vec![k, v]))
            .collect();
        Ok(interp.new_array(entries))
    });
}

pub fn register_set(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.set_prototype.clone();
    define_constructor(
        interp,
        "Set",
        0,
        &prototype,
        native(|interp, _, _| Err(interp.type_error("Constructor Set requires 'new'"))),
        native(|interp, _, args| {
            let set = Object::with_prototype(
                ObjectKind::Set(Vec::new()),
                Some(interp.intrinsics.set_prototype.clone()),
            )
            .into_ref();
            let init = arg(args, 0);
            if !init.is_nullish() {
                for value in interp.iterate(&init)? {
                    set_add(&set, value);
                }
            }
            Ok(Value::Object(set))
        }),
    );

    interp.define_method(&prototype, "add", 1, |interp, this, args| {
        let set = this_collection(interp, this, "Set", "add")?;
        set_add(&set, arg(args, 0));
        Ok(this.clone())
    });

    interp.define_method(&prototype, "has", 1, |interp, this, args| {
        let set = this_collection(interp, this, "Set", "has")?;
        let value = arg(args, 0);
        Ok(Value::Boolean(
            set_values(&set).iter().any(|v| v.same_value_zero(&value)),
        ))
    });

    interp.define_method(&prototype, "delete", 1, |interp, this, args| {
        let set = this_collection(interp, this, "Set", "delete")?;
        let value = arg(args, 0);
        let mut obj = set.borrow_mut();
        let ObjectKind::Set(values) = &mut obj.kind else {
            return Ok(Value::Boolean(false));
        };
        let before = values.len();
        values.retain(|v| !v.same_value_zero(&value));
        Ok(Value::Boolean(values.len() != before))
    });

    interp.define_method(&prototype, "clear", 0, |interp, this, _| {
        let set = this_collection(interp, this, "Set", "clear")?;
        if let ObjectKind::Set(values) = &mut set.borrow_mut().kind {
            values.clear();
        }
        Ok(Value::Undefined)
    });

    interp.define_getter(&prototype, "size", |interp, this, _| {
        let set = this_collection(interp, this, "Set", "size")?;
        Ok(Value::Number(set_values(&set).len() as f64))
    });

    interp.define_method(&prototype, "forEach", 1, |interp, this, args| {
        let set = this_collection(interp, this, "Set", "forEach")?;
        let callback = arg(args, 0);
        for value in set_values(&set) {
            interp.call(&callback, arg(args, 1), &[value.clone(), value, this.clone()])?;
        }
        Ok(Value::Undefined)
    });

    for name in ["values", "keys"] {
        interp.define_method(&prototype, name, 0, move |interp, this, _| {
            let set = this_collection(interp, this, "Set", name)?;
            Ok(interp.new_array(set_values(&set)))
        });
    }

    interp.define_method(&prototype, "entries", 0, |interp, this, _| {
        let set = this_collection(interp, this, "Set", "entries")?;
        let entries = set_values(&set)
            .into_iter()
            .map(|v| interp.new_array(vec![v.clone(), v]))
            .collect();
        Ok(interp.new_array(entries))
    });
}

/// The receiver as a `Map` / `Set`, or a TypeError
fn this_collection(
    interp: &mut Interpreter,
    this: &Value,
    class: &str,
    method: &str,
) -> JsResult<ObjectRef> {
    if let Value::Object(obj) = this {
        let matches = match &obj.borrow().kind {
            ObjectKind::Map(_) => class == "Map",
            ObjectKind::Set(_) => class == "Set",
            _ => false,
        };
        if matches {
            return Ok(obj.clone());
        }
    }
    Err(interp.type_error(format!(
        "Method {}.prototype.{} called on incompatible receiver {}",
        class,
        method,
        this.to_js_string()
    )))
}

fn map_set(map: &ObjectRef, key: Value, value: Value) {
    if let ObjectKind::Map(entries) = &mut map.borrow_mut().kind {
        // -0 keys are normalized to +0
        let key = match key {
            Value::Number(n) if n == 0.0 => Value::Number(0.0),
            other => other,
        };
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }
}

fn map_entries(map: &ObjectRef) -> Vec<(Value, Value)> {
    match &map.borrow().kind {
        ObjectKind::Map(entries) => entries.clone(),
        _ => Vec::new(),
    }
}

fn set_add(set: &ObjectRef, value: Value) {
    if let ObjectKind::Set(values) = &mut set.borrow_mut().kind {
        let value = match value {
            Value::Number(n) if n == 0.0 => Value::Number(0.0),
            other => other,
        };
        if !values.iter().any(|v| v.same_value_zero(&value)) {
            values.push(value);
        }
    }
}

fn set_values(set: &ObjectRef) -> Vec<Value> {
    match &set.borrow().kind {
        ObjectKind::Set(values) => values.clone(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_map_basics() {
        let source = "
            const m = new Map([['a', 1]]);
            m.set('b', 2).set('a', 3);
            const key = {};
            m.set(key, 'obj');
            [m.get('a'), m.get('b'), m.get(key), m.size, m.has('zz'), m.delete('b'), m.size].join('|')
        ";
        assert_eq!(eval_string(source), "3|2|obj|3|false|true|2");
    }

    #[test]
    fn test_map_iteration_order() {
        let source = "
            const m = new Map();
            m.set('z', 1); m.set('a', 2);
            const out = [];
            for (const [k, v] of m) out.push(k + v);
            m.forEach((v, k) => out.push(k));
            out.join(',')
        ";
        assert_eq!(eval_string(source), "z1,a2,z,a");
    }

    #[test]
    fn test_set_deduplicates() {
        assert_eq!(eval_string("new Set([1, 2, 2, NaN, NaN]).size"), "3");
        assert_eq!(eval_string("[...new Set('hello')].join('')"), "helo");
        assert_eq!(eval_string("const s = new Set([1]); s.add(1).add(2); s.has(2)"), "true");
    }

    #[test]
    fn test_requires_new() {
        let err = Runtime::new().eval("Map()").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Constructor Map requires 'new'");
    }
}
