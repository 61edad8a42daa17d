//! `Object`, `Object.prototype` and `Function.prototype`

use super::{arg, define_constructor, native};
use crate::runtime::interpreter::Interpreter;
use crate::runtime::object::{Object, ObjectKind, PropertyFlags};
use crate::runtime::value::Value;

/// Register the `Object` constructor and `Object.prototype`
pub fn register_object(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.object_prototype.clone();
    let constructor = define_constructor(
        interp,
        "Object",
        1,
        &prototype,
        native(|interp, _, args| Ok(to_object(interp, &arg(args, 0)))),
        native(|interp, _, args| Ok(to_object(interp, &arg(args, 0)))),
    );

    interp.define_method(&constructor, "keys", 1, |interp, _, args| {
        let target = require_object_coercible(interp, &arg(args, 0))?;
        let keys = interp
            .own_keys(&target)
            .into_iter()
            .map(Value::String)
            .collect();
        Ok(interp.new_array(keys))
    });

    interp.define_method(&constructor, "values", 1, |interp, _, args| {
        let target = require_object_coercible(interp, &arg(args, 0))?;
        let mut values = Vec::new();
        for key in interp.own_keys(&target) {
            values.push(interp.get(&target, &key)?);
        }
        Ok(interp.new_array(values))
    });

    interp.define_method(&constructor, "entries", 1, |interp, _, args| {
        let target = require_object_coercible(interp, &arg(args, 0))?;
        let mut entries = Vec::new();
        for key in interp.own_keys(&target) {
            let value = interp.get(&target, &key)?;
            entries.push(interp.new_array(vec![Value::String(key), value]));
        }
        Ok(interp.new_array(entries))
    });

    interp.define_method(&constructor, "fromEntries", 1, |interp, _, args| {
        let result = interp.new_object();
        let result_value = Value::Object(result.clone());
        for entry in interp.iterate(&arg(args, 0))? {
            let key = interp.get(&entry, "0")?;
            let key = interp.to_property_key(&key)?;
            let value = interp.get(&entry, "1")?;
            interp.set(&result_value, &key, value)?;
        }
        Ok(result_value)
    });

    interp.define_method(&constructor, "assign", 2, |interp, _, args| {
        let target = arg(args, 0);
        if target.is_nullish() {
            return Err(interp.type_error("Cannot convert undefined or null to object"));
        }
        for source in args.iter().skip(1) {
            for key in interp.own_keys(source) {
                let value = interp.get(source, &key)?;
                interp.set(&target, &key, value)?;
            }
        }
        Ok(target)
    });

    interp.define_method(&constructor, "freeze", 1, |_, _, args| {
        let target = arg(args, 0);
        if let Value::Object(obj) = &target {
            obj.borrow_mut().freeze();
        }
        Ok(target)
    });

    interp.define_method(&constructor, "isFrozen", 1, |_, _, args| {
        Ok(Value::Boolean(match &arg(args, 0) {
            Value::Object(obj) => obj.borrow().is_frozen(),
            _ => true,
        }))
    });

    interp.define_method(&constructor, "create", 2, |interp, _, args| {
        let prototype = match arg(args, 0) {
            Value::Object(proto) => Some(proto),
            Value::Null => None,
            other => {
                return Err(interp.type_error(format!(
                    "Object prototype may only be an Object or null: {}",
                    other.to_js_string()
                )));
            }
        };
        Ok(Value::new_object(prototype))
    });

    interp.define_method(&constructor, "getPrototypeOf", 1, |interp, _, args| {
        let target = require_object_coercible(interp, &arg(args, 0))?;
        let prototype = match &target {
            Value::Object(obj) => obj.borrow().prototype.clone(),
            Value::String(_) => Some(interp.intrinsics.string_prototype.clone()),
            Value::Number(_) => Some(interp.intrinsics.number_prototype.clone()),
            _ => Some(interp.intrinsics.boolean_prototype.clone()),
        };
        Ok(prototype.map(Value::Object).unwrap_or(Value::Null))
    });

    interp.define_method(&constructor, "is", 2, |_, _, args| {
        Ok(Value::Boolean(arg(args, 0).same_value(&arg(args, 1))))
    });

    interp.define_method(&prototype, "hasOwnProperty", 1, |interp, this, args| {
        let key = interp.to_property_key(&arg(args, 0))?;
        Ok(Value::Boolean(match this {
            Value::Object(obj) => obj.borrow().has_own(&key),
            _ => false,
        }))
    });

    interp.define_method(&prototype, "toString", 0, |_, this, _| {
        let tag = match this {
            Value::Undefined => "Undefined",
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Object(obj) => obj.borrow().class_name(),
        };
        Ok(Value::String(format!("[object {}]", tag)))
    });

    interp.define_method(&prototype, "valueOf", 0, |_, this, _| Ok(this.clone()));
}

/// Register `Function.prototype.call`, `apply` and `bind`
pub fn register_function_prototype(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.function_prototype.clone();

    interp.define_method(&prototype, "call", 1, |interp, this, args| {
        let rest = args.get(1..).unwrap_or(&[]);
        interp.call(this, arg(args, 0), rest)
    });

    interp.define_method(&prototype, "apply", 2, |interp, this, args| {
        let list = match arg(args, 1) {
            Value::Undefined | Value::Null => Vec::new(),
            other => interp.iterate(&other)?,
        };
        interp.call(this, arg(args, 0), &list)
    });

    interp.define_method(&prototype, "bind", 1, |interp, this, args| {
        if !this.is_callable() {
            return Err(interp.type_error("Bind must be called on a function"));
        }
        let target = this.clone();
        let bound_this = arg(args, 0);
        let bound_args: Vec<Value> = args.get(1..).unwrap_or(&[]).to_vec();
        let name = interp.get(&target, "name")?.to_js_string();
        Ok(interp.native_function(&format!("bound {}", name), 0, move |interp, _, args| {
            let mut all = bound_args.clone();
            all.extend_from_slice(args);
            interp.call(&target, bound_this.clone(), &all)
        }))
    });

    interp.define_method(&prototype, "toString", 0, |interp, this, _| {
        let name = interp.get(this, "name")?.to_js_string();
        Ok(Value::String(format!("function {}() {{ [native code] }}", name)))
    });
}

/// `ToObject` for the `Object(...)` call: objects pass through, nullish
/// values become a fresh object
fn to_object(interp: &Interpreter, value: &Value) -> Value {
    match value {
        Value::Object(_) => value.clone(),
        _ => Value::Object(
            Object::with_prototype(
                ObjectKind::Ordinary,
                Some(interp.intrinsics.object_prototype.clone()),
            )
            .into_ref(),
        ),
    }
}

fn require_object_coercible(
    interp: &Interpreter,
    value: &Value,
) -> crate::runtime::interpreter::JsResult<Value> {
    if value.is_nullish() {
        Err(interp.type_error("Cannot convert undefined or null to object"))
    } else {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_object_statics() {
        assert_eq!(eval_string("Object.keys({ b: 1, a: 2 }).join()"), "b,a");
        assert_eq!(
            eval_string("Object.entries({ x: 1 }).map(([k, v]) => k + v).join()"),
            "x1"
        );
        assert_eq!(
            eval_string("JSON.stringify(Object.assign({ a: 1 }, { b: 2 }, null))"),
            r#"{"a":1,"b":2}"#
        );
    }

    #[test]
    fn test_freeze_ignores_writes() {
        assert_eq!(
            eval_string("const o = Object.freeze({ a: 1 }); o.a = 2; o.b = 3; [o.a, o.b, Object.isFrozen(o)].join()"),
            "1,,true"
        );
    }

    #[test]
    fn test_bind_call_apply() {
        assert_eq!(
            eval_string("function f(a, b) { return this.x + a + b; } const o = { x: 1 }; [f.call(o, 2, 3), f.apply(o, [1, 1]), f.bind(o, 10)(5)].join()"),
            "6,3,16"
        );
    }
}
