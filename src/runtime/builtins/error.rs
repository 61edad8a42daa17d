//! `Error` and its built-in subclasses

use super::{arg, define_constructor, native};
use crate::runtime::interpreter::{Interpreter, JsResult};
use crate::runtime::object::{Object, ObjectKind, PropertyFlags};
use crate::runtime::value::Value;

/// Subclasses registered next to `Error`
const ERROR_SUBCLASSES: [&str; 4] = ["TypeError", "RangeError", "ReferenceError", "SyntaxError"];

pub fn register_errors(interp: &mut Interpreter) {
    let prototype = interp.intrinsics.error_prototype.clone();
    {
        let mut proto = prototype.borrow_mut();
        proto.define("name", Value::from("Error"), PropertyFlags::HIDDEN);
        proto.define("message", Value::from(""), PropertyFlags::HIDDEN);
    }
    interp.define_method(&prototype, "toString", 0, |interp, this, _| {
        let name = interp.get(this, "name")?;
        let name = if name.is_undefined() {
            "Error".to_string()
        } else {
            interp.to_string(&name)?
        };
        let message = interp.get(this, "message")?;
        let message = if message.is_undefined() {
            String::new()
        } else {
            interp.to_string(&message)?
        };
        Ok(Value::String(match (name.is_empty(), message.is_empty()) {
            (_, true) => name,
            (true, false) => message,
            (false, false) => format!("{}: {}", name, message),
        }))
    });

    let error_constructor = define_constructor(
        interp,
        "Error",
        1,
        &prototype,
        native(|interp, _, args| create_error(interp, "Error", args)),
        native(|interp, _, args| create_error(interp, "Error", args)),
    );

    for name in ERROR_SUBCLASSES {
        let sub_prototype =
            Object::with_prototype(ObjectKind::Ordinary, Some(prototype.clone())).into_ref();
        sub_prototype
            .borrow_mut()
            .define("name", Value::from(name), PropertyFlags::HIDDEN);
        interp
            .intrinsics
            .error_prototypes
            .insert(name.to_string(), sub_prototype.clone());

        let constructor = define_constructor(
            interp,
            name,
            1,
            &sub_prototype,
            native(move |interp, _, args| create_error(interp, name, args)),
            native(move |interp, _, args| create_error(interp, name, args)),
        );
        constructor.borrow_mut().prototype = Some(error_constructor.clone());
    }
    interp
        .intrinsics
        .error_prototypes
        .insert("Error".to_string(), prototype);
}

/// `new Error(message, { cause })`
fn create_error(interp: &mut Interpreter, name: &str, args: &[Value]) -> JsResult<Value> {
    let message = match arg(args, 0) {
        Value::Undefined => String::new(),
        other => interp.to_string(&other)?,
    };
    let error = interp.make_error(name, &message);
    if let Value::Object(options) = arg(args, 1) {
        if options.borrow().has_own("cause") {
            let cause = interp.get(&Value::Object(options), "cause")?;
            interp.set(&error, "cause", cause)?;
        }
    }
    Ok(error)
}

#[cfg(test)]
mod tests {
    use crate::runtime::Runtime;

    fn eval_string(source: &str) -> String {
        Runtime::new().eval(source).expect("eval").to_js_string()
    }

    #[test]
    fn test_error_subclasses() {
        assert_eq!(
            eval_string("const e = new TypeError('bad'); [e.name, e.message, e instanceof Error, String(e)].join('|')"),
            "TypeError|bad|true|TypeError: bad"
        );
        assert_eq!(eval_string("Error('plain').message"), "plain");
    }

    #[test]
    fn test_custom_error_class() {
        let source = "
            class ValidationError extends Error {
                constructor(message) { super(message); this.name = 'ValidationError'; }
            }
            const e = new ValidationError('invalid');
            [e instanceof ValidationError, e instanceof Error, e.toString()].join('|')
        ";
        assert_eq!(eval_string(source), "true|true|ValidationError: invalid");
    }

    #[test]
    fn test_thrown_errors_are_catchable() {
        assert_eq!(
            eval_string("let m; try { null.x; } catch (e) { m = e.name + ': ' + e.message; } m"),
            "TypeError: Cannot read properties of null (reading 'x')"
        );
    }
}
