//! Built-in objects and functions
//!
//! Each submodule registers one family of intrinsics on the interpreter's
//! prototypes and global scope. Nothing here reaches the filesystem, the
//! network or the host process.

mod array;
mod collections;
mod error;
mod global;
pub(crate) mod json;
mod number;
mod object;
mod promise;
pub(crate) mod regexp;
mod string;

use super::interpreter::{Interpreter, JsResult};
use super::object::{NativeFn, ObjectRef, PropertyFlags};
use super::value::Value;
use std::rc::Rc;

/// Register all intrinsics on a fresh interpreter
pub fn install(interp: &mut Interpreter) {
    object::register_object(interp);
    object::register_function_prototype(interp);
    global::register_globals(interp);
    error::register_errors(interp);
    array::register_array(interp);
    string::register_string(interp);
    number::register_number(interp);
    number::register_boolean(interp);
    number::register_math(interp);
    json::register_json(interp);
    promise::register_promise(interp);
    promise::register_timers(interp);
    regexp::register_regexp(interp);
    collections::register_map(interp);
    collections::register_set(interp);
}

/// Argument `i`, or `undefined` when absent
pub(crate) fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// Bind a global name
pub(crate) fn define_global(interp: &Interpreter, name: &str, value: Value) {
    interp.global.borrow_mut().declare(name, value, true);
}

/// Create a constructor whose `prototype` is `prototype`, and bind it
/// globally
pub(crate) fn define_constructor(
    interp: &Interpreter,
    name: &str,
    arity: usize,
    prototype: &ObjectRef,
    call: NativeFn,
    construct: NativeFn,
) -> ObjectRef {
    let constructor = interp.native_object(name, arity, call, Some(construct));
    constructor.borrow_mut().define(
        "prototype",
        Value::Object(prototype.clone()),
        PropertyFlags::empty(),
    );
    prototype.borrow_mut().define(
        "constructor",
        Value::Object(constructor.clone()),
        PropertyFlags::HIDDEN,
    );
    define_global(interp, name, Value::Object(constructor.clone()));
    constructor
}

/// Shorthand for boxing a native implementation
pub(crate) fn native(
    f: impl Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
) -> NativeFn {
    Rc::new(f)
}

/// Call `callback(element, index, array)` as the array methods do
pub(crate) fn call_with_index(
    interp: &mut Interpreter,
    callback: &Value,
    this_arg: &Value,
    element: Value,
    index: usize,
    array: &Value,
) -> JsResult<Value> {
    interp.call(
        callback,
        this_arg.clone(),
        &[element, Value::Number(index as f64), array.clone()],
    )
}
