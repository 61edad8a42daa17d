//! Tree-walking interpreter core
//!
//! Holds the global scope, the intrinsic prototypes, the event loop and the
//! execution limits, and implements the operations every other part of the
//! runtime is built from: property access, calls, construction, type
//! conversion and driving the event loop. Statement and expression
//! evaluation live in `eval.rs`.

use super::object::{
    Closure, NativeFn, NativeFunction, Object, ObjectKind, ObjectRef, PropertyFlags, PropertySlot,
};
use super::scope::{self, FunctionFrame, Scope, ScopeRef};
use super::value::{number_to_string, Value};
use crate::ast::{self, FunctionKind};
use crate::error::{messages, Error, ErrorKind};
use crate::event_loop::{
    EventLoop, Microtask, PromiseInternalState, PromiseReactionType, PromiseRef,
};
use rustc_hash::FxHashMap as HashMap;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Why evaluation stopped abruptly
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A JavaScript exception; `catch` can observe it
    Throw(Value),
    /// The host stopped execution; learner code cannot intercept it
    Abort(Abort),
}

/// Host-initiated stop reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    Timeout,
}

/// Result of evaluating JavaScript
pub type JsResult<T> = std::result::Result<T, Interrupt>;

/// Statement completion
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// How many evaluation steps pass between wall-clock checks
const DEADLINE_CHECK_INTERVAL: u64 = 256;

/// Remaining native stack below which evaluation switches to a new segment
pub(crate) const STACK_RED_ZONE: usize = 256 * 1024;
/// Size of each additional stack segment
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;
/// Nesting at which recursive walks over values (serializing, comparing,
/// flattening) throw instead of descending further
pub(crate) const MAX_VALUE_DEPTH: usize = 10_000;

/// Execution limits
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum nesting of JavaScript calls
    pub max_call_depth: usize,
    /// Budget for one evaluation, in milliseconds (wall and virtual)
    pub timeout_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_call_depth: 200,
            timeout_ms: 5000,
        }
    }
}

/// An active time budget
#[derive(Debug, Clone, Copy)]
struct Deadline {
    wall: Instant,
    virtual_time: u64,
}

/// Hint for `ToPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    Default,
    Number,
    String,
}

/// Prototype objects shared by every value of a kind
pub struct Intrinsics {
    pub object_prototype: ObjectRef,
    pub function_prototype: ObjectRef,
    pub array_prototype: ObjectRef,
    pub string_prototype: ObjectRef,
    pub number_prototype: ObjectRef,
    pub boolean_prototype: ObjectRef,
    pub error_prototype: ObjectRef,
    pub promise_prototype: ObjectRef,
    pub regexp_prototype: ObjectRef,
    pub map_prototype: ObjectRef,
    pub set_prototype: ObjectRef,
    /// Prototypes of the built-in error subclasses, by name
    pub error_prototypes: HashMap<String, ObjectRef>,
}

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = Object::with_prototype(ObjectKind::Ordinary, None).into_ref();
        let derived = |kind: ObjectKind| {
            Object::with_prototype(kind, Some(object_prototype.clone())).into_ref()
        };
        Self {
            function_prototype: derived(ObjectKind::Ordinary),
            array_prototype: derived(ObjectKind::Array(Vec::new())),
            string_prototype: derived(ObjectKind::Ordinary),
            number_prototype: derived(ObjectKind::Ordinary),
            boolean_prototype: derived(ObjectKind::Ordinary),
            error_prototype: derived(ObjectKind::Ordinary),
            promise_prototype: derived(ObjectKind::Ordinary),
            regexp_prototype: derived(ObjectKind::Ordinary),
            map_prototype: derived(ObjectKind::Ordinary),
            set_prototype: derived(ObjectKind::Ordinary),
            error_prototypes: HashMap::default(),
            object_prototype,
        }
    }
}

/// The JavaScript interpreter
pub struct Interpreter {
    pub(crate) global: ScopeRef,
    pub(crate) scope: ScopeRef,
    pub(crate) intrinsics: Intrinsics,
    pub(crate) event_loop: EventLoop,
    pub(crate) limits: Limits,
    call_depth: usize,
    steps: u64,
    deadline: Option<Deadline>,
}

impl Interpreter {
    /// Create an interpreter with all intrinsics installed
    pub fn new(limits: Limits) -> Self {
        let global = Scope::new_global();
        let mut interpreter = Self {
            scope: global.clone(),
            global,
            intrinsics: Intrinsics::new(),
            event_loop: EventLoop::new(),
            limits,
            call_depth: 0,
            steps: 0,
            deadline: None,
        };
        super::builtins::install(&mut interpreter);
        interpreter
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    // ========== Limits ==========

    /// Start a time budget of `limit_ms`, measured both on the wall clock
    /// and on the event loop's virtual clock
    pub fn set_deadline(&mut self, limit_ms: u64) {
        self.deadline = Some(Deadline {
            wall: Instant::now() + Duration::from_millis(limit_ms),
            virtual_time: self.event_loop.current_time().saturating_add(limit_ms),
        });
        self.steps = 0;
    }

    pub fn clear_deadline(&mut self) {
        self.deadline = None;
    }

    /// Count one evaluation step, aborting once the wall deadline passed
    pub(crate) fn tick(&mut self) -> JsResult<()> {
        self.steps += 1;
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline.wall {
                    return Err(Interrupt::Abort(Abort::Timeout));
                }
            }
        }
        Ok(())
    }

    fn virtual_limit(&self) -> u64 {
        self.deadline.map(|d| d.virtual_time).unwrap_or(u64::MAX)
    }

    /// Run `f` with `scope` as the current scope, restoring the previous
    /// scope afterwards even when `f` fails
    pub(crate) fn with_scope<R>(
        &mut self,
        scope: ScopeRef,
        f: impl FnOnce(&mut Self) -> JsResult<R>,
    ) -> JsResult<R> {
        let saved = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = saved;
        result
    }

    // ========== Errors ==========

    /// Create an error object of the given constructor name
    pub fn make_error(&self, name: &str, message: &str) -> Value {
        let prototype = self
            .intrinsics
            .error_prototypes
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.intrinsics.error_prototype.clone());
        let mut error = Object::with_prototype(ObjectKind::Error, Some(prototype));
        if !self.intrinsics.error_prototypes.contains_key(name) && name != "Error" {
            error.define("name", Value::from(name), PropertyFlags::HIDDEN);
        }
        error.define("message", Value::from(message), PropertyFlags::HIDDEN);
        error.define(
            "stack",
            Value::String(format!("{}: {}\n    at <anonymous>", name, message)),
            PropertyFlags::HIDDEN,
        );
        Value::Object(error.into_ref())
    }

    /// Build a throw of the given kind
    pub fn throw(&self, kind: ErrorKind, message: impl AsRef<str>) -> Interrupt {
        Interrupt::Throw(self.make_error(kind.name(), message.as_ref()))
    }

    pub fn type_error(&self, message: impl AsRef<str>) -> Interrupt {
        self.throw(ErrorKind::TypeError, message)
    }

    pub fn reference_error(&self, message: impl AsRef<str>) -> Interrupt {
        self.throw(ErrorKind::ReferenceError, message)
    }

    pub fn range_error(&self, message: impl AsRef<str>) -> Interrupt {
        self.throw(ErrorKind::RangeError, message)
    }

    /// Run one level of a recursive walk over learner values at `depth`,
    /// growing the native stack as needed. Past [`MAX_VALUE_DEPTH`] the walk
    /// throws the same `RangeError` as runaway recursion.
    pub(crate) fn descend<T>(
        &mut self,
        depth: usize,
        walk: impl FnOnce(&mut Self) -> JsResult<T>,
    ) -> JsResult<T> {
        if depth >= MAX_VALUE_DEPTH {
            return Err(self.range_error(messages::STACK_OVERFLOW));
        }
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || walk(self))
    }

    /// Convert an interrupt escaping to the host into a crate error
    pub fn interrupt_to_error(&self, interrupt: Interrupt) -> Error {
        match interrupt {
            Interrupt::Abort(Abort::Timeout) => Error::Timeout {
                limit_ms: self.limits.timeout_ms,
            },
            Interrupt::Throw(value) => match error_parts(&value) {
                Some((name, message)) => Error::runtime(ErrorKind::from_name(&name), message),
                None => Error::Thrown(super::inspect::inspect(&value)),
            },
        }
    }

    // ========== Object creation ==========

    /// A new empty object inheriting from `Object.prototype`
    pub fn new_object(&self) -> ObjectRef {
        Object::with_prototype(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_prototype.clone()),
        )
        .into_ref()
    }

    /// A new array
    pub fn new_array(&self, elements: Vec<Value>) -> Value {
        Value::Object(
            Object::with_prototype(
                ObjectKind::Array(elements),
                Some(self.intrinsics.array_prototype.clone()),
            )
            .into_ref(),
        )
    }

    /// Wrap a Rust closure as a callable function object
    pub fn native_function(
        &self,
        name: &str,
        arity: usize,
        f: impl Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
    ) -> Value {
        Value::Object(self.native_object(name, arity, Rc::new(f), None))
    }

    /// Function object for a native implementation
    pub(crate) fn native_object(
        &self,
        name: &str,
        arity: usize,
        call: NativeFn,
        construct: Option<NativeFn>,
    ) -> ObjectRef {
        let mut obj = Object::with_prototype(
            ObjectKind::Native(NativeFunction {
                name: name.to_string(),
                call,
                construct,
            }),
            Some(self.intrinsics.function_prototype.clone()),
        );
        obj.define("name", Value::from(name), PropertyFlags::CONFIGURABLE);
        obj.define(
            "length",
            Value::Number(arity as f64),
            PropertyFlags::CONFIGURABLE,
        );
        obj.into_ref()
    }

    /// Install a native method on `target`
    pub fn define_method(
        &self,
        target: &ObjectRef,
        name: &str,
        arity: usize,
        f: impl Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let function = self.native_function(name, arity, f);
        target
            .borrow_mut()
            .define(name, function, PropertyFlags::HIDDEN);
    }

    /// Install a native getter on `target`
    pub fn define_getter(
        &self,
        target: &ObjectRef,
        name: &str,
        f: impl Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value> + 'static,
    ) {
        let getter = self.native_function(&format!("get {}", name), 0, f);
        target
            .borrow_mut()
            .define_accessor(name, Some(getter), None);
    }

    /// Create a function object for a function literal in the current scope
    pub fn create_closure(
        &self,
        function: &Rc<ast::Function>,
        home_object: Option<ObjectRef>,
    ) -> Value {
        let name = function.name.clone().unwrap_or_default();
        let constructible = function.kind == FunctionKind::Normal && !function.is_async;
        let mut obj = Object::with_prototype(
            ObjectKind::Function(Closure {
                function: function.clone(),
                scope: self.scope.clone(),
                home_object,
                class: None,
            }),
            Some(self.intrinsics.function_prototype.clone()),
        );
        obj.define("name", Value::String(name), PropertyFlags::CONFIGURABLE);
        obj.define(
            "length",
            Value::Number(function.arity() as f64),
            PropertyFlags::CONFIGURABLE,
        );
        let obj = obj.into_ref();
        if constructible {
            let prototype = self.new_object();
            prototype.borrow_mut().define(
                "constructor",
                Value::Object(obj.clone()),
                PropertyFlags::HIDDEN,
            );
            obj.borrow_mut().define(
                "prototype",
                Value::Object(prototype),
                PropertyFlags::WRITABLE,
            );
        }
        Value::Object(obj)
    }

    /// Give an anonymous function or class the name of its binding
    pub(crate) fn set_function_name(&self, value: &Value, name: &str) {
        if let Value::Object(obj) = value {
            let mut obj = obj.borrow_mut();
            let unnamed = matches!(
                obj.properties.get("name").map(|p| &p.slot),
                Some(PropertySlot::Data(Value::String(s))) if s.is_empty()
            );
            if unnamed {
                obj.define("name", Value::from(name), PropertyFlags::CONFIGURABLE);
            }
        }
    }

    // ========== Property access ==========

    /// `base[key]`
    pub fn get(&mut self, base: &Value, key: &str) -> JsResult<Value> {
        let holder = match base {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(messages::cannot_read(&base.to_js_string(), key)));
            }
            Value::Object(obj) => obj.clone(),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(index) = super::value::array_index(key) {
                    return Ok(s
                        .chars()
                        .nth(index)
                        .map(|c| Value::String(c.to_string()))
                        .unwrap_or_default());
                }
                self.intrinsics.string_prototype.clone()
            }
            Value::Number(_) => self.intrinsics.number_prototype.clone(),
            Value::Boolean(_) => self.intrinsics.boolean_prototype.clone(),
        };
        self.get_from(&holder, key, base)
    }

    /// Look `key` up on `obj` and its prototype chain, invoking getters with
    /// `receiver` as `this`
    pub fn get_from(&mut self, obj: &ObjectRef, key: &str, receiver: &Value) -> JsResult<Value> {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            let (slot, prototype) = {
                let borrowed = o.borrow();
                (borrowed.get_own(key), borrowed.prototype.clone())
            };
            match slot {
                Some(PropertySlot::Data(value)) => return Ok(value),
                Some(PropertySlot::Accessor { get, .. }) => {
                    return match get {
                        Some(getter) => self.call(&getter, receiver.clone(), &[]),
                        None => Ok(Value::Undefined),
                    };
                }
                None => current = prototype,
            }
        }
        Ok(Value::Undefined)
    }

    /// `base[key] = value`. Writes refused by frozen objects are ignored.
    pub fn set(&mut self, base: &Value, key: &str, value: Value) -> JsResult<()> {
        let obj = match base {
            Value::Undefined | Value::Null => {
                return Err(self.type_error(messages::cannot_set(&base.to_js_string(), key)));
            }
            Value::Object(obj) => obj.clone(),
            _ => return Ok(()),
        };

        let mut current = Some(obj.clone());
        while let Some(o) = current {
            let (slot, prototype) = {
                let borrowed = o.borrow();
                (borrowed.get_own(key), borrowed.prototype.clone())
            };
            match slot {
                Some(PropertySlot::Accessor { set, .. }) => {
                    if let Some(setter) = set {
                        self.call(&setter, base.clone(), &[value])?;
                    }
                    return Ok(());
                }
                Some(PropertySlot::Data(_)) => break,
                None => current = prototype,
            }
        }
        obj.borrow_mut().set_own(key, value);
        Ok(())
    }

    /// The `in` operator
    pub fn has_property(&self, obj: &ObjectRef, key: &str) -> bool {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            if o.borrow().has_own(key) {
                return true;
            }
            current = o.borrow().prototype.clone();
        }
        false
    }

    // ========== Calls ==========

    /// Call `callee` with the given `this` and arguments
    pub fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> JsResult<Value> {
        enum Target {
            Native(NativeFn),
            Closure(Closure),
        }
        let target = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Native(native) => Some(Target::Native(native.call.clone())),
                ObjectKind::Function(closure) => Some(Target::Closure(closure.clone())),
                _ => None,
            },
            _ => None,
        };
        let Some(target) = target else {
            return Err(self.type_error(messages::not_a_function(&super::inspect::inspect(
                callee,
            ))));
        };

        if self.call_depth >= self.limits.max_call_depth {
            return Err(self.range_error(messages::STACK_OVERFLOW));
        }
        self.call_depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || match target {
            Target::Native(f) => f(self, &this, args),
            Target::Closure(closure) => self.call_closure(&closure, this, args),
        });
        self.call_depth -= 1;
        result
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: &[Value]) -> JsResult<Value> {
        let function = &closure.function;
        if function.kind == FunctionKind::Constructor {
            let name = function.name.clone().unwrap_or_default();
            return Err(self.type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                name
            )));
        }
        let frame = (function.kind != FunctionKind::Arrow).then(|| FunctionFrame {
            this: Some(this),
            home_object: closure.home_object.clone(),
            new_target: None,
            class: None,
        });
        if function.is_async {
            return self.call_async(closure, frame, args);
        }
        self.invoke_closure(closure, frame, args).map(|(value, _)| value)
    }

    /// Run an async function body to completion and wrap the outcome in a
    /// promise. Awaits inside the body drive the event loop.
    fn call_async(
        &mut self,
        closure: &Closure,
        frame: Option<FunctionFrame>,
        args: &[Value],
    ) -> JsResult<Value> {
        let promise = self.event_loop.create_promise();
        match self.invoke_closure(closure, frame, args) {
            Ok((value, _)) => self.resolve_promise(&promise, value)?,
            Err(Interrupt::Throw(reason)) => self.event_loop.reject_promise(&promise, reason),
            Err(abort) => return Err(abort),
        }
        Ok(self.promise_object(promise))
    }

    /// Bind arguments and run a closure body in a fresh function scope.
    /// Returns the completion value and the function scope, whose frame
    /// holds the final `this` for constructors.
    pub(crate) fn invoke_closure(
        &mut self,
        closure: &Closure,
        frame: Option<FunctionFrame>,
        args: &[Value],
    ) -> JsResult<(Value, ScopeRef)> {
        let function = closure.function.clone();
        let is_arrow = frame.is_none();
        let function_scope = Scope::function(&closure.scope, frame);
        let value = self.with_scope(function_scope.clone(), |this| {
            this.bind_parameters(&function, args, is_arrow)?;
            match &function.body {
                ast::FunctionBody::Expression(expr) => this.eval(expr),
                ast::FunctionBody::Block(body) => {
                    this.hoist_declarations(body);
                    match this.exec_statements(body)? {
                        Flow::Return(value) => Ok(value),
                        _ => Ok(Value::Undefined),
                    }
                }
            }
        })?;
        Ok((value, function_scope))
    }

    fn bind_parameters(
        &mut self,
        function: &ast::Function,
        args: &[Value],
        is_arrow: bool,
    ) -> JsResult<()> {
        use super::eval::BindingMode;
        let mode = BindingMode::Initialize { mutable: true };
        for (i, param) in function.params.iter().enumerate() {
            let value = args.get(i).cloned().unwrap_or_default();
            self.bind_pattern(param, value, mode)?;
        }
        if let Some(rest) = &function.rest {
            let rest_values = args.get(function.params.len()..).unwrap_or(&[]).to_vec();
            let array = self.new_array(rest_values);
            self.bind_pattern(rest, array, mode)?;
        }
        let needs_arguments = !is_arrow && !self.scope.borrow().has_own("arguments");
        if needs_arguments {
            let arguments = self.new_array(args.to_vec());
            self.scope
                .borrow_mut()
                .declare("arguments", arguments, true);
        }
        let mut scope = self.scope.borrow_mut();
        for name in &function.var_names {
            if !scope.has_own(name) {
                scope.declare(name, Value::Undefined, true);
            }
        }
        Ok(())
    }

    /// `new callee(...args)`. `new_target` differs from `callee` when a
    /// derived class constructor delegates to its parent.
    pub fn construct(
        &mut self,
        callee: &Value,
        args: &[Value],
        new_target: Option<&Value>,
    ) -> JsResult<Value> {
        enum Target {
            Native(NativeFn),
            Closure(Closure),
        }
        let target = match callee {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Native(NativeFunction {
                    construct: Some(construct),
                    ..
                }) => Some(Target::Native(construct.clone())),
                ObjectKind::Function(closure)
                    if matches!(
                        closure.function.kind,
                        FunctionKind::Normal | FunctionKind::Constructor
                    ) && !closure.function.is_async =>
                {
                    Some(Target::Closure(closure.clone()))
                }
                _ => None,
            },
            _ => None,
        };
        let Some(target) = target else {
            return Err(self.type_error(format!(
                "{} is not a constructor",
                super::inspect::inspect(callee)
            )));
        };
        let new_target = new_target.cloned().unwrap_or_else(|| callee.clone());

        if self.call_depth >= self.limits.max_call_depth {
            return Err(self.range_error(messages::STACK_OVERFLOW));
        }
        self.call_depth += 1;
        let result = match target {
            Target::Native(construct) => {
                construct(self, &Value::Undefined, args).and_then(|result| {
                    if !new_target.strict_equals(callee) {
                        self.adopt_prototype(&result, &new_target)?;
                    }
                    Ok(result)
                })
            }
            Target::Closure(closure) => self.construct_closure(&closure, args, new_target),
        };
        self.call_depth -= 1;
        result
    }

    /// Point `obj` at `new_target.prototype`
    fn adopt_prototype(&mut self, obj: &Value, new_target: &Value) -> JsResult<()> {
        if let (Value::Object(obj), Value::Object(proto)) =
            (obj, self.get(new_target, "prototype")?)
        {
            obj.borrow_mut().prototype = Some(proto);
        }
        Ok(())
    }

    fn construct_closure(
        &mut self,
        closure: &Closure,
        args: &[Value],
        new_target: Value,
    ) -> JsResult<Value> {
        let derived = closure
            .class
            .as_ref()
            .is_some_and(|class| class.parent.is_some());

        let this = if derived {
            None
        } else {
            let prototype = match self.get(&new_target, "prototype")? {
                Value::Object(proto) => proto,
                _ => self.intrinsics.object_prototype.clone(),
            };
            let instance = Value::Object(
                Object::with_prototype(ObjectKind::Ordinary, Some(prototype)).into_ref(),
            );
            if let Some(class) = &closure.class {
                self.initialize_fields(&instance, class)?;
            }
            Some(instance)
        };

        let frame = FunctionFrame {
            this,
            home_object: closure.home_object.clone(),
            new_target: Some(new_target),
            class: closure.class.clone(),
        };
        let (result, function_scope) = self.invoke_closure(closure, Some(frame), args)?;
        if matches!(result, Value::Object(_)) {
            return Ok(result);
        }
        let this = scope::with_frame(&function_scope, |frame| frame.this.clone()).flatten();
        this.ok_or_else(|| {
            self.reference_error(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
        })
    }

    /// Run instance field initializers of `class` against `instance`
    pub(crate) fn initialize_fields(
        &mut self,
        instance: &Value,
        class: &super::object::ClassInfo,
    ) -> JsResult<()> {
        if class.fields.is_empty() {
            return Ok(());
        }
        let frame = FunctionFrame {
            this: Some(instance.clone()),
            home_object: Some(class.prototype.clone()),
            ..FunctionFrame::default()
        };
        let field_scope = Scope::function(&class.scope, Some(frame));
        self.with_scope(field_scope, |this| {
            for field in &class.fields {
                let value = match &field.value {
                    Some(expr) => this.eval_named(expr, &field.key)?,
                    None => Value::Undefined,
                };
                if let Value::Object(obj) = instance {
                    obj.borrow_mut()
                        .define(&field.key, value, PropertyFlags::DEFAULT);
                }
            }
            Ok(())
        })
    }

    // ========== Conversions ==========

    /// `ToPrimitive`: calls `valueOf` / `toString` on objects
    pub fn to_primitive(&mut self, value: &Value, hint: PreferredType) -> JsResult<Value> {
        if !matches!(value, Value::Object(_)) {
            return Ok(value.clone());
        }
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for method in order {
            let f = self.get(value, method)?;
            if f.is_callable() {
                let result = self.call(&f, value.clone(), &[])?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    /// `ToString`
    pub fn to_string(&mut self, value: &Value) -> JsResult<String> {
        match value {
            Value::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                Ok(primitive.to_js_string())
            }
            other => Ok(other.to_js_string()),
        }
    }

    /// `ToNumber`
    pub fn to_number(&mut self, value: &Value) -> JsResult<f64> {
        match value {
            Value::Object(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                Ok(primitive.to_number())
            }
            other => Ok(other.to_number()),
        }
    }

    /// Property key of a computed member access
    pub fn to_property_key(&mut self, value: &Value) -> JsResult<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(number_to_string(*n)),
            other => self.to_string(other),
        }
    }

    /// Abstract equality (`==`)
    pub fn loose_equals(&mut self, a: &Value, b: &Value) -> JsResult<bool> {
        Ok(match (a, b) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
            (Value::Number(x), Value::String(_)) => *x == b.to_number(),
            (Value::String(_), Value::Number(y)) => a.to_number() == *y,
            (Value::Boolean(_), _) => {
                return self.loose_equals(&Value::Number(a.to_number()), b);
            }
            (_, Value::Boolean(_)) => {
                return self.loose_equals(a, &Value::Number(b.to_number()));
            }
            (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
            (Value::Object(_), _) => {
                let primitive = self.to_primitive(a, PreferredType::Default)?;
                return self.loose_equals(&primitive, b);
            }
            (_, Value::Object(_)) => {
                let primitive = self.to_primitive(b, PreferredType::Default)?;
                return self.loose_equals(a, &primitive);
            }
            _ => a.strict_equals(b),
        })
    }

    /// `value instanceof constructor`
    pub fn instance_of(&mut self, value: &Value, constructor: &Value) -> JsResult<bool> {
        if !constructor.is_callable() {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        let Value::Object(obj) = value else {
            return Ok(false);
        };
        let Value::Object(prototype) = self.get(constructor, "prototype")? else {
            return Ok(false);
        };
        let mut current = obj.borrow().prototype.clone();
        while let Some(p) = current {
            if Rc::ptr_eq(&p, &prototype) {
                return Ok(true);
            }
            current = p.borrow().prototype.clone();
        }
        Ok(false)
    }

    /// Values produced by iterating `value` (`for…of`, spread, destructuring)
    pub fn iterate(&mut self, value: &Value) -> JsResult<Vec<Value>> {
        if let Value::String(s) = value {
            return Ok(s.chars().map(|c| Value::String(c.to_string())).collect());
        }
        if let Value::Object(obj) = value {
            let items = match &obj.borrow().kind {
                ObjectKind::Array(elements) => Some(elements.clone()),
                ObjectKind::Set(values) => Some(values.clone()),
                ObjectKind::Map(entries) => Some(
                    entries
                        .iter()
                        .map(|(k, v)| self.new_array(vec![k.clone(), v.clone()]))
                        .collect(),
                ),
                _ => None,
            };
            if let Some(items) = items {
                return Ok(items);
            }
        }
        Err(self.type_error(format!(
            "{} is not iterable",
            super::inspect::inspect(value)
        )))
    }

    /// Own enumerable property names, as `Object.keys` reports them
    pub fn own_keys(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Object(obj) => obj.borrow().own_enumerable_keys(),
            Value::String(s) => (0..s.chars().count()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    // ========== Promises and the event loop ==========

    /// Wrap a promise state in a `Promise` object
    pub fn promise_object(&self, promise: PromiseRef) -> Value {
        Value::Object(
            Object::with_prototype(
                ObjectKind::Promise(promise),
                Some(self.intrinsics.promise_prototype.clone()),
            )
            .into_ref(),
        )
    }

    /// The promise state behind a `Promise` object
    pub fn promise_state(value: &Value) -> Option<PromiseRef> {
        match value {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Promise(promise) => Some(promise.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// `Promise.resolve(value)` as a promise state
    pub fn promise_resolve(&mut self, value: Value) -> JsResult<PromiseRef> {
        if let Some(promise) = Self::promise_state(&value) {
            return Ok(promise);
        }
        let promise = self.event_loop.create_promise();
        self.resolve_promise(&promise, value)?;
        Ok(promise)
    }

    /// Resolve `promise` with `value`, adopting thenables
    pub fn resolve_promise(&mut self, promise: &PromiseRef, value: Value) -> JsResult<()> {
        if let Some(inner) = Self::promise_state(&value) {
            if Rc::ptr_eq(&inner, promise) {
                let error = self.make_error("TypeError", "Chaining cycle detected for promise");
                self.event_loop.reject_promise(promise, error);
                return Ok(());
            }
        }
        if let Value::Object(_) = &value {
            let then = match self.get(&value, "then") {
                Ok(then) => then,
                Err(Interrupt::Throw(reason)) => {
                    self.event_loop.reject_promise(promise, reason);
                    return Ok(());
                }
                Err(abort) => return Err(abort),
            };
            if then.is_callable() {
                self.event_loop.enqueue_microtask(Microtask::ResolveThenable {
                    promise: promise.clone(),
                    thenable: value,
                    then,
                });
                return Ok(());
            }
        }
        self.event_loop.fulfill_promise(promise, value);
        Ok(())
    }

    /// Resolve and reject functions bound to `promise`; only the first call
    /// of either has an effect
    pub fn resolving_functions(&self, promise: &PromiseRef) -> (Value, Value) {
        let done = Rc::new(Cell::new(false));
        let resolve = {
            let promise = promise.clone();
            let done = done.clone();
            self.native_function("resolve", 1, move |interp, _, args| {
                if !done.replace(true) {
                    let value = args.first().cloned().unwrap_or_default();
                    interp.resolve_promise(&promise, value)?;
                }
                Ok(Value::Undefined)
            })
        };
        let reject = {
            let promise = promise.clone();
            self.native_function("reject", 1, move |interp, _, args| {
                if !done.replace(true) {
                    let reason = args.first().cloned().unwrap_or_default();
                    interp.event_loop.reject_promise(&promise, reason);
                }
                Ok(Value::Undefined)
            })
        };
        (resolve, reject)
    }

    /// `promise.then(on_fulfilled, on_rejected)` returning the derived promise
    pub fn promise_then(
        &mut self,
        promise: &PromiseRef,
        on_fulfilled: Option<Value>,
        on_rejected: Option<Value>,
    ) -> Value {
        let derived = self.event_loop.create_promise();
        let on_fulfilled = on_fulfilled.filter(Value::is_callable);
        let on_rejected = on_rejected.filter(Value::is_callable);
        self.event_loop
            .add_promise_reactions(promise, on_fulfilled, on_rejected, Some(derived.clone()));
        self.promise_object(derived)
    }

    fn run_microtask(&mut self, task: Microtask) -> JsResult<()> {
        match task {
            Microtask::Reaction { reaction, argument } => {
                let outcome = match &reaction.handler {
                    Some(handler) => self.call(handler, Value::Undefined, &[argument]),
                    None if reaction.reaction_type == PromiseReactionType::Fulfill => Ok(argument),
                    None => Err(Interrupt::Throw(argument)),
                };
                match (outcome, reaction.derived) {
                    (Err(Interrupt::Abort(abort)), _) => Err(Interrupt::Abort(abort)),
                    (Ok(value), Some(derived)) => self.resolve_promise(&derived, value),
                    (Err(Interrupt::Throw(reason)), Some(derived)) => {
                        self.event_loop.reject_promise(&derived, reason);
                        Ok(())
                    }
                    (_, None) => Ok(()),
                }
            }
            Microtask::ResolveThenable {
                promise,
                thenable,
                then,
            } => {
                let (resolve, reject) = self.resolving_functions(&promise);
                match self.call(&then, thenable, &[resolve, reject.clone()]) {
                    Err(Interrupt::Throw(reason)) => {
                        self.call(&reject, Value::Undefined, &[reason])?;
                        Ok(())
                    }
                    other => other.map(|_| ()),
                }
            }
        }
    }

    /// Drain the microtask queue
    pub fn run_microtasks(&mut self) -> JsResult<()> {
        while let Some(task) = self.event_loop.dequeue_microtask() {
            self.tick()?;
            self.run_microtask(task)?;
        }
        Ok(())
    }

    /// Fire the next timer due within the current budget. Returns `false`
    /// when no timer is due.
    fn run_next_timer(&mut self) -> JsResult<bool> {
        let limit = self.virtual_limit();
        let Some(timer) = self.event_loop.pop_timer_due_by(limit) else {
            return Ok(false);
        };
        trace!(timer = timer.id, at = timer.fire_at, "firing timer");
        self.call(&timer.callback, Value::Undefined, &timer.args)?;
        Ok(true)
    }

    /// Run microtasks and due timers until nothing is left to do
    pub fn run_until_idle(&mut self) -> JsResult<()> {
        loop {
            self.run_microtasks()?;
            if !self.run_next_timer()? {
                return Ok(());
            }
        }
    }

    /// Drive the event loop until `value` (a promise or plain value)
    /// settles. A promise that can no longer settle within the budget
    /// aborts with a timeout.
    pub fn await_value(&mut self, value: Value) -> JsResult<Value> {
        let promise = self.promise_resolve(value)?;
        promise.borrow_mut().handled = true;
        self.run_microtasks()?;
        loop {
            let (state, result) = {
                let p = promise.borrow();
                (p.state, p.result.clone())
            };
            match state {
                PromiseInternalState::Fulfilled => return Ok(result),
                PromiseInternalState::Rejected => return Err(Interrupt::Throw(result)),
                PromiseInternalState::Pending => {}
            }
            self.tick()?;
            if self.event_loop.has_pending_microtasks() {
                self.run_microtasks()?;
            } else if !self.run_next_timer()? {
                trace!("awaited promise can no longer settle");
                return Err(Interrupt::Abort(Abort::Timeout));
            }
        }
    }
}

/// `name` and `message` of an error-like object
pub fn error_parts(value: &Value) -> Option<(String, String)> {
    let Value::Object(obj) = value else {
        return None;
    };
    let is_error = {
        let mut current = Some(obj.clone());
        let mut found = false;
        while let Some(o) = current {
            if matches!(o.borrow().kind, ObjectKind::Error) {
                found = true;
                break;
            }
            current = o.borrow().prototype.clone();
        }
        found
    };
    if !is_error {
        return None;
    }
    let read = |key: &str| -> String {
        let mut current = Some(obj.clone());
        while let Some(o) = current {
            if let Some(PropertySlot::Data(v)) = o.borrow().get_own(key) {
                return v.to_js_string();
            }
            current = o.borrow().prototype.clone();
        }
        String::new()
    };
    Some((read("name"), read("message")))
}
