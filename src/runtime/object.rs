//! Object model
//!
//! Objects keep their properties in insertion order with per-property
//! attribute flags, and point at an optional prototype. Arrays keep their
//! elements in a dense vector; `length` and index keys are served from it.

use super::interpreter::{Interpreter, JsResult};
use super::scope::ScopeRef;
use super::value::{array_index, Value};
use crate::ast;
use crate::event_loop::PromiseRef;
use bitflags::bitflags;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared, mutable handle to an object
pub type ObjectRef = Rc<RefCell<Object>>;

/// Type alias for native function implementations: `(interpreter, this, args)`
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &Value, &[Value]) -> JsResult<Value>>;

bitflags! {
    /// Property attributes
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u8 {
        const WRITABLE = 0b001;
        const ENUMERABLE = 0b010;
        const CONFIGURABLE = 0b100;
        /// Methods installed on prototypes and built-ins
        const HIDDEN = Self::WRITABLE.bits() | Self::CONFIGURABLE.bits();
        /// Plain assignment creates properties like this
        const DEFAULT = Self::WRITABLE.bits() | Self::ENUMERABLE.bits() | Self::CONFIGURABLE.bits();
    }
}

/// Where a property's value comes from
#[derive(Clone)]
pub enum PropertySlot {
    Data(Value),
    Accessor {
        get: Option<Value>,
        set: Option<Value>,
    },
}

/// A property with its attributes
#[derive(Clone)]
pub struct Property {
    pub slot: PropertySlot,
    pub flags: PropertyFlags,
}

/// Insertion-ordered property storage
#[derive(Clone, Default)]
pub struct PropertyMap {
    order: Vec<String>,
    entries: HashMap<String, Property>,
}

impl PropertyMap {
    pub fn get(&self, key: &str) -> Option<&Property> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Property> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace; replacing keeps the original position
    pub fn insert(&mut self, key: &str, property: Property) {
        if self.entries.insert(key.to_string(), property).is_none() {
            self.order.push(key.to_string());
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }

    /// Keys in property order: integer keys ascending, then the rest in
    /// insertion order
    pub fn keys(&self) -> Vec<String> {
        let mut integers: Vec<(usize, &String)> = self
            .order
            .iter()
            .filter_map(|k| array_index(k).map(|i| (i, k)))
            .collect();
        integers.sort_by_key(|(i, _)| *i);
        integers
            .into_iter()
            .map(|(_, k)| k.clone())
            .chain(self.order.iter().filter(|k| array_index(k).is_none()).cloned())
            .collect()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.entries.values_mut()
    }
}

/// A user-defined function together with its captured scope
#[derive(Clone)]
pub struct Closure {
    pub function: Rc<ast::Function>,
    pub scope: ScopeRef,
    /// Object whose prototype `super` refers to
    pub home_object: Option<ObjectRef>,
    /// Set on class constructors
    pub class: Option<Rc<ClassInfo>>,
}

/// Construction data for a class constructor
pub struct ClassInfo {
    /// The `extends` target, if any
    pub parent: Option<Value>,
    /// Instance fields in declaration order
    pub fields: Vec<FieldDefinition>,
    /// Scope field initializers are evaluated in
    pub scope: ScopeRef,
    /// The class prototype, home object of the initializers
    pub prototype: ObjectRef,
}

/// An instance field initializer
pub struct FieldDefinition {
    pub key: String,
    pub value: Option<ast::Expression>,
}

/// A function implemented in Rust
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    pub call: NativeFn,
    /// Behaviour under `new`; `None` means not a constructor
    pub construct: Option<NativeFn>,
}

/// Compiled regular expression plus its JavaScript source and flags
pub struct RegExpData {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

impl RegExpData {
    pub fn global(&self) -> bool {
        self.flags.contains('g')
    }
}

/// Object kind
pub enum ObjectKind {
    /// Ordinary object
    Ordinary,
    /// Array object
    Array(Vec<Value>),
    /// Function defined in learner code
    Function(Closure),
    /// Native function
    Native(NativeFunction),
    /// Error object (`name` and `message` are ordinary properties)
    Error,
    /// Promise object
    Promise(PromiseRef),
    /// RegExp object
    RegExp(Box<RegExpData>),
    /// Map object, entries in insertion order
    Map(Vec<(Value, Value)>),
    /// Set object, values in insertion order
    Set(Vec<Value>),
}

/// JavaScript object
pub struct Object {
    /// Object kind
    pub kind: ObjectKind,
    /// Own properties
    pub properties: PropertyMap,
    /// Prototype
    pub prototype: Option<ObjectRef>,
    /// Cleared by `Object.freeze`
    pub extensible: bool,
}

impl Object {
    /// Create an object of the given kind
    pub fn with_prototype(kind: ObjectKind, prototype: Option<ObjectRef>) -> Self {
        Self {
            kind,
            properties: PropertyMap::default(),
            prototype,
            extensible: true,
        }
    }

    /// Wrap into a shared handle
    pub fn into_ref(self) -> ObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_) | ObjectKind::Native(_))
    }

    /// Builtin tag used by `Object.prototype.toString` and debugging
    pub fn class_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) | ObjectKind::Native(_) => "Function",
            ObjectKind::Error => "Error",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
        }
    }

    /// Own property lookup without walking the prototype chain
    pub fn get_own(&self, key: &str) -> Option<PropertySlot> {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return Some(PropertySlot::Data(Value::Number(elements.len() as f64)));
            }
            if let Some(index) = array_index(key) {
                return elements.get(index).cloned().map(PropertySlot::Data);
            }
        }
        self.properties.get(key).map(|p| p.slot.clone())
    }

    pub fn has_own(&self, key: &str) -> bool {
        if let ObjectKind::Array(elements) = &self.kind {
            if key == "length" {
                return true;
            }
            if let Some(index) = array_index(key) {
                return index < elements.len();
            }
        }
        self.properties.contains(key)
    }

    /// Own keys in property order (array indices first)
    pub fn own_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let ObjectKind::Array(elements) = &self.kind {
            keys.extend((0..elements.len()).map(|i| i.to_string()));
        }
        keys.extend(self.properties.keys());
        keys
    }

    /// Own enumerable keys, as `Object.keys` reports them
    pub fn own_enumerable_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let ObjectKind::Array(elements) = &self.kind {
            keys.extend((0..elements.len()).map(|i| i.to_string()));
        }
        keys.extend(self.properties.keys().into_iter().filter(|k| {
            self.properties
                .get(k)
                .is_some_and(|p| p.flags.contains(PropertyFlags::ENUMERABLE))
        }));
        keys
    }

    /// Define (or redefine) a data property
    pub fn define(&mut self, key: &str, value: Value, flags: PropertyFlags) {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = array_index(key) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return;
            }
        }
        self.properties.insert(
            key,
            Property {
                slot: PropertySlot::Data(value),
                flags,
            },
        );
    }

    /// Define a getter and/or setter, merging with an existing accessor
    pub fn define_accessor(&mut self, key: &str, get: Option<Value>, set: Option<Value>) {
        let (old_get, old_set) = match self.properties.get(key).map(|p| &p.slot) {
            Some(PropertySlot::Accessor { get, set }) => (get.clone(), set.clone()),
            _ => (None, None),
        };
        self.properties.insert(
            key,
            Property {
                slot: PropertySlot::Accessor {
                    get: get.or(old_get),
                    set: set.or(old_set),
                },
                flags: PropertyFlags::HIDDEN,
            },
        );
    }

    /// Write an own data property the way plain assignment does. Returns
    /// `false` when the write is refused (frozen object or read-only
    /// property).
    pub fn set_own(&mut self, key: &str, value: Value) -> bool {
        let extensible = self.extensible;
        if let ObjectKind::Array(elements) = &mut self.kind {
            if !extensible {
                return false;
            }
            if key == "length" {
                let len = value.to_number();
                if len >= 0.0 && len.fract() == 0.0 {
                    elements.resize(len as usize, Value::Undefined);
                    return true;
                }
                return false;
            }
            if let Some(index) = array_index(key) {
                if index >= elements.len() {
                    elements.resize(index + 1, Value::Undefined);
                }
                elements[index] = value;
                return true;
            }
        }
        match self.properties.get_mut(key) {
            Some(property) => {
                if !property.flags.contains(PropertyFlags::WRITABLE) {
                    return false;
                }
                property.slot = PropertySlot::Data(value);
                true
            }
            None if extensible => {
                self.properties.insert(
                    key,
                    Property {
                        slot: PropertySlot::Data(value),
                        flags: PropertyFlags::DEFAULT,
                    },
                );
                true
            }
            None => false,
        }
    }

    /// The `delete` operator on an own property
    pub fn delete(&mut self, key: &str) -> bool {
        if !self.extensible {
            return !self.has_own(key);
        }
        if let ObjectKind::Array(elements) = &mut self.kind {
            if let Some(index) = array_index(key) {
                if index < elements.len() {
                    elements[index] = Value::Undefined;
                }
                return true;
            }
        }
        match self.properties.get(key) {
            Some(p) if !p.flags.contains(PropertyFlags::CONFIGURABLE) => false,
            _ => {
                self.properties.remove(key);
                true
            }
        }
    }

    /// `Object.freeze`
    pub fn freeze(&mut self) {
        self.extensible = false;
        for property in self.properties.iter_mut() {
            property
                .flags
                .remove(PropertyFlags::WRITABLE | PropertyFlags::CONFIGURABLE);
        }
    }

    pub fn is_frozen(&self) -> bool {
        !self.extensible
    }

    /// Elements of an array object
    pub fn array_elements(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(elements) => Some(elements),
            _ => None,
        }
    }

    /// Move out every object or scope this object keeps alive
    fn detach(&mut self, pending: &mut Pending) {
        for property in std::mem::take(&mut self.properties).entries.into_values() {
            match property.slot {
                PropertySlot::Data(value) => pending.value(value),
                PropertySlot::Accessor { get, set } => {
                    get.into_iter().chain(set).for_each(|v| pending.value(v))
                }
            }
        }
        if let Some(prototype) = self.prototype.take() {
            pending.object(prototype);
        }
        match std::mem::replace(&mut self.kind, ObjectKind::Ordinary) {
            ObjectKind::Array(values) | ObjectKind::Set(values) => {
                values.into_iter().for_each(|v| pending.value(v))
            }
            ObjectKind::Map(entries) => {
                for (key, value) in entries {
                    pending.value(key);
                    pending.value(value);
                }
            }
            ObjectKind::Function(closure) => {
                pending.scope(closure.scope);
                if let Some(home) = closure.home_object {
                    pending.object(home);
                }
                if let Some(class) = closure.class.and_then(|c| Rc::try_unwrap(c).ok()) {
                    if let Some(parent) = class.parent {
                        pending.value(parent);
                    }
                    pending.scope(class.scope);
                    pending.object(class.prototype);
                }
            }
            _ => {}
        }
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let mut pending = Pending::default();
        self.detach(&mut pending);
        pending.release();
    }
}

/// Uniquely owned objects and scopes waiting to be freed.
///
/// Dropping a long chain (`o = { next: o }` in a loop, or nested closures)
/// frees one link per iteration here instead of one native frame per link.
/// Handles that are still shared elsewhere are dropped in place.
#[derive(Default)]
pub(crate) struct Pending {
    objects: Vec<ObjectRef>,
    scopes: Vec<ScopeRef>,
}

impl Pending {
    pub(crate) fn value(&mut self, value: Value) {
        if let Value::Object(obj) = value {
            self.object(obj);
        }
    }

    pub(crate) fn object(&mut self, obj: ObjectRef) {
        if Rc::strong_count(&obj) == 1 {
            self.objects.push(obj);
        }
    }

    pub(crate) fn scope(&mut self, scope: ScopeRef) {
        if Rc::strong_count(&scope) == 1 {
            self.scopes.push(scope);
        }
    }

    pub(crate) fn release(mut self) {
        loop {
            if let Some(obj) = self.objects.pop() {
                if let Ok(cell) = Rc::try_unwrap(obj) {
                    cell.into_inner().detach(&mut self);
                }
            } else if let Some(scope) = self.scopes.pop() {
                if let Ok(cell) = Rc::try_unwrap(scope) {
                    cell.into_inner().detach(&mut self);
                }
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_order() {
        let mut obj = Object::with_prototype(ObjectKind::Ordinary, None);
        obj.define("b", Value::Number(1.0), PropertyFlags::DEFAULT);
        obj.define("2", Value::Number(2.0), PropertyFlags::DEFAULT);
        obj.define("a", Value::Number(3.0), PropertyFlags::DEFAULT);
        obj.define("1", Value::Number(4.0), PropertyFlags::DEFAULT);
        assert_eq!(obj.own_keys(), vec!["1", "2", "b", "a"]);
    }

    #[test]
    fn test_hidden_properties_are_not_enumerable() {
        let mut obj = Object::with_prototype(ObjectKind::Ordinary, None);
        obj.define("visible", Value::Null, PropertyFlags::DEFAULT);
        obj.define("hidden", Value::Null, PropertyFlags::HIDDEN);
        assert_eq!(obj.own_enumerable_keys(), vec!["visible"]);
    }

    #[test]
    fn test_array_length_and_indices() {
        let mut arr = Object::with_prototype(ObjectKind::Array(vec![Value::Number(1.0)]), None);
        assert!(arr.set_own("3", Value::Number(4.0)));
        assert!(matches!(arr.get_own("length"), Some(PropertySlot::Data(Value::Number(n))) if n == 4.0));
        assert!(arr.set_own("length", Value::Number(1.0)));
        assert_eq!(arr.array_elements().map(Vec::len), Some(1));
    }

    #[test]
    fn test_freeze_refuses_writes() {
        let mut obj = Object::with_prototype(ObjectKind::Ordinary, None);
        obj.set_own("x", Value::Number(1.0));
        obj.freeze();
        assert!(!obj.set_own("x", Value::Number(2.0)));
        assert!(!obj.set_own("y", Value::Number(2.0)));
        assert!(!obj.delete("x"));
        assert!(obj.is_frozen());
    }
}
