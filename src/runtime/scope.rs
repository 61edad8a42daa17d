//! Lexical environments
//!
//! Every block gets a scope; function scopes additionally carry a
//! [`FunctionFrame`] holding `this`, the home object for `super` and the
//! class being constructed. Arrow functions have no frame, so lookups of
//! `this` walk outwards to the enclosing function.

use super::object::{ClassInfo, ObjectRef, Pending};
use super::value::Value;
use rustc_hash::FxHashMap as HashMap;
use std::cell::RefCell;
use std::rc::Rc;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A variable binding
#[derive(Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
    /// `false` while a `let`/`const`/`class` is in its temporal dead zone
    pub initialized: bool,
}

/// Per-call state of a non-arrow function
#[derive(Clone, Default)]
pub struct FunctionFrame {
    /// `None` in a derived constructor before `super()` returns
    pub this: Option<Value>,
    pub home_object: Option<ObjectRef>,
    /// The constructor `new` was applied to
    pub new_target: Option<Value>,
    /// The class whose constructor is running
    pub class: Option<Rc<ClassInfo>>,
}

/// A lexical scope
#[derive(Default)]
pub struct Scope {
    bindings: HashMap<String, Binding>,
    pub parent: Option<ScopeRef>,
    pub frame: Option<FunctionFrame>,
}

/// Outcome of resolving an identifier
pub enum Lookup {
    Found(Value),
    Uninitialized,
    Missing,
}

/// Outcome of assigning to an identifier
pub enum Assignment {
    Assigned,
    Constant,
    Uninitialized,
    Missing,
}

impl Scope {
    /// The outermost scope; `this` is `undefined` at the top level
    pub fn new_global() -> ScopeRef {
        Self::new_ref(
            None,
            Some(FunctionFrame {
                this: Some(Value::Undefined),
                ..FunctionFrame::default()
            }),
        )
    }

    /// A block scope nested in `parent`
    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Self::new_ref(Some(parent.clone()), None)
    }

    /// A function scope nested in `parent`
    pub fn function(parent: &ScopeRef, frame: Option<FunctionFrame>) -> ScopeRef {
        Self::new_ref(Some(parent.clone()), frame)
    }

    fn new_ref(parent: Option<ScopeRef>, frame: Option<FunctionFrame>) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            bindings: HashMap::default(),
            parent,
            frame,
        }))
    }

    /// Declare an initialized binding, replacing any existing one
    pub fn declare(&mut self, name: &str, value: Value, mutable: bool) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                value,
                mutable,
                initialized: true,
            },
        );
    }

    /// Declare a binding in its temporal dead zone
    pub fn declare_uninitialized(&mut self, name: &str, mutable: bool) {
        self.bindings.insert(
            name.to_string(),
            Binding {
                value: Value::Undefined,
                mutable,
                initialized: false,
            },
        );
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Initialize a hoisted binding (leaving the dead zone)
    pub fn initialize(&mut self, name: &str, value: Value) {
        match self.bindings.get_mut(name) {
            Some(binding) => {
                binding.value = value;
                binding.initialized = true;
            }
            None => self.declare(name, value, true),
        }
    }

    /// Snapshot of all bindings, used for per-iteration loop scopes
    pub fn bindings(&self) -> Vec<(String, Binding)> {
        self.bindings
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn insert_binding(&mut self, name: String, binding: Binding) {
        self.bindings.insert(name, binding);
    }

    /// Move out every object or scope this scope keeps alive
    pub(crate) fn detach(&mut self, pending: &mut Pending) {
        for binding in std::mem::take(&mut self.bindings).into_values() {
            pending.value(binding.value);
        }
        if let Some(parent) = self.parent.take() {
            pending.scope(parent);
        }
        if let Some(frame) = self.frame.take() {
            frame.this.into_iter().chain(frame.new_target).for_each(|v| pending.value(v));
            if let Some(home) = frame.home_object {
                pending.object(home);
            }
        }
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        let mut pending = Pending::default();
        self.detach(&mut pending);
        pending.release();
    }
}

/// Resolve `name` starting at `scope`
pub fn lookup(scope: &ScopeRef, name: &str) -> Lookup {
    let mut current = scope.clone();
    loop {
        let parent = {
            let s = current.borrow();
            if let Some(binding) = s.bindings.get(name) {
                return if binding.initialized {
                    Lookup::Found(binding.value.clone())
                } else {
                    Lookup::Uninitialized
                };
            }
            s.parent.clone()
        };
        match parent {
            Some(p) => current = p,
            None => return Lookup::Missing,
        }
    }
}

/// Assign to the nearest binding of `name`
pub fn assign(scope: &ScopeRef, name: &str, value: Value) -> Assignment {
    let mut current = scope.clone();
    loop {
        let parent = {
            let mut s = current.borrow_mut();
            if let Some(binding) = s.bindings.get_mut(name) {
                if !binding.initialized {
                    return Assignment::Uninitialized;
                }
                if !binding.mutable {
                    return Assignment::Constant;
                }
                binding.value = value;
                return Assignment::Assigned;
            }
            s.parent.clone()
        };
        match parent {
            Some(p) => current = p,
            None => return Assignment::Missing,
        }
    }
}

/// Run `f` on the nearest function frame
pub fn with_frame<R>(scope: &ScopeRef, f: impl FnOnce(&mut FunctionFrame) -> R) -> Option<R> {
    let mut current = scope.clone();
    loop {
        let parent = {
            let mut s = current.borrow_mut();
            if let Some(frame) = s.frame.as_mut() {
                return Some(f(frame));
            }
            s.parent.clone()
        };
        current = parent?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_parents() {
        let global = Scope::new_global();
        global.borrow_mut().declare("x", Value::Number(1.0), true);
        let inner = Scope::child(&global);
        assert!(matches!(lookup(&inner, "x"), Lookup::Found(Value::Number(n)) if n == 1.0));
        assert!(matches!(lookup(&inner, "y"), Lookup::Missing));
    }

    #[test]
    fn test_const_and_tdz() {
        let global = Scope::new_global();
        global.borrow_mut().declare("c", Value::Null, false);
        global.borrow_mut().declare_uninitialized("later", true);
        assert!(matches!(assign(&global, "c", Value::Null), Assignment::Constant));
        assert!(matches!(lookup(&global, "later"), Lookup::Uninitialized));
        global.borrow_mut().initialize("later", Value::Boolean(true));
        assert!(matches!(assign(&global, "later", Value::Null), Assignment::Assigned));
    }

    #[test]
    fn test_frame_lookup_skips_block_scopes() {
        let global = Scope::new_global();
        let block = Scope::child(&global);
        let this = with_frame(&block, |frame| frame.this.clone()).flatten();
        assert!(matches!(this, Some(Value::Undefined)));
    }
}
