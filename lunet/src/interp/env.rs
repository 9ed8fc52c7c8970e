//! Environment for variable bindings

use super::{MultiValue, Value};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared reference to an environment
pub type EnvRef = Rc<RefCell<Environment>>;

/// Name under which each interpreted call sees its caller's thread-local
/// environment
pub const CONTEXT_NAME: &str = "_CTX";

/// One lexical scope
#[derive(Debug, Default)]
pub struct Environment {
    /// Variable bindings in this scope, in insertion order
    variables: IndexMap<String, Value>,
    /// Parent environment for lexical scoping
    parent: Option<EnvRef>,
    /// Extra call arguments, present on function scopes only
    varargs: Option<MultiValue>,
}

impl Environment {
    /// Create a new global environment
    pub fn new() -> Self {
        Environment::default()
    }

    /// Create a new environment with a parent
    pub fn with_parent(parent: EnvRef) -> Self {
        Environment {
            parent: Some(parent),
            ..Environment::default()
        }
    }

    /// Wrap in Rc<RefCell<>>
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Fresh root scope
    pub fn global() -> EnvRef {
        Environment::new().into_ref()
    }

    /// Fresh scope nested in `parent`
    pub fn child(parent: &EnvRef) -> EnvRef {
        child_env(parent)
    }

    /// Bind in this scope, shadowing any outer binding
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Assign to the nearest scope that already binds `name`, or to the
    /// outermost scope when none does.
    pub fn set(&mut self, name: &str, value: Value) {
        if self.variables.contains_key(name) {
            self.variables.insert(name.to_string(), value);
            return;
        }
        match &self.parent {
            Some(parent) => parent.borrow_mut().set(name, value),
            None => {
                self.variables.insert(name.to_string(), value);
            }
        }
    }

    /// Look up a variable in the scope chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            Some(value.clone())
        } else if let Some(parent) = &self.parent {
            parent.borrow().get(name)
        } else {
            None
        }
    }

    /// Check if a variable exists in the scope chain
    pub fn has(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.parent.as_ref().is_some_and(|p| p.borrow().has(name))
    }

    /// True when `name` resolves to the root scope or is unbound.
    pub fn is_global(&self, name: &str) -> bool {
        match &self.parent {
            None => true,
            Some(parent) => !self.variables.contains_key(name) && parent.borrow().is_global(name),
        }
    }

    /// Every name bound anywhere in the chain, innermost scope first.
    pub fn keys(&self) -> Vec<String> {
        let mut names: IndexSet<String> = self.variables.keys().cloned().collect();
        if let Some(parent) = &self.parent {
            names.extend(parent.borrow().keys());
        }
        names.into_iter().collect()
    }

    pub fn set_varargs(&mut self, values: MultiValue) {
        self.varargs = Some(values);
    }

    /// Extra arguments of the nearest enclosing function scope
    pub fn varargs(&self) -> MultiValue {
        match (&self.varargs, &self.parent) {
            (Some(values), _) => values.clone(),
            (None, Some(parent)) => parent.borrow().varargs(),
            (None, None) => MultiValue::empty(),
        }
    }

    pub fn parent(&self) -> Option<&EnvRef> {
        self.parent.as_ref()
    }
}

/// Create a child environment from a parent reference
pub fn child_env(parent: &EnvRef) -> EnvRef {
    Environment::with_parent(Rc::clone(parent)).into_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_set_local_and_get() {
        let mut env = Environment::new();
        env.set_local("x", num(42.0));
        assert_eq!(env.get("x"), Some(num(42.0)));
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn test_scope_chain() {
        let parent = Environment::new().into_ref();
        parent.borrow_mut().set_local("x", num(1.0));

        let child = child_env(&parent);
        child.borrow_mut().set_local("y", num(2.0));

        assert_eq!(child.borrow().get("x"), Some(num(1.0)));
        assert_eq!(child.borrow().get("y"), Some(num(2.0)));
        assert_eq!(parent.borrow().get("y"), None);
    }

    #[test]
    fn test_shadowing_does_not_leak_outward() {
        let outer = Environment::new().into_ref();
        outer.borrow_mut().set_local("x", num(1.0));
        {
            let inner = child_env(&outer);
            inner.borrow_mut().set_local("x", num(2.0));
            assert_eq!(inner.borrow().get("x"), Some(num(2.0)));
        }
        assert_eq!(outer.borrow().get("x"), Some(num(1.0)));
    }

    #[test]
    fn test_set_updates_nearest_binding() {
        let global = Environment::new().into_ref();
        global.borrow_mut().set_local("x", num(1.0));
        let middle = child_env(&global);
        middle.borrow_mut().set_local("x", num(2.0));
        let inner = child_env(&middle);

        inner.borrow_mut().set("x", num(99.0));

        assert_eq!(middle.borrow().get("x"), Some(num(99.0)));
        assert_eq!(global.borrow().get("x"), Some(num(1.0)));
    }

    #[test]
    fn test_set_unbound_goes_to_root() {
        let global = Environment::new().into_ref();
        let inner = child_env(&child_env(&global));
        inner.borrow_mut().set("fresh", num(7.0));

        assert_eq!(global.borrow().get("fresh"), Some(num(7.0)));
        assert!(!inner.borrow().variables.contains_key("fresh"));
    }

    #[test]
    fn test_has_walks_chain() {
        let parent = Environment::new().into_ref();
        parent.borrow_mut().set_local("x", num(1.0));
        let child = child_env(&parent);
        assert!(child.borrow().has("x"));
        assert!(!child.borrow().has("y"));
    }

    #[test]
    fn test_keys_union_in_order() {
        let parent = Environment::new().into_ref();
        parent.borrow_mut().set_local("b", num(1.0));
        parent.borrow_mut().set_local("a", num(1.0));
        let child = child_env(&parent);
        child.borrow_mut().set_local("z", num(1.0));
        child.borrow_mut().set_local("a", num(2.0));

        assert_eq!(child.borrow().keys(), vec!["z", "a", "b"]);
    }

    #[test]
    fn test_is_global() {
        let global = Environment::global();
        global.borrow_mut().set_local("g", num(1.0));
        let local = Environment::child(&global);
        local.borrow_mut().set_local("l", num(1.0));
        assert!(local.borrow().is_global("g"));
        assert!(local.borrow().is_global("unbound"));
        assert!(!local.borrow().is_global("l"));
    }

    #[test]
    fn test_varargs_from_function_scope() {
        let func = Environment::new().into_ref();
        func.borrow_mut()
            .set_varargs(MultiValue::pair(1.0, 2.0));
        let block = child_env(&func);
        assert_eq!(block.borrow().varargs().len(), 2);
        assert!(Environment::new().varargs().is_empty());
    }

    #[test]
    fn test_shared_environment_observes_mutation() {
        let shared = Environment::new().into_ref();
        let a = child_env(&shared);
        let b = child_env(&shared);
        shared.borrow_mut().set_local("count", num(0.0));

        a.borrow_mut().set("count", num(1.0));
        assert_eq!(b.borrow().get("count"), Some(num(1.0)));
    }
}
