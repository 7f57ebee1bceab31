//! Variable storage keyed by Symbol ID.
//!
//! The global scope lives for the whole run. Each user call gets a fresh
//! local scope whose only parent is the global scope; it is dropped when
//! the call returns.

use std::collections::HashMap;

use night_common::{SymbolId, Value};

/// One level of variable storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    vars: HashMap<SymbolId, Value>,
}

impl Scope {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `id` with a default of integer zero unless it already exists.
    ///
    /// Hosts use this before [`run`](crate::run) to make `id` a global:
    /// stores from inside user functions then reach it instead of creating
    /// a local.
    pub fn declare(&mut self, id: SymbolId) {
        self.vars.entry(id).or_insert(Value::Int(0));
    }

    /// Bind `id` to `value`, replacing any previous value.
    pub fn set(&mut self, id: SymbolId, value: Value) {
        self.vars.insert(id, value);
    }

    /// Value stored under `id`.
    pub fn get(&self, id: SymbolId) -> Option<&Value> {
        self.vars.get(&id)
    }

    /// Mutable access to the value stored under `id`.
    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Value> {
        self.vars.get_mut(&id)
    }

    /// Returns true if `id` is bound here.
    pub fn contains(&self, id: SymbolId) -> bool {
        self.vars.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// The scopes visible to one running frame: the global scope and, inside
/// a user function, that call's locals.
#[derive(Debug)]
pub struct Scopes<'s> {
    global: &'s mut Scope,
    local: Option<&'s mut Scope>,
}

impl<'s> Scopes<'s> {
    /// Top-level view with no locals.
    pub fn global(global: &'s mut Scope) -> Self {
        Self {
            global,
            local: None,
        }
    }

    /// View for a user call: `local` is searched before `global`.
    pub fn with_local(global: &'s mut Scope, local: &'s mut Scope) -> Self {
        Self {
            global,
            local: Some(local),
        }
    }

    /// Look `id` up in the locals, then the globals.
    pub fn load(&self, id: SymbolId) -> Option<&Value> {
        self.local
            .as_deref()
            .and_then(|local| local.get(id))
            .or_else(|| self.global.get(id))
    }

    /// Mutable lookup with the same search order as [`Scopes::load`].
    pub fn load_mut(&mut self, id: SymbolId) -> Option<&mut Value> {
        let in_local = self.local.as_deref().is_some_and(|local| local.contains(id));
        if in_local {
            self.local.as_deref_mut().and_then(|local| local.get_mut(id))
        } else {
            self.global.get_mut(id)
        }
    }

    /// Write `value` under `id`.
    ///
    /// An ID already present in the global scope is written there, so a
    /// function body mutates globals in place. Anything else goes to the
    /// innermost scope.
    pub fn store(&mut self, id: SymbolId, value: Value) {
        if self.global.contains(id) {
            self.global.set(id, value);
            return;
        }
        match self.local.as_deref_mut() {
            Some(local) => local.set(id, value),
            None => self.global.set(id, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_keeps_existing_value() {
        let mut scope = Scope::new();
        scope.declare(64);
        assert_eq!(scope.get(64), Some(&Value::Int(0)));
        scope.set(64, Value::from("x"));
        scope.declare(64);
        assert_eq!(scope.get(64), Some(&Value::from("x")));
    }

    #[test]
    fn load_searches_local_then_global() {
        let mut global = Scope::new();
        global.set(64, Value::Int(1));
        let mut local = Scope::new();
        local.set(65, Value::Int(2));

        let scopes = Scopes::with_local(&mut global, &mut local);
        assert_eq!(scopes.load(64), Some(&Value::Int(1)));
        assert_eq!(scopes.load(65), Some(&Value::Int(2)));
        assert_eq!(scopes.load(66), None);
    }

    #[test]
    fn store_writes_through_to_existing_global() {
        let mut global = Scope::new();
        global.set(64, Value::Int(1));
        let mut local = Scope::new();
        {
            let mut scopes = Scopes::with_local(&mut global, &mut local);
            scopes.store(64, Value::Int(10));
            scopes.store(70, Value::Int(20));
        }
        assert_eq!(global.get(64), Some(&Value::Int(10)));
        assert!(!global.contains(70));
        assert_eq!(local.get(70), Some(&Value::Int(20)));
    }

    #[test]
    fn store_without_locals_goes_global() {
        let mut global = Scope::new();
        Scopes::global(&mut global).store(80, Value::UInt(3));
        assert_eq!(global.get(80), Some(&Value::UInt(3)));
    }

    #[test]
    fn load_mut_prefers_local() {
        let mut global = Scope::new();
        global.set(64, Value::Int(1));
        let mut local = Scope::new();
        local.set(64, Value::Int(2));
        {
            let mut scopes = Scopes::with_local(&mut global, &mut local);
            if let Some(v) = scopes.load_mut(64) {
                *v = Value::Int(9);
            }
        }
        assert_eq!(local.get(64), Some(&Value::Int(9)));
        assert_eq!(global.get(64), Some(&Value::Int(1)));
    }
}
