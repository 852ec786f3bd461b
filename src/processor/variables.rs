//! Variable scopes.
//!
//! A scope maps Variable neuron ids to shared value lists. A saved call
//! pushes a scope that shares the enclosing scope's lists by `Arc`, except
//! for variables the caller explicitly passes, which get fresh empty lists.
//! Writing through a shared binding is visible in every scope holding the
//! same list; a fresh binding shadows without disturbing the caller.

use crate::entity::NeuronId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Binding = Arc<RwLock<Vec<NeuronId>>>;

/// One scope: variable id to shared value list.
#[derive(Default)]
struct VariableScope {
    bindings: HashMap<NeuronId, Binding>,
}

/// Stack of variable scopes. There is always at least the base scope.
pub struct VariableStack {
    scopes: Vec<VariableScope>,
}

impl VariableStack {
    pub fn new() -> Self {
        Self {
            scopes: vec![VariableScope::default()],
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Push a scope sharing the current scope's bindings, with fresh empty
    /// lists for `fresh` variables.
    pub fn push_shared(&mut self, fresh: &[NeuronId]) {
        let mut scope = VariableScope {
            bindings: self
                .scopes
                .last()
                .map(|s| s.bindings.clone())
                .unwrap_or_default(),
        };
        for &var in fresh {
            scope
                .bindings
                .insert(var, Arc::new(RwLock::new(Vec::new())));
        }
        self.scopes.push(scope);
    }

    /// Pop the current scope. The base scope is never popped.
    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        } else {
            tracing::error!("attempt to pop the base variable scope");
        }
    }

    /// Full current binding of a variable, empty when unbound.
    pub fn get(&self, var: NeuronId) -> Vec<NeuronId> {
        match self.scopes.last().and_then(|s| s.bindings.get(&var)) {
            Some(list) => list.read().clone(),
            None => Vec::new(),
        }
    }

    /// First value of the current binding.
    pub fn head(&self, var: NeuronId) -> Option<NeuronId> {
        self.scopes
            .last()
            .and_then(|s| s.bindings.get(&var))
            .and_then(|list| list.read().first().copied())
    }

    pub fn is_bound(&self, var: NeuronId) -> bool {
        self.scopes
            .last()
            .map(|s| s.bindings.contains_key(&var))
            .unwrap_or(false)
    }

    /// Bind a variable in the current scope. An existing binding is written
    /// through its shared list so every scope holding it observes the new
    /// values; otherwise a new list is created here.
    pub fn set(&mut self, var: NeuronId, values: Vec<NeuronId>) {
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => return,
        };
        match scope.bindings.get(&var) {
            Some(list) => *list.write() = values,
            None => {
                scope
                    .bindings
                    .insert(var, Arc::new(RwLock::new(values)));
            }
        }
    }
}

impl Default for VariableStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NeuronId {
        NeuronId(n)
    }

    #[test]
    fn shared_binding_writes_through_to_outer_scope() {
        let mut vars = VariableStack::new();
        vars.set(id(1), vec![id(10)]);
        vars.push_shared(&[]);
        vars.set(id(1), vec![id(20)]);
        vars.pop();
        assert_eq!(vars.head(id(1)), Some(id(20)));
    }

    #[test]
    fn fresh_binding_shadows_without_leaking() {
        let mut vars = VariableStack::new();
        vars.set(id(1), vec![id(10)]);
        vars.push_shared(&[id(1)]);
        assert_eq!(vars.head(id(1)), None);
        vars.set(id(1), vec![id(20)]);
        assert_eq!(vars.head(id(1)), Some(id(20)));
        vars.pop();
        assert_eq!(vars.head(id(1)), Some(id(10)));
    }

    #[test]
    fn base_scope_survives_excess_pops() {
        let mut vars = VariableStack::new();
        vars.pop();
        vars.set(id(1), vec![id(10)]);
        assert_eq!(vars.head(id(1)), Some(id(10)));
    }
}
