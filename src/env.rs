use crate::term::{Term, TermId, TermStore, VarId};
use hashbrown::HashMap;
use smallvec::SmallVec;

/// Unique identifier for an environment in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvId(u32);

impl EnvId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A binding pairs a term with the environment it is meaningful in.
///
/// The term may contain variables local to a different clause
/// instantiation, so it must always be interpreted inside `env`. The EnvId
/// is a back-reference into the arena, never an ownership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub term: TermId,
    pub env: EnvId,
}

/// One environment: the binding table for variables owned by a single
/// resolution frame.
#[derive(Debug, Default)]
struct EnvTable {
    bindings: HashMap<VarId, Binding>,
}

/// Arena of environments, allocated per resolution frame and recycled when
/// a frame's alternatives are exhausted.
#[derive(Debug, Default)]
pub struct EnvArena {
    envs: Vec<EnvTable>,
    free: Vec<EnvId>,
}

impl EnvArena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh (empty) environment.
    pub fn alloc(&mut self) -> EnvId {
        if let Some(id) = self.free.pop() {
            debug_assert!(self.envs[id.0 as usize].bindings.is_empty());
            return id;
        }
        let id = EnvId(self.envs.len() as u32);
        self.envs.push(EnvTable::default());
        id
    }

    /// Clear an environment and return it to the free list.
    pub fn release(&mut self, env: EnvId) {
        self.clear(env);
        self.free.push(env);
    }

    /// Record a binding for `var` in `env`.
    /// The variable must be unbound in that environment.
    pub fn bind(&mut self, env: EnvId, var: VarId, binding: Binding) {
        let table = &mut self.envs[env.0 as usize];
        let prev = table.bindings.insert(var, binding);
        debug_assert!(prev.is_none(), "variable bound twice in one environment");
    }

    /// Look up the binding for `var` in `env`, if any.
    pub fn lookup(&self, env: EnvId, var: VarId) -> Option<Binding> {
        self.envs[env.0 as usize].bindings.get(&var).copied()
    }

    /// Remove one binding. Used only during trail replay.
    pub fn unbind(&mut self, env: EnvId, var: VarId) {
        self.envs[env.0 as usize].bindings.remove(&var);
    }

    /// Remove all bindings of an environment.
    /// Used when a resolution frame is abandoned.
    pub fn clear(&mut self, env: EnvId) {
        self.envs[env.0 as usize].bindings.clear();
    }

    /// Number of bindings currently recorded in `env`.
    pub fn binding_count(&self, env: EnvId) -> usize {
        self.envs[env.0 as usize].bindings.len()
    }

    /// Walk bound variables starting from `term` in `env` until a
    /// non-variable or an unbound variable is reached. Returns the value
    /// together with the environment that actually owns it.
    pub fn dereference(&self, term: TermId, env: EnvId, terms: &TermStore) -> (TermId, EnvId) {
        let mut term = term;
        let mut env = env;
        while let Some(var) = terms.as_var(term) {
            match self.lookup(env, var) {
                Some(binding) => {
                    term = binding.term;
                    env = binding.env;
                }
                None => break,
            }
        }
        (term, env)
    }

    /// Recursively expand every bound variable reachable from `term` in
    /// `env`, through tuples and goal argument lists, into a fully
    /// instantiated term. Unbound variables stay as themselves.
    pub fn resolve_deep(&self, term: TermId, env: EnvId, terms: &TermStore) -> TermId {
        let (term, env) = self.dereference(term, env, terms);
        match terms.resolve(term) {
            Some(Term::Tuple(elems)) => {
                let elems: SmallVec<[TermId; 4]> = elems
                    .iter()
                    .map(|&e| self.resolve_deep(e, env, terms))
                    .collect();
                terms.tuple(elems)
            }
            Some(Term::Goal(pred, args)) => {
                let args: SmallVec<[TermId; 4]> = args
                    .iter()
                    .map(|&a| self.resolve_deep(a, env, terms))
                    .collect();
                terms.goal(pred, args)
            }
            _ => term,
        }
    }

    /// Deterministic view of the binding set of `env`, for tests asserting
    /// backtracking cleanliness.
    pub fn snapshot(&self, env: EnvId) -> Vec<(VarId, Binding)> {
        let mut entries: Vec<(VarId, Binding)> = self.envs[env.0 as usize]
            .bindings
            .iter()
            .map(|(&v, &b)| (v, b))
            .collect();
        entries.sort_by_key(|(v, _)| v.raw());
        entries
    }
}

#[cfg(test)]
#[path = "tests/env.rs"]
mod tests;
