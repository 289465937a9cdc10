use crate::env::{EnvArena, EnvId};
use crate::term::VarId;

/// Undo log of variable bindings, replayed in reverse to roll back a failed
/// or exhausted clause attempt.
///
/// One trail serves a whole query; each clause attempt records a mark and
/// later undoes down to it. Attempt scopes nest strictly LIFO, so a single
/// log with marks is equivalent to a trail per attempt.
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<(VarId, EnvId)>,
}

impl Trail {
    /// Create a new empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current position, to be passed to `undo_to` later.
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// Record that `var` was bound in `env`.
    pub fn push(&mut self, var: VarId, env: EnvId) {
        self.entries.push((var, env));
    }

    /// Undo every binding recorded since `mark`, most recent first.
    pub fn undo_to(&mut self, mark: usize, envs: &mut EnvArena) {
        while self.entries.len() > mark {
            let (var, env) = self.entries.pop().expect("trail shrank below mark");
            envs.unbind(env, var);
        }
    }

    /// Number of entries currently recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
