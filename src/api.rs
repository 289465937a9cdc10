//! Public API for sldlog - SLD resolution over a clause database.
//!
//! This module provides the facade client rule sets build against:
//! declaring variables and predicates, adding clauses, registering native
//! callback predicates, and iterating query results.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::db::{Body, BodyItem, Clause, PredId, PredStore};
use crate::solve::{CallbackEnv, Solutions};
use crate::symbol::SymbolStore;
use crate::term::{Atom, Term, TermId, TermStore, VarStore};

/// A defect in client rule-set construction. These abort program setup;
/// they are never produced during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A clause head must be a predicate application.
    HeadNotGoal,
    /// A clause body element must be a goal term or the cut marker.
    BodyGoalExpected { index: usize },
    /// A query element must be a goal term or the cut marker.
    QueryGoalExpected { index: usize },
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramError::HeadNotGoal => {
                write!(f, "clause head is not a predicate application")
            }
            ProgramError::BodyGoalExpected { index } => {
                write!(f, "clause body element {} is not a goal", index)
            }
            ProgramError::QueryGoalExpected { index } => {
                write!(f, "query element {} is not a goal", index)
            }
        }
    }
}

impl std::error::Error for ProgramError {}

/// The engine owns every store a program needs:
///
/// - Symbol interning (names and text constants)
/// - Term hashconsing
/// - Variable identities
/// - Predicates and their clause lists
///
/// Construction takes `&mut self`; term building and query execution take
/// `&self`, so the database is immutable while a resolution is in flight.
pub struct Engine {
    /// Symbol store for interning names.
    symbols: SymbolStore,
    /// Term store for hashconsing terms.
    terms: TermStore,
    /// Variable identities and display names.
    vars: VarStore,
    /// Predicates and their clauses.
    preds: PredStore,
}

impl Engine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            symbols: SymbolStore::new(),
            terms: TermStore::new(),
            vars: VarStore::new(),
            preds: PredStore::new(),
        }
    }

    /// Get a reference to the symbol store.
    pub fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    /// Get a reference to the term store.
    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    /// Mint a fresh variable term. The name is a display label only; every
    /// call produces a distinct variable.
    pub fn var(&mut self, name: &str) -> TermId {
        let name = self.symbols.intern(name);
        let var = self.vars.fresh(name);
        self.terms.var(var)
    }

    /// Register a fresh predicate. The name is display-only; every call
    /// produces a distinct relation.
    pub fn pred(&mut self, name: &str) -> PredId {
        self.preds.fresh(self.symbols.intern(name))
    }

    /// Create a text constant.
    pub fn sym(&self, text: &str) -> TermId {
        self.terms.sym(self.symbols.intern(text))
    }

    /// Create an integer constant.
    pub fn int(&self, value: i64) -> TermId {
        self.terms.int(value)
    }

    /// Create a boolean constant.
    pub fn boolean(&self, value: bool) -> TermId {
        self.terms.boolean(value)
    }

    /// Create a tuple term.
    pub fn tuple(&self, elems: &[TermId]) -> TermId {
        self.terms.tuple(elems.iter().copied().collect())
    }

    /// Create a cons pair, the 2-tuple encoding of list structure.
    pub fn pair(&self, head: TermId, tail: TermId) -> TermId {
        self.terms.pair(head, tail)
    }

    /// Apply a predicate to an argument tuple, producing a goal term.
    pub fn goal(&self, pred: PredId, args: &[TermId]) -> TermId {
        self.terms.goal(pred, args.iter().copied().collect())
    }

    /// Append a clause `head :- body` to the head's predicate. An empty
    /// body defines a fact. Clause order is insertion order.
    pub fn define(&mut self, head: TermId, body: &[BodyItem]) -> Result<(), ProgramError> {
        let (pred, _) = self.terms.as_goal(head).ok_or(ProgramError::HeadNotGoal)?;
        for (index, item) in body.iter().enumerate() {
            if let BodyItem::Call(goal) = item {
                if self.terms.as_goal(*goal).is_none() {
                    return Err(ProgramError::BodyGoalExpected { index });
                }
            }
        }
        self.preds.add_clause(
            pred,
            Clause {
                head,
                body: Body::Goals(body.into()),
            },
        );
        Ok(())
    }

    /// Append a native-callback clause to the head's predicate. When the
    /// head unifies, `callback` runs with a view of the clause bindings and
    /// returns success or failure.
    pub fn define_native<F>(&mut self, head: TermId, callback: F) -> Result<(), ProgramError>
    where
        F: Fn(&mut CallbackEnv<'_>) -> bool + 'static,
    {
        let (pred, _) = self.terms.as_goal(head).ok_or(ProgramError::HeadNotGoal)?;
        self.preds.add_clause(
            pred,
            Clause {
                head,
                body: Body::Native(Rc::new(callback)),
            },
        );
        Ok(())
    }

    /// Start resolving a goal sequence, returning a lazy enumerator of the
    /// solutions. Each call starts an independent run with its own fresh
    /// top-level environment.
    pub fn resolve(&self, goals: &[BodyItem]) -> Result<Solutions<'_>, ProgramError> {
        for (index, item) in goals.iter().enumerate() {
            if let BodyItem::Call(goal) = item {
                if self.terms.as_goal(*goal).is_none() {
                    return Err(ProgramError::QueryGoalExpected { index });
                }
            }
        }
        Ok(Solutions::new(self, goals.into()))
    }

    /// Convenience driver: enumerate every solution, printing each behind
    /// its 1-based index, and print index 0 with the unresolved goals when
    /// there is none. Returns the solution count.
    pub fn query(&self, goals: &[BodyItem]) -> Result<usize, ProgramError> {
        let shown = self.query_display_term(goals);
        let mut solutions = self.resolve(goals)?;
        let mut count = 0usize;
        while let Some(solution) = solutions.next_solution() {
            count += 1;
            println!("{} {}", count, self.show(solution.get(shown)));
        }
        if count == 0 {
            println!("0 {}", self.show(shown));
        }
        Ok(count)
    }

    /// The term the query driver prints: the single goal, or a tuple of
    /// the sequence with cut markers shown as `!`.
    fn query_display_term(&self, goals: &[BodyItem]) -> TermId {
        let items: SmallVec<[TermId; 4]> = goals
            .iter()
            .map(|item| match item {
                BodyItem::Call(goal) => *goal,
                BodyItem::Cut => self.sym("!"),
            })
            .collect();
        if items.len() == 1 {
            items[0]
        } else {
            self.terms.tuple(items)
        }
    }

    /// The clauses of a predicate, in insertion order.
    pub fn clauses(&self, pred: PredId) -> &[Clause] {
        self.preds.clauses(pred)
    }

    /// The display name of a predicate.
    pub fn pred_name(&self, pred: PredId) -> &str {
        self.preds
            .name(pred)
            .and_then(|name| self.symbols.resolve(name))
            .unwrap_or("?")
    }

    /// Render a term for display.
    pub fn show(&self, term: TermId) -> TermDisplay<'_> {
        TermDisplay { engine: self, term }
    }

    fn fmt_term(&self, term: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.terms.resolve(term) {
            None => write!(f, "#{}", term.raw()),
            Some(Term::Atom(Atom::Sym(name))) => {
                f.write_str(self.symbols.resolve(name).unwrap_or("?"))
            }
            Some(Term::Atom(Atom::Int(n))) => write!(f, "{}", n),
            Some(Term::Atom(Atom::Bool(b))) => {
                f.write_str(if b { "true" } else { "false" })
            }
            Some(Term::Var(var)) => {
                match self.vars.name(var).and_then(|n| self.symbols.resolve(n)) {
                    Some(name) => f.write_str(name),
                    None => write!(f, "_{}", var.raw()),
                }
            }
            Some(Term::Tuple(elems)) => {
                f.write_str("(")?;
                for (i, &elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.fmt_term(elem, f)?;
                }
                f.write_str(")")
            }
            Some(Term::Goal(pred, args)) => {
                f.write_str(self.pred_name(pred))?;
                f.write_str("(")?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    self.fmt_term(arg, f)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Displays a term with its names resolved through the engine's stores.
pub struct TermDisplay<'a> {
    engine: &'a Engine,
    term: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.engine.fmt_term(self.term, f)
    }
}

#[cfg(test)]
#[path = "tests/api.rs"]
mod tests;
