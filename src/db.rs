use crate::solve::CallbackEnv;
use crate::symbol::NameId;
use crate::term::TermId;
use std::rc::Rc;

/// Unique identifier for a predicate.
///
/// Predicate equality is identity: two predicates with the same name are
/// still distinct relations. The name is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PredId(u32);

impl PredId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// A host-supplied predicate implementation, invoked in place of clause-body
/// resolution once the clause head has unified. Returns success or failure.
pub type NativeFn = Rc<dyn Fn(&mut CallbackEnv<'_>) -> bool>;

/// One element of a clause body: a goal to call, or the cut marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyItem {
    /// Call a goal term.
    Call(TermId),
    /// Commit to the clause choices made so far in this body's frame.
    Cut,
}

impl From<TermId> for BodyItem {
    fn from(goal: TermId) -> Self {
        BodyItem::Call(goal)
    }
}

/// The cut marker, for use in clause bodies and queries.
pub const CUT: BodyItem = BodyItem::Cut;

/// A clause body: an ordered goal sequence (empty for facts) or a native
/// callback.
#[derive(Clone)]
pub enum Body {
    /// Ordered sequence of goals and cut markers.
    Goals(Rc<[BodyItem]>),
    /// Host-supplied implementation.
    Native(NativeFn),
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Goals(items) => f.debug_tuple("Goals").field(items).finish(),
            Body::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A clause `head :- body`, immutable once added to its predicate.
#[derive(Debug, Clone)]
pub struct Clause {
    /// The head, always a Goal term of the owning predicate.
    pub head: TermId,
    pub body: Body,
}

#[derive(Debug)]
struct PredEntry {
    name: NameId,
    clauses: Vec<Clause>,
}

/// Storage for predicates and their clause lists.
///
/// Clause lists are consulted in insertion order; that order is both the
/// solution enumeration order and the scope cut prunes over.
#[derive(Debug, Default)]
pub struct PredStore {
    preds: Vec<PredEntry>,
}

impl PredStore {
    /// Create a new empty predicate store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new predicate and return its PredId.
    /// Every call mints a distinct predicate, regardless of the name.
    pub fn fresh(&mut self, name: NameId) -> PredId {
        let id = PredId(self.preds.len() as u32);
        self.preds.push(PredEntry {
            name,
            clauses: Vec::new(),
        });
        id
    }

    /// Get the display name of a predicate.
    pub fn name(&self, pred: PredId) -> Option<NameId> {
        self.preds.get(pred.0 as usize).map(|p| p.name)
    }

    /// Append a clause to a predicate's list.
    pub fn add_clause(&mut self, pred: PredId, clause: Clause) {
        self.preds[pred.0 as usize].clauses.push(clause);
    }

    /// The clauses of a predicate, in insertion order.
    pub fn clauses(&self, pred: PredId) -> &[Clause] {
        &self.preds[pred.0 as usize].clauses
    }

    /// Number of predicates registered.
    pub fn len(&self) -> usize {
        self.preds.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }
}
