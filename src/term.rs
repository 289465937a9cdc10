use crate::db::PredId;
use crate::symbol::NameId;
use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Unique identifier for a term in the term store.
/// TermIds are stable and can be compared for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TermId(u32);

impl TermId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Unique identifier for a logic variable.
///
/// Variable equality is identity: two variables are the same variable iff
/// their VarIds are equal. The display name carries no semantic weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(u32);

impl VarId {
    /// Get the raw u32 value (for debugging/display).
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// An atomic constant, compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Atom {
    /// Interned text symbol.
    Sym(NameId),
    /// Signed integer.
    Int(i64),
    /// Truth value, as bound by comparison callbacks.
    Bool(bool),
}

/// A term is a constant, a variable, an ordered tuple, or a predicate
/// application. Traversals match exhaustively on the variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    /// Atomic constant.
    Atom(Atom),
    /// Logic variable, identified by VarId.
    Var(VarId),
    /// Ordered fixed-arity sequence of terms.
    Tuple(SmallVec<[TermId; 4]>),
    /// Predicate application: relation applied to an argument tuple.
    Goal(PredId, SmallVec<[TermId; 4]>),
}

/// Number of shards for hashcons maps (power of 2 for fast modulo).
const NUM_SHARDS: usize = 16;

/// Thread-safe term store with hashconsing.
///
/// Guarantees:
/// - Structurally equal terms get the same TermId
/// - TermId can be resolved back to the term
/// - All terms (including variables) are hashconsed
///
/// Interning needs only `&self`, so terms can be built while the store is
/// shared with an in-progress resolution.
pub struct TermStore {
    /// Central storage of all terms, indexed by TermId.
    nodes: RwLock<Vec<Term>>,
    /// Sharded hashcons maps for reducing contention.
    shards: [RwLock<HashMap<Term, TermId>>; NUM_SHARDS],
    /// Counter for generating unique TermIds.
    next_id: AtomicU32,
}

impl TermStore {
    /// Create a new empty term store.
    pub fn new() -> Self {
        let shards = std::array::from_fn(|_| RwLock::new(HashMap::new()));
        Self {
            nodes: RwLock::new(Vec::new()),
            shards,
            next_id: AtomicU32::new(0),
        }
    }

    /// Intern a term, returning its TermId.
    /// If the term already exists, returns the existing TermId.
    fn intern(&self, term: Term) -> TermId {
        let shard_idx = Self::shard_index(&term);
        let shard = &self.shards[shard_idx];

        // Fast path: check if term exists (read lock)
        {
            let map = shard.read();
            if let Some(&id) = map.get(&term) {
                return id;
            }
        }

        // Slow path: need to insert (write lock)
        let mut map = shard.write();

        // Double-check after acquiring write lock
        if let Some(&id) = map.get(&term) {
            return id;
        }

        // Allocate new TermId and store term
        let id = TermId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut nodes = self.nodes.write();
            let idx = id.0 as usize;
            if nodes.len() <= idx {
                nodes.resize(idx + 1, Term::Atom(Atom::Int(0))); // placeholder
            }
            nodes[idx] = term.clone();
        }
        map.insert(term, id);
        id
    }

    /// Create a constant term.
    pub fn atom(&self, a: Atom) -> TermId {
        self.intern(Term::Atom(a))
    }

    /// Create an interned-symbol constant.
    pub fn sym(&self, name: NameId) -> TermId {
        self.atom(Atom::Sym(name))
    }

    /// Create an integer constant.
    pub fn int(&self, value: i64) -> TermId {
        self.atom(Atom::Int(value))
    }

    /// Create a boolean constant.
    pub fn boolean(&self, value: bool) -> TermId {
        self.atom(Atom::Bool(value))
    }

    /// Create a variable term.
    /// Hashconsed: the same VarId always returns the same TermId.
    pub fn var(&self, var: VarId) -> TermId {
        self.intern(Term::Var(var))
    }

    /// Create a tuple term.
    pub fn tuple(&self, elems: SmallVec<[TermId; 4]>) -> TermId {
        self.intern(Term::Tuple(elems))
    }

    /// Create a cons pair, the 2-tuple encoding of list structure.
    pub fn pair(&self, head: TermId, tail: TermId) -> TermId {
        self.tuple(smallvec::smallvec![head, tail])
    }

    /// Create a predicate-application term.
    pub fn goal(&self, pred: PredId, args: SmallVec<[TermId; 4]>) -> TermId {
        self.intern(Term::Goal(pred, args))
    }

    /// Resolve a TermId to its term.
    /// Returns None if the TermId is invalid.
    pub fn resolve(&self, id: TermId) -> Option<Term> {
        let nodes = self.nodes.read();
        nodes.get(id.0 as usize).cloned()
    }

    /// Check if a term is a variable, returning its VarId.
    pub fn as_var(&self, id: TermId) -> Option<VarId> {
        match self.resolve(id)? {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Check if a term is a predicate application, returning predicate and
    /// arguments.
    pub fn as_goal(&self, id: TermId) -> Option<(PredId, SmallVec<[TermId; 4]>)> {
        match self.resolve(id)? {
            Term::Goal(pred, args) => Some((pred, args)),
            _ => None,
        }
    }

    /// Check if a term is an integer constant.
    pub fn as_int(&self, id: TermId) -> Option<i64> {
        match self.resolve(id)? {
            Term::Atom(Atom::Int(n)) => Some(n),
            _ => None,
        }
    }

    /// Get the shard index for a term (for hashcons distribution).
    fn shard_index(term: &Term) -> usize {
        let mut hasher = FxHasher::default();
        term.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }
}

impl Default for TermStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage for logic variables.
///
/// A variable is an identity-unique token; every `fresh` call mints a new
/// one regardless of the name, which is kept for display only.
#[derive(Debug, Default)]
pub struct VarStore {
    names: Vec<NameId>,
}

impl VarStore {
    /// Create a new empty variable store.
    pub fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// Mint a fresh variable with the given display name.
    pub fn fresh(&mut self, name: NameId) -> VarId {
        let id = VarId(self.names.len() as u32);
        self.names.push(name);
        id
    }

    /// Get the display name of a variable.
    pub fn name(&self, var: VarId) -> Option<NameId> {
        self.names.get(var.0 as usize).copied()
    }

    /// Number of variables minted so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no variables have been minted.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
