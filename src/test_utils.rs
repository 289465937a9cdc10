use crate::symbol::SymbolStore;
use crate::term::{TermStore, VarStore};

/// The stores unification-level tests build terms with.
pub(crate) fn setup() -> (SymbolStore, TermStore, VarStore) {
    (SymbolStore::new(), TermStore::new(), VarStore::new())
}
