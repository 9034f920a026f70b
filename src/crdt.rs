use crate::op::Operation;

/// State-level merge between replicas.
///
/// Implementations must satisfy:
/// - **Commutativity:** `a.merge(b) == b.merge(a)`
/// - **Associativity:** `a.merge(b.merge(c)) == a.merge(b).merge(c)`
/// - **Idempotency:** `a.merge(a) == a`
///
/// [`Document`](crate::Document) implements it by importing exactly the
/// operations `other` has that `self` is missing.
pub trait Crdt {
    /// Merge another replica's state into this one.
    fn merge(&mut self, other: &Self);
}

/// A container whose state is driven by individual operations.
///
/// For convergence, `apply_op` must commute for causally concurrent
/// operations and applying an operation twice must have no further effect.
/// The caller only hands over operations whose causal past is applied and
/// for which [`can_apply`](OpCrdt::can_apply) returned `true`.
pub trait OpCrdt {
    /// Whether every element `op` refers to is present, so that applying
    /// it cannot fail halfway.
    fn can_apply(&self, op: &Operation) -> bool;

    /// Apply an operation (local or remote) to the state.
    fn apply_op(&mut self, op: &Operation);
}
