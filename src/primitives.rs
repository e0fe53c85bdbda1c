//! Opaque, hashable value types shared by every component of the search core.
//!
//! `State`, `View`, `Role` and `Move` are intentionally opaque to this crate: they are whatever
//! concrete types an [`Interpreter`](crate::Interpreter) implementation chooses, as long as they
//! are cheap to clone and comparable. `Turn` is the one composite type the core builds itself, out
//! of per-role plays.

use std::collections::BTreeMap;
use std::fmt;

/// One role's contribution to a [`Turn`]: the move it plays this ply.
///
/// A `Play` pairs a role with the move it is taking. `Turn::as_plays` yields these in a
/// deterministic order so that two turns with the same plays compare and hash identically
/// regardless of how they were constructed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Play<R, M> {
    pub role: R,
    pub move_: M,
}

impl<R, M> Play<R, M> {
    pub fn new(role: R, move_: M) -> Self {
        Self { role, move_ }
    }
}

/// A joint action: exactly one [`Play`] per role currently in control of a state.
///
/// Canonically represented as a sorted map from role to move, so that construction order never
/// affects equality, hashing, or the deterministic tie-break key used during selection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Turn<R: Ord, M> {
    plays: BTreeMap<R, M>,
}

impl<R: Ord + Clone, M: Clone> Turn<R, M> {
    /// Builds a turn from an iterator of (role, move) pairs.
    ///
    /// Panics in debug builds if a role appears twice; the interpreter contract guarantees
    /// exactly one play per controlling role.
    pub fn from_plays(plays: impl IntoIterator<Item = (R, M)>) -> Self {
        let mut map = BTreeMap::new();
        for (role, move_) in plays {
            let previous = map.insert(role, move_);
            debug_assert!(previous.is_none(), "duplicate role in a single turn");
        }
        Self { plays: map }
    }

    /// The plays that make up this turn, in canonical (role-sorted) order.
    pub fn as_plays(&self) -> impl ExactSizeIterator<Item = Play<R, M>> + '_ {
        self.plays
            .iter()
            .map(|(role, move_)| Play::new(role.clone(), move_.clone()))
    }

    /// The move a given role plays in this turn, if it is in control.
    pub fn move_for(&self, role: &R) -> Option<&M> {
        self.plays.get(role)
    }

    pub fn roles(&self) -> impl ExactSizeIterator<Item = &R> {
        self.plays.keys()
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

impl<R: Ord + fmt::Debug, M: fmt::Debug> fmt::Display for Turn<R, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (role, move_)) in self.plays.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{role:?} -> {move_:?}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_built_from_different_orders_are_equal() {
        let a = Turn::from_plays([("alice", 1), ("bob", 2)]);
        let b = Turn::from_plays([("bob", 2), ("alice", 1)]);
        assert_eq!(a, b);
        assert_eq!(a.as_plays().collect::<Vec<_>>(), b.as_plays().collect::<Vec<_>>());
    }

    #[test]
    fn move_for_looks_up_by_role() {
        let turn = Turn::from_plays([("alice", "rock"), ("bob", "scissors")]);
        assert_eq!(turn.move_for(&"alice"), Some(&"rock"));
        assert_eq!(turn.move_for(&"carol"), None);
    }
}
