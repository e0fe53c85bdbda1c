//! [`PlayoutValuation`]: the monoid rollouts are reduced to and backpropagated through.

use std::collections::BTreeMap;
use std::hash::Hash;

/// Per-role win/tie/loss counts accumulated by one or more rollouts.
///
/// `backpropagate` is the monoid operation: pointwise addition of the three maps across the
/// union of roles. The identity is all-zero maps. Grounded in
/// `original_source/src/pyggp/agents/tree_agents/valuations.py`'s `PlayoutValuation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayoutValuation<R: Ord + Clone> {
    wins: BTreeMap<R, u64>,
    ties: BTreeMap<R, u64>,
    losses: BTreeMap<R, u64>,
}

impl<R: Ord + Clone + Hash> PlayoutValuation<R> {
    /// The all-zero valuation: the identity element of `backpropagate`.
    pub fn empty() -> Self {
        Self {
            wins: BTreeMap::new(),
            ties: BTreeMap::new(),
            losses: BTreeMap::new(),
        }
    }

    /// A valuation recording a single rollout outcome: `role` falls into exactly one of
    /// win/tie/loss, all other roles implicitly at zero.
    pub fn single(role: R, outcome: Outcome) -> Self {
        let mut v = Self::empty();
        let bucket = match outcome {
            Outcome::Win => &mut v.wins,
            Outcome::Tie => &mut v.ties,
            Outcome::Loss => &mut v.losses,
        };
        bucket.insert(role, 1);
        v
    }

    pub fn wins_for(&self, role: &R) -> u64 {
        *self.wins.get(role).unwrap_or(&0)
    }

    pub fn ties_for(&self, role: &R) -> u64 {
        *self.ties.get(role).unwrap_or(&0)
    }

    pub fn losses_for(&self, role: &R) -> u64 {
        *self.losses.get(role).unwrap_or(&0)
    }

    pub fn visits_for(&self, role: &R) -> u64 {
        self.wins_for(role) + self.ties_for(role) + self.losses_for(role)
    }

    /// `(Σwins + Σties + Σlosses) / |roles|`, integer division.
    ///
    /// `roles` must include every role that could possibly appear in this valuation; by
    /// construction all three maps sum to the same total across roles.
    pub fn playouts(&self, role_count: usize) -> u64 {
        if role_count == 0 {
            return 0;
        }
        let total: u64 =
            self.wins.values().sum::<u64>() + self.ties.values().sum::<u64>() + self.losses.values().sum::<u64>();
        total / role_count as u64
    }

    /// Pointwise sum of both valuations across the union of roles: the monoid operation.
    /// Associative and commutative.
    pub fn backpropagate(&self, other: &Self) -> Self {
        Self {
            wins: merge_sum(&self.wins, &other.wins),
            ties: merge_sum(&self.ties, &other.ties),
            losses: merge_sum(&self.losses, &other.losses),
        }
    }
}

fn merge_sum<R: Ord + Clone>(a: &BTreeMap<R, u64>, b: &BTreeMap<R, u64>) -> BTreeMap<R, u64> {
    let mut out = a.clone();
    for (role, count) in b {
        *out.entry(role.clone()).or_insert(0) += count;
    }
    out
}

/// The bucket a rollout's goal-normalized utility falls into for a given role:
/// `u >= 1` a win, `u <= 0` a loss, otherwise a tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Tie,
    Loss,
}

impl Outcome {
    pub fn from_utility(u: f64) -> Self {
        if u >= 1.0 {
            Outcome::Win
        } else if u <= 0.0 {
            Outcome::Loss
        } else {
            Outcome::Tie
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpropagate_is_commutative_and_associative() {
        let v1 = PlayoutValuation::single("alice", Outcome::Win);
        let v2 = PlayoutValuation::single("bob", Outcome::Loss);
        let v3 = PlayoutValuation::single("alice", Outcome::Tie);

        let left = v1.backpropagate(&v2).backpropagate(&v3);
        let right = v1.backpropagate(&v2.backpropagate(&v3));
        assert_eq!(left, right);

        let commuted = v2.backpropagate(&v1);
        assert_eq!(v1.backpropagate(&v2), commuted);
    }

    #[test]
    fn empty_is_the_identity() {
        let v = PlayoutValuation::single("alice", Outcome::Win);
        assert_eq!(v.backpropagate(&PlayoutValuation::empty()), v);
    }

    #[test]
    fn playouts_counts_total_rollouts_across_roles() {
        let v = PlayoutValuation::single("alice", Outcome::Win)
            .backpropagate(&PlayoutValuation::single("bob", Outcome::Loss));
        assert_eq!(v.playouts(2), 1);
    }
}
