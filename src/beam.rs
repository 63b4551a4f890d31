//! Cardinality beams with recombination.
//!
//! A beam holds the surviving derivations for one coverage cardinality,
//! keyed by recombination signature. Two derivations with equal signatures
//! are interchangeable for all future search, so only the better one
//! survives; losers are counted, never searched again. Capacity is enforced
//! after insertion, not before, so a would-be winner is never rejected to
//! protect a worse incumbent.
//!
//! The exact signature is resource-specific (how much right-edge context
//! downstream scorers need), so [`RecombinationPolicy`] keeps the context
//! window configurable rather than baking in a field list.

use ahash::AHashMap;

use crate::api::Token;
use crate::derivation::{rank, Derivation, DerivationArena, DerivationId};
use crate::stdx::Coverage;

/// Future-affecting state of a derivation: coverage plus the retained
/// target tail.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    coverage: Coverage,
    tail: Vec<Token>,
}

/// Builds recombination signatures with a configurable target-context
/// window.
#[derive(Clone, Copy, Debug)]
pub struct RecombinationPolicy {
    pub context_window: usize,
}

impl RecombinationPolicy {
    pub fn signature(&self, derivation: &Derivation) -> Signature {
        let tail = &derivation.tail;
        let start = tail.len().saturating_sub(self.context_window);
        Signature {
            coverage: derivation.coverage.clone(),
            tail: tail[start..].to_vec(),
        }
    }
}

/// What `put` did with a derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// Novel signature; the derivation was inserted.
    Inserted,
    /// Same signature as a worse incumbent; the incumbent was replaced.
    ReplacedIncumbent,
    /// Same signature as a better-or-equal incumbent; the new derivation
    /// was discarded.
    Discarded,
    /// Inserted, then evicted by the capacity bound (or inserted and a
    /// lower-priority survivor was evicted).
    InsertedEvictingWorst,
}

/// Capacity-bounded, recombination-aware container of derivations sharing
/// one coverage cardinality.
pub struct Beam {
    cardinality: usize,
    capacity: usize,
    entries: AHashMap<Signature, DerivationId>,
    recombined: u64,
    evicted: u64,
    retired: bool,
}

impl Beam {
    pub fn new(cardinality: usize, capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            cardinality,
            capacity,
            entries: AHashMap::new(),
            recombined: 0,
            evicted: 0,
            retired: false,
        }
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Derivations recombined away (either direction).
    pub fn recombined(&self) -> u64 {
        self.recombined
    }

    /// Derivations evicted by the capacity bound.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Inserts a derivation, applying recombination and the capacity bound.
    pub fn put(
        &mut self,
        arena: &DerivationArena,
        policy: &RecombinationPolicy,
        id: DerivationId,
    ) -> PutOutcome {
        debug_assert!(!self.retired, "put on a retired beam");
        let derivation = arena.get(id);
        debug_assert_eq!(
            derivation.coverage.cardinality(),
            self.cardinality,
            "derivation cardinality does not match beam cardinality"
        );

        let signature = policy.signature(derivation);
        let mut outcome = match self.entries.get(&signature) {
            Some(&incumbent_id) => {
                let incumbent = arena.get(incumbent_id);
                if rank(derivation, incumbent) == std::cmp::Ordering::Less {
                    self.entries.insert(signature, id);
                    self.recombined = self.recombined.saturating_add(1);
                    PutOutcome::ReplacedIncumbent
                } else {
                    self.recombined = self.recombined.saturating_add(1);
                    return PutOutcome::Discarded;
                }
            }
            None => {
                self.entries.insert(signature, id);
                PutOutcome::Inserted
            }
        };

        // Capacity is enforced after insertion.
        while self.entries.len() > self.capacity {
            let worst = self
                .entries
                .iter()
                .max_by(|a, b| rank(arena.get(*a.1), arena.get(*b.1)))
                .map(|(sig, _)| sig.clone())
                .expect("non-empty beam");
            self.entries.remove(&worst);
            self.evicted = self.evicted.saturating_add(1);
            outcome = PutOutcome::InsertedEvictingWorst;
        }
        outcome
    }

    /// True when `id` currently survives in the beam.
    pub fn contains(&self, id: DerivationId) -> bool {
        self.entries.values().any(|&v| v == id)
    }

    /// Surviving derivations ranked best-first (priority, then creation
    /// sequence).
    pub fn ranked(&self, arena: &DerivationArena) -> Vec<DerivationId> {
        let mut ids: Vec<DerivationId> = self.entries.values().copied().collect();
        ids.sort_by(|a, b| rank(arena.get(*a), arena.get(*b)));
        ids
    }

    /// Drops the beam's contents once its cardinality falls outside the
    /// active window; no future rule can reach back to it.
    pub fn retire(&mut self) {
        self.entries.clear();
        self.entries.shrink_to_fit();
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }
}

/// Post-beam rescoring hook: may reorder a frozen beam's ranking before
/// bundles are built from it, without changing which derivations exist.
pub trait Reranker {
    fn rerank(&mut self, arena: &DerivationArena, order: &mut Vec<DerivationId>);
}
