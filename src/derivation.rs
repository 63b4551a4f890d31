//! Derivations: immutable, backward-linked partial hypotheses.
//!
//! Derivations live in an arena and point to their antecedent by index, not
//! by owning pointer, so chains are trivially shareable and the final
//! reconstruction walk needs no reference counting. A record is written once
//! when accepted off the frontier and never mutated.
//!
//! Ordering is by frontier priority (`score + heuristic`) with the creation
//! sequence number as a fixed secondary key, which makes the search
//! deterministic and test-repeatable.

use std::cmp::Ordering;

use crate::api::{FeatureVector, Token};
use crate::grid::{RuleGrid, RuleId};
use crate::stdx::Coverage;

/// Index of a [`Derivation`] in its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DerivationId(pub u32);

/// One partial or complete hypothesis.
#[derive(Clone, Debug)]
pub struct Derivation {
    /// Cumulative model score along the chain.
    pub score: f64,
    /// Outside estimate for the uncovered remainder.
    pub heuristic: f64,
    pub coverage: Coverage,
    /// Target tokens emitted so far along the chain.
    pub target_len: u32,
    /// Rule applied by this step; `None` only for the root.
    pub rule: Option<RuleId>,
    /// Antecedent in the arena; `None` only for the root.
    pub antecedent: Option<DerivationId>,
    /// Incremental feature contribution of this step.
    pub features: FeatureVector,
    /// Right-edge target context retained for downstream scoring and the
    /// recombination signature.
    pub tail: Vec<Token>,
    /// Creation sequence number; the deterministic tie-break key.
    pub seq: u64,
}

impl Derivation {
    /// Frontier priority.
    #[inline]
    pub fn priority(&self) -> f64 {
        self.score + self.heuristic
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.rule.is_none()
    }
}

/// Total order for ranking: higher priority first, earlier creation wins
/// ties.
pub fn rank(a: &Derivation, b: &Derivation) -> Ordering {
    b.priority()
        .total_cmp(&a.priority())
        .then(a.seq.cmp(&b.seq))
}

/// Append-only arena of derivation records.
pub struct DerivationArena {
    nodes: Vec<Derivation>,
}

impl DerivationArena {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Seeds the root (null) hypothesis for a sentence of `source_len`
    /// tokens with the whole-sentence outside estimate.
    pub fn root(&mut self, source_len: usize, heuristic: f64, num_features: usize) -> DerivationId {
        debug_assert!(self.nodes.is_empty(), "root must be seeded first");
        self.push(Derivation {
            score: 0.0,
            heuristic,
            coverage: Coverage::new(source_len),
            target_len: 0,
            rule: None,
            antecedent: None,
            features: FeatureVector::zeros(num_features),
            tail: Vec::new(),
            seq: 0,
        })
    }

    pub fn push(&mut self, derivation: Derivation) -> DerivationId {
        debug_assert_eq!(derivation.seq, self.nodes.len() as u64);
        let id = DerivationId(self.nodes.len() as u32);
        self.nodes.push(derivation);
        id
    }

    /// Sequence number the next pushed derivation must carry.
    pub fn next_seq(&self) -> u64 {
        self.nodes.len() as u64
    }

    #[inline]
    pub fn get(&self, id: DerivationId) -> &Derivation {
        &self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reconstructs the target sequence and summed feature vector by
    /// walking the antecedent chain back to the root.
    pub fn reconstruct(&self, id: DerivationId, grid: &RuleGrid) -> (Vec<Token>, FeatureVector) {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            chain.push(cur);
            cursor = self.get(cur).antecedent;
        }
        chain.reverse();

        let mut target = Vec::new();
        let mut features = FeatureVector::zeros(self.get(id).features.len());
        for step in chain {
            let d = self.get(step);
            if let Some(rule_id) = d.rule {
                target.extend_from_slice(&grid.rule(rule_id).rule.target);
                features.add_assign(&d.features);
            }
        }
        debug_assert_eq!(target.len(), self.get(id).target_len as usize);
        (target, features)
    }
}

impl Default for DerivationArena {
    fn default() -> Self {
        Self::new()
    }
}
