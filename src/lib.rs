//! Phrase-based statistical MT decoder built on cube-pruning beam search.
//!
//! ## Scope
//! This crate translates token sequences by covering the source sentence with
//! phrase-table rules, scoring partial hypotheses with a linear model over
//! featurizer output, and searching the derivation space with cube pruning:
//! lazy best-first exploration of (antecedent, rule) grids, one beam per
//! coverage cardinality.
//!
//! ## Key invariants
//! - Derivations are immutable once accepted; chains share structure through
//!   an append-only arena.
//! - Frontier pops within one expansion step are non-increasing in priority,
//!   and ties break on creation order, so decoding is deterministic.
//! - Recombination only merges derivations whose coverage and retained
//!   target context agree; the better-scoring one always survives.
//! - The future-cost outside estimate is admissible for context-free
//!   featurizers, which bounds how wrong beam pruning can be.
//! - Language-model caches are worker-private; the model itself is shared
//!   read-only.
//!
//! ## Decode flow (single sentence)
//! 1) Query the rule source and bind rules to concrete spans.
//! 2) Filter rules against the output space, build the rule grid and the
//!    future-cost table, seed the root beam.
//! 3) For each coverage cardinality: bundle retained beams against open
//!    spans, pop the frontier up to beam capacity, recombine into the beam.
//! 4) Scan beams from full coverage downward for the best acceptable
//!    hypotheses; reconstruct targets along antecedent chains.
//!
//! ## Notable entry points
//! - [`Decoder`] / [`decode_batch`]: single-sentence and multi-sentence decoding.
//! - [`PhraseTable`] / [`RuleSource`]: in-memory rules or a custom backend.
//! - [`LmFeaturizer`] / [`RuleFeaturizer`] / [`Featurizer`]: feature extraction.
//! - [`OutputSpace`]: unconstrained, prefix-constrained, or forced decoding.
//! - [`DecodeRequest`] / [`DecodeResult`]: the per-sentence call surface.
//!
//! ## Design trade-offs
//! Cube pruning trades exactness for a hard per-step work bound: only the
//! top corner of each rule-antecedent grid is ever materialized. Beam
//! retirement caps memory at the cost of restricting how far back a rule
//! may reach, which the widest rule span bounds anyway.

pub mod api;
pub mod beam;
pub mod bundle;
pub mod demo;
pub mod derivation;
pub mod errors;
pub mod grid;
pub mod heuristic;
pub mod lm;
pub mod output_space;
pub mod scorer;
pub mod search;
pub mod stdx;
pub mod table;

pub use api::{
    DecodeRequest, DecodeResult, DecodeStats, DecodeStatus, DecoderConfig, FailureKind,
    FeatureVector, Hypothesis, InputProperties, Rule, Span, Token, Vocabulary,
};
pub use errors::PhraseTableError;
pub use lm::{LanguageModel, NgramTable};
pub use output_space::OutputSpace;
pub use scorer::{Featurizer, LmFeaturizer, RuleFeaturizer, Scorer};
pub use search::{decode_batch, Decoder};
pub use table::{PhraseTable, RuleSource};
