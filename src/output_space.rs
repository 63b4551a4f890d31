//! Output-space constraint oracle.
//!
//! A small, fixed set of variants selected per decode call, so a sum type
//! rather than a trait hierarchy. The oracle is consulted at three points:
//! static rule filtering before the grid is built, a continuation gate
//! before a consequent is materialized, and a final-acceptability gate in
//! hypothesis selection.
//!
//! The continuation gates only need the antecedent's emitted target length,
//! not its content: every ancestor already passed the same gate, so the
//! emitted prefix is known to agree with the reference/prefix up to that
//! length.

use crate::api::Token;
use crate::grid::ConcreteRule;

/// Constraint on acceptable decoder output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputSpace {
    /// Accept everything except the empty root hypothesis.
    Unconstrained,
    /// Output must begin with `prefix`; unconstrained afterwards.
    TargetPrefix { prefix: Vec<Token> },
    /// Output must equal `reference` exactly (forced decoding).
    ForcedTarget { reference: Vec<Token> },
}

impl OutputSpace {
    /// True for variants that can reject continuations.
    pub fn is_constrained(&self) -> bool {
        !matches!(self, Self::Unconstrained)
    }

    /// Static pruning of the candidate rule list before the grid is built.
    ///
    /// Forced decoding keeps only rules whose target occurs contiguously in
    /// the reference; prefix decoding keeps everything (rules may apply
    /// beyond the prefix, so the continuation gate decides).
    pub fn filter(&self, rules: Vec<ConcreteRule>) -> Vec<ConcreteRule> {
        match self {
            Self::Unconstrained | Self::TargetPrefix { .. } => rules,
            Self::ForcedTarget { reference } => rules
                .into_iter()
                .filter(|cr| contains_subsequence(reference, &cr.rule.target))
                .collect(),
        }
    }

    /// May a hypothesis that has emitted `produced_len` target tokens be
    /// extended with a rule emitting `target`?
    pub fn allowable_continuation(&self, produced_len: usize, target: &[Token]) -> bool {
        match self {
            Self::Unconstrained => true,
            Self::TargetPrefix { prefix } => target
                .iter()
                .enumerate()
                .all(|(i, &tok)| match prefix.get(produced_len + i) {
                    Some(&expected) => tok == expected,
                    None => true,
                }),
            Self::ForcedTarget { reference } => {
                produced_len + target.len() <= reference.len()
                    && reference[produced_len..produced_len + target.len()] == *target
            }
        }
    }

    /// Is a finished hypothesis with `produced_len` target tokens an
    /// acceptable decoder output? `is_root` marks the null hypothesis,
    /// which is never acceptable.
    pub fn allowable_final(&self, produced_len: usize, is_root: bool) -> bool {
        if is_root {
            return false;
        }
        match self {
            Self::Unconstrained => true,
            Self::TargetPrefix { prefix } => produced_len >= prefix.len(),
            Self::ForcedTarget { reference } => produced_len == reference.len(),
        }
    }
}

/// True when `needle` occurs contiguously in `haystack`. The empty needle
/// trivially occurs.
fn contains_subsequence(haystack: &[Token], needle: &[Token]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
