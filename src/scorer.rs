//! Linear scorer and featurizer collaborators.
//!
//! The [`Scorer`] is a plain weight vector: `combine` is a dot product over
//! a [`FeatureVector`]. Weights are read-only during decoding; a tuning
//! process may swap them between batches, never concurrently with one.
//!
//! The [`Featurizer`] produces the incremental feature contribution of
//! applying one rule after one antecedent, plus the context-free isolation
//! features used for grid scoring and the future-cost table. Featurizers
//! take `&mut self` because the LM-backed implementation owns a private
//! score cache (see [`crate::lm`]).

use crate::api::{FeatureVector, Rule, Span, Token};
use crate::lm::{LanguageModel, LmCache};

/// Linear model: a fixed weight per feature.
#[derive(Clone, Debug)]
pub struct Scorer {
    weights: Vec<f32>,
}

impl Scorer {
    pub fn new(weights: Vec<f32>) -> Self {
        Self { weights }
    }

    /// Uniform weights of 1.0, handy for tests.
    pub fn uniform(n: usize) -> Self {
        Self {
            weights: vec![1.0; n],
        }
    }

    pub fn num_features(&self) -> usize {
        self.weights.len()
    }

    /// Dot product of `features` with the weight vector.
    pub fn combine(&self, features: &FeatureVector) -> f64 {
        debug_assert_eq!(features.len(), self.weights.len(), "feature arity mismatch");
        features
            .as_slice()
            .iter()
            .zip(&self.weights)
            .map(|(&f, &w)| f as f64 * w as f64)
            .sum()
    }
}

/// Everything a featurizer may inspect when extending an antecedent with a
/// rule. `tail` is the antecedent's right-edge target context, most recent
/// token last.
pub struct ExtendContext<'a> {
    pub source: &'a [Token],
    pub tail: &'a [Token],
    pub target_len: usize,
    pub rule: &'a Rule,
    pub span: Span,
}

/// Incremental feature extraction, invoked once per consequent
/// materialization.
pub trait Featurizer {
    /// Arity of every vector this featurizer emits.
    fn num_features(&self) -> usize;

    /// Called once before a sentence is decoded.
    fn begin_sentence(&mut self, _source: &[Token]) {}

    /// Context-free features of a rule in isolation. Drives rule sorting in
    /// the grid and the future-cost table; for the outside estimate to stay
    /// admissible it should not score a rule below what `extend` of the same
    /// rule would produce.
    fn isolation(&mut self, rule: &Rule) -> FeatureVector;

    /// Incremental features of applying `ctx.rule` after the antecedent.
    fn extend(&mut self, ctx: &ExtendContext<'_>) -> FeatureVector;
}

/// Rule-only featurizer: per-rule scores plus a word penalty. Context-free,
/// so isolation and extension agree exactly and the future-cost table is an
/// exact outside bound. Used by the admissibility property tests and by
/// setups without a language model.
#[derive(Clone, Debug)]
pub struct RuleFeaturizer {
    rule_features: usize,
}

impl RuleFeaturizer {
    pub fn new(rule_features: usize) -> Self {
        Self { rule_features }
    }

    fn featurize(&self, rule: &Rule) -> FeatureVector {
        debug_assert_eq!(rule.features.len(), self.rule_features);
        let mut v = Vec::with_capacity(self.rule_features + 1);
        v.extend_from_slice(&rule.features);
        v.push(-(rule.target.len() as f32));
        FeatureVector(v)
    }
}

impl Featurizer for RuleFeaturizer {
    fn num_features(&self) -> usize {
        self.rule_features + 1
    }

    fn isolation(&mut self, rule: &Rule) -> FeatureVector {
        self.featurize(rule)
    }

    fn extend(&mut self, ctx: &ExtendContext<'_>) -> FeatureVector {
        self.featurize(ctx.rule)
    }
}

/// Default featurizer: rule scores, an n-gram LM feature, and a word
/// penalty.
///
/// Layout: `[rule features..., lm, word_penalty]`.
///
/// The isolation LM score uses an empty left context, the standard
/// outside-estimate approximation; with a context-sensitive LM the
/// future-cost table is optimistic in practice rather than provably exact.
pub struct LmFeaturizer<L> {
    lm: L,
    cache: LmCache,
    rule_features: usize,
}

impl<L: LanguageModel> LmFeaturizer<L> {
    pub fn new(lm: L, rule_features: usize) -> Self {
        Self {
            lm,
            cache: LmCache::new(),
            rule_features,
        }
    }

    pub fn lm(&self) -> &L {
        &self.lm
    }

    /// Sum of LM scores for `target` continuing `tail`.
    fn lm_score(&mut self, tail: &[Token], target: &[Token]) -> f64 {
        let window = self.lm.order() - 1;
        let mut context: Vec<Token> = tail.to_vec();
        let mut total = 0.0;
        for &tok in target {
            let start = context.len().saturating_sub(window);
            total += self.cache.score(&self.lm, &context[start..], tok);
            context.push(tok);
        }
        total
    }

    fn build(&self, rule: &Rule, lm: f64) -> FeatureVector {
        debug_assert_eq!(rule.features.len(), self.rule_features);
        let mut v = Vec::with_capacity(self.rule_features + 2);
        v.extend_from_slice(&rule.features);
        v.push(lm as f32);
        v.push(-(rule.target.len() as f32));
        FeatureVector(v)
    }
}

impl<L: LanguageModel> Featurizer for LmFeaturizer<L> {
    fn num_features(&self) -> usize {
        self.rule_features + 2
    }

    fn isolation(&mut self, rule: &Rule) -> FeatureVector {
        let lm = self.lm_score(&[], &rule.target);
        self.build(rule, lm)
    }

    fn extend(&mut self, ctx: &ExtendContext<'_>) -> FeatureVector {
        let lm = self.lm_score(ctx.tail, &ctx.rule.target);
        self.build(ctx.rule, lm)
    }
}
