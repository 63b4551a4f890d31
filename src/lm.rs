//! Language-model collaborator and its per-worker score cache.
//!
//! The model itself is shared read-only across all concurrent decodes. The
//! cache is not: [`LmCache`] wraps mutable state and must be owned by exactly
//! one decode worker. This is a hard invariant inherited from the external
//! model's contract, not a tuning choice; the featurizer owns its cache for
//! that reason.

use ahash::AHashMap;

use crate::api::Token;

/// N-gram language model interface.
pub trait LanguageModel: Sync {
    /// Model order (maximum n-gram length).
    fn order(&self) -> usize;

    /// Log-probability of `next` following `context`. `context` holds at
    /// most `order() - 1` tokens, most recent last.
    fn score(&self, context: &[Token], next: Token) -> f64;
}

/// Memoizes `(context, next) -> log-probability` lookups for one worker.
#[derive(Default, Debug)]
pub struct LmCache {
    map: AHashMap<(Vec<Token>, Token), f64>,
    hits: u64,
    misses: u64,
}

impl LmCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached score lookup, delegating to `lm` on a miss.
    pub fn score(&mut self, lm: &dyn LanguageModel, context: &[Token], next: Token) -> f64 {
        if let Some(&p) = self.map.get(&(context.to_vec(), next)) {
            self.hits = self.hits.saturating_add(1);
            return p;
        }
        self.misses = self.misses.saturating_add(1);
        let p = lm.score(context, next);
        self.map.insert((context.to_vec(), next), p);
        p
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Table-backed n-gram model for tests and demos.
///
/// Scores are looked up by the exact `(context tail, next)` pair; unknown
/// n-grams fall back to a flat penalty. No smoothing beyond that.
#[derive(Clone, Debug)]
pub struct NgramTable {
    order: usize,
    probs: AHashMap<(Vec<Token>, Token), f64>,
    fallback: f64,
}

impl NgramTable {
    pub fn new(order: usize, fallback: f64) -> Self {
        assert!(order >= 1, "LM order must be at least 1");
        Self {
            order,
            probs: AHashMap::new(),
            fallback,
        }
    }

    /// Registers the log-probability of `next` after `context`.
    pub fn set(&mut self, context: &[Token], next: Token, logprob: f64) {
        debug_assert!(context.len() < self.order);
        self.probs.insert((context.to_vec(), next), logprob);
    }
}

impl LanguageModel for NgramTable {
    fn order(&self) -> usize {
        self.order
    }

    fn score(&self, context: &[Token], next: Token) -> f64 {
        let tail_start = context.len().saturating_sub(self.order - 1);
        let tail = &context[tail_start..];
        self.probs
            .get(&(tail.to_vec(), next))
            .copied()
            .unwrap_or(self.fallback)
    }
}
