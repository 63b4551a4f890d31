//! Public data types: tokens, rules, feature vectors, and the decode
//! request/result surface.
//!
//! Tokens are interned `u32` ids; a [`Vocabulary`] owns the string mapping so
//! that rules, language-model contexts, and hypotheses stay cheap to compare
//! and hash. Everything the decoder returns is a value: ranked hypotheses, a
//! status, and a [`DecodeStats`] block carrying the diagnostic counters for
//! the run.

use std::time::Instant;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::output_space::OutputSpace;

/// Interned token id. Ids are dense and issued by a [`Vocabulary`].
pub type Token = u32;

/// Bidirectional token interner shared by the rule source, the language
/// model, and callers building decode requests.
#[derive(Default, Clone, Debug)]
pub struct Vocabulary {
    ids: AHashMap<String, Token>,
    names: Vec<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `name`, returning the existing id when already known.
    pub fn intern(&mut self, name: &str) -> Token {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as Token;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Id for `name`, if interned.
    pub fn get(&self, name: &str) -> Option<Token> {
        self.ids.get(name).copied()
    }

    /// String form of `token`. Panics on ids this vocabulary never issued.
    pub fn name(&self, token: Token) -> &str {
        &self.names[token as usize]
    }

    /// Number of interned tokens.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Interns every whitespace-separated token of `text`.
    pub fn intern_all(&mut self, text: &str) -> Vec<Token> {
        text.split_whitespace().map(|t| self.intern(t)).collect()
    }

    /// Renders a token sequence back to a space-joined string.
    pub fn render(&self, tokens: &[Token]) -> String {
        tokens
            .iter()
            .map(|&t| self.name(t))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Half-open source span `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[inline]
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "inverted span");
        Self { start, end }
    }

    /// Number of source positions covered.
    #[inline]
    pub fn width(&self) -> usize {
        (self.end - self.start) as usize
    }
}

/// A translation rule: source phrase, target phrase, and its feature scores.
///
/// Rules are immutable and shared read-only across all decodes; the rule
/// source owns them and hands out [`std::sync::Arc`] clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub source: Vec<Token>,
    pub target: Vec<Token>,
    /// Dense per-rule feature values (translation-model scores etc.).
    pub features: Vec<f32>,
}

/// Dense feature-value vector. Incremental contributions are summed along a
/// derivation chain to produce the per-hypothesis feature breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<f32>);

impl FeatureVector {
    pub fn zeros(n: usize) -> Self {
        Self(vec![0.0; n])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Element-wise accumulate. Vectors must have equal arity.
    pub fn add_assign(&mut self, other: &FeatureVector) {
        debug_assert_eq!(self.0.len(), other.0.len(), "feature arity mismatch");
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a += b;
        }
    }
}

/// Search-wide tuning knobs. Defaults follow the reference configuration of
/// the cube-pruning literature; tests use much smaller beams.
#[derive(Clone, Debug)]
pub struct DecoderConfig {
    /// Maximum surviving derivations per coverage cardinality.
    pub beam_capacity: usize,
    /// Moses-style hard reordering limit; `None` allows arbitrary jumps.
    pub distortion_limit: Option<usize>,
    /// Cap on rules kept per source span after isolation-score sorting.
    pub rule_query_limit: Option<usize>,
    /// Under output constraints, give up on an expansion step after
    /// `beam_capacity * rejection_factor` rejected consequents.
    pub rejection_factor: usize,
    /// Target-side context window for the recombination signature,
    /// typically language-model order minus one.
    pub context_window: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_capacity: 1200,
            distortion_limit: None,
            rule_query_limit: None,
            rejection_factor: 10,
            context_window: 2,
        }
    }
}

/// Per-sentence metadata handed through to the rule source, opaque to the
/// search itself. Backends that key on domain, user, or session state read
/// it; the in-memory table ignores it.
#[derive(Clone, Debug, Default)]
pub struct InputProperties {
    entries: AHashMap<String, String>,
}

impl InputProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One sentence to decode, with its constraint and latency bound.
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    pub source: &'a [Token],
    pub sentence_id: u64,
    /// Maximum number of ranked hypotheses to return.
    pub nbest: usize,
    pub constraint: OutputSpace,
    /// Metadata forwarded to the rule source.
    pub properties: InputProperties,
    /// Cooperative deadline checked before each frontier pop.
    pub deadline: Option<Instant>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(source: &'a [Token], sentence_id: u64) -> Self {
        Self {
            source,
            sentence_id,
            nbest: 1,
            constraint: OutputSpace::Unconstrained,
            properties: InputProperties::new(),
            deadline: None,
        }
    }
}

/// One ranked decoder output with its model score and feature breakdown.
#[derive(Clone, Debug, Serialize)]
pub struct Hypothesis {
    pub target: Vec<Token>,
    pub score: f64,
    pub features: FeatureVector,
}

/// Why a decode produced no acceptable hypothesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum FailureKind {
    /// The request carried an empty source sentence.
    EmptySource,
    /// An output constraint rejected every reachable continuation; the
    /// reference/prefix is unreachable under this rule set.
    ConstraintUnsatisfiable,
    /// The search space was exhausted without an acceptable hypothesis;
    /// a larger beam or more rules may help.
    SearchExhausted,
    /// The cooperative deadline expired mid-search.
    DeadlineExceeded,
}

/// Outcome of a decode call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DecodeStatus {
    /// Best hypothesis covers the full source.
    Success,
    /// No full-coverage hypothesis survived; results come from the best
    /// lower-cardinality beam. A decoder failure mode, not an error.
    PartialCoverage { covered: usize, total: usize },
    Failed(FailureKind),
}

/// Diagnostic counters for one decode. Returned on success and failure
/// alike; all adds saturate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DecodeStats {
    /// Rules returned by the rule source before constraint filtering.
    pub rules_queried: u64,
    /// Rules surviving output-space filtering.
    pub rules_after_filter: u64,
    /// Derivations materialized into the arena (including later losers).
    pub derivations_generated: u64,
    /// Derivations merged away by the recombination registry.
    pub recombined: u64,
    /// Derivations evicted by the beam capacity bound.
    pub evicted: u64,
    /// Frontier pops across all expansion steps.
    pub frontier_pops: u64,
    /// Consequents rejected by `allowable_continuation`.
    pub constraint_rejections: u64,
    /// Beams dropped from the active window.
    pub beams_retired: u64,
    /// False when some source position has no applicable rule.
    pub grid_coverage_complete: bool,
}

impl DecodeStats {
    #[inline]
    pub(crate) fn bump(counter: &mut u64) {
        *counter = counter.saturating_add(1);
    }
}

/// Full result of one decode call: ranked hypotheses (possibly empty), a
/// status, and the run's diagnostic counters.
#[derive(Clone, Debug)]
pub struct DecodeResult {
    pub status: DecodeStatus,
    pub hypotheses: Vec<Hypothesis>,
    pub stats: DecodeStats,
}

impl DecodeResult {
    /// Convenience accessor for the top hypothesis.
    pub fn best(&self) -> Option<&Hypothesis> {
        self.hypotheses.first()
    }
}
