//! Rule source: the phrase-table collaborator.
//!
//! The decoder treats the rule source as opaque: given a source sentence it
//! returns every applicable rule with its span. [`PhraseTable`] is the
//! in-memory implementation used by tests and embedders; production backends
//! (dynamically indexed corpora, service-backed tables) implement
//! [`RuleSource`] themselves.
//!
//! Table files are JSON with string phrases; tokens are interned into the
//! caller's [`Vocabulary`] at load time. Malformed tables fail fast with
//! [`PhraseTableError`], before any sentence is decoded.

use std::io::Read;
use std::sync::Arc;

use ahash::AHashMap;
use serde::Deserialize;

use crate::api::{InputProperties, Rule, Span, Token, Vocabulary};
use crate::errors::PhraseTableError;

/// Source of translation rules for one sentence.
///
/// Implementations are shared read-only across concurrent decodes and must
/// be `Sync`. The decoder computes isolation scores itself; sources only
/// report which rules match which spans.
pub trait RuleSource: Sync {
    /// Every (rule, span) pair applicable to `source`. `properties` carries
    /// the request's opaque per-sentence metadata; backends keying on domain
    /// or session state read it, simple tables ignore it. Span order and
    /// duplicate rules across distinct spans are both fine; the rule grid
    /// sorts per span.
    fn rules_for(
        &self,
        source: &[Token],
        properties: &InputProperties,
        sentence_id: u64,
    ) -> Vec<(Arc<Rule>, Span)>;

    /// Longest source phrase this table can match. Used to bound span
    /// enumeration; an over-estimate is harmless.
    fn max_source_len(&self) -> usize;
}

impl<T: RuleSource + ?Sized> RuleSource for &T {
    fn rules_for(
        &self,
        source: &[Token],
        properties: &InputProperties,
        sentence_id: u64,
    ) -> Vec<(Arc<Rule>, Span)> {
        (**self).rules_for(source, properties, sentence_id)
    }

    fn max_source_len(&self) -> usize {
        (**self).max_source_len()
    }
}

/// In-memory phrase table keyed by exact source phrase.
#[derive(Clone, Debug, Default)]
pub struct PhraseTable {
    by_source: AHashMap<Vec<Token>, Vec<Arc<Rule>>>,
    max_len: usize,
    num_features: usize,
}

impl PhraseTable {
    /// Creates an empty table whose rules all carry `num_features` feature
    /// values.
    pub fn new(num_features: usize) -> Self {
        Self {
            by_source: AHashMap::new(),
            max_len: 0,
            num_features,
        }
    }

    /// Declared per-rule feature arity.
    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.by_source.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Adds a rule, validating source phrase and feature arity.
    pub fn insert(&mut self, rule: Rule) -> Result<(), PhraseTableError> {
        let idx = self.len();
        if rule.source.is_empty() {
            return Err(PhraseTableError::EmptySourcePhrase { rule: idx });
        }
        if rule.features.len() != self.num_features {
            return Err(PhraseTableError::FeatureArity {
                rule: idx,
                got: rule.features.len(),
                expected: self.num_features,
            });
        }
        self.max_len = self.max_len.max(rule.source.len());
        self.by_source
            .entry(rule.source.clone())
            .or_default()
            .push(Arc::new(rule));
        Ok(())
    }

    /// Loads a JSON table, interning phrases into `vocab`.
    ///
    /// Format:
    /// ```json
    /// {
    ///   "features": ["tm.fwd", "tm.bwd"],
    ///   "rules": [
    ///     { "source": "la maison", "target": "the house", "features": [-0.4, -0.7] }
    ///   ]
    /// }
    /// ```
    pub fn load_json<R: Read>(
        reader: R,
        vocab: &mut Vocabulary,
    ) -> Result<Self, PhraseTableError> {
        let file: TableFile = serde_json::from_reader(reader).map_err(|e| {
            if e.is_io() {
                PhraseTableError::Io(e.into())
            } else {
                PhraseTableError::Parse {
                    detail: e.to_string(),
                }
            }
        })?;
        let mut table = Self::new(file.features.len());
        for entry in file.rules {
            table.insert(Rule {
                source: vocab.intern_all(&entry.source),
                target: vocab.intern_all(&entry.target),
                features: entry.features,
            })?;
        }
        Ok(table)
    }
}

impl RuleSource for PhraseTable {
    fn rules_for(
        &self,
        source: &[Token],
        _properties: &InputProperties,
        _sentence_id: u64,
    ) -> Vec<(Arc<Rule>, Span)> {
        let mut out = Vec::new();
        let n = source.len();
        for start in 0..n {
            let longest = (start + self.max_len).min(n);
            for end in start + 1..=longest {
                if let Some(rules) = self.by_source.get(&source[start..end]) {
                    let span = Span::new(start as u32, end as u32);
                    out.extend(rules.iter().map(|r| (Arc::clone(r), span)));
                }
            }
        }
        out
    }

    fn max_source_len(&self) -> usize {
        self.max_len
    }
}

#[derive(Deserialize)]
struct TableFile {
    features: Vec<String>,
    rules: Vec<RuleEntry>,
}

#[derive(Deserialize)]
struct RuleEntry {
    source: String,
    target: String,
    features: Vec<f32>,
}
