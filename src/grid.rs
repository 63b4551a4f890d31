//! Per-sentence rule grid.
//!
//! Rules returned by the rule source are bound to concrete spans, given a
//! precomputed isolation score, and indexed by span for O(1) lookup during
//! search. The grid is built once per sentence after output-space filtering
//! and is read-only thereafter.
//!
//! Layout: a dense `start * (n + 1) + end` table of rule-id lists. The table is
//! sparse in practice because phrases are short; memory is traded for
//! constant-time span queries.

use std::sync::Arc;

use crate::api::{Rule, Span};
use crate::stdx::Coverage;

/// Index of a [`ConcreteRule`] in the sentence's rule arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RuleId(pub u32);

/// A rule bound to one source span, with its isolation score under the
/// current weights.
#[derive(Clone, Debug)]
pub struct ConcreteRule {
    pub rule: Arc<Rule>,
    pub span: Span,
    /// Score of this rule in isolation (featurizer isolation features
    /// combined by the scorer). Precomputed once per sentence.
    pub isolation_score: f64,
}

/// Span-indexed store of every concrete rule applicable to one sentence.
pub struct RuleGrid {
    rules: Vec<ConcreteRule>,
    /// `start * n + end` (end exclusive) -> rule ids, sorted by isolation
    /// score descending.
    cells: Vec<Vec<RuleId>>,
    n: usize,
    coverage: Coverage,
    max_span_width: usize,
}

impl RuleGrid {
    /// Builds the grid for a sentence of `n` tokens. Each cell is sorted by
    /// isolation score (descending, ties by arrival order) and truncated to
    /// `query_limit` when set.
    pub fn build(rules: Vec<ConcreteRule>, n: usize, query_limit: Option<usize>) -> Self {
        let mut cells = vec![Vec::new(); n * (n + 1)];
        let mut coverage = Coverage::new(n);
        let mut max_span_width = 0;
        for (idx, cr) in rules.iter().enumerate() {
            debug_assert!(cr.span.width() > 0, "zero-width rule span");
            debug_assert!(cr.span.end as usize <= n, "rule span out of bounds");
            let offset = cr.span.start as usize * (n + 1) + cr.span.end as usize;
            cells[offset].push(RuleId(idx as u32));
            coverage.set_span(cr.span);
            max_span_width = max_span_width.max(cr.span.width());
        }
        for cell in &mut cells {
            cell.sort_by(|a, b| {
                rules[b.0 as usize]
                    .isolation_score
                    .total_cmp(&rules[a.0 as usize].isolation_score)
                    .then(a.0.cmp(&b.0))
            });
            if let Some(limit) = query_limit {
                cell.truncate(limit);
            }
        }
        Self {
            rules,
            cells,
            n,
            coverage,
            max_span_width,
        }
    }

    /// Sentence length (grid dimension).
    pub fn dimension(&self) -> usize {
        self.n
    }

    /// Total rules stored.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Widest rule span in the grid. Bounds the active beam window: no rule
    /// can reach back further than this many coverage steps.
    pub fn max_span_width(&self) -> usize {
        self.max_span_width
    }

    /// True when every source position has at least one applicable rule.
    pub fn coverage_complete(&self) -> bool {
        self.coverage.is_full()
    }

    /// Rules applicable to exactly `span`, best isolation score first.
    pub fn span_rules(&self, span: Span) -> &[RuleId] {
        debug_assert!(span.end as usize <= self.n);
        &self.cells[span.start as usize * (self.n + 1) + span.end as usize]
    }

    pub fn rule(&self, id: RuleId) -> &ConcreteRule {
        &self.rules[id.0 as usize]
    }

    /// Iterates every concrete rule in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &ConcreteRule> {
        self.rules.iter()
    }
}
