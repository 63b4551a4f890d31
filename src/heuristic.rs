//! Admissible future-cost table.
//!
//! A dynamic program over source spans, computed once per sentence before
//! the main loop: each span's score is the best achievable sum of isolation
//! scores of rules tiling it. The outside estimate for a partial hypothesis
//! is the sum of span scores over its coverage gaps; by construction it
//! never underestimates the best achievable remaining score (under the
//! isolation approximation), which is what best-first pruning requires.
//!
//! Single-token spans no rule covers get [`SPAN_FLOOR`] rather than negative
//! infinity so hypotheses over partially coverable sentences remain finitely
//! comparable and the partial-coverage fallback can still rank survivors.

use crate::api::Span;
use crate::grid::RuleGrid;
use crate::stdx::Coverage;

/// Score assigned to an uncoverable source token.
pub const SPAN_FLOOR: f64 = -10_000.0;

/// Upper-triangular table of best per-span completion scores.
pub struct FutureCostTable {
    /// `start * (n + 1) + end` (end exclusive).
    scores: Vec<f64>,
    n: usize,
}

impl FutureCostTable {
    /// Builds the table from a finished rule grid. O(n²) cells, O(n) split
    /// points per cell.
    pub fn build(grid: &RuleGrid) -> Self {
        let n = grid.dimension();
        let mut scores = vec![f64::NEG_INFINITY; (n + 1) * (n + 1)];
        let at = |start: usize, end: usize| start * (n + 1) + end;

        // Seed with the best single rule per span.
        for cr in grid.iter() {
            let cell = at(cr.span.start as usize, cr.span.end as usize);
            if cr.isolation_score > scores[cell] {
                scores[cell] = cr.isolation_score;
            }
        }

        // Floor uncoverable tokens so wider spans stay finite.
        for i in 0..n {
            let cell = at(i, i + 1);
            if scores[cell] == f64::NEG_INFINITY {
                scores[cell] = SPAN_FLOOR;
            }
        }

        // Viterbi combination over split points, increasing width.
        for width in 2..=n {
            for start in 0..=n - width {
                let end = start + width;
                let mut best = scores[at(start, end)];
                for mid in start + 1..end {
                    let combined = scores[at(start, mid)] + scores[at(mid, end)];
                    if combined > best {
                        best = combined;
                    }
                }
                scores[at(start, end)] = best;
            }
        }

        Self { scores, n }
    }

    /// Best completion score for `span`.
    pub fn span(&self, span: Span) -> f64 {
        debug_assert!(span.end as usize <= self.n && span.width() > 0);
        self.scores[span.start as usize * (self.n + 1) + span.end as usize]
    }

    /// Optimistic estimate of the score still achievable over every
    /// uncovered position. Zero for full coverage.
    pub fn outside(&self, coverage: &Coverage) -> f64 {
        coverage.gaps().map(|gap| self.span(gap)).sum()
    }

    /// Outside estimate for the empty coverage: the whole-sentence score.
    pub fn total(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.span(Span::new(0, self.n as u32))
        }
    }
}
