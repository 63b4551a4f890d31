//! Lazy cube generation: hyperedge bundles and consequents.
//!
//! A [`Bundle`] pairs the rules applicable to one open span with the
//! antecedent derivations eligible to precede them. Both axes are sorted by
//! local score, so the best combination is cell (0,0) and the next-best
//! candidates after any cell are its two axis neighbors. Visited markers are
//! local to the bundle (one sentence, one coverage step) so concurrent
//! decodes share nothing.
//!
//! Only `O(beam capacity)` cells are ever materialized per coverage step,
//! while the score-sorted axes keep the true top-k combinations reachable.

use ahash::AHashSet;

use crate::api::Span;
use crate::derivation::{DerivationArena, DerivationId};
use crate::grid::{RuleGrid, RuleId};
use crate::stdx::Coverage;

/// One (antecedent rank, rule rank) pick from a bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Consequent {
    /// Index of the owning bundle in the expansion step's bundle list.
    pub bundle: u32,
    pub ante_rank: u32,
    pub rule_rank: u32,
}

/// Rules × antecedents for one open span, explored lazily.
pub struct Bundle {
    span: Span,
    /// Antecedent derivations, best frontier priority first.
    antecedents: Vec<DerivationId>,
    /// Applicable rules, best isolation score first.
    rules: Vec<RuleId>,
    visited: AHashSet<(u32, u32)>,
}

impl Bundle {
    pub fn new(antecedents: Vec<DerivationId>, rules: Vec<RuleId>, span: Span) -> Self {
        debug_assert!(!antecedents.is_empty() && !rules.is_empty());
        Self {
            span,
            antecedents,
            rules,
            visited: AHashSet::new(),
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn antecedent(&self, rank: u32) -> DerivationId {
        self.antecedents[rank as usize]
    }

    pub fn rule(&self, rank: u32) -> RuleId {
        self.rules[rank as usize]
    }

    /// Pushes the unexplored successors of `of` onto `out`: the top cell
    /// when `of` is `None`, otherwise the neighbor along each axis. Each
    /// cell is produced at most once per bundle.
    pub fn successors(&mut self, bundle_idx: u32, of: Option<Consequent>, out: &mut Vec<Consequent>) {
        let candidates = match of {
            None => [(0, 0), (u32::MAX, u32::MAX)],
            Some(c) => {
                debug_assert_eq!(c.bundle, bundle_idx);
                [
                    (c.ante_rank + 1, c.rule_rank),
                    (c.ante_rank, c.rule_rank + 1),
                ]
            }
        };
        for (ante_rank, rule_rank) in candidates {
            if (ante_rank as usize) < self.antecedents.len()
                && (rule_rank as usize) < self.rules.len()
                && self.visited.insert((ante_rank, rule_rank))
            {
                out.push(Consequent {
                    bundle: bundle_idx,
                    ante_rank,
                    rule_rank,
                });
            }
        }
    }
}

/// Enumerates the open spans of exactly `width` reachable from `coverage`.
///
/// Spans must lie entirely inside a coverage gap. With a distortion limit,
/// the trailing gap is clipped so no rule starts more than `limit` positions
/// past the first uncovered token (Moses-style hard reordering bound).
pub fn open_spans(coverage: &Coverage, width: usize, distortion_limit: Option<usize>) -> Vec<Span> {
    debug_assert!(width > 0);
    let n = coverage.len();
    let Some(first_gap) = coverage.next_clear_from(0) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for gap in coverage.gaps() {
        let mut bound = gap.end as usize;
        if bound == n {
            if let Some(limit) = distortion_limit {
                bound = bound.min(first_gap + limit + 1);
            }
        }
        let mut start = gap.start as usize;
        while start + width <= bound {
            out.push(Span::new(start as u32, (start + width) as u32));
            start += 1;
        }
    }
    out
}

/// Builds the bundles a frozen beam contributes for consequents of
/// cardinality `beam cardinality + width`.
///
/// `order` is the beam's ranked derivation list (post-rerank). Derivations
/// are grouped by identical coverage; each (group, open span) pair with at
/// least one applicable rule becomes one bundle.
pub fn build_bundles(
    order: &[DerivationId],
    arena: &DerivationArena,
    grid: &RuleGrid,
    width: usize,
    distortion_limit: Option<usize>,
) -> Vec<Bundle> {
    let mut groups: Vec<(Coverage, Vec<DerivationId>)> = Vec::new();
    for &id in order {
        let coverage = &arena.get(id).coverage;
        match groups.iter_mut().find(|(c, _)| c == coverage) {
            Some((_, members)) => members.push(id),
            None => groups.push((coverage.clone(), vec![id])),
        }
    }

    let mut bundles = Vec::new();
    for (coverage, members) in groups {
        for span in open_spans(&coverage, width, distortion_limit) {
            let rules = grid.span_rules(span);
            if !rules.is_empty() {
                bundles.push(Bundle::new(members.clone(), rules.to_vec(), span));
            }
        }
    }
    bundles
}
