//! Cube-pruning beam search: the decoder entry point.
//!
//! One decode is a pure function of the request and the shared collaborators
//! (rule source, scorer, featurizer): `INIT` builds the rule grid and the
//! future-cost table and seeds the root beam; `EXPAND(i)` grows coverage
//! cardinality `i` by popping a priority frontier seeded from the hyperedge
//! bundles of retained beams; `SELECT` scans beams from full coverage down
//! for the best final-acceptable derivation; `DONE` reconstructs the target
//! and feature breakdown by walking the antecedent chain.
//!
//! Determinism: frontier ties break on derivation creation sequence, so the
//! same request against the same resources always yields the same result.
//!
//! Decoding one sentence is synchronous, single-threaded, and owns all of
//! its state; [`decode_batch`] parallelizes across sentences only, giving
//! each worker its own featurizer (and therefore its own LM cache).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::mpsc;
use std::time::Instant;

use crate::api::{
    DecodeRequest, DecodeResult, DecodeStats, DecodeStatus, DecoderConfig, FailureKind,
    Hypothesis, Token,
};
use crate::beam::{Beam, PutOutcome, RecombinationPolicy, Reranker};
use crate::bundle::{build_bundles, Bundle, Consequent};
use crate::derivation::{Derivation, DerivationArena, DerivationId};
use crate::grid::{ConcreteRule, RuleGrid};
use crate::heuristic::FutureCostTable;
use crate::output_space::OutputSpace;
use crate::scorer::{ExtendContext, Featurizer, Scorer};
use crate::table::RuleSource;

/// Frontier entry: a materialized derivation plus the bundle cell that
/// produced it, so its cube neighbors can be generated on pop.
struct FrontierItem {
    priority: f64,
    seq: u64,
    derivation: DerivationId,
    consequent: Consequent,
}

impl PartialEq for FrontierItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierItem {}

impl PartialOrd for FrontierItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher priority first, then earlier creation.
        self.priority
            .total_cmp(&other.priority)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Phrase-based cube-pruning decoder.
///
/// Owns (or borrows) its collaborators; weights and rules are read-only for
/// the lifetime of a batch.
pub struct Decoder<R, F> {
    rules: R,
    featurizer: F,
    scorer: Scorer,
    config: DecoderConfig,
    reranker: Option<Box<dyn Reranker>>,
}

impl<R: RuleSource, F: Featurizer> Decoder<R, F> {
    pub fn new(rules: R, featurizer: F, scorer: Scorer, config: DecoderConfig) -> Self {
        debug_assert_eq!(featurizer.num_features(), scorer.num_features());
        Self {
            rules,
            featurizer,
            scorer,
            config,
            reranker: None,
        }
    }

    /// Installs a post-beam rescoring hook, invoked once per frozen beam.
    pub fn with_reranker(mut self, reranker: Box<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decodes one sentence. Always returns a (possibly empty) ranked list
    /// plus a status and the run's diagnostic counters; never panics on
    /// unreachable coverage or unsatisfiable constraints.
    pub fn decode(&mut self, req: &DecodeRequest<'_>) -> DecodeResult {
        let mut stats = DecodeStats::default();
        let n = req.source.len();
        if n == 0 {
            return failed(FailureKind::EmptySource, stats);
        }

        // INIT: rules, constraint filtering, grid, future costs, root beam.
        self.featurizer.begin_sentence(req.source);
        let raw = self
            .rules
            .rules_for(req.source, &req.properties, req.sentence_id);
        stats.rules_queried = raw.len() as u64;
        let concrete: Vec<ConcreteRule> = raw
            .into_iter()
            .map(|(rule, span)| {
                let features = self.featurizer.isolation(&rule);
                let isolation_score = self.scorer.combine(&features);
                ConcreteRule {
                    rule,
                    span,
                    isolation_score,
                }
            })
            .collect();
        let filtered = req.constraint.filter(concrete);
        stats.rules_after_filter = filtered.len() as u64;
        let grid = RuleGrid::build(filtered, n, self.config.rule_query_limit);
        stats.grid_coverage_complete = grid.coverage_complete();
        let table = FutureCostTable::build(&grid);
        let policy = RecombinationPolicy {
            context_window: self.config.context_window,
        };

        let capacity = self.config.beam_capacity;
        let mut arena = DerivationArena::new();
        let root = arena.root(n, table.total(), self.featurizer.num_features());
        stats.derivations_generated = 1;

        let mut beams: Vec<Beam> = (0..=n).map(|i| Beam::new(i, capacity)).collect();
        beams[0].put(&arena, &policy, root);
        // Frozen best-first orders per beam; retained past beam retirement
        // because SELECT's partial-coverage fallback reads them.
        let mut orders: Vec<Vec<DerivationId>> = vec![Vec::new(); n + 1];
        orders[0] = vec![root];

        let max_width = grid.max_span_width().max(1);
        let rejection_budget = (capacity as u64)
            .saturating_mul(self.config.rejection_factor as u64)
            .max(1);

        // EXPAND(i): one pass per coverage cardinality.
        for i in 1..=n {
            let window_start = i.saturating_sub(max_width);
            for beam in beams[..window_start].iter_mut() {
                if !beam.is_retired() {
                    beam.retire();
                    DecodeStats::bump(&mut stats.beams_retired);
                }
            }

            let mut bundles: Vec<Bundle> = Vec::new();
            let mut frontier: BinaryHeap<FrontierItem> = BinaryHeap::new();
            let mut rejections_left = rejection_budget;

            for j in window_start..i {
                if orders[j].is_empty() {
                    continue;
                }
                let width = i - j;
                for bundle in
                    build_bundles(&orders[j], &arena, &grid, width, self.config.distortion_limit)
                {
                    let idx = bundles.len() as u32;
                    bundles.push(bundle);
                    generate_successors(
                        &mut self.featurizer,
                        &self.scorer,
                        &req.constraint,
                        req.source,
                        self.config.context_window,
                        &grid,
                        &table,
                        &mut bundles,
                        idx,
                        None,
                        &mut arena,
                        &mut frontier,
                        &mut stats,
                        &mut rejections_left,
                    );
                }
            }

            let mut popped = 0usize;
            while popped < capacity {
                if let Some(deadline) = req.deadline {
                    if Instant::now() >= deadline {
                        return failed(FailureKind::DeadlineExceeded, stats);
                    }
                }
                let Some(item) = frontier.pop() else { break };
                DecodeStats::bump(&mut stats.frontier_pops);
                match beams[i].put(&arena, &policy, item.derivation) {
                    PutOutcome::Inserted => {}
                    PutOutcome::ReplacedIncumbent | PutOutcome::Discarded => {
                        DecodeStats::bump(&mut stats.recombined);
                    }
                    PutOutcome::InsertedEvictingWorst => {
                        DecodeStats::bump(&mut stats.evicted);
                    }
                }
                popped += 1;
                generate_successors(
                    &mut self.featurizer,
                    &self.scorer,
                    &req.constraint,
                    req.source,
                    self.config.context_window,
                    &grid,
                    &table,
                    &mut bundles,
                    item.consequent.bundle,
                    Some(item.consequent),
                    &mut arena,
                    &mut frontier,
                    &mut stats,
                    &mut rejections_left,
                );
            }

            let mut order = beams[i].ranked(&arena);
            if let Some(reranker) = self.reranker.as_mut() {
                reranker.rerank(&arena, &mut order);
            }
            orders[i] = order;
        }

        // SELECT: best final-acceptable derivations, highest coverage first.
        let mut selected: Option<(usize, Vec<DerivationId>)> = None;
        for i in (1..=n).rev() {
            let acceptable: Vec<DerivationId> = orders[i]
                .iter()
                .copied()
                .filter(|&id| {
                    let d = arena.get(id);
                    req.constraint
                        .allowable_final(d.target_len as usize, d.is_root())
                })
                .take(req.nbest.max(1))
                .collect();
            if !acceptable.is_empty() {
                selected = Some((i, acceptable));
                break;
            }
        }

        // DONE: reconstruct along antecedent chains.
        match selected {
            Some((cardinality, ids)) => {
                let status = if cardinality == n {
                    DecodeStatus::Success
                } else {
                    DecodeStatus::PartialCoverage {
                        covered: cardinality,
                        total: n,
                    }
                };
                let hypotheses = ids
                    .into_iter()
                    .map(|id| {
                        let (target, features) = arena.reconstruct(id, &grid);
                        Hypothesis {
                            target,
                            score: arena.get(id).score,
                            features,
                        }
                    })
                    .collect();
                DecodeResult {
                    status,
                    hypotheses,
                    stats,
                }
            }
            None => {
                let constrained_away = req.constraint.is_constrained()
                    && (stats.constraint_rejections > 0
                        || stats.rules_after_filter < stats.rules_queried);
                let kind = if constrained_away {
                    FailureKind::ConstraintUnsatisfiable
                } else {
                    FailureKind::SearchExhausted
                };
                failed(kind, stats)
            }
        }
    }
}

fn failed(kind: FailureKind, stats: DecodeStats) -> DecodeResult {
    DecodeResult {
        status: DecodeStatus::Failed(kind),
        hypotheses: Vec::new(),
        stats,
    }
}

/// Generates the unexplored cube neighbors of `from` (or a bundle's top
/// cell when `from` is `None`), materializing each consequent the output
/// space allows and pushing it onto the frontier.
///
/// A rejected consequent still expands: its own neighbors are queued so
/// later cells stay reachable, bounded by `rejections_left` to guarantee
/// termination under unsatisfiable constraints.
#[allow(clippy::too_many_arguments)]
fn generate_successors<F: Featurizer>(
    featurizer: &mut F,
    scorer: &Scorer,
    constraint: &OutputSpace,
    source: &[Token],
    context_window: usize,
    grid: &RuleGrid,
    table: &FutureCostTable,
    bundles: &mut [Bundle],
    bundle_idx: u32,
    from: Option<Consequent>,
    arena: &mut DerivationArena,
    frontier: &mut BinaryHeap<FrontierItem>,
    stats: &mut DecodeStats,
    rejections_left: &mut u64,
) {
    let mut pending: Vec<Consequent> = Vec::new();
    bundles[bundle_idx as usize].successors(bundle_idx, from, &mut pending);

    while let Some(consequent) = pending.pop() {
        let bundle = &mut bundles[consequent.bundle as usize];
        let ante_id = bundle.antecedent(consequent.ante_rank);
        let rule_id = bundle.rule(consequent.rule_rank);
        let span = bundle.span();
        let concrete = grid.rule(rule_id);
        let ante = arena.get(ante_id);

        if !constraint.allowable_continuation(ante.target_len as usize, &concrete.rule.target) {
            DecodeStats::bump(&mut stats.constraint_rejections);
            if *rejections_left == 0 {
                return;
            }
            *rejections_left -= 1;
            bundle.successors(consequent.bundle, Some(consequent), &mut pending);
            continue;
        }

        // Materialize: the expensive part, done at most once per cube cell.
        debug_assert!(
            !ante.coverage.overlaps_span(span),
            "rule span overlaps antecedent coverage"
        );
        let mut coverage = ante.coverage.clone();
        coverage.set_span(span);
        let features = featurizer.extend(&ExtendContext {
            source,
            tail: &ante.tail,
            target_len: ante.target_len as usize,
            rule: &concrete.rule,
            span,
        });
        let score = ante.score + scorer.combine(&features);
        let heuristic = table.outside(&coverage);
        let target_len = ante.target_len + concrete.rule.target.len() as u32;
        let mut tail = ante.tail.clone();
        tail.extend_from_slice(&concrete.rule.target);
        let excess = tail.len().saturating_sub(context_window);
        tail.drain(..excess);

        let seq = arena.next_seq();
        let derivation = Derivation {
            score,
            heuristic,
            coverage,
            target_len,
            rule: Some(rule_id),
            antecedent: Some(ante_id),
            features,
            tail,
            seq,
        };
        let priority = derivation.priority();
        let id = arena.push(derivation);
        DecodeStats::bump(&mut stats.derivations_generated);
        frontier.push(FrontierItem {
            priority,
            seq,
            derivation: id,
            consequent,
        });
    }
}

/// Decodes independent sentences concurrently on `workers` threads.
///
/// Each worker builds its own featurizer via `make_featurizer`, so any
/// language-model cache stays worker-private (see [`crate::lm`]). The rule
/// source and scorer are shared read-only. Results come back in request
/// order.
pub fn decode_batch<R, F, M>(
    rules: &R,
    scorer: &Scorer,
    config: &DecoderConfig,
    make_featurizer: M,
    requests: &[DecodeRequest<'_>],
    workers: usize,
) -> Vec<DecodeResult>
where
    R: RuleSource,
    F: Featurizer,
    M: Fn() -> F + Sync,
{
    if requests.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, requests.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, DecodeResult)>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let make_featurizer = &make_featurizer;
            scope.spawn(move || {
                let mut decoder =
                    Decoder::new(rules, make_featurizer(), scorer.clone(), config.clone());
                loop {
                    let idx = next.fetch_add(1, AtomicOrdering::Relaxed);
                    let Some(req) = requests.get(idx) else { break };
                    let result = decoder.decode(req);
                    if tx.send((idx, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);
    });

    let mut slots: Vec<Option<DecodeResult>> = (0..requests.len()).map(|_| None).collect();
    for (idx, result) in rx {
        slots[idx] = Some(result);
    }
    slots
        .into_iter()
        .map(|slot| slot.expect("every request produces a result"))
        .collect()
}
