//! End-to-end decoding over small hand-built grammars: search optimality,
//! n-best, recombination, partial coverage, determinism, and batch decoding.

use phrasebeam::{
    decode_batch, DecodeRequest, DecodeStatus, Decoder, DecoderConfig, FailureKind, PhraseTable,
    Rule, RuleFeaturizer, Scorer, Vocabulary,
};

/// Builds a table of `(source, target, tm)` rules. Tests score with weights
/// `[1.0, 0.0]` so a hypothesis score is just the sum of its rules' `tm`
/// values.
fn build_table(vocab: &mut Vocabulary, entries: &[(&str, &str, f32)]) -> PhraseTable {
    let mut table = PhraseTable::new(1);
    for &(src, tgt, tm) in entries {
        table
            .insert(Rule {
                source: vocab.intern_all(src),
                target: vocab.intern_all(tgt),
                features: vec![tm],
            })
            .unwrap();
    }
    table
}

fn decoder(table: &PhraseTable, config: DecoderConfig) -> Decoder<&PhraseTable, RuleFeaturizer> {
    Decoder::new(
        table,
        RuleFeaturizer::new(1),
        Scorer::new(vec![1.0, 0.0]),
        config,
    )
}

#[test]
fn multi_word_rule_beats_word_by_word_path() {
    let mut vocab = Vocabulary::new();
    let table = build_table(
        &mut vocab,
        &[("a b", "X", 1.0), ("a", "Y", 0.3), ("b", "Z", 0.3)],
    );
    let source = vocab.intern_all("a b");

    let mut dec = decoder(&table, DecoderConfig::default());
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(result.status, DecodeStatus::Success);
    let best = result.best().unwrap();
    assert_eq!(vocab.render(&best.target), "X");
    assert!((best.score - 1.0).abs() < 1e-9);
}

#[test]
fn beam_of_one_still_finds_the_outscoring_phrase() {
    let mut vocab = Vocabulary::new();
    let table = build_table(
        &mut vocab,
        &[("a b", "X", 1.0), ("a", "Y", 0.3), ("b", "Z", 0.3)],
    );
    let source = vocab.intern_all("a b");

    let config = DecoderConfig {
        beam_capacity: 1,
        ..DecoderConfig::default()
    };
    let mut dec = decoder(&table, config);
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(result.status, DecodeStatus::Success);
    assert_eq!(vocab.render(&result.best().unwrap().target), "X");
}

#[test]
fn nbest_returns_ranked_rivals() {
    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.9), ("a", "Y", 0.5)]);
    let source = vocab.intern_all("a");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.nbest = 2;
    let result = dec.decode(&req);

    assert_eq!(result.status, DecodeStatus::Success);
    assert_eq!(result.hypotheses.len(), 2);
    assert_eq!(vocab.render(&result.hypotheses[0].target), "X");
    assert_eq!(vocab.render(&result.hypotheses[1].target), "Y");
    assert!(result.hypotheses[0].score > result.hypotheses[1].score);
}

#[test]
fn equal_state_derivations_recombine() {
    let mut vocab = Vocabulary::new();
    // Two rules with identical source, target, and span; only scores differ.
    let table = build_table(
        &mut vocab,
        &[("a", "X", 0.9), ("a", "X", 0.7), ("b", "Z", 0.1)],
    );
    let source = vocab.intern_all("a b");

    let mut dec = decoder(&table, DecoderConfig::default());
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(result.status, DecodeStatus::Success);
    assert!(result.stats.recombined >= 1, "duplicate state must merge");
    let best = result.best().unwrap();
    // Feature values are f32, so the sum carries single-precision error.
    assert!((best.score - 1.0).abs() < 1e-6, "better duplicate survives");
}

#[test]
fn uncoverable_position_yields_partial_coverage() {
    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.5), ("b", "Y", 0.5)]);
    let source = vocab.intern_all("a b c"); // no rule for "c"

    let mut dec = decoder(&table, DecoderConfig::default());
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(
        result.status,
        DecodeStatus::PartialCoverage {
            covered: 2,
            total: 3
        }
    );
    assert!(!result.stats.grid_coverage_complete);
    let best = result.best().unwrap();
    assert_eq!(vocab.render(&best.target), "X Y");
}

#[test]
fn empty_source_fails_cleanly() {
    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.5)]);

    let mut dec = decoder(&table, DecoderConfig::default());
    let result = dec.decode(&DecodeRequest::new(&[], 0));

    assert_eq!(
        result.status,
        DecodeStatus::Failed(FailureKind::EmptySource)
    );
    assert!(result.hypotheses.is_empty());
}

#[test]
fn no_applicable_rules_exhausts_search() {
    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.5)]);
    let source = vocab.intern_all("q r");

    let mut dec = decoder(&table, DecoderConfig::default());
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(
        result.status,
        DecodeStatus::Failed(FailureKind::SearchExhausted)
    );
    assert_eq!(result.stats.rules_queried, 0);
}

#[test]
fn repeated_decodes_are_identical() {
    let mut vocab = Vocabulary::new();
    let table = build_table(
        &mut vocab,
        &[
            ("a", "X", 0.4),
            ("a", "Y", 0.4),
            ("b", "Z", 0.2),
            ("a b", "W", 0.7),
        ],
    );
    let source = vocab.intern_all("a b");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.nbest = 4;
    let first = dec.decode(&req);
    let second = dec.decode(&req);

    assert_eq!(first.status, second.status);
    assert_eq!(first.stats, second.stats);
    let targets = |r: &phrasebeam::DecodeResult| {
        r.hypotheses
            .iter()
            .map(|h| (h.target.clone(), h.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(targets(&first), targets(&second));
}

#[test]
fn reranker_reorders_frozen_beams() {
    use phrasebeam::beam::Reranker;
    use phrasebeam::derivation::{DerivationArena, DerivationId};

    struct Reverse;
    impl Reranker for Reverse {
        fn rerank(&mut self, _arena: &DerivationArena, order: &mut Vec<DerivationId>) {
            order.reverse();
        }
    }

    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.9), ("a", "Y", 0.5)]);
    let source = vocab.intern_all("a");

    let mut dec = decoder(&table, DecoderConfig::default()).with_reranker(Box::new(Reverse));
    let mut req = DecodeRequest::new(&source, 0);
    req.nbest = 2;
    let result = dec.decode(&req);

    // The hook inverted the final beam's ranking, so the weaker rival leads.
    assert_eq!(result.status, DecodeStatus::Success);
    assert_eq!(vocab.render(&result.hypotheses[0].target), "Y");
    assert_eq!(vocab.render(&result.hypotheses[1].target), "X");
}

#[test]
fn language_model_context_picks_the_fluent_translation() {
    let mut sys = phrasebeam::demo::demo_system();
    let source = sys.vocab.intern_all("la maison");

    let mut dec = sys.decoder(phrasebeam::demo::demo_config());
    let result = dec.decode(&DecodeRequest::new(&source, 0));

    assert_eq!(result.status, DecodeStatus::Success);
    let best = result.best().unwrap();
    assert_eq!(sys.vocab.render(&best.target), "the house");
    // tm -0.1, lm -1.0 * 0.5, word penalty -2 * 0.2
    assert!((best.score - (-1.0)).abs() < 1e-6);
}

#[test]
fn rule_source_sees_request_properties() {
    use std::sync::Arc;

    use phrasebeam::{InputProperties, RuleSource, Span, Token};

    /// Backend that swaps rule inventories based on a request property.
    struct DomainTable {
        general: PhraseTable,
        medical: PhraseTable,
    }

    impl RuleSource for DomainTable {
        fn rules_for(
            &self,
            source: &[Token],
            properties: &InputProperties,
            sentence_id: u64,
        ) -> Vec<(Arc<Rule>, Span)> {
            let table = match properties.get("domain") {
                Some("medical") => &self.medical,
                _ => &self.general,
            };
            table.rules_for(source, properties, sentence_id)
        }

        fn max_source_len(&self) -> usize {
            self.general.max_source_len().max(self.medical.max_source_len())
        }
    }

    let mut vocab = Vocabulary::new();
    let source_table = DomainTable {
        general: build_table(&mut vocab, &[("a", "X", 0.5)]),
        medical: build_table(&mut vocab, &[("a", "M", 0.5)]),
    };
    let source = vocab.intern_all("a");

    let mut dec = Decoder::new(
        &source_table,
        RuleFeaturizer::new(1),
        Scorer::new(vec![1.0, 0.0]),
        DecoderConfig::default(),
    );

    let general = dec.decode(&DecodeRequest::new(&source, 0));
    assert_eq!(vocab.render(&general.best().unwrap().target), "X");

    let mut req = DecodeRequest::new(&source, 0);
    req.properties.set("domain", "medical");
    let medical = dec.decode(&req);
    assert_eq!(vocab.render(&medical.best().unwrap().target), "M");
}

#[test]
fn batch_results_come_back_in_request_order() {
    let mut sys = phrasebeam::demo::demo_system();
    let s1 = sys.vocab.intern_all("la maison");
    let s2 = sys.vocab.intern_all("le chat noir");
    let s3 = sys.vocab.intern_all("la maison bleue");
    let requests = vec![
        DecodeRequest::new(&s1, 1),
        DecodeRequest::new(&s2, 2),
        DecodeRequest::new(&s3, 3),
    ];

    let scorer = sys.scorer();
    let config = phrasebeam::demo::demo_config();
    let results = decode_batch(
        &&sys.table,
        &scorer,
        &config,
        || sys.featurizer(),
        &requests,
        2,
    );

    assert_eq!(results.len(), 3);
    let rendered: Vec<String> = results
        .iter()
        .map(|r| sys.vocab.render(&r.best().unwrap().target))
        .collect();
    assert_eq!(rendered[0], "the house");
    assert_eq!(rendered[1], "the black cat");
    assert_eq!(rendered[2], "the blue house");

    // Batch output matches sequential decoding exactly.
    let mut dec = sys.decoder(config);
    for (req, batch) in requests.iter().zip(&results) {
        let solo = dec.decode(req);
        assert_eq!(solo.status, batch.status);
        assert_eq!(solo.best().unwrap().target, batch.best().unwrap().target);
    }
}
