//! Forced and prefix-constrained decoding against the output space.

use phrasebeam::{
    DecodeRequest, DecodeStatus, Decoder, DecoderConfig, FailureKind, OutputSpace, PhraseTable,
    Rule, RuleFeaturizer, Scorer, Vocabulary,
};

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
fn forced_decoding_recovers_the_reference() {
    let mut vocab = Vocabulary::new();
    let table = build_table(
        &mut vocab,
        &[
            ("a", "X", 0.2),
            ("a", "W", 0.9), // higher-scoring distractor
            ("b", "Y", 0.2),
            ("c", "Z", 0.2),
        ],
    );
    let source = vocab.intern_all("a b c");
    let reference = vocab.intern_all("X Y Z");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.constraint = OutputSpace::ForcedTarget {
        reference: reference.clone(),
    };
    let result = dec.decode(&req);

    assert_eq!(result.status, DecodeStatus::Success);
    assert_eq!(result.best().unwrap().target, reference);
}

#[test]
fn unreachable_reference_is_unsatisfiable() {
    let mut vocab = Vocabulary::new();
    let table = build_table(&mut vocab, &[("a", "X", 0.5), ("b", "Y", 0.5)]);
    let source = vocab.intern_all("a b");
    let reference = vocab.intern_all("X Q");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.constraint = OutputSpace::ForcedTarget { reference };
    let result = dec.decode(&req);

    assert_eq!(
        result.status,
        DecodeStatus::Failed(FailureKind::ConstraintUnsatisfiable)
    );
    assert!(result.hypotheses.is_empty());
}

#[test]
fn prefix_constraint_overrides_a_better_open_path() {
    let mut vocab = Vocabulary::new();
    let table = build_table(
        &mut vocab,
        &[
            ("a", "X", 0.2),
            ("a", "W", 0.9), // would win unconstrained
            ("b", "Y", 0.5),
        ],
    );
    let source = vocab.intern_all("a b");
    let prefix = vocab.intern_all("X");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.constraint = OutputSpace::TargetPrefix {
        prefix: prefix.clone(),
    };
    let result = dec.decode(&req);

    assert_eq!(result.status, DecodeStatus::Success);
    let best = result.best().unwrap();
    assert_eq!(best.target[..1], prefix[..]);
    assert_eq!(vocab.render(&best.target), "X Y");
    assert!(result.stats.constraint_rejections >= 1);
}

#[test]
fn forced_decoding_falls_back_to_partial_coverage() {
    let mut vocab = Vocabulary::new();
    // "a" alone emits the whole reference, so covering "b" as well would
    // overrun it; the best acceptable hypothesis leaves "b" uncovered.
    let table = build_table(&mut vocab, &[("a", "X Y", 0.5), ("b", "Y", 0.5)]);
    let source = vocab.intern_all("a b");
    let reference = vocab.intern_all("X Y");

    let mut dec = decoder(&table, DecoderConfig::default());
    let mut req = DecodeRequest::new(&source, 0);
    req.constraint = OutputSpace::ForcedTarget {
        reference: reference.clone(),
    };
    let result = dec.decode(&req);

    assert_eq!(
        result.status,
        DecodeStatus::PartialCoverage {
            covered: 1,
            total: 2
        }
    );
    assert_eq!(result.best().unwrap().target, reference);
    assert!(result.stats.constraint_rejections >= 1);
}
