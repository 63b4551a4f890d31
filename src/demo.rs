//! Toy translation system shared by the integration tests and benches.
//!
//! A hand-curated French-to-English fragment: small enough to reason about
//! by hand, rich enough to exercise multi-word rules, rival translations,
//! and LM context effects. [`synthetic_system`] builds arbitrarily wide
//! grammars for throughput benchmarks.

use crate::api::{DecoderConfig, Rule, Vocabulary};
use crate::lm::NgramTable;
use crate::scorer::{LmFeaturizer, Scorer};
use crate::search::Decoder;
use crate::table::PhraseTable;

/// One translation-model feature per rule; the featurizer appends the LM
/// score and the word penalty.
pub const RULE_FEATURES: usize = 1;

/// Vocabulary, phrase table, and language model for one toy system.
pub struct DemoSystem {
    pub vocab: Vocabulary,
    pub table: PhraseTable,
    pub lm: NgramTable,
}

impl DemoSystem {
    /// Fresh featurizer (with its own LM cache) over this system's model.
    pub fn featurizer(&self) -> LmFeaturizer<NgramTable> {
        LmFeaturizer::new(self.lm.clone(), RULE_FEATURES)
    }

    /// Weights: translation model, language model, word penalty.
    pub fn scorer(&self) -> Scorer {
        Scorer::new(vec![1.0, 0.5, 0.2])
    }

    pub fn decoder(&self, config: DecoderConfig) -> Decoder<&PhraseTable, LmFeaturizer<NgramTable>> {
        Decoder::new(&self.table, self.featurizer(), self.scorer(), config)
    }
}

/// Test-sized search configuration.
pub fn demo_config() -> DecoderConfig {
    DecoderConfig {
        beam_capacity: 16,
        ..DecoderConfig::default()
    }
}

/// The hand-curated French-to-English fragment.
pub fn demo_system() -> DemoSystem {
    let mut vocab = Vocabulary::new();
    let mut table = PhraseTable::new(RULE_FEATURES);

    let entries: &[(&str, &str, f32)] = &[
        ("la", "the", -0.1),
        ("le", "the", -0.1),
        ("maison", "house", -0.2),
        ("maison", "home", -0.8),
        ("la maison", "the house", -0.1),
        ("bleue", "blue", -0.3),
        ("la maison bleue", "the blue house", -0.2),
        ("chat", "cat", -0.2),
        ("le chat", "the cat", -0.15),
        ("noir", "black", -0.3),
        ("chien", "dog", -0.2),
    ];
    for &(src, tgt, tm) in entries {
        let rule = Rule {
            source: vocab.intern_all(src),
            target: vocab.intern_all(tgt),
            features: vec![tm],
        };
        table.insert(rule).expect("demo rule is well formed");
    }

    let mut lm = NgramTable::new(2, -3.0);
    let bigrams: &[(&str, &str, f64)] = &[
        ("", "the", -0.5),
        ("the", "house", -0.5),
        ("the", "home", -1.5),
        ("the", "blue", -1.0),
        ("blue", "house", -0.4),
        ("the", "cat", -0.6),
        ("the", "dog", -0.7),
        ("the", "black", -1.1),
        ("black", "cat", -0.3),
        ("black", "dog", -0.5),
        ("cat", "the", -1.8),
        ("house", "the", -1.9),
    ];
    for &(ctx, next, p) in bigrams {
        let context = if ctx.is_empty() {
            Vec::new()
        } else {
            vec![vocab.intern(ctx)]
        };
        lm.set(&context, vocab.intern(next), p);
    }

    DemoSystem { vocab, table, lm }
}

/// A monotone synthetic grammar: `width` source tokens, `options` rival
/// single-word translations each, plus adjacent two-word rules. Scores are
/// deterministic so benchmark runs are comparable.
pub fn synthetic_system(width: usize, options: usize) -> DemoSystem {
    assert!(width > 0 && options > 0);
    let mut vocab = Vocabulary::new();
    let mut table = PhraseTable::new(RULE_FEATURES);
    let mut lm = NgramTable::new(2, -4.0);

    let spread = |i: usize, j: usize| -(((i * 7 + j * 13) % 10) as f32) / 10.0 - 0.1;

    for i in 0..width {
        let src = vocab.intern(&format!("s{i}"));
        for j in 0..options {
            let tgt = vocab.intern(&format!("t{i}_{j}"));
            table
                .insert(Rule {
                    source: vec![src],
                    target: vec![tgt],
                    features: vec![spread(i, j)],
                })
                .expect("synthetic rule is well formed");
            lm.set(&[], tgt, -1.0 + f64::from(spread(i, j)));
        }
    }
    for i in 0..width.saturating_sub(1) {
        let a = vocab.get(&format!("s{i}")).expect("interned above");
        let b = vocab.get(&format!("s{}", i + 1)).expect("interned above");
        let tgt = vocab.intern(&format!("t{i}_{}", i + 1));
        table
            .insert(Rule {
                source: vec![a, b],
                target: vec![tgt],
                features: vec![spread(i, i + 1) - 0.2],
            })
            .expect("synthetic rule is well formed");
    }

    DemoSystem { vocab, table, lm }
}
