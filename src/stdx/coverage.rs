//! Heap-backed bitset over source positions.
//!
//! [`Coverage`] stores bits in `u64` words and guarantees that padding bits
//! (indices beyond the logical length) remain zero. Keeping padding bits zero
//! makes the set safe to hash and compare without masking, which matters here
//! because coverage sets key the recombination registry.
//!
//! The operation set is shaped by the search loop: span set/test, union,
//! overlap checks against a candidate span, cardinality, and iteration over
//! maximal uncovered runs ("gaps").

use crate::api::Span;

/// Computes the number of `u64` words needed to store `n` bits.
const fn words_for_bits(n: usize) -> usize {
    n.div_ceil(64)
}

/// Bitset over the positions of one source sentence.
///
/// All indexing operations panic when `idx >= len`. A position is "covered"
/// when its bit is set.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Coverage {
    words: Vec<u64>,
    len: usize,
}

impl Coverage {
    /// Creates an empty coverage set for a sentence of `len` tokens.
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0u64; words_for_bits(len)],
            len,
        }
    }

    /// Number of addressable positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no positions are covered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Returns `true` when every position is covered.
    pub fn is_full(&self) -> bool {
        self.cardinality() == self.len
    }

    /// Tests a single position.
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        assert!(idx < self.len, "coverage index out of bounds");
        self.words[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    /// Covers a single position.
    #[inline]
    pub fn set(&mut self, idx: usize) {
        assert!(idx < self.len, "coverage index out of bounds");
        self.words[idx / 64] |= 1u64 << (idx % 64);
    }

    /// Covers every position in `span`.
    pub fn set_span(&mut self, span: Span) {
        assert!(span.end as usize <= self.len, "span out of bounds");
        for idx in span.start..span.end {
            self.words[idx as usize / 64] |= 1u64 << (idx % 64);
        }
    }

    /// Returns `true` when any position in `span` is already covered.
    pub fn overlaps_span(&self, span: Span) -> bool {
        assert!(span.end as usize <= self.len, "span out of bounds");
        (span.start..span.end).any(|idx| self.words[idx as usize / 64] & (1u64 << (idx % 64)) != 0)
    }

    /// Unions `other` into `self`. Both sets must have the same length.
    pub fn union_with(&mut self, other: &Coverage) {
        assert_eq!(self.len, other.len, "coverage length mismatch");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= o;
        }
    }

    /// Counts covered positions; never exceeds `len`.
    pub fn cardinality(&self) -> usize {
        let total: usize = self.words.iter().map(|w| w.count_ones() as usize).sum();
        debug_assert!(total <= self.len);
        total
    }

    /// First uncovered position at or after `from`, if any.
    pub fn next_clear_from(&self, from: usize) -> Option<usize> {
        let mut idx = from;
        while idx < self.len {
            let word = !self.words[idx / 64] >> (idx % 64);
            if word != 0 {
                let found = idx + word.trailing_zeros() as usize;
                return (found < self.len).then_some(found);
            }
            idx = (idx / 64 + 1) * 64;
        }
        None
    }

    /// First covered position at or after `from`, if any.
    pub fn next_set_from(&self, from: usize) -> Option<usize> {
        let mut idx = from;
        while idx < self.len {
            let word = self.words[idx / 64] >> (idx % 64);
            if word != 0 {
                let found = idx + word.trailing_zeros() as usize;
                debug_assert!(found < self.len);
                return Some(found);
            }
            idx = (idx / 64 + 1) * 64;
        }
        None
    }

    /// Iterates the maximal uncovered runs in ascending order.
    pub fn gaps(&self) -> Gaps<'_> {
        Gaps {
            coverage: self,
            pos: 0,
        }
    }
}

impl std::fmt::Debug for Coverage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Coverage[")?;
        for idx in 0..self.len {
            write!(f, "{}", if self.get(idx) { '1' } else { '0' })?;
        }
        write!(f, "]")
    }
}

/// Iterator over maximal uncovered runs, yielding one [`Span`] per gap.
pub struct Gaps<'a> {
    coverage: &'a Coverage,
    pos: usize,
}

impl Iterator for Gaps<'_> {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        let start = self.coverage.next_clear_from(self.pos)?;
        let end = self
            .coverage
            .next_set_from(start)
            .unwrap_or(self.coverage.len);
        self.pos = end;
        Some(Span::new(start as u32, end as u32))
    }
}
