use std::fmt;

use super::{shl, shr, Alphabet, AlphabetError, BITS_PER_BASE};

/// Number of bases encoded per `u64` word.
const BASES_PER_WORD: usize = 32;

/// Node sequence packed at two bits per base, left-aligned and MSB-first.
///
/// Base `i` of a word occupies bits `[62 - 2i, 63 - 2i]`. The word count is
/// always `ceil(len / 32)`, so an empty sequence owns no words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PackedSequence {
    words: Vec<u64>,
    len: usize,
}

impl PackedSequence {
    /// Pack `bases` through `alphabet`.
    pub fn encode(bases: &[u8], alphabet: &Alphabet) -> Self {
        let mut words = vec![0u64; words_for_len(bases.len())];
        for (idx, &base) in bases.iter().enumerate() {
            let (word_idx, shift) = word_position(idx);
            words[word_idx] |= u64::from(alphabet.code(base)) << shift;
        }
        Self {
            words,
            len: bases.len(),
        }
    }

    /// Adopt already packed words, checking the word count against `len`.
    pub fn from_words(words: Vec<u64>, len: usize) -> Result<Self, AlphabetError> {
        let expected = words_for_len(len);
        if words.len() != expected {
            return Err(AlphabetError::WordCountMismatch {
                len,
                expected,
                found: words.len(),
            });
        }
        Ok(Self { words, len })
    }

    /// Number of bases.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no bases are stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    /// Number of packed words.
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Word `idx`, or 0 past the end.
    #[inline]
    pub fn word(&self, idx: usize) -> u64 {
        self.words.get(idx).copied().unwrap_or(0)
    }

    /// 2-bit code of base `idx`.
    pub fn code_at(&self, idx: usize) -> Option<u8> {
        if idx >= self.len {
            return None;
        }
        let (word_idx, shift) = word_position(idx);
        Some(((self.words[word_idx] >> shift) & 0b11) as u8)
    }

    /// Concatenate `other` onto the end of this sequence.
    ///
    /// When the current length is not a multiple of 32, every word of
    /// `other` is split across the current tail word and a fresh one.
    pub fn append(&mut self, other: &PackedSequence) {
        if other.is_empty() {
            return;
        }
        let offset = (self.len % BASES_PER_WORD) as u32 * BITS_PER_BASE;
        if offset == 0 {
            self.words.extend_from_slice(&other.words);
        } else {
            for &word in &other.words {
                if let Some(last) = self.words.last_mut() {
                    *last |= shr(word, offset);
                }
                self.words.push(shl(word, 64 - offset));
            }
        }
        self.len += other.len;
        self.words.truncate(words_for_len(self.len));
    }

    /// Decode to uppercase symbols.
    pub fn decode(&self, alphabet: &Alphabet) -> String {
        self.codes().map(|code| alphabet.symbol(code) as char).collect()
    }

    /// Iterate over the 2-bit codes.
    pub fn codes(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len).filter_map(move |idx| self.code_at(idx))
    }
}

impl fmt::Display for PackedSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decode(&Alphabet::default()))
    }
}

pub(crate) fn words_for_len(len: usize) -> usize {
    len.div_ceil(BASES_PER_WORD)
}

fn word_position(idx: usize) -> (usize, u32) {
    let word_idx = idx / BASES_PER_WORD;
    let offset = (idx % BASES_PER_WORD) as u32;
    (word_idx, 62 - offset * BITS_PER_BASE)
}
