//! Two-bit nucleotide codec.
//!
//! An [`Alphabet`] assigns the codes `0..=3` to four symbols. Lookup is
//! case-insensitive, `N` maps to code 0 and so does any byte outside the
//! alphabet. K-mer values are right-justified in a `u64` with the first base
//! in the most significant position; packed sequence words are left-aligned.

mod packed;

pub use packed::PackedSequence;
pub(crate) use packed::words_for_len;

use thiserror::Error;

/// Largest k-mer (in bases) that fits in a single `u64`.
pub const MAX_KMER_LEN: usize = 32;

/// Bits used to encode a single base.
pub(crate) const BITS_PER_BASE: u32 = 2;

/// Errors raised while building or using an alphabet.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlphabetError {
    /// The alphabet does not consist of exactly four symbols.
    #[error("alphabet must contain exactly 4 symbols, got {0}")]
    InvalidLength(usize),
    /// A symbol is not an ASCII letter, or is `N`.
    #[error("invalid alphabet symbol '{0}'")]
    InvalidSymbol(char),
    /// The same letter appears twice (ignoring case).
    #[error("duplicate alphabet symbol '{0}'")]
    DuplicateSymbol(char),
    /// More than [`MAX_KMER_LEN`] bases requested from a single word.
    #[error("k-mer length {k} exceeds the maximum of 32")]
    KmerTooLong {
        /// Requested length.
        k: usize,
    },
    /// Fewer codes were supplied than the requested k-mer length.
    #[error("expected at least {expected} codes, got {found}")]
    NotEnoughCodes {
        /// Requested length.
        expected: usize,
        /// Codes available.
        found: usize,
    },
    /// Packed word count does not match the sequence length.
    #[error("sequence of {len} bases needs {expected} words, got {found}")]
    WordCountMismatch {
        /// Sequence length in bases.
        len: usize,
        /// Words required for `len`.
        expected: usize,
        /// Words supplied.
        found: usize,
    },
}

/// Mapping between four nucleotide symbols and their 2-bit codes.
#[derive(Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: [u8; 4],
    table: [u8; 256],
}

impl Alphabet {
    /// Build an alphabet from four distinct ASCII letters, code `i` being
    /// assigned to `symbols[i]`.
    pub fn new(symbols: &[u8]) -> Result<Self, AlphabetError> {
        if symbols.len() != 4 {
            return Err(AlphabetError::InvalidLength(symbols.len()));
        }

        let mut upper = [0u8; 4];
        for (code, &symbol) in symbols.iter().enumerate() {
            let symbol = symbol.to_ascii_uppercase();
            if !symbol.is_ascii_uppercase() || symbol == b'N' {
                return Err(AlphabetError::InvalidSymbol(symbols[code] as char));
            }
            if upper[..code].contains(&symbol) {
                return Err(AlphabetError::DuplicateSymbol(symbol as char));
            }
            upper[code] = symbol;
        }

        let mut table = [0u8; 256];
        for (code, &symbol) in upper.iter().enumerate() {
            table[symbol as usize] = code as u8;
            table[symbol.to_ascii_lowercase() as usize] = code as u8;
        }

        Ok(Self {
            symbols: upper,
            table,
        })
    }

    /// The four symbols in code order (uppercase).
    pub fn symbols(&self) -> [u8; 4] {
        self.symbols
    }

    /// Code for `base`; unknown bytes and `N` map to 0.
    #[inline]
    pub fn code(&self, base: u8) -> u8 {
        self.table[base as usize]
    }

    /// Symbol for the low two bits of `code`.
    #[inline]
    pub fn symbol(&self, code: u8) -> u8 {
        self.symbols[(code & 0b11) as usize]
    }

    /// Encode up to 32 bases left-aligned in a word.
    pub fn hash_max(&self, bases: &[u8]) -> Result<u64, AlphabetError> {
        check_len(bases.len())?;
        Ok(bases.iter().enumerate().fold(0u64, |acc, (i, &base)| {
            acc | (u64::from(self.code(base)) << (62 - BITS_PER_BASE * i as u32))
        }))
    }

    /// Encode up to 32 bases as a right-justified k-mer value.
    pub fn hash_min(&self, bases: &[u8]) -> Result<u64, AlphabetError> {
        let left = self.hash_max(bases)?;
        Ok(shr(left, 64 - BITS_PER_BASE * bases.len() as u32))
    }

    /// Render a right-justified k-mer value as uppercase symbols.
    pub fn decode(&self, kmer: u64, k: usize) -> Result<String, AlphabetError> {
        check_len(k)?;
        Ok((0..k)
            .map(|i| {
                let code = shr(kmer, BITS_PER_BASE * (k - 1 - i) as u32) & 0b11;
                self.symbol(code as u8) as char
            })
            .collect())
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        let mut table = [0u8; 256];
        for (code, symbol) in b"ACGT".iter().enumerate() {
            table[*symbol as usize] = code as u8;
            table[symbol.to_ascii_lowercase() as usize] = code as u8;
        }
        Self {
            symbols: *b"ACGT",
            table,
        }
    }
}

impl std::fmt::Debug for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Alphabet")
            .field(&String::from_utf8_lossy(&self.symbols))
            .finish()
    }
}

/// Pack the first `k` 2-bit codes left-aligned into one word.
pub fn pack_max(codes: &[u8], k: usize) -> Result<u64, AlphabetError> {
    check_len(k)?;
    if codes.len() < k {
        return Err(AlphabetError::NotEnoughCodes {
            expected: k,
            found: codes.len(),
        });
    }
    Ok(codes[..k].iter().enumerate().fold(0u64, |acc, (i, &code)| {
        acc | (u64::from(code & 0b11) << (62 - BITS_PER_BASE * i as u32))
    }))
}

/// Pack the first `k` 2-bit codes right-aligned into one word.
pub fn pack_min(codes: &[u8], k: usize) -> Result<u64, AlphabetError> {
    Ok(shr(pack_max(codes, k)?, 64 - BITS_PER_BASE * k as u32))
}

/// Reverse the base order of a right-justified k-mer (no complement).
pub fn reverse_kmer(kmer: u64, k: usize) -> u64 {
    (0..k).fold(0u64, |acc, i| {
        let code = shr(kmer, BITS_PER_BASE * i as u32) & 0b11;
        acc | shl(code, BITS_PER_BASE * (k - 1 - i) as u32)
    })
}

/// Mask covering the low `2k` bits.
pub fn kmer_mask(k: usize) -> u64 {
    if k >= MAX_KMER_LEN {
        u64::MAX
    } else {
        (1u64 << (BITS_PER_BASE * k as u32)) - 1
    }
}

/// `value << bits`, yielding 0 once every bit is shifted out.
#[inline]
pub(crate) fn shl(value: u64, bits: u32) -> u64 {
    value.checked_shl(bits).unwrap_or(0)
}

/// `value >> bits`, yielding 0 once every bit is shifted out.
#[inline]
pub(crate) fn shr(value: u64, bits: u32) -> u64 {
    value.checked_shr(bits).unwrap_or(0)
}

fn check_len(k: usize) -> Result<(), AlphabetError> {
    if k > MAX_KMER_LEN {
        Err(AlphabetError::KmerTooLong { k })
    } else {
        Ok(())
    }
}
