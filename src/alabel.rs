//! Case labels: conjunctions of contingent node names.
//!
//! The upper-case rules annotate derived values with the set of contingent
//! timepoints whose worst-case duration produced them. Names are drawn from
//! a per-network [`ALabelAlphabet`] (at most 64 entries, built lazily as
//! contingent links are registered) and a conjunction is a single 64-bit
//! word over that alphabet.
//!
//! Alphabets are scoped to one network/check; combining case labels minted
//! by different alphabets is a caller bug and fails.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, Ordering};

use xxhash_rust::xxh3::Xxh3Builder;

use crate::error::TnError;

/// Separator glyph between names in a rendered case label.
pub const NAME_SEPARATOR: char = '∙';

static NEXT_ALPHABET_ID: AtomicU32 = AtomicU32::new(1);

/// A per-network registry of node names, each mapped to a bit index.
#[derive(Debug, Clone)]
pub struct ALabelAlphabet {
    id: u32,
    names: Vec<String>,
    index: HashMap<String, u8, Xxh3Builder>,
}

impl Default for ALabelAlphabet {
    fn default() -> Self {
        ALabelAlphabet::new()
    }
}

impl ALabelAlphabet {
    pub fn new() -> ALabelAlphabet {
        ALabelAlphabet {
            id: NEXT_ALPHABET_ID.fetch_add(1, Ordering::Relaxed),
            names: Vec::new(),
            index: HashMap::with_hasher(Xxh3Builder::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Register a name, returning its bit index. Idempotent per name.
    pub fn register(&mut self, name: &str) -> Result<u8, TnError> {
        if let Some(i) = self.index.get(name) {
            return Ok(*i);
        }
        if self.names.len() >= 64 {
            return Err(TnError::AlphabetFull(name.to_string()));
        }
        let i = self.names.len() as u8;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), i);
        Ok(i)
    }

    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.index.get(name).copied()
    }

    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.names.get(index as usize).map(String::as_str)
    }
}

/// A conjunction of node names as a 64-bit set over one alphabet.
///
/// The empty label belongs to no alphabet and combines with anything.
/// Ordering is unsigned bit-pattern compare, which is total within an
/// alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ALabel {
    bits: u64,
    alphabet: u32,
}

impl Default for ALabel {
    fn default() -> Self {
        ALabel::empty()
    }
}

impl ALabel {
    pub const fn empty() -> ALabel {
        ALabel {
            bits: 0,
            alphabet: 0,
        }
    }

    /// A single-name label over the given alphabet.
    pub fn from_index(alphabet: &ALabelAlphabet, index: u8) -> ALabel {
        ALabel {
            bits: 1u64 << index,
            alphabet: alphabet.id(),
        }
    }

    /// Register `name` in the alphabet and return the single-name label.
    pub fn from_name(alphabet: &mut ALabelAlphabet, name: &str) -> Result<ALabel, TnError> {
        let i = alphabet.register(name)?;
        Ok(ALabel::from_index(alphabet, i))
    }

    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Number of names in the conjunction.
    pub const fn size(&self) -> u32 {
        self.bits.count_ones()
    }

    pub const fn bits(&self) -> u64 {
        self.bits
    }

    pub fn contains_index(&self, index: u8) -> bool {
        self.bits >> index & 1 == 1
    }

    /// Whether every name of `other` occurs here (bitwise superset).
    pub fn contains_all(&self, other: &ALabel) -> Result<bool, TnError> {
        self.check_compatible(other)?;
        Ok(other.bits & !self.bits == 0)
    }

    /// Conjunction (set union). Fails on mixed alphabets.
    pub fn conjunction(&self, other: &ALabel) -> Result<ALabel, TnError> {
        self.check_compatible(other)?;
        Ok(ALabel {
            bits: self.bits | other.bits,
            alphabet: if self.alphabet != 0 {
                self.alphabet
            } else {
                other.alphabet
            },
        })
    }

    /// Remove one name by index.
    pub fn remove_index(&self, index: u8) -> ALabel {
        let bits = self.bits & !(1u64 << index);
        ALabel {
            bits,
            alphabet: if bits == 0 { 0 } else { self.alphabet },
        }
    }

    fn check_compatible(&self, other: &ALabel) -> Result<(), TnError> {
        if self.alphabet != 0 && other.alphabet != 0 && self.alphabet != other.alphabet {
            return Err(TnError::MixedAlphabets);
        }
        Ok(())
    }

    /// Render against the alphabet that minted this label. Names the
    /// alphabet does not know (never the case in correct use) print as
    /// their bit index.
    pub fn format(&self, alphabet: &ALabelAlphabet) -> String {
        if self.is_empty() {
            return crate::literal::EMPTY_LABEL.to_string();
        }
        let mut out = String::new();
        for i in 0..64u8 {
            if !self.contains_index(i) {
                continue;
            }
            if !out.is_empty() {
                out.push(NAME_SEPARATOR);
            }
            match alphabet.name_of(i) {
                Some(name) => out.push_str(name),
                None => {
                    let _ = write!(out, "#{i}");
                }
            }
        }
        out
    }

    /// Parse a `∙`-separated name conjunction, registering names as needed.
    pub fn parse(alphabet: &mut ALabelAlphabet, s: &str) -> Result<ALabel, TnError> {
        let t = s.trim();
        if t.is_empty() || t == crate::literal::EMPTY_LABEL.to_string() {
            return Ok(ALabel::empty());
        }
        let mut out = ALabel::empty();
        for name in t.split(NAME_SEPARATOR) {
            let name = name.trim();
            if name.is_empty() {
                return Err(TnError::GraphmlParse(format!("empty name in case label '{s}'")));
            }
            let one = ALabel::from_name(alphabet, name)?;
            out = out.conjunction(&one)?;
        }
        Ok(out)
    }
}

impl Ord for ALabel {
    fn cmp(&self, other: &ALabel) -> std::cmp::Ordering {
        self.alphabet
            .cmp(&other.alphabet)
            .then(self.bits.cmp(&other.bits))
    }
}

impl PartialOrd for ALabel {
    fn partial_cmp(&self, other: &ALabel) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
