//! Propositions and literals.
//!
//! A proposition is one symbol from a fixed 32-character alphabet
//! (`a`–`z`, `A`–`F`). A literal pairs a proposition with a state:
//! straight (`p`), negated (`¬p`), or unknown (`¿p`). The fourth state,
//! absent, exists only inside the bit encoding of a label and never
//! appears in a materialized literal.

use std::fmt;

use crate::error::TnError;

/// Number of propositions in the alphabet.
pub const ALPHABET_SIZE: u8 = 32;

/// Prefix glyph for a negated literal.
pub const NOT: char = '¬';

/// Prefix glyph for an unknown literal.
pub const UNKNOWN: char = '¿';

/// Glyph for the empty label.
pub const EMPTY_LABEL: char = '⊡';

/// Index of a proposition in the alphabet, or `None` for characters
/// outside `a`–`z`, `A`–`F`.
pub const fn proposition_index(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        'A'..='F' => Some(c as u8 - b'A' + 26),
        _ => None,
    }
}

/// The proposition at a given alphabet index. Inverse of
/// [`proposition_index`]; panics on indices ≥ 32 (an internal bug).
pub const fn index_proposition(i: u8) -> char {
    assert!(i < ALPHABET_SIZE);
    if i < 26 {
        (b'a' + i) as char
    } else {
        (b'A' + i - 26) as char
    }
}

/// State of a proposition inside a label.
///
/// The two-bit encoding `(bit1, bit0)` is the on-disk/in-word layout used
/// by `Label`; the discriminants below are exactly those bit pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LitState {
    Absent = 0b00,
    Straight = 0b01,
    Negated = 0b10,
    Unknown = 0b11,
}

impl LitState {
    /// Decode from the two-bit pair.
    pub const fn from_bits(bits: u8) -> LitState {
        match bits & 0b11 {
            0b01 => LitState::Straight,
            0b10 => LitState::Negated,
            0b11 => LitState::Unknown,
            _ => LitState::Absent,
        }
    }

    pub const fn is_present(self) -> bool {
        !matches!(self, LitState::Absent)
    }

    /// The glyph written before the proposition character, if any.
    pub const fn prefix(self) -> Option<char> {
        match self {
            LitState::Negated => Some(NOT),
            LitState::Unknown => Some(UNKNOWN),
            _ => None,
        }
    }
}

/// An immutable (proposition, state) pair. State is never `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    proposition: char,
    state: LitState,
}

impl Literal {
    /// Build a literal; fails on characters outside the alphabet or on the
    /// `Absent` state.
    pub fn new(proposition: char, state: LitState) -> Result<Literal, TnError> {
        if proposition_index(proposition).is_none() {
            return Err(TnError::LabelParse(format!(
                "'{proposition}' is not a proposition (allowed: a-z, A-F)"
            )));
        }
        if state == LitState::Absent {
            return Err(TnError::LabelParse(format!(
                "literal on '{proposition}' cannot be absent"
            )));
        }
        Ok(Literal { proposition, state })
    }

    pub fn straight(proposition: char) -> Result<Literal, TnError> {
        Literal::new(proposition, LitState::Straight)
    }

    pub fn negated(proposition: char) -> Result<Literal, TnError> {
        Literal::new(proposition, LitState::Negated)
    }

    pub fn proposition(&self) -> char {
        self.proposition
    }

    pub fn state(&self) -> LitState {
        self.state
    }

    pub fn index(&self) -> u8 {
        // Valid by construction.
        proposition_index(self.proposition).unwrap_or(0)
    }

    /// The complement literal: straight ↔ negated. Unknown literals have no
    /// complement.
    pub fn complement(&self) -> Option<Literal> {
        let state = match self.state {
            LitState::Straight => LitState::Negated,
            LitState::Negated => LitState::Straight,
            _ => return None,
        };
        Some(Literal {
            proposition: self.proposition,
            state,
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = self.state.prefix() {
            write!(f, "{p}")?;
        }
        write!(f, "{}", self.proposition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_roundtrip() {
        for i in 0..ALPHABET_SIZE {
            let c = index_proposition(i);
            assert_eq!(proposition_index(c), Some(i));
        }
        assert_eq!(proposition_index('a'), Some(0));
        assert_eq!(proposition_index('z'), Some(25));
        assert_eq!(proposition_index('A'), Some(26));
        assert_eq!(proposition_index('F'), Some(31));
        assert_eq!(proposition_index('G'), None);
        assert_eq!(proposition_index('0'), None);
    }

    #[test]
    fn test_state_bits_roundtrip() {
        for s in [LitState::Straight, LitState::Negated, LitState::Unknown] {
            assert_eq!(LitState::from_bits(s as u8), s);
        }
        assert_eq!(LitState::from_bits(0), LitState::Absent);
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::straight('p').unwrap().to_string(), "p");
        assert_eq!(Literal::negated('p').unwrap().to_string(), "¬p");
        assert_eq!(
            Literal::new('q', LitState::Unknown).unwrap().to_string(),
            "¿q"
        );
    }

    #[test]
    fn test_literal_rejects_bad_input() {
        assert!(Literal::straight('G').is_err());
        assert!(Literal::new('p', LitState::Absent).is_err());
    }

    #[test]
    fn test_complement() {
        let p = Literal::straight('p').unwrap();
        assert_eq!(p.complement().unwrap(), Literal::negated('p').unwrap());
        assert_eq!(p.complement().unwrap().complement().unwrap(), p);
        assert!(Literal::new('p', LitState::Unknown).unwrap().complement().is_none());
    }
}
