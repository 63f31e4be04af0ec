//! Case-annotated labeled values for contingent reasoning.
//!
//! [`UpperCaseValueMap`] maps a case label (conjunction of contingent node
//! names) to an inner [`LabeledValueMap`]. Dominance crosses case labels:
//! a value held under a *smaller* name set is stronger, because it applies
//! whenever any superset applies. `already_represents` therefore looks at
//! every subset of the queried case label, and insertion under `A` purges
//! dominated inner entries from every strict superset of `A`.
//!
//! [`LowerCaseValue`] is the single lower-bound annotation a contingent
//! activation edge carries.

use std::collections::BTreeMap;

use crate::alabel::{ALabel, ALabelAlphabet};
use crate::arith::{NIL, format_weight};
use crate::error::TnError;
use crate::label::Label;
use crate::labeled_values::LabeledValueMap;

/// `ALabel → LabeledValueMap` with cross-case minimization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpperCaseValueMap {
    inner: BTreeMap<ALabel, LabeledValueMap>,
}

impl UpperCaseValueMap {
    pub fn new() -> UpperCaseValueMap {
        UpperCaseValueMap {
            inner: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values().all(LabeledValueMap::is_empty)
    }

    /// Total number of `(case, label, value)` triples.
    pub fn len(&self) -> usize {
        self.inner.values().map(LabeledValueMap::len).sum()
    }

    pub fn get(&self, case: &ALabel, label: &Label) -> Option<i32> {
        self.inner.get(case).and_then(|m| m.get(label))
    }

    /// Triples in deterministic order: case-major, then inner map order.
    pub fn entries(&self) -> impl Iterator<Item = (ALabel, Label, i32)> + '_ {
        self.inner
            .iter()
            .flat_map(|(a, m)| m.entries().map(move |(l, v)| (*a, l, v)))
    }

    pub fn min_value(&self) -> Option<i32> {
        self.entries().map(|(_, _, v)| v).min()
    }

    /// Whether some entry under a subset case label already represents
    /// `(label, v)`.
    pub fn already_represents(&self, case: &ALabel, label: &Label, v: i32) -> Result<bool, TnError> {
        if v == NIL {
            return Ok(true);
        }
        for (a, m) in &self.inner {
            if case.contains_all(a)? && m.already_represents(label, v) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Insert `(case, label, v)`, minimizing across case labels. Returns
    /// whether the map changed.
    pub fn put(&mut self, case: ALabel, label: Label, v: i32) -> Result<bool, TnError> {
        if v == NIL || self.already_represents(&case, &label, v)? {
            return Ok(false);
        }
        // Purge dominated entries held under strict supersets of `case`.
        let supersets: Vec<ALabel> = self
            .inner
            .keys()
            .filter(|a| **a != case)
            .filter_map(|a| match a.contains_all(&case) {
                Ok(true) => Some(*a),
                _ => None,
            })
            .collect();
        for a in supersets {
            if let Some(m) = self.inner.get_mut(&a) {
                let doomed: Vec<Label> = m
                    .entries()
                    .filter(|(l, val)| l.subsumes(&label) && *val >= v)
                    .map(|(l, _)| l)
                    .collect();
                for l in doomed {
                    m.remove(&l);
                }
                if m.is_empty() {
                    self.inner.remove(&a);
                }
            }
        }
        Ok(self.inner.entry(case).or_default().put(label, v))
    }

    /// Remove the exact triple, returning its value.
    pub fn remove(&mut self, case: &ALabel, label: &Label) -> Option<i32> {
        let m = self.inner.get_mut(case)?;
        let old = m.remove(label);
        if m.is_empty() {
            self.inner.remove(case);
        }
        old
    }

    /// Drop entries whose propositional label contains an unknown literal.
    pub fn remove_unknown_entries(&mut self) {
        for m in self.inner.values_mut() {
            m.remove_unknown_entries();
        }
        self.inner.retain(|_, m| !m.is_empty());
    }

    /// Render as `{(case, label, value) …}` against the given alphabet.
    pub fn format(&self, alphabet: &ALabelAlphabet) -> String {
        let mut out = String::from("{");
        for (a, l, v) in self.entries() {
            out.push_str(&format!("({}, {l}, {}) ", a.format(alphabet), format_weight(v)));
        }
        out.push('}');
        out
    }

    /// Parse the [`format`](Self::format) rendering, registering node names
    /// in the alphabet as they appear.
    pub fn parse(alphabet: &mut ALabelAlphabet, s: &str) -> Result<UpperCaseValueMap, TnError> {
        let t = s.trim();
        let inner = t
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(|| {
                TnError::ValueParse(format!("case values must be braced: '{s}'"))
            })?;
        let mut map = UpperCaseValueMap::new();
        let mut rest = inner.trim();
        while !rest.is_empty() {
            let open = rest
                .strip_prefix('(')
                .ok_or_else(|| TnError::ValueParse(format!("expected '(' in '{s}'")))?;
            let (entry, tail) = open
                .split_once(')')
                .ok_or_else(|| TnError::ValueParse(format!("unclosed entry in '{s}'")))?;
            let mut parts = entry.splitn(3, ',');
            let (case_s, label_s, value_s) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => {
                    return Err(TnError::ValueParse(format!("malformed entry '({entry})'")));
                }
            };
            let case = ALabel::parse(alphabet, case_s)?;
            let label: Label = label_s.trim().parse()?;
            let value = crate::arith::parse_weight(value_s)?;
            map.put(case, label, value)?;
            rest = tail.trim_start();
        }
        Ok(map)
    }
}

/// The single lower-case value of a contingent activation edge:
/// the contingent timepoint's name, the link's label, and the lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowerCaseValue {
    pub node: ALabel,
    pub label: Label,
    pub value: i32,
}

impl LowerCaseValue {
    pub fn new(node: ALabel, label: Label, value: i32) -> LowerCaseValue {
        LowerCaseValue { node, label, value }
    }

    pub fn format(&self, alphabet: &ALabelAlphabet) -> String {
        format!(
            "{{({}, {}, {}) }}",
            self.node.format(alphabet),
            self.label,
            format_weight(self.value)
        )
    }

    /// Parse the single-entry `{(node, label, value) }` rendering.
    pub fn parse(alphabet: &mut ALabelAlphabet, s: &str) -> Result<Option<LowerCaseValue>, TnError> {
        let t = s.trim();
        let inner = t
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(|| {
                TnError::ValueParse(format!("lower-case value must be braced: '{s}'"))
            })?
            .trim();
        if inner.is_empty() {
            return Ok(None);
        }
        let entry = inner
            .strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .ok_or_else(|| TnError::ValueParse(format!("malformed lower-case value '{s}'")))?;
        let mut parts = entry.splitn(3, ',');
        let (node_s, label_s, value_s) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(TnError::ValueParse(format!("malformed lower-case value '{s}'"))),
        };
        Ok(Some(LowerCaseValue {
            node: ALabel::parse(alphabet, node_s)?,
            label: label_s.trim().parse()?,
            value: crate::arith::parse_weight(value_s)?,
        }))
    }
}
