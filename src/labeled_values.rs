//! Order-minimized `Label → int` maps.
//!
//! The map keeps, for every propositional scenario, the tightest bound seen
//! so far, and stores no entry another entry already accounts for: an entry
//! `(L', v')` *represents* `(L, v)` when `L ⊨ L'` and `v ≥ v'`. Every
//! mutation preserves irredundancy, so reads never need to minimize.
//!
//! # Representation
//!
//! Buckets by label size: an array indexed by `size ∈ 0..=32` of ordered
//! `Label → int` maps. A subsumer of `L` can only live in a bucket of size
//! ≤ `size(L)`, which keeps the dominance scan short, and the bucket walk
//! (size-major, label order inside a bucket) gives a total, deterministic
//! iteration order.
//!
//! # Minimization moves
//!
//! - **Dominance sweep**: inserting `(L, v)` deletes every `(L', v')` with
//!   `L' ⊨ L` and `v' ≥ v`.
//! - **One-literal merge**: a same-size, same-value partner differing only
//!   in the sign of one proposition fuses with the incoming entry into the
//!   label without that proposition. (Equal values only; a larger-valued
//!   partner dies in the ordinary dominance sweep of the fused entry.)
//! - **Base compaction**: when some size-n bucket holds all 2ⁿ sign
//!   combinations of an n-proposition set, that set becomes the *base*;
//!   entries not smaller than every consistent base component are dropped.
//!   Removing any base component invalidates the base.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::arith::{NIL, format_weight, parse_weight};
use crate::error::TnError;
use crate::label::Label;
use crate::literal::ALPHABET_SIZE;

/// Base compaction is attempted only for proposition sets up to this size;
/// beyond it the 2ⁿ membership test costs more than it saves.
const MAX_BASE_PROPOSITIONS: usize = 12;

/// One-literal simplification policy.
///
/// Two partners of equal size differing only in the sign of one
/// proposition can fuse into the label without that proposition. The
/// policies differ in how they treat unequal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Simplification {
    /// Fuse only equal-valued partners. The default, and the cheaper
    /// variant: unequal partners are left to the dominance sweep.
    #[default]
    Equal,
    /// Additionally fuse unequal-valued partners into the shorter label at
    /// the larger value; the weaker original is then dominated and retired.
    Max,
    /// No one-literal simplification.
    Off,
}

/// An order-minimized map from labels to integer bounds.
#[derive(Clone)]
pub struct LabeledValueMap {
    buckets: Vec<BTreeMap<Label, i32>>,
    base: Option<Vec<char>>,
    simplification: Simplification,
    readonly: bool,
}

impl Default for LabeledValueMap {
    fn default() -> Self {
        LabeledValueMap::new()
    }
}

impl LabeledValueMap {
    pub fn new() -> LabeledValueMap {
        LabeledValueMap {
            buckets: vec![BTreeMap::new(); ALPHABET_SIZE as usize + 1],
            base: None,
            simplification: Simplification::default(),
            readonly: false,
        }
    }

    /// A map with an explicit one-literal simplification policy.
    pub fn with_simplification(policy: Simplification) -> LabeledValueMap {
        LabeledValueMap {
            simplification: policy,
            ..LabeledValueMap::new()
        }
    }

    /// A map with the one-literal merge disabled. Every other minimization
    /// still applies.
    pub fn without_simplification() -> LabeledValueMap {
        LabeledValueMap::with_simplification(Simplification::Off)
    }

    /// A read-only snapshot: all mutators silently no-op.
    pub fn unmodifiable(&self) -> LabeledValueMap {
        LabeledValueMap {
            readonly: true,
            ..self.clone()
        }
    }

    pub fn is_unmodifiable(&self) -> bool {
        self.readonly
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(BTreeMap::is_empty)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(BTreeMap::len).sum()
    }

    /// Exact lookup.
    pub fn get(&self, label: &Label) -> Option<i32> {
        self.buckets[label.size() as usize].get(label).copied()
    }

    /// Entries in deterministic order: size-major, then label order.
    pub fn entries(&self) -> impl Iterator<Item = (Label, i32)> + '_ {
        self.buckets
            .iter()
            .flat_map(|b| b.iter().map(|(l, v)| (*l, *v)))
    }

    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        self.entries().map(|(l, _)| l)
    }

    pub fn values(&self) -> impl Iterator<Item = i32> + '_ {
        self.entries().map(|(_, v)| v)
    }

    pub fn min_value(&self) -> Option<i32> {
        self.values().min()
    }

    pub fn max_value(&self) -> Option<i32> {
        self.values().max()
    }

    /// Minimum value among entries whose label is consistent with `label`.
    pub fn min_value_consistent_with(&self, label: &Label) -> Option<i32> {
        self.entries()
            .filter(|(l, _)| l.is_consistent_with(label))
            .map(|(_, v)| v)
            .min()
    }

    /// Minimum value among entries whose label `label` subsumes.
    pub fn min_value_subsumed_by(&self, label: &Label) -> Option<i32> {
        let max_size = label.size() as usize;
        self.buckets[..=max_size]
            .iter()
            .flat_map(|b| b.iter())
            .filter(|(l, _)| label.subsumes(l))
            .map(|(_, v)| *v)
            .min()
    }

    /// Whether `(label, v)` is already accounted for by an entry or by the
    /// base.
    pub fn already_represents(&self, label: &Label, v: i32) -> bool {
        if v == NIL {
            return true;
        }
        if self
            .min_value_subsumed_by(label)
            .is_some_and(|m| m <= v)
        {
            return true;
        }
        self.base_represents(label, v)
    }

    /// Insert `(label, v)`, minimizing. Returns whether the map changed.
    ///
    /// A put that does not strictly improve the representable bound for its
    /// label is rejected, which makes `put` idempotent and the stored
    /// values monotone non-increasing over any call sequence.
    pub fn put(&mut self, label: Label, v: i32) -> bool {
        if self.readonly || v == NIL {
            return false;
        }
        if self.already_represents(&label, v) {
            return false;
        }
        self.insert_and_simplify(label, v);
        true
    }

    /// Insert bypassing minimization. Only for callers that re-minimize;
    /// the map may be redundant afterwards.
    pub fn put_forcibly(&mut self, label: Label, v: i32) {
        if self.readonly || v == NIL {
            return;
        }
        self.buckets[label.size() as usize].insert(label, v);
    }

    /// Put every entry of `other`.
    pub fn put_all(&mut self, other: &LabeledValueMap) -> bool {
        let mut changed = false;
        for (l, v) in other.entries() {
            changed |= self.put(l, v);
        }
        changed
    }

    /// Remove the exact label, returning its value.
    pub fn remove(&mut self, label: &Label) -> Option<i32> {
        if self.readonly {
            return None;
        }
        let old = self.buckets[label.size() as usize].remove(label);
        if old.is_some() && self.is_base_component(label) {
            self.base = None;
        }
        old
    }

    /// Drop every entry whose label contains an unknown literal.
    /// Unknown labels are never base components, so the base survives.
    pub fn remove_unknown_entries(&mut self) {
        if self.readonly {
            return;
        }
        for bucket in &mut self.buckets {
            bucket.retain(|l, _| !l.contains_unknown());
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn insert_and_simplify(&mut self, label: Label, v: i32) {
        let n = label.size() as usize;

        // Dominance sweep: every subsumer of `label` with a value ≥ v dies.
        let base = self.base.clone();
        let mut base_broken = false;
        for bucket in &mut self.buckets[n..] {
            bucket.retain(|l, val| {
                let dominated = l.subsumes(&label) && *val >= v;
                if dominated && base_component(&base, l) {
                    base_broken = true;
                }
                !dominated
            });
        }
        if base_broken {
            self.base = None;
        }

        // One-literal merge: an equal-valued partner differing only in the
        // sign of one proposition fuses into the shorter label.
        if self.simplification != Simplification::Off {
            let partner = self.buckets[n].iter().find_map(|(l, val)| {
                if *val == v {
                    label.unique_different_literal(l).map(|lit| (*l, lit))
                } else {
                    None
                }
            });
            if let Some((p, lit)) = partner {
                if self.buckets[n].remove(&p).is_some() && self.is_base_component(&p) {
                    self.base = None;
                }
                self.insert_and_simplify(label.remove(lit.proposition()), v);
                return;
            }
        }

        self.buckets[n].insert(label, v);

        // The eager variant also fuses unequal-valued partners: the shorter
        // label holds at the larger of the two values, and the weaker
        // original is retired by the dominance sweep of that insertion.
        if self.simplification == Simplification::Max {
            let partner = self.buckets[n].iter().find_map(|(l, val)| {
                if *l != label {
                    label.unique_different_literal(l).map(|lit| (lit, *val))
                } else {
                    None
                }
            });
            if let Some((lit, pv)) = partner {
                let shorter = label.remove(lit.proposition());
                let fused = v.max(pv);
                if !self.already_represents(&shorter, fused) {
                    self.insert_and_simplify(shorter, fused);
                    return;
                }
            }
        }

        self.try_form_base(&label);
    }

    fn is_base_component(&self, label: &Label) -> bool {
        base_component(&self.base, label)
    }

    fn base_represents(&self, label: &Label, v: i32) -> bool {
        let Some(props) = &self.base else {
            return false;
        };
        let n = props.len();
        let mut any = false;
        for comp in Label::all_components(props) {
            if !comp.is_consistent_with(label) {
                continue;
            }
            any = true;
            match self.buckets[n].get(&comp) {
                Some(cv) if *cv <= v => {}
                _ => return false,
            }
        }
        any
    }

    /// After inserting `label`, check whether its proposition set now forms
    /// a complete base, and if so sweep entries the base represents.
    fn try_form_base(&mut self, label: &Label) {
        if label.is_empty() || label.contains_unknown() {
            return;
        }
        let props: Vec<char> = label.propositions().collect();
        if props.len() > MAX_BASE_PROPOSITIONS {
            return;
        }
        let n = props.len();
        let components = Label::all_components(&props);
        if !components.iter().all(|c| self.buckets[n].contains_key(c)) {
            return;
        }
        self.base = Some(props);

        // Sweep every non-component entry the base now represents.
        let doomed: Vec<Label> = self
            .entries()
            .filter(|(l, v)| !self.is_base_component(l) && self.base_represents(l, *v))
            .map(|(l, _)| l)
            .collect();
        for l in doomed {
            self.buckets[l.size() as usize].remove(&l);
        }
    }
}

/// Whether `label` is one of the 2ⁿ sign components of the base.
fn base_component(base: &Option<Vec<char>>, label: &Label) -> bool {
    let Some(props) = base else {
        return false;
    };
    label.size() as usize == props.len()
        && !label.contains_unknown()
        && props.iter().all(|p| label.contains_proposition(*p))
}

impl PartialEq for LabeledValueMap {
    fn eq(&self, other: &LabeledValueMap) -> bool {
        self.buckets == other.buckets
    }
}

impl Eq for LabeledValueMap {}

impl fmt::Display for LabeledValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (l, v) in self.entries() {
            write!(f, "({}, {l}) ", format_weight(v))?;
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for LabeledValueMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for LabeledValueMap {
    type Err = TnError;

    /// Parse the `{(v, label) (v, label) …}` rendering.
    fn from_str(s: &str) -> Result<LabeledValueMap, TnError> {
        let t = s.trim();
        let inner = t
            .strip_prefix('{')
            .and_then(|r| r.strip_suffix('}'))
            .ok_or_else(|| TnError::ValueParse(format!("labeled values must be braced: '{s}'")))?;
        let mut map = LabeledValueMap::new();
        let mut rest = inner.trim();
        while !rest.is_empty() {
            let open = rest
                .strip_prefix('(')
                .ok_or_else(|| TnError::ValueParse(format!("expected '(' in '{s}'")))?;
            let (entry, tail) = open
                .split_once(')')
                .ok_or_else(|| TnError::ValueParse(format!("unclosed entry in '{s}'")))?;
            let (v_str, l_str) = entry
                .split_once(',')
                .ok_or_else(|| TnError::ValueParse(format!("malformed entry '({entry})'")))?;
            let v = parse_weight(v_str)?;
            let label: Label = l_str.trim().parse()?;
            map.put(label, v);
            rest = tail.trim_start();
        }
        Ok(map)
    }
}
