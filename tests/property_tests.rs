//! Property-based tests using proptest.
//!
//! Exercises the algebraic invariants of the label and labeled-value
//! layers, and cross-checks the STN fragment of the engine against a
//! straightforward Bellman-Ford reference.

use proptest::prelude::*;

use tnetck::config::CheckOptions;
use tnetck::engine;
use tnetck::graph::{Edge, EdgeKind, Node, TNGraph};
use tnetck::label::Label;
use tnetck::labeled_values::LabeledValueMap;
use tnetck::literal::{LitState, Literal};

/// Strategy: an arbitrary label over the first six propositions. Conflicting
/// assignments fold into unknown literals, which are legal labels.
fn arb_label() -> impl Strategy<Value = Label> {
    prop::collection::vec((0u8..6, 1u8..=3), 0..5).prop_map(|lits| {
        let mut label = Label::empty();
        for (i, s) in lits {
            let c = (b'a' + i) as char;
            let lit = Literal::new(
                c,
                match s {
                    1 => LitState::Straight,
                    2 => LitState::Negated,
                    _ => LitState::Unknown,
                },
            )
            .unwrap();
            label = label.conjunction_extended(&Label::from_literal(lit));
        }
        label
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // ── Conjunction laws ───────────────────────────────────────────

    #[test]
    fn prop_conjunction_empty_identity(a in arb_label()) {
        prop_assert_eq!(a.conjunction(&Label::empty()), Some(a));
        prop_assert_eq!(a.conjunction_extended(&Label::empty()), a);
    }

    #[test]
    fn prop_conjunction_commutative(a in arb_label(), b in arb_label()) {
        prop_assert_eq!(a.conjunction(&b), b.conjunction(&a));
        prop_assert_eq!(a.conjunction_extended(&b), b.conjunction_extended(&a));
    }

    #[test]
    fn prop_subsumption_is_conjunction_absorption(a in arb_label(), b in arb_label()) {
        // a ⊨ b iff a ∧ b = a (when defined).
        if let Some(c) = a.conjunction(&b) {
            prop_assert_eq!(a.subsumes(&b), c == a);
        }
    }

    #[test]
    fn prop_extended_conjunction_unknown_positions(a in arb_label(), b in arb_label()) {
        let ext = a.conjunction_extended(&b);
        for i in 0..6u8 {
            let c = (b'a' + i) as char;
            let (sa, sb) = (a.state(c), b.state(c));
            if sa == LitState::Unknown || sb == LitState::Unknown {
                continue;
            }
            let complementary = matches!(
                (sa, sb),
                (LitState::Straight, LitState::Negated) | (LitState::Negated, LitState::Straight)
            );
            prop_assert_eq!(
                ext.state(c) == LitState::Unknown,
                complementary,
                "position {} of {} ⋆ {}", c, a, b
            );
        }
    }

    #[test]
    fn prop_subsumption_transitive_via_conjunction(a in arb_label(), b in arb_label()) {
        let ext = a.conjunction_extended(&b);
        prop_assert!(ext.subsumes(&a));
        prop_assert!(ext.subsumes(&b));
    }

    #[test]
    fn prop_label_ordering_total(a in arb_label(), b in arb_label(), c in arb_label()) {
        // Antisymmetry and transitivity of the label order.
        if a < b {
            prop_assert!(!(b < a));
        }
        if a < b && b < c {
            prop_assert!(a < c);
        }
    }

    #[test]
    fn prop_label_parse_roundtrip(a in arb_label()) {
        let s = a.to_string();
        let back: Label = s.parse().unwrap();
        prop_assert_eq!(back, a);
    }

    // ── Labeled-value map invariants ───────────────────────────────

    #[test]
    fn prop_map_irredundant_after_puts(
        puts in prop::collection::vec((arb_label(), -50i32..50), 1..12)
    ) {
        let mut m = LabeledValueMap::new();
        for (label, v) in &puts {
            m.put(*label, *v);
        }
        let entries: Vec<_> = m.entries().collect();
        for (l1, v1) in &entries {
            for (l2, v2) in &entries {
                if l1 != l2 {
                    prop_assert!(
                        !(l1.subsumes(l2) && v1 >= v2),
                        "({}, {}) represented by ({}, {})", l1, v1, l2, v2
                    );
                }
            }
        }
    }

    #[test]
    fn prop_map_put_bounds_min_subsumed(
        puts in prop::collection::vec((arb_label(), -50i32..50), 0..10),
        label in arb_label(),
        v in -50i32..50,
    ) {
        let mut m = LabeledValueMap::new();
        for (l2, v2) in &puts {
            m.put(*l2, *v2);
        }
        if m.put(label, v) {
            let min = m.min_value_subsumed_by(&label);
            prop_assert!(min.is_some_and(|x| x <= v) || m.already_represents(&label, v));
        }
    }

    #[test]
    fn prop_map_put_idempotent(
        puts in prop::collection::vec((arb_label(), -50i32..50), 1..10)
    ) {
        let mut m = LabeledValueMap::new();
        for (label, v) in &puts {
            m.put(*label, *v);
        }
        let snapshot: Vec<_> = m.entries().collect();
        for (label, v) in &puts {
            // Everything inserted is still represented; re-putting is a no-op.
            prop_assert!(!m.put(*label, *v));
        }
        prop_assert_eq!(m.entries().collect::<Vec<_>>(), snapshot);
    }

    #[test]
    fn prop_map_values_monotone_under_puts(
        first in prop::collection::vec((arb_label(), -50i32..50), 1..8),
        second in prop::collection::vec((arb_label(), -50i32..50), 1..8),
    ) {
        let mut m = LabeledValueMap::new();
        for (label, v) in &first {
            m.put(*label, *v);
        }
        let before: Vec<(Label, i32)> = m.entries().collect();
        for (label, v) in &second {
            m.put(*label, *v);
        }
        for (label, v) in before {
            // Each old bound is still representable at least as tightly.
            prop_assert!(m.already_represents(&label, v));
        }
    }

    // ── STN fragment vs Bellman-Ford reference ─────────────────────

    #[test]
    fn prop_stn_agrees_with_bellman_ford(
        weights in prop::collection::vec((0usize..4, 0usize..4, -8i32..12), 1..8)
    ) {
        let names = ["Z", "N1", "N2", "N3"];
        let mut g = TNGraph::new();
        for n in names {
            g.add_node(Node::new(n)).unwrap();
        }
        let mut chosen: Vec<(usize, usize, i32)> = Vec::new();
        for (s, t, w) in weights {
            if s == t {
                continue;
            }
            let sid = g.node_id(names[s]).unwrap();
            let tid = g.node_id(names[t]).unwrap();
            if g.find_edge(sid, tid).is_some() {
                continue;
            }
            let e = g
                .add_edge(Edge::new(
                    format!("{}_{}", names[s], names[t]),
                    sid,
                    tid,
                    EdgeKind::Requirement,
                ))
                .unwrap();
            g.edge_mut(e).unwrap().values.put(Label::empty(), w);
            chosen.push((s, t, w));
        }
        prop_assume!(!chosen.is_empty());

        let status = engine::check(&mut g, &CheckOptions::default()).unwrap();
        prop_assert!(status.finished);

        // Reference: Bellman-Ford over the same graph plus the implicit
        // initialization edges Z→X (horizon) and X→Z (0).
        let horizon: i32 = chosen.iter().map(|(_, _, w)| w.abs()).sum::<i32>().max(1);
        let mut edges = chosen.clone();
        for x in 1..4 {
            edges.push((0, x, horizon));
            edges.push((x, 0, 0));
        }
        let negative_cycle = bellman_ford_detects_negative_cycle(4, &edges);
        prop_assert_eq!(
            status.consistency,
            !negative_cycle,
            "engine and reference disagree on {:?}", chosen
        );
    }
}

/// Plain Bellman-Ford negative-cycle detection.
fn bellman_ford_detects_negative_cycle(n: usize, edges: &[(usize, usize, i32)]) -> bool {
    let mut dist = vec![0i64; n];
    for _ in 0..n {
        for (s, t, w) in edges {
            if dist[*s] + i64::from(*w) < dist[*t] {
                dist[*t] = dist[*s] + i64::from(*w);
            }
        }
    }
    edges
        .iter()
        .any(|(s, t, w)| dist[*s] + i64::from(*w) < dist[*t])
}
