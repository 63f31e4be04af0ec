//! CSTN propagation rules: labeled propagation (LP) and the observation
//! label-modification rules R0 and R3.
//!
//! Each rule reads a snapshot of the involved payloads, derives candidate
//! values, and lands them through the checker's update path, which
//! minimizes, detects negative self-loops, and re-enqueues modified edges.

use tracing::trace;

use crate::arith;
use crate::engine::Checker;
use crate::error::TnError;
use crate::graph::{EdgeId, NodeId};
use crate::label::Label;
use crate::literal::LitState;

/// Combine two labels for a derivation worth `w`.
///
/// The extended conjunction is used when the derivation is negative (where
/// unknown literals are meaningful); a non-negative derivation requires a
/// clean, consistent conjunction. Returns `None` when the derivation must
/// be skipped.
pub(super) fn combine_labels(ck: &Checker<'_>, l1: &Label, l2: &Label, w: i32) -> Option<Label> {
    let ext = l1.conjunction_extended(l2);
    let applicable = w < 0 || (l1.is_consistent_with(l2) && !ext.contains_unknown());
    if !applicable {
        return None;
    }
    if ext.contains_unknown() && !ck.opts.with_unknown {
        return None;
    }
    Some(ext)
}

/// LP: combine edge `e1: A→B` with edge `e2: B→C` into constraints on
/// `A→C`. Ordinary values compose with both the ordinary and the
/// upper-case values of the second edge.
pub(crate) fn lp_combine(ck: &mut Checker<'_>, e1: EdgeId, e2: EdgeId) -> Result<(), TnError> {
    let (Some(edge1), Some(edge2)) = (ck.graph.edge(e1), ck.graph.edge(e2)) else {
        return Ok(());
    };
    if edge1.target != edge2.source {
        return Ok(());
    }
    let (a, b, c) = (edge1.source, edge1.target, edge2.target);
    if ck.opts.propagation_only_to_z && c != ck.z {
        return Ok(());
    }

    let first: Vec<(Label, i32)> = edge1.values.entries().collect();
    let second: Vec<(Label, i32)> = edge2.values.entries().collect();
    let second_upper: Vec<_> = edge2.upper.entries().collect();

    for (alpha, u) in &first {
        if *u == arith::POS_INFINITY {
            // A ≤ ∞ bound derives nothing an existing entry doesn't cover.
            continue;
        }
        for (beta, v) in &second {
            if *v == arith::POS_INFINITY {
                continue;
            }
            let w = arith::sum(*u, *v)?;
            let Some(label) = combine_labels(ck, alpha, beta, w) else {
                continue;
            };
            if ck.update_ordinary(a, c, label, w, Some((b, *alpha, *beta)))? {
                ck.status.labeled_value_propagation_calls += 1;
                trace!(from = ?a, to = ?c, %label, value = w, "LP derivation");
            }
            if ck.witness.is_some() {
                return Ok(());
            }
        }
        for (case, beta, v) in &second_upper {
            if *v == arith::POS_INFINITY {
                continue;
            }
            let w = arith::sum(*u, *v)?;
            let Some(label) = combine_labels(ck, alpha, beta, w) else {
                continue;
            };
            if ck.update_upper(a, c, *case, label, w)? {
                ck.status.upper_case_calls += 1;
            }
            if ck.witness.is_some() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// R0: on an edge out of the observer of `p`, a non-positive value labeled
/// with `p` (straight or negated) holds without that literal — observing
/// the proposition happens before any timepoint the value constrains.
pub(crate) fn apply_r0(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let (obs, x) = (edge.source, edge.target);
    if obs == x {
        return Ok(());
    }
    let Some(p) = ck.graph.node(obs).observed else {
        return Ok(());
    };
    if ck.opts.propagation_only_to_z && x != ck.z {
        return Ok(());
    }

    let entries: Vec<(Label, i32)> = edge.values.entries().collect();
    for (alpha, w) in entries {
        if !matches!(alpha.state(p), LitState::Straight | LitState::Negated) {
            continue;
        }
        if !ck.observation_applicable(w) {
            continue;
        }
        let alpha_prime = make_alpha_prime(ck, alpha, p, obs);
        if ck.update_ordinary(obs, x, alpha_prime, w, None)? {
            ck.status.r0_calls += 1;
            trace!(observer = ?obs, %alpha_prime, value = w, "R0 rewrite");
        }
    }
    Ok(())
}

/// R3 trigger for a dequeued edge `X→Y`: pair it with every observation
/// edge ending at `Y`.
pub(crate) fn apply_r3(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let (x, y) = (edge.source, edge.target);
    if ck.opts.propagation_only_to_z && y != ck.z {
        return Ok(());
    }
    let obs_edges: Vec<(NodeId, char, EdgeId)> = ck
        .graph
        .in_edges(y)
        .iter()
        .filter_map(|f| {
            let fe = ck.graph.edge(*f)?;
            let q = ck.graph.node(fe.source).observed?;
            (*f != id && fe.source != x).then_some((fe.source, q, *f))
        })
        .collect();
    for (pnode, q, f) in obs_edges {
        r3_pair(ck, id, x, y, pnode, q, f)?;
        if ck.witness.is_some() {
            return Ok(());
        }
    }
    Ok(())
}

/// R3 trigger for a dequeued observation edge `P?→Y`: pair every other
/// edge ending at `Y` with it.
pub(crate) fn apply_r3_as_observation(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let (pnode, y) = (edge.source, edge.target);
    let Some(q) = ck.graph.node(pnode).observed else {
        return Ok(());
    };
    if ck.opts.propagation_only_to_z && y != ck.z {
        return Ok(());
    }
    for f in ck.graph.in_edges(y).to_vec() {
        if f == id {
            continue;
        }
        let Some(fe) = ck.graph.edge(f) else {
            continue;
        };
        let x = fe.source;
        if x == pnode {
            continue;
        }
        r3_pair(ck, f, x, y, pnode, q, id)?;
        if ck.witness.is_some() {
            return Ok(());
        }
    }
    Ok(())
}

/// R3 core: edge `X→Y` holds `(γ, w)` with `w` non-positive and `γ`
/// mentioning `q`; the observer edge `P?→Y` holds `(β, u)` with
/// `u ≤ w` (after the reaction offset). Then `X→Y` also holds the value
/// under `(γ \ q) ⋆ β`: whichever way `q` turns out, the bound is met.
fn r3_pair(
    ck: &mut Checker<'_>,
    exy: EdgeId,
    x: NodeId,
    y: NodeId,
    pnode: NodeId,
    q: char,
    eobs: EdgeId,
) -> Result<(), TnError> {
    let Some(obs_edge) = ck.graph.edge(eobs) else {
        return Ok(());
    };
    let obs_entries: Vec<(Label, i32)> = obs_edge.values.entries().collect();
    let Some(xy_edge) = ck.graph.edge(exy) else {
        return Ok(());
    };
    let xy_entries: Vec<(Label, i32)> = xy_edge
        .values
        .entries()
        .filter(|(gamma, _)| gamma.contains_proposition(q))
        .collect();

    for (gamma, w) in &xy_entries {
        if !ck.observation_applicable(*w) {
            continue;
        }
        for (beta, u) in &obs_entries {
            let u_adj = ck.reaction_sum(*u)?;
            if u_adj > *w {
                continue;
            }
            let value = (*w).max(u_adj);
            let base = gamma.remove(q).conjunction_extended(beta);
            if base.contains_unknown() && !ck.opts.with_unknown {
                continue;
            }
            let mut label = base;
            for ch in ck.graph.children_of(pnode) {
                label = label.remove(ch);
            }
            if ck.opts.with_node_labels {
                label = enforce_well_definedness(ck, label);
            }
            if ck.update_ordinary(x, y, label, value, None)? {
                ck.status.r3_calls += 1;
                trace!(?x, ?y, %label, value, "R3 rewrite");
            }
            if ck.witness.is_some() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// α′ of R0: drop the observed proposition, then every proposition whose
/// observation is confined to scenarios this label no longer implies.
pub(super) fn make_alpha_prime(ck: &Checker<'_>, alpha: Label, p: char, obs: NodeId) -> Label {
    let mut label = alpha.remove(p);
    for q in ck.graph.children_of(obs) {
        label = label.remove(q);
    }
    if ck.opts.with_node_labels {
        label = enforce_well_definedness(ck, label);
    }
    label
}

/// Remove literals until `(L \ q) ⊨ label(Q?)` holds for every remaining
/// proposition `q` — the well-definedness condition derived labels must
/// keep satisfying.
pub(super) fn enforce_well_definedness(ck: &Checker<'_>, mut label: Label) -> Label {
    loop {
        let mut changed = false;
        for q in label.propositions().collect::<Vec<_>>() {
            match ck.graph.observer(q) {
                Some(o) => {
                    let obs_label = ck.graph.node(o).label;
                    if !label.remove(q).subsumes(&obs_label) {
                        label = label.remove(q);
                        changed = true;
                    }
                }
                // No observer: the literal cannot be honored at all.
                None => {
                    label = label.remove(q);
                    changed = true;
                }
            }
        }
        if !changed {
            return label;
        }
    }
}
