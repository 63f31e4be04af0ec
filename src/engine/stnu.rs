//! STNU reduction rules for contingent links: lower-case, cross-case, and
//! letter removal. (Upper-case propagation composes inside LP, where an
//! ordinary value meets an upper-case value.)
//!
//! For a contingent link `(A, C, x, y)` the engine keeps a lower-case value
//! `c:x` on `A→C` and an upper-case value `C:-y` on `C→A`; the rules below
//! are the labeled renderings of the classic reductions over that graph.

use tracing::trace;

use crate::arith;
use crate::engine::{Checker, rules::combine_labels};
use crate::error::TnError;
use crate::graph::EdgeId;

/// Lower-case and cross-case: from `C→W` values with the contingent
/// timepoint `C` as source, derive `A→W` values through the link's lower
/// bound — the contingent duration may be as short as `x`, so anything
/// required after `C` is required after `A + x`.
///
/// Ordinary values yield ordinary values (lower-case); upper-case values
/// whose case label does not mention `C` itself yield upper-case values
/// (cross-case). Both require a negative source value.
pub(crate) fn lower_and_cross_case(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let (cnode, w_node) = (edge.source, edge.target);
    let Some(&k) = ck.contingent_of.get(&cnode) else {
        return Ok(());
    };
    if w_node == cnode {
        return Ok(());
    }
    if ck.opts.propagation_only_to_z && w_node != ck.z {
        return Ok(());
    }
    let link = ck.links[k].clone();

    let ordinary: Vec<_> = edge
        .values
        .entries()
        .filter(|(_, v)| *v < 0)
        .collect();
    let upper: Vec<_> = edge
        .upper
        .entries()
        .filter(|(_, _, v)| *v < 0)
        .collect();

    for (beta, v) in ordinary {
        let w = arith::sum(link.lower, v)?;
        let Some(label) = combine_labels(ck, &link.label, &beta, w) else {
            continue;
        };
        if ck.update_ordinary(link.activation, w_node, label, w, None)? {
            ck.status.lower_case_calls += 1;
            trace!(link = ?link.contingent, to = ?w_node, value = w, "lower-case derivation");
        }
        if ck.witness.is_some() {
            return Ok(());
        }
    }

    for (case, beta, v) in upper {
        if case.contains_index(link.letter_index) {
            continue;
        }
        let w = arith::sum(link.lower, v)?;
        let Some(label) = combine_labels(ck, &link.label, &beta, w) else {
            continue;
        };
        if ck.update_upper(link.activation, w_node, case, label, w)? {
            ck.status.cross_case_calls += 1;
            trace!(link = ?link.contingent, to = ?w_node, value = w, "cross-case derivation");
        }
        if ck.witness.is_some() {
            return Ok(());
        }
    }
    Ok(())
}

/// Letter removal on an edge `X→A` ending at the activation of link
/// `(A, C, x, y)`: an upper-case value mentioning `C` with `v ≥ -x` holds
/// unconditionally — even the shortest contingent duration satisfies it —
/// so the letter comes off.
pub(crate) fn letter_removal(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let (x_node, a_node) = (edge.source, edge.target);
    let Some(&k) = ck.activation_of.get(&a_node) else {
        return Ok(());
    };
    let (letter_index, lower) = (ck.links[k].letter_index, ck.links[k].lower);

    let entries: Vec<_> = edge.upper.entries().collect();
    for (case, beta, v) in entries {
        if !case.contains_index(letter_index) {
            continue;
        }
        if v < -lower {
            continue;
        }
        let reduced = case.remove_index(letter_index);
        if ck.update_upper(x_node, a_node, reduced, beta, v)? {
            ck.status.letter_removal_calls += 1;
            trace!(?x_node, ?a_node, value = v, "letter removal");
        }
        if ck.witness.is_some() {
            return Ok(());
        }
    }
    Ok(())
}

/// Letter removal against the zero timepoint: an upper-case value
/// `(ℵ∪{C}, β, w)` on `X→Z` loses the letter `C` when `w ≥ v_A - x` for
/// some ordinary value `(β_A, v_A)` on `A→Z` — by then the contingent
/// duration can no longer push the bound lower.
pub(crate) fn z_letter_removal(ck: &mut Checker<'_>, id: EdgeId) -> Result<(), TnError> {
    let Some(edge) = ck.graph.edge(id) else {
        return Ok(());
    };
    let x_node = edge.source;
    if edge.target != ck.z {
        return Ok(());
    }
    let entries: Vec<_> = edge.upper.entries().collect();

    for (case, beta, w) in entries {
        for k in 0..ck.links.len() {
            let link = ck.links[k].clone();
            if !case.contains_index(link.letter_index) {
                continue;
            }
            let Some(eaz) = ck.graph.find_edge(link.activation, ck.z) else {
                continue;
            };
            let az_entries: Vec<_> = ck
                .graph
                .edge(eaz)
                .map(|e| e.values.entries().collect())
                .unwrap_or_default();
            for (beta_a, v_a) in az_entries {
                let threshold = arith::sum(v_a, -link.lower)?;
                if w < threshold {
                    continue;
                }
                let Some(label) = combine_labels(ck, &beta, &beta_a, w) else {
                    continue;
                };
                let reduced = case.remove_index(link.letter_index);
                if ck.update_upper(x_node, ck.z, reduced, label, w)? {
                    ck.status.letter_removal_calls += 1;
                    trace!(?x_node, value = w, "z letter removal");
                }
                if ck.witness.is_some() {
                    return Ok(());
                }
            }
        }
    }
    Ok(())
}
