//! The constraint-propagation engine.
//!
//! A single-threaded worklist scheduler: every edge is seeded in a stable
//! (source-name, target-name) order, and each cycle dequeues one edge and
//! applies every applicable rule around it, re-enqueuing edges whose
//! payload tightened. The loop ends at a fixed point (worklist empty), on
//! an inconsistency witness (a negative self-loop under an unknown-free
//! label), or when the wall-clock budget expires — the only yield point is
//! the budget check at each dequeue boundary.
//!
//! # Prior Art
//!
//! - Dechter, R., Meiri, I. & Pearl, J. (1991). "Temporal constraint
//!   networks." Artificial Intelligence, 49(1–3), 61–95. The STN fragment
//!   is classical shortest-path consistency.
//! - Morris, P., Muscettola, N. & Vidal, T. (2001). "Dynamic control of
//!   plans with temporal uncertainty." IJCAI. The lower/upper/cross-case
//!   and label-removal rules implemented in [`stnu`] are the reduction
//!   rules of this line of work.
//! - Hunsberger, L. & Posenato, R. (2016). "Checking the dynamic
//!   consistency of conditional temporal networks with bounded reaction
//!   times." ICAPS. Source of the R0/R3 label-modification rules and of
//!   the unknown-literal (q-label) treatment with `-∞` capping.
//!
//! # Termination
//!
//! Every successful update strictly decreases one value of one label on
//! one edge, inside the finite lattice bounded below by `-∞`: negative
//! self-loops under unknown-free labels stop the run, and negative
//! self-loops under q-labels are capped to `-∞` instead of descending.
//! A cycle budget derived from the instance size backstops the argument.

pub mod rules;
pub mod stnu;

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tracing::{debug, info, warn};
use xxhash_rust::xxh3::Xxh3Builder;

use crate::alabel::ALabel;
use crate::arith::{self, NEG_INFINITY, POS_INFINITY};
use crate::config::CheckOptions;
use crate::error::TnError;
use crate::graph::{EdgeId, NodeId, TNGraph, ZERO_NODE_NAME};
use crate::label::Label;
use crate::status::{CheckStatus, Termination};

/// One contingent link `(A, C, x, y)`: the duration from activation `A` to
/// contingent timepoint `C` falls in `[x, y]` and is not controllable.
#[derive(Debug, Clone)]
pub struct ContingentLink {
    pub activation: NodeId,
    pub contingent: NodeId,
    pub lower: i32,
    pub upper: i32,
    pub label: Label,
    pub letter_index: u8,
    pub letter: ALabel,
}

/// Run a full consistency/controllability check on the graph.
///
/// The graph is mutated in place (it becomes the *checked* graph); the
/// returned status is the observable result.
pub fn check(graph: &mut TNGraph, opts: &CheckOptions) -> Result<CheckStatus, TnError> {
    opts.validate()?;
    let mut checker = Checker::new(graph, opts.clone());
    checker.run()?;
    Ok(checker.finish())
}

pub(crate) struct Checker<'g> {
    pub(crate) graph: &'g mut TNGraph,
    pub(crate) opts: CheckOptions,
    pub(crate) status: CheckStatus,
    pub(crate) horizon: i32,
    pub(crate) links: Vec<ContingentLink>,
    /// activation node → index into `links`.
    pub(crate) activation_of: HashMap<NodeId, usize, Xxh3Builder>,
    /// contingent node → index into `links`.
    pub(crate) contingent_of: HashMap<NodeId, usize, Xxh3Builder>,
    pub(crate) z: NodeId,

    queue: VecDeque<EdgeId>,
    in_queue: Vec<bool>,
    /// LP derivation provenance, for witness-cycle reconstruction:
    /// (source, target, label) → (midpoint, left label, right label).
    provenance: HashMap<(NodeId, NodeId, Label), (NodeId, Label, Label), Xxh3Builder>,
    pub(crate) witness: Option<(NodeId, Label)>,
    start: Instant,
    cycle_budget: u64,
}

impl<'g> Checker<'g> {
    fn new(graph: &'g mut TNGraph, opts: CheckOptions) -> Checker<'g> {
        Checker {
            graph,
            opts,
            status: CheckStatus::new(),
            horizon: 0,
            links: Vec::new(),
            activation_of: HashMap::with_hasher(Xxh3Builder::new()),
            contingent_of: HashMap::with_hasher(Xxh3Builder::new()),
            z: NodeId(0),
            queue: VecDeque::new(),
            in_queue: Vec::new(),
            provenance: HashMap::with_hasher(Xxh3Builder::new()),
            witness: None,
            start: Instant::now(),
            cycle_budget: u64::MAX,
        }
    }

    fn run(&mut self) -> Result<(), TnError> {
        self.initialize()?;
        if self.witness.is_some() {
            return Ok(());
        }

        // Seed the worklist with every edge in the stable order.
        for id in self.graph.edges_in_stable_order() {
            self.enqueue(id);
        }

        while let Some(id) = self.queue.pop_front() {
            // Budget checks only at the cycle boundary.
            if self.start.elapsed() >= self.opts.timeout() {
                self.status.timeout = true;
                info!(cycles = self.status.cycles, "check timed out");
                return Ok(());
            }
            if self.status.cycles >= self.cycle_budget {
                warn!(
                    budget = self.cycle_budget,
                    "cycle budget exhausted; treating as timeout"
                );
                self.status.timeout = true;
                return Ok(());
            }
            self.status.cycles += 1;
            self.mark_dequeued(id);

            if self.graph.edge(id).is_none() {
                continue;
            }
            self.apply_rules_around(id)?;
            if self.witness.is_some() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Apply every rule that involves the dequeued edge.
    fn apply_rules_around(&mut self, id: EdgeId) -> Result<(), TnError> {
        let Some(edge) = self.graph.edge(id) else {
            return Ok(());
        };
        let (a, b) = (edge.source, edge.target);

        // LP forward: (A→B) ∘ (B→C), and backward: (C→A) ∘ (A→B).
        for f in self.graph.out_edges(b).to_vec() {
            rules::lp_combine(self, id, f)?;
            if self.witness.is_some() {
                return Ok(());
            }
        }
        for g in self.graph.in_edges(a).to_vec() {
            rules::lp_combine(self, g, id)?;
            if self.witness.is_some() {
                return Ok(());
            }
        }

        // Observation rules.
        if self.graph.node(a).is_observer() {
            rules::apply_r0(self, id)?;
            rules::apply_r3_as_observation(self, id)?;
        }
        rules::apply_r3(self, id)?;
        if self.witness.is_some() {
            return Ok(());
        }

        // Contingent rules.
        if self.contingent_of.contains_key(&a) {
            stnu::lower_and_cross_case(self, id)?;
        }
        if self.activation_of.contains_key(&b) {
            stnu::letter_removal(self, id)?;
        }
        if !self.links.is_empty() && b == self.z {
            stnu::z_letter_removal(self, id)?;
            // A tightened activation-to-Z distance lowers the removal
            // threshold for every other edge into Z.
            if self.activation_of.contains_key(&a) {
                for f in self.graph.in_edges(self.z).to_vec() {
                    if f != id {
                        stnu::z_letter_removal(self, f)?;
                    }
                    if self.witness.is_some() {
                        return Ok(());
                    }
                }
            }
        }
        // A re-enqueued activation edge re-triggers its contingent's
        // outgoing combinations.
        if let Some(k) = self.edge_link_index(id) {
            let c = self.links[k].contingent;
            for f in self.graph.out_edges(c).to_vec() {
                stnu::lower_and_cross_case(self, f)?;
                if self.witness.is_some() {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn edge_link_index(&self, id: EdgeId) -> Option<usize> {
        let e = self.graph.edge(id)?;
        let k = *self.activation_of.get(&e.source)?;
        (self.links[k].contingent == e.target).then_some(k)
    }

    // ── Initialization ────────────────────────────────────────────────────

    fn initialize(&mut self) -> Result<(), TnError> {
        self.start = Instant::now();
        self.status = CheckStatus::new();

        // 1. The zero timepoint.
        self.z = self.graph.ensure_z();
        if !self.graph.node(self.z).label.is_empty() {
            return Err(TnError::IllDefined(format!(
                "the zero timepoint {ZERO_NODE_NAME} must carry the empty label"
            )));
        }

        self.collect_contingent_links()?;
        self.validate_and_repair_edges()?;
        self.scan_initial_negative_loops();
        if self.witness.is_some() {
            return Ok(());
        }

        // 4. Horizon.
        self.horizon = match self.opts.horizon {
            Some(h) => h,
            None => self.computed_horizon(),
        };
        debug!(horizon = self.horizon, "initialized horizon");

        // 5. Bounds from and to Z for every timepoint.
        let node_ids: Vec<NodeId> = self.graph.nodes().map(|(id, _)| id).collect();
        for x in node_ids {
            if x == self.z {
                continue;
            }
            let x_label = if self.opts.with_node_labels {
                self.graph.node(x).label
            } else {
                Label::empty()
            };
            let to = self.graph.ensure_edge(self.z, x);
            if let Some(e) = self.graph.edge_mut(to) {
                e.values.put(Label::empty(), self.horizon);
            }
            let from = self.graph.ensure_edge(x, self.z);
            if let Some(e) = self.graph.edge_mut(from) {
                e.values.put(x_label, 0);
            }
        }

        self.cycle_budget = self.computed_cycle_budget();
        info!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            links = self.links.len(),
            observers = self.graph.observers().len(),
            "initialization complete"
        );
        Ok(())
    }

    /// Pair up contingent edges, register case letters, and make sure the
    /// implied ordinary bounds are present.
    fn collect_contingent_links(&mut self) -> Result<(), TnError> {
        let candidates: Vec<EdgeId> = self
            .graph
            .edge_ids()
            .filter(|id| self.graph.edge(*id).is_some_and(|e| e.lower.is_some()))
            .collect();

        for id in candidates {
            let Some(edge) = self.graph.edge(id) else {
                continue;
            };
            let (a, c) = (edge.source, edge.target);
            let Some(lc) = edge.lower else { continue };
            let link_label = lc.label;
            let x = lc.value;

            let c_name = self.graph.node_name(c).to_string();
            let letter_index = self.graph.alphabet_mut().register(&c_name)?;
            let letter = ALabel::from_index(self.graph.alphabet(), letter_index);
            if lc.node != letter {
                return Err(TnError::IllDefined(format!(
                    "lower-case value on {} -> {} must name the contingent timepoint {c_name}",
                    self.graph.node_name(a),
                    c_name
                )));
            }

            let companion = self.graph.find_edge(c, a).ok_or_else(|| {
                TnError::IllDefined(format!(
                    "contingent link {} => {c_name} has no companion upper-bound edge",
                    self.graph.node_name(a)
                ))
            })?;
            let neg_y = self
                .graph
                .edge(companion)
                .and_then(|e| e.upper.get(&letter, &link_label))
                .ok_or_else(|| {
                    TnError::IllDefined(format!(
                        "contingent link {} => {c_name} has no upper-case value",
                        self.graph.node_name(a)
                    ))
                })?;
            let y = -neg_y;
            if x < 0 || y < x {
                return Err(TnError::IllDefined(format!(
                    "contingent link {} => {c_name} has bounds [{x}, {y}]",
                    self.graph.node_name(a)
                )));
            }

            // Implied ordinary bounds: C - A ≤ y and A - C ≤ -x.
            if let Some(e) = self.graph.edge_mut(id) {
                e.values.put(link_label, y);
            }
            if let Some(e) = self.graph.edge_mut(companion) {
                e.values.put(link_label, -x);
            }

            let k = self.links.len();
            self.links.push(ContingentLink {
                activation: a,
                contingent: c,
                lower: x,
                upper: y,
                label: link_label,
                letter_index,
                letter,
            });
            self.activation_of.insert(a, k);
            if self.contingent_of.insert(c, k).is_some() {
                return Err(TnError::IllDefined(format!(
                    "timepoint {c_name} is contingent for two links"
                )));
            }
        }
        Ok(())
    }

    /// Well-definedness pass: endpoint scenarios must be consistent, value
    /// labels are conjoined with the endpoint scenario (values that can
    /// never apply are dropped), and every proposition must have an
    /// observer whose own scenario the label honors.
    fn validate_and_repair_edges(&mut self) -> Result<(), TnError> {
        let ids: Vec<EdgeId> = self.graph.edge_ids().collect();
        for id in ids {
            let Some(edge) = self.graph.edge(id) else {
                continue;
            };
            let (src, dst) = (edge.source, edge.target);
            let env = if self.opts.with_node_labels {
                let sl = self.graph.node(src).label;
                let dl = self.graph.node(dst).label;
                sl.conjunction(&dl).ok_or_else(|| {
                    TnError::IllDefined(format!(
                        "edge {} -> {} joins nodes with inconsistent scenarios {sl} and {dl}",
                        self.graph.node_name(src),
                        self.graph.node_name(dst)
                    ))
                })?
            } else {
                Label::empty()
            };

            let entries: Vec<(Label, i32)> = self
                .graph
                .edge(id)
                .map(|e| e.values.entries().collect())
                .unwrap_or_default();
            let mut repaired: Vec<(Label, i32)> = Vec::with_capacity(entries.len());
            for (l, v) in entries {
                match l.conjunction(&env) {
                    Some(fixed) => repaired.push((fixed, v)),
                    // Inapplicable under the endpoint scenario: drop it.
                    None => debug!(
                        edge = %self.graph.edge(id).map(|e| e.name.clone()).unwrap_or_default(),
                        label = %l,
                        "dropping labeled value inconsistent with endpoint scenarios"
                    ),
                }
            }
            for (l, _) in &repaired {
                self.check_label_observers(*l, src, dst)?;
            }
            if let Some(e) = self.graph.edge_mut(id) {
                let mut rebuilt = crate::labeled_values::LabeledValueMap::new();
                for (l, v) in repaired {
                    rebuilt.put(l, v);
                }
                e.values = rebuilt;
            }

            // Upper-case labels obey the same observer discipline.
            let uc_labels: Vec<Label> = self
                .graph
                .edge(id)
                .map(|e| e.upper.entries().map(|(_, l, _)| l).collect())
                .unwrap_or_default();
            for l in uc_labels {
                self.check_label_observers(l, src, dst)?;
            }
        }
        Ok(())
    }

    fn check_label_observers(&self, label: Label, src: NodeId, dst: NodeId) -> Result<(), TnError> {
        for q in label.propositions() {
            let Some(obs) = self.graph.observer(q) else {
                return Err(TnError::IllDefined(format!(
                    "edge {} -> {} mentions '{q}' but no node observes it",
                    self.graph.node_name(src),
                    self.graph.node_name(dst)
                )));
            };
            if self.opts.with_node_labels {
                let obs_label = self.graph.node(obs).label;
                if !label.remove(q).subsumes(&obs_label) {
                    return Err(TnError::IllDefined(format!(
                        "edge {} -> {}: label {label} does not honor the scenario {obs_label} of observer {}",
                        self.graph.node_name(src),
                        self.graph.node_name(dst),
                        self.graph.node_name(obs)
                    )));
                }
            }
        }
        Ok(())
    }

    /// 3. An input negative self-loop under an unknown-free label is an
    /// immediate inconsistency.
    fn scan_initial_negative_loops(&mut self) {
        for id in self.graph.edge_ids().collect::<Vec<_>>() {
            let Some(edge) = self.graph.edge(id) else {
                continue;
            };
            if edge.source != edge.target {
                continue;
            }
            let node = edge.source;
            for (l, v) in edge.values.entries() {
                if v < 0 && !l.contains_unknown() {
                    self.witness = Some((node, l));
                    return;
                }
            }
        }
    }

    fn computed_horizon(&self) -> i32 {
        let mut total: i64 = 0;
        for id in self.graph.edge_ids() {
            let Some(edge) = self.graph.edge(id) else {
                continue;
            };
            for v in edge.values.values() {
                if v > NEG_INFINITY && v < POS_INFINITY {
                    total += i64::from(v).abs();
                }
            }
            for (_, _, v) in edge.upper.entries() {
                if v > NEG_INFINITY && v < POS_INFINITY {
                    total += i64::from(v).abs();
                }
            }
            if let Some(lc) = edge.lower {
                total += i64::from(lc.value).abs();
            }
        }
        total.clamp(1, i64::from(POS_INFINITY) - 1) as i32
    }

    fn computed_cycle_budget(&self) -> u64 {
        let edges = self.graph.edge_count().max(1) as u64;
        let props = self.graph.observers().len().min(20) as u32;
        edges
            .saturating_mul(1u64 << props)
            .saturating_mul(self.horizon as u64 + 1)
            .max(10_000)
    }

    // ── Value updates ─────────────────────────────────────────────────────

    /// Land a derived ordinary value, detecting negative self-loops.
    /// Returns whether the payload tightened.
    pub(crate) fn update_ordinary(
        &mut self,
        a: NodeId,
        c: NodeId,
        label: Label,
        mut value: i32,
        via: Option<(NodeId, Label, Label)>,
    ) -> Result<bool, TnError> {
        if a == c {
            if value >= 0 {
                return Ok(false);
            }
            if label.contains_unknown() {
                // A negative q-loop descends forever; cap it at -∞ instead.
                value = NEG_INFINITY;
            }
        }
        let id = self.graph.ensure_edge(a, c);
        let Some(edge) = self.graph.edge_mut(id) else {
            return Ok(false);
        };
        if !edge.values.put(label, value) {
            return Ok(false);
        }
        self.status.propagation_calls += 1;
        if let Some(v) = via {
            self.provenance.insert((a, c, label), v);
        }
        if a == c && value < 0 && !label.contains_unknown() {
            self.witness = Some((a, label));
            return Ok(true);
        }
        self.enqueue(id);
        Ok(true)
    }

    /// Land a derived upper-case value. A negative self-loop under an
    /// unknown-free label witnesses uncontrollability: the adversary can
    /// realize the worst-case durations of every letter in the case label.
    pub(crate) fn update_upper(
        &mut self,
        a: NodeId,
        c: NodeId,
        case: ALabel,
        label: Label,
        mut value: i32,
    ) -> Result<bool, TnError> {
        if case.is_empty() {
            return self.update_ordinary(a, c, label, value, None);
        }
        if a == c {
            if value >= 0 {
                return Ok(false);
            }
            if label.contains_unknown() {
                value = NEG_INFINITY;
            }
        }
        let id = self.graph.ensure_edge(a, c);
        let Some(edge) = self.graph.edge_mut(id) else {
            return Ok(false);
        };
        if !edge.upper.put(case, label, value)? {
            return Ok(false);
        }
        self.status.propagation_calls += 1;
        if a == c && value < 0 && !label.contains_unknown() {
            self.witness = Some((a, label));
            return Ok(true);
        }
        self.enqueue(id);
        Ok(true)
    }

    /// Sum with the reaction-time offset used by the strict rule variants.
    pub(crate) fn reaction_sum(&self, v: i32) -> Result<i32, TnError> {
        if self.opts.reaction_time == 0 {
            Ok(v)
        } else {
            arith::sum(v, self.opts.reaction_time)
        }
    }

    /// Observation rules apply to non-positive values; the strict variant
    /// (positive reaction time) excludes zero.
    pub(crate) fn observation_applicable(&self, w: i32) -> bool {
        if self.opts.reaction_time == 0 {
            w <= 0
        } else {
            w < 0
        }
    }

    fn enqueue(&mut self, id: EdgeId) {
        let i = id.0 as usize;
        if self.in_queue.len() <= i {
            self.in_queue.resize(i + 1, false);
        }
        if !self.in_queue[i] {
            self.in_queue[i] = true;
            self.queue.push_back(id);
        }
    }

    fn mark_dequeued(&mut self, id: EdgeId) {
        let i = id.0 as usize;
        if i < self.in_queue.len() {
            self.in_queue[i] = false;
        }
    }

    // ── Finishing ─────────────────────────────────────────────────────────

    fn finish(mut self) -> CheckStatus {
        if let Some((node, label)) = self.witness {
            self.status.finished = true;
            self.status.consistency = false;
            self.status.termination = Some(Termination::NegativeLoop);
            self.status.negative_loop_node = Some(self.graph.node_name(node).to_string());
            self.status.negative_cycle = self.reconstruct_cycle(node, label);
        } else if self.status.timeout {
            self.status.finished = false;
            self.status.consistency = false;
            self.status.termination = Some(Termination::Timeout);
        } else {
            self.status.finished = true;
            self.status.consistency = true;
            self.status.termination = Some(Termination::FixedPoint);
        }

        if self.opts.cleaned {
            self.clean_graph();
        }

        self.status.execution_time = self.start.elapsed();
        info!(outcome = self.status.outcome(), cycles = self.status.cycles, "check finished");
        self.status
    }

    /// Walk LP provenance to list the nodes of the witness cycle.
    fn reconstruct_cycle(&self, node: NodeId, label: Label) -> Vec<String> {
        const MAX_DEPTH: u32 = 16;
        const MAX_NODES: usize = 64;
        let mut path: Vec<NodeId> = Vec::new();
        self.expand_provenance(node, node, label, MAX_DEPTH, MAX_NODES, &mut path);
        path.dedup();
        path.into_iter()
            .map(|n| self.graph.node_name(n).to_string())
            .collect()
    }

    fn expand_provenance(
        &self,
        s: NodeId,
        t: NodeId,
        label: Label,
        depth: u32,
        max_nodes: usize,
        out: &mut Vec<NodeId>,
    ) {
        if out.len() >= max_nodes {
            return;
        }
        if depth > 0
            && let Some((m, la, lb)) = self.provenance.get(&(s, t, label))
        {
            self.expand_provenance(s, *m, *la, depth - 1, max_nodes, out);
            self.expand_provenance(*m, t, *lb, depth - 1, max_nodes, out);
            return;
        }
        out.push(s);
    }

    /// Strip unknown-literal entries everywhere and drop edges whose
    /// payload emptied.
    fn clean_graph(&mut self) {
        let ids: Vec<EdgeId> = self.graph.edge_ids().collect();
        for id in ids {
            if let Some(edge) = self.graph.edge_mut(id) {
                edge.values.remove_unknown_entries();
                edge.upper.remove_unknown_entries();
            }
            if self.graph.edge(id).is_some_and(|e| e.is_payload_empty()) {
                self.graph.remove_edge(id);
            }
        }
    }
}
