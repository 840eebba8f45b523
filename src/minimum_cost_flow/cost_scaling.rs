//! Cost-scaling push-relabel solver, after Goldberg's CS2.
//!
//! The solver keeps a pseudoflow satisfying eps-complementary slackness with
//! the node prices: residual half-arcs have reduced cost `>= -eps`, so flow
//! may sit anywhere in `[0, U]` only on arcs whose reduced cost is within
//! `eps` of zero. Each phase (`refine`) converts the pseudoflow into a flow
//! under the current eps by FIFO push-relabel on admissible arcs (residual,
//! reduced cost `< 0`), then eps shrinks by the scaling factor until it
//! passes `1` (scaled integer costs) or the configured floor. Arcs whose
//! reduced cost magnitude exceeds `cut_off` are suspended out of the
//! admissible network between phases and priced back in when the bound
//! catches up with them; the last phase runs with every arc admitted.
//!
//! Costs are handled internally multiplied by the node count so that eps can
//! stay a positive integer for integer cost types; the factor is divided out
//! in every user-facing quantity. The scaled costs and the price development
//! need headroom in the cost type: pick a type able to hold roughly
//! `n^2 * max|C|`.

use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::residual::{ArcSnap, Buckets, ExcessQueue, HalfArc, Node, Residual, NONE};
use crate::minimum_cost_flow::solver::{Network, Stopwatch};
use crate::minimum_cost_flow::status::Status;
use crate::numeric::{cast, etz, max2, min2, NumericPolicy, Scalar};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Epsilon divisor between phases; usually between 8 and 24.
const ALPHA_DEFAULT: isize = 12;
/// `cut_off = cut_off_factor * eps`, `cut_off_factor = max(12, 1.5 n^0.44)`.
const CUT_OFF_COEF: f64 = 1.5;
const CUT_OFF_POWER: f64 = 0.44;
const CUT_OFF_MIN: f64 = 12.0;
/// `cut_on = cut_off * CUT_OFF_GAP` re-admits suspended arcs.
const CUT_OFF_GAP: f64 = 0.8;
/// Relabels per refine before a global price update: `n*UPDT_FREQ + n_src*UPDT_FREQ_S`.
const UPDT_FREQ: f64 = 0.4;
const UPDT_FREQ_S: u64 = 30;
/// Phase of the first scheduled price-in and the gap between the following ones.
const PRICE_IN_FIRST: u64 = 2;
const PRICE_IN_STEP: u64 = 4;

static INSTANCES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct Cs2<F: Scalar, C: Scalar> {
    pub(crate) nmax: usize,
    pub(crate) mmax: usize,
    pub(crate) n: usize,
    pub(crate) m: usize,
    pub(crate) policy: NumericPolicy<F, C>,
    pub(crate) status: Status,
    pub(crate) senstv: bool,
    pub(crate) reopt_ready: bool,

    pub(crate) res: Residual<F, C>,
    pub(crate) deficit: Vec<F>,

    /// Node count baked into the scaled costs of the loaded instance.
    pub(crate) dn: C,
    alpha: C,
    epsilon: C,
    eps_floor: C,
    cut_off: C,
    cut_on: C,
    cut_off_factor: f64,
    /// Bucket count of `price_update`; ranks at or past it mean unreached.
    linf: usize,
    /// Per-arc cap on the quantized distance contribution.
    w_cap: usize,

    queue: ExcessQueue,
    buckets: Buckets,
    rank: Vec<usize>,

    n_rel: u64,
    relabel_threshold: u64,
    n_ref: u64,
    n_src: usize,
    n_bad_pricein: u64,
    n_bad_relabel: u64,
    time_for_price_in: u64,
    relabel_limit: Option<u64>,
    total_relabels: u64,

    pub(crate) unf_cut: Vec<usize>,
    pub(crate) unf_deficit: F,
    pub(crate) unb_pred: Vec<usize>,
    pub(crate) unb_arc_pred: Vec<usize>,
    pub(crate) unb_node: usize,

    pub(crate) timer: Stopwatch,
    pub(crate) instance: u64,
}

/// Opaque checkpoint of a [`Cs2`] instance; replayable only on the instance
/// that produced it.
pub struct Cs2State<F: Scalar, C: Scalar> {
    pub(crate) instance: u64,
    pub(crate) nmax: usize,
    pub(crate) mmax: usize,
    pub(crate) n: usize,
    pub(crate) m: usize,
    pub(crate) dn: C,
    pub(crate) nodes: Vec<Node<F, C>>,
    pub(crate) arcs: Vec<HalfArc<F, C>>,
    pub(crate) pos: Vec<usize>,
    pub(crate) uncapped: Vec<bool>,
    pub(crate) deficit: Vec<F>,
    pub(crate) status: Status,
    pub(crate) reopt_ready: bool,
    pub(crate) unf_cut: Vec<usize>,
    pub(crate) unf_deficit: F,
    pub(crate) unb_pred: Vec<usize>,
    pub(crate) unb_arc_pred: Vec<usize>,
    pub(crate) unb_node: usize,
}

enum Refined {
    Balanced,
    Unfeasible,
    Stopped,
}

enum Discharged {
    Done,
    NeedUpdate,
    Stuck,
    Budget,
}

impl<F: Scalar, C: Scalar> Default for Cs2<F, C> {
    fn default() -> Self {
        Self::new(NumericPolicy::default())
    }
}

impl<F: Scalar, C: Scalar> Cs2<F, C> {
    pub fn new(policy: NumericPolicy<F, C>) -> Self {
        Self::with_scaling_factor(policy, cast(ALPHA_DEFAULT))
    }

    /// `scaling_factor` divides eps between phases; must exceed one.
    pub fn with_scaling_factor(policy: NumericPolicy<F, C>, scaling_factor: C) -> Self {
        assert!(scaling_factor > C::one());
        Self {
            nmax: 0,
            mmax: 0,
            n: 0,
            m: 0,
            policy,
            status: Status::Unsolved,
            senstv: true,
            reopt_ready: false,
            res: Residual::default(),
            deficit: Vec::new(),
            dn: C::one(),
            alpha: scaling_factor,
            epsilon: C::zero(),
            eps_floor: C::one(),
            cut_off: C::zero(),
            cut_on: C::zero(),
            cut_off_factor: CUT_OFF_MIN,
            linf: 0,
            w_cap: 1,
            queue: ExcessQueue::default(),
            buckets: Buckets::default(),
            rank: Vec::new(),
            n_rel: 0,
            relabel_threshold: 0,
            n_ref: 0,
            n_src: 0,
            n_bad_pricein: 0,
            n_bad_relabel: 0,
            time_for_price_in: 0,
            relabel_limit: None,
            total_relabels: 0,
            unf_cut: Vec::new(),
            unf_deficit: F::zero(),
            unb_pred: Vec::new(),
            unb_arc_pred: Vec::new(),
            unb_node: NONE,
            timer: Stopwatch::default(),
            instance: INSTANCES.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Caps the number of relabel operations per `solve`; exceeding it ends
    /// the solve with [`Status::Stopped`] and the pseudoflow retained.
    pub fn set_relabel_limit(&mut self, limit: Option<u64>) {
        self.relabel_limit = limit;
    }

    // -- loading -----------------------------------------------------------

    pub(crate) fn load(&mut self, nmax: usize, mmax: usize, net: &Network<F, C>) -> Result<()> {
        if nmax == 0 && mmax == 0 {
            self.teardown();
            return Ok(());
        }
        let n = net.num_nodes();
        let m = net.num_arcs();
        if n > nmax {
            return Err(McfError::invalid(format!("{n} nodes exceed the bound {nmax}")));
        }
        if m > mmax {
            return Err(McfError::invalid(format!("{m} arcs exceed the bound {mmax}")));
        }
        if net.costs.len() != m || net.tails.len() != m || net.heads.len() != m {
            return Err(McfError::invalid("arc array lengths disagree"));
        }
        let base = self.policy.name_base.offset();
        for k in 0..m {
            let (t, h) = (net.tails[k], net.heads[k]);
            if t < base || t >= base + n || h < base || h >= base + n {
                return Err(McfError::invalid(format!("arc {k} has an endpoint out of range")));
            }
            if t == h {
                return Err(McfError::invalid(format!("arc {k} is a self-loop")));
            }
            if net.caps[k] < F::zero() {
                return Err(McfError::invalid(format!("arc {k} has a negative capacity")));
            }
        }

        self.nmax = nmax;
        self.mmax = mmax;
        self.n = n;
        self.m = m;
        self.policy.finalize_deficit(nmax);
        self.dn = cast(n.max(1));
        self.deficit = net.deficits.clone();

        let mut snaps = Vec::with_capacity(m);
        let mut uncapped = vec![false; m];
        for k in 0..m {
            let closed = net.costs[k] == C::inf();
            let cost = if closed { C::zero() } else { net.costs[k] * self.dn };
            uncapped[k] = net.caps[k] == F::inf();
            snaps.push(ArcSnap {
                tail: net.tails[k] - base,
                head: net.heads[k] - base,
                r_cap: net.caps[k],
                flow: F::zero(),
                cost,
                closed,
            });
        }
        self.res.clear();
        self.res.reserve(nmax, mmax);
        self.res.layout(n, &snaps);
        self.res.uncapped = uncapped;
        for v in 0..n {
            self.res.nodes[v].excess = -self.deficit[v];
            self.res.nodes[v].price = C::zero();
        }
        self.status = Status::Unsolved;
        self.reopt_ready = false;
        debug!(n, m, "loaded network");
        Ok(())
    }

    fn teardown(&mut self) {
        self.res.clear();
        self.deficit.clear();
        self.nmax = 0;
        self.mmax = 0;
        self.n = 0;
        self.m = 0;
        self.status = Status::Unsolved;
        self.reopt_ready = false;
    }

    // -- solving -----------------------------------------------------------

    pub(crate) fn optimize(&mut self) -> Result<Status> {
        if self.status == Status::Optimal {
            return Ok(self.status);
        }
        self.timer.start();
        let result = self.run();
        self.timer.stop();
        match result {
            Ok(status) => {
                self.status = status;
                self.reopt_ready = true;
                Ok(status)
            }
            Err(err) => {
                self.status = Status::Error;
                self.reopt_ready = false;
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<Status> {
        if self.n == 0 {
            return Ok(Status::Optimal);
        }
        let warm = self.senstv && self.reopt_ready;
        if !warm {
            self.reset_primal_dual();
        }
        self.res.activate_all_suspended();
        if self.detect_unbounded() {
            return Ok(Status::Unbounded);
        }
        self.clamp_uncapped();
        self.recompute_excesses();

        // unbalanced deficits can never be conserved; the whole node set is
        // the certificate
        let mut total = F::zero();
        for v in 0..self.n {
            total += self.res.nodes[v].excess;
        }
        if !etz(total, self.policy.eps_deficit) {
            self.unf_cut = (0..self.n).collect();
            self.unf_deficit = total;
            return Ok(Status::Unfeasible);
        }

        let m_c = self.live_max_cost();
        self.cut_off_factor = max2(CUT_OFF_MIN, CUT_OFF_COEF * (self.n as f64).powf(CUT_OFF_POWER));
        self.linf = ((self.n as f64 + 2.0) * (self.cut_off_factor + 1.0)).ceil() as usize;
        self.w_cap = (self.linf / (self.n + 2)).max(1);
        self.eps_floor = if C::INTEGRAL {
            C::one()
        } else {
            // one scaling step below the user tolerance, but safely above
            // the rounding noise of the price magnitudes the run can reach
            let ulp_floor =
                C::machine_eps() * self.dn * max2(C::one(), m_c) * cast(1024);
            max2(self.policy.eps_cost * self.dn / self.alpha, ulp_floor)
        };
        self.epsilon = max2(m_c, self.eps_floor);
        self.n_ref = 0;
        self.n_rel = 0;
        self.n_bad_pricein = 0;
        self.n_bad_relabel = 0;
        self.total_relabels = 0;
        self.time_for_price_in = PRICE_IN_FIRST;

        loop {
            self.n_ref += 1;
            self.update_cut_off();
            let last = self.epsilon <= self.eps_floor;
            if !last {
                self.price_out();
                if self.n_ref == self.time_for_price_in {
                    self.price_in();
                    self.time_for_price_in += PRICE_IN_STEP;
                }
            } else if self.res.any_suspended() {
                // the final phase runs on the full admissible network
                self.res.activate_all_suspended();
            }
            debug!(phase = self.n_ref, epsilon = %self.epsilon, "refine phase");

            let settled = (self.n_ref > 1 || warm) && self.price_refine();
            if !settled {
                match self.refine()? {
                    Refined::Balanced => {}
                    Refined::Unfeasible => return Ok(Status::Unfeasible),
                    Refined::Stopped => return Ok(Status::Stopped),
                }
            }
            if last {
                break;
            }
            self.update_epsilon();
        }
        debug!(phases = self.n_ref, relabels = self.total_relabels, "optimum found");
        Ok(Status::Optimal)
    }

    /// Resets flows and prices for a from-scratch solve.
    fn reset_primal_dual(&mut self) {
        for k in 0..self.m {
            let fwd = self.res.pos[k];
            let rev = self.res.arcs[fwd].sister;
            let flow = self.res.arcs[rev].r_cap;
            if flow != F::zero() {
                if self.res.uncapped[k] {
                    // the sentinel residual would overflow; the clamp pass
                    // restores a usable bound before the kernel runs
                    self.res.arcs[fwd].r_cap = F::inf();
                } else {
                    self.res.arcs[fwd].r_cap += flow;
                }
                self.res.arcs[rev].r_cap = F::zero();
            }
        }
        for node in &mut self.res.nodes {
            node.price = C::zero();
        }
    }

    fn recompute_excesses(&mut self) {
        for v in 0..self.n {
            self.res.nodes[v].excess = -self.deficit[v];
        }
        for k in 0..self.m {
            let flow = self.res.flow_on(k);
            if flow != F::zero() {
                let tail = self.res.tail_of_arc(k);
                let head = self.res.head_of_arc(k);
                self.res.nodes[tail].excess -= flow;
                self.res.nodes[head].excess += flow;
            }
        }
    }

    fn live_max_cost(&self) -> C {
        let mut m_c = C::zero();
        for k in 0..self.m {
            if !self.res.is_closed(k) {
                m_c = max2(m_c, self.res.cost_of(k).abs());
            }
        }
        m_c
    }

    fn update_epsilon(&mut self) {
        self.epsilon = max2(self.eps_floor, self.epsilon / self.alpha);
    }

    fn update_cut_off(&mut self) {
        let eps = self.epsilon.to_f64().unwrap_or(f64::MAX);
        let limit = C::inf().to_f64().unwrap_or(f64::MAX) / 2.0;
        let off = (self.cut_off_factor * eps).min(limit);
        self.cut_off = C::from_f64(off).unwrap_or_else(C::inf);
        self.cut_on = C::from_f64(off * CUT_OFF_GAP).unwrap_or_else(C::inf);
    }

    // -- unbounded instances -----------------------------------------------

    /// Unbounded instances carry a negative-cost cycle of uncapacitated
    /// arcs; Bellman-Ford over just those arcs finds one before the scaling
    /// loop starts.
    fn detect_unbounded(&mut self) -> bool {
        let mut arcs = Vec::new();
        for k in 0..self.m {
            if self.res.uncapped[k] && !self.res.is_closed(k) {
                arcs.push((self.res.tail_of_arc(k), self.res.head_of_arc(k), self.res.cost_of(k), k));
            }
        }
        if arcs.is_empty() {
            return false;
        }
        let mut dist = vec![C::zero(); self.n];
        let mut pred = vec![(NONE, NONE); self.n];
        let mut start = NONE;
        let mut relaxing = true;
        for _ in 0..=self.n {
            let mut updated = false;
            for &(t, h, c, k) in &arcs {
                if dist[t] + c < dist[h] {
                    dist[h] = dist[t] + c;
                    pred[h] = (t, k);
                    start = h;
                    updated = true;
                }
            }
            if !updated {
                relaxing = false;
                break;
            }
        }
        // still relaxing after n passes means a negative cycle; the n-step
        // predecessor walk below lands on it (and bails out on the acyclic
        // predecessor forest of a converged scan)
        if !relaxing || start == NONE {
            return false;
        }
        let mut probe = start;
        for _ in 0..self.n {
            if pred[probe].0 == NONE {
                return false;
            }
            probe = pred[probe].0;
        }
        self.unb_pred = vec![NONE; self.n];
        self.unb_arc_pred = vec![NONE; self.n];
        self.unb_node = probe;
        let mut v = probe;
        loop {
            let (p, k) = pred[v];
            self.unb_pred[v] = p;
            self.unb_arc_pred[v] = k;
            v = p;
            if v == probe {
                break;
            }
        }
        debug!(node = probe, "negative uncapacitated cycle");
        true
    }

    /// Replaces the `F::inf()` residuals of uncapacitated arcs by a bound no
    /// optimal flow can reach: total supply plus every finite capacity.
    fn clamp_uncapped(&mut self) {
        if !self.res.uncapped.iter().any(|&u| u) {
            return;
        }
        let mut bound_w = <F::Wide as num_traits::Zero>::zero();
        for v in 0..self.n {
            let supply = -self.deficit[v];
            if supply > F::zero() {
                bound_w += cast::<F, F::Wide>(supply);
            }
        }
        for k in 0..self.m {
            if !self.res.uncapped[k] && !self.res.is_closed(k) {
                bound_w += cast::<F, F::Wide>(self.res.cap_raw(k));
            }
        }
        let limit = cast::<F, F::Wide>(F::inf()).floor_div(cast(4));
        let bound: F = cast(min2(bound_w, limit));
        for k in 0..self.m {
            if self.res.uncapped[k] && !self.res.is_closed(k) {
                let fwd = self.res.pos[k];
                let flow = self.res.arcs[self.res.arcs[fwd].sister].r_cap;
                self.res.arcs[fwd].r_cap = max2(bound - flow, F::zero());
            }
        }
    }

    // -- refine ------------------------------------------------------------

    /// One phase: restore eps-optimality by saturating violating arcs, then
    /// drain every positive excess by FIFO push-relabel.
    fn refine(&mut self) -> Result<Refined> {
        self.saturate_violating();
        self.rebuild_queue();
        self.n_rel = 0;
        self.relabel_threshold =
            (self.n as f64 * UPDT_FREQ) as u64 + self.n_src as u64 * UPDT_FREQ_S;
        let mut stalled = 0usize;
        while let Some(i) = self.queue.pop_front() {
            if !(self.res.nodes[i].excess > F::zero()) {
                continue;
            }
            match self.discharge(i)? {
                Discharged::Done => stalled = 0,
                Discharged::NeedUpdate => {
                    stalled = 0;
                    self.queue.push_front(i);
                    if !self.price_update() {
                        return Ok(Refined::Unfeasible);
                    }
                }
                Discharged::Stuck => {
                    self.n_bad_relabel += 1;
                    stalled += 1;
                    self.queue.push_back(i);
                    if stalled > self.n {
                        stalled = 0;
                        if !self.price_update() {
                            return Ok(Refined::Unfeasible);
                        }
                    }
                }
                Discharged::Budget => return Ok(Refined::Stopped),
            }
        }
        Ok(Refined::Balanced)
    }

    /// Pushes every active residual half-arc with negative reduced cost to
    /// its bound; reverse halves cover the over-full forward case.
    fn saturate_violating(&mut self) {
        for v in 0..self.n {
            self.res.nodes[v].current = self.res.nodes[v].first;
            let (first, susp) = (self.res.nodes[v].first, self.res.nodes[v].susp);
            for a in first..susp {
                let r_cap = self.res.arcs[a].r_cap;
                if r_cap > F::zero() && self.res.rc_at(v, a) < C::zero() {
                    self.res.push(v, a, r_cap);
                }
            }
        }
    }

    fn rebuild_queue(&mut self) {
        self.queue.reset(self.n);
        self.n_src = 0;
        for v in 0..self.n {
            if self.res.nodes[v].excess > F::zero() {
                self.queue.push_back(v);
                self.n_src += 1;
            }
        }
    }

    fn discharge(&mut self, i: usize) -> Result<Discharged> {
        loop {
            let mut a = self.res.nodes[i].current;
            let susp = self.res.nodes[i].susp;
            while a < susp {
                let (r_cap, to) = {
                    let arc = &self.res.arcs[a];
                    (arc.r_cap, arc.head)
                };
                if r_cap > F::zero() && self.res.rc_at(i, a) < C::zero() {
                    let amount = min2(self.res.nodes[i].excess, r_cap);
                    self.res.push(i, a, amount);
                    if self.res.nodes[to].excess > F::zero() && self.res.nodes[to].excess <= amount {
                        self.queue.push_back(to);
                    }
                    if !(self.res.nodes[i].excess > F::zero()) {
                        self.res.nodes[i].current = a;
                        return Ok(Discharged::Done);
                    }
                }
                a += 1;
            }
            if !self.relabel(i)? {
                return Ok(Discharged::Stuck);
            }
            if let Some(limit) = self.relabel_limit {
                if self.total_relabels >= limit {
                    return Ok(Discharged::Budget);
                }
            }
            if self.n_rel > self.relabel_threshold {
                return Ok(Discharged::NeedUpdate);
            }
        }
    }

    /// Drops the price of `i` to one eps below the best attainable over its
    /// residual active arcs; false when no such arc exists.
    fn relabel(&mut self, i: usize) -> Result<bool> {
        self.n_rel += 1;
        self.total_relabels += 1;
        let (first, susp) = (self.res.nodes[i].first, self.res.nodes[i].susp);
        let old_price = self.res.nodes[i].price;
        let mut best: Option<C> = None;
        for a in first..susp {
            let arc = &self.res.arcs[a];
            if arc.r_cap > F::zero() {
                let p = self.res.nodes[arc.head].price - arc.cost;
                if best.map_or(true, |b| p > b) {
                    best = Some(p);
                }
            }
        }
        match best {
            Some(p) => {
                let new_price = p - self.epsilon;
                if !(new_price < old_price) {
                    return Err(McfError::internal("relabel failed to decrease a node price"));
                }
                self.res.nodes[i].price = new_price;
                self.res.nodes[i].current = first;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // -- global price update -----------------------------------------------

    /// Reverse Dial's scan from the deficit nodes over the active residual
    /// network, shifting prices by the quantized distances. When some
    /// positive excess stays unreached the suspended arcs are priced back in
    /// and the scan repeats; if nothing was suspended the instance is
    /// unfeasible and the unreached set is the certificate.
    fn price_update(&mut self) -> bool {
        loop {
            if self.dial_from_deficits() {
                for v in 0..self.n {
                    let r = self.rank[v];
                    if r > 0 {
                        let shift = cast::<usize, C>(r) * self.epsilon;
                        self.res.nodes[v].price = self.res.nodes[v].price - shift;
                    }
                    self.res.nodes[v].current = self.res.nodes[v].first;
                }
                self.n_rel = 0;
                return true;
            }
            if self.res.any_suspended() {
                trace!("price update blocked; re-admitting suspended arcs");
                self.n_bad_pricein += 1;
                self.price_in_all();
                continue;
            }
            self.capture_unf_cut();
            return false;
        }
    }

    /// Bucket scan over the reversed active residual graph; returns whether
    /// every node with positive excess received a finite rank.
    fn dial_from_deficits(&mut self) -> bool {
        let n = self.n;
        self.rank.clear();
        self.rank.resize(n, self.linf);
        self.buckets.reset(self.linf, n);
        for v in 0..n {
            if self.res.nodes[v].excess < F::zero() {
                self.rank[v] = 0;
                self.buckets.insert(0, v);
            }
        }
        let mut b = 0;
        while b < self.linf {
            while let Some(j) = self.buckets.pop(b) {
                let (first, susp) = (self.res.nodes[j].first, self.res.nodes[j].susp);
                for a in first..susp {
                    let sister = self.res.arcs[a].sister;
                    if !(self.res.arcs[sister].r_cap > F::zero()) {
                        continue;
                    }
                    let k = self.res.arcs[a].head;
                    if self.rank[k] <= b {
                        continue;
                    }
                    let rc = self.res.rc_at(k, sister);
                    let w = if rc < C::zero() {
                        0
                    } else {
                        // capping the quantized distance keeps the shift safe
                        // and the reachability test exact
                        min2(rc.floor_div(self.epsilon).to_usize().unwrap_or(self.w_cap) + 1, self.w_cap)
                    };
                    let nr = b.saturating_add(w);
                    if nr < self.rank[k] && nr < self.linf {
                        if self.rank[k] < self.linf {
                            self.buckets.remove(self.rank[k], k);
                        }
                        self.rank[k] = nr;
                        self.buckets.insert(nr, k);
                    }
                }
            }
            b += 1;
        }
        (0..n).all(|v| !(self.res.nodes[v].excess > F::zero()) || self.rank[v] < self.linf)
    }

    /// The unreached nodes cannot route their excess to any deficit: no
    /// residual arc leaves the set and nothing inside absorbs flow.
    fn capture_unf_cut(&mut self) {
        self.unf_cut.clear();
        self.unf_deficit = F::zero();
        for v in 0..self.n {
            if self.rank[v] >= self.linf {
                self.unf_cut.push(v);
                self.unf_deficit += self.res.nodes[v].excess;
            }
        }
        debug!(cut = self.unf_cut.len(), deficit = %self.unf_deficit, "unfeasible");
    }

    // -- suspension --------------------------------------------------------

    /// Rotates arc pairs pinned far outside the admissible band out of the
    /// active regions.
    fn price_out(&mut self) {
        for v in 0..self.n {
            let mut a = self.res.nodes[v].first;
            while a < self.res.nodes[v].susp {
                let arc = &self.res.arcs[a];
                if !arc.is_forward() {
                    a += 1;
                    continue;
                }
                let rc = self.res.rc_at(v, a);
                let rev_cap = self.res.arcs[arc.sister].r_cap;
                let r_cap = arc.r_cap;
                // suspend only pairs already pinned at the bound the sign of
                // their reduced cost demands
                let pinned_empty = rc > self.cut_off && rev_cap == F::zero();
                let pinned_full = rc < -self.cut_off && r_cap == F::zero();
                if pinned_empty || pinned_full {
                    let s = self.res.suspend_half(v, a);
                    let sister = self.res.arcs[s].sister;
                    let head = self.res.arcs[s].head;
                    self.res.suspend_half(head, sister);
                    // slot `a` now holds the previous last active half
                } else {
                    a += 1;
                }
            }
        }
    }

    /// Re-admits suspended pairs whose reduced cost dropped inside the
    /// cut-on band; refine's saturation pass fixes any slack violation.
    fn price_in(&mut self) {
        for v in 0..self.n {
            let mut a = self.res.nodes[v].susp;
            while a < self.res.nodes[v].closed {
                if !self.res.arcs[a].is_forward() {
                    a += 1;
                    continue;
                }
                let rc = self.res.rc_at(v, a);
                if rc.abs() <= self.cut_on {
                    let s = self.res.activate_half(v, a);
                    let sister = self.res.arcs[s].sister;
                    let head = self.res.arcs[s].head;
                    self.res.activate_half(head, sister);
                    if a == s {
                        a += 1;
                    }
                    // otherwise slot `a` received another suspended half
                } else {
                    a += 1;
                }
            }
        }
    }

    /// Re-admits everything and restores eps-optimality among the returned
    /// arcs; the excess queue is rebuilt because saturation may create new
    /// active nodes.
    fn price_in_all(&mut self) {
        self.res.activate_all_suspended();
        self.saturate_violating();
        self.rebuild_queue();
    }

    // -- price refine ------------------------------------------------------

    /// Attempts to prove the current flow already eps-optimal by pure price
    /// shifts: a topological scan of the admissible graph yields tentative
    /// drops in eps units, validated against every active residual arc.
    /// Installs the shifts and skips the refine on success.
    ///
    /// With shifts `pi' = pi + r*eps`, a residual arc (i, j) keeps
    /// `rc' >= -eps` iff `r[j] <= r[i] + floor(rc/eps) + 1`, so the
    /// relaxation runs tail to head in topological order.
    fn price_refine(&mut self) -> bool {
        if self.res.nodes[..self.n].iter().any(|node| node.excess != F::zero()) {
            return false;
        }
        let order = match self.topo_admissible() {
            Some(order) => order,
            // an admissible cycle means the flow is not eps-optimal yet
            None => return false,
        };
        let mut r = vec![0i64; self.n];
        for &i in &order {
            let (first, susp) = (self.res.nodes[i].first, self.res.nodes[i].susp);
            for a in first..susp {
                let arc = &self.res.arcs[a];
                if arc.r_cap > F::zero() {
                    let rc = self.res.rc_at(i, a);
                    if rc < C::zero() {
                        let w = self.eps_units(rc);
                        let j = arc.head;
                        r[j] = r[j].min(r[i] + w);
                    }
                }
            }
        }
        for v in 0..self.n {
            let (first, susp) = (self.res.nodes[v].first, self.res.nodes[v].susp);
            for a in first..susp {
                let arc = &self.res.arcs[a];
                if arc.r_cap > F::zero() && r[arc.head] > r[v] + self.eps_units(self.res.rc_at(v, a)) {
                    return false;
                }
            }
        }
        for v in 0..self.n {
            if r[v] != 0 {
                let shift = cast::<i64, C>(-r[v]) * self.epsilon;
                self.res.nodes[v].price = self.res.nodes[v].price - shift;
            }
            self.res.nodes[v].current = self.res.nodes[v].first;
        }
        trace!("price refine settled the phase");
        true
    }

    /// `floor(rc / eps) + 1`, saturated for out-of-range positives.
    fn eps_units(&self, rc: C) -> i64 {
        rc.floor_div(self.epsilon).to_i64().unwrap_or(i64::MAX / 2) + 1
    }

    /// Depth-first topological order of the admissible graph, or `None` when
    /// it contains a cycle.
    fn topo_admissible(&self) -> Option<Vec<usize>> {
        const UNSEEN: u8 = 0;
        const OPEN: u8 = 1;
        const DONE: u8 = 2;
        let n = self.n;
        let mut state = vec![UNSEEN; n];
        let mut order = Vec::with_capacity(n);
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for s in 0..n {
            if state[s] != UNSEEN {
                continue;
            }
            state[s] = OPEN;
            stack.push((s, self.res.nodes[s].first));
            'dfs: while let Some(&(v, cursor)) = stack.last() {
                let susp = self.res.nodes[v].susp;
                let mut a = cursor;
                while a < susp {
                    let arc = &self.res.arcs[a];
                    let admissible = arc.r_cap > F::zero() && self.res.rc_at(v, a) < C::zero();
                    let j = arc.head;
                    a += 1;
                    if admissible {
                        match state[j] {
                            OPEN => return None,
                            UNSEEN => {
                                if let Some(top) = stack.last_mut() {
                                    top.1 = a;
                                }
                                state[j] = OPEN;
                                stack.push((j, self.res.nodes[j].first));
                                continue 'dfs;
                            }
                            _ => {}
                        }
                    }
                }
                state[v] = DONE;
                order.push(v);
                stack.pop();
            }
        }
        order.reverse();
        Some(order)
    }

    // -- objective values --------------------------------------------------

    /// `sum(cost * flow)` over the user arcs, in the wide cost type, with
    /// the internal scale factor divided back out.
    pub(crate) fn primal_cost(&self) -> C::Wide {
        let mut total = <C::Wide as num_traits::Zero>::zero();
        for k in 0..self.m {
            let flow = self.res.flow_on(k);
            if flow != F::zero() {
                total += cast::<C, C::Wide>(self.res.cost_of(k)) * cast::<F, C::Wide>(flow);
            }
        }
        total / cast::<C, C::Wide>(self.dn)
    }

    /// `b*pi - sum(U * max(0, -RC))`, the dual objective at the current
    /// prices.
    pub(crate) fn dual_cost(&self) -> C::Wide {
        let mut total = <C::Wide as num_traits::Zero>::zero();
        for v in 0..self.n {
            let deficit = self.deficit[v];
            if deficit != F::zero() {
                total += cast::<C, C::Wide>(self.res.nodes[v].price) * cast::<F, C::Wide>(deficit);
            }
        }
        let eps_scaled = self.policy.eps_cost * self.dn;
        for k in 0..self.m {
            if self.res.is_closed(k) {
                continue;
            }
            let rc = self.scaled_rc(k);
            if rc < -eps_scaled {
                if self.res.uncapped[k] {
                    return -<C::Wide as Scalar>::inf();
                }
                total += cast::<C, C::Wide>(rc) * cast::<F, C::Wide>(self.res.cap_raw(k));
            }
        }
        total / cast::<C, C::Wide>(self.dn)
    }

    /// Reduced cost of user arc `k` in the scaled cost space.
    pub(crate) fn scaled_rc(&self, k: usize) -> C {
        let fwd = self.res.pos[k];
        let tail = self.res.arcs[self.res.arcs[fwd].sister].head;
        self.res.rc_at(tail, fwd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minimum_cost_flow::solver::McfSolver;

    fn solver() -> Cs2<i64, i64> {
        Cs2::default()
    }

    #[test]
    fn two_node_transfer() {
        let mut cs2 = solver();
        let net = Network::new(2).deficit(0, -3).deficit(1, 3).arc(1, 2, 5, 7);
        cs2.load_net(2, 1, &net).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 21);
        let mut x = [0i64];
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x, [3]);
    }

    #[test]
    fn chooses_the_cheap_parallel_route() {
        let mut cs2 = solver();
        let net = Network::new(2)
            .deficit(0, -4)
            .deficit(1, 4)
            .arc(1, 2, 3, 10)
            .arc(1, 2, 3, 1);
        cs2.load_net(2, 2, &net).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        // three units over the cheap arc, one over the expensive one
        assert_eq!(cs2.get_fo(), 3 + 10);
        let mut x = [0i64; 2];
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x, [1, 3]);
    }

    #[test]
    fn negative_cost_arc_is_saturated_in_a_circulation() {
        let mut cs2 = solver();
        // all deficits zero; the negative two-arc cycle has finite capacity
        let net = Network::new(2).arc(1, 2, 2, -5).arc(2, 1, 2, 1);
        cs2.load_net(2, 2, &net).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 2 * (-5) + 2);
        let mut x = [0i64; 2];
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x, [2, 2]);
    }

    #[test]
    fn zero_cost_circulation_is_trivially_optimal() {
        let mut cs2 = solver();
        let net = Network::new(3).arc(1, 2, 4, 2).arc(2, 3, 4, 3).arc(3, 1, 4, 1);
        cs2.load_net(3, 3, &net).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 0);
    }

    #[test]
    fn empty_instance_is_optimal_at_zero() {
        let mut cs2 = solver();
        cs2.load_net(1, 1, &Network::new(1)).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 0);
    }

    #[test]
    fn relabel_budget_stops_the_solve() {
        let mut cs2 = solver();
        let net = Network::new(4)
            .deficit(0, -8)
            .deficit(3, 8)
            .arc(1, 2, 8, 1)
            .arc(2, 3, 8, 1)
            .arc(3, 4, 8, 1);
        cs2.load_net(4, 3, &net).unwrap();
        cs2.set_relabel_limit(Some(1));
        assert_eq!(cs2.solve().unwrap(), Status::Stopped);
        cs2.set_relabel_limit(None);
    }

    #[test]
    fn real_costs_reach_the_configured_floor() {
        let mut cs2: Cs2<f64, f64> = Cs2::default();
        let net = Network::new(2).deficit(0, -1.5).deficit(1, 1.5).arc(1, 2, 2.0, 3.0);
        cs2.load_net(2, 1, &net).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert!((cs2.get_fo() - 4.5).abs() < 1e-9);
    }
}
