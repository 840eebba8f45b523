//! Abstract interface every minimum-cost flow backend exposes.
//!
//! The problem solved is
//!
//! ```text
//!   min  sum{ (i,j) in A } C[i,j] * X[i,j]
//!   s.t. sum{ (j,i) in A } X[j,i] - sum{ (i,j) in A } X[i,j] = b[i]   i in N
//!        0 <= X[i,j] <= U[i,j]                                       (i,j) in A
//! ```
//!
//! where `b` is the node deficit vector: source nodes (producing flow) have
//! negative deficits, sink nodes (consuming flow) positive ones. Given node
//! potentials `pi`, the reduced cost of an arc is
//! `RC[i,j] = C[i,j] - pi[j] + pi[i]`; a primal and dual feasible pair is
//! optimal iff `RC > 0 => X = 0` and `RC < 0 => X = U` on every arc.

use crate::minimum_cost_flow::checker;
use crate::minimum_cost_flow::dimacs::{self, FileFormat};
use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::status::Status;
use crate::numeric::{NameBase, Scalar};
use std::io::{BufRead, Write};
use std::ops::Range;
use std::time::{Duration, Instant};

/// Dense description of a network, as consumed by [`McfSolver::load_net`].
///
/// `tails`/`heads` hold user node names under the solver's name base; the
/// deficit of the i-th node is always at position `i`, independent of the
/// name base.
#[derive(Clone, Debug, Default)]
pub struct Network<F, C> {
    pub caps: Vec<F>,
    pub costs: Vec<C>,
    pub deficits: Vec<F>,
    pub tails: Vec<usize>,
    pub heads: Vec<usize>,
}

impl<F: Scalar, C: Scalar> Network<F, C> {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            caps: Vec::new(),
            costs: Vec::new(),
            deficits: vec![F::zero(); num_nodes],
            tails: Vec::new(),
            heads: Vec::new(),
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.deficits.len()
    }

    #[inline]
    pub fn num_arcs(&self) -> usize {
        self.caps.len()
    }

    /// Appends an arc and returns the network for chaining.
    pub fn arc(mut self, tail: usize, head: usize, cap: F, cost: C) -> Self {
        self.tails.push(tail);
        self.heads.push(head);
        self.caps.push(cap);
        self.costs.push(cost);
        self
    }

    /// Sets the deficit at node position `node`.
    pub fn deficit(mut self, node: usize, deficit: F) -> Self {
        self.deficits[node] = deficit;
        self
    }
}

/// Standard interface for linear minimum-cost flow solvers.
///
/// Batch accessors and setters take an optional `nms` index filter plus a
/// `[start, stop)` range; the filter entries outside the range are skipped,
/// and values are read/written compactly in filter order. Without a filter
/// the range itself is enumerated densely.
pub trait McfSolver<F: Scalar, C: Scalar> {
    /// Opaque checkpoint produced by [`McfSolver::save_state`]; replayable
    /// only on the instance that produced it.
    type State;

    // -- initialization ----------------------------------------------------

    /// Loads a new instance from dense arrays, discarding the previous one.
    /// `nmax`/`mmax` bound later `add_node`/`add_arc` growth; all working
    /// memory is sized against them here. `nmax == mmax == 0` tears the
    /// instance down and leaves the solver waiting for a new load.
    ///
    /// An arc loaded with cost `C::inf()` is recorded closed with effective
    /// cost zero, so a later `open_arc` yields a zero-cost arc.
    fn load_net(&mut self, nmax: usize, mmax: usize, net: &Network<F, C>) -> Result<()>;

    /// Optional instance tightening before `solve`; may already settle the
    /// status. The default does nothing.
    fn preprocess(&mut self) -> Result<()> {
        Ok(())
    }

    // -- solving -----------------------------------------------------------

    /// Attempts to optimize the current instance and returns the resulting
    /// [`Status`]. An `Err` is returned only for internal invariant
    /// breaches; unfeasibility and unboundedness are regular outcomes.
    fn solve(&mut self) -> Result<Status>;

    fn status(&self) -> Status;

    // -- reading results ---------------------------------------------------

    /// Arc flows of the current solution.
    fn get_x(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    /// Node potentials of the current solution.
    ///
    /// Costs are handled internally scaled by the number of nodes; returned
    /// potentials and reduced costs divide that factor back out, so with an
    /// integer cost type the rounding may make the returned dual unfeasible.
    /// Choose a floating-point cost type when a feasible dual is critical.
    fn get_pi(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    /// Arc reduced costs with respect to the returned potentials.
    fn get_rc(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn arc_rc(&self, arc: usize) -> Result<C>;

    /// Primal objective value; `+inf` when unfeasible (or unsolved),
    /// `-inf` when unbounded, an upper bound when stopped.
    fn get_fo(&self) -> C::Wide;

    /// Dual objective value; mirrors [`McfSolver::get_fo`] on failure.
    fn get_dfo(&self) -> C::Wide;

    /// For solvers that enumerate multiple optimal flows; the default
    /// backend produces a single one.
    fn have_new_x(&mut self) -> bool {
        false
    }

    fn have_new_pi(&mut self) -> bool {
        false
    }

    /// After an unfeasible solve, fills `cut` with the node names of a
    /// separating set whose outbound capacity cannot cover its supply and
    /// returns the net excess trapped in it (positive: source side).
    fn get_unf_cut(&self, cut: &mut Vec<usize>) -> Result<F>;

    /// After an unbounded solve, writes node- and arc-predecessor functions
    /// encoding a negative-cost cycle of uncapacitated arcs into `pred` and
    /// `arc_pred` (length >= number of nodes; untouched entries stay as
    /// given) and returns the name of one node on the cycle.
    fn get_unb_cycle(&self, pred: &mut [usize], arc_pred: &mut [usize]) -> Result<usize>;

    // -- reading data ------------------------------------------------------

    fn num_nodes(&self) -> usize;

    fn num_arcs(&self) -> usize;

    fn arcs(
        &self,
        tails: &mut [usize],
        heads: &mut [usize],
        nms: Option<&[usize]>,
        range: Range<usize>,
    ) -> Result<()>;

    fn arc_tail(&self, arc: usize) -> Result<usize>;

    fn arc_head(&self, arc: usize) -> Result<usize>;

    fn costs(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn arc_cost(&self, arc: usize) -> Result<C>;

    fn u_caps(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn arc_cap(&self, arc: usize) -> Result<F>;

    fn deficits(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn node_deficit(&self, node: usize) -> Result<F>;

    /// Quadratic cost coefficient; this is a linear solver, so always zero.
    fn q_coef(&self, arc: usize) -> Result<C> {
        if arc >= self.num_arcs() {
            return Err(McfError::invalid(format!("arc {arc} out of range")));
        }
        Ok(C::zero())
    }

    fn is_closed_arc(&self, arc: usize) -> bool;

    fn is_deleted_arc(&self, arc: usize) -> bool;

    // -- changing data -----------------------------------------------------

    fn chg_costs(&mut self, costs: &[C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn chg_cost(&mut self, arc: usize, cost: C) -> Result<()>;

    /// Accepted for interface compatibility; any non-zero coefficient is
    /// rejected.
    fn chg_q_coef(&mut self, arc: usize, coef: C) -> Result<()> {
        if arc >= self.num_arcs() {
            return Err(McfError::invalid(format!("arc {arc} out of range")));
        }
        if coef != C::zero() {
            return Err(McfError::invalid("quadratic costs are not supported"));
        }
        Ok(())
    }

    fn chg_caps(&mut self, caps: &[F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn chg_cap(&mut self, arc: usize, cap: F) -> Result<()>;

    fn chg_deficits(&mut self, deficits: &[F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()>;

    fn chg_deficit(&mut self, node: usize, deficit: F) -> Result<()>;

    // -- changing topology -------------------------------------------------

    /// Removes the arc from the admissible network, pushing any flow on it
    /// back; identity, capacity and cost remain retrievable.
    fn close_arc(&mut self, arc: usize) -> Result<()>;

    /// Re-admits a closed arc with its retained capacity and cost.
    fn open_arc(&mut self, arc: usize) -> Result<()>;

    /// Returns the name of the new node.
    fn add_node(&mut self, deficit: F) -> Result<usize>;

    /// Closes all incident arcs, zeroes the deficit, and releases the name
    /// when the node is the last one and nothing references it.
    fn delete_node(&mut self, node: usize) -> Result<()>;

    /// Returns the index of the new arc.
    fn add_arc(&mut self, tail: usize, head: usize, cap: F, cost: C) -> Result<usize>;

    /// Alias of [`McfSolver::close_arc`]: names are not reused. Kept on par
    /// with [`McfSolver::is_deleted_arc`].
    fn delete_arc(&mut self, arc: usize) -> Result<()>;

    /// Re-splices the arc into different adjacency blocks; flow on the arc
    /// is dropped. `None` keeps the corresponding endpoint.
    fn change_arc(&mut self, arc: usize, new_tail: Option<usize>, new_head: Option<usize>) -> Result<()>;

    // -- state & configuration ---------------------------------------------

    fn save_state(&self) -> Self::State;

    /// Replays a checkpoint taken on this instance; rejects checkpoints of
    /// other instances.
    fn restore_state(&mut self, state: &Self::State) -> Result<()>;

    /// Whether `solve` may exploit the latest solution after mutations.
    fn set_reoptimize(&mut self, on: bool);

    fn reoptimize(&self) -> bool;

    fn set_eps_flow(&mut self, eps: F);

    fn set_eps_deficit(&mut self, eps: F);

    fn set_eps_cost(&mut self, eps: C);

    fn eps_flow(&self) -> F;

    fn eps_deficit(&self) -> F;

    fn eps_cost(&self) -> C;

    fn name_base(&self) -> NameBase;

    /// Enables timing of `solve`; times accumulate across calls until the
    /// timer is re-armed by enabling it again.
    fn set_time_on(&mut self, on: bool);

    fn elapsed(&self) -> Duration;

    // -- provided: text formats and checkers -------------------------------

    /// Reads a DIMACS min-cost flow instance and loads it.
    fn load_dimacs<R: BufRead>(&mut self, reader: R) -> Result<()>
    where
        Self: Sized,
    {
        dimacs::load(self, reader)
    }

    /// Writes the current instance in the requested text format.
    fn write<W: Write>(&self, out: &mut W, format: FileFormat) -> Result<()>
    where
        Self: Sized,
    {
        dimacs::write(self, out, format)
    }

    /// Verifies primal feasibility and the objective value of the current
    /// solution; a violation is an internal error.
    fn check_primal(&self) -> Result<()>
    where
        Self: Sized,
    {
        checker::check_primal(self)
    }

    /// Verifies the reduced costs, complementary slackness and the dual
    /// objective value of the current solution.
    fn check_dual(&self) -> Result<()>
    where
        Self: Sized,
    {
        checker::check_dual(self)
    }
}

/// Enumerates `nms ∩ [start, stop)` (or the dense range without a filter),
/// writing `get(i)` compactly into `out`.
pub(crate) fn read_batch<T, G: Fn(usize) -> T>(
    out: &mut [T],
    nms: Option<&[usize]>,
    range: Range<usize>,
    count: usize,
    get: G,
) -> Result<()> {
    let start = range.start;
    let stop = range.end.min(count);
    match nms {
        None => {
            let width = stop.saturating_sub(start);
            if out.len() < width {
                return Err(McfError::invalid("output slice too short for the requested range"));
            }
            for i in start..stop {
                out[i - start] = get(i);
            }
        }
        Some(list) => {
            let mut slot = 0;
            for &i in list {
                if i < start || i >= stop {
                    continue;
                }
                if slot >= out.len() {
                    return Err(McfError::invalid("output slice too short for the index set"));
                }
                out[slot] = get(i);
                slot += 1;
            }
        }
    }
    Ok(())
}

/// Resolves the targets of a batch setter, failing the whole batch on any
/// out-of-range index.
pub(crate) fn batch_targets(
    nms: Option<&[usize]>,
    range: Range<usize>,
    count: usize,
    what: &str,
) -> Result<Vec<usize>> {
    let start = range.start;
    let stop = range.end.min(count);
    match nms {
        None => Ok((start..stop).collect()),
        Some(list) => {
            let mut targets = Vec::with_capacity(list.len());
            for &i in list {
                if i >= count {
                    return Err(McfError::invalid(format!("{what} index {i} out of range")));
                }
                if i >= start && i < stop {
                    targets.push(i);
                }
            }
            Ok(targets)
        }
    }
}

/// Accumulating timer for the timed methods; measures wall-clock time spent
/// inside them while enabled.
#[derive(Default, Debug)]
pub(crate) struct Stopwatch {
    enabled: bool,
    total: Duration,
    started: Option<Instant>,
}

impl Stopwatch {
    /// Enabling re-arms the accumulator.
    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
        if on {
            self.total = Duration::ZERO;
        }
        self.started = None;
    }

    pub fn start(&mut self) {
        if self.enabled && self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    pub fn stop(&mut self) {
        if let Some(t0) = self.started.take() {
            self.total += t0.elapsed();
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }
}
