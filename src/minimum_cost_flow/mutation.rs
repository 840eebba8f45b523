//! Topology and data mutations on a loaded [`Cs2`] instance.
//!
//! Every mutation invalidates the cached status; the next `solve` reuses the
//! retained prices when the sensitivity flag is on. Closing keeps the arc
//! identity (endpoints, capacity and cost stay retrievable); adding an arc
//! or re-splicing endpoints rebuilds the adjacency blocks from the per-arc
//! snapshot, which preserves flows, prices and the closed set.

use crate::minimum_cost_flow::cost_scaling::Cs2;
use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::residual::ArcSnap;
use crate::minimum_cost_flow::status::Status;
use crate::numeric::Scalar;
use tracing::debug;

impl<F: Scalar, C: Scalar> Cs2<F, C> {
    /// Internal index of a user node name.
    pub(crate) fn iname(&self, name: usize) -> Result<usize> {
        let base = self.policy.name_base.offset();
        name.checked_sub(base)
            .filter(|&v| v < self.n)
            .ok_or_else(|| McfError::invalid(format!("node name {name} out of range")))
    }

    /// User name of an internal node index.
    pub(crate) fn xname(&self, v: usize) -> usize {
        v + self.policy.name_base.offset()
    }

    pub(crate) fn arc_index(&self, arc: usize) -> Result<usize> {
        if arc < self.m {
            Ok(arc)
        } else {
            Err(McfError::invalid(format!("arc {arc} out of range")))
        }
    }

    fn touch(&mut self) {
        self.status = Status::Unsolved;
    }

    pub(crate) fn close_arc_in(&mut self, k: usize) -> Result<()> {
        self.arc_index(k)?;
        if self.res.is_closed(k) {
            return Err(McfError::illegal(format!("arc {k} is already closed")));
        }
        // push the flow back so the retired pair carries none; the endpoint
        // excesses adjust symmetrically
        let flow = self.res.flow_on(k);
        if flow != F::zero() {
            let fwd = self.res.pos[k];
            let rev = self.res.arcs[fwd].sister;
            let head = self.res.arcs[fwd].head;
            self.res.push(head, rev, flow);
        }
        self.res.close_pair(k);
        self.touch();
        debug!(arc = k, "closed arc");
        Ok(())
    }

    pub(crate) fn open_arc_in(&mut self, k: usize) -> Result<()> {
        self.arc_index(k)?;
        if !self.res.is_closed(k) {
            return Err(McfError::illegal(format!("arc {k} is not closed")));
        }
        self.res.reopen_pair(k);
        self.touch();
        debug!(arc = k, "opened arc");
        Ok(())
    }

    pub(crate) fn add_node_in(&mut self, deficit: F) -> Result<usize> {
        if self.n >= self.nmax {
            return Err(McfError::NoRoom("node"));
        }
        let v = self.n;
        self.n += 1;
        let at = self.res.arcs.len();
        self.res.nodes.push(crate::minimum_cost_flow::residual::Node {
            excess: -deficit,
            price: C::zero(),
            first: at,
            susp: at,
            closed: at,
            stop: at,
            current: at,
        });
        self.deficit.push(deficit);
        self.touch();
        Ok(self.xname(v))
    }

    pub(crate) fn delete_node_in(&mut self, name: usize) -> Result<()> {
        let v = self.iname(name)?;
        for k in 0..self.m {
            if !self.res.is_closed(k)
                && (self.res.tail_of_arc(k) == v || self.res.head_of_arc(k) == v)
            {
                self.close_arc_in(k)?;
            }
        }
        self.deficit[v] = F::zero();
        self.res.nodes[v].excess = F::zero();
        // the name is released only when the node is the last one and no arc,
        // closed ones included, still references it
        if v + 1 == self.n {
            let referenced =
                (0..self.m).any(|k| self.res.tail_of_arc(k) == v || self.res.head_of_arc(k) == v);
            if !referenced {
                self.n -= 1;
                self.res.nodes.pop();
                self.deficit.pop();
            }
        }
        self.touch();
        Ok(())
    }

    pub(crate) fn add_arc_in(&mut self, tail: usize, head: usize, cap: F, cost: C) -> Result<usize> {
        if self.m >= self.mmax {
            return Err(McfError::NoRoom("arc"));
        }
        let t = self.iname(tail)?;
        let h = self.iname(head)?;
        if t == h {
            return Err(McfError::invalid("self-loops are not permitted"));
        }
        if cap < F::zero() {
            return Err(McfError::invalid("negative capacity"));
        }
        let closed = cost == C::inf();
        let scaled = if closed { C::zero() } else { cost * self.dn };
        let mut snaps = self.res.snapshot();
        snaps.push(ArcSnap { tail: t, head: h, r_cap: cap, flow: F::zero(), cost: scaled, closed });
        let k = self.m;
        self.m += 1;
        self.res.uncapped.push(cap == F::inf());
        self.res.layout(self.n, &snaps);
        self.touch();
        debug!(arc = k, "added arc");
        Ok(k)
    }

    pub(crate) fn change_arc_in(
        &mut self,
        k: usize,
        new_tail: Option<usize>,
        new_head: Option<usize>,
    ) -> Result<()> {
        self.arc_index(k)?;
        let t = match new_tail {
            Some(name) => self.iname(name)?,
            None => self.res.tail_of_arc(k),
        };
        let h = match new_head {
            Some(name) => self.iname(name)?,
            None => self.res.head_of_arc(k),
        };
        if t == h {
            return Err(McfError::invalid("self-loops are not permitted"));
        }
        let mut snaps = self.res.snapshot();
        let snap = &mut snaps[k];
        // the flow on the arc is dropped
        snap.r_cap = snap.r_cap + snap.flow;
        snap.flow = F::zero();
        snap.tail = t;
        snap.head = h;
        self.res.layout(self.n, &snaps);
        self.touch();
        Ok(())
    }

    pub(crate) fn chg_cost_in(&mut self, k: usize, cost: C) -> Result<()> {
        self.arc_index(k)?;
        if self.res.is_closed(k) {
            return Err(McfError::illegal(format!("arc {k} is closed")));
        }
        if cost == C::inf() {
            return Err(McfError::invalid("cost must be finite; close the arc instead"));
        }
        let scaled = cost * self.dn;
        let fwd = self.res.pos[k];
        let rev = self.res.arcs[fwd].sister;
        self.res.arcs[fwd].cost = scaled;
        self.res.arcs[rev].cost = -scaled;
        self.touch();
        Ok(())
    }

    pub(crate) fn chg_cap_in(&mut self, k: usize, cap: F) -> Result<()> {
        self.arc_index(k)?;
        if self.res.is_closed(k) {
            return Err(McfError::illegal(format!("arc {k} is closed")));
        }
        if cap < F::zero() {
            return Err(McfError::invalid("negative capacity"));
        }
        let fwd = self.res.pos[k];
        let rev = self.res.arcs[fwd].sister;
        if cap == F::inf() {
            // the sentinel residual is clamped to a safe bound at solve time
            self.res.uncapped[k] = true;
            self.res.arcs[fwd].r_cap = F::inf();
        } else {
            self.res.uncapped[k] = false;
            let flow = self.res.arcs[rev].r_cap;
            if flow <= cap {
                self.res.arcs[fwd].r_cap = cap - flow;
            } else {
                // flow exceeds the new capacity: cut it back and expose the
                // imbalance through the endpoint excesses
                let spill = flow - cap;
                let head = self.res.arcs[fwd].head;
                let tail = self.res.tail_of_arc(k);
                self.res.arcs[rev].r_cap = cap;
                self.res.arcs[fwd].r_cap = F::zero();
                self.res.nodes[tail].excess += spill;
                self.res.nodes[head].excess -= spill;
            }
        }
        self.touch();
        Ok(())
    }

    pub(crate) fn chg_deficit_in(&mut self, v: usize, deficit: F) -> Result<()> {
        let delta = deficit - self.deficit[v];
        self.deficit[v] = deficit;
        self.res.nodes[v].excess -= delta;
        self.touch();
        Ok(())
    }
}
