//! [`McfSolver`] implementation for the cost-scaling backend.

use crate::minimum_cost_flow::cost_scaling::{Cs2, Cs2State};
use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::residual::NONE;
use crate::minimum_cost_flow::solver::{batch_targets, read_batch, McfSolver, Network};
use crate::minimum_cost_flow::status::Status;
use crate::numeric::{NameBase, Scalar};
use std::ops::Range;
use std::time::Duration;

impl<F: Scalar, C: Scalar> McfSolver<F, C> for Cs2<F, C> {
    type State = Cs2State<F, C>;

    fn load_net(&mut self, nmax: usize, mmax: usize, net: &Network<F, C>) -> Result<()> {
        self.load(nmax, mmax, net)
    }

    fn solve(&mut self) -> Result<Status> {
        self.optimize()
    }

    fn status(&self) -> Status {
        self.status
    }

    fn get_x(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.m, |k| self.res.flow_on(k))
    }

    fn get_pi(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.n, |v| self.res.nodes[v].price / self.dn)
    }

    fn get_rc(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.m, |k| self.scaled_rc(k) / self.dn)
    }

    fn arc_rc(&self, arc: usize) -> Result<C> {
        self.arc_index(arc)?;
        Ok(self.scaled_rc(arc) / self.dn)
    }

    fn get_fo(&self) -> C::Wide {
        match self.status {
            Status::Optimal | Status::Stopped => self.primal_cost(),
            Status::Unbounded => -<C::Wide as Scalar>::inf(),
            Status::Unfeasible | Status::Unsolved | Status::Error => <C::Wide as Scalar>::inf(),
        }
    }

    fn get_dfo(&self) -> C::Wide {
        match self.status {
            Status::Optimal => self.dual_cost(),
            Status::Unfeasible => <C::Wide as Scalar>::inf(),
            _ => -<C::Wide as Scalar>::inf(),
        }
    }

    fn get_unf_cut(&self, cut: &mut Vec<usize>) -> Result<F> {
        if self.status != Status::Unfeasible {
            return Err(McfError::invalid("no unfeasibility certificate available"));
        }
        cut.clear();
        cut.extend(self.unf_cut.iter().map(|&v| self.xname(v)));
        Ok(self.unf_deficit)
    }

    fn get_unb_cycle(&self, pred: &mut [usize], arc_pred: &mut [usize]) -> Result<usize> {
        if self.status != Status::Unbounded {
            return Err(McfError::invalid("no unboundedness certificate available"));
        }
        if pred.len() < self.n || arc_pred.len() < self.n {
            return Err(McfError::invalid("predecessor slices shorter than the node count"));
        }
        for v in 0..self.n {
            if self.unb_pred[v] != NONE {
                pred[v] = self.xname(self.unb_pred[v]);
                arc_pred[v] = self.unb_arc_pred[v];
            }
        }
        Ok(self.xname(self.unb_node))
    }

    fn num_nodes(&self) -> usize {
        self.n
    }

    fn num_arcs(&self) -> usize {
        self.m
    }

    fn arcs(
        &self,
        tails: &mut [usize],
        heads: &mut [usize],
        nms: Option<&[usize]>,
        range: Range<usize>,
    ) -> Result<()> {
        read_batch(tails, nms, range.clone(), self.m, |k| self.xname(self.res.tail_of_arc(k)))?;
        read_batch(heads, nms, range, self.m, |k| self.xname(self.res.head_of_arc(k)))
    }

    fn arc_tail(&self, arc: usize) -> Result<usize> {
        self.arc_index(arc)?;
        Ok(self.xname(self.res.tail_of_arc(arc)))
    }

    fn arc_head(&self, arc: usize) -> Result<usize> {
        self.arc_index(arc)?;
        Ok(self.xname(self.res.head_of_arc(arc)))
    }

    fn costs(&self, out: &mut [C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.m, |k| self.res.cost_of(k) / self.dn)
    }

    fn arc_cost(&self, arc: usize) -> Result<C> {
        self.arc_index(arc)?;
        Ok(self.res.cost_of(arc) / self.dn)
    }

    fn u_caps(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.m, |k| {
            if self.res.uncapped[k] {
                F::inf()
            } else {
                self.res.cap_raw(k)
            }
        })
    }

    fn arc_cap(&self, arc: usize) -> Result<F> {
        self.arc_index(arc)?;
        Ok(if self.res.uncapped[arc] { F::inf() } else { self.res.cap_raw(arc) })
    }

    fn deficits(&self, out: &mut [F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        read_batch(out, nms, range, self.n, |v| self.deficit[v])
    }

    fn node_deficit(&self, node: usize) -> Result<F> {
        let v = self.iname(node)?;
        Ok(self.deficit[v])
    }

    fn is_closed_arc(&self, arc: usize) -> bool {
        arc < self.m && self.res.is_closed(arc)
    }

    fn is_deleted_arc(&self, arc: usize) -> bool {
        // on par with delete_arc: deletion is closing without name reuse
        self.is_closed_arc(arc)
    }

    fn chg_costs(&mut self, costs: &[C], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        let targets = batch_targets(nms, range, self.m, "arc")?;
        if costs.len() < targets.len() {
            return Err(McfError::invalid("cost slice shorter than the target set"));
        }
        for (j, &k) in targets.iter().enumerate() {
            if self.res.is_closed(k) {
                return Err(McfError::illegal(format!("arc {k} is closed")));
            }
            if costs[j] == C::inf() {
                return Err(McfError::invalid("cost must be finite; close the arc instead"));
            }
        }
        for (j, &k) in targets.iter().enumerate() {
            self.chg_cost_in(k, costs[j])?;
        }
        Ok(())
    }

    fn chg_cost(&mut self, arc: usize, cost: C) -> Result<()> {
        self.chg_cost_in(arc, cost)
    }

    fn chg_caps(&mut self, caps: &[F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        let targets = batch_targets(nms, range, self.m, "arc")?;
        if caps.len() < targets.len() {
            return Err(McfError::invalid("capacity slice shorter than the target set"));
        }
        for (j, &k) in targets.iter().enumerate() {
            if self.res.is_closed(k) {
                return Err(McfError::illegal(format!("arc {k} is closed")));
            }
            if caps[j] < F::zero() {
                return Err(McfError::invalid("negative capacity"));
            }
        }
        for (j, &k) in targets.iter().enumerate() {
            self.chg_cap_in(k, caps[j])?;
        }
        Ok(())
    }

    fn chg_cap(&mut self, arc: usize, cap: F) -> Result<()> {
        self.chg_cap_in(arc, cap)
    }

    fn chg_deficits(&mut self, deficits: &[F], nms: Option<&[usize]>, range: Range<usize>) -> Result<()> {
        let targets = batch_targets(nms, range, self.n, "node")?;
        if deficits.len() < targets.len() {
            return Err(McfError::invalid("deficit slice shorter than the target set"));
        }
        for (j, &v) in targets.iter().enumerate() {
            self.chg_deficit_in(v, deficits[j])?;
        }
        Ok(())
    }

    fn chg_deficit(&mut self, node: usize, deficit: F) -> Result<()> {
        let v = self.iname(node)?;
        self.chg_deficit_in(v, deficit)
    }

    fn close_arc(&mut self, arc: usize) -> Result<()> {
        self.close_arc_in(arc)
    }

    fn open_arc(&mut self, arc: usize) -> Result<()> {
        self.open_arc_in(arc)
    }

    fn add_node(&mut self, deficit: F) -> Result<usize> {
        self.add_node_in(deficit)
    }

    fn delete_node(&mut self, node: usize) -> Result<()> {
        self.delete_node_in(node)
    }

    fn add_arc(&mut self, tail: usize, head: usize, cap: F, cost: C) -> Result<usize> {
        self.add_arc_in(tail, head, cap, cost)
    }

    fn delete_arc(&mut self, arc: usize) -> Result<()> {
        self.close_arc_in(arc)
    }

    fn change_arc(&mut self, arc: usize, new_tail: Option<usize>, new_head: Option<usize>) -> Result<()> {
        self.change_arc_in(arc, new_tail, new_head)
    }

    fn save_state(&self) -> Cs2State<F, C> {
        Cs2State {
            instance: self.instance,
            nmax: self.nmax,
            mmax: self.mmax,
            n: self.n,
            m: self.m,
            dn: self.dn,
            nodes: self.res.nodes.clone(),
            arcs: self.res.arcs.clone(),
            pos: self.res.pos.clone(),
            uncapped: self.res.uncapped.clone(),
            deficit: self.deficit.clone(),
            status: self.status,
            reopt_ready: self.reopt_ready,
            unf_cut: self.unf_cut.clone(),
            unf_deficit: self.unf_deficit,
            unb_pred: self.unb_pred.clone(),
            unb_arc_pred: self.unb_arc_pred.clone(),
            unb_node: self.unb_node,
        }
    }

    fn restore_state(&mut self, state: &Cs2State<F, C>) -> Result<()> {
        if state.instance != self.instance {
            return Err(McfError::illegal("state belongs to a different solver instance"));
        }
        self.nmax = state.nmax;
        self.mmax = state.mmax;
        self.n = state.n;
        self.m = state.m;
        self.dn = state.dn;
        self.res.nodes = state.nodes.clone();
        self.res.arcs = state.arcs.clone();
        self.res.pos = state.pos.clone();
        self.res.uncapped = state.uncapped.clone();
        self.deficit = state.deficit.clone();
        self.status = state.status;
        self.reopt_ready = state.reopt_ready;
        self.unf_cut = state.unf_cut.clone();
        self.unf_deficit = state.unf_deficit;
        self.unb_pred = state.unb_pred.clone();
        self.unb_arc_pred = state.unb_arc_pred.clone();
        self.unb_node = state.unb_node;
        Ok(())
    }

    fn set_reoptimize(&mut self, on: bool) {
        self.senstv = on;
    }

    fn reoptimize(&self) -> bool {
        self.senstv
    }

    fn set_eps_flow(&mut self, eps: F) {
        if self.policy.eps_flow != eps {
            self.policy.eps_flow = eps;
            self.status = Status::Unsolved;
        }
    }

    fn set_eps_deficit(&mut self, eps: F) {
        if self.policy.eps_deficit != eps {
            self.policy.eps_deficit = eps;
            self.status = Status::Unsolved;
        }
    }

    fn set_eps_cost(&mut self, eps: C) {
        if self.policy.eps_cost != eps {
            self.policy.eps_cost = eps;
            self.status = Status::Unsolved;
        }
    }

    fn eps_flow(&self) -> F {
        self.policy.eps_flow
    }

    fn eps_deficit(&self) -> F {
        self.policy.eps_deficit
    }

    fn eps_cost(&self) -> C {
        self.policy.eps_cost
    }

    fn name_base(&self) -> NameBase {
        self.policy.name_base
    }

    fn set_time_on(&mut self, on: bool) {
        self.timer.set_enabled(on);
    }

    fn elapsed(&self) -> Duration {
        self.timer.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn diamond() -> Cs2<i64, i64> {
        let mut cs2 = Cs2::default();
        let net = Network::new(4)
            .deficit(0, -4)
            .deficit(3, 4)
            .arc(1, 2, 3, 1)
            .arc(1, 3, 3, 2)
            .arc(2, 4, 3, 1)
            .arc(3, 4, 3, 1)
            .arc(2, 3, 2, 0);
        cs2.load_net(8, 8, &net).unwrap();
        cs2
    }

    #[test]
    fn queries_report_the_loaded_data() {
        let cs2 = diamond();
        assert_eq!(cs2.num_nodes(), 4);
        assert_eq!(cs2.num_arcs(), 5);
        assert_eq!(cs2.arc_tail(1).unwrap(), 1);
        assert_eq!(cs2.arc_head(1).unwrap(), 3);
        assert_eq!(cs2.arc_cost(1).unwrap(), 2);
        assert_eq!(cs2.arc_cap(4).unwrap(), 2);
        assert_eq!(cs2.node_deficit(4).unwrap(), 4);
        assert_eq!(cs2.q_coef(0).unwrap(), 0);
        let mut tails = [0usize; 5];
        let mut heads = [0usize; 5];
        cs2.arcs(&mut tails, &mut heads, None, 0..usize::MAX).unwrap();
        assert_eq!(tails, [1, 1, 2, 3, 2]);
        assert_eq!(heads, [2, 3, 4, 4, 3]);
    }

    #[test]
    fn mutations_invalidate_the_status() {
        let mut cs2 = diamond();
        cs2.solve().unwrap();
        assert_eq!(cs2.status(), Status::Optimal);
        cs2.chg_cost(1, 0).unwrap();
        assert_eq!(cs2.status(), Status::Unsolved);
    }

    #[test]
    fn add_beyond_the_bounds_is_no_room() {
        let mut cs2 = Cs2::<i64, i64>::default();
        let net = Network::new(2).arc(1, 2, 1, 1);
        cs2.load_net(2, 1, &net).unwrap();
        assert!(matches!(cs2.add_node(0), Err(McfError::NoRoom("node"))));
        assert!(matches!(cs2.add_arc(2, 1, 1, 1), Err(McfError::NoRoom("arc"))));
    }

    #[test]
    fn added_arc_participates_in_the_solve() {
        let mut cs2 = Cs2::<i64, i64>::default();
        let net = Network::new(2).deficit(0, -2).deficit(1, 2).arc(1, 2, 2, 9);
        cs2.load_net(4, 4, &net).unwrap();
        cs2.solve().unwrap();
        assert_eq!(cs2.get_fo(), 18);
        let mid = cs2.add_node(0).unwrap();
        assert_eq!(mid, 3);
        cs2.add_arc(1, mid, 2, 1).unwrap();
        cs2.add_arc(mid, 2, 2, 1).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 4);
    }

    #[test]
    fn closing_twice_is_illegal() {
        let mut cs2 = diamond();
        cs2.close_arc(4).unwrap();
        assert!(cs2.is_closed_arc(4));
        assert!(cs2.is_deleted_arc(4));
        assert!(matches!(cs2.close_arc(4), Err(McfError::IllegalMutation(_))));
        assert!(matches!(cs2.chg_cost(4, 5), Err(McfError::IllegalMutation(_))));
        cs2.open_arc(4).unwrap();
        assert!(matches!(cs2.open_arc(4), Err(McfError::IllegalMutation(_))));
    }

    #[test]
    fn closed_arc_keeps_its_identity_and_flow_returns() {
        let mut cs2 = diamond();
        cs2.solve().unwrap();
        cs2.close_arc(0).unwrap();
        assert_eq!(cs2.arc_cap(0).unwrap(), 3);
        assert_eq!(cs2.arc_cost(0).unwrap(), 1);
        let mut x = [0i64; 5];
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x[0], 0);
    }

    #[test]
    fn chg_cap_below_flow_spills_into_the_excesses() {
        let mut cs2 = Cs2::<i64, i64>::default();
        let net = Network::new(2).deficit(0, -3).deficit(1, 3).arc(1, 2, 5, 1);
        cs2.load_net(2, 1, &net).unwrap();
        cs2.solve().unwrap();
        let mut x = [0i64];
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x, [3]);
        cs2.chg_cap(0, 2).unwrap();
        cs2.get_x(&mut x, None, 0..usize::MAX).unwrap();
        assert_eq!(x, [2]);
        assert_eq!(cs2.arc_cap(0).unwrap(), 2);
        // the instance is now unfeasible and the re-solve says so
        assert_eq!(cs2.solve().unwrap(), Status::Unfeasible);
    }

    #[test]
    fn batch_setters_fail_whole_on_a_bad_index() {
        let mut cs2 = diamond();
        let before = cs2.arc_cost(0).unwrap();
        assert!(cs2.chg_costs(&[7, 7], Some(&[0, 99]), 0..usize::MAX).is_err());
        assert_eq!(cs2.arc_cost(0).unwrap(), before);
        cs2.chg_costs(&[7, 7], Some(&[0, 2]), 0..usize::MAX).unwrap();
        assert_eq!(cs2.arc_cost(0).unwrap(), 7);
        assert_eq!(cs2.arc_cost(2).unwrap(), 7);
    }

    #[rstest]
    #[case(None, 1..3, vec![2, 1])]
    #[case(Some(vec![4, 0]), 0..usize::MAX, vec![0, 1])]
    fn cost_queries_honor_filter_and_range(
        #[case] nms: Option<Vec<usize>>,
        #[case] range: Range<usize>,
        #[case] expected: Vec<i64>,
    ) {
        let cs2 = diamond();
        let mut out = vec![0i64; expected.len()];
        cs2.costs(&mut out, nms.as_deref(), range).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn deficit_changes_rebalance_the_instance() {
        let mut cs2 = Cs2::<i64, i64>::default();
        let net = Network::new(2).deficit(0, -1).deficit(1, 1).arc(1, 2, 9, 2);
        cs2.load_net(2, 1, &net).unwrap();
        cs2.solve().unwrap();
        assert_eq!(cs2.get_fo(), 2);
        cs2.chg_deficit(1, -4).unwrap();
        cs2.chg_deficit(2, 4).unwrap();
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 8);
    }

    #[test]
    fn change_arc_resplices_and_drops_the_flow() {
        let mut cs2 = Cs2::<i64, i64>::default();
        let net = Network::new(3)
            .deficit(0, -2)
            .deficit(2, 2)
            .arc(1, 2, 2, 1)
            .arc(2, 3, 2, 1);
        cs2.load_net(3, 2, &net).unwrap();
        cs2.solve().unwrap();
        assert_eq!(cs2.get_fo(), 4);
        // reroute the second arc to start at the source directly
        cs2.change_arc(1, Some(1), Some(3)).unwrap();
        assert_eq!(cs2.arc_tail(1).unwrap(), 1);
        assert_eq!(cs2.arc_head(1).unwrap(), 3);
        assert_eq!(cs2.solve().unwrap(), Status::Optimal);
        assert_eq!(cs2.get_fo(), 2);
    }

    #[test]
    fn delete_node_closes_incident_arcs() {
        let mut cs2 = diamond();
        cs2.delete_node(2).unwrap();
        assert!(cs2.is_closed_arc(0));
        assert!(cs2.is_closed_arc(2));
        assert!(cs2.is_closed_arc(4));
        assert!(!cs2.is_closed_arc(1));
        assert_eq!(cs2.num_nodes(), 4);
    }

    #[test]
    fn delete_last_unreferenced_node_releases_the_name() {
        let mut cs2 = Cs2::<i64, i64>::default();
        cs2.load_net(4, 4, &Network::new(2)).unwrap();
        let v = cs2.add_node(0).unwrap();
        assert_eq!(cs2.num_nodes(), 3);
        cs2.delete_node(v).unwrap();
        assert_eq!(cs2.num_nodes(), 2);
    }

    #[test]
    fn restore_state_rejects_foreign_snapshots() {
        let mut a = diamond();
        let b = diamond();
        let state = b.save_state();
        assert!(matches!(a.restore_state(&state), Err(McfError::IllegalMutation(_))));
    }

    #[test]
    fn quadratic_coefficients_are_rejected() {
        let mut cs2 = diamond();
        assert!(cs2.chg_q_coef(0, 0).is_ok());
        assert!(cs2.chg_q_coef(0, 3).is_err());
    }

    #[test]
    fn teardown_load_waits_for_data() {
        let mut cs2 = diamond();
        cs2.load_net(0, 0, &Network::new(0)).unwrap();
        assert_eq!(cs2.num_nodes(), 0);
        assert_eq!(cs2.num_arcs(), 0);
        assert_eq!(cs2.status(), Status::Unsolved);
    }
}
