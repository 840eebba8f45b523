use min_cost_flow::minimum_cost_flow::{Cs2, FileFormat, McfSolver, Network, Status};

fn diamond_net() -> Network<i64, i64> {
    // b = [-4, 0, 0, 4]; the optimum ships three units over 1->2->4 and one
    // over 1->3->4 for a total cost of 9
    Network::new(4)
        .deficit(0, -4)
        .deficit(3, 4)
        .arc(1, 2, 3, 1)
        .arc(1, 3, 3, 2)
        .arc(2, 4, 3, 1)
        .arc(3, 4, 3, 1)
        .arc(2, 3, 2, 0)
}

fn diamond() -> Cs2<i64, i64> {
    let mut solver = Cs2::default();
    solver.load_net(4, 5, &diamond_net()).unwrap();
    solver
}

fn flows(solver: &Cs2<i64, i64>) -> Vec<i64> {
    let mut x = vec![0i64; solver.num_arcs()];
    solver.get_x(&mut x, None, 0..usize::MAX).unwrap();
    x
}

#[test]
fn diamond_reaches_the_known_optimum() {
    let mut solver = diamond();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
    let x = flows(&solver);
    // every optimum fills 1->2 and sends the overflow unit over 1->3; only
    // the 2->4 / 2->3->4 split is free
    assert_eq!(x[0], 3);
    assert_eq!(x[1], 1);
    assert_eq!(x[2] + x[4], 3);
    assert_eq!(x[3], 1 + x[4]);
    solver.check_primal().unwrap();
}

#[test]
fn balance_and_bounds_hold_at_the_optimum() {
    let mut solver = diamond();
    solver.solve().unwrap();
    let x = flows(&solver);
    for (k, &flow) in x.iter().enumerate() {
        assert!(flow >= 0 && flow <= solver.arc_cap(k).unwrap());
    }
    let mut inflow = vec![0i64; 4];
    for (k, &flow) in x.iter().enumerate() {
        inflow[solver.arc_tail(k).unwrap() - 1] -= flow;
        inflow[solver.arc_head(k).unwrap() - 1] += flow;
    }
    for v in 0..4 {
        assert_eq!(inflow[v], solver.node_deficit(v + 1).unwrap());
    }
}

#[test]
fn saturated_cut_is_reported_with_its_trapped_excess() {
    // b = [-5, 0, 5] with only two units of forward capacity: the three
    // remaining units are trapped behind the cut {1, 2}
    let mut solver: Cs2<i64, i64> = Cs2::default();
    let net = Network::new(3)
        .deficit(0, -5)
        .deficit(2, 5)
        .arc(1, 2, 2, 1)
        .arc(2, 3, 2, 1);
    solver.load_net(3, 2, &net).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Unfeasible);
    assert_eq!(solver.get_fo(), i128::MAX);
    let mut cut = Vec::new();
    let trapped = solver.get_unf_cut(&mut cut).unwrap();
    cut.sort_unstable();
    assert_eq!(cut, vec![1, 2]);
    assert_eq!(trapped, 3);
}

#[test]
fn reoptimization_after_a_cost_drop() {
    let mut solver = diamond();
    solver.solve().unwrap();
    assert_eq!(solver.get_fo(), 9);
    assert!(solver.reoptimize());
    // making 1->3 free shifts the bulk of the flow through node 3: three
    // units ride 1->3->4 at unit cost 1 and the fourth pays 2 over 1->2->4
    solver.chg_cost(1, 0).unwrap();
    assert_eq!(solver.status(), Status::Unsolved);
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 5);
    solver.check_primal().unwrap();
}

#[test]
fn close_then_open_restores_the_optimum() {
    let mut solver = diamond();
    solver.solve().unwrap();
    let before = flows(&solver);
    solver.close_arc(4).unwrap();
    solver.open_arc(4).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
    assert_eq!(flows(&solver)[4], before[4]);
}

#[test]
fn solving_with_a_closed_arc_routes_around_it() {
    let mut solver = diamond();
    // widen the 1->2->4 corridor, then close the 1->3 alternative
    solver.chg_cap(0, 10).unwrap();
    solver.chg_cap(2, 10).unwrap();
    solver.close_arc(1).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 8);
    assert_eq!(flows(&solver)[1], 0);
    // shrinking 1->2 back to three units starves the four-unit demand
    solver.chg_cap(0, 3).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Unfeasible);
}

#[test]
fn dimacs_round_trip_solves_to_the_same_objective() {
    let mut first = diamond();
    let mut text = Vec::new();
    first.write(&mut text, FileFormat::Dimacs).unwrap();
    let mut second: Cs2<i64, i64> = Cs2::default();
    second.load_dimacs(text.as_slice()).unwrap();
    assert_eq!(second.solve().unwrap(), Status::Optimal);
    assert_eq!(second.get_fo(), 9);
    // rewriting yields the same instance text
    let mut text2 = Vec::new();
    second.write(&mut text2, FileFormat::Dimacs).unwrap();
    assert_eq!(text, text2);
}

#[test]
fn uncapacitated_negative_cycle_is_unbounded() {
    let mut solver: Cs2<i64, i64> = Cs2::default();
    let net = Network::new(2)
        .arc(1, 2, i64::MAX, -1)
        .arc(2, 1, i64::MAX, -1);
    solver.load_net(2, 2, &net).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Unbounded);
    assert_eq!(solver.get_fo(), -i128::MAX);
    let mut pred = vec![usize::MAX; 2];
    let mut arc_pred = vec![usize::MAX; 2];
    let on_cycle = solver.get_unb_cycle(&mut pred, &mut arc_pred).unwrap();
    assert!(on_cycle == 1 || on_cycle == 2);
    // the two-node cycle uses both arcs, each node preceded by the other
    assert_eq!(pred, vec![2, 1]);
    assert_eq!(arc_pred.iter().filter(|&&k| k == 0 || k == 1).count(), 2);
}

#[test]
fn single_node_without_arcs_is_optimal_at_zero() {
    let mut solver: Cs2<i64, i64> = Cs2::default();
    solver.load_net(1, 1, &Network::new(1)).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 0);
}

#[test]
fn all_arcs_closed_is_unfeasible_exactly_when_deficits_remain() {
    let mut solver = diamond();
    for k in 0..solver.num_arcs() {
        solver.close_arc(k).unwrap();
    }
    assert_eq!(solver.solve().unwrap(), Status::Unfeasible);

    let mut balanced: Cs2<i64, i64> = Cs2::default();
    balanced.load_net(2, 1, &Network::new(2).arc(1, 2, 5, 3)).unwrap();
    balanced.close_arc(0).unwrap();
    assert_eq!(balanced.solve().unwrap(), Status::Optimal);
    assert_eq!(balanced.get_fo(), 0);
}

#[test]
fn nonnegative_circulation_costs_nothing() {
    let mut solver: Cs2<i64, i64> = Cs2::default();
    let net = Network::new(3).arc(1, 2, 4, 1).arc(2, 3, 4, 0).arc(3, 1, 4, 2);
    solver.load_net(3, 3, &net).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 0);
}

#[test]
fn an_expensive_new_arc_leaves_the_optimum_alone() {
    let mut solver: Cs2<i64, i64> = Cs2::default();
    solver.load_net(8, 8, &diamond_net()).unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.get_fo(), 9);
    solver.add_arc(1, 4, 10, 100).unwrap();
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
    assert_eq!(*flows(&solver).last().unwrap(), 0);
}

#[test]
fn saved_state_replays_to_the_same_objective() {
    let mut solver = diamond();
    solver.solve().unwrap();
    let state = solver.save_state();
    // wreck the instance, then roll it back
    solver.chg_cost(0, 50).unwrap();
    solver.solve().unwrap();
    assert_ne!(solver.get_fo(), 9);
    solver.restore_state(&state).unwrap();
    assert_eq!(solver.status(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
}

#[test]
fn potentials_certify_the_diamond_optimum() {
    let mut solver = diamond();
    solver.solve().unwrap();
    let mut pi = vec![0i64; 4];
    solver.get_pi(&mut pi, None, 0..usize::MAX).unwrap();
    let mut rc = vec![0i64; 5];
    solver.get_rc(&mut rc, None, 0..usize::MAX).unwrap();
    let x = flows(&solver);
    for k in 0..5 {
        // integer costs end with an exactly optimal flow: positive reduced
        // cost forces empty arcs, negative forces saturated ones
        if rc[k] > 0 {
            assert_eq!(x[k], 0, "arc {k}");
        }
        if rc[k] < 0 {
            assert_eq!(x[k], solver.arc_cap(k).unwrap(), "arc {k}");
        }
    }
}

#[test]
fn timer_accumulates_only_while_armed() {
    let mut solver = diamond();
    solver.set_time_on(true);
    solver.solve().unwrap();
    let timed = solver.elapsed();
    solver.set_time_on(false);
    assert_eq!(solver.elapsed(), timed);
}

#[test]
fn stopped_solve_retains_a_costed_pseudoflow() {
    let mut solver = diamond();
    solver.set_relabel_limit(Some(1));
    assert_eq!(solver.solve().unwrap(), Status::Stopped);
    // the retained pseudoflow prices to a finite bound
    assert!(solver.get_fo() < i128::MAX);
    solver.set_relabel_limit(None);
    assert_eq!(solver.solve().unwrap(), Status::Optimal);
    assert_eq!(solver.get_fo(), 9);
}
