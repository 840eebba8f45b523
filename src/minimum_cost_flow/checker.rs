//! Primal and dual verification of a solved instance.
//!
//! The checks work purely through the abstract interface, so they apply to
//! any backend. A violation means the solver produced an inconsistent
//! answer and is reported as an internal error.
//!
//! With an integer cost type the returned potentials are rounded by the
//! internal scale factor, so the dual check can reject a solution whose
//! scaled dual is perfectly feasible; use a floating-point cost type, with
//! a cost epsilon at least the optimality tolerance actually attained,
//! when a verified dual is required.

use crate::minimum_cost_flow::error::{McfError, Result};
use crate::minimum_cost_flow::solver::McfSolver;
use crate::numeric::{cast, etz, gt, gtz, lt, ltz, Scalar};

/// Verifies that closed arcs carry no flow, every flow is within its bounds,
/// every node is balanced, and the recomputed cost matches `get_fo`.
pub(crate) fn check_primal<F, C, S>(solver: &S) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
{
    let n = solver.num_nodes();
    let m = solver.num_arcs();
    let base = solver.name_base().offset();
    let eps_flow = solver.eps_flow();

    let mut balance = vec![F::zero(); n];
    solver.deficits(&mut balance, None, 0..usize::MAX)?;
    let mut x = vec![F::zero(); m];
    solver.get_x(&mut x, None, 0..usize::MAX)?;

    let mut cx = <C::Wide as num_traits::Zero>::zero();
    for k in 0..m {
        if etz(x[k], eps_flow) {
            continue;
        }
        if solver.is_closed_arc(k) {
            return Err(McfError::internal("closed arc with nonzero flow"));
        }
        if gt(x[k], solver.arc_cap(k)?, eps_flow) {
            return Err(McfError::internal("arc flow exceeds capacity"));
        }
        if ltz(x[k], eps_flow) {
            return Err(McfError::internal("arc flow is negative"));
        }
        cx += cast::<C, C::Wide>(solver.arc_cost(k)?) * cast::<F, C::Wide>(x[k]);
        balance[solver.arc_tail(k)? - base] += x[k];
        balance[solver.arc_head(k)? - base] -= x[k];
    }

    let eps_deficit = solver.eps_deficit();
    for v in 0..n {
        if !etz(balance[v], eps_deficit) {
            return Err(McfError::internal("node is not balanced"));
        }
    }

    let gap = cx - solver.get_fo();
    let tol = cast::<C, C::Wide>(solver.eps_cost()) * cast::<usize, C::Wide>(n.max(1));
    if gap.abs() > tol {
        return Err(McfError::internal("objective function value is wrong"));
    }
    Ok(())
}

/// Verifies the returned reduced costs against the potentials, checks
/// eps-complementary slackness on every open arc, and matches
/// `b*pi - sum(U * max(0, -RC))` against the primal objective.
pub(crate) fn check_dual<F, C, S>(solver: &S) -> Result<()>
where
    F: Scalar,
    C: Scalar,
    S: McfSolver<F, C>,
{
    let n = solver.num_nodes();
    let m = solver.num_arcs();
    let base = solver.name_base().offset();
    let eps_flow = solver.eps_flow();
    let eps_cost = solver.eps_cost();

    let mut pi = vec![C::zero(); n];
    solver.get_pi(&mut pi, None, 0..usize::MAX)?;
    let mut rc = vec![C::zero(); m];
    solver.get_rc(&mut rc, None, 0..usize::MAX)?;
    let mut x = vec![F::zero(); m];
    solver.get_x(&mut x, None, 0..usize::MAX)?;

    let mut by = <C::Wide as num_traits::Zero>::zero();
    for v in 0..n {
        by += cast::<C, C::Wide>(pi[v]) * cast::<F, C::Wide>(solver.node_deficit(v + base)?);
    }

    for k in 0..m {
        if solver.is_closed_arc(k) {
            continue;
        }
        let tail = solver.arc_tail(k)? - base;
        let head = solver.arc_head(k)? - base;
        let computed = solver.arc_cost(k)? + pi[tail] - pi[head];
        if !etz(computed - rc[k], eps_cost) {
            return Err(McfError::internal("reduced cost value is wrong"));
        }
        let cap = solver.arc_cap(k)?;
        if ltz(rc[k], eps_cost) {
            if cap == F::inf() {
                return Err(McfError::internal("negative reduced cost on an uncapacitated arc"));
            }
            by += cast::<C, C::Wide>(rc[k]) * cast::<F, C::Wide>(cap);
            if lt(x[k], cap, eps_flow) {
                return Err(McfError::internal("complementary slackness violated"));
            }
        } else if gtz(rc[k], eps_cost) && gtz(x[k], eps_flow) {
            return Err(McfError::internal("complementary slackness violated"));
        }
    }

    let gap = by - solver.get_fo();
    let tol = cast::<C, C::Wide>(eps_cost) * cast::<usize, C::Wide>(n.max(1));
    if gap.abs() > tol {
        return Err(McfError::internal("dual objective value is wrong"));
    }
    Ok(())
}
