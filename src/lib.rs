//! Linear minimum-cost flow solving.
//!
//! The crate provides an abstract solver interface
//! ([`minimum_cost_flow::McfSolver`]) together with a cost-scaling
//! push-relabel backend ([`minimum_cost_flow::Cs2`]) supporting dynamic
//! topology, reoptimization after data changes, DIMACS/MPS text formats,
//! and primal/dual solution checking.
//!
//! ```
//! use min_cost_flow::minimum_cost_flow::{Cs2, McfSolver, Network, Status};
//!
//! let net = Network::new(2)
//!     .deficit(0, -3)
//!     .deficit(1, 3)
//!     .arc(1, 2, 5, 7);
//! let mut solver: Cs2<i64, i64> = Cs2::default();
//! solver.load_net(2, 1, &net).unwrap();
//! assert_eq!(solver.solve().unwrap(), Status::Optimal);
//! assert_eq!(solver.get_fo(), 21);
//! ```

pub mod minimum_cost_flow;
pub mod numeric;
