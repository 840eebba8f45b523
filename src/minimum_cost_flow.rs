pub mod checker;
pub mod cost_scaling;
pub mod dimacs;
pub mod error;
mod interface;
mod mutation;
mod residual;
pub mod solver;
pub mod status;

pub use cost_scaling::{Cs2, Cs2State};
pub use dimacs::FileFormat;
pub use error::{McfError, Result};
pub use solver::{McfSolver, Network};
pub use status::Status;
