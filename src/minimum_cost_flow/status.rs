/// Outcome of the latest `solve` call, or `Unsolved` when no solution is
/// available for the current data.
#[derive(Default, PartialEq, Eq, Clone, Copy, Debug)]
pub enum Status {
    #[default]
    Unsolved,
    /// An optimal flow has been found.
    Optimal,
    /// The iteration budget ran out; the retained pseudoflow may violate
    /// node balance.
    Stopped,
    /// No flow satisfies the balance constraints; a separating cut is
    /// available.
    Unfeasible,
    /// A negative-cost cycle of uncapacitated arcs exists; the cycle is
    /// available.
    Unbounded,
    /// An internal invariant was violated during the solve.
    Error,
}

impl Status {
    /// True when the instance has been solved to optimality.
    #[inline]
    pub fn is_optimal(self) -> bool {
        self == Status::Optimal
    }
}
