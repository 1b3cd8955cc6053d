//! Controller mode and per-cycle status.

/// Which control loop currently owns the supply.
///
/// Invariant: at most one of mag-up/regulate is active; `start_*` enforces
/// this, independent of any UI affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Idle,
    MaggingUp,
    Regulating,
}

/// Why an active loop finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Mag-up: supply current reached the configured limit.
    TargetCurrentReached,
    /// Regulate: the non-negative floor drove commanded voltage to 0.
    VoltageFloored,
}

/// Public status of a single control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStatus {
    /// No loop is active.
    Idle,
    /// Keep going; the scheduler should run another cycle.
    Running,
    /// The active loop finished and the controller is back to Idle.
    Complete(Completion),
}
