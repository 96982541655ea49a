//! Reference power-flow solvers.
//!
//! The headroom search only talks to [`headroom_core::PowerFlowSolver`];
//! anything implementing that trait can drive it. [`LinearizedPowerFlow`] is
//! the solver shipped with the workspace and used by the CLI.

pub mod linearized;

pub use linearized::LinearizedPowerFlow;
