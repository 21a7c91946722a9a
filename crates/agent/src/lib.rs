//! The agentic loop: repair pass, tool dispatch, and turn control.

pub mod dispatch;
pub mod repair;
pub mod turn;

pub use dispatch::ToolDispatcher;
pub use repair::{repair, RepairedCalls};
pub use turn::{Mode, TurnController, CANCELLED_ADVISORY, STEP_BUDGET_ADVISORY};
