//! Mini-game controllers and the building blocks they share.
//!
//! Every controller is a synchronous state machine implementing
//! [`runner::GameMachine`]; [`runner::spawn`] hosts one inside a tokio task.

pub mod categories;
pub mod countdown;
pub mod feedback;
pub mod hot_seat;
pub mod roster;
pub mod runner;
pub mod session;
pub mod spin;
pub mod trap;
