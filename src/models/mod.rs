pub mod session;

pub use session::{Break, BreakReason, EmotionalAlert, WorkSession};
