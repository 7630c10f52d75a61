pub mod clock;
pub mod controller;
pub mod state;

pub use clock::SessionClock;
pub use controller::SessionTracker;
pub use state::{SessionMachine, TrackerSnapshot};
