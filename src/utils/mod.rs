pub mod logging;
pub mod periodic;

pub use periodic::PeriodicTask;
