//! Scheduling core: rate window, controller and the public facade.

pub mod controller;
pub mod window;

pub use controller::{PrefetchScheduler, SchedulerStatus};
pub use window::RateWindow;
