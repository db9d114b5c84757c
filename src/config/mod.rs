// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
#[allow(clippy::module_inception)]
pub mod config;
pub mod duration;
pub mod logging;

pub use config::*;
pub use duration::*;
pub use logging::*;
