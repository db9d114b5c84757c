pub mod log_throttle;
pub mod logger;

pub use log_throttle::LogThrottle;
pub use logger::init_logging;
