//! Rate limiting logic and state management.

mod backend;
mod limiter;
mod window;

pub use backend::AdmissionControl;
pub use limiter::RateLimiter;
pub use window::{TimeUnit, Window};
