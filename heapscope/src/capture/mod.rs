//! Probe-event capture
//!
//! The two-phase entry/exit protocol and the session object that receives
//! every callback from the instrumentation platform.

pub mod session;
pub mod staging;

// Re-export common types
pub use session::TraceSession;
pub use staging::ThreadCallStaging;
