//! # Event subscribers.
//!
//! ```text
//! Supervisor / gates / readiness loops ── publish(Event) ──► Bus
//!                                                            │
//!                                          listener ──► SubscriberSet::emit()
//!                                                            │
//!                                          ┌─────────────────┼──────────────┐
//!                                          ▼                 ▼              ▼
//!                                      LogWriter          metrics        custom
//! ```

mod embedded;
mod set;
mod subscriber;

pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
