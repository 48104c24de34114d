//! # Running-service handle.
//!
//! A [`ServiceHandle`] is what a start directive hands back: proof that the
//! service was launched plus whatever a check may need to find it.

use std::sync::Arc;

use tokio::time::Instant;

/// Handle to a started service instance. Cheap to clone.
#[derive(Clone, Debug)]
pub struct ServiceHandle {
    service: Arc<str>,
    pid: Option<u32>,
    started_at: Instant,
}

impl ServiceHandle {
    /// Handle for `service`, started now.
    pub fn new(service: impl Into<Arc<str>>) -> Self {
        Self {
            service: service.into(),
            pid: None,
            started_at: Instant::now(),
        }
    }

    /// Records the OS process id.
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    /// Service name.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// OS process id, when the service is a local process.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// When the start directive returned.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}
