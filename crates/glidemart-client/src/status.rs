//! Pluggable progress reporting.
//!
//! Reconcilers report human-readable progress through a [`Status`] sink so
//! callers can route it to a progress bar, a job log, or nothing at all.

/// Progress and message sink threaded through long-running operations.
///
/// All methods have no-op or tracing defaults; implementors override what
/// they care about. Counter methods follow a bar-style protocol: `add`
/// grows the expected total, `done` advances it, `set_stages`/`done_stage`
/// track coarse phases.
pub trait Status: Send + Sync {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    /// Grow the expected work counter.
    fn add(&self, _n: usize) {}

    /// Mark units of work as finished.
    fn done(&self, _n: usize) {}

    /// Declare how many coarse stages the operation has.
    fn set_stages(&self, _n: usize) {}

    /// Mark the current stage as finished.
    fn done_stage(&self) {}
}

/// Default sink: messages go to `tracing`, counters are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl Status for TracingStatus {}


#[cfg(test)]
mod tests {
    use super::*;
    use test_support::RecordingStatus;

    #[test]
    fn recording_sink_captures() {
        let status = RecordingStatus::default();
        status.log("created u_dm_host");
        status.warn("truncated u_name");
        status.add(3);
        status.done(3);

        assert_eq!(status.messages.lock().unwrap().as_slice(), ["created u_dm_host"]);
        assert_eq!(status.warnings.lock().unwrap().as_slice(), ["truncated u_name"]);
    }
}
