/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each source is fetched.
    fn source_started(&self, label: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_started(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self, _message: &str) {}
}
