//! Job execution capability.
//!
//! The orchestrator never spawns threads directly; it hands each job body to
//! a [`JobExecutor`] chosen at construction. Production uses
//! [`ThreadedExecutor`]; tests that want synchronous, deterministic
//! completion use [`ImmediateExecutor`].

/// Runs one job body on some thread of execution.
pub trait JobExecutor: Send + Sync {
    /// Run `body`, or report why it could not be started. The body itself
    /// never panics outward: the orchestrator wraps every job in a panic
    /// boundary before handing it over.
    fn execute(
        &self,
        name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> std::io::Result<()>;
}

/// Each job gets its own dedicated OS thread.
#[derive(Debug, Default)]
pub struct ThreadedExecutor;

impl JobExecutor for ThreadedExecutor {
    fn execute(
        &self,
        name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> std::io::Result<()> {
        std::thread::Builder::new().name(name).spawn(body)?;
        Ok(())
    }
}

/// Runs the job inline on the caller's thread; submission returns only after
/// the job has fully completed.
#[derive(Debug, Default)]
pub struct ImmediateExecutor;

impl JobExecutor for ImmediateExecutor {
    fn execute(
        &self,
        _name: String,
        body: Box<dyn FnOnce() + Send + 'static>,
    ) -> std::io::Result<()> {
        body();
        Ok(())
    }
}
