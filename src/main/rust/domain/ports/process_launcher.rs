use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::domain::errors::Result;
use crate::domain::value_objects::{PipelineExit, PipelineSpec};

/// A running external pipeline
#[async_trait]
pub trait ChildProcess: Send {
    fn id(&self) -> Option<u32>;

    /// Captured stderr, present only when the `PipelineSpec` asked for it
    fn take_stderr(&mut self) -> Option<Box<dyn AsyncRead + Send + Unpin>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<PipelineExit>;

    /// Send a forceful kill without waiting for the exit
    fn start_kill(&mut self) -> Result<()>;
}

/// Port for launching external pipelines
pub trait ProcessLauncher: Send + Sync {
    fn spawn(&self, spec: &PipelineSpec) -> Result<Box<dyn ChildProcess>>;
}
