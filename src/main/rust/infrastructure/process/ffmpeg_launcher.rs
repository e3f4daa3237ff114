use std::io::{PipeReader, PipeWriter};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{ChildProcess, ProcessLauncher};
use crate::domain::value_objects::{PipelineExit, PipelineSpec, Redirect};

/// Launches a camera's pipelines as child processes sharing one OS pipe.
///
/// Both ends of the pipe stay open here for the camera's lifetime, so the
/// proxy relay never sees end-of-file while idle and live writers swap.
pub struct FfmpegLauncher {
    reader: PipeReader,
    writer: PipeWriter,
}

impl FfmpegLauncher {
    pub fn new() -> Result<Self> {
        let (reader, writer) = std::io::pipe()
            .map_err(|e| DomainError::PipelineSpawnFailed(format!("cannot create pipe: {}", e)))?;
        Ok(Self { reader, writer })
    }

    fn stdio(&self, redirect: Redirect) -> Result<Stdio> {
        let stdio = match redirect {
            Redirect::Null => return Ok(Stdio::null()),
            Redirect::PipeRead => self.reader.try_clone().map(Stdio::from),
            Redirect::PipeWrite => self.writer.try_clone().map(Stdio::from),
        };
        stdio.map_err(|e| DomainError::PipelineSpawnFailed(format!("cannot share pipe: {}", e)))
    }
}

impl ProcessLauncher for FfmpegLauncher {
    fn spawn(&self, spec: &PipelineSpec) -> Result<Box<dyn ChildProcess>> {
        let stderr = if spec.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(self.stdio(spec.stdin)?)
            .stdout(self.stdio(spec.stdout)?)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::PipelineSpawnFailed(format!("{}: {}", spec.program, e)))?;

        Ok(Box::new(TokioChild { child }))
    }
}

struct TokioChild {
    child: Child,
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stderr(&mut self) -> Option<Box<dyn AsyncRead + Send + Unpin>> {
        self.child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as Box<dyn AsyncRead + Send + Unpin>)
    }

    async fn wait(&mut self) -> Result<PipelineExit> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| DomainError::PipelineWaitFailed(e.to_string()))?;
        Ok(PipelineExit {
            code: status.code(),
        })
    }

    fn start_kill(&mut self) -> Result<()> {
        self.child
            .start_kill()
            .map_err(|e| DomainError::PipelineKillFailed(e.to_string()))
    }
}
