use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::ports::{MetricsReporter, ProcessLauncher};
use crate::domain::value_objects::{DeviceName, PipelineRole, PipelineSet, PipelineSpec};

/// One supervised pipeline and the means to stop it
struct SupervisedPipeline {
    role: PipelineRole,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl SupervisedPipeline {
    /// Request a stop, kill the process and wait for supervision to end
    async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(pipeline = %self.role, "Pipeline supervisor panicked");
            }
        }
    }
}

/// Shared state handed to every supervision task
#[derive(Clone)]
struct Supervision {
    camera: DeviceName,
    launcher: Arc<dyn ProcessLauncher>,
    restart_delay: Duration,
    metrics: Arc<dyn MetricsReporter>,
}

/// Keeps a camera's proxy relay alive and manages the mutually exclusive
/// idle filler / live relay that feed it.
pub struct PipelineSupervisor {
    supervision: Supervision,
    pipelines: PipelineSet,
    proxy: Mutex<Option<SupervisedPipeline>>,
    active: Mutex<Option<SupervisedPipeline>>,
    closed: AtomicBool,
}

impl PipelineSupervisor {
    pub fn new(
        camera: DeviceName,
        launcher: Arc<dyn ProcessLauncher>,
        pipelines: PipelineSet,
        restart_delay: Duration,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            supervision: Supervision {
                camera,
                launcher,
                restart_delay,
                metrics,
            },
            pipelines,
            proxy: Mutex::new(None),
            active: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Start the always-on proxy relay if it is not running yet
    pub async fn start_proxy(&self) {
        let mut proxy = self.proxy.lock().await;
        if proxy.is_some() || self.is_closed() {
            return;
        }
        *proxy = Some(self.launch(self.pipelines.proxy.clone(), true));
    }

    /// Replace the active pipeline with the idle filler
    pub async fn start_idle(&self) {
        self.replace_active(self.pipelines.idle.clone(), true).await;
    }

    /// Replace the active pipeline with a live relay of `stream_url`.
    ///
    /// A crashed live relay is not restarted: stream URLs are single-use.
    pub async fn start_live(&self, stream_url: &str) {
        self.replace_active(self.pipelines.live(stream_url), false).await;
    }

    /// Kill the active idle/live pipeline; the proxy relay keeps running
    pub async fn stop_stream(&self) {
        if let Some(active) = self.active.lock().await.take() {
            active.stop().await;
        }
    }

    /// Kill every pipeline of this camera. Later start requests are ignored.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for slot in [&self.active, &self.proxy] {
            match slot.lock().await.take() {
                Some(pipeline) => pipeline.stop().await,
                None => tracing::debug!(camera = %self.supervision.camera, "Pipeline not running"),
            }
        }
    }

    pub async fn active_role(&self) -> Option<PipelineRole> {
        self.active.lock().await.as_ref().map(|p| p.role)
    }

    pub async fn proxy_running(&self) -> bool {
        self.proxy.lock().await.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn replace_active(&self, spec: PipelineSpec, restart: bool) {
        let mut active = self.active.lock().await;
        // Stop before start: the proxy pipe only ever has one writer
        if let Some(previous) = active.take() {
            previous.stop().await;
        }
        if self.is_closed() {
            return;
        }
        *active = Some(self.launch(spec, restart));
    }

    fn launch(&self, spec: PipelineSpec, restart: bool) -> SupervisedPipeline {
        let stop = CancellationToken::new();
        let role = spec.role;
        let task = tokio::spawn(supervise(
            self.supervision.clone(),
            spec,
            restart,
            stop.clone(),
        ));
        SupervisedPipeline { role, stop, task }
    }
}

/// Run `spec` until it is stopped, restarting after failures when `restart`
/// is set. A clean unrequested exit ends supervision. A spawn failure is
/// logged and ends supervision.
async fn supervise(
    supervision: Supervision,
    spec: PipelineSpec,
    restart: bool,
    stop: CancellationToken,
) {
    let camera = &supervision.camera;
    let role = spec.role;

    loop {
        tracing::debug!(camera = %camera, pipeline = %role, "Launching: {}", spec.command_line());
        let mut child = match supervision.launcher.spawn(&spec) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(camera = %camera, pipeline = %role, "{}", e);
                return;
            }
        };
        supervision.metrics.report_pipeline_start(role);

        if let Some(stderr) = child.take_stderr() {
            tokio::spawn(log_stderr(camera.clone(), role, stderr));
        }

        let exited = tokio::select! {
            exit = child.wait() => Some(exit),
            _ = stop.cancelled() => None,
        };

        let exit = match exited {
            Some(exit) => exit,
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(camera = %camera, pipeline = %role, "Process already gone: {}", e);
                }
                let _ = child.wait().await;
                tracing::debug!(camera = %camera, pipeline = %role, "Pipeline stopped");
                return;
            }
        };

        if stop.is_cancelled() {
            return;
        }

        match exit {
            Ok(exit) if exit.success() => {
                tracing::info!(camera = %camera, pipeline = %role, "Pipeline finished");
                return;
            }
            Ok(exit) => tracing::warn!(
                camera = %camera,
                pipeline = %role,
                "Pipeline exited unexpectedly with code {:?}",
                exit.code
            ),
            Err(e) => tracing::warn!(camera = %camera, pipeline = %role, "{}", e),
        }

        if !restart {
            return;
        }

        tracing::info!(camera = %camera, pipeline = %role, "Restarting in {:?}", supervision.restart_delay);
        supervision.metrics.report_pipeline_restart(role);
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(supervision.restart_delay) => {}
        }
    }
}

async fn log_stderr(
    camera: DeviceName,
    role: PipelineRole,
    stderr: Box<dyn AsyncRead + Send + Unpin>,
) {
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::debug!(camera = %camera, pipeline = %role, "{}", line.trim())
            }
            Ok(None) => break,
            Err(e) => {
                tracing::trace!(camera = %camera, pipeline = %role, "stderr closed: {}", e);
                break;
            }
        }
    }
}
