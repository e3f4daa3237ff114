use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use tokio_util::sync::CancellationToken;

use super::{run_event_loop, Device, LevelTrigger, MotionSink, PictureQueue, PipelineSupervisor};
use crate::domain::entities::CameraLifecycle;
use crate::domain::ports::{ArloDevice, MetricsReporter, ProcessLauncher};
use crate::domain::value_objects::{
    AttributeValue, CameraCommand, CameraSettings, CameraState, CameraStatus, DeviceName,
    DeviceStatus, PipelineSet,
};

/// SDK activity state reported when the cloud side stopped streaming
const ARLO_STATE_IDLE: &str = "idle";
/// SDK activity state reported when a stream was started elsewhere
const ARLO_STATE_USER_STREAM: &str = "userStreamActive";

/// A camera: idle/streaming state machine on top of its pipeline supervisor.
pub struct Camera {
    name: DeviceName,
    arlo: Arc<dyn ArloDevice>,
    settings: CameraSettings,
    lifecycle: Mutex<CameraLifecycle>,
    /// Serializes transitions and the pipeline mutations they cause
    transition_lock: tokio::sync::Mutex<()>,
    idle_timeout: Mutex<Option<CancellationToken>>,
    motion: MotionSink,
    status_trigger: LevelTrigger,
    pictures: PictureQueue,
    pipelines: PipelineSupervisor,
    metrics: Arc<dyn MetricsReporter>,
    me: Weak<Camera>,
}

impl Camera {
    pub fn new(
        arlo: Arc<dyn ArloDevice>,
        launcher: Arc<dyn ProcessLauncher>,
        pipelines: PipelineSet,
        settings: CameraSettings,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Arc<Self> {
        let name = DeviceName::from_display_name(arlo.display_name());
        let pipelines = PipelineSupervisor::new(
            name.clone(),
            launcher,
            pipelines,
            settings.restart_delay(),
            metrics.clone(),
        );
        tracing::info!(camera = %name, "Camera added");

        Arc::new_cyclic(|me| Self {
            pictures: PictureQueue::new(settings.picture_queue_capacity()),
            name,
            arlo,
            settings,
            lifecycle: Mutex::new(CameraLifecycle::new()),
            transition_lock: tokio::sync::Mutex::new(()),
            idle_timeout: Mutex::new(None),
            motion: MotionSink::new(),
            status_trigger: LevelTrigger::new(),
            pipelines,
            metrics,
            me: me.clone(),
        })
    }

    /// Wait for the camera to become available, enter `idle`, start the
    /// proxy relay and process SDK events until the SDK goes away.
    pub async fn run(self: Arc<Self>) {
        while self.arlo.is_unavailable() {
            tokio::time::sleep(self.settings.availability_poll()).await;
        }
        self.set_state(CameraState::Idle).await;
        self.pipelines.start_proxy().await;
        run_event_loop(self).await;
    }

    pub fn state(&self) -> Option<CameraState> {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_state()
    }

    pub fn motion(&self) -> bool {
        self.motion.current()
    }

    pub fn pipelines(&self) -> &PipelineSupervisor {
        &self.pipelines
    }

    pub fn picture_queue(&self) -> &PictureQueue {
        &self.pictures
    }

    /// Move to `new_state`; a no-op when already there
    pub async fn set_state(&self, new_state: CameraState) {
        self.transition(new_state, None).await;
    }

    /// Same as [`set_state`](Self::set_state) for a textual state; unknown names are ignored
    pub async fn set_state_named(&self, name: &str) {
        if let Ok(state) = name.parse() {
            self.set_state(state).await;
        }
    }

    /// Timers are armed and cancelled when the event arrives, not when its
    /// transition gets the lock.
    pub async fn on_motion(&self, motion: bool) {
        self.motion.set(motion);
        tracing::info!(camera = %self.name, "motion: {}", motion);

        if motion {
            self.cancel_idle_timeout();
            self.set_state(CameraState::Streaming).await;
        } else {
            self.schedule_idle_timeout();
        }
    }

    /// React to the SDK's own view of the camera activity
    pub async fn on_arlo_state(&self, arlo_state: &str) {
        match arlo_state {
            ARLO_STATE_IDLE if self.state() == Some(CameraState::Streaming) => {
                // The remote side dropped the stream while we still want it
                let _guard = self.transition_lock.lock().await;
                if self.state() == Some(CameraState::Streaming) {
                    tracing::info!(camera = %self.name, "Stream dropped remotely, requesting a new one");
                    self.start_live_stream().await;
                }
            }
            ARLO_STATE_USER_STREAM if self.state() != Some(CameraState::Streaming) => {
                self.cancel_idle_timeout();
                self.set_state(CameraState::Streaming).await;
            }
            _ => {}
        }
    }

    /// Store a snapshot if someone is listening; drops it when the queue is full
    pub fn put_picture(&self, picture: Vec<u8>) {
        if !self.pictures.put(picture) {
            self.metrics.report_picture_dropped(self.name.as_str());
        }
    }

    /// Lazy sequence of snapshots. Pictures arriving before the first call are ignored.
    pub fn pictures(self: &Arc<Self>) -> impl Stream<Item = (DeviceName, Vec<u8>)> + Send {
        self.pictures.start_listening();
        futures::stream::unfold(self.clone(), |camera| async move {
            let picture = camera.pictures.next().await?;
            Some(((camera.name.clone(), picture), camera))
        })
    }

    /// Lazy sequence of motion flags, one per observed change
    pub fn motion_stream(self: &Arc<Self>) -> impl Stream<Item = (DeviceName, bool)> + Send {
        futures::stream::unfold(self.clone(), |camera| async move {
            let motion = camera.motion.changed().await;
            Some(((camera.name.clone(), motion), camera))
        })
    }

    /// Kill the active idle/live pipeline
    pub async fn stop_stream(&self) {
        self.pipelines.stop_stream().await;
    }

    /// Wait until the camera is idle, then shut down
    pub async fn shutdown_when_idle(&self) {
        if !self.is_drained() {
            tracing::info!(camera = %self.name, "Active, waiting...");
            while !self.is_drained() {
                tokio::time::sleep(self.settings.drain_poll()).await;
            }
        }
        self.shutdown().await;
    }

    /// Kill every pipeline immediately
    pub async fn shutdown(&self) {
        tracing::info!(camera = %self.name, "Shutting down");
        self.cancel_idle_timeout();
        self.pipelines.shutdown().await;
    }

    fn is_drained(&self) -> bool {
        // A camera that never became available has nothing to drain
        self.state() != Some(CameraState::Streaming)
    }

    async fn transition(&self, new_state: CameraState, timeout: Option<&CancellationToken>) {
        let _guard = self.transition_lock.lock().await;

        if timeout.is_some_and(CancellationToken::is_cancelled) {
            return;
        }

        let transition = self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transition_to(new_state);
        let Some(transition) = transition else {
            return;
        };

        match transition.streamed {
            Some(streamed) => tracing::info!(
                camera = %self.name,
                "state: {} (streamed for {:.1?})",
                new_state,
                streamed
            ),
            None => tracing::info!(camera = %self.name, "state: {}", new_state),
        }
        self.metrics.report_camera_state(self.name.as_str(), new_state);
        self.status_trigger.set();

        match new_state {
            CameraState::Idle => {
                self.pipelines.stop_stream().await;
                self.pipelines.start_idle().await;
            }
            CameraState::Streaming => self.start_live_stream().await,
        }
    }

    /// Ask the SDK for a stream and switch the active pipeline to it.
    /// Caller holds the transition lock.
    async fn start_live_stream(&self) {
        let arlo = self.arlo.clone();
        let stream_url = match tokio::task::spawn_blocking(move || arlo.get_stream()).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(camera = %self.name, "Stream request failed: {}", e);
                None
            }
        };

        match stream_url {
            Some(url) => {
                self.pipelines.stop_stream().await;
                self.pipelines.start_live(&url).await;
            }
            None => tracing::warn!(camera = %self.name, "No stream granted"),
        }
    }

    fn schedule_idle_timeout(&self) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .idle_timeout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }

        let me = self.me.clone();
        let timeout = self.settings.motion_timeout();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(timeout) => {}
            }
            if let Some(camera) = me.upgrade() {
                camera.transition(CameraState::Idle, Some(&token)).await;
            }
        });
    }

    fn cancel_idle_timeout(&self) {
        if let Some(token) = self
            .idle_timeout
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }
}

#[async_trait]
impl Device for Camera {
    fn name(&self) -> &DeviceName {
        &self.name
    }

    fn arlo(&self) -> &Arc<dyn ArloDevice> {
        &self.arlo
    }

    fn status_interval(&self) -> Duration {
        self.settings.status_interval()
    }

    fn status_trigger(&self) -> &LevelTrigger {
        &self.status_trigger
    }

    async fn on_event(&self, attribute: &str, value: AttributeValue) {
        match attribute {
            "motionDetected" => {
                if let Some(motion) = value.as_bool() {
                    self.on_motion(motion).await;
                }
            }
            "activityState" => {
                if let Some(state) = value.as_text() {
                    self.on_arlo_state(state).await;
                }
            }
            "presignedLastImageData" => {
                if self.pictures.is_listening() {
                    if let Some(picture) = value.into_bytes() {
                        self.put_picture(picture);
                    }
                }
            }
            _ => {}
        }
    }

    fn get_status(&self) -> DeviceStatus {
        DeviceStatus::Camera(CameraStatus {
            battery: self.arlo.battery_level(),
            state: self.state(),
        })
    }

    async fn mqtt_control(&self, payload: &str) {
        let command = match payload.parse::<CameraCommand>() {
            Ok(command) => command,
            Err(_) => return,
        };

        match command {
            CameraCommand::Start => {
                self.cancel_idle_timeout();
                self.set_state(CameraState::Streaming).await;
            }
            CameraCommand::Stop => {
                self.cancel_idle_timeout();
                self.set_state(CameraState::Idle).await;
            }
            CameraCommand::Snapshot => {
                let arlo = self.arlo.clone();
                match tokio::task::spawn_blocking(move || arlo.request_snapshot()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(camera = %self.name, "Snapshot failed: {}", e),
                    Err(e) => tracing::warn!(camera = %self.name, "Snapshot task failed: {}", e),
                }
            }
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("motion", &self.motion())
            .finish()
    }
}

