use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;

use arlo_streamer::domain::ports::AttributeCallback;
use arlo_streamer::domain::value_objects::SirenArgs;
use arlo_streamer::test_utils::{wait_until, FakeLauncher};
use arlo_streamer::{
    ArloDevice, AttributeValue, Camera, CameraSettings, CameraState, Device, DeviceName,
    LocalArloDevice, PipelineBuilder, PipelineRole, PrometheusReporter,
};

const MOTION_TIMEOUT: Duration = Duration::from_millis(150);
const STREAM_URL: &str = "rtsps://cloud.example/front_door";

/// SDK device whose stream requests take a while to be granted
struct SlowStreamDevice {
    inner: Arc<LocalArloDevice>,
    delay: Duration,
}

impl ArloDevice for SlowStreamDevice {
    fn device_id(&self) -> &str {
        self.inner.device_id()
    }

    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    fn is_unavailable(&self) -> bool {
        self.inner.is_unavailable()
    }

    fn battery_level(&self) -> Option<u8> {
        self.inner.battery_level()
    }

    fn mode(&self) -> Option<String> {
        self.inner.mode()
    }

    fn available_modes(&self) -> Vec<String> {
        self.inner.available_modes()
    }

    fn set_mode(&self, mode: &str) -> arlo_streamer::Result<()> {
        self.inner.set_mode(mode)
    }

    fn siren_state(&self) -> Option<String> {
        self.inner.siren_state()
    }

    fn siren_on(&self, args: Option<&SirenArgs>) -> arlo_streamer::Result<()> {
        self.inner.siren_on(args)
    }

    fn siren_off(&self) -> arlo_streamer::Result<()> {
        self.inner.siren_off()
    }

    fn get_stream(&self) -> Option<String> {
        std::thread::sleep(self.delay);
        self.inner.get_stream()
    }

    fn request_snapshot(&self) -> arlo_streamer::Result<()> {
        self.inner.request_snapshot()
    }

    fn add_attr_callback(&self, attribute: &str, callback: AttributeCallback) {
        self.inner.add_attr_callback(attribute, callback)
    }
}

struct Fixture {
    arlo: Arc<LocalArloDevice>,
    launcher: Arc<FakeLauncher>,
    camera: Arc<Camera>,
}

impl Fixture {
    fn new() -> Self {
        Self::build(None)
    }

    fn with_stream_delay(delay: Duration) -> Self {
        Self::build(Some(delay))
    }

    fn build(stream_delay: Option<Duration>) -> Self {
        let arlo = Arc::new(LocalArloDevice::camera(
            "Front Door",
            Some(STREAM_URL.to_string()),
        ));
        let device: Arc<dyn ArloDevice> = match stream_delay {
            Some(delay) => Arc::new(SlowStreamDevice {
                inner: arlo.clone(),
                delay,
            }) as Arc<dyn ArloDevice>,
            None => arlo.clone() as Arc<dyn ArloDevice>,
        };
        let launcher = Arc::new(FakeLauncher::new());
        let settings = CameraSettings::new(
            MOTION_TIMEOUT,
            Duration::from_secs(3600),
            Duration::from_millis(10),
            2,
        )
        .unwrap()
        .with_poll_intervals(Duration::from_millis(10), Duration::from_millis(10));
        let pipelines = PipelineBuilder::new("-f mpegts udp://127.0.0.1:5000", "idle.mp4")
            .build(&DeviceName::from_display_name("Front Door"));

        let camera = Camera::new(
            device,
            launcher.clone(),
            pipelines,
            settings,
            Arc::new(PrometheusReporter::new()),
        );
        Self {
            arlo,
            launcher,
            camera,
        }
    }

    /// Run the camera until it is idle with its proxy relay up
    async fn start(&self) -> tokio::task::JoinHandle<()> {
        let runner = tokio::spawn(self.camera.clone().run());
        wait_until(|| self.arlo.callback_count() == 1).await;
        self.launcher.wait_for_spawns(PipelineRole::Proxy, 1).await;
        self.launcher.wait_for_spawns(PipelineRole::Idle, 1).await;
        runner
    }

    async fn start_streaming(&self) {
        self.arlo.emit("motionDetected", true);
        self.launcher.wait_for_spawns(PipelineRole::Live, 1).await;
        wait_until(|| self.camera.state() == Some(CameraState::Streaming)).await;
    }

    fn count(&self, role: PipelineRole) -> (usize, usize, usize) {
        (
            self.launcher.spawn_count(role),
            self.launcher.kill_count(role),
            self.launcher.running(role),
        )
    }
}

#[tokio::test]
async fn test_motion_then_timeout_returns_to_idle() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Idle));

    fixture.start_streaming().await;
    assert_eq!(fixture.count(PipelineRole::Idle), (1, 1, 0));
    assert_eq!(fixture.count(PipelineRole::Live), (1, 0, 1));
    assert_eq!(
        fixture.launcher.last_spec(PipelineRole::Live).unwrap().args[1],
        STREAM_URL
    );

    fixture.arlo.emit("motionDetected", false);
    tokio::time::sleep(MOTION_TIMEOUT / 3).await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));

    wait_until(|| fixture.camera.state() == Some(CameraState::Idle)).await;
    fixture.launcher.wait_for_spawns(PipelineRole::Idle, 2).await;

    assert_eq!(fixture.count(PipelineRole::Idle), (2, 1, 1));
    assert_eq!(fixture.count(PipelineRole::Live), (1, 1, 0));
    assert_eq!(fixture.count(PipelineRole::Proxy), (1, 0, 1));

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_motion_before_timeout_keeps_streaming() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    fixture.start_streaming().await;

    fixture.arlo.emit("motionDetected", false);
    tokio::time::sleep(MOTION_TIMEOUT / 3).await;
    fixture.arlo.emit("motionDetected", true);
    wait_until(|| fixture.camera.motion()).await;

    tokio::time::sleep(MOTION_TIMEOUT * 2).await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));
    assert_eq!(fixture.count(PipelineRole::Live), (1, 0, 1));
    assert_eq!(fixture.launcher.spawn_count(PipelineRole::Idle), 1);

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_new_motion_off_supersedes_pending_timeout() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    fixture.start_streaming().await;

    let started = Instant::now();
    fixture.camera.on_motion(false).await;
    tokio::time::sleep(MOTION_TIMEOUT / 2).await;
    fixture.camera.on_motion(false).await;

    // Past the first deadline, short of the second
    tokio::time::sleep(MOTION_TIMEOUT * 2 / 3).await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));

    wait_until(|| fixture.camera.state() == Some(CameraState::Idle)).await;
    assert!(started.elapsed() >= MOTION_TIMEOUT * 3 / 2);

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_queued_motion_does_not_cancel_newer_timeout() {
    let fixture = Fixture::with_stream_delay(Duration::from_millis(300));
    let runner = fixture.start().await;
    fixture.start_streaming().await;

    // The remote re-acquire holds the transition lock while the stream is granted
    let camera = fixture.camera.clone();
    let reacquire = tokio::spawn(async move { camera.on_arlo_state("idle").await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let camera = fixture.camera.clone();
    let stop = tokio::spawn(async move { camera.mqtt_control("STOP").await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let camera = fixture.camera.clone();
    let motion = tokio::spawn(async move { camera.on_motion(true).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    fixture.camera.on_motion(false).await;

    for task in [reacquire, stop, motion] {
        task.await.unwrap();
    }
    assert!(!fixture.camera.motion());
    wait_until(|| fixture.camera.state() == Some(CameraState::Idle)).await;
    fixture.launcher.wait_for_spawns(PipelineRole::Idle, 3).await;
    assert_eq!(fixture.launcher.running(PipelineRole::Live), 0);

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_setting_current_state_is_a_no_op() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    let camera: Arc<dyn Device> = fixture.camera.clone();
    let mut statuses = Box::pin(arlo_streamer::application::services::status_stream(camera));

    // Drain the startup notifications
    tokio::time::sleep(Duration::from_millis(20)).await;
    statuses.next().await.unwrap();

    fixture.camera.set_state(CameraState::Idle).await;
    fixture.camera.set_state_named("idle").await;
    fixture.camera.set_state_named("bogus").await;

    let next = tokio::time::timeout(Duration::from_millis(50), statuses.next()).await;
    assert!(next.is_err(), "no status notification expected");
    assert_eq!(fixture.count(PipelineRole::Idle), (1, 0, 1));

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_status_reflects_new_state() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    let camera: Arc<dyn Device> = fixture.camera.clone();
    let mut statuses = Box::pin(arlo_streamer::application::services::status_stream(camera));
    tokio::time::sleep(Duration::from_millis(20)).await;
    statuses.next().await.unwrap();

    fixture.start_streaming().await;
    let (name, status) = statuses.next().await.unwrap();
    assert_eq!(name.as_str(), "front_door");
    assert_eq!(
        String::from_utf8(status.to_json().unwrap()).unwrap(),
        r#"{"battery":100,"state":"streaming"}"#
    );

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_remote_idle_requests_new_stream() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    fixture.start_streaming().await;

    fixture.arlo.emit("activityState", "idle");
    fixture.launcher.wait_for_spawns(PipelineRole::Live, 2).await;

    assert_eq!(fixture.arlo.stream_requests(), 2);
    assert_eq!(fixture.count(PipelineRole::Live), (2, 1, 1));
    assert_eq!(fixture.launcher.running(PipelineRole::Idle), 0);
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_user_stream_enters_streaming() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;

    fixture.arlo.emit("activityState", "userStreamActive");
    fixture.launcher.wait_for_spawns(PipelineRole::Live, 1).await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_camera_commands() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;

    fixture.camera.mqtt_control("START").await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Streaming));
    fixture.launcher.wait_for_spawns(PipelineRole::Live, 1).await;
    assert_eq!(fixture.count(PipelineRole::Live), (1, 0, 1));

    fixture.camera.mqtt_control("stop").await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Idle));
    assert_eq!(fixture.count(PipelineRole::Live), (1, 1, 0));

    fixture.arlo.set_snapshot_image(vec![0xff, 0xd8]);
    fixture.camera.mqtt_control("Snapshot").await;
    assert_eq!(fixture.arlo.snapshot_requests(), 1);

    fixture.camera.mqtt_control("REBOOT").await;
    assert_eq!(fixture.camera.state(), Some(CameraState::Idle));

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_picture_queue_is_bounded() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;

    // Nobody listens yet
    fixture
        .camera
        .on_event("presignedLastImageData", AttributeValue::Bytes(vec![0]))
        .await;
    assert!(fixture.camera.picture_queue().is_empty());

    let mut pictures = Box::pin(fixture.camera.pictures());
    for picture in 1..=3u8 {
        fixture.arlo.emit("presignedLastImageData", vec![picture]);
    }
    wait_until(|| fixture.camera.picture_queue().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(fixture.camera.picture_queue().len(), 2);

    let (name, first) = pictures.next().await.unwrap();
    assert_eq!(name, DeviceName::from_display_name("Front Door"));
    assert_eq!(first.len(), 1);
    pictures.next().await.unwrap();
    assert!(fixture.camera.picture_queue().is_empty());

    runner.abort();
    fixture.camera.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_when_idle_waits_for_idle() {
    let fixture = Fixture::new();
    let runner = fixture.start().await;
    fixture.start_streaming().await;

    let camera = fixture.camera.clone();
    let drain = tokio::spawn(async move { camera.shutdown_when_idle().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!drain.is_finished());

    fixture.camera.mqtt_control("STOP").await;
    tokio::time::timeout(Duration::from_secs(1), drain)
        .await
        .expect("drain finishes once idle")
        .unwrap();

    assert_eq!(fixture.launcher.running(PipelineRole::Proxy), 0);
    assert_eq!(fixture.launcher.running(PipelineRole::Idle), 0);
    assert!(fixture.camera.pipelines().is_closed());

    runner.abort();
}

#[tokio::test]
async fn test_unavailable_camera_waits_before_starting() {
    let fixture = Fixture::new();
    fixture.arlo.set_unavailable(true);
    assert!(fixture.arlo.is_unavailable());

    let runner = tokio::spawn(fixture.camera.clone().run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fixture.camera.state(), None);
    assert_eq!(fixture.launcher.spawn_count(PipelineRole::Proxy), 0);

    fixture.arlo.set_unavailable(false);
    fixture.launcher.wait_for_spawns(PipelineRole::Proxy, 1).await;
    wait_until(|| fixture.camera.state() == Some(CameraState::Idle)).await;

    runner.abort();
    fixture.camera.shutdown().await;
}
