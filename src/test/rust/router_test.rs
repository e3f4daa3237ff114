use std::sync::Arc;
use std::time::Duration;

use arlo_streamer::test_utils::{wait_until, FakeLauncher, FakeTransport};
use arlo_streamer::{
    ArloDevice, AttributeValue, BackoffPolicy, Base, Camera, CameraSettings, Device,
    DeviceName, DeviceStatus, LocalArloDevice, PictureMessage, PipelineBuilder,
    PrometheusReporter, RouterService, TopicTemplates,
};

const RECONNECT: Duration = Duration::from_millis(20);

fn camera(display_name: &str) -> (Arc<LocalArloDevice>, Arc<Camera>) {
    let arlo = Arc::new(LocalArloDevice::camera(display_name, None));
    let settings = CameraSettings::new(
        Duration::from_secs(60),
        Duration::from_secs(3600),
        Duration::from_millis(10),
        4,
    )
    .unwrap();
    let pipelines =
        PipelineBuilder::new("", "idle.mp4").build(&DeviceName::from_display_name(display_name));
    let camera = Camera::new(
        arlo.clone(),
        Arc::new(FakeLauncher::new()),
        pipelines,
        settings,
        Arc::new(PrometheusReporter::new()),
    );
    (arlo, camera)
}

fn base(display_name: &str) -> (Arc<LocalArloDevice>, Arc<Base>) {
    let arlo = Arc::new(LocalArloDevice::base(
        display_name,
        vec!["armed".to_string(), "disarmed".to_string()],
    ));
    let base = Base::new(arlo.clone(), Duration::from_secs(3600));
    (arlo, base)
}

fn router(
    transport: Arc<FakeTransport>,
    cameras: Vec<Arc<Camera>>,
    bases: Vec<Arc<Base>>,
) -> Arc<RouterService> {
    Arc::new(RouterService::new(
        transport,
        TopicTemplates::with_prefix("arlo"),
        BackoffPolicy::fixed(RECONNECT).unwrap(),
        cameras,
        bases,
        Arc::new(PrometheusReporter::new()),
    ))
}

fn spawn(router: &Arc<RouterService>) -> tokio::task::JoinHandle<()> {
    let router = router.clone();
    tokio::spawn(async move { router.run_with_reconnect().await })
}

#[tokio::test]
async fn test_motion_fan_out_publishes_once_per_camera() {
    let transport = Arc::new(FakeTransport::new());
    let (_, one) = camera("Cam One");
    let (_, two) = camera("Cam Two");
    let router = router(transport.clone(), vec![one.clone(), two.clone()], vec![]);
    let handle = spawn(&router);
    wait_until(|| transport.subscriptions().len() == 2).await;

    two.on_motion(true).await;
    one.on_motion(true).await;

    let motion_publishes = || {
        transport
            .published()
            .into_iter()
            .filter(|(topic, _)| topic.starts_with("arlo/motion/"))
            .collect::<Vec<_>>()
    };
    wait_until(|| motion_publishes().len() == 2).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut published = motion_publishes();
    published.sort();
    assert_eq!(
        published,
        vec![
            ("arlo/motion/cam_one".to_string(), b"true".to_vec()),
            ("arlo/motion/cam_two".to_string(), b"true".to_vec()),
        ]
    );

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_reconnect_resubscribes_every_control_topic() {
    let transport = Arc::new(FakeTransport::new());
    let (_, cam) = camera("Front Door");
    let (_, home) = base("Home Base");
    let router = router(transport.clone(), vec![cam], vec![home]);
    let handle = spawn(&router);

    wait_until(|| transport.subscriptions().len() == 2).await;
    assert_eq!(
        router.control_topics(),
        vec!["arlo/control/front_door", "arlo/control/home_base"]
    );

    transport.drop_connection();
    wait_until(|| transport.subscriptions().len() == 4).await;

    let subscriptions = transport.subscriptions();
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(subscriptions[..2], subscriptions[2..]);

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_refused_connections_are_retried() {
    let transport = Arc::new(FakeTransport::new());
    transport.fail_next_connects(2);
    let (_, home) = base("Home Base");
    let router = router(transport.clone(), vec![], vec![home]);
    let handle = spawn(&router);

    wait_until(|| transport.subscriptions().len() == 1).await;
    assert_eq!(transport.connect_count(), 3);

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_control_messages_reach_their_device() {
    let transport = Arc::new(FakeTransport::new());
    let (cam_arlo, cam) = camera("Front Door");
    let (base_arlo, home) = base("Home Base");
    let router = router(transport.clone(), vec![cam], vec![home]);
    let handle = spawn(&router);
    wait_until(|| transport.subscriptions().len() == 2).await;

    assert!(transport.inject("arlo/control/home_base", br#"{"mode":"armed"}"#));
    assert!(transport.inject("arlo/control/unknown", b"START"));
    assert!(transport.inject("arlo/control/front_door", b"SNAPSHOT"));

    wait_until(|| base_arlo.mode().as_deref() == Some("armed")).await;
    wait_until(|| cam_arlo.snapshot_requests() == 1).await;

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_base_status_is_published() {
    let transport = Arc::new(FakeTransport::new());
    let (_, home) = base("Home Base");
    let router = router(transport.clone(), vec![], vec![home.clone()]);
    let handle = spawn(&router);
    wait_until(|| transport.subscriptions().len() == 1).await;

    home.on_event("activeMode", AttributeValue::from("armed")).await;
    wait_until(|| !transport.published_on("arlo/status/home_base").is_empty()).await;

    let payload = &transport.published_on("arlo/status/home_base")[0];
    let status: DeviceStatus = serde_json::from_slice(payload).unwrap();
    assert_eq!(status, home.get_status());

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_pictures_are_published_as_base64() {
    let transport = Arc::new(FakeTransport::new());
    let (_, cam) = camera("Front Door");
    let router = router(transport.clone(), vec![cam.clone()], vec![]);
    let handle = spawn(&router);
    wait_until(|| transport.subscriptions().len() == 1).await;
    wait_until(|| cam.picture_queue().is_listening()).await;

    cam.on_event("presignedLastImageData", AttributeValue::Bytes(vec![1, 2, 3]))
        .await;
    wait_until(|| !transport.published_on("arlo/picture/front_door").is_empty()).await;

    let payload = &transport.published_on("arlo/picture/front_door")[0];
    let message: PictureMessage = serde_json::from_slice(payload).unwrap();
    assert_eq!(message.payload, "AQID");
    assert!(message.filename.ends_with("front_door.jpg"));

    router.stop();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_stop_ends_reconnect_loop_while_waiting() {
    let transport = Arc::new(FakeTransport::new());
    transport.fail_next_connects(usize::MAX);
    let router = router(transport.clone(), vec![], vec![]);
    let handle = spawn(&router);

    wait_until(|| transport.connect_count() >= 2).await;
    router.stop();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("router stops promptly")
        .unwrap();
    assert!(router.is_stopped());
}
