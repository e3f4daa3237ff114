use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use arlo_streamer::{
    serve_metrics, Base, Camera, Config, DeviceName, FfmpegLauncher, LocalArloDevice,
    MetricsReporter, MqttSettings, MqttTransport, PipelineBuilder, PrometheusReporter,
    RouterService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting Arlo streamer");
    info!("  MQTT broker: {}:{}", config.mqtt_broker, config.mqtt_port);
    info!("  Cameras: {:?}", config.cameras);
    info!("  Bases: {:?}", config.bases);
    info!("  Metrics port: {}", config.metrics_port);

    // Convert CLI config to domain configs
    let settings = config
        .camera_settings()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let topics = config
        .to_topic_templates()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let backoff_policy = config
        .to_backoff_policy()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let metrics_reporter: Arc<dyn MetricsReporter> = Arc::new(PrometheusReporter::new());

    // Start metrics server
    let shutdown = CancellationToken::new();
    let ready = Arc::new(AtomicBool::new(false));
    let metrics_server = tokio::spawn(serve_metrics(
        config.metrics_port,
        ready.clone(),
        shutdown.clone(),
    ));

    // Create devices (dependency injection)
    let builder = PipelineBuilder::new(config.ffmpeg_out.clone(), config.idle_video.clone())
        .with_stderr_capture(config.verbose);

    let mut cameras = Vec::new();
    for display_name in &config.cameras {
        let name = DeviceName::from_display_name(display_name);
        let arlo = Arc::new(LocalArloDevice::camera(
            display_name,
            config.stream_url_for(name.as_str()),
        ));
        let launcher = Arc::new(
            FfmpegLauncher::new().map_err(|e| anyhow::anyhow!("{}: {}", name, e))?,
        );
        cameras.push(Camera::new(
            arlo,
            launcher,
            builder.build(&name),
            settings.clone(),
            metrics_reporter.clone(),
        ));
    }

    let bases: Vec<Arc<Base>> = config
        .bases
        .iter()
        .map(|display_name| {
            let arlo = Arc::new(LocalArloDevice::base(display_name, config.modes.clone()));
            Base::new(arlo, settings.status_interval())
        })
        .collect();

    // Run devices
    let mut devices = JoinSet::new();
    for camera in &cameras {
        devices.spawn(camera.clone().run());
    }
    for base in &bases {
        devices.spawn(base.clone().run());
    }
    ready.store(true, Ordering::SeqCst);

    // Run the router unless the transport is disabled
    let router = if config.transport_enabled() {
        let mqtt = MqttSettings::new(config.mqtt_broker.clone(), config.mqtt_port)
            .with_credentials(config.mqtt_user.clone(), config.mqtt_pass.clone());
        let router = Arc::new(RouterService::new(
            Arc::new(MqttTransport::new(mqtt)),
            topics,
            backoff_policy,
            cameras.clone(),
            bases.clone(),
            metrics_reporter.clone(),
        ));
        let runner = router.clone();
        let handle = tokio::spawn(async move { runner.run_with_reconnect().await });
        Some((router, handle))
    } else {
        info!("MQTT disabled, running devices only");
        None
    };

    shutdown_signal().await;
    info!("Received shutdown signal");

    if let Some((router, handle)) = router {
        router.stop();
        if let Err(e) = handle.await {
            error!("Router task failed: {}", e);
        }
    }

    futures::future::join_all(cameras.iter().map(|camera| camera.shutdown())).await;
    devices.shutdown().await;

    // Signal shutdown to metrics server
    shutdown.cancel();
    metrics_server.await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for ctrl+c: {}", e);
            }
        }
        _ = terminate => {}
    }
}
