use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_util::task::AbortOnDropHandle;

use super::{event_channel, LevelTrigger};
use crate::domain::ports::ArloDevice;
use crate::domain::value_objects::{AttributeValue, DeviceName, DeviceStatus};

/// Capability set shared by cameras and base stations
#[async_trait]
pub trait Device: Send + Sync + 'static {
    fn name(&self) -> &DeviceName;

    /// The SDK object this device wraps
    fn arlo(&self) -> &Arc<dyn ArloDevice>;

    fn status_interval(&self) -> Duration;

    fn status_trigger(&self) -> &LevelTrigger;

    /// Handle one attribute change; unknown attributes are ignored
    async fn on_event(&self, attribute: &str, value: AttributeValue);

    /// Point-in-time status snapshot
    fn get_status(&self) -> DeviceStatus {
        DeviceStatus::Empty {}
    }

    /// Handle a raw inbound command payload. Never fails to the caller.
    async fn mqtt_control(&self, payload: &str);
}

/// Drive a device: register the SDK callback, start the periodic status
/// trigger and dispatch every event from this device's SDK object to
/// `on_event` on its own task.
///
/// Returns only when the SDK drops every registered callback.
pub async fn run_event_loop<D: Device + ?Sized>(device: Arc<D>) {
    let (sink, mut events) = event_channel();
    device.arlo().add_attr_callback("*", sink.into_callback());

    let _status_timer = AbortOnDropHandle::new(tokio::spawn(periodic_status_trigger(
        device.clone(),
    )));

    let source = device.arlo().device_id().to_string();
    while let Some(event) = events.next().await {
        if event.source != source {
            continue;
        }
        let device = device.clone();
        tokio::spawn(async move {
            device.on_event(&event.attribute, event.value).await;
        });
    }

    tracing::debug!(device = %device.name(), "SDK event stream ended");
}

async fn periodic_status_trigger<D: Device + ?Sized>(device: Arc<D>) {
    let mut ticker = tokio::time::interval(device.status_interval());
    loop {
        ticker.tick().await;
        device.status_trigger().set();
    }
}

/// Lazy sequence of `(name, status)`, one item per observed status trigger.
/// The status is read when the trigger is observed, never queued.
pub fn status_stream(
    device: Arc<dyn Device>,
) -> impl Stream<Item = (DeviceName, DeviceStatus)> + Send {
    futures::stream::unfold(device, |device| async move {
        device.status_trigger().wait().await;
        let item = (device.name().clone(), device.get_status());
        Some((item, device))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::BaseStatus;
    use crate::infrastructure::sdk::LocalArloDevice;
    use std::sync::Mutex;

    struct RecordingDevice {
        name: DeviceName,
        arlo: Arc<dyn ArloDevice>,
        trigger: LevelTrigger,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingDevice {
        fn new(arlo: Arc<LocalArloDevice>) -> Arc<Self> {
            Arc::new(Self {
                name: DeviceName::from_display_name(arlo.display_name()),
                arlo,
                trigger: LevelTrigger::new(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Device for RecordingDevice {
        fn name(&self) -> &DeviceName {
            &self.name
        }

        fn arlo(&self) -> &Arc<dyn ArloDevice> {
            &self.arlo
        }

        fn status_interval(&self) -> Duration {
            Duration::from_secs(3600)
        }

        fn status_trigger(&self) -> &LevelTrigger {
            &self.trigger
        }

        async fn on_event(&self, attribute: &str, _value: AttributeValue) {
            self.seen.lock().unwrap().push(attribute.to_string());
        }

        fn get_status(&self) -> DeviceStatus {
            DeviceStatus::Base(BaseStatus {
                mode: Some("disarmed".to_string()),
                siren: None,
            })
        }

        async fn mqtt_control(&self, _payload: &str) {}
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_dispatches_only_own_events() {
        let arlo = Arc::new(LocalArloDevice::base("Home Base", vec![]));
        let device = RecordingDevice::new(arlo.clone());
        let runner = tokio::spawn(run_event_loop(device.clone()));
        wait_for(|| arlo.callback_count() == 1).await;

        arlo.emit("activeMode", "armed");
        arlo.emit_from("some-other-device", "activeMode", "away");
        arlo.emit("motionDetected", true);

        wait_for(|| device.seen.lock().unwrap().len() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(device.seen.lock().unwrap().len(), 2);
        runner.abort();
    }

    #[tokio::test]
    async fn test_status_stream_reads_latest_status() {
        let arlo = Arc::new(LocalArloDevice::base("Home Base", vec![]));
        let device: Arc<dyn Device> = RecordingDevice::new(arlo);
        let mut statuses = Box::pin(status_stream(device.clone()));

        device.status_trigger().set();
        device.status_trigger().set();

        let (name, status) = statuses.next().await.unwrap();
        assert_eq!(name.as_str(), "home_base");
        assert!(matches!(status, DeviceStatus::Base(_)));

        let pending = tokio::time::timeout(Duration::from_millis(20), statuses.next()).await;
        assert!(pending.is_err(), "collapsed triggers yield one status");
    }

    #[tokio::test]
    async fn test_periodic_trigger_fires_without_events() {
        let arlo = Arc::new(LocalArloDevice::base("Home Base", vec![]));
        let device = RecordingDevice::new(arlo);
        let timer = tokio::spawn(periodic_status_trigger(device.clone()));

        tokio::time::timeout(Duration::from_secs(1), device.status_trigger().wait())
            .await
            .expect("first tick triggers status immediately");
        timer.abort();
    }
}
