use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{run_event_loop, Device, LevelTrigger};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::ArloDevice;
use crate::domain::value_objects::{
    AttributeValue, BaseCommand, BaseStatus, DeviceName, DeviceStatus, SirenCommand,
};

/// A base station. Holds no state of its own beyond the SDK object.
pub struct Base {
    name: DeviceName,
    arlo: Arc<dyn ArloDevice>,
    status_interval: Duration,
    status_trigger: LevelTrigger,
}

impl Base {
    pub fn new(arlo: Arc<dyn ArloDevice>, status_interval: Duration) -> Arc<Self> {
        let name = DeviceName::from_display_name(arlo.display_name());
        tracing::info!(base = %name, "Base added");
        Arc::new(Self {
            name,
            arlo,
            status_interval,
            status_trigger: LevelTrigger::new(),
        })
    }

    pub async fn run(self: Arc<Self>) {
        run_event_loop(self).await;
    }

    /// Run one command on the blocking pool and wait for it
    async fn execute(&self, command: BaseCommand) {
        let arlo = self.arlo.clone();
        let outcome = match command {
            BaseCommand::SetMode(mode) => {
                tokio::task::spawn_blocking(move || set_mode(arlo.as_ref(), &mode)).await
            }
            BaseCommand::Siren(siren) => {
                tokio::task::spawn_blocking(move || set_siren(arlo.as_ref(), &siren)).await
            }
            BaseCommand::Rejected { key, reason } => {
                tracing::warn!(base = %self.name, "Invalid {} ignored: {}", key, reason);
                return;
            }
        };

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(base = %self.name, "{}, ignored", e),
            Err(e) => tracing::warn!(base = %self.name, "Command task failed: {}", e),
        }
    }
}

fn set_mode(arlo: &dyn ArloDevice, mode: &str) -> Result<()> {
    let mode = mode.to_lowercase();
    if !arlo.available_modes().iter().any(|m| *m == mode) {
        return Err(DomainError::InvalidMode(mode));
    }
    arlo.set_mode(&mode)
}

fn set_siren(arlo: &dyn ArloDevice, siren: &SirenCommand) -> Result<()> {
    match siren {
        SirenCommand::On => arlo.siren_on(None),
        SirenCommand::Off => arlo.siren_off(),
        SirenCommand::OnWith(args) => arlo.siren_on(Some(args)),
    }
}

#[async_trait]
impl Device for Base {
    fn name(&self) -> &DeviceName {
        &self.name
    }

    fn arlo(&self) -> &Arc<dyn ArloDevice> {
        &self.arlo
    }

    fn status_interval(&self) -> Duration {
        self.status_interval
    }

    fn status_trigger(&self) -> &LevelTrigger {
        &self.status_trigger
    }

    async fn on_event(&self, attribute: &str, value: AttributeValue) {
        if attribute == "activeMode" {
            self.status_trigger.set();
            tracing::info!(base = %self.name, "mode: {:?}", value);
        }
    }

    fn get_status(&self) -> DeviceStatus {
        DeviceStatus::Base(BaseStatus {
            mode: self.arlo.mode(),
            siren: self.arlo.siren_state(),
        })
    }

    async fn mqtt_control(&self, payload: &str) {
        let commands = match BaseCommand::parse_all(payload) {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!(base = %self.name, "Invalid data for control: {}", e);
                return;
            }
        };

        futures::future::join_all(commands.into_iter().map(|c| self.execute(c))).await;
    }
}
