use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{ArloDevice, AttributeCallback};
use crate::domain::value_objects::{AttributeEvent, AttributeValue, SirenArgs};

const DEFAULT_MODE: &str = "disarmed";
const SIREN_ON: &str = "on";
const SIREN_OFF: &str = "off";

#[derive(Default)]
struct DeviceState {
    battery: Option<u8>,
    mode: Option<String>,
    siren: Option<String>,
    last_siren_args: Option<SirenArgs>,
    snapshot: Option<Vec<u8>>,
}

/// In-process device implementing the SDK port.
///
/// Attribute changes are delivered synchronously to registered callbacks on
/// the calling thread, the way the cloud SDK delivers them from its own
/// threads.
pub struct LocalArloDevice {
    device_id: String,
    display_name: String,
    modes: Vec<String>,
    stream_url: Option<String>,
    unavailable: AtomicBool,
    state: Mutex<DeviceState>,
    callbacks: Mutex<Vec<(String, AttributeCallback)>>,
    stream_requests: AtomicUsize,
    snapshot_requests: AtomicUsize,
}

impl LocalArloDevice {
    /// A camera granting `stream_url` on every stream request
    pub fn camera(display_name: &str, stream_url: Option<String>) -> Self {
        let device = Self::new(display_name, Vec::new(), stream_url);
        device.lock_state().battery = Some(100);
        device
    }

    /// A base station supporting `modes`, starting disarmed with the siren off
    pub fn base(display_name: &str, modes: Vec<String>) -> Self {
        let device = Self::new(display_name, modes, None);
        {
            let mut state = device.lock_state();
            state.mode = Some(DEFAULT_MODE.to_string());
            state.siren = Some(SIREN_OFF.to_string());
        }
        device
    }

    fn new(display_name: &str, modes: Vec<String>, stream_url: Option<String>) -> Self {
        Self {
            device_id: format!("local:{}", display_name),
            display_name: display_name.to_string(),
            modes,
            stream_url,
            unavailable: AtomicBool::new(false),
            state: Mutex::new(DeviceState::default()),
            callbacks: Mutex::new(Vec::new()),
            stream_requests: AtomicUsize::new(0),
            snapshot_requests: AtomicUsize::new(0),
        }
    }

    /// Deliver an attribute change from this device
    pub fn emit(&self, attribute: &str, value: impl Into<AttributeValue>) {
        self.emit_from(&self.device_id, attribute, value);
    }

    /// Deliver an attribute change claiming to come from `source`
    pub fn emit_from(&self, source: &str, attribute: &str, value: impl Into<AttributeValue>) {
        let event = AttributeEvent::new(source, attribute, value);
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (filter, callback) in callbacks.iter() {
            if filter == "*" || filter == attribute {
                callback(event.clone());
            }
        }
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forget every registered callback, ending the consumers' event streams
    pub fn drop_callbacks(&self) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_battery_level(&self, level: u8) {
        self.lock_state().battery = Some(level);
        self.emit("batteryLevel", AttributeValue::Number(i64::from(level)));
    }

    /// Image delivered as `presignedLastImageData` on each snapshot request
    pub fn set_snapshot_image(&self, image: Vec<u8>) {
        self.lock_state().snapshot = Some(image);
    }

    pub fn last_siren_args(&self) -> Option<SirenArgs> {
        self.lock_state().last_siren_args.clone()
    }

    pub fn stream_requests(&self) -> usize {
        self.stream_requests.load(Ordering::SeqCst)
    }

    pub fn snapshot_requests(&self) -> usize {
        self.snapshot_requests.load(Ordering::SeqCst)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_siren(&self, siren: &str, args: Option<SirenArgs>) {
        {
            let mut state = self.lock_state();
            state.siren = Some(siren.to_string());
            state.last_siren_args = args;
        }
        self.emit("sirenState", siren);
    }
}

impl ArloDevice for LocalArloDevice {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
    }

    fn battery_level(&self) -> Option<u8> {
        self.lock_state().battery
    }

    fn mode(&self) -> Option<String> {
        self.lock_state().mode.clone()
    }

    fn available_modes(&self) -> Vec<String> {
        self.modes.clone()
    }

    fn set_mode(&self, mode: &str) -> Result<()> {
        if !self.modes.iter().any(|m| m == mode) {
            return Err(DomainError::InvalidMode(mode.to_string()));
        }
        self.lock_state().mode = Some(mode.to_string());
        self.emit("activeMode", mode);
        Ok(())
    }

    fn siren_state(&self) -> Option<String> {
        self.lock_state().siren.clone()
    }

    fn siren_on(&self, args: Option<&SirenArgs>) -> Result<()> {
        self.set_siren(SIREN_ON, args.cloned());
        Ok(())
    }

    fn siren_off(&self) -> Result<()> {
        self.set_siren(SIREN_OFF, None);
        Ok(())
    }

    fn get_stream(&self) -> Option<String> {
        self.stream_requests.fetch_add(1, Ordering::SeqCst);
        self.stream_url.clone()
    }

    fn request_snapshot(&self) -> Result<()> {
        self.snapshot_requests.fetch_add(1, Ordering::SeqCst);
        let image = self.lock_state().snapshot.clone();
        match image {
            Some(image) => {
                self.emit("presignedLastImageData", image);
                Ok(())
            }
            None => Err(DomainError::SdkCallFailed(format!(
                "{} has no snapshot",
                self.display_name
            ))),
        }
    }

    fn add_attr_callback(&self, attribute: &str, callback: AttributeCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((attribute.to_string(), callback));
    }
}
