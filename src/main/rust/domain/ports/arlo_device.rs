use crate::domain::errors::Result;
use crate::domain::value_objects::{AttributeEvent, SirenArgs};

/// Callback registered with the SDK; invoked from SDK-owned threads
pub type AttributeCallback = Box<dyn Fn(AttributeEvent) + Send + Sync>;

/// Port for a device object owned by the external cloud SDK.
///
/// All methods are synchronous and may block on network I/O; async callers
/// route them through the blocking worker pool.
pub trait ArloDevice: Send + Sync {
    /// Stable SDK identifier, reported as the source of attribute events
    fn device_id(&self) -> &str;

    fn display_name(&self) -> &str;

    fn is_unavailable(&self) -> bool;

    fn battery_level(&self) -> Option<u8>;

    fn mode(&self) -> Option<String>;

    fn available_modes(&self) -> Vec<String>;

    fn set_mode(&self, mode: &str) -> Result<()>;

    fn siren_state(&self) -> Option<String>;

    fn siren_on(&self, args: Option<&SirenArgs>) -> Result<()>;

    fn siren_off(&self) -> Result<()>;

    /// Ask the cloud for a live stream; `None` when the request was refused
    fn get_stream(&self) -> Option<String>;

    fn request_snapshot(&self) -> Result<()>;

    /// Register `callback` for `attribute`; `"*"` selects every attribute
    fn add_attr_callback(&self, attribute: &str, callback: AttributeCallback);
}
