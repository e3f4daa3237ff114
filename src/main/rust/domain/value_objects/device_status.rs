use serde::{Deserialize, Serialize};

use super::CameraState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraStatus {
    pub battery: Option<u8>,
    pub state: Option<CameraState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseStatus {
    pub mode: Option<String>,
    pub siren: Option<String>,
}

/// Point-in-time status snapshot published on the status topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceStatus {
    Camera(CameraStatus),
    Base(BaseStatus),
    /// Devices without their own status report an empty object
    Empty {},
}

impl DeviceStatus {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
