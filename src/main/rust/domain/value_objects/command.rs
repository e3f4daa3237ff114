use std::str::FromStr;

use serde::Deserialize;

use crate::domain::errors::{DomainError, Result};

/// Plain-token command addressed to a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    Start,
    Stop,
    Snapshot,
}

impl FromStr for CameraCommand {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "START" => Ok(Self::Start),
            "STOP" => Ok(Self::Stop),
            "SNAPSHOT" => Ok(Self::Snapshot),
            other => Err(DomainError::InvalidCommand(other.to_string())),
        }
    }
}

/// Keyword arguments for a parameterized siren activation
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SirenArgs {
    pub duration: Option<u32>,
    pub volume: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SirenCommand {
    On,
    Off,
    OnWith(SirenArgs),
}

/// One key of a structured base station command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseCommand {
    SetMode(String),
    Siren(SirenCommand),
    /// Recognized key whose value could not be used
    Rejected { key: &'static str, reason: String },
}

impl BaseCommand {
    /// Parse a JSON object of `{key: value}` commands.
    ///
    /// Unknown keys and unsupported siren tokens are skipped. A payload that is not
    /// a JSON object is an error.
    pub fn parse_all(payload: &str) -> Result<Vec<BaseCommand>> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| DomainError::InvalidCommand(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| DomainError::InvalidCommand("expected a JSON object".to_string()))?;

        let mut commands = Vec::new();
        for (key, value) in object {
            match key.as_str() {
                "mode" => commands.push(Self::parse_mode(value)),
                "siren" => {
                    if let Some(command) = Self::parse_siren(value) {
                        commands.push(command);
                    }
                }
                _ => {}
            }
        }
        Ok(commands)
    }

    fn parse_mode(value: &serde_json::Value) -> BaseCommand {
        match value.as_str() {
            Some(mode) => Self::SetMode(mode.to_lowercase()),
            None => Self::Rejected {
                key: "mode",
                reason: format!("expected a string, got {}", value),
            },
        }
    }

    fn parse_siren(value: &serde_json::Value) -> Option<BaseCommand> {
        match value {
            serde_json::Value::String(s) if s == "on" => Some(Self::Siren(SirenCommand::On)),
            serde_json::Value::String(s) if s == "off" => Some(Self::Siren(SirenCommand::Off)),
            serde_json::Value::Object(_) => {
                Some(match SirenArgs::deserialize(value) {
                    Ok(args) => Self::Siren(SirenCommand::OnWith(args)),
                    Err(e) => Self::Rejected {
                        key: "siren",
                        reason: e.to_string(),
                    },
                })
            }
            _ => None,
        }
    }
}
