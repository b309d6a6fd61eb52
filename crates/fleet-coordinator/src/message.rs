//! Wire messages exchanged with workers over their channel.
//!
//! Inbound messages are JSON objects tagged by `type`:
//!
//! ```text
//! {"type":"register","hostInfo":{"hostname":"rig-1","hardwareId":"ab12"},"group":"rack-a"}
//! {"type":"statusUpdate","metrics":{"throughput":52.5,"temperature":71.0,"power":180.0,"accepted":120,"rejected":2}}
//! {"type":"unitFound","accepted":true}
//! {"type":"heartbeat"}
//! ```
//!
//! `hostInfo`, `metrics`, and `accepted` are required; a message missing
//! one is malformed. Outbound replies and commands use the same `type` tag.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fleet_registry::{Registration, WorkerUpdate};
use fleet_state::{HostInfo, WorkerId};

use crate::error::{CoordinatorError, CoordinatorResult};

/// A message sent by a worker.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerMessage {
    Register(RegisterPayload),
    StatusUpdate(StatusPayload),
    UnitFound(UnitFoundPayload),
    Heartbeat,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    pub host_info: HostInfo,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default)]
    pub name: Option<String>,
    pub metrics: MetricsPayload,
}

/// Telemetry. Counter totals are cumulative on the worker side.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsPayload {
    #[serde(default)]
    pub throughput: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub accepted: Option<u64>,
    #[serde(default)]
    pub rejected: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnitFoundPayload {
    pub accepted: bool,
}

impl WorkerMessage {
    /// Parse and validate one inbound text frame.
    pub fn parse(text: &str) -> CoordinatorResult<Self> {
        let message: Self = serde_json::from_str(text)
            .map_err(|e| CoordinatorError::MalformedMessage(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::StatusUpdate(_) => "statusUpdate",
            Self::UnitFound(_) => "unitFound",
            Self::Heartbeat => "heartbeat",
        }
    }

    fn validate(&self) -> CoordinatorResult<()> {
        match self {
            Self::StatusUpdate(StatusPayload { metrics, .. }) => {
                non_negative("throughput", metrics.throughput)?;
                non_negative("power", metrics.power)?;
                if let Some(t) = metrics.temperature
                    && !t.is_finite()
                {
                    return Err(CoordinatorError::MalformedMessage(
                        "temperature must be a finite number".into(),
                    ));
                }
                Ok(())
            }
            Self::Register(register) => {
                if register.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                    return Err(CoordinatorError::MalformedMessage(
                        "name must not be empty".into(),
                    ));
                }
                Ok(())
            }
            Self::UnitFound(_) | Self::Heartbeat => Ok(()),
        }
    }
}

fn non_negative(field: &str, value: Option<f64>) -> CoordinatorResult<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(CoordinatorError::MalformedMessage(format!(
            "{field} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

impl RegisterPayload {
    pub(crate) fn into_registration(self, source_address: Option<String>) -> Registration {
        Registration {
            host_info: self.host_info,
            source_address,
            display_name: self.name,
            group: self.group,
            labels: self.labels,
        }
    }
}

impl From<&StatusPayload> for WorkerUpdate {
    fn from(status: &StatusPayload) -> Self {
        let metrics = &status.metrics;
        WorkerUpdate {
            display_name: status.name.clone(),
            throughput: metrics.throughput,
            temperature: metrics.temperature,
            power: metrics.power,
            reported_accepted: metrics.accepted,
            reported_rejected: metrics.rejected,
            ..Default::default()
        }
    }
}

/// A command pushed to one or more workers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerCommand {
    Start {
        #[serde(default)]
        params: BTreeMap<String, serde_json::Value>,
    },
    Stop,
    Configure {
        #[serde(default)]
        settings: BTreeMap<String, serde_json::Value>,
    },
}

impl WorkerCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop => "stop",
            Self::Configure { .. } => "configure",
        }
    }
}

/// Direct reply to an inbound message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reply {
    Registered {
        #[serde(rename = "workerId")]
        worker_id: WorkerId,
    },
    Error {
        message: String,
    },
}
