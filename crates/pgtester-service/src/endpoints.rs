use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown endpoint: {0}")]
pub struct EndpointParseError(pub String);

/// One of the three probes the dashboard knows how to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointId {
    Conn,
    Cursor,
    Info,
}

impl EndpointId {
    pub const ALL: [EndpointId; 3] = [EndpointId::Conn, EndpointId::Cursor, EndpointId::Info];

    /// Value sent as the `path` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointId::Conn => "conn",
            EndpointId::Cursor => "cursor",
            EndpointId::Info => "info",
        }
    }

    pub fn descriptor(self) -> &'static EndpointDescriptor {
        match self {
            EndpointId::Conn => &ENDPOINTS[0],
            EndpointId::Cursor => &ENDPOINTS[1],
            EndpointId::Info => &ENDPOINTS[2],
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EndpointId {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conn" => Ok(EndpointId::Conn),
            "cursor" => Ok(EndpointId::Cursor),
            "info" => Ok(EndpointId::Info),
            other => Err(EndpointParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointDescriptor {
    pub id: EndpointId,
    pub label: &'static str,
    pub icon: &'static str,
}

pub const ENDPOINTS: [EndpointDescriptor; 3] = [
    EndpointDescriptor {
        id: EndpointId::Conn,
        label: "Connection Object",
        icon: "Database",
    },
    EndpointDescriptor {
        id: EndpointId::Cursor,
        label: "Cursor Object",
        icon: "Terminal",
    },
    EndpointDescriptor {
        id: EndpointId::Info,
        label: "Environment Info",
        icon: "Info",
    },
];
