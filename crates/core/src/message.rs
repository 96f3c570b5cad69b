// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messaging bus entities: directed messages, broadcasts, and acknowledgement.

use crate::car::WorkItemId;
use crate::engine::EngineId;
use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a message.
    pub struct MessageId;
}

crate::define_id! {
    /// Identifier grouping messages into a conversation.
    pub struct ThreadId;
}

/// Recipient token meaning "every currently-registered engine plus `human`".
pub const BROADCAST_RECIPIENT: &str = "*";
/// Special recipient representing the human operator.
pub const HUMAN_RECIPIENT: &str = "human";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Normal,
    Urgent,
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagePriority::Normal => write!(f, "normal"),
            MessagePriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// A directed (or broadcast, when `to_agent == "*"`) message on the bus.
///
/// Immutable after send; acknowledgement is tracked separately (directly on
/// `acknowledged` for a direct message, via [`BroadcastAck`] rows for a
/// broadcast) rather than by mutating this struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from_agent: String,
    pub to_agent: String,
    pub subject: String,
    pub body: String,
    pub priority: MessagePriority,
    pub thread_id: Option<ThreadId>,
    pub car_id: Option<WorkItemId>,
    pub acknowledged: bool,
    pub created_at: i64,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.to_agent == BROADCAST_RECIPIENT
    }
}

/// Per-recipient acknowledgement of a broadcast message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastAck {
    pub message_id: MessageId,
    pub recipient: String,
}

/// Structured subjects used by the Supervisor Signals protocol (§4.9).
/// Bodies remain free-text rationale; this is only the `subject` discriminant
/// a receiving engine inspects to decide how to react.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SupervisorSignal {
    Pause,
    Resume,
    Abort { car_id: WorkItemId, hard: bool },
}

impl SupervisorSignal {
    /// The literal `subject` string a [`Message`] carrying this signal uses.
    pub fn subject(&self) -> &'static str {
        match self {
            SupervisorSignal::Pause => "pause",
            SupervisorSignal::Resume => "resume",
            SupervisorSignal::Abort { .. } => "abort",
        }
    }

    /// Parse a signal back out of a message's subject/body, if it encodes one.
    /// `abort` messages carry their car id and hard flag in the body as
    /// `car_id=<id> hard=<bool>`.
    pub fn parse(subject: &str, body: &str) -> Option<Self> {
        match subject {
            "pause" => Some(SupervisorSignal::Pause),
            "resume" => Some(SupervisorSignal::Resume),
            "abort" => {
                let mut car_id = None;
                let mut hard = false;
                for token in body.split_whitespace() {
                    if let Some(v) = token.strip_prefix("car_id=") {
                        car_id = Some(WorkItemId::new(v));
                    } else if let Some(v) = token.strip_prefix("hard=") {
                        hard = v == "true";
                    }
                }
                car_id.map(|car_id| SupervisorSignal::Abort { car_id, hard })
            }
            _ => None,
        }
    }

    pub fn body(&self) -> String {
        match self {
            SupervisorSignal::Pause | SupervisorSignal::Resume => String::new(),
            SupervisorSignal::Abort { car_id, hard } => {
                format!("car_id={car_id} hard={hard}")
            }
        }
    }
}

impl EngineId {
    /// Whether a message addressed to `to_agent` is delivered to this engine:
    /// either a direct match or the broadcast recipient.
    pub fn receives(&self, to_agent: &str) -> bool {
        to_agent == BROADCAST_RECIPIENT || to_agent == self.as_str()
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
