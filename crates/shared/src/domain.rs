use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Name logged for datagrams whose source address is not in the device table.
/// Such datagrams are never matched against triggers or control signals, so a
/// device or trigger named this way still cannot fire for them.
pub const UNKNOWN_DEVICE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub ip: IpAddr,
}

impl Device {
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cue {
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_actions: Option<Vec<Action>>,
}

impl Cue {
    /// The action list a firing should run given its post-increment fire count.
    ///
    /// Only `udp_message` cues that carry an alternate list can select it, and
    /// only when the count lands exactly on the trigger threshold.
    pub fn select_actions(&self, fire_count: u32) -> ActionSelection<'_> {
        match (&self.trigger, &self.alternate_actions) {
            (Trigger::UdpMessage(trigger), Some(alternate)) if fire_count == trigger.count => {
                ActionSelection::Alternate(alternate)
            }
            _ => ActionSelection::Primary(&self.actions),
        }
    }

    pub fn message_trigger(&self) -> Option<&MessageTrigger> {
        match &self.trigger {
            Trigger::UdpMessage(trigger) => Some(trigger),
            _ => None,
        }
    }

    pub fn is_startup(&self) -> bool {
        matches!(self.trigger, Trigger::StartupComplete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionSelection<'a> {
    Primary(&'a [Action]),
    Alternate(&'a [Action]),
}

impl<'a> ActionSelection<'a> {
    pub fn actions(&self) -> &'a [Action] {
        match self {
            Self::Primary(actions) | Self::Alternate(actions) => actions,
        }
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self, Self::Alternate(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    StartupComplete,
    UdpMessage(MessageTrigger),
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTrigger {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from_device: String,
    #[serde(default)]
    pub delay_ms: u64,
    /// Fire count at which the alternate action list is used instead.
    #[serde(default = "default_count")]
    pub count: u32,
}

impl MessageTrigger {
    pub fn matches(&self, payload: &str, sender_name: &str) -> bool {
        self.message == payload && self.from_device == sender_name
    }
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    SendUdp(SendUdpAction),
    #[serde(other)]
    Unsupported,
}

impl Action {
    pub fn send_udp(
        message: impl Into<String>,
        delay_ms: u64,
        destination: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::SendUdp(SendUdpAction {
            message: message.into(),
            delay_ms,
            destination: destination.into_iter().map(Into::into).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendUdpAction {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub destination: Vec<String>,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
