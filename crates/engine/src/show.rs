use std::{fs, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::{
    domain::{Action, Cue, Device, Trigger},
    error::ShowError,
    protocol::SignalBindings,
};
use tracing::{info, warn};

use crate::{cues::CueTable, registry::DeviceRegistry, scheduler::SchedulerPolicy};

/// Managed devices and the policy their schedulers share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    pub devices: Vec<String>,
    #[serde(flatten)]
    pub policy: SchedulerPolicy,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            devices: vec!["BS1".into(), "BS2".into()],
            policy: SchedulerPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShowFile {
    devices: Map<String, Value>,
    cues: Vec<Value>,
    keepalive: KeepAliveConfig,
    signals: SignalBindings,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    ip: String,
}

/// Everything the engine needs from the show file.
#[derive(Debug, Clone, Default)]
pub struct Show {
    pub registry: DeviceRegistry,
    pub cues: CueTable,
    pub keepalive: KeepAliveConfig,
    pub signals: SignalBindings,
    /// Entries dropped while loading, one line each.
    pub skipped: Vec<String>,
}

impl Show {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShowError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ShowError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let show = Self::from_json_str(&raw).map_err(|source| ShowError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            path = %path.display(),
            devices = show.registry.len(),
            cues = show.cues.len(),
            "show loaded"
        );
        Ok(show)
    }

    /// Malformed device or cue entries are skipped rather than rejected, and
    /// wrongly-typed cue fields fall back to their defaults. Only a document
    /// that is not a JSON object fails.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let file: ShowFile = serde_json::from_str(raw)?;
        let mut skipped = Vec::new();

        let mut devices = Vec::with_capacity(file.devices.len());
        for (name, entry) in file.devices {
            let ip = serde_json::from_value::<DeviceEntry>(entry)
                .map_err(|e| e.to_string())
                .and_then(|entry| entry.ip.trim().parse::<IpAddr>().map_err(|e| e.to_string()));
            match ip {
                Ok(ip) => devices.push(Device::new(name, ip)),
                Err(error) => {
                    warn!(device = %name, %error, "skipping device");
                    skipped.push(format!("device '{name}': {error}"));
                }
            }
        }

        let mut cues = Vec::with_capacity(file.cues.len());
        for (index, mut entry) in file.cues.into_iter().enumerate() {
            default_bad_fields(index, &mut entry, &mut skipped);
            match serde_json::from_value::<Cue>(entry) {
                Ok(cue) if cue.trigger == Trigger::Unsupported => {
                    warn!(cue = %cue.name, "cue has an unsupported trigger type and will never fire");
                    skipped.push(format!("cue '{}': unsupported trigger type", cue.name));
                    cues.push(cue);
                }
                Ok(cue) => cues.push(cue),
                Err(error) => {
                    warn!(index, %error, "skipping cue");
                    skipped.push(format!("cue #{index}: {error}"));
                }
            }
        }

        Ok(Self {
            registry: DeviceRegistry::new(devices),
            cues: CueTable::new(cues),
            keepalive: file.keepalive,
            signals: file.signals,
            skipped,
        })
    }

    /// Destinations and trigger senders that name no registered device.
    /// Runtime skips these silently; this is for operators.
    pub fn unresolved_references(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for cue in self.cues.iter() {
            if let Some(trigger) = cue.message_trigger() {
                if !self.registry.contains(&trigger.from_device) {
                    problems.push(format!(
                        "cue '{}': trigger sender '{}' is not a device",
                        cue.name, trigger.from_device
                    ));
                }
            }
            let lists = std::iter::once(&cue.actions).chain(cue.alternate_actions.iter());
            for action in lists.flatten() {
                if let Action::SendUdp(send) = action {
                    for name in &send.destination {
                        if !self.registry.contains(name) {
                            problems.push(format!(
                                "cue '{}': destination '{name}' is not a device",
                                cue.name
                            ));
                        }
                    }
                }
            }
        }
        for name in &self.keepalive.devices {
            if !self.registry.contains(name) {
                problems.push(format!("keep-alive device '{name}' is not a device"));
            }
        }
        problems
    }
}

#[derive(Clone, Copy)]
enum FieldKind {
    Text,
    Millis,
    Count,
    Names,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Millis => value.is_u64(),
            Self::Count => value.as_u64().is_some_and(|n| u32::try_from(n).is_ok()),
            Self::Names => value.is_array(),
        }
    }
}

const TRIGGER_FIELDS: [(&str, FieldKind); 4] = [
    ("message", FieldKind::Text),
    ("from_device", FieldKind::Text),
    ("delay_ms", FieldKind::Millis),
    ("count", FieldKind::Count),
];

const ACTION_FIELDS: [(&str, FieldKind); 3] = [
    ("message", FieldKind::Text),
    ("delay_ms", FieldKind::Millis),
    ("destination", FieldKind::Names),
];

/// Drops wrongly-typed cue fields so they load with their defaults, and
/// non-string destination names. Each drop is recorded in `notes`.
fn default_bad_fields(index: usize, entry: &mut Value, notes: &mut Vec<String>) {
    let Some(cue) = entry.as_object_mut() else {
        return;
    };
    let label = match cue.get("name").and_then(Value::as_str) {
        Some(name) => format!("cue '{name}'"),
        None => format!("cue #{index}"),
    };

    if let Some(trigger) = cue.get_mut("trigger").and_then(Value::as_object_mut) {
        default_fields(trigger, &TRIGGER_FIELDS, &format!("{label}: trigger"), notes);
    }

    for list in ["actions", "alternate_actions"] {
        if cue.get(list).is_some_and(|v| !v.is_array() && !v.is_null()) {
            cue.remove(list);
            record(notes, &label, list, "is not a list");
            continue;
        }
        let Some(Value::Array(actions)) = cue.get_mut(list) else {
            continue;
        };
        for (position, action) in actions.iter_mut().enumerate() {
            let Some(action) = action.as_object_mut() else {
                continue;
            };
            let context = format!("{label}: {list}[{position}]");
            default_fields(action, &ACTION_FIELDS, &context, notes);
            if let Some(Value::Array(names)) = action.get_mut("destination") {
                let before = names.len();
                names.retain(Value::is_string);
                if names.len() != before {
                    record(notes, &context, "destination", "has non-string names");
                }
            }
        }
    }
}

fn default_fields(
    object: &mut Map<String, Value>,
    fields: &[(&str, FieldKind)],
    context: &str,
    notes: &mut Vec<String>,
) {
    for &(field, kind) in fields {
        if object.get(field).is_some_and(|v| !kind.accepts(v)) {
            if let Some(value) = object.remove(field) {
                record(notes, context, field, &format!("has unusable value {value}"));
            }
        }
    }
}

fn record(notes: &mut Vec<String>, context: &str, field: &str, problem: &str) {
    warn!(%context, field, problem, "using default for cue field");
    notes.push(format!("{context}: {field} {problem}; using the default"));
}

#[cfg(test)]
#[path = "tests/show_tests.rs"]
mod tests;
