use std::{collections::HashMap, sync::Arc, time::Duration};

use shared::domain::{Action, Cue, SendUdpAction, Trigger};
use tokio::sync::Mutex;
use tracing::{debug, info};
use transport::Transport;

use crate::registry::DeviceRegistry;

/// Ordered cue definitions, fixed once the show is loaded.
#[derive(Debug, Clone, Default)]
pub struct CueTable {
    cues: Vec<Arc<Cue>>,
}

impl CueTable {
    pub fn new(cues: impl IntoIterator<Item = Cue>) -> Self {
        Self {
            cues: cues.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cue>> {
        self.cues.iter()
    }

    pub fn startup_cues(&self) -> impl Iterator<Item = &Arc<Cue>> {
        self.cues.iter().filter(|cue| cue.is_startup())
    }

    /// `udp_message` cues whose trigger matches the datagram, in table order.
    pub fn matching<'a>(
        &'a self,
        payload: &'a str,
        sender_name: &'a str,
    ) -> impl Iterator<Item = &'a Arc<Cue>> + 'a {
        self.cues.iter().filter(move |cue| {
            cue.message_trigger()
                .is_some_and(|trigger| trigger.matches(payload, sender_name))
        })
    }
}

/// Per-cue match counts shared by every in-flight firing.
#[derive(Debug, Default)]
pub struct FireCounters {
    counts: Mutex<HashMap<String, u32>>,
}

impl FireCounters {
    /// Returns the post-increment count.
    pub async fn increment(&self, cue_name: &str) -> u32 {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(cue_name.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub async fn reset(&self, cue_name: &str) {
        self.counts.lock().await.insert(cue_name.to_string(), 0);
    }

    pub async fn get(&self, cue_name: &str) -> u32 {
        self.counts
            .lock()
            .await
            .get(cue_name)
            .copied()
            .unwrap_or_default()
    }
}

/// One matched cue together with the fire count captured at match time.
#[derive(Debug, Clone)]
pub struct Firing {
    pub cue: Arc<Cue>,
    pub fire_count: u32,
}

/// Executes action lists against the device table.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    transport: Arc<dyn Transport>,
    send_port: u16,
}

impl Dispatcher {
    pub fn new(registry: Arc<DeviceRegistry>, transport: Arc<dyn Transport>, send_port: u16) -> Self {
        Self {
            registry,
            transport,
            send_port,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn send_port(&self) -> u16 {
        self.send_port
    }

    /// Runs each action in order; an action's delay elapses before its sends.
    pub async fn run_actions(&self, actions: &[Action]) {
        for action in actions {
            match action {
                Action::SendUdp(send) => self.send_udp(send).await,
                Action::Unsupported => debug!("skipping unsupported action"),
            }
        }
    }

    async fn send_udp(&self, action: &SendUdpAction) {
        if action.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(action.delay_ms)).await;
        }
        for name in &action.destination {
            match self.registry.endpoint(name, self.send_port) {
                Some(destination) => self.transport.send(&action.message, destination).await,
                None => debug!(device = %name, "skipping unknown destination"),
            }
        }
    }

    /// Carries out one matched firing: trigger delay, primary/alternate
    /// choice, then the chosen actions.
    pub async fn execute(&self, counters: &FireCounters, firing: Firing) {
        let Firing { cue, fire_count } = firing;
        let delay_ms = match &cue.trigger {
            Trigger::UdpMessage(trigger) => trigger.delay_ms,
            _ => 0,
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let selection = cue.select_actions(fire_count);
        if selection.is_alternate() {
            counters.reset(&cue.name).await;
        }
        info!(
            cue = %cue.name,
            fire_count,
            alternate = selection.is_alternate(),
            "running cue actions"
        );
        self.run_actions(selection.actions()).await;
    }
}

#[cfg(test)]
#[path = "tests/cues_tests.rs"]
mod tests;
