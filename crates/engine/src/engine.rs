use std::{net::IpAddr, sync::Arc};

use shared::{
    domain::UNKNOWN_DEVICE,
    protocol::{ControlSignal, SignalBindings},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use transport::Transport;

use crate::{
    cues::{CueTable, Dispatcher, FireCounters, Firing},
    registry::DeviceRegistry,
    scheduler::KeepAliveScheduler,
    show::Show,
    spawn_supervised,
};

/// The cue-orchestration core: reacts to inbound datagrams and owns the
/// keep-alive schedulers of the managed devices.
pub struct Engine {
    cues: Arc<CueTable>,
    counters: Arc<FireCounters>,
    dispatcher: Dispatcher,
    signals: SignalBindings,
    schedulers: Vec<KeepAliveScheduler>,
}

impl Engine {
    /// Builds one scheduler per managed device that resolves in the registry.
    pub fn new(show: Show, transport: Arc<dyn Transport>, send_port: u16) -> Self {
        let registry = Arc::new(show.registry);
        let mut schedulers = Vec::new();
        for name in &show.keepalive.devices {
            match registry.endpoint(name, send_port) {
                Some(endpoint) => {
                    info!(device = %name, %endpoint, "keep-alive scheduler ready");
                    schedulers.push(KeepAliveScheduler::new(
                        name.clone(),
                        endpoint,
                        transport.clone(),
                        show.keepalive.policy.clone(),
                    ));
                }
                None => warn!(device = %name, "keep-alive device not found in device table"),
            }
        }
        Self::from_parts(
            registry,
            Arc::new(show.cues),
            transport,
            send_port,
            show.signals,
            schedulers,
        )
    }

    pub fn from_parts(
        registry: Arc<DeviceRegistry>,
        cues: Arc<CueTable>,
        transport: Arc<dyn Transport>,
        send_port: u16,
        signals: SignalBindings,
        schedulers: Vec<KeepAliveScheduler>,
    ) -> Self {
        Self {
            cues,
            counters: Arc::new(FireCounters::default()),
            dispatcher: Dispatcher::new(registry, transport, send_port),
            signals,
            schedulers,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        self.dispatcher.registry()
    }

    pub fn counters(&self) -> &FireCounters {
        &self.counters
    }

    pub fn schedulers(&self) -> &[KeepAliveScheduler] {
        &self.schedulers
    }

    pub fn scheduler(&self, device: &str) -> Option<&KeepAliveScheduler> {
        self.schedulers.iter().find(|s| s.device() == device)
    }

    /// Runs every startup cue's primary actions to completion, in table order.
    pub async fn run_startup_cues(&self) {
        for cue in self.cues.startup_cues() {
            info!(cue = %cue.name, "startup cue triggered");
            self.dispatcher.run_actions(&cue.actions).await;
        }
    }

    /// Enables every scheduler and kicks off its first tick.
    pub async fn start_schedulers(&self) -> Vec<JoinHandle<()>> {
        let mut chains = Vec::with_capacity(self.schedulers.len());
        for scheduler in &self.schedulers {
            scheduler.set_enabled(true).await;
            chains.push(scheduler.request_tick());
        }
        chains
    }

    /// Handles one inbound datagram. Matching cues run as detached tasks;
    /// their handles are returned for callers that want to wait on them.
    /// Datagrams from addresses outside the device table are logged only.
    pub async fn on_message(&self, payload: &str, sender: IpAddr) -> Vec<JoinHandle<()>> {
        let Some(sender_name) = self.registry().resolve_sender(sender).map(str::to_string) else {
            info!(device = UNKNOWN_DEVICE, addr = %sender, payload, "datagram received");
            return Vec::new();
        };
        info!(device = %sender_name, addr = %sender, payload, "datagram received");

        let mut firings = Vec::new();
        for cue in self.cues.matching(payload, &sender_name) {
            let fire_count = self.counters.increment(&cue.name).await;
            info!(cue = %cue.name, fire_count, "cue triggered");
            let dispatcher = self.dispatcher.clone();
            let counters = self.counters.clone();
            let firing = Firing {
                cue: cue.clone(),
                fire_count,
            };
            firings.push(spawn_supervised(format!("cue {}", cue.name), async move {
                dispatcher.execute(&counters, firing).await;
            }));
        }

        for signal in self.signals.classify(payload, &sender_name) {
            self.apply_signal(signal, &sender_name).await;
        }
        firings
    }

    async fn apply_signal(&self, signal: ControlSignal, sender_name: &str) {
        match signal {
            ControlSignal::SequenceEnded => {
                if let Some(scheduler) = self.scheduler(sender_name) {
                    info!(device = %sender_name, "sequence ended; advancing keep-alive");
                    scheduler.stop_clip().await;
                    scheduler.request_tick();
                }
            }
            ControlSignal::EndOfProgram => {
                info!(sender = %sender_name, "end of program; disabling keep-alive");
                for scheduler in &self.schedulers {
                    scheduler.set_enabled(false).await;
                }
            }
            ControlSignal::ProgramAdvance => {
                info!(sender = %sender_name, "program advance; resuming keep-alive");
                for scheduler in &self.schedulers {
                    scheduler.set_enabled(true).await;
                    scheduler.request_tick();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
