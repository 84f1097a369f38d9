use std::{net::SocketAddr, sync::Arc, time::Duration};

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::protocol::{play_dots_clip, DOTS_CLIP_FIRST, DOTS_CLIP_LAST, STOP_CLIPS};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};
use transport::Transport;

use crate::spawn_supervised;

pub const DEFAULT_IDLE_WAIT_MS: Span<u64> = Span {
    min: 30_000,
    max: 170_000,
};
pub const DEFAULT_BURST_LEN: Span<u32> = Span { min: 1, max: 10 };

/// How a scheduler moves from one clip of a burst to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstPacing {
    /// Emit the whole burst back to back, then idle, forever while enabled.
    #[default]
    Immediate,
    /// Emit one clip per tick; the device's end-of-sequence report asks for
    /// the next one.
    Acknowledged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerPolicy {
    pub pacing: BurstPacing,
    /// Half-open: `min <= wait < max`.
    pub idle_wait_ms: Span<u64>,
    /// Inclusive on both ends.
    pub burst_len: Span<u32>,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            pacing: BurstPacing::default(),
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            burst_len: DEFAULT_BURST_LEN,
        }
    }
}

impl SchedulerPolicy {
    fn sample_idle_wait(&self, rng: &mut StdRng) -> Duration {
        let Span { min, max } = self.idle_wait_ms;
        let millis = if max > min { rng.gen_range(min..max) } else { min };
        Duration::from_millis(millis)
    }

    fn sample_burst_len(&self, rng: &mut StdRng) -> u32 {
        let min = self.burst_len.min.max(1);
        let max = self.burst_len.max.max(min);
        rng.gen_range(min..=max)
    }
}

pub fn random_dots_command(rng: &mut impl Rng) -> String {
    play_dots_clip(rng.gen_range(DOTS_CLIP_FIRST..=DOTS_CLIP_LAST))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Emitted { command: String, remaining: u32 },
    Disabled,
}

struct SchedulerState {
    enabled: bool,
    clips_remaining: u32,
    chain_active: bool,
    tick_pending: bool,
    rng: StdRng,
}

struct Inner {
    device: String,
    endpoint: SocketAddr,
    transport: Arc<dyn Transport>,
    policy: SchedulerPolicy,
    state: Mutex<SchedulerState>,
}

/// Keeps one managed device busy with random filler clips while enabled.
///
/// Ticks run as a single chain per scheduler: a tick requested while a chain
/// is in flight is served by that chain before it parks. Sends happen with
/// the state lock held, so enable/disable never interleaves with an emission.
#[derive(Clone)]
pub struct KeepAliveScheduler {
    inner: Arc<Inner>,
}

impl KeepAliveScheduler {
    pub fn new(
        device: impl Into<String>,
        endpoint: SocketAddr,
        transport: Arc<dyn Transport>,
        policy: SchedulerPolicy,
    ) -> Self {
        Self::with_rng(device, endpoint, transport, policy, StdRng::from_entropy())
    }

    pub fn with_rng(
        device: impl Into<String>,
        endpoint: SocketAddr,
        transport: Arc<dyn Transport>,
        policy: SchedulerPolicy,
        rng: StdRng,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                device: device.into(),
                endpoint,
                transport,
                policy,
                state: Mutex::new(SchedulerState {
                    enabled: false,
                    clips_remaining: 0,
                    chain_active: false,
                    tick_pending: false,
                    rng,
                }),
            }),
        }
    }

    pub fn device(&self) -> &str {
        &self.inner.device
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.inner.endpoint
    }

    pub async fn is_enabled(&self) -> bool {
        self.inner.state.lock().await.enabled
    }

    pub async fn clips_remaining(&self) -> u32 {
        self.inner.state.lock().await.clips_remaining
    }

    /// Enabling never sends by itself. Disabling always sends a stop.
    pub async fn set_enabled(&self, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        state.enabled = enabled;
        info!(device = %self.inner.device, enabled, "keep-alive toggled");
        if !enabled {
            self.inner
                .transport
                .send(STOP_CLIPS, self.inner.endpoint)
                .await;
        }
    }

    pub async fn stop_clip(&self) {
        self.inner
            .transport
            .send(STOP_CLIPS, self.inner.endpoint)
            .await;
    }

    /// Starts a tick chain in the background, or marks one pending if a
    /// chain is already running.
    pub fn request_tick(&self) -> JoinHandle<()> {
        let scheduler = self.clone();
        spawn_supervised(format!("keep-alive {}", self.inner.device), async move {
            scheduler.drive().await;
        })
    }

    async fn drive(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if state.chain_active {
                state.tick_pending = true;
                debug!(device = %self.inner.device, "tick coalesced into running chain");
                return;
            }
            state.chain_active = true;
        }

        loop {
            let outcome = self.tick().await;
            let mut state = self.inner.state.lock().await;
            let continue_burst = matches!(outcome, TickOutcome::Emitted { .. })
                && state.enabled
                && self.inner.policy.pacing == BurstPacing::Immediate;
            if continue_burst {
                continue;
            }
            if state.tick_pending {
                state.tick_pending = false;
                continue;
            }
            state.chain_active = false;
            return;
        }
    }

    /// One scheduling decision: emit the next clip of the current burst, or
    /// idle and then open a new burst with its first clip.
    pub async fn tick(&self) -> TickOutcome {
        let mut state = self.inner.state.lock().await;
        if !state.enabled {
            return TickOutcome::Disabled;
        }

        if state.clips_remaining == 0 {
            let wait = self.inner.policy.sample_idle_wait(&mut state.rng);
            drop(state);
            info!(device = %self.inner.device, wait_ms = wait.as_millis() as u64, "keep-alive idle");
            tokio::time::sleep(wait).await;

            state = self.inner.state.lock().await;
            let burst_len = self.inner.policy.sample_burst_len(&mut state.rng);
            state.clips_remaining = burst_len;
            if !state.enabled {
                debug!(device = %self.inner.device, "disabled during idle wait");
                return TickOutcome::Disabled;
            }
        }

        let command = random_dots_command(&mut state.rng);
        state.clips_remaining -= 1;
        info!(
            device = %self.inner.device,
            %command,
            remaining = state.clips_remaining,
            "keep-alive clip"
        );
        self.inner.transport.send(&command, self.inner.endpoint).await;
        TickOutcome::Emitted {
            command,
            remaining: state.clips_remaining,
        }
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
