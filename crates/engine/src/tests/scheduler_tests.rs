use super::*;
use crate::test_support::{endpoint, RecordingTransport, Sent};
use tokio::{sync::mpsc, time::Instant};

const PORT: u16 = 12345;

fn scheduler(pacing: BurstPacing) -> (KeepAliveScheduler, Arc<RecordingTransport>, mpsc::UnboundedReceiver<Sent>) {
    let (transport, rx) = RecordingTransport::new();
    let policy = SchedulerPolicy {
        pacing,
        ..SchedulerPolicy::default()
    };
    let scheduler = KeepAliveScheduler::with_rng(
        "BS1",
        endpoint(21, PORT),
        transport.clone(),
        policy,
        StdRng::seed_from_u64(7),
    );
    (scheduler, transport, rx)
}

fn is_dots_clip(message: &str) -> bool {
    let Some(letter) = message
        .strip_prefix("PLAY DOTS-")
        .and_then(|rest| rest.strip_suffix(".mp4"))
    else {
        return false;
    };
    let mut chars = letter.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if ('a'..='w').contains(&c))
}

#[test]
fn random_commands_cover_only_the_clip_library() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut seen = std::collections::HashSet::new();
    for _ in 0..2_000 {
        let command = random_dots_command(&mut rng);
        assert!(is_dots_clip(&command), "unexpected command {command}");
        seen.insert(command);
    }
    assert_eq!(seen.len(), 23);
}

#[test]
fn sampled_ranges_stay_in_bounds() {
    let policy = SchedulerPolicy::default();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..1_000 {
        let wait = policy.sample_idle_wait(&mut rng).as_millis();
        assert!((30_000..170_000).contains(&wait));
        let burst = policy.sample_burst_len(&mut rng);
        assert!((1..=10).contains(&burst));
    }
}

#[test]
fn degenerate_ranges_collapse_to_minimum() {
    let policy = SchedulerPolicy {
        pacing: BurstPacing::Immediate,
        idle_wait_ms: Span { min: 5, max: 5 },
        burst_len: Span { min: 0, max: 0 },
    };
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(policy.sample_idle_wait(&mut rng), Duration::from_millis(5));
    assert_eq!(policy.sample_burst_len(&mut rng), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_scheduler_never_emits() {
    let (scheduler, transport, _rx) = scheduler(BurstPacing::Immediate);
    assert_eq!(scheduler.tick().await, TickOutcome::Disabled);
    scheduler.request_tick().await.expect("chain");
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn enabling_alone_does_not_send() {
    let (scheduler, transport, _rx) = scheduler(BurstPacing::Immediate);
    scheduler.set_enabled(true).await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(transport.sent().is_empty());
    assert!(scheduler.is_enabled().await);
}

#[tokio::test(start_paused = true)]
async fn first_burst_follows_idle_wait_with_no_gaps() {
    let (scheduler, _transport, mut rx) = scheduler(BurstPacing::Immediate);
    let started = Instant::now();
    scheduler.set_enabled(true).await;
    scheduler.request_tick();

    let first = rx.recv().await.expect("first clip");
    let waited = first.at - started;
    assert!(waited >= Duration::from_millis(30_000), "waited {waited:?}");
    assert!(waited < Duration::from_millis(170_000), "waited {waited:?}");

    let mut burst = vec![first];
    let next_burst = loop {
        let sent = rx.recv().await.expect("clip");
        if sent.at == burst[0].at {
            burst.push(sent);
        } else {
            break sent;
        }
    };

    assert!((1..=10).contains(&burst.len()), "burst of {}", burst.len());
    assert!(burst.iter().all(|s| is_dots_clip(&s.message)));
    assert!(burst.iter().all(|s| s.destination == endpoint(21, PORT)));
    assert!(next_burst.at - burst[0].at >= Duration::from_millis(30_000));
}

#[tokio::test(start_paused = true)]
async fn disabling_mid_burst_sends_one_stop_and_halts() {
    let (scheduler, transport, mut rx) = scheduler(BurstPacing::Acknowledged);
    scheduler.set_enabled(true).await;

    let outcome = scheduler.tick().await;
    let TickOutcome::Emitted { remaining, .. } = outcome else {
        panic!("expected an emission, got {outcome:?}");
    };
    rx.recv().await.expect("clip");

    scheduler.set_enabled(false).await;
    let stop = rx.recv().await.expect("stop");
    assert_eq!(stop.message, STOP_CLIPS);

    scheduler.request_tick().await.expect("chain");
    tokio::time::sleep(Duration::from_secs(600)).await;
    let after: Vec<_> = transport.sent().into_iter().skip(2).collect();
    assert!(after.is_empty(), "sent after disable: {after:?}");
    assert_eq!(scheduler.clips_remaining().await, remaining);
}

#[tokio::test(start_paused = true)]
async fn disable_during_idle_wait_cancels_the_burst() {
    let (scheduler, transport, _rx) = scheduler(BurstPacing::Immediate);
    scheduler.set_enabled(true).await;
    let chain = scheduler.request_tick();

    tokio::time::sleep(Duration::from_millis(10_000)).await;
    scheduler.set_enabled(false).await;
    chain.await.expect("chain");

    let messages: Vec<_> = transport.sent().into_iter().map(|s| s.message).collect();
    assert_eq!(messages, vec![STOP_CLIPS.to_string()]);
    assert!(scheduler.clips_remaining().await >= 1);
}

#[tokio::test(start_paused = true)]
async fn acknowledged_pacing_emits_one_clip_per_tick() {
    let (scheduler, transport, mut rx) = scheduler(BurstPacing::Acknowledged);
    scheduler.set_enabled(true).await;

    scheduler.request_tick().await.expect("chain");
    rx.recv().await.expect("first clip");
    let remaining = scheduler.clips_remaining().await;
    assert_eq!(transport.sent().len(), 1);

    if remaining > 0 {
        let before = Instant::now();
        scheduler.request_tick().await.expect("chain");
        let second = rx.recv().await.expect("second clip");
        assert_eq!(second.at, before);
        assert_eq!(scheduler.clips_remaining().await, remaining - 1);
        assert_eq!(transport.sent().len(), 2);
    }
}

#[tokio::test(start_paused = true)]
async fn tick_requests_coalesce_into_running_chain() {
    let (scheduler, transport, mut rx) = scheduler(BurstPacing::Acknowledged);
    scheduler.set_enabled(true).await;

    let chain = scheduler.request_tick();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    for _ in 0..5 {
        scheduler.request_tick().await.expect("coalesced");
    }
    chain.await.expect("chain");

    rx.recv().await.expect("first clip");
    let emitted = transport
        .sent()
        .iter()
        .filter(|s| is_dots_clip(&s.message))
        .count();
    assert!(emitted <= 2, "expected at most one extra tick, saw {emitted} clips");
}
