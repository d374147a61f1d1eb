//! Broadcast scheduler cadence and cancellation tests

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use mayday_core::channel::create_effect_channel;
use mayday_core::packet::MaydayPacket;
use mayday_core::types::{EmergencyId, SystemTimeSource};
use mayday_core::Transport;
use mayday_runtime::{BroadcastOrder, BroadcastState, BroadcastTask};

mod test_utils;
use test_utils::MockLink;

fn order() -> BroadcastOrder {
    BroadcastOrder {
        emergency_id: EmergencyId::generate(),
        message: "SOS".into(),
        location: None,
    }
}

fn spawn_task(
    link: Arc<MockLink>,
    interval: Duration,
) -> (
    watch::Sender<BroadcastState>,
    mayday_core::channel::EffectReceiver,
    tokio::task::JoinHandle<()>,
) {
    let (effect_tx, effect_rx) = create_effect_channel(64);
    let (internal_tx, _internal_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(BroadcastState::default());
    let task = BroadcastTask::new(
        interval,
        256,
        link as Arc<dyn Transport>,
        state_rx,
        effect_tx,
        internal_tx,
        SystemTimeSource,
    );
    let handle = tokio::spawn(task.run());
    (state_tx, effect_rx, handle)
}

#[tokio::test]
async fn test_sends_are_spaced_by_max_of_interval_and_spacing() {
    // Interval 50 ms but the hardware demands 120 ms between transmissions
    let link = MockLink::with_spacing(1, Duration::from_millis(120));
    let (state_tx, mut effect_rx, handle) = spawn_task(link, Duration::from_millis(50));

    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();

    let mut stamps = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(700);
    loop {
        match tokio::time::timeout_at(deadline, effect_rx.recv()).await {
            Ok(Some(effect)) => {
                // Every effect is a well-formed emergency broadcast
                match effect {
                    mayday_core::Effect::BroadcastPacket { port, payload } => {
                        assert_eq!(port, 256);
                        assert!(matches!(
                            MaydayPacket::decode(&payload).unwrap(),
                            MaydayPacket::Emergency(_)
                        ));
                    }
                    other => panic!("unexpected effect: {other:?}"),
                }
                stamps.push(tokio::time::Instant::now());
            }
            _ => break,
        }
    }

    assert!(
        (3..=7).contains(&stamps.len()),
        "expected roughly one send per 120 ms, got {}",
        stamps.len()
    );
    for pair in stamps.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(110), "sends too close: {gap:?}");
    }

    drop(state_tx);
    let _ = handle.await;
}

#[tokio::test]
async fn test_first_send_is_immediate() {
    let link = MockLink::new(1);
    let (state_tx, mut effect_rx, handle) = spawn_task(link, Duration::from_secs(60));

    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();

    // Despite the one-minute interval, arming triggers one broadcast now
    tokio::time::timeout(Duration::from_millis(500), effect_rx.recv())
        .await
        .expect("no immediate broadcast")
        .expect("effect channel closed");

    drop(state_tx);
    let _ = handle.await;
}

#[tokio::test]
async fn test_restart_broadcasts_promptly_under_fresh_id() {
    let link = MockLink::new(1);
    let (state_tx, mut effect_rx, handle) = spawn_task(link, Duration::from_secs(60));

    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();
    tokio::time::timeout(Duration::from_millis(500), effect_rx.recv())
        .await
        .expect("no first broadcast")
        .expect("effect channel closed");

    // A restart replaces the order with a fresh emergency id; its first
    // broadcast must not wait out the old session's interval
    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();
    tokio::time::timeout(Duration::from_millis(500), effect_rx.recv())
        .await
        .expect("restarted session did not broadcast promptly")
        .expect("effect channel closed");

    drop(state_tx);
    let _ = handle.await;
}

#[tokio::test]
async fn test_cancellation_wakes_a_long_sleep() {
    let link = MockLink::new(1);
    // One-minute interval: after the first send the task sleeps for ages
    let (state_tx, mut effect_rx, handle) = spawn_task(link, Duration::from_secs(60));

    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();
    let _ = tokio::time::timeout(Duration::from_millis(500), effect_rx.recv()).await;

    // Dropping the arming channel must end the task promptly, not at the
    // next interval boundary
    drop(state_tx);
    tokio::time::timeout(Duration::from_millis(500), handle)
        .await
        .expect("scheduler did not observe cancellation promptly")
        .unwrap();
}

#[tokio::test]
async fn test_no_sends_while_disarmed_or_link_down() {
    let link = MockLink::new(1);
    let (state_tx, mut effect_rx, handle) = spawn_task(link, Duration::from_millis(50));

    // Disarmed: nothing happens
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(effect_rx.try_recv().is_err());

    // Armed but link down: still nothing
    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: false,
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(effect_rx.try_recv().is_err());

    // Link restored: broadcasts start
    state_tx
        .send(BroadcastState {
            order: Some(order()),
            link_up: true,
        })
        .unwrap();
    tokio::time::timeout(Duration::from_millis(500), effect_rx.recv())
        .await
        .expect("no broadcast after link came back")
        .expect("effect channel closed");

    drop(state_tx);
    let _ = handle.await;
}
