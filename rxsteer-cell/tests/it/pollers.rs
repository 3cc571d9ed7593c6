use std::{sync::Arc, time::Duration};

use rxsteer_cell::{
    CellOptions, CellRegistry, CellState, DestinationFlags, PacketBuffer, PollerExit, RxOutcome,
    Sink,
};
use rxsteer_common::UnitId;
use rxsteer_wire::{frame::FrameBuilder, Classifier, ClassifierOptions, PortSet, PriorityPorts};
use tokio::sync::mpsc;

/// Forwards delivered buffers to a channel.
struct ChannelSink {
    fast: mpsc::UnboundedSender<(UnitId, PacketBuffer)>,
    slow: mpsc::UnboundedSender<PacketBuffer>,
}

impl Sink for ChannelSink {
    fn deliver(&self, unit: UnitId, buf: PacketBuffer) {
        let _ = self.fast.send((unit, buf));
    }

    fn deliver_slow(&self, buf: PacketBuffer) {
        let _ = self.slow.send(buf);
    }
}

type Receivers =
    (mpsc::UnboundedReceiver<(UnitId, PacketBuffer)>, mpsc::UnboundedReceiver<PacketBuffer>);

fn setup(
    units: usize,
    options: CellOptions,
) -> (Arc<CellRegistry<DestinationFlags, ChannelSink>>, Receivers) {
    let (fast_tx, fast_rx) = mpsc::unbounded_channel();
    let (slow_tx, slow_rx) = mpsc::unbounded_channel();

    let classifier = Classifier::new(
        ClassifierOptions::default(),
        PriorityPorts::new(PortSet::new([5201]).unwrap()),
    );
    let registry = Arc::new(CellRegistry::new(
        options,
        classifier,
        Arc::new(DestinationFlags::default()),
        Arc::new(ChannelSink { fast: fast_tx, slow: slow_tx }),
    ));
    registry.init(units).unwrap();

    (registry, (fast_rx, slow_rx))
}

/// A UDP frame whose source port carries a sequence number.
fn numbered(seq: u16, dst: u16) -> PacketBuffer {
    PacketBuffer::from_frame(FrameBuilder::udp(seq, dst).build())
}

fn seq_of(buf: &PacketBuffer) -> u16 {
    // Ethernet (14) + IPv4 (20), source port is the first UDP field.
    u16::from_be_bytes([buf.data()[34], buf.data()[35]])
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pollers_deliver_per_unit_fifo() {
    let _ = tracing_subscriber::fmt::try_init();

    let units = 4;
    let per_unit = 2_000u16;
    let (registry, (mut fast_rx, _slow_rx)) =
        setup(units, CellOptions::default().max_backlog(usize::from(per_unit)).poll_budget(16));

    let mut pollers = registry.spawn_pollers();
    assert_eq!(pollers.len(), units);

    let mut producers = Vec::new();
    for u in 0..units {
        let registry = registry.clone();
        producers.push(std::thread::spawn(move || {
            let unit = UnitId::new(u as u32);
            for seq in 0..per_unit {
                assert_eq!(registry.receive(unit, numbered(seq, 80)), RxOutcome::Enqueued);
            }
        }));
    }
    for p in producers {
        p.join().unwrap();
    }

    let mut next = vec![0u16; units];
    let total = units * usize::from(per_unit);
    for _ in 0..total {
        let (unit, buf) = tokio::time::timeout(Duration::from_secs(5), fast_rx.recv())
            .await
            .expect("delivery timed out")
            .unwrap();

        assert_eq!(seq_of(&buf), next[unit.index()], "out of order on {unit}");
        assert_eq!(buf.priority_tag(), Some(false));
        next[unit.index()] += 1;
    }

    assert!(next.iter().all(|n| *n == per_unit));
    assert_eq!(registry.stats().enqueued(), total as u64);
    assert_eq!(registry.stats().rx_dropped(), 0);

    registry.destroy();
    let exits = tokio::time::timeout(Duration::from_secs(5), pollers.join_all()).await.unwrap();
    assert_eq!(exits.len(), units);
    assert!(exits.iter().all(|(_, exit)| *exit == PollerExit::Disabled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backpressure_without_pollers() {
    let (registry, (mut fast_rx, _slow_rx)) = setup(1, CellOptions::default().max_backlog(8));
    let unit = UnitId::new(0);

    let outcomes: Vec<_> = (0..12).map(|seq| registry.receive(unit, numbered(seq, 5201))).collect();
    assert_eq!(outcomes.iter().filter(|o| **o == RxOutcome::Enqueued).count(), 8);
    assert_eq!(outcomes.iter().filter(|o| **o == RxOutcome::Dropped).count(), 4);
    assert_eq!(registry.stats().rx_dropped(), 4);

    // Pollers started late still drain what was queued, high priority tags intact.
    let mut pollers = registry.spawn_pollers();
    for seq in 0..8 {
        let (_, buf) =
            tokio::time::timeout(Duration::from_secs(5), fast_rx.recv()).await.unwrap().unwrap();
        assert_eq!(seq_of(&buf), seq);
        assert!(buf.is_high_priority());
    }

    // Room again after draining.
    assert_eq!(registry.receive(unit, numbered(100, 1)), RxOutcome::Enqueued);
    let (_, buf) =
        tokio::time::timeout(Duration::from_secs(5), fast_rx.recv()).await.unwrap().unwrap();
    assert_eq!(seq_of(&buf), 100);

    registry.destroy();
    pollers.join_all().await;
}

#[tokio::test]
async fn teardown_discards_queued_buffers() {
    let (registry, (mut fast_rx, mut slow_rx)) = setup(2, CellOptions::default());

    for seq in 0..10 {
        let _ = registry.receive(UnitId::new(1), numbered(seq, 1));
    }
    let cell = registry.cell(UnitId::new(1)).unwrap();
    assert_eq!(cell.state(), CellState::Scheduled);

    registry.destroy();
    assert_eq!(cell.stats().purged(), 10);

    // Pollers spawned after teardown have nothing to drive.
    let pollers = registry.spawn_pollers();
    assert!(pollers.is_empty());

    assert!(fast_rx.try_recv().is_err());

    assert_eq!(registry.receive(UnitId::new(1), numbered(0, 1)), RxOutcome::Sunk);
    assert!(slow_rx.recv().await.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn teardown_wakes_every_poller() {
    let (registry, (_fast_rx, _slow_rx)) = setup(3, CellOptions::default());

    let mut first = registry.spawn_pollers();
    let mut second = registry.spawn_pollers();
    assert_eq!(first.len() + second.len(), 6);

    // Let all six park on their cells.
    tokio::time::sleep(Duration::from_millis(20)).await;
    registry.destroy();

    let exits = tokio::time::timeout(Duration::from_secs(5), async {
        let mut exits = first.join_all().await;
        exits.extend(second.join_all().await);
        exits
    })
    .await
    .expect("pollers did not exit after teardown");

    assert_eq!(exits.len(), 6);
    assert!(exits.iter().all(|(_, exit)| *exit == PollerExit::Disabled));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn teardown_races_concurrent_receive() {
    let _ = tracing_subscriber::fmt::try_init();

    let units = 4;
    let per_producer = 20_000u16;
    let (registry, (mut fast_rx, _slow_rx)) = setup(units, CellOptions::default().poll_budget(8));
    let cells: Vec<_> =
        (0..units).map(|u| registry.cell(UnitId::new(u as u32)).unwrap()).collect();

    let mut pollers = registry.spawn_pollers();
    // Drain deliveries so the channel does not hold every buffer.
    let drain = tokio::spawn(async move { while fast_rx.recv().await.is_some() {} });

    let producers: Vec<_> = (0..units)
        .map(|u| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                let unit = UnitId::new(u as u32);
                (0..per_producer)
                    .map(|seq| registry.receive(unit, numbered(seq, 80)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    tokio::time::sleep(Duration::from_millis(2)).await;
    registry.destroy();

    let mut outcomes: Vec<RxOutcome> = Vec::new();
    for p in producers {
        outcomes.extend(p.join().unwrap());
    }

    let exits = tokio::time::timeout(Duration::from_secs(5), pollers.join_all()).await.unwrap();
    assert_eq!(exits.len(), units);

    for cell in &cells {
        assert_eq!(cell.state(), CellState::Disabled);
        assert!(cell.is_empty(), "{} still holds buffers", cell.unit());
    }

    // Every accepted buffer was either delivered or purged, none leaked into a dead cell.
    let accounted: u64 = cells.iter().map(|c| c.stats().delivered() + c.stats().purged()).sum();
    assert_eq!(registry.stats().enqueued(), accounted);

    let count = |o: RxOutcome| outcomes.iter().filter(|x| **x == o).count() as u64;
    assert_eq!(count(RxOutcome::Enqueued), registry.stats().enqueued());
    assert_eq!(count(RxOutcome::Dropped), registry.stats().rx_dropped());
    assert_eq!(count(RxOutcome::Sunk), registry.stats().bypassed());
    assert_eq!(outcomes.len(), units * usize::from(per_producer));

    // After teardown everything takes the slow path.
    assert_eq!(registry.receive(UnitId::new(0), numbered(0, 80)), RxOutcome::Sunk);

    drop(registry);
    drain.abort();
}
