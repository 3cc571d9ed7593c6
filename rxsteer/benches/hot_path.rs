use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use rxsteer::{
    frame::FrameBuilder, CellOptions, CellRegistry, Classifier, ClassifierOptions,
    DestinationFlags, PacketBuffer, PollStatus, PortSet, PriorityPorts, Sink, UnitId,
};

const BATCH: usize = 64;

/// Discards delivered buffers.
struct Discard;

impl Sink for Discard {
    fn deliver(&self, _unit: UnitId, buf: PacketBuffer) {
        drop(buf);
    }

    fn deliver_slow(&self, buf: PacketBuffer) {
        drop(buf);
    }
}

fn classifier() -> Classifier {
    Classifier::new(
        ClassifierOptions::default(),
        PriorityPorts::new(PortSet::new([4791, 5201, 9000]).unwrap()),
    )
}

fn bench_classify(c: &mut Criterion) {
    let classifier = classifier();
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(1));

    let frames = [
        ("udp", FrameBuilder::udp(40000, 9000).build()),
        ("tcp", FrameBuilder::tcp(40000, 80).build()),
        ("ipv6", FrameBuilder::udp(40000, 12345).ipv6().build()),
        ("vxlan", FrameBuilder::vxlan(FrameBuilder::udp(40000, 4791).build()).build()),
    ];
    for (name, frame) in &frames {
        group.bench_with_input(BenchmarkId::from_parameter(name), frame, |b, frame| {
            b.iter(|| classifier.classify_frame(frame, 0))
        });
    }

    group.finish();
}

fn bench_receive_poll(c: &mut Criterion) {
    let registry = CellRegistry::new(
        CellOptions::default(),
        classifier(),
        Arc::new(DestinationFlags::default()),
        Arc::new(Discard),
    );
    registry.init(1).unwrap();
    let unit = UnitId::new(0);

    let mut rng = rand::thread_rng();
    let frames: Vec<bytes::Bytes> = (0..BATCH)
        .map(|_| FrameBuilder::udp(rng.gen(), rng.gen()).payload(vec![0u8; 64]).build().into())
        .collect();

    let mut group = c.benchmark_group("receive_poll");
    group.throughput(Throughput::Elements(BATCH as u64));
    group.bench_function(BenchmarkId::from_parameter(BATCH), |b| {
        b.iter(|| {
            for frame in &frames {
                let _ = registry.receive(unit, PacketBuffer::from_frame(frame.clone()));
            }
            assert_eq!(registry.poll(unit, BATCH + 1), PollStatus::Complete(BATCH));
        })
    });

    group.finish();
}

criterion_group!(benches, bench_classify, bench_receive_poll);
criterion_main!(benches);
