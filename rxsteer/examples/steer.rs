use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc;

use rxsteer::{
    frame::FrameBuilder, DestinationFlags, Endpoint, OnlineUnits, PacketBuffer, Sink,
    StaticLoads, Steering, UnitId,
};

/// Prints what arrives on the fast path.
struct Printer(mpsc::UnboundedSender<(UnitId, PacketBuffer)>);

impl Sink for Printer {
    fn deliver(&self, unit: UnitId, buf: PacketBuffer) {
        let _ = self.0.send((unit, buf));
    }

    fn deliver_slow(&self, buf: PacketBuffer) {
        println!("slow path: {} bytes", buf.len());
    }
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt::try_init();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let loads: Arc<StaticLoads> = Arc::new([95, 20, 60, 10].into_iter().collect());
    let steering = Steering::new(
        OnlineUnits::contiguous(4),
        Arc::new(DestinationFlags::default()),
        Arc::new(Printer(tx)),
        loads,
    )
    .unwrap();

    // Configure the control plane like an external balancer would.
    let control = steering.control();
    control.open(Endpoint::PpsyncPorts).write(b"4791 9000\n").unwrap();
    control.open(Endpoint::FalconCpus).write(b"3").unwrap();
    control.open(Endpoint::Threshold).write(b"50").unwrap();
    for endpoint in Endpoint::ALL {
        print!("{endpoint}: {}", control.read(endpoint));
    }

    let mut pollers = steering.spawn_pollers();

    let frames = [
        FrameBuilder::udp(40000, 9000).build(),
        FrameBuilder::tcp(443, 51000).build(),
        FrameBuilder::vxlan(FrameBuilder::udp(40000, 4791).build()).build(),
        FrameBuilder::udp(40000, 12345).ipv6().build(),
    ];
    for (i, frame) in frames.into_iter().enumerate() {
        let unit = UnitId::new(i as u32 % 4);
        println!("{unit}: {:?}", steering.receive(unit, PacketBuffer::from_frame(frame)));
    }

    for _ in 0..4 {
        let Ok(Some((unit, buf))) = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await
        else {
            break;
        };
        println!("{unit} delivered {} bytes, high priority: {}", buf.len(), buf.is_high_priority());
    }

    steering.shutdown();
    for (unit, exit) in pollers.join_all().await {
        println!("{unit} poller exited: {exit:?}");
    }
}
