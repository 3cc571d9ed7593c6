use std::{sync::Arc, thread};

use rxsteer_common::{OnlineUnits, UnitId};
use rxsteer_control::{ControlPlane, Endpoint, SelectionKind, StaticLoads};
use rxsteer_wire::PriorityPorts;

fn plane(units: u32) -> Arc<ControlPlane> {
    let loads = Arc::new(StaticLoads::new(units as usize));
    Arc::new(ControlPlane::new(OnlineUnits::contiguous(units), PriorityPorts::default(), loads))
}

#[test]
fn every_endpoint_reads_back_its_write() {
    let _ = tracing_subscriber::fmt::try_init();
    let plane = plane(16);

    let cases: &[(Endpoint, &str, &str)] = &[
        (Endpoint::FalconCpus, "0xf0f0\n", "f0f0\n"),
        (Endpoint::GrosplitCpus, "1", "1\n"),
        (Endpoint::CpustatInterval, "-3", "-3\n"),
        (Endpoint::Threshold, " 42 ", "42\n"),
        (Endpoint::Diff, "0", "0\n"),
        (Endpoint::BalancePercent, "100", "100\n"),
        (Endpoint::PpsyncPorts, "5000,5001", "5000 5001\n"),
    ];

    for (endpoint, input, rendered) in cases {
        let name = endpoint.to_string();
        let endpoint: Endpoint = name.parse().unwrap();

        let mut file = plane.open(endpoint);
        assert_eq!(file.write(input.as_bytes()).unwrap(), input.len());
        assert_eq!(file.read(), *rendered, "{name}");
    }

    assert_eq!(plane.selection(SelectionKind::Grosplit).iter().collect::<Vec<_>>(), [UnitId::new(0)]);
}

#[test]
fn concurrent_readers_see_whole_values() {
    let _ = tracing_subscriber::fmt::try_init();
    let plane = plane(4);

    let writer = {
        let plane = Arc::clone(&plane);
        thread::spawn(move || {
            for i in 0..1_000 {
                let value = if i % 2 == 0 { "20" } else { "70" };
                plane.write(Endpoint::Threshold, 0, value.as_bytes()).unwrap();
                let map = if i % 2 == 0 { "3" } else { "c" };
                plane.write(Endpoint::FalconCpus, 0, map.as_bytes()).unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let plane = Arc::clone(&plane);
            thread::spawn(move || {
                for _ in 0..1_000 {
                    let threshold = plane.read(Endpoint::Threshold);
                    assert!(["90\n", "20\n", "70\n"].contains(&threshold.as_str()), "{threshold:?}");

                    let map = plane.read(Endpoint::FalconCpus);
                    assert!(["0\n", "3\n", "c\n"].contains(&map.as_str()), "{map:?}");
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(plane.read(Endpoint::Threshold), "70\n");
    assert_eq!(plane.read(Endpoint::FalconCpus), "c\n");
}
