use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use crate::link::{
    bits_per_sec, read_link, shared, Counters, LinkLookup, LinkRegistry, LinkStatState,
};
use crate::listener::{process_datagram, ListenerStats, ProcessError, TelemetryListener};
use crate::wire::{DecodeError, Decoder, EvcapBuilder, Ticks, FIXED_HEADER_LEN};

const DATA_Q: u8 = 2;

fn packet(seq: u32, base: u64) -> Vec<u8> {
    EvcapBuilder::new(seq, Ticks(base))
        .queue(DATA_Q as usize, 100, 64)
        .arrival(DATA_Q, 1000, 10)
        .departure(DATA_Q, 800, 20)
        .arrival(1, 1000, 25)
        .dropped(DATA_Q, 200, 30)
        .build()
}

#[test]
fn process_datagram_applies_samples_events_and_refresh() {
    let decoder = Decoder::new(DATA_Q);
    let mut s = LinkStatState::new("l0", DATA_Q, 64);

    let applied = process_datagram(&decoder, &mut s, &packet(1, 1000)).expect("apply");
    assert_eq!(applied.seq, 1);
    assert_eq!(applied.events, 3);
    assert_eq!(applied.filtered, 1);
    assert_eq!(applied.end_ts, Ticks(1030));

    assert_eq!(s.watermark(), Some(Ticks(1000)));
    assert_eq!(s.counters().arrived_bytes, 1000);
    assert_eq!(s.counters().departed_bytes, 800);
    assert_eq!(s.counters().dropped_bytes, 200);
    // 800 (采样) + 1000 - 800 - 200
    assert_eq!(s.data_queue_occupancy(), 800);
    // 刷新使用包内最晚事件时间，而不是基准时间
    assert_eq!(s.last_refresh(), Some(Ticks(1030)));
}

#[test]
fn updates_in_order_are_both_accepted() {
    let decoder = Decoder::new(DATA_Q);
    let mut s = LinkStatState::new("l0", DATA_Q, 64);
    process_datagram(&decoder, &mut s, &packet(1, 1000)).expect("first");
    process_datagram(&decoder, &mut s, &packet(2, 2000)).expect("second");
    assert_eq!(s.watermark(), Some(Ticks(2000)));
    assert_eq!(s.counters().arrived_pkts, 2);
}

#[test]
fn out_of_order_update_is_rejected_without_changing_counters() {
    let decoder = Decoder::new(DATA_Q);
    let mut s = LinkStatState::new("l0", DATA_Q, 64);
    process_datagram(&decoder, &mut s, &packet(2, 2000)).expect("newer");
    let before_counters = s.counters();
    let before_history = s.history(DATA_Q).expect("q").len();
    let before_instant = s.instant();

    let err = process_datagram(&decoder, &mut s, &packet(1, 1000)).expect_err("stale");
    assert_eq!(
        err,
        ProcessError::OrderingRejected {
            ts: Ticks(1000),
            watermark: Some(Ticks(2000)),
        }
    );
    assert_eq!(s.counters(), before_counters);
    assert_eq!(s.history(DATA_Q).expect("q").len(), before_history);
    assert_eq!(s.instant(), before_instant);

    // 时间戳相同同样是重复更新
    let err = process_datagram(&decoder, &mut s, &packet(3, 2000)).expect_err("duplicate");
    assert!(matches!(err, ProcessError::OrderingRejected { .. }));
}

#[test]
fn overlapping_update_is_rejected_and_later_bytes_reach_the_rate() {
    let decoder = Decoder::new(DATA_Q);
    let mut s = LinkStatState::new("l0", DATA_Q, 64);
    let departure = |seq: u32, base: u64, delay: u32| {
        EvcapBuilder::new(seq, Ticks(base))
            .departure(DATA_Q, 1000, delay)
            .build()
    };

    process_datagram(&decoder, &mut s, &EvcapBuilder::new(0, Ticks(100)).build())
        .expect("reference");
    process_datagram(&decoder, &mut s, &departure(1, 1000, 500)).expect("a");
    assert_eq!(s.last_refresh(), Some(Ticks(1500)));

    // 基准 1200 落在上一包 [1000, 1500] 区间内
    let err = process_datagram(&decoder, &mut s, &departure(2, 1200, 100)).expect_err("overlap");
    assert!(matches!(err, ProcessError::OrderingRejected { ts: Ticks(1200), .. }));
    assert_eq!(s.counters().departed_bytes, 1000);

    let applied = process_datagram(&decoder, &mut s, &departure(3, 3000, 0)).expect("c");
    assert_eq!(applied.end_ts, Ticks(3000));
    let iv = s.instant();
    assert_eq!(iv.interval_ticks, 1500);
    assert_eq!(iv.throughput_bps, bits_per_sec(1000, 1500));
    assert!(iv.throughput_bps > 0.0);

    let ts: Vec<u64> = s
        .history(DATA_Q)
        .expect("q")
        .iter()
        .map(|p| p.at.0)
        .collect();
    assert!(ts.windows(2).all(|w| w[0] <= w[1]), "history went backwards: {ts:?}");
}

#[test]
fn truncated_datagram_leaves_state_untouched() {
    let decoder = Decoder::new(DATA_Q);
    let mut s = LinkStatState::new("l0", DATA_Q, 64);

    for buf in [Vec::new(), vec![0u8; FIXED_HEADER_LEN - 1]] {
        let err = process_datagram(&decoder, &mut s, &buf).expect_err("truncated");
        assert!(matches!(
            err,
            ProcessError::Decode(DecodeError::Truncated { .. })
        ));
    }
    assert_eq!(s.watermark(), None);
    assert_eq!(s.counters(), Counters::default());
    assert!(s.history(DATA_Q).expect("q").is_empty());
    assert_eq!(s.last_refresh(), None);
}

#[test]
fn registry_looks_up_links_by_index_and_name() {
    let mut reg = LinkRegistry::default();
    assert!(reg.is_empty());
    let a = reg.add(LinkStatState::new("a", 2, 8));
    let b = reg.add(LinkStatState::new("b", 1, 8));
    assert_eq!((a, b), (0, 1));
    assert_eq!(reg.len(), 2);

    let link = reg.link(1).expect("link 1");
    assert_eq!(read_link(&link).data_queue(), 1);
    assert!(reg.link(5).is_none());
    assert!(reg.find("a").is_some());
    assert!(reg.find("zzz").is_none());
    assert_eq!(reg.snapshots().len(), 2);
}

#[test]
fn udp_listener_counts_applied_malformed_and_stale_datagrams() {
    let link = shared(LinkStatState::new("loopback", DATA_Q, 64));
    let bind: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let listener =
        TelemetryListener::bind(bind, Decoder::new(DATA_Q), link.clone()).expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = listener.spawn(Some(3)).expect("spawn");
    assert_eq!(handle.addr(), addr);

    let tx = UdpSocket::bind("127.0.0.1:0").expect("bind sender");
    tx.send_to(&packet(2, 2000), addr).expect("send good");
    tx.send_to(&[0u8; 10], addr).expect("send short");
    tx.send_to(&packet(1, 1000), addr).expect("send stale");

    let stats = handle.join().expect("listener result");
    assert_eq!(
        stats,
        ListenerStats {
            received: 3,
            applied: 1,
            malformed: 1,
            stale: 1,
        }
    );

    let s = read_link(&link);
    assert_eq!(s.watermark(), Some(Ticks(2000)));
    assert_eq!(s.counters().arrived_pkts, 1);
}

#[test]
fn malformed_datagram_is_dropped_while_a_reader_holds_the_link() {
    let link = shared(LinkStatState::new("busy", DATA_Q, 8));
    let bind: SocketAddr = "127.0.0.1:0".parse().expect("addr");
    let listener =
        TelemetryListener::bind(bind, Decoder::new(DATA_Q), link.clone()).expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = listener.spawn(Some(1)).expect("spawn");

    // 展示层持有读锁期间，坏包不应等待写锁
    let reader = read_link(&link);
    let tx = UdpSocket::bind("127.0.0.1:0").expect("bind sender");
    tx.send_to(&[0u8; 10], addr).expect("send short");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(handle.is_finished(), "listener blocked behind the read lock");
    drop(reader);

    let stats = handle.join().expect("listener result");
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.applied, 0);
}

#[test]
fn binding_a_used_port_fails() {
    let taken = UdpSocket::bind("127.0.0.1:0").expect("bind");
    let addr = taken.local_addr().expect("addr");
    let link = shared(LinkStatState::new("dup", DATA_Q, 8));
    let err = TelemetryListener::bind(addr, Decoder::new(DATA_Q), link).expect_err("in use");
    assert!(matches!(err, crate::listener::ListenerError::Bind { .. }));
}
