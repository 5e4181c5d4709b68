use crate::wire::{
    decode, DecodeError, Decoder, EvcapBuilder, EventKind, Ticks, TrafficEvent, FIXED_HEADER_LEN,
    NUM_QUEUES,
};

const DATA_Q: u8 = 2;

#[test]
fn decode_reads_sequence_queues_and_timestamp() {
    let buf = EvcapBuilder::new(7, Ticks(0x0000_0001_0000_0002))
        .queue(0, 1, 64)
        .queue(2, 100, 64)
        .queue(7, 3, 64)
        .build();
    assert_eq!(buf.len(), FIXED_HEADER_LEN);

    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.seq, 7);
    assert_eq!(upd.base_ts, Ticks((1u64 << 32) | 2));
    assert_eq!(upd.queues.len(), NUM_QUEUES);
    for (i, s) in upd.queues.iter().enumerate() {
        assert_eq!(usize::from(s.queue), i);
    }
    assert_eq!(upd.queues[0].bytes, 8);
    assert_eq!(upd.queues[2].bytes, 800);
    assert_eq!(upd.queues[7].bytes, 24);
    assert_eq!(upd.queues[5].bytes, 0);
    assert_eq!(upd.records, 0);
    assert!(upd.events.is_empty());
    assert_eq!(upd.end_ts, upd.base_ts);
}

#[test]
fn decode_assembles_timestamp_with_high_bit_set() {
    let ts = Ticks(0x8000_0001_FFFF_FFFF);
    let buf = EvcapBuilder::new(0, ts).build();
    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.base_ts, ts);
}

#[test]
fn decode_hand_built_arrival_record() {
    let mut buf = vec![0u8; FIXED_HEADER_LEN + 8];
    buf[1] = 1;
    // 基准时间戳：高 0，低 1000
    buf[74..78].copy_from_slice(&1000u32.to_be_bytes());
    // 到达事件：子时延 5，长度 200B（25 个单位），队列 2
    buf[78] = 1;
    let val: u32 = (5 << 13) | (25 << 5) | (2 << 2);
    buf[82..86].copy_from_slice(&val.to_be_bytes());

    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.records, 1);
    assert_eq!(
        upd.events,
        vec![TrafficEvent::packet(EventKind::Arrival, Ticks(1005), 2, 200)]
    );
    assert_eq!(upd.end_ts, Ticks(1005));
}

#[test]
fn decode_counts_all_records_and_keeps_only_data_queue_events() {
    let buf = EvcapBuilder::new(1, Ticks(1000))
        .arrival(2, 64, 1)
        .arrival(1, 64, 2)
        .departure(2, 64, 3)
        .dropped(5, 64, 4)
        .build();
    let upd = Decoder::new(DATA_Q).decode(&buf).expect("decode");
    assert_eq!(upd.records, 4);
    assert_eq!(upd.filtered, 2);
    assert_eq!(upd.traffic().count(), 2);
    assert!(upd.traffic().all(|ev| ev.queue == Some(DATA_Q)));
}

#[test]
fn decode_dispatches_each_type_to_exactly_one_kind() {
    let buf = EvcapBuilder::new(1, Ticks(1000))
        .arrival(DATA_Q, 80, 1)
        .departure(DATA_Q, 160, 2)
        .dropped(DATA_Q, 240, 3)
        .build();
    let upd = decode(&buf, DATA_Q).expect("decode");
    let kinds: Vec<_> = upd.events.iter().map(|ev| ev.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Arrival, EventKind::Departure, EventKind::Drop]
    );
    let lens: Vec<_> = upd.events.iter().map(|ev| ev.len_bytes).collect();
    assert_eq!(lens, vec![80, 160, 240]);
    let ats: Vec<_> = upd.events.iter().map(|ev| ev.at).collect();
    assert_eq!(ats, vec![Ticks(1001), Ticks(1002), Ticks(1003)]);
    assert_eq!(upd.end_ts, Ticks(1003));
}

#[test]
fn decode_timestamp_marker_rebases_following_events() {
    let buf = EvcapBuilder::new(1, Ticks(1000))
        .arrival(DATA_Q, 64, 10)
        .marker(Ticks(5000))
        .departure(DATA_Q, 64, 3)
        .build();
    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.records, 3);
    assert_eq!(upd.events.len(), 3);
    assert_eq!(upd.events[0].at, Ticks(1010));
    assert!(upd.events[1].is_marker());
    assert_eq!(upd.events[1].at, Ticks(5000));
    assert_eq!(upd.events[1].queue, None);
    assert_eq!(upd.events[2].at, Ticks(5003));
    assert_eq!(upd.end_ts, Ticks(5003));
    assert_eq!(upd.traffic().count(), 2);
}

#[test]
fn decode_rejects_empty_and_short_buffers() {
    assert_eq!(
        decode(&[], DATA_Q),
        Err(DecodeError::Truncated { needed: FIXED_HEADER_LEN, got: 0 })
    );
    let short = vec![0u8; FIXED_HEADER_LEN - 1];
    assert_eq!(
        decode(&short, DATA_Q),
        Err(DecodeError::Truncated { needed: FIXED_HEADER_LEN, got: FIXED_HEADER_LEN - 1 })
    );
}

#[test]
fn decode_rejects_buffer_shorter_than_declared_records() {
    let mut buf = EvcapBuilder::new(1, Ticks(1000))
        .arrival(DATA_Q, 64, 1)
        .arrival(DATA_Q, 64, 2)
        .build();
    buf.truncate(buf.len() - 8);
    assert_eq!(
        decode(&buf, DATA_Q),
        Err(DecodeError::Truncated { needed: FIXED_HEADER_LEN + 16, got: FIXED_HEADER_LEN + 8 })
    );
}

#[test]
fn decode_ignores_trailing_bytes() {
    let mut buf = EvcapBuilder::new(1, Ticks(1000)).arrival(DATA_Q, 64, 1).build();
    buf.extend_from_slice(&[0xAA; 13]);
    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.records, 1);
    assert_eq!(upd.traffic().count(), 1);
}

#[test]
fn decode_skips_unknown_record_types() {
    let mut buf = EvcapBuilder::new(1, Ticks(1000))
        .arrival(DATA_Q, 64, 1)
        .arrival(DATA_Q, 64, 2)
        .build();
    buf[FIXED_HEADER_LEN] = 9;
    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.records, 2);
    assert_eq!(upd.unknown, 1);
    assert_eq!(upd.events.len(), 1);
    assert_eq!(upd.events[0].at, Ticks(1002));
}

#[test]
fn builder_rounds_lengths_down_to_eight_byte_units() {
    let buf = EvcapBuilder::new(1, Ticks(0)).arrival(DATA_Q, 1500, 0).build();
    let upd = decode(&buf, DATA_Q).expect("decode");
    assert_eq!(upd.events[0].len_bytes, 1496);
}

#[test]
fn event_kind_codes_are_a_bijection() {
    for code in 0u8..=255 {
        match EventKind::from_code(code) {
            Some(kind) => assert_eq!(kind.code(), code),
            None => assert!(code > 3),
        }
    }
}
