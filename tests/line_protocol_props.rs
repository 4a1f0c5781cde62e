//! Property-based tests for the line protocol and endpoint rotation.

use std::collections::BTreeMap;

use itertools::Itertools;
use proptest::prelude::*;
use tsdb_client::{
    ExhaustionPolicy, Meter, encode_batch, encode_line, encode_put, parse_line,
    socket_client::{Endpoint, HostSelector},
};

fn meter_strategy() -> impl Strategy<Value = Meter> {
    (
        "[a-zA-Z0-9._/-]{1,20}",
        0..i64::MAX,
        any::<i64>(),
        proptest::collection::btree_map("[a-z_]{1,8}", "[a-zA-Z0-9._=-]{1,8}", 1..4),
    )
        .prop_map(|(metric, ts, value, tags): (String, i64, i64, BTreeMap<String, String>)| {
            Meter::new(metric, ts, value, tags).expect("generated meter is valid")
        })
}

proptest! {
    #[test]
    fn encoded_lines_parse_back(meter in meter_strategy()) {
        let parsed = parse_line(&encode_put(&meter)).expect("encoded line parses");
        prop_assert_eq!(parsed.metric.as_str(), meter.metric());
        prop_assert_eq!(parsed.timestamp, meter.timestamp());
        prop_assert_eq!(parsed.value, meter.value().to_string());
        prop_assert_eq!(&parsed.tags, meter.tags());
    }

    #[test]
    fn batch_is_puts_in_queue_order(meters in proptest::collection::vec(meter_strategy(), 0..8)) {
        let expected = meters.iter().map(|m| format!("put {}\n", encode_line(m))).join("");
        prop_assert_eq!(String::from_utf8(encode_batch(&meters)).expect("utf8"), expected);
    }

    #[test]
    fn selector_prefers_healthy_endpoints(
        size in 1usize..6,
        dead in proptest::collection::vec(any::<bool>(), 6),
        seed in any::<u64>(),
    ) {
        let endpoints: Vec<Endpoint> = (0..size)
            .map(|i| Endpoint::new(format!("tsd{i}"), 4242))
            .collect();
        let mut selector =
            HostSelector::new(endpoints.clone(), ExhaustionPolicy::ShuffleAndClear, Some(seed))
                .expect("non-empty endpoints");
        for (endpoint, dead) in endpoints.iter().zip(&dead) {
            let picked = selector.pick().clone();
            prop_assert_eq!(&picked, endpoint, "first pass visits endpoints in order");
            if *dead {
                selector.blacklist_current();
            }
        }
        let healthy = endpoints.len() - selector.blacklisted_len();
        for _ in 0..size * 2 {
            let picked = selector.pick().clone();
            if healthy > 0 {
                prop_assert!(!selector.is_blacklisted(&picked));
            }
        }
        if healthy == 0 {
            prop_assert_eq!(selector.blacklisted_len(), 0, "exhaustion clears the blacklist");
        }
    }
}
