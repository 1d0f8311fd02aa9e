//! Property-based tests for the request envelope and retry delays

use binding_core::middleware::{DelayType, RetryConfig};
use binding_core::{Metadata, Request};
use proptest::prelude::*;
use std::time::Duration;

fn metadata_strategy() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-z_]{1,12}", ".{0,24}", 0..8)
}

fn delay_type_strategy() -> impl Strategy<Value = DelayType> {
    prop_oneof![
        Just(DelayType::Fixed),
        Just(DelayType::BackOff),
        Just(DelayType::Random),
    ]
}

proptest! {
    #[test]
    fn prop_request_round_trip(
        data in prop::collection::vec(any::<u8>(), 0..256),
        metadata in metadata_strategy(),
    ) {
        let request = Request { metadata, data: data.into() };
        let parsed = Request::from_bytes(&request.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(parsed, request);
    }

    #[test]
    fn prop_delay_never_exceeds_ceiling(
        delay_type in delay_type_strategy(),
        max_delay_ms in 0u64..10_000,
        max_jitter_ms in 1u64..1_000,
        attempt in 0u32..64,
    ) {
        let config = RetryConfig {
            delay_type,
            max_delay: Duration::from_millis(max_delay_ms),
            max_jitter: Duration::from_millis(max_jitter_ms),
            ..Default::default()
        };
        prop_assert!(config.delay(attempt) <= Duration::from_millis(max_delay_ms));
    }
}
