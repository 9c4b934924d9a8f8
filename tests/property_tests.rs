/// Property-based tests using proptest
/// Tests invariants of the import/enrich/save pipeline for arbitrary tables
use async_trait::async_trait;
use proptest::prelude::*;
use rust_twilio_comms::enrichment::{enrich, read_rows, write_rows, NOT_VALID};
use rust_twilio_comms::gateway_client::NumberValidator;
use rust_twilio_comms::models::LookupOutcome;

/// Every number is unknown to the provider.
struct NothingResolves;

#[async_trait]
impl NumberValidator for NothingResolves {
    async fn validate(&self, _number: &str) -> LookupOutcome {
        LookupOutcome::NotFound
    }
}

fn table(phones: &[String]) -> String {
    let mut out = String::from("Mobile_Phone,Note\n");
    for (i, phone) in phones.iter().enumerate() {
        out.push_str(&format!("{},row {}\n", phone, i));
    }
    out
}

fn phones_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("\\+1[0-9]{10}", 0..40)
}

proptest! {
    #[test]
    fn full_run_preserves_row_count_and_order(phones in phones_strategy()) {
        let mut set = read_rows(table(&phones).as_bytes(), true, 0, 0).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let summary = runtime.block_on(enrich(&NothingResolves, &mut set));

        prop_assert_eq!(set.len(), phones.len());
        prop_assert_eq!(summary.processed, phones.len());
        prop_assert_eq!(set.mobile_phones(), phones.iter().map(String::as_str).collect::<Vec<_>>());
        for (i, record) in set.iter().enumerate() {
            prop_assert_eq!(record.row, i);
        }
    }

    #[test]
    fn not_found_rows_are_marked_and_empty(phones in phones_strategy()) {
        let mut set = read_rows(table(&phones).as_bytes(), true, 0, 0).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(enrich(&NothingResolves, &mut set));

        for record in &set {
            prop_assert_eq!(record.valid.as_str(), NOT_VALID);
            prop_assert!(record.account_name.is_empty());
            prop_assert!(record.account_type.is_empty());
            prop_assert!(record.carrier.is_empty());
            prop_assert!(record.carrier_type.is_empty());
        }
    }

    #[test]
    fn partial_range_matches_slice_semantics(
        phones in phones_strategy(),
        start in -50i64..50,
        stop in -50i64..50
    ) {
        let set = read_rows(table(&phones).as_bytes(), false, start, stop).unwrap();

        let len = phones.len() as i64;
        let bound = |b: i64| (if b < 0 { b + len } else { b }).clamp(0, len) as usize;
        let end = bound(stop);
        let begin = bound(start).min(end);
        let expected: Vec<&str> = phones[begin..end].iter().map(String::as_str).collect();
        prop_assert_eq!(set.mobile_phones(), expected);
        for (offset, record) in set.iter().enumerate() {
            prop_assert_eq!(record.row, begin + offset);
        }
    }

    #[test]
    fn save_and_reimport_round_trips_phones(phones in phones_strategy()) {
        let mut set = read_rows(table(&phones).as_bytes(), true, 0, 0).unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(enrich(&NothingResolves, &mut set));

        let mut out = Vec::new();
        write_rows(&mut out, &set).unwrap();
        let reimported = read_rows(out.as_slice(), true, 0, 0).unwrap();

        prop_assert_eq!(reimported.mobile_phones(), set.mobile_phones());
        prop_assert_eq!(&reimported.headers, &set.headers);
    }
}
