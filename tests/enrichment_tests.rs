/// Pipeline tests for the CSV enrichment workflow
/// Runs import -> enrich -> save against an in-process validator
use async_trait::async_trait;
use rust_twilio_comms::enrichment::{
    enrich, import_rows, save_rows, ENRICHMENT_COLUMNS, NOT_VALID,
};
use rust_twilio_comms::errors::VendorError;
use rust_twilio_comms::gateway_client::NumberValidator;
use rust_twilio_comms::models::{LookupOutcome, ValidationResult};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Validator returning canned outcomes; unknown numbers are not found.
struct MockValidator {
    outcomes: HashMap<String, LookupOutcome>,
    calls: Mutex<Vec<String>>,
}

impl MockValidator {
    fn new(outcomes: Vec<(&str, LookupOutcome)>) -> Self {
        Self {
            outcomes: outcomes
                .into_iter()
                .map(|(n, o)| (n.to_string(), o))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NumberValidator for MockValidator {
    async fn validate(&self, number: &str) -> LookupOutcome {
        self.calls.lock().unwrap().push(number.to_string());
        self.outcomes
            .get(number)
            .cloned()
            .unwrap_or(LookupOutcome::NotFound)
    }
}

fn found(number: &str, with_caller: bool, with_carrier: bool) -> LookupOutcome {
    let mut raw = json!({
        "phone_number": number,
        "country_code": "US",
        "national_format": "(123) 456-7890",
        "caller_name": null,
        "carrier": null,
        "add_ons": null,
        "url": format!("https://lookups.twilio.com/v1/PhoneNumbers/{}", number)
    });
    if with_caller {
        raw["caller_name"] =
            json!({"caller_name": "ACME CORP", "caller_type": "BUSINESS", "error_code": null});
    }
    if with_carrier {
        raw["carrier"] = json!({
            "mobile_country_code": "310",
            "mobile_network_code": "456",
            "name": "Verizon Wireless",
            "type": "mobile",
            "error_code": null
        });
    }
    LookupOutcome::Found(ValidationResult::from_json(raw).unwrap())
}

fn write_input(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("phones.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

#[tokio::test]
async fn test_end_to_end_found_and_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "Mobile_Phone\n+11234567890\n+10000000000\n");
    let output = dir.path().join("validated.csv");

    let success = found("+11234567890", true, true);
    let raw_text = match &success {
        LookupOutcome::Found(r) => r.raw_text(),
        _ => unreachable!(),
    };
    let validator = MockValidator::new(vec![
        ("+11234567890", success),
        ("+10000000000", LookupOutcome::NotFound),
    ]);

    let mut records = import_rows(&input, true, 0, 0).unwrap();
    let summary = enrich(&validator, &mut records).await;
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.not_valid, 1);
    assert!(save_rows(&output, &records));

    let (headers, rows) = read_output(&output);
    let mut expected_headers = vec!["Mobile_Phone".to_string()];
    expected_headers.extend(ENRICHMENT_COLUMNS.iter().map(|c| c.to_string()));
    assert_eq!(headers, expected_headers);

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        vec![
            "+11234567890".to_string(),
            raw_text,
            "ACME CORP".to_string(),
            "BUSINESS".to_string(),
            "Verizon Wireless".to_string(),
            "mobile".to_string(),
        ]
    );
    assert_eq!(
        rows[1],
        vec!["+10000000000", NOT_VALID, "", "", "", ""]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_missing_caller_name_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "Name,Mobile_Phone\nann,+11111111111\nbob,+12222222222\ncy,+13333333333\n",
    );

    let validator = MockValidator::new(vec![
        ("+11111111111", found("+11111111111", false, true)),
        ("+12222222222", found("+12222222222", true, true)),
        ("+13333333333", LookupOutcome::NotFound),
    ]);

    let mut records = import_rows(&input, true, 0, 0).unwrap();
    let summary = enrich(&validator, &mut records).await;

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.extraction_failures, 1);
    assert_eq!(summary.valid, 1);
    assert_eq!(summary.not_valid, 1);
    assert_eq!(
        validator.calls(),
        vec!["+11111111111", "+12222222222", "+13333333333"]
    );

    let incomplete = &records.records[0];
    assert!(incomplete.valid.contains("+11111111111"));
    assert!(incomplete.account_name.is_empty());
    assert!(incomplete.carrier.is_empty());

    let complete = &records.records[1];
    assert_eq!(complete.account_name, "ACME CORP");
    assert_eq!(complete.carrier_type, "mobile");

    assert_eq!(records.records[2].valid, NOT_VALID);
}

#[tokio::test]
async fn test_vendor_failure_is_not_treated_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "Mobile_Phone\n+11234567890\n+12222222222\n");

    let validator = MockValidator::new(vec![
        (
            "+11234567890",
            LookupOutcome::Failed(VendorError {
                status: 429,
                code: Some(20429),
                message: "Too Many Requests".to_string(),
                more_info: None,
            }),
        ),
        ("+12222222222", found("+12222222222", true, true)),
    ]);

    let mut records = import_rows(&input, true, 0, 0).unwrap();
    let summary = enrich(&validator, &mut records).await;

    assert_eq!(summary.lookup_failures, 1);
    assert_eq!(summary.not_valid, 0);
    let failed = &records.records[0];
    assert!(failed.valid.is_empty());
    assert!(failed.account_name.is_empty());
    assert_eq!(records.records[1].carrier, "Verizon Wireless");
}

#[tokio::test]
async fn test_partial_run_only_looks_up_selected_rows() {
    let dir = tempfile::tempdir().unwrap();
    let phones: Vec<String> = (0..8).map(|i| format!("+1555000000{}", i)).collect();
    let input = write_input(dir.path(), &format!("Mobile_Phone\n{}\n", phones.join("\n")));

    let validator = MockValidator::new(vec![]);
    let mut records = import_rows(&input, false, 2, 5).unwrap();
    enrich(&validator, &mut records).await;

    assert_eq!(records.len(), 3);
    assert_eq!(validator.calls(), phones[2..5].to_vec());
    assert_eq!(
        records.iter().map(|r| r.row).collect::<Vec<_>>(),
        vec![2, 3, 4]
    );
}

#[tokio::test]
async fn test_save_then_reimport_preserves_phones_and_passthrough() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "Id,Mobile_Phone,Notes\n1,+11234567890,\"call after 5, weekdays\"\n2,+10000000000,\n",
    );
    let output = dir.path().join("validated.csv");

    let validator = MockValidator::new(vec![("+11234567890", found("+11234567890", true, true))]);
    let mut records = import_rows(&input, true, 0, 0).unwrap();
    enrich(&validator, &mut records).await;
    assert!(save_rows(&output, &records));

    let reimported = import_rows(&output, true, 0, 0).unwrap();
    assert_eq!(reimported.mobile_phones(), records.mobile_phones());
    assert_eq!(reimported.headers, vec!["Id", "Mobile_Phone", "Notes"]);
    assert_eq!(reimported.records[0].fields[2], "call after 5, weekdays");
    assert!(reimported.iter().all(|r| r.valid.is_empty()));
}

#[test]
fn test_save_to_missing_directory_returns_false() {
    let dir = tempfile::tempdir().unwrap();
    let records = rust_twilio_comms::enrichment::read_rows(
        "Mobile_Phone\n+11234567890\n".as_bytes(),
        true,
        0,
        0,
    )
    .unwrap();
    assert!(!save_rows(dir.path().join("no/such/dir/out.csv"), &records));
}

#[test]
fn test_import_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(import_rows(dir.path().join("absent.csv"), true, 0, 0).is_err());
}
