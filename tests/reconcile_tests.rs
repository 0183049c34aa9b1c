//! End-to-end reconciliation pass over delimited snapshots.

use rust_geo_pipeline::config::Config;
use rust_geo_pipeline::errors::AppError;
use rust_geo_pipeline::pipeline::run_reconcile;

fn read_rows(path: &std::path::Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().clone();
    let rows = reader.records().map(|r| r.unwrap()).collect();
    (headers, rows)
}

#[test]
fn flags_duplicates_and_emits_unique_records() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("canonical.csv");
    let scraped = dir.path().join("scraped.csv");
    let comparison = dir.path().join("comparison.csv");
    let unique = dir.path().join("unique.csv");

    std::fs::write(
        &canonical,
        "Id,Address_Line_1__c\n\
         1,\"12, MG Road, Pune 411001\"\n",
    )
    .unwrap();
    std::fs::write(
        &scraped,
        "Branch Name,Address\n\
         Pune Branch,12 mg road pune 411001\n\
         Somewhere Else,Unrelated Rd 560001\n",
    )
    .unwrap();

    let config = Config::default();
    run_reconcile(&config, &canonical, &scraped, &comparison, &unique).unwrap();

    // The formatting differences collapse under normalization, so only the
    // second scraped record survives as unique.
    let (unique_headers, unique_rows) = read_rows(&unique);
    assert!(unique_headers.iter().any(|h| h == "Address"));
    assert_eq!(unique_rows.len(), 1);
    assert_eq!(unique_rows[0].get(0), Some("Somewhere Else"));

    // The pincode join pairs only the 411001 records and scores them.
    let (cmp_headers, cmp_rows) = read_rows(&comparison);
    assert_eq!(
        cmp_headers.iter().collect::<Vec<_>>(),
        vec![
            "Pincode",
            "Canonical_Address",
            "Scraped_Address",
            "Similarity_Score"
        ]
    );
    assert_eq!(cmp_rows.len(), 1);
    assert_eq!(cmp_rows[0].get(0), Some("411001"));
    let score: u8 = cmp_rows[0].get(3).unwrap().parse().unwrap();
    assert_eq!(score, 100, "same address modulo formatting scores 100");
}

#[test]
fn join_crosses_all_pairs_within_a_pincode_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("canonical.csv");
    let scraped = dir.path().join("scraped.csv");
    let comparison = dir.path().join("comparison.csv");
    let unique = dir.path().join("unique.csv");

    std::fs::write(
        &canonical,
        "Address_Line_1__c\n\
         A Street 411001\n\
         B Street 411001\n\
         C Street carries no pincode 1234567\n",
    )
    .unwrap();
    std::fs::write(
        &scraped,
        "Address\n\
         D Street 411001\n\
         E Street 560001\n",
    )
    .unwrap();

    let config = Config::default();
    run_reconcile(&config, &canonical, &scraped, &comparison, &unique).unwrap();

    let (_, cmp_rows) = read_rows(&comparison);
    // Two canonical addresses pair with the single scraped 411001 record.
    assert_eq!(cmp_rows.len(), 2);
    assert!(cmp_rows.iter().all(|r| r.get(0) == Some("411001")));

    // Neither scraped record matches a canonical MatchKey, so both are unique.
    let (_, unique_rows) = read_rows(&unique);
    assert_eq!(unique_rows.len(), 2);
}

#[test]
fn missing_address_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("canonical.csv");
    let scraped = dir.path().join("scraped.csv");

    std::fs::write(&canonical, "WrongColumn\nsomething\n").unwrap();
    std::fs::write(&scraped, "Address\nsomething\n").unwrap();

    let config = Config::default();
    let err = run_reconcile(
        &config,
        &canonical,
        &scraped,
        &dir.path().join("c.csv"),
        &dir.path().join("u.csv"),
    )
    .unwrap_err();

    match err {
        AppError::DataError(msg) => assert!(msg.contains("Address_Line_1__c")),
        other => panic!("expected DataError, got {}", other),
    }
}

#[test]
fn missing_input_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();

    let err = run_reconcile(
        &config,
        &dir.path().join("does_not_exist.csv"),
        &dir.path().join("also_missing.csv"),
        &dir.path().join("c.csv"),
        &dir.path().join("u.csv"),
    )
    .unwrap_err();

    assert!(matches!(err, AppError::DataError(_)));
}
