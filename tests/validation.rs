use tabular_ingest::types::RawTable;
use tabular_ingest::validation::{ValidationCheck, ValidationService};

fn checks(report_issues: &[tabular_ingest::validation::ValidationIssue]) -> Vec<ValidationCheck> {
    report_issues.iter().map(|i| i.check).collect()
}

fn file_len(path: &str) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

#[test]
fn well_formed_sales_file_is_valid() {
    let path = "tests/fixtures/sales.csv";
    let before = std::fs::read(path).unwrap();

    let report = ValidationService::default().validate(path, "sales.csv", file_len(path));

    assert!(report.is_valid, "{:?}", report.validation_errors);
    assert_eq!(report.error_message, None);
    assert_eq!(report.row_count, 8);
    assert_eq!(report.column_count, 4);
    assert_eq!(std::fs::read(path).unwrap(), before);
}

#[test]
fn zero_byte_upload_fails_on_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, b"").unwrap();

    let report = ValidationService::default().validate(&path, "empty.csv", 0);

    assert!(!report.is_valid);
    assert_eq!(checks(&report.validation_errors), vec![ValidationCheck::Size]);
    assert!(report.error_message.unwrap().contains("size"));
}

#[test]
fn oversized_upload_fails_fast() {
    let report = ValidationService::new(10).validate("tests/fixtures/sales.csv", "sales.csv", 11);
    assert_eq!(checks(&report.validation_errors), vec![ValidationCheck::Size]);
    assert_eq!(report.row_count, 0);
}

#[test]
fn unsupported_extension_fails_before_reading() {
    let report = ValidationService::default().validate("does/not/exist.json", "report.json", 100);

    assert!(!report.is_valid);
    assert_eq!(checks(&report.validation_errors), vec![ValidationCheck::Format]);
    let msg = report.error_message.unwrap();
    assert!(msg.contains("json"));
    assert!(msg.contains("csv, xlsx, xls, parquet"));
}

#[test]
fn unparseable_file_is_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.parquet");
    std::fs::write(&path, b"definitely not parquet").unwrap();

    let report = ValidationService::default().validate(&path, "broken.parquet", 22);
    assert_eq!(checks(&report.validation_errors), vec![ValidationCheck::Unreadable]);
}

#[test]
fn structural_checks_accumulate() {
    let path = "tests/fixtures/no_numbers.csv";
    let report = ValidationService::default().validate(path, "no_numbers.csv", file_len(path));

    assert!(!report.is_valid);
    assert_eq!(
        checks(&report.validation_errors),
        vec![ValidationCheck::DateColumn, ValidationCheck::NumericColumns]
    );
    let msg = report.error_message.unwrap();
    assert!(msg.contains("; "));
}

#[test]
fn header_only_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("header.csv");
    std::fs::write(&path, "date,amount,qty\n").unwrap();

    let report = ValidationService::default().validate(&path, "header.csv", 16);
    assert!(checks(&report.validation_errors).contains(&ValidationCheck::Empty));
}

fn table_with_nulls(nulls: usize, rows: usize) -> RawTable {
    let data = (0..rows)
        .map(|i| {
            vec![
                Some(format!("2024-01-{:02}", i % 28 + 1)),
                Some(i.to_string()),
                Some((i * 2).to_string()),
                if i < nulls { None } else { Some("x".to_string()) },
            ]
        })
        .collect();
    RawTable::new(
        vec!["day".into(), "a".into(), "b".into(), "note".into()],
        data,
    )
}

#[test]
fn null_ratio_limit_is_strict() {
    let service = ValidationService::default();

    // Exactly 90% null passes.
    assert!(service.validate_table(&table_with_nulls(9, 10)).is_empty());

    let issues = service.validate_table(&table_with_nulls(10, 10));
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].check, ValidationCheck::NullRatio);
    assert_eq!(issues[0].column.as_deref(), Some("note"));
}

#[test]
fn single_column_fails_column_count() {
    let table = RawTable::new(vec!["day".into()], vec![vec![Some("2024-01-01".into())]]);
    let issues = ValidationService::default().validate_table(&table);
    assert!(issues.iter().any(|i| i.check == ValidationCheck::ColumnCount));
}

#[test]
fn table_without_a_date_like_column_is_rejected() {
    let path = "tests/fixtures/events_no_timestamp.csv";
    let report = ValidationService::default().validate(path, "events.csv", file_len(path));

    assert_eq!(checks(&report.validation_errors), vec![ValidationCheck::DateColumn]);
    assert_eq!(report.row_count, 4);
}
