use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use tabular_ingest::ingestion::csv::read_csv_from_path;
use tabular_ingest::ingestion::{read_table_from_path, FileFormat, ReadOptions};
use tabular_ingest::IngestionError;

fn write_sales_parquet(path: &Path) {
    let schema_str = r#"
    message schema {
      REQUIRED BINARY day (UTF8);
      REQUIRED INT64 units;
      OPTIONAL BINARY region (UTF8);
    }
    "#;

    let schema = Arc::new(parse_message_type(schema_str).unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).unwrap();
    let mut writer = SerializedFileWriter::new(file, schema, props).unwrap();

    let mut rg = writer.next_row_group().unwrap();
    let mut col_idx: usize = 0;
    while let Some(mut col) = rg.next_column().unwrap() {
        match (col_idx, col.untyped()) {
            (0, ColumnWriter::ByteArrayColumnWriter(w)) => {
                let days = [ByteArray::from("2024-01-01"), ByteArray::from("2024-01-02")];
                w.write_batch(&days, None, None).unwrap();
            }
            (1, ColumnWriter::Int64ColumnWriter(w)) => {
                w.write_batch(&[5_i64, 9_i64], None, None).unwrap();
            }
            (2, ColumnWriter::ByteArrayColumnWriter(w)) => {
                // Second row is null (definition level 0).
                w.write_batch(&[ByteArray::from("north")], Some(&[1, 0]), None)
                    .unwrap();
            }
            _ => panic!("unexpected column writer in test"),
        }
        col.close().unwrap();
        col_idx += 1;
    }
    rg.close().unwrap();
    writer.close().unwrap();
}

fn scratch(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

#[test]
fn csv_fixture_is_read_as_text() {
    let table = read_csv_from_path("tests/fixtures/sales.csv", None).unwrap();

    assert_eq!(table.columns, vec!["date", "amount", "quantity", "category"]);
    assert_eq!(table.row_count(), 8);
    assert_eq!(table.rows[2][1].as_deref(), Some("1,024.75"));
    assert_eq!(table.rows[0][0].as_deref(), Some("2024-01-01"));
}

#[test]
fn sample_option_limits_rows() {
    let table = read_table_from_path("tests/fixtures/sales.csv", &ReadOptions::sample(3)).unwrap();
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.column_count(), 4);
}

#[test]
fn ragged_csv_rows_are_padded() {
    let (_dir, path) = scratch("ragged.csv");
    std::fs::write(&path, "a,b,c\n1,2\n3,4,5,6\n").unwrap();

    let table = read_table_from_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(table.rows[0], vec![Some("1".to_string()), Some("2".to_string()), None]);
    assert_eq!(table.rows[1].len(), 3);
}

#[test]
fn parquet_is_read_by_extension_with_nulls() {
    let (_dir, path) = scratch("sales.parquet");
    write_sales_parquet(&path);

    let table = read_table_from_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(table.columns, vec!["day", "units", "region"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.rows[0][0].as_deref(), Some("2024-01-01"));
    assert_eq!(table.rows[1][1].as_deref(), Some("9"));
    assert_eq!(table.rows[0][2].as_deref(), Some("north"));
    assert_eq!(table.rows[1][2], None);
}

#[test]
fn explicit_format_overrides_extension() {
    let (_dir, path) = scratch("export.txt");
    std::fs::copy("tests/fixtures/sales.csv", &path).unwrap();

    let options = ReadOptions {
        format: Some(FileFormat::Csv),
        limit: None,
    };
    let table = read_table_from_path(&path, &options).unwrap();
    assert_eq!(table.row_count(), 8);
}

#[test]
fn unknown_extension_is_unsupported() {
    let err = read_table_from_path("tests/fixtures/report.json", &ReadOptions::default()).unwrap_err();
    assert!(matches!(err, IngestionError::UnsupportedFormat { ref extension } if extension == "json"));
}

#[test]
fn format_dispatch_is_case_insensitive() {
    assert_eq!(FileFormat::from_path("Q1.CSV").unwrap(), FileFormat::Csv);
    assert_eq!(FileFormat::from_path("book.XLS").unwrap(), FileFormat::Excel);
    assert_eq!(FileFormat::from_path("book.xlsx").unwrap(), FileFormat::Excel);
    assert_eq!(FileFormat::from_path("x.parquet").unwrap(), FileFormat::Parquet);
    assert!(FileFormat::from_path("noext").is_err());
}

#[cfg(feature = "excel_test_writer")]
#[test]
fn excel_first_sheet_is_read_with_header_detection() {
    use rust_xlsxwriter::Workbook;

    let (_dir, path) = scratch("sales.xlsx");
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("Sales").unwrap();

    // Leading blank row; header is row 1.
    ws.write_string(1, 0, "date").unwrap();
    ws.write_string(1, 1, "amount").unwrap();
    ws.write_string(1, 2, "units").unwrap();
    ws.write_string(2, 0, "2024-01-01").unwrap();
    ws.write_number(2, 1, 12.5).unwrap();
    ws.write_number(2, 2, 3).unwrap();
    ws.write_string(3, 0, "2024-01-02").unwrap();
    ws.write_number(3, 1, 7.25).unwrap();
    ws.write_number(3, 2, 4).unwrap();
    wb.save(&path).unwrap();

    let table = read_table_from_path(&path, &ReadOptions::default()).unwrap();
    assert_eq!(table.columns, vec!["date", "amount", "units"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.rows[0][1].as_deref(), Some("12.5"));
    assert_eq!(table.rows[0][2].as_deref(), Some("3"));
}
