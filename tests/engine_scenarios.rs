use catalog_lens::identifier::{IdentifierGenerator, IDENTIFIER_LEN};
use catalog_lens::{CatalogEngine, CatalogError, ErrorKind, FieldValue, MemoryStore, QueryParams, RecordStore};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PRODUCTS: &str = "\
style_code,option_code,MRP,Brick,Sleeve
A1,OPT-1,799,Shirt,Full Sleeve
A2,OPT-1,599,Jeans,
A3,OPT-2,799,T-shirt,Half Sleeve
A4,OPT-2,1299,Shirt,Half Sleeve
";

fn engine() -> CatalogEngine {
    CatalogEngine::new(Arc::new(MemoryStore::new()), IdentifierGenerator::new())
}

fn write_upload(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn style_codes(records: &[catalog_lens::Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("style_code").map(|v| v.to_string()).unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_ingest_generates_distinct_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    let upload = write_upload(dir.path(), "two.csv", "style_code,MRP\nA1,799\nA2,599\n");

    let report = engine.ingest(&upload).await.unwrap();
    assert_eq!(report.inserted_count, 2);
    assert!(!upload.exists(), "upload must be removed after ingestion");

    let all = engine.fetch_all().await.unwrap();
    assert_eq!(all.len(), 2);
    let ids: HashSet<_> = all.iter().map(|r| r.identifier().unwrap().to_string()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| id.len() == IDENTIFIER_LEN));
}

#[tokio::test]
async fn test_reingesting_same_file_never_repeats_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    let csv = "EAN_code,style_code\n890000000001,A1\n890000000002,A2\n";

    engine.ingest(write_upload(dir.path(), "a.csv", csv)).await.unwrap();
    engine.ingest(write_upload(dir.path(), "b.csv", csv)).await.unwrap();

    let all = engine.fetch_all().await.unwrap();
    assert_eq!(all.len(), 4);
    let ids: HashSet<_> = all.iter().map(|r| r.identifier().unwrap().to_string()).collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.contains("890000000001"));
    assert!(ids.contains("890000000002"));
}

#[tokio::test]
async fn test_failed_ingestion_still_removes_upload() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();

    let empty = write_upload(dir.path(), "empty.csv", "style_code,MRP\n");
    let err = engine.ingest(&empty).await.unwrap_err();
    assert!(matches!(err, CatalogError::EmptyInput));
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!empty.exists());

    let broken = dir.path().join("broken.csv");
    std::fs::write(&broken, b"a,b\n\xff\xfe,1\n").unwrap();
    let err = engine.ingest(&broken).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
    assert!(!broken.exists());

    let missing = engine.ingest(dir.path().join("never-written.csv")).await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Input);

    assert!(matches!(engine.fetch_all().await, Err(CatalogError::NoRecords)));
}

#[tokio::test]
async fn test_numeric_filter_selects_single_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine
        .ingest(write_upload(dir.path(), "two.csv", "style_code,MRP\nA1,799\nA2,599\n"))
        .await
        .unwrap();

    let hits = engine.query(&params(&[("MRP", "799")])).await.unwrap();
    assert_eq!(style_codes(&hits), vec!["A1"]);
}

#[tokio::test]
async fn test_text_filter_is_case_blind_but_whole_value() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();

    let hits = engine.query(&params(&[("Brick", "shirt")])).await.unwrap();
    assert_eq!(style_codes(&hits), vec!["A1", "A4"]);

    let err = engine.query(&params(&[("Brick", "sh")])).await.unwrap_err();
    assert!(matches!(err, CatalogError::NoMatches));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_unknown_filter_fields_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();

    let hits = engine
        .query(&params(&[("MRP", "799"), ("colour", "red"), ("$gt", "0")]))
        .await
        .unwrap();
    assert_eq!(style_codes(&hits), vec!["A1", "A3"]);
}

#[tokio::test]
async fn test_catalog_query_uses_enum_members() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();

    let hits = engine
        .query_catalog(&params(&[("Sleeve", "  half    SLEEVE"), ("Brick", "hoodie")]))
        .await
        .unwrap();
    assert_eq!(style_codes(&hits), vec!["A3", "A4"]);
}

#[tokio::test]
async fn test_schema_reports_fields_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    assert!(matches!(engine.schema().await, Err(CatalogError::NoRecords)));

    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();
    engine
        .ingest(write_upload(dir.path(), "extra.csv", "style_code,Fit\nB1,Slim\n"))
        .await
        .unwrap();

    let schema = engine.schema().await.unwrap();
    for field in ["style_code", "option_code", "MRP", "Brick", "Sleeve", "Fit", "EAN_code"] {
        assert!(schema.contains(field), "missing {}", field);
    }
    assert!(!schema.contains("_id"));
    assert_eq!(schema.value_counts_for("MRP").unwrap().get("799"), Some(&2));
    assert_eq!(schema.value_counts_for("Fit").unwrap().get("Slim"), Some(&1));

    let again = engine.schema().await.unwrap();
    assert_eq!(schema, again);
}

#[tokio::test]
async fn test_grouping_by_brick() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();
    engine
        .ingest(write_upload(dir.path(), "nobrick.csv", "style_code,Fit\nB1,Slim\n"))
        .await
        .unwrap();

    let groups = engine.grouped(&params(&[("groupBy", "Brick")])).await.unwrap();
    assert_eq!(
        groups.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["Jeans", "Shirt", "T-shirt"]
    );
    assert_eq!(style_codes(&groups["Shirt"]), vec!["A1", "A4"]);

    // every record with a Brick lands in exactly one bucket
    let grouped: usize = groups.values().map(Vec::len).sum();
    assert_eq!(grouped, 4);
}

#[tokio::test]
async fn test_grouping_applies_remaining_filters() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();

    let groups = engine
        .grouped(&params(&[("groupBy", "option_code"), ("MRP", "799")]))
        .await
        .unwrap();
    assert_eq!(style_codes(&groups["OPT-1"]), vec!["A1"]);
    assert_eq!(style_codes(&groups["OPT-2"]), vec!["A3"]);
}

#[tokio::test]
async fn test_grouping_without_group_key_is_input_error() {
    let engine = engine();
    let err = engine.grouped(&params(&[("Brick", "Shirt")])).await.unwrap_err();
    assert!(matches!(err, CatalogError::MissingGroupKey(_)));
    assert_eq!(err.kind(), ErrorKind::Input);
}

#[tokio::test]
async fn test_catalog_grouping_defaults_to_option_code() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine.ingest(write_upload(dir.path(), "p.csv", PRODUCTS)).await.unwrap();

    let groups = engine.grouped_catalog(&params(&[("Brick", "SHIRT")])).await.unwrap();
    assert_eq!(style_codes(&groups["OPT-1"]), vec!["A1"]);
    assert_eq!(style_codes(&groups["OPT-2"]), vec!["A4"]);
}

#[tokio::test]
async fn test_extra_columns_pass_through_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine
        .ingest(write_upload(dir.path(), "odd.csv", "Weird Col,MRP\n  spaced  ,0799\n"))
        .await
        .unwrap();

    let records = engine.store().find_all().await.unwrap();
    let record = &records[0];
    assert_eq!(record.get("Weird Col"), Some(&FieldValue::from("  spaced  ")));
    assert_eq!(record.get("MRP"), Some(&FieldValue::from("0799")));
}

#[tokio::test]
async fn test_long_numeric_codes_do_not_collide() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine
        .ingest(write_upload(
            dir.path(),
            "codes.csv",
            "EAN_code,style_code\n12345678901234567,A1\n12345678901234568,A2\n",
        ))
        .await
        .unwrap();

    let hits = engine
        .query(&params(&[("EAN_code", "12345678901234567")]))
        .await
        .unwrap();
    assert_eq!(style_codes(&hits), vec!["A1"]);
}

#[tokio::test]
async fn test_id_column_is_kept_as_uploaded() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine();
    engine
        .ingest(write_upload(dir.path(), "ids.csv", "_id,style_code\nabc,A1\n"))
        .await
        .unwrap();

    let records = engine.fetch_all().await.unwrap();
    assert_eq!(records[0].get("_id"), Some(&FieldValue::from("abc")));
    assert_eq!(records[0].seq(), Some(1));
}
