//! Request ID extraction from a real success log

mod helpers;

use helpers::{Fixture, ScriptedClient};
use hmis_stage::services::IdExtractor;
use hmis_stage::ExtractError;
use tempfile::TempDir;

#[tokio::test]
async fn test_extracts_ids_written_by_staging() {
    let client = ScriptedClient::new().with_counts(|r| if r.days() == 31 { 3000 } else { 10 });
    let fixture = Fixture::new(client);
    let session = fixture.session(2013, 8);
    fixture.orchestrator.run(&session).await.unwrap();

    let extractor = IdExtractor::new(&fixture.config.id_prefix).unwrap();
    let output = fixture.config.id_list_path();
    let extraction = extractor
        .extract_file(&fixture.config.success_log_path(), &output)
        .unwrap();

    assert_eq!(extraction.ids, vec!["JSOC_20130801_1", "JSOC_20130817_2"]);
    assert!(extraction.unmatched.is_empty());
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "JSOC_20130801_1\nJSOC_20130817_2\n"
    );
}

#[test]
fn test_unmatched_lines_not_written() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("request_numbers.txt");
    let output = temp_dir.path().join("request_ids.txt");
    std::fs::write(
        &input,
        "SUCCESS! Timespan: 01/16/2015 to 01/23/2015; ID: JSOC_20150116_77\n\
         SUCCESS! Timespan: 01/24/2015 to 01/31/2015; ID: pending\n",
    )
    .unwrap();

    let extraction = IdExtractor::new("JSOC")
        .unwrap()
        .extract_file(&input, &output)
        .unwrap();

    assert_eq!(extraction.ids, vec!["JSOC_20150116_77"]);
    assert_eq!(extraction.unmatched.len(), 1);
    assert_eq!(extraction.unmatched[0].0, 2);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "JSOC_20150116_77\n");
}

#[test]
fn test_missing_input_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = IdExtractor::new("JSOC")
        .unwrap()
        .extract_file(&temp_dir.path().join("missing.txt"), &temp_dir.path().join("out.txt"));

    assert!(matches!(result, Err(ExtractError::Io { .. })));
}
