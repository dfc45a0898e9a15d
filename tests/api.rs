//! Integration tests for the sync, async and job-status flows.
//!
//! Every test runs against a local `mockito` server; no network access or
//! API key is needed.
//!
//! Run with:
//!   cargo test --test api

use any_parser::{
    AnyParser, AnyParserError, ClientConfig, ExtractArgs, ExtractionRequest, ExtractionResult,
    FetchOptions, FileInput, JobState, Operation,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use mockito::Matcher;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const API_KEY: &str = "test-key";

fn client_for(url: &str) -> AnyParser {
    let config = ClientConfig::builder(API_KEY)
        .base_url(url)
        .batch_url(url)
        .poll_interval_ms(10)
        .poll_timeout_secs(5)
        .build()
        .unwrap();
    AnyParser::with_config(config).unwrap()
}

/// Write `bytes` to `<dir>/<name>` and return the path.
fn fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn fast_poll() -> FetchOptions {
    FetchOptions {
        wait: true,
        timeout: Duration::from_secs(5),
        interval: Duration::from_millis(10),
    }
}

// ── Sync extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sync_parse_joins_markdown_pages() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "doc.pdf", b"%PDF-1.4 test");

    let mock = server
        .mock("POST", "/anyparser/sync_parse")
        .match_header("x-api-key", API_KEY)
        .match_body(Matcher::PartialJson(json!({
            "file_content": STANDARD.encode(b"%PDF-1.4 test"),
            "file_type": "pdf",
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"markdown": ["a", "b"]}"#)
        .create_async()
        .await;

    let out = client_for(&server.url())
        .parse(FileInput::path(&pdf))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(out.result, ExtractionResult::Markdown("a\nb".into()));
    assert!(out.elapsed_display().starts_with("Time Elapsed: "));
}

#[tokio::test]
async fn test_sync_server_error_embeds_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/anyparser/sync_parse_pro")
        .with_status(500)
        .with_body("internal exploded")
        .create_async()
        .await;

    let err = client_for(&server.url())
        .parse_pro(FileInput::content(STANDARD.encode(b"img"), "png"))
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("500"), "got: {msg}");
    assert!(msg.contains("internal exploded"), "got: {msg}");
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_sync_forbidden_is_auth_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/anyparser/sync_extract_pii")
        .with_status(403)
        .with_body(r#"{"message": "Forbidden"}"#)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .extract_pii(FileInput::content("aGk=", "pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, AnyParserError::AuthError { status: 403, .. }));
}

#[tokio::test]
async fn test_sync_invalid_json_keeps_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/anyparser/sync_parse")
        .with_status(200)
        .with_body("<html>gateway</html>")
        .create_async()
        .await;

    let err = client_for(&server.url())
        .parse(FileInput::content("aGk=", "pdf"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid JSON response: <html>gateway</html>");
}

#[tokio::test]
async fn test_sync_key_value_sends_description_pairs() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/anyparser/sync_extract_key_value")
        .match_body(Matcher::PartialJson(json!({
            "extract_input_key_description_pairs": [
                {"key": "ein", "description": "employer identification number"}
            ]
        })))
        .with_status(200)
        .with_body(r#"{"json": [{"ein": "78-8778788"}]}"#)
        .create_async()
        .await;

    let mut instruction = BTreeMap::new();
    instruction.insert("ein".to_string(), "employer identification number".to_string());
    let out = client_for(&server.url())
        .extract_key_value(FileInput::content("aGk=", "pdf"), instruction)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(
        out.result,
        ExtractionResult::KeyValue(json!([{"ein": "78-8778788"}]))
    );
}

#[tokio::test]
async fn test_sync_ocr_sends_extract_tables_flag() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/anyparser/sync_parse_textract")
        .match_body(Matcher::PartialJson(json!({"extract_tables": true})))
        .with_status(200)
        .with_body(r##"{"markdown": "# scanned"}"##)
        .create_async()
        .await;

    let out = client_for(&server.url())
        .parse_with_ocr(FileInput::content("aGk=", "jpg"), true)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(out.result.as_markdown(), Some("# scanned"));
}

#[tokio::test]
async fn test_sync_tables_result_keeps_each_table() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/anyparser/sync_extract_tables")
        .with_status(200)
        .with_body(r#"{"markdown": ["<table><tr><td>1</td></tr></table>", "<table></table>"]}"#)
        .create_async()
        .await;

    let out = client_for(&server.url())
        .extract_tables(FileInput::content("aGk=", "pdf"))
        .await
        .unwrap();
    match out.result {
        ExtractionResult::Tables(tables) => assert_eq!(tables.len(), 2),
        other => panic!("expected tables, got {other:?}"),
    }
}

#[tokio::test]
async fn test_validation_fails_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;
    let client = client_for(&server.url());

    let missing = client
        .parse(FileInput::path("nonexistent.docx"))
        .await
        .unwrap_err();
    assert_eq!(missing.to_string(), "File does not exist: nonexistent.docx");

    let dir = tempfile::tempdir().unwrap();
    let txt = fixture(dir.path(), "notes.txt", b"plain text");
    let unsupported = client.parse(FileInput::path(&txt)).await.unwrap_err();
    assert_eq!(
        unsupported.to_string(),
        "Unsupported file type: txt. Supported file types: doc, docx, gif, jpeg, jpg, pdf, png, ppt, pptx"
    );

    let no_instruction = client
        .extract(&ExtractionRequest::new(
            FileInput::content("aGk=", "pdf"),
            Operation::ExtractKeyValue,
        ))
        .await
        .unwrap_err();
    assert!(matches!(no_instruction, AnyParserError::InvalidArgument(_)));

    mock.assert_async().await;
}

#[test]
fn test_extract_blocking_outside_runtime() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/anyparser/sync_extract_resume_key_value")
        .with_status(200)
        .with_body(r#"{"extraction_result": {"skills": ["rust"]}}"#)
        .create();

    let out = client_for(&server.url())
        .extract_blocking(&ExtractionRequest::new(
            FileInput::content("aGk=", "docx"),
            Operation::ExtractResume,
        ))
        .unwrap();
    assert_eq!(
        out.result,
        ExtractionResult::Resume(json!({"skills": ["rust"]}))
    );
}

// ── Async submit ─────────────────────────────────────────────────────────────

fn upload_intent(server_url: &str, file_id: &str) -> String {
    json!({
        "fileId": file_id,
        "presignedUrl": {
            "url": format!("{server_url}/bucket"),
            "fields": {"key": format!("uploads/{file_id}"), "policy": "p0l1cy"}
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_submit_uploads_to_presigned_url() {
    let mut server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let pdf = fixture(dir.path(), "doc.pdf", b"%PDF-1.4 payload");

    let intent = server
        .mock("POST", "/async/upload")
        .match_header("x-api-key", API_KEY)
        .match_body(Matcher::PartialJson(json!({
            "file_name": "doc.pdf",
            "process_type": "parse_with_layout",
        })))
        .with_status(200)
        .with_body(upload_intent(&server.url(), "job-1"))
        .create_async()
        .await;
    let storage = server
        .mock("POST", "/bucket")
        .match_header("x-api-key", Matcher::Missing)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("uploads/job-1".into()),
            Matcher::Regex("p0l1cy".into()),
            Matcher::Regex(r#"name="file"; filename="doc.pdf""#.into()),
            Matcher::Regex("%PDF-1.4 payload".into()),
        ]))
        .with_status(204)
        .create_async()
        .await;

    let job_id = client_for(&server.url())
        .submit(&ExtractionRequest::new(FileInput::path(&pdf), Operation::ParsePro))
        .await
        .unwrap();

    intent.assert_async().await;
    storage.assert_async().await;
    assert_eq!(job_id, "job-1");
}

#[tokio::test]
async fn test_submit_content_uploads_decoded_bytes() {
    let mut server = mockito::Server::new_async().await;
    let _intent = server
        .mock("POST", "/async/upload")
        .match_body(Matcher::PartialJson(json!({
            "file_name": "file.png",
            "process_type": "extract_key_value",
            "extract_args": {
                "extract_input_key_description_pairs": [{"key": "total", "description": "amount due"}]
            }
        })))
        .with_status(200)
        .with_body(upload_intent(&server.url(), "job-2"))
        .create_async()
        .await;
    let storage = server
        .mock("POST", "/bucket")
        .match_body(Matcher::Regex("raw image bytes".into()))
        .with_status(204)
        .create_async()
        .await;

    let request = ExtractionRequest::new(
        FileInput::content(STANDARD.encode(b"raw image bytes"), "png"),
        Operation::ExtractKeyValue,
    )
    .with_args(ExtractArgs::with_instruction([("total", "amount due")]));
    let job_id = client_for(&server.url()).submit(&request).await.unwrap();

    storage.assert_async().await;
    assert_eq!(job_id, "job-2");
}

#[tokio::test]
async fn test_submit_presigned_rejection_is_upload_failure() {
    let mut server = mockito::Server::new_async().await;
    let _intent = server
        .mock("POST", "/async/upload")
        .with_status(200)
        .with_body(upload_intent(&server.url(), "job-3"))
        .create_async()
        .await;
    let _storage = server
        .mock("POST", "/bucket")
        .with_status(403)
        .with_body("AccessDenied")
        .create_async()
        .await;

    let err = client_for(&server.url())
        .submit(&ExtractionRequest::new(
            FileInput::content("aGk=", "pdf"),
            Operation::Parse,
        ))
        .await
        .unwrap_err();
    match err {
        AnyParserError::UploadFailed { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "AccessDenied");
        }
        other => panic!("expected upload failure, got {other}"),
    }
}

#[tokio::test]
async fn test_submit_undecodable_content_registers_no_job() {
    let mut server = mockito::Server::new_async().await;
    let intent = server
        .mock("POST", "/async/upload")
        .expect(0)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .submit(&ExtractionRequest::new(
            FileInput::content("not base64 !!", "pdf"),
            Operation::Parse,
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, AnyParserError::Base64(_)));
    intent.assert_async().await;
}

// ── Async fetch ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_no_wait_returns_none_while_processing() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/async/fetch")
        .match_body(Matcher::Json(json!({"file_id": "job-1"})))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .fetch("job-1", Some(Operation::Parse), fast_poll().no_wait())
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(result.is_none());
}

#[tokio::test]
async fn test_fetch_polls_until_ready() {
    let mut server = mockito::Server::new_async().await;
    let pending = server
        .mock("POST", "/async/fetch")
        .with_status(202)
        .expect(2)
        .create_async()
        .await;
    let done = server
        .mock("POST", "/async/fetch")
        .with_status(200)
        .with_body(r#"{"pii_extraction": {"name": "Jane"}}"#)
        .expect(1)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .fetch("job-1", Some(Operation::ExtractPii), fast_poll())
        .await
        .unwrap();

    pending.assert_async().await;
    done.assert_async().await;
    assert_eq!(result, Some(ExtractionResult::Pii(json!({"name": "Jane"}))));
}

#[tokio::test]
async fn test_fetch_without_operation_uses_probe_order() {
    let mut server = mockito::Server::new_async().await;
    let _done = server
        .mock("POST", "/async/fetch")
        .with_status(200)
        .with_body(r#"{"markdown": ["m"], "resume_extraction": {"education": []}}"#)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .fetch("job-9", None, fast_poll())
        .await
        .unwrap();
    assert_eq!(
        result,
        Some(ExtractionResult::Resume(json!({"education": []})))
    );
}

#[tokio::test]
async fn test_fetch_times_out_while_processing() {
    let mut server = mockito::Server::new_async().await;
    let _pending = server
        .mock("POST", "/async/fetch")
        .with_status(202)
        .create_async()
        .await;

    let options = fast_poll().timeout(Duration::from_millis(60));
    let err = client_for(&server.url())
        .fetch("slow-job", Some(Operation::Parse), options)
        .await
        .unwrap_err();
    assert!(matches!(err, AnyParserError::Timeout { .. }));
    assert!(err.to_string().starts_with("timeout"), "got: {err}");
}

#[tokio::test]
async fn test_fetch_other_status_is_terminal() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/async/fetch")
        .with_status(404)
        .with_body("no such file")
        .expect(1)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .fetch("missing", Some(Operation::Parse), fast_poll())
        .await
        .unwrap_err();
    mock.assert_async().await;
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_extract_async_submits_then_fetches() {
    let mut server = mockito::Server::new_async().await;
    let _intent = server
        .mock("POST", "/async/upload")
        .match_body(Matcher::PartialJson(json!({"process_type": "extract_tables"})))
        .with_status(200)
        .with_body(upload_intent(&server.url(), "job-t"))
        .create_async()
        .await;
    let _storage = server
        .mock("POST", "/bucket")
        .with_status(204)
        .create_async()
        .await;
    let _fetch = server
        .mock("POST", "/async/fetch")
        .match_body(Matcher::Json(json!({"file_id": "job-t"})))
        .with_status(200)
        .with_body(r#"{"markdown": ["<table></table>"]}"#)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .extract_async(
            &ExtractionRequest::new(FileInput::content("aGk=", "pdf"), Operation::ExtractTables),
            fast_poll(),
        )
        .await
        .unwrap();
    assert_eq!(
        result,
        Some(ExtractionResult::Tables(vec!["<table></table>".into()]))
    );
}

// ── Job status ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_job_status_reports_state() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/anyparser/job_status/j1")
        .match_header("x-api-key", API_KEY)
        .with_status(200)
        .with_body(r#"{"status": "processing"}"#)
        .create_async()
        .await;

    let status = client_for(&server.url()).job_status("j1").await.unwrap();
    assert_eq!(status.status, JobState::Processing);
}

#[tokio::test]
async fn test_wait_for_job_follows_result_url() {
    let mut server = mockito::Server::new_async().await;
    let _pending = server
        .mock("GET", "/anyparser/job_status/j1")
        .with_status(200)
        .with_body(r#"{"status": "pending"}"#)
        .expect(1)
        .create_async()
        .await;
    let _completed = server
        .mock("GET", "/anyparser/job_status/j1")
        .with_status(200)
        .with_body(
            json!({"status": "completed", "result_url": format!("{}/results/j1.json", server.url())})
                .to_string(),
        )
        .create_async()
        .await;
    let download = server
        .mock("GET", "/results/j1.json")
        .match_header("x-api-key", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"markdown": ["x", "y"]}"#)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .wait_for_job("j1", Some(Operation::Parse), fast_poll())
        .await
        .unwrap();

    download.assert_async().await;
    assert_eq!(result, Some(ExtractionResult::Markdown("x\ny".into())));
}

#[tokio::test]
async fn test_wait_for_job_falls_back_to_inline_result() {
    let mut server = mockito::Server::new_async().await;
    let _completed = server
        .mock("GET", "/anyparser/job_status/j2")
        .with_status(200)
        .with_body(
            json!({
                "status": "completed",
                "result_url": format!("{}/results/expired", server.url()),
                "result": {"markdown": "inline copy"}
            })
            .to_string(),
        )
        .create_async()
        .await;
    let _expired = server
        .mock("GET", "/results/expired")
        .with_status(403)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .wait_for_job("j2", Some(Operation::Parse), fast_poll())
        .await
        .unwrap();
    assert_eq!(result, Some(ExtractionResult::Markdown("inline copy".into())));
}

#[tokio::test]
async fn test_wait_for_job_failed_carries_message() {
    let mut server = mockito::Server::new_async().await;
    let _failed = server
        .mock("GET", "/anyparser/job_status/j3")
        .with_status(200)
        .with_body(r#"{"status": "failed", "error": "corrupt file"}"#)
        .create_async()
        .await;

    let err = client_for(&server.url())
        .wait_for_job("j3", None, fast_poll())
        .await
        .unwrap_err();
    match err {
        AnyParserError::JobFailed { job_id, message } => {
            assert_eq!(job_id, "j3");
            assert_eq!(message, "corrupt file");
        }
        other => panic!("expected job failure, got {other}"),
    }
}

#[tokio::test]
async fn test_wait_for_job_no_wait_returns_none() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/anyparser/job_status/j4")
        .with_status(200)
        .with_body(r#"{"status": "pending"}"#)
        .expect(1)
        .create_async()
        .await;

    let result = client_for(&server.url())
        .wait_for_job("j4", None, fast_poll().no_wait())
        .await
        .unwrap();
    mock.assert_async().await;
    assert!(result.is_none());
}
