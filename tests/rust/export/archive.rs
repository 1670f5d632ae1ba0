//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Errzip.
//! The Errzip project belongs to the Dunimd Team.

use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use errzip::{
    export_error_log, EzArchiveConfig, EzArchiveWriter, EzCancelToken, EzEntryCompression,
    EzError, EzErrorPayload, EzExportRequest, EzLogPager, EzLogStore, EzMemoryErrorLog,
    EzMissingDetailPolicy, EzPage, EzPositionSink, EzRecord, EzRecordDetail, EzStorePager,
    EzTextEncoding, EzXmlSerializer, EzZipArchive, Result,
};
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

fn payload(i: usize) -> EzErrorPayload {
    let time = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(i as i64);
    let mut payload = EzErrorPayload::new("System.NullReferenceException", time);
    payload.host = Some("web-01".to_string());
    payload.message = Some(format!("failure number {}", i));
    payload.server_variables.push("REMOTE_ADDR", "10.0.0.7");
    payload
}

async fn seeded(count: usize) -> Arc<EzMemoryErrorLog> {
    let log = Arc::new(EzMemoryErrorLog::new("test"));
    for i in 0..count {
        log.log_with_id(format!("e{:03}", i), payload(i)).await.unwrap();
    }
    log
}

/// Newest first, matching the in-memory store's listing order.
fn expected_names(count: usize) -> Vec<String> {
    (0..count).rev().map(|i| format!("error-e{:03}.xml", i)).collect()
}

fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

struct CountingPager<S: EzLogStore> {
    inner: EzStorePager<S>,
    calls: AtomicUsize,
}

#[async_trait]
impl<S: EzLogStore> EzLogPager for CountingPager<S> {
    async fn fetch_page(
        &self,
        page_index: usize,
        page_size: usize,
        cancel: &EzCancelToken,
    ) -> Result<EzPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_page(page_index, page_size, cancel).await
    }
}

/// Lists a record between `a` and `b` whose detail no longer exists.
struct GhostStore {
    inner: EzMemoryErrorLog,
}

impl GhostStore {
    async fn new() -> Self {
        let inner = EzMemoryErrorLog::new("ghost");
        inner.log_with_id("a", payload(1)).await.unwrap();
        inner.log_with_id("b", payload(2)).await.unwrap();
        GhostStore { inner }
    }
}

#[async_trait]
impl EzLogStore for GhostStore {
    fn name(&self) -> &str {
        "ghost"
    }

    async fn get_errors(&self, page_index: usize, _page_size: usize) -> Result<Vec<EzRecord>> {
        if page_index > 0 {
            return Ok(Vec::new());
        }
        Ok(vec![EzRecord::new("a"), EzRecord::new("ghost"), EzRecord::new("b")])
    }

    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>> {
        self.inner.get_error(id).await
    }
}

async fn run_counted(count: usize, page_size: usize) -> (Vec<u8>, usize, usize) {
    let store = seeded(count).await;
    let pager = CountingPager {
        inner: EzStorePager::new(store.clone()),
        calls: AtomicUsize::new(0),
    };
    let fetcher = EzStorePager::new(store);
    let config = EzArchiveConfig {
        page_size,
        ..Default::default()
    };

    let mut out = Vec::new();
    let mut archive = EzZipArchive::new(EzPositionSink::new(&mut out));
    let stats = EzArchiveWriter::new()
        .with_config(config)
        .run(
            &pager,
            &fetcher,
            &EzXmlSerializer::new(),
            &mut archive,
            &EzCancelToken::detached(),
        )
        .await
        .unwrap();
    archive.finish().unwrap();

    assert_eq!(stats.pages_fetched, pager.calls.load(Ordering::SeqCst));
    (out, pager.calls.load(Ordering::SeqCst), stats.entries_written)
}

#[tokio::test]
async fn test_page_fetches_cover_store_plus_terminator() {
    for (count, page_size) in [(0, 3), (1, 3), (3, 3), (7, 3), (10, 1), (5, 100)] {
        let (out, calls, written) = run_counted(count, page_size).await;
        assert_eq!(calls, (count + page_size - 1) / page_size + 1);
        assert_eq!(written, count);
        assert_eq!(entry_names(&out), expected_names(count));
    }
}

#[tokio::test]
async fn test_names_are_stable_across_runs() {
    let (first, _, _) = run_counted(6, 4).await;
    let (second, _, _) = run_counted(6, 4).await;
    assert_eq!(entry_names(&first), entry_names(&second));
}

#[tokio::test]
async fn test_empty_store_yields_valid_empty_archive() {
    let mut out = Vec::new();
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        Arc::new(EzMemoryErrorLog::default()),
    );
    let report = export_error_log(request).await.unwrap();

    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.stats.entries_written, 0);
    assert_eq!(report.bytes_written, out.len() as u64);
    assert!(entry_names(&out).is_empty());
}

#[tokio::test]
async fn test_missing_detail_is_skipped_by_default() {
    let mut out = Vec::new();
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        GhostStore::new().await,
    );
    let report = export_error_log(request).await.unwrap();

    assert_eq!(report.stats.records_listed, 3);
    assert_eq!(report.stats.records_skipped, 1);
    assert_eq!(report.stats.entries_written, 2);
    assert_eq!(entry_names(&out), vec!["error-a.xml", "error-b.xml"]);
}

#[tokio::test]
async fn test_missing_detail_aborts_when_configured() {
    let mut out = Vec::new();
    let config = EzArchiveConfig {
        missing_detail: EzMissingDetailPolicy::Abort,
        ..Default::default()
    };
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        GhostStore::new().await,
    )
    .with_config(config);

    let err = export_error_log(request).await.unwrap_err();
    assert!(matches!(err, EzError::NotFound { ref id } if id == "ghost"));
    assert_eq!(entry_names(&out), vec!["error-a.xml"]);
}

#[tokio::test]
async fn test_export_to_file_decodes_back() {
    let store = seeded(4).await;
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = EzArchiveConfig {
        page_size: 3,
        compression: EzEntryCompression::Stored,
        ..Default::default()
    };

    let request = EzExportRequest::new(
        file.reopen().unwrap(),
        CancellationToken::new(),
        CancellationToken::new(),
        store.clone(),
    )
    .with_config(config);
    assert_eq!(request.response().content_type, "application/zip");
    let report = export_error_log(request).await.unwrap();
    assert_eq!(report.stats.entries_written, 4);

    let bytes = std::fs::read(file.path()).unwrap();
    assert_eq!(bytes.len() as u64, report.bytes_written);

    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let serializer = EzXmlSerializer::new();
    for (position, index) in (0..4).rev().enumerate() {
        let mut entry = zip.by_index(position).unwrap();
        assert_eq!(entry.name(), format!("error-e{:03}.xml", index));

        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        let decoded = serializer.decode(&body, EzTextEncoding::Utf8).unwrap();
        assert_eq!(decoded, payload(index));
    }
}

#[tokio::test]
async fn test_tidy_names_and_utf16_entries() {
    let store = Arc::new(EzMemoryErrorLog::default());
    store.log_with_id("2025/06/01 #7", payload(7)).await.unwrap();

    let mut out = Vec::new();
    let config = EzArchiveConfig {
        encoding: EzTextEncoding::Utf16Le,
        tidy_entry_names: true,
        ..Default::default()
    };
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        store,
    )
    .with_config(config);
    export_error_log(request).await.unwrap();

    let mut zip = ZipArchive::new(Cursor::new(out)).unwrap();
    let mut entry = zip.by_index(0).unwrap();
    assert_eq!(entry.name(), "error-2025-06-01-7.xml");

    let mut body = Vec::new();
    entry.read_to_end(&mut body).unwrap();
    let decoded = EzXmlSerializer::new()
        .decode(&body, EzTextEncoding::Utf16Le)
        .unwrap();
    assert_eq!(decoded, payload(7));
}

/// Serves the wrapped log until `fail_page` or `fail_id` is reached.
struct FailingStore {
    inner: Arc<EzMemoryErrorLog>,
    fail_page: Option<usize>,
    fail_id: Option<&'static str>,
}

#[async_trait]
impl EzLogStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn get_errors(&self, page_index: usize, page_size: usize) -> Result<Vec<EzRecord>> {
        if self.fail_page == Some(page_index) {
            return Err(EzError::internal("connection to log database lost"));
        }
        self.inner.get_errors(page_index, page_size).await
    }

    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>> {
        if self.fail_id == Some(id) {
            return Err(EzError::Io("read timed out".to_string()));
        }
        self.inner.get_error(id).await
    }
}

#[tokio::test]
async fn test_page_failure_aborts_and_keeps_closed_entries() {
    let store = FailingStore {
        inner: seeded(5).await,
        fail_page: Some(1),
        fail_id: None,
    };
    let config = EzArchiveConfig {
        page_size: 2,
        ..Default::default()
    };

    let mut out = Vec::new();
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        store,
    )
    .with_config(config);
    let err = export_error_log(request).await.unwrap_err();

    assert!(matches!(err, EzError::StoreFailure { ref message } if message.contains("page query")));
    assert_eq!(entry_names(&out), vec!["error-e004.xml", "error-e003.xml"]);
}

#[tokio::test]
async fn test_detail_failure_aborts_and_keeps_closed_entries() {
    let store = FailingStore {
        inner: seeded(4).await,
        fail_page: None,
        fail_id: Some("e001"),
    };

    let mut out = Vec::new();
    let request = EzExportRequest::new(
        &mut out,
        CancellationToken::new(),
        CancellationToken::new(),
        store,
    );
    let err = export_error_log(request).await.unwrap_err();

    assert!(matches!(err, EzError::StoreFailure { ref message } if message.contains("detail fetch")));
    assert_eq!(entry_names(&out), vec!["error-e003.xml", "error-e002.xml"]);
}
