//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Errzip.
//! The Errzip project belongs to the Dunimd Team.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use errzip::{
    EzCancelToken, EzDetailFetcher, EzError, EzErrorPayload, EzLogPager, EzLogStore,
    EzMemoryErrorLog, EzRecord, EzRecordDetail, EzStorePager, Result,
};

async fn seeded(count: usize) -> Arc<EzMemoryErrorLog> {
    let log = Arc::new(EzMemoryErrorLog::new("test"));
    for i in 0..count {
        let time = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, i as u32).unwrap();
        let mut payload = EzErrorPayload::new("System.InvalidOperationException", time);
        payload.message = Some(format!("failure {}", i));
        log.log_with_id(format!("e{}", i), payload).await.unwrap();
    }
    log
}

#[tokio::test]
async fn test_pages_cover_store_then_run_dry() {
    let pager = EzStorePager::new(seeded(5).await);
    let cancel = EzCancelToken::detached();

    let mut sizes = Vec::new();
    let mut ids = Vec::new();
    for index in 0..4 {
        let page = pager.fetch_page(index, 2, &cancel).await.unwrap();
        assert_eq!(page.index, index);
        sizes.push(page.len());
        ids.extend(page.into_iter().map(|r| r.id));
    }

    assert_eq!(sizes, vec![2, 2, 1, 0]);
    assert_eq!(ids, vec!["e4", "e3", "e2", "e1", "e0"]);
}

#[tokio::test]
async fn test_detail_matches_listing() {
    let pager = EzStorePager::new(seeded(3).await);
    let cancel = EzCancelToken::detached();

    let page = pager.fetch_page(0, 10, &cancel).await.unwrap();
    for record in page {
        let detail = pager.fetch_detail(&record.id, &cancel).await.unwrap();
        assert_eq!(detail.id, record.id);
        assert_eq!(detail.payload.message, record.message);
        assert_eq!(Some(detail.payload.time), record.time);
    }
}

#[tokio::test]
async fn test_deleted_record_is_not_found() {
    let log = seeded(2).await;
    let pager = EzStorePager::new(log.clone());
    let cancel = EzCancelToken::detached();

    let page = pager.fetch_page(0, 10, &cancel).await.unwrap();
    assert!(log.remove("e1").await);

    let err = pager.fetch_detail(&page.records[0].id, &cancel).await.unwrap_err();
    assert!(matches!(err, EzError::NotFound { ref id } if id == "e1"));
}

#[tokio::test]
async fn test_cancelled_token_stops_queries() {
    let pager = EzStorePager::new(seeded(2).await);
    let cancel = EzCancelToken::detached();
    cancel.stop();

    let err = pager.fetch_page(0, 10, &cancel).await.unwrap_err();
    assert!(err.is_cancellation());
    let err = pager.fetch_detail("e0", &cancel).await.unwrap_err();
    assert!(err.is_cancellation());
}

struct BrokenStore;

#[async_trait::async_trait]
impl EzLogStore for BrokenStore {
    fn name(&self) -> &str {
        "broken"
    }

    async fn get_errors(&self, _page_index: usize, _page_size: usize) -> Result<Vec<EzRecord>> {
        Err(EzError::Io("socket closed".to_string()))
    }

    async fn get_error(&self, id: &str) -> Result<Option<EzRecordDetail>> {
        if id == "gone" {
            return Err(EzError::not_found(id));
        }
        Err(EzError::internal("bad row"))
    }
}

#[tokio::test]
async fn test_foreign_store_errors_become_store_failures() {
    let pager = EzStorePager::new(BrokenStore);
    let cancel = EzCancelToken::detached();

    let err = pager.fetch_page(0, 10, &cancel).await.unwrap_err();
    match err {
        EzError::StoreFailure { message } => {
            assert!(message.contains("broken"));
            assert!(message.contains("socket closed"));
        }
        other => panic!("expected a store failure, got {:?}", other),
    }

    let err = pager.fetch_detail("e0", &cancel).await.unwrap_err();
    assert!(matches!(err, EzError::StoreFailure { .. }));

    let err = pager.fetch_detail("gone", &cancel).await.unwrap_err();
    assert!(matches!(err, EzError::NotFound { .. }));
}
