//! End-to-end runs through the orchestrator
//!
//! These tests use wiremock to serve a small book over HTTP, and the scripted
//! fetcher where exact timing or repeatability matters.

use crate::common::*;
use novel_trail::config::{Config, RunParams};
use novel_trail::crawler::{CrawlOrchestrator, LOCK_FILE};
use novel_trail::site::AdapterRegistry;
use novel_trail::state::{StopCause, TerminalReason};
use novel_trail::NovelError;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.request_delay_ms = 0;
    config.crawler.retry_delay_ms = 10;
    config.output.root = root.to_path_buf();
    config
}

fn book_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(BookAdapter));
    registry
}

fn orchestrator(root: &Path) -> CrawlOrchestrator {
    CrawlOrchestrator::new(test_config(root))
        .unwrap()
        .with_registry(book_registry())
}

async fn mount_page(server: &MockServer, p: &str, body: String, referer: Option<String>) {
    let mock = Mock::given(method("GET")).and(path(p));
    let mock = match referer {
        Some(referer) => mock.and(header("Referer", referer.as_str())),
        None => mock,
    };
    mock.respond_with(
        ResponseTemplate::new(200)
            .set_body_string(body)
            .insert_header("content-type", "text/html; charset=utf-8"),
    )
    .expect(1)
    .mount(server)
    .await;
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/1", chapter_html(1, Some("/2")), None).await;
    mount_page(&server, "/2", chapter_html(2, Some("/3")), Some(format!("{}/1", base))).await;
    mount_page(&server, "/3", chapter_html(3, None), Some(format!("{}/2", base))).await;
    mount_page(&server, "/info", INFO_HTML.to_string(), Some(format!("{}/1", base))).await;
    Mock::given(method("GET"))
        .and(path("/cover.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFFu8, 0xD8, 0xFF]))
        .expect(1)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let out = root.path().join("book");
    let mut params = RunParams::new(format!("{}/1", base));
    params.output_dir = Some(out.clone());

    let report = orchestrator(root.path())
        .run(&params, CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        report.summary.reason,
        TerminalReason::Done(StopCause::EndOfBook)
    ));
    assert_eq!(report.output_dir, out.canonicalize().unwrap());
    assert_eq!(report.summary.chapters_written, 3);
    assert!(report.summary.info_written);
    assert!(report.summary.cover_written);
    assert!(report.cleanup.is_none());

    assert_eq!(chapter_files(&out), vec![1, 2, 3]);
    assert_eq!(
        fs::read_to_string(out.join("3.txt")).unwrap(),
        "Chapter 3\nParagraph one of 3.\nParagraph two.\n"
    );
    let info = fs::read_to_string(out.join("foreword.txt")).unwrap();
    assert!(info.starts_with("The Test Book\nA. Writer\nFantasy, Mystery\n"));
    assert_eq!(fs::read(out.join("cover.jpg")).unwrap(), vec![0xFF, 0xD8, 0xFF]);
}

#[tokio::test]
async fn test_server_error_fails_run_and_keeps_files() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/1", chapter_html(1, Some("/2")), None).await;
    Mock::given(method("GET"))
        .and(path("/2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let mut config = test_config(root.path());
    config.crawler.max_retries = 1;
    let orch = CrawlOrchestrator::new(config)
        .unwrap()
        .with_registry(book_registry());

    let mut params = RunParams::new(format!("{}/1", base));
    params.output_dir = Some(root.path().join("out"));
    params.with_info = false;

    let report = orch.run(&params, CancellationToken::new()).await.unwrap();

    assert!(report.summary.reason.is_failed());
    assert_eq!(report.summary.last_index, Some(1));
    assert_eq!(chapter_files(&report.output_dir), vec![1]);
    assert!(matches!(
        report.summary.into_result(),
        Err(NovelError::Crawl {
            last_index: Some(1),
            ..
        })
    ));
}

#[tokio::test]
async fn test_default_output_location() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(root.path()).with_fetcher(Arc::new(book_fetcher(2)));

    let mut params = RunParams::new(seed(1));
    params.with_info = false;
    let report = orch.run(&params, CancellationToken::new()).await.unwrap();

    let expected_parent = root.path().join("book").canonicalize().unwrap();
    assert!(report.output_dir.starts_with(&expected_parent));
    assert!(report.output_dir.ends_with("raw"));
    assert_eq!(chapter_files(&report.output_dir), vec![1, 2]);
}

#[tokio::test]
async fn test_reset_run_is_idempotent() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("out");
    let orch = orchestrator(root.path()).with_fetcher(Arc::new(book_fetcher(3)));

    let mut params = RunParams::new(seed(1));
    params.output_dir = Some(out.clone());
    params.with_info = false;
    params.reset = true;

    orch.run(&params, CancellationToken::new()).await.unwrap();
    let first: Vec<Vec<u8>> = (1..=3)
        .map(|i| fs::read(out.join(format!("{}.txt", i))).unwrap())
        .collect();

    // A leftover from some other run must not survive the reset
    fs::write(out.join("7.txt"), "stale").unwrap();

    orch.run(&params, CancellationToken::new()).await.unwrap();
    let second: Vec<Vec<u8>> = (1..=3)
        .map(|i| fs::read(out.join(format!("{}.txt", i))).unwrap())
        .collect();

    assert_eq!(first, second);
    assert_eq!(chapter_files(&out), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_without_reset_existing_files_are_kept() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("9.txt"), "from an earlier run").unwrap();

    let orch = orchestrator(root.path()).with_fetcher(Arc::new(book_fetcher(2)));
    let mut params = RunParams::new(seed(1));
    params.output_dir = Some(out.clone());
    params.with_info = false;

    orch.run(&params, CancellationToken::new()).await.unwrap();
    assert_eq!(chapter_files(&out), vec![1, 2, 9]);
}

#[tokio::test]
async fn test_concurrent_runs_on_same_directory_are_refused() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("shared");
    let orch = orchestrator(root.path())
        .with_fetcher(Arc::new(book_fetcher(2).with_delay(Duration::from_millis(100))));

    let mut params = RunParams::new(seed(1));
    params.output_dir = Some(out.clone());
    params.with_info = false;

    let (first, second) = tokio::join!(
        orch.run(&params, CancellationToken::new()),
        orch.run(&params, CancellationToken::new())
    );

    assert!(first.unwrap().summary.reason.is_done());
    assert!(matches!(second, Err(NovelError::OutputBusy { .. })));

    // The lease is released once the run ends
    assert!(orch.run(&params, CancellationToken::new()).await.is_ok());
    assert!(!out.join(LOCK_FILE).exists());
}

#[tokio::test]
async fn test_separate_orchestrators_share_the_directory_lock() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("shared");
    let first = orchestrator(root.path())
        .with_fetcher(Arc::new(book_fetcher(2).with_delay(Duration::from_millis(100))));
    let second = orchestrator(root.path()).with_fetcher(Arc::new(book_fetcher(2)));

    let mut params = RunParams::new(seed(1));
    params.output_dir = Some(out.clone());
    params.with_info = false;
    params.reset = true;

    let (a, b) = tokio::join!(
        first.run(&params, CancellationToken::new()),
        second.run(&params, CancellationToken::new())
    );

    assert!(a.unwrap().summary.reason.is_done());
    assert!(matches!(b, Err(NovelError::OutputBusy { .. })));
    assert_eq!(chapter_files(&out), vec![1, 2]);
    assert!(!out.join(LOCK_FILE).exists());
}

#[tokio::test]
async fn test_clean_runs_post_processor() {
    let root = TempDir::new().unwrap();
    let orch = orchestrator(root.path()).with_fetcher(Arc::new(book_fetcher(3)));

    let mut params = RunParams::new(seed(1));
    params.output_dir = Some(root.path().join("out"));
    params.with_info = false;
    params.clean = true;

    let report = orch.run(&params, CancellationToken::new()).await.unwrap();

    let cleanup = report.cleanup.unwrap();
    assert_eq!(cleanup.files_seen, 3);
    // Files are already clean when written
    assert_eq!(cleanup.files_changed, 0);
}

#[tokio::test]
async fn test_unsupported_site() {
    let root = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(1));
    let orch = orchestrator(root.path()).with_fetcher(fetcher.clone());

    let result = orch
        .run(
            &RunParams::new("https://novels.example/book/1"),
            CancellationToken::new(),
        )
        .await;

    match result {
        Err(NovelError::UnsupportedSite { domain, .. }) => assert_eq!(domain, "novels"),
        other => panic!("unexpected {:?}", other.map(|r| r.output_dir)),
    }
    assert!(fetcher.requests().is_empty());
}
