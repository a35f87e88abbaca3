//! Traversal engine properties over the scripted fetcher

use crate::common::*;
use novel_trail::config::{CrawlerConfig, RunParams};
use novel_trail::output::DirectorySink;
use novel_trail::site::{
    ChapterRecord, ExtractionError, InfoRecord, Page, SeedKind, SiteAdapter, StartStep,
    TruyenchuAdapter,
};
use novel_trail::state::{StopCause, StopIndex, TerminalReason};
use novel_trail::{CrawlError, NovelError, TraversalEngine};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;

fn params(seed_url: &str) -> RunParams {
    let mut params = RunParams::new(seed_url);
    params.with_info = false;
    params
}

fn engine(dir: &TempDir, fetcher: &Arc<ScriptedFetcher>) -> TraversalEngine {
    TraversalEngine::new(
        Arc::new(BookAdapter),
        fetcher.clone(),
        Arc::new(DirectorySink::new(dir.path(), "txt")),
    )
}

#[tokio::test]
async fn test_end_of_book_writes_contiguous_range() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(5));

    let summary = engine(&dir, &fetcher).run(&params(&seed(1))).await.unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Done(StopCause::EndOfBook)
    ));
    assert_eq!(chapter_files(dir.path()), vec![1, 2, 3, 4, 5]);
    assert_eq!(summary.chapters_written, 5);
    assert_eq!(summary.last_index, Some(5));
    assert_eq!(summary.pages_fetched, 5);

    let first = fs::read_to_string(dir.path().join("1.txt")).unwrap();
    assert_eq!(first, "Chapter 1\nParagraph one of 1.\nParagraph two.\n");
}

#[tokio::test]
async fn test_stop_index_never_fetches_beyond() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(10));
    let mut params = params(&seed(1));
    params.stop_index = StopIndex::At(3);

    let summary = engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Done(StopCause::StopIndexReached)
    ));
    assert_eq!(chapter_files(dir.path()), vec![1, 2, 3]);
    assert_eq!(fetcher.fetched_paths(), vec!["/1", "/2", "/3"]);
}

#[tokio::test]
async fn test_end_of_book_before_stop_index() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(4));
    let mut params = params(&seed(1));
    params.stop_index = StopIndex::At(9);

    let summary = engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Done(StopCause::EndOfBook)
    ));
    assert_eq!(summary.last_index, Some(4));
}

#[tokio::test]
async fn test_fetch_failure_keeps_written_files() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(10).failing_on_call(3));
    let mut params = params(&seed(1));
    params.start_index = 4;

    let summary = engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Failed(CrawlError::Fetch(_))
    ));
    assert_eq!(chapter_files(dir.path()), vec![4, 5]);
    assert_eq!(summary.last_index, Some(5));

    match summary.into_result() {
        Err(NovelError::Crawl { last_index, .. }) => assert_eq!(last_index, Some(5)),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_between_pages() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(10));
    let token = CancellationToken::new();
    let sink = CancelAfter {
        inner: DirectorySink::new(dir.path(), "txt"),
        index: 2,
        token: token.clone(),
    };

    let summary = TraversalEngine::new(Arc::new(BookAdapter), fetcher.clone(), Arc::new(sink))
        .with_cancellation(token)
        .run(&params(&seed(1)))
        .await
        .unwrap();

    assert!(summary.reason.is_cancelled());
    assert_eq!(chapter_files(dir.path()), vec![1, 2]);
    assert_eq!(fetcher.fetched_paths(), vec!["/1", "/2"]);
    assert!(summary.into_result().is_ok());
}

#[tokio::test]
async fn test_extraction_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("/1", chapter_html(1, Some("/2")))
            .page("/2", chapter_html(2, Some("/3")))
            .page("/3", "<html><body><p>Maintenance</p></body></html>"),
    );

    let summary = engine(&dir, &fetcher).run(&params(&seed(1))).await.unwrap();

    match &summary.reason {
        TerminalReason::Failed(CrawlError::Extraction(e)) => {
            assert_eq!(e.index, Some(3));
            assert_eq!(e.url, "https://book.test/3");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(chapter_files(dir.path()), vec![1, 2]);
    assert_eq!(summary.last_index, Some(2));
}

#[tokio::test]
async fn test_empty_title_is_validation_failure() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("/1", chapter_html(1, Some("/2")))
            .page(
                "/2",
                r#"<html><body><h1> </h1><div id="content">Text</div><a class="next" href="/3">Next</a></body></html>"#,
            )
            .page("/3", chapter_html(3, None)),
    );

    let summary = engine(&dir, &fetcher).run(&params(&seed(1))).await.unwrap();

    match &summary.reason {
        TerminalReason::Failed(CrawlError::Validation(v)) => {
            assert_eq!(v.field, "title");
            assert_eq!(v.index, Some(2));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(chapter_files(dir.path()), vec![1]);
    assert!(!dir.path().join("2.txt").exists());
    assert_eq!(fetcher.fetched_paths(), vec!["/1", "/2"]);
}

#[tokio::test]
async fn test_referer_continuity() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(3));

    engine(&dir, &fetcher).run(&params(&seed(1))).await.unwrap();

    let referers: Vec<Option<String>> = fetcher.requests().into_iter().map(|r| r.referer).collect();
    assert_eq!(
        referers,
        vec![None, Some(seed(1)), Some(seed(2))]
    );
}

#[tokio::test]
async fn test_info_fetched_once_after_first_chapter() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        book_fetcher(3)
            .page("/info", INFO_HTML)
            .page("/cover.jpg", "JPEGDATA"),
    );
    let mut params = params(&seed(1));
    params.with_info = true;

    let summary = engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(summary.reason.is_done());
    assert!(summary.info_written);
    assert!(summary.cover_written);
    assert_eq!(chapter_files(dir.path()), vec![1, 2, 3]);
    assert_eq!(
        fs::read_to_string(dir.path().join("foreword.txt")).unwrap(),
        "The Test Book\nA. Writer\nFantasy, Mystery\nhttps://book.test/info\nA book used in tests.\n"
    );
    assert_eq!(fs::read(dir.path().join("cover.jpg")).unwrap(), b"JPEGDATA");

    let requests = fetcher.requests();
    let paths = fetcher.fetched_paths();
    assert_eq!(paths.iter().filter(|p| *p == "/info").count(), 1);
    assert_eq!(&paths[..2], &["/1", "/info"]);

    // The chapter sequence keeps its own continuity
    let second = requests.iter().find(|r| r.url == seed(2)).unwrap();
    assert_eq!(second.referer, Some(seed(1)));
    let cover = requests.iter().find(|r| r.url.ends_with("/cover.jpg")).unwrap();
    assert_eq!(cover.referer.as_deref(), Some("https://book.test/info"));
}

#[tokio::test]
async fn test_missing_info_page_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(2));
    let mut params = params(&seed(1));
    params.with_info = true;

    let summary = engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(summary.reason.is_done());
    assert!(!summary.info_written);
    assert_eq!(chapter_files(dir.path()), vec![1, 2]);
    assert!(!dir.path().join("foreword.txt").exists());
}

const STORY_HTML: &str = r#"<html><body>
<div id="truyen">
  <h1 class="story-title"><a href="/quy-bi">Quỷ Bí Chi Chủ</a></h1>
  <input id="truyen-id" type="hidden" value="42">
  <input id="truyen-ascii" type="hidden" value="quy-bi">
</div>
</body></html>"#;

fn truyenchu_chapter(n: u32, next: &str) -> String {
    format!(
        r#"<html><body><a class="chapter-title">Chương {n}</a>
<div id="chapter-c">Nội dung chương {n}.</div>
<a id="next_chap" href="{next}">Sau</a></body></html>"#
    )
}

fn truyenchu_engine(dir: &TempDir, fetcher: &Arc<ScriptedFetcher>) -> TraversalEngine {
    TraversalEngine::new(
        Arc::new(TruyenchuAdapter),
        fetcher.clone(),
        Arc::new(DirectorySink::new(dir.path(), "txt")),
    )
}

#[tokio::test]
async fn test_info_page_seed_locates_start() {
    let dir = TempDir::new().unwrap();
    let listing = r#"{"chap_list": "<ul><li><a href=\"/quy-bi/chuong-1\">1</a></li><li><a href=\"/quy-bi/chuong-2\">2</a></li></ul>"}"#;
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("/quy-bi", STORY_HTML)
            .page("/api/services/list-chapter", listing)
            .page("/quy-bi/chuong-2", truyenchu_chapter(2, "/quy-bi/chuong-3"))
            .page("/quy-bi/chuong-3", truyenchu_chapter(3, "#")),
    );
    let mut params = params("https://truyenchu.vn/quy-bi");
    params.start_index = 2;

    let summary = truyenchu_engine(&dir, &fetcher).run(&params).await.unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Done(StopCause::EndOfBook)
    ));
    assert_eq!(chapter_files(dir.path()), vec![2, 3]);
    assert_eq!(
        fetcher.fetched_paths(),
        vec!["/quy-bi", "/api/services/list-chapter", "/quy-bi/chuong-2", "/quy-bi/chuong-3"]
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("2.txt")).unwrap(),
        "Chương 2\nNội dung chương 2.\n"
    );
}

#[tokio::test]
async fn test_page_without_navigation_fails_instead_of_ending() {
    let dir = TempDir::new().unwrap();
    let listing = r#"{"chap_list": "<ul><li><a href=\"/quy-bi/chuong-1\">1</a></li></ul>"}"#;
    let truncated = r#"<html><body><a class="chapter-title">Chương 2</a>
<div id="chapter-c">Đang bảo trì.</div></body></html>"#;
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("/quy-bi", STORY_HTML)
            .page("/api/services/list-chapter", listing)
            .page("/quy-bi/chuong-1", truyenchu_chapter(1, "/quy-bi/chuong-2"))
            .page("/quy-bi/chuong-2", truncated),
    );

    let summary = truyenchu_engine(&dir, &fetcher)
        .run(&params("https://truyenchu.vn/quy-bi"))
        .await
        .unwrap();

    match &summary.reason {
        TerminalReason::Failed(CrawlError::Extraction(e)) => assert_eq!(e.index, Some(2)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(summary.last_index, Some(1));
    assert_eq!(chapter_files(dir.path()), vec![1]);
}

#[tokio::test]
async fn test_navigation_exhausted_before_start() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .page("/quy-bi", STORY_HTML)
            .page("/api/services/list-chapter", r#"{"chap_list": ""}"#),
    );
    let mut params = params("https://truyenchu.vn/quy-bi");
    params.start_index = 900;

    let summary = truyenchu_engine(&dir, &fetcher).run(&params).await.unwrap();

    match &summary.reason {
        TerminalReason::Failed(CrawlError::NavigationExhausted { start_index, .. }) => {
            assert_eq!(*start_index, 900)
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(summary.chapters_written, 0);
    assert_eq!(summary.last_index, None);
    assert!(chapter_files(dir.path()).is_empty());
}

/// Never finds the start chapter
#[derive(Debug)]
struct EndlessListing;

impl SiteAdapter for EndlessListing {
    fn name(&self) -> &'static str {
        "endless"
    }
    fn domains(&self) -> &'static [&'static str] {
        &["book"]
    }
    fn seed_kind(&self) -> SeedKind {
        SeedKind::InfoPage
    }
    fn locate_start(&self, page: &Page, _start: u32) -> Result<StartStep, ExtractionError> {
        let n: u32 = page.url.path().trim_start_matches('/').parse().unwrap_or(0);
        Ok(StartStep::Follow(
            Url::parse(&format!("{}/{}", BASE, n + 1)).unwrap(),
        ))
    }
    fn parse_info(&self, page: &Page) -> Result<InfoRecord, ExtractionError> {
        Err(ExtractionError::missing(page, None, "info"))
    }
    fn parse_chapter(&self, page: &Page, index: u32) -> Result<ChapterRecord, ExtractionError> {
        Err(ExtractionError::missing(page, Some(index), "chapter"))
    }
    fn next_chapter_url(&self, _page: &Page) -> Option<Url> {
        None
    }
}

#[tokio::test]
async fn test_start_location_hops_are_bounded() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(10));
    let config = CrawlerConfig {
        max_start_hops: 2,
        ..CrawlerConfig::default()
    };

    let summary = TraversalEngine::new(
        Arc::new(EndlessListing),
        fetcher.clone(),
        Arc::new(DirectorySink::new(dir.path(), "txt")),
    )
    .with_config(&config)
    .run(&params(&seed(1)))
    .await
    .unwrap();

    assert!(matches!(
        summary.reason,
        TerminalReason::Failed(CrawlError::Extraction(_))
    ));
    assert_eq!(fetcher.fetched_paths(), vec!["/1", "/2", "/3"]);
}

#[tokio::test]
async fn test_invalid_seed_is_rejected_before_fetching() {
    let dir = TempDir::new().unwrap();
    let fetcher = Arc::new(book_fetcher(1));

    let result = engine(&dir, &fetcher).run(&params("not a url")).await;

    assert!(result.is_err());
    assert!(fetcher.requests().is_empty());
}
