//! Adapter for truyenchu.vn
//!
//! The seed is the story page. Its chapter list is served 50 entries at a
//! time by a JSON service, so the start chapter is found by asking for the
//! listing page that contains it and picking the entry at its position.

use crate::site::text::{clean_lines, first_attr, first_text, normalize_line, visible_text};
use crate::site::{
    ChapterRecord, ExtractionError, InfoRecord, Page, SeedKind, SiteAdapter, StartStep,
};
use crate::url::resolve_href;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

const LIST_SERVICE_PATH: &str = "/api/services/list-chapter";
const CHAPTERS_PER_LIST: u32 = 50;

const E: &str = "Invalid selector";
lazy_static! {
    static ref TITLE: Selector = Selector::parse("h1.story-title a, h1.story-title").expect(E);
    static ref AUTHOR: Selector = Selector::parse(r#"[itemprop="author"] span"#).expect(E);
    static ref GENRE: Selector = Selector::parse(r#"#truyen .info a[itemprop="genre"]"#).expect(E);
    static ref FOREWORD: Selector = Selector::parse("#truyen .desc-text").expect(E);
    static ref COVER: Selector = Selector::parse("div.book img").expect(E);
    static ref STORY_ID: Selector = Selector::parse("input#truyen-id").expect(E);
    static ref STORY_ASCII: Selector = Selector::parse("input#truyen-ascii").expect(E);
    static ref LIST_LINK: Selector = Selector::parse("li a[href]").expect(E);
    static ref CHAPTER_TITLE: Selector = Selector::parse("a.chapter-title").expect(E);
    static ref CHAPTER_BODY: Selector = Selector::parse("#chapter-c").expect(E);
    static ref NEXT_CHAPTER: Selector = Selector::parse("a#next_chap").expect(E);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TruyenchuAdapter;

impl TruyenchuAdapter {
    /// Listing page number and position within it for a 1-based chapter index
    fn list_position(start_index: u32) -> (u32, usize) {
        let zero_based = start_index.saturating_sub(1);
        (
            zero_based / CHAPTERS_PER_LIST + 1,
            (zero_based % CHAPTERS_PER_LIST) as usize,
        )
    }

    fn list_request(&self, page: &Page, start_index: u32) -> Result<Url, ExtractionError> {
        let document = Html::parse_document(&page.body);
        let story_id = first_attr(&document, &STORY_ID, "value")
            .ok_or_else(|| ExtractionError::missing(page, None, "story id"))?;
        let story_ascii = first_attr(&document, &STORY_ASCII, "value")
            .ok_or_else(|| ExtractionError::missing(page, None, "story slug"))?;
        let (list_page, _) = Self::list_position(start_index);

        let mut url = page
            .url
            .join(LIST_SERVICE_PATH)
            .map_err(|e| ExtractionError::new(page, None, e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("type", "list_chapter")
            .append_pair("tid", &story_id)
            .append_pair("tascii", &story_ascii)
            .append_pair("page", &list_page.to_string());
        Ok(url)
    }

    fn pick_from_list(&self, page: &Page, start_index: u32) -> Result<StartStep, ExtractionError> {
        let json: serde_json::Value = serde_json::from_str(&page.body)
            .map_err(|e| ExtractionError::new(page, None, format!("invalid listing: {}", e)))?;
        let chap_list = json
            .get("chap_list")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if chap_list.trim().is_empty() {
            return Ok(StartStep::Exhausted);
        }

        let fragment = Html::parse_fragment(chap_list);
        let (_, position) = Self::list_position(start_index);
        let chosen = fragment
            .select(&LIST_LINK)
            .filter_map(|a| a.value().attr("href"))
            .nth(position);

        match chosen.and_then(|href| resolve_href(href, &page.url)) {
            Some(url) => Ok(StartStep::Chapter(url)),
            None => Ok(StartStep::Exhausted),
        }
    }
}

impl SiteAdapter for TruyenchuAdapter {
    fn name(&self) -> &'static str {
        "truyenchu"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["truyenchu"]
    }

    fn seed_kind(&self) -> SeedKind {
        SeedKind::InfoPage
    }

    fn locate_start(&self, page: &Page, start_index: u32) -> Result<StartStep, ExtractionError> {
        if page.url.path().starts_with(LIST_SERVICE_PATH) {
            self.pick_from_list(page, start_index)
        } else {
            self.list_request(page, start_index).map(StartStep::Follow)
        }
    }

    fn boilerplate(&self) -> &'static [&'static str] {
        &["truyenchu.vn"]
    }

    fn parse_info(&self, page: &Page) -> Result<InfoRecord, ExtractionError> {
        let document = Html::parse_document(&page.body);

        let title = first_text(&document, &TITLE)
            .ok_or_else(|| ExtractionError::missing(page, None, "book title"))?;
        let author = first_text(&document, &AUTHOR).unwrap_or_default();
        let types = document
            .select(&GENRE)
            .map(|a| normalize_line(&a.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect();
        let foreword = document
            .select(&FOREWORD)
            .next()
            .map(|el| clean_lines(visible_text(el), &[]))
            .unwrap_or_default();
        let cover_image_url = first_attr(&document, &COVER, "src")
            .and_then(|src| resolve_href(&src, &page.url))
            .map(|u| u.to_string());

        Ok(InfoRecord {
            title,
            author,
            types,
            foreword,
            source_url: page.url.to_string(),
            cover_image_url,
        })
    }

    fn parse_chapter(&self, page: &Page, index: u32) -> Result<ChapterRecord, ExtractionError> {
        let document = Html::parse_document(&page.body);

        let title = first_text(&document, &CHAPTER_TITLE)
            .ok_or_else(|| ExtractionError::missing(page, Some(index), "chapter title"))?;
        let body = document
            .select(&CHAPTER_BODY)
            .next()
            .ok_or_else(|| ExtractionError::missing(page, Some(index), "chapter body"))?;
        let content = clean_lines(visible_text(body), self.boilerplate());
        if content.is_empty() {
            return Err(ExtractionError::missing(page, Some(index), "chapter content"));
        }
        // Only an explicit marker on the link ends the book
        if document.select(&NEXT_CHAPTER).next().is_none() {
            return Err(ExtractionError::missing(page, Some(index), "chapter navigation"));
        }

        Ok(ChapterRecord {
            index,
            title,
            content,
            source_url: page.url.to_string(),
        })
    }

    fn next_chapter_url(&self, page: &Page) -> Option<Url> {
        let document = Html::parse_document(&page.body);
        let link = document.select(&NEXT_CHAPTER).next()?;
        if link.value().classes().any(|c| c == "disabled") {
            return None;
        }
        // The last chapter's "next" link is a bare "#"
        resolve_href(link.value().attr("href")?, &page.url)
    }
}
