//! Adapter for ptwxz.com
//!
//! The seed is the first chapter to save. Chapter text sits directly in
//! `<body>`, separated by `<br>`; the third link of the bottom navigation bar
//! points at the next chapter, or back at the table of contents on the last one.
//! The info page lives under `/bookinfo/` next to the chapter's `/html/` path.

use crate::site::text::{clean_lines, direct_text, first_attr, first_text, strip_label};
use crate::site::{ChapterRecord, ExtractionError, InfoRecord, Page, SeedKind, SiteAdapter};
use crate::url::resolve_href;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use url::Url;

const E: &str = "Invalid selector";
lazy_static! {
    static ref CHAPTER_TITLE: Selector = Selector::parse("h1").expect(E);
    static ref BODY: Selector = Selector::parse("body").expect(E);
    static ref NEXT_LINK: Selector =
        Selector::parse("div:nth-of-type(3) > a:nth-of-type(3)").expect(E);
    static ref BOOK_TITLE: Selector =
        Selector::parse("#content table tr:nth-of-type(1) h1").expect(E);
    static ref DETAIL_CELLS: Selector =
        Selector::parse("#content table tr:nth-of-type(2) > td").expect(E);
    static ref FOREWORD: Selector =
        Selector::parse(r#"#content td[valign="top"] > div[style*="left"]"#).expect(E);
    static ref COVER: Selector = Selector::parse(r#"#content td img[height="125"]"#).expect(E);
    static ref COVER_CELL: Selector =
        Selector::parse("#content td:nth-of-type(2) img").expect(E);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PtwxzAdapter;

impl SiteAdapter for PtwxzAdapter {
    fn name(&self) -> &'static str {
        "ptwxz"
    }

    fn domains(&self) -> &'static [&'static str] {
        &["ptwxz"]
    }

    fn seed_kind(&self) -> SeedKind {
        SeedKind::ChapterPage
    }

    /// `/html/9/9344/6359283.html` → `/bookinfo/9/9344.html`
    fn info_url(&self, seed: &Url) -> Option<Url> {
        let segments: Vec<&str> = seed.path_segments()?.collect();
        if segments.len() < 3 || segments[0] != "html" {
            return None;
        }
        let book = &segments[1..segments.len() - 1];
        seed.join(&format!("/bookinfo/{}.html", book.join("/")))
            .ok()
    }

    fn boilerplate(&self) -> &'static [&'static str] {
        &["快捷键", "上一章", "下一章", "返回书页"]
    }

    fn parse_info(&self, page: &Page) -> Result<InfoRecord, ExtractionError> {
        let document = Html::parse_document(&page.body);

        let title = first_text(&document, &BOOK_TITLE)
            .ok_or_else(|| ExtractionError::missing(page, None, "book title"))?;

        let cells: Vec<String> = document
            .select(&DETAIL_CELLS)
            .map(|td| td.text().collect::<String>())
            .collect();
        let types = cells
            .first()
            .map(|c| strip_label(c).to_string())
            .filter(|c| !c.is_empty())
            .into_iter()
            .collect();
        let author = cells
            .get(1)
            .map(|c| strip_label(c).to_string())
            .unwrap_or_default();

        let foreword = document
            .select(&FOREWORD)
            .next()
            .map(|el| clean_lines(el.text(), &[]))
            .unwrap_or_default();
        let cover_image_url = first_attr(&document, &COVER, "src")
            .or_else(|| first_attr(&document, &COVER_CELL, "src"))
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
            .select(&BODY)
            .next()
            .ok_or_else(|| ExtractionError::missing(page, Some(index), "page body"))?;
        let content = clean_lines(direct_text(body), self.boilerplate());
        if content.is_empty() {
            return Err(ExtractionError::missing(page, Some(index), "chapter content"));
        }
        if document.select(&NEXT_LINK).next().is_none() {
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
        let href = document
            .select(&NEXT_LINK)
            .next()?
            .value()
            .attr("href")?;
        // The last chapter links back to the table of contents
        if href.contains("index") {
            return None;
        }
        resolve_href(href, &page.url)
    }
}
