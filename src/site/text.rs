//! Text helpers shared by site adapters
//!
//! Extraction works on text nodes; these helpers pick the right nodes and turn
//! them into clean lines: whitespace runs (including non-breaking and
//! ideographic spaces) collapse to one space, empty lines disappear and lines
//! carrying a site's navigation boilerplate are dropped.

use scraper::{ElementRef, Html, Selector};

/// Collapses every run of whitespace into a single space and trims the ends
pub fn normalize_line(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns raw text pieces into newline-separated clean lines
///
/// Pieces are split on embedded newlines first, so a text node spanning
/// several paragraphs yields several lines.
pub fn clean_lines<'a, I>(pieces: I, boilerplate: &[&str]) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    pieces
        .into_iter()
        .flat_map(str::lines)
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .filter(|line| !boilerplate.iter().any(|marker| line.contains(marker)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text nodes below `element`, skipping anything inside `<script>` or `<style>`
pub fn visible_text(element: ElementRef<'_>) -> Vec<&str> {
    element
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .take_while(|ancestor| ancestor.id() != element.id())
                .any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|e| matches!(e.name(), "script" | "style"))
                });
            if hidden {
                None
            } else {
                Some(&**text)
            }
        })
        .collect()
}

/// Text nodes that are direct children of `element`
pub fn direct_text(element: ElementRef<'_>) -> Vec<&str> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|t| &**t))
        .collect()
}

/// Normalized text of the first element matching `selector`, if non-empty
pub fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| normalize_line(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Attribute value of the first element matching `selector`, if non-empty
pub fn first_attr(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Strips a leading `label:` (ASCII or full-width colon) from a field value
pub fn strip_label(value: &str) -> &str {
    match value.find(|c: char| c == '：' || c == ':') {
        Some(pos) => {
            let colon_len = value[pos..].chars().next().map_or(1, char::len_utf8);
            value[pos + colon_len..].trim()
        }
        None => value.trim(),
    }
}
