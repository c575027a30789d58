// src/extract/text.rs
use scraper::{ElementRef, Html, Selector};

/// Collapse all runs of whitespace, including newlines, into single spaces.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an element, whitespace-normalized.
pub fn element_text(element: &ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Parse a selector that is known at compile time. Invalid selectors match nothing.
pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// First non-empty text found by trying `selectors` in order.
pub fn find_text_by_selectors(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| {
            document
                .select(&sel)
                .map(|element| element_text(&element))
                .find(|text| !text.is_empty())
        })
}

/// Same as [`find_text_by_selectors`], scoped to the children of `element`.
pub fn find_text_in(element: &ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| {
            element
                .select(&sel)
                .map(|child| element_text(&child))
                .find(|text| !text.is_empty())
        })
}

/// Map empty strings to `None`.
pub fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(
            clean_text("\n   Senior   Engineer \n\t (Remote)\n"),
            "Senior Engineer (Remote)"
        );
        assert_eq!(clean_text("   \n "), "");
    }

    #[test]
    fn first_matching_selector_wins() {
        let document = Html::parse_document(
            r#"<div><h1 class="a"> </h1><h2 class="b">Second</h2><h3 class="c">Third</h3></div>"#,
        );

        assert_eq!(
            find_text_by_selectors(&document, &["h1.a", "h2.b", "h3.c"]),
            Some("Second".to_string())
        );
        assert_eq!(find_text_by_selectors(&document, &["p.none"]), None);
    }

    #[test]
    fn invalid_selectors_are_skipped() {
        let document = Html::parse_document("<p>text</p>");
        assert_eq!(
            find_text_by_selectors(&document, &["p[", "p"]),
            Some("text".to_string())
        );
    }
}
