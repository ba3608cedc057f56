//! Lyrics extraction from a Genius song page.
//!
//! The public API does not return lyrics, they only appear in the HTML of the
//! song page inside `data-lyrics-container` blocks.

use lazy_static::lazy_static;
use regex::Regex;

const CONTAINER_MARKER: &str = "data-lyrics-container=\"true\"";

lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"(?i)<br\s*/?>").expect("valid line break regex");
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").expect("valid tag regex");
    static ref SECTION_HEADER: Regex =
        Regex::new(r"(?m)^[ \t]*\[[^\]\n]*\][ \t]*$").expect("valid section header regex");
    static ref BLANK_RUN: Regex = Regex::new(r"\n{3,}").expect("valid blank run regex");
}

/// Extract plain-text lyrics from a song page, dropping section headers such
/// as `[Chorus]`. Returns `None` when the page has no lyrics.
pub fn extract_lyrics(html: &str) -> Option<String> {
    let mut parts = Vec::new();
    let mut search_from = 0;

    while let Some(offset) = html[search_from..].find(CONTAINER_MARKER) {
        let marker_at = search_from + offset;
        let Some(open_end) = html[marker_at..].find('>').map(|i| marker_at + i + 1) else {
            break;
        };
        let close_at = matching_div_end(html, open_end);
        parts.push(&html[open_end..close_at]);
        search_from = close_at;
    }

    if parts.is_empty() {
        return None;
    }

    let joined = parts.join("\n");
    let with_breaks = LINE_BREAK.replace_all(&joined, "\n");
    let stripped = TAG.replace_all(&with_breaks, "");
    let decoded = decode_entities(&stripped);
    let without_headers = SECTION_HEADER.replace_all(&decoded, "");
    let text = BLANK_RUN.replace_all(without_headers.trim(), "\n\n");

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Byte index of the `</div>` closing the div whose content starts at `start`,
/// or the end of the document when it is never closed.
fn matching_div_end(html: &str, start: usize) -> usize {
    let mut depth = 1usize;
    let mut cursor = start;
    loop {
        let next_open = html[cursor..].find("<div").map(|i| cursor + i);
        let next_close = html[cursor..].find("</div>").map(|i| cursor + i);
        match (next_open, next_close) {
            (Some(open), Some(close)) if open < close => {
                depth += 1;
                cursor = open + "<div".len();
            }
            (_, Some(close)) => {
                depth -= 1;
                if depth == 0 {
                    return close;
                }
                cursor = close + "</div>".len();
            }
            (_, None) => return html.len(),
        }
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_and_cleans_lyrics() {
        let html = r#"<html><body>
            <div class="x" data-lyrics-container="true">[Verse 1]<br/>Hello &amp; welcome<br>to <a href="/a"><span>the show</span></a><br/><br/>[Chorus]<br/>It&#x27;s fine</div>
            <div>footer</div>
        </body></html>"#;

        let lyrics = extract_lyrics(html).unwrap();
        assert_eq!(lyrics, "Hello & welcome\nto the show\n\nIt's fine");
    }

    #[test]
    fn test_joins_multiple_containers_with_nested_divs() {
        let html = r#"<div data-lyrics-container="true">One<div class="inner">Two</div></div>
            <p>ad</p>
            <div data-lyrics-container="true">Three</div>"#;

        let lyrics = extract_lyrics(html).unwrap();
        assert_eq!(lyrics, "OneTwo\nThree");
    }

    #[test]
    fn test_page_without_lyrics() {
        assert_eq!(extract_lyrics("<html><div>Instrumental</div></html>"), None);
        assert_eq!(
            extract_lyrics(r#"<div data-lyrics-container="true">[Instrumental]</div>"#),
            None
        );
    }
}
