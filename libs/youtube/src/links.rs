use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

const DEFAULT_LINK_TITLE: &str = "Related resource";

/// A reference link attached to a processed video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLink {
    pub url: String,
    #[serde(default)]
    pub title: String,
}

/// Collects every http(s) URL in a video description.
///
/// The title of a link is whatever precedes the URL on its line. Links on the
/// first line of the text get a generic title.
pub fn extract_links(text: &str) -> Vec<RefLink> {
    URL_REGEX
        .find_iter(text)
        .map(|m| {
            let url = m.as_str();
            let first_occurrence = text.find(url).unwrap_or(m.start());
            let before_url = text[..first_occurrence].trim();

            let title = match before_url.rfind('\n') {
                Some(idx) => before_url[idx..].trim(),
                None => "",
            };

            RefLink {
                url: url.to_string(),
                title: if title.is_empty() {
                    DEFAULT_LINK_TITLE.to_string()
                } else {
                    title.to_string()
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_links_in_plain_text() {
        assert!(extract_links("just a description\nwith lines").is_empty());
    }

    #[test]
    fn title_comes_from_previous_line() {
        let description = "Intro to graphs\nCourse notes:\nSlides https://example.com/slides.pdf\nCode: https://github.com/x/y";
        let links = extract_links(description);

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://example.com/slides.pdf");
        assert_eq!(links[0].title, "Slides");
        assert_eq!(links[1].url, "https://github.com/x/y");
        assert_eq!(links[1].title, "Code:");
    }

    #[test]
    fn link_on_first_line_gets_default_title() {
        let links = extract_links("http://example.org is where the docs live");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].title, DEFAULT_LINK_TITLE);
    }
}
