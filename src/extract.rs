use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::models::{ConcertImage, ConcertLink, LinkType, DEFAULT_IMAGE_TITLE};

const UNKNOWN_IMAGE_MIME: &str = "image/unknown";

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));
static IMG_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src]").expect("img selector"));
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)https?://[^\s<>"]+"#).expect("valid url regex"));
static IMAGE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"']+?\.(?:jpg|jpeg|png|gif|webp)\b"#).expect("valid image url regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

const TICKET_HOSTS: [&str; 5] = ["eventbrite", "ticketmaster", "billetto", "ticnet", "tickster"];
const TICKET_TEXT: [&str; 2] = ["tickets", "biljetter"];
const SOCIAL_HOSTS: [&str; 5] = ["facebook", "instagram", "twitter", "youtube", "tiktok"];
const VENUE_TEXT: [&str; 3] = ["venue", "plats", "location"];

pub fn clean_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inner_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Removes markup with a plain regex pass, for text that is not worth a
/// full parse.
pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, "").into_owned()
}

/// Priority-ordered classification: tickets, then social, then venue.
/// First match wins.
pub fn classify_link(url: &str, text: &str) -> LinkType {
    let url_lower = url.to_lowercase();
    let text_lower = text.to_lowercase();

    if TICKET_HOSTS.iter().any(|host| url_lower.contains(host))
        || TICKET_TEXT.iter().any(|word| text_lower.contains(word))
    {
        return LinkType::Tickets;
    }
    if SOCIAL_HOSTS.iter().any(|host| url_lower.contains(host)) {
        return LinkType::Social;
    }
    if VENUE_TEXT.iter().any(|word| text_lower.contains(word)) {
        return LinkType::Venue;
    }
    LinkType::Website
}

/// Host without a leading `www.`, or the URL itself when it does not parse.
pub fn domain_name(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map(|host| host.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.to_string())
}

fn trim_url(candidate: &str) -> &str {
    candidate.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\''])
}

pub fn extract_links(description: &str) -> Vec<ConcertLink> {
    let mut links: Vec<ConcertLink> = Vec::new();
    if description.trim().is_empty() {
        return links;
    }

    let fragment = Html::parse_fragment(description);
    for anchor in fragment.select(&ANCHOR_SELECTOR) {
        let href = match anchor.value().attr("href") {
            Some(href) => href.trim(),
            None => continue,
        };
        if !href.starts_with("http") || links.iter().any(|link| link.url == href) {
            continue;
        }
        let mut text = inner_text(anchor);
        if text.is_empty() {
            text = href.to_string();
        }
        links.push(ConcertLink {
            url: href.to_string(),
            link_type: classify_link(href, &text),
            text,
        });
    }

    let plain = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    for found in URL_RE.find_iter(&plain) {
        let url = trim_url(found.as_str());
        if links.iter().any(|link| link.url == url) {
            continue;
        }
        links.push(ConcertLink {
            url: url.to_string(),
            text: domain_name(url),
            link_type: classify_link(url, ""),
        });
    }

    links
}

pub fn extract_images(description: &str) -> Vec<ConcertImage> {
    let mut images: Vec<ConcertImage> = Vec::new();
    if description.trim().is_empty() {
        return images;
    }

    let fragment = Html::parse_fragment(description);
    for img in fragment.select(&IMG_SELECTOR) {
        let src = match img.value().attr("src").map(str::trim) {
            Some(src) if !src.is_empty() => src,
            _ => continue,
        };
        if images.iter().any(|image| image.url == src) {
            continue;
        }
        let title = img
            .value()
            .attr("alt")
            .map(clean_text)
            .filter(|alt| !alt.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_TITLE.to_string());
        images.push(ConcertImage {
            url: src.to_string(),
            title,
            mime_type: UNKNOWN_IMAGE_MIME.to_string(),
            original_url: None,
        });
    }

    for found in IMAGE_URL_RE.find_iter(description) {
        let url = found.as_str();
        if images.iter().any(|image| image.url == url) {
            continue;
        }
        images.push(ConcertImage {
            url: url.to_string(),
            title: DEFAULT_IMAGE_TITLE.to_string(),
            mime_type: UNKNOWN_IMAGE_MIME.to_string(),
            original_url: None,
        });
    }

    images
}

const TICKET_URL_HINTS: [&str; 5] = ["ticket", "biljett", "buy", "köp", "purchase"];

/// Best ticket link among already extracted links.
pub fn pick_ticket_url(links: &[ConcertLink]) -> Option<String> {
    links
        .iter()
        .find(|link| link.link_type == LinkType::Tickets)
        .or_else(|| {
            links.iter().find(|link| {
                let lower = link.url.to_lowercase();
                TICKET_URL_HINTS.iter().any(|hint| lower.contains(hint))
            })
        })
        .or_else(|| links.first())
        .map(|link| link.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ticket_and_social_links() {
        let links = extract_links(
            "Tickets here https://eventbrite.com/e/123 and follow https://instagram.com/artist",
        );
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://eventbrite.com/e/123");
        assert_eq!(links[0].link_type, LinkType::Tickets);
        assert_eq!(links[0].text, "eventbrite.com");
        assert_eq!(links[1].link_type, LinkType::Social);
    }

    #[test]
    fn anchors_come_first_and_are_not_duplicated() {
        let html = r#"<p>Find the <a href="https://mejeriet.se/plats">Venue info</a>.</p>
            <p>Raw: https://mejeriet.se/plats https://example.org/about</p>"#;
        let links = extract_links(html);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "Venue info");
        assert_eq!(links[0].link_type, LinkType::Venue);
        assert_eq!(links[1].url, "https://example.org/about");
        assert_eq!(links[1].link_type, LinkType::Website);
    }

    #[test]
    fn ticket_text_beats_social_host() {
        assert_eq!(
            classify_link("https://facebook.com/events/1", "Biljetter"),
            LinkType::Tickets
        );
    }

    #[test]
    fn malformed_html_degrades_quietly() {
        let links = extract_links("<a href=\"https://x.se/a\"><b>unterminated");
        assert_eq!(links.len(), 1);
        assert!(extract_links("   ").is_empty());
        assert!(extract_images("<img src=>").is_empty());
    }

    #[test]
    fn extracts_inline_and_bare_images() {
        let html = r#"<img src="https://cdn.example.com/poster.png" alt="Poster">
            and https://cdn.example.com/poster.png plus https://cdn.example.com/stage.JPG"#;
        let images = extract_images(html);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].title, "Poster");
        assert_eq!(images[1].url, "https://cdn.example.com/stage.JPG");
        assert_eq!(images[1].title, DEFAULT_IMAGE_TITLE);
    }

    #[test]
    fn ticket_url_prefers_ticket_links() {
        let links = extract_links("https://artist.se https://biljett.se/show https://ticnet.se/x");
        assert_eq!(pick_ticket_url(&links).as_deref(), Some("https://ticnet.se/x"));
        assert_eq!(pick_ticket_url(&[]), None);
    }
}
