//! Aozora Bunko library card parsing.
//!
//! A card page (`cards/000035/card1567.html`) describes one work and links
//! to its downloadable files, among them `files/1567_ruby_4948.zip`
//! (text with ruby) and sometimes `files/1567_txt_4949.zip` (without).

use super::WorkId;
use crate::error::LoaderError;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// Archive file names: `<work_id>_<kind>_<file_id>.zip`.
static ARCHIVE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_(ruby|txt)_(\d+)\.zip$").expect("Invalid ARCHIVE_NAME_REGEX")
});

/// Archive paths anywhere in a page, for cards without usable anchors.
static ARCHIVE_PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\./)?(?:files/)?\d+_(?:ruby|txt)_\d+\.zip").expect("Invalid ARCHIVE_PATH_REGEX")
});

/// Prefix of the `<title>` of every card page.
const TITLE_PREFIX: &str = "図書カード：";

/// CSS selectors used for parsing.
struct Selectors {
    link: Selector,
    title: Selector,
}

impl Selectors {
    fn new() -> Self {
        Self {
            link: Selector::parse("a[href]").expect("Invalid link selector"),
            title: Selector::parse("title").expect("Invalid title selector"),
        }
    }
}

static SELECTORS: LazyLock<Selectors> = LazyLock::new(Selectors::new);

/// Flavor of a downloadable archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// Text with ruby annotations.
    Ruby,
    /// Text without ruby.
    Plain,
}

/// A ZIP archive linked from a card page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLink {
    /// Absolute URL of the archive.
    pub url: String,

    /// File name, e.g. `1567_ruby_4948.zip`.
    pub file_name: String,

    /// Work the archive belongs to, from the file name.
    pub work_id: u32,

    pub kind: ArchiveKind,
}

/// Parsed library card.
#[derive(Debug, Clone, Default)]
pub struct Card {
    /// Work title, if the page has one.
    pub title: Option<String>,

    /// Archive links in page order.
    pub archives: Vec<ArchiveLink>,
}

impl Card {
    /// Returns the archive to load for a work.
    ///
    /// The ruby archive is preferred; the plain one is the fallback.
    pub fn archive_for(&self, work_id: u32) -> Option<&ArchiveLink> {
        let mut matching = self.archives.iter().filter(|a| a.work_id == work_id);
        let first = matching.next()?;
        if first.kind == ArchiveKind::Ruby {
            return Some(first);
        }
        matching
            .find(|a| a.kind == ArchiveKind::Ruby)
            .or(Some(first))
    }
}

/// Builds the card page URL for a work.
pub fn card_url(base_url: &str, work: WorkId) -> Result<String, LoaderError> {
    let base = Url::parse(base_url).map_err(|e| LoaderError::InvalidUrl(e.to_string()))?;
    let url = base
        .join(&format!(
            "{:06}/card{}.html",
            work.author_id(),
            work.work_id()
        ))
        .map_err(|e| LoaderError::InvalidUrl(e.to_string()))?;
    Ok(url.to_string())
}

/// Parses a card page, resolving archive links against `card_url`.
pub fn parse_card(html: &str, card_url: &str) -> Result<Card, LoaderError> {
    let base = Url::parse(card_url).map_err(|e| LoaderError::InvalidUrl(e.to_string()))?;
    let doc = Html::parse_document(html);

    let title = doc
        .select(&SELECTORS.title)
        .next()
        .map(|elem| elem.text().collect::<String>())
        .map(|text| {
            let text = text.trim();
            text.strip_prefix(TITLE_PREFIX).unwrap_or(text).trim().to_string()
        })
        .filter(|title| !title.is_empty());

    let mut archives: Vec<ArchiveLink> = doc
        .select(&SELECTORS.link)
        .filter_map(|elem| elem.value().attr("href"))
        .filter_map(|href| archive_link(&base, href))
        .collect();

    if archives.is_empty() {
        archives = ARCHIVE_PATH_REGEX
            .find_iter(html)
            .filter_map(|m| archive_link(&base, m.as_str()))
            .collect();
    }

    debug!(
        card_url,
        archives = archives.len(),
        "Parsed library card"
    );

    Ok(Card { title, archives })
}

/// Resolves the archive named by `href`, if it is one.
fn archive_link(base: &Url, href: &str) -> Option<ArchiveLink> {
    let url = base.join(href).ok()?;
    let file_name = url.path_segments()?.next_back()?.to_string();
    let caps = ARCHIVE_NAME_REGEX.captures(&file_name)?;

    let work_id = caps[1].parse().ok()?;
    let kind = match &caps[2] {
        "ruby" => ArchiveKind::Ruby,
        _ => ArchiveKind::Plain,
    };

    Some(ArchiveLink {
        url: url.to_string(),
        file_name,
        work_id,
        kind,
    })
}
