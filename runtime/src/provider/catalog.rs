//! Closed catalog of sites the generator may pick from, and the static
//! fallback list used when it picks nothing.

use super::BrowseTarget;
use crate::stealth::random::{shuffle, RandomSource};
use url::Url;

/// How a topic becomes part of a site URL.
#[derive(Debug, Clone, Copy)]
enum UrlStyle {
    /// Topic is a path segment, spaces become underscores (wiki titles).
    Title,
    /// Topic is the value of the named query parameter.
    Query(&'static str),
}

/// A site the generator is allowed to name.
#[derive(Debug, Clone, Copy)]
pub struct SiteTemplate {
    pub name: &'static str,
    /// What the topic should be, as described to the generator.
    pub hint: &'static str,
    base: &'static str,
    style: UrlStyle,
}

impl SiteTemplate {
    /// Build the full URL for `topic`.
    pub fn resolve(&self, topic: &str) -> Option<String> {
        let mut url = Url::parse(self.base).ok()?;
        match self.style {
            UrlStyle::Title => {
                let title = topic.trim().replace(' ', "_");
                url.path_segments_mut().ok()?.pop_if_empty().push(&title);
            }
            UrlStyle::Query(param) => {
                url.query_pairs_mut().append_pair(param, topic.trim());
            }
        }
        Some(url.to_string())
    }
}

pub const SITE_CATALOG: &[SiteTemplate] = &[
    SiteTemplate {
        name: "wikipedia",
        hint: "encyclopedia article title",
        base: "https://en.wikipedia.org/wiki/",
        style: UrlStyle::Title,
    },
    SiteTemplate {
        name: "allrecipes",
        hint: "recipe search query",
        base: "https://www.allrecipes.com/search",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "bbc",
        hint: "news search query",
        base: "https://www.bbc.com/search",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "medium",
        hint: "blog post search query",
        base: "https://medium.com/search",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "wikihow",
        hint: "how-to search query",
        base: "https://www.wikihow.com/wikiHowTo",
        style: UrlStyle::Query("search"),
    },
    SiteTemplate {
        name: "instructables",
        hint: "DIY project search query",
        base: "https://www.instructables.com/search/",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "imdb",
        hint: "film or TV title",
        base: "https://www.imdb.com/find/",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "goodreads",
        hint: "book title or author",
        base: "https://www.goodreads.com/search",
        style: UrlStyle::Query("q"),
    },
    SiteTemplate {
        name: "archive",
        hint: "archive.org search query",
        base: "https://archive.org/search",
        style: UrlStyle::Query("query"),
    },
    SiteTemplate {
        name: "britannica",
        hint: "encyclopedia search query",
        base: "https://www.britannica.com/search",
        style: UrlStyle::Query("query"),
    },
    SiteTemplate {
        name: "devto",
        hint: "programming article search query",
        base: "https://dev.to/search",
        style: UrlStyle::Query("q"),
    },
];

/// Look up a catalog site by name, ignoring case and surrounding space.
pub fn find_site(name: &str) -> Option<&'static SiteTemplate> {
    let name = name.trim();
    SITE_CATALOG
        .iter()
        .find(|site| site.name.eq_ignore_ascii_case(name))
}

/// Generic destinations that need no generated topic.
pub const FALLBACK_URLS: &[&str] = &[
    "https://en.wikipedia.org/wiki/Special:Random",
    "https://www.bbc.com/news",
    "https://www.reuters.com",
    "https://apnews.com",
    "https://www.npr.org",
    "https://www.britannica.com",
    "https://www.wikihow.com/Special:Randomizer",
    "https://www.allrecipes.com",
    "https://www.imdb.com",
    "https://archive.org",
    "https://dev.to",
    "https://www.goodreads.com",
];

pub const FALLBACK_TOPIC: &str = "general browsing";
pub const FALLBACK_SITE: &str = "fallback";

/// Shuffle the fallback list and take `count` targets.
pub fn fallback_batch(count: usize, rng: &dyn RandomSource) -> Vec<BrowseTarget> {
    let mut urls: Vec<&str> = FALLBACK_URLS.to_vec();
    shuffle(&mut urls, rng);
    urls.into_iter()
        .take(count)
        .map(|url| BrowseTarget {
            site: FALLBACK_SITE.to_string(),
            url: url.to_string(),
            topic: FALLBACK_TOPIC.to_string(),
        })
        .collect()
}
