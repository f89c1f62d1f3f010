//! HTTP scraper: reqwest fetch + regex HTML-to-markdown conversion.
//!
//! Fetches the target page, follows up to a couple of same-host links
//! that look like they carry pantry details (hours, eligibility,
//! contact), and concatenates the sections separated by `---` source-URL
//! headers. No JavaScript rendering (static HTML only).

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::ScrapeFailure;
use crate::traits::Scraper;

/// Minimum meaningful characters before a page counts as content.
const MIN_CONTENT_CHARS: usize = 40;

/// Sub-pages fetched beyond the root page.
const MAX_SUBPAGES: usize = 2;

/// Path substrings that suggest pantry-relevant detail pages.
const PRIORITY_TERMS: [&str; 10] = [
    "hours",
    "eligibility",
    "pantry",
    "food",
    "services",
    "get-help",
    "need-help",
    "locations",
    "contact",
    "about",
];

/// Paths never worth fetching (assets, auth, feeds).
const SKIP_TERMS: [&str; 14] = [
    "/wp-admin", "/wp-login", "/login", "/signin", "/logout", "/cart", "/api/", "/feed", "/rss",
    ".pdf", ".jpg", ".png", ".css", ".js",
];

fn href_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).unwrap())
}

/// Static-HTML scraper producing markdown-shaped text.
#[derive(Clone)]
pub struct HttpScraper {
    client: reqwest::Client,
    max_subpages: usize,
}

impl Default for HttpScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpScraper {
    pub fn new() -> Self {
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(12))
                .user_agent(user_agent)
                .redirect(reqwest::redirect::Policy::limited(5))
                .build()
                .unwrap_or_default(),
            max_subpages: MAX_SUBPAGES,
        }
    }

    /// Limit how many same-site sub-pages get fetched after the root.
    pub fn with_max_subpages(mut self, n: usize) -> Self {
        self.max_subpages = n;
        self
    }

    /// Add https:// when no scheme is present.
    fn normalize_url(url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<(String, Url), ScrapeFailure> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeFailure::Timeout
            } else {
                ScrapeFailure::HttpError(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            return Err(ScrapeFailure::Blocked);
        }
        if !status.is_success() {
            return Err(ScrapeFailure::HttpError(format!("HTTP {}", status)));
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ScrapeFailure::HttpError(e.to_string()))?;
        Ok((html, final_url))
    }

    /// Same-host detail links worth a follow-up fetch, best first.
    fn detail_links(base_url: &Url, html: &str) -> Vec<String> {
        let base_host = base_url.host_str().unwrap_or("");
        let mut scored: Vec<(usize, String)> = href_regex()
            .captures_iter(html)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str())
            .filter(|href| {
                !href.starts_with('#')
                    && !href.starts_with("javascript:")
                    && !href.starts_with("mailto:")
                    && !href.starts_with("tel:")
            })
            .filter_map(|href| base_url.join(href).ok())
            .filter(|url| {
                url.host_str() == Some(base_host)
                    && matches!(url.scheme(), "http" | "https")
                    && !Self::is_skip_path(url.path())
            })
            .map(|mut url| {
                url.set_fragment(None);
                url.set_query(None);
                url
            })
            .filter(|url| url.path() != base_url.path())
            .map(|url| (Self::score_path(url.path()), url.to_string()))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut seen = std::collections::HashSet::new();
        scored
            .into_iter()
            .map(|(_, url)| url)
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    fn score_path(path: &str) -> usize {
        let lower = path.to_ascii_lowercase();
        PRIORITY_TERMS
            .iter()
            .rev()
            .enumerate()
            .filter(|(_, term)| lower.contains(**term))
            .map(|(rank, _)| rank + 1)
            .sum()
    }

    fn is_skip_path(path: &str) -> bool {
        let lower = path.to_ascii_lowercase();
        SKIP_TERMS.iter().any(|term| lower.contains(term))
    }

    /// Convert HTML to markdown-shaped text: headers, paragraphs, links
    /// and lists survive; scripts, styles, and remaining tags do not.
    fn html_to_markdown(html: &str) -> String {
        static PATTERNS: OnceLock<MarkdownPatterns> = OnceLock::new();
        let p = PATTERNS.get_or_init(MarkdownPatterns::new);

        let mut text = html.to_string();
        text = p.script.replace_all(&text, "").to_string();
        text = p.style.replace_all(&text, "").to_string();
        text = p.comment.replace_all(&text, "").to_string();
        text = p.h1.replace_all(&text, "# $1\n").to_string();
        text = p.h2.replace_all(&text, "## $1\n").to_string();
        text = p.h3.replace_all(&text, "### $1\n").to_string();
        text = p.paragraph.replace_all(&text, "$1\n\n").to_string();
        text = p.line_break.replace_all(&text, "\n").to_string();
        text = p.link.replace_all(&text, "[$2]($1)").to_string();
        text = p.list_item.replace_all(&text, "- $1\n").to_string();
        text = p.tag.replace_all(&text, "").to_string();
        text = p.blank_runs.replace_all(&text, "\n\n").to_string();

        text.replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .trim()
            .to_string()
    }
}

struct MarkdownPatterns {
    script: Regex,
    style: Regex,
    comment: Regex,
    h1: Regex,
    h2: Regex,
    h3: Regex,
    paragraph: Regex,
    line_break: Regex,
    link: Regex,
    list_item: Regex,
    tag: Regex,
    blank_runs: Regex,
}

impl MarkdownPatterns {
    fn new() -> Self {
        Self {
            script: Regex::new(r"(?s)<script[^>]*>.*?</script>").unwrap(),
            style: Regex::new(r"(?s)<style[^>]*>.*?</style>").unwrap(),
            comment: Regex::new(r"(?s)<!--.*?-->").unwrap(),
            h1: Regex::new(r"(?s)<h1[^>]*>(.*?)</h1>").unwrap(),
            h2: Regex::new(r"(?s)<h2[^>]*>(.*?)</h2>").unwrap(),
            h3: Regex::new(r"(?s)<h3[^>]*>(.*?)</h3>").unwrap(),
            paragraph: Regex::new(r"(?s)<p[^>]*>(.*?)</p>").unwrap(),
            line_break: Regex::new(r"<br\s*/?>").unwrap(),
            link: Regex::new(r#"(?s)<a[^>]*href=["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap(),
            list_item: Regex::new(r"(?s)<li[^>]*>(.*?)</li>").unwrap(),
            tag: Regex::new(r"<[^>]+>").unwrap(),
            blank_runs: Regex::new(r"\n{3,}").unwrap(),
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<String, ScrapeFailure> {
        let url = Self::normalize_url(url);
        debug!(url = %url, "scrape starting");

        let (html, final_url) = self.fetch_html(&url).await?;
        let mut sections = vec![Self::html_to_markdown(&html)];

        for link in Self::detail_links(&final_url, &html)
            .into_iter()
            .take(self.max_subpages)
        {
            match self.fetch_html(&link).await {
                Ok((sub_html, _)) => {
                    let markdown = Self::html_to_markdown(&sub_html);
                    if !markdown.is_empty() {
                        sections.push(format!("---\nSource: {}\n\n{}", link, markdown));
                    }
                }
                Err(e) => {
                    debug!(url = %link, error = %e, "sub-page fetch failed");
                }
            }
        }

        let combined = sections.join("\n\n");
        if combined.trim().len() < MIN_CONTENT_CHARS {
            warn!(url = %url, "page has no meaningful content");
            return Err(ScrapeFailure::Empty);
        }

        debug!(url = %url, content_length = combined.len(), sections = sections.len(), "scrape complete");
        Ok(combined)
    }
}
