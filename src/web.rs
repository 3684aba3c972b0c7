use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::USER_AGENT;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const SKIPPED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Title and description of a search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlInfo {
    pub url: String,
    pub title: String,
    pub description: String,
}

/// Turns a URL into the text an agent should read.
#[async_trait]
pub trait SiteReader: Send + Sync {
    /// Returns `None` when the site cannot be read.
    async fn read(&self, url: &str) -> Option<String>;
}

/// Runs an internet search.
#[async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<UrlInfo>>;
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|err| Error::Scrape(format!("invalid selector '{css}': {err}")))
}

/// Visible text of the `<body>`, one text run per line. Script and style contents are skipped.
pub fn extract_body_text(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let body_selector = selector("body")?;
    let Some(body) = document.select(&body_selector).next() else {
        return Ok(String::new());
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|element| element.name()))
            .is_some_and(|name| SKIPPED_TAGS.iter().any(|tag| *tag == name));
        let text = text.trim();
        if !hidden && !text.is_empty() {
            lines.push(text.to_string());
        }
    }
    Ok(lines.join("\n"))
}

/// Title and meta description of an HTML page.
pub fn extract_url_info(url: &str, html: &str) -> Result<UrlInfo> {
    let document = Html::parse_document(html);
    let title = document
        .select(&selector("title")?)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| "No title found".to_string());
    let description = document
        .select(&selector(r#"meta[name="description"]"#)?)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .unwrap_or_else(|| "No description found".to_string());
    Ok(UrlInfo {
        url: url.to_string(),
        title,
        description,
    })
}

/// Target URLs of the result links on a DuckDuckGo HTML results page.
pub fn duckduckgo_result_urls(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let links = selector("a.result__a")?;
    let mut urls = Vec::new();
    for link in document.select(&links) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };
        let Ok(parsed) = Url::parse(&absolute) else {
            continue;
        };
        // Result links go through a redirect that carries the target in `uddg`.
        let target = parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
            .unwrap_or(absolute);
        if !urls.contains(&target) {
            urls.push(target);
        }
    }
    Ok(urls)
}

async fn get_html(client: &reqwest::Client, url: &str) -> Option<String> {
    let request = client.get(url).header(USER_AGENT, BROWSER_USER_AGENT);
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(url, error = %err, "failed to retrieve the website");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(url, status = %response.status(), "failed to retrieve the website");
        return None;
    }
    response.text().await.ok()
}

/// Reads and returns the body text of the website at `url`.
pub async fn read_website(client: &reqwest::Client, url: &str) -> Option<String> {
    let html = get_html(client, url).await?;
    match extract_body_text(&html) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(url, error = %err, "failed to parse the website");
            None
        }
    }
}

/// Fetches the title and description of the website at `url`.
pub async fn fetch_url_info(client: &reqwest::Client, url: &str) -> Option<UrlInfo> {
    let html = get_html(client, url).await?;
    extract_url_info(url, &html).ok()
}

/// [`SiteReader`] that downloads the page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSiteReader {
    client: reqwest::Client,
}

impl HttpSiteReader {
    pub fn new() -> Self {
        Self {
            client: web_client(),
        }
    }
}

impl Default for HttpSiteReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SiteReader for HttpSiteReader {
    async fn read(&self, url: &str) -> Option<String> {
        read_website(&self.client, url).await
    }
}

/// [`Searcher`] backed by the DuckDuckGo HTML endpoint.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearcher {
    client: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoSearcher {
    pub fn new(max_results: usize) -> Self {
        Self {
            client: web_client(),
            max_results,
        }
    }
}

impl Default for DuckDuckGoSearcher {
    fn default() -> Self {
        Self::new(5)
    }
}

#[async_trait]
impl Searcher for DuckDuckGoSearcher {
    async fn search(&self, query: &str) -> Result<Vec<UrlInfo>> {
        let url = Url::parse_with_params(DUCKDUCKGO_HTML_URL, &[("q", query)])
            .map_err(|err| Error::Scrape(err.to_string()))?;
        let html = get_html(&self.client, url.as_str())
            .await
            .ok_or_else(|| Error::Scrape(format!("search for '{query}' failed")))?;

        let mut results = Vec::new();
        for target in duckduckgo_result_urls(&html)?
            .into_iter()
            .take(self.max_results)
        {
            if let Some(info) = fetch_url_info(&self.client, &target).await {
                results.push(info);
            }
        }
        debug!(query, results = results.len(), "search finished");
        Ok(results)
    }
}

fn web_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl<F> SiteReader for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    async fn read(&self, url: &str) -> Option<String> {
        self(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
  <head>
    <title> Books to Scrape </title>
    <meta name="description" content="A sandbox for web scraping.">
    <style>body { color: red; }</style>
  </head>
  <body>
    <h1>All products</h1>
    <script>var tracking = true;</script>
    <p>A <b>Light</b> in the Attic</p>
  </body>
</html>"#;

    #[test]
    fn body_text_skips_scripts() {
        let text = extract_body_text(PAGE).unwrap();
        assert_eq!(text, "All products\nA\nLight\nin the Attic");
    }

    #[test]
    fn url_info_reads_title_and_description() {
        let info = extract_url_info("https://books.toscrape.com", PAGE).unwrap();
        assert_eq!(info.title, "Books to Scrape");
        assert_eq!(info.description, "A sandbox for web scraping.");
    }

    #[test]
    fn url_info_fallbacks() {
        let info = extract_url_info("https://example.com", "<html><body></body></html>").unwrap();
        assert_eq!(info.title, "No title found");
        assert_eq!(info.description, "No description found");
    }

    #[test]
    fn duckduckgo_redirects_are_unwrapped() {
        let html = r#"<div>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Ftoscrape.com%2F&amp;rut=abc">Scrape</a>
            <a class="result__a" href="https://www.rust-lang.org/">Rust</a>
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Ftoscrape.com%2F">Again</a>
        </div>"#;
        assert_eq!(
            duckduckgo_result_urls(html).unwrap(),
            vec!["https://toscrape.com/", "https://www.rust-lang.org/"]
        );
    }
}
