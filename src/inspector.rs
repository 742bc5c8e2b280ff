use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::types::PageSnapshot;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const SKIPPED_TEXT_PARENTS: [&str; 3] = ["script", "style", "noscript"];

/// Reads a page's interactive surface. Never mutates anything.
#[async_trait]
pub trait PageInspector: Send + Sync {
    async fn inspect(&self, address: &str) -> Result<PageSnapshot, FetchError>;
}

/// Fetches the page over HTTP and classifies its markup.
#[derive(Clone)]
pub struct HttpInspector {
    client: Client,
}

impl Default for HttpInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpInspector {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self { client }
    }

    pub async fn fetch_html(&self, address: &str) -> Result<String, FetchError> {
        let transport = |e: reqwest::Error| FetchError::Transport {
            address: address.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(address).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            warn!(address, status = status.as_u16(), "Page fetch returned an error status");
            return Err(FetchError::Status {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }

    /// Visible text of the page, whitespace-collapsed and cut to `limit` chars.
    pub async fn page_text(&self, address: &str, limit: usize) -> Result<String, FetchError> {
        let html = self.fetch_html(address).await?;
        Ok(visible_text(&html, limit))
    }
}

#[async_trait]
impl PageInspector for HttpInspector {
    async fn inspect(&self, address: &str) -> Result<PageSnapshot, FetchError> {
        let html = self.fetch_html(address).await?;
        let snapshot = parse_snapshot(&html);
        debug!(
            address,
            search = snapshot.has_search_field,
            buttons = snapshot.button_labels.len(),
            links = snapshot.link_labels.len(),
            "Inspected page"
        );
        Ok(snapshot)
    }
}

/// Classify markup into a snapshot.
///
/// Only inputs explicitly typed `text` or `search` count as a search field.
/// The label comes from the first such input: placeholder, then name, then
/// the literal `"search"`. Button and link labels keep document order and
/// empty labels are retained.
pub fn parse_snapshot(html: &str) -> PageSnapshot {
    let document = Html::parse_document(html);
    let mut snapshot = PageSnapshot::default();

    if let Ok(inputs) = Selector::parse("input") {
        let mut search_inputs = document.select(&inputs).filter(|input| {
            input
                .value()
                .attr("type")
                .map(|t| t.eq_ignore_ascii_case("text") || t.eq_ignore_ascii_case("search"))
                .unwrap_or(false)
        });
        if let Some(input) = search_inputs.next() {
            let attr = |name: &str| input.value().attr(name).filter(|v| !v.is_empty());
            let label = attr("placeholder").or_else(|| attr("name")).unwrap_or("search");
            snapshot.has_search_field = true;
            snapshot.search_field_label = Some(label.to_string());
        }
    }

    if let Ok(buttons) = Selector::parse("button") {
        snapshot.button_labels = document
            .select(&buttons)
            .map(|b| b.text().collect::<String>().trim().to_string())
            .collect();
    }

    if let Ok(links) = Selector::parse("a[href]") {
        snapshot.link_labels = document
            .select(&links)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .collect();
    }

    snapshot
}

fn visible_text(html: &str, limit: usize) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut words = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
            .is_some_and(|name| SKIPPED_TEXT_PARENTS.contains(&name.as_str()));
        if !skipped {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ").chars().take(limit).collect()
}
