//! External knowledge lookups for tool-using agents.

use crate::error::AgoraError;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

const USER_AGENT: &str = "agora/0.1 (multi-agent debate simulator)";

/// A source an agent can consult before it speaks.
#[async_trait]
pub trait KnowledgeTool: Send + Sync {
    fn name(&self) -> &str;

    /// Look up `query`, returning a plain-text digest of at most
    /// `top_k_results` entries.
    async fn lookup(&self, query: &str) -> Result<String, AgoraError>;
}

/// Build a tool by its config name.
pub fn tool_by_name(name: &str, top_k_results: usize) -> Option<Box<dyn KnowledgeTool>> {
    match name.to_lowercase().as_str() {
        "wikipedia" => Some(Box::new(WikipediaTool::new(top_k_results))),
        "arxiv" => Some(Box::new(ArxivTool::new(top_k_results))),
        _ => None,
    }
}

/// List all available tool names.
pub fn available_tools() -> Vec<&'static str> {
    vec!["wikipedia", "arxiv"]
}

/// Wikipedia full-text search.
pub struct WikipediaTool {
    client: reqwest::Client,
    top_k_results: usize,
}

impl WikipediaTool {
    pub fn new(top_k_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            top_k_results: top_k_results.max(1),
        }
    }
}

#[async_trait]
impl KnowledgeTool for WikipediaTool {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn lookup(&self, query: &str) -> Result<String, AgoraError> {
        let url = format!(
            "https://en.wikipedia.org/w/api.php?action=query&list=search&srsearch={}&srlimit={}&format=json&srprop=snippet",
            urlencoding::encode(query),
            self.top_k_results
        );

        let json: Value = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(format_wikipedia_results(&json, self.top_k_results))
    }
}

fn format_wikipedia_results(json: &Value, limit: usize) -> String {
    let Some(results) = json["query"]["search"].as_array() else {
        return "No good Wikipedia search result was found.".to_string();
    };
    if results.is_empty() {
        return "No good Wikipedia search result was found.".to_string();
    }

    results
        .iter()
        .take(limit)
        .map(|entry| {
            let title = entry["title"].as_str().unwrap_or("Untitled");
            let snippet = strip_tags(entry["snippet"].as_str().unwrap_or(""));
            format!("Page: {}\nSummary: {}", title, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// arXiv paper search over the Atom export API.
pub struct ArxivTool {
    client: reqwest::Client,
    top_k_results: usize,
}

impl ArxivTool {
    pub fn new(top_k_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            top_k_results: top_k_results.max(1),
        }
    }
}

#[async_trait]
impl KnowledgeTool for ArxivTool {
    fn name(&self) -> &str {
        "arxiv"
    }

    async fn lookup(&self, query: &str) -> Result<String, AgoraError> {
        let url = format!(
            "https://export.arxiv.org/api/query?search_query=all:{}&start=0&max_results={}",
            urlencoding::encode(query),
            self.top_k_results
        );

        let body = self
            .client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        format_arxiv_feed(&body, self.top_k_results)
    }
}

static ENTRY_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>"));
static TITLE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>"));
static SUMMARY_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>"));
static PUBLISHED_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"<published>(\d{4}-\d{2}-\d{2})"));
static TAG_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"</?[^>]+>"));

fn compiled(re: &LazyLock<Result<Regex, regex::Error>>) -> Result<&Regex, AgoraError> {
    re.as_ref().map_err(|e| AgoraError::PatternError(e.clone()))
}

fn format_arxiv_feed(feed: &str, limit: usize) -> Result<String, AgoraError> {
    let entry_re = compiled(&ENTRY_RE)?;
    let title_re = compiled(&TITLE_RE)?;
    let summary_re = compiled(&SUMMARY_RE)?;
    let published_re = compiled(&PUBLISHED_RE)?;

    let entries: Vec<String> = entry_re
        .captures_iter(feed)
        .take(limit)
        .map(|entry| {
            let body = &entry[1];
            let field = |re: &Regex| {
                re.captures(body)
                    .map(|c| collapse_whitespace(&c[1]))
                    .unwrap_or_default()
            };
            format!(
                "Published: {}\nTitle: {}\nSummary: {}",
                field(published_re),
                field(title_re),
                field(summary_re)
            )
        })
        .collect();

    if entries.is_empty() {
        Ok("No good arXiv result was found.".to_string())
    } else {
        Ok(entries.join("\n\n"))
    }
}

fn strip_tags(text: &str) -> String {
    match compiled(&TAG_RE) {
        Ok(re) => collapse_whitespace(&re.replace_all(text, "")),
        Err(_) => collapse_whitespace(text),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
