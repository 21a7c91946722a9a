//! Web search via the DuckDuckGo HTML endpoint.
//!
//! No API key needed: the HTML results page is fetched and scraped for
//! result titles, links, and snippets.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;
use scraper::{Html, Selector};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; kaio/0.1; +https://github.com/kaio-agent/kaio)";
const MAX_RESULTS: usize = 5;

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull (title, url, snippet) triples out of the results page.
fn extract_results(html: &str) -> Vec<(String, String, String)> {
    let document = Html::parse_document(html);
    let result_sel = match Selector::parse("div.result") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let title_sel = Selector::parse("a.result__a");
    let snippet_sel = Selector::parse("a.result__snippet, div.result__snippet");

    let (Ok(title_sel), Ok(snippet_sel)) = (title_sel, snippet_sel) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for result in document.select(&result_sel).take(MAX_RESULTS) {
        let Some(title_el) = result.select(&title_sel).next() else {
            continue;
        };
        let title = collapse_whitespace(&title_el.text().collect::<Vec<_>>().join(" "));
        let url = title_el.value().attr("href").unwrap_or("").to_string();
        let snippet = result
            .select(&snippet_sel)
            .next()
            .map(|s| collapse_whitespace(&s.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();
        results.push((title, url, snippet));
    }
    results
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with titles and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("search_web", "missing 'query'"))?;

        let response = self
            .client
            .post(SEARCH_URL)
            .header("User-Agent", USER_AGENT)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| ToolError::execution("search_web", e.to_string()))?;

        if !response.status().is_success() {
            return Err(ToolError::execution(
                "search_web",
                format!("search returned HTTP {}", response.status()),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::execution("search_web", e.to_string()))?;

        let results = extract_results(&html);
        if results.is_empty() {
            return Ok(format!("No results found for '{query}'."));
        }

        let mut output = format!("Results for '{query}':");
        for (i, (title, url, snippet)) in results.iter().enumerate() {
            output.push_str(&format!("\n{}. {title}\n   {url}", i + 1));
            if !snippet.is_empty() {
                output.push_str(&format!("\n   {snippet}"));
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"
    <html><body>
      <div class="result">
        <a class="result__a" href="https://example.com/rust">Rust Language</a>
        <a class="result__snippet">A language empowering everyone.</a>
      </div>
      <div class="result">
        <a class="result__a" href="https://example.com/cargo">Cargo Book</a>
        <div class="result__snippet">The Rust package   manager.</div>
      </div>
    </body></html>"#;

    #[test]
    fn extracts_titles_urls_and_snippets() {
        let results = extract_results(SAMPLE_PAGE);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "Rust Language");
        assert_eq!(results[0].1, "https://example.com/rust");
        assert_eq!(results[1].2, "The Rust package manager.");
    }

    #[test]
    fn empty_page_yields_no_results() {
        assert!(extract_results("<html><body></body></html>").is_empty());
    }

    #[tokio::test]
    async fn missing_query_rejected() {
        let tool = WebSearchTool::new();
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
