use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use mend_core::tools::{Tool, ToolError, ToolResult};
use mend_settings::SearchSettings;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_RESULTS: usize = 5;

/// Web search backed by the DuckDuckGo instant-answer API.
pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_options(base_url, DEFAULT_TIMEOUT, DEFAULT_MAX_RESULTS)
    }

    pub fn with_options(base_url: impl Into<String>, timeout: Duration, max_results: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("HeartMend/1.0")
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
        }
    }

    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::with_options(
            settings.base_url.clone(),
            Duration::from_secs(settings.timeout_secs),
            settings.max_results,
        )
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for background information, articles or research"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Number of results to return"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let start = Instant::now();

        let query = args["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("query is required".into()))?;

        let limit = args["max_results"]
            .as_u64()
            .map_or(self.max_results, |n| (n as usize).clamp(1, self.max_results));

        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .header("Accept", "application/json")
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Search request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(ToolResult {
                content: format!("Search failed: HTTP {status}: {body}"),
                is_error: true,
                duration: start.elapsed(),
            });
        }

        // The API answers with `application/x-javascript`, so parse the text.
        let text = response
            .text()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read response: {e}")))?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to parse response: {e}")))?;

        Ok(ToolResult {
            content: format_search_results(&body, limit),
            is_error: false,
            duration: start.elapsed(),
        })
    }
}

/// Flatten `RelatedTopics`, which nests grouped topics one level deep.
fn collect_topics<'a>(topics: &'a [Value], out: &mut Vec<&'a Value>) {
    for topic in topics {
        match topic["Topics"].as_array() {
            Some(nested) => collect_topics(nested, out),
            None => out.push(topic),
        }
    }
}

fn format_search_results(body: &Value, limit: usize) -> String {
    let mut output = String::new();

    let heading = body["Heading"].as_str().unwrap_or_default();
    if let Some(answer) = body["Answer"].as_str().filter(|s| !s.is_empty()) {
        output.push_str(&format!("Answer: {answer}\n\n"));
    }
    if let Some(abstract_text) = body["AbstractText"].as_str().filter(|s| !s.is_empty()) {
        if !heading.is_empty() {
            output.push_str(&format!("## {heading}\n"));
        }
        output.push_str(abstract_text);
        output.push('\n');
        if let Some(url) = body["AbstractURL"].as_str().filter(|s| !s.is_empty()) {
            output.push_str(&format!("Source: {url}\n"));
        }
        output.push('\n');
    }

    let mut entries: Vec<&Value> = Vec::new();
    if let Some(results) = body["Results"].as_array() {
        entries.extend(results.iter());
    }
    if let Some(topics) = body["RelatedTopics"].as_array() {
        collect_topics(topics, &mut entries);
    }

    let mut n = 0;
    for entry in entries {
        let Some(text) = entry["Text"].as_str().filter(|s| !s.is_empty()) else {
            continue;
        };
        n += 1;
        let url = entry["FirstURL"].as_str().unwrap_or("");
        output.push_str(&format!("{n}. {text}\n"));
        if !url.is_empty() {
            output.push_str(&format!("   {url}\n"));
        }
        if n >= limit {
            break;
        }
    }

    if output.is_empty() {
        output = "No search results found.".to_string();
    }

    output
}
