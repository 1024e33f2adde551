use crate::error::ToolExecutionError;
use serde::Deserialize;
use std::time::Duration;

pub const NAME: &str = "search";
pub const DESCRIPTION: &str = "a search engine. useful for when you need to answer questions about current events. input should be a search query.";

const DEFAULT_BASE_URL: &str = "https://serpapi.com";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer_box: Option<AnswerBox>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Default, Deserialize)]
struct AnswerBox {
    answer: Option<String>,
    snippet: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OrganicResult {
    snippet: Option<String>,
}

impl SearchResponse {
    fn best_snippet(self) -> Option<String> {
        let (answer, snippet) = match self.answer_box {
            Some(answer_box) => (answer_box.answer, answer_box.snippet),
            None => (None, None),
        };

        answer
            .or(snippet)
            .or_else(|| self.organic_results.into_iter().next()?.snippet)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

pub struct SearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SearchTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `Ok(None)` means the engine answered but had nothing usable.
    pub async fn search(&self, query: &str) -> Result<Option<String>, ToolExecutionError> {
        if self.api_key.is_empty() {
            return Err(ToolExecutionError::NotConfigured(
                "no search API key set".to_string(),
            ));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("q", query.trim())])
            .send()
            .await
            .map_err(|e| ToolExecutionError::Search(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolExecutionError::Search(format!(
                "search API error {}: {}",
                status, body
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| ToolExecutionError::Search(format!("unreadable response: {}", e)))?;

        Ok(body.best_snippet())
    }

    pub async fn execute(&self, input: &str) -> Result<String, ToolExecutionError> {
        match self.search(input).await? {
            Some(snippet) => Ok(snippet),
            None => {
                tracing::debug!(query = input, "search returned no usable snippet");
                Ok("No results found.".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn tool_for(body: serde_json::Value) -> (MockServer, SearchTool) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("api_key", "k"))
            .and(query_param("q", "weather in oslo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        let tool = SearchTool::new("k").with_base_url(server.uri());
        (server, tool)
    }

    #[tokio::test]
    async fn prefers_direct_answer() {
        let (_server, tool) = tool_for(json!({
            "answer_box": {"answer": "4°C", "snippet": "Cloudy"},
            "organic_results": [{"snippet": "Oslo forecast"}]
        }))
        .await;
        assert_eq!(tool.execute("weather in oslo").await.unwrap(), "4°C");
    }

    #[tokio::test]
    async fn falls_back_to_answer_box_snippet_then_organic() {
        let (_server, tool) = tool_for(json!({
            "answer_box": {"snippet": "Cloudy"},
        }))
        .await;
        assert_eq!(tool.execute("weather in oslo").await.unwrap(), "Cloudy");

        let (_server, tool) = tool_for(json!({
            "organic_results": [{"title": "x", "snippet": "Oslo forecast"}, {"snippet": "later"}]
        }))
        .await;
        assert_eq!(
            tool.execute("weather in oslo").await.unwrap(),
            "Oslo forecast"
        );
    }

    #[tokio::test]
    async fn missing_fields_are_not_an_error() {
        let (_server, tool) = tool_for(json!({"search_metadata": {"status": "Success"}})).await;
        assert_eq!(tool.search("weather in oslo").await.unwrap(), None);
        assert_eq!(
            tool.execute("weather in oslo").await.unwrap(),
            "No results found."
        );
    }

    #[tokio::test]
    async fn http_failure_is_a_tool_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
            .mount(&server)
            .await;

        let tool = SearchTool::new("bad").with_base_url(server.uri());
        let err = tool.execute("anything").await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::Search(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let err = SearchTool::new("").execute("anything").await.unwrap_err();
        assert!(matches!(err, ToolExecutionError::NotConfigured(_)));
    }
}
