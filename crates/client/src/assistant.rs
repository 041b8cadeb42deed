use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::dashboard::{parse_json, ClientError, RecruitingClient};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssistantStatus {
    pub configured: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jd_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SuggestionsResponse {
    #[serde(default)]
    suggestions: Vec<String>,
}

impl RecruitingClient {
    /// Reports whether the remote assistant has a model configured.
    pub async fn assistant_status(&self) -> Result<AssistantStatus, ClientError> {
        let url = self.endpoint("ai/status", None)?;
        let response = self.http().request(Method::GET, url).send().await?;
        parse_json(response).await
    }

    pub async fn assistant_suggestions(&self, jd_id: Option<u64>) -> Result<Vec<String>, ClientError> {
        let url = self.endpoint("ai/suggestions", jd_id)?;
        let response = self.http().request(Method::GET, url).send().await?;
        parse_json::<SuggestionsResponse>(response)
            .await
            .map(|body| body.suggestions)
    }

    /// Sends one chat message to the assistant.
    pub async fn assistant_chat(&self, request: &ChatRequest) -> Result<ChatReply, ClientError> {
        let url = self.endpoint("ai/chat", None)?;
        let response = self
            .http()
            .request(Method::POST, url)
            .json(request)
            .send()
            .await?;
        parse_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::test_support::client;

    #[tokio::test]
    async fn status_reports_configuration() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/ai/status");
                then.status(200).json_body(json!({
                    "configured": false,
                    "message": "Please configure GEMINI_API_KEY"
                }));
            })
            .await;

        let status = client.assistant_status().await.expect("status");
        assert!(!status.configured);
    }

    #[tokio::test]
    async fn suggestions_unwrap_list() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/ai/suggestions")
                    .query_param("jd_id", "3");
                then.status(200)
                    .json_body(json!({ "suggestions": ["Who are the top candidates?"] }));
            })
            .await;

        let suggestions = client.assistant_suggestions(Some(3)).await.expect("suggestions");
        mock.assert_async().await;
        assert_eq!(suggestions, vec!["Who are the top candidates?".to_string()]);
    }

    #[tokio::test]
    async fn chat_omits_missing_jd() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/ai/chat")
                    .json_body(json!({ "message": "Any bias alerts?" }));
                then.status(200).json_body(json!({
                    "response": "No high severity alerts.",
                    "suggestions": []
                }));
            })
            .await;

        let reply = client
            .assistant_chat(&ChatRequest {
                message: "Any bias alerts?".to_string(),
                jd_id: None,
            })
            .await
            .expect("chat");
        mock.assert_async().await;
        assert_eq!(reply.response, "No high severity alerts.");
    }

    #[tokio::test]
    async fn chat_failure_surfaces_status() {
        let server = MockServer::start_async().await;
        let client = client(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/ai/chat");
                then.status(500).body("AI Assistant error: quota");
            })
            .await;

        let err = client
            .assistant_chat(&ChatRequest {
                message: "hi".to_string(),
                jd_id: Some(1),
            })
            .await
            .expect_err("should error");
        assert_eq!(err.kind(), "status");
    }
}
