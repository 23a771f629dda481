use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatProvider, EmbeddingProvider, Message, ensure_count};

/// OpenAI API and any server exposing the same `/embeddings` and
/// `/chat/completions` routes.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    embedding_model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        model: String,
        embedding_model: String,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model,
            embedding_model,
        }
    }

    async fn post<B: Serialize + Sync>(&self, route: &str, body: &B) -> Result<String, LlmError> {
        let mut request = self
            .client
            .post(format!("{}/{route}", self.base_url))
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenAI {route} API error {status}: {text}");
            return Err(LlmError::Status {
                provider: "openai",
                status: status.as_u16(),
            });
        }
        Ok(text)
    }
}

impl EmbeddingProvider for OpenAiProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest {
            input: texts,
            model: &self.embedding_model,
        };
        let text = self.post("embeddings", &body).await?;
        let mut resp: EmbeddingResponse = serde_json::from_str(&text)?;

        ensure_count("openai", texts.len(), resp.data.len())?;
        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

impl ChatProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };
        let text = self.post("chat/completions", &body).await?;
        let resp: ChatResponse = serde_json::from_str(&text)?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }
}
