use ollama_rs::Ollama;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};

use crate::error::LlmError;
use crate::provider::{ChatProvider, EmbeddingProvider, Message, Role, ensure_count};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.client.list_local_models().await.map_err(|e| {
            LlmError::Other(format!("failed to connect to Ollama, is it running? {e}"))
        })?;
        Ok(())
    }
}

impl EmbeddingProvider for OllamaProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );

        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama embedding request failed: {e}")))?;

        ensure_count("ollama", texts.len(), response.embeddings.len())?;
        Ok(response.embeddings)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

impl ChatProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| LlmError::Other(format!("Ollama chat request failed: {e}")))?;

        Ok(response.message.content)
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::Assistant => ChatMessage::assistant(text),
        Role::User => ChatMessage::user(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_with_explicit_port() {
        assert_eq!(
            parse_host_port("http://localhost:11434/"),
            ("http://localhost".to_owned(), 11434)
        );
        assert_eq!(
            parse_host_port("http://gpu-box:9000"),
            ("http://gpu-box".to_owned(), 9000)
        );
    }

    #[test]
    fn host_port_defaults() {
        assert_eq!(
            parse_host_port("http://ollama.internal"),
            ("http://ollama.internal".to_owned(), 11434)
        );
    }

    #[tokio::test]
    async fn empty_batch_skips_request() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "chat".into(), "embed".into());
        assert!(p.embed_texts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let p = OllamaProvider::new("http://127.0.0.1:1", "chat".into(), "embed".into());
        assert!(p.embed_texts(&["x".into()]).await.is_err());
        assert!(p.chat(&[Message::user("hi")]).await.is_err());
        assert!(p.health_check().await.is_err());
    }

    #[test]
    fn roles_map_to_ollama_messages() {
        let m = convert_message(&Message::system("rules"));
        assert_eq!(m.content, "rules");
    }
}
