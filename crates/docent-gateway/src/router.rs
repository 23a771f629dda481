use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use docent_llm::{ChatProvider, EmbeddingProvider};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    ask_handler, delete_files_handler, health_handler, ingest_handler, list_files_handler,
    respond_handler,
};
use super::server::AppState;

pub(crate) fn build_router<E, C>(state: AppState<E, C>, max_body_size: usize) -> Router
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    Router::new()
        .route("/health", get(health_handler::<E, C>))
        .route("/ingest", post(ingest_handler::<E, C>))
        .route("/ask", post(ask_handler::<E, C>))
        .route("/respond", post(respond_handler::<E, C>))
        .route(
            "/files",
            get(list_files_handler::<E, C>).delete(delete_files_handler::<E, C>),
        )
        // Uploads are bounded by the configured file size, not axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use docent_core::{Config, Docent};
    use docent_llm::mock::MockProvider;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    const BOUNDARY: &str = "docent-test-boundary";

    struct Fixture {
        _dir: TempDir,
        docent: Arc<Docent<MockProvider, MockProvider>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_chat(MockProvider::default())
        }

        fn with_chat(chat: MockProvider) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.storage.data_dir = dir.path().join("data");
            let docent =
                Docent::with_providers(config, MockProvider::default(), chat).unwrap();
            Self {
                _dir: dir,
                docent: Arc::new(docent),
            }
        }

        fn router(&self, max_body_size: usize) -> Router {
            let state = AppState {
                docent: Arc::clone(&self.docent),
                started_at: Instant::now(),
            };
            build_router(state, max_body_size)
        }

        fn app(&self) -> Router {
            self.router(1_048_576)
        }

        async fn upload(&self, name: &str, contents: &str) -> (StatusCode, serde_json::Value) {
            send(self.app(), upload_request(name, contents)).await
        }
    }

    fn upload_request(name: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             {contents}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri("/ingest")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    const NOTES: &str = "Quarterly revenue grew twelve percent\n\
                         Customer churn fell to three percent\n";

    #[tokio::test]
    async fn health_reports_documents() {
        let fx = Fixture::new();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = send(fx.app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["documents"], 0);
    }

    #[tokio::test]
    async fn upload_registers_document() {
        let fx = Fixture::new();
        let (status, json) = fx.upload("notes.txt", NOTES).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["uploaded"], "notes.txt");
        assert!(json["chunk_count"].as_u64().unwrap() >= 1);

        let req = Request::builder().uri("/files").body(Body::empty()).unwrap();
        let (status, files) = send(fx.app(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(files.as_array().unwrap().len(), 1);
        assert_eq!(files[0]["name"], "notes.txt");
        assert_eq!(files[0]["id"], json["document_id"]);

        let incoming = fx.docent.config().storage.data_dir.join("incoming");
        let staged = std::fs::read_dir(&incoming).map_or(0, Iterator::count);
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn unsupported_upload_is_invalid_input() {
        let fx = Fixture::new();
        let (status, json) = fx.upload("slides.key", "binary").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_input");
        assert!(fx.docent.list_documents().is_empty());
    }

    #[tokio::test]
    async fn upload_without_file_field_is_rejected() {
        let fx = Fixture::new();
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{BOUNDARY}--\r\n"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/ingest")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, json) = send(fx.app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("file"));
    }

    #[tokio::test]
    async fn ask_skips_unknown_ids_and_still_answers() {
        let fx = Fixture::new();
        let (_, uploaded) = fx.upload("notes.txt", NOTES).await;
        let unknown = Uuid::new_v4();

        let body = serde_json::json!({
            "query": "How did revenue change?",
            "document_ids": [uploaded["document_id"], unknown],
            "top_k": 2,
        });
        let (status, json) = send(fx.app(), json_request("POST", "/ask", &body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["skipped"], serde_json::json!([unknown]));
        assert!(!json["trace"].as_array().unwrap().is_empty());
        let hits = json["hits"].as_array().unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h["filename"] == "notes.txt"));
    }

    #[tokio::test]
    async fn empty_query_is_a_failure_body() {
        let fx = Fixture::new();
        let body = serde_json::json!({ "query": "  ", "document_ids": [Uuid::new_v4()] });
        let (status, json) = send(fx.app(), json_request("POST", "/ask", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_input");
        assert!(json["message"].as_str().unwrap().contains("query is empty"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_failure_body() {
        let fx = Fixture::new();
        let req = Request::builder()
            .method("POST")
            .uri("/ask")
            .header("content-type", "application/json")
            .body(Body::from("{\"query\": 3"))
            .unwrap();
        let (status, json) = send(fx.app(), req).await;
        assert!(status.is_client_error());
        assert_eq!(json["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn respond_returns_answer_with_sources() {
        let fx = Fixture::with_chat(MockProvider::with_responses(vec![
            "  Revenue grew twelve percent.  ".into(),
        ]));
        let (_, uploaded) = fx.upload("notes.txt", NOTES).await;

        let body = serde_json::json!({
            "query": "How did revenue change?",
            "document_ids": [uploaded["document_id"]],
        });
        let (status, json) = send(fx.app(), json_request("POST", "/respond", &body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        assert_eq!(json["answer"], "Revenue grew twelve percent.");
        assert!(!json["sources"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_name_then_all() {
        let fx = Fixture::new();
        fx.upload("a.txt", "alpha line").await;
        fx.upload("b.txt", "beta line").await;

        let body = serde_json::json!({ "files": ["a.txt", "missing.txt"] });
        let (status, json) = send(fx.app(), json_request("DELETE", "/files", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deleted"], serde_json::json!(["a.txt"]));

        let body = serde_json::json!({ "files": "all" });
        let (status, json) = send(fx.app(), json_request("DELETE", "/files", &body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deleted"], serde_json::json!(["b.txt"]));
        assert!(fx.docent.list_documents().is_empty());
    }

    #[tokio::test]
    async fn delete_rejects_unknown_keyword() {
        let fx = Fixture::new();
        let body = serde_json::json!({ "files": "everything" });
        let (status, json) = send(fx.app(), json_request("DELETE", "/files", &body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "invalid_input");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let fx = Fixture::new();
        let big = "x".repeat(4096);
        let (status, _) = send(fx.router(1024), upload_request("big.txt", &big)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(fx.docent.list_documents().is_empty());
    }
}
