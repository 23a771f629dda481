use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use docent_core::{
    Answer, CoreError, IngestionResult, RetrievalRequest, RetrievalResult, Selection,
};
use docent_documents::RegistryEntry;
use docent_llm::{ChatProvider, EmbeddingProvider};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;

/// Multipart field carrying the uploaded document.
const FILE_FIELD: &str = "file";

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    documents: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct IngestResponse {
    uploaded: String,
    #[serde(flatten)]
    result: IngestionResult,
}

/// `{"files": "all"}` or `{"files": ["a.pdf", ...]}`.
#[derive(Debug, Deserialize)]
pub(crate) struct DeleteRequest {
    files: DeleteTarget,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeleteTarget {
    Keyword(String),
    Names(Vec<String>),
}

impl DeleteTarget {
    fn into_selection(self) -> Result<Selection, ApiError> {
        match self {
            Self::Keyword(k) if k == "all" => Ok(Selection::All),
            Self::Keyword(k) => Err(ApiError::invalid(format!(
                "files must be \"all\" or a list of file names, got \"{k}\""
            ))),
            Self::Names(names) => Ok(Selection::Names(names)),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteResponse {
    deleted: Vec<String>,
}

pub(crate) async fn health_handler<E, C>(
    State(state): State<AppState<E, C>>,
) -> impl IntoResponse
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        documents: state.docent.list_documents().len(),
    })
}

/// Last path component of a client-supplied file name.
fn upload_name(raw: &str) -> Option<String> {
    let name = raw.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_owned())
}

pub(crate) async fn ingest_handler<E, C>(
    State(state): State<AppState<E, C>>,
    mut multipart: Multipart,
) -> Result<Json<IngestResponse>, ApiError>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .and_then(upload_name)
            .ok_or_else(|| ApiError::invalid("uploaded file has no usable name"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::rejected(e.status(), e.body_text()))?;
        upload = Some((name, data));
    }
    let Some((name, data)) = upload else {
        return Err(ApiError::invalid(format!("missing multipart field `{FILE_FIELD}`")));
    };

    // Ingestion copies the file into uploads/, so the staged bytes only live
    // for this request.
    let staging = state
        .docent
        .config()
        .storage
        .data_dir
        .join("incoming")
        .join(Uuid::new_v4().to_string());
    let path = staging.join(&name);
    let result = match tokio::fs::create_dir_all(&staging).await {
        Ok(()) => match tokio::fs::write(&path, &data).await {
            Ok(()) => state.docent.ingest(&path).await,
            Err(e) => Err(CoreError::from(e)),
        },
        Err(e) => Err(CoreError::from(e)),
    };
    if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
        tracing::warn!(path = %staging.display(), "failed to remove staged upload: {e}");
    }

    Ok(Json(IngestResponse {
        uploaded: name,
        result: result?,
    }))
}

pub(crate) async fn ask_handler<E, C>(
    State(state): State<AppState<E, C>>,
    payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<RetrievalResult>, ApiError>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    let Json(request) = payload?;
    Ok(Json(state.docent.retrieve(request).await?))
}

pub(crate) async fn respond_handler<E, C>(
    State(state): State<AppState<E, C>>,
    payload: Result<Json<RetrievalRequest>, JsonRejection>,
) -> Result<Json<Answer>, ApiError>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    let Json(request) = payload?;
    Ok(Json(state.docent.answer(request).await?))
}

pub(crate) async fn list_files_handler<E, C>(
    State(state): State<AppState<E, C>>,
) -> Json<Vec<RegistryEntry>>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    Json(state.docent.list_documents())
}

pub(crate) async fn delete_files_handler<E, C>(
    State(state): State<AppState<E, C>>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<DeleteResponse>, ApiError>
where
    E: EmbeddingProvider + 'static,
    C: ChatProvider + 'static,
{
    let Json(request) = payload?;
    let selection = request.files.into_selection()?;
    let deleted = state.docent.delete_documents(&selection).await?;
    Ok(Json(DeleteResponse { deleted }))
}
