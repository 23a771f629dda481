//! Configuration and the services behind the docent CLI: ingestion,
//! retrieval, answering and document administration.

pub mod answer;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod retrieve;
pub mod store;

pub use answer::{Answer, AnswerService, build_prompt};
pub use app::{ConfiguredEmbedder, Docent};
pub use config::Config;
pub use error::{CoreError, ErrorKind, Failure, Result};
pub use events::{EventKind, PipelineEvent};
pub use ingest::{IngestionResult, IngestionService};
pub use retrieve::{RetrievalRequest, RetrievalResult, RetrievalService};
pub use store::{DocumentStore, Selection};
