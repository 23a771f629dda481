use std::path::{Path, PathBuf};

use docent_core::{Config, Docent, RetrievalRequest, Selection};
use docent_index::{ErrorKind, ProvenanceTag, persist};
use docent_llm::Role;
use docent_llm::mock::MockProvider;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    data_dir: PathBuf,
    sources: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let sources = dir.path().join("sources");
        std::fs::create_dir_all(&sources).unwrap();
        Self {
            _dir: dir,
            data_dir,
            sources,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.storage.data_dir = self.data_dir.clone();
        config
    }

    fn docent(&self) -> Docent<MockProvider, MockProvider> {
        self.docent_with(MockProvider::default(), MockProvider::default())
    }

    fn docent_with(
        &self,
        embedder: MockProvider,
        chat: MockProvider,
    ) -> Docent<MockProvider, MockProvider> {
        Docent::with_providers(self.config(), embedder, chat).unwrap()
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.sources.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn uploads(&self) -> Vec<PathBuf> {
        entries(&self.data_dir.join("uploads"))
    }

    fn indexes(&self) -> Vec<PathBuf> {
        entries(&self.data_dir.join("indexes"))
    }
}

fn entries(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(rd) => rd.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

const NOTES: &str = "Quarterly revenue grew twelve percent\n\
                     \n\
                     The zebra crossing was repainted in March\n\
                     Customer churn fell to three percent\n";

#[tokio::test]
async fn ingest_retrieve_answer() {
    let fx = Fixture::new();
    let chat = MockProvider::with_responses(vec!["  Churn fell to 3%.  ".into()]);
    let docent = fx.docent_with(MockProvider::default(), chat.clone());

    let ingested = docent.ingest(&fx.write("notes.txt", NOTES)).await.unwrap();
    assert_eq!(ingested.chunk_count, 3);

    let listed = docent.list_documents();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, ingested.document_id);
    assert_eq!(listed[0].name, "notes.txt");
    assert!(listed[0].upload_dir.join("notes.txt").is_file());
    assert!(persist::exists(&listed[0].index_path));

    let request = RetrievalRequest::new(
        "Customer churn fell to three percent",
        vec![ingested.document_id],
    )
    .with_top_k(2);
    let result = docent.retrieve(request.clone()).await.unwrap();
    assert_eq!(result.hits.len(), 2);
    assert_eq!(result.hits[0].text, "Customer churn fell to three percent");
    assert_eq!(result.hits[0].source, ProvenanceTag::Txt { line: 4 });
    assert_eq!(result.hits[0].filename, "notes.txt");
    assert!(result.hits[0].score >= result.hits[1].score);
    assert_eq!(result.trace[0], "Received query");
    assert_eq!(result.trace[1], "Query embedded");
    assert_eq!(
        result.trace.last().map(String::as_str),
        Some("Selected top 2 results overall")
    );

    let answer = docent.answer(request).await.unwrap();
    assert_eq!(answer.answer, "Churn fell to 3%.");
    assert_eq!(answer.sources.len(), 2);

    let prompts = chat.prompts();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0][0].role, Role::System);
    let user = &prompts[0][1].content;
    assert!(user.starts_with(
        "[Context 1] Source: notes.txt, line 4\nCustomer churn fell to three percent"
    ));
    assert!(user.ends_with("\n\nQuestion: Customer churn fell to three percent\nAnswer:"));
}

#[tokio::test]
async fn hits_merge_across_documents() {
    let fx = Fixture::new();
    let docent = fx.docent();

    let a = docent.ingest(&fx.write("a.txt", NOTES)).await.unwrap();
    let b = docent
        .ingest(&fx.write(
            "b.csv",
            "region,note\nnorth,zebra crossing repainted\nsouth,new bike lanes\n",
        ))
        .await
        .unwrap();
    assert_eq!(b.chunk_count, 2);

    let result = docent
        .retrieve(
            RetrievalRequest::new("south,new bike lanes", vec![a.document_id, b.document_id])
                .with_top_k(10),
        )
        .await
        .unwrap();

    assert_eq!(result.hits.len(), 5);
    assert_eq!(result.hits[0].text, "south,new bike lanes");
    assert_eq!(result.hits[0].source, ProvenanceTag::Csv { row: 1 });
    assert_eq!(result.hits[0].document_id, b.document_id);
    assert!(result.hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[tokio::test]
async fn unsupported_file_leaves_nothing_behind() {
    let fx = Fixture::new();
    let docent = fx.docent();

    let err = docent
        .ingest(&fx.write("tool.exe", "MZ"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(fx.uploads().is_empty());
    assert!(docent.list_documents().is_empty());
}

#[tokio::test]
async fn blank_document_is_rejected_and_cleaned_up() {
    let fx = Fixture::new();
    let docent = fx.docent();

    let err = docent
        .ingest(&fx.write("empty.txt", "\n   \n\n"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(fx.uploads().is_empty());
    assert!(fx.indexes().is_empty());
    assert!(docent.list_documents().is_empty());
}

#[tokio::test]
async fn embedding_failure_persists_nothing() {
    let fx = Fixture::new();
    let embedder = MockProvider::failing_embeddings();
    let docent = fx.docent_with(embedder.clone(), MockProvider::default());

    let err = docent
        .ingest(&fx.write("notes.txt", NOTES))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    assert_eq!(embedder.embed_calls(), 1);
    assert!(fx.uploads().is_empty());
    assert!(fx.indexes().is_empty());
    assert!(docent.list_documents().is_empty());
}

#[tokio::test]
async fn short_embedding_batch_is_a_dependency_failure() {
    let fx = Fixture::new();
    let mut embedder = MockProvider::default();
    embedder.short_batches = true;
    let docent = fx.docent_with(embedder, MockProvider::default());

    let err = docent
        .ingest(&fx.write("notes.txt", NOTES))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    assert!(fx.indexes().is_empty());
}

#[tokio::test]
async fn blank_query_is_rejected_before_embedding() {
    let fx = Fixture::new();
    let embedder = MockProvider::default();
    let docent = fx.docent_with(embedder.clone(), MockProvider::default());
    let doc = docent.ingest(&fx.write("notes.txt", NOTES)).await.unwrap();
    let calls = embedder.embed_calls();

    let err = docent
        .retrieve(RetrievalRequest::new("  ", vec![doc.document_id]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(embedder.embed_calls(), calls);
}

#[tokio::test]
async fn deleted_documents_are_skipped() {
    let fx = Fixture::new();
    let docent = fx.docent();
    let a = docent.ingest(&fx.write("a.txt", NOTES)).await.unwrap();
    let b = docent
        .ingest(&fx.write("b.txt", "Only line in b"))
        .await
        .unwrap();

    let removed = docent
        .delete_documents(&Selection::Names(vec!["a.txt".into()]))
        .await
        .unwrap();
    assert_eq!(removed, vec!["a.txt".to_string()]);

    let result = docent
        .retrieve(RetrievalRequest::new(
            "Only line in b",
            vec![a.document_id, b.document_id],
        ))
        .await
        .unwrap();
    assert_eq!(result.skipped, vec![a.document_id]);
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].document_id, b.document_id);
    assert_eq!(fx.uploads().len(), 1);
}

#[tokio::test]
async fn corrupt_index_is_reported_then_rebuilt() {
    let fx = Fixture::new();
    let docent = fx.docent();
    let doc = docent.ingest(&fx.write("notes.txt", NOTES)).await.unwrap();
    let index_path = docent.list_documents()[0].index_path.clone();

    std::fs::write(&index_path, b"garbage").unwrap();
    let request = RetrievalRequest::new("zebra crossing", vec![doc.document_id]);
    let err = docent.retrieve(request.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);

    let rebuilt = docent.rebuild_document(doc.document_id).await.unwrap();
    assert_eq!(rebuilt.chunk_count, 3);
    assert_eq!(rebuilt.document_id, doc.document_id);

    let result = docent.retrieve(request).await.unwrap();
    assert_eq!(result.hits.len(), 3);
}

#[tokio::test]
async fn rebuild_unknown_document_is_not_found() {
    let fx = Fixture::new();
    let err = fx
        .docent()
        .rebuild_document(uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn rebuild_loses_to_a_concurrent_delete() {
    let fx = Fixture::new();
    let embedder = MockProvider::default();
    let docent = std::sync::Arc::new(fx.docent_with(embedder.clone(), MockProvider::default()));
    let doc = docent.ingest(&fx.write("notes.txt", NOTES)).await.unwrap();
    let entry = docent.list_documents()[0].clone();
    let calls = embedder.embed_calls();

    let held = docent.store().locks().write(&entry.index_path).await.unwrap();
    let rebuild = {
        let docent = std::sync::Arc::clone(&docent);
        tokio::spawn(async move { docent.rebuild_document(doc.document_id).await })
    };
    for _ in 0..500 {
        if embedder.embed_calls() > calls {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    docent.store().registry().remove(&[doc.document_id]).unwrap();
    persist::remove(&entry.index_path).unwrap();
    drop(held);

    let err = rebuild.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!persist::exists(&entry.index_path));
}

#[tokio::test]
async fn changed_embedding_dimension_fails_the_query() {
    let fx = Fixture::new();
    let doc = fx
        .docent()
        .ingest(&fx.write("notes.txt", NOTES))
        .await
        .unwrap();

    let other = fx.docent_with(MockProvider::default().with_dim(16), MockProvider::default());
    let err = other
        .retrieve(RetrievalRequest::new("zebra", vec![doc.document_id]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptState);
}

#[tokio::test]
async fn registry_survives_reopen() {
    let fx = Fixture::new();
    let doc = fx
        .docent()
        .ingest(&fx.write("notes.txt", NOTES))
        .await
        .unwrap();

    let reopened = fx.docent();
    assert_eq!(reopened.all_document_ids(), vec![doc.document_id]);
    let result = reopened
        .retrieve(RetrievalRequest::new("zebra", vec![doc.document_id]))
        .await
        .unwrap();
    assert_eq!(result.hits.len(), 3);
}

#[tokio::test]
async fn concurrent_ingests_register_every_document() {
    let fx = Fixture::new();
    let docent = std::sync::Arc::new(fx.docent());

    let mut handles = Vec::new();
    for i in 0..4 {
        let docent = std::sync::Arc::clone(&docent);
        let path = fx.write(&format!("doc{i}.txt"), &format!("document number {i}"));
        handles.push(tokio::spawn(async move { docent.ingest(&path).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(docent.list_documents().len(), 4);
    assert_eq!(fx.uploads().len(), 4);
}
