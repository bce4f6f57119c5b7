//! Common test setup functions.

use std::sync::Arc;

use api::{router, AppState, ReceiverConfig};
use axum::Router;
use axum_test::TestServer;
use connectors::{AiAnalyzer, NoteStore, VaultConfig, VaultNoteStore};
use inbox_core::{ItemId, QueueItem};
use queue_store::{QueueStore, SqliteQueueStore, StoreConfig};
use tempfile::TempDir;
use tokio::sync::watch;
use worker::{Collaborators, PipelineSettings, Processor, ProcessorConfig, RunSummary};

use crate::mocks::Mocks;

/// Knobs for [`TestContext::with_options`].
#[derive(Clone)]
pub struct TestOptions {
    pub allowed_users: Vec<i64>,
    pub processor: ProcessorConfig,
    /// `false` runs with the AI provider disabled.
    pub ai_enabled: bool,
    /// Write notes to a real vault under the temp dir instead of the mock.
    pub real_vault: bool,
    pub send_preview: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            allowed_users: Vec::new(),
            processor: ProcessorConfig::default(),
            ai_enabled: true,
            real_vault: false,
            send_preview: true,
        }
    }
}

/// Test context with a temporary SQLite queue and mock collaborators.
///
/// Uses the real router, the real processor and the real store, so tests
/// exercise the same code paths as production apart from the network and
/// filesystem collaborators.
pub struct TestContext {
    pub dir: TempDir,
    pub store: Arc<dyn QueueStore>,
    pub mocks: Mocks,
    pub collaborators: Collaborators,
    pub options: TestOptions,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store: Arc<dyn QueueStore> = Arc::new(
            SqliteQueueStore::open(StoreConfig::at(dir.path().join("inbox.db")))
                .expect("Failed to open queue store"),
        );

        let mocks = Mocks::default();
        let notes: Arc<dyn NoteStore> = if options.real_vault {
            let vault = dir.path().join("vault");
            std::fs::create_dir_all(&vault).expect("Failed to create vault");
            Arc::new(VaultNoteStore::new(VaultConfig {
                path: vault,
                ..VaultConfig::default()
            }))
        } else {
            mocks.notes.clone()
        };
        let analyzer = options
            .ai_enabled
            .then(|| mocks.analyzer.clone() as Arc<dyn AiAnalyzer>);

        let collaborators = Collaborators {
            content: mocks.content.clone(),
            ocr: Some(mocks.ocr.clone()),
            articles: Some(mocks.articles.clone()),
            analyzer,
            notes,
            notifier: mocks.notifier.clone(),
        };

        let state = AppState::new(
            store.clone(),
            options.processor.max_attempts,
            ReceiverConfig {
                allowed_users: options.allowed_users.clone(),
            },
            options.processor.stale_after(),
        );

        Self {
            router: router(state),
            dir,
            store,
            mocks,
            collaborators,
            options,
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    /// A processor over this context's store and collaborators.
    pub fn processor(&self) -> Processor {
        self.processor_on(self.store.clone())
    }

    /// A processor over another handle to the same database.
    pub fn processor_on(&self, store: Arc<dyn QueueStore>) -> Processor {
        Processor::new(
            store,
            &self.collaborators,
            &PipelineSettings::default(),
            self.options.processor.clone(),
            self.options.send_preview,
        )
    }

    /// A second connection to this context's database file.
    pub fn second_store(&self) -> Arc<dyn QueueStore> {
        Arc::new(
            SqliteQueueStore::open(StoreConfig::at(self.dir.path().join("inbox.db")))
                .expect("Failed to open second store handle"),
        )
    }

    /// Drain the queue with a fresh processor.
    pub async fn process_all(&self) -> RunSummary {
        let (_tx, rx) = watch::channel(false);
        self.processor()
            .drain(&rx)
            .await
            .expect("Processor run failed")
    }

    pub async fn item(&self, id: ItemId) -> QueueItem {
        self.store
            .get(id)
            .await
            .expect("Store read failed")
            .expect("Item not found")
    }

    /// POST a message and return the assigned id.
    pub async fn receive(&self, server: &TestServer, message: serde_json::Value) -> ItemId {
        let response = server.post("/messages").json(&message).await;
        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let body: serde_json::Value = response.json();
        ItemId(body["id"].as_i64().expect("ack carries an id"))
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
