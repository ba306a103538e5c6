//! Everything a run needs, built once at startup.

use crate::worker::{process_all_tasks, RunSummary};
use anyhow::{Context, Result};
use payslip_core::AppConfig;
use payslip_mail::{GmailApi, MailApi, SearchClient, TokenFile};
use payslip_scheduler::TaskStore;

/// Configuration, task store and mail client for one process.
#[derive(Debug)]
pub struct RunContext<A> {
    /// Effective configuration
    pub config: AppConfig,
    /// Task registry
    pub store: TaskStore,
    /// Mailbox client
    pub client: SearchClient<A>,
}

impl RunContext<GmailApi> {
    /// Build the production context from `config`.
    ///
    /// The token file is only read when the first request is made.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let token_path = config.token_path()?;
        tracing::debug!(path = %token_path.display(), "Using token file");

        let api = GmailApi::new(&config.gmail, TokenFile::new(token_path))
            .context("failed to create Gmail client")?;
        let client = SearchClient::from_config(api, &config.gmail);
        let store = TaskStore::new(config.tasks_file()?);

        Ok(Self::new(config, store, client))
    }
}

impl<A: MailApi> RunContext<A> {
    /// Assemble a context from parts.
    pub fn new(config: AppConfig, store: TaskStore, client: SearchClient<A>) -> Self {
        Self {
            config,
            store,
            client,
        }
    }

    /// Process every active task once.
    pub async fn run(&self) -> Result<RunSummary> {
        process_all_tasks(&self.store, &self.client, &self.config)
            .await
            .with_context(|| format!("failed to read tasks from {}", self.store.path().display()))
    }
}
