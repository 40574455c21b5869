//! FlowRunner: loads a session, runs one turn of the flow and saves the
//! session back to storage.
//!
//! The session is saved whether or not the turn succeeded. A failed turn
//! leaves the session on the stage whose task failed, so the next event for
//! that session retries it:
//!
//! ```rust,ignore
//! let runner = FlowRunner::new(Arc::new(flow), Arc::new(InMemorySessionStorage::new()));
//! runner.start("abc").await?;
//! let turn = runner.handle("abc", "9123456789", None).await?;
//! ```

use std::sync::Arc;
use tracing::warn;

use crate::{
    error::{FlowError, Result},
    flow::{LoanFlow, TurnResult},
    session::{DocumentRef, Session},
    storage::SessionStorage,
};

/// Orchestrates the _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    flow: Arc<LoanFlow>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(flow: Arc<LoanFlow>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { flow, storage }
    }

    pub fn flow(&self) -> &LoanFlow {
        &self.flow
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Start (or restart) the conversation for `session_id`.
    pub async fn start(&self, session_id: &str) -> Result<TurnResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .unwrap_or_else(|| Session::new(session_id));
        let result = self.flow.start(&mut session).await;
        self.persist(session, result).await
    }

    pub async fn handle(
        &self,
        session_id: &str,
        user_text: &str,
        document: Option<DocumentRef>,
    ) -> Result<TurnResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;
        let result = self.flow.handle_event(&mut session, user_text, document).await;
        self.persist(session, result).await
    }

    /// Reset an existing session back to `initial`.
    pub async fn reset(&self, session_id: &str) -> Result<Session> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;
        self.flow.reset(&mut session);
        self.storage.save(session.clone()).await?;
        Ok(session)
    }

    async fn persist(&self, session: Session, result: Result<TurnResult>) -> Result<TurnResult> {
        if let Err(err) = &result {
            warn!(session_id = %session.id, stage = %session.stage, error = %err, "Turn failed");
        }
        self.storage.save(session).await?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        session::Stage,
        stages::{self, testing},
        storage::InMemorySessionStorage,
    };

    fn runner() -> (FlowRunner, InMemorySessionStorage) {
        let storage = InMemorySessionStorage::new();
        let flow = stages::standard_flow(testing::deps());
        (FlowRunner::new(Arc::new(flow), Arc::new(storage.clone())), storage)
    }

    #[tokio::test]
    async fn start_creates_and_persists_session() {
        let (runner, storage) = runner();
        let turn = runner.start("r1").await.unwrap();
        assert_eq!(turn.stage, Stage::AwaitingPhone);

        let stored = storage.get("r1").await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::AwaitingPhone);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let (runner, _) = runner();
        let err = runner.handle("missing", "hi", None).await.unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn reset_returns_to_initial() {
        let (runner, storage) = runner();
        runner.start("r2").await.unwrap();
        runner.handle("r2", "9123456789", None).await.unwrap();

        let session = runner.reset("r2").await.unwrap();
        assert_eq!(session.stage, Stage::Initial);
        assert!(storage.get("r2").await.unwrap().unwrap().customer.is_none());
    }

    #[tokio::test]
    async fn failed_turn_is_still_saved() {
        let (runner, storage) = runner();
        let mut session = Session::new("r3");
        session.stage = Stage::ProcessingUnderwriting;
        storage.save(session).await.unwrap();

        let err = runner.handle("r3", "", None).await.unwrap_err();
        assert!(matches!(err, FlowError::MissingSessionData { .. }));
        let stored = storage.get("r3").await.unwrap().unwrap();
        assert_eq!(stored.stage, Stage::ProcessingUnderwriting);
    }
}
