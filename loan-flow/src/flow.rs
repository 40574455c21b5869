use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    error::{FlowError, Result},
    session::{DocumentRef, Session, Stage},
    task::{ActionTag, Inbound, NextAction, Payload, StageTask, TaskResult},
};

/// Most stage hops one inbound event may trigger
pub const MAX_CHAIN: usize = Stage::ALL.len();

/// Settled reply for one inbound event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub response: String,
    pub stage: Stage,
    pub action: Option<ActionTag>,
    pub payload: Payload,
}

/// The conversation state machine: one task per stage
pub struct LoanFlow {
    tasks: DashMap<Stage, Arc<dyn StageTask>>,
}

impl LoanFlow {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Register a task; it replaces any task already handling the same stage
    pub fn add_task(&self, task: Arc<dyn StageTask>) -> &Self {
        self.tasks.insert(task.stage(), task);
        self
    }

    pub fn has_task(&self, stage: Stage) -> bool {
        self.tasks.contains_key(&stage)
    }

    /// Stages with no registered task
    pub fn missing_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| !self.has_task(*stage))
            .collect()
    }

    /// Reset the session and emit the greeting.
    pub async fn start(&self, session: &mut Session) -> Result<TurnResult> {
        self.reset(session);
        self.execute_session(session, Inbound::default()).await
    }

    pub async fn handle_event(
        &self,
        session: &mut Session,
        user_text: &str,
        document: Option<DocumentRef>,
    ) -> Result<TurnResult> {
        let event = Inbound {
            text: user_text.to_string(),
            document,
        };
        self.execute_session(session, event).await
    }

    pub fn reset(&self, session: &mut Session) {
        info!(session_id = %session.id, from = %session.stage, "Resetting session");
        session.reset();
    }

    /// Run the current stage's task and apply its `NextAction`, following
    /// `GoToAndExecute` chains until a task settles.
    pub async fn execute_session(&self, session: &mut Session, event: Inbound) -> Result<TurnResult> {
        let mut payload = Payload::default();
        let mut hops = 0;

        loop {
            let stage = session.stage;
            let result = self.execute_single_task(stage, session, &event).await?;

            // A task that waits for input has left the session as it was
            if result.next_action != NextAction::WaitForInput {
                session.status_message = result.status_message.clone();
                session.touch();
            }

            let TaskResult {
                response,
                next_action,
                action,
                payload: task_payload,
                ..
            } = result;
            payload = payload.merge(task_payload);

            let settled = match next_action {
                NextAction::WaitForInput => stage,
                NextAction::GoTo(next) => next,
                NextAction::End => Stage::Completed,
                NextAction::GoToAndExecute(next) => {
                    hops += 1;
                    if hops > MAX_CHAIN {
                        return Err(FlowError::ChainLimitExceeded(MAX_CHAIN));
                    }
                    debug!(session_id = %session.id, from = %stage, to = %next, "Chaining stage");
                    session.stage = next;
                    continue;
                }
            };

            session.stage = settled;
            info!(
                session_id = %session.id,
                from = %stage,
                to = %settled,
                action = ?action,
                "Turn settled"
            );
            return Ok(TurnResult {
                response,
                stage: settled,
                action,
                payload,
            });
        }
    }

    async fn execute_single_task(
        &self,
        stage: Stage,
        session: &mut Session,
        event: &Inbound,
    ) -> Result<TaskResult> {
        let task = self
            .tasks
            .get(&stage)
            .map(|entry| entry.clone())
            .ok_or(FlowError::StageNotRegistered(stage))?;

        debug!(session_id = %session.id, stage = %stage, "running task");
        task.run(session, event).await
    }
}

impl Default for LoanFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating flows
pub struct LoanFlowBuilder {
    flow: LoanFlow,
}

impl LoanFlowBuilder {
    pub fn new() -> Self {
        Self {
            flow: LoanFlow::new(),
        }
    }

    pub fn add_task(self, task: Arc<dyn StageTask>) -> Self {
        self.flow.add_task(task);
        self
    }

    pub fn build(self) -> LoanFlow {
        self.flow
    }
}

impl Default for LoanFlowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo {
        stage: Stage,
        next: NextAction,
    }

    #[async_trait]
    impl StageTask for Echo {
        fn stage(&self) -> Stage {
            self.stage
        }

        async fn run(&self, _session: &mut Session, event: &Inbound) -> Result<TaskResult> {
            Ok(TaskResult::new(format!("{}: {}", self.stage, event.text), self.next))
        }
    }

    fn echo(stage: Stage, next: NextAction) -> Arc<dyn StageTask> {
        Arc::new(Echo { stage, next })
    }

    #[tokio::test]
    async fn chained_stages_settle_on_last_task() {
        let flow = LoanFlowBuilder::new()
            .add_task(echo(Stage::ReviewingTerms, NextAction::GoToAndExecute(Stage::ProcessingUnderwriting)))
            .add_task(echo(Stage::ProcessingUnderwriting, NextAction::GoToAndExecute(Stage::GeneratingSanction)))
            .add_task(echo(Stage::GeneratingSanction, NextAction::End))
            .build();

        let mut session = Session::new("chain");
        session.stage = Stage::ReviewingTerms;
        let turn = flow.handle_event(&mut session, "yes", None).await.unwrap();

        assert_eq!(turn.stage, Stage::Completed);
        assert_eq!(session.stage, Stage::Completed);
        assert_eq!(turn.response, "generating_sanction: yes");
    }

    #[tokio::test]
    async fn missing_task_is_an_error_and_leaves_stage() {
        let flow = LoanFlowBuilder::new()
            .add_task(echo(Stage::ReviewingTerms, NextAction::GoToAndExecute(Stage::ProcessingUnderwriting)))
            .build();

        let mut session = Session::new("missing");
        session.stage = Stage::ReviewingTerms;
        let err = flow.handle_event(&mut session, "yes", None).await.unwrap_err();

        assert!(matches!(err, FlowError::StageNotRegistered(Stage::ProcessingUnderwriting)));
        assert_eq!(session.stage, Stage::ProcessingUnderwriting);
        assert_eq!(flow.missing_stages().len(), Stage::ALL.len() - 1);
    }

    #[tokio::test]
    async fn self_loop_hits_chain_limit() {
        let flow = LoanFlowBuilder::new()
            .add_task(echo(Stage::Completed, NextAction::GoToAndExecute(Stage::Completed)))
            .build();

        let mut session = Session::new("loop");
        session.stage = Stage::Completed;
        let err = flow.handle_event(&mut session, "", None).await.unwrap_err();
        assert!(matches!(err, FlowError::ChainLimitExceeded(MAX_CHAIN)));
    }

    #[tokio::test]
    async fn wait_for_input_keeps_stage() {
        let flow = LoanFlowBuilder::new()
            .add_task(echo(Stage::AwaitingTenure, NextAction::WaitForInput))
            .build();
        let mut session = Session::new("wait");
        session.stage = Stage::AwaitingTenure;
        let turn = flow.handle_event(&mut session, "dunno", None).await.unwrap();
        assert_eq!(turn.stage, Stage::AwaitingTenure);
        assert_eq!(session.stage, Stage::AwaitingTenure);
    }
}
