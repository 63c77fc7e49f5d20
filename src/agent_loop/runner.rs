//! The orchestration loop: model call, tool dispatch, repeat.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::events::{CycleEvent, CycleEventSink};
use super::limits::LoopLimits;
use super::model::{ModelEndpoint, ModelRequest, ResponseBlock};
use super::types::{CycleReport, CycleStatus, DispatchMode};
use crate::config::{HostConfig, DEFAULT_MAX_TOKENS};
use crate::conversation::{
    validate_pairing, with_generated_ids, Conversation, IdGenerator, OutcomePayload,
    ToolInvocation, Turn, UuidIdGenerator,
};
use crate::error::HostError;
use crate::mcp::{render_system_instructions, ServerRegistry, ToolDispatcher};
use crate::util::timeout::with_timeout;

/// A tool call ready to be dispatched, with its final id.
struct PendingCall {
    id: String,
    name: String,
    arguments: serde_json::Value,
}

impl PendingCall {
    fn turn(&self) -> Turn {
        Turn::ToolInvocation(ToolInvocation {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        })
    }
}

/// Drives one conversation's cycles against a model and the tool servers.
///
/// An `Orchestrator` is shared by all conversations; each `submit` works on
/// the one conversation it is handed.
pub struct Orchestrator {
    model: Arc<dyn ModelEndpoint>,
    dispatcher: ToolDispatcher,
    ids: Arc<dyn IdGenerator>,
    limits: LoopLimits,
    dispatch_mode: DispatchMode,
    max_tokens: u32,
    system_prompt: Option<String>,
    event_sink: Option<CycleEventSink>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelEndpoint>, dispatcher: ToolDispatcher) -> Self {
        Self {
            model,
            dispatcher,
            ids: Arc::new(UuidIdGenerator),
            limits: LoopLimits::default(),
            dispatch_mode: DispatchMode::default(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            event_sink: None,
        }
    }

    /// Orchestrator with limits, dispatch mode, and prompt taken from `config`.
    pub fn from_config(
        config: &HostConfig,
        model: Arc<dyn ModelEndpoint>,
        registry: Arc<ServerRegistry>,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(registry, config.timeouts.call());
        Self::new(model, dispatcher)
            .with_limits(LoopLimits::from_config(config))
            .with_dispatch_mode(config.orchestration.dispatch)
            .with_max_tokens(config.model.max_tokens)
            .with_system_prompt(config.model.system_prompt.clone())
    }

    pub fn with_limits(mut self, limits: LoopLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_event_sink(mut self, sink: CycleEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Append the user's message and run model/tool rounds until the model
    /// answers without tools or the budget is spent.
    ///
    /// A failed model call ends the cycle with an error; every turn appended
    /// before the failure stays in the conversation. Invocations are only
    /// appended together with their outcomes, so dropping this future leaves
    /// the conversation ready for the next message.
    pub async fn submit(
        &self,
        conversation: &mut Conversation,
        message: impl Into<String>,
    ) -> Result<CycleReport, HostError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(HostError::InvalidArgument("message must not be empty".into()));
        }

        conversation.transcript().validate()?;
        let start = conversation.transcript().len();
        conversation.append(Turn::user(message))?;
        let started = Instant::now();
        let mut rounds = 0;

        let status = loop {
            if rounds >= self.limits.max_rounds {
                warn!(conversation_id = %conversation.id, rounds, "round budget exhausted");
                break CycleStatus::BudgetExceeded;
            }
            if let Some(budget) = self.limits.cycle_timeout {
                if started.elapsed() >= budget {
                    warn!(conversation_id = %conversation.id, rounds, "cycle deadline passed");
                    break CycleStatus::BudgetExceeded;
                }
            }

            rounds += 1;
            self.emit(CycleEvent::RoundStarted { round: rounds });
            let request = self.build_request(conversation)?;
            debug!(
                conversation_id = %conversation.id,
                round = rounds,
                turns = request.turns.len(),
                tools = request.tools.len(),
                "calling model"
            );
            let response = with_timeout(self.limits.model_timeout, self.model.complete(&request))
                .await
                .map_err(into_model_error)?;

            let mut calls = Vec::new();
            for block in response.blocks {
                match block {
                    ResponseBlock::Text { text } if text.trim().is_empty() => {}
                    ResponseBlock::Text { text } => {
                        conversation.append(Turn::assistant(text.clone()))?;
                        self.emit(CycleEvent::AssistantText { text });
                    }
                    ResponseBlock::ToolUse {
                        id,
                        name,
                        arguments,
                    } => calls.push((id, name, arguments)),
                }
            }

            if calls.is_empty() {
                break CycleStatus::Completed;
            }

            let calls = self.assign_ids(conversation, calls);
            match self.dispatch_mode {
                DispatchMode::Sequential => self.run_sequential(conversation, calls).await?,
                DispatchMode::Concurrent => self.run_concurrent(conversation, calls).await?,
            }
        };

        info!(conversation_id = %conversation.id, rounds, %status, "cycle finished");
        self.emit(CycleEvent::Finished { status, rounds });
        Ok(CycleReport {
            conversation_id: conversation.id,
            turns: conversation.transcript().since(start).to_vec(),
            rounds,
            status,
        })
    }

    fn build_request(&self, conversation: &Conversation) -> Result<ModelRequest, HostError> {
        let turns = with_generated_ids(conversation.transcript().turns(), self.ids.as_ref());
        validate_pairing(&turns)?;

        let catalog = self.dispatcher.catalog();
        let sources = self.dispatcher.registry().instruction_sources();
        Ok(ModelRequest {
            system: render_system_instructions(self.system_prompt.as_deref(), &catalog, &sources),
            turns,
            tools: catalog.list_for_model(),
            max_tokens: self.max_tokens,
        })
    }

    /// Give every call a usable id: missing ids are generated, and ids
    /// already used in this conversation or this response are replaced.
    fn assign_ids(
        &self,
        conversation: &Conversation,
        calls: Vec<(Option<String>, String, serde_json::Value)>,
    ) -> Vec<PendingCall> {
        let transcript = conversation.transcript();
        let mut taken = HashSet::new();
        let fresh = |taken: &HashSet<String>| loop {
            let candidate = self.ids.next_id();
            if !taken.contains(&candidate) && !transcript.has_invocation(&candidate) {
                break candidate;
            }
        };

        calls
            .into_iter()
            .map(|(id, name, arguments)| {
                let id = match id.filter(|id| !id.is_empty()) {
                    Some(id) if !taken.contains(&id) && !transcript.has_invocation(&id) => id,
                    Some(duplicate) => {
                        let replacement = fresh(&taken);
                        warn!(tool = %name, %duplicate, %replacement, "duplicate tool invocation id replaced");
                        replacement
                    }
                    None => fresh(&taken),
                };
                taken.insert(id.clone());
                PendingCall {
                    id,
                    name,
                    arguments,
                }
            })
            .collect()
    }

    async fn run_sequential(
        &self,
        conversation: &mut Conversation,
        calls: Vec<PendingCall>,
    ) -> Result<(), HostError> {
        for call in calls {
            self.emit_invoked(&call);
            let outcome = self.dispatcher.dispatch(&call.name, call.arguments.clone()).await;
            conversation.append(call.turn())?;
            self.record_outcome(conversation, call, outcome)?;
        }
        Ok(())
    }

    async fn run_concurrent(
        &self,
        conversation: &mut Conversation,
        calls: Vec<PendingCall>,
    ) -> Result<(), HostError> {
        for call in &calls {
            self.emit_invoked(call);
        }
        let outcomes = join_all(
            calls
                .iter()
                .map(|call| self.dispatcher.dispatch(&call.name, call.arguments.clone())),
        )
        .await;

        for (call, outcome) in calls.into_iter().zip(outcomes) {
            conversation.append(call.turn())?;
            self.record_outcome(conversation, call, outcome)?;
        }
        Ok(())
    }

    fn record_outcome(
        &self,
        conversation: &mut Conversation,
        call: PendingCall,
        outcome: OutcomePayload,
    ) -> Result<(), HostError> {
        debug!(
            conversation_id = %conversation.id,
            tool = %call.name,
            id = %call.id,
            error = outcome.is_error(),
            "tool outcome recorded"
        );
        conversation.append(Turn::outcome(call.id.clone(), outcome.clone()))?;
        self.emit(CycleEvent::ToolCompleted {
            id: call.id,
            name: call.name,
            outcome,
        });
        Ok(())
    }

    fn emit_invoked(&self, call: &PendingCall) {
        self.emit(CycleEvent::ToolInvoked {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
    }

    fn emit(&self, event: CycleEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }
}

fn into_model_error(err: HostError) -> HostError {
    match err {
        err @ HostError::ModelCall { .. } => err,
        HostError::Timeout(ms) => HostError::model(format!("model call timed out after {ms}ms")),
        other => HostError::model(other.to_string()),
    }
}
