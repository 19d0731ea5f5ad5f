//! Conversation driver: the model tool-use loop
//!
//! One driver run owns one conversation. The loop repeatedly sends the
//! accumulated history to the completion client and branches on the stop
//! reason: a natural end of turn asks the user for more input and terminates;
//! a tool invocation is dispatched and its result fed back for the next call.
//! The CTO tool is terminal and ends the loop without a further round-trip.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ship_ai::{CompletionRequest, Content, Message, ModelClient, StopReason};

use crate::{
    bus::EventBus,
    error::{Error, Result},
    events::ShipEvent,
    prompts,
    request::ShipRequest,
    tools::{RequestContext, ToolCall, Toolbox},
};

/// Builds the completion client for a run.
///
/// A user-supplied override key gets its own client; otherwise the service
/// credentials are used.
pub trait ModelFactory: Send + Sync {
    fn client(&self, api_key_override: Option<&str>) -> Arc<dyn ModelClient>;
}

/// Loop states, traced for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    AwaitingModel,
    ModelRespondedFinal,
    ModelRespondedTool,
    ToolExecuting,
    Terminated,
}

/// Drives one ship request through the conversation loop.
pub struct Driver {
    factory: Arc<dyn ModelFactory>,
    toolbox: Arc<Toolbox>,
    bus: Arc<EventBus>,
    max_tokens: Option<u32>,
}

impl Driver {
    pub fn new(factory: Arc<dyn ModelFactory>, toolbox: Arc<Toolbox>, bus: Arc<EventBus>) -> Self {
        Self {
            factory,
            toolbox,
            bus,
            max_tokens: None,
        }
    }

    /// Cap tokens per completion.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Run the loop and translate the outcome into room events.
    ///
    /// This is the outermost loop boundary of the error design: every failure
    /// becomes exactly one emitted event, cancellation becomes
    /// `creationAborted` rather than `error`.
    pub async fn execute(&self, request: &ShipRequest, cancel: CancellationToken) {
        let emitter = self.bus.emitter(&request.room_id);
        match self.run(request, cancel).await {
            Ok(()) => {}
            Err(e) if e.is_aborted() => {
                tracing::info!(room_id = %request.room_id, "run aborted by client");
                emitter.emit(ShipEvent::CreationAborted {
                    message: "Website creation aborted".to_string(),
                });
            }
            Err(e) => {
                tracing::error!(room_id = %request.room_id, error = %e, "run failed");
                emitter.emit(ShipEvent::Error {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Run the conversation loop to completion.
    ///
    /// Errors are not retried; they propagate to `execute` for event
    /// translation. Cancellation is polled at the top of each iteration and
    /// is best-effort: an in-flight call is not interrupted and side effects
    /// already applied are not rolled back.
    pub async fn run(&self, request: &ShipRequest, cancel: CancellationToken) -> Result<()> {
        let client = self.factory.client(request.api_key_override.as_deref());
        let emitter = self.bus.emitter(&request.room_id);
        let tools = self.toolbox.api_tools(request.ship_type);

        let mut conversation = vec![request.initial_message()];
        emitter.emit(ShipEvent::NewMessage {
            conversation: conversation.clone(),
        });

        let mut system = prompts::onboarding_prompt(request.ship_type);
        let mut state = DriverState::AwaitingModel;
        let mut turn = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Aborted);
            }
            turn += 1;
            tracing::debug!(room_id = %request.room_id, turn, ?state, "completion call");

            let completion = client
                .send_message(CompletionRequest {
                    system: Some(system.clone()),
                    messages: conversation.clone(),
                    tools: tools.clone(),
                    max_tokens: self.max_tokens,
                    temperature: None,
                })
                .await?;

            let stop_reason = completion.stop_reason;
            let message = completion.into_message();
            conversation.push(message.clone());
            emitter.emit(ShipEvent::NewMessage {
                conversation: conversation.clone(),
            });

            if stop_reason != Some(StopReason::ToolUse) {
                // Natural end of turn: the model needs more input from the user.
                state = DriverState::ModelRespondedFinal;
                tracing::debug!(room_id = %request.room_id, ?state, "turn ended");
                emitter.emit(ShipEvent::NeedMoreInfo {
                    message: message.text(),
                });
                state = DriverState::Terminated;
                tracing::info!(room_id = %request.room_id, turn, ?state, "awaiting user input");
                return Ok(());
            }

            state = DriverState::ModelRespondedTool;

            // Only the first tool-use block per assistant turn is dispatched,
            // even when the model emits several. Known limitation carried over
            // from the original system.
            let (id, name, input) = message.first_tool_use().ok_or_else(|| {
                Error::Protocol("stop reason was tool_use but no tool_use block present".into())
            })?;
            let call = ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input: input.clone(),
            };

            state = DriverState::ToolExecuting;
            tracing::debug!(room_id = %request.room_id, tool = %call.name, ?state, "dispatch");
            emitter.emit(ShipEvent::Progress {
                message: format!("Running {}...", call.name),
            });

            let ctx = RequestContext {
                request,
                emitter: &emitter,
                client: &client,
            };
            let outcome = self.toolbox.dispatch(&call, &ctx).await?;

            if outcome.terminal {
                // The deploy handler has already emitted websiteDeployed;
                // no further model round-trip.
                state = DriverState::Terminated;
                tracing::info!(room_id = %request.room_id, turn, ?state, "deployed");
                return Ok(());
            }

            conversation.push(Message::user_with_content(vec![Content::ToolResult {
                tool_use_id: call.id,
                content: outcome.content,
                is_error: outcome.is_error,
            }]));
            emitter.emit(ShipEvent::NewMessage {
                conversation: conversation.clone(),
            });

            // After the first tool round the prompt narrows toward deployment.
            system = prompts::continuation_prompt();
            state = DriverState::AwaitingModel;
        }
    }
}
