//! The turn controller: drives one user turn through the model/tool loop.
//!
//! A turn is atomic. Everything produced during it accumulates in a
//! buffer, and the buffer reaches permanent history only when the turn
//! completes with a final assistant message. Failures, budget exhaustion,
//! and cancellation discard the buffer, so history never carries a
//! half-finished tool exchange.

use kaio_core::error::Error;
use kaio_core::message::{Conversation, Message};
use kaio_core::provider::{Provider, ProviderRequest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dispatch::ToolDispatcher;
use crate::repair::{repair, repaired_content};

/// Returned when the step budget runs out.
pub const STEP_BUDGET_ADVISORY: &str =
    "Maximum tool steps reached. Please refine your request.";

/// Returned when a turn is cancelled between steps.
pub const CANCELLED_ADVISORY: &str = "Request cancelled.";

/// Whether tools are in play for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Full loop: tools offered, repair pass active.
    Online,
    /// Single completion, no tools, no loop.
    Offline,
}

pub struct TurnController {
    provider: Arc<dyn Provider>,
    model: String,
    dispatcher: ToolDispatcher,
    system_prompt: String,
    session_memory_max: usize,
    max_steps: usize,
    mode: Mode,
    cancel: Arc<AtomicBool>,
}

impl TurnController {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, dispatcher: ToolDispatcher) -> Self {
        Self {
            provider,
            model: model.into(),
            dispatcher,
            system_prompt: String::new(),
            session_memory_max: 10,
            max_steps: 10,
            mode: Mode::Online,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_session_memory_max(mut self, max: usize) -> Self {
        self.session_memory_max = max;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Swap the backing provider, e.g. after `/provider` or an offline
    /// fallback.
    pub fn set_provider(&mut self, provider: Arc<dyn Provider>, model: impl Into<String>) {
        self.provider = provider;
        self.model = model.into();
    }

    /// Flag shared with whoever can cancel this controller's turns.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Assemble the outbound message list: system prompt, the bounded
    /// window of permanent history, then the in-progress turn buffer.
    fn build_messages(&self, conversation: &Conversation, buffer: &[Message]) -> Vec<Message> {
        let mut messages = Vec::new();
        if !self.system_prompt.is_empty() {
            messages.push(Message::system(&self.system_prompt));
        }
        messages.extend_from_slice(conversation.windowed(self.session_memory_max));
        messages.extend_from_slice(buffer);
        messages
    }

    /// Run one user turn to completion.
    ///
    /// Returns the final assistant text, or an advisory string when the
    /// step budget runs out or the turn is cancelled. Provider errors
    /// propagate; the caller decides whether to retry or fall back.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<String, Error> {
        self.cancel.store(false, Ordering::SeqCst);

        if self.mode == Mode::Offline {
            return self.run_offline(conversation, input).await;
        }

        let mut buffer = vec![Message::user(input)];

        for step in 0..self.max_steps {
            if self.cancelled() {
                info!(step, "Turn cancelled, discarding buffer");
                return Ok(CANCELLED_ADVISORY.to_string());
            }

            let mut request =
                ProviderRequest::new(&self.model, self.build_messages(conversation, &buffer));
            if self.dispatcher.has_tools() {
                request = request.with_tools(self.dispatcher.definitions());
            }

            debug!(step, provider = %self.provider.name(), "Requesting completion");
            let response = self.provider.complete(request).await?;

            let mut assistant = response.message;
            if assistant.tool_calls.is_empty() {
                if let Some(repaired) = repair(&assistant.content) {
                    debug!(
                        step,
                        calls = repaired.calls.len(),
                        "Repaired tool calls out of assistant text"
                    );
                    assistant = Message::assistant_with_calls(
                        repaired_content(&repaired),
                        repaired.calls,
                    );
                }
            }

            if assistant.is_final() {
                let reply = assistant.content.clone();
                buffer.push(assistant);
                conversation.extend(buffer);
                return Ok(reply);
            }

            let calls = assistant.tool_calls.clone();
            buffer.push(assistant);

            for call in &calls {
                if self.cancelled() {
                    info!(step, "Turn cancelled mid-dispatch, discarding buffer");
                    return Ok(CANCELLED_ADVISORY.to_string());
                }
                let result = self.dispatcher.dispatch(call).await;
                buffer.push(Message::tool_result(&call.id, &call.name, result));
            }
        }

        warn!(max_steps = self.max_steps, "Step budget exhausted, discarding buffer");
        Ok(STEP_BUDGET_ADVISORY.to_string())
    }

    /// Offline path: one completion, no tools, no loop.
    async fn run_offline(
        &self,
        conversation: &mut Conversation,
        input: &str,
    ) -> Result<String, Error> {
        let buffer = vec![Message::user(input)];
        let request =
            ProviderRequest::new(&self.model, self.build_messages(conversation, &buffer));
        let response = self.provider.complete(request).await?;

        let reply = response.message.content.clone();
        conversation.extend(buffer);
        conversation.push(response.message);
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kaio_core::error::ProviderError;
    use kaio_core::message::ToolInvocation;
    use kaio_core::provider::ProviderResponse;
    use kaio_core::tool::ToolRegistry;
    use kaio_core::Role;
    use kaio_mcp::McpRegistry;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Provider that replays a script of responses and records requests.
    struct ScriptedProvider {
        responses: Mutex<VecDeque<Result<Message, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<Message, ProviderError>>) -> Self {
            Self {
                responses: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_request_tools(&self) -> usize {
            self.requests
                .lock()
                .unwrap()
                .last()
                .map(|r| r.tools.len())
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Message::assistant("out of script")));
            next.map(|message| ProviderResponse {
                message,
                model: "scripted-model".into(),
            })
        }
    }

    fn empty_dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(ToolRegistry::new(), Arc::new(McpRegistry::new()))
    }

    fn local_dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(kaio_tools::default_registry(), Arc::new(McpRegistry::new()))
    }

    fn controller(provider: Arc<ScriptedProvider>, dispatcher: ToolDispatcher) -> TurnController {
        TurnController::new(provider, "test-model", dispatcher)
            .with_system_prompt("be helpful")
            .with_max_steps(10)
    }

    #[tokio::test]
    async fn plain_answer_completes_in_one_step() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("Hi!"))]));
        let ctrl = controller(Arc::clone(&provider), empty_dispatcher());
        let mut conv = Conversation::new();

        let reply = ctrl.run_turn(&mut conv, "hello").await.unwrap();
        assert_eq!(reply, "Hi!");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].role, Role::User);
        assert_eq!(conv.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn tool_call_round_trip_lands_four_messages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.txt"), "content").unwrap();
        let args = serde_json::json!({"directory": dir.path().to_string_lossy()}).to_string();

        let call = ToolInvocation::new("list_files", args);
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Message::assistant_with_calls("", vec![call])),
            Ok(Message::assistant("There is one file: x.txt")),
        ]));
        let ctrl = controller(Arc::clone(&provider), local_dispatcher());
        let mut conv = Conversation::new();

        let reply = ctrl.run_turn(&mut conv, "list the files").await.unwrap();
        assert_eq!(reply, "There is one file: x.txt");
        assert_eq!(conv.messages.len(), 4);
        assert_eq!(conv.messages[1].tool_calls.len(), 1);
        assert_eq!(conv.messages[2].role, Role::Tool);
        assert!(conv.messages[2].content.starts_with("Contents of "));
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn step_budget_exhaustion_discards_buffer() {
        let looping: Vec<_> = (0..12)
            .map(|_| {
                Ok(Message::assistant_with_calls(
                    "",
                    vec![ToolInvocation::new("get_os_info", "{}")],
                ))
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(looping));
        let ctrl = controller(Arc::clone(&provider), local_dispatcher()).with_max_steps(10);
        let mut conv = Conversation::new();

        let reply = ctrl.run_turn(&mut conv, "loop forever").await.unwrap();
        assert_eq!(reply, STEP_BUDGET_ADVISORY);
        assert!(conv.messages.is_empty());
        assert_eq!(provider.request_count(), 10);
    }

    #[tokio::test]
    async fn provider_error_propagates_and_discards_buffer() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::AuthenticationFailed {
                provider: "huggingface".into(),
            },
        )]));
        let ctrl = controller(Arc::clone(&provider), empty_dispatcher());
        let mut conv = Conversation::new();

        let err = ctrl.run_turn(&mut conv, "hello").await.unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
        assert!(conv.messages.is_empty());
        // The controller does not switch modes on its own.
        assert_eq!(ctrl.mode(), Mode::Online);
    }

    #[tokio::test]
    async fn repaired_text_calls_are_dispatched() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Message::assistant(r#"Checking. <get_os_info />"#)),
            Ok(Message::assistant("All done.")),
        ]));
        let ctrl = controller(Arc::clone(&provider), local_dispatcher());
        let mut conv = Conversation::new();

        let reply = ctrl.run_turn(&mut conv, "what OS?").await.unwrap();
        assert_eq!(reply, "All done.");
        assert_eq!(conv.messages.len(), 4);
        assert_eq!(conv.messages[1].content, "Checking.");
        assert_eq!(conv.messages[1].tool_calls[0].name, "get_os_info");
        assert!(conv.messages[2].content.contains("OS:"));
    }

    #[tokio::test]
    async fn tools_are_offered_only_when_registered() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("ok"))]));
        let ctrl = controller(Arc::clone(&provider), empty_dispatcher());
        let mut conv = Conversation::new();
        ctrl.run_turn(&mut conv, "hi").await.unwrap();
        assert_eq!(provider.last_request_tools(), 0);

        let provider2 = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("ok"))]));
        let ctrl2 = controller(Arc::clone(&provider2), local_dispatcher());
        let mut conv2 = Conversation::new();
        ctrl2.run_turn(&mut conv2, "hi").await.unwrap();
        assert_eq!(provider2.last_request_tools(), 8);
    }

    #[tokio::test]
    async fn offline_mode_is_a_single_toolless_completion() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant(
            "local answer",
        ))]));
        let ctrl = controller(Arc::clone(&provider), local_dispatcher()).with_mode(Mode::Offline);
        let mut conv = Conversation::new();

        let reply = ctrl.run_turn(&mut conv, "hello").await.unwrap();
        assert_eq!(reply, "local answer");
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(provider.request_count(), 1);
        assert_eq!(provider.last_request_tools(), 0);
    }

    #[tokio::test]
    async fn pre_set_cancel_flag_is_cleared_at_turn_start() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("Hi!"))]));
        let ctrl = controller(Arc::clone(&provider), empty_dispatcher());
        ctrl.cancel_flag().store(true, Ordering::SeqCst);
        let mut conv = Conversation::new();

        // A stale flag from a previous turn must not cancel the new one.
        let reply = ctrl.run_turn(&mut conv, "hello").await.unwrap();
        assert_eq!(reply, "Hi!");
    }

    #[tokio::test]
    async fn window_bounds_outbound_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Message::assistant("ok"))]));
        let ctrl = controller(Arc::clone(&provider), empty_dispatcher())
            .with_session_memory_max(2);
        let mut conv = Conversation::new();
        for i in 0..6 {
            conv.push(Message::user(format!("old {i}")));
            conv.push(Message::assistant(format!("reply {i}")));
        }

        ctrl.run_turn(&mut conv, "latest").await.unwrap();
        let requests = provider.requests.lock().unwrap();
        // system + 2 windowed + 1 buffered user message
        assert_eq!(requests[0].messages.len(), 4);
        assert_eq!(requests[0].messages[0].role, Role::System);
    }
}
