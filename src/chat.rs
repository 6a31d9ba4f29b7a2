//! Follow-up conversation about the analyzed code.

use crate::ai::{self, CompletionRequest, LanguageModel, ModelError, PartialSink};
use crate::language::SupportedLanguage;
use crate::prompt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Model, content)
    }
}

/// Append a turn to `history`, or overwrite the last message when both it
/// and the incoming turn come from the model (a streamed reply growing).
pub fn merge_turn(history: &mut Vec<ChatMessage>, turn: ChatMessage) {
    match history.last_mut() {
        Some(last) if turn.role == ChatRole::Model && last.role == ChatRole::Model => {
            last.content = turn.content;
        }
        _ => history.push(turn),
    }
}

/// A conversation with the model, seeded once with the code under analysis.
///
/// Only completed exchanges are recorded, so each request carries the seed,
/// every earlier exchange, and the new user turn.
#[derive(Clone)]
pub struct ChatSession {
    model: Arc<dyn LanguageModel>,
    model_name: String,
    system: String,
    turns: Vec<ChatMessage>,
    timeout: Option<Duration>,
}

impl ChatSession {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        model_name: &str,
        code: &str,
        language: SupportedLanguage,
        timeout: Option<Duration>,
    ) -> Self {
        info!(language = %language, model = model_name, "opened chat session");
        Self {
            model,
            model_name: model_name.to_string(),
            system: prompt::chat_seed(code, language),
            turns: Vec::new(),
            timeout,
        }
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn request_for(&self, user_text: &str) -> CompletionRequest {
        let mut messages = self.turns.clone();
        messages.push(ChatMessage::user(user_text));
        CompletionRequest {
            model: self.model_name.clone(),
            system: Some(self.system.clone()),
            messages,
            json: false,
        }
    }

    /// Record a finished exchange so later turns see it.
    pub fn commit(&mut self, user_text: &str, reply: &str) {
        self.turns.push(ChatMessage::user(user_text));
        self.turns.push(ChatMessage::model(reply));
    }

    pub async fn send(&mut self, user_text: &str) -> Result<String, ModelError> {
        let request = self.request_for(user_text);
        let reply = ai::with_timeout(self.timeout, self.model.complete(&request)).await?;
        self.commit(user_text, &reply);
        Ok(reply)
    }

    pub async fn send_streaming(
        &mut self,
        user_text: &str,
        sink: &PartialSink,
    ) -> Result<String, ModelError> {
        let request = self.request_for(user_text);
        let reply =
            ai::with_timeout(self.timeout, self.model.complete_streaming(&request, sink)).await?;
        self.commit(user_text, &reply);
        Ok(reply)
    }

    /// Start a streamed reply on a background task.
    ///
    /// The session is not updated until the caller commits the finished
    /// exchange via [`PendingReply::finish`].
    pub fn spawn_reply(&self, user_text: &str) -> PendingReply {
        let request = self.request_for(user_text);
        let model = Arc::clone(&self.model);
        let timeout = self.timeout;
        let (tx, rx) = mpsc::unbounded_channel();

        debug!(turns = request.messages.len(), "sending chat turn");
        let task = tokio::spawn(async move {
            ai::with_timeout(timeout, model.complete_streaming(&request, &tx)).await
        });

        PendingReply {
            user_text: user_text.to_string(),
            partials: rx,
            task,
        }
    }
}

/// A model reply still being produced.
pub struct PendingReply {
    user_text: String,
    partials: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<Result<String, ModelError>>,
}

impl PendingReply {
    /// Partial replies received so far, oldest first.
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(partial) = self.partials.try_recv() {
            out.push(partial);
        }
        out
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the reply and record the exchange in `session` on success.
    pub async fn finish(self, session: &mut ChatSession) -> Result<String, ModelError> {
        let reply = self
            .task
            .await
            .map_err(|e| ModelError::Interrupted(e.to_string()))??;
        session.commit(&self.user_text, &reply);
        Ok(reply)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

/// One chat session plus the history shown to the user.
#[derive(Clone)]
pub struct ChatInstance {
    pub session: ChatSession,
    pub history: Vec<ChatMessage>,
}

impl ChatInstance {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            history: Vec::new(),
        }
    }

    pub fn append(&mut self, role: ChatRole, content: impl Into<String>) {
        merge_turn(&mut self.history, ChatMessage::new(role, content));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::testing::StubModel;

    fn session(stub: &Arc<StubModel>) -> ChatSession {
        ChatSession::new(
            stub.clone(),
            "stub-model",
            "print('hi')",
            SupportedLanguage::Python,
            None,
        )
    }

    #[test]
    fn streamed_reply_updates_last_model_message() {
        let mut history = Vec::new();
        merge_turn(&mut history, ChatMessage::user("hi"));
        assert_eq!(history, vec![ChatMessage::user("hi")]);

        merge_turn(&mut history, ChatMessage::model("He"));
        assert_eq!(history, vec![ChatMessage::user("hi"), ChatMessage::model("He")]);

        merge_turn(&mut history, ChatMessage::model("Hello"));
        assert_eq!(
            history,
            vec![ChatMessage::user("hi"), ChatMessage::model("Hello")]
        );
    }

    #[test]
    fn user_turns_always_append() {
        let mut history = vec![ChatMessage::user("a")];
        merge_turn(&mut history, ChatMessage::user("b"));
        assert_eq!(history.len(), 2);

        let mut history = vec![ChatMessage::model("reply")];
        merge_turn(&mut history, ChatMessage::user("next"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, ChatRole::User);
    }

    #[test]
    fn model_turn_on_empty_history_appends() {
        let mut history = Vec::new();
        merge_turn(&mut history, ChatMessage::model("first"));
        assert_eq!(history, vec![ChatMessage::model("first")]);
    }

    #[test]
    fn request_carries_seed_and_prior_turns() {
        let stub = Arc::new(StubModel::replying(&[]));
        let mut session = session(&stub);
        session.commit("what does it do?", "It prints hi.");

        let request = session.request_for("why?");
        let system = request.system.unwrap();
        assert!(system.contains("print('hi')"));
        assert!(system.contains("python"));
        assert!(!request.json);
        assert_eq!(
            request.messages,
            vec![
                ChatMessage::user("what does it do?"),
                ChatMessage::model("It prints hi."),
                ChatMessage::user("why?"),
            ]
        );
    }

    #[tokio::test]
    async fn send_records_exchange_in_order() {
        let stub = Arc::new(StubModel::replying(&["first", "second"]));
        let mut session = session(&stub);

        assert_eq!(session.send("one").await.unwrap(), "first");
        assert_eq!(session.send("two").await.unwrap(), "second");
        assert_eq!(session.turns().len(), 4);
        assert_eq!(session.turns()[3], ChatMessage::model("second"));
        assert_eq!(stub.requests().len(), 2);
    }

    #[tokio::test]
    async fn failed_send_leaves_session_unchanged() {
        let stub = Arc::new(StubModel::failing("boom"));
        let mut session = session(&stub);
        assert!(session.send("hello").await.is_err());
        assert!(session.turns().is_empty());
    }

    #[tokio::test]
    async fn spawned_reply_streams_partials_then_commits() {
        let stub = Arc::new(StubModel::streaming(&["Hel", "Hello", "Hello!"]));
        let mut session = session(&stub);

        let mut pending = session.spawn_reply("greet me");
        while !pending.is_finished() {
            tokio::task::yield_now().await;
        }
        assert_eq!(pending.drain(), vec!["Hel", "Hello", "Hello!"]);

        let reply = pending.finish(&mut session).await.unwrap();
        assert_eq!(reply, "Hello!");
        assert_eq!(
            session.turns(),
            &[ChatMessage::user("greet me"), ChatMessage::model("Hello!")]
        );
    }
}
