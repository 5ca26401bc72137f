//! Per-conversation state machine. Owns the message list and the in-flight
//! flag, classifies each user turn, and drives either the completion stream
//! or the image side channel, republishing the conversation snapshot after
//! every mutation.
use futures::StreamExt;
use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::classifier::{classify, EditKind, TurnIntent};
use crate::image::ImageBackend;
use crate::models::conversation::Conversation;
use crate::models::message::{AssetRef, ImageOp, Message};
use crate::store::ConversationStore;
use crate::stream::consumer::{reply_stream, CompletionBackend};

/// Observer seam to the rendering layer: receives the full conversation
/// snapshot after every mutation, so observers always see monotonically
/// growing text and never a partial reset.
pub trait ConversationPublisher: Send + Sync {
    fn publish(&self, conversation: &Conversation);
}

/// Publisher that ignores everything; useful headless.
pub struct NullPublisher;

impl ConversationPublisher for NullPublisher {
    fn publish(&self, _conversation: &Conversation) {}
}

/// Where the conversation is in its turn cycle. Settlement is transient:
/// the outcome is recorded and the phase returns to `Idle` before
/// `send_message` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The turn ran to completion (possibly resolving to an error
    /// explanation inside the assistant message).
    Completed,
    /// The turn failed; the user-facing explanation was recorded.
    Errored(String),
    /// A generation was already in flight; nothing changed.
    Busy,
    /// The in-flight stream was released by [`ChatOrchestrator::cancel`].
    Cancelled,
}

const WORKING_ON_IMAGE: &str = "Working on your image...";
const WORKING_ON_EDIT: &str = "Working on that edit...";
const UNSUPPORTED_EDIT: &str =
    "I can't do that kind of image edit yet. Removing the background is the only edit I know.";
const GENERATED_CAPTION: &str = "Here you go:";
const EDITED_CAPTION: &str = "Done, background removed:";

enum ImageRequest {
    Generate(String),
    Edit(EditKind, Option<AssetRef>),
}

pub struct ChatOrchestrator {
    conversation: AsyncMutex<Conversation>,
    phase: Mutex<TurnPhase>,
    last_error: Mutex<Option<String>>,
    cancel: Notify,
    backend: Box<dyn CompletionBackend>,
    images: Box<dyn ImageBackend>,
    store: Box<dyn ConversationStore>,
    publisher: Box<dyn ConversationPublisher>,
}

impl ChatOrchestrator {
    pub fn new(
        conversation: Conversation,
        backend: Box<dyn CompletionBackend>,
        images: Box<dyn ImageBackend>,
        store: Box<dyn ConversationStore>,
        publisher: Box<dyn ConversationPublisher>,
    ) -> Self {
        if let Err(e) = store.set_current_id(&conversation.id) {
            tracing::warn!("failed to record current conversation: {e}");
        }
        Self {
            conversation: AsyncMutex::new(conversation),
            phase: Mutex::new(TurnPhase::Idle),
            last_error: Mutex::new(None),
            cancel: Notify::new(),
            backend,
            images,
            store,
            publisher,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock().unwrap()
    }

    /// The user-facing explanation of the most recent failed turn, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// A copy of the conversation as it stands.
    pub async fn snapshot(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    /// Release an in-flight stream at its next suspension point. No-op when
    /// nothing is streaming.
    pub fn cancel(&self) {
        self.cancel.notify_waiters();
    }

    /// Handle one user turn. At most one generation is in flight per
    /// conversation: while a previous turn is sending or streaming this is
    /// a no-op returning [`SendOutcome::Busy`].
    pub async fn send_message(&self, text: &str, asset: Option<AssetRef>) -> SendOutcome {
        if !self.begin() {
            return SendOutcome::Busy;
        }

        let intent = classify(text, asset.is_some());
        {
            let mut conversation = self.conversation.lock().await;
            let mut message = Message::user().with_text(text);
            if let Some(asset) = asset.clone() {
                message = message.with_asset(asset);
            }
            conversation.add_message(message);
            self.persist_and_publish(&conversation);
        }

        let outcome = match intent {
            TurnIntent::Complete => self.run_completion().await,
            TurnIntent::Canned { answer } => self.run_canned(&answer).await,
            TurnIntent::GenerateImage { prompt } => {
                self.run_image(ImageRequest::Generate(prompt)).await
            }
            TurnIntent::EditImage(kind) => {
                self.run_image(ImageRequest::Edit(kind, asset)).await
            }
        };

        self.settle(&outcome);
        outcome
    }

    async fn run_completion(&self) -> SendOutcome {
        let context = self.conversation.lock().await.context();

        let mut stream = match reply_stream(self.backend.as_ref(), &context).await {
            Ok(stream) => stream,
            Err(e) => return SendOutcome::Errored(e.user_message()),
        };

        self.set_phase(TurnPhase::Streaming);
        {
            let mut conversation = self.conversation.lock().await;
            conversation.add_message(Message::assistant());
            self.persist_and_publish(&conversation);
        }

        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                chunk = stream.next() => match chunk {
                    Some(Ok(chunk)) if !chunk.done => {
                        let mut conversation = self.conversation.lock().await;
                        conversation.append_to_open(&chunk.content);
                        self.persist_and_publish(&conversation);
                    }
                    Some(Ok(_)) | None => break,
                    Some(Err(e)) => {
                        // The open message keeps whatever already streamed.
                        return SendOutcome::Errored(e.user_message());
                    }
                },
                _ = &mut cancelled => {
                    tracing::debug!("streaming turn cancelled");
                    return SendOutcome::Cancelled;
                }
            }
        }

        let mut conversation = self.conversation.lock().await;
        if conversation.is_first_exchange() {
            let title = conversation
                .messages
                .first()
                .map(|m| Conversation::derive_title(&m.content));
            if let Some(title) = title {
                conversation.title = title;
            }
        }
        self.persist_and_publish(&conversation);
        SendOutcome::Completed
    }

    async fn run_canned(&self, answer: &str) -> SendOutcome {
        let mut conversation = self.conversation.lock().await;
        conversation.add_message(Message::assistant().with_text(answer));
        self.persist_and_publish(&conversation);
        SendOutcome::Completed
    }

    async fn run_image(&self, request: ImageRequest) -> SendOutcome {
        let placeholder = match request {
            ImageRequest::Generate(_) => WORKING_ON_IMAGE,
            ImageRequest::Edit(..) => WORKING_ON_EDIT,
        };
        {
            let mut conversation = self.conversation.lock().await;
            conversation.add_message(Message::assistant().with_text(placeholder));
            self.persist_and_publish(&conversation);
        }

        let result = match request {
            ImageRequest::Generate(prompt) => self
                .images
                .generate(&prompt)
                .await
                .map(|asset| (GENERATED_CAPTION, asset, ImageOp::Generated)),
            ImageRequest::Edit(EditKind::RemoveBackground, Some(source)) => self
                .images
                .remove_background(&source)
                .await
                .map(|asset| (EDITED_CAPTION, asset, ImageOp::Edited)),
            ImageRequest::Edit(..) => {
                // Recognized as an edit but not one we can run; resolve the
                // placeholder without touching the network.
                return self.resolve_working_message(UNSUPPORTED_EDIT, None, None).await;
            }
        };

        match result {
            Ok((caption, asset, op)) => {
                self.resolve_working_message(caption, Some(asset), Some(op))
                    .await
            }
            Err(e) => {
                let explanation = e.user_message();
                self.resolve_working_message(&explanation, None, None).await;
                SendOutcome::Errored(explanation)
            }
        }
    }

    /// Replace the interim "working" message with its final form. The
    /// placeholder is never left unresolved.
    async fn resolve_working_message(
        &self,
        content: &str,
        asset: Option<AssetRef>,
        op: Option<ImageOp>,
    ) -> SendOutcome {
        let mut conversation = self.conversation.lock().await;
        if let Some(message) = conversation.messages.last_mut() {
            message.content = content.to_string();
            message.asset = asset;
            message.image_op = op;
        }
        self.persist_and_publish(&conversation);
        SendOutcome::Completed
    }

    fn begin(&self) -> bool {
        let mut phase = self.phase.lock().unwrap();
        if *phase != TurnPhase::Idle {
            return false;
        }
        *phase = TurnPhase::Sending;
        true
    }

    fn set_phase(&self, next: TurnPhase) {
        *self.phase.lock().unwrap() = next;
    }

    fn settle(&self, outcome: &SendOutcome) {
        *self.last_error.lock().unwrap() = match outcome {
            SendOutcome::Errored(message) => Some(message.clone()),
            _ => None,
        };
        self.set_phase(TurnPhase::Idle);
    }

    fn persist_and_publish(&self, conversation: &Conversation) {
        if let Err(e) = self.store.save(conversation) {
            tracing::warn!("failed to persist conversation: {e}");
        }
        self.publisher.publish(conversation);
    }
}
