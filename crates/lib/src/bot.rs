//! One bot turn: validate the activity, lock its conversation, route it, send the replies,
//! persist the conversation's form session.

use crate::activity::{Activity, ActivityError, ActivityKind, Reply};
use crate::card::{CardAction, HeroCard};
use crate::channels::{ChannelError, ReplySender};
use crate::form::{Form, FormCancelled, FormError, FormStep, Prompt, Record};
use crate::routing::{self, Route};
use crate::session::{ConversationKey, SessionError, SessionGuard, SessionStore};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("invalid activity: {0}")]
    Activity(#[from] ActivityError),
    #[error("reply delivery failed: {0}")]
    Channel(#[from] ChannelError),
    #[error("session store: {0}")]
    Session(#[from] SessionError),
    #[error("form: {0}")]
    Form(#[from] FormError),
}

/// What a successful turn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    FreeForm,
    /// The form asked (or re-asked) a question.
    FormPrompt,
    FormCompleted(Record),
    FormCancelled(FormCancelled),
    SystemEvent { kind: ActivityKind, replies: usize },
}

/// The bot: the order form, per-conversation sessions, and where replies go.
pub struct Bot {
    form: Arc<Form>,
    sessions: Arc<SessionStore>,
    sender: Arc<dyn ReplySender>,
}

impl Bot {
    pub fn new(form: Form, sessions: SessionStore, sender: Arc<dyn ReplySender>) -> Self {
        Self {
            form: Arc::new(form),
            sessions: Arc::new(sessions),
            sender,
        }
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one inbound activity. Turns of the same conversation are serialized; a failure to
    /// deliver a reply fails the turn and is not retried.
    pub async fn handle_activity(&self, activity: &Activity) -> Result<TurnOutcome, BotError> {
        activity.validate()?;
        let key = ConversationKey::new(&activity.channel_id, &activity.conversation.id);
        let mut guard = self.sessions.lock(&key).await?;

        if let Some(session) = guard.session() {
            let stale = session.is_finished() || self.form.resume(session).is_err();
            if stale {
                log::warn!(
                    "discarding unusable form session for {}/{}",
                    key.channel_id,
                    key.conversation_id
                );
                guard.clear();
            }
        }

        let route = routing::classify(activity, guard.is_active());
        log::debug!(
            "{} activity in {}/{} routed to {:?}",
            activity.kind.as_str(),
            key.channel_id,
            key.conversation_id,
            route
        );
        let result = match route {
            Route::GuidedForm => self.guided_turn(activity, &mut guard).await,
            Route::FreeForm => self
                .send(routing::free_form_reply(activity))
                .await
                .map(|_| TurnOutcome::FreeForm),
            Route::SystemEvent(kind) => self.system_turn(activity, kind, &mut guard).await,
        };
        self.sessions.persist(&guard).await?;
        self.sessions.release(guard).await;
        result
    }

    async fn guided_turn(
        &self,
        activity: &Activity,
        guard: &mut SessionGuard,
    ) -> Result<TurnOutcome, BotError> {
        let step = match guard.session_mut() {
            Some(session) => self.form.step(session, activity.text())?,
            None => {
                log::info!(
                    "starting {} form in {}",
                    self.form.name(),
                    activity.conversation.id
                );
                let (session, step) = self.form.start();
                guard.set(session);
                step
            }
        };
        let (reply, outcome) = match step {
            FormStep::Prompt(prompt) => (prompt_reply(activity, &prompt), TurnOutcome::FormPrompt),
            FormStep::Completed { record, message } => {
                guard.clear();
                (activity.create_reply(message), TurnOutcome::FormCompleted(record))
            }
            FormStep::Cancelled { cancelled, message } => {
                guard.clear();
                (activity.create_reply(message), TurnOutcome::FormCancelled(cancelled))
            }
        };
        self.send(reply).await?;
        Ok(outcome)
    }

    async fn system_turn(
        &self,
        activity: &Activity,
        kind: ActivityKind,
        guard: &mut SessionGuard,
    ) -> Result<TurnOutcome, BotError> {
        if kind == ActivityKind::DeleteUserData && guard.clear().is_some() {
            log::info!("deleted form session for {}", activity.conversation.id);
        }
        let replies = routing::system_event_replies(activity);
        let n = replies.len();
        for reply in replies {
            self.send(reply).await?;
        }
        Ok(TurnOutcome::SystemEvent { kind, replies: n })
    }

    async fn send(&self, reply: Reply) -> Result<(), BotError> {
        if let Err(e) = self.sender.send_reply(&reply).await {
            log::warn!(
                "turn failed: sending reply via {} to {}: {}",
                self.sender.id(),
                reply.conversation.id,
                e
            );
            return Err(e.into());
        }
        Ok(())
    }
}

/// A form prompt as a reply; choices become quick-reply buttons.
fn prompt_reply(activity: &Activity, prompt: &Prompt) -> Reply {
    let reply = activity.create_reply(prompt.text.clone());
    if prompt.choices.is_empty() {
        return reply;
    }
    let buttons = prompt.choices.iter().map(CardAction::im_back).collect();
    reply.with_attachment(HeroCard::with_buttons(buttons).to_attachment())
}
