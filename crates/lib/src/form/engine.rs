//! Guided form state machine.
//!
//! A `Form` is the static schema; a `FormSession` is one conversation's progress through it.
//! Each user reply is fed to `Form::step`, which validates it, updates the record, recomputes
//! which fields are still to be asked, and returns the next prompt or a terminal outcome.
//! Sessions are plain serde data so they can be persisted between turns and resumed.

use crate::form::field::{FieldValue, FormField, Record};
use crate::form::template::Template;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type CompletionFn = Arc<dyn Fn(&Record) -> String + Send + Sync>;
pub type CancelFn = Arc<dyn Fn(&FormCancelled) -> String + Send + Sync>;

/// Name reported as the pending field when the form is cancelled at the confirmation prompt.
pub const CONFIRMATION_STEP: &str = "confirmation";

const CANCEL_WORDS: &[&str] = &["cancel", "quit", "stop"];
const YES_WORDS: &[&str] = &["yes", "y", "yep", "sure", "ok"];
const NO_WORDS: &[&str] = &["no", "n", "nope"];

/// Where a session is in the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FormState {
    /// Waiting for a reply to `field`; `attempts` counts consecutive invalid replies.
    Collecting { field: String, attempts: u32 },
    Confirming { attempts: u32 },
    Confirmed,
    Cancelled {
        #[serde(rename = "lastField")]
        last_field: String,
    },
}

/// Coarse status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    InProgress,
    Confirmed,
    Cancelled,
}

/// One conversation's progress through a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSession {
    pub form: String,
    pub record: Record,
    /// Uncollected fields whose active predicate holds, in form order.
    pub remaining: Vec<String>,
    pub state: FormState,
}

impl FormSession {
    pub fn status(&self) -> SessionStatus {
        match self.state {
            FormState::Collecting { .. } | FormState::Confirming { .. } => SessionStatus::InProgress,
            FormState::Confirmed => SessionStatus::Confirmed,
            FormState::Cancelled { .. } => SessionStatus::Cancelled,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status() != SessionStatus::InProgress
    }

    /// The field currently being asked, if collecting.
    pub fn pending_field(&self) -> Option<&str> {
        match &self.state {
            FormState::Collecting { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A question for the user. `choices` become quick-reply buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub choices: Vec<String>,
}

/// Passed to the cancellation callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormCancelled {
    pub last_field: String,
    /// Set when the engine gave up rather than the user asking to stop.
    pub cause: Option<String>,
}

/// Result of starting a form or feeding it one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormStep {
    Prompt(Prompt),
    Completed { record: Record, message: String },
    Cancelled { cancelled: FormCancelled, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("session belongs to form {found}, not {expected}")]
    WrongForm { expected: String, found: String },
    #[error("form session already finished")]
    Finished,
    #[error("session references unknown field {0}")]
    UnknownField(String),
    #[error("session is inconsistent with the form: {0}")]
    Inconsistent(String),
}

/// A built form schema. Construct with `FormBuilder`.
pub struct Form {
    pub(crate) name: String,
    pub(crate) fields: Vec<FormField>,
    pub(crate) confirmation: Template,
    pub(crate) confirm_dependencies: Vec<String>,
    pub(crate) max_attempts: u32,
    pub(crate) on_completion: CompletionFn,
    pub(crate) on_cancel: CancelFn,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("confirm_dependencies", &self.confirm_dependencies)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl Form {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn confirm_dependencies(&self) -> &[String] {
        &self.confirm_dependencies
    }

    /// Open a new session and ask the first active field.
    pub fn start(&self) -> (FormSession, FormStep) {
        let mut session = FormSession {
            form: self.name.clone(),
            record: Record::new(),
            remaining: Vec::new(),
            state: FormState::Confirming { attempts: 0 },
        };
        self.refresh(&mut session);
        let step = self.advance(&mut session, None);
        (session, step)
    }

    /// Feed one user reply to the session.
    pub fn step(&self, session: &mut FormSession, input: &str) -> Result<FormStep, FormError> {
        self.check_form(session)?;
        if session.is_finished() {
            return Err(FormError::Finished);
        }
        if is_cancel(input) {
            let last = session.pending_field().unwrap_or(CONFIRMATION_STEP).to_string();
            return Ok(self.cancel(session, last, None));
        }
        match session.state.clone() {
            FormState::Confirmed | FormState::Cancelled { .. } => Err(FormError::Finished),
            FormState::Collecting { field, attempts } => {
                let def = self
                    .field(&field)
                    .ok_or_else(|| FormError::UnknownField(field.clone()))?;
                match def.kind.parse(input) {
                    Ok(value) => {
                        log::debug!("form {}: collected {}", self.name, field);
                        session.record.insert(field, value);
                        self.refresh(session);
                        Ok(self.advance(session, None))
                    }
                    Err(e) => {
                        let attempts = attempts + 1;
                        if attempts >= self.max_attempts {
                            let cause = format!("too many invalid replies for {}", field);
                            return Ok(self.cancel(session, field, Some(cause)));
                        }
                        let prompt = Prompt {
                            text: format!("{} {}", e, def.prompt),
                            choices: def.kind.choices().to_vec(),
                        };
                        session.state = FormState::Collecting { field, attempts };
                        Ok(FormStep::Prompt(prompt))
                    }
                }
            }
            FormState::Confirming { attempts } => match parse_yes_no(input) {
                Some(true) => {
                    session.state = FormState::Confirmed;
                    log::debug!("form {}: confirmed", self.name);
                    let message = (self.on_completion)(&session.record);
                    Ok(FormStep::Completed {
                        record: session.record.clone(),
                        message,
                    })
                }
                Some(false) => {
                    // Re-collect everything the declined confirmation was built from.
                    for dep in &self.confirm_dependencies {
                        session.record.remove(dep);
                    }
                    self.refresh(session);
                    if session.remaining.is_empty() {
                        // Every dependency was inactive: re-ask the first active field instead.
                        if let Some(first) = self.fields.iter().find(|f| f.is_active(&session.record)) {
                            session.record.remove(&first.name);
                        }
                        self.refresh(session);
                    }
                    Ok(self.advance(session, Some("OK, let's fix that.")))
                }
                None => {
                    let attempts = attempts + 1;
                    if attempts >= self.max_attempts {
                        let cause = "too many invalid replies for the confirmation".to_string();
                        return Ok(self.cancel(session, CONFIRMATION_STEP.to_string(), Some(cause)));
                    }
                    session.state = FormState::Confirming { attempts };
                    let mut prompt = self.confirmation_prompt(session);
                    prompt.text = format!("Please answer yes or no. {}", prompt.text);
                    Ok(FormStep::Prompt(prompt))
                }
            },
        }
    }

    /// Check that a restored session fits this schema and that `remaining` is what the record implies.
    pub fn resume(&self, session: &FormSession) -> Result<(), FormError> {
        self.check_form(session)?;
        if let Some(unknown) = session.record.keys().find(|k| self.field(k).is_none()) {
            return Err(FormError::UnknownField(unknown.clone()));
        }
        if matches!(session.state, FormState::Confirming { .. }) && !session.remaining.is_empty() {
            return Err(FormError::Inconsistent(
                "confirming with fields still to collect".to_string(),
            ));
        }
        if let Some(pending) = session.pending_field() {
            if self.field(pending).is_none() {
                return Err(FormError::UnknownField(pending.to_string()));
            }
            if session.remaining.first().map(String::as_str) != Some(pending) {
                return Err(FormError::Inconsistent(format!(
                    "pending field {} is not next in line",
                    pending
                )));
            }
        }
        let mut expected = session.clone();
        self.refresh(&mut expected);
        if expected.remaining != session.remaining || expected.record != session.record {
            return Err(FormError::Inconsistent(
                "remaining fields do not match the record".to_string(),
            ));
        }
        Ok(())
    }

    fn check_form(&self, session: &FormSession) -> Result<(), FormError> {
        if session.form != self.name {
            return Err(FormError::WrongForm {
                expected: self.name.clone(),
                found: session.form.clone(),
            });
        }
        Ok(())
    }

    /// Drop values of fields that are no longer active, then recompute `remaining`.
    /// Pruning can deactivate further fields, so it repeats until nothing changes.
    fn refresh(&self, session: &mut FormSession) {
        loop {
            let stale: Vec<String> = self
                .fields
                .iter()
                .filter(|f| session.record.contains_key(&f.name) && !f.is_active(&session.record))
                .map(|f| f.name.clone())
                .collect();
            if stale.is_empty() {
                break;
            }
            for name in stale {
                session.record.remove(&name);
            }
        }
        session.remaining = self
            .fields
            .iter()
            .filter(|f| !session.record.contains_key(&f.name) && f.is_active(&session.record))
            .map(|f| f.name.clone())
            .collect();
    }

    /// Ask the next remaining field, or the confirmation when none is left.
    fn advance(&self, session: &mut FormSession, notice: Option<&str>) -> FormStep {
        let mut prompt = match session.remaining.first().and_then(|n| self.field(n)) {
            Some(next) => {
                session.state = FormState::Collecting {
                    field: next.name.clone(),
                    attempts: 0,
                };
                Prompt {
                    text: next.prompt.clone(),
                    choices: next.kind.choices().to_vec(),
                }
            }
            None => {
                session.state = FormState::Confirming { attempts: 0 };
                self.confirmation_prompt(session)
            }
        };
        if let Some(notice) = notice {
            prompt.text = format!("{} {}", notice, prompt.text);
        }
        FormStep::Prompt(prompt)
    }

    fn confirmation_prompt(&self, session: &FormSession) -> Prompt {
        Prompt {
            text: self.confirmation.render(&session.record),
            choices: vec!["Yes".to_string(), "No".to_string()],
        }
    }

    fn cancel(&self, session: &mut FormSession, last_field: String, cause: Option<String>) -> FormStep {
        log::debug!(
            "form {}: cancelled at {}{}",
            self.name,
            last_field,
            cause.as_deref().map(|c| format!(" ({})", c)).unwrap_or_default()
        );
        session.state = FormState::Cancelled {
            last_field: last_field.clone(),
        };
        let cancelled = FormCancelled { last_field, cause };
        let message = (self.on_cancel)(&cancelled);
        FormStep::Cancelled { cancelled, message }
    }
}

fn normalize(input: &str) -> String {
    input
        .trim()
        .trim_end_matches(|c| c == '.' || c == '!')
        .to_lowercase()
}

fn is_cancel(input: &str) -> bool {
    CANCEL_WORDS.contains(&normalize(input).as_str())
}

fn parse_yes_no(input: &str) -> Option<bool> {
    let word = normalize(input);
    if YES_WORDS.contains(&word.as_str()) {
        Some(true)
    } else if NO_WORDS.contains(&word.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Convenience for callbacks: the string value of a field, or "" when absent.
pub fn value_str<'a>(record: &'a Record, field: &str) -> &'a str {
    record.get(field).and_then(FieldValue::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::builder::FormBuilder;
    use crate::form::field::FormField;

    fn size_kind_form() -> Form {
        FormBuilder::new("order")
            .field(FormField::choice("Size", &["Medium", "Large"]))
            .field(FormField::choice("Kind", &["Signature", "Stuffed"]))
            .field(FormField::choice("Signature", &["Hawaiian", "Pepperoni"]).active_when_equals("Kind", "Signature"))
            .confirm("A {Size} {Kind}?", &["Size", "Kind"])
            .on_completion(|r| format!("ordered {}", value_str(r, "Size")))
            .on_cancel(|c| format!("quit at {}", c.last_field))
            .build()
            .unwrap()
    }

    fn prompt_text(step: &FormStep) -> &str {
        match step {
            FormStep::Prompt(p) => &p.text,
            other => panic!("expected prompt, got {:?}", other),
        }
    }

    #[test]
    fn start_asks_first_field_with_choices() {
        let form = size_kind_form();
        let (session, step) = form.start();
        assert_eq!(session.pending_field(), Some("Size"));
        assert_eq!(session.remaining, vec!["Size", "Kind"]);
        let FormStep::Prompt(prompt) = step else {
            panic!("expected prompt");
        };
        assert_eq!(prompt.choices, vec!["Medium", "Large"]);
    }

    #[test]
    fn conditional_field_appears_and_disappears() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        form.step(&mut session, "signature").unwrap();
        assert_eq!(session.remaining, vec!["Signature"]);
        assert_eq!(session.pending_field(), Some("Signature"));
        form.step(&mut session, "hawaiian").unwrap();
        assert!(session.remaining.is_empty());
        assert!(matches!(session.state, FormState::Confirming { .. }));

        // Declining clears Size and Kind; the Signature answer goes with its now-inactive field.
        let step = form.step(&mut session, "no").unwrap();
        assert!(prompt_text(&step).starts_with("OK, let's fix that."));
        assert_eq!(session.pending_field(), Some("Size"));
        assert_eq!(session.remaining, vec!["Size", "Kind"]);
        assert!(!session.record.contains_key("Signature"));

        form.step(&mut session, "medium").unwrap();
        form.step(&mut session, "stuffed").unwrap();
        assert!(session.remaining.is_empty());
        assert!(matches!(session.state, FormState::Confirming { attempts: 0 }));
    }

    #[test]
    fn confirm_completes_with_record() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "Medium").unwrap();
        let step = form.step(&mut session, "Stuffed").unwrap();
        assert_eq!(prompt_text(&step), "A Medium Stuffed?");
        let step = form.step(&mut session, "Yes").unwrap();
        match step {
            FormStep::Completed { record, message } => {
                assert_eq!(message, "ordered Medium");
                assert_eq!(record.get("Kind"), Some(&FieldValue::Choice("Stuffed".into())));
            }
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(session.status(), SessionStatus::Confirmed);
        assert_eq!(form.step(&mut session, "yes"), Err(FormError::Finished));
    }

    #[test]
    fn invalid_reply_reprompts_then_gives_up() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        let step = form.step(&mut session, "huge").unwrap();
        assert!(prompt_text(&step).contains("\"huge\" is not one of the options."));
        assert_eq!(session.state, FormState::Collecting { field: "Size".into(), attempts: 1 });
        form.step(&mut session, "huger").unwrap();
        let step = form.step(&mut session, "hugest").unwrap();
        match step {
            FormStep::Cancelled { cancelled, message } => {
                assert_eq!(cancelled.last_field, "Size");
                assert!(cancelled.cause.is_some());
                assert_eq!(message, "quit at Size");
            }
            other => panic!("expected cancellation, got {:?}", other),
        }
        assert_eq!(session.status(), SessionStatus::Cancelled);
    }

    #[test]
    fn cancel_reports_pending_field() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        let step = form.step(&mut session, "Cancel").unwrap();
        let FormStep::Cancelled { cancelled, .. } = step else {
            panic!("expected cancellation");
        };
        assert_eq!(cancelled.last_field, "Kind");
        assert_eq!(cancelled.cause, None);
    }

    #[test]
    fn cancel_at_confirmation() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        form.step(&mut session, "stuffed").unwrap();
        let step = form.step(&mut session, "quit").unwrap();
        let FormStep::Cancelled { cancelled, .. } = step else {
            panic!("expected cancellation");
        };
        assert_eq!(cancelled.last_field, CONFIRMATION_STEP);
    }

    #[test]
    fn session_round_trips_through_json_and_resumes() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        form.step(&mut session, "signature").unwrap();
        let json = serde_json::to_string(&session).unwrap();
        let mut restored: FormSession = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
        form.resume(&restored).unwrap();
        assert_eq!(restored.remaining, vec!["Signature"]);
        form.step(&mut restored, "pepperoni").unwrap();
        assert!(matches!(restored.state, FormState::Confirming { .. }));
    }

    #[test]
    fn resume_rejects_tampered_session() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        session.remaining = vec!["Kind".into()];
        assert!(matches!(form.resume(&session), Err(FormError::Inconsistent(_))));
        session.form = "other".into();
        assert!(matches!(form.resume(&session), Err(FormError::WrongForm { .. })));
    }

    #[test]
    fn decline_with_only_inactive_dependencies_reasks_first_field() {
        let form = FormBuilder::new("order")
            .field(FormField::choice("Size", &["Medium", "Large"]))
            .field(FormField::choice("Kind", &["Signature", "Stuffed"]))
            .field(FormField::choice("Signature", &["Hawaiian", "Pepperoni"]).active_when_equals("Kind", "Signature"))
            .confirm("Place the order?", &["Signature"])
            .build()
            .unwrap();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        form.step(&mut session, "stuffed").unwrap();
        assert!(matches!(session.state, FormState::Confirming { .. }));

        let step = form.step(&mut session, "no").unwrap();
        assert_eq!(session.state, FormState::Collecting { field: "Size".into(), attempts: 0 });
        assert!(prompt_text(&step).starts_with("OK, let's fix that."));
        assert!(!session.record.contains_key("Size"));
        assert_eq!(session.record.get("Kind"), Some(&FieldValue::Choice("Stuffed".into())));
    }

    #[test]
    fn resume_rejects_state_that_disagrees_with_remaining() {
        let form = size_kind_form();
        let (mut session, _) = form.start();
        form.step(&mut session, "large").unwrap();
        session.state = FormState::Confirming { attempts: 0 };
        assert!(matches!(form.resume(&session), Err(FormError::Inconsistent(_))));

        let (mut done, _) = form.start();
        form.step(&mut done, "large").unwrap();
        form.step(&mut done, "stuffed").unwrap();
        done.state = FormState::Collecting { field: "Kind".into(), attempts: 0 };
        assert!(form.resume(&done).is_err());
    }
}
