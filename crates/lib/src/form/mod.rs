//! Guided forms: multi-turn collection of typed fields with conditional activation
//! and a confirmation step.
//!
//! Build a schema with `FormBuilder`; drive one conversation with `Form::start` and `Form::step`.

mod builder;
mod engine;
mod field;
mod template;

pub use builder::{FormBuildError, FormBuilder};
pub use engine::{
    value_str, CancelFn, CompletionFn, Form, FormCancelled, FormError, FormSession, FormState,
    FormStep, Prompt, SessionStatus, CONFIRMATION_STEP,
};
pub use field::{field_label, ActivePredicate, FieldKind, FieldValue, FormField, InputError, Record};
pub use template::{Template, TemplateError};
