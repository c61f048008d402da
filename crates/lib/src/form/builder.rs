//! Form schema builder. Every configuration problem is reported by `build`, never mid-conversation.

use crate::form::engine::{CancelFn, CompletionFn, Form, FormCancelled};
use crate::form::field::{FieldKind, FormField, Record};
use crate::form::template::{Template, TemplateError};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormBuildError {
    #[error("form {0} has no fields")]
    EmptyForm(String),
    #[error("field {0} is declared more than once")]
    DuplicateField(String),
    #[error("choice field {0} has no options")]
    NoChoices(String),
    #[error("field {field} depends on unknown field {dependency}")]
    UnknownDependency { field: String, dependency: String },
    #[error("cyclic activation dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
    #[error("confirmation template is invalid: {0}")]
    Template(#[from] TemplateError),
    #[error("confirmation template references {0}, which is not a declared dependency")]
    UndeclaredTemplateField(String),
    #[error("confirmation must name at least one field to re-ask when declined")]
    EmptyConfirmDependencies,
    #[error("confirmation depends on unknown field {0}")]
    UnknownConfirmDependency(String),
    #[error("max attempts must be at least 1")]
    InvalidMaxAttempts,
}

pub struct FormBuilder {
    name: String,
    fields: Vec<FormField>,
    confirmation: Option<(String, Vec<String>)>,
    max_attempts: u32,
    on_completion: Option<CompletionFn>,
    on_cancel: Option<CancelFn>,
}

impl FormBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            confirmation: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            on_completion: None,
            on_cancel: None,
        }
    }

    /// Append a field; fields are asked in the order they are added.
    pub fn field(mut self, field: FormField) -> Self {
        self.fields.push(field);
        self
    }

    /// Confirmation prompt shown once every active field is collected. `dependencies` must cover every placeholder.
    pub fn confirm(mut self, template: impl Into<String>, dependencies: &[&str]) -> Self {
        self.confirmation = Some((
            template.into(),
            dependencies.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Consecutive invalid replies tolerated on one prompt before the form is cancelled.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn on_completion<F>(mut self, f: F) -> Self
    where
        F: Fn(&Record) -> String + Send + Sync + 'static,
    {
        self.on_completion = Some(Arc::new(f));
        self
    }

    pub fn on_cancel<F>(mut self, f: F) -> Self
    where
        F: Fn(&FormCancelled) -> String + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Result<Form, FormBuildError> {
        if self.fields.is_empty() {
            return Err(FormBuildError::EmptyForm(self.name));
        }
        if self.max_attempts == 0 {
            return Err(FormBuildError::InvalidMaxAttempts);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(FormBuildError::DuplicateField(field.name.clone()));
            }
            if let FieldKind::Choice(options) | FieldKind::MultiChoice(options) = &field.kind {
                if options.is_empty() {
                    return Err(FormBuildError::NoChoices(field.name.clone()));
                }
            }
        }
        for field in &self.fields {
            for dep in &field.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(FormBuildError::UnknownDependency {
                        field: field.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        check_acyclic(&self.fields)?;

        let (source, confirm_dependencies) = match self.confirmation {
            Some(c) => c,
            None => default_confirmation(&self.fields),
        };
        if confirm_dependencies.is_empty() {
            return Err(FormBuildError::EmptyConfirmDependencies);
        }
        for dep in &confirm_dependencies {
            if !seen.contains(dep.as_str()) {
                return Err(FormBuildError::UnknownConfirmDependency(dep.clone()));
            }
        }
        let confirmation = Template::parse(&source)?;
        if let Some(undeclared) = confirmation
            .fields()
            .find(|f| !confirm_dependencies.iter().any(|d| d.as_str() == *f))
        {
            return Err(FormBuildError::UndeclaredTemplateField(undeclared.to_string()));
        }

        let on_completion: CompletionFn = match self.on_completion {
            Some(f) => f,
            None => Arc::new(|_: &Record| "Thanks, that's everything.".to_string()),
        };
        let on_cancel: CancelFn = match self.on_cancel {
            Some(f) => f,
            None => Arc::new(|c: &FormCancelled| format!("Stopped at {}.", c.last_field)),
        };

        Ok(Form {
            name: self.name,
            fields: self.fields,
            confirmation,
            confirm_dependencies,
            max_attempts: self.max_attempts,
            on_completion,
            on_cancel,
        })
    }
}

/// "Is this your selection?" listing every field.
fn default_confirmation(fields: &[FormField]) -> (String, Vec<String>) {
    let lines: Vec<String> = fields
        .iter()
        .map(|f| format!("{}: {{{}}}", f.name, f.name))
        .collect();
    (
        format!("Is this your selection? {}", lines.join(", ")),
        fields.iter().map(|f| f.name.clone()).collect(),
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search over field -> dependency edges; reports the first cycle found.
fn check_acyclic(fields: &[FormField]) -> Result<(), FormBuildError> {
    let deps: HashMap<&str, &[String]> = fields
        .iter()
        .map(|f| (f.name.as_str(), f.dependencies.as_slice()))
        .collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();

    fn visit<'a>(
        name: &'a str,
        deps: &HashMap<&'a str, &'a [String]>,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Result<(), FormBuildError> {
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(name.to_string());
                return Err(FormBuildError::CyclicDependency(cycle));
            }
            None => {}
        }
        marks.insert(name, Mark::Visiting);
        path.push(name);
        for dep in deps.get(name).copied().unwrap_or(&[]) {
            visit(dep.as_str(), deps, marks, path)?;
        }
        path.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for field in fields {
        visit(field.name.as_str(), &deps, &mut marks, &mut path)?;
    }
    Ok(())
}
