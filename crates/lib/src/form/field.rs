//! Form fields: what is asked, how a reply is parsed, and when the field is active.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// In-progress answers, keyed by field name.
pub type Record = BTreeMap<String, FieldValue>;

/// Decides from the answers so far whether a field is asked at all.
pub type ActivePredicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// One collected answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum FieldValue {
    Text(String),
    Number(i64),
    Choice(String),
    Choices(Vec<String>),
}

impl FieldValue {
    /// The value as a single string (text or choice); None for numbers and multi-choices.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => Some(s),
            FieldValue::Number(_) | FieldValue::Choices(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Choices(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Why a reply was not accepted for a field. Shown to the user before re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("I need an answer here.")]
    Empty,
    #[error("\"{0}\" is not a number.")]
    NotANumber(String),
    #[error("\"{0}\" is not one of the options.")]
    UnknownChoice(String),
}

/// Expected reply type for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Choice(Vec<String>),
    MultiChoice(Vec<String>),
}

impl FieldKind {
    pub fn choices(&self) -> &[String] {
        match self {
            FieldKind::Choice(options) | FieldKind::MultiChoice(options) => options,
            FieldKind::Text | FieldKind::Integer => &[],
        }
    }

    /// Parse a user reply into a value for this kind.
    pub fn parse(&self, input: &str) -> Result<FieldValue, InputError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(InputError::Empty);
        }
        match self {
            FieldKind::Text => Ok(FieldValue::Text(input.to_string())),
            FieldKind::Integer => input
                .parse::<i64>()
                .map(FieldValue::Number)
                .map_err(|_| InputError::NotANumber(input.to_string())),
            FieldKind::Choice(options) => match_choice(options, input)
                .map(|o| FieldValue::Choice(o.clone()))
                .ok_or_else(|| InputError::UnknownChoice(input.to_string())),
            FieldKind::MultiChoice(options) => {
                let mut picked: Vec<String> = Vec::new();
                for item in input
                    .split(',')
                    .flat_map(|part| part.split(" and "))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                {
                    let option = match_choice(options, item)
                        .ok_or_else(|| InputError::UnknownChoice(item.to_string()))?;
                    if !picked.contains(option) {
                        picked.push(option.clone());
                    }
                }
                if picked.is_empty() {
                    return Err(InputError::Empty);
                }
                Ok(FieldValue::Choices(picked))
            }
        }
    }
}

/// Match by 1-based index or by label, ignoring case and whitespace ("gourmetdelight" == "Gourmet Delight").
fn match_choice<'a>(options: &'a [String], input: &str) -> Option<&'a String> {
    if let Ok(n) = input.parse::<usize>() {
        if n >= 1 && n <= options.len() {
            return Some(&options[n - 1]);
        }
    }
    let wanted = squash(input);
    options.iter().find(|o| squash(o) == wanted)
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Human label for a field name: "GourmetDelight" -> "gourmet delight".
pub fn field_label(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            out.push(' ');
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// A named slot in a form.
#[derive(Clone)]
pub struct FormField {
    pub name: String,
    pub prompt: String,
    pub kind: FieldKind,
    /// Fields whose values the active predicate reads.
    pub dependencies: Vec<String>,
    active: Option<ActivePredicate>,
}

impl fmt::Debug for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("dependencies", &self.dependencies)
            .field("conditional", &self.active.is_some())
            .finish()
    }
}

impl FormField {
    fn new(name: &str, kind: FieldKind, prompt: String) -> Self {
        Self {
            name: name.to_string(),
            prompt,
            kind,
            dependencies: Vec::new(),
            active: None,
        }
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldKind::Text, format!("Please enter {}.", field_label(name)))
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, FieldKind::Integer, format!("Please enter {}.", field_label(name)))
    }

    pub fn choice(name: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::Choice(options.iter().map(|s| s.to_string()).collect()),
            format!("Please select a {}.", field_label(name)),
        )
    }

    pub fn multi_choice(name: &str, options: &[&str]) -> Self {
        Self::new(
            name,
            FieldKind::MultiChoice(options.iter().map(|s| s.to_string()).collect()),
            format!("Please select one or more {}.", field_label(name)),
        )
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Ask this field only when `predicate` holds. `dependencies` must list every field the predicate reads.
    pub fn active_when<F>(mut self, dependencies: &[&str], predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.dependencies = dependencies.iter().map(|s| s.to_string()).collect();
        self.active = Some(Arc::new(predicate));
        self
    }

    /// Ask this field only when `dependency` holds exactly `value` (text or choice).
    pub fn active_when_equals(self, dependency: &str, value: &str) -> Self {
        let key = dependency.to_string();
        let value = value.to_string();
        self.active_when(&[dependency], move |record| {
            record.get(&key).and_then(FieldValue::as_str) == Some(value.as_str())
        })
    }

    pub fn is_active(&self, record: &Record) -> bool {
        self.active.as_ref().map_or(true, |p| p(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn choice_matches_label_index_and_squashed_form() {
        let kind = FieldKind::Choice(options(&["Medium", "Gourmet Delight"]));
        assert_eq!(kind.parse("medium"), Ok(FieldValue::Choice("Medium".into())));
        assert_eq!(kind.parse(" 2 "), Ok(FieldValue::Choice("Gourmet Delight".into())));
        assert_eq!(kind.parse("gourmetdelight"), Ok(FieldValue::Choice("Gourmet Delight".into())));
        assert_eq!(kind.parse("3"), Err(InputError::UnknownChoice("3".into())));
    }

    #[test]
    fn multi_choice_splits_and_dedupes() {
        let kind = FieldKind::MultiChoice(options(&["Ham", "Onions", "Pineapple"]));
        assert_eq!(
            kind.parse("ham, pineapple and Ham"),
            Ok(FieldValue::Choices(vec!["Ham".into(), "Pineapple".into()]))
        );
        assert_eq!(kind.parse("ham, anchovies"), Err(InputError::UnknownChoice("anchovies".into())));
        assert_eq!(kind.parse(" , "), Err(InputError::Empty));
    }

    #[test]
    fn integer_and_text() {
        assert_eq!(FieldKind::Integer.parse("42"), Ok(FieldValue::Number(42)));
        assert!(matches!(FieldKind::Integer.parse("lots"), Err(InputError::NotANumber(_))));
        assert_eq!(FieldKind::Text.parse("  "), Err(InputError::Empty));
    }

    #[test]
    fn active_when_equals_reads_the_dependency() {
        let field = FormField::choice("Signature", &["Hawaiian"]).active_when_equals("Kind", "Signature");
        let mut record = Record::new();
        assert!(!field.is_active(&record));
        record.insert("Kind".into(), FieldValue::Choice("Signature".into()));
        assert!(field.is_active(&record));
        assert_eq!(field.dependencies, vec!["Kind".to_string()]);
    }

    #[test]
    fn labels_split_camel_case() {
        assert_eq!(field_label("GourmetDelight"), "gourmet delight");
        assert_eq!(field_label("Size"), "size");
    }
}
