//! The pizza-order form: which fields are asked, when, and what happens with the finished order.

use crate::form::{
    value_str, FieldValue, Form, FormBuildError, FormBuilder, FormCancelled, FormField, Record,
};
use serde::Serialize;

pub const FORM_NAME: &str = "pizza-order";

pub const SIZES: &[&str] = &["Medium", "Large", "Family"];
pub const KINDS: &[&str] = &["Signature", "Gourmet Delight", "Stuffed", "Build Your Own"];
pub const SIGNATURE: &[&str] = &["Hawaiian", "Pepperoni"];
pub const GOURMET_DELIGHT: &[&str] = &[
    "Portobello Mushroom",
    "Gourmet Vegetarian",
    "Sausage Pepperoni",
    "Tuscan Chicken",
];
pub const STUFFED: &[&str] = &["Chicken Bacon", "Stuffed Pepperoni", "Stuffed Deluxe"];
pub const CRUSTS: &[&str] = &["Original", "Thin", "Stuffed"];
pub const SAUCES: &[&str] = &["Traditional", "Creamy Garlic", "Olive Oil"];
pub const TOPPINGS: &[&str] = &[
    "Beef",
    "Black Olives",
    "Chicken",
    "Green Peppers",
    "Ham",
    "Jalapenos",
    "Mushrooms",
    "Onions",
    "Pepperoni",
    "Pineapple",
    "Sausage",
    "Spinach",
];

const BUILD_YOUR_OWN: &str = "Build Your Own";

/// A confirmed order, read back from the form record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PizzaOrder {
    pub size: String,
    pub kind: String,
    /// The named pizza for Signature, Gourmet Delight and Stuffed kinds.
    pub variety: Option<String>,
    pub crust: Option<String>,
    pub sauce: Option<String>,
    pub toppings: Vec<String>,
    pub address: String,
}

impl PizzaOrder {
    pub fn from_record(record: &Record) -> Self {
        let variety = ["Signature", "GourmetDelight", "Stuffed"]
            .iter()
            .find_map(|f| record.get(*f).and_then(FieldValue::as_str))
            .map(str::to_string);
        let optional = |f: &str| record.get(f).and_then(FieldValue::as_str).map(str::to_string);
        let toppings = match record.get("Toppings") {
            Some(FieldValue::Choices(items)) => items.clone(),
            _ => Vec::new(),
        };
        Self {
            size: value_str(record, "Size").to_string(),
            kind: value_str(record, "Kind").to_string(),
            variety,
            crust: optional("Crust"),
            sauce: optional("Sauce"),
            toppings,
            address: value_str(record, "Address").to_string(),
        }
    }

    /// One-line description, e.g. "Large Signature (Hawaiian) pizza to 1 Main St".
    pub fn summary(&self) -> String {
        let mut s = format!("{} {}", self.size, self.kind);
        if let Some(ref v) = self.variety {
            s.push_str(&format!(" ({})", v));
        }
        if self.kind == BUILD_YOUR_OWN {
            let mut parts = Vec::new();
            if let Some(ref c) = self.crust {
                parts.push(format!("{} crust", c.to_lowercase()));
            }
            if let Some(ref sauce) = self.sauce {
                parts.push(format!("{} sauce", sauce.to_lowercase()));
            }
            if !self.toppings.is_empty() {
                parts.push(self.toppings.join(", ").to_lowercase());
            }
            if !parts.is_empty() {
                s.push_str(&format!(" ({})", parts.join("; ")));
            }
        }
        format!("{} pizza to {}", s, self.address)
    }
}

/// Message shown when the user completes the order.
pub fn completion_message(record: &Record) -> String {
    let order = PizzaOrder::from_record(record);
    log::info!("pizza order confirmed: {}", order.summary());
    format!("Processed your order! A {} is on its way.", order.summary())
}

/// Message shown when the order form is abandoned.
pub fn cancellation_message(cancelled: &FormCancelled) -> String {
    let mut msg = format!(
        "You quit on {}--maybe you can finish next time!",
        cancelled.last_field
    );
    if let Some(ref cause) = cancelled.cause {
        msg.push_str(&format!(" ({})", cause));
    }
    msg
}

/// The pizza-order form. `max_attempts` bounds invalid replies per prompt.
pub fn pizza_form(max_attempts: u32) -> Result<Form, FormBuildError> {
    FormBuilder::new(FORM_NAME)
        .field(FormField::choice("Size", SIZES).prompt("What size of pizza would you like?"))
        .field(FormField::choice("Kind", KINDS).prompt("What kind of pizza would you like?"))
        .field(
            FormField::choice("Signature", SIGNATURE)
                .prompt("Which signature pizza?")
                .active_when_equals("Kind", "Signature"),
        )
        .field(
            FormField::choice("GourmetDelight", GOURMET_DELIGHT)
                .prompt("Which gourmet delight pizza?")
                .active_when_equals("Kind", "Gourmet Delight"),
        )
        .field(
            FormField::choice("Stuffed", STUFFED)
                .prompt("Which stuffed pizza?")
                .active_when_equals("Kind", "Stuffed"),
        )
        .field(FormField::choice("Crust", CRUSTS).active_when_equals("Kind", BUILD_YOUR_OWN))
        .field(FormField::choice("Sauce", SAUCES).active_when_equals("Kind", BUILD_YOUR_OWN))
        .field(
            FormField::multi_choice("Toppings", TOPPINGS)
                .prompt("Which toppings? Separate several with commas.")
                .active_when_equals("Kind", BUILD_YOUR_OWN),
        )
        .field(FormField::text("Address").prompt("Where should we deliver it?"))
        .confirm(
            "Do you want to order your {Size} {Kind} pizza delivered to {Address}?",
            &["Size", "Kind", "Address"],
        )
        .max_attempts(max_attempts)
        .on_completion(completion_message)
        .on_cancel(cancellation_message)
        .build()
}
