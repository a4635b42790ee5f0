//! Maps purchased items onto donation buckets.
//!
//! Classification is a fixed, ordered list of case-insensitive rules. Rules are evaluated top to bottom and the first
//! match wins, so adding a bucket whose keywords overlap an existing one only requires deciding where it goes in
//! [`RULES`].
use log::*;
use serde_json::Value;
use thiserror::Error;

use crate::buckets::DonationBucket;

enum Matcher {
    /// The lower-cased name contains any of the keywords
    Contains(&'static [&'static str]),
    /// The lower-cased, trimmed name is exactly one of the keywords
    Equals(&'static [&'static str]),
}

impl Matcher {
    fn is_match(&self, name: &str) -> bool {
        match self {
            Matcher::Contains(keywords) => keywords.iter().any(|k| name.contains(k)),
            Matcher::Equals(keywords) => keywords.iter().any(|k| name.trim() == *k),
        }
    }
}

const RULES: [(Matcher, DonationBucket); 3] = [
    (Matcher::Contains(&["пицца", "pizza"]), DonationBucket::Pizza),
    (Matcher::Equals(&["кола", "cola"]), DonationBucket::Cola),
    (Matcher::Contains(&["кат бургер", "cat burger", "двойной кат", "double cat"]), DonationBucket::Burger),
];

/// Returns the bucket funded by an item with the given name, or `None` if the item does not fund any bucket.
pub fn classify(name: &str) -> Option<DonationBucket> {
    let name = name.to_lowercase();
    RULES.iter().find(|(matcher, _)| matcher.is_match(&name)).map(|(_, bucket)| *bucket)
}

/// A single line of a completed payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchasedItem {
    pub name: String,
    pub quantity: i64,
}

impl PurchasedItem {
    pub fn new<S: Into<String>>(name: S, quantity: i64) -> Self {
        Self { name: name.into(), quantity }
    }

    pub fn bucket(&self) -> Option<DonationBucket> {
        classify(&self.name)
    }

    /// Reads an item from its JSON form, `{ "name": string, "quantity": number }`.
    ///
    /// A missing quantity, or a quantity of zero, counts as 1.
    pub fn from_json(value: &Value) -> Result<Self, ItemError> {
        let obj = value.as_object().ok_or(ItemError::NotAnObject)?;
        let name = match obj.get("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return Err(ItemError::MissingName),
        };
        let quantity = match obj.get("quantity") {
            None | Some(Value::Null) => 1,
            Some(Value::Number(n)) => match n.as_i64() {
                Some(0) => 1,
                Some(q) if q > 0 => q,
                _ => return Err(ItemError::InvalidQuantity(n.to_string())),
            },
            Some(v) => return Err(ItemError::InvalidQuantity(v.to_string())),
        };
        Ok(Self { name, quantity })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("Item is not an object")]
    NotAnObject,
    #[error("Item has no name")]
    MissingName,
    #[error("Item quantity is not a positive whole number: {0}")]
    InvalidQuantity(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Purchased items must be a list")]
    NotAList,
    #[error("The list of purchased items is empty")]
    Empty,
}

/// Parses the payload of a "payment completed" event.
///
/// The payload must be a non-empty list, otherwise the whole batch is rejected. Individual malformed items are logged
/// and skipped.
pub fn parse_batch(payload: &Value) -> Result<Vec<PurchasedItem>, BatchError> {
    let items = payload.as_array().ok_or(BatchError::NotAList)?;
    if items.is_empty() {
        return Err(BatchError::Empty);
    }
    let result = items
        .iter()
        .filter_map(|item| {
            PurchasedItem::from_json(item)
                .map_err(|e| warn!("🏷️ Skipping malformed item {item}. {e}"))
                .ok()
        })
        .collect::<Vec<_>>();
    trace!("🏷️ {} of {} items in the batch are well-formed", result.len(), items.len());
    Ok(result)
}
