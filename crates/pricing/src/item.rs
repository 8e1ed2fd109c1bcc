use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use uuid::Uuid;

use gestor_core::DocumentId;
use gestor_infra::{Document, Fields};

/// Prefix marking ids generated locally for items that were never saved.
pub const PLACEHOLDER_PREFIX: &str = "new-";

pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_PRICE: &str = "price";
pub const FIELD_CREATED_AT: &str = "createdAt";

/// Identifier of a pricing item: a store-assigned document id, or a local placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

/// How a write should treat an item, derived from its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKey {
    /// Not persisted yet; saving creates it.
    Placeholder,
    /// Persisted under this document id; saving updates it.
    Persisted(DocumentId),
    /// Neither; writes skip it.
    Missing,
}

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh placeholder id (`new-<uuid>`).
    pub fn placeholder() -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{}", Uuid::now_v7().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.len() > PLACEHOLDER_PREFIX.len() && self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    pub fn key(&self) -> ItemKey {
        if self.is_blank() {
            return ItemKey::Missing;
        }
        if self.is_placeholder() {
            return ItemKey::Placeholder;
        }
        match DocumentId::new(self.0.as_str()) {
            Ok(id) => ItemKey::Persisted(id),
            Err(_) => ItemKey::Missing,
        }
    }
}

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DocumentId> for ItemId {
    fn from(value: DocumentId) -> Self {
        Self(value.into_inner())
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Non-negative price amount.
///
/// Construction never fails: anything unusable becomes 0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub const ZERO: Price = Price(0.0);

    pub fn new(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    /// Parse user input such as `"10"`, `"10.5"`, `"10,50"`, `"R$ 1.234,56"`, `"1,234.56"`.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix("R$")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed)
            .trim();

        // With both separators present, the last one is the decimal mark.
        let normalized = match (trimmed.rfind('.'), trimmed.rfind(',')) {
            (Some(dot), Some(comma)) if dot > comma => trimmed.replace(',', ""),
            (Some(_), Some(_)) => trimmed.replace('.', "").replace(',', "."),
            _ => trimmed.replace(',', "."),
        };

        normalized.parse::<f64>().map(Self::new).unwrap_or(Self::ZERO)
    }

    /// Read a stored price: numbers as-is, numeric strings parsed, anything else 0.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Number(n) => n.as_f64().map(Self::new).unwrap_or(Self::ZERO),
            JsonValue::String(s) => Self::parse(s),
            _ => Self::ZERO,
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl From<f64> for Price {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

/// One row of a tenant's pricing table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceItem {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: Price,
    /// Assigned by the store on creation; the only sort key.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PriceItem {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, price: impl Into<Price>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price: price.into(),
            created_at: None,
        }
    }

    /// A not-yet-saved item built from form input.
    pub fn draft(name: impl Into<String>, description: impl Into<String>, price_input: &str) -> Self {
        Self {
            id: ItemId::placeholder(),
            name: name.into(),
            description: description.into(),
            price: Price::parse(price_input),
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Whether the item carries enough data to be saved (a non-blank name).
    pub fn is_persistable(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Sort key in microseconds since the epoch; items without a timestamp sort as 0.
    pub fn sort_key(&self) -> i64 {
        self.created_at.map(|ts| ts.timestamp_micros()).unwrap_or(0)
    }

    /// Decode a stored document. Lenient: missing or malformed fields fall back to defaults.
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: ItemId::from(doc.id.clone()),
            name: doc.get_str(FIELD_NAME).unwrap_or_default().to_string(),
            description: doc.get_str(FIELD_DESCRIPTION).unwrap_or_default().to_string(),
            price: doc.get(FIELD_PRICE).map(Price::from_json).unwrap_or_default(),
            created_at: doc.get(FIELD_CREATED_AT).and_then(parse_timestamp),
        }
    }

    /// User-editable fields, as written on both create and update.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(FIELD_NAME.to_string(), json!(self.name).into());
        fields.insert(FIELD_DESCRIPTION.to_string(), json!(self.description).into());
        fields.insert(FIELD_PRICE.to_string(), json!(self.price.value()).into());
        fields
    }
}

/// Drop items that cannot be saved (blank names). Callers apply this before `save_batch`.
pub fn retain_persistable(items: Vec<PriceItem>) -> Vec<PriceItem> {
    items.into_iter().filter(PriceItem::is_persistable).collect()
}

/// RFC 3339 strings, or integer milliseconds since the epoch.
fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    match value {
        JsonValue::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        JsonValue::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}
