use serde_json::{Map, Value};
use shared::{Channel, DeliveryMode};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::IntakeError;

pub const MAX_EVENT_ID_LEN: usize = 128;
pub const MAX_PRODUCT_NAME_LEN: usize = 100;
pub const MAX_QTY_PER_ITEM: i32 = 999;
pub const MAX_CUSTOMER_NAME_LEN: usize = 100;
pub const MAX_NOTE_LEN: usize = 500;
pub const MAX_LABEL_LEN: usize = 100;
pub const MAX_LOCATION_LINK_LEN: usize = 500;

/// An order submission whose every field has been checked and coerced.
/// Building one never touches storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub event_id: Uuid,
    pub channel: Channel,
    pub customer_name: String,
    pub note: String,
    pub delivery_mode: DeliveryMode,
    pub delivery_date: String,
    pub delivery_time_slot: String,
    pub location_link: String,
    /// Product name to requested quantity; every quantity is in `1..=MAX_QTY_PER_ITEM`.
    pub quantities: BTreeMap<String, i32>,
}

impl ValidatedOrder {
    pub fn total_items(&self) -> i32 {
        self.quantities
            .values()
            .fold(0i32, |total, qty| total.saturating_add(*qty))
    }
}

/// Decodes a raw request body. An empty body is read as an empty object so
/// that it fails on the first missing field rather than as a parse error.
pub fn parse_body(body: &[u8]) -> Result<Value, IntakeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|_| IntakeError::InvalidBody)
}

/// Checks a submission field by field and stops at the first violation.
pub fn validate(body: &Value) -> Result<ValidatedOrder, IntakeError> {
    let fields = body.as_object().ok_or(IntakeError::InvalidBody)?;

    let event_id = validate_event_id(fields.get("eventId"))?;

    let channel = fields
        .get("channel")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Channel>().ok())
        .ok_or(IntakeError::InvalidChannel)?;

    let quantities = match fields.get("quantities") {
        Some(Value::Object(entries)) => clean_quantities(entries),
        _ => return Err(IntakeError::InvalidQuantities),
    };

    let order = ValidatedOrder {
        event_id,
        channel,
        customer_name: text_field(fields, "customerName", MAX_CUSTOMER_NAME_LEN),
        note: text_field(fields, "note", MAX_NOTE_LEN),
        delivery_mode: fields
            .get("deliveryMode")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DeliveryMode>().ok())
            .unwrap_or_default(),
        delivery_date: text_field(fields, "deliveryDate", MAX_LABEL_LEN),
        delivery_time_slot: text_field(fields, "deliveryTimeSlot", MAX_LABEL_LEN),
        location_link: text_field(fields, "locationLink", MAX_LOCATION_LINK_LEN),
        quantities,
    };

    if order.total_items() <= 0 {
        return Err(IntakeError::EmptyCart);
    }

    Ok(order)
}

fn validate_event_id(value: Option<&Value>) -> Result<Uuid, IntakeError> {
    let raw = match value {
        None | Some(Value::Null) => return Err(IntakeError::MissingEventId),
        Some(Value::String(s)) => truncate_chars(s.trim(), MAX_EVENT_ID_LEN),
        Some(_) => return Err(IntakeError::InvalidEventId),
    };
    if raw.is_empty() {
        return Err(IntakeError::MissingEventId);
    }
    Uuid::parse_str(&raw).map_err(|_| IntakeError::InvalidEventId)
}

/// Drops blank names and non-positive quantities. Keys that trim to the same
/// name are summed and clamped again.
fn clean_quantities(entries: &Map<String, Value>) -> BTreeMap<String, i32> {
    let mut cleaned: BTreeMap<String, i32> = BTreeMap::new();

    for (raw_name, raw_qty) in entries {
        let name = truncate_chars(raw_name.trim(), MAX_PRODUCT_NAME_LEN);
        let qty = coerce_quantity(raw_qty);
        if name.is_empty() || qty <= 0 {
            continue;
        }
        let slot = cleaned.entry(name).or_insert(0);
        *slot = slot.saturating_add(qty).min(MAX_QTY_PER_ITEM);
    }

    cleaned
}

fn coerce_quantity(value: &Value) -> i32 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.trunc().clamp(0.0, f64::from(MAX_QTY_PER_ITEM)) as i32,
        Some(n) if n == f64::INFINITY => MAX_QTY_PER_ITEM,
        _ => 0,
    }
}

fn text_field(fields: &Map<String, Value>, key: &str, max_len: usize) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => truncate_chars(s.trim(), max_len),
        Some(Value::Number(n)) => truncate_chars(&n.to_string(), max_len),
        _ => String::new(),
    }
}

fn truncate_chars(s: &str, max_len: usize) -> String {
    s.chars().take(max_len).collect()
}
