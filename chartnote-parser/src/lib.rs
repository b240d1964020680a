//! Free-text clinical note parsing: sections, plan outline and note-derived orders.
//!
//! All operations are pure functions of their inputs. Only the JSON entry points
//! return errors, and only when the surrounding JSON container cannot be decoded.

mod compose;
mod entities;
mod orders;
mod plan;
mod sections;

use std::borrow::Cow;

use chartnote_core::{
    ConsolidatedOrderList, NoteError, OrderEntry, ParserConfig, ParsedNote, RawNote, RealOrder,
    SectionSet, VisitNote,
};
use serde_json::Value;

pub use compose::compose_note;
pub use entities::{decode_entities, decode_entities_bounded, decode_entities_value};
pub use orders::{
    classify_order, consolidate_orders, dedupe_orders, extract_virtual_orders,
    extract_virtual_orders_with,
};
pub use plan::{format_plan_outline, parse_plan_outline, parse_plan_outline_with};
pub use sections::{parse_note_sections, parse_note_sections_with};

/// Parse a note into sections and a structured plan in one call.
pub fn parse_note(raw: &str, config: &ParserConfig) -> ParsedNote {
    let sections = parse_note_sections_with(raw, config);
    let plan = parse_plan_outline_with(&sections.plan, config);
    ParsedNote { sections, plan }
}

/// Same as [`parse_note`] for a JSON note value of any type.
pub fn parse_note_value(raw: &Value, config: &ParserConfig) -> ParsedNote {
    parse_note(RawNote::from(raw).as_str(), config)
}

/// Sections of a JSON note value; non-string values are coerced.
pub fn parse_note_sections_value(raw: &Value, config: &ParserConfig) -> SectionSet {
    parse_note_sections_with(RawNote::from(raw).as_str(), config)
}

/// Deduplicate a JSON array of mixed real and virtual orders.
pub fn dedupe_orders_str(orders_json: &str) -> Result<Vec<OrderEntry>, NoteError> {
    let value: Value = serde_json::from_str(orders_json)?;
    dedupe_orders_value(&value)
}

pub fn dedupe_orders_value(orders: &Value) -> Result<Vec<OrderEntry>, NoteError> {
    let entries = decode_array::<OrderEntry>(orders, "orders")?;
    Ok(dedupe_orders(entries))
}

/// Consolidate JSON arrays of real orders and visit notes.
pub fn consolidate_orders_str(
    real_json: &str,
    visits_json: &str,
    config: &ParserConfig,
) -> Result<ConsolidatedOrderList, NoteError> {
    let real: Value = serde_json::from_str(real_json)?;
    let visits: Value = serde_json::from_str(visits_json)?;
    consolidate_orders_value(&real, &visits, config)
}

pub fn consolidate_orders_value(
    real: &Value,
    visits: &Value,
    config: &ParserConfig,
) -> Result<ConsolidatedOrderList, NoteError> {
    let real = decode_array::<RealOrder>(real, "real orders")?;
    let visits = decode_array::<VisitNote>(visits, "visits")?;
    Ok(consolidate_orders(real, &visits, config))
}

/// `null` is treated as an empty list; anything else must be an array.
fn decode_array<T>(value: &Value, label: &str) -> Result<Vec<T>, NoteError>
where
    T: serde::de::DeserializeOwned,
{
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                T::deserialize(item)
                    .map_err(|err| NoteError::Parse(format!("{label}[{index}]: {err}")))
            })
            .collect(),
        _ => Err(NoteError::Parse(format!("Expected {label} to be an array"))),
    }
}

pub(crate) fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}
