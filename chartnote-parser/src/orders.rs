//! Virtual order extraction from note plans, and merging with real orders.

use std::collections::HashMap;

use chartnote_core::{
    ConsolidatedOrderList, OrderCategory, OrderEntry, ParserConfig, RealOrder, VirtualOrder,
    VirtualTag, VisitNote,
};

use crate::entities::decode_entities_bounded;
use crate::normalize_newlines;
use crate::plan::PlanLine;
use crate::sections::plan_region;

/// Checked in order; the first case-insensitive prefix match wins.
const CATEGORY_PREFIXES: [(&str, OrderCategory); 4] = [
    ("prescription:", OrderCategory::Prescription),
    ("lab:", OrderCategory::Lab),
    ("imaging:", OrderCategory::Imaging),
    ("referral:", OrderCategory::Referral),
];

/// Split an order line into its category and display title.
pub fn classify_order(text: &str) -> (OrderCategory, &str) {
    for (prefix, category) in CATEGORY_PREFIXES {
        let matches = text
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        if matches {
            return (category, text[prefix.len()..].trim());
        }
    }
    (OrderCategory::Order, text.trim())
}

pub fn extract_virtual_orders(note_text: &str, visit_id: &str) -> Vec<VirtualOrder> {
    extract_virtual_orders_with(note_text, visit_id, &ParserConfig::default())
}

/// Derive one virtual order per bullet line of the note's Plan.
///
/// Ids are `virtual-<visit>-<n>` with `n` counting emitted orders, so the same
/// note always yields the same ids.
pub fn extract_virtual_orders_with(
    note_text: &str,
    visit_id: &str,
    config: &ParserConfig,
) -> Vec<VirtualOrder> {
    if note_text.trim().is_empty() {
        return Vec::new();
    }

    let decoded = decode_entities_bounded(note_text, config.max_decode_passes);
    let normalized = normalize_newlines(&decoded);
    let Some(plan) = plan_region(&normalized) else {
        return Vec::new();
    };

    let mut extracted = Vec::new();
    let mut diagnosis = "";

    for line in plan.lines().filter_map(PlanLine::classify) {
        match line {
            PlanLine::Diagnosis(text) => diagnosis = text,
            PlanLine::Order(text) => {
                let (category, title) = classify_order(text);
                if title.is_empty() {
                    continue;
                }
                extracted.push(VirtualOrder {
                    id: format!("virtual-{visit_id}-{}", extracted.len()),
                    visit_id: visit_id.to_string(),
                    kind: VirtualTag::Virtual,
                    category,
                    display_title: title.to_string(),
                    diagnosis_name: diagnosis.to_string(),
                    is_virtual: true,
                });
            }
            PlanLine::Continuation(_) => {}
        }
    }

    tracing::debug!(visit_id, count = extracted.len(), "extracted virtual orders");
    extracted
}

/// Drop virtual orders already covered by a real order of the same visit.
///
/// A real order covers a virtual one when any of its descriptive fields
/// contains the virtual title, ignoring case. Survivors keep their order.
pub fn dedupe_orders(entries: Vec<OrderEntry>) -> Vec<OrderEntry> {
    let keep: Vec<bool> = {
        let real_fields = index_real_fields(&entries);
        entries
            .iter()
            .map(|entry| match entry {
                OrderEntry::Real(_) => true,
                OrderEntry::Virtual(order) => !covered_by_real(order, &real_fields),
            })
            .collect()
    };

    let suppressed = keep.iter().filter(|kept| !**kept).count();
    if suppressed > 0 {
        tracing::debug!(suppressed, "virtual orders matched real orders");
    }

    entries
        .into_iter()
        .zip(keep)
        .filter_map(|(entry, kept)| kept.then_some(entry))
        .collect()
}

/// Lowercased descriptive fields of real orders, keyed by visit.
fn index_real_fields(entries: &[OrderEntry]) -> HashMap<&str, Vec<String>> {
    let mut index: HashMap<&str, Vec<String>> = HashMap::new();
    for entry in entries {
        if let OrderEntry::Real(order) = entry {
            if let Some(visit_id) = order.visit_id.as_deref() {
                index
                    .entry(visit_id)
                    .or_default()
                    .extend(order.descriptive_fields().map(str::to_lowercase));
            }
        }
    }
    index
}

fn covered_by_real(order: &VirtualOrder, real_fields: &HashMap<&str, Vec<String>>) -> bool {
    let Some(fields) = real_fields.get(order.visit_id.as_str()) else {
        return false;
    };
    let title = order.display_title.to_lowercase();
    fields.iter().any(|field| field.contains(&title))
}

/// Real orders first, then virtual orders of each visit in visit order, deduplicated.
pub fn consolidate_orders(
    real: Vec<RealOrder>,
    visits: &[VisitNote],
    config: &ParserConfig,
) -> ConsolidatedOrderList {
    let mut entries: Vec<OrderEntry> = real.into_iter().map(OrderEntry::Real).collect();

    for visit in visits {
        let note = visit.raw_note();
        entries.extend(
            extract_virtual_orders_with(note.as_str(), &visit.visit_id, config)
                .into_iter()
                .map(OrderEntry::Virtual),
        );
    }

    ConsolidatedOrderList::new(dedupe_orders(entries))
}
