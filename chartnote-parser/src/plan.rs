//! Plan outline structuring: numbered diagnoses with bullet orders beneath them.

use std::sync::LazyLock;

use chartnote_core::{OrphanOrderPolicy, ParserConfig, StructuredPlanEntry, GENERAL_DIAGNOSIS};
use regex::Regex;

use crate::normalize_newlines;

static DIAGNOSIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s*(.+)$").expect("valid regex"));

/// One classified line of a plan outline.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PlanLine<'a> {
    Diagnosis(&'a str),
    /// Bullet or dash item with the marker removed; may be empty.
    Order(&'a str),
    Continuation(&'a str),
}

impl<'a> PlanLine<'a> {
    /// Classify a line. Blank lines yield `None`.
    pub(crate) fn classify(raw: &'a str) -> Option<Self> {
        let line = raw.trim();
        if line.is_empty() {
            return None;
        }

        if let Some(caps) = DIAGNOSIS_RE.captures(line) {
            let text = caps.get(2).map_or("", |m| m.as_str()).trim();
            return Some(PlanLine::Diagnosis(text));
        }

        match line.strip_prefix('•').or_else(|| line.strip_prefix('-')) {
            Some(rest) => Some(PlanLine::Order(rest.trim())),
            None => Some(PlanLine::Continuation(line)),
        }
    }
}

/// Parse a plan outline with the default (drop orphans) policy.
pub fn parse_plan_outline(plan_text: &str) -> Vec<StructuredPlanEntry> {
    parse_plan_outline_with(plan_text, &ParserConfig::default())
}

pub fn parse_plan_outline_with(
    plan_text: &str,
    config: &ParserConfig,
) -> Vec<StructuredPlanEntry> {
    let text = normalize_newlines(plan_text);
    let mut structured = Vec::new();
    let mut current: Option<StructuredPlanEntry> = None;
    let mut dropped = 0usize;

    for line in text.lines().filter_map(PlanLine::classify) {
        let item = match line {
            PlanLine::Diagnosis(diagnosis) => {
                if let Some(entry) = current.replace(StructuredPlanEntry::new(diagnosis)) {
                    structured.push(entry);
                }
                continue;
            }
            PlanLine::Order("") => continue,
            PlanLine::Order(item) | PlanLine::Continuation(item) => item,
        };

        if let Some(entry) = current.as_mut() {
            entry.orders.push(item.to_string());
        } else if config.orphan_orders == OrphanOrderPolicy::GeneralBucket {
            let mut entry = StructuredPlanEntry::new(GENERAL_DIAGNOSIS);
            entry.orders.push(item.to_string());
            current = Some(entry);
        } else {
            dropped += 1;
        }
    }

    if let Some(entry) = current {
        structured.push(entry);
    }

    if dropped > 0 {
        tracing::debug!(dropped, "plan lines before first diagnosis were dropped");
    }

    structured
}

/// Render entries back into outline text that `parse_plan_outline` accepts.
pub fn format_plan_outline(entries: &[StructuredPlanEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut block = format!("{}. {}", index + 1, entry.diagnosis);
            for order in &entry.orders {
                block.push_str("\n  • ");
                block.push_str(order);
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
