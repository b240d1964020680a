//! Rebuild a storable note body from parsed sections.

use chartnote_core::{SectionKind, SectionSet, StructuredPlanEntry};

use crate::plan::format_plan_outline;

/// Join non-empty sections as `Header: content` blocks separated by a blank line.
/// A non-empty `structured_plan` replaces the plain plan text.
pub fn compose_note(sections: &SectionSet, structured_plan: Option<&[StructuredPlanEntry]>) -> String {
    let formatted_plan = structured_plan
        .filter(|entries| !entries.is_empty())
        .map(format_plan_outline);

    SectionKind::ALL
        .iter()
        .filter_map(|kind| {
            let content = match (kind, formatted_plan.as_deref()) {
                (SectionKind::Plan, Some(plan)) => plan,
                _ => sections.get(*kind),
            };
            (!content.is_empty()).then(|| format!("{}: {}", kind.canonical_header(), content))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::parse_note_sections;

    fn full_sections() -> SectionSet {
        SectionSet {
            chief_complaint: "Knee pain".into(),
            hpi: "Twisted left knee playing soccer".into(),
            ros_notes: "No fever".into(),
            pe_notes: "Mild effusion, stable ligaments".into(),
            assessment: "Left knee sprain".into(),
            plan: "RICE".into(),
            care_plan: "Home exercise program".into(),
            follow_up: "2 weeks".into(),
        }
    }

    #[test]
    fn composed_note_parses_back_to_same_sections() {
        let sections = full_sections();
        let note = compose_note(&sections, None);
        assert!(note.starts_with("Chief Complaint: Knee pain\n\nHPI: "));
        assert_eq!(parse_note_sections(&note), sections);
    }

    #[test]
    fn structured_plan_replaces_plain_plan() {
        let sections = full_sections();
        let plan = vec![StructuredPlanEntry {
            diagnosis: "Knee sprain".into(),
            orders: vec!["Imaging: Knee X-ray".into()],
        }];
        let note = compose_note(&sections, Some(&plan));
        assert!(note.contains("Plan: 1. Knee sprain\n  • Imaging: Knee X-ray\n\nCare Plan:"));
        assert_eq!(
            parse_note_sections(&note).plan,
            "1. Knee sprain\n  • Imaging: Knee X-ray"
        );
    }

    #[test]
    fn empty_sections_are_omitted() {
        let sections = SectionSet {
            hpi: "Cough".into(),
            follow_up: "prn".into(),
            ..SectionSet::default()
        };
        assert_eq!(compose_note(&sections, Some(&[])), "HPI: Cough\n\nFollow Up: prn");
        assert_eq!(compose_note(&SectionSet::default(), None), "");
    }
}
