//! Section splitting driven by a boundary table.
//!
//! Every section is searched for independently over the whole note, so a header
//! that appears out of order or twice changes only the sections that reference it.

use std::sync::LazyLock;

use chartnote_core::{ParserConfig, SectionKind, SectionSet};
use regex::Regex;

use crate::entities::decode_entities_bounded;
use crate::normalize_newlines;

/// How the end of a section is located once its header is found.
enum Boundary {
    /// Earliest blank line or following header, else end of text.
    Capture(&'static [SectionKind]),
    /// First candidate header that occurs anywhere after the start, tried in list
    /// order. Blank lines and embedded colons do not end the section.
    Indexed(&'static [SectionKind]),
}

struct SectionRule {
    kind: SectionKind,
    boundary: Boundary,
}

const SECTION_RULES: [SectionRule; 8] = [
    SectionRule {
        kind: SectionKind::ChiefComplaint,
        boundary: Boundary::Capture(&[
            SectionKind::Hpi,
            SectionKind::Ros,
            SectionKind::PhysicalExam,
            SectionKind::Assessment,
            SectionKind::Plan,
            SectionKind::CarePlan,
            SectionKind::FollowUp,
        ]),
    },
    SectionRule {
        kind: SectionKind::Hpi,
        boundary: Boundary::Capture(&[
            SectionKind::Ros,
            SectionKind::PhysicalExam,
            SectionKind::Assessment,
            SectionKind::Plan,
            SectionKind::CarePlan,
            SectionKind::FollowUp,
        ]),
    },
    SectionRule {
        kind: SectionKind::Ros,
        boundary: Boundary::Capture(&[
            SectionKind::PhysicalExam,
            SectionKind::Assessment,
            SectionKind::Plan,
            SectionKind::CarePlan,
            SectionKind::FollowUp,
        ]),
    },
    SectionRule {
        kind: SectionKind::PhysicalExam,
        boundary: Boundary::Capture(&[
            SectionKind::Assessment,
            SectionKind::Plan,
            SectionKind::CarePlan,
            SectionKind::FollowUp,
        ]),
    },
    SectionRule {
        kind: SectionKind::Assessment,
        boundary: Boundary::Indexed(&[
            SectionKind::Plan,
            SectionKind::CarePlan,
            SectionKind::FollowUp,
        ]),
    },
    SectionRule {
        kind: SectionKind::Plan,
        boundary: Boundary::Indexed(&[SectionKind::CarePlan, SectionKind::FollowUp]),
    },
    SectionRule {
        kind: SectionKind::CarePlan,
        boundary: Boundary::Capture(&[SectionKind::FollowUp]),
    },
    SectionRule {
        kind: SectionKind::FollowUp,
        boundary: Boundary::Capture(&[]),
    },
];

enum CompiledBoundary {
    Capture(Regex),
    Indexed(Vec<Regex>),
}

struct CompiledRule {
    kind: SectionKind,
    header: Regex,
    end: CompiledBoundary,
}

impl CompiledRule {
    /// Raw (undecoded, untrimmed) body of the section, if its header is present.
    ///
    /// Blank lines right after the header are skipped before terminators are
    /// searched, but a header on the line after them still ends the section.
    fn body<'t>(&self, text: &'t str) -> Option<&'t str> {
        let header = self.header.find(text)?;
        let body = &text[header.end()..];
        let leading = body.len() - body.trim_start().len();
        let from = body[..leading].rfind('\n').unwrap_or(0);
        let end = match &self.end {
            CompiledBoundary::Capture(terminator) => {
                terminator.find_at(body, from).map(|m| m.start())
            }
            CompiledBoundary::Indexed(candidates) => candidates
                .iter()
                .find_map(|candidate| candidate.find_at(body, from))
                .map(|m| m.start()),
        };
        Some(&body[..end.unwrap_or(body.len())])
    }
}

static COMPILED_RULES: LazyLock<Vec<CompiledRule>> = LazyLock::new(|| {
    SECTION_RULES
        .iter()
        .map(|rule| CompiledRule {
            kind: rule.kind,
            header: header_regex(rule.kind),
            end: match rule.boundary {
                Boundary::Capture(terminators) => {
                    CompiledBoundary::Capture(capture_end_regex(terminators))
                }
                Boundary::Indexed(candidates) => CompiledBoundary::Indexed(
                    candidates.iter().map(|kind| line_header_regex(&[*kind])).collect(),
                ),
            },
        })
        .collect()
});

/// Plan body as seen by order extraction: ends at the earliest Care Plan or
/// Follow Up header rather than by candidate priority.
static PLAN_REGION: LazyLock<CompiledRule> = LazyLock::new(|| CompiledRule {
    kind: SectionKind::Plan,
    header: header_regex(SectionKind::Plan),
    end: CompiledBoundary::Capture(line_header_regex(&[
        SectionKind::CarePlan,
        SectionKind::FollowUp,
    ])),
});

fn alias_alternation(kinds: &[SectionKind]) -> String {
    kinds
        .iter()
        .flat_map(|kind| kind.aliases().iter())
        .map(|alias| regex::escape(alias))
        .collect::<Vec<_>>()
        .join("|")
}

fn header_regex(kind: SectionKind) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{}):", alias_alternation(&[kind]))).expect("valid regex")
}

fn line_header_regex(kinds: &[SectionKind]) -> Regex {
    Regex::new(&format!(r"(?i)\n[ \t]*(?:{}):", alias_alternation(kinds))).expect("valid regex")
}

fn capture_end_regex(terminators: &[SectionKind]) -> Regex {
    let pattern = if terminators.is_empty() {
        r"\n[ \t]*\n".to_string()
    } else {
        format!(
            r"(?i)\n[ \t]*\n|\n[ \t]*(?:{}):",
            alias_alternation(terminators)
        )
    };
    Regex::new(&pattern).expect("valid regex")
}

/// Split a note into the eight canonical sections with default settings.
pub fn parse_note_sections(text: &str) -> SectionSet {
    parse_note_sections_with(text, &ParserConfig::default())
}

pub fn parse_note_sections_with(text: &str, config: &ParserConfig) -> SectionSet {
    if text.trim().is_empty() {
        return SectionSet::default();
    }

    let decoded = decode_entities_bounded(text, config.max_decode_passes);
    let normalized = normalize_newlines(&decoded);

    let mut sections = SectionSet::default();
    for rule in COMPILED_RULES.iter() {
        if let Some(body) = rule.body(&normalized) {
            *sections.get_mut(rule.kind) =
                decode_entities_bounded(body.trim(), config.max_decode_passes);
        }
    }

    tracing::debug!(
        note_len = text.len(),
        found = SectionKind::ALL
            .iter()
            .filter(|kind| !sections.get(**kind).is_empty())
            .count(),
        "parsed note sections"
    );

    sections
}

/// Locate the Plan body for order extraction. Input must already be decoded.
pub(crate) fn plan_region(text: &str) -> Option<&str> {
    PLAN_REGION.body(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_NOTE: &str = "Chief Complaint: Chest pain\n\
HPI: 3 days of substernal pressure\n\
Review of Systems: Negative except as noted\n\
Physical Exam: RRR, no murmurs\n\
Assessment: Likely stable angina\n\
Plan: 1. CAD\n\
• Lab: Lipid Panel\n\
Care Plan: Low sodium diet\n\
Follow Up: 2 weeks";

    #[test]
    fn canonical_note_splits_between_headers() {
        let sections = parse_note_sections(CANONICAL_NOTE);
        assert_eq!(sections.chief_complaint, "Chest pain");
        assert_eq!(sections.hpi, "3 days of substernal pressure");
        assert_eq!(sections.ros_notes, "Negative except as noted");
        assert_eq!(sections.pe_notes, "RRR, no murmurs");
        assert_eq!(sections.assessment, "Likely stable angina");
        assert_eq!(sections.plan, "1. CAD\n• Lab: Lipid Panel");
        assert_eq!(sections.care_plan, "Low sodium diet");
        assert_eq!(sections.follow_up, "2 weeks");
    }

    #[test]
    fn short_aliases_are_recognized() {
        let note = "CC: Cough\nHPI: dry cough x5d\nROS: no fever\nPE: lungs clear\nA: viral URI\nP: fluids\nCP: rest\nFU: prn";
        let sections = parse_note_sections(note);
        assert_eq!(sections.chief_complaint, "Cough");
        assert_eq!(sections.hpi, "dry cough x5d");
        assert_eq!(sections.ros_notes, "no fever");
        assert_eq!(sections.pe_notes, "lungs clear");
        assert_eq!(sections.assessment, "viral URI");
        assert_eq!(sections.plan, "fluids");
        assert_eq!(sections.care_plan, "rest");
        assert_eq!(sections.follow_up, "prn");
    }

    #[test]
    fn missing_sections_are_empty_strings() {
        let sections = parse_note_sections("HPI: headache since morning");
        assert_eq!(sections.hpi, "headache since morning");
        assert_eq!(sections.chief_complaint, "");
        assert_eq!(sections.plan, "");
        assert_eq!(sections.follow_up, "");
    }

    #[test]
    fn blank_note_yields_empty_set() {
        assert!(parse_note_sections("").is_empty());
        assert!(parse_note_sections("  \n\t\n ").is_empty());
    }

    #[test]
    fn capture_sections_stop_at_blank_line() {
        let sections = parse_note_sections("CC: Cough\n\nFree text after a gap");
        assert_eq!(sections.chief_complaint, "Cough");
    }

    #[test]
    fn early_sections_stop_at_care_plan_and_follow_up() {
        let sections = parse_note_sections("HPI: headache since morning\nFollow Up: 2 weeks");
        assert_eq!(sections.hpi, "headache since morning");
        assert_eq!(sections.follow_up, "2 weeks");

        let sections = parse_note_sections("CC: cough\nCare Plan: rest");
        assert_eq!(sections.chief_complaint, "cough");
        assert_eq!(sections.care_plan, "rest");

        let sections = parse_note_sections("PE: clear\nFU: prn");
        assert_eq!(sections.pe_notes, "clear");

        let sections = parse_note_sections("Assessment: viral URI\nCP: fluids\nFU: prn");
        assert_eq!(sections.assessment, "viral URI");
        assert_eq!(sections.care_plan, "fluids");
    }

    #[test]
    fn blank_line_after_header_is_skipped() {
        let sections = parse_note_sections("Chief Complaint:\n\nChest pain\n\nHPI: 2 days");
        assert_eq!(sections.chief_complaint, "Chest pain");
        assert_eq!(sections.hpi, "2 days");
    }

    #[test]
    fn header_directly_after_empty_header_ends_it() {
        let sections = parse_note_sections("CC:\nHPI: 2 days");
        assert_eq!(sections.chief_complaint, "");
        assert_eq!(sections.hpi, "2 days");

        let sections = parse_note_sections("CC:\n\n\nHPI: 2 days");
        assert_eq!(sections.chief_complaint, "");
    }

    #[test]
    fn assessment_keeps_colons_and_blank_lines() {
        let note = "Assessment: BP: elevated\n\nRule out: secondary causes\nPlan: recheck";
        let sections = parse_note_sections(note);
        assert_eq!(
            sections.assessment,
            "BP: elevated\n\nRule out: secondary causes"
        );
        assert_eq!(sections.plan, "recheck");
    }

    #[test]
    fn plan_prefers_care_plan_boundary_over_follow_up() {
        let note = "Plan: labs\nFollow Up: 1 week\nCare Plan: diet";
        let sections = parse_note_sections(note);
        assert_eq!(sections.plan, "labs\nFollow Up: 1 week");
        assert_eq!(sections.care_plan, "diet");
        assert_eq!(sections.follow_up, "1 week\nCare Plan: diet");
    }

    #[test]
    fn out_of_order_headers_extract_independently() {
        let sections = parse_note_sections("Plan: rest\nAssessment: viral URI");
        assert_eq!(sections.assessment, "viral URI");
        assert_eq!(sections.plan, "rest\nAssessment: viral URI");
    }

    #[test]
    fn aliases_do_not_match_inside_words() {
        let sections = parse_note_sections("Vitals: BP: 120/80\nPlan: recheck in clinic");
        assert_eq!(sections.plan, "recheck in clinic");
        assert_eq!(sections.assessment, "");
    }

    #[test]
    fn section_values_are_entity_decoded() {
        let sections = parse_note_sections("Chief Complaint: Chest pain &amp; SOB");
        assert_eq!(sections.chief_complaint, "Chest pain & SOB");

        let sections = parse_note_sections("PE: BP 140&amp;#x2F;90");
        assert_eq!(sections.pe_notes, "BP 140/90");
    }

    #[test]
    fn crlf_notes_parse_like_lf_notes() {
        let sections = parse_note_sections("CC: Cough\r\nHPI: 2 days\r\n\r\nextra");
        assert_eq!(sections.chief_complaint, "Cough");
        assert_eq!(sections.hpi, "2 days");
    }

    #[test]
    fn plan_region_ends_at_earliest_follow_up_or_care_plan() {
        let text = "Plan: 1. HTN\n- Lab: BMP\n\n2. DM\n- Lab: A1c\nFollow Up: 3 months\nCare Plan: diet";
        assert_eq!(
            plan_region(text),
            Some(" 1. HTN\n- Lab: BMP\n\n2. DM\n- Lab: A1c")
        );
        assert_eq!(plan_region("HPI: none"), None);
    }
}
