//! HTML entity normalization for note bodies that went through rich-text storage.

use std::borrow::Cow;
use std::sync::LazyLock;

use chartnote_core::{RawNote, DEFAULT_DECODE_PASSES};
use regex::{Captures, Regex};
use serde_json::Value;

/// Named entities plus the slash forms, each optionally preceded by any number of
/// `amp;` layers from repeated encoding (`&amp;amp;lt;`, `&amp;#x2F;`).
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:amp;)*(?:amp|lt|gt|quot|#39|#[xX]2[fF]|#47|sol);").expect("valid regex")
});

/// Decode with the default pass budget.
pub fn decode_entities(raw: &str) -> String {
    decode_entities_bounded(raw, DEFAULT_DECODE_PASSES)
}

/// Decode a JSON note value; non-string values are coerced first.
pub fn decode_entities_value(raw: &Value) -> String {
    decode_entities(RawNote::from(raw).as_str())
}

/// Decode entities, repeating until a pass changes nothing or `max_passes` is hit.
pub fn decode_entities_bounded(raw: &str, max_passes: u8) -> String {
    let mut current = raw.to_string();

    for pass in 0..max_passes.max(1) {
        let decoded = ENTITY_RE.replace_all(&current, |caps: &Captures| {
            let entity = &caps[0];
            resolve_entity(entity).map_or_else(|| entity.to_string(), str::to_string)
        });

        if matches!(decoded, Cow::Borrowed(_)) {
            tracing::trace!(pass, "entity decode converged");
            break;
        }

        current = decoded.into_owned();
    }

    current
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    // The innermost name is the last `;`-separated segment.
    let name = entity
        .trim_end_matches(';')
        .rsplit(';')
        .next()?
        .trim_start_matches('&');

    match name.to_ascii_lowercase().as_str() {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "#39" => Some("'"),
        "#x2f" | "#47" | "sol" => Some("/"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_named_entities() {
        assert_eq!(
            decode_entities("Chief Complaint: Chest pain &amp; SOB"),
            "Chief Complaint: Chest pain & SOB"
        );
        assert_eq!(
            decode_entities("&lt;b&gt; &quot;quoted&quot; it&#39;s"),
            "<b> \"quoted\" it's"
        );
    }

    #[test]
    fn decodes_every_slash_form() {
        assert_eq!(decode_entities("BP 120&#x2F;80"), "BP 120/80");
        assert_eq!(decode_entities("BP 120&#X2f;80"), "BP 120/80");
        assert_eq!(decode_entities("01&#47;02&#47;2024"), "01/02/2024");
        assert_eq!(decode_entities("and&sol;or"), "and/or");
        assert_eq!(decode_entities("q6h&amp;#x2F;prn"), "q6h/prn");
    }

    #[test]
    fn unwinds_repeated_encoding() {
        assert_eq!(decode_entities("&amp;amp;amp;lt;"), "<");
        assert_eq!(decode_entities("Tom &amp;amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("&amp;amp;x"), "&x");
    }

    #[test]
    fn leaves_unknown_entities_and_bare_ampersands() {
        assert_eq!(decode_entities("A & B &nbsp; &copy;"), "A & B &nbsp; &copy;");
        assert_eq!(decode_entities("&amp"), "&amp");
    }

    #[test]
    fn decoding_is_idempotent() {
        let samples = [
            "",
            "plain text",
            "&amp;lt;script&amp;gt;",
            "&amp;&amp;lt;",
            "&&amp;amp;;",
            "&amp;#47;&amp;amp;#x2F;&sol;",
            "a &amp;amp;amp;amp;amp;amp;quot; b",
        ];
        for sample in samples {
            let once = decode_entities(sample);
            assert_eq!(decode_entities(&once), once, "input: {sample:?}");
        }
    }

    #[test]
    fn zero_pass_budget_still_runs_once() {
        assert_eq!(decode_entities_bounded("x &amp; y", 0), "x & y");
    }

    #[test]
    fn coerces_non_string_values() {
        assert_eq!(decode_entities_value(&Value::Null), "");
        assert_eq!(decode_entities_value(&json!(12)), "12");
        assert_eq!(decode_entities_value(&json!("a &amp; b")), "a & b");
    }
}
