use std::fs;

use chartnote_core::{ParserConfig, VisitNote};
use chartnote_parser::{consolidate_orders_value, parse_note};
use serde_json::{json, Value};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được file mẫu")
}

#[test]
fn visit_note_matches_golden() {
    let note = read_fixture("visit_note.txt");

    let parsed = parse_note(&note, &ParserConfig::default());
    let actual = serde_json::to_value(parsed).expect("Không serialize kết quả");

    let expected: Value =
        serde_json::from_str(&read_fixture("visit_note_parsed.json")).expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn consolidated_orders_match_golden() {
    let note = read_fixture("visit_note.txt");
    let visits = json!([
        { "id": 101, "visit_id": 7, "note_text": note },
        { "id": 102, "visit_id": 8, "note_text": null }
    ]);
    let real: Value =
        serde_json::from_str(&read_fixture("real_orders.json")).expect("Dữ liệu y lệnh không hợp lệ");

    let list = consolidate_orders_value(&real, &visits, &ParserConfig::default())
        .expect("Không gộp được y lệnh");
    let actual = serde_json::to_value(&list).expect("Không serialize danh sách");

    let expected: Value = serde_json::from_str(&read_fixture("consolidated_orders.json"))
        .expect("Golden không hợp lệ");

    assert_eq!(actual, expected);
}

#[test]
fn reparsing_unchanged_note_is_idempotent() {
    let note = read_fixture("visit_note.txt");
    let visit: VisitNote =
        serde_json::from_value(json!({ "visit_id": "7", "note_text": note })).expect("visit");

    let first = consolidate_orders_value(&Value::Null, &json!([visit.clone()]), &ParserConfig::default())
        .expect("first pass");
    let second = consolidate_orders_value(&Value::Null, &json!([visit]), &ParserConfig::default())
        .expect("second pass");

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
}
