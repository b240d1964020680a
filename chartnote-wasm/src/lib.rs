//! Bridge WASM <-> JavaScript cho bộ phân tích ghi chú, trung lập framework.

use chartnote_core::{OrphanOrderPolicy, ParserConfig, RawNote, SectionSet, StructuredPlanEntry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsParserConfig {
    #[serde(default)]
    max_decode_passes: Option<u8>,
    #[serde(default)]
    orphan_orders: Option<OrphanOrderPolicy>,
}

impl From<JsParserConfig> for ParserConfig {
    fn from(cfg: JsParserConfig) -> Self {
        let mut base = ParserConfig::default();
        if let Some(passes) = cfg.max_decode_passes {
            base.max_decode_passes = passes;
        }
        if let Some(policy) = cfg.orphan_orders {
            base.orphan_orders = policy;
        }
        base
    }
}

fn read_config(config: Option<JsValue>) -> Result<ParserConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsParserConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            Ok(ParserConfig::from(cfg))
        }
        _ => Ok(ParserConfig::default()),
    }
}

/// Ghi chú từ JS có thể là bất kỳ kiểu nào; giá trị không đọc được coi là `null`.
fn read_note(raw: JsValue) -> Value {
    from_value::<Value>(raw).unwrap_or(Value::Null)
}

fn read_text(raw: JsValue) -> String {
    RawNote::from(&read_note(raw)).into_string()
}

fn read_json(raw: JsValue, label: &str) -> Result<Value, JsValue> {
    from_value::<Value>(raw)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được JSON {label}: {err}")))
}

/// Đối tượng thường thay vì `Map` để JS đọc trực tiếp.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

#[wasm_bindgen(js_name = decodeEntities)]
pub fn decode_entities(raw: JsValue) -> String {
    init();
    chartnote_parser::decode_entities_value(&read_note(raw))
}

#[wasm_bindgen(js_name = parseNoteSections)]
pub fn parse_note_sections(raw: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    to_js(&chartnote_parser::parse_note_sections_value(&read_note(raw), &cfg))
}

#[wasm_bindgen(js_name = parseNote)]
pub fn parse_note(raw: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    to_js(&chartnote_parser::parse_note_value(&read_note(raw), &cfg))
}

#[wasm_bindgen(js_name = parsePlanOutline)]
pub fn parse_plan_outline(plan: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    to_js(&chartnote_parser::parse_plan_outline_with(&read_text(plan), &cfg))
}

#[wasm_bindgen(js_name = extractVirtualOrders)]
pub fn extract_virtual_orders(
    note: JsValue,
    visit_id: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    let orders =
        chartnote_parser::extract_virtual_orders_with(&read_text(note), &read_text(visit_id), &cfg);
    to_js(&orders)
}

#[wasm_bindgen(js_name = dedupeOrders)]
pub fn dedupe_orders(orders: JsValue) -> Result<JsValue, JsValue> {
    init();
    let value = read_json(orders, "orders")?;
    let kept = chartnote_parser::dedupe_orders_value(&value)
        .map_err(|err| JsValue::from_str(&format!("Note error: {err}")))?;
    to_js(&kept)
}

#[wasm_bindgen(js_name = consolidateOrders)]
pub fn consolidate_orders(
    real_orders: JsValue,
    visits: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    init();
    let cfg = read_config(config)?;
    let real = read_json(real_orders, "real orders")?;
    let visits = read_json(visits, "visits")?;
    let list = chartnote_parser::consolidate_orders_value(&real, &visits, &cfg)
        .map_err(|err| JsValue::from_str(&format!("Note error: {err}")))?;
    to_js(&list)
}

#[wasm_bindgen(js_name = composeNote)]
pub fn compose_note(sections: JsValue, structured_plan: Option<JsValue>) -> Result<String, JsValue> {
    init();
    let sections: SectionSet = from_value(sections)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được sections: {err}")))?;
    let plan: Option<Vec<StructuredPlanEntry>> = match structured_plan {
        Some(js_plan) if !js_plan.is_undefined() && !js_plan.is_null() => Some(
            from_value(js_plan)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được plan: {err}")))?,
        ),
        _ => None,
    };
    Ok(chartnote_parser::compose_note(&sections, plan.as_deref()))
}
