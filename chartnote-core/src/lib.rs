//! Mô hình dữ liệu lõi cho việc phân tích ghi chú lâm sàng.
//!
//! Crate này chỉ chứa kiểu dữ liệu, cấu hình và lỗi; toàn bộ logic phân tích
//! nằm ở `chartnote-parser`.

mod order;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use order::{
    ConsolidatedOrderList, OrderCategory, OrderEntry, OrderPayload, RealOrder, RealOrderKind,
    VirtualOrder, VirtualTag,
};

/// Nhãn chẩn đoán gán cho y lệnh mồ côi khi dùng `OrphanOrderPolicy::GeneralBucket`.
pub const GENERAL_DIAGNOSIS: &str = "General";

/// Số vòng giải mã entity mặc định.
pub const DEFAULT_DECODE_PASSES: u8 = 4;

/// Cấu hình bộ phân tích ghi chú.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParserConfig {
    /// Số vòng giải mã HTML entity tối đa (0 được hiểu là 1).
    pub max_decode_passes: u8,
    /// Cách xử lý dòng y lệnh xuất hiện trước tiêu đề chẩn đoán đầu tiên.
    pub orphan_orders: OrphanOrderPolicy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_decode_passes: DEFAULT_DECODE_PASSES,
            orphan_orders: OrphanOrderPolicy::Drop,
        }
    }
}

/// Chính sách cho y lệnh đứng trước mọi chẩn đoán trong phần Plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrphanOrderPolicy {
    /// Bỏ qua (hành vi gốc).
    #[default]
    Drop,
    /// Gom vào chẩn đoán giả `"General"`.
    GeneralBucket,
}

/// Tám phần chuẩn của một ghi chú khám, theo thứ tự xuất hiện thông thường.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ChiefComplaint,
    Hpi,
    Ros,
    PhysicalExam,
    Assessment,
    Plan,
    CarePlan,
    FollowUp,
}

impl SectionKind {
    pub const ALL: [SectionKind; 8] = [
        SectionKind::ChiefComplaint,
        SectionKind::Hpi,
        SectionKind::Ros,
        SectionKind::PhysicalExam,
        SectionKind::Assessment,
        SectionKind::Plan,
        SectionKind::CarePlan,
        SectionKind::FollowUp,
    ];

    /// Các tiêu đề được nhận diện (không phân biệt hoa thường), tên dài trước.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            SectionKind::ChiefComplaint => &["Chief Complaint", "CC"],
            SectionKind::Hpi => &["History of Present Illness", "HPI"],
            SectionKind::Ros => &["Review of Systems", "ROS"],
            SectionKind::PhysicalExam => &["Physical Exam", "PE"],
            SectionKind::Assessment => &["Assessment", "A"],
            SectionKind::Plan => &["Plan", "P"],
            SectionKind::CarePlan => &["Care Plan", "CP"],
            SectionKind::FollowUp => &["Follow Up", "FU"],
        }
    }

    /// Tiêu đề dùng khi ghép lại ghi chú.
    pub fn canonical_header(self) -> &'static str {
        match self {
            SectionKind::ChiefComplaint => "Chief Complaint",
            SectionKind::Hpi => "HPI",
            SectionKind::Ros => "Review of Systems",
            SectionKind::PhysicalExam => "Physical Exam",
            SectionKind::Assessment => "Assessment",
            SectionKind::Plan => "Plan",
            SectionKind::CarePlan => "Care Plan",
            SectionKind::FollowUp => "Follow Up",
        }
    }
}

/// Kết quả tách phần của một ghi chú. Trường vắng mặt luôn là chuỗi rỗng.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionSet {
    pub chief_complaint: String,
    pub hpi: String,
    pub ros_notes: String,
    pub pe_notes: String,
    pub assessment: String,
    pub plan: String,
    pub care_plan: String,
    pub follow_up: String,
}

impl SectionSet {
    pub fn get(&self, kind: SectionKind) -> &str {
        match kind {
            SectionKind::ChiefComplaint => &self.chief_complaint,
            SectionKind::Hpi => &self.hpi,
            SectionKind::Ros => &self.ros_notes,
            SectionKind::PhysicalExam => &self.pe_notes,
            SectionKind::Assessment => &self.assessment,
            SectionKind::Plan => &self.plan,
            SectionKind::CarePlan => &self.care_plan,
            SectionKind::FollowUp => &self.follow_up,
        }
    }

    pub fn get_mut(&mut self, kind: SectionKind) -> &mut String {
        match kind {
            SectionKind::ChiefComplaint => &mut self.chief_complaint,
            SectionKind::Hpi => &mut self.hpi,
            SectionKind::Ros => &mut self.ros_notes,
            SectionKind::PhysicalExam => &mut self.pe_notes,
            SectionKind::Assessment => &mut self.assessment,
            SectionKind::Plan => &mut self.plan,
            SectionKind::CarePlan => &mut self.care_plan,
            SectionKind::FollowUp => &mut self.follow_up,
        }
    }

    /// `true` khi không có phần nào được trích xuất.
    pub fn is_empty(&self) -> bool {
        SectionKind::ALL.iter().all(|kind| self.get(*kind).is_empty())
    }
}

/// Một chẩn đoán trong phần Plan cùng các y lệnh đi kèm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredPlanEntry {
    pub diagnosis: String,
    pub orders: Vec<String>,
}

impl StructuredPlanEntry {
    pub fn new(diagnosis: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            orders: Vec::new(),
        }
    }
}

/// Ghi chú đã phân tích đầy đủ: các phần và Plan có cấu trúc.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ParsedNote {
    pub sections: SectionSet,
    pub plan: Vec<StructuredPlanEntry>,
}

/// Nội dung ghi chú thô, đã ép về chuỗi.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawNote(String);

impl RawNote {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for RawNote {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RawNote {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<Option<&str>> for RawNote {
    fn from(value: Option<&str>) -> Self {
        Self(value.unwrap_or_default().to_string())
    }
}

impl From<&Value> for RawNote {
    /// `null` thành chuỗi rỗng, chuỗi giữ nguyên, giá trị khác thành JSON rút gọn.
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self(String::new()),
            Value::String(text) => Self(text.clone()),
            other => Self(other.to_string()),
        }
    }
}

/// Bản ghi ghi chú của một lần khám (do kho hồ sơ cung cấp).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitNote {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(alias = "visitId", deserialize_with = "deserialize_id")]
    pub visit_id: String,
    #[serde(default, alias = "noteText", alias = "note_draft")]
    pub note_text: Value,
    #[serde(default, alias = "createdAt", deserialize_with = "deserialize_opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl VisitNote {
    pub fn raw_note(&self) -> RawNote {
        RawNote::from(&self.note_text)
    }
}

/// Thông tin phòng khám cho phần đầu trang in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClinicInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub logo: Option<String>,
    pub npi: String,
    pub fax: String,
    pub email: String,
}

impl Default for ClinicInfo {
    fn default() -> Self {
        Self {
            name: "My Practice".to_string(),
            address: String::new(),
            phone: String::new(),
            logo: None,
            npi: String::new(),
            fax: String::new(),
            email: String::new(),
        }
    }
}

/// Lỗi tại ranh giới JSON (CLI, WASM).
#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for NoteError {
    fn from(err: serde_json::Error) -> Self {
        NoteError::Parse(err.to_string())
    }
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Mã định danh có thể là chuỗi hoặc số; luôn chuẩn hóa thành chuỗi.
pub(crate) fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(id_from_value))
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(value).ok_or_else(|| serde::de::Error::custom("thiếu mã định danh"))
}

/// Mốc thời gian RFC 3339 hoặc dạng `YYYY-MM-DD HH:MM:SS` (mặc định UTC).
/// Giá trị không đọc được trả về `None` thay vì lỗi.
pub(crate) fn deserialize_opt_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
