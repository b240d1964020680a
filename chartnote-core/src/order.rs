//! Y lệnh: y lệnh ảo suy ra từ ghi chú và y lệnh thật từ các phân hệ khác.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{deserialize_id, deserialize_opt_id, deserialize_opt_timestamp};

/// Nhóm y lệnh dùng cho hiển thị và in ấn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderCategory {
    Lab,
    Imaging,
    Referral,
    Prescription,
    Order,
}

impl OrderCategory {
    /// Nhận diện nhãn loại y lệnh (`"lab"`, `"Imaging"`...). Nhãn lạ trả về `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "lab" => Some(OrderCategory::Lab),
            "imaging" => Some(OrderCategory::Imaging),
            "referral" => Some(OrderCategory::Referral),
            "prescription" => Some(OrderCategory::Prescription),
            "order" => Some(OrderCategory::Order),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderCategory::Lab => "lab",
            OrderCategory::Imaging => "imaging",
            OrderCategory::Referral => "referral",
            OrderCategory::Prescription => "prescription",
            OrderCategory::Order => "order",
        }
    }
}

/// Dấu `type: "virtual"`; từ chối mọi giá trị khác khi đọc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum VirtualTag {
    #[default]
    #[serde(rename = "virtual")]
    Virtual,
}

/// Y lệnh suy ra từ nội dung Plan của ghi chú. Không lưu trữ.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualOrder {
    pub id: String,
    #[serde(alias = "visitId", deserialize_with = "deserialize_id")]
    pub visit_id: String,
    #[serde(rename = "type")]
    pub kind: VirtualTag,
    pub category: OrderCategory,
    #[serde(alias = "displayTitle")]
    pub display_title: String,
    #[serde(default, alias = "diagnosisName")]
    pub diagnosis_name: String,
    #[serde(alias = "isVirtual")]
    pub is_virtual: bool,
}

/// Nguồn của y lệnh thật. Nhãn lạ giữ nguyên trong `Other`, riêng `"virtual"` bị từ chối.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum RealOrderKind {
    #[default]
    Order,
    Referral,
    Prescription,
    Other(String),
}

impl TryFrom<String> for RealOrderKind {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        match tag.as_str() {
            "order" => Ok(RealOrderKind::Order),
            "referral" => Ok(RealOrderKind::Referral),
            "prescription" => Ok(RealOrderKind::Prescription),
            "virtual" => Err("y lệnh thật không được mang type \"virtual\"".to_string()),
            _ => Ok(RealOrderKind::Other(tag)),
        }
    }
}

impl From<RealOrderKind> for String {
    fn from(kind: RealOrderKind) -> Self {
        match kind {
            RealOrderKind::Order => "order".to_string(),
            RealOrderKind::Referral => "referral".to_string(),
            RealOrderKind::Prescription => "prescription".to_string(),
            RealOrderKind::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OrderPayload {
    #[serde(default, alias = "testName", skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Y lệnh thật (xét nghiệm, chẩn đoán hình ảnh, chuyển viện, đơn thuốc).
/// Chỉ đọc; các trường không nhận diện được giữ nguyên trong `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RealOrder {
    #[serde(default, deserialize_with = "deserialize_opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        alias = "visitId",
        deserialize_with = "deserialize_opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub visit_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: RealOrderKind,
    #[serde(default, alias = "orderType", skip_serializing_if = "Option::is_none")]
    pub order_type: Option<String>,
    #[serde(default, alias = "medicationName", skip_serializing_if = "Option::is_none")]
    pub medication_name: Option<String>,
    #[serde(default, alias = "orderPayload", skip_serializing_if = "Option::is_none")]
    pub order_payload: Option<OrderPayload>,
    #[serde(default, alias = "recipientSpecialty", skip_serializing_if = "Option::is_none")]
    pub recipient_specialty: Option<String>,
    /// Mốc thời gian không đọc được coi như vắng mặt.
    #[serde(
        default,
        alias = "createdAt",
        deserialize_with = "deserialize_opt_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RealOrder {
    /// Nhóm hiển thị: chuyển viện và đơn thuốc cố định, y lệnh chung theo `order_type`.
    /// Nhãn `type` lạ được thử như tên nhóm trước khi xét `order_type`.
    pub fn category(&self) -> OrderCategory {
        let by_order_type = || self.order_type.as_deref().and_then(OrderCategory::from_label);
        match &self.kind {
            RealOrderKind::Referral => OrderCategory::Referral,
            RealOrderKind::Prescription => OrderCategory::Prescription,
            RealOrderKind::Order => by_order_type().unwrap_or(OrderCategory::Order),
            RealOrderKind::Other(tag) => OrderCategory::from_label(tag)
                .or_else(by_order_type)
                .unwrap_or(OrderCategory::Order),
        }
    }

    /// Các trường mô tả dùng để so khớp với y lệnh ảo. Trường vắng mặt bị bỏ qua.
    pub fn descriptive_fields(&self) -> impl Iterator<Item = &str> {
        let payload = self.order_payload.as_ref();
        [
            self.medication_name.as_deref(),
            payload.and_then(|p| p.test_name.as_deref()),
            payload.and_then(|p| p.name.as_deref()),
            self.recipient_specialty.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Tiêu đề hiển thị, theo thứ tự ưu tiên của trang in.
    pub fn title(&self) -> &str {
        let payload = self.order_payload.as_ref();
        let preferred = match &self.kind {
            RealOrderKind::Prescription => self.medication_name.as_deref(),
            RealOrderKind::Referral => self.recipient_specialty.as_deref(),
            RealOrderKind::Order | RealOrderKind::Other(_) => payload
                .and_then(|p| p.test_name.as_deref())
                .or_else(|| payload.and_then(|p| p.name.as_deref())),
        };
        preferred
            .or_else(|| self.descriptive_fields().next())
            .unwrap_or("Untitled Order")
    }
}

/// Một phần tử trong danh sách y lệnh hợp nhất; phân biệt bằng trường `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OrderEntry {
    Virtual(VirtualOrder),
    Real(RealOrder),
}

impl OrderEntry {
    pub fn visit_id(&self) -> Option<&str> {
        match self {
            OrderEntry::Virtual(order) => Some(&order.visit_id),
            OrderEntry::Real(order) => order.visit_id.as_deref(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, OrderEntry::Virtual(_))
    }

    pub fn category(&self) -> OrderCategory {
        match self {
            OrderEntry::Virtual(order) => order.category,
            OrderEntry::Real(order) => order.category(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            OrderEntry::Virtual(order) => &order.display_title,
            OrderEntry::Real(order) => order.title(),
        }
    }
}

impl From<VirtualOrder> for OrderEntry {
    fn from(order: VirtualOrder) -> Self {
        OrderEntry::Virtual(order)
    }
}

impl From<RealOrder> for OrderEntry {
    fn from(order: RealOrder) -> Self {
        OrderEntry::Real(order)
    }
}

/// Danh sách y lệnh sau khi gộp và loại trùng.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct ConsolidatedOrderList {
    entries: Vec<OrderEntry>,
}

impl ConsolidatedOrderList {
    pub fn new(entries: Vec<OrderEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Y lệnh của một lần khám, giữ nguyên thứ tự.
    pub fn for_visit<'a>(&'a self, visit_id: &'a str) -> impl Iterator<Item = &'a OrderEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.visit_id() == Some(visit_id))
    }

    /// Gom theo nhóm y lệnh; mỗi nhóm giữ nguyên thứ tự xuất hiện.
    pub fn by_category(&self) -> BTreeMap<OrderCategory, Vec<&OrderEntry>> {
        let mut groups: BTreeMap<OrderCategory, Vec<&OrderEntry>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.category()).or_default().push(entry);
        }
        groups
    }
}
