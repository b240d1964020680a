//! Phiếu y lệnh dạng văn bản thuần.

use std::fmt::Write;

use chartnote_core::{ClinicInfo, ConsolidatedOrderList, OrderCategory, OrderEntry};

const PRINT_ORDER: [(OrderCategory, &str); 5] = [
    (OrderCategory::Lab, "Labs"),
    (OrderCategory::Imaging, "Imaging"),
    (OrderCategory::Prescription, "Prescriptions"),
    (OrderCategory::Referral, "Referrals"),
    (OrderCategory::Order, "Other orders"),
];

const RULE: &str = "========================================";

pub fn render_order_sheet(clinic: &ClinicInfo, list: &ConsolidatedOrderList) -> String {
    let mut out = String::new();
    write_header(&mut out, clinic);

    if list.is_empty() {
        out.push_str("No orders.\n");
        return out;
    }

    let mut visits: Vec<Option<&str>> = Vec::new();
    for entry in list.entries() {
        if !visits.contains(&entry.visit_id()) {
            visits.push(entry.visit_id());
        }
    }

    for visit in visits {
        let _ = writeln!(out, "Visit {}", visit.unwrap_or("(unassigned)"));
        let in_visit: Vec<&OrderEntry> = list
            .entries()
            .iter()
            .filter(|entry| entry.visit_id() == visit)
            .collect();

        for (category, heading) in PRINT_ORDER {
            let items: Vec<&&OrderEntry> = in_visit
                .iter()
                .filter(|entry| entry.category() == category)
                .collect();
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "  {heading}");
            for entry in items {
                let _ = writeln!(out, "    - {}", describe(entry));
            }
        }
    }

    out
}

fn write_header(out: &mut String, clinic: &ClinicInfo) {
    let _ = writeln!(out, "{}", clinic.name);
    for line in clinic.address.lines().filter(|line| !line.trim().is_empty()) {
        let _ = writeln!(out, "{}", line.trim());
    }
    for (label, value) in [("Phone", &clinic.phone), ("Fax", &clinic.fax), ("NPI", &clinic.npi)] {
        if !value.is_empty() {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    let _ = writeln!(out, "{RULE}");
}

fn describe(entry: &OrderEntry) -> String {
    match entry {
        OrderEntry::Virtual(order) if order.diagnosis_name.is_empty() => {
            format!("{} [from note]", order.display_title)
        }
        OrderEntry::Virtual(order) => format!(
            "{} (Dx: {}) [from note]",
            order.display_title, order.diagnosis_name
        ),
        OrderEntry::Real(order) => order.title().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartnote_core::{RealOrder, RealOrderKind, VirtualOrder, VirtualTag};

    #[test]
    fn empty_list_prints_header_only() {
        let clinic = ClinicInfo {
            address: "1 Main St\n\nSpringfield".into(),
            phone: "555-0100".into(),
            ..ClinicInfo::default()
        };
        let sheet = render_order_sheet(&clinic, &ConsolidatedOrderList::default());
        assert_eq!(
            sheet,
            format!("My Practice\n1 Main St\nSpringfield\nPhone: 555-0100\n{RULE}\nNo orders.\n")
        );
    }

    #[test]
    fn groups_orders_by_visit_then_category() {
        let list = ConsolidatedOrderList::new(vec![
            OrderEntry::Real(RealOrder {
                visit_id: Some("7".into()),
                kind: RealOrderKind::Prescription,
                medication_name: Some("Atorvastatin 40mg".into()),
                ..RealOrder::default()
            }),
            OrderEntry::Virtual(VirtualOrder {
                id: "virtual-7-0".into(),
                visit_id: "7".into(),
                kind: VirtualTag::Virtual,
                category: OrderCategory::Lab,
                display_title: "Troponin".into(),
                diagnosis_name: "Stable angina".into(),
                is_virtual: true,
            }),
        ]);

        let sheet = render_order_sheet(&ClinicInfo::default(), &list);
        let body = sheet.split_once(RULE).map(|(_, body)| body).unwrap_or_default();
        assert_eq!(
            body,
            "\nVisit 7\n  Labs\n    - Troponin (Dx: Stable angina) [from note]\n  Prescriptions\n    - Atorvastatin 40mg\n"
        );
    }
}
