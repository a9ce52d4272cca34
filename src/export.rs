//! CSV export of deliveries
//!
//! Starts with a byte order mark, otherwise Excel does not pick up UTF-8

use chrono::NaiveDateTime;

use crate::deliveries::Delivery;

/// Byte order mark for UTF-8
const BYTE_ORDER_MARK: &str = "\u{FEFF}";

/// Header row, one column per exported field
const HEADER: [&str; 10] = [
    "ID",
    "Status",
    "From",
    "To",
    "Items",
    "Received",
    "Received at",
    "Received by",
    "Note",
    "Created at",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write all deliveries as CSV, in the given order
pub fn deliveries_to_csv(deliveries: &[Delivery]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(BYTE_ORDER_MARK.as_bytes().to_vec());

    writer.write_record(HEADER)?;

    for delivery in deliveries {
        writer.write_record([
            delivery.id.to_string(),
            delivery.status.as_str().to_string(),
            delivery.from_branch.clone(),
            delivery.to_branch.clone(),
            delivery.items_summary(),
            if delivery.is_received() { "yes" } else { "no" }.to_string(),
            delivery.received_at.map(format_timestamp).unwrap_or_default(),
            delivery.received_by.clone().unwrap_or_default(),
            delivery.note.clone().unwrap_or_default(),
            format_timestamp(delivery.created_at),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::deliveries::Item;
    use crate::deliveries::Status;

    use super::*;

    fn timestamp(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn delivery() -> Delivery {
        Delivery {
            id: "20240615-001".parse().unwrap(),
            date: "2024-06-15".to_string(),
            from_branch: "HQ".to_string(),
            to_branch: "Site-A".to_string(),
            kind: "note".to_string(),
            items: vec![
                Item {
                    name: "WidgetX".to_string(),
                    quantity: 3,
                },
                Item {
                    name: "Gadget".to_string(),
                    quantity: 1,
                },
            ],
            status: Status::Sent,
            note: None,
            created_at: timestamp(9),
            received_at: None,
            received_by: None,
        }
    }

    #[test]
    fn test_empty_export() {
        let csv = String::from_utf8(deliveries_to_csv(&[]).unwrap()).unwrap();

        assert!(csv.starts_with(BYTE_ORDER_MARK));
        assert_eq!(
            "ID,Status,From,To,Items,Received,Received at,Received by,Note,Created at",
            csv.trim_start_matches(BYTE_ORDER_MARK).trim_end()
        );
    }

    #[test]
    fn test_export_rows() {
        let sent = delivery();

        let mut received = delivery();
        received.id = "20240615-002".parse().unwrap();
        received.status = Status::Received;
        received.received_at = Some(timestamp(15));
        received.received_by = Some("Tanaka".to_string());
        received.note = Some("Fragile, \"handle with care\"".to_string());

        let csv = String::from_utf8(deliveries_to_csv(&[received, sent]).unwrap()).unwrap();
        let lines = csv.lines().collect::<Vec<&str>>();

        assert_eq!(3, lines.len());
        assert_eq!(
            "20240615-002,received,HQ,Site-A,WidgetX(3); Gadget(1),yes,2024-06-15 15:00:00,Tanaka,\"Fragile, \"\"handle with care\"\"\",2024-06-15 09:00:00",
            lines[1]
        );
        assert_eq!(
            "20240615-001,sent,HQ,Site-A,WidgetX(3); Gadget(1),no,,,,2024-06-15 09:00:00",
            lines[2]
        );
    }
}
