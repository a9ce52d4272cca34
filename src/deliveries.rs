use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::DeliveryId;

/// Delivery status
///
/// A delivery starts as `Sent` and can only move to `Received`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Created, waiting for the receiving branch
    Sent,

    /// Confirmed by the receiving branch
    Received,
}

impl Status {
    /// Parse a status as used in query strings
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sent" => Some(Self::Sent),
            "received" => Some(Self::Received),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Received => "received",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Item {
    pub name: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub date: String,
    pub from_branch: String,
    pub to_branch: String,
    pub kind: String,
    pub items: Vec<Item>,
    pub status: Status,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub received_at: Option<NaiveDateTime>,
    pub received_by: Option<String>,
}

impl Delivery {
    pub fn is_received(&self) -> bool {
        self.status == Status::Received
    }

    /// Items as a single line, `name(quantity); name(quantity)`
    ///
    /// Used for exports and for searching through items
    pub fn items_summary(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{}({})", item.name, item.quantity))
            .collect::<Vec<String>>()
            .join("; ")
    }

    /// Does the delivery leave from or arrive at the branch?
    pub fn involves_branch(&self, branch: &str) -> bool {
        self.from_branch == branch || self.to_branch == branch
    }
}
