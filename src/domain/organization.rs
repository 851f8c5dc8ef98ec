use serde::{Deserialize, Serialize};

pub type OrganizationId = u32;

/// A penalty recipient.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Connected payout account; without one the penalty is retained in full.
    pub payout_destination: Option<String>,
}
