//! Gateway HTTP wire types.

use serde::{Deserialize, Serialize};

/// Slack interaction request body (`application/x-www-form-urlencoded`): one `payload` field
/// holding the interaction JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

/// `GET /` health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub runtime: String,
    pub port: u16,
    /// Number of entries in the routing table.
    pub routes: usize,
}
