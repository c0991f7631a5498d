//! CI server API payloads

use serde::{Deserialize, Serialize};

/// CSRF crumb from `GET /crumbIssuer/api/json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crumb {
    pub crumb: String,
    pub crumb_request_field: String,
}
