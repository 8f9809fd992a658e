use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Value returned to rule bodies by `github.request`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitHubResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: JsonValue,
}
