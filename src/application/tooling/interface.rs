use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolInvokeError;

/// A decoded `tools/list` result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolListing {
    pub tools: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Whatever the tool server answered when asked for its catalogue.
///
/// Servers are not trusted to follow the protocol, so the payload is kept
/// either as a decoded [`ToolListing`] or as the raw JSON it arrived as.
#[derive(Debug, Clone, PartialEq)]
pub enum RawToolCatalog {
    Listing(ToolListing),
    Json(Value),
}

impl RawToolCatalog {
    pub fn from_json(value: Value) -> Self {
        match serde_json::from_value::<ToolListing>(value.clone()) {
            Ok(listing) => RawToolCatalog::Listing(listing),
            Err(_) => RawToolCatalog::Json(value),
        }
    }
}

#[async_trait]
pub trait ToolServerClient: Send + Sync {
    fn server_name(&self) -> &str;

    async fn get_available_tools(&self) -> Result<RawToolCatalog, ToolInvokeError>;

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolInvokeError>;

    /// Usage guidance the server sent during initialisation, if any.
    async fn instructions(&self) -> Option<String> {
        None
    }

    /// Returns `true` once after the server announced that its tool list
    /// changed.
    fn take_catalog_changed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_protocol_listing() {
        let raw = RawToolCatalog::from_json(json!({
            "tools": [{"name": "read_query"}],
            "nextCursor": "page-2"
        }));
        let RawToolCatalog::Listing(listing) = raw else {
            panic!("expected listing");
        };
        assert_eq!(listing.tools.len(), 1);
        assert_eq!(listing.next_cursor.as_deref(), Some("page-2"));
    }

    #[test]
    fn keeps_unrecognised_payload_as_json() {
        let raw = RawToolCatalog::from_json(json!({"tools": "none"}));
        assert_eq!(raw, RawToolCatalog::Json(json!({"tools": "none"})));

        let raw = RawToolCatalog::from_json(json!(7));
        assert_eq!(raw, RawToolCatalog::Json(json!(7)));
    }
}
