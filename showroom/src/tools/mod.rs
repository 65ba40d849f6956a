//! Inventory tools: specs offered to the oracle and the executor seam.
//!
//! Agent nodes depend on [`ToolExecutor`] and [`CatalogProvider`] instead of a concrete
//! inventory; [`InMemoryInventory`] implements both over a JSON vehicle list.

mod inventory;

pub use inventory::{InMemoryInventory, InventoryError, Vehicle};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::filters::ALLOWED_FILTERS;

pub const LIST_AVAILABLE_VEHICLE_FILTERS: &str = "list_available_vehicle_filters";
pub const SEARCH_USED_VEHICLES: &str = "search_used_vehicles";
pub const GET_VEHICLE_DETAILS: &str = "get_vehicle_details";
pub const CREATE_EXECUTIVE_CALL_REQUEST: &str = "create_executive_call_request";

/// Tool names the quote agent may call.
pub const QUOTE_TOOL_NAMES: [&str; 3] = [
    LIST_AVAILABLE_VEHICLE_FILTERS,
    SEARCH_USED_VEHICLES,
    GET_VEHICLE_DETAILS,
];

/// Tool names the contact agent may call.
pub const CONTACT_TOOL_NAMES: [&str; 2] = [GET_VEHICLE_DETAILS, CREATE_EXECUTIVE_CALL_REQUEST];

/// Tool specification offered to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
}

/// Errors from executing a tool.
///
/// Tool nodes turn these into `{"ok": false, "error": ...}` payloads; they never abort a turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidInput(String),
    #[error("tool unavailable: {0}")]
    Unavailable(String),
}

/// Executes inventory tools by name.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Runs `name` with a JSON arguments object and returns the JSON payload.
    async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError>;
}

/// One catalog dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
}

/// Filter vocabulary of the inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub countries: Vec<CatalogEntry>,
    pub body_types: Vec<CatalogEntry>,
    pub fuel_types: Vec<CatalogEntry>,
    pub transmission_types: Vec<CatalogEntry>,
    pub drivetrains: Vec<CatalogEntry>,
    pub makes: Vec<String>,
}

impl CatalogMetadata {
    pub fn country_names(&self) -> Vec<String> {
        self.countries.iter().map(|c| c.name.clone()).collect()
    }
}

/// Supplies catalog metadata for directive inference and clarifications.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn metadata(&self) -> Result<CatalogMetadata, ToolError>;
}

/// Masks a phone number for logs: only the last four digits remain visible.
pub fn mask_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() <= 4 {
        return "***".to_string();
    }
    let visible: String = digits[digits.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(digits.len() - 4), visible)
}

fn search_schema() -> Value {
    let mut properties = serde_json::Map::new();
    for key in ALLOWED_FILTERS {
        let kind = match key {
            "make" | "model" | "color" => "string",
            _ => "integer",
        };
        properties.insert(key.to_string(), json!({ "type": kind }));
    }
    json!({ "type": "object", "properties": properties })
}

/// Specs for the quote agent, in a fixed order.
pub fn quote_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: LIST_AVAILABLE_VEHICLE_FILTERS.into(),
            description: Some(
                "List catalog ids (countries, body types, fuel, transmission, drivetrain) and \
                 makes accepted by search_used_vehicles. Call it before searching."
                    .into(),
            ),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolSpec {
            name: SEARCH_USED_VEHICLES.into(),
            description: Some(
                "Search available used vehicles. Ids must come from the catalog. \
                 Results are ordered by year desc, mileage asc, price asc."
                    .into(),
            ),
            input_schema: search_schema(),
        },
        vehicle_details_spec(),
    ]
}

/// Specs for the contact agent, in a fixed order.
pub fn contact_tools() -> Vec<ToolSpec> {
    vec![
        vehicle_details_spec(),
        ToolSpec {
            name: CREATE_EXECUTIVE_CALL_REQUEST.into(),
            description: Some(
                "Register a callback request from a sales executive for one available vehicle."
                    .into(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "vehicle_id": { "type": "integer" },
                    "customer_name": { "type": "string" },
                    "phone_number": { "type": "string" },
                    "preferred_call_time": { "type": "string" }
                },
                "required": ["vehicle_id", "customer_name", "phone_number", "preferred_call_time"]
            }),
        },
    ]
}

fn vehicle_details_spec() -> ToolSpec {
    ToolSpec {
        name: GET_VEHICLE_DETAILS.into(),
        description: Some("Get the full record of one vehicle by id.".into()),
        input_schema: json!({
            "type": "object",
            "properties": { "vehicle_id": { "type": "integer" } },
            "required": ["vehicle_id"]
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_phone_keeps_last_four_digits() {
        assert_eq!(mask_phone("+56 9 4142 5034"), "*******5034");
        assert_eq!(mask_phone("1234"), "***");
        assert_eq!(mask_phone(""), "***");
    }

    /// **Scenario**: Tool sets match the agent tool name lists.
    #[test]
    fn tool_sets_match_names() {
        let quote: Vec<String> = quote_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(quote, QUOTE_TOOL_NAMES);
        let contact: Vec<String> = contact_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(contact, CONTACT_TOOL_NAMES);
    }

    #[test]
    fn search_schema_lists_every_filter() {
        let schema = search_schema();
        let properties = schema["properties"].as_object().unwrap();
        assert_eq!(properties.len(), ALLOWED_FILTERS.len());
        assert_eq!(properties["make"]["type"], "string");
        assert_eq!(properties["country_id"]["type"], "integer");
    }

    #[test]
    fn tool_error_display() {
        assert!(ToolError::NotFound("x".into()).to_string().contains("not found"));
        assert!(ToolError::InvalidInput("bad".into()).to_string().contains("invalid"));
    }
}
