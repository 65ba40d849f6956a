//! In-memory vehicle inventory implementing the four inventory tools.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{
    mask_phone, CatalogEntry, CatalogMetadata, CatalogProvider, ToolError, ToolExecutor,
    CREATE_EXECUTIVE_CALL_REQUEST, GET_VEHICLE_DETAILS, LIST_AVAILABLE_VEHICLE_FILTERS,
    SEARCH_USED_VEHICLES,
};
use crate::filters::{safe_int, ALLOWED_FILTERS, DEFAULT_SEARCH_LIMIT};

const DEMO_INVENTORY: &str = include_str!("../../data/demo_inventory.json");

const MIN_PHONE_DIGITS: usize = 8;

/// One inventory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub country_id: i64,
    pub country_of_origin: String,
    pub body_type_id: i64,
    pub body_type: String,
    pub transmission_type_id: i64,
    pub transmission_type: String,
    pub fuel_type_id: i64,
    pub fuel_type: String,
    pub drivetrain_id: i64,
    pub drivetrain: String,
    pub year: i64,
    pub make: String,
    pub model: String,
    pub mileage_km: i64,
    pub price_usd: i64,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub number_of_doors: Option<i64>,
    #[serde(default = "available_by_default")]
    pub is_available: bool,
}

fn available_by_default() -> bool {
    true
}

/// Errors loading an inventory file.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("read inventory: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse inventory: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CallbackRequest {
    id: i64,
    vehicle_id: i64,
    customer_name: String,
    phone_number: String,
    preferred_call_time: String,
}

/// Vehicle list plus registered callback requests.
#[derive(Debug)]
pub struct InMemoryInventory {
    vehicles: Vec<Vehicle>,
    requests: Mutex<Vec<CallbackRequest>>,
}

impl InMemoryInventory {
    pub fn new(vehicles: Vec<Vehicle>) -> Self {
        Self {
            vehicles,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Parses a JSON array of vehicles.
    pub fn from_json_str(raw: &str) -> Result<Self, InventoryError> {
        Ok(Self::new(serde_json::from_str(raw)?))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InventoryError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Bundled demo inventory.
    pub fn demo() -> Result<Self, InventoryError> {
        Self::from_json_str(DEMO_INVENTORY)
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    fn catalog(&self) -> CatalogMetadata {
        fn entries(pairs: impl Iterator<Item = (i64, String)>) -> Vec<CatalogEntry> {
            let unique: BTreeMap<i64, String> = pairs.collect();
            let mut list: Vec<CatalogEntry> = unique
                .into_iter()
                .map(|(id, name)| CatalogEntry { id, name })
                .collect();
            list.sort_by(|a, b| a.name.cmp(&b.name));
            list
        }
        let rows = || self.vehicles.iter();
        CatalogMetadata {
            countries: entries(rows().map(|v| (v.country_id, v.country_of_origin.clone()))),
            body_types: entries(rows().map(|v| (v.body_type_id, v.body_type.clone()))),
            fuel_types: entries(rows().map(|v| (v.fuel_type_id, v.fuel_type.clone()))),
            transmission_types: entries(
                rows().map(|v| (v.transmission_type_id, v.transmission_type.clone())),
            ),
            drivetrains: entries(rows().map(|v| (v.drivetrain_id, v.drivetrain.clone()))),
            makes: rows()
                .map(|v| v.make.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        }
    }

    fn list_filters(&self) -> Value {
        let mut allowed: Vec<&str> = ALLOWED_FILTERS.to_vec();
        allowed.sort_unstable();
        json!({
            "allowed_filters": allowed,
            "catalog": self.catalog(),
            "notes": {
                "ids": "country_id, body_type_id, fuel_type_id, transmission_type_id and drivetrain_id must come from this catalog.",
                "year": "Use year_min and year_max for model year ranges.",
                "mileage": "Use mileage_km_min and mileage_km_max in kilometers.",
                "price": "Use price_usd_min and price_usd_max in USD.",
                "limit": "Recommended 3 to 8",
                "workflow": "Call this tool first, pick IDs from catalog, then run search."
            }
        })
    }

    fn search(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let mut filters_used = Map::new();
        let mut int_filter = |key: &str| -> Result<Option<i64>, ToolError> {
            match args.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(raw) => {
                    let value = safe_int(raw)
                        .ok_or_else(|| ToolError::InvalidInput(format!("{key} must be an integer")))?;
                    filters_used.insert(key.to_string(), json!(value));
                    Ok(Some(value))
                }
            }
        };
        let country_id = int_filter("country_id")?;
        let body_type_id = int_filter("body_type_id")?;
        let transmission_type_id = int_filter("transmission_type_id")?;
        let fuel_type_id = int_filter("fuel_type_id")?;
        let drivetrain_id = int_filter("drivetrain_id")?;
        let year_min = int_filter("year_min")?;
        let year_max = int_filter("year_max")?;
        let mileage_min = int_filter("mileage_km_min")?;
        let mileage_max = int_filter("mileage_km_max")?;
        let doors = int_filter("number_of_doors")?;
        let price_min = int_filter("price_usd_min")?;
        let price_max = int_filter("price_usd_max")?;
        let limit = int_filter("limit")?
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, 10);
        filters_used.insert("limit".into(), json!(limit));

        let mut text_filter = |key: &str| -> Option<String> {
            let value = args.get(key)?.as_str()?.trim().to_string();
            if value.is_empty() {
                return None;
            }
            filters_used.insert(key.to_string(), json!(value));
            Some(value.to_lowercase())
        };
        let make = text_filter("make");
        let model = text_filter("model");
        let color = text_filter("color");

        let matches_id = |wanted: Option<i64>, actual: i64| wanted.map_or(true, |w| w == actual);
        let mut rows: Vec<&Vehicle> = self
            .vehicles
            .iter()
            .filter(|v| v.is_available)
            .filter(|v| matches_id(country_id, v.country_id))
            .filter(|v| matches_id(body_type_id, v.body_type_id))
            .filter(|v| matches_id(transmission_type_id, v.transmission_type_id))
            .filter(|v| matches_id(fuel_type_id, v.fuel_type_id))
            .filter(|v| matches_id(drivetrain_id, v.drivetrain_id))
            .filter(|v| year_min.map_or(true, |y| v.year >= y))
            .filter(|v| year_max.map_or(true, |y| v.year <= y))
            .filter(|v| mileage_min.map_or(true, |m| v.mileage_km >= m))
            .filter(|v| mileage_max.map_or(true, |m| v.mileage_km <= m))
            .filter(|v| price_min.map_or(true, |p| v.price_usd >= p))
            .filter(|v| price_max.map_or(true, |p| v.price_usd <= p))
            .filter(|v| doors.map_or(true, |d| v.number_of_doors == Some(d)))
            .filter(|v| make.as_ref().map_or(true, |m| v.make.to_lowercase() == *m))
            .filter(|v| {
                model
                    .as_ref()
                    .map_or(true, |m| v.model.to_lowercase().contains(m.as_str()))
            })
            .filter(|v| color.as_ref().map_or(true, |c| v.color.to_lowercase() == *c))
            .collect();
        rows.sort_by(|a, b| {
            b.year
                .cmp(&a.year)
                .then(a.mileage_km.cmp(&b.mileage_km))
                .then(a.price_usd.cmp(&b.price_usd))
        });
        rows.truncate(limit as usize);

        let vehicles: Vec<Value> = rows.into_iter().map(search_row).collect();
        Ok(json!({
            "count": vehicles.len(),
            "filters_used": filters_used,
            "vehicles": vehicles,
        }))
    }

    fn details(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let id = args
            .get("vehicle_id")
            .and_then(safe_int)
            .ok_or_else(|| ToolError::InvalidInput("vehicle_id must be an integer".into()))?;
        Ok(match self.vehicles.iter().find(|v| v.id == id) {
            Some(vehicle) => json!({ "found": true, "vehicle": vehicle }),
            None => json!({ "found": false, "message": format!("Vehicle ID {id} not found.") }),
        })
    }

    async fn create_request(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        let vehicle_id = args
            .get("vehicle_id")
            .and_then(safe_int)
            .ok_or_else(|| ToolError::InvalidInput("vehicle_id must be an integer".into()))?;
        let text = |key: &str| {
            args.get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let customer_name = text("customer_name");
        let preferred_call_time = text("preferred_call_time");
        let phone_number: String = text("phone_number")
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();

        let rejected = |error: String| Ok(json!({ "ok": false, "error": error }));
        match self.vehicles.iter().find(|v| v.id == vehicle_id) {
            None => return rejected(format!("Vehicle ID {vehicle_id} does not exist.")),
            Some(v) if !v.is_available => {
                return rejected(format!("Vehicle ID {vehicle_id} is not available."))
            }
            Some(_) => {}
        }
        if customer_name.is_empty() {
            return rejected("customer_name is required.".into());
        }
        if phone_number.chars().filter(char::is_ascii_digit).count() < MIN_PHONE_DIGITS {
            return rejected("Invalid phone number. Provide at least 8 digits.".into());
        }
        if preferred_call_time.is_empty() {
            return rejected("preferred_call_time is required.".into());
        }

        let mut requests = self.requests.lock().await;
        let existing = requests.iter().find(|r| {
            r.vehicle_id == vehicle_id
                && r.customer_name == customer_name
                && r.phone_number == phone_number
                && r.preferred_call_time == preferred_call_time
        });
        let (request_id, created) = match existing {
            Some(request) => (request.id, false),
            None => {
                let id = requests.len() as i64 + 1;
                requests.push(CallbackRequest {
                    id,
                    vehicle_id,
                    customer_name: customer_name.clone(),
                    phone_number: phone_number.clone(),
                    preferred_call_time: preferred_call_time.clone(),
                });
                (id, true)
            }
        };
        tracing::info!(
            request_id,
            vehicle_id,
            created,
            phone = %mask_phone(&phone_number),
            "callback request registered"
        );

        Ok(json!({
            "ok": true,
            "created": created,
            "request_id": request_id,
            "vehicle_id": vehicle_id,
            "customer_name": customer_name,
            "phone_number": phone_number,
            "preferred_call_time": preferred_call_time,
            "message": if created {
                "Callback request created successfully."
            } else {
                "Duplicate callback request detected; existing request reused."
            },
        }))
    }
}

fn search_row(v: &Vehicle) -> Value {
    json!({
        "id": v.id,
        "country_id": v.country_id,
        "body_type_id": v.body_type_id,
        "transmission_type_id": v.transmission_type_id,
        "fuel_type_id": v.fuel_type_id,
        "drivetrain_id": v.drivetrain_id,
        "year": v.year,
        "make": v.make,
        "model": v.model,
        "mileage_km": v.mileage_km,
        "price_usd": v.price_usd,
        "fuel_type": v.fuel_type,
        "transmission_type": v.transmission_type,
        "drivetrain": v.drivetrain,
        "body_type": v.body_type,
        "country_of_origin": v.country_of_origin,
    })
}

#[async_trait]
impl ToolExecutor for InMemoryInventory {
    async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let started = Instant::now();
        let args = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ToolError::InvalidInput(format!(
                    "arguments must be an object, got {other}"
                )))
            }
        };
        let result = match name {
            LIST_AVAILABLE_VEHICLE_FILTERS => Ok(self.list_filters()),
            SEARCH_USED_VEHICLES => self.search(&args),
            GET_VEHICLE_DETAILS => self.details(&args),
            CREATE_EXECUTIVE_CALL_REQUEST => self.create_request(&args).await,
            other => Err(ToolError::NotFound(other.to_string())),
        };
        tracing::debug!(
            tool = name,
            duration_ms = started.elapsed().as_millis() as u64,
            status = if result.is_ok() { "ok" } else { "error" },
            "tool executed"
        );
        result
    }
}

#[async_trait]
impl CatalogProvider for InMemoryInventory {
    async fn metadata(&self) -> Result<CatalogMetadata, ToolError> {
        Ok(self.catalog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> InMemoryInventory {
        InMemoryInventory::demo().expect("demo inventory parses")
    }

    #[tokio::test]
    async fn catalog_lists_sorted_dimensions() {
        let inv = inventory();
        let payload = inv
            .execute(LIST_AVAILABLE_VEHICLE_FILTERS, json!({}))
            .await
            .unwrap();
        let countries = payload["catalog"]["countries"].as_array().unwrap();
        assert!(!countries.is_empty());
        let names: Vec<&str> = countries.iter().map(|c| c["name"].as_str().unwrap()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(payload["notes"]["limit"], "Recommended 3 to 8");
        assert_eq!(payload["allowed_filters"].as_array().unwrap().len(), 16);
    }

    /// **Scenario**: Search honors filters, ordering and the limit clamp.
    #[tokio::test]
    async fn search_orders_and_clamps() {
        let inv = inventory();
        let payload = inv
            .execute(SEARCH_USED_VEHICLES, json!({"limit": 50}))
            .await
            .unwrap();
        let rows = payload["vehicles"].as_array().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(payload["filters_used"]["limit"], 10);
        let years: Vec<i64> = rows.iter().map(|r| r["year"].as_i64().unwrap()).collect();
        assert!(years.windows(2).all(|w| w[0] >= w[1]));

        let audi = inv
            .execute(SEARCH_USED_VEHICLES, json!({"make": "audi", "mileage_km_max": 100000}))
            .await
            .unwrap();
        for row in audi["vehicles"].as_array().unwrap() {
            assert_eq!(row["make"], "Audi");
            assert!(row["mileage_km"].as_i64().unwrap() <= 100_000);
        }
        assert_eq!(audi["filters_used"]["make"], "audi");
    }

    #[tokio::test]
    async fn search_rejects_non_numeric_ids() {
        let err = inventory()
            .execute(SEARCH_USED_VEHICLES, json!({"country_id": "Japan"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn details_found_and_missing() {
        let inv = inventory();
        let found = inv
            .execute(GET_VEHICLE_DETAILS, json!({"vehicle_id": 1}))
            .await
            .unwrap();
        assert_eq!(found["found"], true);
        let missing = inv
            .execute(GET_VEHICLE_DETAILS, json!({"vehicle_id": 99999}))
            .await
            .unwrap();
        assert_eq!(missing["found"], false);
        assert_eq!(missing["message"], "Vehicle ID 99999 not found.");
    }

    /// **Scenario**: Identical callback requests reuse the first request id.
    #[tokio::test]
    async fn duplicate_callback_reuses_request() {
        let inv = inventory();
        let args = json!({
            "vehicle_id": 1,
            "customer_name": "Ana",
            "phone_number": "+56 9 1234 5678",
            "preferred_call_time": "tarde",
        });
        let first = inv
            .execute(CREATE_EXECUTIVE_CALL_REQUEST, args.clone())
            .await
            .unwrap();
        assert_eq!(first["ok"], true);
        assert_eq!(first["created"], true);
        assert_eq!(first["phone_number"], "+56912345678");
        let second = inv
            .execute(CREATE_EXECUTIVE_CALL_REQUEST, args)
            .await
            .unwrap();
        assert_eq!(second["created"], false);
        assert_eq!(second["request_id"], first["request_id"]);
    }

    #[tokio::test]
    async fn callback_validation_errors() {
        let inv = inventory();
        let short_phone = inv
            .execute(
                CREATE_EXECUTIVE_CALL_REQUEST,
                json!({"vehicle_id": 1, "customer_name": "Ana", "phone_number": "123", "preferred_call_time": "x"}),
            )
            .await
            .unwrap();
        assert_eq!(short_phone["ok"], false);
        assert_eq!(
            short_phone["error"],
            "Invalid phone number. Provide at least 8 digits."
        );
        let unknown = inv
            .execute(
                CREATE_EXECUTIVE_CALL_REQUEST,
                json!({"vehicle_id": 99999, "customer_name": "Ana", "phone_number": "12345678", "preferred_call_time": "x"}),
            )
            .await
            .unwrap();
        assert_eq!(unknown["error"], "Vehicle ID 99999 does not exist.");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let err = inventory().execute("drop_tables", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "drop_tables"));
    }
}
