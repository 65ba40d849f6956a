//! Search filter allow-list and tool payload coercion helpers.

use serde_json::{Map, Value};

use crate::state::{SearchFilters, VehicleCandidate};

/// Filter keys accepted by `search_used_vehicles` and persisted in `active_search_filters`.
pub const ALLOWED_FILTERS: [&str; 16] = [
    "country_id",
    "body_type_id",
    "transmission_type_id",
    "fuel_type_id",
    "drivetrain_id",
    "year_min",
    "year_max",
    "mileage_km_min",
    "mileage_km_max",
    "make",
    "model",
    "color",
    "number_of_doors",
    "price_usd_min",
    "price_usd_max",
    "limit",
];

/// Default `limit` added to every enforced search call.
pub const DEFAULT_SEARCH_LIMIT: i64 = 5;

/// Maximum candidates kept from one search result.
pub const MAX_CANDIDATES: usize = 12;

pub fn is_allowed_filter(key: &str) -> bool {
    ALLOWED_FILTERS.contains(&key)
}

/// Keeps allow-listed keys only, drops nulls, trims strings and drops blank ones.
pub fn sanitize_filters<'a, I>(raw: I) -> SearchFilters
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let mut sanitized = SearchFilters::new();
    for (key, value) in raw {
        if !is_allowed_filter(key) {
            continue;
        }
        match value {
            Value::Null => {}
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    sanitized.insert(key.clone(), Value::String(trimmed.to_string()));
                }
            }
            other => {
                sanitized.insert(key.clone(), other.clone());
            }
        }
    }
    sanitized
}

/// Lenient integer coercion: integers, integral floats and numeric strings.
pub fn safe_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn trimmed_text(row: &Map<String, Value>, key: &str) -> String {
    match row.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Compacts raw vehicle rows into candidates; rows without an integer id are skipped.
pub fn compact_vehicle_candidates(rows: &[Value], max_items: usize) -> Vec<VehicleCandidate> {
    rows.iter()
        .filter_map(Value::as_object)
        .filter_map(|row| {
            let id = row.get("id").and_then(safe_int)?;
            Some(VehicleCandidate {
                id,
                make: trimmed_text(row, "make"),
                model: trimmed_text(row, "model"),
                year: row.get("year").and_then(safe_int),
                mileage_km: row.get("mileage_km").and_then(safe_int),
                price_usd: row.get("price_usd").and_then(safe_int),
                country_of_origin: trimmed_text(row, "country_of_origin"),
            })
        })
        .take(max_items)
        .collect()
}

/// Canonical key-sorted JSON of a filter set, used to detect duplicate searches.
pub fn canonical_filters_key(filters: &SearchFilters) -> String {
    // BTreeMap iteration is key-sorted, so serde_json output is canonical.
    serde_json::to_string(filters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: Unknown keys, nulls and blank strings never reach persisted filters.
    #[test]
    fn sanitize_drops_unknown_null_and_blank() {
        let raw = json!({
            "country_id": 5,
            "make": "  Audi ",
            "model": "   ",
            "color": null,
            "sunroof": true,
        });
        let filters = sanitize_filters(raw.as_object().unwrap());
        assert_eq!(filters.len(), 2);
        assert_eq!(filters["country_id"], json!(5));
        assert_eq!(filters["make"], json!("Audi"));
    }

    #[test]
    fn safe_int_coerces_leniently() {
        assert_eq!(safe_int(&json!(42)), Some(42));
        assert_eq!(safe_int(&json!(" 7 ")), Some(7));
        assert_eq!(safe_int(&json!(3.0)), Some(3));
        assert_eq!(safe_int(&json!("x")), None);
        assert_eq!(safe_int(&Value::Null), None);
    }

    /// **Scenario**: Rows without an integer id are skipped and the list is capped.
    #[test]
    fn compact_candidates_skips_rows_without_id_and_caps() {
        let mut rows = vec![json!({"make": "Kia"}), json!("not a row")];
        rows.extend((1..=20).map(|i| json!({"id": i, "make": " Audi ", "model": "A4", "year": 2021})));
        let candidates = compact_vehicle_candidates(&rows, MAX_CANDIDATES);
        assert_eq!(candidates.len(), MAX_CANDIDATES);
        assert_eq!(candidates[0].id, 1);
        assert_eq!(candidates[0].make, "Audi");
        assert_eq!(candidates[0].year, Some(2021));
        assert_eq!(candidates[0].mileage_km, None);
    }

    #[test]
    fn canonical_key_ignores_insertion_order() {
        let a = sanitize_filters(json!({"make": "Audi", "limit": 5}).as_object().unwrap());
        let b = sanitize_filters(json!({"limit": 5, "make": "Audi"}).as_object().unwrap());
        assert_eq!(canonical_filters_key(&a), canonical_filters_key(&b));
    }
}
