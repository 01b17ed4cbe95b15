//! Deep per-item measurement: transport metrics, header capture, JSON
//! structural sniffing, and image inspection.
//!
//! Measurement goes HEAD-first to minimize transfer, falling back to GET for
//! API candidates and for anything HEAD could not answer successfully. Every
//! fetch outcome — HEAD, GET, or the extra body materialization — is recorded
//! into the run's `HttpStats`. No failure escapes: the outer boundary turns
//! any fetch error into a zeroed failed measurement.

use crate::client::HttpClient;
use crate::model::{ElementCategory, ImageInfo, JsonShape, Measurement};
use crate::stats::{self, FetchRecord, SharedStats};
use serde_json::Value;
use std::time::{Duration, Instant};
use url::Url;

/// Top-level object keys that mark a JSON body as product-shaped, in either
/// of the two languages the engine understands.
const PRODUCT_OBJECT_KEYS: &[&str] = &[
    "product",
    "products",
    "sku",
    "items",
    "catalog",
    "price",
    "stock",
    "inventory",
    "categoria",
    "category",
];

/// Item keys that mark the elements of a JSON array as product-shaped.
const PRODUCT_ITEM_KEYS: &[&str] = &[
    "id",
    "name",
    "price",
    "sku",
    "image",
    "description",
    "nome",
    "preco",
    "imagem",
    "categoria",
];

/// Leading array items sampled for product-shaped keys.
const ARRAY_SAMPLE: usize = 5;

/// Result of measuring one item.
#[derive(Debug)]
pub struct MeasureOutput {
    pub measurement: Measurement,
    /// The JSON body looked product-shaped; the caller should additionally
    /// insert the URL into the product-catalog category.
    pub product_shaped: bool,
}

/// Does a parsed JSON body look like a product catalog?
///
/// Objects qualify by their top-level keys; arrays by the union of keys over
/// their first few object items.
pub fn is_product_shaped(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .keys()
            .any(|k| PRODUCT_OBJECT_KEYS.contains(&k.to_ascii_lowercase().as_str())),
        Value::Array(items) => items
            .iter()
            .take(ARRAY_SAMPLE)
            .filter_map(Value::as_object)
            .flat_map(|item| item.keys())
            .any(|k| PRODUCT_ITEM_KEYS.contains(&k.to_ascii_lowercase().as_str())),
        _ => false,
    }
}

/// Fetch and measure a single item. Never fails: a fetch error produces a
/// failed measurement and a stats failure increment instead.
pub async fn measure_item(
    client: &HttpClient,
    http_stats: &SharedStats,
    url: &Url,
    is_api: bool,
    element_category: Option<ElementCategory>,
    timeout: Duration,
) -> MeasureOutput {
    match measure_inner(client, http_stats, url, is_api, element_category, timeout).await {
        Ok(output) => output,
        Err(error) => MeasureOutput {
            measurement: Measurement::failed(error),
            product_shaped: false,
        },
    }
}

async fn measure_inner(
    client: &HttpClient,
    http_stats: &SharedStats,
    url: &Url,
    is_api: bool,
    element_category: Option<ElementCategory>,
    timeout: Duration,
) -> Result<MeasureOutput, String> {
    let started = Instant::now();

    let mut primary = match client.head(url, timeout, is_api).await {
        Ok(resp) => {
            stats::record(http_stats, &FetchRecord::from_response(&resp));
            resp
        }
        Err(e) => {
            stats::record(http_stats, &FetchRecord::Failure);
            return Err(e.to_string());
        }
    };

    // APIs and anything HEAD could not answer get the real thing.
    if is_api || !primary.is_success() {
        match client.get(url, timeout, is_api).await {
            Ok(resp) => {
                stats::record(http_stats, &FetchRecord::from_response(&resp));
                primary = resp;
            }
            Err(e) => {
                stats::record(http_stats, &FetchRecord::Failure);
                return Err(e.to_string());
            }
        }
    }

    let load_time = started.elapsed();
    let mut body = primary.body.take();

    let size = match primary.content_length() {
        Some(declared) => declared,
        None => {
            ensure_body(client, http_stats, url, timeout, is_api, &mut body).await?;
            body.as_ref().map(|b| b.len() as u64).unwrap_or(0)
        }
    };

    let mut measurement = Measurement::from_response(&primary, size);
    measurement.load_time = load_time;

    let media_type = primary.media_type();
    let mut product_shaped = false;

    // JSON structural sniffing, for declared JSON bodies and for anything the
    // caller flagged as an API.
    if is_api || media_type.contains("application/json") {
        ensure_body(client, http_stats, url, timeout, is_api, &mut body).await?;
        match body
            .as_deref()
            .map(serde_json::from_slice::<Value>)
            .transpose()
        {
            Ok(Some(value)) => {
                measurement.json = JsonShape::of_value(&value);
                product_shaped = is_product_shaped(&value);
            }
            _ => measurement.json = JsonShape::NotJson,
        }
    }

    // Image inspection, only for image-category elements with image bodies.
    if element_category == Some(ElementCategory::Image) && media_type.contains("image") {
        ensure_body(client, http_stats, url, timeout, is_api, &mut body).await?;
        if let Some(bytes) = body.as_deref() {
            match ImageInfo::from_bytes(bytes) {
                Ok(info) => measurement.image = Some(info),
                Err(e) => measurement.image_error = Some(e.to_string()),
            }
        }
    }

    Ok(MeasureOutput {
        measurement,
        product_shaped,
    })
}

/// Materialize the body with an extra GET when the measurement path has not
/// fetched one yet.
async fn ensure_body(
    client: &HttpClient,
    http_stats: &SharedStats,
    url: &Url,
    timeout: Duration,
    is_api: bool,
    body: &mut Option<Vec<u8>>,
) -> Result<(), String> {
    if body.is_some() {
        return Ok(());
    }
    match client.get(url, timeout, is_api).await {
        Ok(mut resp) => {
            stats::record(http_stats, &FetchRecord::from_response(&resp));
            *body = resp.body.take();
            Ok(())
        }
        Err(e) => {
            stats::record(http_stats, &FetchRecord::Failure);
            Err(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_with_product_keys_is_product_shaped() {
        assert!(is_product_shaped(&json!({"products": [], "meta": {}})));
        assert!(is_product_shaped(&json!({"SKU": "a-1"})));
        assert!(is_product_shaped(&json!({"categoria": "ferramentas"})));
        assert!(!is_product_shaped(&json!({"users": [], "total": 3})));
    }

    #[test]
    fn test_array_sampling_checks_first_items_only() {
        assert!(is_product_shaped(&json!([
            {"id": 1, "name": "a", "price": 9.9},
            {"id": 2, "name": "b", "price": 19.9},
        ])));

        // Product keys beyond the sample window are not seen.
        let mut items = vec![json!({"x": 1}); ARRAY_SAMPLE];
        items.push(json!({"price": 5}));
        assert!(!is_product_shaped(&Value::Array(items)));
    }

    #[test]
    fn test_array_of_scalars_is_not_product_shaped() {
        assert!(!is_product_shaped(&json!([1, 2, 3])));
        assert!(!is_product_shaped(&json!([])));
        assert!(!is_product_shaped(&json!("price")));
    }

    #[test]
    fn test_portuguese_item_keys_count() {
        assert!(is_product_shaped(&json!([
            {"nome": "martelo", "preco": 35.0, "imagem": "/m.png"}
        ])));
    }
}
