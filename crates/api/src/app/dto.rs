//! Request DTOs and their mapping onto domain inputs.
//!
//! Order bodies are read as raw JSON so that a malformed `productId` can be
//! reported as an unknown product instead of a generic deserialization error.

use serde::Deserialize;
use serde_json::Value;

use storefront_core::{OrderId, ProductId};
use storefront_infra::OrderError;
use storefront_orders::{NewOrderRequest, OrderFilter, OrderStatus, RequestedItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub customer_email: Option<String>,
}

impl ListOrdersQuery {
    /// Empty parameters are ignored; an unknown status is a validation error.
    pub fn into_filter(self) -> Result<OrderFilter, OrderError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<OrderStatus>()?),
        };
        let customer_email = self.customer_email.filter(|e| !e.trim().is_empty());
        Ok(OrderFilter { status, customer_email })
    }
}

/// Parsed `PUT /api/orders/{id}/status` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: String,
    pub version: Option<u64>,
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn parse_order_id(raw: &str) -> Result<OrderId, OrderError> {
    raw.parse::<OrderId>()
        .map_err(|_| OrderError::Validation(format!("invalid order id '{raw}'")))
}

fn required_string(body: &Value, field: &str) -> Result<String, OrderError> {
    match body.get(field) {
        None | Some(Value::Null) => Err(OrderError::Validation(format!("{field} is required"))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(OrderError::Validation(format!("{field} must be a string"))),
    }
}

fn parse_item(index: usize, item: &Value) -> Result<RequestedItem, OrderError> {
    let Value::Object(fields) = item else {
        return Err(OrderError::Validation(format!("items[{index}] must be an object")));
    };

    let raw_id = fields
        .get("productId")
        .ok_or_else(|| OrderError::Validation(format!("items[{index}].productId is required")))?;
    let product_id = ProductId::from_json(raw_id).map_err(OrderError::unknown_product)?;

    let quantity = fields
        .get("quantity")
        .and_then(Value::as_i64)
        .filter(|q| *q > 0)
        .ok_or_else(|| {
            OrderError::Validation(format!("quantity for product {product_id} must be a positive integer"))
        })?;

    Ok(RequestedItem { product_id, quantity })
}

/// Map a `POST /api/orders` body onto a creation request.
///
/// Customer fields are checked before items so an incomplete request never
/// reaches the catalog.
pub fn parse_create_order(body: &Value) -> Result<NewOrderRequest, OrderError> {
    if !body.is_object() {
        return Err(OrderError::Validation("request body must be a JSON object".to_string()));
    }

    let customer_name = required_string(body, "customerName")?;
    let customer_email = required_string(body, "customerEmail")?;
    if customer_name.trim().is_empty() {
        return Err(OrderError::Validation("customerName is required".to_string()));
    }
    if customer_email.trim().is_empty() {
        return Err(OrderError::Validation("customerEmail is required".to_string()));
    }

    let items = match body.get("items") {
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(Value::Array(_)) | None | Some(Value::Null) => {
            return Err(OrderError::Validation("order must contain at least one item".to_string()));
        }
        Some(_) => return Err(OrderError::Validation("items must be an array".to_string())),
    };
    let items = items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_item(i, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NewOrderRequest { customer_name, customer_email, items })
}

pub fn parse_status_update(body: &Value) -> Result<StatusUpdate, OrderError> {
    let status = required_string(body, "status")?;
    let version = match body.get("version") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_u64()
                .ok_or_else(|| OrderError::Validation("version must be a non-negative integer".to_string()))?,
        ),
    };
    Ok(StatusUpdate { status, version })
}
