//! Order creation inputs and their priced, validated form.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Money, ProductId};

/// One requested line: which product, how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// A proposed order as submitted by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub items: Vec<RequestedItem>,
}

impl NewOrderRequest {
    /// Shape checks that need no catalog access.
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customerName is required"));
        }
        if self.customer_email.trim().is_empty() {
            return Err(DomainError::validation("customerEmail is required"));
        }
        validate_items(&self.items)
    }
}

/// Item list preconditions: non-empty, every quantity positive.
pub fn validate_items(items: &[RequestedItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("order must contain at least one item"));
    }
    if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
        return Err(DomainError::validation(format!(
            "quantity for product {} must be a positive integer",
            item.product_id
        )));
    }
    Ok(())
}

/// A line item resolved against the catalog, carrying the name/price snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i64,
    pub price: Money,
}

impl ValidatedItem {
    pub fn line_total(&self) -> DomainResult<Money> {
        self.price.checked_mul(self.quantity).ok_or_else(|| {
            DomainError::validation(format!("line total overflows for product {}", self.product_id))
        })
    }
}

/// Fully priced item set plus the authoritative total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    items: Vec<ValidatedItem>,
    total: Money,
}

impl ValidatedOrder {
    /// Price every line and accumulate the order total.
    pub fn from_items(items: Vec<ValidatedItem>) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }

        let mut total = Money::ZERO;
        for item in &items {
            if item.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity for product {} must be a positive integer",
                    item.product_id
                )));
            }
            if item.price.is_negative() {
                return Err(DomainError::invariant(format!(
                    "catalog returned a negative price for product {}",
                    item.product_id
                )));
            }
            total = total
                .checked_add(item.line_total()?)
                .ok_or_else(|| DomainError::validation("order total overflows"))?;
        }

        Ok(Self { items, total })
    }

    pub fn items(&self) -> &[ValidatedItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn into_parts(self) -> (Vec<ValidatedItem>, Money) {
        (self.items, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(product: i64, quantity: i64, cents: i64) -> ValidatedItem {
        ValidatedItem {
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            quantity,
            price: Money::from_cents(cents),
        }
    }

    fn request(name: &str, email: &str, items: Vec<RequestedItem>) -> NewOrderRequest {
        NewOrderRequest {
            customer_name: name.to_string(),
            customer_email: email.to_string(),
            items,
        }
    }

    fn one_item() -> Vec<RequestedItem> {
        vec![RequestedItem { product_id: ProductId::new(1), quantity: 2 }]
    }

    #[test]
    fn request_requires_name_email_and_items() {
        assert!(request("Alice", "alice@example.com", one_item()).validate().is_ok());

        let cases = [
            request("", "alice@example.com", one_item()),
            request("   ", "alice@example.com", one_item()),
            request("Alice", "", one_item()),
            request("Alice", "alice@example.com", vec![]),
        ];
        for case in cases {
            assert!(matches!(case.validate(), Err(DomainError::Validation(_))), "{case:?}");
        }
    }

    #[test]
    fn request_rejects_non_positive_quantities() {
        let items = vec![
            RequestedItem { product_id: ProductId::new(1), quantity: 1 },
            RequestedItem { product_id: ProductId::new(2), quantity: 0 },
        ];
        match request("Alice", "alice@example.com", items).validate() {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("product 2")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn prices_single_line() {
        let order = ValidatedOrder::from_items(vec![item(1, 2, 2999)]).unwrap();
        assert_eq!(order.total(), Money::from_cents(5998));
        assert_eq!(order.items().len(), 1);
    }

    #[test]
    fn rejects_negative_catalog_price() {
        let err = ValidatedOrder::from_items(vec![item(1, 1, -5)]).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn overflowing_total_is_a_validation_error() {
        let err = ValidatedOrder::from_items(vec![item(1, 2, i64::MAX / 2 + 1)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #[test]
        fn total_equals_sum_of_price_times_quantity(
            lines in prop::collection::vec((1i64..1_000, 1i64..100, 0i64..1_000_000), 1..20)
        ) {
            let items: Vec<_> = lines.iter().map(|&(p, q, c)| item(p, q, c)).collect();
            let expected: i64 = lines.iter().map(|&(_, q, c)| q * c).sum();

            let order = ValidatedOrder::from_items(items).unwrap();
            prop_assert_eq!(order.total(), Money::from_cents(expected));
        }
    }
}
