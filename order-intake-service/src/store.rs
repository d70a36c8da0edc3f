use async_trait::async_trait;
use serde::Serialize;
use shared::{Event, Order, Product};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::warn;
use uuid::Uuid;

use crate::error::IntakeError;
use crate::validation::ValidatedOrder;

/// Reads and writes performed inside one atomic transaction. Nothing staged
/// through this trait is visible to other transactions until the owning
/// [`OrderStore`] commits.
#[async_trait]
pub trait OrderTransaction: Send {
    async fn event(&mut self, id: Uuid) -> Result<Option<Event>, IntakeError>;

    /// Unique-name lookup. If several products share the name, the oldest wins.
    async fn product_by_name(&mut self, name: &str) -> Result<Option<Product>, IntakeError>;

    /// Fails with [`IntakeError::ProductMissing`] if the product vanished.
    async fn set_stock(&mut self, product: &Product, stock: i32) -> Result<(), IntakeError>;

    async fn insert_order(&mut self, order: &Order) -> Result<(), IntakeError>;
}

/// The document store behind the intake service. Implementations own
/// atomicity: `place_order` either commits every stock decrement together
/// with the new order, or nothing.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn place_order(&self, order: &ValidatedOrder) -> Result<PlacedOrder, IntakeError>;

    async fn catalog(&self, event_id: Uuid) -> Result<Option<EventCatalog>, IntakeError>;
}

/// Result of a committed order.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    /// New stock level of every product whose stock is tracked.
    pub updated_stocks: BTreeMap<String, i32>,
    /// Products left at or below their low-stock threshold.
    pub low_stock: Vec<String>,
}

/// Runs one transaction attempt after another while they fail on a
/// conflict, giving up with [`IntakeError::Contention`] after `max_attempts`.
pub async fn retry_on_conflict<F, Fut>(
    max_attempts: u32,
    mut attempt: F,
) -> Result<PlacedOrder, IntakeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PlacedOrder, IntakeError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt().await {
            Err(e) if e.is_conflict() && attempts < max_attempts => {
                warn!("Transaction conflict on attempt {}/{}, retrying", attempts, max_attempts);
            }
            Err(e) if e.is_conflict() => return Err(IntakeError::Contention { attempts }),
            result => return result,
        }
    }
}

/// Read-only view of an event and the products it offers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCatalog {
    pub event: Event,
    pub products: Vec<CatalogItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub name: String,
    pub price: i32,
    pub category: String,
    pub image_urls: Vec<String>,
    pub stock_quantity: Option<i32>,
    pub available: bool,
    pub low_stock: bool,
}

impl From<&Product> for CatalogItem {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            category: product.category.clone(),
            image_urls: product.image_urls.clone(),
            stock_quantity: product.stock_quantity,
            available: product.is_available(),
            low_stock: product.is_low_stock(),
        }
    }
}

impl EventCatalog {
    /// Lists the event's products in the order the seller gave them.
    /// `candidates` must be sorted oldest first; names nothing matches are
    /// left out.
    pub fn assemble(event: Event, candidates: &[Product]) -> Self {
        let products = event
            .product_names
            .iter()
            .filter_map(|name| candidates.iter().find(|p| &p.name == name))
            .map(CatalogItem::from)
            .collect();
        Self { event, products }
    }
}
