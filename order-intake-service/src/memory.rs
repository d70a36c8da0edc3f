use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use shared::{Event, Order, Product};
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::IntakeError;
use crate::handlers;
use crate::store::{retry_on_conflict, EventCatalog, OrderStore, OrderTransaction, PlacedOrder};
use crate::validation::ValidatedOrder;

/// Initial contents for [`MemoryStore`], read from a JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seed {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Seed {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))
    }
}

#[derive(Debug, Clone)]
struct Versioned<T> {
    value: T,
    version: u64,
}

impl<T> Versioned<T> {
    fn new(value: T) -> Self {
        Self { value, version: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DocKey {
    Event(Uuid),
    Product(Uuid),
}

#[derive(Debug, Default)]
struct State {
    events: HashMap<Uuid, Versioned<Event>>,
    /// Creation order, so the first name match is the oldest product.
    products: Vec<Versioned<Product>>,
    orders: Vec<Order>,
}

impl State {
    fn version_of(&self, key: DocKey) -> Option<u64> {
        match key {
            DocKey::Event(id) => self.events.get(&id).map(|doc| doc.version),
            DocKey::Product(id) => self
                .products
                .iter()
                .find(|doc| doc.value.id == id)
                .map(|doc| doc.version),
        }
    }
}

/// In-process document store with optimistic concurrency. Each document has
/// a version; a transaction commits only if nothing it read has changed.
pub struct MemoryStore {
    state: Mutex<State>,
    max_attempts: u32,
}

impl MemoryStore {
    pub fn from_seed(seed: Seed, max_attempts: u32) -> Self {
        let state = State {
            events: seed
                .events
                .into_iter()
                .map(|event| (event.id, Versioned::new(event)))
                .collect(),
            products: seed.products.into_iter().map(Versioned::new).collect(),
            orders: Vec::new(),
        };
        Self {
            state: Mutex::new(state),
            max_attempts,
        }
    }

    fn begin(&self) -> MemoryTransaction<'_> {
        MemoryTransaction {
            state: &self.state,
            reads: HashMap::new(),
            stock_writes: HashMap::new(),
            orders: Vec::new(),
        }
    }

    async fn commit(&self, tx: MemoryTransaction<'_>) -> Result<(), IntakeError> {
        let mut state = self.state.lock().await;

        if tx
            .reads
            .iter()
            .any(|(key, seen)| state.version_of(*key) != *seen)
        {
            return Err(IntakeError::Conflict);
        }

        for (id, stock) in tx.stock_writes {
            if let Some(doc) = state.products.iter_mut().find(|doc| doc.value.id == id) {
                doc.value.stock_quantity = Some(stock);
                doc.version += 1;
            }
        }
        state.orders.extend(tx.orders);
        Ok(())
    }

    async fn attempt(&self, order: &ValidatedOrder) -> Result<PlacedOrder, IntakeError> {
        let mut tx = self.begin();
        let placed = handlers::place_order(&mut tx, order).await?;
        self.commit(tx).await?;
        Ok(placed)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: &ValidatedOrder) -> Result<PlacedOrder, IntakeError> {
        retry_on_conflict(self.max_attempts, move || self.attempt(order)).await
    }

    async fn catalog(&self, event_id: Uuid) -> Result<Option<EventCatalog>, IntakeError> {
        let state = self.state.lock().await;
        let Some(event) = state.events.get(&event_id) else {
            return Ok(None);
        };
        let candidates: Vec<Product> = state.products.iter().map(|doc| doc.value.clone()).collect();
        Ok(Some(EventCatalog::assemble(event.value.clone(), &candidates)))
    }
}

struct MemoryTransaction<'s> {
    state: &'s Mutex<State>,
    /// Version of each document when first read; `None` if it was absent.
    reads: HashMap<DocKey, Option<u64>>,
    stock_writes: HashMap<Uuid, i32>,
    orders: Vec<Order>,
}

impl MemoryTransaction<'_> {
    fn record_read(&mut self, key: DocKey, version: Option<u64>) {
        self.reads.entry(key).or_insert(version);
    }
}

#[async_trait]
impl OrderTransaction for MemoryTransaction<'_> {
    async fn event(&mut self, id: Uuid) -> Result<Option<Event>, IntakeError> {
        let store = self.state;
        let state = store.lock().await;
        let found = state.events.get(&id);
        self.record_read(DocKey::Event(id), found.map(|doc| doc.version));
        Ok(found.map(|doc| doc.value.clone()))
    }

    async fn product_by_name(&mut self, name: &str) -> Result<Option<Product>, IntakeError> {
        let store = self.state;
        let state = store.lock().await;
        let Some(doc) = state.products.iter().find(|doc| doc.value.name == name) else {
            return Ok(None);
        };
        self.record_read(DocKey::Product(doc.value.id), Some(doc.version));

        let mut product = doc.value.clone();
        if let Some(staged) = self.stock_writes.get(&product.id) {
            product.stock_quantity = Some(*staged);
        }
        Ok(Some(product))
    }

    async fn set_stock(&mut self, product: &Product, stock: i32) -> Result<(), IntakeError> {
        let store = self.state;
        let state = store.lock().await;
        if !state.products.iter().any(|doc| doc.value.id == product.id) {
            return Err(IntakeError::ProductMissing(product.name.clone()));
        }
        self.stock_writes.insert(product.id, stock);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), IntakeError> {
        self.orders.push(order.clone());
        Ok(())
    }
}

#[cfg(test)]
impl MemoryStore {
    pub async fn orders_for(&self, event_id: Uuid) -> Vec<Order> {
        let state = self.state.lock().await;
        state
            .orders
            .iter()
            .filter(|order| order.event_id == event_id)
            .cloned()
            .collect()
    }

    pub async fn product(&self, name: &str) -> Option<Product> {
        let state = self.state.lock().await;
        state
            .products
            .iter()
            .find(|doc| doc.value.name == name)
            .map(|doc| doc.value.clone())
    }

    /// A seller editing stock from the dashboard.
    pub async fn edit_stock(&self, name: &str, stock: Option<i32>) {
        let mut state = self.state.lock().await;
        if let Some(doc) = state.products.iter_mut().find(|doc| doc.value.name == name) {
            doc.value.stock_quantity = stock;
            doc.version += 1;
        }
    }

    pub async fn remove_product(&self, name: &str) {
        let mut state = self.state.lock().await;
        state.products.retain(|doc| doc.value.name != name);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    fn order(quantities: serde_json::Value) -> ValidatedOrder {
        validate(&json!({
            "eventId": EVENT_ID,
            "channel": "whatsapp",
            "quantities": quantities,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn commit_detects_stock_changed_after_read() {
        let store = store();
        let mut first = store.begin();
        handlers::place_order(&mut first, &order(json!({"Coxinha": 2})))
            .await
            .unwrap();

        let mut second = store.begin();
        handlers::place_order(&mut second, &order(json!({"Coxinha": 3})))
            .await
            .unwrap();
        store.commit(second).await.unwrap();

        let result = store.commit(first).await;
        assert!(matches!(result, Err(IntakeError::Conflict)));
        assert_eq!(store.product("Coxinha").await.unwrap().stock_quantity, Some(7));
        assert_eq!(store.orders_for(event_id()).await.len(), 1);
    }

    #[tokio::test]
    async fn seller_stock_edit_conflicts_with_open_transaction() {
        let store = store();
        let mut tx = store.begin();
        handlers::place_order(&mut tx, &order(json!({"Kibe": 1})))
            .await
            .unwrap();

        store.edit_stock("Kibe", Some(1)).await;

        assert!(matches!(store.commit(tx).await, Err(IntakeError::Conflict)));
        assert_eq!(store.product("Kibe").await.unwrap().stock_quantity, Some(1));
    }

    #[tokio::test]
    async fn nothing_is_visible_before_commit() {
        let store = store();
        let mut tx = store.begin();
        handlers::place_order(&mut tx, &order(json!({"Coxinha": 4})))
            .await
            .unwrap();

        assert_eq!(store.product("Coxinha").await.unwrap().stock_quantity, Some(10));
        assert!(store.orders_for(event_id()).await.is_empty());
    }

    #[tokio::test]
    async fn later_orders_see_committed_stock() {
        let store = store();
        let placed = store.place_order(&order(json!({"Kibe": 3}))).await.unwrap();
        assert_eq!(placed.updated_stocks["Kibe"], 1);

        let result = store.place_order(&order(json!({"Kibe": 3}))).await;
        assert!(matches!(
            result,
            Err(IntakeError::InsufficientStock { ref product, remaining: 1 }) if product == "Kibe"
        ));
    }

    #[tokio::test]
    async fn catalog_for_unknown_event_is_none() {
        let store = store();
        assert!(store.catalog(Uuid::new_v4()).await.unwrap().is_none());

        let catalog = store.catalog(event_id()).await.unwrap().unwrap();
        assert_eq!(catalog.products.len(), 3);
        assert_eq!(catalog.products[2].stock_quantity, None);
    }

    #[test]
    fn seed_parses_camel_case_json() {
        let seed: Seed = serde_json::from_value(json!({
            "events": [{
                "id": EVENT_ID,
                "title": "Run",
                "status": "closed",
            }],
            "products": [{
                "id": "0b8a5d7e-3f3c-4a44-8e4f-2d9a6c1b7e21",
                "name": "Coxinha",
                "price": 5,
                "stockQuantity": 3,
                "lowStockThreshold": 1,
                "status": "active",
            }],
        }))
        .unwrap();
        assert_eq!(seed.events.len(), 1);
        assert_eq!(seed.products[0].stock_quantity, Some(3));
        assert_eq!(seed.products[0].low_stock_threshold, Some(1));
    }
}
