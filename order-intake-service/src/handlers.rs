use chrono::{DateTime, Utc};
use shared::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::IntakeError;
use crate::store::{EventCatalog, OrderStore, OrderTransaction, PlacedOrder};
use crate::validation::{self, ValidatedOrder};

/// Entry point for order submissions: validates the payload, then hands it
/// to the store's transaction.
#[derive(Clone)]
pub struct OrderIntake {
    store: Arc<dyn OrderStore>,
}

impl OrderIntake {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub async fn submit(&self, body: &[u8]) -> Result<PlacedOrder, IntakeError> {
        let order = match validation::parse_body(body).and_then(|raw| validation::validate(&raw)) {
            Ok(order) => order,
            Err(e) => {
                warn!("Rejected order submission: {}", e);
                return Err(e);
            }
        };

        match self.store.place_order(&order).await {
            Ok(placed) => {
                info!(
                    "Order {} placed for event {} ({} items via {})",
                    placed.order_id,
                    order.event_id,
                    order.total_items(),
                    order.channel
                );
                for name in &placed.low_stock {
                    if let Some(stock) = placed.updated_stocks.get(name) {
                        warn!("Low stock: {} has {} left", name, stock);
                    }
                }
                Ok(placed)
            }
            Err(e) if e.is_infrastructure() => {
                error!("Failed to place order for event {}: {}", order.event_id, e);
                Err(e)
            }
            Err(e) => {
                warn!("Order for event {} rejected: {}", order.event_id, e);
                Err(e)
            }
        }
    }

    pub async fn catalog(&self, event_id: Uuid) -> Result<Option<EventCatalog>, IntakeError> {
        self.store.catalog(event_id).await.inspect_err(|e| {
            error!("Failed to load catalog for event {}: {}", event_id, e);
        })
    }
}

/// The order-placement transaction body. Runs against an open transaction;
/// the caller commits only if this returns `Ok`.
pub async fn place_order(
    tx: &mut dyn OrderTransaction,
    order: &ValidatedOrder,
) -> Result<PlacedOrder, IntakeError> {
    let event = tx
        .event(order.event_id)
        .await?
        .ok_or(IntakeError::EventNotFound)?;
    if !event.accepts_orders() {
        return Err(IntakeError::EventNotActive);
    }

    let mut resolved = Vec::with_capacity(order.quantities.len());
    for (name, &requested) in &order.quantities {
        let product = tx
            .product_by_name(name)
            .await?
            .ok_or_else(|| IntakeError::ProductNotFound(name.clone()))?;
        resolved.push((name, product, requested));
    }

    let mut staged = Vec::new();
    for (name, product, requested) in &resolved {
        // Untracked stock is unlimited.
        let Some(current) = product.stock_quantity else {
            continue;
        };
        if current < *requested {
            return Err(IntakeError::InsufficientStock {
                product: (*name).clone(),
                remaining: current.max(0),
            });
        }
        staged.push((*name, product, current - requested));
    }

    let mut updated_stocks = BTreeMap::new();
    let mut low_stock = Vec::new();
    for (name, product, new_stock) in staged {
        tx.set_stock(product, new_stock).await?;
        if product.is_low_stock_at(new_stock) {
            low_stock.push(name.clone());
        }
        updated_stocks.insert(name.clone(), new_stock);
    }

    let record = build_order(order, Utc::now());
    tx.insert_order(&record).await?;

    Ok(PlacedOrder {
        order_id: record.id,
        updated_stocks,
        low_stock,
    })
}

/// The stored form of a validated submission.
pub fn build_order(order: &ValidatedOrder, now: DateTime<Utc>) -> Order {
    let location_link = match order.delivery_mode {
        DeliveryMode::Delivery => order.location_link.clone(),
        _ => String::new(),
    };

    Order {
        id: Uuid::new_v4(),
        event_id: order.event_id,
        customer_name: order.customer_name.clone(),
        note: order.note.clone(),
        quantities: order.quantities.clone(),
        total_items: order.total_items(),
        status: OrderStatus::Pending,
        channel: order.channel,
        delivery_mode: order.delivery_mode,
        delivery_date: or_no_preference(&order.delivery_date),
        delivery_time_slot: or_no_preference(&order.delivery_time_slot),
        location_link,
        created_at: now,
        updated_at: now,
    }
}

fn or_no_preference(label: &str) -> String {
    if label.is_empty() {
        NO_PREFERENCE.to_string()
    } else {
        label.to_string()
    }
}
