use chrono::{DateTime, Utc};
use diesel::prelude::*;
use shared::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::events)]
pub struct DbEvent {
    pub id: Uuid,
    pub title: String,
    pub region: String,
    pub delivery_dates: Vec<String>,
    pub product_names: Vec<String>,
    pub whatsapp_number: String,
    pub messenger_id: Option<String>,
    pub pickup_note: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::products)]
pub struct DbProduct {
    pub id: Uuid,
    pub name: String,
    pub price: i32,
    pub category: String,
    pub image_urls: Vec<String>,
    pub stock_quantity: Option<i32>,
    pub low_stock_threshold: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::orders)]
pub struct NewOrder {
    pub id: Uuid,
    pub event_id: Uuid,
    pub customer_name: String,
    pub note: String,
    pub quantities: serde_json::Value,
    pub total_items: i32,
    pub status: String,
    pub channel: String,
    pub delivery_mode: String,
    pub delivery_date: String,
    pub delivery_time_slot: String,
    pub location_link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbEvent> for Event {
    type Error = UnknownVariant;

    fn try_from(db_event: DbEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db_event.id,
            title: db_event.title,
            region: db_event.region,
            delivery_dates: db_event.delivery_dates,
            product_names: db_event.product_names,
            whatsapp_number: db_event.whatsapp_number,
            messenger_id: db_event.messenger_id,
            pickup_note: db_event.pickup_note,
            status: db_event.status.parse()?,
        })
    }
}

impl TryFrom<DbProduct> for Product {
    type Error = UnknownVariant;

    fn try_from(db_product: DbProduct) -> Result<Self, Self::Error> {
        Ok(Self {
            id: db_product.id,
            name: db_product.name,
            price: db_product.price,
            category: db_product.category,
            image_urls: db_product.image_urls,
            stock_quantity: db_product.stock_quantity,
            low_stock_threshold: db_product.low_stock_threshold,
            status: db_product.status.parse()?,
        })
    }
}

impl From<&Order> for NewOrder {
    fn from(order: &Order) -> Self {
        let quantities = order
            .quantities
            .iter()
            .map(|(name, qty)| (name.clone(), serde_json::Value::from(*qty)))
            .collect::<serde_json::Map<_, _>>();

        Self {
            id: order.id,
            event_id: order.event_id,
            customer_name: order.customer_name.clone(),
            note: order.note.clone(),
            quantities: serde_json::Value::Object(quantities),
            total_items: order.total_items,
            status: order.status.to_string(),
            channel: order.channel.to_string(),
            delivery_mode: order.delivery_mode.to_string(),
            delivery_date: order.delivery_date.clone(),
            delivery_time_slot: order.delivery_time_slot.clone(),
            location_link: order.location_link.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
