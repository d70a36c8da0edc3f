use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;

use crate::error::IntakeError;
use crate::handlers;
use crate::models::*;
use crate::schema::*;
use crate::store::{retry_on_conflict, EventCatalog, OrderStore, OrderTransaction, PlacedOrder};
use crate::validation::ValidatedOrder;

pub type DbPool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Postgres-backed store. Orders are placed in SERIALIZABLE transactions;
/// a serialization failure is retried like any other conflict.
pub struct PgStore {
    pool: DbPool,
    max_attempts: u32,
}

impl PgStore {
    pub fn new(pool: DbPool, max_attempts: u32) -> Self {
        Self { pool, max_attempts }
    }

    async fn attempt(&self, order: &ValidatedOrder) -> Result<PlacedOrder, IntakeError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| IntakeError::Pool(e.to_string()))?;

        let order = order.clone();
        conn.build_transaction()
            .read_write()
            .serializable()
            .run(move |conn| {
                Box::pin(async move {
                    let mut tx = PgTransaction { conn };
                    handlers::place_order(&mut tx, &order).await
                })
            })
            .await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, order: &ValidatedOrder) -> Result<PlacedOrder, IntakeError> {
        retry_on_conflict(self.max_attempts, move || self.attempt(order)).await
    }

    async fn catalog(&self, event_id: Uuid) -> Result<Option<EventCatalog>, IntakeError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| IntakeError::Pool(e.to_string()))?;

        let db_event = events::table
            .find(event_id)
            .select(DbEvent::as_select())
            .first::<DbEvent>(&mut conn)
            .await
            .optional()?;
        let Some(db_event) = db_event else {
            return Ok(None);
        };
        let event = Event::try_from(db_event)?;

        let candidates = products::table
            .filter(products::name.eq_any(event.product_names.clone()))
            .order((products::created_at.asc(), products::id.asc()))
            .select(DbProduct::as_select())
            .load::<DbProduct>(&mut conn)
            .await?
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(EventCatalog::assemble(event, &candidates)))
    }
}

struct PgTransaction<'c> {
    conn: &'c mut AsyncPgConnection,
}

#[async_trait]
impl OrderTransaction for PgTransaction<'_> {
    async fn event(&mut self, id: Uuid) -> Result<Option<Event>, IntakeError> {
        let db_event = events::table
            .find(id)
            .select(DbEvent::as_select())
            .first::<DbEvent>(&mut *self.conn)
            .await
            .optional()?;
        Ok(db_event.map(Event::try_from).transpose()?)
    }

    async fn product_by_name(&mut self, name: &str) -> Result<Option<Product>, IntakeError> {
        let db_product = products::table
            .filter(products::name.eq(name))
            .order((products::created_at.asc(), products::id.asc()))
            .select(DbProduct::as_select())
            .for_update()
            .first::<DbProduct>(&mut *self.conn)
            .await
            .optional()?;
        Ok(db_product.map(Product::try_from).transpose()?)
    }

    async fn set_stock(&mut self, product: &Product, stock: i32) -> Result<(), IntakeError> {
        let updated = diesel::update(products::table.find(product.id))
            .set((
                products::stock_quantity.eq(Some(stock)),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(&mut *self.conn)
            .await?;

        if updated == 0 {
            return Err(IntakeError::ProductMissing(product.name.clone()));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(), IntakeError> {
        diesel::insert_into(orders::table)
            .values(&NewOrder::from(order))
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}
