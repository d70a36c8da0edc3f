use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Label stored when the customer left the delivery date or time slot blank.
pub const NO_PREFERENCE: &str = "no preference";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a lowercase string-backed enum that round-trips through the
/// database `varchar` columns and through JSON.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(
    /// Lifecycle of a delivery run. Only `Active` events take orders.
    EventStatus, "event status" {
        Active => "active",
        Closed => "closed",
        Cancelled => "cancelled",
    }
);

string_enum!(ProductStatus, "product status" {
    Active => "active",
    Inactive => "inactive",
});

string_enum!(OrderStatus, "order status" {
    Pending => "pending",
    Confirmed => "confirmed",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

string_enum!(
    /// Messaging app the customer used to send the order.
    Channel, "channel" {
        Whatsapp => "whatsapp",
        Messenger => "messenger",
    }
);

string_enum!(DeliveryMode, "delivery mode" {
    Delivery => "delivery",
    Pickup => "pickup",
    None => "none",
});

impl Default for DeliveryMode {
    fn default() -> Self {
        DeliveryMode::Pickup
    }
}

/// One delivery/sales run published by a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub delivery_dates: Vec<String>,
    /// Products offered on this run, referenced by display name.
    #[serde(default)]
    pub product_names: Vec<String>,
    #[serde(default)]
    pub whatsapp_number: String,
    #[serde(default)]
    pub messenger_id: Option<String>,
    #[serde(default)]
    pub pickup_note: String,
    pub status: EventStatus,
}

impl Event {
    pub fn accepts_orders(&self) -> bool {
        self.status == EventStatus::Active
    }
}

/// Catalog item shared across events. `stock_quantity == None` means the
/// seller does not track stock for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: i32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub low_stock_threshold: Option<i32>,
    pub status: ProductStatus,
}

impl Product {
    /// Tracked stock at or below zero, whatever the status flag says.
    pub fn is_out_of_stock(&self) -> bool {
        matches!(self.stock_quantity, Some(stock) if stock <= 0)
    }

    pub fn is_available(&self) -> bool {
        self.status == ProductStatus::Active && !self.is_out_of_stock()
    }

    pub fn is_low_stock_at(&self, stock: i32) -> bool {
        matches!(self.low_stock_threshold, Some(threshold) if stock <= threshold)
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity
            .is_some_and(|stock| self.is_low_stock_at(stock))
    }
}

/// A customer's cart recorded against one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub event_id: Uuid,
    pub customer_name: String,
    pub note: String,
    pub quantities: BTreeMap<String, i32>,
    pub total_items: i32,
    pub status: OrderStatus,
    pub channel: Channel,
    pub delivery_mode: DeliveryMode,
    pub delivery_date: String,
    pub delivery_time_slot: String,
    pub location_link: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
