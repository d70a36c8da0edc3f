/// Every way an order submission can fail. The `Display` text is the
/// message handed back to the customer's browser.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Request body must be a JSON object")]
    InvalidBody,
    #[error("eventId is required")]
    MissingEventId,
    #[error("Invalid eventId")]
    InvalidEventId,
    #[error("Invalid channel")]
    InvalidChannel,
    #[error("Invalid quantities")]
    InvalidQuantities,
    #[error("Select at least one item")]
    EmptyCart,

    #[error("Event not found")]
    EventNotFound,
    #[error("Event is not accepting orders")]
    EventNotActive,

    #[error("Product not found: {0}")]
    ProductNotFound(String),
    #[error("Product record missing: {0}")]
    ProductMissing(String),

    #[error("Insufficient stock for {product}: {remaining} remaining")]
    InsufficientStock { product: String, remaining: i32 },

    /// A concurrent commit invalidated what this transaction read.
    #[error("Transaction conflict")]
    Conflict,
    #[error("Order could not be saved after {attempts} attempts due to concurrent updates")]
    Contention { attempts: u32 },
    #[error("{0}")]
    Database(#[from] diesel::result::Error),
    #[error("Storage unavailable: {0}")]
    Pool(String),
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] shared::UnknownVariant),
}

impl IntakeError {
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            IntakeError::Contention { .. }
                | IntakeError::Database(_)
                | IntakeError::Pool(_)
                | IntakeError::Corrupt(_)
        )
    }

    /// Whether the storage layer should run the transaction again.
    pub fn is_conflict(&self) -> bool {
        use diesel::result::{DatabaseErrorKind, Error};

        match self {
            IntakeError::Conflict => true,
            IntakeError::Database(Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_product_and_remaining() {
        let err = IntakeError::InsufficientStock {
            product: "Coxinha".to_string(),
            remaining: 5,
        };
        assert_eq!(err.to_string(), "Insufficient stock for Coxinha: 5 remaining");
        assert!(!err.is_conflict());
    }

    #[test]
    fn classifies_conflicts_and_infrastructure() {
        assert!(IntakeError::Conflict.is_conflict());
        assert!(IntakeError::Contention { attempts: 5 }.is_infrastructure());
        assert!(IntakeError::Database(diesel::result::Error::NotFound).is_infrastructure());
        assert!(!IntakeError::Database(diesel::result::Error::NotFound).is_conflict());
        assert!(!IntakeError::EmptyCart.is_infrastructure());
    }
}
