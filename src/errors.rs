use sea_orm::error::DbErr;
use sea_orm::TransactionError;
use uuid::Uuid;

/// Error type returned by every service in the engine.
///
/// Guard violations (`TenantMissing`, `TenantMismatch`) and business rule
/// violations (`InsufficientStock`, `ReservationShortage`) are terminal for
/// the request. Database errors may be transient; callers should consult
/// [`ServiceError::is_retryable`] before retrying a whole operation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Tenant context missing")]
    TenantMissing,

    #[error("Tenant mismatch: context is {context}, caller supplied {supplied}")]
    TenantMismatch { context: Uuid, supplied: Uuid },

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Reservation shortage: {0}")]
    ReservationShortage(String),

    #[error("Order line {0} not found")]
    OrderLineNotFound(Uuid),

    #[error("Variant mismatch: {0}")]
    VariantMismatch(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Converts a database error into a `ServiceError`.
    pub fn db_error(err: DbErr) -> Self {
        ServiceError::DatabaseError(err)
    }

    /// Whether retrying the whole operation may succeed.
    ///
    /// Lock wait timeouts, deadlocks, serialization failures and pool
    /// exhaustion are transient: every operation is a single transaction, so
    /// the failed attempt left no partial state behind. Reservation creation
    /// carries a dedupe key precisely so those retries are safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::DatabaseError(err) => {
                if matches!(err, DbErr::ConnectionAcquire(_)) {
                    return true;
                }
                let msg = err.to_string().to_ascii_lowercase();
                msg.contains("deadlock")
                    || msg.contains("lock timeout")
                    || msg.contains("lock wait")
                    || msg.contains("could not serialize")
                    || msg.contains("serialization failure")
                    || msg.contains("database is locked")
            }
            _ => false,
        }
    }
}

impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}
