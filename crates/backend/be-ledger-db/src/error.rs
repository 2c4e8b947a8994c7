//! Error types for the ledger store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("{entity} not found{}", .id.as_ref().map(|id| format!(": {}", id)).unwrap_or_default())]
    NotFound {
        entity: &'static str,
        id: Option<String>,
    },

    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity, id: None }
    }

    pub fn not_found_with_id(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: Some(id.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "record",
                id: None,
            },
            sqlx::Error::Database(db_err) => {
                // PostgreSQL: 23505 = unique_violation, 23503 = foreign_key_violation
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => {
                            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                            Self::Duplicate {
                                field: "constraint",
                                value: constraint,
                            }
                        }
                        "23503" => {
                            let entity_name = db_err
                                .constraint()
                                .unwrap_or("referenced record")
                                .to_string();
                            Self::Query(format!("Foreign key violation: {}", entity_name))
                        }
                        _ => Self::Database(sqlx::Error::Database(db_err)),
                    }
                } else {
                    Self::Database(sqlx::Error::Database(db_err))
                }
            }
            sqlx::Error::PoolTimedOut => Self::Pool("Connection pool timed out".to_string()),
            sqlx::Error::PoolClosed => Self::Pool("Connection pool is closed".to_string()),
            sqlx::Error::Io(io_err) => Self::Connection(io_err.to_string()),
            sqlx::Error::Tls(tls_err) => Self::Connection(format!("TLS error: {}", tls_err)),
            other => Self::Database(other),
        }
    }
}

pub type DbResult<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = DbError::not_found("transaction");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "transaction not found");

        let err = DbError::not_found_with_id("transaction", "abc");
        assert_eq!(err.to_string(), "transaction not found: abc");
    }

    #[test]
    fn duplicate_display() {
        let err = DbError::Duplicate {
            field: "constraint",
            value: "payment_methods_user_id_token_service_key".to_string(),
        };
        assert!(err.is_duplicate());
        assert_eq!(
            err.to_string(),
            "Duplicate constraint: payment_methods_user_id_token_service_key"
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let db_err: DbError = sqlx::Error::RowNotFound.into();
        assert!(db_err.is_not_found());
    }
}
