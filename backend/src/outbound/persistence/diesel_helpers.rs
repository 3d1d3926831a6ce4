//! Error mapping shared by the Diesel adapters.

use tracing::debug;

use crate::domain::ports::InstanceStoreError;

use super::pool::PoolError;

/// Map pool errors to store connection errors.
pub fn map_pool_error(error: PoolError) -> InstanceStoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            InstanceStoreError::connection(message)
        }
    }
}

/// Map Diesel errors to store errors, logging the driver detail.
pub fn map_diesel_error(error: diesel::result::Error) -> InstanceStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => InstanceStoreError::query("record not found"),
        DieselError::QueryBuilderError(_) => InstanceStoreError::query("database query error"),
        DieselError::DeserializationError(err) => {
            InstanceStoreError::query(format!("unreadable instance row: {err}"))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            InstanceStoreError::connection("database connection error")
        }
        DieselError::DatabaseError(_, info) => {
            InstanceStoreError::query(format!("database error: {}", info.message()))
        }
        _ => InstanceStoreError::query("database error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    #[rstest]
    fn pool_errors_become_connection_errors() {
        let err = map_pool_error(PoolError::checkout("connection refused"));

        assert_eq!(err, InstanceStoreError::connection("connection refused"));
    }

    #[rstest]
    fn closed_connection_is_a_connection_error() {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection unexpectedly".to_owned()),
        ));

        assert!(matches!(err, InstanceStoreError::Connection { .. }));
    }

    #[rstest]
    fn other_database_errors_keep_the_server_message() {
        let err = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::Unknown,
            Box::new("relation \"instances\" does not exist".to_owned()),
        ));

        assert!(matches!(err, InstanceStoreError::Query { .. }));
        assert!(err.to_string().contains("relation \"instances\" does not exist"));
    }

    #[rstest]
    fn not_found_is_a_query_error() {
        let err = map_diesel_error(DieselError::NotFound);

        assert_eq!(err, InstanceStoreError::query("record not found"));
    }
}
