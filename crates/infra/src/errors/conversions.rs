//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use serde_json::Error as JsonError;
use storeguard_domain::StoreGuardError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreGuardError);

impl From<InfraError> for StoreGuardError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreGuardError> for InfraError {
    fn from(value: StoreGuardError) -> Self {
        InfraError(value)
    }
}

trait IntoStoreGuardError {
    fn into_storeguard(self) -> StoreGuardError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreGuardError */
/* -------------------------------------------------------------------------- */

impl IntoStoreGuardError for SqlError {
    fn into_storeguard(self) -> StoreGuardError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StoreGuardError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StoreGuardError::Database("database is locked".into())
                    }
                    // SQLITE_CONSTRAINT_PRIMARYKEY / SQLITE_CONSTRAINT_UNIQUE
                    (ErrorCode::ConstraintViolation, 1555 | 2067) => {
                        StoreGuardError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::CannotOpen, _) => {
                        StoreGuardError::Database(format!("unable to open database: {message}"))
                    }
                    _ => StoreGuardError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StoreGuardError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StoreGuardError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                StoreGuardError::Database(format!("invalid column type for {name}: {ty}"))
            }
            RE::InvalidPath(path) => StoreGuardError::Config(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => StoreGuardError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_storeguard())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → StoreGuardError */
/* -------------------------------------------------------------------------- */

impl IntoStoreGuardError for PoolError {
    fn into_storeguard(self) -> StoreGuardError {
        StoreGuardError::Database(format!("connection pool: {self}"))
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(value.into_storeguard())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → StoreGuardError */
/* -------------------------------------------------------------------------- */

impl IntoStoreGuardError for JsonError {
    fn into_storeguard(self) -> StoreGuardError {
        if self.is_data() || self.is_syntax() || self.is_eof() {
            StoreGuardError::InvalidInput(format!("invalid JSON: {self}"))
        } else {
            StoreGuardError::Internal(format!("JSON serialization failed: {self}"))
        }
    }
}

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(value.into_storeguard())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StoreGuardError */
/* -------------------------------------------------------------------------- */

impl IntoStoreGuardError for HttpError {
    fn into_storeguard(self) -> StoreGuardError {
        if self.is_timeout() {
            return StoreGuardError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StoreGuardError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => StoreGuardError::NotFound(message),
                408 => StoreGuardError::Timeout(message),
                429 => StoreGuardError::Network(message),
                400..=499 => StoreGuardError::InvalidInput(message),
                _ => StoreGuardError::Network(message),
            };
        }

        StoreGuardError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_storeguard())
    }
}

/* -------------------------------------------------------------------------- */
/* tokio::task::JoinError → StoreGuardError */
/* -------------------------------------------------------------------------- */

/// Map a failed `spawn_blocking` join into a domain error.
pub fn map_join_error(err: JoinError) -> StoreGuardError {
    if err.is_cancelled() {
        StoreGuardError::Internal("blocking task cancelled".into())
    } else {
        StoreGuardError::Internal(format!("blocking task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
