//! Deadlines for store operations.
//!
//! Every store call made by a handler or a rate limit actor goes through
//! [`with_timeout`]. A backend error becomes [`GatewayError::Storage`]; an
//! elapsed deadline becomes [`GatewayError::Timeout`] so the two can be told
//! apart in logs and metrics while answering the caller the same way.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::storage::StoreResult;

pub async fn with_timeout<T, F>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, GatewayError>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => {
            metrics::record_store_error(operation, "error");
            Err(GatewayError::Storage { operation, source })
        }
        Err(_) => {
            metrics::record_store_error(operation, "timeout");
            Err(GatewayError::Timeout {
                operation,
                elapsed_ms: limit.as_millis() as u64,
            })
        }
    }
}
