//! Core operations. Each public async function is one logical operation and
//! runs in exactly one store transaction; the `*_in` functions take the
//! transaction explicitly so operations can be composed inside it.

pub mod assignment;
pub mod batching;
pub mod ledger;
pub mod lifecycle;
pub mod payments;
pub mod users;

use std::time::Instant;

use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

fn observe<T>(
    state: &AppState,
    operation: &'static str,
    started: Instant,
    result: &Result<T, AppError>,
) {
    state
        .metrics
        .observe(operation, result.is_ok(), started.elapsed().as_secs_f64());

    if let Err(err) = result {
        warn!(operation, kind = err.kind(), error = %err, "operation failed");
    }
}
