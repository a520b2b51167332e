//! All-settle concurrent join.

use crate::error::GraphResult;
use futures::future::join_all;
use std::future::Future;

/// Runs independent branches concurrently, waits for **every** branch to
/// settle, then surfaces the earliest-indexed failure — or the ordered
/// successes when none failed.
///
/// A plain first-error-wins join is not equivalent: bailing on the first
/// failure would let an enclosing transaction rollback race a sibling
/// write still in flight. Here every branch has finished its own work
/// before the parent operation is considered failed.
pub async fn join_settled<T, F>(branches: Vec<F>) -> GraphResult<Vec<T>>
where
    F: Future<Output = GraphResult<T>>,
{
    let settled = join_all(branches).await;
    let mut results = Vec::with_capacity(settled.len());
    for outcome in settled {
        results.push(outcome?);
    }
    Ok(results)
}
