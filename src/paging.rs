//! Merges multi-block replies (`block_id`/`block_count`) into one payload.
//!
//! Each block is its own kernel request with its own timeout; a failure on
//! any block aborts the whole operation and discards partial data, rather
//! than returning a truncated list silently.

use serde_json::Value;

use crate::error::Error;

/// Drive a paged command to completion, calling `fetch_block(block_id)` for
/// `block_id = 1, 2, ...` until the reply reports `block_id == block_count`.
/// Returns the concatenated `list_field` array and the final block count.
pub async fn run_paged<F, Fut>(list_field: &str, mut fetch_block: F) -> Result<(Vec<Value>, u64), Error>
where
    F: FnMut(u64) -> Fut,
    Fut: std::future::Future<Output = Result<Value, Error>>,
{
    let mut block_id: u64 = 1;
    let mut items = Vec::new();
    loop {
        let payload = fetch_block(block_id).await?;
        let block_count = payload.get("block_count").and_then(Value::as_u64).unwrap_or(block_id);
        if let Some(list) = payload.get(list_field).and_then(Value::as_array) {
            items.extend(list.iter().cloned());
        }
        if block_id >= block_count {
            return Ok((items, block_count));
        }
        block_id += 1;
    }
}
