//! Cursor paginator over the `{data, has_more, next}` envelope.

use serde_json::Value;
use tracing::debug;

use crate::clients::ApiTransport;
use crate::error::Result;
use crate::types::{DataObject, HttpMethod, PageEnvelope, RequestDescriptor, is_truthy};

/// Page size used when the caller did not pick one.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Fetch every page of a list endpoint and return the concatenated `data`.
///
/// `limit` caps the result: once at least `limit` items are collected the
/// sequence is truncated and no further page is requested. `None` or
/// `Some(0)` means no cap. Pages are requested strictly one after another,
/// and the first failing call aborts the whole fetch.
pub async fn request_all_items<T: ApiTransport + ?Sized>(
    transport: &T,
    method: HttpMethod,
    path: &str,
    body: DataObject,
    mut query: DataObject,
    limit: Option<usize>,
) -> Result<Vec<Value>> {
    let cap = limit.filter(|n| *n > 0);
    let mut items: Vec<Value> = Vec::new();

    if !query.get("limit").is_some_and(is_truthy) {
        query.insert("limit".to_string(), Value::from(DEFAULT_PAGE_SIZE));
    }

    let mut pages = 0usize;
    loop {
        let request = RequestDescriptor::new(method, path)
            .with_body(body.clone())
            .with_query(query.clone());
        let response = transport.request(request).await?;
        pages += 1;

        let page = PageEnvelope::from_response(&response);
        let has_more = page.has_more;
        let cursor = page.continuation().map(str::to_string);
        items.extend(page.data);

        if let Some(cap) = cap {
            if items.len() >= cap {
                items.truncate(cap);
                break;
            }
        }

        match cursor {
            Some(next) => {
                query.insert("next".to_string(), Value::String(next));
            }
            None => {
                if has_more {
                    debug!(path = %path, "has_more without a next cursor, stopping");
                }
                break;
            }
        }
    }

    debug!(path = %path, pages, items = items.len(), "Pagination complete");
    Ok(items)
}
