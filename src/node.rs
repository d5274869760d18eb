//! Gigstack action node: the per-item execution loop.
//!
//! Items are processed strictly in input order, one request (or one
//! paginated fetch) at a time. A failing item either aborts the run or, with
//! continue-on-fail, becomes an `{error: message}` record in its place.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::clients::ApiTransport;
use crate::error::{GigstackError, Result};
use crate::filters::compile_filters;
use crate::operations::{ListFilters, OperationSpec, ParameterResolver, ResponseKind, lookup};
use crate::pagination::{DEFAULT_PAGE_SIZE, request_all_items};
use crate::response::{data_items, simplify};
use crate::types::{NodeExecutionData, is_truthy, items_from_payload};

/// Page size used by a single-call list when the `limit` parameter is unset.
pub const DEFAULT_LIST_LIMIT: u64 = 50;

/// Executes Gigstack operations over a batch of input items.
pub struct GigstackNode<T> {
    transport: T,
}

impl<T: ApiTransport> GigstackNode<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Run the node's configured operation once per input item.
    ///
    /// `resource` and `operation` are node-level and read from item 0; an
    /// unknown pair is rejected before any request is made, whatever the
    /// continue-on-fail setting.
    pub async fn execute(
        &self,
        items: &[NodeExecutionData],
        params: &dyn ParameterResolver,
        continue_on_fail: bool,
    ) -> Result<Vec<NodeExecutionData>> {
        let resource = string_parameter(params, "resource")?;
        let operation = string_parameter(params, "operation")?;
        let spec = lookup(&resource, &operation)?;

        debug!(
            resource = %resource,
            operation = %operation,
            items = items.len(),
            "Executing Gigstack node"
        );

        let mut output = Vec::with_capacity(items.len());
        for item_index in 0..items.len() {
            match self.execute_item(spec, params, item_index).await {
                Ok(records) => {
                    output.extend(
                        records
                            .into_iter()
                            .map(|record| record.with_paired_item(item_index)),
                    );
                }
                Err(e) if continue_on_fail => {
                    warn!(item_index, resource = %resource, operation = %operation, "Item failed: {}", e);
                    output.push(NodeExecutionData::error_marker(e.to_string()).with_paired_item(item_index));
                }
                Err(e) => {
                    error!(item_index, resource = %resource, operation = %operation, "Item failed: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(output)
    }

    async fn execute_item(
        &self,
        spec: &OperationSpec,
        params: &dyn ParameterResolver,
        item_index: usize,
    ) -> Result<Vec<NodeExecutionData>> {
        let mut request = spec.build_request(params, item_index)?;

        if let Some(team) = params.parameter("team", item_index).filter(is_truthy) {
            request.query.insert("team".to_string(), team);
        }

        match spec.kind {
            ResponseKind::Simplify => {
                let response = self.transport.request(request).await?;
                Ok(items_from_payload(simplify(response)))
            }
            ResponseKind::Raw => {
                let response = self.transport.request(request).await?;
                Ok(items_from_payload(response))
            }
            ResponseKind::List { paginate, filters } => {
                match filters {
                    ListFilters::Compiled => {
                        if let Some(Value::Object(filters)) = params.parameter("filters", item_index) {
                            request.query.extend(compile_filters(&filters)?);
                        }
                    }
                    ListFilters::StatusOnly => {
                        let status = params
                            .parameter("filters", item_index)
                            .and_then(|f| f.get("status").cloned())
                            .filter(is_truthy);
                        if let Some(status) = status {
                            request.query.insert("status".to_string(), status);
                        }
                    }
                }

                let return_all = params
                    .parameter("returnAll", item_index)
                    .is_some_and(|v| is_truthy(&v));

                let records = if return_all && paginate {
                    request_all_items(
                        &self.transport,
                        request.method,
                        &request.path,
                        request.body,
                        request.query,
                        None,
                    )
                    .await?
                } else {
                    let limit = if return_all {
                        Value::from(DEFAULT_PAGE_SIZE)
                    } else {
                        params
                            .parameter("limit", item_index)
                            .filter(is_truthy)
                            .unwrap_or_else(|| Value::from(DEFAULT_LIST_LIMIT))
                    };
                    request.query.insert("limit".to_string(), limit);
                    data_items(self.transport.request(request).await?)
                };

                Ok(records.into_iter().map(NodeExecutionData::from_value).collect())
            }
        }
    }
}

fn string_parameter(params: &dyn ParameterResolver, name: &str) -> Result<String> {
    match params.parameter(name, 0) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Null) | None => Err(GigstackError::MissingParameter(name.to_string())),
        Some(Value::String(_)) => Err(GigstackError::MissingParameter(name.to_string())),
        Some(_) => Err(GigstackError::invalid(name, "expected a string")),
    }
}
