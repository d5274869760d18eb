//! Resource/operation table for the Gigstack action node.
//!
//! Each `(resource, operation)` pair maps to one declarative
//! [`OperationSpec`]: the HTTP method, a path template with `{param}`
//! placeholders, how the body and query are filled from node parameters,
//! and how the response is shaped. Payload contents stay opaque; values are
//! passed through as the caller supplied them.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value;

use crate::error::{GigstackError, Result};
use crate::filters::unix_seconds;
use crate::types::{DataObject, HttpMethod, RequestDescriptor, is_truthy};

// ═══════════════════════════════════════════════════════════════════════════
// Parameter Resolution
// ═══════════════════════════════════════════════════════════════════════════

/// Supplies node parameter values for a given input item.
pub trait ParameterResolver: Send + Sync {
    fn parameter(&self, name: &str, item_index: usize) -> Option<Value>;
}

/// A single parameter set shared by every item.
impl ParameterResolver for DataObject {
    fn parameter(&self, name: &str, _item_index: usize) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl<F> ParameterResolver for F
where
    F: Fn(&str, usize) -> Option<Value> + Send + Sync,
{
    fn parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self(name, item_index)
    }
}

/// Node-level parameters with per-item overrides.
#[derive(Debug, Clone, Default)]
pub struct LayeredParameters {
    pub defaults: DataObject,
    pub items: Vec<DataObject>,
}

impl LayeredParameters {
    pub fn new(defaults: DataObject, items: Vec<DataObject>) -> Self {
        Self { defaults, items }
    }
}

impl ParameterResolver for LayeredParameters {
    fn parameter(&self, name: &str, item_index: usize) -> Option<Value> {
        self.items
            .get(item_index)
            .and_then(|item| item.get(name))
            .or_else(|| self.defaults.get(name))
            .cloned()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Operation Descriptors
// ═══════════════════════════════════════════════════════════════════════════

/// How the response of an operation becomes output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// One call, `data` unwrapped.
    Simplify,
    /// One call, response returned as-is.
    Raw,
    /// List endpoint; every element becomes one record.
    List { paginate: bool, filters: ListFilters },
}

/// Which filters a list operation accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilters {
    /// The full filter collection, run through the compiler.
    Compiled,
    /// Only `status` is forwarded.
    StatusOnly,
}

/// How one body key is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyField {
    /// Always sent; a missing value is an error.
    Required { param: &'static str, key: &'static str },
    /// Sent when truthy.
    Optional { param: &'static str, key: &'static str },
    /// Sent whenever set, including `false` and `0`.
    Present { param: &'static str, key: &'static str },
    /// A date sent as whole Unix seconds when set.
    EpochSeconds { param: &'static str, key: &'static str },
    /// `{client: {id}}` from a required client id.
    ClientRef { param: &'static str },
    /// Line items under `items`, from `{itemValues: [...]}` or a bare array.
    LineItems {
        param: &'static str,
        shape: LineItemShape,
    },
    /// `{id}` or `{email}`, chosen by a second parameter.
    Identifier {
        value_param: &'static str,
        kind_param: &'static str,
    },
    /// A collection parameter merged into the body.
    Merge { param: &'static str },
    /// Sent when truthy and `gate` holds `equals`.
    Gated {
        param: &'static str,
        key: &'static str,
        gate: &'static str,
        equals: &'static str,
    },
    /// Upsert lookup under `search`, sent only when both `on_key` and
    /// `on_value` are set.
    Search { param: &'static str },
}

/// How line item entries are shaped before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineItemShape {
    /// Every truthy field is kept.
    Full,
    /// `id`, `quantity` (1 when unset) and a non-zero `unit_price` only.
    Priced,
}

/// A query parameter filled from a node parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryField {
    pub param: &'static str,
    pub key: &'static str,
    /// Value meaning "not set" (e.g. `both` for file type).
    pub skip: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub resource: &'static str,
    pub operation: &'static str,
    pub method: HttpMethod,
    pub path: &'static str,
    pub body: &'static [BodyField],
    pub query: &'static [QueryField],
    pub kind: ResponseKind,
}

impl OperationSpec {
    /// Build the request for one item. List shaping (limit, filters,
    /// pagination) is left to the caller.
    pub fn build_request(
        &self,
        params: &dyn ParameterResolver,
        item_index: usize,
    ) -> Result<RequestDescriptor> {
        let path = render_path(self.path, params, item_index)?;

        let mut body = DataObject::new();
        for field in self.body {
            apply_body_field(&mut body, field, params, item_index)?;
        }

        let mut query = DataObject::new();
        for field in self.query {
            if let Some(value) = params.parameter(field.param, item_index).filter(is_truthy) {
                if field.skip.is_some_and(|skip| value.as_str() == Some(skip)) {
                    continue;
                }
                query.insert(field.key.to_string(), value);
            }
        }

        Ok(RequestDescriptor::new(self.method, path)
            .with_body(body)
            .with_query(query))
    }
}

fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn required(params: &dyn ParameterResolver, name: &str, item_index: usize) -> Result<Value> {
    params
        .parameter(name, item_index)
        .filter(|v| !is_missing(v))
        .ok_or_else(|| GigstackError::MissingParameter(name.to_string()))
}

fn path_segment(value: &Value) -> String {
    match value {
        Value::String(s) => urlencoding::encode(s.trim()).into_owned(),
        other => other.to_string(),
    }
}

/// Substitute `{param}` placeholders in a path template.
fn render_path(template: &str, params: &dyn ParameterResolver, item_index: usize) -> Result<String> {
    let mut path = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            GigstackError::invalid("path", format!("unterminated placeholder in '{}'", template))
        })?;
        let name = &after[..end];
        path.push_str(&path_segment(&required(params, name, item_index)?));
        rest = &after[end + 1..];
    }
    path.push_str(rest);

    Ok(path)
}

fn apply_body_field(
    body: &mut DataObject,
    field: &BodyField,
    params: &dyn ParameterResolver,
    item_index: usize,
) -> Result<()> {
    match *field {
        BodyField::Required { param, key } => {
            body.insert(key.to_string(), required(params, param, item_index)?);
        }
        BodyField::Optional { param, key } => {
            if let Some(value) = params.parameter(param, item_index).filter(is_truthy) {
                body.insert(key.to_string(), value);
            }
        }
        BodyField::Present { param, key } => {
            if let Some(value) = params.parameter(param, item_index).filter(|v| !v.is_null()) {
                body.insert(key.to_string(), value);
            }
        }
        BodyField::EpochSeconds { param, key } => {
            if let Some(value) = params.parameter(param, item_index).filter(is_truthy) {
                body.insert(key.to_string(), Value::from(unix_seconds(param, &value)?));
            }
        }
        BodyField::ClientRef { param } => {
            let id = required(params, param, item_index)?;
            let mut client = DataObject::new();
            client.insert("id".to_string(), id);
            body.insert("client".to_string(), Value::Object(client));
        }
        BodyField::LineItems { param, shape } => {
            let items = params
                .parameter(param, item_index)
                .map(|value| line_items(value, shape))
                .unwrap_or_default();
            body.insert("items".to_string(), Value::Array(items));
        }
        BodyField::Identifier {
            value_param,
            kind_param,
        } => {
            let value = required(params, value_param, item_index)?;
            let key = match params.parameter(kind_param, item_index) {
                Some(Value::String(kind)) if kind == "email" => "email",
                _ => "id",
            };
            body.insert(key.to_string(), value);
        }
        BodyField::Merge { param } => {
            if let Some(Value::Object(fields)) = params.parameter(param, item_index) {
                for (key, value) in fields {
                    let value = if key == "metadata" {
                        parse_metadata(value)?
                    } else {
                        value
                    };
                    body.insert(key, value);
                }
            }
        }
        BodyField::Gated {
            param,
            key,
            gate,
            equals,
        } => {
            let open = params
                .parameter(gate, item_index)
                .is_some_and(|v| v.as_str() == Some(equals));
            if open {
                if let Some(value) = params.parameter(param, item_index).filter(is_truthy) {
                    body.insert(key.to_string(), value);
                }
            }
        }
        BodyField::Search { param } => {
            if let Some(Value::Object(options)) = params.parameter(param, item_index) {
                let on_key = options.get("on_key").filter(|v| is_truthy(v));
                let on_value = options.get("on_value").filter(|v| is_truthy(v));
                if let (Some(on_key), Some(on_value)) = (on_key, on_value) {
                    let update = options
                        .get("update")
                        .filter(|v| is_truthy(v))
                        .cloned()
                        .unwrap_or(Value::Bool(false));
                    let mut search = DataObject::new();
                    search.insert("on_key".to_string(), on_key.clone());
                    search.insert("on_value".to_string(), on_value.clone());
                    search.insert("update".to_string(), update);
                    body.insert("search".to_string(), Value::Object(search));
                }
            }
        }
    }
    Ok(())
}

fn line_items(value: Value, shape: LineItemShape) -> Vec<Value> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("itemValues") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .map(|entry| match (entry, shape) {
            (Value::Object(map), LineItemShape::Full) => Value::Object(
                map.into_iter()
                    .filter(|(_, v)| is_truthy(v))
                    .collect(),
            ),
            (Value::Object(map), LineItemShape::Priced) => Value::Object(priced_item(map)),
            (other, _) => other,
        })
        .collect()
}

fn priced_item(mut map: DataObject) -> DataObject {
    let mut item = DataObject::new();
    if let Some(id) = map.remove("id").filter(|v| !v.is_null()) {
        item.insert("id".to_string(), id);
    }
    let quantity = map
        .remove("quantity")
        .filter(is_truthy)
        .unwrap_or(Value::from(1));
    item.insert("quantity".to_string(), quantity);
    if let Some(price) = map.remove("unit_price").filter(is_truthy) {
        item.insert("unit_price".to_string(), price);
    }
    item
}

/// Metadata may arrive as a JSON string from a text field.
fn parse_metadata(value: Value) -> Result<Value> {
    match value {
        Value::String(raw) if raw.trim().is_empty() => Ok(Value::Object(DataObject::new())),
        Value::String(raw) => serde_json::from_str(&raw)
            .map_err(|e| GigstackError::invalid("metadata", format!("not valid JSON: {}", e))),
        other => Ok(other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Table
// ═══════════════════════════════════════════════════════════════════════════

const fn req(param: &'static str, key: &'static str) -> BodyField {
    BodyField::Required { param, key }
}

const fn opt(param: &'static str, key: &'static str) -> BodyField {
    BodyField::Optional { param, key }
}

const fn merge(param: &'static str) -> BodyField {
    BodyField::Merge { param }
}

const fn invoice_items() -> BodyField {
    BodyField::LineItems {
        param: "items",
        shape: LineItemShape::Full,
    }
}

const fn priced_items() -> BodyField {
    BodyField::LineItems {
        param: "items",
        shape: LineItemShape::Priced,
    }
}

const LIST: ResponseKind = ResponseKind::List {
    paginate: true,
    filters: ListFilters::Compiled,
};

const fn op(
    resource: &'static str,
    operation: &'static str,
    method: HttpMethod,
    path: &'static str,
    body: &'static [BodyField],
    kind: ResponseKind,
) -> OperationSpec {
    OperationSpec {
        resource,
        operation,
        method,
        path,
        body,
        query: &[],
        kind,
    }
}

use HttpMethod::{Delete, Get, Post, Put};
use ResponseKind::{Raw, Simplify};

static OPERATIONS: &[OperationSpec] = &[
    // client
    op(
        "client",
        "create",
        Post,
        "/clients",
        &[
            req("email", "email"),
            merge("additionalFields"),
            BodyField::Search { param: "searchOptions" },
        ],
        Simplify,
    ),
    op("client", "get", Get, "/clients/{clientId}", &[], Simplify),
    op("client", "getAll", Get, "/clients", &[], LIST),
    op("client", "update", Put, "/clients/{clientId}", &[merge("updateFields")], Simplify),
    op("client", "delete", Delete, "/clients/{clientId}", &[], Raw),
    op("client", "validate", Post, "/clients/validate/{clientId}", &[], Raw),
    op(
        "client",
        "getCustomerPortal",
        Post,
        "/clients/customerportal",
        &[BodyField::Identifier {
            value_param: "clientIdentifier",
            kind_param: "identifierType",
        }],
        Simplify,
    ),
    op("client", "stampPendingReceipts", Post, "/clients/{clientId}/stamp-pending-receipts", &[], Raw),
    // service
    op(
        "service",
        "create",
        Post,
        "/services",
        &[
            req("description", "description"),
            req("unit_price", "unit_price"),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op("service", "get", Get, "/services/{serviceId}", &[], Simplify),
    op("service", "getAll", Get, "/services", &[], LIST),
    op("service", "update", Put, "/services/{serviceId}", &[merge("updateFields")], Simplify),
    op("service", "delete", Delete, "/services/{serviceId}", &[], Raw),
    // invoice
    op(
        "invoice",
        "createIncome",
        Post,
        "/invoices/income",
        &[
            BodyField::ClientRef { param: "clientId" },
            invoice_items(),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op(
        "invoice",
        "createEgress",
        Post,
        "/invoices/egress",
        &[
            BodyField::ClientRef { param: "clientId" },
            invoice_items(),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op("invoice", "get", Get, "/invoices/{invoiceType}/{invoiceId}", &[], Simplify),
    op("invoice", "getAllIncome", Get, "/invoices/income", &[], LIST),
    op("invoice", "getAllEgress", Get, "/invoices/egress", &[], LIST),
    op("invoice", "getAllPayment", Get, "/invoices/payment", &[], LIST),
    op(
        "invoice",
        "cancel",
        Delete,
        "/invoices/{invoiceId}",
        &[
            req("motive", "motive"),
            BodyField::Gated {
                param: "substitution_uuid",
                key: "substitution_uuid",
                gate: "motive",
                equals: "01",
            },
        ],
        Raw,
    ),
    OperationSpec {
        resource: "invoice",
        operation: "getFiles",
        method: Get,
        path: "/invoices/{invoiceId}/files",
        body: &[],
        query: &[QueryField {
            param: "fileType",
            key: "file_type",
            skip: Some("both"),
        }],
        kind: Simplify,
    },
    // payment
    op(
        "payment",
        "request",
        Post,
        "/payments/request",
        &[
            BodyField::ClientRef { param: "clientId" },
            priced_items(),
            opt("automation_type", "automation_type"),
            opt("allowed_payment_methods", "allowed_payment_methods"),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op(
        "payment",
        "register",
        Post,
        "/payments/register",
        &[
            BodyField::ClientRef { param: "clientId" },
            priced_items(),
            opt("automation_type", "automation_type"),
            req("payment_form", "payment_form"),
            opt("invoiceConfig", "invoice_config"),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op("payment", "get", Get, "/payments/{paymentId}", &[], Simplify),
    op("payment", "getAll", Get, "/payments", &[], LIST),
    op("payment", "cancel", Delete, "/payments/{paymentId}", &[], Raw),
    op(
        "payment",
        "markAsPaid",
        Post,
        "/payments/{paymentId}/paid",
        &[
            req("payment_form", "payment_form"),
            BodyField::EpochSeconds { param: "date", key: "date" },
        ],
        Simplify,
    ),
    op(
        "payment",
        "refund",
        Post,
        "/payments/{paymentId}/refund",
        &[
            req("amount", "amount"),
            BodyField::Present {
                param: "external_processor_refund",
                key: "external_processor_refund",
            },
            opt("reason", "reason"),
        ],
        Simplify,
    ),
    // receipt
    op(
        "receipt",
        "create",
        Post,
        "/receipts",
        &[
            BodyField::ClientRef { param: "clientId" },
            priced_items(),
            opt("invoiceConfig", "invoice_config"),
            merge("additionalFields"),
        ],
        Simplify,
    ),
    op("receipt", "get", Get, "/receipts/{receiptId}", &[], Simplify),
    op("receipt", "getAll", Get, "/receipts", &[], LIST),
    op("receipt", "cancel", Delete, "/receipts/{receiptId}", &[], Raw),
    op(
        "receipt",
        "stamp",
        Post,
        "/receipts/{receiptId}/stamp",
        &[req("stamp_to", "stamp_to"), merge("stampOptions")],
        Simplify,
    ),
    // team
    op("team", "create", Post, "/teams", &[req("tax_id", "tax_id"), merge("additionalFields")], Simplify),
    op("team", "get", Get, "/teams/{teamId}", &[], Simplify),
    op("team", "getAll", Get, "/teams", &[], LIST),
    op("team", "update", Put, "/teams/{teamId}", &[merge("updateFields")], Simplify),
    op("team", "getIntegrations", Get, "/teams/integrations", &[], Simplify),
    op(
        "team",
        "addMember",
        Post,
        "/teams/{teamId}/add-member",
        &[req("userId", "id"), req("role", "role")],
        Simplify,
    ),
    op("team", "removeMember", Post, "/teams/{teamId}/remove-member", &[req("userId", "id")], Simplify),
    op("team", "getSeries", Get, "/teams/{teamId}/series", &[], Simplify),
    op(
        "team",
        "createSeries",
        Post,
        "/teams/{teamId}/series",
        &[req("series", "series"), opt("live", "live"), opt("test", "test")],
        Simplify,
    ),
    op(
        "team",
        "updateSeries",
        Put,
        "/teams/{teamId}/series/{seriesId}",
        &[opt("live", "live"), opt("test", "test")],
        Simplify,
    ),
    op("team", "updateSettings", Put, "/teams/{teamId}/settings", &[merge("settings")], Simplify),
    op("team", "getOnboardingUrl", Get, "/teams/{teamId}/onboarding-url", &[], Simplify),
    // user
    op("user", "create", Post, "/users", &[req("email", "email"), merge("additionalFields")], Simplify),
    op("user", "get", Get, "/users/{userId}", &[], Simplify),
    op("user", "getAll", Get, "/users", &[], LIST),
    op("user", "update", Put, "/users/{userId}", &[merge("updateFields")], Simplify),
    op("user", "resetPassword", Post, "/users/reset-password", &[req("userEmail", "email")], Raw),
    op("user", "loginLink", Post, "/users/login-link", &[req("userId", "user_id")], Simplify),
    // webhook
    op(
        "webhook",
        "create",
        Post,
        "/webhooks",
        &[req("url", "url"), req("events", "events"), merge("additionalFields")],
        Simplify,
    ),
    op("webhook", "get", Get, "/webhooks/{webhookId}", &[], Simplify),
    op(
        "webhook",
        "getAll",
        Get,
        "/webhooks",
        &[],
        ResponseKind::List {
            paginate: false,
            filters: ListFilters::StatusOnly,
        },
    ),
    op("webhook", "update", Put, "/webhooks/{webhookId}", &[merge("updateFields")], Simplify),
    op("webhook", "delete", Delete, "/webhooks/{webhookId}", &[], Raw),
];

fn table() -> &'static HashMap<(&'static str, &'static str), &'static OperationSpec> {
    static TABLE: OnceLock<HashMap<(&'static str, &'static str), &'static OperationSpec>> =
        OnceLock::new();
    TABLE.get_or_init(|| {
        OPERATIONS
            .iter()
            .map(|spec| ((spec.resource, spec.operation), spec))
            .collect()
    })
}

/// Resolve a `(resource, operation)` pair.
pub fn lookup(resource: &str, operation: &str) -> Result<&'static OperationSpec> {
    let table: &HashMap<(&str, &str), &'static OperationSpec> = table();
    table
        .get(&(resource, operation))
        .copied()
        .ok_or_else(|| GigstackError::UnknownOperation {
            resource: resource.to_string(),
            operation: operation.to_string(),
        })
}
