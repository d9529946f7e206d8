//! Service-surface annotations: routing config, headers, query bindings.
//!
//! These never change the body's JSON shape; they are extracted here so the
//! validator can check path/query bindings and so renderers share one view
//! of the service surface. Bytes, integer, and enum values bound to path or
//! query parameters use the same scalar conversion rules as the body (see
//! [`crate::scalar`]).

use std::collections::BTreeMap;

use crate::model::{Message, Method, Service};
use crate::options::ext;

/// The `config` option message on a method.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HttpConfig {
    #[prost(string, tag = "1")]
    pub path: String,
    /// HTTP verb; empty means POST.
    #[prost(string, tag = "2")]
    pub method: String,
}

/// The `service_config` option message on a service.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ServiceConfig {
    #[prost(string, tag = "1")]
    pub base_path: String,
}

/// The `query` option message on a field.
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryConfig {
    /// Query parameter name; empty means the proto field name.
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bool, tag = "2")]
    pub required: bool,
}

/// One required header declaration.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Header {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub description: String,
    #[prost(string, tag = "3")]
    pub kind: String,
    #[prost(bool, tag = "4")]
    pub required: bool,
    #[prost(string, tag = "5")]
    pub format: String,
    #[prost(string, tag = "6")]
    pub example: String,
}

/// Header list carried by `service_headers` / `method_headers`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct HeaderList {
    #[prost(message, repeated, tag = "1")]
    pub required_headers: Vec<Header>,
}

/// Resolved routing configuration for one method.
#[derive(Debug, Clone)]
pub struct MethodRoute {
    pub path: String,
    pub method: String,
    /// `{var}` names in declaration order.
    pub path_params: Vec<String>,
}

/// Resolved query parameter binding for one field.
#[derive(Debug, Clone)]
pub struct QueryParam {
    pub field: String,
    pub json_name: String,
    pub param: String,
    pub required: bool,
}

/// Reads the routing config off a method. `None` when not annotated.
pub fn method_route(method: &Method) -> Option<MethodRoute> {
    let config = method.options.get_message::<HttpConfig>(ext::METHOD_CONFIG)?;
    if config.path.is_empty() {
        return None;
    }
    let verb = if config.method.is_empty() {
        "POST".to_owned()
    } else {
        config.method
    };
    Some(MethodRoute {
        path_params: path_params(&config.path),
        path: config.path,
        method: verb,
    })
}

/// Reads the base path off a service. `None` when not annotated.
pub fn service_base_path(service: &Service) -> Option<String> {
    service
        .options
        .get_message::<ServiceConfig>(ext::SERVICE_CONFIG)
        .map(|config| config.base_path)
        .filter(|base| !base.is_empty())
}

/// `{var}` names parsed out of a path template, in order.
pub fn path_params(path: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let name = &rest[open + 1..open + close];
        if !name.is_empty() {
            params.push(name.to_owned());
        }
        rest = &rest[open + close + 1..];
    }
    params
}

/// Query bindings for a request message, in field order.
pub fn query_params(message: &Message) -> Vec<QueryParam> {
    message
        .fields
        .iter()
        .filter_map(|field| {
            let config = field.options.get_message::<QueryConfig>(ext::QUERY)?;
            let param = if config.name.is_empty() {
                field.name.clone()
            } else {
                config.name
            };
            Some(QueryParam {
                field: field.name.clone(),
                json_name: field.json_name.clone(),
                param,
                required: config.required,
            })
        })
        .collect()
}

pub fn service_headers(service: &Service) -> Vec<Header> {
    service
        .options
        .get_message::<HeaderList>(ext::SERVICE_HEADERS)
        .map(|list| list.required_headers)
        .unwrap_or_default()
}

pub fn method_headers(method: &Method) -> Vec<Header> {
    method
        .options
        .get_message::<HeaderList>(ext::METHOD_HEADERS)
        .map(|list| list.required_headers)
        .unwrap_or_default()
}

/// Merges service headers with method headers; method headers win on name
/// clashes. Sorted by name for deterministic output; unnamed headers are
/// dropped.
pub fn combine_headers(service: Vec<Header>, method: Vec<Header>) -> Vec<Header> {
    if service.is_empty() {
        return method;
    }
    if method.is_empty() {
        return service;
    }
    let mut by_name = BTreeMap::new();
    for header in service.into_iter().chain(method) {
        if !header.name.is_empty() {
            by_name.insert(header.name.clone(), header);
        }
    }
    by_name.into_values().collect()
}
