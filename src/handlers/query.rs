use std::collections::HashMap;

use axum::{extract::rejection::JsonRejection, Json};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatch::{FindOptions, DEFAULT_LIMIT};
use crate::error::WarpError;
use crate::query::Row;

pub type QueryParams = HashMap<String, String>;

/// `include`, `where`, `order`, `limit`, `skip`; the first three are JSON strings.
pub fn find_options(params: &QueryParams) -> Result<FindOptions, WarpError> {
    Ok(FindOptions {
        include: include_list(params)?,
        where_clause: json_param(params, "where")?.unwrap_or_else(|| Value::Object(Default::default())),
        sort: json_param(params, "order")?.unwrap_or_else(|| Value::Array(vec![])),
        limit: integer_param(params, "limit")?.unwrap_or(DEFAULT_LIMIT),
        skip: integer_param(params, "skip")?.unwrap_or(0),
    })
}

pub fn include_list(params: &QueryParams) -> Result<Vec<String>, WarpError> {
    match json_param(params, "include")? {
        None => Ok(vec![]),
        Some(value) => serde_json::from_value(value)
            .map_err(|_| WarpError::invalid_parameter("include must be an array of keys")),
    }
}

fn json_param(params: &QueryParams, name: &str) -> Result<Option<Value>, WarpError> {
    match params.get(name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| WarpError::invalid_parameter(format!("{} is not valid JSON: {}", name, e))),
    }
}

fn integer_param(params: &QueryParams, name: &str) -> Result<Option<i64>, WarpError> {
    match params.get(name).map(String::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| WarpError::invalid_parameter(format!("{} must be an integer", name))),
    }
}

pub fn parse_id(raw: &str) -> Result<i64, WarpError> {
    raw.parse()
        .map_err(|_| WarpError::invalid_parameter(format!("Invalid id: {}", raw)))
}

pub fn body_object(body: Result<Json<Value>, JsonRejection>) -> Result<Row, WarpError> {
    match body {
        Ok(Json(Value::Object(map))) => Ok(map),
        Ok(_) => Err(WarpError::invalid_parameter("Request body must be a JSON object")),
        Err(rejection) => Err(WarpError::invalid_parameter(rejection.body_text())),
    }
}

pub fn body_as<T: DeserializeOwned>(body: Result<Json<Value>, JsonRejection>) -> Result<T, WarpError> {
    let object = body_object(body)?;
    serde_json::from_value(Value::Object(object))
        .map_err(|e| WarpError::invalid_parameter(e.to_string()))
}
