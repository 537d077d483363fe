//! Encoding and decoding of the vendor's JSON envelope conventions.
//!
//! Record data always travels inside an outer object keyed by the collection
//! name (the last segment of the resource endpoint). Error payloads reuse the
//! same shape with `_ERROR_`-tagged messages, or key directly by record
//! identifier for deletes. Vendor error codes are embedded as substrings of
//! free-text messages (`TCMP_<digits>:<severity>:<text>`) and have to be
//! pattern-matched out.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::models::Resource;

pub(crate) const ATTR_ERROR: &str = "_ERROR_";
pub(crate) const ATTR_NEXT: &str = "next";
pub(crate) const ATTR_PIPELINES: &str = "pipelines";
pub(crate) const ATTR_EXPAND: &str = "expand";
pub(crate) const ATTR_FILTER: &str = "$filter";
pub(crate) const ATTR_ORDERBY: &str = "orderBy";
pub(crate) const ATTR_TOP: &str = "top";

/// Another record already holds the same key.
pub(crate) const ERROR_ALREADY_EXISTS: &str = "TCMP_35004";
/// A required field carries no value.
pub(crate) const ERROR_MISSING_FIELD: &str = "TCMP_1002";
/// No record for the requested identifier.
pub(crate) const ERROR_NOT_FOUND: &str = "TCMP_09007";
/// Cancelling a job that already left the grid; the run state is unaffected.
pub(crate) const ERROR_CANCEL_RACE: &str = "TCMP_60255";

fn unexpected(body: &Value) -> Error {
    Error::Malformed {
        message: format!("unexpected payload: {body}"),
    }
}

/// Serialize a resource or job into the flat wire mapping.
///
/// Unset optional fields are stripped rather than sent as `null`: the vendor
/// treats presence and absence as different things.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Value> {
    let mut encoded = serde_json::to_value(value).map_err(|err| Error::Malformed {
        message: format!("failed to encode request body: {err}"),
    })?;
    let Some(map) = encoded.as_object_mut() else {
        return Err(Error::Malformed {
            message: format!("request body is not an object: {encoded}"),
        });
    };
    map.retain(|_, member| !member.is_null());
    Ok(encoded)
}

/// Decode one wire record into a typed value.
///
/// Failure is a protocol problem, not a transport one; the error keeps the
/// serde field path and the offending input for diagnosis.
pub(crate) fn decode<T: DeserializeOwned>(value: &Value) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|err| Error::Malformed {
        message: format!("{err} on {value}"),
    })
}

/// Extract and decode the first record of a create/update response envelope.
pub(crate) fn first_record<T: Resource>(body: &Value) -> Result<T> {
    let records = records(T::collection(), body)?;
    let Some(record) = records.first() else {
        return Err(unexpected(body));
    };
    decode(record)
}

/// The record list under the collection key of a response envelope.
pub(crate) fn records<'a>(collection: &str, body: &'a Value) -> Result<&'a Vec<Value>> {
    body.get(collection)
        .and_then(Value::as_array)
        .ok_or_else(|| unexpected(body))
}

/// The continuation cursor of a list response, if any. The value is a
/// server-relative path that already carries its own query string.
pub(crate) fn next_uri(body: &Value) -> Option<&str> {
    body.get(ATTR_NEXT).and_then(Value::as_str)
}

/// Classify a rejected create.
///
/// Codes are probed in priority order: an `_ERROR_` tag with the
/// already-exists code wins, then a missing-required-value code on any field,
/// then a generic malformed-response fallback carrying the raw block.
pub(crate) fn classify_create(collection: &str, body: &Value) -> Error {
    let Some(errors) = body.get(collection).and_then(Value::as_array) else {
        return unexpected(body);
    };
    for record in errors {
        if let Some(message) = record.get(ATTR_ERROR).and_then(Value::as_str) {
            if message.contains(ERROR_ALREADY_EXISTS) {
                return Error::AlreadyExists(message.to_string());
            }
        }
        let Some(members) = record.as_object() else {
            continue;
        };
        let missing = members
            .iter()
            .any(|(_, v)| v.as_str().is_some_and(|s| s.contains(ERROR_MISSING_FIELD)));
        if missing {
            let fields: BTreeMap<String, String> = members
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            return Error::MissingFields { fields };
        }
    }
    Error::Malformed {
        message: format!("unexpected error: {body}"),
    }
}

/// Classify a rejected update. The vendor does not distinguish update
/// sub-cases the way it does for create; any tagged message is surfaced
/// as-is.
pub(crate) fn classify_update(collection: &str, body: &Value) -> Error {
    let Some(errors) = body.get(collection).and_then(Value::as_array) else {
        return unexpected(body);
    };
    for record in errors {
        if let Some(message) = record.get(ATTR_ERROR).and_then(Value::as_str) {
            return Error::Malformed {
                message: message.to_string(),
            };
        }
    }
    Error::Malformed {
        message: format!("unexpected error: {body}"),
    }
}

/// Classify a rejected delete. The error block is keyed by the identifier of
/// the record that could not be deleted, not a list.
pub(crate) fn classify_delete(collection: &str, seq: &str, body: &Value) -> Error {
    let Some(errors) = body.get(collection) else {
        return unexpected(body);
    };
    match errors.get(seq).and_then(Value::as_str) {
        Some(message) => Error::DeleteFailed(message.to_string()),
        None => unexpected(errors),
    }
}

/// Confirm a delete success body acknowledges the removed identifier.
pub(crate) fn acknowledged(collection: &str, seq: &str, body: &Value) -> Result<()> {
    let Some(records) = body.get(collection) else {
        return Err(unexpected(body));
    };
    if records.get(seq).is_none() {
        return Err(unexpected(records));
    }
    Ok(())
}

/// The seq of the pipeline created by a job submission:
/// `{"pipelines": {"0": ["<seq>"]}}`.
pub(crate) fn created_pipeline_seq(body: &Value) -> Result<String> {
    let Some(pipelines) = body.get(ATTR_PIPELINES) else {
        return Err(unexpected(body));
    };
    pipelines
        .get("0")
        .and_then(|created| created.get(0))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| unexpected(pipelines))
}

/// Classify a rejected job submission. The error block is keyed by the
/// literal batch index `"0"`; the vendor offers no finer taxonomy here.
pub(crate) fn classify_run_pipeline(body: &Value) -> Error {
    let Some(pipelines) = body.get(ATTR_PIPELINES) else {
        return unexpected(body);
    };
    match pipelines.get("0").and_then(Value::as_str) {
        Some(message) => Error::Malformed {
            message: message.to_string(),
        },
        None => unexpected(pipelines),
    }
}

/// Classify a rejected pipeline cancellation, keyed directly by the run seq.
///
/// A cancel-race message (`TCMP_60255`) is folded into success: the grid
/// already finished the job and its state is unaffected, so the failure is
/// spurious. This is a documented vendor quirk, not a general error-swallowing
/// policy.
pub(crate) fn classify_cancel_pipeline(seq: &str, body: &Value) -> Result<bool> {
    let Some(message) = body.get(seq).and_then(Value::as_str) else {
        return Err(unexpected(body));
    };
    if message.contains(ERROR_CANCEL_RACE) {
        return Ok(true);
    }
    Err(Error::Malformed {
        message: format!("unexpected payload: {message}"),
    })
}

/// `true` if any string anywhere in the payload carries the given vendor
/// code.
pub(crate) fn contains_code(body: &Value, code: &str) -> bool {
    match body {
        Value::String(s) => s.contains(code),
        Value::Array(items) => items.iter().any(|item| contains_code(item, code)),
        Value::Object(members) => members.values().any(|member| contains_code(member, code)),
        _ => false,
    }
}
