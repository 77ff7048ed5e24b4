// Copyright 2025 msgrpc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! JSON ⇄ MessagePack value conversion for the command line.

use msgrpc_common::Value;
use serde_json::{Map, Number, Value as Json};

/// Converts a JSON value into the MessagePack value sent on the wire.
///
/// Integers stay integers; every other number becomes a 64-bit float.
pub fn json_to_value(json: Json) -> Value {
    match json {
        Json::Null => Value::Nil,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::from(s),
        Json::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        Json::Object(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::from(k), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Converts a MessagePack value into JSON for display.
///
/// Binary becomes an array of byte values, non-finite floats become `null`,
/// and non-string map keys are rendered with their MessagePack display form.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Nil => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(i) => {
            if let Some(n) = i.as_i64() {
                Json::from(n)
            } else if let Some(n) = i.as_u64() {
                Json::from(n)
            } else {
                Json::Null
            }
        }
        Value::F32(f) => float(f64::from(*f)),
        Value::F64(f) => float(*f),
        Value::String(s) => match s.as_str() {
            Some(s) => Json::String(s.to_string()),
            None => Json::Array(s.as_bytes().iter().map(|b| Json::from(*b)).collect()),
        },
        Value::Binary(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let mut object = Map::with_capacity(entries.len());
            for (k, v) in entries {
                let key = match k.as_str() {
                    Some(s) => s.to_string(),
                    None => k.to_string(),
                };
                object.insert(key, value_to_json(v));
            }
            Json::Object(object)
        }
        Value::Ext(tag, bytes) => Json::Array(vec![
            Json::from(*tag),
            Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        ]),
    }
}

fn float(f: f64) -> Json {
    Number::from_f64(f).map(Json::Number).unwrap_or(Json::Null)
}

/// Parses each command-line argument as JSON. A word that is not valid JSON
/// is taken as a plain string, so `greet World` works without quoting.
pub fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| match serde_json::from_str(arg) {
            Ok(json) => json_to_value(json),
            Err(_) => Value::from(arg.as_str()),
        })
        .collect()
}
