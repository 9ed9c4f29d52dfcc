//! # Wire protocol
//!
//! Newline-delimited JSON. One request per line, one response per line.
//!
//! ```text
//! → {"op":"put","key":"a","value":"1"}
//! ← {"ok":true,"value":1}
//! → {"op":"get","key":"a"}
//! ← {"ok":true,"value":"1"}
//! → {"op":"status"}
//! ← {"ok":true,"value":{"node_id":"…","applied":1}}
//! → {"op":"nope"}
//! ← {"ok":false,"error":"bad request: …"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Put { key: String, value: String },
    Get { key: String },
    Delete { key: String },
    Status,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(value: impl Into<Value>) -> Self {
        Self {
            ok: true,
            value: Some(value.into()),
            error: None,
        }
    }

    pub fn error(message: impl ToString) -> Self {
        Self {
            ok: false,
            value: None,
            error: Some(message.to_string()),
        }
    }
}
