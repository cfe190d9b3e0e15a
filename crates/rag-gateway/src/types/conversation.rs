//! Conversation history types and request validation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of a conversation, forwarded verbatim to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Validated body of `POST /chat`
///
/// Wire shape: `{"contents": [{"role": "user", "parts": [{"text": "..."}]}, ...]}`.
/// Parts of one turn are joined with a newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    /// Parse and validate a raw request body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::malformed(format!("request body is not valid JSON: {}", e)))?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed JSON document
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::malformed("request body must be a JSON object"))?;

        let contents = object
            .get("contents")
            .ok_or_else(|| Error::malformed("'contents' is required"))?
            .as_array()
            .ok_or_else(|| Error::malformed("'contents' must be a list"))?;

        if contents.is_empty() {
            return Err(Error::malformed("'contents' must not be empty"));
        }

        let history = contents
            .iter()
            .enumerate()
            .map(|(index, turn)| parse_turn(index, turn))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { history })
    }
}

fn parse_turn(index: usize, turn: &Value) -> Result<ConversationTurn> {
    let turn = turn
        .as_object()
        .ok_or_else(|| Error::malformed(format!("turn {} must be an object", index)))?;

    let role = match turn.get("role") {
        None => return Err(Error::malformed(format!("turn {} is missing 'role'", index))),
        Some(Value::String(role)) => Role::parse(role).ok_or_else(|| {
            Error::malformed(format!(
                "turn {} has unknown role '{}' (expected 'user' or 'model')",
                index, role
            ))
        })?,
        Some(_) => {
            return Err(Error::malformed(format!(
                "turn {} 'role' must be a string",
                index
            )))
        }
    };

    let parts = turn
        .get("parts")
        .ok_or_else(|| Error::malformed(format!("turn {} is missing 'parts'", index)))?
        .as_array()
        .ok_or_else(|| Error::malformed(format!("turn {} 'parts' must be a list", index)))?;

    if parts.is_empty() {
        return Err(Error::malformed(format!(
            "turn {} 'parts' must not be empty",
            index
        )));
    }

    let texts = parts
        .iter()
        .map(|part| {
            part.get("text").and_then(Value::as_str).ok_or_else(|| {
                Error::malformed(format!("turn {} has a part without 'text'", index))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ConversationTurn {
        role,
        text: texts.join("\n"),
    })
}
