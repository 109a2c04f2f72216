//! Structural validation for reported batches and participant identifiers.
//!
//! Reporters speak JSON. A batch is either an array of `{ "flagName", "increment" }`
//! objects or, as older single-flag clients send it, one such object. Validation stops
//! at the first malformed entry and rejects the whole batch.

use serde_json::Value;

use crate::progress::errors::ProgressError;
use crate::progress::types::FlagUpdate;

pub const MAX_IDENTIFIER_LEN: usize = 64;
pub const MAX_BATCH_LEN: usize = 256;

/// Identifier validation errors with helpful messages
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("{kind} is empty")]
    Empty { kind: &'static str },

    #[error("{kind} is too long (maximum {max} characters)")]
    TooLong { kind: &'static str, max: usize },

    #[error("{kind} contains invalid characters: {chars}")]
    InvalidCharacters { kind: &'static str, chars: String },
}

impl From<IdentifierError> for ProgressError {
    fn from(err: IdentifierError) -> Self {
        ProgressError::InvalidInput(err.to_string())
    }
}

fn validate_identifier(
    kind: &'static str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), IdentifierError> {
    if value.is_empty() {
        return Err(IdentifierError::Empty { kind });
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LEN,
        });
    }
    let bad: String = value.chars().filter(|c| !allowed(*c)).collect();
    if !bad.is_empty() {
        return Err(IdentifierError::InvalidCharacters { kind, chars: bad });
    }
    Ok(())
}

/// Participant ids are opaque, but they become store keys, so only ASCII letters,
/// digits, `-` and `_` are accepted.
pub fn validate_participant_id(id: &str) -> Result<(), IdentifierError> {
    validate_identifier("participant id", id, |c| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_'
    })
}

/// Flag names are open-ended and unknown names are created on write. Only empty,
/// over-long and control-character names are refused.
pub fn validate_flag_name(name: &str) -> Result<(), IdentifierError> {
    validate_identifier("flag name", name, |c| !c.is_control())
}

/// Check an already-typed batch: non-empty, bounded, every flag name well formed.
pub fn validate_batch(updates: &[FlagUpdate]) -> Result<(), ProgressError> {
    if updates.is_empty() {
        return Err(ProgressError::InvalidInput("update batch is empty".to_string()));
    }
    if updates.len() > MAX_BATCH_LEN {
        return Err(ProgressError::InvalidInput(format!(
            "update batch has {} entries (maximum {})",
            updates.len(),
            MAX_BATCH_LEN
        )));
    }
    for (index, update) in updates.iter().enumerate() {
        validate_flag_name(&update.flag_name).map_err(|e| {
            ProgressError::InvalidInput(format!("entry {}: {}", index, e))
        })?;
    }
    Ok(())
}

fn parse_entry(index: usize, entry: &Value) -> Result<FlagUpdate, ProgressError> {
    let Some(object) = entry.as_object() else {
        return Err(ProgressError::InvalidInput(format!(
            "entry {}: expected an object",
            index
        )));
    };
    let flag_name = match object.get("flagName") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => {
            return Err(ProgressError::InvalidInput(format!(
                "entry {}: flagName must be a string",
                index
            )))
        }
        None => {
            return Err(ProgressError::InvalidInput(format!(
                "entry {}: missing flagName",
                index
            )))
        }
    };
    let increment = match object.get("increment") {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            ProgressError::InvalidInput(format!(
                "entry {}: increment must be an integer, got {}",
                index, n
            ))
        })?,
        Some(_) => {
            return Err(ProgressError::InvalidInput(format!(
                "entry {}: increment must be a number",
                index
            )))
        }
        None => {
            return Err(ProgressError::InvalidInput(format!(
                "entry {}: missing increment",
                index
            )))
        }
    };
    Ok(FlagUpdate {
        flag_name,
        increment,
    })
}

/// Parse an untyped batch into validated updates.
pub fn parse_update_batch(raw: &Value) -> Result<Vec<FlagUpdate>, ProgressError> {
    let updates = match raw {
        Value::Array(entries) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(index, entry))
            .collect::<Result<Vec<_>, _>>()?,
        Value::Object(_) => vec![parse_entry(0, raw)?],
        _ => {
            return Err(ProgressError::InvalidInput(
                "update batch must be an array or an object".to_string(),
            ))
        }
    };
    validate_batch(&updates)?;
    Ok(updates)
}

/// Parse a CLI-style `name=delta` pair (`casino_losses=+2`, `code_failures=-1`).
pub fn parse_flag_assignment(text: &str) -> Result<FlagUpdate, ProgressError> {
    let Some((name, delta)) = text.split_once('=') else {
        return Err(ProgressError::InvalidInput(format!(
            "expected name=delta, got '{}'",
            text
        )));
    };
    let name = name.trim();
    validate_flag_name(name)?;
    let delta = delta.trim();
    let increment = delta
        .strip_prefix('+')
        .unwrap_or(delta)
        .parse::<i64>()
        .map_err(|e| ProgressError::InvalidInput(format!("bad increment '{}': {}", delta, e)))?;
    Ok(FlagUpdate::new(name, increment))
}
