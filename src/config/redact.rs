//! Credential masking for configuration round trips.
//!
//! Reads sent to the browser replace every secret with [`MASK_TOKEN`]. When
//! the browser sends the document back, a value equal to the token means
//! "unchanged" and the store keeps the secret it already has.

use toml::Value;

use super::Document;

/// The reserved "value unchanged" sentinel.
pub const MASK_TOKEN: &str = "********";

/// Lower-case substrings that mark a key as holding a credential.
const CREDENTIAL_MARKERS: [&str; 3] = ["api_key", "secret", "password"];

/// `true` if `key` names a credential (`api_key`, `openai_api_key`,
/// `client_secret`, `Password`, …).
pub fn is_credential_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    CREDENTIAL_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Exact match against [`MASK_TOKEN`].
pub fn is_mask_token(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == MASK_TOKEN)
}

/// Return a copy of `doc` with every string under a credential key replaced
/// by [`MASK_TOKEN`], at any depth. Empty strings are masked too, so a read
/// never reveals whether a secret is set.
pub fn mask(doc: &Document) -> Document {
    let mut out = doc.clone();
    mask_table(&mut out);
    out
}

fn mask_table(table: &mut toml::Table) {
    for (key, value) in table.iter_mut() {
        if is_credential_key(key) {
            if let Value::String(s) = value {
                *s = MASK_TOKEN.to_string();
                continue;
            }
        }
        mask_value(value);
    }
}

fn mask_value(value: &mut Value) {
    match value {
        Value::Table(table) => mask_table(table),
        Value::Array(items) => items.iter_mut().for_each(mask_value),
        _ => {}
    }
}

/// Copy real secrets from `source` into `target` wherever `target` holds the
/// mask token under a credential key at the same path.
///
/// Used when an incoming array of tables replaces an existing one: the
/// structure comes from `target`, the secrets from `source`.
pub fn restore_masked(target: &mut toml::Table, source: &toml::Table) {
    for (key, value) in target.iter_mut() {
        let Some(original) = source.get(key) else {
            continue;
        };
        if is_credential_key(key) && is_mask_token(value) {
            *value = original.clone();
            continue;
        }
        match (value, original) {
            (Value::Table(t), Value::Table(s)) => restore_masked(t, s),
            (Value::Array(t), Value::Array(s)) => {
                for (t_item, s_item) in t.iter_mut().zip(s) {
                    if let (Value::Table(ti), Value::Table(si)) = (t_item, s_item) {
                        restore_masked(ti, si);
                    }
                }
            }
            _ => {}
        }
    }
}
