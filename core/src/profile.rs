use std::collections::HashMap;

use serde_json::Value;

use crate::models::{Contact, ProfileEntry};

/// Only profile rows whose key starts with this prefix are merged.
pub const PROFILE_KEY_PREFIX: &str = "profile";

/// Strip the `profile.` / `profilep.` namespaces from a stored key.
#[must_use]
pub fn canonical_key(key: &str) -> String {
    key.replace("profile.", "").replace("profilep.", "")
}

/// Key under which a profile attribute is stored; bare keys go to the `profile.` namespace.
#[must_use]
pub fn storage_key(key: &str) -> String {
    let key = key.trim();
    if key.starts_with(PROFILE_KEY_PREFIX) {
        key.to_string()
    } else {
        format!("{PROFILE_KEY_PREFIX}.{key}")
    }
}

/// Decode a JSON-encoded profile value, keeping the raw text when it is not JSON or is `null`.
#[must_use]
pub fn decode_profile_value(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) | Err(_) => raw.to_string(),
        Ok(Value::String(s)) => s,
        Ok(Value::Bool(b)) => String::from(if b { "1" } else { "" }),
        Ok(Value::Number(n)) => n.to_string(),
        Ok(other) => other.to_string(),
    }
}

/// Fold ordered profile rows into a canonical key → value map. Later rows win.
#[must_use]
pub fn collect_profile(entries: &[ProfileEntry]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|e| (canonical_key(&e.key), decode_profile_value(&e.value)))
        .collect()
}

/// Copy profile attributes onto the address-like contact fields.
///
/// Every mapped field is overwritten; a missing attribute leaves `None`.
/// `position` is only touched when the position plugin is enabled.
pub fn apply_profile(profile: &HashMap<String, String>, contact: &mut Contact, position_field: bool) {
    let get = |key: &str| profile.get(key).cloned();

    let address1 = profile.get("address1");
    let address2 = profile.get("address2");
    contact.address = if address1.is_none() && address2.is_none() {
        None
    } else {
        Some(format!(
            "{} {}",
            address1.map_or("", String::as_str),
            address2.map_or("", String::as_str)
        ))
    };

    contact.suburb = get("city");
    contact.state = get("region");
    contact.country = get("country");
    contact.postcode = get("postal_code");
    contact.telephone = get("phone");
    contact.webpage = get("website");
    contact.misc = get("favoritebook");

    if position_field {
        contact.position = get("position");
    }
}
