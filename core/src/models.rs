use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::alias::generate_alias;
use crate::error::SyncError;

/// Language tag meaning "all languages".
pub const LANGUAGE_ALL: &str = "*";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub registered: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
}

/// One `profile_key`/`profile_value` row attached to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub user_id: i64,
    pub key: String,
    pub value: String,
    pub ordering: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    /// Zero until the contact has been stored.
    pub id: i64,
    pub name: String,
    pub alias: String,
    pub user_id: i64,
    pub email_to: String,
    pub catid: i64,
    pub access: i64,
    pub language: String,
    pub published: bool,
    pub address: Option<String>,
    pub suburb: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postcode: Option<String>,
    pub telephone: Option<String>,
    pub webpage: Option<String>,
    pub misc: Option<String>,
    /// Filled from the `position` profile attribute when the position plugin is on.
    pub position: Option<String>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
}

impl Contact {
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.id == 0
    }

    /// Business rules applied before the contact is written.
    pub fn check(&mut self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Validation(
                "Please provide a valid name".to_string(),
            ));
        }
        if self.catid <= 0 {
            return Err(SyncError::Validation(
                "A contact must belong to a category".to_string(),
            ));
        }

        self.alias = generate_alias(&self.alias, &self.name);

        if let Some(webpage) = self.webpage.as_deref() {
            let lower = webpage.trim().to_ascii_lowercase();
            if ["javascript:", "vbscript:", "data:"]
                .iter()
                .any(|scheme| lower.starts_with(scheme))
            {
                return Err(SyncError::Validation(format!(
                    "Please provide a valid URL: {webpage}"
                )));
            }
        }

        if !self.email_to.is_empty() && !is_plausible_email(&self.email_to) {
            return Err(SyncError::Validation(format!(
                "Invalid email address: {}",
                self.email_to
            )));
        }

        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

/// Which schema a custom field definition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldContext {
    User,
    Contact,
}

impl FieldContext {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "com_users.user",
            Self::Contact => "com_contact.contact",
        }
    }
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldContext {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "user" | "com_users.user" => Ok(Self::User),
            "contact" | "com_contact.contact" => Ok(Self::Contact),
            _ => bail!("Invalid field context '{s}'. Must be one of: user, contact"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: i64,
    pub context: FieldContext,
    pub name: String,
    pub label: String,
    /// Tag shared by a user field and the contact field it feeds.
    pub note: String,
    pub state: i64,
}

impl FieldDefinition {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state > 0
    }
}

#[derive(Debug, Clone)]
pub struct NewField {
    pub context: FieldContext,
    pub name: String,
    pub label: String,
    pub note: String,
    pub state: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field_id: i64,
    pub item_id: i64,
    pub value: String,
}

/// A user field paired with the contact field that receives its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCorrespondence {
    pub note: String,
    pub user_field_id: i64,
    pub contact_field_id: i64,
}

/// How replicated custom field values are written to the contact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    /// Always append a new row; repeated syncs leave duplicates behind.
    #[default]
    InsertAlways,
    /// Clear what the contact already holds for a field before writing it.
    UpsertByField,
}

impl ReplicationMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertAlways => "insert",
            Self::UpsertByField => "upsert",
        }
    }
}

impl FromStr for ReplicationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "insert" | "insert_always" => Ok(Self::InsertAlways),
            "upsert" | "upsert_by_field" => Ok(Self::UpsertByField),
            _ => bail!("Invalid field replication mode '{s}'. Must be one of: insert, upsert"),
        }
    }
}

pub const SETTING_CATEGORY: &str = "category";
pub const SETTING_AUTOPUBLISH: &str = "autopublish";
pub const SETTING_ACCESS: &str = "access";
pub const SETTING_POSITION_FIELD: &str = "position_field";
pub const SETTING_FIELD_REPLICATION: &str = "field_replication";

pub const SETTING_KEYS: [&str; 5] = [
    SETTING_CATEGORY,
    SETTING_AUTOPUBLISH,
    SETTING_ACCESS,
    SETTING_POSITION_FIELD,
    SETTING_FIELD_REPLICATION,
];

/// Plugin parameters driving a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Zero means no category has been configured.
    pub category_id: i64,
    pub autopublish: bool,
    pub access_level: i64,
    pub position_field: bool,
    pub replication: ReplicationMode,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            category_id: 0,
            autopublish: false,
            access_level: 1,
            position_field: false,
            replication: ReplicationMode::InsertAlways,
        }
    }
}

impl SyncSettings {
    /// Build settings from stored key/value pairs, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<Option<String>>,
    {
        let mut settings = Self::default();
        if let Some(v) = lookup(SETTING_CATEGORY)? {
            settings.category_id = parse_int(SETTING_CATEGORY, &v)?;
        }
        if let Some(v) = lookup(SETTING_AUTOPUBLISH)? {
            settings.autopublish = parse_flag(SETTING_AUTOPUBLISH, &v)?;
        }
        if let Some(v) = lookup(SETTING_ACCESS)? {
            settings.access_level = parse_int(SETTING_ACCESS, &v)?;
        }
        if let Some(v) = lookup(SETTING_POSITION_FIELD)? {
            settings.position_field = parse_flag(SETTING_POSITION_FIELD, &v)?;
        }
        if let Some(v) = lookup(SETTING_FIELD_REPLICATION)? {
            settings.replication = v.parse()?;
        }
        Ok(settings)
    }
}

/// Validate a plugin parameter and return its normalized stored form.
pub fn validate_setting(key: &str, value: &str) -> Result<String> {
    match key {
        SETTING_CATEGORY => {
            let id = parse_int(key, value)?;
            if id < 0 {
                bail!("Category id must not be negative");
            }
            Ok(id.to_string())
        }
        SETTING_ACCESS => Ok(parse_int(key, value)?.to_string()),
        SETTING_AUTOPUBLISH | SETTING_POSITION_FIELD => {
            Ok(if parse_flag(key, value)? { "1" } else { "0" }.to_string())
        }
        SETTING_FIELD_REPLICATION => Ok(value.parse::<ReplicationMode>()?.as_str().to_string()),
        _ => bail!(
            "Unknown setting '{key}'. Must be one of: {}",
            SETTING_KEYS.join(", ")
        ),
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| anyhow::anyhow!("Setting '{key}' expects an integer, got '{value}'"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => bail!("Setting '{key}' expects a boolean (1/0, true/false), got '{value}'"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Human-readable message queued for whoever triggered the sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    #[must_use]
    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }
}

/// Payload of the host's "user saved" lifecycle callback.
#[derive(Debug, Clone)]
pub struct UserSaveEvent {
    pub user: User,
    pub is_new: bool,
    pub success: bool,
    pub message: String,
}

/// What a successful sync produced.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub contact: Contact,
    pub created: bool,
    pub fields_replicated: usize,
}

/// A user to create together with the profile and custom field data saved alongside it.
#[derive(Debug, Clone)]
pub struct UserRegistration {
    pub user: NewUser,
    /// `(key, value)` pairs in display order; values are stored JSON-encoded.
    pub profile: Vec<(String, String)>,
    /// `(user field id, value)` pairs.
    pub fields: Vec<(i64, String)>,
}

/// Result of firing the after-save callback for one user.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub user: User,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactFieldEntry {
    pub field_id: i64,
    pub name: String,
    pub label: String,
    pub value: String,
}

/// A contact together with its custom field values.
#[derive(Debug, Clone, Serialize)]
pub struct ContactDetail {
    pub contact: Contact,
    pub fields: Vec<ContactFieldEntry>,
}
