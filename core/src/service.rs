use std::path::Path;

use anyhow::Result;

use crate::db::Database;
use crate::models::{
    Contact, ContactDetail, ContactFieldEntry, FieldContext, FieldDefinition, NewField, NewUser,
    SyncOutcome, SyncSettings, User, UserRegistration, UserSaveEvent,
};
use crate::profile::{canonical_key, decode_profile_value, storage_key};
use crate::store::{ContactStore, FieldStore, MessageQueue};
use crate::sync::ContactSyncer;

/// Host-side facade: owns the store and fires the user lifecycle callback.
pub struct ContactSyncService {
    db: Database,
}

impl ContactSyncService {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Settings ---

    pub fn settings(&self) -> Result<SyncSettings> {
        self.db.load_sync_settings()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<String> {
        self.db.set_setting(key, value)
    }

    pub fn clear_setting(&self, key: &str) -> Result<bool> {
        self.db.delete_setting(key)
    }

    // --- Users ---

    /// Create a user with its profile and field values, then fire the after-save callback.
    pub fn register_user(&self, registration: &UserRegistration) -> Result<SyncOutcome> {
        let user = self.db.insert_user(&registration.user)?;

        let mut ordering = 0;
        for (key, value) in &registration.profile {
            ordering += 1;
            let encoded = serde_json::to_string(value)?;
            self.db
                .set_profile_value(user.id, &storage_key(key), &encoded, ordering)?;
        }
        for (field_id, value) in &registration.fields {
            self.db.set_user_field_value(*field_id, user.id, value)?;
        }

        self.user_saved(&UserSaveEvent {
            user,
            is_new: true,
            success: true,
            message: String::new(),
        })
    }

    /// Shorthand for registering a user with no profile or field data.
    pub fn add_user(&self, user: &NewUser) -> Result<SyncOutcome> {
        self.register_user(&UserRegistration {
            user: user.clone(),
            profile: Vec::new(),
            fields: Vec::new(),
        })
    }

    /// Deliver a user save event to the syncer.
    pub fn user_saved(&self, event: &UserSaveEvent) -> Result<SyncOutcome> {
        let sink = MessageQueue::new();
        let syncer = ContactSyncer::new(&self.db, self.settings()?, &sink);

        let synced = syncer.on_user_after_save(event);
        let contact = if synced {
            self.db.find_contact_by_user(event.user.id)?
        } else {
            None
        };

        Ok(SyncOutcome {
            user: event.user.clone(),
            synced,
            contact,
            messages: sink.drain(),
        })
    }

    /// Run the sync again for an existing user, regardless of the new-user guard.
    pub fn resync_user(&self, user_id: i64) -> Result<SyncOutcome> {
        let user = self.db.get_user(user_id)?;
        let sink = MessageQueue::new();
        let syncer = ContactSyncer::new(&self.db, self.settings()?, &sink);

        let contact = syncer.sync(&user).ok().map(|report| report.contact);
        Ok(SyncOutcome {
            user,
            synced: contact.is_some(),
            contact,
            messages: sink.drain(),
        })
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.db.get_user(id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }

    /// Profile attributes of a user, keyed without namespace and decoded.
    pub fn user_profile(&self, user_id: i64) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .get_profile(user_id)?
            .into_iter()
            .map(|e| (canonical_key(&e.key), decode_profile_value(&e.value)))
            .collect())
    }

    // --- Contacts ---

    pub fn list_contacts(&self, category_id: Option<i64>) -> Result<Vec<Contact>> {
        self.db.list_contacts(category_id)
    }

    pub fn contact_detail(&self, id: i64) -> Result<ContactDetail> {
        let contact = self.db.get_contact(id)?;
        let definitions = self.db.list_fields(Some(FieldContext::Contact))?;

        let fields = self
            .db
            .field_values(FieldContext::Contact, contact.id)?
            .into_iter()
            .map(|v| {
                let def = definitions.iter().find(|d| d.id == v.field_id);
                ContactFieldEntry {
                    field_id: v.field_id,
                    name: def.map(|d| d.name.clone()).unwrap_or_default(),
                    label: def.map(|d| d.label.clone()).unwrap_or_default(),
                    value: v.value,
                }
            })
            .collect();

        Ok(ContactDetail { contact, fields })
    }

    // --- Custom fields ---

    pub fn add_field(&self, field: &NewField) -> Result<FieldDefinition> {
        self.db.insert_field(field)
    }

    pub fn list_fields(&self, context: Option<FieldContext>) -> Result<Vec<FieldDefinition>> {
        self.db.list_fields(context)
    }

    pub fn set_field_state(&self, id: i64, state: i64) -> Result<bool> {
        self.db.set_field_state(id, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageLevel;

    fn registration(name: &str, username: &str) -> UserRegistration {
        UserRegistration {
            user: NewUser {
                name: name.to_string(),
                username: username.to_string(),
                email: format!("{username}@x.com"),
            },
            profile: vec![
                ("address1".to_string(), "1 Main St".to_string()),
                ("address2".to_string(), String::new()),
                ("city".to_string(), "Springfield".to_string()),
                ("country".to_string(), "US".to_string()),
            ],
            fields: Vec::new(),
        }
    }

    fn configured() -> ContactSyncService {
        let service = ContactSyncService::new_in_memory().unwrap();
        service.set_setting("category", "5").unwrap();
        service.set_setting("autopublish", "1").unwrap();
        service
    }

    #[test]
    fn test_register_user_creates_contact() {
        let service = configured();
        let outcome = service.register_user(&registration("Jane Doe", "jane")).unwrap();

        assert!(outcome.synced);
        assert!(outcome.messages.is_empty());
        let contact = outcome.contact.unwrap();
        assert_eq!(contact.user_id, outcome.user.id);
        assert_eq!(contact.address.as_deref(), Some("1 Main St "));
        assert_eq!(contact.suburb.as_deref(), Some("Springfield"));
        assert!(contact.published);
    }

    #[test]
    fn test_register_without_category_warns() {
        let service = ContactSyncService::new_in_memory().unwrap();
        let outcome = service.register_user(&registration("Jane Doe", "jane")).unwrap();

        assert!(!outcome.synced);
        assert!(outcome.contact.is_none());
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].level, MessageLevel::Warning);
        assert!(service.list_contacts(None).unwrap().is_empty());
        // The user itself is still created.
        assert_eq!(service.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_existing_user_save_is_ignored() {
        let service = configured();
        let outcome = service.register_user(&registration("Jane Doe", "jane")).unwrap();
        let before = service.contact_detail(outcome.contact.unwrap().id).unwrap();

        let again = service
            .user_saved(&UserSaveEvent {
                user: User {
                    name: "Jane Smith".to_string(),
                    ..outcome.user.clone()
                },
                is_new: false,
                success: true,
                message: String::new(),
            })
            .unwrap();
        assert!(!again.synced);

        let after = service.contact_detail(before.contact.id).unwrap();
        assert_eq!(after.contact.name, "Jane Doe");
    }

    #[test]
    fn test_resync_updates_contact_and_duplicates_fields() {
        let service = configured();
        let u_field = service
            .add_field(&NewField {
                context: FieldContext::User,
                name: "mobile".to_string(),
                label: "Mobile".to_string(),
                note: "phone".to_string(),
                state: 1,
            })
            .unwrap();
        service
            .add_field(&NewField {
                context: FieldContext::Contact,
                name: "contact-mobile".to_string(),
                label: "Mobile".to_string(),
                note: "phone".to_string(),
                state: 1,
            })
            .unwrap();

        let mut reg = registration("Jane Doe", "jane");
        reg.fields.push((u_field.id, "555-0100".to_string()));
        let outcome = service.register_user(&reg).unwrap();
        let contact_id = outcome.contact.unwrap().id;
        assert_eq!(service.contact_detail(contact_id).unwrap().fields.len(), 1);

        let resync = service.resync_user(outcome.user.id).unwrap();
        assert!(resync.synced);
        assert_eq!(resync.contact.unwrap().id, contact_id);

        let detail = service.contact_detail(contact_id).unwrap();
        assert_eq!(detail.fields.len(), 2);
        assert_eq!(detail.fields[0].label, "Mobile");
        assert_eq!(detail.fields[0].value, "555-0100");
    }

    #[test]
    fn test_user_profile_is_decoded_in_order() {
        let service = configured();
        let outcome = service.register_user(&registration("Jane Doe", "jane")).unwrap();

        let profile = service.user_profile(outcome.user.id).unwrap();
        assert_eq!(
            profile,
            vec![
                ("address1".to_string(), "1 Main St".to_string()),
                ("address2".to_string(), String::new()),
                ("city".to_string(), "Springfield".to_string()),
                ("country".to_string(), "US".to_string()),
            ]
        );
    }

    #[test]
    fn test_resync_unknown_user_errors() {
        let service = configured();
        assert!(service.resync_user(404).is_err());
    }
}
