//! Keeps a contact record in step with a newly created user.
//!
//! A sync loads (or starts) the contact linked to the user, copies identity
//! fields, picks a collision-free name/alias pair for new contacts, merges
//! the user's profile attributes, writes the contact and finally copies the
//! user's custom field values onto it.
//!
//! Every step runs inside [`SyncStore::atomically`]. Any failure aborts the
//! whole sync, is reported once to the message sink and is returned to the
//! caller; on a transactional store nothing is left half written.

use tracing::{debug, info, warn};

use crate::alias::{IncrementStyle, generate_alias, increment};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    Contact, FieldContext, FieldValue, LANGUAGE_ALL, Message, ReplicationMode, SyncReport,
    SyncSettings, User, UserSaveEvent,
};
use crate::profile::{PROFILE_KEY_PREFIX, apply_profile, collect_profile};
use crate::store::{MessageSink, SyncStore};

pub const NO_CATEGORY_MESSAGE: &str =
    "No contact category configured; cannot create a contact for this user";

pub struct ContactSyncer<'a, S: SyncStore> {
    store: &'a S,
    settings: SyncSettings,
    sink: &'a dyn MessageSink,
}

impl<'a, S: SyncStore> ContactSyncer<'a, S> {
    pub fn new(store: &'a S, settings: SyncSettings, sink: &'a dyn MessageSink) -> Self {
        Self {
            store,
            settings,
            sink,
        }
    }

    /// Host callback fired after a user has been saved.
    ///
    /// Only successfully stored, brand new users with a real id are synced.
    pub fn on_user_after_save(&self, event: &UserSaveEvent) -> bool {
        if !event.success {
            debug!(user_id = event.user.id, "user was not stored, skipping contact sync");
            return false;
        }
        if !event.is_new {
            debug!(user_id = event.user.id, "existing user updated, skipping contact sync");
            return false;
        }
        if event.user.id <= 0 {
            debug!(user_id = event.user.id, "user id is not valid, skipping contact sync");
            return false;
        }
        self.sync(&event.user).is_ok()
    }

    /// Create or update the contact linked to `user`.
    pub fn sync(&self, user: &User) -> SyncResult<SyncReport> {
        let result = self.try_sync(user);
        match &result {
            Ok(report) => info!(
                user_id = user.id,
                contact_id = report.contact.id,
                created = report.created,
                fields = report.fields_replicated,
                "contact synced"
            ),
            Err(err) => self.report_failure(user, err),
        }
        result
    }

    fn try_sync(&self, user: &User) -> SyncResult<SyncReport> {
        if user.id <= 0 {
            return Err(SyncError::Validation(format!(
                "User id must be a positive integer, got {}",
                user.id
            )));
        }
        let category_id = self.settings.category_id;
        if category_id <= 0 {
            return Err(SyncError::Configuration(NO_CATEGORY_MESSAGE.to_string()));
        }

        self.store.atomically(|| {
            let mut contact = match self.store.find_contact_by_user(user.id)? {
                Some(existing) => {
                    debug!(user_id = user.id, contact_id = existing.id, "updating linked contact");
                    existing
                }
                None => Contact {
                    published: self.settings.autopublish,
                    ..Contact::default()
                },
            };

            contact.name.clone_from(&user.name);
            contact.user_id = user.id;
            contact.email_to.clone_from(&user.email);
            contact.catid = category_id;
            contact.access = self.settings.access_level;
            contact.language = LANGUAGE_ALL.to_string();
            contact.alias = generate_alias(&contact.alias, &contact.name);

            let created = contact.is_new();
            if created {
                let (name, alias) = self.deduplicate(&contact.alias, &contact.name, category_id)?;
                contact.name = name;
                contact.alias = alias;
            }

            self.merge_profile(user.id, &mut contact)?;

            contact.check()?;
            self.store.store_contact(&mut contact)?;

            let fields_replicated = self.replicate_fields(user.id, contact.id)?;

            Ok(SyncReport {
                contact,
                created,
                fields_replicated,
            })
        })
    }

    fn report_failure(&self, user: &User, err: &SyncError) {
        let text = match err {
            SyncError::Configuration(_) => NO_CATEGORY_MESSAGE.to_string(),
            other => format!("Failed creating contact: {other}"),
        };
        warn!(user_id = user.id, kind = err.kind(), "{text}");
        self.sink.enqueue(Message::warning(text));
    }

    /// Fill the address-like fields of `contact` from the user's profile.
    pub fn merge_profile(&self, user_id: i64, contact: &mut Contact) -> SyncResult<()> {
        let entries = self.store.profile_entries(user_id, PROFILE_KEY_PREFIX)?;
        debug!(user_id, entries = entries.len(), "merging profile");
        let profile = collect_profile(&entries);
        apply_profile(&profile, contact, self.settings.position_field);
        Ok(())
    }

    /// Find a `(name, alias)` pair whose alias no contact in `category_id` holds yet.
    ///
    /// The alias is bumped on every collision; the name only when it also
    /// equals the colliding contact's name.
    pub fn deduplicate(
        &self,
        alias: &str,
        name: &str,
        category_id: i64,
    ) -> SyncResult<(String, String)> {
        let mut name = name.to_string();
        let mut alias = alias.to_string();

        while let Some(existing) = self.store.find_contact_by_alias(&alias, category_id)? {
            if name == existing.name {
                name = increment(&name, IncrementStyle::Default);
            }
            alias = increment(&alias, IncrementStyle::Dash);
        }

        Ok((name, alias))
    }

    /// Copy the user's custom field values onto the contact's matching fields.
    ///
    /// Returns the number of rows written.
    pub fn replicate_fields(&self, user_id: i64, contact_id: i64) -> SyncResult<usize> {
        let correspondences = self.store.field_correspondences()?;
        if correspondences.is_empty() {
            return Ok(0);
        }

        let mut rows = Vec::new();
        for value in self.store.field_values(FieldContext::User, user_id)? {
            for pair in correspondences
                .iter()
                .filter(|c| c.user_field_id == value.field_id)
            {
                rows.push(FieldValue {
                    field_id: pair.contact_field_id,
                    item_id: contact_id,
                    value: value.value.clone(),
                });
            }
        }

        if self.settings.replication == ReplicationMode::UpsertByField {
            let mut cleared = Vec::new();
            for row in &rows {
                if !cleared.contains(&row.field_id) {
                    self.store.delete_field_values(row.field_id, contact_id)?;
                    cleared.push(row.field_id);
                }
            }
        }

        for row in &rows {
            self.store.insert_field_value(row)?;
        }
        debug!(user_id, contact_id, rows = rows.len(), "replicated custom fields");
        Ok(rows.len())
    }
}
