//! Collaborator interfaces the contact sync runs against.
//!
//! The sync never talks to a database directly: it reads profiles, contacts
//! and custom fields through these traits, so any store (the bundled SQLite
//! one, or a test double) can sit behind it.

use std::sync::Mutex;

use crate::error::SyncResult;
use crate::models::{Contact, FieldContext, FieldCorrespondence, FieldValue, Message, ProfileEntry};

pub trait ContactStore {
    /// The contact already linked to `user_id`, if any.
    fn find_contact_by_user(&self, user_id: i64) -> SyncResult<Option<Contact>>;

    /// The contact holding `alias` inside `category_id`, if any.
    fn find_contact_by_alias(&self, alias: &str, category_id: i64) -> SyncResult<Option<Contact>>;

    /// Insert the contact when it is new (assigning its id), update it otherwise.
    fn store_contact(&self, contact: &mut Contact) -> SyncResult<()>;
}

pub trait ProfileStore {
    /// Profile rows of a user whose key starts with `key_prefix`, by ascending ordering.
    fn profile_entries(&self, user_id: i64, key_prefix: &str) -> SyncResult<Vec<ProfileEntry>>;
}

pub trait FieldStore {
    /// Active user fields paired with the active contact fields sharing their note.
    fn field_correspondences(&self) -> SyncResult<Vec<FieldCorrespondence>>;

    /// Every stored value for `item_id` on fields of the given context.
    fn field_values(&self, context: FieldContext, item_id: i64) -> SyncResult<Vec<FieldValue>>;

    /// Append a value row without looking at existing ones.
    fn insert_field_value(&self, value: &FieldValue) -> SyncResult<()>;

    /// Remove every row for `(field_id, item_id)`, returning how many went.
    fn delete_field_values(&self, field_id: i64, item_id: i64) -> SyncResult<usize>;
}

/// A store able to back a complete sync.
pub trait SyncStore: ContactStore + ProfileStore + FieldStore {
    /// Run `f` as a single unit of work.
    ///
    /// Stores with transactions discard everything `f` wrote when it fails.
    /// The default runs `f` as is.
    fn atomically<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce() -> SyncResult<T>,
    {
        f()
    }
}

/// Receiver for user-facing messages raised during a sync.
pub trait MessageSink {
    fn enqueue(&self, message: Message);
}

/// Sink that keeps messages until someone drains them.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<Vec<Message>>,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Message> {
        match self.messages.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().map_or(0, |guard| guard.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MessageSink for MessageQueue {
    fn enqueue(&self, message: Message) {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}
