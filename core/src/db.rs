use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{SyncError, SyncResult};
use crate::models::{
    Contact, FieldContext, FieldCorrespondence, FieldDefinition, FieldValue, NewField, NewUser,
    ProfileEntry, SyncSettings, User, validate_setting,
};
use crate::store::{ContactStore, FieldStore, ProfileStore, SyncStore};

const CONTACT_COLUMNS: &str = "id, name, alias, user_id, email_to, catid, access, language, \
     published, address, suburb, state, country, postcode, telephone, webpage, misc, \
     con_position, created, modified";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    username TEXT NOT NULL UNIQUE,
                    email TEXT NOT NULL,
                    registered TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS user_profiles (
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    profile_key TEXT NOT NULL,
                    profile_value TEXT NOT NULL,
                    ordering INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (user_id, profile_key)
                );

                CREATE TABLE IF NOT EXISTS contacts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    alias TEXT NOT NULL,
                    user_id INTEGER NOT NULL DEFAULT 0,
                    email_to TEXT NOT NULL DEFAULT '',
                    catid INTEGER NOT NULL,
                    access INTEGER NOT NULL DEFAULT 1,
                    language TEXT NOT NULL DEFAULT '*',
                    published INTEGER NOT NULL DEFAULT 0,
                    address TEXT,
                    suburb TEXT,
                    state TEXT,
                    country TEXT,
                    postcode TEXT,
                    telephone TEXT,
                    webpage TEXT,
                    misc TEXT,
                    con_position TEXT,
                    created TEXT NOT NULL,
                    modified TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_alias ON contacts(catid, alias);
                CREATE INDEX IF NOT EXISTS idx_contacts_user ON contacts(user_id);

                CREATE TABLE IF NOT EXISTS fields (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    context TEXT NOT NULL,
                    name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    note TEXT NOT NULL DEFAULT '',
                    state INTEGER NOT NULL DEFAULT 1,
                    created TEXT NOT NULL
                );

                -- No uniqueness: repeated syncs may append duplicate rows.
                CREATE TABLE IF NOT EXISTS fields_values (
                    field_id INTEGER NOT NULL REFERENCES fields(id) ON DELETE CASCADE,
                    item_id INTEGER NOT NULL,
                    value TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_fields_context ON fields(context, note);
                CREATE INDEX IF NOT EXISTS idx_fields_values_item ON fields_values(field_id, item_id);

                PRAGMA user_version = 1;",
            )?;
        }

        if version < 2 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 2;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            username: row.get(2)?,
            email: row.get(3)?,
            registered: row.get(4)?,
        })
    }

    // Expects CONTACT_COLUMNS, in order.
    fn contact_from_row(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
        Ok(Contact {
            id: row.get(0)?,
            name: row.get(1)?,
            alias: row.get(2)?,
            user_id: row.get(3)?,
            email_to: row.get(4)?,
            catid: row.get(5)?,
            access: row.get(6)?,
            language: row.get(7)?,
            published: row.get(8)?,
            address: row.get(9)?,
            suburb: row.get(10)?,
            state: row.get(11)?,
            country: row.get(12)?,
            postcode: row.get(13)?,
            telephone: row.get(14)?,
            webpage: row.get(15)?,
            misc: row.get(16)?,
            position: row.get(17)?,
            created: row.get(18)?,
            modified: row.get(19)?,
        })
    }

    fn field_from_row(row: &rusqlite::Row) -> rusqlite::Result<FieldDefinition> {
        let context: String = row.get(1)?;
        let context = context.parse::<FieldContext>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        Ok(FieldDefinition {
            id: row.get(0)?,
            context,
            name: row.get(2)?,
            label: row.get(3)?,
            note: row.get(4)?,
            state: row.get(5)?,
        })
    }

    // --- Users ---

    pub fn insert_user(&self, user: &NewUser) -> Result<User> {
        let name = user.name.trim();
        let email = user.email.trim();
        if name.is_empty() {
            bail!("User name must not be empty");
        }
        let username = if user.username.trim().is_empty() {
            email
        } else {
            user.username.trim()
        };
        if username.is_empty() {
            bail!("User needs a username or an email address");
        }

        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO users (name, username, email, registered) VALUES (?1, ?2, ?3, ?4)",
                params![name, username, email, now],
            )
            .with_context(|| format!("Failed to create user '{username}'"))?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)
    }

    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, name, username, email, registered FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .optional()?
            .with_context(|| format!("User {id} not found"))
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, username, email, registered FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn set_profile_value(
        &self,
        user_id: i64,
        key: &str,
        value: &str,
        ordering: i64,
    ) -> Result<()> {
        if key.trim().is_empty() {
            bail!("Profile key must not be empty");
        }
        self.conn
            .execute(
                "INSERT INTO user_profiles (user_id, profile_key, profile_value, ordering)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id, profile_key) DO UPDATE SET
                     profile_value = excluded.profile_value,
                     ordering = excluded.ordering",
                params![user_id, key, value, ordering],
            )
            .with_context(|| format!("Failed to store profile key '{key}' for user {user_id}"))?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: i64) -> Result<Vec<ProfileEntry>> {
        Ok(self.profile_entries(user_id, "")?)
    }

    // --- Custom fields ---

    pub fn insert_field(&self, field: &NewField) -> Result<FieldDefinition> {
        if field.name.trim().is_empty() {
            bail!("Field name must not be empty");
        }
        let label = if field.label.trim().is_empty() {
            field.name.trim()
        } else {
            field.label.trim()
        };
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO fields (context, name, label, note, state, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                field.context.as_str(),
                field.name.trim(),
                label,
                field.note.trim(),
                field.state,
                now
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_field(id)
    }

    pub fn get_field(&self, id: i64) -> Result<FieldDefinition> {
        self.conn
            .query_row(
                "SELECT id, context, name, label, note, state FROM fields WHERE id = ?1",
                params![id],
                Self::field_from_row,
            )
            .optional()?
            .with_context(|| format!("Field {id} not found"))
    }

    pub fn list_fields(&self, context: Option<FieldContext>) -> Result<Vec<FieldDefinition>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, context, name, label, note, state FROM fields
             WHERE ?1 IS NULL OR context = ?1
             ORDER BY context, id",
        )?;
        let fields = stmt
            .query_map(params![context.map(FieldContext::as_str)], Self::field_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(fields)
    }

    pub fn set_field_state(&self, id: i64, state: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE fields SET state = ?1 WHERE id = ?2",
            params![state, id],
        )?;
        Ok(rows > 0)
    }

    /// Set the value a user holds for a user-context field, replacing any previous one.
    pub fn set_user_field_value(&self, field_id: i64, user_id: i64, value: &str) -> Result<()> {
        let field = self.get_field(field_id)?;
        if field.context != FieldContext::User {
            bail!(
                "Field {field_id} ('{}') is not a user field",
                field.name
            );
        }
        self.delete_field_values(field_id, user_id)?;
        self.insert_field_value(&FieldValue {
            field_id,
            item_id: user_id,
            value: value.to_string(),
        })?;
        Ok(())
    }

    pub fn count_field_values(&self, field_id: i64, item_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM fields_values WHERE field_id = ?1 AND item_id = ?2",
            params![field_id, item_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Contacts ---

    pub fn get_contact(&self, id: i64) -> Result<Contact> {
        self.conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
                params![id],
                Self::contact_from_row,
            )
            .optional()?
            .with_context(|| format!("Contact {id} not found"))
    }

    pub fn list_contacts(&self, category_id: Option<i64>) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE ?1 IS NULL OR catid = ?1
             ORDER BY catid, name"
        ))?;
        let contacts = stmt
            .query_map(params![category_id], Self::contact_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(contacts)
    }

    pub fn count_contacts_for_user(&self, user_id: i64) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Insert a contact directly, bypassing the sync. Used to seed categories.
    pub fn insert_contact(&self, contact: &Contact) -> Result<Contact> {
        let mut contact = contact.clone();
        contact.id = 0;
        contact.check()?;
        self.store_contact(&mut contact)?;
        Ok(contact)
    }

    // --- Settings ---

    /// Store a plugin parameter after validating it.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<String> {
        let value = validate_setting(key, value)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(value)
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    pub fn load_sync_settings(&self) -> Result<SyncSettings> {
        SyncSettings::from_lookup(|key| self.get_setting(key))
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn persistence(err: rusqlite::Error) -> SyncError {
    SyncError::Persistence(err.to_string())
}

impl ContactStore for Database {
    fn find_contact_by_user(&self, user_id: i64) -> SyncResult<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = ?1 ORDER BY id LIMIT 1"
                ),
                params![user_id],
                Self::contact_from_row,
            )
            .optional()?;
        Ok(contact)
    }

    fn find_contact_by_alias(&self, alias: &str, category_id: i64) -> SyncResult<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE alias = ?1 AND catid = ?2"),
                params![alias, category_id],
                Self::contact_from_row,
            )
            .optional()?;
        Ok(contact)
    }

    fn store_contact(&self, contact: &mut Contact) -> SyncResult<()> {
        let clash: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM contacts WHERE catid = ?1 AND alias = ?2 AND id <> ?3",
                params![contact.catid, contact.alias, contact.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(persistence)?;
        if let Some(other) = clash {
            return Err(SyncError::Persistence(format!(
                "Alias '{}' is already used by contact {other} in category {}",
                contact.alias, contact.catid
            )));
        }

        let now = Local::now().to_rfc3339();
        if contact.is_new() {
            self.conn
                .execute(
                    "INSERT INTO contacts (name, alias, user_id, email_to, catid, access, language,
                         published, address, suburb, state, country, postcode, telephone, webpage,
                         misc, con_position, created, modified)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?18)",
                    params![
                        contact.name,
                        contact.alias,
                        contact.user_id,
                        contact.email_to,
                        contact.catid,
                        contact.access,
                        contact.language,
                        contact.published,
                        contact.address,
                        contact.suburb,
                        contact.state,
                        contact.country,
                        contact.postcode,
                        contact.telephone,
                        contact.webpage,
                        contact.misc,
                        contact.position,
                        now,
                    ],
                )
                .map_err(persistence)?;
            contact.id = self.conn.last_insert_rowid();
            contact.created.clone_from(&now);
        } else {
            let rows = self
                .conn
                .execute(
                    "UPDATE contacts SET name = ?1, alias = ?2, user_id = ?3, email_to = ?4,
                         catid = ?5, access = ?6, language = ?7, published = ?8, address = ?9,
                         suburb = ?10, state = ?11, country = ?12, postcode = ?13,
                         telephone = ?14, webpage = ?15, misc = ?16, con_position = ?17,
                         modified = ?18
                     WHERE id = ?19",
                    params![
                        contact.name,
                        contact.alias,
                        contact.user_id,
                        contact.email_to,
                        contact.catid,
                        contact.access,
                        contact.language,
                        contact.published,
                        contact.address,
                        contact.suburb,
                        contact.state,
                        contact.country,
                        contact.postcode,
                        contact.telephone,
                        contact.webpage,
                        contact.misc,
                        contact.position,
                        now,
                        contact.id,
                    ],
                )
                .map_err(persistence)?;
            if rows == 0 {
                return Err(SyncError::Persistence(format!(
                    "Contact {} no longer exists",
                    contact.id
                )));
            }
        }
        contact.modified = now;
        Ok(())
    }
}

impl ProfileStore for Database {
    fn profile_entries(&self, user_id: i64, key_prefix: &str) -> SyncResult<Vec<ProfileEntry>> {
        let pattern = format!("{}%", escape_like(key_prefix));
        let mut stmt = self.conn.prepare(
            "SELECT user_id, profile_key, profile_value, ordering FROM user_profiles
             WHERE user_id = ?1 AND profile_key LIKE ?2 ESCAPE '\\'
             ORDER BY ordering ASC",
        )?;
        let entries = stmt
            .query_map(params![user_id, pattern], |row| {
                Ok(ProfileEntry {
                    user_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                    ordering: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

impl FieldStore for Database {
    fn field_correspondences(&self) -> SyncResult<Vec<FieldCorrespondence>> {
        let mut stmt = self.conn.prepare(
            "SELECT uf.note, uf.id, cf.id
             FROM fields uf
             JOIN fields cf ON cf.note = uf.note AND cf.context = ?2
             WHERE uf.context = ?1
               AND uf.note <> ''
               AND uf.state > 0
               AND cf.state > 0
             ORDER BY uf.id, cf.id",
        )?;
        let pairs = stmt
            .query_map(
                params![FieldContext::User.as_str(), FieldContext::Contact.as_str()],
                |row| {
                    Ok(FieldCorrespondence {
                        note: row.get(0)?,
                        user_field_id: row.get(1)?,
                        contact_field_id: row.get(2)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    fn field_values(&self, context: FieldContext, item_id: i64) -> SyncResult<Vec<FieldValue>> {
        let mut stmt = self.conn.prepare(
            "SELECT v.field_id, v.item_id, v.value
             FROM fields_values v
             JOIN fields f ON f.id = v.field_id
             WHERE f.context = ?1 AND v.item_id = ?2
             ORDER BY v.rowid",
        )?;
        let values = stmt
            .query_map(params![context.as_str(), item_id], |row| {
                Ok(FieldValue {
                    field_id: row.get(0)?,
                    item_id: row.get(1)?,
                    value: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    fn insert_field_value(&self, value: &FieldValue) -> SyncResult<()> {
        self.conn.execute(
            "INSERT INTO fields_values (field_id, item_id, value) VALUES (?1, ?2, ?3)",
            params![value.field_id, value.item_id, value.value],
        )?;
        Ok(())
    }

    fn delete_field_values(&self, field_id: i64, item_id: i64) -> SyncResult<usize> {
        let rows = self.conn.execute(
            "DELETE FROM fields_values WHERE field_id = ?1 AND item_id = ?2",
            params![field_id, item_id],
        )?;
        Ok(rows)
    }
}

impl SyncStore for Database {
    fn atomically<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce() -> SyncResult<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        // Dropping `tx` on the error path rolls everything back.
        let out = f()?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(db: &Database) -> User {
        db.insert_user(&NewUser {
            name: "Jane Doe".to_string(),
            username: "jane".to_string(),
            email: "jane@x.com".to_string(),
        })
        .unwrap()
    }

    fn sample_contact(name: &str, alias: &str, catid: i64) -> Contact {
        Contact {
            name: name.to_string(),
            alias: alias.to_string(),
            catid,
            language: "*".to_string(),
            ..Contact::default()
        }
    }

    fn field(db: &Database, context: FieldContext, name: &str, note: &str, state: i64) -> i64 {
        db.insert_field(&NewField {
            context,
            name: name.to_string(),
            label: String::new(),
            note: note.to_string(),
            state,
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.db");
        {
            let db = Database::open(&path).unwrap();
            sample_user(&db);
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_and_get_user() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        assert!(user.id > 0);
        assert_eq!(user.name, "Jane Doe");
        assert_eq!(user.username, "jane");
        assert!(!user.registered.is_empty());

        let fetched = db.get_user(user.id).unwrap();
        assert_eq!(fetched.email, "jane@x.com");
        assert!(db.get_user(999).is_err());
    }

    #[test]
    fn test_username_defaults_to_email() {
        let db = Database::open_in_memory().unwrap();
        let user = db
            .insert_user(&NewUser {
                name: "Bob".to_string(),
                username: String::new(),
                email: "bob@x.com".to_string(),
            })
            .unwrap();
        assert_eq!(user.username, "bob@x.com");
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        sample_user(&db);
        let err = db
            .insert_user(&NewUser {
                name: "Other Jane".to_string(),
                username: "jane".to_string(),
                email: "other@x.com".to_string(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create user"));
    }

    #[test]
    fn test_profile_entries_filtered_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        db.set_profile_value(user.id, "profile.city", "\"Springfield\"", 3)
            .unwrap();
        db.set_profile_value(user.id, "profile.address1", "\"1 Main St\"", 1)
            .unwrap();
        db.set_profile_value(user.id, "profilep.position", "\"Engineer\"", 2)
            .unwrap();
        db.set_profile_value(user.id, "newsletter.opt_in", "1", 0)
            .unwrap();

        let entries = db.profile_entries(user.id, "profile").unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["profile.address1", "profilep.position", "profile.city"]
        );

        assert_eq!(db.get_profile(user.id).unwrap().len(), 4);
    }

    #[test]
    fn test_profile_value_overwrite() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        db.set_profile_value(user.id, "profile.city", "Old", 1).unwrap();
        db.set_profile_value(user.id, "profile.city", "New", 1).unwrap();
        let entries = db.profile_entries(user.id, "profile").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "New");
    }

    #[test]
    fn test_store_contact_insert_then_update() {
        let db = Database::open_in_memory().unwrap();
        let mut contact = sample_contact("Jane Doe", "jane-doe", 5);
        contact.user_id = 42;
        db.store_contact(&mut contact).unwrap();
        assert!(contact.id > 0);
        assert!(!contact.created.is_empty());

        contact.suburb = Some("Springfield".to_string());
        db.store_contact(&mut contact).unwrap();

        let fetched = db.find_contact_by_user(42).unwrap().unwrap();
        assert_eq!(fetched.id, contact.id);
        assert_eq!(fetched.suburb.as_deref(), Some("Springfield"));
        assert_eq!(db.list_contacts(None).unwrap().len(), 1);
    }

    #[test]
    fn test_store_contact_rejects_alias_clash() {
        let db = Database::open_in_memory().unwrap();
        db.insert_contact(&sample_contact("Jane Doe", "jane-doe", 5))
            .unwrap();

        let mut clash = sample_contact("Someone Else", "jane-doe", 5);
        let err = db.store_contact(&mut clash).unwrap_err();
        assert!(matches!(err, SyncError::Persistence(_)));

        // Same alias in another category is fine.
        let mut elsewhere = sample_contact("Jane Doe", "jane-doe", 6);
        db.store_contact(&mut elsewhere).unwrap();
    }

    #[test]
    fn test_update_of_missing_contact_fails() {
        let db = Database::open_in_memory().unwrap();
        let mut ghost = sample_contact("Ghost", "ghost", 5);
        ghost.id = 77;
        assert!(matches!(
            db.store_contact(&mut ghost),
            Err(SyncError::Persistence(_))
        ));
    }

    #[test]
    fn test_store_contact_lookup_failure_is_persistence() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute_batch("ALTER TABLE contacts RENAME TO contacts_archived")
            .unwrap();

        let mut contact = sample_contact("Jane Doe", "jane-doe", 5);
        assert!(matches!(
            db.store_contact(&mut contact),
            Err(SyncError::Persistence(_))
        ));
    }

    #[test]
    fn test_find_contact_by_alias_scoped_to_category() {
        let db = Database::open_in_memory().unwrap();
        db.insert_contact(&sample_contact("Jane Doe", "jane-doe", 5))
            .unwrap();
        assert!(db.find_contact_by_alias("jane-doe", 5).unwrap().is_some());
        assert!(db.find_contact_by_alias("jane-doe", 6).unwrap().is_none());
        assert!(db.find_contact_by_alias("jane", 5).unwrap().is_none());
    }

    #[test]
    fn test_field_correspondences_require_active_shared_note() {
        let db = Database::open_in_memory().unwrap();
        let u_phone = field(&db, FieldContext::User, "mobile", "phone", 1);
        let c_phone = field(&db, FieldContext::Contact, "contact-mobile", "phone", 1);
        let u_blog = field(&db, FieldContext::User, "blog", "blog", 1);
        field(&db, FieldContext::Contact, "contact-blog", "blog", 0);
        let u_off = field(&db, FieldContext::User, "fax", "fax", 0);
        field(&db, FieldContext::Contact, "contact-fax", "fax", 1);
        field(&db, FieldContext::User, "untagged", "", 1);
        field(&db, FieldContext::Contact, "untagged", "", 1);

        let pairs = db.field_correspondences().unwrap();
        assert_eq!(
            pairs,
            vec![FieldCorrespondence {
                note: "phone".to_string(),
                user_field_id: u_phone,
                contact_field_id: c_phone,
            }]
        );
        assert!(!pairs.iter().any(|p| p.user_field_id == u_blog));
        assert!(!pairs.iter().any(|p| p.user_field_id == u_off));
    }

    #[test]
    fn test_field_values_filtered_by_context() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let u_field = field(&db, FieldContext::User, "mobile", "phone", 1);
        let c_field = field(&db, FieldContext::Contact, "contact-mobile", "phone", 1);

        db.set_user_field_value(u_field, user.id, "555-0100").unwrap();
        db.insert_field_value(&FieldValue {
            field_id: c_field,
            item_id: user.id,
            value: "contact side".to_string(),
        })
        .unwrap();

        let values = db.field_values(FieldContext::User, user.id).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, "555-0100");
    }

    #[test]
    fn test_set_user_field_value_replaces_and_checks_context() {
        let db = Database::open_in_memory().unwrap();
        let user = sample_user(&db);
        let u_field = field(&db, FieldContext::User, "mobile", "phone", 1);
        let c_field = field(&db, FieldContext::Contact, "contact-mobile", "phone", 1);

        db.set_user_field_value(u_field, user.id, "1").unwrap();
        db.set_user_field_value(u_field, user.id, "2").unwrap();
        assert_eq!(db.count_field_values(u_field, user.id).unwrap(), 1);

        assert!(db.set_user_field_value(c_field, user.id, "x").is_err());
    }

    #[test]
    fn test_insert_field_value_appends_duplicates() {
        let db = Database::open_in_memory().unwrap();
        let c_field = field(&db, FieldContext::Contact, "contact-mobile", "phone", 1);
        let row = FieldValue {
            field_id: c_field,
            item_id: 1,
            value: "555".to_string(),
        };
        db.insert_field_value(&row).unwrap();
        db.insert_field_value(&row).unwrap();
        assert_eq!(db.count_field_values(c_field, 1).unwrap(), 2);

        assert_eq!(db.delete_field_values(c_field, 1).unwrap(), 2);
        assert_eq!(db.count_field_values(c_field, 1).unwrap(), 0);
    }

    #[test]
    fn test_list_fields_by_context() {
        let db = Database::open_in_memory().unwrap();
        field(&db, FieldContext::User, "mobile", "phone", 1);
        field(&db, FieldContext::Contact, "contact-mobile", "phone", 1);
        assert_eq!(db.list_fields(None).unwrap().len(), 2);
        let user_fields = db.list_fields(Some(FieldContext::User)).unwrap();
        assert_eq!(user_fields.len(), 1);
        assert_eq!(user_fields[0].label, "mobile");
    }

    #[test]
    fn test_set_field_state() {
        let db = Database::open_in_memory().unwrap();
        let id = field(&db, FieldContext::User, "mobile", "phone", 1);
        assert!(db.set_field_state(id, 0).unwrap());
        assert!(!db.get_field(id).unwrap().is_active());
        assert!(!db.set_field_state(999, 1).unwrap());
    }

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_sync_settings().unwrap(), SyncSettings::default());

        assert_eq!(db.set_setting("category", "5").unwrap(), "5");
        assert_eq!(db.set_setting("autopublish", "true").unwrap(), "1");
        assert!(db.set_setting("category", "five").is_err());

        let settings = db.load_sync_settings().unwrap();
        assert_eq!(settings.category_id, 5);
        assert!(settings.autopublish);

        assert!(db.delete_setting("category").unwrap());
        assert_eq!(db.get_setting("category").unwrap(), None);
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: SyncResult<()> = db.atomically(|| {
            let mut contact = sample_contact("Jane Doe", "jane-doe", 5);
            db.store_contact(&mut contact)?;
            Err(SyncError::DataAccess("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(db.list_contacts(None).unwrap().is_empty());

        db.atomically(|| {
            let mut contact = sample_contact("Jane Doe", "jane-doe", 5);
            db.store_contact(&mut contact)
        })
        .unwrap();
        assert_eq!(db.list_contacts(None).unwrap().len(), 1);
    }
}
