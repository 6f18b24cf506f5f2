use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::warn;

use crate::models::{NewUser, UserRegistration};
use crate::service::ContactSyncService;

/// Summary of what a user import would do / did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserImportSummary {
    pub rows_parsed: usize,
    pub users_created: usize,
    pub contacts_synced: usize,
    pub failures: Vec<String>,
}

/// Parse a users CSV from any reader.
///
/// Required columns: `name`, `email`. Optional: `username`. Every column named
/// `profile.<key>` (or `profilep.<key>`) becomes a profile attribute, in column
/// order; other columns are ignored.
pub fn parse_users_csv<R: Read>(reader: R) -> Result<Vec<UserRegistration>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    for name in ["name", "email"] {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let idx_name = col("name").context("Missing 'name' column")?;
    let idx_email = col("email").context("Missing 'email' column")?;
    let idx_username = col("username");

    let profile_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| {
            let lower = h.to_ascii_lowercase();
            lower.starts_with("profile.") || lower.starts_with("profilep.")
        })
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let name = record.get(idx_name).unwrap_or("").to_string();
        let email = record.get(idx_email).unwrap_or("").to_string();
        if name.is_empty() && email.is_empty() {
            continue; // skip blank rows
        }

        let username = idx_username
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .to_string();

        let profile = profile_cols
            .iter()
            .filter_map(|(i, key)| record.get(*i).map(|v| (key.clone(), v.to_string())))
            .collect();

        rows.push(UserRegistration {
            user: NewUser {
                name,
                username,
                email,
            },
            profile,
            fields: Vec::new(),
        });
    }

    Ok(rows)
}

/// Register every parsed user, firing the contact sync for each one.
///
/// A row that cannot be created is recorded in `failures` and the import
/// carries on. When `dry_run` is true, nothing is written.
pub fn import_users(
    service: &ContactSyncService,
    rows: &[UserRegistration],
    dry_run: bool,
) -> Result<UserImportSummary> {
    let mut summary = UserImportSummary {
        rows_parsed: rows.len(),
        ..UserImportSummary::default()
    };

    let existing: HashSet<String> = service
        .list_users()?
        .into_iter()
        .map(|u| u.username.to_lowercase())
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    for (i, row) in rows.iter().enumerate() {
        let line = i + 2;
        if dry_run {
            let username = if row.user.username.is_empty() {
                row.user.email.to_lowercase()
            } else {
                row.user.username.to_lowercase()
            };
            if row.user.name.trim().is_empty() {
                summary.failures.push(format!("row {line}: missing name"));
            } else if existing.contains(&username) || !seen.insert(username.clone()) {
                summary
                    .failures
                    .push(format!("row {line}: username '{username}' already taken"));
            } else {
                summary.users_created += 1;
            }
            continue;
        }

        match service.register_user(row) {
            Ok(outcome) => {
                summary.users_created += 1;
                if outcome.synced {
                    summary.contacts_synced += 1;
                } else {
                    for message in outcome.messages {
                        summary.failures.push(format!("row {line}: {}", message.text));
                    }
                }
            }
            Err(err) => {
                warn!(line, error = %err, "skipping user row");
                summary.failures.push(format!("row {line}: {err:#}"));
            }
        }
    }

    Ok(summary)
}
