use anyhow::{Context, Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use contactsync_core::models::{Contact, Message, MessageLevel, SyncOutcome, User};

/// Parse a `key=value` argument. The value may be empty or contain `=`.
pub(crate) fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Invalid pair '{s}'. Use key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid pair '{s}': key must not be empty");
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse a `<field id>=<value>` argument.
pub(crate) fn parse_field_assignment(s: &str) -> Result<(i64, String)> {
    let (id, value) = parse_key_value(s)?;
    let id: i64 = id
        .parse()
        .with_context(|| format!("Invalid field id '{id}'. Use <field id>=<value>"))?;
    Ok((id, value))
}

pub(crate) fn print_messages(messages: &[Message]) {
    for m in messages {
        let level = match m.level {
            MessageLevel::Info => "Info",
            MessageLevel::Warning => "Warning",
            MessageLevel::Error => "Error",
        };
        eprintln!("{level}: {}", m.text);
    }
}

pub(crate) fn print_outcome(outcome: &SyncOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!(
        "User {} \"{}\" <{}>",
        outcome.user.id, outcome.user.name, outcome.user.email
    );
    match &outcome.contact {
        Some(c) if outcome.synced => println!(
            "  Contact {} \"{}\" (alias {}, category {}{})",
            c.id,
            c.name,
            c.alias,
            c.catid,
            if c.published { ", published" } else { "" }
        ),
        _ => println!("  No contact synced"),
    }
    print_messages(&outcome.messages);
    Ok(())
}

pub(crate) fn print_user_table(users: &[User]) {
    #[derive(Tabled)]
    struct UserRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Username")]
        username: String,
        #[tabled(rename = "Email")]
        email: String,
    }

    let rows: Vec<UserRow> = users
        .iter()
        .map(|u| UserRow {
            id: u.id,
            name: truncate(&u.name, 35),
            username: truncate(&u.username, 25),
            email: truncate(&u.email, 35),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_contact_table(contacts: &[Contact]) {
    #[derive(Tabled)]
    struct ContactRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Alias")]
        alias: String,
        #[tabled(rename = "User")]
        user_id: String,
        #[tabled(rename = "Category")]
        catid: i64,
        #[tabled(rename = "Published")]
        published: &'static str,
        #[tabled(rename = "City")]
        suburb: String,
    }

    let rows: Vec<ContactRow> = contacts
        .iter()
        .map(|c| ContactRow {
            id: c.id,
            name: truncate(&c.name, 30),
            alias: truncate(&c.alias, 30),
            user_id: if c.user_id > 0 {
                c.user_id.to_string()
            } else {
                "-".into()
            },
            catid: c.catid,
            published: if c.published { "yes" } else { "no" },
            suburb: c.suburb.as_deref().map(|s| truncate(s, 20)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
