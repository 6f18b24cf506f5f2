use anyhow::Result;

use contactsync_core::models::{NewUser, UserRegistration};
use contactsync_core::service::ContactSyncService;

use super::helpers::{parse_field_assignment, parse_key_value, print_outcome, print_user_table};

pub(crate) fn cmd_user_add(
    service: &ContactSyncService,
    name: &str,
    email: &str,
    username: Option<String>,
    profile: &[String],
    fields: &[String],
    json: bool,
) -> Result<()> {
    let profile = profile
        .iter()
        .map(|p| parse_key_value(p))
        .collect::<Result<Vec<_>>>()?;
    let fields = fields
        .iter()
        .map(|f| parse_field_assignment(f))
        .collect::<Result<Vec<_>>>()?;

    let outcome = service.register_user(&UserRegistration {
        user: NewUser {
            name: name.to_string(),
            username: username.unwrap_or_default(),
            email: email.to_string(),
        },
        profile,
        fields,
    })?;

    print_outcome(&outcome, json)
}

pub(crate) fn cmd_user_list(service: &ContactSyncService, json: bool) -> Result<()> {
    let users = service.list_users()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else if users.is_empty() {
        eprintln!("No users yet. Use `contactsync user add` to register one.");
    } else {
        print_user_table(&users);
    }

    Ok(())
}

pub(crate) fn cmd_user_show(service: &ContactSyncService, user_id: i64, json: bool) -> Result<()> {
    let user = service.get_user(user_id)?;
    let profile = service.user_profile(user_id)?;

    if json {
        let profile: serde_json::Map<String, serde_json::Value> = profile
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "user": user, "profile": profile }))?
        );
        return Ok(());
    }

    println!("User {}: {}", user.id, user.name);
    println!("  Username:   {}", user.username);
    println!("  Email:      {}", user.email);
    println!("  Registered: {}", user.registered);
    if !profile.is_empty() {
        println!("  Profile:");
        for (key, value) in &profile {
            println!("    {key}: {value}");
        }
    }

    Ok(())
}

pub(crate) fn cmd_user_sync(service: &ContactSyncService, user_id: i64, json: bool) -> Result<()> {
    let outcome = service.resync_user(user_id)?;
    print_outcome(&outcome, json)
}
