use anyhow::Result;

use contactsync_core::service::ContactSyncService;

pub(crate) fn cmd_config_show(service: &ContactSyncService, json: bool) -> Result<()> {
    let settings = service.settings()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        let category = if settings.category_id > 0 {
            settings.category_id.to_string()
        } else {
            "(not set)".to_string()
        };
        println!("category          {category}");
        println!("autopublish       {}", settings.autopublish);
        println!("access            {}", settings.access_level);
        println!("position_field    {}", settings.position_field);
        println!("field_replication {}", settings.replication.as_str());
    }

    Ok(())
}

pub(crate) fn cmd_config_set(
    service: &ContactSyncService,
    key: &str,
    value: &str,
    json: bool,
) -> Result<()> {
    let stored = service.set_setting(key, value)?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "value": stored }));
    } else {
        println!("Set {key} = {stored}");
    }

    Ok(())
}

pub(crate) fn cmd_config_unset(service: &ContactSyncService, key: &str, json: bool) -> Result<()> {
    let removed = service.clear_setting(key)?;

    if json {
        println!("{}", serde_json::json!({ "key": key, "removed": removed }));
    } else if removed {
        println!("Cleared {key}");
    } else {
        eprintln!("{key} was not set");
    }

    Ok(())
}
