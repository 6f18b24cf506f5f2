use std::path::Path;

use anyhow::{Context, Result};

use contactsync_core::service::ContactSyncService;
use contactsync_core::user_import::{import_users, parse_users_csv};

use super::helpers::json_error;

pub(crate) fn cmd_import_users(
    service: &ContactSyncService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let rows = parse_users_csv(file)?;

    if rows.is_empty() {
        if json {
            println!("{}", json_error("No rows found in CSV file"));
        } else {
            eprintln!("No rows found in CSV file.");
        }
        return Ok(());
    }

    let summary = import_users(service, &rows, dry_run)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "users_created": summary.users_created,
                "contacts_synced": summary.contacts_synced,
                "failures": summary.failures,
            })
        );
        return Ok(());
    }

    if dry_run {
        println!("Dry run: no changes made.\n");
        println!("  Rows parsed:      {}", summary.rows_parsed);
        println!("  Users to create:  {}", summary.users_created);
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:      {}", summary.rows_parsed);
        println!("  Users created:    {}", summary.users_created);
        println!("  Contacts synced:  {}", summary.contacts_synced);
    }
    if !summary.failures.is_empty() {
        println!("\n  Problems:");
        for f in &summary.failures {
            println!("    {f}");
        }
    }

    Ok(())
}
