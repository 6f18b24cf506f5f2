use anyhow::Result;

use contactsync_core::service::ContactSyncService;

use super::helpers::print_contact_table;

pub(crate) fn cmd_contact_list(
    service: &ContactSyncService,
    category: Option<i64>,
    json: bool,
) -> Result<()> {
    let contacts = service.list_contacts(category)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&contacts)?);
    } else if contacts.is_empty() {
        eprintln!("No contacts found.");
    } else {
        print_contact_table(&contacts);
    }

    Ok(())
}

pub(crate) fn cmd_contact_show(service: &ContactSyncService, id: i64, json: bool) -> Result<()> {
    let detail = service.contact_detail(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let c = &detail.contact;
    println!("Contact {}: {}", c.id, c.name);
    println!("  Alias:     {}", c.alias);
    println!("  Category:  {}", c.catid);
    println!(
        "  User:      {}",
        if c.user_id > 0 {
            c.user_id.to_string()
        } else {
            "-".to_string()
        }
    );
    println!("  Email:     {}", c.email_to);
    println!("  Published: {}", if c.published { "yes" } else { "no" });
    println!("  Access:    {}", c.access);
    println!("  Language:  {}", c.language);

    let optional = [
        ("Address", &c.address),
        ("Suburb", &c.suburb),
        ("State", &c.state),
        ("Country", &c.country),
        ("Postcode", &c.postcode),
        ("Telephone", &c.telephone),
        ("Webpage", &c.webpage),
        ("Misc", &c.misc),
        ("Position", &c.position),
    ];
    for (label, value) in optional {
        if let Some(v) = value {
            println!("  {:<10} {v}", format!("{label}:"));
        }
    }

    if !detail.fields.is_empty() {
        println!("  Fields:");
        for f in &detail.fields {
            println!("    [{}] {}: {}", f.field_id, f.label, f.value);
        }
    }

    Ok(())
}
