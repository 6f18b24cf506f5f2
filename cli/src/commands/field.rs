use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use contactsync_core::models::{FieldContext, NewField};
use contactsync_core::service::ContactSyncService;

pub(crate) fn cmd_field_add(
    service: &ContactSyncService,
    context: &str,
    name: &str,
    label: Option<String>,
    note: Option<String>,
    inactive: bool,
    json: bool,
) -> Result<()> {
    let context: FieldContext = context.parse()?;
    let field = service.add_field(&NewField {
        context,
        name: name.to_string(),
        label: label.unwrap_or_default(),
        note: note.unwrap_or_default(),
        state: i64::from(!inactive),
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&field)?);
    } else {
        println!(
            "Added {} field {} \"{}\"{}",
            field.context,
            field.id,
            field.label,
            if field.note.is_empty() {
                String::new()
            } else {
                format!(" (note: {})", field.note)
            }
        );
    }

    Ok(())
}

pub(crate) fn cmd_field_list(
    service: &ContactSyncService,
    context: Option<&str>,
    json: bool,
) -> Result<()> {
    let context = context.map(str::parse::<FieldContext>).transpose()?;
    let fields = service.list_fields(context)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else if fields.is_empty() {
        eprintln!("No custom fields defined. Use `contactsync field add` to create one.");
    } else {
        #[derive(Tabled)]
        struct FieldRow {
            #[tabled(rename = "ID")]
            id: i64,
            #[tabled(rename = "Context")]
            context: String,
            #[tabled(rename = "Name")]
            name: String,
            #[tabled(rename = "Label")]
            label: String,
            #[tabled(rename = "Note")]
            note: String,
            #[tabled(rename = "Active")]
            active: &'static str,
        }

        let rows: Vec<FieldRow> = fields
            .iter()
            .map(|f| FieldRow {
                id: f.id,
                context: f.context.to_string(),
                name: f.name.clone(),
                label: f.label.clone(),
                note: f.note.clone(),
                active: if f.is_active() { "yes" } else { "no" },
            })
            .collect();

        let table = Table::new(&rows).with(Style::rounded()).to_string();
        println!("{table}");
    }

    Ok(())
}

pub(crate) fn cmd_field_state(
    service: &ContactSyncService,
    id: i64,
    active: bool,
    json: bool,
) -> Result<()> {
    let updated = service.set_field_state(id, i64::from(active))?;
    if !updated {
        anyhow::bail!("Field {id} not found");
    }

    if json {
        println!("{}", serde_json::json!({ "id": id, "active": active }));
    } else {
        println!(
            "Field {id} {}",
            if active { "enabled" } else { "disabled" }
        );
    }

    Ok(())
}
