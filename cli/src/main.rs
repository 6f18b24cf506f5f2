mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_config_set, cmd_config_show, cmd_config_unset, cmd_contact_list, cmd_contact_show,
    cmd_field_add, cmd_field_list, cmd_field_state, cmd_import_users, cmd_user_add, cmd_user_list,
    cmd_user_show, cmd_user_sync,
};
use crate::config::Config;
use contactsync_core::db::Database;
use contactsync_core::service::ContactSyncService;

#[derive(Parser)]
#[command(
    name = "contactsync",
    version,
    about = "Create and keep a contact record for every new user account"
)]
struct Cli {
    /// Database file to use instead of the per-user data directory
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register users and resync their contacts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Inspect synced contacts
    Contact {
        #[command(subcommand)]
        command: ContactCommands,
    },
    /// Manage custom field definitions
    Field {
        #[command(subcommand)]
        command: FieldCommands,
    },
    /// Show or change the sync settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Import data from external sources
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user; its contact is synced straight away
    Add {
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Login name (defaults to the email address)
        #[arg(short, long)]
        username: Option<String>,
        /// Profile attribute as key=value (e.g. city=Springfield); repeatable
        #[arg(short, long = "profile")]
        profile: Vec<String>,
        /// User field value as <field id>=<value>; repeatable
        #[arg(short, long = "field")]
        field: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List users
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a user with its profile attributes
    Show {
        /// User ID
        user_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the contact sync again for an existing user
    Sync {
        /// User ID
        user_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ContactCommands {
    /// List contacts
    List {
        /// Only show contacts in this category
        #[arg(short, long)]
        category: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a contact with its custom field values
    Show {
        /// Contact ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FieldCommands {
    /// Define a custom field
    Add {
        /// Field context: user or contact
        context: String,
        /// Field name
        name: String,
        /// Display label (defaults to the name)
        #[arg(short, long)]
        label: Option<String>,
        /// Note tag linking a user field to the contact field it feeds
        #[arg(short, long)]
        note: Option<String>,
        /// Create the field disabled
        #[arg(long)]
        inactive: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List custom fields
    List {
        /// Only show fields of this context: user or contact
        #[arg(short, long)]
        context: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Enable a custom field
    Enable {
        /// Field ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Disable a custom field
    Disable {
        /// Field ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current sync settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a sync setting: category, autopublish, access, position_field, field_replication
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset a sync setting to its default
    Unset {
        /// Setting name
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import users from a CSV file (name, email, username, profile.<key> columns)
    Users {
        /// Path to the CSV file
        file: PathBuf,
        /// Show what would be imported without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    tracing::debug!(db = %config.db_path.display(), data_dir = %config.data_dir.display(), "opening database");
    let service = ContactSyncService::from_database(Database::open(&config.db_path)?);

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add {
                name,
                email,
                username,
                profile,
                field,
                json,
            } => cmd_user_add(&service, &name, &email, username, &profile, &field, json),
            UserCommands::List { json } => cmd_user_list(&service, json),
            UserCommands::Show { user_id, json } => cmd_user_show(&service, user_id, json),
            UserCommands::Sync { user_id, json } => cmd_user_sync(&service, user_id, json),
        },
        Commands::Contact { command } => match command {
            ContactCommands::List { category, json } => cmd_contact_list(&service, category, json),
            ContactCommands::Show { id, json } => cmd_contact_show(&service, id, json),
        },
        Commands::Field { command } => match command {
            FieldCommands::Add {
                context,
                name,
                label,
                note,
                inactive,
                json,
            } => cmd_field_add(&service, &context, &name, label, note, inactive, json),
            FieldCommands::List { context, json } => {
                cmd_field_list(&service, context.as_deref(), json)
            }
            FieldCommands::Enable { id, json } => cmd_field_state(&service, id, true, json),
            FieldCommands::Disable { id, json } => cmd_field_state(&service, id, false, json),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { json } => cmd_config_show(&service, json),
            ConfigCommands::Set { key, value, json } => cmd_config_set(&service, &key, &value, json),
            ConfigCommands::Unset { key, json } => cmd_config_unset(&service, &key, json),
        },
        Commands::Import { command } => match command {
            ImportCommands::Users {
                file,
                dry_run,
                json,
            } => cmd_import_users(&service, &file, dry_run, json),
        },
    }
}
