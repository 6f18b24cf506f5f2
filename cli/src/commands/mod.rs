mod contact;
mod field;
mod helpers;
mod import;
mod settings;
mod user;

pub(crate) use contact::{cmd_contact_list, cmd_contact_show};
pub(crate) use field::{cmd_field_add, cmd_field_list, cmd_field_state};
pub(crate) use import::cmd_import_users;
pub(crate) use settings::{cmd_config_set, cmd_config_show, cmd_config_unset};
pub(crate) use user::{cmd_user_add, cmd_user_list, cmd_user_show, cmd_user_sync};
