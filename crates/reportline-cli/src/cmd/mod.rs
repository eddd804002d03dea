pub mod export;
pub mod fetch;
pub mod jobs;
pub mod ledger;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::{Config, TOKEN_ENV};

/// Rounded table with a cyan header row.
pub(crate) fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

/// Print a key-value summary table on stderr
pub(crate) fn print_summary(title: &str, rows: &[(&str, String)]) {
    let mut table = table(&[title, "Value"]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    eprintln!("\n{table}");
}

pub fn print_config(config: &Config) {
    let token = if config.access_token().is_some() {
        "configured".to_string()
    } else {
        format!("not set (${TOKEN_ENV})")
    };
    let jobs = if config.using_presets() {
        format!("{} (built-in presets)", config.jobs().len())
    } else {
        config.jobs.len().to_string()
    };
    print_summary(
        "Setting",
        &[
            ("Output directory", config.output.dir.display().to_string()),
            ("API URL", config.api.url.clone()),
            ("View id", config.api.view_id.clone()),
            ("Access token", token),
            ("Connect timeout", format!("{}s", config.api.connect_timeout)),
            ("Request timeout", format!("{}s", config.api.request_timeout)),
            ("Jobs", jobs),
        ],
    );
}
