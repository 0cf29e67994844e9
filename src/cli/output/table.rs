//! Table output formatting for CLI commands
//!
//! Learned records, anti-patterns and parameter vectors rendered with comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{AntiPattern, LearnedRecord, ParameterVector};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    pub fn format_learned_records(&self, records: &[LearnedRecord]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Option", "Success", "Samples", "Confidence", "Learned", "Updated"]));

        for record in records {
            let learned = record
                .ema_values
                .iter()
                .map(|(key, value)| format!("{key}={value:.2}"))
                .collect::<Vec<_>>()
                .join("\n");

            table.add_row(vec![
                Cell::new(&record.key.option_id),
                self.rate_cell(record.success_rate),
                Cell::new(record.sample_count),
                Cell::new(format!("{:.2}", record.confidence)),
                Cell::new(if learned.is_empty() { "-".to_string() } else { learned }),
                Cell::new(record.updated_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }

        table.to_string()
    }

    pub fn format_anti_patterns(&self, patterns: &[AntiPattern]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Option", "Success", "Samples"]));

        for pattern in patterns {
            table.add_row(vec![
                Cell::new(&pattern.option_id),
                self.rate_cell(pattern.success_rate),
                Cell::new(pattern.sample_count),
            ]);
        }

        table.to_string()
    }

    pub fn format_parameters(&self, params: &ParameterVector) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Parameter", "Value"]));

        for (key, value) in params {
            table.add_row(vec![Cell::new(key), Cell::new(value.to_string())]);
        }

        table.to_string()
    }

    fn rate_cell(&self, rate: f64) -> Cell {
        let text = format!("{:.0}%", rate * 100.0);
        if !self.use_colors {
            return Cell::new(text);
        }
        let color = if rate >= 0.7 {
            Color::Green
        } else if rate >= 0.3 {
            Color::Yellow
        } else {
            Color::Red
        };
        Cell::new(text).fg(color)
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(*name).add_attribute(Attribute::Bold))
        .collect()
}

/// Check if the terminal supports colors
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
