use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::insights::{Effort, Severity};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn severity_cell(severity: Severity) -> Cell {
    let cell = Cell::new(severity.as_str().to_uppercase());
    match severity {
        Severity::Critical => cell.fg(TableColor::Red).add_attribute(comfy_table::Attribute::Bold),
        Severity::High => cell.fg(TableColor::Red),
        Severity::Medium => cell.fg(TableColor::Yellow),
        Severity::Low => cell.fg(TableColor::DarkGrey),
    }
}

pub fn confidence_cell(confidence: f64) -> Cell {
    let text = format!("{:.0}%", confidence * 100.0);
    if confidence >= 0.85 {
        Cell::new(text).fg(TableColor::Green)
    } else if confidence >= 0.7 {
        Cell::new(text).fg(TableColor::Yellow)
    } else {
        Cell::new(text).fg(TableColor::DarkGrey)
    }
}

pub fn priority_cell(priority: u8) -> Cell {
    let text = format!("P{priority}");
    match priority {
        0..=1 => Cell::new(text).fg(TableColor::Red),
        2 => Cell::new(text).fg(TableColor::Yellow),
        _ => Cell::new(text).fg(TableColor::Green),
    }
}

pub fn effort_cell(effort: Effort) -> Cell {
    let cell = Cell::new(effort.as_str());
    match effort {
        Effort::Low => cell.fg(TableColor::Green),
        Effort::Medium => cell.fg(TableColor::Yellow),
        Effort::High => cell.fg(TableColor::Red),
    }
}
