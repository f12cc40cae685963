use crate::core::quote::Provenance;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::{Decimal, RoundingStrategy};
use std::time::Duration;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalLabel,
    TotalValue,
    Error,
    Warning,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalLabel => style(text).bold(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Warning => style(text).yellow(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

pub fn amount(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

pub fn amount_cell(value: Decimal) -> Cell {
    Cell::new(amount(value)).set_alignment(CellAlignment::Right)
}

/// Right-aligned amount, green when positive and red when negative.
pub fn signed_cell(value: Decimal, suffix: &str) -> Cell {
    let cell = Cell::new(format!("{}{suffix}", amount(value))).set_alignment(CellAlignment::Right);
    if value.is_zero() {
        cell
    } else if value.is_sign_negative() {
        cell.fg(Color::Red)
    } else {
        cell.fg(Color::Green)
    }
}

/// Creates a cell for displaying percentage change with color coding.
pub fn change_cell(change: Decimal) -> Cell {
    signed_cell(change, "%")
}

/// Creates a cell for "N/A" values, with error-specific styling.
pub fn na_cell(has_error: bool) -> Cell {
    let color = if has_error {
        Color::Red
    } else {
        Color::DarkGrey
    };
    Cell::new("N/A").fg(color).set_alignment(CellAlignment::Right)
}

pub fn provenance_cell(provenance: Provenance) -> Cell {
    let color = match provenance {
        Provenance::PrimaryApi | Provenance::SecondaryApi | Provenance::TertiaryApi => {
            Color::Green
        }
        Provenance::Manual => Color::Cyan,
        Provenance::CachedStale | Provenance::HardcodedFallback => Color::Yellow,
        Provenance::Unavailable => Color::Red,
    };
    Cell::new(provenance.to_string()).fg(color)
}

/// Creates a spinner shown while a valuation pass runs.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints a separator line matching the terminal width.
pub fn print_separator() {
    let term_width = console::Term::stdout()
        .size_checked()
        .map(|(_, w)| w as usize)
        .unwrap_or(80);
    println!("\n{}", "─".repeat(term_width));
}
