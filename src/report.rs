//! Comparison table rendering
//!
//! Projection of comparison rows onto a `comfy_table` table. Rows are
//! rendered in the order given; sorting and filtering belong to the comparator.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, Color, Table};

use crate::compare::ComparisonSummary;
use crate::types::ComparisonRow;

pub const TITLE: &str = "Benchmark Comparison";

const HEADERS: [&str; 5] = [
    "Test Case",
    "Avg Turns Δ",
    "Avg Turns %",
    "Turn Time Δ (ms)",
    "Turn Time %",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit ANSI colors even when not writing to a terminal
    pub color: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions { color: true }
    }
}

/// Renders the title line and the comparison table
pub fn render(rows: &[ComparisonRow], options: RenderOptions) -> String {
    format!("{}\n{}", TITLE, build_table(rows, options))
}

/// One-paragraph summary printed under the table
pub fn render_summary(summary: &ComparisonSummary) -> String {
    let mut text = format!(
        "Compared {} test case(s): turns {} better / {} worse, turn time {} better / {} worse",
        summary.compared,
        summary.turns_improved,
        summary.turns_regressed,
        summary.time_improved,
        summary.time_regressed
    );
    if summary.mismatched > 0 {
        text.push_str(&format!(
            "\n{} test case(s) present in only one snapshot",
            summary.mismatched
        ));
    }
    text
}

pub fn build_table(rows: &[ComparisonRow], options: RenderOptions) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);

    if options.color {
        table.enforce_styling();
    } else {
        table.force_no_tty();
    }

    table.set_header(
        HEADERS
            .iter()
            .enumerate()
            .map(|(i, h)| header_cell(h, i))
            .collect::<Vec<_>>(),
    );

    for row in rows {
        let name_color = if row.presence.is_mismatch() {
            Color::Magenta
        } else {
            Color::Cyan
        };
        let turns_color = delta_color(row.turns_delta);
        let time_color = delta_color(row.time_delta_ms);

        table.add_row(vec![
            styled(Cell::new(&row.test_case), Some(name_color)),
            numeric(format!("{:+.2}", row.turns_delta), turns_color),
            numeric(format!("{:+.2}%", row.turns_pct), turns_color),
            numeric(format!("{:+.5}", row.time_delta_ms), time_color),
            numeric(format!("{:+.2}%", row.time_pct), time_color),
        ]);
    }

    table
}

// Lower is better: negative deltas are improvements
fn delta_color(delta: f64) -> Option<Color> {
    if delta < 0.0 {
        Some(Color::Green)
    } else if delta > 0.0 {
        Some(Color::Red)
    } else {
        None
    }
}

fn header_cell(text: &str, index: usize) -> Cell {
    let cell = Cell::new(text);
    if index == 0 {
        cell
    } else {
        cell.set_alignment(CellAlignment::Right)
    }
}

fn numeric(text: String, color: Option<Color>) -> Cell {
    styled(Cell::new(text).set_alignment(CellAlignment::Right), color)
}

fn styled(cell: Cell, color: Option<Color>) -> Cell {
    match color {
        Some(color) => cell.fg(color),
        None => cell,
    }
}
