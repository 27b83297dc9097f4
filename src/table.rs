use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::aggregate::{AccountReport, Delta};
use crate::rank::RankedReport;

// Fixed column widths; long values push the row out instead of being cut.
const USERNAME_WIDTH: usize = 15;
const DELTA_WIDTH: usize = 4;
const NOW_WIDTH: usize = 5;
const RULE_WIDTH: usize = USERNAME_WIDTH + DELTA_WIDTH + NOW_WIDTH;

fn push_row(output: &mut String, username: &str, delta: &str, now: &str) {
    output.push_str(&format!(
        "{:<uw$}{:>dw$}{:>nw$}\n",
        username,
        delta,
        now,
        uw = USERNAME_WIDTH,
        dw = DELTA_WIDTH,
        nw = NOW_WIDTH
    ));
}

/// Monospace table: header, rule, then one line per account.
pub fn render_text(report: &RankedReport) -> String {
    let mut output = String::new();
    push_row(&mut output, "@username", &report.delta_label, "now");
    output.push_str(&"-".repeat(RULE_WIDTH));
    output.push('\n');
    for account in &report.accounts {
        push_row(
            &mut output,
            &account.username,
            &account.delta_text(),
            &account.current_count.to_string(),
        );
    }
    output
}

fn themed_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cells(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| {
            Cell::new(*label)
                .add_attribute(Attribute::Bold)
                .fg(Color::Cyan)
        })
        .collect()
}

fn value_cell<T: std::fmt::Display>(value: T) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

fn delta_cell(account: &AccountReport) -> Cell {
    match account.delta {
        Delta::Known(value) if value > 0 => value_cell(format!("+{value}")).fg(Color::Green),
        Delta::Known(value) if value < 0 => value_cell(value).fg(Color::Red),
        Delta::Known(value) => value_cell(value),
        Delta::Unknown => value_cell("--"),
    }
}

/// Terminal rendering of the ranking for the CLI.
pub fn render_table(report: &RankedReport) -> Table {
    let mut table = themed_table();
    table.set_header(header_cells(&[
        "#",
        "@username",
        report.delta_label.as_str(),
        "now",
    ]));
    for (idx, account) in report.accounts.iter().enumerate() {
        table.add_row(vec![
            value_cell(idx + 1),
            Cell::new(format!("@{}", account.username)).add_attribute(Attribute::Bold),
            delta_cell(account),
            value_cell(account.current_count),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::rank;

    fn sample_report() -> RankedReport {
        rank(
            vec![
                AccountReport::new("alice", 150, Some(140)),
                AccountReport::new("bob", 42, None),
            ],
            "Δ-3w",
        )
    }

    #[test]
    fn text_has_header_rule_and_rows() {
        let text = render_text(&sample_report());
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "@username      Δ-3w  now");
        assert_eq!(lines[1], "-".repeat(24));
        assert_eq!(lines[2], "alice            10  150");
        assert_eq!(lines[3], "bob                   42");
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn empty_report_is_header_and_rule() {
        let text = render_text(&rank(Vec::new(), "Δ-3w"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn long_values_are_not_truncated() {
        let report = rank(
            vec![AccountReport::new(
                "a_very_long_twitter_handle",
                1_234_567,
                Some(1_000_000),
            )],
            "Δ-3w",
        );
        let text = render_text(&report);
        assert!(text.contains("a_very_long_twitter_handle"));
        assert!(text.contains("234567"));
        assert!(text.contains("1234567"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn table_lists_every_account() {
        let rendered = render_table(&sample_report()).to_string();
        assert!(rendered.contains("@alice"));
        assert!(rendered.contains("+10"));
        assert!(rendered.contains("@bob"));
        assert!(rendered.contains("--"));
    }
}
