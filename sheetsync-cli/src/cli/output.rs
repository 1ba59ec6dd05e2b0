//! Terminal rendering for previews and outcomes

use colored::*;

use super::OutputFormat;
use crate::error::Outcome;
use crate::sync::Dataset;

/// Cells wider than this are cut in previews
const MAX_CELL_WIDTH: usize = 40;

/// Render the first `limit` rows as an aligned text table
pub fn format_preview(dataset: &Dataset, limit: usize) -> String {
    let rows: Vec<Vec<String>> = dataset
        .head(limit)
        .iter()
        .map(|row| row.iter().map(|v| truncate(&v.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = dataset
        .columns()
        .iter()
        .map(|c| truncate(c).chars().count())
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let header: Vec<String> = dataset.columns().iter().map(|c| truncate(c)).collect();
    let mut lines = vec![
        render(header.as_slice()),
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    ];
    lines.extend(rows.iter().map(|row| render(row.as_slice())));
    lines.join("\n")
}

/// Print a preview with a row count line
pub fn print_preview(dataset: &Dataset, limit: usize) {
    println!("{}", format_preview(dataset, limit));
    let shown = dataset.head(limit).len();
    println!(
        "{}",
        format!("Showing {} of {} rows", shown, dataset.row_count()).dimmed()
    );
    println!();
}

pub fn format_outcome(outcome: &Outcome, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_else(|e| {
            log::error!("Failed to serialize outcome: {}", e);
            format!("{{\"success\": {}}}", outcome.success)
        }),
        OutputFormat::Text if outcome.success => {
            format!("{} {}", "✓".bright_green().bold(), outcome.message)
        }
        OutputFormat::Text => format!("{} {}", "✗".bright_red().bold(), outcome.message.red()),
    }
}

/// Failures go to stderr in text mode; JSON always goes to stdout
pub fn print_outcome(outcome: &Outcome, format: OutputFormat) {
    let rendered = format_outcome(outcome, format);
    if outcome.success || format == OutputFormat::Json {
        println!("{}", rendered);
    } else {
        eprintln!("{}", rendered);
    }
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_CELL_WIDTH {
        return s.to_string();
    }
    let cut: String = s.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Value;

    fn sample() -> Dataset {
        Dataset::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec![Value::Int(1), Value::Text("Ana".into())],
                vec![Value::Int(22), Value::Null],
                vec![Value::Int(3), Value::Text("x".repeat(60))],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_preview_is_aligned_and_limited() {
        let preview = format_preview(&sample(), 2);
        let lines: Vec<&str> = preview.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "id | name");
        assert_eq!(lines[1], "---+-------");
        assert_eq!(lines[2], "1  | Ana");
        assert_eq!(lines[3], "22 | (null)");
    }

    #[test]
    fn test_preview_truncates_long_cells() {
        let preview = format_preview(&sample(), 3);
        let last = preview.lines().last().unwrap();
        assert!(last.ends_with("..."));
        assert_eq!(last.chars().count(), "3  | ".len() + MAX_CELL_WIDTH);
    }

    #[test]
    fn test_outcome_as_json() {
        let outcome = Outcome::failure("Connection error: refused");
        let json = format_outcome(&outcome, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["success"], false);
        assert_eq!(parsed["message"], "Connection error: refused");
    }

    #[test]
    fn test_outcome_as_text() {
        colored::control::set_override(false);
        let text = format_outcome(&Outcome::success("Upsert completed"), OutputFormat::Text);
        assert_eq!(text, "✓ Upsert completed");
    }
}
