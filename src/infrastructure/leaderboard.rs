use comfy_table::{Cell, CellAlignment, Table};

use crate::TrendingRepository;

const DESCRIPTION_WIDTH: usize = 60;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut truncated = text.chars().take(width.saturating_sub(1)).collect::<String>();
    truncated.push('…');

    truncated
}

/// Renders the ranked trending rows as a table, rank 1 first.
pub fn render_leaderboard(rows: &[TrendingRepository]) -> String {
    if rows.is_empty() {
        return "No trending repositories recorded in this window.\n".to_string();
    }

    let mut table = Table::new();
    table.set_header(vec![
        "TOP",
        "REPOSITORY",
        "STARS",
        "FORKS",
        "LANGUAGE",
        "COLLECTED AT",
        "DESCRIPTION",
    ]);
    for (rank, row) in rows.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1).set_alignment(CellAlignment::Right),
            Cell::new(&row.full_name),
            Cell::new(*row.max_stars).set_alignment(CellAlignment::Right),
            Cell::new(*row.max_forks).set_alignment(CellAlignment::Right),
            Cell::new(&row.language),
            Cell::new(row.collected_at.format("%Y-%m-%d %H:%M")),
            Cell::new(truncate(&row.description, DESCRIPTION_WIDTH)),
        ]);
    }

    format!("{table}\n")
}
