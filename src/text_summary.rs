//! Text output for CLI mode.
//!
//! This module formats the current snapshot as human-readable lines.

use crate::model::DataSnapshot;
use crate::records::{ordered_categories, SortDirection, SortState, StockRecord};
use anyhow::{bail, Result};

/// Pre-formatted lines for text output.
#[derive(Debug)]
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn header(snapshot: &DataSnapshot) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(updated) = snapshot.last_updated.as_deref() {
        lines.push(format!("Data updated: {updated}"));
    }
    if let Some(at) = snapshot.refreshed_at.as_deref() {
        lines.push(format!("Fetched: {at}"));
    }
    lines
}

/// Stock table for already filtered and sorted records.
pub(crate) fn build_stock_summary(
    snapshot: &DataSnapshot,
    records: &[StockRecord],
    sort: SortState,
) -> TextSummary {
    let mut lines = header(snapshot);
    let arrow = match sort.direction {
        SortDirection::Asc => "asc",
        SortDirection::Desc => "desc",
    };
    lines.push(format!(
        "{} stocks, sorted by {:?} {arrow}",
        records.len(),
        sort.key
    ));
    lines.push(format!(
        "{:<7} {:<8} {:<16} {:>10} {:>8} {:>6} {:>8} {:<6} {}",
        "Market", "Code", "Name", "Price", "Rate", "Posts", "Foreign", "Mood", "Summary"
    ));
    for r in records {
        lines.push(format!(
            "{:<7} {:<8} {:<16} {:>10} {:>8} {:>6} {:>8} {:<6} {}{}",
            truncate(&r.market, 7),
            truncate(&r.code, 8),
            truncate(&r.name, 16),
            truncate(&r.price, 10),
            truncate(&r.change_rate, 8),
            r.recent_post_count,
            truncate(&r.foreign_ratio_current, 8),
            truncate(&r.sentiment, 6),
            if r.is_flagged { "* " } else { "" },
            truncate(r.posts_summary.lines().next().unwrap_or(""), 60),
        ));
    }
    TextSummary { lines }
}

/// Category counts, or the reports of one category.
pub(crate) fn build_research_summary(
    snapshot: &DataSnapshot,
    category: Option<&str>,
) -> Result<TextSummary> {
    let mut lines = header(snapshot);

    let Some(category) = category else {
        for (key, cat) in ordered_categories(&snapshot.research) {
            lines.push(format!(
                "{key}: {} today, {} listed",
                cat.today_count,
                cat.items.len()
            ));
        }
        return Ok(TextSummary { lines });
    };

    let Some(cat) = snapshot.research.get(category) else {
        let known: Vec<&str> = ordered_categories(&snapshot.research)
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        bail!(
            "unknown research category {category:?} (available: {})",
            known.join(", ")
        );
    };

    lines.push(format!("{category}: {} today", cat.today_count));
    for item in &cat.items {
        lines.push(format!("[{}] {}", item.date, item.title));
        lines.push(format!("    {}", item.link));
        if let Some(pdf) = item.pdf() {
            lines.push(format!("    pdf: {pdf}"));
        }
        if let Some(a) = item.analysis.as_ref() {
            lines.push(format!(
                "    opinion {} / target {}",
                a.opinion.as_deref().unwrap_or("N/A"),
                a.target_price.as_deref().unwrap_or("N/A")
            ));
            if let Some(summary) = a.summary.as_deref() {
                lines.extend(
                    summary
                        .lines()
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| format!("    {}", l.trim())),
                );
            }
            if !a.tables.is_empty() {
                lines.push(format!("    {} table(s) extracted", a.tables.len()));
            }
        }
    }
    Ok(TextSummary { lines })
}
