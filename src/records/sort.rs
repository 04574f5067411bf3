use super::{FieldValue, StockRecord};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    Market,
    Code,
    Name,
    Price,
    PreviousClose,
    ChangeRate,
    Volume,
    RecentPostCount,
    ForeignRatioCurrent,
    ForeignRatioPrevious,
    PostsSummary,
    Sentiment,
    IsFlagged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Column and direction currently applied to the stock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::RecentPostCount,
            direction: SortDirection::Desc,
        }
    }
}

impl SortState {
    /// Selecting the active column flips its direction; a new column starts descending.
    pub fn toggle(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = match self.direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.key = key;
            self.direction = SortDirection::Desc;
        }
    }

    pub fn apply(&self, records: &[StockRecord]) -> Vec<StockRecord> {
        sort_records(records, self.key, self.direction)
    }
}

/// Numeric reading of display text: thousands separators and one trailing
/// `%` are ignored. Only finite numbers count.
fn numeric_text(s: &str) -> Option<f64> {
    let cleaned = s.replace(',', "");
    let cleaned = cleaned.trim();
    let cleaned = cleaned.strip_suffix('%').unwrap_or(cleaned).trim_end();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Ordering class of a field value. Every value with a numeric reading sorts
/// before every value without one, so placeholders such as `-` or an empty
/// string never interleave with numbers. Within a class the order is numeric
/// or case-insensitive text respectively.
#[derive(Debug, Clone, Copy)]
enum Rank<'a> {
    Numeric(f64),
    Text(&'a str),
}

impl<'a> Rank<'a> {
    fn of(v: FieldValue<'a>) -> Self {
        match v {
            // `+ 0.0` folds -0.0 into 0.0 so the two compare equal.
            FieldValue::Number(n) => Rank::Numeric(n + 0.0),
            FieldValue::Flag(b) => Rank::Numeric(if b { 1.0 } else { 0.0 }),
            FieldValue::Text(s) => match numeric_text(s) {
                Some(n) => Rank::Numeric(n + 0.0),
                None => Rank::Text(s),
            },
        }
    }

    fn compare(self, other: Self) -> Ordering {
        match (self, other) {
            (Rank::Numeric(a), Rank::Numeric(b)) => a.total_cmp(&b),
            (Rank::Text(a), Rank::Text(b)) => cmp_text_ci(a, b),
            (Rank::Numeric(_), Rank::Text(_)) => Ordering::Less,
            (Rank::Text(_), Rank::Numeric(_)) => Ordering::Greater,
        }
    }
}

fn cmp_text_ci(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Type-aware ascending comparison of two field values. This is a total
/// order: numbers first, then text.
pub fn compare_values(a: FieldValue<'_>, b: FieldValue<'_>) -> Ordering {
    Rank::of(a).compare(Rank::of(b))
}

/// Sorted copy of `records`. The sort is stable in both directions: records
/// that compare equal keep their input order.
pub fn sort_records(
    records: &[StockRecord],
    key: SortKey,
    direction: SortDirection,
) -> Vec<StockRecord> {
    let mut out = records.to_vec();
    out.sort_by(|a, b| {
        let ord = compare_values(a.field(key), b.field(key));
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    out
}

/// Records listed under `market`. `None` or `ALL` keeps every record.
pub fn filter_market(records: &[StockRecord], market: Option<&str>) -> Vec<StockRecord> {
    match market.map(str::trim) {
        None => records.to_vec(),
        Some(m) if m.is_empty() || m.eq_ignore_ascii_case("all") => records.to_vec(),
        Some(m) => records
            .iter()
            .filter(|r| r.market.trim().eq_ignore_ascii_case(m))
            .cloned()
            .collect(),
    }
}
