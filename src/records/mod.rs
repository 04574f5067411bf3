//! Stock and research records.
//!
//! Raw stock records arrive in several schema revisions. They are decoded into
//! [`RawStockRecord`], which names every known key explicitly, and resolved into
//! the canonical [`StockRecord`] by [`normalize_batch`]. Nothing past that boundary
//! looks up fields by name.

mod normalize;
mod research;
mod sort;

pub use normalize::normalize_batch;
pub use research::{ordered_categories, ResearchCategory, ResearchItem, ResearchMap};
pub use sort::{filter_market, SortDirection, SortKey, SortState};

use serde::{Deserialize, Serialize};

/// A scalar as it appears in the raw JSON. `null` decodes to `None` on the
/// enclosing `Option`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawScalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// One raw stock record with every key any scraper revision has written.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawStockRecord {
    pub market: Option<RawScalar>,
    pub code: Option<RawScalar>,
    pub name: Option<RawScalar>,
    pub price: Option<RawScalar>,
    pub current_price: Option<RawScalar>,
    pub prev_close: Option<RawScalar>,
    pub yesterday_close: Option<RawScalar>,
    pub change_rate: Option<RawScalar>,
    pub volume: Option<RawScalar>,
    pub recent_posts_count: Option<RawScalar>,
    pub count_today: Option<RawScalar>,
    pub foreign_rate: Option<RawScalar>,
    pub foreign_ratio_today: Option<RawScalar>,
    pub prev_foreign_rate: Option<RawScalar>,
    pub foreign_ratio_yesterday: Option<RawScalar>,
    pub posts_summary: Option<RawScalar>,
    pub summary: Option<RawScalar>,
    pub sentiment: Option<RawScalar>,
    pub is_last_captured: Option<RawScalar>,
    pub is_consecutive: Option<RawScalar>,
}

/// Canonical stock record. Every field always holds a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub market: String,
    pub code: String,
    pub name: String,
    pub price: String,
    pub previous_close: String,
    pub change_rate: String,
    pub volume: String,
    pub recent_post_count: u64,
    pub foreign_ratio_current: String,
    pub foreign_ratio_previous: String,
    pub posts_summary: String,
    pub sentiment: String,
    pub is_flagged: bool,
}

/// A borrowed field value, typed for comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Flag(bool),
}

impl StockRecord {
    pub fn field(&self, key: SortKey) -> FieldValue<'_> {
        match key {
            SortKey::Market => FieldValue::Text(&self.market),
            SortKey::Code => FieldValue::Text(&self.code),
            SortKey::Name => FieldValue::Text(&self.name),
            SortKey::Price => FieldValue::Text(&self.price),
            SortKey::PreviousClose => FieldValue::Text(&self.previous_close),
            SortKey::ChangeRate => FieldValue::Text(&self.change_rate),
            SortKey::Volume => FieldValue::Text(&self.volume),
            SortKey::RecentPostCount => FieldValue::Number(self.recent_post_count as f64),
            SortKey::ForeignRatioCurrent => FieldValue::Text(&self.foreign_ratio_current),
            SortKey::ForeignRatioPrevious => FieldValue::Text(&self.foreign_ratio_previous),
            SortKey::PostsSummary => FieldValue::Text(&self.posts_summary),
            SortKey::Sentiment => FieldValue::Text(&self.sentiment),
            SortKey::IsFlagged => FieldValue::Flag(self.is_flagged),
        }
    }
}
