use super::{RawScalar, RawStockRecord, StockRecord};
use std::collections::HashSet;

impl RawScalar {
    fn as_text(&self) -> Option<String> {
        Some(match self {
            RawScalar::Text(s) => s.clone(),
            RawScalar::Integer(i) => i.to_string(),
            RawScalar::Float(f) => f.to_string(),
            RawScalar::Bool(b) => b.to_string(),
        })
    }

    fn as_count(&self) -> Option<u64> {
        match self {
            RawScalar::Integer(i) => Some((*i).max(0) as u64),
            RawScalar::Float(f) if f.is_finite() => Some(f.max(0.0) as u64),
            RawScalar::Text(s) => {
                let cleaned = s.replace(',', "");
                let cleaned = cleaned.trim();
                cleaned.parse::<u64>().ok().or_else(|| {
                    cleaned
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f.max(0.0) as u64)
                })
            }
            _ => None,
        }
    }

    fn as_flag(&self) -> Option<bool> {
        match self {
            RawScalar::Bool(b) => Some(*b),
            RawScalar::Integer(i) => Some(*i != 0),
            RawScalar::Text(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
            RawScalar::Text(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

/// First candidate, in precedence order, that is present and coerces.
fn resolve<T>(
    candidates: &[&Option<RawScalar>],
    coerce: impl Fn(&RawScalar) -> Option<T>,
) -> Option<T> {
    candidates
        .iter()
        .filter_map(|&c| c.as_ref())
        .find_map(coerce)
}

fn text(candidates: &[&Option<RawScalar>]) -> String {
    resolve(candidates, RawScalar::as_text).unwrap_or_default()
}

/// Resolve a raw record into the canonical shape. Current keys win over
/// legacy aliases; a field with no usable key takes its type's default.
pub fn normalize(raw: &RawStockRecord) -> StockRecord {
    StockRecord {
        market: text(&[&raw.market]),
        code: text(&[&raw.code]),
        name: text(&[&raw.name]),
        price: text(&[&raw.price, &raw.current_price]),
        previous_close: text(&[&raw.prev_close, &raw.yesterday_close]),
        change_rate: text(&[&raw.change_rate]),
        volume: text(&[&raw.volume]),
        recent_post_count: resolve(
            &[&raw.recent_posts_count, &raw.count_today],
            RawScalar::as_count,
        )
        .unwrap_or_default(),
        foreign_ratio_current: text(&[&raw.foreign_rate, &raw.foreign_ratio_today]),
        foreign_ratio_previous: text(&[&raw.prev_foreign_rate, &raw.foreign_ratio_yesterday]),
        posts_summary: text(&[&raw.posts_summary, &raw.summary]),
        sentiment: text(&[&raw.sentiment]),
        is_flagged: resolve(
            &[&raw.is_last_captured, &raw.is_consecutive],
            RawScalar::as_flag,
        )
        .unwrap_or_default(),
    }
}

/// Normalize a fetched batch. A code seen twice keeps its first record.
pub fn normalize_batch(raws: &[RawStockRecord]) -> Vec<StockRecord> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(raws.len());
    for raw in raws {
        let record = normalize(raw);
        if !seen.insert(record.code.clone()) {
            tracing::warn!(code = %record.code, "dropping duplicate stock record");
            continue;
        }
        out.push(record);
    }
    out
}
