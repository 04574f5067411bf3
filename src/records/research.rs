use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category key (`invest`, `company`, ...) to that category's reports.
pub type ResearchMap = BTreeMap<String, ResearchCategory>;

/// Display order of the categories the scraper publishes.
const CATEGORY_ORDER: [&str; 4] = ["invest", "company", "industry", "economy"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchCategory {
    #[serde(default)]
    pub today_count: u32,
    #[serde(default)]
    pub items: Vec<ResearchItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub pdf_link: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub analysis: Option<ResearchAnalysis>,
}

impl ResearchItem {
    /// The scraper writes `""` when a report has no PDF.
    pub fn pdf(&self) -> Option<&str> {
        self.pdf_link.as_deref().filter(|s| !s.trim().is_empty())
    }
}

/// Structured summary extracted from a report's PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchAnalysis {
    #[serde(default)]
    pub opinion: Option<String>,
    #[serde(default)]
    pub target_price: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Categories in display order: the known ones first, the rest alphabetically.
pub fn ordered_categories(map: &ResearchMap) -> Vec<(&str, &ResearchCategory)> {
    let mut out: Vec<(&str, &ResearchCategory)> = CATEGORY_ORDER
        .iter()
        .filter_map(|k| map.get_key_value(*k))
        .map(|(k, v)| (k.as_str(), v))
        .collect();
    out.extend(
        map.iter()
            .filter(|(k, _)| !CATEGORY_ORDER.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v)),
    );
    out
}
