//! Interest and category filters applied at query time.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;

use crate::entities::MatchRecord;

/// Tags contributed by an interest code with no entry in the table.
pub const CATCH_ALL_TAGS: [&str; 2] = ["其他", "综合"];

static INTEREST_TAGS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("1", &["足球"][..]),
        ("2", &["篮球"][..]),
        ("3", &["NBA"][..]),
        ("4", &["电竞"][..]),
        ("41", &["英雄联盟"][..]),
        ("42", &["DOTA2"][..]),
        ("43", &["绝地求生"][..]),
        ("44", &["王者荣耀"][..]),
        ("45", &["无畏契约"][..]),
        ("51", &["F1"][..]),
        ("52", &["网球"][..]),
        ("53", &["斯诺克"][..]),
        ("54", &["NFL"][..]),
        ("55", &["MLB"][..]),
        ("56", &["NHL"][..]),
        ("57", &["拳击"][..]),
        ("58", &["UFC"][..]),
        ("59", &["高尔夫"][..]),
        ("60", &["田径"][..]),
        ("61", &["排球"][..]),
        ("62", &["羽毛球"][..]),
        ("63", &["乒乓球"][..]),
    ])
});

// ============================================================================
// INTEREST FILTER
// ============================================================================

/// Set of tags derived from a user's interest codes (`usersports`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestFilter {
    tags: BTreeSet<String>,
}

impl InterestFilter {
    /// Build from a comma separated code list such as `"1,2,41"`.
    pub fn from_codes(raw: &str) -> Self {
        let mut tags = BTreeSet::new();
        for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            match INTEREST_TAGS.get(code) {
                Some(mapped) => tags.extend(mapped.iter().map(|t| t.to_string())),
                None => tags.extend(CATCH_ALL_TAGS.iter().map(|t| t.to_string())),
            }
        }
        Self { tags }
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// True when any of `labels` is one of the filter's tags.
    pub fn matches(&self, labels: &[String]) -> bool {
        labels.iter().any(|label| self.tags.contains(label))
    }
}

// ============================================================================
// CATEGORY FILTER
// ============================================================================

/// Allowed category (league) ids (`pgame_league_ids`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    ids: BTreeSet<String>,
}

impl CategoryFilter {
    pub fn from_ids(raw: &str) -> Self {
        Self {
            ids: raw
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn allows(&self, category: &str) -> bool {
        self.ids.contains(category)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// Query-time selection of a single record.
///
/// Categorized records are selected by the category filter alone; records
/// without a category are selected by their tags.
pub fn selects(record: &MatchRecord, interests: &InterestFilter, categories: &CategoryFilter) -> bool {
    match record.category() {
        Some(category) => categories.allows(&category),
        None => interests.matches(&record.labels()),
    }
}
