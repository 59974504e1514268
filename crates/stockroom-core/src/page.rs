use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// Page selection as sent by list endpoints (`?perPage=10&currentPage=1`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_current_page")]
    pub current_page: i64,
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

fn default_current_page() -> i64 {
    1
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            current_page: 1,
        }
    }
}

impl PageQuery {
    pub fn new(per_page: i64, current_page: i64) -> Self {
        Self {
            per_page,
            current_page,
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    pub fn offset(&self) -> i64 {
        (self.current_page.max(1) - 1) * self.limit()
    }
}

/// Body of the `/filter` endpoints: a free-text needle plus the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    #[serde(default)]
    pub filter: String,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    #[serde(default = "default_current_page")]
    pub current_page: i64,
}

impl FilterQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery::new(self.per_page, self.current_page)
    }

    /// The needle wrapped for a `LIKE` comparison.
    pub fn pattern(&self) -> String {
        let escaped = self
            .filter
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    }
}

/// One page of rows plus the total number of matching rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub rows: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            count: 0,
            rows: Vec::new(),
        }
    }
}
