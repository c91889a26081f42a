//! Page parameters for list endpoints (`?per-page=&page=`).

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 25;
pub const MAX_PER_PAGE: u64 = 100;

/// `per_page` is clamped to 1–100 and `page` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_per_page", rename = "per-page")]
    pub per_page: u64,
    #[serde(default = "default_page")]
    pub page: u64,
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

fn default_page() -> u64 {
    1
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
            page: default_page(),
        }
    }
}

impl PageRequest {
    pub fn clamped(self) -> Self {
        Self {
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
            page: self.page.max(1),
        }
    }

    /// Number of rows to skip for this page.
    pub fn offset(&self) -> u64 {
        let page = self.clamped();
        (page.page - 1).saturating_mul(page.per_page)
    }

    pub fn limit(&self) -> u64 {
        self.clamped().per_page
    }
}
