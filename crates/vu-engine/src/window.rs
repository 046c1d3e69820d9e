//! Page windows for simulated scrolling through paginated listings.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::catalog::weighted_pick;

/// An inclusive row range `[start, end]` of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub start: u64,
    pub end: u64,
}

impl PageWindow {
    /// Window covering `page` for the given page size.
    ///
    /// `page_size` must be positive; configuration validation rejects zero.
    pub fn for_page(page: u32, page_size: u32) -> Self {
        let start = u64::from(page) * u64::from(page_size);
        let end = start + u64::from(page_size.max(1)) - 1;
        Self { start, end }
    }

    /// Pick a page uniformly from `0..=max_page` and return its window.
    ///
    /// Pages are equally weighted entries in the same cumulative walk the
    /// behavior catalog uses.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, page_size: u32, max_page: u32) -> Self {
        let cumulative: Vec<u64> = (1..=u64::from(max_page) + 1).collect();
        let page = weighted_pick(rng, &cumulative).unwrap_or(0) as u32;
        Self::for_page(page, page_size)
    }

    /// Number of rows covered.
    pub fn rows(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for a `Range` request header, e.g. `50-99`.
    pub fn range_header(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
