//! Operational policy passed into the core by its host. These knobs are
//! inputs, not decisions the core makes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Accept joining members immediately instead of leaving them
    /// pending for admin approval.
    pub auto_accept_members: bool,
    /// Days past the scheduled payout date before an unsettled cycle
    /// is marked delayed.
    pub cycle_grace_days: u32,
    /// Default page size for list queries.
    pub page_size: u32,
    /// Upper bound a caller may request per page.
    pub max_page_size: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            auto_accept_members: false,
            cycle_grace_days: 2,
            page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Pagination input, clamped against config limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub fn first(config: &CoreConfig) -> Self {
        Self {
            number: 1,
            size: config.page_size,
        }
    }

    pub fn clamped(number: u32, size: u32, config: &CoreConfig) -> Self {
        Self {
            number: number.max(1),
            size: size.clamp(1, config.max_page_size),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.number - 1) * self.size
    }
}
