//! Shared value types for the notesync engine.
//!
//! Filter criteria, pagination state and the notices the store raises for the
//! UI live here next to the crate-wide `Result` alias.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Category, Note, SyncError};

/// A specialized Result type for notesync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Key the filtered view is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Updated,
    Created,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Category selector: every category, or exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => *wanted == category,
        }
    }
}

/// Criteria for the derived list view
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotesFilter {
    /// Free text matched against title, content and tags
    pub search: String,
    pub category: CategoryFilter,
    /// Every tag listed here must be present on a note
    pub tags: Vec<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl NotesFilter {
    /// `updated`/`desc` is the collection's natural order.
    pub fn uses_default_sort(&self) -> bool {
        self.sort_by == SortBy::Updated && self.sort_order == SortOrder::Desc
    }
}

/// Window of the last successful fetch for the shown partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(limit: u32) -> Self {
        Pagination {
            page: 1,
            limit,
            total: 0,
            total_pages: 0,
        }
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One page of notes as returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesPage {
    pub notes: Vec<Note>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// A transient message for the UI, expired by the store after a while
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(message: impl Into<String>, raised_at: DateTime<Utc>) -> Self {
        Notice {
            message: message.into(),
            raised_at,
        }
    }
}
