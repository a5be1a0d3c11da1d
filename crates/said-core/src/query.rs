//! # Query Evaluation: Filter → Sort → Paginate
//!
//! `list` semantics shared by the Local Provider and the HTTP surface.
//! The three stages always run in that order; `total` counts the filtered
//! records before pagination.
//!
//! - `search` matches case-insensitively against `name` OR `description`.
//! - `tags` matches when the record has at least one of the query's tags.
//! - `createdBy` / `isPublic` are exact matches when present.
//! - Sorting is stable: ties keep enumeration order in both directions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaData;

/// Field a listing is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    /// Parse the wire name; unknown values yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "name" => Some(Self::Name),
            "createdAt" => Some(Self::CreatedAt),
            "updatedAt" => Some(Self::UpdatedAt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Filter, sort, and page parameters for `list`.
///
/// Unset paging/sorting fields fall back to the evaluating provider's
/// [`QueryDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
}

impl SchemaQuery {
    /// Whether a record passes every filter present on this query.
    pub fn matches(&self, schema: &SchemaData) -> bool {
        let meta = &schema.metadata;

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let name_match = meta.name.to_lowercase().contains(&needle);
            let desc_match = meta
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !name_match && !desc_match {
                return false;
            }
        }

        if let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) {
            if !meta.has_any_tag(tags) {
                return false;
            }
        }

        if let Some(created_by) = &self.created_by {
            if meta.created_by.as_ref() != Some(created_by) {
                return false;
            }
        }

        if let Some(is_public) = self.is_public {
            if meta.is_public != is_public {
                return false;
            }
        }

        true
    }
}

/// Provider-specific defaults for unset paging and sorting fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub limit: usize,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl QueryDefaults {
    /// Defaults of the Local Provider.
    pub const LOCAL: Self = Self {
        limit: 50,
        sort_by: SortBy::CreatedAt,
        sort_order: SortOrder::Desc,
    };

    /// Defaults of the HTTP collection endpoint.
    pub const HTTP: Self = Self {
        limit: 100,
        sort_by: SortBy::UpdatedAt,
        sort_order: SortOrder::Desc,
    };
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSearchResult {
    pub schemas: Vec<SchemaData>,
    /// Filtered-but-unpaginated count.
    pub total: usize,
    pub has_more: bool,
}

fn compare(a: &SchemaData, b: &SchemaData, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Name => a
            .metadata
            .name
            .to_lowercase()
            .cmp(&b.metadata.name.to_lowercase()),
        SortBy::CreatedAt => a.metadata.created_at.cmp(&b.metadata.created_at),
        SortBy::UpdatedAt => a.metadata.updated_at.cmp(&b.metadata.updated_at),
    }
}

/// Evaluate a query over records given in enumeration order.
///
/// A `limit` of zero is treated as unset.
pub fn apply_query<I>(records: I, query: &SchemaQuery, defaults: QueryDefaults) -> SchemaSearchResult
where
    I: IntoIterator<Item = SchemaData>,
{
    let mut results: Vec<SchemaData> = records.into_iter().filter(|s| query.matches(s)).collect();

    let sort_by = query.sort_by.unwrap_or(defaults.sort_by);
    let sort_order = query.sort_order.unwrap_or(defaults.sort_order);
    // `sort_by` is stable; reversing the comparator (not the output) keeps
    // ties in enumeration order for descending sorts too.
    match sort_order {
        SortOrder::Asc => results.sort_by(|a, b| compare(a, b, sort_by)),
        SortOrder::Desc => results.sort_by(|a, b| compare(b, a, sort_by)),
    }

    let total = results.len();
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(defaults.limit);
    let has_more = offset.saturating_add(limit) < total;

    let schemas = results.into_iter().skip(offset).take(limit).collect();

    SchemaSearchResult {
        schemas,
        total,
        has_more,
    }
}
