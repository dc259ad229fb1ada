// File: livelist-sync/src/source.rs
// Purpose: Paginated query contract between a live list and the backend

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::record::RecordKind;

/// Filter value meaning "no filter" in the dashboard's select boxes
const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Value of the `ordering` parameter: `-field` or `+field`
    pub fn ordering(&self) -> String {
        match self.direction {
            SortDirection::Ascending => format!("+{}", self.field),
            SortDirection::Descending => format!("-{}", self.field),
        }
    }
}

/// Everything that selects one page of a server-side list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    filters: BTreeMap<String, String>,
    search: Option<String>,
    page: u32,
    page_size: u32,
    sort: Option<Sort>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PageQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: BTreeMap::new(),
            search: None,
            page: 1,
            page_size: page_size.max(1),
            sort: None,
        }
    }

    /// Add a filter. `"all"` and blank values clear the filter instead.
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_filter(key, value);
        self
    }

    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == ALL {
            self.filters.remove(&key);
        } else {
            self.filters.insert(key, trimmed.to_string());
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        let trimmed = search.trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Pages are 1-based; 0 is treated as 1.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> &BTreeMap<String, String> {
        &self.filters
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn sort(&self) -> Option<&Sort> {
        self.sort.as_ref()
    }

    pub fn is_first_page(&self) -> bool {
        self.page == 1
    }

    /// Query string in the backend's parameter order:
    /// `page`, `page_size`, `search`, filters, `ordering`.
    ///
    /// The ascending `+` prefix is sent literally, as the backend expects.
    pub fn to_query_string(&self) -> String {
        let mut params = vec![
            format!("page={}", self.page),
            format!("page_size={}", self.page_size),
        ];
        if let Some(search) = &self.search {
            params.push(format!("search={}", urlencoding::encode(search)));
        }
        for (key, value) in &self.filters {
            params.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ));
        }
        if let Some(sort) = &self.sort {
            let prefix = match sort.direction {
                SortDirection::Ascending => "+",
                SortDirection::Descending => "-",
            };
            params.push(format!("ordering={}{}", prefix, urlencoding::encode(&sort.field)));
        }
        params.join("&")
    }
}

impl fmt::Display for PageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

/// One page as returned by the backend, records still untyped
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResponse {
    pub count: u64,
    pub results: Vec<Value>,
    /// Only present when the backend computes it itself
    pub total_pages: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPage {
    Bare(Vec<Value>),
    Paginated {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        results: Option<Vec<Value>>,
        #[serde(default)]
        total_pages: Option<u32>,
    },
}

impl PageResponse {
    pub fn new(count: u64, results: Vec<Value>) -> Self {
        Self {
            count,
            results,
            total_pages: None,
        }
    }

    /// Accept both `{count, results}` envelopes and bare arrays.
    ///
    /// Missing `count`/`results` default to zero/empty.
    pub fn from_value(value: Value) -> Result<Self> {
        let page = match serde_json::from_value::<RawPage>(value)? {
            RawPage::Bare(results) => Self::new(results.len() as u64, results),
            RawPage::Paginated {
                count,
                results,
                total_pages,
            } => Self {
                count: count.unwrap_or(0),
                results: results.unwrap_or_default(),
                total_pages,
            },
        };
        Ok(page)
    }

    /// `max(1, ceil(count / page_size))` unless the backend said otherwise
    pub fn total_pages(&self, page_size: u32) -> u32 {
        total_pages_for(self.count, page_size, self.total_pages)
    }
}

pub fn total_pages_for(count: u64, page_size: u32, explicit: Option<u32>) -> u32 {
    if let Some(total) = explicit {
        return total.max(1);
    }
    let page_size = u64::from(page_size.max(1));
    let pages = count.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Supplier of full page loads
#[async_trait]
pub trait PageSource: Send + Sync + 'static {
    async fn fetch(&self, kind: RecordKind, query: &PageQuery) -> Result<PageResponse>;
}
