use serde::{Deserialize, Serialize};

/// Sort direction for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

impl SortOrder {
    /// Query string form.
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Pagination parameters merged into the query string of a paginated GET.
///
/// Defaults to the first page of 20 items, unsorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
    /// Sort column
    pub sort_by: Option<String>,
    /// Sort direction
    pub sort_order: Option<SortOrder>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort_by: None,
            sort_order: None,
        }
    }
}

impl Pagination {
    /// Page `page` with the default page size.
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sort by `column` in `order`.
    pub fn sorted_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(column.into());
        self.sort_order = Some(order);
        self
    }

    /// Query parameters: `page`, `page_size`, then `sort_by` / `sort_order` when set.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.to_string()),
            ("page_size".to_string(), self.page_size.to_string()),
        ];
        if let Some(sort_by) = &self.sort_by {
            query.push(("sort_by".to_string(), sort_by.clone()));
        }
        if let Some(order) = self.sort_order {
            query.push(("sort_order".to_string(), order.as_str().to_string()));
        }
        query
    }
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    /// Items on this page
    #[serde(alias = "list", alias = "results")]
    pub items: Vec<T>,
    /// Total number of items across all pages
    #[serde(default)]
    pub total: u64,
    /// Current page
    #[serde(default = "first_page")]
    pub page: u32,
    /// Page size
    #[serde(default, alias = "pageSize")]
    pub page_size: u32,
    /// Total number of pages, when the server reports it
    #[serde(default, alias = "totalPages", skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
}

fn first_page() -> u32 {
    1
}
