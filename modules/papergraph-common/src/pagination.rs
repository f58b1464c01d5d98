use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Limit/offset window used by the follow lists and feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPage")]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Limit is clamped to `1..=MAX_LIMIT`; negative offsets become 0.
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    /// Apply this window to an already-ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

impl From<RawPage> for Page {
    fn from(raw: RawPage) -> Self {
        Page::new(raw.limit, raw.offset)
    }
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

fn default_page() -> i64 {
    1
}

/// Page-numbered request used by the activity listing. Deserialized
/// values go through [`PageRequest::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPageRequest")]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

#[derive(Deserialize)]
struct RawPageRequest {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    page_size: i64,
}

impl From<RawPageRequest> for PageRequest {
    fn from(raw: RawPageRequest) -> Self {
        PageRequest::new(raw.page, raw.page_size)
    }
}

impl PageRequest {
    /// Page is at least 1; page size is clamped to `1..=MAX_LIMIT`.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_LIMIT),
        }
    }

    /// Re-apply the bounds to a value built by hand.
    pub fn normalized(self) -> Self {
        Self::new(self.page, self.page_size)
    }

    pub fn as_page(&self) -> Page {
        Page {
            limit: self.page_size,
            offset: (self.page - 1) * self.page_size,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: i64) -> Self {
        let request = request.normalized();
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
            total_pages: (total + request.page_size - 1) / request.page_size,
        }
    }
}
