use crate::error::AppError;

/// Entries per listing page.
pub const PAGE_SIZE: i64 = 12;

/// `?page=` value: ASCII digits only, anything else (or nothing) is page 1.
pub fn parse_page(raw: Option<&str>) -> i64 {
    match raw {
        Some(v) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => {
            v.parse().unwrap_or(i64::MAX)
        }
        _ => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub max_page: i64,
}

impl PageWindow {
    /// Validates `page` against `total`.
    ///
    /// Page 0 or below is always invalid. Past-the-end pages are invalid only
    /// when there is something to page through: with `total == 0` every
    /// positive page is an empty, valid page.
    pub fn new(total: i64, limit: i64, page: i64) -> Result<Self, AppError> {
        let max_page = if total <= 0 { 0 } else { (total + limit - 1) / limit };
        if (total != 0 && page > max_page) || page <= 0 {
            return Err(AppError::PageNotFound);
        }
        Ok(Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
            max_page,
        })
    }

    pub fn next_page(&self) -> Option<i64> {
        (self.page < self.max_page).then(|| self.page + 1)
    }

    pub fn prev_page(&self) -> Option<i64> {
        (self.page > 1).then(|| self.page - 1)
    }

    pub fn next_url(&self, path: &str) -> Option<String> {
        self.next_page().map(|p| format!("{path}?page={p}"))
    }

    pub fn prev_url(&self, path: &str) -> Option<String> {
        self.prev_page().map(|p| format!("{path}?page={p}"))
    }
}
