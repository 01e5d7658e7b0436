pub mod auth;
pub mod category;
pub mod content;
pub mod document;
pub mod identity;
pub mod media;

use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
}

impl PageMeta {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            current_page: page,
            total_pages,
            total_items: total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Normalises `page`/`limit` query values into (page, limit, offset).
pub fn paging(page: Option<i64>, limit: Option<i64>) -> AppResult<(i64, i64, i64)> {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::validation(format!("Page {page} is out of range")))?;
    Ok((page, limit, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_meta_rounds_up() {
        assert_eq!(PageMeta::new(1, 10, 21).total_pages, 3);
        assert_eq!(PageMeta::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn test_paging_defaults_and_clamps() {
        assert_eq!(paging(None, None).unwrap(), (1, 10, 0));
        assert_eq!(paging(Some(3), Some(20)).unwrap(), (3, 20, 40));
        assert_eq!(paging(Some(0), Some(1000)).unwrap(), (1, 100, 0));
        assert_eq!(paging(Some(i64::MIN), None).unwrap(), (1, 10, 0));
    }

    #[test]
    fn test_paging_rejects_offset_overflow() {
        let err = paging(Some(i64::MAX), Some(50)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let last = i64::MAX / 100 + 1;
        assert_eq!(paging(Some(last), Some(100)).unwrap().2, (last - 1) * 100);
        assert!(paging(Some(last + 1), Some(100)).is_err());
    }
}
