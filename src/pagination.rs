use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::BookingView;
use crate::onboarding::OnboardingPortal;

pub const MAX_LIMIT: u32 = 100;

/// `page`/`limit` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Items per page (default 10, max 100).
    pub limit: Option<u32>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn from_query(query: PageQuery, default_limit: u32) -> Self {
        Self {
            page: query.page.unwrap_or(1).max(1),
            limit: query.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub limit: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(u64::from(request.limit));
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self {
            current_page: request.page,
            total_pages,
            total_items,
            limit: request.limit,
            has_next_page: request.page < total_pages,
            has_prev_page: request.page > 1,
        }
    }
}

/// List envelope shared by every paginated endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[aliases(
    BookingList = ResponseList<BookingView>,
    OnboardingPortalList = ResponseList<OnboardingPortal>
)]
pub struct ResponseList<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> ResponseList<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total_items: u64) -> Self {
        Self {
            success: true,
            data,
            pagination: Pagination::new(request, total_items),
        }
    }
}

/// Slices an already filtered collection into one page.
pub fn paginate<T: Clone>(items: &[T], request: PageRequest) -> Vec<T> {
    let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
    items
        .iter()
        .skip(offset)
        .take(request.limit as usize)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_clamping() {
        let req = PageRequest::from_query(PageQuery::default(), 10);
        assert_eq!(req, PageRequest { page: 1, limit: 10 });

        let req = PageRequest::from_query(
            PageQuery {
                page: Some(0),
                limit: Some(500),
            },
            10,
        );
        assert_eq!(req, PageRequest { page: 1, limit: MAX_LIMIT });
    }

    #[test]
    fn test_middle_page_flags() {
        let p = Pagination::new(PageRequest { page: 2, limit: 10 }, 35);
        assert_eq!(p.total_pages, 4);
        assert!(p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn test_page_beyond_total_disables_next() {
        let p = Pagination::new(PageRequest { page: 9, limit: 10 }, 35);
        assert_eq!(p.total_pages, 4);
        assert!(!p.has_next_page);

        let items: Vec<u32> = (0..35).collect();
        assert!(paginate(&items, PageRequest { page: 9, limit: 10 }).is_empty());
    }

    #[test]
    fn test_last_page_slice() {
        let items: Vec<u32> = (0..35).collect();
        let page = paginate(&items, PageRequest { page: 4, limit: 10 });
        assert_eq!(page, vec![30, 31, 32, 33, 34]);
        assert!(!Pagination::new(PageRequest { page: 4, limit: 10 }, 35).has_next_page);
    }

    #[test]
    fn test_empty_collection() {
        let p = Pagination::new(PageRequest { page: 1, limit: 10 }, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);
    }
}
