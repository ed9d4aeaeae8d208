pub const DEFAULT_PAGE_SIZE: u32 = 4;

/// Page arithmetic for the pager under the task table.
///
/// Purely informational: a page past the end stays selectable and is sent
/// to the server unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub item_count: u64,
    pub page_size: u32,
    pub current_page: u32,
}

impl Pagination {
    pub fn new(item_count: u64, page_size: u32, current_page: u32) -> Self {
        Self {
            item_count,
            page_size: page_size.max(1),
            current_page: current_page.max(1),
        }
    }

    pub fn page_count(&self) -> u64 {
        self.item_count.div_ceil(u64::from(self.page_size))
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.current_page) < self.page_count()
    }

    pub fn is_out_of_range(&self) -> bool {
        u64::from(self.current_page) > self.page_count().max(1)
    }
}
