//! Paginated spreadsheet viewer.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use shared::{
    domain::FileId,
    protocol::{TablePageQuery, TablePageResponse, TableRow},
};
use tracing::{debug, info};

use crate::{
    action::{ActionPayload, SessionActionController, SubmitOutcome},
    error::ClientResult,
    notifier::Notifier,
    transport::Backend,
    NoAffordance,
};

/// Pages shown on each side of the current one in the pager.
const PAGER_RADIUS: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_index: u32,
    pub page_size: u32,
    pub sheet: Option<String>,
}

impl ActionPayload for PageRequest {
    fn is_blank(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePage {
    pub page_index: u32,
    pub page_size: u32,
    pub sheet: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub current: u32,
    pub total_pages: u32,
    pub window: Vec<u32>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(current: u32, total_pages: u32) -> Self {
        let total_pages = total_pages.max(1);
        let current = clamp_page(current, total_pages);
        let first = current.saturating_sub(PAGER_RADIUS).max(1);
        let last = (current + PAGER_RADIUS).min(total_pages);
        Self {
            current,
            total_pages,
            window: (first..=last).collect(),
            has_previous: current > 1,
            has_next: current < total_pages,
        }
    }
}

pub trait TableView: Send + Sync {
    /// Replaces the whole table.
    fn render_table(&self, page: &TablePage);
    fn render_pagination(&self, pagination: &Pagination);
}

pub fn total_pages(total_rows: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total_rows.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn clamp_page(page_index: u32, total_pages: u32) -> u32 {
    page_index.clamp(1, total_pages.max(1))
}

pub fn cell_text(row: &TableRow, column: &str) -> String {
    match row.get(column) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

struct TableState {
    current: PageRequest,
    /// Total rows last reported for `current.sheet`.
    known_total: Option<u64>,
}

pub struct PagedTableController {
    file_id: FileId,
    backend: Arc<dyn Backend>,
    view: Arc<dyn TableView>,
    actions: SessionActionController,
    state: Mutex<TableState>,
}

impl PagedTableController {
    pub fn new(
        file_id: FileId,
        page_size: u32,
        backend: Arc<dyn Backend>,
        view: Arc<dyn TableView>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            file_id,
            backend,
            view,
            actions: SessionActionController::new("table", notifier, Arc::new(NoAffordance))
                .with_failure_message("Failed to load file data"),
            state: Mutex::new(TableState {
                current: PageRequest {
                    page_index: 1,
                    page_size: page_size.max(1),
                    sheet: None,
                },
                known_total: None,
            }),
        }
    }

    pub fn current(&self) -> PageRequest {
        self.lock_state().current.clone()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, TableState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Loads and renders one page. The index is clamped to the pages that
    /// exist; on failure the previous table stays on screen.
    pub async fn load_page(
        &self,
        page_index: u32,
        page_size: u32,
        sheet: Option<String>,
    ) -> SubmitOutcome {
        let page_size = page_size.max(1);
        let (request, sheet_changed) = {
            let state = self.lock_state();
            // The first load has nothing to switch away from.
            let sheet_changed = state.known_total.is_some() && sheet != state.current.sheet;
            let mut page_index = page_index.max(1);
            if !sheet_changed {
                if let Some(total) = state.known_total {
                    page_index = clamp_page(page_index, total_pages(total, page_size));
                }
            }
            (
                PageRequest {
                    page_index,
                    page_size,
                    sheet,
                },
                sheet_changed,
            )
        };

        self.actions
            .submit(
                request,
                |_| {},
                |request| self.fetch_clamped(request, sheet_changed),
                |(request, response)| self.render(request, response),
            )
            .await
    }

    pub async fn next_page(&self) -> SubmitOutcome {
        let current = self.current();
        self.load_page(current.page_index + 1, current.page_size, current.sheet)
            .await
    }

    pub async fn previous_page(&self) -> SubmitOutcome {
        let current = self.current();
        self.load_page(
            current.page_index.saturating_sub(1),
            current.page_size,
            current.sheet,
        )
        .await
    }

    pub async fn switch_sheet(&self, sheet: impl Into<String>) -> SubmitOutcome {
        let current = self.current();
        self.load_page(1, current.page_size, Some(sheet.into())).await
    }

    async fn fetch_clamped(
        &self,
        request: PageRequest,
        sheet_changed: bool,
    ) -> ClientResult<(PageRequest, TablePageResponse)> {
        let response = self.fetch(&request).await?;
        let last_page = total_pages(response.total_rows, request.page_size);
        if request.page_index <= last_page {
            return Ok((request, response));
        }

        // Only now do we know how many pages the sheet has.
        let target = if sheet_changed { 1 } else { last_page };
        debug!(
            requested = request.page_index,
            target, last_page, "requested page out of range; refetching"
        );
        let corrected = PageRequest {
            page_index: target,
            ..request
        };
        let response = self.fetch(&corrected).await?;
        Ok((corrected, response))
    }

    async fn fetch(&self, request: &PageRequest) -> ClientResult<TablePageResponse> {
        self.backend
            .fetch_table_page(
                self.file_id,
                &TablePageQuery {
                    page: request.page_index,
                    per_page: request.page_size,
                    sheet: request.sheet.clone(),
                },
            )
            .await
    }

    fn render(&self, request: PageRequest, response: TablePageResponse) {
        let pages = total_pages(response.total_rows, request.page_size);
        let rows = response
            .data
            .iter()
            .map(|row| {
                response
                    .columns
                    .iter()
                    .map(|column| cell_text(row, column))
                    .collect()
            })
            .collect();
        let page = TablePage {
            page_index: request.page_index,
            page_size: request.page_size,
            sheet: request.sheet.clone(),
            columns: response.columns,
            rows,
            total_rows: response.total_rows,
        };

        self.view.render_table(&page);
        self.view
            .render_pagination(&Pagination::new(request.page_index, pages));
        info!(
            file = %self.file_id,
            page = page.page_index,
            pages,
            sheet = ?page.sheet,
            "table page rendered"
        );

        let mut state = self.lock_state();
        state.current = request;
        state.known_total = Some(response.total_rows);
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
