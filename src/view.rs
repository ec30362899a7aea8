//! Headless list/detail view over one resource.
//!
//! [`ListView`] is a pure state machine: it hands out [`PageRequest`]s and
//! applies their results, so it can be driven by a real client
//! ([`ListController`]) or directly from tests.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::{ClientError, CmsClient};
use crate::model::Record;
use crate::resource::Resource;

pub const DEFAULT_PER_PAGE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Error(String),
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Identifies one in-flight optimistic mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingToken(Uuid);

#[derive(Debug)]
struct PendingDelete {
    index: usize,
    record: Record,
}

/// A fetch the view is waiting on. `limit` is one more than the page size so
/// the extra record reveals whether a next page exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub start: usize,
    pub limit: usize,
    seq: u64,
}

#[derive(Debug)]
pub struct ListView {
    label: &'static str,
    state: ViewState,
    page: usize,
    per_page: usize,
    items: Vec<Record>,
    has_next: bool,
    seq: u64,
    pending: HashMap<PendingToken, PendingDelete>,
    notices: Vec<Notice>,
}

impl ListView {
    pub fn new(resource: &'static Resource, per_page: usize) -> Self {
        Self {
            label: resource.label,
            state: ViewState::Loading,
            page: 0,
            per_page: per_page.max(1),
            items: Vec::new(),
            has_next: false,
            seq: 0,
            pending: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn items(&self) -> &[Record] {
        &self.items
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }

    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn find(&self, id: i64) -> Option<&Record> {
        self.items.iter().find(|r| r.id == id)
    }

    /// Enter `Loading` for the current page.
    pub fn begin_load(&mut self) -> PageRequest {
        self.seq += 1;
        self.state = ViewState::Loading;
        PageRequest {
            page: self.page,
            start: self.page * self.per_page,
            limit: self.per_page + 1,
            seq: self.seq,
        }
    }

    /// Apply a fetch result. Returns `false` when `req` was superseded by a
    /// later [`begin_load`](Self::begin_load) and the result was dropped.
    pub fn apply_fetch(&mut self, req: PageRequest, result: Result<Vec<Record>, String>) -> bool {
        if req.seq != self.seq {
            debug!(page = req.page, "dropping stale page");
            return false;
        }
        match result {
            Ok(mut records) => {
                records.retain(|r| !self.is_pending_delete(r.id));
                self.has_next = records.len() > self.per_page;
                records.truncate(self.per_page);
                self.items = records;
                self.state = ViewState::Ready;
            }
            Err(err) => {
                warn!(page = req.page, error = %err, "failed to load page");
                self.items.clear();
                self.has_next = false;
                self.state = ViewState::Error("Failed to load items.".into());
            }
        }
        true
    }

    pub fn goto_page(&mut self, page: usize) -> PageRequest {
        self.page = page;
        self.begin_load()
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        if !self.has_next {
            return None;
        }
        Some(self.goto_page(self.page + 1))
    }

    pub fn prev_page(&mut self) -> Option<PageRequest> {
        if !self.has_prev() {
            return None;
        }
        Some(self.goto_page(self.page - 1))
    }

    fn is_pending_delete(&self, id: i64) -> bool {
        self.pending.values().any(|p| p.record.id == id)
    }

    /// Remove `id` from the view ahead of the server's answer.
    ///
    /// Returns `None` if the record is not shown (or already being deleted).
    pub fn begin_delete(&mut self, id: i64) -> Option<PendingToken> {
        let index = self.items.iter().position(|r| r.id == id)?;
        let record = self.items.remove(index);
        let token = PendingToken(Uuid::new_v4());
        self.pending.insert(token, PendingDelete { index, record });
        Some(token)
    }

    /// Settle an optimistic delete. On failure the record goes back where it
    /// was and an error notice is queued.
    pub fn finish(&mut self, token: PendingToken, result: Result<(), String>) {
        let Some(op) = self.pending.remove(&token) else {
            debug!("unknown or already settled token");
            return;
        };
        match result {
            Ok(()) => self.notify(
                NoticeLevel::Success,
                format!("{} deleted successfully.", self.label),
            ),
            Err(err) => {
                let at = op.index.min(self.items.len());
                self.items.insert(at, op.record);
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to delete {}: {err}", self.label.to_lowercase()),
                );
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Show a freshly created record. Only page 0 holds the newest records;
    /// elsewhere the view is left alone.
    pub fn prepend(&mut self, record: Record) {
        if self.page != 0 {
            return;
        }
        self.items.insert(0, record);
        if self.items.len() > self.per_page {
            self.items.truncate(self.per_page);
            self.has_next = true;
        }
    }

    /// Swap in the server's copy of an edited record.
    pub fn replace(&mut self, record: Record) -> bool {
        match self.items.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

/// Stable sort putting records without a truthy `is_completed` first, the
/// order the todo list shows posts in.
pub fn incomplete_first(records: &mut [Record]) {
    records.sort_by_key(|r| r.fields.get("is_completed").and_then(Value::as_bool) == Some(true));
}

/// A [`ListView`] wired to the HTTP API.
#[derive(Debug)]
pub struct ListController {
    client: CmsClient,
    resource: &'static Resource,
    pub view: ListView,
}

impl ListController {
    pub fn new(client: CmsClient, resource: &'static Resource, per_page: usize) -> Self {
        Self {
            client,
            resource,
            view: ListView::new(resource, per_page),
        }
    }

    pub async fn load(&mut self) {
        let req = self.view.begin_load();
        self.fetch(req).await;
    }

    async fn fetch(&mut self, req: PageRequest) {
        let result = self
            .client
            .list(self.resource, req.start, req.limit)
            .await
            .map_err(|e| e.to_string());
        self.view.apply_fetch(req, result);
    }

    /// Returns `false` when there is no next page.
    pub async fn next_page(&mut self) -> bool {
        match self.view.next_page() {
            Some(req) => {
                self.fetch(req).await;
                true
            }
            None => false,
        }
    }

    pub async fn prev_page(&mut self) -> bool {
        match self.view.prev_page() {
            Some(req) => {
                self.fetch(req).await;
                true
            }
            None => false,
        }
    }

    pub async fn goto_page(&mut self, page: usize) {
        let req = self.view.goto_page(page);
        self.fetch(req).await;
    }

    pub async fn create<T: Serialize + ?Sized>(&mut self, item: &T) -> Result<Record, ClientError> {
        match self.client.create(self.resource, item).await {
            Ok(record) => {
                self.view.prepend(record.clone());
                self.view.notify(
                    NoticeLevel::Success,
                    format!("{} created successfully.", self.resource.label),
                );
                Ok(record)
            }
            Err(err) => {
                self.view.notify(NoticeLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    pub async fn update(&mut self, id: i64, fields: &Value) -> Result<Record, ClientError> {
        match self.client.update(self.resource, id, fields).await {
            Ok(record) => {
                self.view.replace(record.clone());
                self.view.notify(
                    NoticeLevel::Success,
                    format!("{} updated successfully.", self.resource.label),
                );
                Ok(record)
            }
            Err(err) => {
                self.view.notify(NoticeLevel::Error, err.to_string());
                Err(err)
            }
        }
    }

    /// Optimistic delete. Returns `false` if `id` is not on the current page.
    pub async fn delete(&mut self, id: i64) -> bool {
        let Some(token) = self.view.begin_delete(id) else {
            return false;
        };
        let result = self
            .client
            .delete(self.resource, id)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());
        self.view.finish(token, result);
        true
    }
}
