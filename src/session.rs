// ✏️ Session Edit Store - in-memory working copies, one store per session
// Nothing here ever writes back to the Dataset Registry or the source files.

use crate::error::{DashboardError, Result};
use crate::registry::QueryKey;
use crate::table::{Cell, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

// ============================================================================
// WORKING COPY
// ============================================================================

/// WorkingCopy - an independent, mutable fork of a (possibly filtered) table
#[derive(Debug, Clone, Serialize)]
pub struct WorkingCopy {
    table: Table,
    forked_at: DateTime<Utc>,
    edits: usize,
}

impl WorkingCopy {
    fn fork(base: &Table) -> Self {
        WorkingCopy {
            table: base.clone(),
            forked_at: Utc::now(),
            edits: 0,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    pub fn forked_at(&self) -> DateTime<Utc> {
        self.forked_at
    }

    /// Number of edits applied through `apply`
    pub fn edit_count(&self) -> usize {
        self.edits
    }

    /// Apply one edit in place
    pub fn apply(&mut self, edit: Edit) -> Result<()> {
        edit.apply_to(&mut self.table)?;
        self.edits += 1;
        Ok(())
    }
}

/// Edit - one row-level change made through an editor widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    SetCell { row: usize, column: String, value: Cell },
    AppendRow { cells: Vec<Cell> },
    RemoveRow { row: usize },
}

impl Edit {
    pub fn apply_to(self, table: &mut Table) -> Result<()> {
        match self {
            Edit::SetCell { row, column, value } => table.set_cell(row, &column, value),
            Edit::AppendRow { cells } => {
                table.push_row(cells);
                Ok(())
            }
            Edit::RemoveRow { row } => table.remove_row(row).map(|_| ()),
        }
    }
}

// ============================================================================
// SESSION EDIT STORE
// ============================================================================

/// SessionEditStore - working copies for exactly one user session
///
/// A new store is always empty; dropping it discards every edit.
#[derive(Debug)]
pub struct SessionEditStore {
    id: Uuid,
    created_at: DateTime<Utc>,
    copies: HashMap<QueryKey, WorkingCopy>,
}

impl SessionEditStore {
    pub fn new() -> Self {
        SessionEditStore {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            copies: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Existing working copy for `key`, or a fresh fork of `base`
    pub fn get_or_fork(&mut self, key: QueryKey, base: &Table) -> &mut WorkingCopy {
        let session = self.id;
        self.copies.entry(key).or_insert_with(|| {
            debug!(%session, query = %key, rows = base.row_count(), "forked working copy");
            WorkingCopy::fork(base)
        })
    }

    /// Replace the stored working copy with a mutated table
    pub fn commit(&mut self, key: QueryKey, table: Table) {
        let copy = self.copies.entry(key).or_insert_with(|| WorkingCopy::fork(&table));
        copy.table = table;
        copy.edits += 1;
    }

    /// Fork if needed, then apply one edit
    pub fn apply_edit(&mut self, key: QueryKey, base: &Table, edit: Edit) -> Result<&WorkingCopy> {
        let copy = self.get_or_fork(key, base);
        copy.apply(edit)?;
        Ok(&*copy)
    }

    pub fn get(&self, key: QueryKey) -> Option<&WorkingCopy> {
        self.copies.get(&key)
    }

    /// Drop the working copy for `key`. Returns whether one existed.
    pub fn discard(&mut self, key: QueryKey) -> bool {
        self.copies.remove(&key).is_some()
    }

    /// Keys with a working copy, sorted
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self.copies.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.copies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }

    /// What this session sees for `key`: its working copy if any, else `base`
    pub fn view<'a>(&'a self, key: QueryKey, base: &'a Table) -> &'a Table {
        self.copies.get(&key).map(WorkingCopy::table).unwrap_or(base)
    }

    /// CSV download of the session's view of `key`
    pub fn export_csv(&self, key: QueryKey, base: &Table) -> Result<Vec<u8>> {
        self.view(key, base).to_csv_bytes()
    }
}

impl Default for SessionEditStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SESSION POOL (multi-session hosts)
// ============================================================================

/// SessionPool - one independent store per session id
#[derive(Debug, Default)]
pub struct SessionPool {
    sessions: HashMap<Uuid, SessionEditStore>,
}

impl SessionPool {
    pub fn new() -> Self {
        SessionPool::default()
    }

    /// Start a new, empty session
    pub fn open(&mut self) -> Uuid {
        let store = SessionEditStore::new();
        let id = store.id();
        self.sessions.insert(id, store);
        info!(session = %id, "session opened");
        id
    }

    /// End a session, discarding its edits
    pub fn close(&mut self, id: Uuid) -> bool {
        let closed = self.sessions.remove(&id).is_some();
        if closed {
            info!(session = %id, "session closed");
        }
        closed
    }

    pub fn get(&self, id: Uuid) -> Result<&SessionEditStore> {
        self.sessions.get(&id).ok_or(DashboardError::UnknownSession(id))
    }

    pub fn get_mut(&mut self, id: Uuid) -> Result<&mut SessionEditStore> {
        self.sessions.get_mut(&id).ok_or(DashboardError::UnknownSession(id))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
