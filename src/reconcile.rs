//! Remote-backed mutators and fetching.
//!
//! Every mutator that talks to the server follows the same protocol:
//! snapshot the note, apply the change locally, await the server, then either
//! commit the server's record or undo the toggled fields (`isPinned`,
//! `isArchived`) from the snapshot. Typed content is kept on failure so
//! nothing the user wrote is lost. Failures are recorded on the store's
//! `error` notice and never returned to the caller as errors.
//!
//! Each mutator is split into a synchronous `begin_*` (snapshot and optimistic
//! change) and a `finish_*` taking the server's result, so a store behind a
//! lock can be released while the request is in flight. The async methods on
//! [`NoteStore`] chain the two for callers that own the store outright.
use log::{debug, info, warn};

use crate::{
    Note, NoteFields, NotePatch, NoteStore, NotesPage, Pagination, Result, SyncError,
};

/// Issues request tokens per partition so late responses can be recognised.
#[derive(Debug, Default)]
pub struct FetchSequencer {
    latest: [u64; 2],
}

impl FetchSequencer {
    fn slot(archived: bool) -> usize {
        usize::from(archived)
    }

    pub fn issue(&mut self, archived: bool) -> u64 {
        let slot = Self::slot(archived);
        self.latest[slot] += 1;
        self.latest[slot]
    }

    pub fn is_latest(&self, archived: bool, token: u64) -> bool {
        self.latest[Self::slot(archived)] == token
    }
}

/// A fetch that has been started but whose response is not applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub page: u32,
    pub limit: u32,
    pub archived: bool,
    token: u64,
}

/// A create whose optimistic phase has been applied.
#[derive(Debug, Clone)]
pub struct CreateTicket {
    /// Payload to send to the server
    pub fields: NoteFields,
    local_id: Option<String>,
}

/// An update whose optimistic phase has been applied.
#[derive(Debug, Clone)]
pub struct UpdateTicket {
    pub id: String,
    /// Patch to send to the server
    pub patch: NotePatch,
    undo: NotePatch,
    leaves_partition: bool,
}

#[derive(Debug, Clone)]
pub struct DeleteTicket {
    pub id: String,
}

/// Logs a refused `begin_*` and flattens it to "nothing to send".
pub(crate) fn started<T>(begun: Result<Option<T>>) -> Option<Option<T>> {
    match begun {
        Ok(ticket) => Some(ticket),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

impl NoteStore {
    fn not_found(&self, id: &str) -> Option<SyncError> {
        if self.find(id).is_none() && self.current_id() != Some(id) {
            Some(SyncError::NoteNotFound { id: id.to_string() })
        } else {
            None
        }
    }

    /// Applies `fields` to the local draft, if any, and returns the create to
    /// send.
    pub fn begin_create(&mut self, fields: NoteFields, local_id: Option<&str>) -> CreateTicket {
        if let Some(local_id) = local_id {
            self.apply_local(local_id, &NotePatch::from(fields.clone()), true);
        }
        CreateTicket {
            fields,
            local_id: local_id.map(str::to_string),
        }
    }

    /// On success the draft is replaced by the server's note at the front of
    /// the collection and the selection follows it. On failure the draft stays
    /// as it is.
    pub fn finish_create(&mut self, ticket: CreateTicket, result: Result<Note>) -> Option<Note> {
        let created = match result {
            Ok(created) => created,
            Err(e) => {
                self.record_error("Failed to create note", &e);
                return None;
            }
        };

        info!("Created note {} on server", created.id);
        let local_id = ticket.local_id.as_deref();
        let was_current = local_id.is_some_and(|id| self.current_id() == Some(id));
        if let Some(local_id) = local_id {
            if let Some(idx) = self.notes.iter().position(|n| n.id == local_id) {
                self.notes.remove(idx);
            }
            self.drafts.forget(local_id);
        }
        self.upsert_front(created.clone());
        if was_current {
            self.current = Some(created.clone());
            self.selection_epoch += 1;
        }
        self.announce("Note created successfully");
        Some(created)
    }

    /// Applies `patch` locally and returns the update to send.
    ///
    /// Notes the server has never seen are updated locally only and yield
    /// `Ok(None)`. An unknown id is refused with `NoteNotFound`.
    pub fn begin_update(&mut self, id: &str, patch: NotePatch) -> Result<Option<UpdateTicket>> {
        if let Some(missing) = self.not_found(id) {
            return Err(missing);
        }
        if self.drafts.is_local_only(id) {
            debug!("Note {} is not on the server yet, updating locally", id);
            self.update_note(id, patch);
            return Ok(None);
        }

        let snapshot = self
            .find(id)
            .or(self.current.as_ref())
            .cloned()
            .ok_or_else(|| SyncError::NoteNotFound { id: id.to_string() })?;
        let undo = patch.toggle_snapshot(&snapshot);
        let leaves_partition = patch.toggles_archive(&snapshot);

        self.update_note(id, patch.clone());
        Ok(Some(UpdateTicket {
            id: id.to_string(),
            patch,
            undo,
            leaves_partition,
        }))
    }

    /// If the update flipped `isArchived` the note leaves the shown partition
    /// and is dropped. Otherwise the server's record replaces the local one at
    /// the front; a note known only through the selection is refreshed there
    /// without joining the list.
    pub fn finish_update(&mut self, ticket: UpdateTicket, result: Result<Note>) -> Option<Note> {
        let id = ticket.id.as_str();
        match result {
            Ok(updated) => {
                if ticket.leaves_partition {
                    info!(
                        "Note {} moved to the {} partition",
                        id,
                        if updated.is_archived { "archived" } else { "active" }
                    );
                    self.remove_local(id);
                } else if self.find(id).is_some() {
                    debug!("Note {} confirmed by server", id);
                    self.upsert_front(updated.clone());
                } else if self.current_id() == Some(id) {
                    debug!("Note {} confirmed by server outside the loaded pages", id);
                    self.current = Some(updated.clone());
                }
                self.announce("Note updated successfully");
                Some(updated)
            }
            Err(e) => {
                if !ticket.undo.is_empty() {
                    self.update_note_metadata(id, ticket.undo);
                }
                self.record_error("Failed to update note", &e);
                None
            }
        }
    }

    pub fn begin_toggle_pin(&mut self, id: &str) -> Result<Option<UpdateTicket>> {
        let pinned = self.lookup(id)?.is_pinned;
        self.begin_update(id, NotePatch::default().pinned(!pinned))
    }

    pub fn begin_toggle_archive(&mut self, id: &str) -> Result<Option<UpdateTicket>> {
        let archived = self.lookup(id)?.is_archived;
        self.begin_update(id, NotePatch::default().archived(!archived))
    }

    fn lookup(&self, id: &str) -> Result<&Note> {
        self.find(id)
            .ok_or_else(|| SyncError::NoteNotFound { id: id.to_string() })
    }

    /// Drafts are dropped locally and yield `Ok(None)`; confirmed notes stay
    /// in place until the server agrees.
    pub fn begin_delete(&mut self, id: &str) -> Result<Option<DeleteTicket>> {
        if let Some(missing) = self.not_found(id) {
            return Err(missing);
        }
        if self.drafts.is_local_only(id) {
            debug!("Discarding unsaved note {}", id);
            self.remove_local(id);
            return Ok(None);
        }
        Ok(Some(DeleteTicket { id: id.to_string() }))
    }

    pub fn finish_delete(&mut self, ticket: DeleteTicket, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                info!("Deleted note {}", ticket.id);
                self.remove_local(&ticket.id);
                true
            }
            Err(e) => {
                self.record_error("Failed to delete note", &e);
                false
            }
        }
    }

    /// Selects a note freshly loaded from the server.
    pub fn finish_open(&mut self, result: Result<Note>) -> Option<Note> {
        match result {
            Ok(note) => {
                if let Some(existing) = self.notes.iter_mut().find(|n| n.id == note.id) {
                    *existing = note.clone();
                }
                self.select(Some(note.clone()));
                Some(note)
            }
            Err(e) => {
                self.record_error("Failed to load note", &e);
                None
            }
        }
    }

    /// Saves a draft to the server. See [`NoteStore::finish_create`].
    pub async fn create_note_api(
        &mut self,
        fields: NoteFields,
        local_id: Option<&str>,
    ) -> Option<Note> {
        let ticket = self.begin_create(fields, local_id);
        let api = self.api();
        let result = api.create_note(&ticket.fields).await;
        self.finish_create(ticket, result)
    }

    /// Sends a partial update for a confirmed note. Drafts are updated locally
    /// only; unknown ids are ignored.
    pub async fn update_note_api(&mut self, id: &str, patch: NotePatch) -> Option<Note> {
        let ticket = started(self.begin_update(id, patch))??;
        self.send_update(ticket).await
    }

    async fn send_update(&mut self, ticket: UpdateTicket) -> Option<Note> {
        let api = self.api();
        let result = api.update_note(&ticket.id, &ticket.patch).await;
        self.finish_update(ticket, result)
    }

    /// Deletes a note on the server, then locally. Drafts never reach the
    /// server and are simply dropped. Unknown ids are ignored.
    pub async fn delete_note(&mut self, id: &str) -> bool {
        let Some(ticket) = started(self.begin_delete(id)) else {
            return false;
        };
        let Some(ticket) = ticket else {
            return true;
        };
        let api = self.api();
        let result = api.delete_note(&ticket.id).await;
        self.finish_delete(ticket, result)
    }

    /// The editor's save: blank titles become "Untitled Note", drafts are
    /// created and confirmed notes are updated.
    pub async fn save_note(&mut self, id: &str, fields: NoteFields) -> Option<Note> {
        let fields = fields.normalized();
        if self.drafts.is_local_only(id) {
            self.create_note_api(fields, Some(id)).await
        } else {
            self.update_note_api(id, NotePatch::from(fields)).await
        }
    }

    pub async fn toggle_pin(&mut self, id: &str) -> Option<Note> {
        let Some(ticket) = started(self.begin_toggle_pin(id))? else {
            return self.find(id).cloned();
        };
        self.send_update(ticket).await
    }

    pub async fn toggle_archive(&mut self, id: &str) -> Option<Note> {
        let Some(ticket) = started(self.begin_toggle_archive(id))? else {
            return self.find(id).cloned();
        };
        self.send_update(ticket).await
    }

    /// Loads a single note from the server and selects it.
    pub async fn open_note(&mut self, id: &str) -> Option<Note> {
        let api = self.api();
        let result = api.get_note(id).await;
        self.finish_open(result)
    }

    /// Marks a fetch as started and hands back the ticket to apply its
    /// response with. Only the newest ticket per partition is honoured.
    pub fn begin_fetch(&mut self, page: u32, limit: u32, archived: bool) -> FetchTicket {
        if page <= 1 {
            self.loading = true;
        } else {
            self.loading_more = true;
        }
        FetchTicket {
            page,
            limit,
            archived,
            token: self.fetches.issue(archived),
        }
    }

    /// Merges a fetch response into the store.
    ///
    /// Returns false when the response was dropped: superseded by a newer
    /// fetch, or aimed at the partition that is not shown.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, result: Result<NotesPage>) -> bool {
        if !self.fetches.is_latest(ticket.archived, ticket.token) {
            warn!("Dropping stale response for page {}", ticket.page);
            return false;
        }
        if ticket.archived != self.archived {
            warn!(
                "Dropping response for page {} of a partition that is no longer shown",
                ticket.page
            );
            return false;
        }

        self.loading = false;
        self.loading_more = false;

        match result {
            Ok(page) => {
                info!(
                    "Fetched page {}/{} ({} notes)",
                    page.page,
                    page.total_pages,
                    page.notes.len()
                );
                self.pagination = Pagination {
                    page: page.page,
                    limit: page.limit,
                    total: page.total,
                    total_pages: page.total_pages,
                };
                if ticket.page <= 1 {
                    // unsaved drafts are not on the server; keep them on top
                    let mut notes: Vec<Note> = self
                        .notes
                        .drain(..)
                        .filter(|n| self.drafts.is_local_only(&n.id))
                        .collect();
                    notes.extend(page.notes);
                    self.notes = notes;
                } else {
                    for note in page.notes {
                        if !self.notes.iter().any(|n| n.id == note.id) {
                            self.notes.push(note);
                        }
                    }
                }
                self.refresh_current();
                true
            }
            Err(e) => {
                self.record_error("Failed to fetch notes", &e);
                true
            }
        }
    }

    /// Fetches one page of the given partition and applies it.
    pub async fn fetch_page(&mut self, page: u32, limit: u32, archived: bool) -> bool {
        let ticket = self.begin_fetch(page, limit, archived);
        self.run_fetch(ticket).await
    }

    /// Performs the request behind `ticket` and applies the response.
    pub async fn run_fetch(&mut self, ticket: FetchTicket) -> bool {
        let api = self.api();
        let result = api
            .list_notes(ticket.page, ticket.limit, ticket.archived)
            .await;
        self.apply_fetch(ticket, result)
    }

    /// Ticket for the next page, unless one is in flight or none is left.
    pub fn begin_load_more(&mut self) -> Option<FetchTicket> {
        if self.loading_more || !self.pagination.has_more() {
            debug!("Nothing more to load");
            return None;
        }
        let next = self.pagination.page + 1;
        let limit = self.pagination.limit;
        Some(self.begin_fetch(next, limit, self.archived))
    }

    pub async fn load_more(&mut self) -> bool {
        match self.begin_load_more() {
            Some(ticket) => self.run_fetch(ticket).await,
            None => false,
        }
    }

    /// Ticket for the first page of the shown partition.
    pub fn begin_refresh(&mut self) -> FetchTicket {
        let limit = self.config.page_size;
        self.begin_fetch(1, limit, self.archived)
    }

    pub async fn refresh(&mut self) -> bool {
        let ticket = self.begin_refresh();
        self.run_fetch(ticket).await
    }

    /// Switches between active and archived notes without awaiting: clears the
    /// selection, resets pagination and returns the ticket for page one.
    pub fn switch_partition(&mut self, archived: bool) -> FetchTicket {
        info!(
            "Switching to {} notes",
            if archived { "archived" } else { "active" }
        );
        self.select(None);

        if archived && !self.archived {
            let (local, _): (Vec<Note>, Vec<Note>) = self
                .notes
                .drain(..)
                .partition(|n| self.drafts.is_local_only(&n.id));
            self.parked = local;
        } else if !archived && self.archived {
            self.notes = std::mem::take(&mut self.parked);
        } else {
            self.notes.retain(|n| self.drafts.is_local_only(&n.id));
        }

        self.archived = archived;
        self.pagination = Pagination::new(self.config.page_size);
        self.loading_more = false;
        self.begin_fetch(1, self.config.page_size, archived)
    }

    /// Switches partition and loads its first page.
    pub async fn set_archived(&mut self, archived: bool) -> bool {
        let ticket = self.switch_partition(archived);
        self.run_fetch(ticket).await
    }
}
