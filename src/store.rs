use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use crate::{
    filtered_view, Category, Clock, DraftTracker, FetchSequencer, Note, NotePatch, NotesApi,
    NotesFilter, Notice, Pagination, StoreConfig, SyncError, SystemClock,
};

/// Owns the note collection and everything derived from it.
///
/// All mutation goes through `&mut self`; the UI reads through the accessors
/// and pushes edits back through the mutators. Remote-backed mutators live in
/// `reconcile.rs`, draft handling in `drafts.rs`.
pub struct NoteStore {
    pub(crate) config: StoreConfig,
    pub(crate) api: Arc<dyn NotesApi>,
    pub(crate) clock: Arc<dyn Clock>,

    /// Canonical collection, most recently touched first
    pub(crate) notes: Vec<Note>,

    /// Mirror of the selected note
    pub(crate) current: Option<Note>,

    /// Bumped on every selection change
    pub(crate) selection_epoch: u64,

    pub(crate) filter: NotesFilter,
    pub(crate) drafts: DraftTracker,
    pub(crate) pagination: Pagination,

    /// Which partition is shown: archived or active notes
    pub(crate) archived: bool,

    /// Unsaved local notes held back while the archived partition is shown
    pub(crate) parked: Vec<Note>,

    pub(crate) fetches: FetchSequencer,
    pub(crate) loading: bool,
    pub(crate) loading_more: bool,
    pub(crate) error: Option<Notice>,
    pub(crate) save_message: Option<Notice>,
}

impl NoteStore {
    /// Creates an empty store on the wall clock.
    pub fn new(config: StoreConfig, api: Arc<dyn NotesApi>) -> Self {
        Self::with_clock(config, api, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, api: Arc<dyn NotesApi>, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Initializing note store (page_size={}, draft_ttl={}s)",
            config.page_size, config.draft_ttl_secs
        );
        let pagination = Pagination::new(config.page_size);

        Self {
            config,
            api,
            clock,
            notes: Vec::new(),
            current: None,
            selection_epoch: 0,
            filter: NotesFilter::default(),
            drafts: DraftTracker::new(),
            pagination,
            archived: false,
            parked: Vec::new(),
            fetches: FetchSequencer::default(),
            loading: false,
            loading_more: false,
            error: None,
            save_message: None,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn current_note(&self) -> Option<&Note> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.id.as_str())
    }

    pub fn filter(&self) -> &NotesFilter {
        &self.filter
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.loading_more
    }

    pub fn error(&self) -> Option<&Notice> {
        self.error.as_ref()
    }

    pub fn save_message(&self) -> Option<&Notice> {
        self.save_message.as_ref()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Shared handle to the API client, for callers that await requests
    /// without holding the store.
    pub fn api(&self) -> Arc<dyn NotesApi> {
        Arc::clone(&self.api)
    }

    /// True for ids the server has never confirmed.
    pub fn is_local_only(&self, id: &str) -> bool {
        self.drafts.is_local_only(id)
    }

    pub fn find(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    /// Replaces the whole collection, e.g. to seed it.
    pub fn set_notes(&mut self, notes: Vec<Note>) {
        debug!("Replacing collection with {} notes", notes.len());
        self.notes = notes;
        self.refresh_current();
    }

    pub fn set_filter(&mut self, filter: NotesFilter) {
        self.filter = filter;
    }

    /// Changes part of the filter in place.
    pub fn update_filter<F>(&mut self, change: F)
    where
        F: FnOnce(&mut NotesFilter),
    {
        change(&mut self.filter);
    }

    /// The collection as the list view shows it.
    pub fn get_filtered_notes(&self) -> Vec<Note> {
        filtered_view(&self.notes, &self.filter)
    }

    /// `"all"` followed by each category present, in first-seen order.
    pub fn available_categories(&self) -> Vec<String> {
        let mut seen: Vec<Category> = Vec::new();
        for note in &self.notes {
            if !seen.contains(&note.category) {
                seen.push(note.category);
            }
        }
        std::iter::once("all".to_string())
            .chain(seen.into_iter().map(|c| c.to_string()))
            .collect()
    }

    /// Selects the note with `id`, or clears the selection with `None`.
    ///
    /// An id that is not in the collection leaves the selection untouched and
    /// returns false.
    pub fn set_current_note<S: AsRef<str>>(&mut self, id: Option<S>) -> bool {
        let next = match id {
            Some(id) => match self.find(id.as_ref()) {
                Some(note) => Some(note.clone()),
                None => {
                    warn!("Cannot select unknown note {}", id.as_ref());
                    return false;
                }
            },
            None => None,
        };
        self.select(next);
        true
    }

    /// Swaps the selection mirror and runs the deselect sweep for the note
    /// that lost the selection.
    pub(crate) fn select(&mut self, next: Option<Note>) {
        let previous = self.current.as_ref().map(|n| n.id.clone());
        let next_id = next.as_ref().map(|n| n.id.clone());
        self.current = next;

        if previous != next_id {
            self.selection_epoch += 1;
            trace!("Selection {:?} -> {:?}", previous, next_id);
            if let Some(previous) = previous {
                self.sweep_on_deselect(&previous);
            }
        }
    }

    /// Applies a local edit.
    ///
    /// When the title or content value actually changes, `updated_at` is
    /// refreshed and the note moves to the front. Any other change is made in
    /// place. Returns false if the note is unknown.
    pub fn update_note(&mut self, id: &str, patch: NotePatch) -> bool {
        self.apply_local(id, &patch, true)
    }

    /// Applies a local edit without touching order or `updated_at`.
    pub fn update_note_metadata(&mut self, id: &str, patch: NotePatch) -> bool {
        self.apply_local(id, &patch, false)
    }

    pub(crate) fn apply_local(&mut self, id: &str, patch: &NotePatch, allow_reorder: bool) -> bool {
        let now = self.clock.now();
        let mut touched = false;

        if let Some(idx) = self.position(id) {
            let bump = allow_reorder && patch.changes_text(&self.notes[idx]);
            if bump {
                let mut note = self.notes.remove(idx);
                patch.apply_to(&mut note);
                note.updated_at = now;
                self.notes.insert(0, note);
                trace!("Note {} edited, moved to front", id);
            } else {
                patch.apply_to(&mut self.notes[idx]);
                trace!("Note {} updated in place", id);
            }
            touched = true;
        }

        if let Some(current) = self.current.as_mut().filter(|c| c.id == id) {
            let bump = allow_reorder && patch.changes_text(current);
            patch.apply_to(current);
            if bump {
                current.updated_at = now;
            }
            touched = true;
        }

        if !touched {
            debug!("Ignoring update for unknown note {}", id);
        }
        touched
    }

    /// Drops a note from local state only: collection, drafts and selection.
    pub(crate) fn remove_local(&mut self, id: &str) -> Option<Note> {
        let removed = self.position(id).map(|idx| self.notes.remove(idx));
        self.drafts.forget(id);
        if self.current_id() == Some(id) {
            self.current = None;
            self.selection_epoch += 1;
        }
        removed
    }

    /// Puts `note` at the front, replacing any entry with the same id, and
    /// refreshes the selection mirror if it points at that id.
    pub(crate) fn upsert_front(&mut self, note: Note) {
        if let Some(idx) = self.position(&note.id) {
            self.notes.remove(idx);
        }
        if self.current_id() == Some(note.id.as_str()) {
            self.current = Some(note.clone());
        }
        self.notes.insert(0, note);
    }

    /// Re-reads the selection mirror from the collection when present.
    pub(crate) fn refresh_current(&mut self) {
        let fresh = self
            .current
            .as_ref()
            .and_then(|c| self.notes.iter().find(|n| n.id == c.id))
            .cloned();
        if let Some(fresh) = fresh {
            self.current = Some(fresh);
        }
    }

    pub(crate) fn record_error(&mut self, context: &str, err: &SyncError) {
        if err.is_remote() {
            error!("{}: {}", context, err);
        } else {
            warn!("{}: {}", context, err);
        }
        self.error = Some(Notice::new(err.to_string(), self.clock.now()));
    }

    pub(crate) fn announce(&mut self, message: &str) {
        info!("{}", message);
        self.save_message = Some(Notice::new(message, self.clock.now()));
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Clears error and save notices older than the configured lifetime.
    pub fn expire_notices(&mut self) {
        let now = self.clock.now();
        let ttl = self.config.notice_ttl();
        if self.error.as_ref().is_some_and(|n| now - n.raised_at >= ttl) {
            trace!("Error notice expired");
            self.error = None;
        }
        if self.save_message.as_ref().is_some_and(|n| now - n.raised_at >= ttl) {
            trace!("Save notice expired");
            self.save_message = None;
        }
    }
}
