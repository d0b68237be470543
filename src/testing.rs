//! In-memory notes server and fixtures shared by the unit tests.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::{
    ManualClock, Note, NoteFields, NotePatch, NoteStore, NotesApi, NotesPage, Result,
    StoreConfig, SyncError,
};

#[derive(Default)]
struct FakeState {
    notes: Vec<Note>,
    fail_next: Option<String>,
    created: Vec<String>,
    updated: Vec<String>,
    deleted: Vec<String>,
    next_id: u64,
}

#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn seed(&self, notes: Vec<Note>) {
        self.state.lock().unwrap().notes = notes;
    }

    /// Makes the next call fail with a 503 carrying `message`.
    pub fn fail_next(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    pub fn edit_remote(&self, id: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(note) = state.notes.iter_mut().find(|n| n.id == id) {
            note.content = content.to_string();
        }
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn updated_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().updated.clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn check(state: &mut FakeState) -> Result<()> {
        match state.fail_next.take() {
            Some(message) => Err(SyncError::Api {
                status: 503,
                message,
            }),
            None => Ok(()),
        }
    }
}

fn not_found() -> SyncError {
    SyncError::Api {
        status: 404,
        message: "Note not found".to_string(),
    }
}

#[async_trait]
impl NotesApi for FakeApi {
    async fn list_notes(&self, page: u32, limit: u32, archived: bool) -> Result<NotesPage> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state)?;

        let matching: Vec<Note> = state
            .notes
            .iter()
            .filter(|n| n.is_archived == archived)
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let total_pages = (total as u32).div_ceil(limit);
        let notes = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(NotesPage {
            notes,
            total,
            page,
            limit,
            total_pages,
        })
    }

    async fn get_note(&self, id: &str) -> Result<Note> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state)?;
        state
            .notes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn create_note(&self, fields: &NoteFields) -> Result<Note> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state)?;
        state.next_id += 1;
        let note = Note::from_fields(
            format!("srv-{}", state.next_id),
            fields.clone(),
            Utc::now(),
        );
        state.created.push(fields.title.clone());
        state.notes.insert(0, note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: &str, patch: &NotePatch) -> Result<Note> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state)?;
        state.updated.push(id.to_string());
        let note = state
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(not_found)?;
        patch.apply_to(note);
        note.updated_at = Utc::now();
        Ok(note.clone())
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::check(&mut state)?;
        let idx = state
            .notes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(not_found)?;
        state.notes.remove(idx);
        state.deleted.push(id.to_string());
        Ok(())
    }
}

/// A confirmed note with fixed timestamps.
pub(crate) fn server_note(id: &str, title: &str, content: &str) -> Note {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Note::from_fields(
        id.to_string(),
        NoteFields {
            title: title.to_string(),
            content: content.to_string(),
            ..NoteFields::default()
        },
        at,
    )
}

pub(crate) fn page(notes: Vec<Note>, page: u32, total_pages: u32) -> NotesPage {
    NotesPage {
        total: notes.len() as u64,
        notes,
        page,
        limit: 10,
        total_pages,
    }
}

pub(crate) fn store_with_api(api: Arc<dyn NotesApi>) -> (NoteStore, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap());
    let store = NoteStore::with_clock(StoreConfig::default(), api, Arc::new(clock.clone()));
    (store, clock)
}

pub(crate) fn store_with_clock() -> (NoteStore, Arc<FakeApi>, ManualClock) {
    let api = Arc::new(FakeApi::default());
    let (store, clock) = store_with_api(api.clone());
    (store, api, clock)
}

/// A [`FakeApi`] whose creates wait for `release` after signalling `entered`.
pub(crate) struct GatedApi {
    pub inner: FakeApi,
    pub entered: Notify,
    pub release: Notify,
    gate_creates: bool,
}

impl GatedApi {
    pub fn gated() -> Self {
        Self {
            inner: FakeApi::default(),
            entered: Notify::new(),
            release: Notify::new(),
            gate_creates: true,
        }
    }

    pub fn open() -> Self {
        Self {
            gate_creates: false,
            ..Self::gated()
        }
    }
}

#[async_trait]
impl NotesApi for GatedApi {
    async fn list_notes(&self, page: u32, limit: u32, archived: bool) -> Result<NotesPage> {
        self.inner.list_notes(page, limit, archived).await
    }

    async fn get_note(&self, id: &str) -> Result<Note> {
        self.inner.get_note(id).await
    }

    async fn create_note(&self, fields: &NoteFields) -> Result<Note> {
        if self.gate_creates {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.create_note(fields).await
    }

    async fn update_note(&self, id: &str, patch: &NotePatch) -> Result<Note> {
        self.inner.update_note(id, patch).await
    }

    async fn delete_note(&self, id: &str) -> Result<()> {
        self.inner.delete_note(id).await
    }
}
