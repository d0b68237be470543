// src/shared.rs - Store handle shared between UI tasks and the sweeper
use std::sync::Arc;

use log::trace;
use tokio::sync::{Mutex, MutexGuard};

use crate::reconcile::started;
use crate::{Note, NoteFields, NotePatch, NoteStore};

/// A [`NoteStore`] behind a tokio mutex.
///
/// The remote mutators here hold the lock only for their optimistic and
/// commit phases, never across the request, so the sweeper and readers keep
/// running while the server is slow.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<NoteStore>>,
}

impl SharedStore {
    pub fn new(store: NoteStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// The underlying mutex, e.g. for [`crate::Sweeper::start`].
    pub fn handle(&self) -> &Arc<Mutex<NoteStore>> {
        &self.inner
    }

    pub async fn lock(&self) -> MutexGuard<'_, NoteStore> {
        self.inner.lock().await
    }

    pub async fn create_note_api(&self, fields: NoteFields, local_id: Option<&str>) -> Option<Note> {
        let (api, ticket) = {
            let mut store = self.lock().await;
            (store.api(), store.begin_create(fields, local_id))
        };
        trace!("Create request in flight");
        let result = api.create_note(&ticket.fields).await;
        self.lock().await.finish_create(ticket, result)
    }

    pub async fn update_note_api(&self, id: &str, patch: NotePatch) -> Option<Note> {
        let (api, ticket) = {
            let mut store = self.lock().await;
            (store.api(), started(store.begin_update(id, patch))??)
        };
        let result = api.update_note(&ticket.id, &ticket.patch).await;
        self.lock().await.finish_update(ticket, result)
    }

    pub async fn save_note(&self, id: &str, fields: NoteFields) -> Option<Note> {
        let fields = fields.normalized();
        let local = self.lock().await.is_local_only(id);
        if local {
            self.create_note_api(fields, Some(id)).await
        } else {
            self.update_note_api(id, NotePatch::from(fields)).await
        }
    }

    pub async fn toggle_pin(&self, id: &str) -> Option<Note> {
        let (api, ticket) = {
            let mut store = self.lock().await;
            let Some(ticket) = started(store.begin_toggle_pin(id))? else {
                return store.find(id).cloned();
            };
            (store.api(), ticket)
        };
        let result = api.update_note(&ticket.id, &ticket.patch).await;
        self.lock().await.finish_update(ticket, result)
    }

    pub async fn toggle_archive(&self, id: &str) -> Option<Note> {
        let (api, ticket) = {
            let mut store = self.lock().await;
            let Some(ticket) = started(store.begin_toggle_archive(id))? else {
                return store.find(id).cloned();
            };
            (store.api(), ticket)
        };
        let result = api.update_note(&ticket.id, &ticket.patch).await;
        self.lock().await.finish_update(ticket, result)
    }

    pub async fn delete_note(&self, id: &str) -> bool {
        let (api, ticket) = {
            let mut store = self.lock().await;
            match started(store.begin_delete(id)) {
                Some(Some(ticket)) => (store.api(), ticket),
                Some(None) => return true,
                None => return false,
            }
        };
        let result = api.delete_note(&ticket.id).await;
        self.lock().await.finish_delete(ticket, result)
    }

    pub async fn open_note(&self, id: &str) -> Option<Note> {
        let api = self.lock().await.api();
        let result = api.get_note(id).await;
        self.lock().await.finish_open(result)
    }

    pub async fn refresh(&self) -> bool {
        let (api, ticket) = {
            let mut store = self.lock().await;
            (store.api(), store.begin_refresh())
        };
        let result = api
            .list_notes(ticket.page, ticket.limit, ticket.archived)
            .await;
        self.lock().await.apply_fetch(ticket, result)
    }

    pub async fn load_more(&self) -> bool {
        let (api, ticket) = {
            let mut store = self.lock().await;
            match store.begin_load_more() {
                Some(ticket) => (store.api(), ticket),
                None => return false,
            }
        };
        let result = api
            .list_notes(ticket.page, ticket.limit, ticket.archived)
            .await;
        self.lock().await.apply_fetch(ticket, result)
    }

    pub async fn set_archived(&self, archived: bool) -> bool {
        let (api, ticket) = {
            let mut store = self.lock().await;
            (store.api(), store.switch_partition(archived))
        };
        let result = api
            .list_notes(ticket.page, ticket.limit, ticket.archived)
            .await;
        self.lock().await.apply_fetch(ticket, result)
    }
}
