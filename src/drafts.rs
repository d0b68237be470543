//! Lifecycle of notes that exist only on this client.
//!
//! A note created with [`NoteStore::add_note`] is a draft: it carries a client
//! UUID and sits in the draft marker set until the server confirms it. Empty
//! drafts are swept either when their timer fires or as soon as the selection
//! moves away from them. Sweeps always re-read live store state when they run,
//! so a draft that was saved, edited or deleted in the meantime is left alone.
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use uuid::Uuid;

use crate::{Note, NoteFields, NoteStore};

/// Handle for a scheduled sweep, usable to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SweepToken(u64);

#[derive(Debug, Clone)]
struct ScheduledSweep {
    token: SweepToken,
    note_id: String,
    due_at: DateTime<Utc>,
    selection_epoch: u64,
}

/// A sweep whose deadline has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueSweep {
    pub note_id: String,
    /// Selection epoch of the store when the sweep was scheduled
    pub selection_epoch: u64,
}

/// Book-keeping for draft notes.
///
/// `pending` is the draft marker set. `local_only` holds every id the server
/// has never seen; an id leaves it only when a create succeeds, so such an id
/// is never sent as a server key even after the UI marked the draft edited.
/// Each note has at most one live sweep, found through `timers`.
#[derive(Debug, Default)]
pub struct DraftTracker {
    pending: HashSet<String>,
    local_only: HashSet<String>,
    sweeps: Vec<ScheduledSweep>,
    timers: HashMap<String, SweepToken>,
    next_token: u64,
}

impl DraftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly created local note.
    pub fn track(&mut self, id: &str) {
        self.pending.insert(id.to_string());
        self.local_only.insert(id.to_string());
    }

    /// Member of the draft marker set.
    pub fn is_draft(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    /// Never confirmed by the server.
    pub fn is_local_only(&self, id: &str) -> bool {
        self.local_only.contains(id)
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Drops `id` from the draft marker set and cancels its sweep. Returns
    /// whether it was a member.
    pub fn promote(&mut self, id: &str) -> bool {
        self.cancel_for(id);
        self.pending.remove(id)
    }

    /// Forgets `id` entirely: marker set, local-only set and its sweep.
    pub fn forget(&mut self, id: &str) {
        self.pending.remove(id);
        self.local_only.remove(id);
        self.cancel_for(id);
    }

    /// Schedules the sweep for `note_id`, replacing any earlier one.
    pub fn schedule(
        &mut self,
        note_id: &str,
        due_at: DateTime<Utc>,
        selection_epoch: u64,
    ) -> SweepToken {
        self.cancel_for(note_id);
        self.next_token += 1;
        let token = SweepToken(self.next_token);
        self.timers.insert(note_id.to_string(), token);
        self.sweeps.push(ScheduledSweep {
            token,
            note_id: note_id.to_string(),
            due_at,
            selection_epoch,
        });
        trace!("Scheduled sweep {:?} for {} at {}", token, note_id, due_at);
        token
    }

    pub fn cancel(&mut self, token: SweepToken) -> bool {
        let before = self.sweeps.len();
        self.sweeps.retain(|s| s.token != token);
        self.timers.retain(|_, t| *t != token);
        before != self.sweeps.len()
    }

    /// Cancels the sweep of `note_id`, if one is pending.
    pub fn cancel_for(&mut self, note_id: &str) -> bool {
        match self.timers.remove(note_id) {
            Some(token) => {
                trace!("Cancelled sweep {:?} for {}", token, note_id);
                self.cancel(token)
            }
            None => false,
        }
    }

    /// Removes and returns every sweep due at `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<DueSweep> {
        let (due, later): (Vec<_>, Vec<_>) = self.sweeps.drain(..).partition(|s| s.due_at <= now);
        self.sweeps = later;
        for sweep in &due {
            self.timers.remove(&sweep.note_id);
        }
        due.into_iter()
            .map(|s| DueSweep {
                note_id: s.note_id,
                selection_epoch: s.selection_epoch,
            })
            .collect()
    }
}

impl NoteStore {
    /// Creates a draft note and selects it.
    ///
    /// A completely empty draft that already exists is discarded first. A
    /// draft holding any content is never replaced: it is selected and
    /// returned unchanged instead. Nothing is created while the archived
    /// partition is shown.
    pub fn add_note(&mut self, fields: NoteFields) -> Option<Note> {
        if self.archived {
            debug!("Ignoring new note request while viewing archived notes");
            return None;
        }

        let existing: Vec<(String, bool)> = self
            .notes
            .iter()
            .filter(|n| self.drafts.is_draft(&n.id))
            .map(|n| (n.id.clone(), n.is_completely_empty()))
            .collect();

        for (id, empty) in &existing {
            if *empty {
                debug!("Discarding empty draft {} before creating a new one", id);
                self.remove_local(id);
            }
        }

        if let Some((id, _)) = existing.iter().find(|(_, empty)| !empty) {
            debug!("Reusing draft {} which already has content", id);
            self.set_current_note(Some(id));
            return self.find(id).cloned();
        }

        let now = self.clock.now();
        let note = Note::from_fields(Uuid::new_v4().to_string(), fields, now);
        let id = note.id.clone();

        self.notes.insert(0, note.clone());
        self.drafts.track(&id);
        self.select(Some(note.clone()));
        let due_at = now
            .checked_add_signed(self.config.draft_ttl())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let token = self.drafts.schedule(&id, due_at, self.selection_epoch);

        info!("Created draft note {} (sweep {:?})", id, token);
        Some(note)
    }

    /// The UI judged the draft meaningfully edited: stop treating it as a
    /// sweep candidate. Idempotent.
    pub fn mark_note_as_edited(&mut self, id: &str) {
        if self.drafts.promote(id) {
            debug!("Draft {} marked as edited", id);
        }
    }

    pub fn is_draft(&self, id: &str) -> bool {
        self.drafts.is_draft(id)
    }

    pub fn pending_notes(&self) -> Vec<String> {
        self.drafts.pending_ids().map(str::to_string).collect()
    }

    /// Fires every draft sweep whose deadline has passed on the store's clock.
    ///
    /// A due draft is removed only if it is still a draft and still completely
    /// empty. A selected draft is kept when the selection changed after the
    /// sweep was scheduled, i.e. the user came back to it; an untouched draft
    /// that never lost the selection is removed and the selection cleared.
    /// Returns how many notes were removed.
    pub fn run_due_sweeps(&mut self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        for due in self.drafts.take_due(now) {
            let id = due.note_id;
            let Some(note) = self.find(&id) else {
                trace!("Sweep for {} skipped: note is gone", id);
                continue;
            };
            if !self.drafts.is_draft(&id) || !note.is_completely_empty() {
                trace!("Sweep for {} skipped: no longer an empty draft", id);
                continue;
            }
            if self.current_id() == Some(id.as_str()) && self.selection_epoch != due.selection_epoch
            {
                trace!("Sweep for {} skipped: note was selected again", id);
                continue;
            }

            debug!("Sweeping expired empty draft {}", id);
            self.remove_local(&id);
            removed += 1;
        }

        removed
    }

    /// Selection moved away from `previous`; drop it if it is an empty draft.
    pub(crate) fn sweep_on_deselect(&mut self, previous: &str) {
        if !self.drafts.is_draft(previous) || self.current_id() == Some(previous) {
            return;
        }
        if self.find(previous).is_some_and(Note::has_blank_body) {
            debug!("Dropping empty draft {} after selection moved away", previous);
            self.remove_local(previous);
        }
    }
}
