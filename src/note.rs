//! Core note data structures.
//!
//! `Note` is the wire and in-memory record, `NoteFields` is what a create call
//! carries, and `NotePatch` is the validated partial update merged onto a note.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, SyncError};

/// Title substituted for an empty one at save time.
pub const UNTITLED: &str = "Untitled Note";

/// Color given to freshly created notes.
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Fixed set of note categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    General,
    Work,
    Personal,
    Ideas,
    Learning,
    Projects,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::General,
        Category::Work,
        Category::Personal,
        Category::Ideas,
        Category::Learning,
        Category::Projects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::General => "general",
            Category::Work => "work",
            Category::Personal => "personal",
            Category::Ideas => "ideas",
            Category::Learning => "learning",
            Category::Projects => "projects",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| SyncError::InvalidCategory {
                value: s.to_string(),
            })
    }
}

/// Represents a single note, either server-confirmed or a local draft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Client UUID while a draft, server id once confirmed
    pub id: String,
    /// Note title
    pub title: String,
    /// Note content in Markdown format
    pub content: String,
    /// Tags in display order, no duplicates
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub category: Category,
    /// Display color token
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last semantic edit (title or content)
    pub updated_at: DateTime<Utc>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Note {
    /// Builds a local note from user fields. The id is supplied by the caller
    /// so drafts can use a client-generated UUID.
    pub fn from_fields(id: String, fields: NoteFields, now: DateTime<Utc>) -> Self {
        Note {
            id,
            title: fields.title,
            content: fields.content,
            tags: normalize_tags(fields.tags),
            category: fields.category,
            color: fields.color,
            is_pinned: fields.is_pinned,
            is_archived: fields.is_archived,
            created_at: now,
            updated_at: now,
        }
    }

    /// Title, content and tags all empty. The seed title counts as empty.
    pub fn is_completely_empty(&self) -> bool {
        title_is_blank(&self.title) && self.has_blank_body()
    }

    /// Content and tags empty; the title is not considered.
    pub fn has_blank_body(&self) -> bool {
        self.content.trim().is_empty() && self.tags.is_empty()
    }

    /// Case-insensitive containment over title, content and tags.
    /// `needle` must already be lowercase.
    pub fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.content.to_lowercase().contains(needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

fn title_is_blank(title: &str) -> bool {
    let title = title.trim();
    title.is_empty() || title == UNTITLED
}

/// Fields a client supplies when creating a note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteFields {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub category: Category,
    pub color: String,
    pub is_pinned: bool,
    pub is_archived: bool,
}

impl Default for NoteFields {
    fn default() -> Self {
        NoteFields {
            title: String::new(),
            content: String::new(),
            tags: Vec::new(),
            category: Category::General,
            color: default_color(),
            is_pinned: false,
            is_archived: false,
        }
    }
}

impl NoteFields {
    /// Normalizes input the way a save does: blank title becomes
    /// [`UNTITLED`], tags are trimmed and deduplicated.
    pub fn normalized(mut self) -> Self {
        if self.title.trim().is_empty() {
            self.title = UNTITLED.to_string();
        }
        self.tags = normalize_tags(self.tags);
        self
    }
}

/// Trims tags and drops blanks and duplicates, keeping first-seen order.
pub fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// A validated partial update for a note. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_archived: Option<bool>,
}

const READ_ONLY_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

impl NotePatch {
    /// Validates a loosely-typed JSON object against the Note schema.
    ///
    /// Unknown keys and read-only keys are rejected rather than merged.
    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(SyncError::InvalidField {
                field: "patch".to_string(),
                message: "expected a JSON object".to_string(),
            });
        };

        let mut patch = NotePatch::default();
        for (key, value) in map {
            match key.as_str() {
                "title" => patch.title = Some(string_field(&key, value)?),
                "content" => patch.content = Some(string_field(&key, value)?),
                "color" => patch.color = Some(string_field(&key, value)?),
                "category" => patch.category = Some(string_field(&key, value)?.parse()?),
                "tags" => {
                    let tags: Vec<String> =
                        serde_json::from_value(value).map_err(|e| SyncError::InvalidField {
                            field: key.clone(),
                            message: e.to_string(),
                        })?;
                    patch.tags = Some(tags);
                }
                "isPinned" => patch.is_pinned = Some(bool_field(&key, value)?),
                "isArchived" => patch.is_archived = Some(bool_field(&key, value)?),
                k if READ_ONLY_FIELDS.contains(&k) => {
                    return Err(SyncError::InvalidField {
                        field: key,
                        message: "field is read-only".to_string(),
                    })
                }
                _ => return Err(SyncError::UnknownField { field: key }),
            }
        }
        Ok(patch)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.is_pinned = Some(pinned);
        self
    }

    pub fn archived(mut self, archived: bool) -> Self {
        self.is_archived = Some(archived);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == NotePatch::default()
    }

    /// True when applying this patch would change the note's title or content
    /// value. Reassigning the same text does not count.
    pub fn changes_text(&self, note: &Note) -> bool {
        self.title.as_ref().is_some_and(|t| *t != note.title)
            || self.content.as_ref().is_some_and(|c| *c != note.content)
    }

    /// True when the patch flips the note's archived flag.
    pub fn toggles_archive(&self, note: &Note) -> bool {
        self.is_archived.is_some_and(|a| a != note.is_archived)
    }

    /// The toggle fields this patch sets, holding the note's current values.
    /// Applying the result undoes the toggles and nothing else.
    pub fn toggle_snapshot(&self, note: &Note) -> NotePatch {
        NotePatch {
            is_pinned: self.is_pinned.map(|_| note.is_pinned),
            is_archived: self.is_archived.map(|_| note.is_archived),
            ..NotePatch::default()
        }
    }

    /// Merges the set fields onto `note`. Timestamps are left to the caller.
    pub fn apply_to(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = normalize_tags(tags.iter().cloned());
        }
        if let Some(category) = self.category {
            note.category = category;
        }
        if let Some(color) = &self.color {
            note.color = color.clone();
        }
        if let Some(pinned) = self.is_pinned {
            note.is_pinned = pinned;
        }
        if let Some(archived) = self.is_archived {
            note.is_archived = archived;
        }
    }
}

impl From<NoteFields> for NotePatch {
    fn from(fields: NoteFields) -> Self {
        NotePatch {
            title: Some(fields.title),
            content: Some(fields.content),
            tags: Some(fields.tags),
            category: Some(fields.category),
            color: Some(fields.color),
            is_pinned: Some(fields.is_pinned),
            is_archived: Some(fields.is_archived),
        }
    }
}

fn string_field(key: &str, value: Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(SyncError::InvalidField {
            field: key.to_string(),
            message: format!("expected a string, found {}", other),
        }),
    }
}

fn bool_field(key: &str, value: Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(SyncError::InvalidField {
            field: key.to_string(),
            message: format!("expected a boolean, found {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Note {
        let now = Utc::now();
        Note::from_fields(
            "n1".to_string(),
            NoteFields {
                title: "Groceries".to_string(),
                content: "eggs".to_string(),
                tags: vec!["home".to_string()],
                ..NoteFields::default()
            },
            now,
        )
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = NotePatch::from_json(json!({ "title": "x", "colour": "red" })).unwrap_err();
        assert!(matches!(err, SyncError::UnknownField { field } if field == "colour"));
    }

    #[test]
    fn patch_rejects_read_only_fields() {
        let err = NotePatch::from_json(json!({ "id": "other" })).unwrap_err();
        assert!(matches!(err, SyncError::InvalidField { field, .. } if field == "id"));
    }

    #[test]
    fn patch_validates_category_and_types() {
        let patch = NotePatch::from_json(json!({ "category": "Work", "isPinned": true })).unwrap();
        assert_eq!(patch.category, Some(Category::Work));
        assert_eq!(patch.is_pinned, Some(true));

        assert!(matches!(
            NotePatch::from_json(json!({ "category": "hobbies" })),
            Err(SyncError::InvalidCategory { .. })
        ));
        assert!(matches!(
            NotePatch::from_json(json!({ "isArchived": "yes" })),
            Err(SyncError::InvalidField { .. })
        ));
    }

    #[test]
    fn same_value_reassignment_is_not_a_text_change() {
        let note = sample();
        assert!(!NotePatch::default().title("Groceries").changes_text(&note));
        assert!(!NotePatch::default().color("#000").changes_text(&note));
        assert!(NotePatch::default().content("milk").changes_text(&note));
    }

    #[test]
    fn tags_are_deduplicated_in_order() {
        let tags = normalize_tags(vec![
            " b ".to_string(),
            "a".to_string(),
            "b".to_string(),
            "".to_string(),
        ]);
        assert_eq!(tags, vec!["b", "a"]);
    }

    #[test]
    fn emptiness_rules() {
        let mut note = sample();
        assert!(!note.is_completely_empty());

        note.content.clear();
        note.tags.clear();
        assert!(note.has_blank_body());
        assert!(!note.is_completely_empty());

        note.title = UNTITLED.to_string();
        assert!(note.is_completely_empty());
    }

    #[test]
    fn toggle_snapshot_only_covers_toggled_fields() {
        let note = sample();
        let patch = NotePatch::default().pinned(true).content("changed");
        let undo = patch.toggle_snapshot(&note);
        assert_eq!(undo, NotePatch::default().pinned(false));
    }

    #[test]
    fn note_wire_format_is_camel_case() {
        let raw = json!({
            "id": "srv-1",
            "title": "t",
            "content": "c",
            "tags": ["x"],
            "category": "ideas",
            "color": "#fff",
            "isPinned": true,
            "isArchived": false,
            "createdAt": "2024-05-01T10:00:00.000Z",
            "updatedAt": "2024-05-02T10:00:00Z"
        });
        let note: Note = serde_json::from_value(raw).unwrap();
        assert!(note.is_pinned);
        assert_eq!(note.category, Category::Ideas);
        assert!(note.updated_at > note.created_at);
    }
}
