//! Derived list view over the note collection.
//!
//! `filtered_view` never mutates its input: it filters, optionally sorts, and
//! finally lifts pinned notes above the rest.
use std::cmp::Ordering;

use log::trace;

use crate::{Note, NotesFilter, SortBy, SortOrder};

/// Filters and orders `notes` according to `filter`.
///
/// With the default `updated`/`desc` sort the collection order is kept as is,
/// because the store already keeps recently edited notes at the front. Pinned
/// notes always come first; each partition keeps its relative order.
pub fn filtered_view(notes: &[Note], filter: &NotesFilter) -> Vec<Note> {
    let needle = filter.search.trim().to_lowercase();

    let mut view: Vec<&Note> = notes
        .iter()
        .filter(|note| needle.is_empty() || note.mentions(&needle))
        .filter(|note| filter.category.matches(note.category))
        .filter(|note| filter.tags.iter().all(|tag| note.tags.contains(tag)))
        .collect();

    trace!(
        "Filter kept {} of {} notes (search={:?})",
        view.len(),
        notes.len(),
        filter.search
    );

    if !filter.uses_default_sort() {
        // sort_by is stable, so ties keep collection order
        view.sort_by(|a, b| {
            let ord = compare_by(a, b, filter.sort_by);
            match filter.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }

    view.sort_by_key(|note| !note.is_pinned);

    view.into_iter().cloned().collect()
}

fn compare_by(a: &Note, b: &Note, key: SortBy) -> Ordering {
    match key {
        SortBy::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortBy::Created => a.created_at.cmp(&b.created_at),
        SortBy::Updated => a.updated_at.cmp(&b.updated_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, CategoryFilter, NoteFields};
    use chrono::{Duration, TimeZone, Utc};

    fn note(id: &str, title: &str, minutes: i64, pinned: bool) -> Note {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut note = Note::from_fields(
            id.to_string(),
            NoteFields {
                title: title.to_string(),
                is_pinned: pinned,
                ..NoteFields::default()
            },
            base + Duration::minutes(minutes),
        );
        note.updated_at = base + Duration::minutes(minutes);
        note
    }

    fn ids(notes: &[Note]) -> Vec<&str> {
        notes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn pinned_note_beats_alphabetical_order() {
        let notes = vec![note("a", "Zeta", 1, false), note("b", "Alpha", 2, true)];
        let filter = NotesFilter {
            sort_by: SortBy::Title,
            sort_order: SortOrder::Asc,
            ..NotesFilter::default()
        };
        assert_eq!(ids(&filtered_view(&notes, &filter)), vec!["b", "a"]);
    }

    #[test]
    fn default_sort_keeps_collection_order() {
        // c is oldest by timestamp but sits first in the collection
        let notes = vec![
            note("c", "C", 0, false),
            note("a", "A", 10, false),
            note("b", "B", 5, false),
        ];
        let view = filtered_view(&notes, &NotesFilter::default());
        assert_eq!(ids(&view), vec!["c", "a", "b"]);
    }

    #[test]
    fn explicit_sorts_with_stable_ties() {
        let notes = vec![
            note("x", "beta", 3, false),
            note("y", "Alpha", 3, false),
            note("z", "alpha", 1, false),
        ];

        let by_title = NotesFilter {
            sort_by: SortBy::Title,
            sort_order: SortOrder::Asc,
            ..NotesFilter::default()
        };
        assert_eq!(ids(&filtered_view(&notes, &by_title)), vec!["y", "z", "x"]);

        let oldest_first = NotesFilter {
            sort_by: SortBy::Updated,
            sort_order: SortOrder::Asc,
            ..NotesFilter::default()
        };
        assert_eq!(
            ids(&filtered_view(&notes, &oldest_first)),
            vec!["z", "x", "y"]
        );

        let newest_created = NotesFilter {
            sort_by: SortBy::Created,
            sort_order: SortOrder::Desc,
            ..NotesFilter::default()
        };
        assert_eq!(
            ids(&filtered_view(&notes, &newest_created)),
            vec!["x", "y", "z"]
        );
    }

    #[test]
    fn search_category_and_tags_combine() {
        let mut work = note("w", "Quarterly plan", 1, false);
        work.category = Category::Work;
        work.tags = vec!["q3".to_string(), "planning".to_string()];
        let mut idea = note("i", "Garden", 2, false);
        idea.category = Category::Ideas;
        idea.content = "Plant TOMATOES".to_string();
        let notes = vec![work, idea];

        let by_content = NotesFilter {
            search: "tomato".to_string(),
            ..NotesFilter::default()
        };
        assert_eq!(ids(&filtered_view(&notes, &by_content)), vec!["i"]);

        let by_tag_text = NotesFilter {
            search: "PLANNING".to_string(),
            ..NotesFilter::default()
        };
        assert_eq!(ids(&filtered_view(&notes, &by_tag_text)), vec!["w"]);

        let by_category = NotesFilter {
            category: CategoryFilter::Only(Category::Ideas),
            ..NotesFilter::default()
        };
        assert_eq!(ids(&filtered_view(&notes, &by_category)), vec!["i"]);

        let needs_both_tags = NotesFilter {
            tags: vec!["q3".to_string(), "missing".to_string()],
            ..NotesFilter::default()
        };
        assert!(filtered_view(&notes, &needs_both_tags).is_empty());
    }

    #[test]
    fn empty_criteria_match_everything_and_input_is_untouched() {
        let notes = vec![
            note("a", "A", 1, false),
            note("b", "B", 2, true),
            note("c", "C", 3, false),
        ];
        let before = notes.clone();
        let filter = NotesFilter::default();

        let first = filtered_view(&notes, &filter);
        let second = filtered_view(&notes, &filter);

        assert_eq!(first, second);
        assert_eq!(notes, before);
        assert_eq!(ids(&first), vec!["b", "a", "c"]);
        let first_unpinned = first.iter().position(|n| !n.is_pinned).unwrap();
        assert!(first[first_unpinned..].iter().all(|n| !n.is_pinned));
    }
}
