use crate::models::{file_extension, MediaRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Recent,
    Name,
    Size,
    Downloaded,
}

#[derive(Debug, Clone)]
pub struct ViewQuery {
    pub search: String,
    pub tags: Vec<String>,
    /// Lowercased file extension, or "all" to disable.
    pub file_type: String,
    pub sort: SortKey,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            tags: Vec::new(),
            file_type: "all".to_string(),
            sort: SortKey::Recent,
        }
    }
}

pub fn matches_category(record: &MediaRecord, category: &str) -> bool {
    record.category.eq_ignore_ascii_case(category)
}

fn matches_search(record: &MediaRecord, needle: &str) -> bool {
    record.display_name.to_lowercase().contains(needle)
        || record.description.to_lowercase().contains(needle)
        || record.location.to_lowercase().contains(needle)
        || record
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

fn matches_any_tag(record: &MediaRecord, selected: &[String]) -> bool {
    selected.iter().any(|wanted| {
        let wanted = wanted.to_lowercase();
        record
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&wanted))
    })
}

fn matches_file_type(record: &MediaRecord, file_type: &str) -> bool {
    if file_type == "all" {
        return true;
    }

    file_extension(&record.display_name)
        .map(|ext| ext == file_type.to_lowercase())
        .unwrap_or(false)
}

/// Pure projection of the record list: filter by search text (OR across
/// name, description, tags, location), selected tags (substring match),
/// and file type, then stable-sort. Name order is byte-wise UTF-8 `str`
/// ordering; ties everywhere keep input order. The input is never mutated.
pub fn compute_view(records: &[MediaRecord], query: &ViewQuery) -> Vec<MediaRecord> {
    let needle = query.search.trim().to_lowercase();

    let mut view: Vec<MediaRecord> = records
        .iter()
        .filter(|record| {
            (needle.is_empty() || matches_search(record, &needle))
                && (query.tags.is_empty() || matches_any_tag(record, &query.tags))
                && matches_file_type(record, &query.file_type)
        })
        .cloned()
        .collect();

    match query.sort {
        SortKey::Recent => view.sort_by(|a, b| b.pinned_at.cmp(&a.pinned_at)),
        SortKey::Name => view.sort_by(|a, b| a.display_name.cmp(&b.display_name)),
        SortKey::Size => view.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes)),
        SortKey::Downloaded => view.sort_by(|a, b| b.total_downloads.cmp(&a.total_downloads)),
    }

    view
}
