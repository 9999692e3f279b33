use serde::Serialize;

/// Aggregated counts over the question palette, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub marked: usize,
    pub visited: usize,
    pub not_visited: usize,
}
