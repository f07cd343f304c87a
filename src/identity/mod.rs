//! Article identity resolution for deduplication
//!
//! Feeds rarely agree on which fields identify an item: some carry stable
//! guids, some only titles, some re-date every entry. Per fetch batch a
//! [`IdentityResolver`] records every article against a fixed candidate set
//! of id schemes (single fields plus merged field pairs), eliminating any
//! scheme that produces an empty value or an in-batch collision. After the
//! batch it yields the best surviving scheme, falling back to the least-bad
//! eliminated one so identity resolution never blocks delivery.
//!
//! The resolver is an owned, short-lived value object: build one per fetch
//! batch, feed it every article, ask for the scheme, drop it. Long-term
//! seen-article state lives behind [`crate::storage::SeenArticleStore`].

use std::collections::{HashMap, HashSet};

/// Single article fields considered as identity schemes, in preference order
pub const ID_FIELDS: [&str; 3] = ["guid", "pubdate", "title"];

/// Separator joining the members of a merged id type name
const MERGED_SEPARATOR: char = ',';

/// Per-batch identity scheme resolver
#[derive(Debug)]
pub struct IdentityResolver {
    /// Candidate schemes still viable, in declaration order
    use_id_types: Vec<String>,

    /// Values seen this batch per candidate scheme
    ids_recorded: HashMap<String, HashSet<String>>,

    /// Eliminated schemes, in elimination order
    failed_type_names: Vec<String>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver {
    /// Create a resolver with the full candidate set
    pub fn new() -> Self {
        let use_id_types = candidate_id_types();
        let ids_recorded = use_id_types
            .iter()
            .map(|name| (name.clone(), HashSet::new()))
            .collect();
        Self {
            use_id_types,
            ids_recorded,
            failed_type_names: Vec::new(),
        }
    }

    /// Record one article against every still-viable candidate scheme.
    ///
    /// A scheme is eliminated when the article yields an empty value for it
    /// (it cannot identify every article) or when the value collides with
    /// one already recorded this batch (it is not unique).
    pub fn record_article(&mut self, article: &crate::models::Article) {
        let mut eliminated = Vec::new();

        for id_type in &self.use_id_types {
            let value = id_type_value(article, id_type);
            if value.is_empty() {
                eliminated.push(id_type.clone());
                continue;
            }

            let seen = self
                .ids_recorded
                .entry(id_type.clone())
                .or_default();
            if !seen.insert(value) {
                eliminated.push(id_type.clone());
            }
        }

        for name in eliminated {
            self.use_id_types.retain(|t| t != &name);
            self.failed_type_names.push(name);
        }
    }

    /// Choose the identity scheme for this batch.
    ///
    /// Surviving single-field candidates win (in [`ID_FIELDS`] order), then
    /// surviving merged candidates, then the most recently eliminated
    /// candidate as a best-effort fallback. This is never an error.
    pub fn id_type(&self) -> String {
        for field in ID_FIELDS {
            if self.use_id_types.iter().any(|t| t == field) {
                return field.to_string();
            }
        }

        if let Some(merged) = self
            .use_id_types
            .iter()
            .find(|t| t.contains(MERGED_SEPARATOR))
        {
            return merged.clone();
        }

        self.failed_type_names
            .last()
            .cloned()
            // Unreachable once any article was recorded; a zero-article
            // batch keeps every candidate alive
            .unwrap_or_else(|| ID_FIELDS[0].to_string())
    }

    /// Candidate schemes still viable
    pub fn surviving(&self) -> &[String] {
        &self.use_id_types
    }

    /// Eliminated schemes in elimination order
    pub fn failed(&self) -> &[String] {
        &self.failed_type_names
    }
}

/// All candidate id type names: singles first, then merged pairs joined in
/// canonical declaration order ("guid,pubdate", "guid,title", ...)
pub fn candidate_id_types() -> Vec<String> {
    let mut candidates: Vec<String> = ID_FIELDS.iter().map(|f| f.to_string()).collect();
    for (i, a) in ID_FIELDS.iter().enumerate() {
        for b in &ID_FIELDS[i + 1..] {
            candidates.push(format!("{a}{MERGED_SEPARATOR}{b}"));
        }
    }
    candidates
}

/// Compute an article's value under an id scheme.
///
/// Merged schemes concatenate their member fields' values. Absent fields
/// contribute nothing; an entirely absent scheme yields the empty string,
/// which callers treat as "no identity".
pub fn id_type_value(article: &crate::models::Article, id_type: &str) -> String {
    id_type
        .split(MERGED_SEPARATOR)
        .map(|field| article.value_or_empty(field))
        .collect()
}
