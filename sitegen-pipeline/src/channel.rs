//! Preview channel identifiers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Longest slug kept from the project name, before the date suffix.
pub const MAX_SLUG_LEN: usize = 40;

/// Slug used when the project name has no usable characters.
pub const FALLBACK_SLUG: &str = "site";

/// Hosting preview channel, e.g. `acme-corp-20240501`.
///
/// Doubles as the deploy target key and, together with the hosting project,
/// the namespace of the preview URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Derive a channel from a project name and a (UTC) date.
    ///
    /// Same name and same day always give the same channel, so re-deploying
    /// within a day replaces the previous preview instead of piling up new ones.
    pub fn derive(project_name: &str, date: NaiveDate) -> Self {
        let slug = slugify(project_name);
        let slug = if slug.is_empty() { FALLBACK_SLUG } else { &slug };
        Self(format!("{slug}-{}", date.format("%Y%m%d")))
    }

    /// Use a caller-supplied channel as-is. The hosting CLI enforces its own
    /// naming rules.
    pub fn explicit(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, collapse each run of non `[a-z0-9]` chars into one `-`, trim
/// hyphens from both ends, then cut to [`MAX_SLUG_LEN`].
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_gap = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if in_gap && !slug.is_empty() {
                slug.push('-');
            }
            in_gap = false;
            slug.push(c);
        } else {
            in_gap = true;
        }
    }
    // Trim happens before the cut, so a hyphen can still end the slug.
    slug.truncate(MAX_SLUG_LEN);
    slug
}
