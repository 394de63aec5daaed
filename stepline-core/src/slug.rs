//! Slug helpers
//!
//! Component paths and pipeline container names are slugs: lowercase ASCII
//! alphanumerics separated by single dashes.

use uuid::Uuid;

/// Prefix shared by every pipeline storage container
pub const PIPELINE_PREFIX: &str = "pipeline-";

/// Converts arbitrary text into a slug
///
/// Runs of characters other than ASCII letters and digits collapse into a
/// single `-`, and leading/trailing dashes are dropped.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Builds a fresh container name for a pipeline titled `title`
///
/// The name is `pipeline-<slug>-<8 hex chars>` so two pipelines with the same
/// title never share a container.
pub fn pipeline_container_name(title: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}{}", PIPELINE_PREFIX, &suffix[..8])
    } else {
        format!("{}{}-{}", PIPELINE_PREFIX, slug, &suffix[..8])
    }
}

/// Whether a storage container holds a pipeline
pub fn is_pipeline_container(name: &str) -> bool {
    name.starts_with(PIPELINE_PREFIX)
}
