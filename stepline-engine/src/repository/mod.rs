//! Repository layer
//!
//! Repositories map pipeline documents and component files onto blobs in the
//! pipeline's storage container. They contain no run logic; every call is a
//! small number of reads or writes against the injected [`ContentStore`].
//!
//! [`ContentStore`]: stepline_client::ContentStore

mod files;
mod pipeline;

pub use files::ComponentFiles;
pub use pipeline::{COMPONENTS_KEY, DEFINITION_KEY, PipelineStore};
