//! Storage folder DTOs

use serde::{Deserialize, Serialize};

/// A storage container as listed by the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub name: String,
    pub id: String,
    pub host: String,
}

/// Request to create a storage container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolder {
    pub name: String,
    pub host: String,
}

/// Request to create a directory inside a storage container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MakeDirectory {
    pub path: String,
    /// Create missing parents and ignore an existing directory
    #[serde(default)]
    pub parents: bool,
}
