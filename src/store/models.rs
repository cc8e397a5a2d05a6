use serde::{Deserialize, Serialize};

use crate::options::StylingOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// A generated image saved together with the options that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedLook {
    pub id: String,
    /// `data:` URL of the generated image.
    pub image_url: String,
    pub options: StylingOptions,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}
