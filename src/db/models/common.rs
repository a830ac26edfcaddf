//! Types shared across models.

use serde::Deserialize;

/// Body of the resource endpoints that address a record by id in the body
/// rather than the path (`PUT`/`DELETE` on collections).
#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: String,
}
