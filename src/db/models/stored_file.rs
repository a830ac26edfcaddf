//! Metadata for uploaded files. The bytes live under the storage root.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

/// Classification of an upload; decides which entity it may link to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum FileKind {
    Invoice,
    Request,
    Document,
    Other,
}

impl FileKind {
    pub fn accepts_invoice_link(&self) -> bool {
        matches!(self, FileKind::Invoice)
    }

    pub fn accepts_request_link(&self) -> bool {
        matches!(self, FileKind::Request)
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::Invoice => write!(f, "INVOICE"),
            FileKind::Request => write!(f, "REQUEST"),
            FileKind::Document => write!(f, "DOCUMENT"),
            FileKind::Other => write!(f, "OTHER"),
        }
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    /// Kinds are matched exactly; "invoice" is not a valid kind
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVOICE" => Ok(FileKind::Invoice),
            "REQUEST" => Ok(FileKind::Request),
            "DOCUMENT" => Ok(FileKind::Document),
            "OTHER" => Ok(FileKind::Other),
            _ => Err(format!("Unknown file kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub user_id: String,
    pub kind: FileKind,
    pub original_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage_path: String,
    pub invoice_id: Option<String>,
    pub request_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug)]
pub struct NewStoredFile<'a> {
    pub id: &'a str,
    pub kind: FileKind,
    pub original_name: &'a str,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub size_bytes: i64,
    pub storage_path: &'a str,
    pub invoice_id: Option<&'a str>,
    pub request_id: Option<&'a str>,
}

pub async fn insert_stored_file(
    db: &SqlitePool,
    owner_id: &str,
    file: &NewStoredFile<'_>,
) -> Result<StoredFile, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO stored_files (id, user_id, kind, original_name, file_name, mime_type, size_bytes, storage_path, invoice_id, request_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(file.id)
    .bind(owner_id)
    .bind(file.kind)
    .bind(file.original_name)
    .bind(file.file_name)
    .bind(file.mime_type)
    .bind(file.size_bytes)
    .bind(file.storage_path)
    .bind(file.invoice_id)
    .bind(file.request_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as::<_, StoredFile>("SELECT * FROM stored_files WHERE id = ?")
        .bind(file.id)
        .fetch_one(db)
        .await
}

/// Files of one kind owned by `owner_id`, newest first, optionally narrowed
/// to a linked invoice or request.
pub async fn list_stored_files(
    db: &SqlitePool,
    owner_id: &str,
    kind: FileKind,
    invoice_id: Option<&str>,
    request_id: Option<&str>,
) -> Result<Vec<StoredFile>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM stored_files WHERE user_id = ");
    query.push_bind(owner_id);
    query.push(" AND kind = ").push_bind(kind);
    if let Some(invoice_id) = invoice_id {
        query.push(" AND invoice_id = ").push_bind(invoice_id);
    }
    if let Some(request_id) = request_id {
        query.push(" AND request_id = ").push_bind(request_id);
    }
    query.push(" ORDER BY created_at DESC");

    query.build_query_as::<StoredFile>().fetch_all(db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::seed_user;

    fn record<'a>(id: &'a str, kind: FileKind) -> NewStoredFile<'a> {
        NewStoredFile {
            id,
            kind,
            original_name: "scan.pdf",
            file_name: "generated.pdf",
            mime_type: "application/pdf",
            size_bytes: 42,
            storage_path: "storage/u/generated.pdf",
            invoice_id: None,
            request_id: None,
        }
    }

    #[test]
    fn test_kind_parsing_is_exact() {
        assert_eq!("INVOICE".parse::<FileKind>().unwrap(), FileKind::Invoice);
        assert!("invoice".parse::<FileKind>().is_err());
        assert!("PHOTO".parse::<FileKind>().is_err());
        assert!(FileKind::Request.accepts_request_link());
        assert!(!FileKind::Document.accepts_invoice_link());
    }

    #[tokio::test]
    async fn test_list_filters_by_owner_and_kind() {
        let db = crate::db::init_in_memory().await.unwrap();
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;

        insert_stored_file(&db, &alice.id, &record("f1", FileKind::Document)).await.unwrap();
        insert_stored_file(&db, &alice.id, &record("f2", FileKind::Other)).await.unwrap();
        insert_stored_file(&db, &bob.id, &record("f3", FileKind::Document)).await.unwrap();

        let docs = list_stored_files(&db, &alice.id, FileKind::Document, None, None)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "f1");
        assert_eq!(docs[0].user_id, alice.id);

        let none = list_stored_files(&db, &alice.id, FileKind::Document, Some("nope"), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
