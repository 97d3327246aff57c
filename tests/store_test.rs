use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use spotetl::{
    config::WriteMode,
    error::{Error, Result},
    normalize::{EntityKind, Record, Table, normalize_all},
    pipeline::Tables,
    store::{INGEST_COLUMN, SqlLoader, TableLoader, load_tables},
};
use tempfile::TempDir;

fn saved(ids: &[&str]) -> Vec<Record> {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({ "added_at": "2024-01-01T00:00:00Z", "track": { "id": id, "name": null } }))
        .collect();
    normalize_all(&items, EntityKind::SavedTrack)
}

fn tables(ids: &[&str]) -> Tables {
    let mut tables = Tables::new();
    tables.insert(Table::SavedTracks, saved(ids));
    tables
}

async fn sqlite() -> (TempDir, SqlLoader) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let loader = SqlLoader::connect(&url).await.unwrap();
    (dir, loader)
}

#[tokio::test]
async fn test_append_accumulates_rows() {
    let (_dir, loader) = sqlite().await;

    let written = load_tables(&loader, &tables(&["a", "b", "c"]), WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(written, vec![(Table::SavedTracks, 3)]);

    load_tables(&loader, &tables(&["d", "e"]), WriteMode::Append)
        .await
        .unwrap();
    assert_eq!(loader.count_rows(Table::SavedTracks).await.unwrap(), 5);
}

#[tokio::test]
async fn test_replace_keeps_only_the_latest_run() {
    let (_dir, loader) = sqlite().await;

    load_tables(&loader, &tables(&["a", "b", "c"]), WriteMode::Append)
        .await
        .unwrap();
    load_tables(&loader, &tables(&["x"]), WriteMode::Replace)
        .await
        .unwrap();

    assert_eq!(loader.count_rows(Table::SavedTracks).await.unwrap(), 1);
    let id: String = sqlx::query_scalar(r#"SELECT "id" FROM "saved_tracks""#)
        .fetch_one(loader.pool())
        .await
        .unwrap();
    assert_eq!(id, "x");
}

#[tokio::test]
async fn test_ingest_date_and_nulls_are_stored() {
    let (_dir, loader) = sqlite().await;

    load_tables(&loader, &tables(&["a", "b"]), WriteMode::Append)
        .await
        .unwrap();

    let sql = format!(
        r#"SELECT DISTINCT "{}" FROM "saved_tracks""#,
        INGEST_COLUMN
    );
    let dates: Vec<String> = sqlx::query_scalar(&sql)
        .fetch_all(loader.pool())
        .await
        .unwrap();
    // One timestamp for the whole run
    assert_eq!(dates.len(), 1);
    assert!(chrono::DateTime::parse_from_rfc3339(&dates[0]).is_ok());

    let null_names: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM "saved_tracks" WHERE "name" IS NULL"#)
            .fetch_one(loader.pool())
            .await
            .unwrap();
    assert_eq!(null_names, 2);
}

#[tokio::test]
async fn test_unsupported_database_url() {
    let err = SqlLoader::connect("mysql://localhost/db").await.err().unwrap();
    assert!(matches!(err, Error::Config(_)));
}

/// Records what it was asked to write.
#[derive(Default)]
struct RecordingLoader {
    calls: Mutex<Vec<(Table, usize, WriteMode, String)>>,
}

#[async_trait]
impl TableLoader for RecordingLoader {
    async fn load(
        &self,
        table: Table,
        records: &[Record],
        mode: WriteMode,
        ingest_date: &str,
    ) -> Result<u64> {
        self.calls.lock().unwrap().push((
            table,
            records.len(),
            mode,
            ingest_date.to_string(),
        ));
        Ok(records.len() as u64)
    }
}

#[tokio::test]
async fn test_empty_tables_are_not_written() {
    let mut tables = tables(&["a", "b"]);
    tables.insert(Table::AudioFeatures, Vec::new());
    tables.insert(
        Table::Playlists,
        normalize_all(&[json!({ "id": "p1" })], EntityKind::Playlist),
    );

    let loader = RecordingLoader::default();
    let written = load_tables(&loader, &tables, WriteMode::Replace)
        .await
        .unwrap();

    assert_eq!(
        written,
        vec![(Table::Playlists, 1), (Table::SavedTracks, 2)]
    );

    let calls = loader.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(_, _, mode, _)| *mode == WriteMode::Replace));
    assert_eq!(calls[0].3, calls[1].3);
}
