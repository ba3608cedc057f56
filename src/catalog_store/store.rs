//! SQLite-backed catalog store.
//!
//! One write connection, guarded by a mutex, carries every mutation. Reads go
//! through a small pool of read-only connections so the seeder and the
//! song-discovery worker never queue behind a flush.

use super::models::{CatalogCounts, PendingBatch};
use super::schema::CATALOG_SCHEMA;
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Params, Row};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

/// Create the schema on an empty database, otherwise check that the database
/// was written by this catalog at the current schema version.
fn create_or_validate_schema(conn: &Connection) -> Result<()> {
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |r| r.get(0),
    )?;

    if table_count == 0 {
        info!("Creating catalog db schema at version {}", CATALOG_SCHEMA.version);
        CATALOG_SCHEMA.create(conn)?;
        return Ok(());
    }

    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    let expected_version = (BASE_DB_VERSION + CATALOG_SCHEMA.version) as i64;
    if db_version != expected_version {
        bail!(
            "Database user_version {} does not belong to this catalog (expected {}), refusing to touch it",
            db_version,
            expected_version
        );
    }

    CATALOG_SCHEMA
        .validate(conn)
        .context("Catalog database schema does not match the expected layout")
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

impl SqliteCatalogStore {
    /// Open (or create) the catalog database at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of read-only connections
    /// * `busy_timeout` - How long a connection waits on a locked database
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        read_pool_size: usize,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let write_conn = Connection::open_with_flags(
            db_path_ref,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database at {:?}", db_path_ref))?;

        configure_connection(&write_conn, busy_timeout)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "synchronous", "NORMAL")?;

        create_or_validate_schema(&write_conn)?;

        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure_connection(&read_conn, busy_timeout)?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        let counts = store.counts()?;
        info!(
            "Opened songs catalog: {} artists, {} songs ({} with lyrics), {} authorships",
            counts.artists, counts.songs, counts.songs_with_lyrics, counts.authorships
        );

        Ok(store)
    }

    /// Store backed by a private in-memory database. Reads share the write
    /// connection since in-memory databases are per-connection.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure_connection(&conn, DEFAULT_BUSY_TIMEOUT)?;
        create_or_validate_schema(&conn)?;

        Ok(SqliteCatalogStore {
            write_conn: Arc::new(Mutex::new(conn)),
            read_pool: Vec::new(),
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        if self.read_pool.is_empty() {
            return self.write_conn.clone();
        }
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Run a read-only query and map every row.
    pub fn query<T, P, F>(&self, sql: &str, params: P, map_row: F) -> Result<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let conn_ref = self.get_read_conn();
        let conn = conn_ref.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, map_row)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let conn_ref = self.get_read_conn();
        let conn = conn_ref.lock().unwrap();
        let count: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn apply_batch(&self, batch: &PendingBatch) -> Result<()> {
        let mut conn = self.write_conn.lock().unwrap();
        // Dropping the transaction without commit rolls everything back.
        let tx = conn.transaction()?;
        {
            let mut insert_artist = tx.prepare_cached(
                "INSERT OR IGNORE INTO artists (id, name, followers_count) VALUES (?1, ?2, ?3)",
            )?;
            for artist in &batch.artists {
                insert_artist
                    .execute(params![artist.id, artist.name, artist.followers_count])
                    .with_context(|| format!("Failed to insert artist {}", artist.id))?;
            }

            let mut insert_song = tx.prepare_cached(
                "INSERT OR IGNORE INTO songs (id, title, release_date) VALUES (?1, ?2, ?3)",
            )?;
            for song in &batch.songs {
                insert_song
                    .execute(params![song.id, song.title, song.release_date])
                    .with_context(|| format!("Failed to insert song {}", song.id))?;
            }

            let mut update_lyrics = tx.prepare_cached("UPDATE songs SET lyrics = ?2 WHERE id = ?1")?;
            for update in &batch.lyrics {
                update_lyrics
                    .execute(params![update.song_id, update.lyrics])
                    .with_context(|| format!("Failed to store lyrics of song {}", update.song_id))?;
            }

            let mut insert_authorship = tx.prepare_cached(
                "INSERT OR IGNORE INTO authorships (song_id, artist_id) VALUES (?1, ?2)",
            )?;
            for authorship in &batch.authorships {
                insert_authorship
                    .execute(params![authorship.song_id, authorship.artist_id])
                    .with_context(|| {
                        format!(
                            "Failed to insert authorship of song {} by artist {}",
                            authorship.song_id, authorship.artist_id
                        )
                    })?;
            }
        }
        tx.commit()?;

        debug!(
            "Applied batch: {} artists, {} songs, {} lyrics, {} authorships",
            batch.artists.len(),
            batch.songs.len(),
            batch.lyrics.len(),
            batch.authorships.len()
        );
        Ok(())
    }

    fn existing_artist_ids(&self) -> Result<Vec<i64>> {
        self.query("SELECT id FROM artists", [], |r| r.get(0))
    }

    fn song_exists(&self, song_id: i64) -> Result<bool> {
        let conn_ref = self.get_read_conn();
        let conn = conn_ref.lock().unwrap();
        let found = conn
            .query_row(
                "SELECT 1 FROM songs WHERE id = ?1",
                params![song_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn songs_missing_lyrics(&self) -> Result<Vec<i64>> {
        self.query("SELECT id FROM songs WHERE lyrics IS NULL", [], |r| r.get(0))
    }

    fn under_scraped_artists(&self, min_followers: i64) -> Result<Vec<i64>> {
        self.query(
            "SELECT a.id FROM artists a
             WHERE a.followers_count >= ?1
               AND NOT EXISTS (SELECT 1 FROM authorships au WHERE au.artist_id = a.id)",
            params![min_followers],
            |r| r.get(0),
        )
    }

    fn counts(&self) -> Result<CatalogCounts> {
        Ok(CatalogCounts {
            artists: self.count("SELECT COUNT(*) FROM artists")?,
            songs: self.count("SELECT COUNT(*) FROM songs")?,
            songs_with_lyrics: self.count("SELECT COUNT(*) FROM songs WHERE lyrics IS NOT NULL")?,
            authorships: self.count("SELECT COUNT(*) FROM authorships")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Artist, Authorship, LyricsUpdate, Song};
    use tempfile::tempdir;

    fn artist(id: i64, followers_count: i64) -> Artist {
        Artist {
            id,
            name: format!("Artist {id}"),
            followers_count,
        }
    }

    fn song(id: i64) -> Song {
        Song {
            id,
            title: format!("Song {id}"),
            release_date: Some("2004-05".to_string()),
        }
    }

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("songs.db");

        let store = SqliteCatalogStore::new(&db_path, 2, DEFAULT_BUSY_TIMEOUT).unwrap();

        assert!(db_path.exists());
        assert_eq!(store.counts().unwrap(), CatalogCounts::default());

        let journal_mode: String = store
            .write_conn
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");
    }

    #[test]
    fn test_reopen_existing_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("songs.db");

        {
            let store = SqliteCatalogStore::new(&db_path, 1, DEFAULT_BUSY_TIMEOUT).unwrap();
            store
                .apply_batch(&PendingBatch {
                    artists: vec![artist(1, 100)],
                    ..Default::default()
                })
                .unwrap();
        }

        let store = SqliteCatalogStore::new(&db_path, 1, DEFAULT_BUSY_TIMEOUT).unwrap();
        assert_eq!(store.existing_artist_ids().unwrap(), vec![1]);
    }

    #[test]
    fn test_refuses_foreign_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("other.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE something (id INTEGER)", [])
                .unwrap();
        }

        let result = SqliteCatalogStore::new(&db_path, 1, DEFAULT_BUSY_TIMEOUT);
        assert!(result.is_err());
    }

    #[test]
    fn test_refuses_catalog_at_other_schema_version() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("songs.db");
        {
            SqliteCatalogStore::new(&db_path, 1, DEFAULT_BUSY_TIMEOUT).unwrap();
            let conn = Connection::open(&db_path).unwrap();
            conn.pragma_update(None, "user_version", BASE_DB_VERSION + 1)
                .unwrap();
        }

        let err = SqliteCatalogStore::new(&db_path, 1, DEFAULT_BUSY_TIMEOUT)
            .err()
            .expect("schema version mismatch is rejected");
        assert!(err.to_string().contains("does not belong to this catalog"));
    }

    #[test]
    fn test_apply_batch_writes_everything() {
        let store = SqliteCatalogStore::in_memory().unwrap();

        store
            .apply_batch(&PendingBatch {
                artists: vec![artist(1, 100), artist(2, 5)],
                songs: vec![song(10), song(11)],
                authorships: vec![
                    Authorship {
                        song_id: 10,
                        artist_id: 1,
                    },
                    Authorship {
                        song_id: 11,
                        artist_id: 1,
                    },
                ],
                lyrics: vec![LyricsUpdate {
                    song_id: 10,
                    lyrics: "Hello".to_string(),
                }],
            })
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 2);
        assert_eq!(counts.songs, 2);
        assert_eq!(counts.songs_with_lyrics, 1);
        assert_eq!(counts.authorships, 2);
        assert_eq!(store.songs_missing_lyrics().unwrap(), vec![11]);
        assert!(store.song_exists(10).unwrap());
        assert!(!store.song_exists(12).unwrap());
    }

    #[test]
    fn test_apply_batch_is_idempotent() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        let batch = PendingBatch {
            artists: vec![artist(1, 100)],
            songs: vec![song(10)],
            authorships: vec![Authorship {
                song_id: 10,
                artist_id: 1,
            }],
            ..Default::default()
        };

        store.apply_batch(&batch).unwrap();
        store.apply_batch(&batch).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.artists, 1);
        assert_eq!(counts.songs, 1);
        assert_eq!(counts.authorships, 1);
    }

    #[test]
    fn test_insert_or_ignore_keeps_first_artist() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store
            .apply_batch(&PendingBatch {
                artists: vec![artist(1, 100)],
                ..Default::default()
            })
            .unwrap();
        store
            .apply_batch(&PendingBatch {
                artists: vec![Artist::fetch_failed(1, "boom")],
                ..Default::default()
            })
            .unwrap();

        let followers: Vec<i64> = store
            .query(
                "SELECT followers_count FROM artists WHERE id = ?1",
                params![1],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(followers, vec![100]);
    }

    #[test]
    fn test_failed_batch_leaves_no_partial_rows() {
        let store = SqliteCatalogStore::in_memory().unwrap();

        // Authorship references an artist that is neither stored nor in the batch
        let result = store.apply_batch(&PendingBatch {
            artists: vec![artist(1, 100)],
            songs: vec![song(10)],
            authorships: vec![Authorship {
                song_id: 10,
                artist_id: 999,
            }],
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(store.counts().unwrap(), CatalogCounts::default());
    }

    #[test]
    fn test_song_shared_by_two_artists() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store
            .apply_batch(&PendingBatch {
                artists: vec![artist(1, 100), artist(2, 100)],
                songs: vec![song(10), song(10)],
                authorships: vec![
                    Authorship {
                        song_id: 10,
                        artist_id: 1,
                    },
                    Authorship {
                        song_id: 10,
                        artist_id: 2,
                    },
                    Authorship {
                        song_id: 10,
                        artist_id: 2,
                    },
                ],
                ..Default::default()
            })
            .unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.songs, 1);
        assert_eq!(counts.authorships, 2);
    }

    #[test]
    fn test_under_scraped_artists() {
        let store = SqliteCatalogStore::in_memory().unwrap();
        store
            .apply_batch(&PendingBatch {
                artists: vec![
                    artist(1, 100),
                    artist(2, 100),
                    artist(3, 49),
                    Artist::fetch_failed(4, "error"),
                ],
                songs: vec![song(10)],
                authorships: vec![Authorship {
                    song_id: 10,
                    artist_id: 2,
                }],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.under_scraped_artists(50).unwrap(), vec![1]);
        let mut low_threshold = store.under_scraped_artists(0).unwrap();
        low_threshold.sort();
        assert_eq!(low_threshold, vec![1, 3]);
    }

    #[test]
    fn test_reads_see_committed_writes_through_pool() {
        let dir = tempdir().unwrap();
        let store =
            SqliteCatalogStore::new(dir.path().join("songs.db"), 3, DEFAULT_BUSY_TIMEOUT).unwrap();

        store
            .apply_batch(&PendingBatch {
                artists: vec![artist(7, 10)],
                songs: vec![song(70)],
                ..Default::default()
            })
            .unwrap();

        // Cycle through every read connection
        for _ in 0..3 {
            assert!(store.song_exists(70).unwrap());
            assert_eq!(store.existing_artist_ids().unwrap(), vec![7]);
        }
    }
}
