//! End-to-end pipeline tests against a scripted Genius API and an on-disk
//! catalog.

mod common;

use common::*;
use songs_scraper::catalog_store::{CatalogCounts, CatalogStore, SqliteCatalogStore};
use songs_scraper::ingest::{Pipeline, PipelineState, ShutdownReport};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const EXPECTED_COUNTS: CatalogCounts = CatalogCounts {
    artists: 20,
    songs: 4,
    songs_with_lyrics: 3,
    authorships: 5,
};

/// Run `pipeline` until `done` holds (or a deadline passes), then stop it.
fn run_until<F: FnMut() -> bool>(pipeline: &Pipeline, done: F) -> (bool, ShutdownReport) {
    let token = CancellationToken::new();
    thread::scope(|scope| {
        let runner = {
            let token = token.clone();
            scope.spawn(move || pipeline.run(token))
        };
        let reached = wait_until(Duration::from_secs(15), done);
        token.cancel();
        let report = runner.join().unwrap().unwrap();
        (reached, report)
    })
}

fn lyrics_of(store: &SqliteCatalogStore, song_id: i64) -> Option<String> {
    store
        .query(
            "SELECT lyrics FROM songs WHERE id = ?1",
            [song_id],
            |r| r.get::<_, Option<String>>(0),
        )
        .unwrap()
        .into_iter()
        .next()
        .flatten()
}

#[test]
fn test_pipeline_ingests_outstanding_work() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_seeded_catalog(&temp_dir.path().join("songs.db"));
    let pipeline = Pipeline::new(store.clone(), Arc::new(FakeGenius::new()), fast_settings());

    let (reached, report) = run_until(&pipeline, || store.counts().unwrap() == EXPECTED_COUNTS);

    assert!(reached, "catalog never reached {:?}", EXPECTED_COUNTS);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(report.abandoned_threads.is_empty());
    assert_eq!(report.pending_records, 0);
    assert_eq!(pipeline.buffer().pending_len(), 0);
    assert_eq!(store.counts().unwrap(), EXPECTED_COUNTS);

    // A failed fetch is kept as a placeholder
    let broken: Vec<(String, i64)> = store
        .query(
            "SELECT name, followers_count FROM artists WHERE id = ?1",
            [BROKEN_ARTIST_ID],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(broken, vec![("HTTP 500".to_string(), -1)]);

    // A song found through two artists is stored once with both authorships
    let authors: Vec<i64> = store
        .query(
            "SELECT artist_id FROM authorships WHERE song_id = ?1 ORDER BY artist_id",
            [SONG_WITHOUT_LYRICS_ID],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(authors, vec![UNDER_SCRAPED_ARTIST_ID, SCRAPED_ARTIST_ID]);

    let release_dates: Vec<Option<String>> = store
        .query(
            "SELECT release_date FROM songs WHERE id IN (300, 301) ORDER BY id",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(
        release_dates,
        vec![Some("2004-05".to_string()), Some("2005".to_string())]
    );

    assert_eq!(
        lyrics_of(&store, SONG_WITHOUT_LYRICS_ID).as_deref(),
        Some("Lyrics of song 40")
    );
    assert_eq!(lyrics_of(&store, INSTRUMENTAL_SONG_ID), None);
}

#[test]
fn test_second_run_only_picks_up_missing_work() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("songs.db");

    {
        let store = create_seeded_catalog(&db_path);
        let pipeline = Pipeline::new(store.clone(), Arc::new(FakeGenius::new()), fast_settings());
        let (reached, _) = run_until(&pipeline, || store.counts().unwrap() == EXPECTED_COUNTS);
        assert!(reached);
    }

    let store = Arc::new(
        SqliteCatalogStore::new(&db_path, 2, songs_scraper::catalog_store::DEFAULT_BUSY_TIMEOUT)
            .unwrap(),
    );
    let api = Arc::new(FakeGenius::new());
    let pipeline = Pipeline::new(store.clone(), api.clone(), fast_settings());

    let started = Instant::now();
    let (_, report) = run_until(&pipeline, || started.elapsed() > Duration::from_millis(500));

    let seed = report.seed.expect("seeder finished");
    assert_eq!(seed.artists, 0);
    // Only the instrumental song is still missing lyrics
    assert_eq!(seed.lyrics, 1);
    assert_eq!(store.counts().unwrap(), EXPECTED_COUNTS);
    assert!(api.calls() > 0);
}

#[test]
fn test_stop_signal_drains_pending_records() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_seeded_catalog(&temp_dir.path().join("songs.db"));
    let settings = songs_scraper::config::PipelineSettings {
        // Never flush periodically, only the final flush writes
        flush_interval: Duration::from_secs(3600),
        ..fast_settings()
    };
    let pipeline = Pipeline::new(store.clone(), Arc::new(FakeGenius::new()), settings);

    let (reached, report) = run_until(&pipeline, || pipeline.buffer().pending_len() > 0);

    assert!(reached);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert!(report.final_flush_records > 0);
    assert_eq!(report.pending_records, 0);
    assert!(store.counts().unwrap().artists > 2);
}

#[test]
fn test_no_api_calls_after_stop() {
    let temp_dir = TempDir::new().unwrap();
    let store = create_seeded_catalog(&temp_dir.path().join("songs.db"));
    let api = Arc::new(FakeGenius::with_latency(Duration::from_millis(20)));
    let pipeline = Pipeline::new(store.clone(), api.clone(), fast_settings());

    // Stop while the artist queue still holds most of the range
    let (reached, report) = run_until(&pipeline, || api.calls() >= 3);

    assert!(reached);
    assert!(report.abandoned_threads.is_empty());
    let calls_at_stop = api.calls();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(api.calls(), calls_at_stop);
    assert!(store.counts().unwrap().artists < ARTIST_ID_MAX as usize);
}
