//! Pipeline lifecycle: start every thread, report status while running, and
//! shut down in order once the cancellation token fires.
//!
//! Shutdown order: cancel, close the queues, join the seeder, join the
//! workers, flush once more, join the periodic flush loop. Each join is
//! bounded; a thread that does not stop in time is left behind and logged.

use super::queue::WorkQueue;
use super::seeder::{SeedReport, Seeder};
use super::sleep_unless_cancelled;
use super::workers::{ArtistWorker, LyricsWorker, SongDiscoveryWorker};
use super::write_buffer::{RecordSink, WriteBehindBuffer};
use crate::catalog_store::CatalogStore;
use crate::config::PipelineSettings;
use crate::genius::GeniusApi;
use crate::metrics;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const JOIN_POLL: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// What happened during shutdown.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// `None` when the seeder failed, panicked or did not stop in time.
    pub seed: Option<SeedReport>,
    /// Threads that did not stop within their join timeout.
    pub abandoned_threads: Vec<String>,
    pub final_flush_records: usize,
    /// Records still buffered after the final flush, non-zero only when it failed.
    pub pending_records: usize,
}

enum Joined<T> {
    Finished(T),
    Panicked,
    TimedOut,
}

fn join_with_timeout<T>(handle: JoinHandle<T>, timeout: Duration) -> Joined<T> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Joined::TimedOut;
        }
        thread::sleep(JOIN_POLL);
    }
    match handle.join() {
        Ok(value) => Joined::Finished(value),
        Err(_) => Joined::Panicked,
    }
}

fn spawn_named<F, T>(name: String, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(f)
        .with_context(|| format!("Failed to spawn thread {}", name))
}

struct Threads {
    seeder: Option<JoinHandle<Option<SeedReport>>>,
    workers: Vec<(String, JoinHandle<()>)>,
    flush_loop: Option<JoinHandle<()>>,
}

pub struct Pipeline {
    store: Arc<dyn CatalogStore>,
    api: Arc<dyn GeniusApi>,
    buffer: Arc<WriteBehindBuffer>,
    artist_queue: Arc<WorkQueue<i64>>,
    song_queue: Arc<WorkQueue<i64>>,
    lyrics_queue: Arc<WorkQueue<i64>>,
    settings: PipelineSettings,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        api: Arc<dyn GeniusApi>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            buffer: Arc::new(WriteBehindBuffer::new(store.clone())),
            artist_queue: Arc::new(WorkQueue::new("artists", settings.artist_queue_capacity)),
            song_queue: Arc::new(WorkQueue::new("songs", settings.song_queue_capacity)),
            lyrics_queue: Arc::new(WorkQueue::new("lyrics", settings.lyrics_queue_capacity)),
            store,
            api,
            settings,
            state: Mutex::new(PipelineState::Starting),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap()
    }

    pub fn buffer(&self) -> &Arc<WriteBehindBuffer> {
        &self.buffer
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock().unwrap() = state;
        info!("Pipeline {:?}", state);
    }

    /// Run until `token` is cancelled, then shut down. Blocks the caller.
    pub fn run(&self, token: CancellationToken) -> Result<ShutdownReport> {
        self.set_state(PipelineState::Starting);

        let mut threads = Threads {
            seeder: None,
            workers: Vec::new(),
            flush_loop: None,
        };
        if let Err(e) = self.start(&token, &mut threads) {
            error!("Pipeline failed to start: {:#}", e);
            let _ = self.shutdown(&token, threads);
            return Err(e);
        }

        self.set_state(PipelineState::Running);
        while sleep_unless_cancelled(&token, self.settings.status_interval) {
            self.log_status();
        }

        Ok(self.shutdown(&token, threads))
    }

    fn start(&self, token: &CancellationToken, threads: &mut Threads) -> Result<()> {
        let sink: Arc<dyn RecordSink> = self.buffer.clone();
        let poll = self.settings.queue_poll;

        let seeder = Seeder::new(
            self.store.clone(),
            self.artist_queue.clone(),
            self.song_queue.clone(),
            self.lyrics_queue.clone(),
            self.settings.clone(),
        );
        let seeder_token = token.clone();
        threads.seeder = Some(spawn_named("seeder".to_string(), move || {
            match seeder.run(&seeder_token) {
                Ok(report) => {
                    info!(
                        "Seeding done: {} artists, {} songs for lyrics, {} artists for song discovery{}",
                        report.artists,
                        report.lyrics,
                        report.song_discovery,
                        if report.aborted { " (aborted)" } else { "" }
                    );
                    Some(report)
                }
                Err(e) => {
                    error!("Seeding failed: {}", e);
                    None
                }
            }
        })?);

        let flush_buffer = self.buffer.clone();
        let flush_interval = self.settings.flush_interval;
        let flush_token = token.clone();
        threads.flush_loop = Some(spawn_named("flush-loop".to_string(), move || {
            flush_buffer.run_periodic_flush(flush_interval, &flush_token)
        })?);

        let artist_worker =
            ArtistWorker::new(self.api.clone(), self.artist_queue.clone(), sink.clone(), poll);
        let worker_token = token.clone();
        let name = "artist-worker".to_string();
        threads.workers.push((
            name.clone(),
            spawn_named(name, move || artist_worker.run(&worker_token))?,
        ));

        let song_worker = SongDiscoveryWorker::new(
            self.api.clone(),
            self.store.clone(),
            self.song_queue.clone(),
            self.lyrics_queue.clone(),
            sink.clone(),
            poll,
            self.settings.song_page_max_attempts,
            self.settings.song_page_retry_step,
        );
        let worker_token = token.clone();
        let name = "song-worker".to_string();
        threads.workers.push((
            name.clone(),
            spawn_named(name, move || song_worker.run(&worker_token))?,
        ));

        for index in 0..self.settings.lyrics_workers {
            let lyrics_worker = LyricsWorker::new(
                self.api.clone(),
                self.lyrics_queue.clone(),
                sink.clone(),
                poll,
                self.settings.store_lyrics_errors,
            );
            let worker_token = token.clone();
            let name = format!("lyrics-worker-{}", index);
            threads.workers.push((
                name.clone(),
                spawn_named(name, move || lyrics_worker.run(&worker_token))?,
            ));
        }

        info!(
            "Pipeline started with {} lyrics workers",
            self.settings.lyrics_workers
        );
        Ok(())
    }

    fn shutdown(&self, token: &CancellationToken, threads: Threads) -> ShutdownReport {
        self.set_state(PipelineState::Stopping);
        let mut report = ShutdownReport::default();

        token.cancel();
        self.artist_queue.close();
        self.song_queue.close();
        self.lyrics_queue.close();

        if let Some(handle) = threads.seeder {
            match join_with_timeout(handle, self.settings.seeder_join_timeout) {
                Joined::Finished(seed) => report.seed = seed,
                Joined::Panicked => error!("Seeder panicked"),
                Joined::TimedOut => {
                    warn!(
                        "Seeder did not stop within {:?}",
                        self.settings.seeder_join_timeout
                    );
                    report.abandoned_threads.push("seeder".to_string());
                }
            }
        }

        for (name, handle) in threads.workers {
            match join_with_timeout(handle, self.settings.worker_join_timeout) {
                Joined::Finished(()) => {}
                Joined::Panicked => error!("Worker {} panicked", name),
                Joined::TimedOut => {
                    warn!(
                        "Worker {} did not stop within {:?}",
                        name, self.settings.worker_join_timeout
                    );
                    report.abandoned_threads.push(name);
                }
            }
        }

        match self.buffer.flush() {
            Ok(records) => report.final_flush_records = records,
            Err(e) => error!("Final flush failed: {}", e),
        }
        report.pending_records = self.buffer.pending_len();

        if let Some(handle) = threads.flush_loop {
            match join_with_timeout(handle, self.settings.worker_join_timeout) {
                Joined::Finished(()) => {}
                Joined::Panicked => error!("Flush loop panicked"),
                Joined::TimedOut => {
                    warn!("Flush loop did not stop in time");
                    report.abandoned_threads.push("flush-loop".to_string());
                }
            }
        }

        self.set_state(PipelineState::Stopped);
        info!(
            "Pipeline stopped: {} records in final flush, {} left pending",
            report.final_flush_records, report.pending_records
        );
        report
    }

    fn log_status(&self) {
        for queue in [&self.artist_queue, &self.song_queue, &self.lyrics_queue] {
            metrics::set_queue_depth(queue.name(), queue.len());
        }
        info!(
            "Status: {} flushes ({} failed), {} records pending, queues artists={}/{} songs={}/{} lyrics={}/{} (waiting/in progress)",
            metrics::flushes_total(),
            metrics::flush_failures_total(),
            self.buffer.pending_len(),
            self.artist_queue.len(),
            self.artist_queue.in_flight(),
            self.song_queue.len(),
            self.song_queue.in_flight(),
            self.lyrics_queue.len(),
            self.lyrics_queue.in_flight(),
        );
    }
}
