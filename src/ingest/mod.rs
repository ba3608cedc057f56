//! The concurrent ingestion pipeline.
//!
//! - `queue`: bounded work queues between the stages
//! - `write_buffer`: write-behind buffer committing records in batches
//! - `seeder`: scan of the catalog for outstanding work
//! - `workers`: artist, song-discovery and lyrics workers
//! - `coordinator`: startup, status reporting and ordered shutdown

mod coordinator;
mod queue;
mod seeder;
mod workers;
mod write_buffer;

pub use coordinator::{Pipeline, PipelineState, ShutdownReport};
pub use queue::{Dequeued, QueueClosed, WorkQueue};
pub use seeder::{SeedError, SeedReport, Seeder};
pub use workers::{ArtistWorker, LyricsWorker, SongDiscoveryWorker};
pub use write_buffer::{FlushError, RecordSink, WriteBehindBuffer};

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Sleep for `duration` unless `token` is cancelled first.
/// Returns `false` when the sleep was cut short by cancellation.
pub(crate) fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}
