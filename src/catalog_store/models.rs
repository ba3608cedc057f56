//! Catalog records as they are persisted, plus the batch shape used to
//! write them.

/// Follower count recorded for an artist whose fetch failed.
pub const FOLLOWERS_FETCH_FAILED: i64 = -1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub followers_count: i64,
}

impl Artist {
    /// Placeholder kept in place of an artist that could not be fetched, so
    /// the ID is still accounted for and can be inspected later.
    pub fn fetch_failed(id: i64, reason: impl Into<String>) -> Self {
        Self {
            id,
            name: reason.into(),
            followers_count: FOLLOWERS_FETCH_FAILED,
        }
    }

    #[cfg(test)]
    pub fn is_fetch_failure(&self) -> bool {
        self.followers_count == FOLLOWERS_FETCH_FAILED
    }
}

/// A song as first discovered, without lyrics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub release_date: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Authorship {
    pub song_id: i64,
    pub artist_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LyricsUpdate {
    pub song_id: i64,
    pub lyrics: String,
}

/// Row counts, used for status logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub artists: usize,
    pub songs: usize,
    pub songs_with_lyrics: usize,
    pub authorships: usize,
}

/// Mutations waiting to be written in a single transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingBatch {
    pub artists: Vec<Artist>,
    pub songs: Vec<Song>,
    pub authorships: Vec<Authorship>,
    pub lyrics: Vec<LyricsUpdate>,
}

impl PendingBatch {
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
            && self.songs.is_empty()
            && self.authorships.is_empty()
            && self.lyrics.is_empty()
    }

    /// Total number of records across all four collections.
    pub fn len(&self) -> usize {
        self.artists.len() + self.songs.len() + self.authorships.len() + self.lyrics.len()
    }

    /// Put `earlier` in front of the records currently held, keeping the
    /// relative order of both.
    pub fn prepend(&mut self, earlier: PendingBatch) {
        fn splice<T>(current: &mut Vec<T>, mut earlier: Vec<T>) {
            earlier.append(current);
            *current = earlier;
        }
        splice(&mut self.artists, earlier.artists);
        splice(&mut self.songs, earlier.songs);
        splice(&mut self.authorships, earlier.authorships);
        splice(&mut self.lyrics, earlier.lyrics);
    }
}
