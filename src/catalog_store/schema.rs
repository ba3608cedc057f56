//! SQLite schema definitions for the scraped songs catalog.
//!
//! Identifiers are the ones assigned by Genius, so every table keys on the
//! remote ID directly instead of a local rowid.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
};

/// Artists table. `followers_count = -1` marks an artist whose fetch failed.
const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("followers_count", &SqlType::Integer, non_null = true),
    ],
    primary_key: &[],
    indices: &[("idx_artists_followers", "followers_count")],
};

/// Songs table. A NULL `lyrics` column means the lyrics were never fetched.
const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("release_date", &SqlType::Text), // '2004-05-09', '2004-05', '2004'
        sqlite_column!("lyrics", &SqlType::Text),
    ],
    primary_key: &[],
    indices: &[],
};

/// Song/artist association, many-to-many.
const AUTHORSHIPS_TABLE: Table = Table {
    name: "authorships",
    columns: &[
        sqlite_column!(
            "song_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "songs",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "artists",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
    ],
    primary_key: &["song_id", "artist_id"],
    indices: &[("idx_authorships_artist", "artist_id")],
};

pub const CATALOG_SCHEMA: VersionedSchema = VersionedSchema {
    version: 0,
    tables: &[ARTISTS_TABLE, SONGS_TABLE, AUTHORSHIPS_TABLE],
};
