// Artist ID range walked by the seeder in tests
pub const ARTIST_ID_MIN: i64 = 1;
pub const ARTIST_ID_MAX: i64 = 20;

// Already in the catalog: popular, but its songs were never discovered
pub const UNDER_SCRAPED_ARTIST_ID: i64 = 3;
// Already in the catalog with one song still missing lyrics
pub const SCRAPED_ARTIST_ID: i64 = 4;
pub const SONG_WITHOUT_LYRICS_ID: i64 = 40;

// The fake API fails for this artist
pub const BROKEN_ARTIST_ID: i64 = 13;

// Songs of the under-scraped artist, two pages
pub const NEW_SONG_IDS: [i64; 3] = [300, 301, 302];
// Has no lyrics on Genius
pub const INSTRUMENTAL_SONG_ID: i64 = 301;
