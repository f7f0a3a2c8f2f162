//! External music catalog access.
//!
//! The engine only ever talks to the catalog through [`CatalogClient`], so
//! tests and offline deployments can swap in their own implementation. Every
//! call is independently fallible; callers treat a failure as "this source
//! returned nothing".

mod http_client;

pub use http_client::HttpCatalogClient;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A song as the catalog describes it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogSong {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_sec: Option<u32>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogPlaylist {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogArtist {
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Result type restriction for free-text search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFilter {
    Songs,
    Albums,
    Artists,
    Playlists,
}

impl SearchFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchFilter::Songs => "songs",
            SearchFilter::Albums => "albums",
            SearchFilter::Artists => "artists",
            SearchFilter::Playlists => "playlists",
        }
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// An artist's most popular songs.
    async fn get_artist_top_songs(&self, artist: &str, limit: usize)
        -> Result<Vec<CatalogSong>>;

    /// Curated playlists for a genre.
    async fn get_genre_playlists(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<CatalogPlaylist>>;

    /// Tracks of a playlist.
    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<CatalogSong>>;

    /// Songs the catalog relates to a given song.
    async fn get_related_songs(&self, song_id: &str, limit: usize) -> Result<Vec<CatalogSong>>;

    /// Artists the catalog relates to a given artist.
    async fn get_related_artists(
        &self,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>>;

    /// Free-text search. Non-song filters still yield song-shaped entries
    /// (a playlist or album hit surfaces its representative track).
    async fn search(
        &self,
        query: &str,
        filter: SearchFilter,
        limit: usize,
    ) -> Result<Vec<CatalogSong>>;

    /// Global charts.
    async fn get_charts(&self, limit: usize) -> Result<Vec<CatalogSong>>;
}
