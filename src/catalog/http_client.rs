//! HTTP client for the external catalog service.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CatalogArtist, CatalogClient, CatalogPlaylist, CatalogSong, SearchFilter};

#[derive(Deserialize)]
struct SongsResponse {
    songs: Vec<CatalogSong>,
}

#[derive(Deserialize)]
struct PlaylistsResponse {
    playlists: Vec<CatalogPlaylist>,
}

#[derive(Deserialize)]
struct ArtistsResponse {
    artists: Vec<CatalogArtist>,
}

/// Client for the external catalog service.
///
/// Handles HTTP requests to the catalog for:
/// - Artist top songs and related artists
/// - Genre playlists and playlist tracks
/// - Free-text search, related songs and charts
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
}

impl HttpCatalogClient {
    /// Create a new HttpCatalogClient.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the catalog service (e.g., "http://localhost:9000")
    /// * `timeout_secs` - Request timeout in seconds
    pub fn new(base_url: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.client.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Catalog request to {} failed with status: {}",
                url,
                response.status()
            ));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_artist_top_songs(
        &self,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogSong>> {
        let url = format!("{}/artist/top-songs", self.base_url);
        let response: SongsResponse = self
            .get_json(
                url,
                &[("artist", artist.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.songs)
    }

    async fn get_genre_playlists(
        &self,
        genre: &str,
        limit: usize,
    ) -> Result<Vec<CatalogPlaylist>> {
        let url = format!("{}/genre/playlists", self.base_url);
        let response: PlaylistsResponse = self
            .get_json(
                url,
                &[("genre", genre.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.playlists)
    }

    async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        limit: usize,
    ) -> Result<Vec<CatalogSong>> {
        let url = format!("{}/playlist/{}/tracks", self.base_url, playlist_id);
        let response: SongsResponse = self
            .get_json(url, &[("limit", limit.to_string())])
            .await?;
        Ok(response.songs)
    }

    async fn get_related_songs(&self, song_id: &str, limit: usize) -> Result<Vec<CatalogSong>> {
        let url = format!("{}/song/{}/related", self.base_url, song_id);
        let response: SongsResponse = self
            .get_json(url, &[("limit", limit.to_string())])
            .await?;
        Ok(response.songs)
    }

    async fn get_related_artists(
        &self,
        artist: &str,
        limit: usize,
    ) -> Result<Vec<CatalogArtist>> {
        let url = format!("{}/artist/related", self.base_url);
        let response: ArtistsResponse = self
            .get_json(
                url,
                &[("artist", artist.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(response.artists)
    }

    async fn search(
        &self,
        query: &str,
        filter: SearchFilter,
        limit: usize,
    ) -> Result<Vec<CatalogSong>> {
        let url = format!("{}/search", self.base_url);
        let response: SongsResponse = self
            .get_json(
                url,
                &[
                    ("q", query.to_string()),
                    ("type", filter.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        Ok(response.songs)
    }

    async fn get_charts(&self, limit: usize) -> Result<Vec<CatalogSong>> {
        let url = format!("{}/charts", self.base_url);
        let response: SongsResponse = self
            .get_json(url, &[("limit", limit.to_string())])
            .await?;
        Ok(response.songs)
    }
}
