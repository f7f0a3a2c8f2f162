//! Catalog-backed recommendation generation.
//!
//! Expands the user profile into five candidate categories via the external
//! catalog. Every catalog failure degrades: a failed seed contributes
//! nothing, a failed category comes back empty, and the overall batch is
//! still returned. Results are cached per category and profile epoch, and
//! identical concurrent requests share a single expansion.

mod flight;

pub use flight::InflightRegistry;

use crate::analytics::UserProfile;
use crate::cache::RecommendationCache;
use crate::catalog::{CatalogClient, CatalogSong, SearchFilter};
use crate::config::CatalogSettings;
use crate::model::{RecommendationBatch, RecommendationCandidate, RecommendationCategory};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Confidence attached to candidates from a category's primary source.
const PRIMARY_CONFIDENCE: f64 = 0.9;
/// Confidence attached to candidates that came from a fallback source.
const FALLBACK_CONFIDENCE: f64 = 0.6;

pub struct CatalogRecommendationService {
    client: Arc<dyn CatalogClient>,
    settings: CatalogSettings,
    cache: Arc<RecommendationCache>,
    flights: InflightRegistry<Vec<RecommendationCandidate>>,
}

impl CatalogRecommendationService {
    pub fn new(
        client: Arc<dyn CatalogClient>,
        settings: CatalogSettings,
        cache: Arc<RecommendationCache>,
    ) -> Self {
        Self {
            client,
            settings,
            cache,
            flights: InflightRegistry::new(),
        }
    }

    /// Generate all five categories concurrently. Never fails; categories
    /// that could not be expanded come back empty.
    pub async fn generate(&self, profile: &UserProfile, force_refresh: bool) -> RecommendationBatch {
        let (artist_based, genre_based, similar, discovery, trending) = tokio::join!(
            self.category(RecommendationCategory::ArtistBased, profile, force_refresh),
            self.category(RecommendationCategory::GenreBased, profile, force_refresh),
            self.category(RecommendationCategory::Similar, profile, force_refresh),
            self.category(RecommendationCategory::Discovery, profile, force_refresh),
            self.category(RecommendationCategory::Trending, profile, force_refresh),
        );
        RecommendationBatch {
            artist_based,
            genre_based,
            similar,
            discovery,
            trending,
        }
    }

    /// Generate one category, serving from cache when possible.
    pub async fn category(
        &self,
        category: RecommendationCategory,
        profile: &UserProfile,
        force_refresh: bool,
    ) -> Vec<RecommendationCandidate> {
        let epoch = profile.epoch();
        if !force_refresh {
            if let Some(hit) = self.cache.get(category, &epoch) {
                debug!(%category, "Serving category from cache");
                return hit;
            }
        }

        let key = format!("{}:{}", category.as_str(), epoch);
        self.flights
            .run(&key, || async {
                let candidates = self.expand(category, profile).await;
                self.cache.put(category, &epoch, candidates.clone());
                candidates
            })
            .await
    }

    async fn expand(
        &self,
        category: RecommendationCategory,
        profile: &UserProfile,
    ) -> Vec<RecommendationCandidate> {
        match category {
            RecommendationCategory::ArtistBased => self.artist_based(profile).await,
            RecommendationCategory::GenreBased => self.genre_based(profile).await,
            RecommendationCategory::Similar => self.similar(profile).await,
            RecommendationCategory::Discovery => self.discovery(profile).await,
            RecommendationCategory::Trending => self.trending().await,
            RecommendationCategory::LocalPicks => Vec::new(),
        }
    }

    /// Top songs of the user's favorite artists. Falls back to free-text
    /// search per artist when the top-songs lookup yields nothing.
    async fn artist_based(&self, profile: &UserProfile) -> Vec<RecommendationCandidate> {
        let seeds: Vec<&str> = profile
            .top_artists
            .iter()
            .take(self.settings.artist_seeds)
            .map(|(artist, _)| artist.as_str())
            .collect();

        let per_seed = self
            .for_each_seed(&seeds, |artist| async move {
                let songs = self
                    .fetch(
                        self.client
                            .get_artist_top_songs(artist, self.settings.per_artist_cap),
                        artist,
                    )
                    .await;
                if !songs.is_empty() {
                    return tag(songs, PRIMARY_CONFIDENCE);
                }
                let mut fallback = self
                    .fetch(
                        self.client.search(
                            &format!("{artist} songs"),
                            SearchFilter::Songs,
                            self.settings.per_artist_cap,
                        ),
                        artist,
                    )
                    .await;
                fallback.truncate(self.settings.per_artist_cap);
                tag(fallback, FALLBACK_CONFIDENCE)
            })
            .await;

        self.to_candidates(
            RecommendationCategory::ArtistBased,
            per_seed,
            self.settings.artist_total_cap,
            &HashSet::new(),
        )
    }

    /// Genre playlists expanded to their tracks, with free-text search as
    /// the per-genre fallback.
    async fn genre_based(&self, profile: &UserProfile) -> Vec<RecommendationCandidate> {
        let seeds: Vec<&str> = profile
            .top_genres
            .iter()
            .take(self.settings.genre_seeds)
            .map(|(genre, _)| genre.as_str())
            .collect();

        let per_seed = self
            .for_each_seed(&seeds, |genre| async move {
                let playlists = match tokio::time::timeout(
                    self.request_timeout(),
                    self.client
                        .get_genre_playlists(genre, self.settings.playlists_per_genre),
                )
                .await
                {
                    Ok(Ok(playlists)) => playlists,
                    Ok(Err(error)) => {
                        warn!(genre, ?error, "Genre playlists request failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(genre, "Genre playlists request timed out");
                        Vec::new()
                    }
                };

                let mut songs = Vec::new();
                for playlist in playlists.iter().take(self.settings.playlists_per_genre) {
                    songs.extend(
                        self.fetch(
                            self.client
                                .get_playlist_tracks(&playlist.id, self.settings.genre_total_cap),
                            &playlist.id,
                        )
                        .await,
                    );
                }
                if !songs.is_empty() {
                    return tag(songs, PRIMARY_CONFIDENCE);
                }

                let fallback = self
                    .fetch(
                        self.client.search(
                            &format!("{genre} music"),
                            SearchFilter::Songs,
                            self.settings.genre_total_cap,
                        ),
                        genre,
                    )
                    .await;
                tag(fallback, FALLBACK_CONFIDENCE)
            })
            .await;

        self.to_candidates(
            RecommendationCategory::GenreBased,
            per_seed,
            self.settings.genre_total_cap,
            &HashSet::new(),
        )
    }

    /// Songs related to what the user recently finished. Seeds are recent
    /// high-completion, never-skipped songs; a seed with no related songs
    /// falls back to an artist-keyed search. Songs already in the history
    /// are excluded.
    async fn similar(&self, profile: &UserProfile) -> Vec<RecommendationCandidate> {
        let mut seeds: Vec<(&str, &str)> = profile
            .songs
            .iter()
            .filter(|(_, s)| {
                s.completion_rate > self.settings.similar_seed_min_completion && s.skip_rate == 0.0
            })
            .map(|(id, s)| (id.as_str(), s.artist.as_str()))
            .collect();
        seeds.sort_by(|a, b| {
            let a_last = profile.songs[a.0].last_played_ms;
            let b_last = profile.songs[b.0].last_played_ms;
            b_last.cmp(&a_last).then_with(|| a.0.cmp(b.0))
        });
        seeds.truncate(self.settings.similar_seeds);

        let per_seed = self
            .for_each_seed(&seeds, |(song_id, artist)| async move {
                let songs = self
                    .fetch(
                        self.client
                            .get_related_songs(song_id, self.settings.per_artist_cap),
                        song_id,
                    )
                    .await;
                if !songs.is_empty() {
                    return tag(songs, PRIMARY_CONFIDENCE);
                }
                // The event log carries no titles, so the text fallback is
                // keyed by the seed's artist.
                let fallback = self
                    .fetch(
                        self.client.search(
                            &format!("{artist} songs"),
                            SearchFilter::Songs,
                            self.settings.per_artist_cap,
                        ),
                        artist,
                    )
                    .await;
                tag(fallback, FALLBACK_CONFIDENCE)
            })
            .await;

        let known: HashSet<&str> = profile.songs.keys().map(|id| id.as_str()).collect();
        self.to_candidates(
            RecommendationCategory::Similar,
            per_seed,
            self.settings.similar_total_cap,
            &known,
        )
    }

    /// Songs from artists the user has never played, reached through the top
    /// artist's related-artist list. Falls back wholesale to trending when
    /// the graph yields nothing new.
    async fn discovery(&self, profile: &UserProfile) -> Vec<RecommendationCandidate> {
        let known_artists: HashSet<String> = profile
            .songs
            .values()
            .map(|s| s.artist.to_lowercase())
            .chain(
                profile
                    .top_artists
                    .iter()
                    .map(|(artist, _)| artist.to_lowercase()),
            )
            .collect();
        let known_songs: HashSet<&str> = profile.songs.keys().map(|id| id.as_str()).collect();

        let related = match profile.top_artists.first() {
            Some((top_artist, _)) => match tokio::time::timeout(
                self.request_timeout(),
                self.client
                    .get_related_artists(top_artist, self.settings.discovery_artists),
            )
            .await
            {
                Ok(Ok(artists)) => artists,
                Ok(Err(error)) => {
                    warn!(artist = %top_artist, ?error, "Related artists request failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(artist = %top_artist, "Related artists request timed out");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let mut fresh: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for artist in related {
            let lower = artist.name.to_lowercase();
            if known_artists.contains(&lower) || !seen.insert(lower) {
                continue;
            }
            fresh.push(artist.name);
        }
        fresh.truncate(self.settings.discovery_artists);

        let fresh_refs: Vec<&str> = fresh.iter().map(|a| a.as_str()).collect();
        let per_artist = self
            .for_each_seed(&fresh_refs, |artist| async move {
                let songs = self
                    .fetch(
                        self.client
                            .get_artist_top_songs(artist, self.settings.per_artist_cap),
                        artist,
                    )
                    .await;
                tag(songs, PRIMARY_CONFIDENCE)
            })
            .await;

        let candidates = self.to_candidates(
            RecommendationCategory::Discovery,
            per_artist,
            self.settings.discovery_total_cap,
            &known_songs,
        );
        if !candidates.is_empty() {
            return candidates;
        }

        debug!("Discovery graph came back empty, falling back to trending");
        let charts = self
            .fetch(
                self.client.get_charts(self.settings.discovery_total_cap),
                "discovery-charts",
            )
            .await;
        self.to_candidates(
            RecommendationCategory::Discovery,
            vec![tag(charts, FALLBACK_CONFIDENCE)],
            self.settings.discovery_total_cap,
            &known_songs,
        )
    }

    /// Global charts, with a generic trending search as the fallback.
    async fn trending(&self) -> Vec<RecommendationCandidate> {
        let songs = self
            .fetch(
                self.client.get_charts(self.settings.trending_total_cap),
                "charts",
            )
            .await;
        if !songs.is_empty() {
            return self.to_candidates(
                RecommendationCategory::Trending,
                vec![tag(songs, PRIMARY_CONFIDENCE)],
                self.settings.trending_total_cap,
                &HashSet::new(),
            );
        }

        let fallback = self
            .fetch(
                self.client.search(
                    "trending music",
                    SearchFilter::Songs,
                    self.settings.trending_total_cap,
                ),
                "trending-search",
            )
            .await;
        self.to_candidates(
            RecommendationCategory::Trending,
            vec![tag(fallback, FALLBACK_CONFIDENCE)],
            self.settings.trending_total_cap,
            &HashSet::new(),
        )
    }

    /// Run one async expansion per seed with bounded concurrency, preserving
    /// seed order in the output.
    async fn for_each_seed<'a, S, F, Fut, O>(&self, seeds: &'a [S], expand: F) -> Vec<O>
    where
        S: Copy,
        F: Fn(S) -> Fut,
        Fut: Future<Output = O>,
    {
        stream::iter(seeds.iter().map(|seed| expand(*seed)))
            .buffered(self.settings.max_concurrent_requests.max(1))
            .collect()
            .await
    }

    async fn fetch<F>(&self, request: F, context: &str) -> Vec<CatalogSong>
    where
        F: Future<Output = anyhow::Result<Vec<CatalogSong>>>,
    {
        match tokio::time::timeout(self.request_timeout(), request).await {
            Ok(Ok(songs)) => songs,
            Ok(Err(error)) => {
                warn!(context, ?error, "Catalog request failed");
                Vec::new()
            }
            Err(_) => {
                warn!(context, "Catalog request timed out");
                Vec::new()
            }
        }
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_sec.max(1))
    }

    /// Flatten per-seed results into ranked candidates: dedup by id, skip
    /// excluded ids, cap the total, and assign positional scores.
    fn to_candidates(
        &self,
        category: RecommendationCategory,
        per_seed: Vec<Vec<(CatalogSong, f64)>>,
        cap: usize,
        exclude: &HashSet<&str>,
    ) -> Vec<RecommendationCandidate> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut picked: Vec<(CatalogSong, f64)> = Vec::new();
        'outer: for batch in per_seed {
            for (song, confidence) in batch {
                if exclude.contains(song.id.as_str()) || !seen.insert(song.id.clone()) {
                    continue;
                }
                picked.push((song, confidence));
                if picked.len() == cap {
                    break 'outer;
                }
            }
        }

        let total = picked.len();
        picked
            .into_iter()
            .enumerate()
            .map(|(i, (song, confidence))| RecommendationCandidate {
                id: song.id,
                title: song.title,
                artist: song.artist,
                thumbnail: song.thumbnail,
                category,
                score: (total - i) as f64 / total as f64,
                confidence,
                rank: (i + 1) as u32,
            })
            .collect()
    }
}

fn tag(songs: Vec<CatalogSong>, confidence: f64) -> Vec<(CatalogSong, f64)> {
    songs.into_iter().map(|song| (song, confidence)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::SongSnapshot;
    use crate::catalog::{CatalogArtist, CatalogPlaylist};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn song(id: &str, artist: &str) -> CatalogSong {
        CatalogSong {
            id: id.to_string(),
            title: format!("Title {id}"),
            artist: artist.to_string(),
            album: None,
            duration_sec: None,
            thumbnail: None,
        }
    }

    #[derive(Default)]
    struct MockCatalog {
        top_songs: Mutex<HashMap<String, Vec<CatalogSong>>>,
        search: Mutex<HashMap<String, Vec<CatalogSong>>>,
        playlists: Mutex<HashMap<String, Vec<CatalogPlaylist>>>,
        playlist_tracks: Mutex<HashMap<String, Vec<CatalogSong>>>,
        related_songs: Mutex<HashMap<String, Vec<CatalogSong>>>,
        related_artists: Mutex<HashMap<String, Vec<CatalogArtist>>>,
        charts: Mutex<Vec<CatalogSong>>,
        failing_artists: Mutex<HashSet<String>>,
        fail_everything: Mutex<bool>,
        calls: AtomicUsize,
    }

    impl MockCatalog {
        fn call(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_everything.lock().unwrap() {
                return Err(anyhow!("catalog down"));
            }
            Ok(())
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogClient for MockCatalog {
        async fn get_artist_top_songs(
            &self,
            artist: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            self.call()?;
            if self.failing_artists.lock().unwrap().contains(artist) {
                return Err(anyhow!("artist lookup failed"));
            }
            Ok(self
                .top_songs
                .lock()
                .unwrap()
                .get(artist)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_genre_playlists(
            &self,
            genre: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogPlaylist>> {
            self.call()?;
            Ok(self
                .playlists
                .lock()
                .unwrap()
                .get(genre)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_playlist_tracks(
            &self,
            playlist_id: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            self.call()?;
            Ok(self
                .playlist_tracks
                .lock()
                .unwrap()
                .get(playlist_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_related_songs(
            &self,
            song_id: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            self.call()?;
            Ok(self
                .related_songs
                .lock()
                .unwrap()
                .get(song_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_related_artists(
            &self,
            artist: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogArtist>> {
            self.call()?;
            Ok(self
                .related_artists
                .lock()
                .unwrap()
                .get(artist)
                .cloned()
                .unwrap_or_default())
        }

        async fn search(
            &self,
            query: &str,
            _filter: SearchFilter,
            _limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            self.call()?;
            Ok(self
                .search
                .lock()
                .unwrap()
                .get(query)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_charts(&self, _limit: usize) -> anyhow::Result<Vec<CatalogSong>> {
            self.call()?;
            Ok(self.charts.lock().unwrap().clone())
        }
    }

    /// Delegates to a [`MockCatalog`] after a fixed delay on every call.
    struct SlowCatalog {
        inner: MockCatalog,
        delay: Duration,
    }

    #[async_trait]
    impl CatalogClient for SlowCatalog {
        async fn get_artist_top_songs(
            &self,
            artist: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_artist_top_songs(artist, limit).await
        }

        async fn get_genre_playlists(
            &self,
            genre: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogPlaylist>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_genre_playlists(genre, limit).await
        }

        async fn get_playlist_tracks(
            &self,
            playlist_id: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_playlist_tracks(playlist_id, limit).await
        }

        async fn get_related_songs(
            &self,
            song_id: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_related_songs(song_id, limit).await
        }

        async fn get_related_artists(
            &self,
            artist: &str,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogArtist>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_related_artists(artist, limit).await
        }

        async fn search(
            &self,
            query: &str,
            filter: SearchFilter,
            limit: usize,
        ) -> anyhow::Result<Vec<CatalogSong>> {
            tokio::time::sleep(self.delay).await;
            self.inner.search(query, filter, limit).await
        }

        async fn get_charts(&self, limit: usize) -> anyhow::Result<Vec<CatalogSong>> {
            tokio::time::sleep(self.delay).await;
            self.inner.get_charts(limit).await
        }
    }

    fn profile() -> UserProfile {
        let songs: HashMap<String, SongSnapshot> = HashMap::from([(
            "known".to_string(),
            SongSnapshot {
                artist: "Alpha".to_string(),
                genre: Some("rock".to_string()),
                last_played_ms: 1_000,
                play_count: 10,
                completion_rate: 0.9,
                skip_rate: 0.0,
            },
        )]);
        UserProfile {
            top_artists: vec![("Alpha".to_string(), 10.0), ("Beta".to_string(), 5.0)],
            top_genres: vec![("rock".to_string(), 4)],
            songs,
            generated_at_ms: 1_000,
            ..Default::default()
        }
    }

    fn service(client: Arc<MockCatalog>) -> CatalogRecommendationService {
        CatalogRecommendationService::new(
            client,
            CatalogSettings::default(),
            Arc::new(RecommendationCache::new(Duration::from_secs(60))),
        )
    }

    #[tokio::test]
    async fn test_artist_based_with_fallback_seed() {
        let mock = Arc::new(MockCatalog::default());
        mock.top_songs
            .lock()
            .unwrap()
            .insert("Alpha".to_string(), vec![song("a1", "Alpha")]);
        // Beta's top-songs call fails, its search fallback succeeds
        mock.failing_artists
            .lock()
            .unwrap()
            .insert("Beta".to_string());
        mock.search
            .lock()
            .unwrap()
            .insert("Beta songs".to_string(), vec![song("b1", "Beta")]);

        let candidates = service(mock)
            .category(RecommendationCategory::ArtistBased, &profile(), false)
            .await;

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].id, "a1");
        assert_eq!(candidates[0].confidence, PRIMARY_CONFIDENCE);
        assert_eq!(candidates[1].id, "b1");
        assert_eq!(candidates[1].confidence, FALLBACK_CONFIDENCE);
        // Positional scores descend with rank
        assert!(candidates[0].score > candidates[1].score);
        assert_eq!(candidates[0].rank, 1);
    }

    #[tokio::test]
    async fn test_one_failing_seed_does_not_sink_category() {
        let mock = Arc::new(MockCatalog::default());
        mock.top_songs
            .lock()
            .unwrap()
            .insert("Alpha".to_string(), vec![song("a1", "Alpha")]);
        mock.failing_artists
            .lock()
            .unwrap()
            .insert("Beta".to_string());

        let candidates = service(mock)
            .category(RecommendationCategory::ArtistBased, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "a1");
    }

    #[tokio::test]
    async fn test_genre_playlists_expand_to_tracks() {
        let mock = Arc::new(MockCatalog::default());
        mock.playlists.lock().unwrap().insert(
            "rock".to_string(),
            vec![CatalogPlaylist {
                id: "p1".to_string(),
                title: "Rock Hits".to_string(),
                thumbnail: None,
            }],
        );
        mock.playlist_tracks
            .lock()
            .unwrap()
            .insert("p1".to_string(), vec![song("r1", "R"), song("r2", "R")]);

        let candidates = service(mock)
            .category(RecommendationCategory::GenreBased, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].confidence, PRIMARY_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_genre_search_fallback_when_no_playlists() {
        let mock = Arc::new(MockCatalog::default());
        mock.search
            .lock()
            .unwrap()
            .insert("rock music".to_string(), vec![song("r1", "R")]);

        let candidates = service(mock)
            .category(RecommendationCategory::GenreBased, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_requests_yield_empty_batch() {
        let inner = MockCatalog::default();
        inner.charts.lock().unwrap().push(song("t1", "T"));
        inner
            .top_songs
            .lock()
            .unwrap()
            .insert("Alpha".to_string(), vec![song("a1", "Alpha")]);
        // Every call sleeps well past the per-request deadline
        let slow = Arc::new(SlowCatalog {
            inner,
            delay: Duration::from_secs(120),
        });
        let service = CatalogRecommendationService::new(
            slow,
            CatalogSettings {
                request_timeout_sec: 1,
                ..Default::default()
            },
            Arc::new(RecommendationCache::new(Duration::from_secs(60))),
        );

        let batch = service.generate(&profile(), false).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_yields_empty_batch() {
        let mock = Arc::new(MockCatalog::default());
        *mock.fail_everything.lock().unwrap() = true;

        let batch = service(mock).generate(&profile(), false).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_generate_is_cached_per_epoch() {
        let mock = Arc::new(MockCatalog::default());
        mock.top_songs
            .lock()
            .unwrap()
            .insert("Alpha".to_string(), vec![song("a1", "Alpha")]);
        mock.charts.lock().unwrap().push(song("t1", "T"));

        let service = service(Arc::clone(&mock));
        let first = service.generate(&profile(), false).await;
        let calls_after_first = mock.call_count();

        let second = service.generate(&profile(), false).await;
        assert_eq!(first, second);
        assert_eq!(mock.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn test_forced_refresh_recomputes() {
        let mock = Arc::new(MockCatalog::default());
        mock.charts.lock().unwrap().push(song("t1", "T"));

        let service = service(Arc::clone(&mock));
        service
            .category(RecommendationCategory::Trending, &profile(), false)
            .await;
        let calls = mock.call_count();

        let refreshed = service
            .category(RecommendationCategory::Trending, &profile(), true)
            .await;
        assert!(mock.call_count() > calls);
        assert_eq!(refreshed[0].id, "t1");
    }

    #[tokio::test]
    async fn test_discovery_excludes_known_artists_and_songs() {
        let mock = Arc::new(MockCatalog::default());
        mock.related_artists.lock().unwrap().insert(
            "Alpha".to_string(),
            vec![
                CatalogArtist {
                    name: "Beta".to_string(),
                    thumbnail: None,
                },
                CatalogArtist {
                    name: "Gamma".to_string(),
                    thumbnail: None,
                },
            ],
        );
        // Beta is already a top artist, so only Gamma is fresh
        mock.top_songs.lock().unwrap().insert(
            "Gamma".to_string(),
            vec![song("g1", "Gamma"), song("known", "Gamma")],
        );

        let candidates = service(mock)
            .category(RecommendationCategory::Discovery, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "g1");
        assert_eq!(candidates[0].artist, "Gamma");
    }

    #[tokio::test]
    async fn test_discovery_falls_back_to_trending() {
        let mock = Arc::new(MockCatalog::default());
        mock.charts.lock().unwrap().push(song("t1", "T"));

        let candidates = service(mock)
            .category(RecommendationCategory::Discovery, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "t1");
        assert_eq!(candidates[0].category, RecommendationCategory::Discovery);
        assert_eq!(candidates[0].confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_similar_excludes_history_and_uses_search_fallback() {
        let mock = Arc::new(MockCatalog::default());
        // No related songs for "known"; the artist-keyed search fallback
        // returns a mix of new and already-known songs.
        mock.search.lock().unwrap().insert(
            "Alpha songs".to_string(),
            vec![song("known", "Alpha"), song("fresh", "Alpha")],
        );

        let candidates = service(mock)
            .category(RecommendationCategory::Similar, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "fresh");
        assert_eq!(candidates[0].confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_similar_skipped_songs_never_seed() {
        let mock = Arc::new(MockCatalog::default());
        mock.related_songs
            .lock()
            .unwrap()
            .insert("skipped".to_string(), vec![song("x1", "X")]);

        let mut profile = profile();
        profile.songs.insert(
            "skipped".to_string(),
            SongSnapshot {
                artist: "Alpha".to_string(),
                genre: None,
                last_played_ms: 2_000,
                play_count: 3,
                completion_rate: 0.8,
                skip_rate: 0.5,
            },
        );

        let candidates = service(mock)
            .category(RecommendationCategory::Similar, &profile, false)
            .await;
        // Only "known" seeds; its related songs are empty and there is no
        // search data, so nothing comes back from the skipped seed.
        assert!(candidates.iter().all(|c| c.id != "x1"));
    }

    #[tokio::test]
    async fn test_empty_profile_still_gets_trending() {
        let mock = Arc::new(MockCatalog::default());
        mock.charts.lock().unwrap().push(song("t1", "T"));

        let batch = service(mock).generate(&UserProfile::default(), false).await;
        assert!(batch.artist_based.is_empty());
        assert!(batch.genre_based.is_empty());
        assert!(batch.similar.is_empty());
        assert_eq!(batch.trending.len(), 1);
        // Discovery falls back to trending too
        assert_eq!(batch.discovery.len(), 1);
    }

    #[tokio::test]
    async fn test_dedup_across_seeds() {
        let mock = Arc::new(MockCatalog::default());
        mock.top_songs
            .lock()
            .unwrap()
            .insert("Alpha".to_string(), vec![song("shared", "Alpha")]);
        mock.top_songs
            .lock()
            .unwrap()
            .insert("Beta".to_string(), vec![song("shared", "Alpha")]);

        let candidates = service(mock)
            .category(RecommendationCategory::ArtistBased, &profile(), false)
            .await;
        assert_eq!(candidates.len(), 1);
    }
}
