use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::db::{CacheRow, Database};

use super::api::EpisodeApi;
use super::episode::EpisodeDetail;

/// Cache-first episode lookup. Entries younger than `revalidate_after` are
/// served as is; older ones are refetched, falling back to the stale copy
/// when the API cannot be reached.
pub(crate) struct Catalog<'a> {
    db: &'a Database,
    api: EpisodeApi,
    revalidate_after: Duration,
    offline: bool,
}

enum Lookup<T> {
    Fresh(T),
    Stale(T),
    Missing,
}

impl<'a> Catalog<'a> {
    pub(crate) fn new(
        db: &'a Database,
        api: EpisodeApi,
        revalidate_after: Duration,
        offline: bool,
    ) -> Self {
        Self {
            db,
            api,
            revalidate_after,
            offline,
        }
    }

    pub(crate) fn api(&self) -> &EpisodeApi {
        &self.api
    }

    pub(crate) fn is_offline(&self) -> bool {
        self.offline
    }

    pub(crate) fn episode(&self, id: &str) -> Result<EpisodeDetail> {
        let cached = self.lookup_episode(id)?;
        match cached {
            Lookup::Fresh(episode) => Ok(episode),
            Lookup::Stale(episode) if self.offline => Ok(episode),
            Lookup::Missing if self.offline => {
                Err(anyhow!("episode {id} is not cached (offline mode)"))
            }
            Lookup::Stale(stale) => match self.api.fetch_episode(id) {
                Ok(episode) => {
                    self.store_episode(&episode)?;
                    Ok(episode)
                }
                Err(err) => {
                    warn!("serving cached episode {id}, refresh failed: {err:#}");
                    Ok(stale)
                }
            },
            Lookup::Missing => {
                let episode = self.api.fetch_episode(id)?;
                self.store_episode(&episode)?;
                Ok(episode)
            }
        }
    }

    /// Newest `limit` episodes, newest first.
    pub(crate) fn latest(&self, limit: usize) -> Result<Vec<EpisodeDetail>> {
        let key = listing_key(limit);
        match self.lookup_listing(&key)? {
            Lookup::Fresh(episodes) => Ok(episodes),
            Lookup::Stale(episodes) if self.offline => Ok(episodes),
            Lookup::Missing if self.offline => Ok(Vec::new()),
            Lookup::Stale(stale) => match self.refresh_listing(limit) {
                Ok(episodes) => Ok(episodes),
                Err(err) => {
                    warn!("serving cached listing {key}, refresh failed: {err:#}");
                    Ok(stale)
                }
            },
            Lookup::Missing => self.refresh_listing(limit),
        }
    }

    /// Fetches the newest `limit` episodes regardless of cache age.
    pub(crate) fn warm(&self, limit: usize) -> Result<Vec<EpisodeDetail>> {
        if self.offline {
            return Err(anyhow!("cannot warm the cache in offline mode"));
        }
        self.refresh_listing(limit)
    }

    pub(crate) fn store_episode(&self, episode: &EpisodeDetail) -> Result<()> {
        self.store_episode_at(episode, &Utc::now().to_rfc3339())
    }

    fn store_episode_at(&self, episode: &EpisodeDetail, fetched_at: &str) -> Result<()> {
        let payload = serde_json::to_string(episode)
            .with_context(|| format!("failed to encode episode {}", episode.id))?;
        self.db.upsert_episode(&episode.id, &payload, fetched_at)
    }

    /// Records a listing fetched elsewhere, e.g. on a background thread.
    pub(crate) fn store_listing(&self, limit: usize, episodes: &[EpisodeDetail]) -> Result<()> {
        let fetched_at = Utc::now().to_rfc3339();
        for episode in episodes {
            self.store_episode_at(episode, &fetched_at)?;
        }
        let ids = episodes.iter().map(|e| e.id.as_str()).collect::<Vec<_>>();
        let ids_json = serde_json::to_string(&ids).context("failed to encode listing")?;
        self.db
            .upsert_listing(&listing_key(limit), &ids_json, &fetched_at)?;
        info!("cached {} episode(s) for the latest listing", episodes.len());
        Ok(())
    }

    fn refresh_listing(&self, limit: usize) -> Result<Vec<EpisodeDetail>> {
        let episodes = self.api.list_episodes(limit)?;
        self.store_listing(limit, &episodes)?;
        Ok(episodes)
    }

    fn lookup_episode(&self, id: &str) -> Result<Lookup<EpisodeDetail>> {
        let Some(row) = self.db.cached_episode(id)? else {
            return Ok(Lookup::Missing);
        };
        let Some(episode) = decode_episode(&row) else {
            warn!("discarding unreadable cache entry for episode {id}");
            return Ok(Lookup::Missing);
        };
        Ok(self.classify(&row, episode))
    }

    fn lookup_listing(&self, key: &str) -> Result<Lookup<Vec<EpisodeDetail>>> {
        let Some(row) = self.db.cached_listing(key)? else {
            return Ok(Lookup::Missing);
        };
        let Ok(ids) = serde_json::from_str::<Vec<String>>(&row.payload) else {
            warn!("discarding unreadable cached listing {key}");
            return Ok(Lookup::Missing);
        };

        let mut episodes = Vec::with_capacity(ids.len());
        for id in &ids {
            let cached = self.db.cached_episode(id)?;
            match cached.as_ref().and_then(decode_episode) {
                Some(episode) => episodes.push(episode),
                // Listing entries whose episode row is gone cannot be served.
                None if self.offline => continue,
                None => return Ok(Lookup::Missing),
            }
        }
        Ok(self.classify(&row, episodes))
    }

    fn classify<T>(&self, row: &CacheRow, value: T) -> Lookup<T> {
        if is_fresh(&row.fetched_at, Utc::now(), self.revalidate_after) {
            Lookup::Fresh(value)
        } else {
            Lookup::Stale(value)
        }
    }
}

pub(crate) fn listing_key(limit: usize) -> String {
    format!("latest:{limit}")
}

fn decode_episode(row: &CacheRow) -> Option<EpisodeDetail> {
    serde_json::from_str(&row.payload).ok()
}

pub(crate) fn is_fresh(fetched_at: &str, now: DateTime<Utc>, revalidate_after: Duration) -> bool {
    let Ok(fetched) = DateTime::parse_from_rfc3339(fetched_at) else {
        return false;
    };
    let age = now.signed_duration_since(fetched.with_timezone(&Utc));
    match age.to_std() {
        Ok(age) => age < revalidate_after,
        // Timestamps from the future count as fresh.
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::http::RetryPolicy;
    use crate::http::test_server::{Behavior, TestServer};

    const DAY: Duration = Duration::from_secs(86_400);

    fn db() -> Database {
        let db = Database::open_in_memory().expect("in-memory db");
        db.migrate().expect("migrate");
        db
    }

    fn api(base_url: &str) -> EpisodeApi {
        EpisodeApi::new(
            base_url,
            RetryPolicy {
                connect_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(200),
                attempts: 1,
                retry_delay: Duration::from_millis(1),
            },
        )
    }

    fn detail(id: &str, title: &str) -> EpisodeDetail {
        EpisodeDetail {
            id: id.to_string(),
            title: title.to_string(),
            members: "Hosts".to_string(),
            thumbnail: String::new(),
            published_at: "8 jan 21".to_string(),
            duration: 60,
            duration_as_string: "00:01:00".to_string(),
            description: String::new(),
            url: format!("https://cdn.example.test/{id}.mp3"),
        }
    }

    fn raw_json(id: &str, title: &str) -> String {
        format!(
            r#"{{"id":"{id}","title":"{title}","members":"Hosts","published_at":"2021-01-08 17:00:00","file":{{"url":"https://cdn.example.test/{id}.mp3","duration":60}}}}"#
        )
    }

    fn days_ago(days: i64) -> String {
        (Utc::now() - ChronoDuration::days(days)).to_rfc3339()
    }

    #[test]
    fn freshness_window() {
        let now = Utc::now();
        let recent = (now - ChronoDuration::hours(23)).to_rfc3339();
        let old = (now - ChronoDuration::hours(25)).to_rfc3339();
        let future = (now + ChronoDuration::hours(1)).to_rfc3339();
        assert!(is_fresh(&recent, now, DAY));
        assert!(!is_fresh(&old, now, DAY));
        assert!(is_fresh(&future, now, DAY));
        assert!(!is_fresh("yesterday", now, DAY));
    }

    #[test]
    fn fresh_episode_is_served_without_a_request() {
        let server = TestServer::spawn(Vec::new());
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);
        catalog
            .store_episode_at(&detail("ep-1", "Cached"), &days_ago(0))
            .expect("store");

        let episode = catalog.episode("ep-1").expect("served from cache");

        assert_eq!(episode.title, "Cached");
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn stale_episode_is_revalidated() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, raw_json("ep-1", "Fresh"))]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);
        catalog
            .store_episode_at(&detail("ep-1", "Old"), &days_ago(2))
            .expect("store");

        let episode = catalog.episode("ep-1").expect("refetched");

        assert_eq!(episode.title, "Fresh");
        assert_eq!(server.request_count(), 1);
        let row = db.cached_episode("ep-1").expect("query").expect("row");
        assert!(is_fresh(&row.fetched_at, Utc::now(), DAY));
    }

    #[test]
    fn stale_episode_survives_a_failed_refresh() {
        let server = TestServer::spawn(vec![Behavior::Respond(500, "boom".to_string())]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);
        catalog
            .store_episode_at(&detail("ep-1", "Old"), &days_ago(2))
            .expect("store");

        let episode = catalog.episode("ep-1").expect("stale copy served");

        assert_eq!(episode.title, "Old");
    }

    #[test]
    fn missing_episode_fetch_failure_is_an_error() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, "{}".to_string())]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);

        let err = catalog.episode("nope").expect_err("nothing to serve");
        assert!(format!("{err:#}").contains("HTTP status 404"));
    }

    #[test]
    fn offline_never_fetches() {
        let server = TestServer::spawn(Vec::new());
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, true);
        catalog
            .store_episode_at(&detail("ep-1", "Old"), &days_ago(30))
            .expect("store");

        assert_eq!(catalog.episode("ep-1").expect("stale ok").title, "Old");
        assert!(catalog.episode("ep-2").is_err());
        assert!(catalog.latest(2).expect("empty listing").is_empty());
        assert!(catalog.warm(2).is_err());
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn latest_caches_listing_and_episodes() {
        let body = format!("[{},{}]", raw_json("b", "Second"), raw_json("a", "First"));
        let server = TestServer::spawn(vec![Behavior::Respond(200, body)]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);

        let first = catalog.latest(2).expect("fetched");
        let second = catalog.latest(2).expect("cached");

        let ids = |episodes: &[EpisodeDetail]| {
            episodes.iter().map(|e| e.id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(first.as_slice()), ["b", "a"]);
        assert_eq!(ids(second.as_slice()), ["b", "a"]);
        assert_eq!(server.request_count(), 1);
        assert!(db.cached_episode("a").expect("query").is_some());
    }

    #[test]
    fn listing_with_evicted_episode_is_refetched() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            200,
            format!("[{}]", raw_json("a", "First")),
        )]);
        let db = db();
        db.upsert_listing(&listing_key(1), "[\"gone\"]", &days_ago(0))
            .expect("listing");
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);

        let episodes = catalog.latest(1).expect("refetched");

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].id, "a");
        assert_eq!(server.request_count(), 1);
    }

    fn store_stale_listing(catalog: &Catalog<'_>, db: &Database) {
        catalog
            .store_episode_at(&detail("a", "Old"), &days_ago(3))
            .expect("store episode");
        db.upsert_listing(&listing_key(1), "[\"a\"]", &days_ago(3))
            .expect("store listing");
    }

    #[test]
    fn stale_listing_is_revalidated() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            200,
            format!("[{}]", raw_json("a", "Fresh")),
        )]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);
        store_stale_listing(&catalog, &db);

        let episodes = catalog.latest(1).expect("refreshed");

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "Fresh");
        assert_eq!(server.request_count(), 1);
        let row = db
            .cached_listing(&listing_key(1))
            .expect("query")
            .expect("row");
        assert!(is_fresh(&row.fetched_at, Utc::now(), DAY));
    }

    #[test]
    fn stale_listing_survives_a_failed_refresh() {
        let server = TestServer::spawn(vec![Behavior::Respond(500, "boom".to_string())]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);
        store_stale_listing(&catalog, &db);

        let episodes = catalog.latest(1).expect("stale listing served");

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "Old");
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn offline_serves_stale_listing() {
        let server = TestServer::spawn(Vec::new());
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, true);
        store_stale_listing(&catalog, &db);

        let episodes = catalog.latest(1).expect("cached listing");

        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].title, "Old");
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn warm_forces_a_refresh() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, format!("[{}]", raw_json("a", "First"))),
            Behavior::Respond(200, format!("[{}]", raw_json("a", "Renamed"))),
        ]);
        let db = db();
        let catalog = Catalog::new(&db, api(&server.base_url), DAY, false);

        catalog.warm(1).expect("first warm");
        let episodes = catalog.warm(1).expect("second warm");

        assert_eq!(episodes[0].title, "Renamed");
        assert_eq!(server.request_count(), 2);
    }
}
