use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::http::{RetryPolicy, get_json_text_with_retries};

use super::episode::{EpisodeDetail, duration_to_time_string, format_published_at};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEpisode {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) members: String,
    #[serde(default)]
    pub(crate) published_at: String,
    #[serde(default)]
    pub(crate) thumbnail: String,
    #[serde(default)]
    pub(crate) description: String,
    pub(crate) file: RawFile,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawFile {
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) duration: Value,
}

impl RawEpisode {
    pub(crate) fn into_detail(self) -> EpisodeDetail {
        let duration = duration_seconds(&self.file.duration);
        EpisodeDetail {
            id: self.id,
            title: self.title,
            members: self.members,
            thumbnail: self.thumbnail,
            published_at: format_published_at(&self.published_at),
            duration,
            duration_as_string: duration_to_time_string(duration),
            description: self.description,
            url: self.file.url,
        }
    }
}

/// Durations arrive as numbers or numeric strings; anything else counts as zero.
pub(crate) fn duration_seconds(value: &Value) -> u32 {
    let seconds = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    seconds
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.min(u32::MAX as f64) as u32)
        .unwrap_or(0)
}

pub(crate) fn parse_episode_list(raw: &str) -> Result<Vec<EpisodeDetail>> {
    let episodes: Vec<RawEpisode> =
        serde_json::from_str(raw).context("episode list is not a JSON array of episodes")?;
    Ok(episodes.into_iter().map(RawEpisode::into_detail).collect())
}

pub(crate) fn parse_episode(raw: &str) -> Result<EpisodeDetail> {
    let episode: RawEpisode =
        serde_json::from_str(raw).context("episode payload is not a JSON episode")?;
    Ok(episode.into_detail())
}

/// Client for the two calls the episode API offers.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeApi {
    base_url: String,
    policy: RetryPolicy,
}

impl EpisodeApi {
    pub(crate) fn new(base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub(crate) fn from_config(config: &Config) -> Self {
        Self::new(
            &config.api_url,
            RetryPolicy {
                connect_timeout: config.connect_timeout(),
                read_timeout: config.read_timeout(),
                attempts: config.attempts,
                retry_delay: config.retry_delay(),
            },
        )
    }

    /// Newest episodes first.
    pub(crate) fn list_episodes(&self, limit: usize) -> Result<Vec<EpisodeDetail>> {
        let url = format!("{}/episodes", self.base_url);
        let query = vec![
            ("_limit".to_string(), limit.to_string()),
            ("_sort".to_string(), "published_at".to_string()),
            ("_order".to_string(), "desc".to_string()),
        ];
        let body = get_json_text_with_retries(&url, &query, self.policy)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("failed to list episodes from {url}"))?;
        parse_episode_list(&body).with_context(|| format!("unexpected response from {url}"))
    }

    pub(crate) fn fetch_episode(&self, id: &str) -> Result<EpisodeDetail> {
        let url = format!("{}/episodes/{}", self.base_url, urlencoding::encode(id));
        let body = get_json_text_with_retries(&url, &[], self.policy)
            .map_err(|err| anyhow!(err))
            .with_context(|| format!("failed to fetch episode {id}"))?;
        parse_episode(&body).with_context(|| format!("unexpected response from {url}"))
    }
}
