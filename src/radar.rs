//! Weather radar overlay frames.
//!
//! Frames are published every 10 minutes with some delay, so the newest
//! usable frame is looked up 10 minutes behind the current UTC time. Fetched
//! images are cached for 10 minutes. Nothing here touches the region query.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::RadarConfig;
use crate::error::RadarError;
use crate::models::GeoBbox;

/// Frame spacing and publication lag, in seconds
const FRAME_INTERVAL_SECS: i64 = 600;
const SAFETY_MARGIN_SECS: i64 = 600;

pub const CACHE_TTL: Duration = Duration::from_secs(600);

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// The two newest frame times at or before `now - 10 min`, newest first
pub fn frame_times(now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let latest = (now - TimeDelta::seconds(SAFETY_MARGIN_SECS)).timestamp();
    let aligned = latest - latest.rem_euclid(FRAME_INTERVAL_SECS);

    [aligned, aligned - FRAME_INTERVAL_SECS]
        .into_iter()
        .filter_map(|secs| DateTime::from_timestamp(secs, 0))
        .collect()
}

pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Fill `{timestamp}` in a frame URL template
pub fn frame_url(url_template: &str, time: &DateTime<Utc>) -> String {
    url_template.replace("{timestamp}", &format_timestamp(time))
}

#[derive(Debug, Clone)]
struct CachedImage {
    fetched_at: Instant,
    content_type: String,
    bytes: Vec<u8>,
}

/// Time-bounded cache of frame images keyed by timestamp
#[derive(Debug)]
pub struct RadarCache {
    ttl: Duration,
    entries: HashMap<String, CachedImage>,
}

impl RadarCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cached image and content type, if still fresh at `now`
    pub fn get(&mut self, key: &str, now: Instant) -> Option<(String, Vec<u8>)> {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < ttl);
        self.entries
            .get(key)
            .map(|entry| (entry.content_type.clone(), entry.bytes.clone()))
    }

    pub fn insert(&mut self, key: String, content_type: String, bytes: Vec<u8>, now: Instant) {
        self.entries.insert(
            key,
            CachedImage {
                fetched_at: now,
                content_type,
                bytes,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RadarCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

/// One radar image ready to overlay
#[derive(Debug, Clone)]
pub struct RadarFrame {
    pub timestamp: DateTime<Utc>,
    pub content_type: String,
    pub image: Vec<u8>,
    pub bbox: GeoBbox,
    pub opacity: f64,
}

/// Fetches radar frames with caching
pub struct RadarClient {
    client: Client,
    config: RadarConfig,
    cache: Mutex<RadarCache>,
}

impl RadarClient {
    pub fn new(config: RadarConfig) -> Result<Self, RadarError> {
        let client = Client::builder()
            .user_agent("wardmap/0.1 (radar overlay)")
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            config,
            cache: Mutex::new(RadarCache::default()),
        })
    }

    pub fn bbox(&self) -> GeoBbox {
        GeoBbox(self.config.bbox)
    }

    pub fn opacity(&self) -> f64 {
        self.config.opacity.clamp(0.0, 1.0)
    }

    pub async fn fetch_latest(&self) -> Result<RadarFrame, RadarError> {
        self.fetch_at(Utc::now()).await
    }

    /// Newest frame available relative to `now`
    pub async fn fetch_at(&self, now: DateTime<Utc>) -> Result<RadarFrame, RadarError> {
        for timestamp in frame_times(now) {
            match self.fetch_frame(&timestamp).await {
                Ok((content_type, image)) => {
                    return Ok(RadarFrame {
                        timestamp,
                        content_type,
                        image,
                        bbox: self.bbox(),
                        opacity: self.opacity(),
                    })
                }
                Err(e) => warn!("Radar frame {} failed: {}", format_timestamp(&timestamp), e),
            }
        }

        Err(RadarError::NoFrame)
    }

    async fn fetch_frame(&self, timestamp: &DateTime<Utc>) -> Result<(String, Vec<u8>), RadarError> {
        let key = format_timestamp(timestamp);

        if let Some(hit) = self.cache.lock().await.get(&key, Instant::now()) {
            debug!("Radar frame {} served from cache", key);
            return Ok(hit);
        }

        let url = frame_url(&self.config.url_template, timestamp);
        info!("Fetching radar frame {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RadarError::Unavailable {
                timestamp: key,
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        self.cache
            .lock()
            .await
            .insert(key, content_type.clone(), bytes.clone(), Instant::now());

        Ok((content_type, bytes))
    }

    /// Seed the cache, e.g. from a previous process
    pub async fn prime(&self, timestamp: &DateTime<Utc>, content_type: &str, image: Vec<u8>) {
        self.cache.lock().await.insert(
            format_timestamp(timestamp),
            content_type.to_string(),
            image,
            Instant::now(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config(url_template: &str) -> RadarConfig {
        RadarConfig {
            url_template: url_template.to_string(),
            bbox: [102.0, 17.0, 107.0, 21.0],
            opacity: 1.4,
        }
    }

    #[test]
    fn test_frame_times_aligned_and_lagged() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 37, 12).unwrap();
        let times = frame_times(now);
        assert_eq!(
            times,
            vec![
                Utc.with_ymd_and_hms(2024, 7, 1, 8, 20, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 7, 1, 8, 10, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_frame_times_on_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 0, 10, 0).unwrap();
        let times = frame_times(now);
        assert_eq!(times[0], Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
        assert_eq!(times[1], Utc.with_ymd_and_hms(2024, 6, 30, 23, 50, 0).unwrap());
    }

    #[test]
    fn test_frame_url() {
        let time = Utc.with_ymd_and_hms(2024, 7, 1, 8, 20, 0).unwrap();
        assert_eq!(
            frame_url("https://radar.example/nha_be/{timestamp}.png", &time),
            "https://radar.example/nha_be/202407010820.png"
        );
    }

    #[test]
    fn test_cache_expiry() {
        let mut cache = RadarCache::new(Duration::from_secs(600));
        let start = Instant::now();
        cache.insert("202407010820".into(), "image/png".into(), vec![1, 2, 3], start);

        let hit = cache.get("202407010820", start + Duration::from_secs(599));
        assert_eq!(hit, Some(("image/png".to_string(), vec![1, 2, 3])));

        assert!(cache
            .get("202407010820", start + Duration::from_secs(600))
            .is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_served_from_cache() {
        let client = RadarClient::new(config("http://127.0.0.1:9/{timestamp}.png")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 37, 12).unwrap();
        let newest = frame_times(now)[0];
        client.prime(&newest, "image/gif", vec![7, 7]).await;

        let frame = client.fetch_at(now).await.unwrap();
        assert_eq!(frame.timestamp, newest);
        assert_eq!(frame.content_type, "image/gif");
        assert_eq!(frame.image, vec![7, 7]);
        assert_eq!(frame.opacity, 1.0);
        assert_eq!(frame.bbox, GeoBbox::new(102.0, 17.0, 107.0, 21.0));
    }

    #[tokio::test]
    async fn test_falls_back_to_older_frame() {
        let client = RadarClient::new(config("http://127.0.0.1:9/{timestamp}.png")).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 8, 37, 12).unwrap();
        let older = frame_times(now)[1];
        client.prime(&older, "image/png", vec![1]).await;

        let frame = client.fetch_at(now).await.unwrap();
        assert_eq!(frame.timestamp, older);
    }
}
