//! # Analysis Cache Module
//!
//! ## Purpose
//! Content-addressed persistent cache for completion-service analyses, so
//! byte-identical inputs across runs reuse the same analysis instead of
//! paying for a new completion call.
//!
//! ## Input/Output Specification
//! - **Input**: Content hashes and analysis payloads
//! - **Output**: Cached payload retrieval, cache statistics, maintenance ops
//! - **Storage**: One JSON index file mapping hash to entry metadata, plus
//!   one content file per hash (optionally gzip-compressed)
//!
//! ## Key Features
//! - Deterministic SHA-256 addressing over case/whitespace-normalized text
//! - 24h TTL with lazy purge on access (expired entries are logical misses)
//! - Capacity bound with LRU-batch eviction: the least-recently-accessed
//!   10% is removed in one batch before an insert would exceed capacity
//! - Self-healing: an index entry whose content file is missing is treated
//!   as corruption and purged on access
//!
//! Concurrent runs writing the same hash race on the index file; the result
//! is last-writer-wins, not a correctness guarantee. Distinct hashes are
//! safe by construction (distinct content files).

use crate::config::CacheConfig;
use crate::errors::Result;
use crate::AnalysisKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

const INDEX_FILE: &str = "index.json";

/// Index metadata for one cache entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    pub cached_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub hit_count: u64,
    pub size_bytes: u64,
}

/// Cache statistics for maintenance tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub total_hits: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Content-addressed analysis cache
pub struct CacheStore {
    config: CacheConfig,
    index_path: PathBuf,
    index: Mutex<HashMap<String, CacheEntryMeta>>,
}

impl CacheStore {
    /// Open (or create) a cache rooted at the configured directory
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.directory).await?;

        let index_path = config.directory.join(INDEX_FILE);
        let index = match tokio::fs::read(&index_path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    tracing::warn!("Cache index unreadable, starting empty: {}", e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        tracing::info!(
            "Analysis cache opened at {:?} with {} entries",
            config.directory,
            index.len()
        );

        Ok(Self {
            config: config.clone(),
            index_path,
            index: Mutex::new(index),
        })
    }

    /// Deterministic content hash of `(normalized text, analysis kind)`
    ///
    /// The text is case-folded and whitespace-collapsed first so trivially
    /// different renditions of the same content share one entry.
    pub fn content_hash(text: &str, kind: AnalysisKind) -> String {
        let folded = text
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let mut hasher = Sha256::new();
        hasher.update(folded.as_bytes());
        hasher.update(b"\x00");
        hasher.update(kind.as_str().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Look up a payload; expired or corrupted entries are purged and
    /// reported as misses
    pub async fn get(&self, hash: &str) -> Result<Option<String>> {
        let mut index = self.index.lock().await;

        let Some(meta) = index.get(hash).cloned() else {
            return Ok(None);
        };

        let ttl = Duration::hours(self.config.ttl_hours);
        if Utc::now() - meta.cached_at > ttl {
            tracing::debug!("Cache entry {} expired, purging", hash);
            index.remove(hash);
            let _ = tokio::fs::remove_file(self.content_path(hash)).await;
            self.persist_index(&index).await?;
            return Ok(None);
        }

        let payload = match tokio::fs::read(self.content_path(hash)).await {
            Ok(bytes) => self.decode_payload(&bytes),
            Err(e) => {
                tracing::warn!(
                    "Cache corruption for {}: content file unreadable ({}), purging",
                    hash,
                    e
                );
                index.remove(hash);
                self.persist_index(&index).await?;
                return Ok(None);
            }
        };

        let Some(payload) = payload else {
            tracing::warn!("Cache corruption for {}: undecodable content, purging", hash);
            index.remove(hash);
            let _ = tokio::fs::remove_file(self.content_path(hash)).await;
            self.persist_index(&index).await?;
            return Ok(None);
        };

        if let Some(meta) = index.get_mut(hash) {
            meta.last_accessed_at = Utc::now();
            meta.hit_count += 1;
        }
        self.persist_index(&index).await?;

        Ok(Some(payload))
    }

    /// Insert a payload, enforcing the capacity bound first
    pub async fn put(&self, hash: &str, payload: &str) -> Result<()> {
        let mut index = self.index.lock().await;

        if !index.contains_key(hash) && index.len() >= self.config.max_entries {
            self.evict_batch(&mut index).await;
        }

        let encoded = self.encode_payload(payload)?;
        let size_bytes = encoded.len() as u64;
        tokio::fs::write(self.content_path(hash), encoded).await?;

        let now = Utc::now();
        index.insert(
            hash.to_string(),
            CacheEntryMeta {
                cached_at: now,
                last_accessed_at: now,
                hit_count: 0,
                size_bytes,
            },
        );
        self.persist_index(&index).await?;

        tracing::debug!("Cached analysis {} ({} bytes)", hash, size_bytes);
        Ok(())
    }

    /// Evict the least-recently-accessed slice of entries in one batch
    async fn evict_batch(&self, index: &mut HashMap<String, CacheEntryMeta>) {
        let batch_size =
            ((index.len() * self.config.eviction_percent as usize).div_ceil(100)).max(1);

        let mut by_recency: Vec<(String, DateTime<Utc>)> = index
            .iter()
            .map(|(hash, meta)| (hash.clone(), meta.last_accessed_at))
            .collect();
        by_recency.sort_by_key(|(_, accessed)| *accessed);

        for (hash, _) in by_recency.into_iter().take(batch_size) {
            index.remove(&hash);
            let _ = tokio::fs::remove_file(self.content_path(&hash)).await;
        }

        tracing::info!("Evicted {} least-recently-accessed cache entries", batch_size);
    }

    /// Cache statistics for the maintenance CLI
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            total_entries: index.len(),
            total_size_bytes: index.values().map(|m| m.size_bytes).sum(),
            total_hits: index.values().map(|m| m.hit_count).sum(),
            oldest_entry: index.values().map(|m| m.cached_at).min(),
            newest_entry: index.values().map(|m| m.cached_at).max(),
        }
    }

    /// Remove all entries and content files
    pub async fn clear(&self) -> Result<()> {
        let mut index = self.index.lock().await;
        for hash in index.keys().cloned().collect::<Vec<_>>() {
            let _ = tokio::fs::remove_file(self.content_path(&hash)).await;
        }
        index.clear();
        self.persist_index(&index).await?;
        tracing::info!("Analysis cache cleared");
        Ok(())
    }

    /// Flush the index to disk
    pub async fn close(&self) -> Result<()> {
        let index = self.index.lock().await;
        self.persist_index(&index).await
    }

    fn content_path(&self, hash: &str) -> PathBuf {
        self.config.directory.join(format!("{}.bin", hash))
    }

    async fn persist_index(&self, index: &HashMap<String, CacheEntryMeta>) -> Result<()> {
        // Last-writer-wins when concurrent runs share a hash
        let bytes = serde_json::to_vec_pretty(index)?;
        tokio::fs::write(&self.index_path, bytes).await?;
        Ok(())
    }

    fn encode_payload(&self, payload: &str) -> Result<Vec<u8>> {
        if self.config.enable_compression {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(payload.as_bytes())?;
            Ok(encoder.finish()?)
        } else {
            Ok(payload.as_bytes().to_vec())
        }
    }

    fn decode_payload(&self, bytes: &[u8]) -> Option<String> {
        if self.config.enable_compression {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut out = String::new();
            decoder.read_to_string(&mut out).ok()?;
            Some(out)
        } else {
            String::from_utf8(bytes.to_vec()).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, max_entries: usize, ttl_hours: i64) -> CacheConfig {
        CacheConfig {
            directory: dir.path().to_path_buf(),
            max_entries,
            ttl_hours,
            eviction_percent: 10,
            enable_compression: true,
        }
    }

    #[tokio::test]
    async fn test_put_then_get_returns_payload_unchanged() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(&test_config(&dir, 100, 24)).await.unwrap();

        let hash = CacheStore::content_hash("texto do processo", AnalysisKind::ShortSummary);
        cache.put(&hash, "resumo gerado").await.unwrap();
        let got = cache.get(&hash).await.unwrap();
        assert_eq!(got.as_deref(), Some("resumo gerado"));
    }

    #[tokio::test]
    async fn test_miss_on_unknown_hash() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(&test_config(&dir, 100, 24)).await.unwrap();
        assert!(cache.get("deadbeef").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        // Zero-hour TTL: every entry is immediately expired
        let cache = CacheStore::open(&test_config(&dir, 100, 0)).await.unwrap();

        let hash = CacheStore::content_hash("texto", AnalysisKind::Chronology);
        cache.put(&hash, "cronologia").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(cache.get(&hash).await.unwrap().is_none());
        // Lazily purged from the index as well
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_capacity_bound_with_lru_batch_eviction() {
        let dir = TempDir::new().unwrap();
        let max = 10;
        let cache = CacheStore::open(&test_config(&dir, max, 24)).await.unwrap();

        for i in 0..max {
            cache.put(&format!("hash-{:02}", i), "payload").await.unwrap();
        }
        // Touch the oldest entry so it is no longer the LRU victim
        cache.get("hash-00").await.unwrap().unwrap();

        cache.put("hash-overflow", "payload").await.unwrap();

        let stats = cache.stats().await;
        assert!(stats.total_entries <= max);
        // hash-01 was the least recently accessed; hash-00 survived its turn
        assert!(cache.get("hash-00").await.unwrap().is_some());
        assert!(cache.get("hash-01").await.unwrap().is_none());
        assert!(cache.get("hash-overflow").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_content_file_is_purged_as_corruption() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(&test_config(&dir, 100, 24)).await.unwrap();

        cache.put("victim", "payload").await.unwrap();
        tokio::fs::remove_file(dir.path().join("victim.bin")).await.unwrap();

        assert!(cache.get("victim").await.unwrap().is_none());
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_index_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, 100, 24);
        {
            let cache = CacheStore::open(&config).await.unwrap();
            cache.put("persisted", "payload").await.unwrap();
            cache.close().await.unwrap();
        }
        let cache = CacheStore::open(&config).await.unwrap();
        assert_eq!(cache.get("persisted").await.unwrap().as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_hit_count_tracked() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(&test_config(&dir, 100, 24)).await.unwrap();
        cache.put("h", "p").await.unwrap();
        cache.get("h").await.unwrap();
        cache.get("h").await.unwrap();
        assert_eq!(cache.stats().await.total_hits, 2);
    }

    #[test]
    fn test_content_hash_normalizes_case_and_whitespace() {
        let a = CacheStore::content_hash("Texto  Do\nProcesso", AnalysisKind::ShortSummary);
        let b = CacheStore::content_hash("texto do processo", AnalysisKind::ShortSummary);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_hash_differs_per_kind() {
        let a = CacheStore::content_hash("texto", AnalysisKind::ShortSummary);
        let b = CacheStore::content_hash("texto", AnalysisKind::RiskAnalysis);
        assert_ne!(a, b);
    }
}
