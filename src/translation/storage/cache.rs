//! 翻译缓存模块
//!
//! 同一语言对内按原文记忆译文，语言对变化时整体清空。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::translation::config::constants;

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// 命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

struct CacheInner {
    entries: LruCache<String, String>,
    pair: Option<String>,
    stats: CacheStats,
}

/// 翻译缓存
pub struct TranslationCache {
    inner: Mutex<CacheInner>,
    enabled: bool,
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::with_capacity(constants::DEFAULT_CACHE_SIZE)
    }
}

impl TranslationCache {
    pub fn with_capacity(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                pair: None,
                stats: CacheStats::default(),
            }),
            enabled: true,
        }
    }

    /// 不做任何记忆的缓存
    pub fn disabled() -> Self {
        let mut cache = Self::with_capacity(1);
        cache.enabled = false;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 切换到新的语言对，语言对变化时清空全部条目
    ///
    /// 返回是否发生了清空。
    pub fn bind_pair(&self, source_lang: &str, target_lang: &str) -> bool {
        let key = format!("{}->{}", source_lang, target_lang);
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        if inner.pair.as_deref() == Some(key.as_str()) {
            return false;
        }
        let had_pair = inner.pair.is_some();
        inner.entries.clear();
        inner.stats.total_entries = 0;
        inner.pair = Some(key);
        if had_pair {
            tracing::debug!("语言对已变化，翻译缓存已清空");
        }
        had_pair
    }

    pub fn get(&self, text: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let mut inner = self.inner.lock().ok()?;
        inner.stats.total_requests += 1;
        let hit = inner.entries.get(text).cloned();
        if hit.is_some() {
            inner.stats.cache_hits += 1;
        } else {
            inner.stats.cache_misses += 1;
        }
        hit
    }

    pub fn insert(&self, original: String, translated: String) {
        if !self.enabled {
            return;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if let Some((evicted, _)) = inner.entries.push(original.clone(), translated) {
            if evicted != original {
                inner.stats.evictions += 1;
            }
        }
        inner.stats.total_entries = inner.entries.len();
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.stats.total_entries = 0;
        }
    }

    pub fn size(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn get_stats(&self) -> CacheStats {
        self.inner
            .lock()
            .map(|inner| inner.stats.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss_accounting() {
        let cache = TranslationCache::with_capacity(10);
        cache.bind_pair("en", "zh-Hans");
        cache.insert("Hello".to_string(), "你好".to_string());

        assert_eq!(cache.get("Hello").as_deref(), Some("你好"));
        assert_eq!(cache.get("World"), None);

        let stats = cache.get_stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_pair_change_clears() {
        let cache = TranslationCache::with_capacity(10);
        assert!(!cache.bind_pair("en", "zh-Hans"));
        cache.insert("Hello".to_string(), "你好".to_string());

        assert!(!cache.bind_pair("en", "zh-Hans"));
        assert_eq!(cache.size(), 1);

        assert!(cache.bind_pair("en", "ja"));
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.get("Hello"), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TranslationCache::with_capacity(2);
        cache.insert("a".to_string(), "1".to_string());
        cache.insert("b".to_string(), "2".to_string());
        cache.get("a");
        cache.insert("c".to_string(), "3".to_string());

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        assert_eq!(cache.get_stats().evictions, 1);
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let cache = TranslationCache::disabled();
        cache.insert("a".to_string(), "1".to_string());
        assert_eq!(cache.get("a"), None);
    }
}
