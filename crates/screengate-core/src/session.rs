//! 세션 범위 게이트 상태.
//!
//! 지문 캐시, 텍스트 이력, 소스별 상태 기계, 존재 확인 시각, 통계를 하나의 핸들이 소유한다.
//! 두 게이트는 같은 `Arc<GateSession>`을 공유하며, 수명 주기(`create`/`clear_all`/`dispose`)는
//! 이 핸들에 대한 명시적 호출로만 바뀐다.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CacheConfig, GateConfig};
use crate::error::CoreError;
use crate::models::frame::{FingerprintKey, FrameFingerprint};
use crate::models::telemetry::{FrameGateStatistics, TextGateStatistics};
use crate::models::text::{SourcePhase, TextHistoryEntry};
use crate::stats::{FrameGateStats, TextGateStats};
use crate::store::KeyedStore;

/// 게이트 세션 핸들
#[derive(Debug)]
pub struct GateSession {
    fingerprints: KeyedStore<FingerprintKey, FrameFingerprint>,
    text_history: KeyedStore<String, TextHistoryEntry>,
    source_phases: KeyedStore<String, SourcePhase>,
    presence: KeyedStore<String, DateTime<Utc>>,
    frame_stats: FrameGateStats,
    text_stats: TextGateStats,
    disposed: AtomicBool,
}

impl GateSession {
    /// 새 세션 생성
    pub fn create(config: &GateConfig) -> Arc<Self> {
        let window = config.statistics.timing_window;
        info!("게이트 세션 생성 (통계 창 {window})");
        Arc::new(Self {
            fingerprints: KeyedStore::new(),
            text_history: KeyedStore::new(),
            source_phases: KeyedStore::new(),
            presence: KeyedStore::new(),
            frame_stats: FrameGateStats::new(window),
            text_stats: TextGateStats::new(window),
            disposed: AtomicBool::new(false),
        })
    }

    /// 폐기된 세션이면 `SessionDisposed`
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        if self.is_disposed() {
            Err(CoreError::SessionDisposed)
        } else {
            Ok(())
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn fingerprints(&self) -> &KeyedStore<FingerprintKey, FrameFingerprint> {
        &self.fingerprints
    }

    pub fn text_history(&self) -> &KeyedStore<String, TextHistoryEntry> {
        &self.text_history
    }

    pub fn source_phases(&self) -> &KeyedStore<String, SourcePhase> {
        &self.source_phases
    }

    pub fn presence(&self) -> &KeyedStore<String, DateTime<Utc>> {
        &self.presence
    }

    pub fn frame_stats(&self) -> &FrameGateStats {
        &self.frame_stats
    }

    pub fn text_stats(&self) -> &TextGateStats {
        &self.text_stats
    }

    // ── 지연 만료 ─────────────────────────────────────────

    /// 만료되지 않은 지문 조회. 만료된 항목은 제거하고 `None`
    pub fn fresh_fingerprint(
        &self,
        key: &FingerprintKey,
        cache: &CacheConfig,
        now: DateTime<Utc>,
    ) -> Option<FrameFingerprint> {
        let fingerprint = self.fingerprints.get(key)?;
        if is_expired(fingerprint.captured_at, cache, now) {
            debug!(
                "만료된 지문 제거: {} stage={}",
                key.context_id,
                key.stage.number()
            );
            self.fingerprints.remove(key);
            return None;
        }
        Some(fingerprint)
    }

    /// 지문 저장. 저장소가 힌트를 넘으면 만료 항목을 정리한다
    pub fn store_fingerprint(
        &self,
        key: FingerprintKey,
        fingerprint: FrameFingerprint,
        cache: &CacheConfig,
    ) {
        self.fingerprints.insert(key, fingerprint);
        if self.fingerprints.len() > cache.max_entries_hint {
            self.purge_expired(cache, Utc::now());
        }
    }

    /// 만료되지 않은 텍스트 이력 조회. 만료된 항목은 제거하고 `None`
    pub fn fresh_history(
        &self,
        source_id: &str,
        cache: &CacheConfig,
        now: DateTime<Utc>,
    ) -> Option<TextHistoryEntry> {
        let entry = self.text_history.get(source_id)?;
        if is_expired(entry.last_confirmed_at, cache, now) {
            debug!("만료된 텍스트 이력 제거: {source_id}");
            self.text_history.remove(source_id);
            return None;
        }
        Some(entry)
    }

    /// 텍스트 이력 저장. 저장소가 힌트를 넘으면 만료 항목을 정리한다
    pub fn store_history(&self, entry: TextHistoryEntry, cache: &CacheConfig) {
        self.text_history.insert(entry.source_id.clone(), entry);
        if self.text_history.len() > cache.max_entries_hint {
            self.purge_expired(cache, Utc::now());
        }
    }

    /// 만료된 지문/이력 일괄 제거, 제거 수 반환
    pub fn purge_expired(&self, cache: &CacheConfig, now: DateTime<Utc>) -> usize {
        if cache.expiration_minutes == 0 {
            return 0;
        }
        let removed = self
            .fingerprints
            .retain(|_, fp| !is_expired(fp.captured_at, cache, now))
            + self
                .text_history
                .retain(|_, entry| !is_expired(entry.last_confirmed_at, cache, now));
        if removed > 0 {
            debug!("만료 항목 {removed}개 정리");
        }
        removed
    }

    // ── 수명 주기 ─────────────────────────────────────────

    /// 한 컨텍스트의 지문만 제거 (캡처 영역 종료)
    pub fn clear_context(&self, context_id: &str) -> usize {
        self.fingerprints.retain(|key, _| key.context_id != context_id)
    }

    /// 세션 경계: 모든 지문, 이력, 상태 기계, 존재 확인 시각 제거
    pub fn clear_all(&self) {
        self.fingerprints.clear();
        self.text_history.clear();
        self.source_phases.clear();
        self.presence.clear();
        info!("게이트 세션 상태 전체 초기화");
    }

    /// 세션 폐기. 이후 게이트 호출은 `SessionDisposed`로 실패한다
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.clear_all();
        info!("게이트 세션 폐기");
    }

    pub fn reset_statistics(&self) {
        self.frame_stats.reset();
        self.text_stats.reset();
    }

    // ── 통계 스냅샷 ──────────────────────────────────────

    pub fn frame_statistics(&self) -> FrameGateStatistics {
        self.frame_stats.snapshot(self.fingerprints.len())
    }

    pub fn text_statistics(&self) -> TextGateStatistics {
        let static_sources = self
            .source_phases
            .count_where(|phase| phase.static_marker().is_some());
        let active_reveals = self.source_phases.count_where(SourcePhase::is_revealing);
        self.text_stats
            .snapshot(static_sources, active_reveals, self.text_history.len())
    }
}

fn is_expired(at: DateTime<Utc>, cache: &CacheConfig, now: DateTime<Utc>) -> bool {
    cache
        .ttl()
        .is_some_and(|ttl| now.signed_duration_since(at) > ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::frame::{CascadeStage, HashAlgorithm};

    fn fingerprint(context_id: &str, at: DateTime<Utc>) -> FrameFingerprint {
        FrameFingerprint {
            context_id: context_id.to_string(),
            algorithm: HashAlgorithm::Average,
            hash_value: 0xFF,
            captured_at: at,
        }
    }

    fn history(source_id: &str, at: DateTime<Utc>) -> TextHistoryEntry {
        TextHistoryEntry {
            source_id: source_id.to_string(),
            raw_text: "hello".to_string(),
            normalized_text: "hello".to_string(),
            last_confirmed_at: at,
        }
    }

    #[test]
    fn dispose_rejects_later_calls() {
        let session = GateSession::create(&GateConfig::default());
        assert!(session.ensure_active().is_ok());

        session.presence().insert("S1".to_string(), Utc::now());
        session.dispose();

        assert!(matches!(
            session.ensure_active(),
            Err(CoreError::SessionDisposed)
        ));
        assert!(session.presence().is_empty());
    }

    #[test]
    fn expired_entries_are_treated_as_absent() {
        let session = GateSession::create(&GateConfig::default());
        let cache = CacheConfig::default();
        let now = Utc::now();
        let old = now - chrono::Duration::minutes(31);

        let key = FingerprintKey::new("ctx", CascadeStage::QuickFilter, HashAlgorithm::Average);
        session.store_fingerprint(key.clone(), fingerprint("ctx", old), &cache);
        session.store_history(history("S1", old), &cache);

        assert!(session.fresh_fingerprint(&key, &cache, now).is_none());
        assert!(session.fresh_history("S1", &cache, now).is_none());
        // 만료 항목은 조회 시 제거됨
        assert!(session.fingerprints().is_empty());
        assert!(session.text_history().is_empty());
    }

    #[test]
    fn zero_expiration_disables_expiry() {
        let session = GateSession::create(&GateConfig::default());
        let cache = CacheConfig {
            expiration_minutes: 0,
            ..CacheConfig::default()
        };
        let now = Utc::now();
        session.store_history(history("S1", now - chrono::Duration::days(30)), &cache);

        assert!(session.fresh_history("S1", &cache, now).is_some());
        assert_eq!(session.purge_expired(&cache, now), 0);
    }

    #[test]
    fn exceeding_hint_purges_expired_entries() {
        let session = GateSession::create(&GateConfig::default());
        let cache = CacheConfig {
            expiration_minutes: 1,
            max_entries_hint: 2,
        };
        let old = Utc::now() - chrono::Duration::minutes(10);
        session.store_history(history("a", old), &cache);
        session.store_history(history("b", old), &cache);
        assert_eq!(session.text_history().len(), 2);

        session.store_history(history("c", Utc::now()), &cache);
        assert_eq!(session.text_history().len(), 1);
        assert!(session.text_history().contains_key("c"));
    }

    #[test]
    fn clear_context_only_touches_that_context() {
        let session = GateSession::create(&GateConfig::default());
        let cache = CacheConfig::default();
        let now = Utc::now();
        for ctx in ["left", "right"] {
            for stage in [CascadeStage::QuickFilter, CascadeStage::MediumPrecision] {
                let key = FingerprintKey::new(ctx, stage, HashAlgorithm::Difference);
                session.store_fingerprint(key, fingerprint(ctx, now), &cache);
            }
        }

        assert_eq!(session.clear_context("left"), 2);
        assert_eq!(session.fingerprints().len(), 2);
        assert_eq!(session.frame_statistics().cached_fingerprints, 2);
    }

    #[test]
    fn text_statistics_count_phases() {
        let session = GateSession::create(&GateConfig::default());
        session.source_phases().insert(
            "menu".to_string(),
            SourcePhase::StaticLocked {
                marker: "file".to_string(),
            },
        );
        session
            .source_phases()
            .insert("dialog".to_string(), SourcePhase::Growing { growth_cycles: 2 });
        session
            .source_phases()
            .insert("idle".to_string(), SourcePhase::seeded());

        let stats = session.text_statistics();
        assert_eq!(stats.static_sources, 1);
        assert_eq!(stats.active_reveals, 1);

        session.clear_all();
        assert_eq!(session.text_statistics().static_sources, 0);
    }
}
