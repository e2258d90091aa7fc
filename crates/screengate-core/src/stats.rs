//! 게이트 통계 수집기.
//!
//! 카운터는 원자 변수, 지연 시간은 최근 N개 샘플 이동 창으로 유지한다.
//! `snapshot()`으로 직렬화 가능한 텔레메트리 모델을 만든다.

use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::frame::CascadeStage;
use crate::models::telemetry::{FrameGateStatistics, TextGateStatistics};
use crate::models::text::TextDecisionReason;

/// 고정 크기 지연 시간 이동 창
#[derive(Debug)]
pub struct RollingWindow {
    samples: Mutex<VecDeque<Duration>>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, sample: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// 평균 (샘플이 없으면 0)
    pub fn average(&self) -> Duration {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return Duration::ZERO;
        }
        samples.iter().sum::<Duration>() / samples.len() as u32
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

/// 이미지 게이트 통계
#[derive(Debug)]
pub struct FrameGateStats {
    total_frames: AtomicU64,
    filtered: [AtomicU64; 3],
    changed_frames: AtomicU64,
    first_frames: AtomicU64,
    fail_open: AtomicU64,
    cache_lookups: AtomicU64,
    cache_hits: AtomicU64,
    stage_timings: [RollingWindow; 3],
}

impl FrameGateStats {
    pub fn new(window: usize) -> Self {
        Self {
            total_frames: AtomicU64::new(0),
            filtered: Default::default(),
            changed_frames: AtomicU64::new(0),
            first_frames: AtomicU64::new(0),
            fail_open: AtomicU64::new(0),
            cache_lookups: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            stage_timings: [
                RollingWindow::new(window),
                RollingWindow::new(window),
                RollingWindow::new(window),
            ],
        }
    }

    pub fn record_frame(&self) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// 해당 단계에서 "변경 없음"으로 걸러짐
    pub fn record_filtered(&self, stage: CascadeStage) {
        self.filtered[stage.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_changed(&self) {
        self.changed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_first_frame(&self) {
        self.first_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fail_open(&self) {
        self.fail_open.fetch_add(1, Ordering::Relaxed);
    }

    /// Stage 1 캐시 조회 결과
    pub fn record_cache_lookup(&self, hit: bool) {
        self.cache_lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_stage_time(&self, stage: CascadeStage, elapsed: Duration) {
        self.stage_timings[stage.index()].record(elapsed);
    }

    /// 현재 통계 스냅샷
    pub fn snapshot(&self, cached_fingerprints: usize) -> FrameGateStatistics {
        let total = self.total_frames.load(Ordering::Relaxed);
        let filtered: [u64; 3] = [
            self.filtered[0].load(Ordering::Relaxed),
            self.filtered[1].load(Ordering::Relaxed),
            self.filtered[2].load(Ordering::Relaxed),
        ];
        let lookups = self.cache_lookups.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);

        FrameGateStatistics {
            total_frames: total,
            stage1_filtered: filtered[0],
            stage2_filtered: filtered[1],
            stage3_filtered: filtered[2],
            changed_frames: self.changed_frames.load(Ordering::Relaxed),
            first_frames: self.first_frames.load(Ordering::Relaxed),
            fail_open_count: self.fail_open.load(Ordering::Relaxed),
            avg_stage_ms: [
                self.stage_timings[0].average().as_secs_f64() * 1_000.0,
                self.stage_timings[1].average().as_secs_f64() * 1_000.0,
                self.stage_timings[2].average().as_secs_f64() * 1_000.0,
            ],
            filtering_efficiency: ratio(filtered.iter().sum(), total),
            cache_hit_rate: ratio(hits, lookups),
            cached_fingerprints,
        }
    }

    pub fn reset(&self) {
        self.total_frames.store(0, Ordering::Relaxed);
        for counter in &self.filtered {
            counter.store(0, Ordering::Relaxed);
        }
        self.changed_frames.store(0, Ordering::Relaxed);
        self.first_frames.store(0, Ordering::Relaxed);
        self.fail_open.store(0, Ordering::Relaxed);
        self.cache_lookups.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        for window in &self.stage_timings {
            window.clear();
        }
    }
}

/// 텍스트 게이트 통계
#[derive(Debug)]
pub struct TextGateStats {
    total_checks: AtomicU64,
    translations: AtomicU64,
    by_reason: [AtomicU64; TextDecisionReason::COUNT],
    check_timings: RollingWindow,
}

impl TextGateStats {
    pub fn new(window: usize) -> Self {
        Self {
            total_checks: AtomicU64::new(0),
            translations: AtomicU64::new(0),
            by_reason: Default::default(),
            check_timings: RollingWindow::new(window),
        }
    }

    pub fn record_decision(&self, reason: TextDecisionReason, translated: bool, elapsed: Duration) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        if translated {
            self.translations.fetch_add(1, Ordering::Relaxed);
        }
        self.by_reason[reason.ordinal()].fetch_add(1, Ordering::Relaxed);
        self.check_timings.record(elapsed);
    }

    pub fn reason_count(&self, reason: TextDecisionReason) -> u64 {
        self.by_reason[reason.ordinal()].load(Ordering::Relaxed)
    }

    /// 현재 통계 스냅샷 (소스 집계값은 세션이 채워 넘긴다)
    pub fn snapshot(
        &self,
        static_sources: usize,
        active_reveals: usize,
        tracked_sources: usize,
    ) -> TextGateStatistics {
        let decisions_by_reason: BTreeMap<String, u64> = TextDecisionReason::ALL
            .iter()
            .map(|r| (r.as_str().to_string(), self.reason_count(*r)))
            .filter(|(_, count)| *count > 0)
            .collect();

        TextGateStatistics {
            total_checks: self.total_checks.load(Ordering::Relaxed),
            translations: self.translations.load(Ordering::Relaxed),
            decisions_by_reason,
            static_sources,
            active_reveals,
            tracked_sources,
            avg_check_us: self.check_timings.average().as_secs_f64() * 1_000_000.0,
        }
    }

    pub fn reset(&self) {
        self.total_checks.store(0, Ordering::Relaxed);
        self.translations.store(0, Ordering::Relaxed);
        for counter in &self.by_reason {
            counter.store(0, Ordering::Relaxed);
        }
        self.check_timings.clear();
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
