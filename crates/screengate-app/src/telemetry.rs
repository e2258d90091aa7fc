//! tracing 기반 텔레메트리 싱크.

use screengate_core::models::telemetry::{FrameGateStatistics, TextGateStatistics};
use screengate_core::ports::telemetry::TelemetrySink;
use tracing::info;

/// 게이트 통계를 구조화 로그로 남기는 싱크
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn publish_frame_statistics(&self, stats: &FrameGateStatistics) {
        info!(
            total_frames = stats.total_frames,
            stage1_filtered = stats.stage1_filtered,
            stage2_filtered = stats.stage2_filtered,
            stage3_filtered = stats.stage3_filtered,
            changed_frames = stats.changed_frames,
            fail_open = stats.fail_open_count,
            cached_fingerprints = stats.cached_fingerprints,
            "이미지 게이트 통계: 필터링 효율 {:.1}%, 캐시 적중률 {:.1}%, 단계별 평균 {:.2}/{:.2}/{:.2}ms",
            stats.filtering_efficiency * 100.0,
            stats.cache_hit_rate * 100.0,
            stats.avg_stage_ms[0],
            stats.avg_stage_ms[1],
            stats.avg_stage_ms[2]
        );
    }

    fn publish_text_statistics(&self, stats: &TextGateStatistics) {
        let reasons = stats
            .decisions_by_reason
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            total_checks = stats.total_checks,
            translations = stats.translations,
            static_sources = stats.static_sources,
            active_reveals = stats.active_reveals,
            tracked_sources = stats.tracked_sources,
            "텍스트 게이트 통계: 평균 {:.1}µs [{reasons}]",
            stats.avg_check_us
        );
    }
}
