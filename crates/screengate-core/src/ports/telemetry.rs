//! 텔레메트리 싱크 포트.

use crate::models::telemetry::{FrameGateStatistics, TextGateStatistics};

/// 게이트 통계 수신자
pub trait TelemetrySink: Send + Sync {
    fn publish_frame_statistics(&self, stats: &FrameGateStatistics);

    fn publish_text_statistics(&self, stats: &TextGateStatistics);
}
