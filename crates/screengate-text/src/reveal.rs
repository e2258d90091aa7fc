//! 소스별 점진 표시 / 정적 UI 상태 기계.
//!
//! 직전 확정 텍스트와 현재 텍스트의 관계(`Observation`)에 따라 `SourcePhase`를 전이하고
//! 게이트가 취할 동작(`RevealAction`)을 돌려준다.
//!
//! | 현재 상태                  | 관측    | 다음 상태                     | 동작              |
//! |----------------------------|---------|-------------------------------|-------------------|
//! | Idle{r}                    | Same    | r+1 ≥ 정적 기준: StaticLocked | LockStatic        |
//! |                            |         | 그 외: Idle{r+1}              | SkipSame          |
//! | Idle                       | Grew    | 감지 켜짐: Growing{1}         | HoldGrowing       |
//! |                            |         | 감지 꺼짐: Idle{1}            | Evaluate          |
//! | Growing{g}                 | Same    | Stabilizing{g,1}              | HoldStabilizing   |
//! |                            |         | 안정 기준 1이면: Idle{1}      | Completed         |
//! | Growing{g}                 | Grew    | g+1 > 최대 대기: Idle{1}      | TimedOut          |
//! |                            |         | 그 외: Growing{g+1}           | HoldGrowing       |
//! | Stabilizing{g,s}           | Same    | s+1 ≥ 안정 기준: Idle{1}      | Completed         |
//! |                            |         | 그 외: Stabilizing{g,s+1}     | HoldStabilizing   |
//! | Stabilizing{g,_}           | Grew    | Growing{g+1} 또는 Idle{1}     | HoldGrowing/TimedOut |
//! | 모든 상태                  | Changed | Idle{1}                       | Evaluate          |
//!
//! StaticLocked 상태에서 마커와 다른 텍스트가 오면 게이트가 마커를 해제하고
//! Idle{1}로 간주해 전이한다.

use screengate_core::config::TextGateConfig;
use screengate_core::models::text::SourcePhase;

/// 직전 텍스트 대비 현재 텍스트 관계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// 정규화 후 동일
    Same,
    /// 직전 텍스트의 진접두사 확장
    Grew,
    /// 그 외 변경
    Changed,
}

impl Observation {
    pub fn classify(previous: &str, current: &str) -> Self {
        if previous == current {
            Self::Same
        } else if !previous.is_empty() && current.starts_with(previous) {
            Self::Grew
        } else {
            Self::Changed
        }
    }
}

/// 전이 결과 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealAction {
    /// 동일 텍스트 스킵
    SkipSame,
    /// 정적 UI 등록 후 스킵
    LockStatic,
    /// 성장 중 — 이력만 전진하고 스킵
    HoldGrowing,
    /// 안정화 대기 스킵
    HoldStabilizing,
    /// 안정화 완료 — 번역
    Completed,
    /// 최대 대기 초과 — 강제 번역
    TimedOut,
    /// 길이 변화 / 편집 거리 평가로 진행
    Evaluate,
}

/// 전이 규칙 파라미터
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealPolicy {
    pub reveal_detection: bool,
    pub max_delay_cycles: u32,
    pub stabilization_cycles: u32,
    pub static_detection: bool,
    pub static_threshold: u32,
}

impl RevealPolicy {
    pub fn from_config(config: &TextGateConfig) -> Self {
        Self {
            reveal_detection: config.reveal_detection,
            max_delay_cycles: config.reveal_max_delay_cycles,
            stabilization_cycles: config.reveal_stabilization_cycles.max(1),
            static_detection: config.static_ui_detection,
            static_threshold: config.static_ui_threshold,
        }
    }

    fn grow(&self, growth_cycles: u32) -> (SourcePhase, RevealAction) {
        if growth_cycles > self.max_delay_cycles {
            (SourcePhase::seeded(), RevealAction::TimedOut)
        } else {
            (SourcePhase::Growing { growth_cycles }, RevealAction::HoldGrowing)
        }
    }

    fn stabilize(&self, growth_cycles: u32, stable_count: u32) -> (SourcePhase, RevealAction) {
        if stable_count >= self.stabilization_cycles {
            (SourcePhase::seeded(), RevealAction::Completed)
        } else {
            (
                SourcePhase::Stabilizing {
                    growth_cycles,
                    stable_count,
                },
                RevealAction::HoldStabilizing,
            )
        }
    }
}

/// 상태 전이. `text`는 정적 UI 등록 시 마커가 될 정규화 텍스트
pub fn transition(
    phase: &SourcePhase,
    observation: Observation,
    policy: &RevealPolicy,
    text: &str,
) -> (SourcePhase, RevealAction) {
    if observation == Observation::Changed {
        return (SourcePhase::seeded(), RevealAction::Evaluate);
    }

    match (phase, observation) {
        (SourcePhase::Growing { growth_cycles }, Observation::Same) => {
            policy.stabilize(*growth_cycles, 1)
        }
        (
            SourcePhase::Stabilizing {
                growth_cycles,
                stable_count,
            },
            Observation::Same,
        ) => policy.stabilize(*growth_cycles, stable_count.saturating_add(1)),
        (
            SourcePhase::Growing { growth_cycles }
            | SourcePhase::Stabilizing { growth_cycles, .. },
            _,
        ) => policy.grow(growth_cycles.saturating_add(1)),
        (idle, Observation::Same) => {
            let repeats = idle_repeats(idle).saturating_add(1);
            if policy.static_detection && repeats >= policy.static_threshold {
                (
                    SourcePhase::StaticLocked {
                        marker: text.to_string(),
                    },
                    RevealAction::LockStatic,
                )
            } else {
                (SourcePhase::Idle { repeats }, RevealAction::SkipSame)
            }
        }
        (_, _) => {
            if policy.reveal_detection {
                policy.grow(1)
            } else {
                (SourcePhase::seeded(), RevealAction::Evaluate)
            }
        }
    }
}

fn idle_repeats(phase: &SourcePhase) -> u32 {
    match phase {
        SourcePhase::Idle { repeats } => *repeats,
        // 마커와 다른 텍스트로 해제된 경우
        _ => 1,
    }
}
