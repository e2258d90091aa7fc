//! 텍스트 변경 게이트키퍼.
//!
//! 인식된 텍스트마다 한 번 호출되어 번역을 (다시) 실행할지 판정한다.
//! 검사 순서: 제외 영역 → 빈 텍스트 → 최소 길이 → 정적 UI → 첫 텍스트
//! → 점진 표시/동일 텍스트 상태 기계 → 길이 급변 → 편집 거리 비율.
//!
//! 번역 판정일 때만 소스의 확정 텍스트가 갱신된다. 예외는 성장 중인 점진 표시로,
//! 다음 호출이 최신 부분 텍스트와 비교하도록 이력을 전진시킨다.

use chrono::{DateTime, Utc};
use screengate_core::config::GateConfig;
use screengate_core::error::CoreError;
use screengate_core::models::telemetry::TextGateStatistics;
use screengate_core::models::text::{
    SourcePhase, TextChangeDecision, TextDecisionReason, TextHistoryEntry, TextRegionInfo,
};
use screengate_core::ports::config::ConfigProvider;
use screengate_core::ports::telemetry::TelemetrySink;
use screengate_core::session::GateSession;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::levenshtein;
use crate::normalize::{char_len, normalize};
use crate::reveal::{transition, Observation, RevealAction, RevealPolicy};
use crate::threshold::ThresholdPolicy;

/// 텍스트 변경 게이트
pub struct TextChangeGate {
    session: Arc<GateSession>,
    config: Arc<dyn ConfigProvider>,
}

/// 한 호출의 입력 묶음
struct Check<'a> {
    raw: &'a str,
    normalized: String,
    source_id: &'a str,
    region: TextRegionInfo,
    now: DateTime<Utc>,
}

impl TextChangeGate {
    pub fn new(session: Arc<GateSession>, config: Arc<dyn ConfigProvider>) -> Self {
        Self { session, config }
    }

    pub fn session(&self) -> &Arc<GateSession> {
        &self.session
    }

    /// 번역 여부 판정
    pub fn decide(
        &self,
        text: &str,
        source_id: &str,
        region: Option<&TextRegionInfo>,
        cancel: &CancellationToken,
    ) -> Result<TextChangeDecision, CoreError> {
        self.session.ensure_active()?;
        if source_id.is_empty() {
            return Err(CoreError::invalid_input("source_id", "비어 있음"));
        }
        check_cancelled(cancel)?;

        let started = Instant::now();
        let config = self.config.current();
        let check = Check {
            raw: text,
            normalized: normalize(text),
            source_id,
            region: region.copied().unwrap_or_default(),
            now: Utc::now(),
        };

        let decision = self.evaluate(&check, &config, cancel)?;
        self.session.text_stats().record_decision(
            decision.reason,
            decision.should_translate,
            started.elapsed(),
        );
        debug!(
            "[{source_id}] 텍스트 판정: {} (번역={})",
            decision.reason.as_str(),
            decision.should_translate
        );
        Ok(decision)
    }

    fn evaluate(
        &self,
        check: &Check<'_>,
        config: &GateConfig,
        cancel: &CancellationToken,
    ) -> Result<TextChangeDecision, CoreError> {
        let text_config = &config.text;
        let normalized = check.normalized.as_str();

        if check.region.is_in_exclusion_zone {
            return Ok(TextChangeDecision::skip(
                TextDecisionReason::ExclusionZone,
                normalized,
            ));
        }
        if normalized.is_empty() {
            return Ok(TextChangeDecision::skip(TextDecisionReason::EmptyText, normalized));
        }

        // 텍스트가 보였으면 변경 여부와 무관하게 존재 시각 갱신
        self.confirm_presence(check.source_id, check.now);

        if char_len(normalized) < text_config.min_text_length {
            return Ok(TextChangeDecision::skip(TextDecisionReason::TooShort, normalized));
        }

        let marker_matches = self.session.source_phases().with(check.source_id, |phase| {
            phase
                .and_then(SourcePhase::static_marker)
                .map(|marker| marker == normalized)
        });
        if marker_matches == Some(true) {
            return Ok(TextChangeDecision::skip(TextDecisionReason::StaticUi, normalized));
        }

        let Some(previous) =
            self.session
                .fresh_history(check.source_id, &config.cache, check.now)
        else {
            return Ok(self.first_text(check, config));
        };

        let observation = Observation::classify(&previous.normalized_text, normalized);
        let policy = RevealPolicy::from_config(text_config);
        let action = self.session.source_phases().update(
            check.source_id.to_string(),
            |slot| {
                let current = slot.take().unwrap_or_default();
                let (next, action) = transition(&current, observation, &policy, normalized);
                *slot = Some(next);
                action
            },
        );

        match action {
            RevealAction::SkipSame => {
                self.touch_history(check.source_id, check.now);
                Ok(TextChangeDecision::skip(TextDecisionReason::SameText, normalized))
            }
            RevealAction::LockStatic => {
                info!("[{}] 정적 UI로 등록: {normalized:?}", check.source_id);
                self.touch_history(check.source_id, check.now);
                Ok(TextChangeDecision::skip(TextDecisionReason::SameText, normalized))
            }
            RevealAction::HoldGrowing => {
                self.remember(check, config);
                Ok(TextChangeDecision::skip(
                    TextDecisionReason::RevealGrowing,
                    normalized,
                ))
            }
            RevealAction::HoldStabilizing => Ok(TextChangeDecision::skip(
                TextDecisionReason::RevealStabilizing,
                normalized,
            )),
            RevealAction::Completed => {
                self.remember(check, config);
                Ok(TextChangeDecision::translate(
                    TextDecisionReason::RevealCompleted,
                    normalized,
                ))
            }
            RevealAction::TimedOut => {
                debug!("[{}] 점진 표시 최대 대기 초과", check.source_id);
                self.remember(check, config);
                Ok(TextChangeDecision::translate(
                    TextDecisionReason::RevealTimedOut,
                    normalized,
                ))
            }
            RevealAction::Evaluate => {
                self.evaluate_change(check, &previous.normalized_text, config, cancel)
            }
        }
    }

    /// 길이 급변 → 편집 거리 비율 순으로 평가
    fn evaluate_change(
        &self,
        check: &Check<'_>,
        previous: &str,
        config: &GateConfig,
        cancel: &CancellationToken,
    ) -> Result<TextChangeDecision, CoreError> {
        let text_config = &config.text;
        let normalized = check.normalized.as_str();
        let prev_len = char_len(previous);
        let curr_len = char_len(normalized);

        let longest = prev_len.max(curr_len).max(1);
        let length_ratio = prev_len.abs_diff(curr_len) as f32 / longest as f32;
        if length_ratio > text_config.length_change_force_ratio {
            self.remember(check, config);
            return Ok(TextChangeDecision::translate(
                TextDecisionReason::LengthChange,
                normalized,
            ));
        }

        check_cancelled(cancel)?;
        let ratio =
            match levenshtein::change_ratio(previous, normalized, text_config.max_edit_distance_len)
            {
                Ok(ratio) => ratio,
                Err(e) if e.is_transient() => {
                    warn!("[{}] 편집 거리 계산 실패, 번역 허용: {e}", check.source_id);
                    self.remember(check, config);
                    return Ok(TextChangeDecision::translate(
                        TextDecisionReason::FailOpen,
                        normalized,
                    ));
                }
                Err(e) => return Err(e),
            };

        let threshold = ThresholdPolicy::from_config(text_config).resolve(
            curr_len,
            check.region.confidence_score,
            check.region.heatmap_value,
        );

        if ratio >= threshold {
            self.remember(check, config);
            Ok(
                TextChangeDecision::translate(TextDecisionReason::EditDistance, normalized)
                    .with_ratio(ratio, threshold),
            )
        } else {
            Ok(
                TextChangeDecision::skip(TextDecisionReason::BelowThreshold, normalized)
                    .with_ratio(ratio, threshold),
            )
        }
    }

    fn first_text(&self, check: &Check<'_>, config: &GateConfig) -> TextChangeDecision {
        self.remember(check, config);
        self.session
            .source_phases()
            .insert(check.source_id.to_string(), SourcePhase::seeded());

        if config.text.always_translate_first_text {
            TextChangeDecision::translate(TextDecisionReason::FirstText, check.normalized.as_str())
        } else {
            TextChangeDecision::skip(TextDecisionReason::FirstText, check.normalized.as_str())
        }
    }

    /// 확정 텍스트 갱신
    fn remember(&self, check: &Check<'_>, config: &GateConfig) {
        self.session.store_history(
            TextHistoryEntry {
                source_id: check.source_id.to_string(),
                raw_text: check.raw.to_string(),
                normalized_text: check.normalized.clone(),
                last_confirmed_at: check.now,
            },
            &config.cache,
        );
    }

    /// 동일 텍스트 재관측: 확정 텍스트는 두고 만료 기준 시각만 갱신
    fn touch_history(&self, source_id: &str, now: DateTime<Utc>) {
        self.session
            .text_history()
            .update(source_id.to_string(), |slot| {
                if let Some(entry) = slot.as_mut() {
                    entry.last_confirmed_at = now;
                }
            });
    }

    // ── 수명 주기 ─────────────────────────────────────────

    /// 텍스트가 사라진 소스의 이력과 진행 중인 점진 표시 상태 제거.
    ///
    /// 존재 확인 시각과 정적 마커는 유지한다.
    pub fn clear_source(&self, source_id: &str) {
        self.session.text_history().remove(source_id);
        self.session
            .source_phases()
            .update(source_id.to_string(), |slot| {
                if slot.as_ref().is_some_and(|p| p.static_marker().is_none()) {
                    *slot = None;
                }
            });
        debug!("[{source_id}] 텍스트 이력 제거");
    }

    /// 세션 경계: 이력, 상태 기계, 존재 확인 시각 전체 제거 (이미지 지문은 유지)
    pub fn clear_all(&self) {
        self.session.text_history().clear();
        self.session.source_phases().clear();
        self.session.presence().clear();
        info!("텍스트 게이트 상태 초기화");
    }

    /// 정적 UI 마커만 제거, 제거 수 반환
    pub fn clear_static_markers(&self) -> usize {
        let removed = self
            .session
            .source_phases()
            .retain(|_, phase| phase.static_marker().is_none());
        info!("정적 UI 마커 {removed}개 제거");
        removed
    }

    /// OCR이 소스의 존재를 다시 확인한 시각 기록 (더 늦은 시각만 반영)
    pub fn confirm_presence(&self, source_id: &str, at: DateTime<Utc>) {
        self.session.presence().upsert(
            source_id.to_string(),
            || at,
            |seen| {
                if at > *seen {
                    *seen = at;
                }
            },
        );
    }

    /// 마지막 존재 확인 시각
    pub fn last_seen(&self, source_id: &str) -> Option<DateTime<Utc>> {
        self.session.presence().get(source_id)
    }

    /// 소스의 현재 상태 기계 상태
    pub fn phase(&self, source_id: &str) -> Option<SourcePhase> {
        self.session.source_phases().get(source_id)
    }

    pub fn statistics(&self) -> TextGateStatistics {
        self.session.text_statistics()
    }

    pub fn publish_statistics(&self, sink: &dyn TelemetrySink) {
        sink.publish_text_statistics(&self.statistics());
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), CoreError> {
    if cancel.is_cancelled() {
        Err(CoreError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use screengate_core::ports::config::StaticConfigProvider;
    use screengate_core::models::text::TextDecisionReason::*;

    fn gate_with(mutate: impl FnOnce(&mut GateConfig)) -> TextChangeGate {
        let mut config = GateConfig::default_config();
        mutate(&mut config);
        TextChangeGate::new(
            GateSession::create(&config),
            Arc::new(StaticConfigProvider::new(config)),
        )
    }

    fn gate() -> TextChangeGate {
        gate_with(|_| {})
    }

    fn decide(gate: &TextChangeGate, text: &str, source: &str) -> TextChangeDecision {
        gate.decide(text, source, None, &CancellationToken::new())
            .unwrap()
    }

    #[test]
    fn repeated_text_becomes_static_ui() {
        let gate = gate();
        let first = decide(&gate, "Settings", "menu");
        assert!(first.should_translate);
        assert_eq!(first.reason, FirstText);

        assert_eq!(decide(&gate, "Settings", "menu").reason, SameText);
        let third = decide(&gate, "Settings", "menu");
        assert_eq!(third.reason, SameText);
        assert!(!third.should_translate);
        assert_eq!(
            gate.phase("menu").and_then(|p| p.static_marker().map(str::to_string)),
            Some("Settings".to_string())
        );

        let fourth = decide(&gate, "Settings", "menu");
        assert_eq!(fourth.reason, StaticUi);
        assert!(!fourth.should_translate);

        let stats = gate.statistics();
        assert_eq!(stats.total_checks, 4);
        assert_eq!(stats.translations, 1);
        assert_eq!(stats.decisions_by_reason.get("same_text"), Some(&2));
        assert_eq!(stats.static_sources, 1);
    }

    #[test]
    fn static_marker_released_by_different_text() {
        let gate = gate();
        for _ in 0..4 {
            decide(&gate, "Settings", "menu");
        }
        let changed = decide(&gate, "Options menu", "menu");
        assert!(changed.should_translate, "정적 마커와 다른 텍스트는 평가되어야 함");
        assert!(gate.phase("menu").and_then(|p| p.static_marker().map(|_| ())).is_none());
    }

    #[test]
    fn typewriter_reveal_waits_for_stabilization() {
        let gate = gate_with(|c| {
            c.text.min_text_length = 1;
            c.text.reveal_stabilization_cycles = 2;
        });

        assert_eq!(decide(&gate, "H", "dialog").reason, FirstText);
        for partial in ["He", "Hel", "Hell", "Hello"] {
            let decision = decide(&gate, partial, "dialog");
            assert_eq!(decision.reason, RevealGrowing, "{partial}");
            assert!(!decision.should_translate);
        }
        assert!(gate.phase("dialog").is_some_and(|p| p.is_revealing()));

        let waiting = decide(&gate, "Hello", "dialog");
        assert_eq!(waiting.reason, RevealStabilizing);
        assert!(!waiting.should_translate);

        let done = decide(&gate, "Hello", "dialog");
        assert_eq!(done.reason, RevealCompleted);
        assert!(done.should_translate);
        assert_eq!(done.normalized_text, "Hello");
        assert_eq!(gate.phase("dialog"), Some(SourcePhase::seeded()));
    }

    #[test]
    fn endless_growth_times_out() {
        let gate = gate_with(|c| c.text.reveal_max_delay_cycles = 2);
        decide(&gate, "He", "s");
        assert_eq!(decide(&gate, "Hel", "s").reason, RevealGrowing);
        assert_eq!(decide(&gate, "Hell", "s").reason, RevealGrowing);
        let forced = decide(&gate, "Hello", "s");
        assert_eq!(forced.reason, RevealTimedOut);
        assert!(forced.should_translate);
    }

    #[test]
    fn same_text_is_idempotent_skip() {
        let gate = gate_with(|c| c.text.static_ui_detection = false);
        decide(&gate, "Chapter one", "title");
        for _ in 0..5 {
            let decision = decide(&gate, "Chapter one", "title");
            assert_eq!(decision.reason, SameText);
            assert!(!decision.should_translate);
        }
    }

    #[test]
    fn normalization_makes_decorated_text_equal() {
        let gate = gate();
        decide(&gate, "<b>Continue</b> ▼", "prompt");
        let decision = decide(&gate, "Ｃｏｎｔｉｎｕｅ", "prompt");
        assert_eq!(decision.reason, SameText);
    }

    #[test]
    fn early_checks_skip_without_history() {
        let gate = gate();
        let excluded = TextRegionInfo {
            is_in_exclusion_zone: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let d = gate
            .decide("Overlay text", "overlay", Some(&excluded), &cancel)
            .unwrap();
        assert_eq!(d.reason, ExclusionZone);
        assert_eq!(decide(&gate, "   ", "overlay").reason, EmptyText);
        assert_eq!(decide(&gate, "<br>", "overlay").reason, EmptyText);
        assert_eq!(decide(&gate, "a", "overlay").reason, TooShort);

        // 위 검사들은 이력을 남기지 않는다
        assert_eq!(decide(&gate, "Overlay text", "overlay").reason, FirstText);
    }

    #[test]
    fn first_text_skip_policy_seeds_history() {
        let gate = gate_with(|c| c.text.always_translate_first_text = false);
        let first = decide(&gate, "Hello world", "s");
        assert_eq!(first.reason, FirstText);
        assert!(!first.should_translate);

        let next = decide(&gate, "Hi", "s");
        assert_eq!(next.reason, LengthChange);
        assert!(next.should_translate);
    }

    #[test]
    fn large_length_change_forces_translation() {
        let gate = gate();
        decide(&gate, "Hello world", "s");
        let d = decide(&gate, "Hi", "s");
        assert_eq!(d.reason, LengthChange);
        assert!(d.should_translate);
        assert!(d.change_ratio.is_none());
    }

    #[test]
    fn edit_distance_against_adaptive_threshold() {
        let gate = gate();
        decide(&gate, "The quick brown fox", "s");

        let small = decide(&gate, "The quick brown fax", "s");
        assert_eq!(small.reason, BelowThreshold);
        assert!(!small.should_translate);
        assert_matches!(small.change_ratio, Some(r) if r < 0.1);
        assert_matches!(small.threshold, Some(t) if (t - 0.2).abs() < 1e-6);

        // 스킵은 이력을 바꾸지 않으므로 원문과 비교된다
        let large = decide(&gate, "The quick green cat", "s");
        assert_eq!(large.reason, EditDistance);
        assert!(large.should_translate);
    }

    #[test]
    fn high_confidence_requires_more_change() {
        let cancel = CancellationToken::new();
        let confident = TextRegionInfo {
            confidence_score: Some(0.95),
            ..Default::default()
        };

        let gate = gate();
        decide(&gate, "The quick brown fox", "plain");
        decide(&gate, "The quick brown fox", "confident");

        // 4/19 ≈ 0.21
        let plain = decide(&gate, "Tha qaick brewn fix", "plain");
        assert_eq!(plain.reason, EditDistance);

        let d = gate
            .decide("Tha qaick brewn fix", "confident", Some(&confident), &cancel)
            .unwrap();
        assert_eq!(d.reason, BelowThreshold);
    }

    #[test]
    fn oversized_edit_distance_fails_open() {
        let gate = gate_with(|c| c.text.max_edit_distance_len = 10);
        decide(&gate, "abcdefghijkl", "s");
        let d = decide(&gate, "abcdefghijkX", "s");
        assert_eq!(d.reason, FailOpen);
        assert!(d.should_translate);

        // fail-open 번역도 이력을 갱신한다
        assert_eq!(decide(&gate, "abcdefghijkX", "s").reason, SameText);
    }

    #[test]
    fn entry_errors_propagate() {
        let gate = gate();
        let cancel = CancellationToken::new();
        assert_matches!(
            gate.decide("text", "", None, &cancel),
            Err(CoreError::InvalidInput { .. })
        );

        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert_matches!(
            gate.decide("text", "s", None, &cancelled),
            Err(CoreError::Cancelled)
        );

        gate.session().dispose();
        assert_matches!(
            gate.decide("text", "s", None, &cancel),
            Err(CoreError::SessionDisposed)
        );
    }

    #[test]
    fn clear_source_keeps_presence_and_static_marker() {
        let gate = gate();
        for _ in 0..3 {
            decide(&gate, "Settings", "menu");
        }
        decide(&gate, "Line of dialog", "dialog");
        let seen = gate.last_seen("dialog");
        assert!(seen.is_some());

        gate.clear_source("dialog");
        gate.clear_source("menu");
        assert_eq!(gate.last_seen("dialog"), seen);
        assert_eq!(decide(&gate, "Line of dialog", "dialog").reason, FirstText);
        assert_eq!(decide(&gate, "Settings", "menu").reason, StaticUi);

        assert_eq!(gate.clear_static_markers(), 1);
        assert_eq!(decide(&gate, "Settings", "menu").reason, FirstText);
    }

    #[test]
    fn clear_all_resets_text_state() {
        let gate = gate();
        decide(&gate, "Some text", "a");
        gate.clear_all();
        assert!(gate.last_seen("a").is_none());
        assert!(gate.phase("a").is_none());
        assert_eq!(decide(&gate, "Some text", "a").reason, FirstText);
    }

    #[test]
    fn confirm_presence_keeps_latest() {
        let gate = gate();
        let early = Utc::now() - chrono::Duration::seconds(30);
        let late = Utc::now();
        gate.confirm_presence("s", late);
        gate.confirm_presence("s", early);
        assert_eq!(gate.last_seen("s"), Some(late));
    }

    #[test]
    fn concurrent_sources_do_not_interfere() {
        let gate = gate();
        std::thread::scope(|scope| {
            for t in 0..8 {
                let gate = &gate;
                scope.spawn(move || {
                    let source = format!("source-{t}");
                    for i in 0..50 {
                        let text = format!("Message number {i} from {t}");
                        gate.decide(&text, &source, None, &CancellationToken::new())
                            .unwrap();
                    }
                });
            }
        });
        let stats = gate.statistics();
        assert_eq!(stats.total_checks, 400);
        assert_eq!(stats.tracked_sources, 8);
    }

    fn backdate_history(gate: &TextChangeGate, minutes: i64) {
        gate.session().text_history().retain(|_, entry| {
            entry.last_confirmed_at = entry.last_confirmed_at - chrono::Duration::minutes(minutes);
            true
        });
    }

    #[test]
    fn expired_history_is_first_text_again() {
        let gate = gate();
        decide(&gate, "Chapter one", "title");
        assert_eq!(decide(&gate, "Chapter one", "title").reason, SameText);

        // 만료 창(30분)을 넘긴 이력은 없는 것으로 본다
        backdate_history(&gate, 31);
        let again = decide(&gate, "Chapter one", "title");
        assert_eq!(again.reason, FirstText);
        assert!(again.should_translate);
        assert_eq!(gate.phase("title"), Some(SourcePhase::seeded()));
    }

    #[test]
    fn zero_expiration_keeps_history() {
        let gate = gate_with(|c| c.cache.expiration_minutes = 0);
        decide(&gate, "Chapter one", "title");
        backdate_history(&gate, 60 * 24 * 7);
        assert_eq!(decide(&gate, "Chapter one", "title").reason, SameText);
    }

    #[test]
    fn store_past_hint_purges_expired_history() {
        let gate = gate_with(|c| c.cache.max_entries_hint = 2);
        decide(&gate, "alpha text", "a");
        decide(&gate, "beta text", "b");
        backdate_history(&gate, 45);

        decide(&gate, "gamma text", "c");
        assert_eq!(gate.session().text_history().len(), 1, "만료 이력은 정리되어야 함");
        assert!(gate.session().text_history().contains_key("c"));
        assert_eq!(decide(&gate, "alpha text", "a").reason, FirstText);
    }
}
