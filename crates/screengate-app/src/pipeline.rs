//! 입장 제어 파이프라인.
//!
//! 캡처 프레임 → 이미지 게이트 → (변경 시) 텍스트 인식 → 영역별 텍스트 게이트
//! → (허용 시) 번역. 같은 컨텍스트에 대한 호출은 호출자가 직렬화해야 한다.

use image::DynamicImage;
use parking_lot::Mutex;
use screengate_core::error::CoreError;
use screengate_core::models::frame::ImageChangeDecision;
use screengate_core::models::recognition::RecognizedRegion;
use screengate_core::models::text::TextDecisionReason;
use screengate_core::ports::recognition::TextRecognizer;
use screengate_core::ports::telemetry::TelemetrySink;
use screengate_core::ports::translation::Translator;
use screengate_text::text_gate::TextChangeGate;
use screengate_vision::frame_gate::FrameChangeGate;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 프레임 1장 처리 결과
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// 이미지 게이트 판정
    pub frame: ImageChangeDecision,
    /// 번역된 `(source_id, 번역문)`
    pub translated: Vec<(String, String)>,
    /// 번역하지 않은 `(source_id, 사유)`
    pub skipped: Vec<(String, TextDecisionReason)>,
}

impl PipelineOutcome {
    fn frame_only(frame: ImageChangeDecision) -> Self {
        Self {
            frame,
            translated: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// 두 게이트와 인식/번역 포트를 묶은 파이프라인
pub struct AdmissionPipeline {
    frame_gate: FrameChangeGate,
    text_gate: TextChangeGate,
    recognizer: Arc<dyn TextRecognizer>,
    translator: Arc<dyn Translator>,
    /// 컨텍스트별 직전 프레임
    previous_frames: Mutex<HashMap<String, Arc<DynamicImage>>>,
    /// 컨텍스트별 마지막 인식 결과에 있던 소스
    active_sources: Mutex<HashMap<String, HashSet<String>>>,
}

impl AdmissionPipeline {
    pub fn new(
        frame_gate: FrameChangeGate,
        text_gate: TextChangeGate,
        recognizer: Arc<dyn TextRecognizer>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        info!(
            "파이프라인 구성: 인식={}, 번역={}",
            recognizer.provider_name(),
            translator.provider_name()
        );
        Self {
            frame_gate,
            text_gate,
            recognizer,
            translator,
            previous_frames: Mutex::new(HashMap::new()),
            active_sources: Mutex::new(HashMap::new()),
        }
    }

    pub fn frame_gate(&self) -> &FrameChangeGate {
        &self.frame_gate
    }

    pub fn text_gate(&self) -> &TextChangeGate {
        &self.text_gate
    }

    /// 캡처 프레임 1장 처리
    pub async fn process_frame(
        &self,
        context_id: &str,
        frame: DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, CoreError> {
        let frame = Arc::new(frame);
        let previous = self.previous_frames.lock().get(context_id).cloned();

        let decision = self
            .frame_gate
            .decide(previous.as_deref(), &frame, context_id, cancel)?;
        self.previous_frames
            .lock()
            .insert(context_id.to_string(), Arc::clone(&frame));

        if !decision.has_changed {
            return Ok(PipelineOutcome::frame_only(decision));
        }

        let regions = match self.recognizer.recognize(context_id, &frame).await {
            Ok(regions) => regions,
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(e) => {
                // 다음 프레임이 첫 관측으로 다시 인식되도록 컨텍스트 기준선 제거
                warn!("[{context_id}] 텍스트 인식 실패, 컨텍스트 초기화: {e}");
                self.reset_frame_baseline(context_id);
                return Ok(PipelineOutcome::frame_only(decision));
            }
        };
        debug!("[{context_id}] 인식된 영역 {}개", regions.len());

        let regions: Vec<RecognizedRegion> = regions
            .into_iter()
            .filter(|region| {
                if region.source_id.is_empty() {
                    warn!("[{context_id}] source_id 없는 인식 영역 무시: {:?}", region.text);
                    return false;
                }
                true
            })
            .collect();

        let present: HashSet<String> = regions.iter().map(|r| r.source_id.clone()).collect();
        self.retire_missing_sources(context_id, &present);

        let mut outcome = PipelineOutcome::frame_only(decision);
        for region in &regions {
            // 존재 시각 갱신은 텍스트 게이트가 판정 중에 수행한다
            let info = region.region_info();
            let text_decision =
                self.text_gate
                    .decide(&region.text, &region.source_id, Some(&info), cancel)?;

            if !text_decision.should_translate {
                outcome
                    .skipped
                    .push((region.source_id.clone(), text_decision.reason));
                continue;
            }

            match self
                .translator
                .translate(&region.source_id, &text_decision.normalized_text)
                .await
            {
                Ok(translated) => outcome.translated.push((region.source_id.clone(), translated)),
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    warn!("[{}] 번역 실패: {e}", region.source_id);
                    outcome
                        .skipped
                        .push((region.source_id.clone(), text_decision.reason));
                }
            }
        }

        Ok(outcome)
    }

    /// 컨텍스트 종료: 직전 프레임, 지문, 소속 소스의 텍스트 이력 제거
    pub fn close_context(&self, context_id: &str) {
        self.reset_frame_baseline(context_id);
        let sources = self.active_sources.lock().remove(context_id);
        for source in sources.into_iter().flatten() {
            self.text_gate.clear_source(&source);
        }
        info!("[{context_id}] 컨텍스트 종료");
    }

    /// 두 게이트 통계 발행
    pub fn publish_statistics(&self, sink: &dyn TelemetrySink) {
        self.frame_gate.publish_statistics(sink);
        self.text_gate.publish_statistics(sink);
    }

    fn reset_frame_baseline(&self, context_id: &str) {
        self.previous_frames.lock().remove(context_id);
        self.frame_gate.session().clear_context(context_id);
    }

    /// 직전 인식 결과에 있었지만 이번에 사라진 소스의 이력 제거 (존재 시각은 유지)
    fn retire_missing_sources(&self, context_id: &str, present: &HashSet<String>) {
        let previous = self
            .active_sources
            .lock()
            .insert(context_id.to_string(), present.clone());

        for source in previous.iter().flatten() {
            if !present.contains(source) {
                debug!("[{context_id}] 텍스트 사라짐: {source}");
                self.text_gate.clear_source(source);
            }
        }
    }
}
