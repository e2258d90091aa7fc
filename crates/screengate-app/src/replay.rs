//! 디렉토리 리플레이 소스.
//!
//! 이미지 파일을 이름순으로 파이프라인에 흘려 보낸다.
//! 인식 결과는 프레임과 같은 이름의 `.json` 사이드카 파일에서 읽는다.
//!
//! ```json
//! [{"source_id": "dialog", "text": "...", "confidence": 0.93,
//!   "bounding_box": {"x": 0, "y": 400, "w": 600, "h": 80},
//!   "heatmap": 0.4, "excluded": false}]
//! ```

use async_trait::async_trait;
use image::DynamicImage;
use parking_lot::Mutex;
use screengate_core::error::CoreError;
use screengate_core::models::recognition::RecognizedRegion;
use screengate_core::ports::recognition::TextRecognizer;
use screengate_core::ports::translation::Translator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::pipeline::AdmissionPipeline;

/// 리플레이 대상 확장자
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// 디렉토리의 프레임 이미지 경로 (이름순)
pub fn frame_paths(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_frame_file(path))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            FRAME_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// 프레임 옆 사이드카 JSON 경로
pub fn sidecar_path(frame_path: &Path) -> PathBuf {
    frame_path.with_extension("json")
}

/// 사이드카 파일 기반 인식기.
///
/// 리플레이 루프가 `set_current_frame`으로 현재 프레임 경로를 알려 준다.
#[derive(Debug, Default)]
pub struct SidecarRecognizer {
    current: Mutex<Option<PathBuf>>,
}

impl SidecarRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current_frame(&self, frame_path: &Path) {
        *self.current.lock() = Some(frame_path.to_path_buf());
    }
}

#[async_trait]
impl TextRecognizer for SidecarRecognizer {
    async fn recognize(
        &self,
        context_id: &str,
        _frame: &DynamicImage,
    ) -> Result<Vec<RecognizedRegion>, CoreError> {
        let current = self.current.lock().clone();
        let Some(frame_path) = current else {
            return Err(CoreError::invalid_input("frame_path", "현재 프레임 미지정"));
        };

        let sidecar = sidecar_path(&frame_path);
        let content = match tokio::fs::read_to_string(&sidecar).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[{context_id}] 사이드카 없음: {}", sidecar.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }

    fn provider_name(&self) -> &str {
        "sidecar"
    }
}

/// 번역 요청을 로그로만 남기는 번역기 (원문 반환)
#[derive(Debug, Clone)]
pub struct LoggingTranslator {
    target_language: String,
}

impl LoggingTranslator {
    pub fn new(target_language: impl Into<String>) -> Self {
        Self {
            target_language: target_language.into(),
        }
    }
}

#[async_trait]
impl Translator for LoggingTranslator {
    async fn translate(&self, source_id: &str, text: &str) -> Result<String, CoreError> {
        info!("[{source_id}] 번역 요청 ({}): {text}", self.target_language);
        Ok(text.to_string())
    }

    fn provider_name(&self) -> &str {
        "logging"
    }
}

/// 리플레이 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub frames: usize,
    pub changed_frames: usize,
    pub translations: usize,
    pub skipped_texts: usize,
    pub unreadable_frames: usize,
}

/// 프레임 목록을 순서대로 파이프라인에 전달
pub async fn run_replay(
    pipeline: &AdmissionPipeline,
    recognizer: &SidecarRecognizer,
    frames: &[PathBuf],
    context_id: &str,
    cancel: &CancellationToken,
) -> Result<ReplaySummary, CoreError> {
    let mut summary = ReplaySummary::default();

    for path in frames {
        if cancel.is_cancelled() {
            info!("리플레이 취소됨 ({}프레임 처리)", summary.frames);
            break;
        }

        let image = match load_frame(path).await {
            Ok(image) => image,
            Err(e) => {
                warn!("프레임 읽기 실패, 건너뜀: {}: {e}", path.display());
                summary.unreadable_frames += 1;
                continue;
            }
        };

        recognizer.set_current_frame(path);
        let outcome = match pipeline.process_frame(context_id, image, cancel).await {
            Ok(outcome) => outcome,
            Err(CoreError::Cancelled) => break,
            Err(e) => return Err(e),
        };

        summary.frames += 1;
        if outcome.frame.has_changed {
            summary.changed_frames += 1;
        }
        summary.translations += outcome.translated.len();
        summary.skipped_texts += outcome.skipped.len();

        debug!(
            "{}: 변경={} (stage {}), 번역 {}건",
            path.display(),
            outcome.frame.has_changed,
            outcome.frame.stage.number(),
            outcome.translated.len()
        );
    }

    Ok(summary)
}

/// 이미지 디코딩은 블로킹 풀에서 수행
async fn load_frame(path: &Path) -> Result<DynamicImage, CoreError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&owned))
        .await
        .map_err(|e| CoreError::Compute(format!("프레임 디코딩 작업 실패: {e}")))?
        .map_err(|e| CoreError::Compute(format!("이미지 디코딩 실패: {e}")))
}
