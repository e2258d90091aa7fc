//! 이미지 변경 게이트 (3단계 캐스케이드).
//!
//! - Stage 1: 저비용 해시 유사도로 대부분의 정지 프레임을 1ms 안에 걸러낸다.
//! - Stage 2: 이미지 유형별 최적 해시 + 정규화 해밍 거리.
//! - Stage 3: 전체 SSIM, 변경 시 그리드 셀 단위 후보 영역 추정.
//!
//! Stage N은 Stage N-1이 변경 신호를 냈을 때만 실행된다.
//! 계산 에러는 해당 단계에서 흡수되어 "변경"으로 판정된다 (fail-open).

use chrono::Utc;
use image::DynamicImage;
use screengate_core::config::GateConfig;
use screengate_core::error::CoreError;
use screengate_core::models::frame::{
    CascadeStage, FingerprintKey, FrameFingerprint, HashAlgorithm, ImageChangeDecision, Rect,
    RegionChange,
};
use screengate_core::models::telemetry::FrameGateStatistics;
use screengate_core::ports::classifier::ImageClassifier;
use screengate_core::ports::config::ConfigProvider;
use screengate_core::ports::hashing::PerceptualHasher;
use screengate_core::ports::telemetry::TelemetrySink;
use screengate_core::session::GateSession;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classifier::ResolutionClassifier;
use crate::grid;
use crate::hasher::BlockHasher;

/// 이미지 변경 게이트
pub struct FrameChangeGate {
    session: Arc<GateSession>,
    hasher: Arc<dyn PerceptualHasher>,
    classifier: Arc<dyn ImageClassifier>,
    config: Arc<dyn ConfigProvider>,
}

/// 한 호출 안에서 단계 간에 넘기는 해시 정보
struct StageHash {
    algorithm: HashAlgorithm,
    current: u64,
    previous: Option<u64>,
}

impl FrameChangeGate {
    pub fn new(
        session: Arc<GateSession>,
        hasher: Arc<dyn PerceptualHasher>,
        classifier: Arc<dyn ImageClassifier>,
        config: Arc<dyn ConfigProvider>,
    ) -> Self {
        Self {
            session,
            hasher,
            classifier,
            config,
        }
    }

    /// 기본 해시 계산기(`BlockHasher`)와 해상도 분류기로 생성
    pub fn with_defaults(session: Arc<GateSession>, config: Arc<dyn ConfigProvider>) -> Self {
        Self::new(
            session,
            Arc::new(BlockHasher::new()),
            Arc::new(ResolutionClassifier),
            config,
        )
    }

    pub fn session(&self) -> &Arc<GateSession> {
        &self.session
    }

    /// 직전 프레임 대비 변경 판정.
    ///
    /// `previous`가 없으면 첫 관측으로 보고 두 단계의 지문 캐시를 시드한다.
    pub fn decide(
        &self,
        previous: Option<&DynamicImage>,
        current: &DynamicImage,
        context_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ImageChangeDecision, CoreError> {
        self.session.ensure_active()?;
        if context_id.is_empty() {
            return Err(CoreError::invalid_input("context_id", "비어 있음"));
        }
        if current.width() == 0 || current.height() == 0 {
            return Err(CoreError::invalid_input("current", "이미지 크기 0"));
        }
        check_cancelled(cancel)?;

        let started = Instant::now();
        let config = self.config.current();
        let stats = self.session.frame_stats();
        stats.record_frame();

        let class = self.classifier.detect_image_type(current);
        let optimal = self.hasher.optimal_algorithm(class);
        let quick = quick_algorithm(optimal);

        // ── Stage 1 ──
        let stage1_started = Instant::now();
        let quick_hash = match self.hasher.compute_hash(current, quick) {
            Ok(hash) => hash,
            Err(e) => {
                if previous.is_none() && e.is_transient() {
                    // 다음 프레임이 Stage 2 기준선이라도 쓸 수 있도록 시드
                    warn!("[{context_id}] 첫 프레임 Stage 1 해시 실패, Stage 2 지문만 시드");
                    self.seed_fingerprint(
                        context_id,
                        current,
                        CascadeStage::MediumPrecision,
                        optimal,
                        &config,
                    );
                }
                return self.degrade(e, CascadeStage::QuickFilter, quick, 0, started);
            }
        };

        let Some(previous) = previous else {
            return Ok(self.first_observation(
                context_id, current, &config, quick, quick_hash, optimal, started,
            ));
        };

        let key = FingerprintKey::new(context_id, CascadeStage::QuickFilter, quick);
        let cached = self.session.fresh_fingerprint(&key, &config.cache, Utc::now());
        stats.record_cache_lookup(cached.is_some());
        self.session.store_fingerprint(
            key,
            fingerprint(context_id, quick, quick_hash),
            &config.cache,
        );

        let stage1 = StageHash {
            algorithm: quick,
            current: quick_hash,
            previous: cached.map(|fp| fp.hash_value),
        };
        if let Some(prev_hash) = stage1.previous {
            let similarity = self.hasher.compare_hashes(prev_hash, quick_hash, quick);
            stats.record_stage_time(CascadeStage::QuickFilter, stage1_started.elapsed());
            if similarity >= config.frame.stage1_threshold {
                debug!("[{context_id}] Stage 1 변경 없음 (유사도 {similarity:.3})");
                stats.record_filtered(CascadeStage::QuickFilter);
                return Ok(self.finish(
                    CascadeStage::QuickFilter,
                    false,
                    1.0 - similarity,
                    &stage1,
                    started,
                ));
            }
            debug!("[{context_id}] Stage 1 잠재적 변경 (유사도 {similarity:.3})");
        } else {
            stats.record_stage_time(CascadeStage::QuickFilter, stage1_started.elapsed());
            debug!("[{context_id}] Stage 1 캐시 없음, Stage 2로 전달");
        }

        // ── Stage 2 ──
        check_cancelled(cancel)?;
        let stage2_started = Instant::now();
        let optimal_hash = match self.hasher.compute_hash(current, optimal) {
            Ok(hash) => hash,
            Err(e) => {
                return self.degrade(e, CascadeStage::MediumPrecision, optimal, quick_hash, started)
            }
        };

        let key = FingerprintKey::new(context_id, CascadeStage::MediumPrecision, optimal);
        let cached = self.session.fresh_fingerprint(&key, &config.cache, Utc::now());
        self.session.store_fingerprint(
            key,
            fingerprint(context_id, optimal, optimal_hash),
            &config.cache,
        );

        let stage2 = StageHash {
            algorithm: optimal,
            current: optimal_hash,
            previous: cached.map(|fp| fp.hash_value),
        };
        let stage2_pct = match stage2.previous {
            Some(prev_hash) => {
                let distance = self.hasher.hamming_distance(prev_hash, optimal_hash) as f32
                    / HashAlgorithm::BITS as f32;
                stats.record_stage_time(CascadeStage::MediumPrecision, stage2_started.elapsed());
                if distance < config.frame.stage2_threshold {
                    debug!("[{context_id}] Stage 2 변경 없음 (거리 {distance:.3})");
                    stats.record_filtered(CascadeStage::MediumPrecision);
                    return Ok(self.finish(
                        CascadeStage::MediumPrecision,
                        false,
                        distance,
                        &stage2,
                        started,
                    ));
                }
                distance
            }
            None => {
                stats.record_stage_time(CascadeStage::MediumPrecision, stage2_started.elapsed());
                debug!("[{context_id}] Stage 2 캐시 없음, Stage 3으로 전달");
                0.0
            }
        };

        // ── Stage 3 ──
        check_cancelled(cancel)?;
        let stage3_started = Instant::now();
        let ssim = match self
            .hasher
            .calculate_ssim(previous, current, config.frame.ssim_sample_size)
        {
            Ok(ssim) => ssim,
            Err(e) => {
                return self.degrade(e, CascadeStage::HighPrecision, optimal, optimal_hash, started)
            }
        };
        let change_pct = stage2_pct.max(1.0 - ssim);

        if ssim >= config.frame.stage3_threshold {
            stats.record_stage_time(CascadeStage::HighPrecision, stage3_started.elapsed());
            debug!("[{context_id}] Stage 3 변경 없음 (SSIM {ssim:.3})");
            stats.record_filtered(CascadeStage::HighPrecision);
            return Ok(self
                .finish(CascadeStage::HighPrecision, false, change_pct, &stage2, started)
                .with_ssim(ssim));
        }

        let regions = match grid::locate_changed_cells(
            self.hasher.as_ref(),
            previous,
            current,
            config.frame.grid_rows,
            config.frame.grid_cols,
            config.frame.stage3_threshold,
            config.frame.max_changed_regions,
            config.frame.ssim_sample_size,
        ) {
            Ok(regions) => regions,
            Err(e) if e.is_transient() => {
                warn!("[{context_id}] 변경 영역 추정 실패, 영역 없이 보고: {e}");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        stats.record_stage_time(CascadeStage::HighPrecision, stage3_started.elapsed());
        stats.record_changed();

        debug!(
            "[{context_id}] Stage 3 변경 (SSIM {ssim:.3}, 후보 셀 {}개)",
            regions.len()
        );
        Ok(self
            .finish(CascadeStage::HighPrecision, true, change_pct, &stage2, started)
            .with_ssim(ssim)
            .with_regions(regions))
    }

    /// 호출자가 아는 후보 영역별 SSIM 변경 판정 (캐스케이드 없이)
    pub fn detect_region_changes(
        &self,
        previous: &DynamicImage,
        current: &DynamicImage,
        regions: &[Rect],
        cancel: &CancellationToken,
    ) -> Result<Vec<RegionChange>, CoreError> {
        self.session.ensure_active()?;
        if current.width() == 0 || current.height() == 0 {
            return Err(CoreError::invalid_input("current", "이미지 크기 0"));
        }
        if previous.width() == 0 || previous.height() == 0 {
            return Err(CoreError::invalid_input("previous", "이미지 크기 0"));
        }

        let config = self.config.current();
        let threshold = config.frame.region_ssim_threshold;
        let width = previous.width().min(current.width());
        let height = previous.height().min(current.height());

        regions
            .iter()
            .map(|&region| {
                check_cancelled(cancel)?;
                let Some(clipped) = region.clipped_to(width, height) else {
                    debug!("영역이 이미지 밖: {region:?}");
                    return Ok(RegionChange {
                        region,
                        ssim_score: 1.0,
                        has_changed: false,
                    });
                };
                match grid::region_ssim(
                    self.hasher.as_ref(),
                    previous,
                    current,
                    clipped,
                    config.frame.ssim_sample_size,
                ) {
                    Ok(ssim) => Ok(RegionChange {
                        region: clipped,
                        ssim_score: ssim,
                        has_changed: ssim < threshold,
                    }),
                    Err(e) if e.is_transient() => {
                        warn!("영역 SSIM 계산 실패, 변경으로 간주: {e}");
                        Ok(RegionChange {
                            region: clipped,
                            ssim_score: 0.0,
                            has_changed: true,
                        })
                    }
                    Err(e) => Err(e),
                }
            })
            .collect()
    }

    /// 현재 통계 스냅샷
    pub fn statistics(&self) -> FrameGateStatistics {
        self.session.frame_statistics()
    }

    /// 텔레메트리 싱크로 통계 발행
    pub fn publish_statistics(&self, sink: &dyn TelemetrySink) {
        sink.publish_frame_statistics(&self.statistics());
    }

    #[allow(clippy::too_many_arguments)]
    fn first_observation(
        &self,
        context_id: &str,
        current: &DynamicImage,
        config: &GateConfig,
        quick: HashAlgorithm,
        quick_hash: u64,
        optimal: HashAlgorithm,
        started: Instant,
    ) -> ImageChangeDecision {
        let stats = self.session.frame_stats();
        stats.record_stage_time(CascadeStage::QuickFilter, started.elapsed());

        self.session.store_fingerprint(
            FingerprintKey::new(context_id, CascadeStage::QuickFilter, quick),
            fingerprint(context_id, quick, quick_hash),
            &config.cache,
        );
        self.seed_fingerprint(
            context_id,
            current,
            CascadeStage::MediumPrecision,
            optimal,
            config,
        );

        stats.record_first_frame();
        stats.record_changed();
        debug!("[{context_id}] 첫 관측");
        ImageChangeDecision::first_time(quick, quick_hash).with_processing_time(started.elapsed())
    }

    /// 지문 시드. 해시 실패는 경고만 남긴다
    fn seed_fingerprint(
        &self,
        context_id: &str,
        current: &DynamicImage,
        stage: CascadeStage,
        algorithm: HashAlgorithm,
        config: &GateConfig,
    ) {
        match self.hasher.compute_hash(current, algorithm) {
            Ok(hash) => self.session.store_fingerprint(
                FingerprintKey::new(context_id, stage, algorithm),
                fingerprint(context_id, algorithm, hash),
                &config.cache,
            ),
            Err(e) => warn!(
                "[{context_id}] Stage {} 지문 시드 실패: {e}",
                stage.number()
            ),
        }
    }

    fn finish(
        &self,
        stage: CascadeStage,
        has_changed: bool,
        change_pct: f32,
        hash: &StageHash,
        started: Instant,
    ) -> ImageChangeDecision {
        ImageChangeDecision::at_stage(
            stage,
            has_changed,
            change_pct,
            hash.algorithm,
            hash.previous,
            hash.current,
        )
        .with_processing_time(started.elapsed())
    }

    /// 일시적 계산 에러는 "변경"으로 강등, 나머지는 전파
    fn degrade(
        &self,
        error: CoreError,
        stage: CascadeStage,
        algorithm: HashAlgorithm,
        current_hash: u64,
        started: Instant,
    ) -> Result<ImageChangeDecision, CoreError> {
        if !error.is_transient() {
            return Err(error);
        }
        warn!(
            "Stage {} 계산 실패, 변경으로 간주 (fail-open): {error}",
            stage.number()
        );
        let stats = self.session.frame_stats();
        stats.record_fail_open();
        stats.record_changed();
        Ok(ImageChangeDecision::fail_open(stage, algorithm, current_hash)
            .with_processing_time(started.elapsed()))
    }
}

/// Stage 1 알고리즘: 최적 알고리즘이 고비용이면 차분 해시, 아니면 평균 해시
pub fn quick_algorithm(optimal: HashAlgorithm) -> HashAlgorithm {
    if optimal.is_expensive() {
        HashAlgorithm::Difference
    } else {
        HashAlgorithm::Average
    }
}

fn fingerprint(context_id: &str, algorithm: HashAlgorithm, hash_value: u64) -> FrameFingerprint {
    FrameFingerprint {
        context_id: context_id.to_string(),
        algorithm,
        hash_value,
        captured_at: Utc::now(),
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
    use image::{Rgba, RgbaImage};
    use screengate_core::models::frame::ImageTypeClass;
    use chrono::Duration;
    use parking_lot::Mutex;
    use screengate_core::ports::config::StaticConfigProvider;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// 호출 횟수를 세는 해시 계산기 래퍼
    #[derive(Default)]
    struct CountingHasher {
        inner: BlockHasher,
        hashes: [AtomicUsize; 3],
        ssim_calls: AtomicUsize,
        fail_ssim: bool,
        /// 켜져 있으면 평균 해시 계산이 실패
        fail_average: AtomicBool,
        /// 지정 알고리즘 해시 계산 중에 토큰 취소
        cancel_during: Mutex<Option<(HashAlgorithm, CancellationToken)>>,
    }

    impl CountingHasher {
        fn cancel_while_hashing(&self, algorithm: HashAlgorithm, token: &CancellationToken) {
            *self.cancel_during.lock() = Some((algorithm, token.clone()));
        }

        fn hash_calls(&self, algorithm: HashAlgorithm) -> usize {
            self.hashes[algorithm_index(algorithm)].load(Ordering::SeqCst)
        }

        fn ssim_calls(&self) -> usize {
            self.ssim_calls.load(Ordering::SeqCst)
        }
    }

    fn algorithm_index(algorithm: HashAlgorithm) -> usize {
        match algorithm {
            HashAlgorithm::Average => 0,
            HashAlgorithm::Difference => 1,
            HashAlgorithm::Perceptual => 2,
        }
    }

    impl PerceptualHasher for CountingHasher {
        fn compute_hash(
            &self,
            image: &DynamicImage,
            algorithm: HashAlgorithm,
        ) -> Result<u64, CoreError> {
            self.hashes[algorithm_index(algorithm)].fetch_add(1, Ordering::SeqCst);
            if let Some((target, token)) = self.cancel_during.lock().as_ref() {
                if *target == algorithm {
                    token.cancel();
                }
            }
            if algorithm == HashAlgorithm::Average && self.fail_average.load(Ordering::SeqCst) {
                return Err(CoreError::Compute("평균 해시 실패 주입".to_string()));
            }
            self.inner.compute_hash(image, algorithm)
        }

        fn calculate_ssim(
            &self,
            a: &DynamicImage,
            b: &DynamicImage,
            sample_edge: u32,
        ) -> Result<f32, CoreError> {
            self.ssim_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ssim {
                return Err(CoreError::Compute("ssim 실패 주입".to_string()));
            }
            self.inner.calculate_ssim(a, b, sample_edge)
        }

        fn optimal_algorithm(&self, class: ImageTypeClass) -> HashAlgorithm {
            self.inner.optimal_algorithm(class)
        }
    }

    fn noise(w: u32, h: u32, seed: u32) -> DynamicImage {
        let mut state = seed.max(1);
        let mut img = RgbaImage::new(w, h);
        for pixel in img.pixels_mut() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let v = (state & 0xFF) as u8;
            *pixel = Rgba([v, v.wrapping_mul(5), v ^ 0x5A, 255]);
        }
        DynamicImage::ImageRgba8(img)
    }

    fn gate_with(hasher: Arc<CountingHasher>) -> FrameChangeGate {
        gate_with_config(hasher, GateConfig::default())
    }

    fn gate_with_config(hasher: Arc<CountingHasher>, config: GateConfig) -> FrameChangeGate {
        let session = GateSession::create(&config);
        FrameChangeGate::new(
            session,
            hasher,
            Arc::new(ResolutionClassifier),
            Arc::new(StaticConfigProvider::new(config)),
        )
    }

    #[test]
    fn unrelated_frames_first_then_changed() {
        let gate = gate_with(Arc::new(CountingHasher::default()));
        let cancel = CancellationToken::new();
        let a = noise(320, 240, 11);
        let b = noise(320, 240, 12345);

        let first = gate.decide(None, &a, "window-1", &cancel).unwrap();
        assert!(first.is_first_observation);
        assert!(first.has_changed);
        assert_eq!(first.stage, CascadeStage::QuickFilter);

        let second = gate.decide(Some(&a), &b, "window-1", &cancel).unwrap();
        assert!(second.has_changed, "무관한 노이즈 프레임은 변경이어야 함");
        assert!(!second.is_first_observation);
        assert!(second.change_percentage > 0.5);
        assert!(second.ssim_score.is_some_and(|s| s < 0.92));
        assert!(!second.changed_regions.is_empty());
        assert!(second.changed_regions.len() <= 4);

        let stats = gate.statistics();
        assert_eq!(stats.total_frames, 2);
        assert_eq!(stats.first_frames, 1);
        assert_eq!(stats.changed_frames, 2);
    }

    #[test]
    fn identical_frame_stops_at_stage1() {
        let hasher = Arc::new(CountingHasher::default());
        let gate = gate_with(Arc::clone(&hasher));
        let cancel = CancellationToken::new();
        let img = noise(320, 240, 77);

        gate.decide(None, &img, "ctx", &cancel).unwrap();
        let optimal_before = hasher.hash_calls(HashAlgorithm::Difference);

        let decision = gate.decide(Some(&img), &img, "ctx", &cancel).unwrap();
        assert!(!decision.has_changed);
        assert_eq!(decision.stage, CascadeStage::QuickFilter);
        assert_eq!(decision.change_percentage, 0.0);
        assert_eq!(decision.previous_hash, Some(decision.current_hash));

        // 320x240 = GeneralUi → Stage 1 평균 해시, Stage 2 차분 해시
        assert_eq!(
            hasher.hash_calls(HashAlgorithm::Difference),
            optimal_before,
            "Stage 2가 실행되면 안 됨"
        );
        assert_eq!(hasher.ssim_calls(), 0, "Stage 3가 실행되면 안 됨");

        let stats = gate.statistics();
        assert_eq!(stats.stage1_filtered, 1);
        assert!((stats.cache_hit_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn stage2_filter_skips_ssim() {
        let hasher = Arc::new(CountingHasher::default());
        let mut config = GateConfig::default();
        // Stage 1은 항상 통과, Stage 2는 모두 걸러냄
        config.frame.stage1_threshold = 1.0;
        config.frame.stage2_threshold = 1.0;
        let gate = FrameChangeGate::new(
            GateSession::create(&config),
            Arc::clone(&hasher) as Arc<dyn PerceptualHasher>,
            Arc::new(ResolutionClassifier),
            Arc::new(StaticConfigProvider::new(config)),
        );
        let cancel = CancellationToken::new();
        let a = noise(320, 240, 5);
        let b = noise(320, 240, 6);

        gate.decide(None, &a, "ctx", &cancel).unwrap();
        let decision = gate.decide(Some(&a), &b, "ctx", &cancel).unwrap();
        assert_eq!(decision.stage, CascadeStage::MediumPrecision);
        assert!(!decision.has_changed);
        assert_eq!(decision.algorithm_used, HashAlgorithm::Difference);
        assert_eq!(hasher.ssim_calls(), 0);
    }

    #[test]
    fn ssim_failure_fails_open() {
        let hasher = Arc::new(CountingHasher {
            fail_ssim: true,
            ..CountingHasher::default()
        });
        let gate = gate_with(Arc::clone(&hasher));
        let cancel = CancellationToken::new();
        let a = noise(320, 240, 21);
        let b = noise(320, 240, 22);

        gate.decide(None, &a, "ctx", &cancel).unwrap();
        let decision = gate.decide(Some(&a), &b, "ctx", &cancel).unwrap();
        assert!(decision.has_changed);
        assert!(decision.failed_open);
        assert_eq!(decision.stage, CascadeStage::HighPrecision);
        assert_eq!(gate.statistics().fail_open_count, 1);
    }

    #[test]
    fn cancelled_token_propagates() {
        let gate = gate_with(Arc::new(CountingHasher::default()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let img = noise(64, 64, 1);
        assert!(matches!(
            gate.decide(None, &img, "ctx", &cancel),
            Err(CoreError::Cancelled)
        ));
        assert_eq!(gate.statistics().total_frames, 0);
    }

    #[test]
    fn invalid_input_and_disposed_session() {
        let gate = gate_with(Arc::new(CountingHasher::default()));
        let cancel = CancellationToken::new();
        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert!(matches!(
            gate.decide(None, &empty, "ctx", &cancel),
            Err(CoreError::InvalidInput { .. })
        ));
        assert!(matches!(
            gate.decide(None, &noise(8, 8, 1), "", &cancel),
            Err(CoreError::InvalidInput { .. })
        ));

        gate.session().dispose();
        assert!(matches!(
            gate.decide(None, &noise(8, 8, 1), "ctx", &cancel),
            Err(CoreError::SessionDisposed)
        ));
    }

    #[test]
    fn contexts_do_not_share_fingerprints() {
        let gate = gate_with(Arc::new(CountingHasher::default()));
        let cancel = CancellationToken::new();
        let a = noise(320, 240, 31);
        let b = noise(320, 240, 32);

        gate.decide(None, &a, "left", &cancel).unwrap();
        gate.decide(None, &b, "right", &cancel).unwrap();

        // 각 컨텍스트는 자기 지문과 비교하므로 변경 없음
        assert!(!gate.decide(Some(&a), &a, "left", &cancel).unwrap().has_changed);
        assert!(!gate.decide(Some(&b), &b, "right", &cancel).unwrap().has_changed);
        // Stage 1 + Stage 2 지문 x 2 컨텍스트
        assert_eq!(gate.statistics().cached_fingerprints, 4);
    }

    #[test]
    fn region_changes_are_scored_independently() {
        let gate = gate_with(Arc::new(CountingHasher::default()));
        let cancel = CancellationToken::new();
        let prev = noise(128, 128, 40);
        let mut curr_buf = prev.to_rgba8();
        for y in 64..128 {
            for x in 64..128 {
                curr_buf.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let curr = DynamicImage::ImageRgba8(curr_buf);

        let regions = [
            Rect::new(0, 0, 64, 64),
            Rect::new(64, 64, 64, 64),
            Rect::new(500, 500, 10, 10),
        ];
        let results = gate
            .detect_region_changes(&prev, &curr, &regions, &cancel)
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[0].has_changed);
        assert!(results[1].has_changed);
        assert!(!results[2].has_changed, "이미지 밖 영역은 변경 없음");
    }

    #[test]
    fn quick_algorithm_avoids_expensive_hash() {
        assert_eq!(
            quick_algorithm(HashAlgorithm::Perceptual),
            HashAlgorithm::Difference
        );
        assert_eq!(quick_algorithm(HashAlgorithm::Difference), HashAlgorithm::Average);
        assert_eq!(quick_algorithm(HashAlgorithm::Average), HashAlgorithm::Average);
    }

    #[test]
    fn cancellation_inside_stage1_stops_before_stage2() {
        let hasher = Arc::new(CountingHasher::default());
        let gate = gate_with(Arc::clone(&hasher));
        let a = noise(320, 240, 51);
        let b = noise(320, 240, 52);
        gate.decide(None, &a, "ctx", &CancellationToken::new()).unwrap();
        let difference_before = hasher.hash_calls(HashAlgorithm::Difference);

        // GeneralUi: Stage 1 = 평균 해시
        let cancel = CancellationToken::new();
        hasher.cancel_while_hashing(HashAlgorithm::Average, &cancel);
        assert!(matches!(
            gate.decide(Some(&a), &b, "ctx", &cancel),
            Err(CoreError::Cancelled)
        ));
        assert_eq!(
            hasher.hash_calls(HashAlgorithm::Difference),
            difference_before,
            "취소 후 Stage 2 해시가 계산되면 안 됨"
        );
        assert_eq!(hasher.ssim_calls(), 0, "취소 후 SSIM이 계산되면 안 됨");

        // Stage 1 캐시는 b 기준으로 갱신되어 다음 호출에서 그대로 쓰인다
        *hasher.cancel_during.lock() = None;
        let next = gate
            .decide(Some(&b), &b, "ctx", &CancellationToken::new())
            .unwrap();
        assert_eq!(next.stage, CascadeStage::QuickFilter);
        assert!(!next.has_changed);
        assert_eq!(next.previous_hash, Some(next.current_hash));
    }

    #[test]
    fn cancellation_inside_stage2_skips_ssim() {
        let hasher = Arc::new(CountingHasher::default());
        let gate = gate_with(Arc::clone(&hasher));
        let a = noise(320, 240, 61);
        let b = noise(320, 240, 62);
        gate.decide(None, &a, "ctx", &CancellationToken::new()).unwrap();

        // GeneralUi: Stage 2 = 차분 해시
        let cancel = CancellationToken::new();
        hasher.cancel_while_hashing(HashAlgorithm::Difference, &cancel);
        assert!(matches!(
            gate.decide(Some(&a), &b, "ctx", &cancel),
            Err(CoreError::Cancelled)
        ));
        assert_eq!(hasher.ssim_calls(), 0, "취소 후 Stage 3가 실행되면 안 됨");
        assert_eq!(gate.statistics().changed_frames, 1, "첫 관측만 변경으로 집계");
        assert_eq!(gate.statistics().cached_fingerprints, 2);
    }

    #[test]
    fn expired_fingerprints_are_not_compared() {
        let hasher = Arc::new(CountingHasher::default());
        let gate = gate_with(Arc::clone(&hasher));
        let cancel = CancellationToken::new();
        let img = noise(320, 240, 71);
        gate.decide(None, &img, "ctx", &cancel).unwrap();

        // 만료 창(30분)보다 오래된 지문으로 되돌림
        gate.session().fingerprints().retain(|_, fp| {
            fp.captured_at = fp.captured_at - Duration::minutes(31);
            true
        });

        let decision = gate.decide(Some(&img), &img, "ctx", &cancel).unwrap();
        assert_eq!(decision.stage, CascadeStage::HighPrecision, "두 단계 모두 캐시 없음");
        assert_eq!(decision.previous_hash, None);
        assert!(!decision.has_changed, "동일 프레임은 SSIM에서 걸러짐");
        assert_eq!(hasher.ssim_calls(), 1);
        assert_eq!(gate.statistics().cache_hit_rate, 0.0);

        // 만료 지문은 새 지문으로 교체되어 다음 호출은 Stage 1에서 끝난다
        let next = gate.decide(Some(&img), &img, "ctx", &cancel).unwrap();
        assert_eq!(next.stage, CascadeStage::QuickFilter);
        assert!(!next.has_changed);
    }

    #[test]
    fn zero_expiration_keeps_old_fingerprints() {
        let mut config = GateConfig::default();
        config.cache.expiration_minutes = 0;
        let gate = gate_with_config(Arc::new(CountingHasher::default()), config);
        let cancel = CancellationToken::new();
        let img = noise(320, 240, 72);
        gate.decide(None, &img, "ctx", &cancel).unwrap();
        gate.session().fingerprints().retain(|_, fp| {
            fp.captured_at = fp.captured_at - Duration::days(7);
            true
        });

        let decision = gate.decide(Some(&img), &img, "ctx", &cancel).unwrap();
        assert_eq!(decision.stage, CascadeStage::QuickFilter);
    }

    #[test]
    fn store_past_hint_purges_expired_fingerprints() {
        let mut config = GateConfig::default();
        config.cache.max_entries_hint = 2;
        let gate = gate_with_config(Arc::new(CountingHasher::default()), config);
        let cancel = CancellationToken::new();

        gate.decide(None, &noise(320, 240, 81), "left", &cancel).unwrap();
        gate.session().fingerprints().retain(|_, fp| {
            fp.captured_at = fp.captured_at - Duration::minutes(45);
            true
        });
        gate.decide(None, &noise(320, 240, 82), "right", &cancel).unwrap();

        let fingerprints = gate.session().fingerprints();
        assert_eq!(fingerprints.len(), 2, "만료된 left 지문은 정리되어야 함");
        assert!(!fingerprints.contains_key(&FingerprintKey::new(
            "left",
            CascadeStage::QuickFilter,
            HashAlgorithm::Average
        )));
        assert!(fingerprints.contains_key(&FingerprintKey::new(
            "right",
            CascadeStage::QuickFilter,
            HashAlgorithm::Average
        )));
    }

    #[test]
    fn reclassified_context_never_compares_across_algorithms() {
        let hasher = Arc::new(CountingHasher::default());
        let gate = gate_with(Arc::clone(&hasher));
        let cancel = CancellationToken::new();
        let ui = noise(320, 240, 91);
        let scene = noise(1280, 720, 91);

        // GeneralUi → 평균/차분 지문
        gate.decide(None, &ui, "ctx", &cancel).unwrap();
        // FullScene → 차분/DCT 지문. 이전 유형의 지문과 비교하지 않는다
        let decision = gate.decide(Some(&ui), &scene, "ctx", &cancel).unwrap();
        assert_eq!(decision.stage, CascadeStage::HighPrecision);
        assert_eq!(decision.algorithm_used, HashAlgorithm::Perceptual);
        assert_eq!(decision.previous_hash, None, "다른 알고리즘 지문이 비교되면 안 됨");
        assert_eq!(hasher.ssim_calls(), 1);

        let session = gate.session();
        assert!(session.fingerprints().contains_key(&FingerprintKey::new(
            "ctx",
            CascadeStage::MediumPrecision,
            HashAlgorithm::Difference
        )));
        assert!(session.fingerprints().contains_key(&FingerprintKey::new(
            "ctx",
            CascadeStage::MediumPrecision,
            HashAlgorithm::Perceptual
        )));
        assert_eq!(gate.statistics().cached_fingerprints, 4);
    }

    #[test]
    fn first_frame_hash_failure_still_seeds_stage2() {
        let hasher = Arc::new(CountingHasher::default());
        hasher.fail_average.store(true, Ordering::SeqCst);
        let gate = gate_with(Arc::clone(&hasher));
        let cancel = CancellationToken::new();
        let img = noise(320, 240, 101);

        let first = gate.decide(None, &img, "ctx", &cancel).unwrap();
        assert!(first.failed_open);
        assert!(first.has_changed);
        assert_eq!(gate.statistics().cached_fingerprints, 1);

        // Stage 1 캐시는 없지만 Stage 2 기준선으로 정지 프레임을 걸러낸다
        hasher.fail_average.store(false, Ordering::SeqCst);
        let next = gate.decide(Some(&img), &img, "ctx", &cancel).unwrap();
        assert_eq!(next.stage, CascadeStage::MediumPrecision);
        assert!(!next.has_changed);
        assert_eq!(hasher.ssim_calls(), 0);
    }

    #[test]
    fn region_ssim_failure_marks_region_changed() {
        let hasher = Arc::new(CountingHasher {
            fail_ssim: true,
            ..CountingHasher::default()
        });
        let gate = gate_with(hasher);
        let img = noise(128, 128, 111);
        let regions = [Rect::new(0, 0, 64, 64), Rect::new(900, 900, 8, 8)];

        let results = gate
            .detect_region_changes(&img, &img, &regions, &CancellationToken::new())
            .unwrap();
        assert!(results[0].has_changed, "계산 실패 영역은 변경으로 간주");
        assert_eq!(results[0].ssim_score, 0.0);
        assert!(!results[1].has_changed, "이미지 밖 영역은 SSIM을 계산하지 않음");
    }

    #[test]
    fn ssim_sample_size_follows_config_reload() {
        use screengate_core::config_manager::ConfigManager;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let manager = Arc::new(ConfigManager::with_path(dir.path().join("gate.json")));
        let hasher = Arc::new(CountingHasher::default());
        let gate = FrameChangeGate::new(
            GateSession::create(&manager.get()),
            Arc::clone(&hasher) as Arc<dyn PerceptualHasher>,
            Arc::new(ResolutionClassifier),
            Arc::clone(&manager) as Arc<dyn ConfigProvider>,
        );
        manager.update_with(|c| c.frame.ssim_sample_size = 16).unwrap();

        let a = noise(320, 240, 121);
        let b = noise(320, 240, 122);
        let cancel = CancellationToken::new();
        gate.decide(None, &a, "ctx", &cancel).unwrap();
        let decision = gate.decide(Some(&a), &b, "ctx", &cancel).unwrap();
        assert_eq!(
            decision.ssim_score,
            Some(BlockHasher::new().calculate_ssim(&a, &b, 16).unwrap()),
            "갱신된 샘플 크기로 SSIM을 계산해야 함"
        );
    }
}
