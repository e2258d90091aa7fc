//! # screengate
//!
//! 캡처 프레임 리플레이와 설정 확인용 CLI 진입점.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use screengate_app::pipeline::AdmissionPipeline;
use screengate_app::replay::{self, LoggingTranslator, SidecarRecognizer};
use screengate_app::settings;
use screengate_app::telemetry::TracingTelemetrySink;
use screengate_core::ports::config::{ConfigProvider, StaticConfigProvider};
use screengate_core::session::GateSession;
use screengate_text::text_gate::TextChangeGate;
use screengate_vision::frame_gate::FrameChangeGate;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 화면 캡처 → 인식 → 번역 입장 제어 게이트
#[derive(Parser, Debug)]
#[command(name = "screengate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info", global = true)]
    log_level: String,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 gate.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 디렉토리의 프레임 이미지를 이름순으로 파이프라인에 통과시킨다
    Replay {
        /// 프레임 이미지 디렉토리 (같은 이름의 .json 사이드카에서 인식 결과를 읽음)
        #[arg(long)]
        frames: PathBuf,

        /// 캡처 컨텍스트 ID
        #[arg(long, default_value = "main")]
        context: String,

        /// 번역 대상 언어 (로그 표시용)
        #[arg(long, default_value = "ko")]
        target_language: String,
    },
    /// 유효 설정 확인
    Config {
        /// 병합된 설정을 JSON으로 출력
        #[arg(long)]
        print: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "screengate={},screengate_app={},screengate_core={},screengate_vision={},screengate_text={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    let config = settings::load_gate_config(args.config.as_deref())?;

    match args.command {
        Command::Config { print } => {
            if print {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                info!("설정 검증 완료");
            }
            Ok(())
        }
        Command::Replay {
            frames,
            context,
            target_language,
        } => {
            let provider: Arc<dyn ConfigProvider> = Arc::new(StaticConfigProvider::new(config));
            run_replay(provider, frames, context, target_language).await
        }
    }
}

async fn run_replay(
    provider: Arc<dyn ConfigProvider>,
    frames_dir: PathBuf,
    context: String,
    target_language: String,
) -> Result<()> {
    if !frames_dir.is_dir() {
        bail!("프레임 디렉토리가 아님: {}", frames_dir.display());
    }
    let frames = replay::frame_paths(&frames_dir)
        .with_context(|| format!("프레임 목록 읽기 실패: {}", frames_dir.display()))?;
    info!("리플레이 시작: {}프레임 ({})", frames.len(), frames_dir.display());

    let session = GateSession::create(&provider.current());
    let recognizer = Arc::new(SidecarRecognizer::new());
    let pipeline = AdmissionPipeline::new(
        FrameChangeGate::with_defaults(Arc::clone(&session), Arc::clone(&provider)),
        TextChangeGate::new(Arc::clone(&session), provider),
        recognizer.clone(),
        Arc::new(LoggingTranslator::new(target_language)),
    );

    // Ctrl+C → 진행 중인 프레임 이후 중단
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C 수신");
            signal_cancel.cancel();
        }
    });

    let summary =
        replay::run_replay(&pipeline, &recognizer, &frames, &context, &cancel).await?;

    pipeline.publish_statistics(&TracingTelemetrySink);
    info!(
        "리플레이 완료: 프레임 {}, 변경 {}, 번역 {}, 스킵 {}, 읽기 실패 {}",
        summary.frames,
        summary.changed_frames,
        summary.translations,
        summary.skipped_texts,
        summary.unreadable_frames
    );

    session.dispose();
    Ok(())
}
