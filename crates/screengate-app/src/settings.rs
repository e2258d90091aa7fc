//! 실행 설정 로드.
//!
//! 우선순위 (낮음 → 높음):
//! 1. 내장 기본값
//! 2. 설정 파일 (`--config` 또는 플랫폼 기본 경로의 `gate.json`, 없으면 생략)
//! 3. `SCREENGATE_` 환경 변수 (`SCREENGATE_FRAME__STAGE1_THRESHOLD=0.9`)

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use screengate_core::config::GateConfig;
use screengate_core::config_manager::ConfigManager;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 환경 변수 접두사
const ENV_PREFIX: &str = "SCREENGATE";

/// 설정 파일 + 환경 변수를 레이어링한 게이트 설정
pub fn load_gate_config(path: Option<&Path>) -> Result<GateConfig> {
    let file = match path {
        Some(path) => Some((path.to_path_buf(), true)),
        None => default_config_file().map(|path| (path, false)),
    };
    build(file, environment())
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn default_config_file() -> Option<PathBuf> {
    match ConfigManager::default_config_path() {
        Ok(path) => Some(path),
        Err(e) => {
            warn!("기본 설정 경로 확인 실패, 내장 기본값 사용: {e}");
            None
        }
    }
}

/// `(경로, 필수 여부)` 파일과 환경 변수 소스로 설정 구성
fn build(file: Option<(PathBuf, bool)>, env: Environment) -> Result<GateConfig> {
    let defaults = Config::try_from(&GateConfig::default_config())
        .context("기본 설정 직렬화 실패")?;

    let mut builder = Config::builder().add_source(defaults);
    if let Some((path, required)) = file {
        debug!("설정 파일 레이어: {} (필수={required})", path.display());
        builder = builder.add_source(File::from(path).required(required));
    }

    let config: GateConfig = builder
        .add_source(env)
        .build()
        .context("설정 소스 병합 실패")?
        .try_deserialize()
        .context("설정 역직렬화 실패")?;

    Ok(config.validated()?)
}
