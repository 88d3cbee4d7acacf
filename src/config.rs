use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// `--client-id`와 설정 파일이 모두 비어 있을 때 쓰는 공개 client id.
pub const DEFAULT_CLIENT_ID: &str = "2t9loNQH90kzJcsFCODdigxfp325aq4z";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub soundcloud: SoundcloudConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SoundcloudConfig {
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
}

/// 한 번의 실행에 필요한 값. 파이프라인 전체에 명시적으로 전달된다.
#[derive(Debug, Clone)]
pub struct Options {
    pub client_id: String,
    pub playlist_dir: PathBuf,
    pub include_favourites: bool,
    pub include_sets: bool,
}

impl Options {
    /// 명령줄 값 > 설정 파일 > 기본값 순으로 고른다.
    pub fn merge(
        config: &Config,
        client_id: Option<String>,
        dir: Option<PathBuf>,
        include_favourites: bool,
        include_sets: bool,
    ) -> Self {
        let client_id = client_id
            .filter(|s| !s.is_empty())
            .or_else(|| config.soundcloud.client_id.clone().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let playlist_dir = dir
            .or_else(|| config.output.directory.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            client_id,
            playlist_dir,
            include_favourites,
            include_sets,
        }
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("m3ugrab")
        .join("config.toml")
}

pub fn load_config() -> Config {
    let path = config_path();
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            log::warn!("설정 파일을 읽을 수 없습니다 ({}): {}", path.display(), e);
            Config::default()
        }),
        Err(_) => Config::default(),
    }
}

pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}
