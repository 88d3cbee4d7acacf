use std::path::PathBuf;

use crate::core::filename;
use crate::error::Result;
use crate::models::Track;

const M3U_HEADER: &str = "#EXTM3U";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Saved(PathBuf),
    /// 트랙이 없어 파일을 만들지 않았다.
    Skipped,
}

pub struct PlaylistWriter {
    dir: PathBuf,
}

impl PlaylistWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 트랙 목록을 `<dir>/<label>.m3u`에 기록한다.
    /// 트랙이 비어 있으면 파일을 만들지 않고 `Skipped`를 반환한다.
    pub fn write(&self, label: &str, tracks: &[Track]) -> Result<WriteOutcome> {
        if tracks.is_empty() {
            log::info!("빈 플레이리스트, 건너뜁니다: {}", label);
            return Ok(WriteOutcome::Skipped);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = filename::playlist_path(&self.dir, label);

        // 기록 도중 실패하면 잘린 파일을 남기지 않는다
        if let Err(e) = std::fs::write(&path, render_m3u(tracks)) {
            if path.is_file() {
                let _ = std::fs::remove_file(&path);
            }
            return Err(e.into());
        }

        log::info!("플레이리스트 저장됨: {}", path.display());
        Ok(WriteOutcome::Saved(path))
    }
}

/// 확장 M3U 형식으로 직렬화한다. 트랙 순서는 그대로 유지된다.
pub fn render_m3u(tracks: &[Track]) -> String {
    let mut out = String::from(M3U_HEADER);
    out.push('\n');
    for track in tracks {
        out.push_str(&format!(
            "#EXTINF:{},{}\n{}\n",
            track.duration,
            track.display_name(),
            track.stream
        ));
    }
    out
}
