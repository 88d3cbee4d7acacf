pub mod bandcamp;
pub mod soundcloud;

use serde::Deserialize;

use crate::error::Result;

/// SoundCloud 사용자. 트랙과 플레이리스트의 소유자로도 쓰인다.
#[derive(Debug, Clone, Deserialize)]
pub struct ScUser {
    pub username: String,
}

/// SoundCloud API의 트랙 레코드. `duration`은 밀리초다.
#[derive(Debug, Clone, Deserialize)]
pub struct ScTrack {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub duration: u64,
    pub stream_url: Option<String>,
    pub user: ScUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScPlaylist {
    pub title: String,
    pub user: ScUser,
    #[serde(default)]
    pub tracks: Vec<ScTrack>,
}

/// 사용자 플레이리스트 목록의 항목. 트랙은 id로 다시 가져온다.
#[derive(Debug, Clone, Deserialize)]
pub struct ScPlaylistRef {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

/// SoundCloud 원격 API 기능.
/// 실제 HTTP 클라이언트와 테스트용 가짜 구현이 이 트레이트를 공유한다.
pub trait SoundcloudApi {
    /// 임의의 URL을 `/<resource>/<id>` 형태의 정규 경로로 해석한다.
    fn resolve(&self, url: &str) -> Result<String>;
    fn get_track(&self, id: u64) -> Result<ScTrack>;
    fn get_playlist(&self, id: u64) -> Result<ScPlaylist>;
    fn get_user(&self, id: u64) -> Result<ScUser>;
    fn get_user_tracks(&self, id: u64) -> Result<Vec<ScTrack>>;
    fn get_user_favorites(&self, id: u64) -> Result<Vec<ScTrack>>;
    fn get_user_playlists(&self, id: u64) -> Result<Vec<ScPlaylistRef>>;
}

/// HTML 페이지 본문을 가져오는 기능.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}
