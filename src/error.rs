use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrabError {
    #[error("URL이 없습니다. -u 또는 --url 옵션을 사용하세요")]
    MissingUrl,

    #[error("URL을 해석할 수 없습니다: {0}")]
    ResolutionFailed(String),

    #[error("알 수 없는 리소스입니다: {0} (트랙, 프로필, 플레이리스트 URL을 사용하세요)")]
    UnknownResource(String),

    #[error("{url} 요청에 실패했습니다: {source}")]
    Transport {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("앨범 데이터를 찾을 수 없습니다")]
    NoAlbumFound,

    #[error("앨범 트랙 정보가 일치하지 않습니다 (스트림 {streams}, 제목 {titles}, 길이 {durations})")]
    MalformedAlbumData {
        streams: usize,
        titles: usize,
        durations: usize,
    },

    #[error("파일 기록 오류: {0}")]
    Io(#[from] std::io::Error),
}

impl GrabError {
    pub fn transport(url: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        GrabError::Transport {
            url: url.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GrabError>;
