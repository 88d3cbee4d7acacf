use std::fmt;

/// 플레이리스트에 기록되는 정규화된 트랙.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub stream: String,
    pub duration: u64,
    pub title: String,
    pub artist: String,
}

impl Track {
    /// `#EXTINF` 줄에 들어가는 "제목 - 아티스트" 문자열.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.title, self.artist)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Soundcloud,
    Bandcamp,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Soundcloud => write!(f, "SoundCloud"),
            Site::Bandcamp => write!(f, "Bandcamp"),
        }
    }
}

/// URL이 가리키는 리소스 종류. Bandcamp의 앨범/트랙 페이지는 모두 `Album`이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Track,
    Playlist,
    User,
    Album,
    Catalog,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub site: Site,
    pub kind: ResourceKind,
    pub locator: String,
    pub id: Option<u64>,
}

/// 앨범 페이지에서 추출한 트랙 한 개의 원시 필드.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrackEntry {
    pub stream_path: String,
    pub title_slug: String,
    pub duration: u64,
}

/// Bandcamp 앨범 페이지에서 추출한 중간 데이터.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAlbumMetadata {
    pub artist: String,
    pub title: String,
    pub entries: Vec<RawTrackEntry>,
}

/// 한 번의 집계 결과로 만들어져 한 번 기록되는 플레이리스트.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub label: String,
    pub tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(label: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            label: label.into(),
            tracks,
        }
    }
}
