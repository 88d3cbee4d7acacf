use crate::error::{GrabError, Result};
use crate::models::{ResourceKind, ResourceReference, Site};
use crate::sources::SoundcloudApi;

/// URL의 사이트와 리소스 종류를 판별한다.
/// SoundCloud URL은 원격 resolve를 거쳐 리소스 종류와 id를 얻는다.
pub fn classify(url: &str, api: &dyn SoundcloudApi) -> Result<ResourceReference> {
    let url = url.trim();
    if url.is_empty() {
        return Err(GrabError::MissingUrl);
    }

    match detect_site(url) {
        Some(Site::Bandcamp) => classify_bandcamp(url),
        Some(Site::Soundcloud) => {
            let path = api.resolve(url)?;
            let (kind, id) = parse_canonical_path(&path)?;
            Ok(ResourceReference {
                site: Site::Soundcloud,
                kind,
                locator: url.to_string(),
                id: Some(id),
            })
        }
        None => Err(GrabError::UnknownResource(url.to_string())),
    }
}

fn detect_site(url: &str) -> Option<Site> {
    if url.contains("soundcloud.com") {
        Some(Site::Soundcloud)
    } else if url.contains("bandcamp.com") {
        Some(Site::Bandcamp)
    } else {
        None
    }
}

/// Bandcamp는 앨범과 트랙 페이지를 같은 방식으로 다룬다.
/// 그 외의 `*.bandcamp.com` 페이지는 프로필/레이블 카탈로그다.
pub fn classify_bandcamp(url: &str) -> Result<ResourceReference> {
    let kind = if url.contains("/album/") || url.contains("/track/") {
        ResourceKind::Album
    } else if url.contains(".bandcamp") {
        ResourceKind::Catalog
    } else {
        return Err(GrabError::UnknownResource(url.to_string()));
    };

    Ok(ResourceReference {
        site: Site::Bandcamp,
        kind,
        locator: url.to_string(),
        id: None,
    })
}

/// `/tracks/42`, `/users/7.json` 같은 정규 경로를 리소스 종류와 id로 나눈다.
pub fn parse_canonical_path(path: &str) -> Result<(ResourceKind, u64)> {
    let path = path.split('.').next().unwrap_or_default();
    let mut segments = path.split('/').skip(1);

    let resource = segments.next().unwrap_or_default();
    let kind = match resource {
        "tracks" => ResourceKind::Track,
        "playlists" => ResourceKind::Playlist,
        "users" => ResourceKind::User,
        "" => return Err(GrabError::ResolutionFailed(path.to_string())),
        other => return Err(GrabError::UnknownResource(other.to_string())),
    };

    let id = segments
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| GrabError::ResolutionFailed(path.to_string()))?;

    Ok((kind, id))
}
