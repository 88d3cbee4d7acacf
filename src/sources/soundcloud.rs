use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{GrabError, Result};
use crate::sources::{ScPlaylist, ScPlaylistRef, ScTrack, ScUser, SoundcloudApi};

pub const API_BASE: &str = "https://api.soundcloud.com";
const PAGE_SIZE: &str = "200";

/// SoundCloud 공개 API 클라이언트. 모든 요청에 `client_id`를 붙인다.
pub struct SoundcloudClient {
    client: Client,
    /// 리다이렉트를 따라가지 않는 클라이언트. `/resolve`의 Location 헤더를 읽는다.
    resolver: Client,
    client_id: String,
}

#[derive(Deserialize)]
struct ResolvedResource {
    kind: String,
    id: u64,
}

#[derive(Deserialize)]
struct Page<T> {
    collection: Vec<T>,
    next_href: Option<String>,
}

impl SoundcloudClient {
    pub fn new(client_id: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("SoundCloud HTTP 클라이언트 생성에 실패했습니다")?;
        let resolver = Client::builder()
            .redirect(Policy::none())
            .build()
            .context("SoundCloud HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self {
            client,
            resolver,
            client_id: client_id.to_string(),
        })
    }

    /// URL에 `client_id`가 없으면 추가한다.
    fn authorized(&self, url: &str) -> Result<Url> {
        let mut parsed = Url::parse(url).map_err(|e| GrabError::transport(url, e))?;
        if !parsed.query_pairs().any(|(k, _)| k == "client_id") {
            parsed
                .query_pairs_mut()
                .append_pair("client_id", &self.client_id);
        }
        Ok(parsed)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        log::debug!("GET {}", url.path());
        let target = url.to_string();
        self.client
            .get(url)
            .send()
            .map_err(|e| GrabError::transport(&target, e))?
            .error_for_status()
            .map_err(|e| GrabError::transport(&target, e))?
            .json()
            .map_err(|e| GrabError::transport(&target, e))
    }

    fn get_resource<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.authorized(&format!("{}{}", API_BASE, path))?;
        self.get_json(url)
    }

    /// linked partitioning으로 나뉜 목록을 `next_href`가 없을 때까지 모두 가져온다.
    fn get_collection<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut url = self.authorized(&format!("{}{}", API_BASE, path))?;
        url.query_pairs_mut()
            .append_pair("limit", PAGE_SIZE)
            .append_pair("linked_partitioning", "1");

        let mut items = Vec::new();
        loop {
            let page: Page<T> = self.get_json(url)?;
            items.extend(page.collection);

            match page.next_href {
                Some(next) if !next.is_empty() => url = self.authorized(&next)?,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// 리다이렉트 대상 URL에서 정규 경로(`/tracks/42`)만 남긴다.
fn canonical_path(location: &str) -> Result<String> {
    Url::parse(location)
        .map(|u| u.path().to_string())
        .map_err(|e| GrabError::ResolutionFailed(format!("{} ({})", location, e)))
}

impl SoundcloudApi for SoundcloudClient {
    fn resolve(&self, url: &str) -> Result<String> {
        let resp = self
            .resolver
            .get(format!("{}/resolve", API_BASE))
            .query(&[("url", url), ("client_id", self.client_id.as_str())])
            .send()
            .map_err(|e| GrabError::ResolutionFailed(format!("{} ({})", url, e)))?;

        let status = resp.status();
        if status.is_redirection() {
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| GrabError::ResolutionFailed(format!("{} (Location 없음)", url)))?;
            return canonical_path(location);
        }

        if !status.is_success() {
            return Err(GrabError::ResolutionFailed(format!("{} ({})", url, status)));
        }

        let resource: ResolvedResource = resp
            .json()
            .map_err(|e| GrabError::ResolutionFailed(format!("{} ({})", url, e)))?;
        Ok(format!("/{}s/{}", resource.kind, resource.id))
    }

    fn get_track(&self, id: u64) -> Result<ScTrack> {
        self.get_resource(&format!("/tracks/{}", id))
    }

    fn get_playlist(&self, id: u64) -> Result<ScPlaylist> {
        self.get_resource(&format!("/playlists/{}", id))
    }

    fn get_user(&self, id: u64) -> Result<ScUser> {
        self.get_resource(&format!("/users/{}", id))
    }

    fn get_user_tracks(&self, id: u64) -> Result<Vec<ScTrack>> {
        self.get_collection(&format!("/users/{}/tracks", id))
    }

    fn get_user_favorites(&self, id: u64) -> Result<Vec<ScTrack>> {
        self.get_collection(&format!("/users/{}/favorites", id))
    }

    fn get_user_playlists(&self, id: u64) -> Result<Vec<ScPlaylistRef>> {
        self.get_collection(&format!("/users/{}/playlists", id))
    }
}
