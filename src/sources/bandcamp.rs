use anyhow::Context;
use reqwest::blocking::Client;

use crate::error::{GrabError, Result};
use crate::sources::PageFetcher;

/// Bandcamp 페이지 HTML을 가져오는 클라이언트.
/// 인증 없이 페이지 본문을 통째로 읽는다.
pub struct BandcampClient {
    client: Client,
}

impl BandcampClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Bandcamp HTTP 클라이언트 생성에 실패했습니다")?;

        Ok(Self { client })
    }
}

impl PageFetcher for BandcampClient {
    // 응답은 이 함수 안에서만 살아 있으므로 어느 경로로 끝나든 연결이 반환된다.
    fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("GET {}", url);
        self.client
            .get(url)
            .send()
            .map_err(|e| GrabError::transport(url, e))?
            .error_for_status()
            .map_err(|e| GrabError::transport(url, e))?
            .text()
            .map_err(|e| GrabError::transport(url, e))
    }
}
