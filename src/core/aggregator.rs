use reqwest::Url;

use crate::config::Options;
use crate::core::classifier;
use crate::core::extractor;
use crate::core::writer::{PlaylistWriter, WriteOutcome};
use crate::error::{GrabError, Result};
use crate::models::{Playlist, RawAlbumMetadata, ResourceKind, ResourceReference, Track};
use crate::sources::{PageFetcher, ScTrack, SoundcloudApi};

/// 플레이리스트 하나에 대한 처리 결과.
#[derive(Debug)]
pub struct ItemReport {
    /// 성공하면 플레이리스트 레이블, 실패하면 실패한 리소스.
    pub source: String,
    pub result: Result<WriteOutcome>,
}

impl ItemReport {
    fn done(source: impl Into<String>, outcome: WriteOutcome) -> Self {
        Self {
            source: source.into(),
            result: Ok(outcome),
        }
    }

    fn failed(source: impl Into<String>, err: GrabError) -> Self {
        let source = source.into();
        log::warn!("{} 처리 실패: {}", source, err);
        Self {
            source,
            result: Err(err),
        }
    }
}

/// URL 하나를 분류하고 트랙을 모아 플레이리스트 파일로 기록한다.
///
/// 단일 리소스(트랙, 플레이리스트, 사용자 업로드, 앨범) 오류는 `run`의 오류로
/// 전파된다. 카탈로그의 앨범들과 사용자의 즐겨찾기/세트는 항목별로 실패가
/// 격리되어 `ItemReport`에 기록되고 나머지 항목은 계속 처리된다.
pub struct Aggregator<'a> {
    api: &'a dyn SoundcloudApi,
    fetcher: &'a dyn PageFetcher,
    options: &'a Options,
    writer: PlaylistWriter,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        api: &'a dyn SoundcloudApi,
        fetcher: &'a dyn PageFetcher,
        options: &'a Options,
    ) -> Self {
        Self {
            api,
            fetcher,
            options,
            writer: PlaylistWriter::new(&options.playlist_dir),
        }
    }

    pub fn run(&self, url: &str) -> Result<Vec<ItemReport>> {
        let reference = classifier::classify(url, self.api)?;
        log::info!("{} {:?} URL 확인: {}", reference.site, reference.kind, reference.locator);

        match reference.kind {
            ResourceKind::Track => Ok(vec![self.from_track(require_id(&reference)?)?]),
            ResourceKind::Playlist => Ok(vec![self.from_playlist(require_id(&reference)?)?]),
            ResourceKind::User => self.from_user(require_id(&reference)?),
            ResourceKind::Album => Ok(vec![self.from_album(&reference.locator)?]),
            ResourceKind::Catalog => self.from_catalog(&reference.locator),
        }
    }

    fn save(&self, playlist: Playlist) -> Result<ItemReport> {
        let outcome = self.writer.write(&playlist.label, &playlist.tracks)?;
        Ok(ItemReport::done(playlist.label, outcome))
    }

    fn from_track(&self, id: u64) -> Result<ItemReport> {
        let track = self.api.get_track(id)?;
        let label = format!("(Track) {} - {}", track.title, track.user.username);
        let tracks = vec![normalize_sc_track(&track, &self.options.client_id)];
        self.save(Playlist::new(label, tracks))
    }

    fn from_playlist(&self, id: u64) -> Result<ItemReport> {
        let playlist = self.api.get_playlist(id)?;
        let label = format!("(Playlist) {} by {}", playlist.title, playlist.user.username);
        let tracks = self.normalize_sc_tracks(&playlist.tracks);
        self.save(Playlist::new(label, tracks))
    }

    fn from_user(&self, id: u64) -> Result<Vec<ItemReport>> {
        let uploads = self.api.get_user_tracks(id)?;
        let user = self.api.get_user(id)?;

        let mut reports = vec![self.save(Playlist::new(
            format!("(Uploads) {}", user.username),
            self.normalize_sc_tracks(&uploads),
        ))?];

        if self.options.include_favourites {
            let label = format!("(Favourites) {}", user.username);
            let result = self
                .api
                .get_user_favorites(id)
                .and_then(|favs| self.save(Playlist::new(&label, self.normalize_sc_tracks(&favs))));
            reports.push(result.unwrap_or_else(|e| ItemReport::failed(label, e)));
        }

        if self.options.include_sets {
            match self.api.get_user_playlists(id) {
                Ok(sets) => {
                    for set in sets {
                        log::info!("세트 발견: {} ({})", set.title, set.id);
                        let report = self.from_playlist(set.id).unwrap_or_else(|e| {
                            ItemReport::failed(format!("(Playlist) {} [{}]", set.title, set.id), e)
                        });
                        reports.push(report);
                    }
                }
                Err(e) => reports.push(ItemReport::failed(format!("(Sets) {}", user.username), e)),
            }
        }

        Ok(reports)
    }

    fn from_album(&self, url: &str) -> Result<ItemReport> {
        let body = self.fetcher.fetch(url)?;
        let album = extractor::extract_album(&body)?;
        let label = format!("{} by {}", album.title, album.artist);
        self.save(Playlist::new(label, normalize_album(album)))
    }

    fn from_catalog(&self, url: &str) -> Result<Vec<ItemReport>> {
        let body = self.fetcher.fetch(url)?;
        let base = Url::parse(url).map_err(|e| GrabError::ResolutionFailed(format!("{} ({})", url, e)))?;

        let links = extractor::extract_album_links(&body);
        log::info!("{}에서 앨범 {}개 발견", url, links.len());

        let mut reports = Vec::with_capacity(links.len());
        for link in links {
            let album_url = match base.join(&link) {
                Ok(u) => u.to_string(),
                Err(e) => {
                    reports.push(ItemReport::failed(link, GrabError::ResolutionFailed(e.to_string())));
                    continue;
                }
            };
            log::info!("앨범: {}", album_url);

            let report = classifier::classify_bandcamp(&album_url)
                .and_then(|r| self.album_of(r))
                .unwrap_or_else(|e| ItemReport::failed(album_url, e));
            reports.push(report);
        }

        Ok(reports)
    }

    fn album_of(&self, reference: ResourceReference) -> Result<ItemReport> {
        if reference.kind != ResourceKind::Album {
            return Err(GrabError::UnknownResource(reference.locator));
        }
        self.from_album(&reference.locator)
    }

    fn normalize_sc_tracks(&self, tracks: &[ScTrack]) -> Vec<Track> {
        tracks
            .iter()
            .map(|t| normalize_sc_track(t, &self.options.client_id))
            .collect()
    }
}

fn require_id(reference: &ResourceReference) -> Result<u64> {
    reference
        .id
        .ok_or_else(|| GrabError::ResolutionFailed(reference.locator.clone()))
}

/// SoundCloud 트랙을 정규 트랙으로 바꾼다. 길이는 밀리초에서 초로 내림한다.
pub fn normalize_sc_track(track: &ScTrack, client_id: &str) -> Track {
    let stream = match &track.stream_url {
        Some(url) if !url.is_empty() => url.clone(),
        _ => format!("{}/tracks/{}/stream", crate::sources::soundcloud::API_BASE, track.id),
    };

    Track {
        stream: with_client_id(&stream, client_id),
        duration: track.duration / 1000,
        title: track.title.clone(),
        artist: track.user.username.clone(),
    }
}

/// 스트림 엔드포인트는 `client_id`가 없으면 요청을 거부한다.
pub fn with_client_id(stream: &str, client_id: &str) -> String {
    let sep = if stream.contains('?') { '&' } else { '?' };
    format!("{}{}client_id={}", stream, sep, client_id)
}

/// 앨범 아티스트를 모든 트랙에 반복해서 쓴다.
pub fn normalize_album(album: RawAlbumMetadata) -> Vec<Track> {
    let RawAlbumMetadata { artist, entries, .. } = album;
    entries
        .into_iter()
        .map(|entry| Track {
            stream: entry.stream_path,
            duration: entry.duration,
            title: entry.title_slug,
            artist: artist.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawTrackEntry;
    use crate::sources::{ScPlaylist, ScPlaylistRef, ScUser};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::path::Path;

    fn user(name: &str) -> ScUser {
        ScUser {
            username: name.to_string(),
        }
    }

    fn sc_track(id: u64, title: &str, duration: u64, uploader: &str) -> ScTrack {
        ScTrack {
            id,
            title: title.to_string(),
            duration,
            stream_url: Some(format!("https://api.soundcloud.com/tracks/{}/stream", id)),
            user: user(uploader),
        }
    }

    fn transport_error(what: &str) -> GrabError {
        GrabError::transport(what, anyhow::anyhow!("connection refused"))
    }

    #[derive(Default)]
    struct FakeApi {
        resolved: HashMap<String, String>,
        tracks: HashMap<u64, ScTrack>,
        playlists: HashMap<u64, ScPlaylist>,
        users: HashMap<u64, ScUser>,
        uploads: HashMap<u64, Vec<ScTrack>>,
        favorites: HashMap<u64, Vec<ScTrack>>,
        sets: HashMap<u64, Vec<ScPlaylistRef>>,
        calls: Cell<usize>,
    }

    impl FakeApi {
        fn hit(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn found<T: Clone>(map: &HashMap<u64, T>, id: u64, what: &str) -> Result<T> {
        map.get(&id)
            .cloned()
            .ok_or_else(|| transport_error(&format!("/{}/{}", what, id)))
    }

    impl SoundcloudApi for FakeApi {
        fn resolve(&self, url: &str) -> Result<String> {
            self.hit();
            self.resolved
                .get(url)
                .cloned()
                .ok_or_else(|| GrabError::ResolutionFailed(url.to_string()))
        }
        fn get_track(&self, id: u64) -> Result<ScTrack> {
            self.hit();
            found(&self.tracks, id, "tracks")
        }
        fn get_playlist(&self, id: u64) -> Result<ScPlaylist> {
            self.hit();
            found(&self.playlists, id, "playlists")
        }
        fn get_user(&self, id: u64) -> Result<ScUser> {
            self.hit();
            found(&self.users, id, "users")
        }
        fn get_user_tracks(&self, id: u64) -> Result<Vec<ScTrack>> {
            self.hit();
            found(&self.uploads, id, "users/tracks")
        }
        fn get_user_favorites(&self, id: u64) -> Result<Vec<ScTrack>> {
            self.hit();
            found(&self.favorites, id, "users/favorites")
        }
        fn get_user_playlists(&self, id: u64) -> Result<Vec<ScPlaylistRef>> {
            self.hit();
            found(&self.sets, id, "users/playlists")
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        calls: Cell<usize>,
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&self, url: &str) -> Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.pages.get(url).cloned().ok_or_else(|| transport_error(url))
        }
    }

    fn options(dir: &Path) -> Options {
        Options {
            client_id: "secret".to_string(),
            playlist_dir: dir.to_path_buf(),
            include_favourites: false,
            include_sets: false,
        }
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn album_page(artist: &str, title: &str, slugs: &[&str]) -> String {
        let tracks: Vec<String> = slugs
            .iter()
            .enumerate()
            .map(|(i, slug)| {
                format!(
                    r#"{{"file":{{"mp3-128":"//t4.bcbits.com/stream/{i}"}},"title_link":"/track/{slug}","duration":{}.5}}"#,
                    60 + i
                )
            })
            .collect();
        format!(
            "<script>var TralbumData = {{ current: {{\"title\":\"{title}\"}}, artist: \"{artist}\", trackinfo: [{}] }};</script>",
            tracks.join(",")
        )
    }

    #[test]
    fn test_duration_truncates() {
        let track = normalize_sc_track(&sc_track(1, "T", 125_999, "U"), "id");
        assert_eq!(track.duration, 125);
        let track = normalize_sc_track(&sc_track(1, "T", 125_000, "U"), "id");
        assert_eq!(track.duration, 125);
    }

    #[test]
    fn test_stream_gets_client_id() {
        assert_eq!(
            with_client_id("https://api.soundcloud.com/tracks/1/stream", "abc"),
            "https://api.soundcloud.com/tracks/1/stream?client_id=abc"
        );
        assert_eq!(
            with_client_id("https://cdn/x?secret_token=s", "abc"),
            "https://cdn/x?secret_token=s&client_id=abc"
        );
    }

    #[test]
    fn test_missing_stream_url_falls_back() {
        let mut track = sc_track(9, "T", 1000, "U");
        track.stream_url = None;
        assert_eq!(
            normalize_sc_track(&track, "abc").stream,
            "https://api.soundcloud.com/tracks/9/stream?client_id=abc"
        );
    }

    #[test]
    fn test_album_artist_on_every_track() {
        let album = RawAlbumMetadata {
            artist: "Band".to_string(),
            title: "LP".to_string(),
            entries: vec![
                RawTrackEntry {
                    stream_path: "https://a/1".to_string(),
                    title_slug: "one".to_string(),
                    duration: 1,
                },
                RawTrackEntry {
                    stream_path: "https://a/2".to_string(),
                    title_slug: "two".to_string(),
                    duration: 2,
                },
            ],
        };
        let tracks = normalize_album(album);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.artist == "Band"));
        assert_eq!(tracks[1].title, "two");
    }

    #[test]
    fn test_single_track_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://soundcloud.com/band/song";
        let mut api = FakeApi::default();
        api.resolved.insert(url.to_string(), "/tracks/42".to_string());
        api.tracks.insert(42, sc_track(42, "Song", 180_000, "Band"));
        let fetcher = FakeFetcher::default();
        let opts = options(dir.path());

        let reports = Aggregator::new(&api, &fetcher, &opts).run(url).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].source, "(Track) Song - Band");

        let path = dir.path().join("(Track) Song - Band.m3u");
        assert!(matches!(&reports[0].result, Ok(WriteOutcome::Saved(p)) if *p == path));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "#EXTM3U\n#EXTINF:180,Song - Band\nhttps://api.soundcloud.com/tracks/42/stream?client_id=secret\n"
        );
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_catalog_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = "https://label.bandcamp.com";
        let catalog_page = r#"<html><body>
            <a href="/album/good">Good</a>
            <a href="/album/bad">Bad</a>
            <a href="/album/gone">Gone</a>
        </body></html>"#;
        let bad_page = r#"<script>var TralbumData = { artist: "X", current: {"title":"Bad"}, trackinfo: [
            {"file":{"mp3-128":"//cdn/1"},"title_link":"/track/a","duration":1},
            {"file":{"mp3-128":"//cdn/2"},"duration":2}
        ] };</script>"#;

        let mut fetcher = FakeFetcher::default();
        fetcher.pages.insert(catalog.to_string(), catalog_page.to_string());
        fetcher.pages.insert(
            "https://label.bandcamp.com/album/good".to_string(),
            album_page("Label Artist", "Good Album", &["first", "second"]),
        );
        fetcher
            .pages
            .insert("https://label.bandcamp.com/album/bad".to_string(), bad_page.to_string());
        let api = FakeApi::default();
        let opts = options(dir.path());

        let reports = Aggregator::new(&api, &fetcher, &opts).run(catalog).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(matches!(reports[0].result, Ok(WriteOutcome::Saved(_))));
        assert!(matches!(
            reports[1].result,
            Err(GrabError::MalformedAlbumData { .. })
        ));
        assert!(matches!(reports[2].result, Err(GrabError::Transport { .. })));
        assert_eq!(reports[2].source, "https://label.bandcamp.com/album/gone");

        assert_eq!(files_in(dir.path()), vec!["Good Album by Label Artist.m3u"]);
        let content =
            std::fs::read_to_string(dir.path().join("Good Album by Label Artist.m3u")).unwrap();
        assert_eq!(
            content,
            "#EXTM3U\n\
             #EXTINF:60,first - Label Artist\nhttps://t4.bcbits.com/stream/0\n\
             #EXTINF:61,second - Label Artist\nhttps://t4.bcbits.com/stream/1\n"
        );
        assert_eq!(api.calls.get(), 0);
    }

    #[test]
    fn test_catalog_page_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let fetcher = FakeFetcher::default();
        let opts = options(dir.path());

        let result = Aggregator::new(&api, &fetcher, &opts).run("https://label.bandcamp.com");
        assert!(matches!(result, Err(GrabError::Transport { .. })));
    }

    #[test]
    fn test_empty_url() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeApi::default();
        let fetcher = FakeFetcher::default();
        let opts = options(dir.path());

        let result = Aggregator::new(&api, &fetcher, &opts).run("");
        assert!(matches!(result, Err(GrabError::MissingUrl)));
        assert_eq!(api.calls.get(), 0);
        assert_eq!(fetcher.calls.get(), 0);
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn test_single_album_malformed_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://band.bandcamp.com/album/broken";
        let mut fetcher = FakeFetcher::default();
        fetcher.pages.insert(url.to_string(), "<html></html>".to_string());
        let api = FakeApi::default();
        let opts = options(dir.path());

        let result = Aggregator::new(&api, &fetcher, &opts).run(url);
        assert!(matches!(result, Err(GrabError::NoAlbumFound)));
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn test_playlist_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://soundcloud.com/dj/sets/mix";
        let mut api = FakeApi::default();
        api.resolved.insert(url.to_string(), "/playlists/5".to_string());
        api.playlists.insert(
            5,
            ScPlaylist {
                title: "Mix".to_string(),
                user: user("DJ"),
                tracks: vec![sc_track(1, "B", 2000, "X"), sc_track(2, "A", 1000, "Y")],
            },
        );
        let fetcher = FakeFetcher::default();
        let opts = options(dir.path());

        let reports = Aggregator::new(&api, &fetcher, &opts).run(url).unwrap();
        assert_eq!(reports[0].source, "(Playlist) Mix by DJ");
        let content = std::fs::read_to_string(dir.path().join("(Playlist) Mix by DJ.m3u")).unwrap();
        let titles: Vec<&str> = content
            .lines()
            .filter(|l| l.starts_with("#EXTINF"))
            .collect();
        assert_eq!(titles, vec!["#EXTINF:2,B - X", "#EXTINF:1,A - Y"]);
    }

    #[test]
    fn test_user_with_side_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://soundcloud.com/someone";
        let mut api = FakeApi::default();
        api.resolved.insert(url.to_string(), "/users/7".to_string());
        api.users.insert(7, user("someone"));
        api.uploads.insert(7, vec![sc_track(1, "Upload", 3000, "someone")]);
        api.favorites.insert(7, vec![]);
        api.sets.insert(
            7,
            vec![
                ScPlaylistRef {
                    id: 11,
                    title: "Broken".to_string(),
                },
                ScPlaylistRef {
                    id: 12,
                    title: "Works".to_string(),
                },
            ],
        );
        api.playlists.insert(
            12,
            ScPlaylist {
                title: "Works".to_string(),
                user: user("someone"),
                tracks: vec![sc_track(2, "Set Song", 4000, "other")],
            },
        );
        let fetcher = FakeFetcher::default();
        let mut opts = options(dir.path());
        opts.include_favourites = true;
        opts.include_sets = true;

        let reports = Aggregator::new(&api, &fetcher, &opts).run(url).unwrap();
        let sources: Vec<&str> = reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(
            sources,
            vec![
                "(Uploads) someone",
                "(Favourites) someone",
                "(Playlist) Broken [11]",
                "(Playlist) Works by someone",
            ]
        );
        assert!(matches!(reports[1].result, Ok(WriteOutcome::Skipped)));
        assert!(reports[2].result.is_err());

        assert_eq!(
            files_in(dir.path()),
            vec!["(Playlist) Works by someone.m3u", "(Uploads) someone.m3u"]
        );
    }

    #[test]
    fn test_user_side_output_failures_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://soundcloud.com/someone";
        let mut api = FakeApi::default();
        api.resolved.insert(url.to_string(), "/users/7".to_string());
        api.users.insert(7, user("someone"));
        api.uploads.insert(7, vec![sc_track(1, "Upload", 3000, "someone")]);
        // 즐겨찾기와 세트 목록은 등록하지 않아 전송 오류가 난다
        let fetcher = FakeFetcher::default();
        let mut opts = options(dir.path());
        opts.include_favourites = true;
        opts.include_sets = true;

        let reports = Aggregator::new(&api, &fetcher, &opts).run(url).unwrap();
        let sources: Vec<&str> = reports.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(
            sources,
            vec!["(Uploads) someone", "(Favourites) someone", "(Sets) someone"]
        );
        assert!(matches!(reports[0].result, Ok(WriteOutcome::Saved(_))));
        assert!(matches!(reports[1].result, Err(GrabError::Transport { .. })));
        assert!(matches!(reports[2].result, Err(GrabError::Transport { .. })));

        assert_eq!(files_in(dir.path()), vec!["(Uploads) someone.m3u"]);
    }

    #[test]
    fn test_user_without_flags_only_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://soundcloud.com/someone";
        let mut api = FakeApi::default();
        api.resolved.insert(url.to_string(), "/users/7".to_string());
        api.users.insert(7, user("someone"));
        api.uploads.insert(7, vec![sc_track(1, "Upload", 3000, "someone")]);
        let fetcher = FakeFetcher::default();
        let opts = options(dir.path());

        let reports = Aggregator::new(&api, &fetcher, &opts).run(url).unwrap();
        assert_eq!(reports.len(), 1);
        // resolve, uploads, user
        assert_eq!(api.calls.get(), 3);
    }
}
