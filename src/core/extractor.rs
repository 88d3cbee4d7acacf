use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{GrabError, Result};
use crate::models::{RawAlbumMetadata, RawTrackEntry};

const UNKNOWN_ARTIST: &str = "Unknown Artist";

static TRALBUM_ASSIGN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+TralbumData\s*=\s*").unwrap());

static ARTIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\W)artist"?\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\W)title"?\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

static STREAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"mp3-128"?\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap());

// 일반 title 키는 다른 중첩 객체에도 있으므로 트랙 제목은 링크 slug에서 가져온다.
static TITLE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"title_link"?\s*:\s*"/track/((?:[^"\\]|\\.)*)""#).unwrap()
});

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\W)duration"?\s*:\s*([^,}\]]*)"#).unwrap());

static TRALBUM_SCRIPT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script[data-tralbum]").unwrap());

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// 앨범 페이지 본문에서 아티스트, 앨범 제목, 트랙 목록을 추출한다.
///
/// 앨범 데이터는 `var TralbumData = ...;` 객체 리터럴(예전 페이지) 또는
/// `<script data-tralbum>` 속성(현재 페이지)에 들어 있다.
/// 스트림, 제목, 길이 배열의 개수가 하나라도 다르면 앨범 전체를 버린다.
pub fn extract_album(body: &str) -> Result<RawAlbumMetadata> {
    let blob = find_album_blob(body).ok_or(GrabError::NoAlbumFound)?;

    let artist = first_capture(&ARTIST, &blob).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
    let title = first_capture(&TITLE, &blob).ok_or(GrabError::NoAlbumFound)?;

    let streams = all_captures(&STREAM, &blob);
    let titles = all_captures(&TITLE_LINK, &blob);
    let durations: Vec<u64> = DURATION
        .captures_iter(&blob)
        .map(|c| parse_duration(&c[1]))
        .collect();

    assemble(artist, title, streams, titles, durations)
}

/// 세 배열의 길이가 같을 때만 `RawAlbumMetadata`를 만든다.
pub fn assemble(
    artist: String,
    title: String,
    streams: Vec<String>,
    titles: Vec<String>,
    durations: Vec<u64>,
) -> Result<RawAlbumMetadata> {
    if titles.len() != streams.len() || durations.len() != streams.len() {
        return Err(GrabError::MalformedAlbumData {
            streams: streams.len(),
            titles: titles.len(),
            durations: durations.len(),
        });
    }

    let entries = streams
        .into_iter()
        .zip(titles)
        .zip(durations)
        .map(|((stream, slug), duration)| RawTrackEntry {
            stream_path: absolute_stream_url(&stream),
            title_slug: slug,
            duration,
        })
        .collect();

    Ok(RawAlbumMetadata {
        artist,
        title,
        entries,
    })
}

/// 프로필/레이블 페이지에서 앨범과 트랙 링크를 문서 순서대로 찾는다.
pub fn extract_album_links(body: &str) -> Vec<String> {
    let document = Html::parse_document(body);
    let mut links: Vec<String> = Vec::new();

    for el in document.select(&ANCHOR) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if !is_album_link(href) {
            continue;
        }
        if !links.iter().any(|l| l == href) {
            links.push(href.to_string());
        }
    }

    links
}

fn is_album_link(href: &str) -> bool {
    // `https://host/...`와 `//host/...` 모두 호스트 부분을 떼어 낸다
    let after_host = match href.find("://") {
        Some(pos) => Some(&href[pos + 3..]),
        None => href.strip_prefix("//"),
    };
    let path = match after_host {
        Some(rest) => rest.find('/').map(|i| &rest[i..]).unwrap_or(""),
        None => href,
    };
    path.starts_with("/album/") || path.starts_with("/track/")
}

/// `//host/path` 형태의 스트림 경로를 `https://host/path`로 바꾼다.
pub fn absolute_stream_url(path: &str) -> String {
    match path.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => path.to_string(),
    }
}

fn find_album_blob(body: &str) -> Option<Cow<'_, str>> {
    if let Some(block) = assigned_block(body) {
        return Some(Cow::Borrowed(block));
    }

    let document = Html::parse_document(body);
    let data = document
        .select(&TRALBUM_SCRIPT)
        .next()
        .and_then(|el| el.value().attr("data-tralbum"))
        .map(|data| data.to_string());
    data.map(Cow::Owned)
}

/// `var TralbumData = ...;` 의 우변. 문자열과 주석(`//`, `/* */`) 밖,
/// 중첩 깊이 0의 첫 `;`에서 끝난다.
fn assigned_block(body: &str) -> Option<&str> {
    let start = TRALBUM_ASSIGN.find(body)?.end();
    let rest = &body[start..];

    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut in_comment = false;
    let mut in_block_comment = false;
    let mut prev = '\0';

    for (i, c) in rest.char_indices() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
        } else if in_block_comment {
            if prev == '*' && c == '/' {
                in_block_comment = false;
                // 닫는 `/`가 다음 문자와 `//`로 묶이지 않게 한다
                prev = '\0';
                continue;
            }
        } else if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '"' | '\'' => quote = Some(c),
                '/' if prev == '/' => in_comment = true,
                '*' if prev == '/' => {
                    in_block_comment = true;
                    // `/*/`를 닫힌 주석으로 보지 않는다
                    prev = '\0';
                    continue;
                }
                '{' | '[' | '(' => depth += 1,
                '}' | ']' | ')' => depth -= 1,
                ';' if depth <= 0 => return Some(rest[..i].trim()),
                _ => {}
            }
        }
        prev = c;
    }

    None
}

fn first_capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack).map(|c| unescape(&c[1]))
}

fn all_captures(re: &Regex, haystack: &str) -> Vec<String> {
    re.captures_iter(haystack).map(|c| unescape(&c[1])).collect()
}

/// JSON 문자열 이스케이프(`\"`, `\u00e9`, `\/`)를 푼다. 실패하면 원문을 쓴다.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// 숫자가 아니면 0. 소수점 이하는 버린다.
fn parse_duration(raw: &str) -> u64 {
    match raw.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => secs as u64,
        _ => 0,
    }
}
