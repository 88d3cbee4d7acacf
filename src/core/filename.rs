use std::path::{Path, PathBuf};

/// 파일명에 사용할 수 없는 문자를 `_`로 치환한다.
/// 연속된 공백은 하나로 합치고 앞뒤 공백과 마침표는 제거한다.
pub fn sanitize_filename(s: &str) -> String {
    let replaced: String = s
        .chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                return '_';
            }
            if c.is_control() {
                return '_';
            }
            c
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches('.').trim().to_string()
}

/// 레이블에서 `"{label}.m3u"` 경로를 만든다. 확장자는 항상 한 번만 붙는다.
pub fn playlist_path(dir: &Path, label: &str) -> PathBuf {
    let mut name = sanitize_filename(label);
    if name.is_empty() {
        name = "playlist".to_string();
    }
    dir.join(format!("{}.m3u", name))
}
