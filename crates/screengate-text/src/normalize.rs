//! 텍스트 정규화.
//!
//! OCR 결과를 비교 가능한 형태로 맞춘다.
//! - `<...>` 형태의 마크업 태그 제거
//! - 전각 영숫자/기호와 전각 공백을 반각으로
//! - 연속 공백을 하나로
//! - 끝에 붙는 장식 문자(대사 넘김 표시 등)와 공백 제거

/// 끝에서 잘라낼 장식 문자
const TRAILING_DECORATIONS: &[char] = &[
    '▼', '▽', '▲', '△', '►', '▶', '▷', '▸', '◆', '◇', '■', '□', '●', '○', '★', '☆', '♪', '♫',
    '↓', '⏎', '↵',
];

/// 비교용 정규화 텍스트
pub fn normalize(text: &str) -> String {
    let stripped = strip_tags(text);

    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for ch in stripped.chars().map(fold_width) {
        if ch.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(ch);
    }

    let trimmed_len = out
        .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_DECORATIONS.contains(&c))
        .len();
    out.truncate(trimmed_len);
    out
}

/// 문자 수 (바이트 수가 아님)
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// `<`로 시작해 같은 줄 안에서 `>`로 닫히는 태그 제거.
///
/// 태그 이름은 영문자 또는 `/`로 시작해야 한다. `a < b` 같은 비교식은 남긴다.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match tag_end(after) {
            Some(end) => rest = &after[end + 1..],
            None => {
                out.push('<');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// 태그 본문이면 닫는 `>`의 위치
fn tag_end(after_open: &str) -> Option<usize> {
    let first = after_open.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '/') {
        return None;
    }
    let end = after_open.find(['>', '<', '\n'])?;
    after_open[end..].starts_with('>').then_some(end)
}

/// 전각 → 반각 (U+FF01..U+FF5E, U+3000)
fn fold_width(ch: char) -> char {
    match ch {
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(ch as u32 - 0xFEE0).unwrap_or(ch),
        _ => ch,
    }
}
