//! Levenshtein 편집 거리.
//!
//! 두 행만 유지하는 동적 계획법. 긴 쪽 문자열을 바깥 루프(소스)로 두어 행 폭을
//! 짧은 쪽 길이로 제한한다. 짧은 행은 스택 배열을, 긴 행은 풀에서 빌린 버퍼를 쓴다.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use screengate_core::error::CoreError;

/// 스택 배열로 처리하는 최대 행 폭
const STACK_ROW: usize = 64;

/// 풀에 보관할 최대 버퍼 수
const POOL_CAPACITY: usize = 8;

/// 긴 입력용 재사용 행 버퍼
static ROW_POOL: Lazy<Mutex<Vec<Vec<usize>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// 문자 단위 편집 거리
pub fn distance(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance_chars(&a, &b)
}

/// 입력 길이 상한을 두는 편집 거리.
///
/// 어느 한쪽이 `max_len` 문자를 넘으면 `CoreError::Compute`.
pub fn bounded_distance(a: &str, b: &str, max_len: usize) -> Result<usize, CoreError> {
    if a == b {
        return Ok(0);
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest > max_len {
        return Err(CoreError::Compute(format!(
            "편집 거리 입력이 너무 김: {longest}자 (최대 {max_len}자)"
        )));
    }
    Ok(distance_chars(&a, &b))
}

/// `distance / max(len(a), len(b))` (둘 다 비어 있으면 0)
pub fn change_ratio(a: &str, b: &str, max_len: usize) -> Result<f32, CoreError> {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return Ok(0.0);
    }
    let d = bounded_distance(a, b, max_len)?;
    Ok(d as f32 / longest as f32)
}

fn distance_chars(a: &[char], b: &[char]) -> usize {
    // 공통 접두사/접미사는 거리에 영향 없음
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let (source, target) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let width = target.len() + 1;

    if width <= STACK_ROW {
        let mut prev = [0usize; STACK_ROW];
        let mut curr = [0usize; STACK_ROW];
        return rolling_rows(source, target, &mut prev[..width], &mut curr[..width]);
    }

    let (mut prev, mut curr) = borrow_rows(width);
    let d = rolling_rows(source, target, &mut prev, &mut curr);
    return_rows(prev, curr);
    d
}

fn rolling_rows(
    source: &[char],
    target: &[char],
    prev: &mut [usize],
    curr: &mut [usize],
) -> usize {
    let (mut prev, mut curr) = (prev, curr);
    for (j, slot) in prev.iter_mut().enumerate() {
        *slot = j;
    }

    for (i, sc) in source.iter().enumerate() {
        curr[0] = i + 1;
        for (j, tc) in target.iter().enumerate() {
            let substitution = prev[j] + usize::from(sc != tc);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[target.len()]
}

fn borrow_rows(width: usize) -> (Vec<usize>, Vec<usize>) {
    let mut pool = ROW_POOL.lock();
    let mut take = || {
        let mut row = pool.pop().unwrap_or_default();
        row.clear();
        row.resize(width, 0);
        row
    };
    let prev = take();
    let curr = take();
    (prev, curr)
}

fn return_rows(prev: Vec<usize>, curr: Vec<usize>) {
    let mut pool = ROW_POOL.lock();
    for row in [prev, curr] {
        if pool.len() < POOL_CAPACITY {
            pool.push(row);
        }
    }
}
