use std::ops::Range;

/// 把要求的 chunk 大小限制在 `1..=max`
pub fn effective_chunk_size(requested: usize, max: usize) -> usize {
    requested.clamp(1, max.max(1))
}

/// 依序切出 `[start, end)` 範圍，最後一段可能較短
pub fn chunk_ranges(len: usize, chunk_size: usize) -> impl Iterator<Item = Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(move |start| start..(start + chunk_size).min(len))
}

pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    len.div_ceil(chunk_size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_chunk_size_bounds() {
        assert_eq!(effective_chunk_size(0, 500), 1);
        assert_eq!(effective_chunk_size(1000, 500), 500);
        assert_eq!(effective_chunk_size(10, 500), 10);
        assert_eq!(effective_chunk_size(10, 0), 1);
    }

    #[test]
    fn test_chunk_ranges_cover_input() {
        for (len, size) in [(0, 3), (1, 3), (9, 3), (10, 3), (1201, 500)] {
            let ranges: Vec<_> = chunk_ranges(len, size).collect();
            assert_eq!(ranges.len(), chunk_count(len, size));
            assert_eq!(ranges.iter().map(|r| r.len()).sum::<usize>(), len);
            assert!(ranges.iter().all(|r| r.len() <= size));
        }
    }
}
