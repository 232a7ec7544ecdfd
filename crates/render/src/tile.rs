//! Tile bucketing
//!
//! Splits one dimension of a scaled page into fixed-size tiles. Every tile
//! has the full tile length except the last one, which is clipped to the
//! remainder.

/// Default tile edge length in pixels
pub const DEFAULT_TILE_SIZE: i32 = 320;

/// Tiles covering one dimension of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileSpan {
    /// Number of tiles needed to cover the length
    pub count: i32,

    /// Offset of the last tile from the page edge
    pub last_start: i32,

    /// Length of the last tile
    pub last_len: i32,
}

impl TileSpan {
    /// Bucket `length` pixels into tiles of `tile` pixels
    ///
    /// A length that is an exact multiple of `tile` has no partial tile; the
    /// last tile then has the full tile length.
    pub fn compute(length: i32, tile: i32) -> Self {
        if length <= 0 || tile <= 0 {
            return Self::default();
        }

        let rem = length % tile;
        let count = length / tile + if rem != 0 { 1 } else { 0 };
        let last_len = if rem != 0 { rem } else { tile };

        Self {
            count,
            last_start: length - last_len,
            last_len,
        }
    }

    /// Start and end offset of tile `index`
    pub fn range_of(&self, index: i32, tile: i32) -> (i32, i32) {
        if index == self.count - 1 {
            (self.last_start, self.last_start + self.last_len)
        } else {
            let start = index * tile;
            (start, start + tile)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_last_tile() {
        let span = TileSpan::compute(2000, 320);
        assert_eq!(span.count, 7);
        assert_eq!(span.last_start, 1920);
        assert_eq!(span.last_len, 80);
        assert_eq!(span.range_of(0, 320), (0, 320));
        assert_eq!(span.range_of(6, 320), (1920, 2000));
    }

    #[test]
    fn test_exact_multiple_has_full_last_tile() {
        let span = TileSpan::compute(640, 320);
        assert_eq!(span.count, 2);
        assert_eq!(span.last_start, 320);
        assert_eq!(span.last_len, 320);
    }

    #[test]
    fn test_shorter_than_tile() {
        let span = TileSpan::compute(100, 320);
        assert_eq!(span.count, 1);
        assert_eq!(span.range_of(0, 320), (0, 100));
    }

    #[test]
    fn test_zero_length() {
        assert_eq!(TileSpan::compute(0, 320).count, 0);
        assert_eq!(TileSpan::compute(-4, 320).count, 0);
    }

    #[test]
    fn test_ranges_partition_length() {
        for length in [1, 319, 320, 321, 959, 960, 1500, 4097] {
            let span = TileSpan::compute(length, 320);
            let mut expected_start = 0;
            for i in 0..span.count {
                let (start, end) = span.range_of(i, 320);
                assert_eq!(start, expected_start, "gap before tile {i} of {length}");
                assert!(end > start);
                expected_start = end;
            }
            assert_eq!(expected_start, length);
        }
    }
}
