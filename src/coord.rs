//! Coordinate encoder: maps half-open genomic intervals `[beg, end)` to a
//! binned (level, bin) address, and maps query intervals to the set of
//! (level, bin-range) pairs that must be probed to find every overlap.

use crate::error::{GenomicSqliteError, Result};

/// Branching factor between adjacent levels.
pub const BRANCH: i64 = 16;
/// Number of levels, `[0, GRI_MAX_LEVEL]`.
pub const GRI_LEVELS: i64 = 9;
/// Finest (deepest) level index.
pub const GRI_MAX_LEVEL: i64 = GRI_LEVELS - 1;
/// Largest coordinate representable in the 36-bit domain, inclusive.
pub const GRI_MAX_POS: i64 = (1i64 << 36) - 1;

/// Bin width at level `L`: `16^(MAX_LEVEL - L + 1)`.
pub fn bin_width(level: i64) -> i64 {
    debug_assert!((0..GRI_LEVELS).contains(&level));
    BRANCH.pow((GRI_MAX_LEVEL - level + 1) as u32)
}

/// Bin index of position `p` at level `L`.
pub fn bin(level: i64, p: i64) -> i64 {
    p / bin_width(level)
}

fn validate(beg: i64, end: i64) -> Result<()> {
    if beg < 0 {
        return Err(GenomicSqliteError::OutOfRange(format!(
            "beg must be >= 0, got {beg}"
        )));
    }
    if end < beg {
        return Err(GenomicSqliteError::OutOfRange(format!(
            "end ({end}) must be >= beg ({beg})"
        )));
    }
    if end > GRI_MAX_POS + 1 {
        return Err(GenomicSqliteError::OutOfRange(format!(
            "end ({end}) exceeds GRI_MAX_POS+1 ({})",
            GRI_MAX_POS + 1
        )));
    }
    Ok(())
}

/// The finest level `L` whose bin at `beg` also contains `end - 1`.
///
/// Degenerate `end == beg` is treated as a point interval of width 1 for
/// level selection (spec §4.1).
pub fn level(beg: i64, end: i64) -> Result<i64> {
    validate(beg, end)?;
    let last = if end == beg { beg } else { end - 1 };
    for l in (0..GRI_LEVELS).rev() {
        if bin(l, beg) == bin(l, last) {
            return Ok(l);
        }
    }
    // Level 0 spans the whole 36-bit domain, so this is unreachable for
    // any validated (beg, end).
    Err(GenomicSqliteError::Internal(format!(
        "no level found for beg={beg} end={end}"
    )))
}

/// Inclusive bin range `[lo, hi]` at level `L` that must be scanned to find
/// every stored interval overlapping `[qbeg, qend)`, using a loose
/// `maxWidth(L) = bin_width(L)` bound (the safe form, spec §4.1).
pub fn query_bin_range(level: i64, qbeg: i64, qend: i64) -> (i64, i64) {
    query_bin_range_with_max_width(level, qbeg, qend, bin_width(level))
}

/// As [`query_bin_range`], but with a caller-supplied `maxWidth(L)` — the
/// tightened bound used by the optimized query compiler (spec §4.3).
pub fn query_bin_range_with_max_width(level: i64, qbeg: i64, qend: i64, max_width: i64) -> (i64, i64) {
    let lo_pos = (qbeg - max_width + 1).max(0);
    let hi_pos = (qend - 1).max(0);
    (bin(level, lo_pos), bin(level, hi_pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn bin_width_extremes() {
        assert_eq!(bin_width(0), 16i64.pow(9));
        assert!(bin_width(0) >= GRI_MAX_POS + 1);
        assert_eq!(bin_width(GRI_MAX_LEVEL), 16);
    }

    #[rstest]
    #[case(1000, 2000, 6)] // spec §8 scenario 1
    #[case(0, 1, 8)] // point interval, scenario 2
    #[case(0, GRI_MAX_POS + 1, 0)] // full-genome interval, scenario 3
    fn level_scenarios(#[case] beg: i64, #[case] end: i64, #[case] expected: i64) {
        assert_eq!(level(beg, end).unwrap(), expected);
    }

    #[test]
    fn level_bin_equal_at_and_below_selected_level() {
        let beg = 1000;
        let end = 2000;
        let l = level(beg, end).unwrap();
        assert_eq!(bin(l, beg), bin(l, end - 1));
        for finer in (l + 1)..GRI_LEVELS {
            assert_ne!(
                bin(finer, beg),
                bin(finer, end - 1),
                "finer level {finer} should split the interval"
            );
        }
        for coarser in 0..l {
            assert_eq!(
                bin(coarser, beg),
                bin(coarser, end - 1),
                "coarser level {coarser} should also contain the interval"
            );
        }
    }

    #[test]
    fn rejects_negative_beg() {
        assert!(matches!(
            level(-1, 10),
            Err(GenomicSqliteError::OutOfRange(_))
        ));
    }

    #[test]
    fn rejects_end_before_beg() {
        assert!(matches!(
            level(10, 5),
            Err(GenomicSqliteError::OutOfRange(_))
        ));
    }

    #[test]
    fn rejects_end_beyond_domain() {
        assert!(matches!(
            level(0, GRI_MAX_POS + 2),
            Err(GenomicSqliteError::OutOfRange(_))
        ));
    }

    #[test]
    fn query_bin_range_covers_stored_interval() {
        // A stored interval (1000, 2000) at its own level must fall inside
        // the query bin range for an overlapping query.
        let (beg, end) = (1000, 2000);
        let lvl = level(beg, end).unwrap();
        let (qbeg, qend) = (500, 1500);
        let (lo, hi) = query_bin_range(lvl, qbeg, qend);
        let stored_bin = bin(lvl, beg);
        assert!((lo..=hi).contains(&stored_bin));
    }
}
