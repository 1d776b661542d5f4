//! Splitting one transition asset into pre-roll, gap, and post-roll.

/// Durations (seconds) of the three sub-segments of a transition of
/// length `total`:
///
/// ```text
/// asset:  [0 ........ pre)[pre ... pre+gap)[pre+gap ...... total)
///          tail of prev     gap filler       head of next
/// ```
///
/// `post` is clamped to zero when `pre + gap >= total`; in that case the
/// visible overlays cover less than the whole asset while the audio track
/// still spans `total`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionPartition {
    pub total: f64,
    pub pre: f64,
    pub gap: f64,
    pub post: f64,
}

impl TransitionPartition {
    pub fn new(total: f64, pre: f64, gap: f64) -> Self {
        let total = total.max(0.0);
        let pre = pre.max(0.0);
        let gap = gap.max(0.0);
        Self {
            total,
            pre,
            gap,
            post: (total - pre - gap).max(0.0),
        }
    }

    /// Source range of the pre-roll slice: `[0, min(pre, total))`.
    pub fn pre_source(&self) -> (f64, f64) {
        (0.0, self.pre.min(self.total))
    }

    /// Source range of the gap slice, clipped to the asset. `None` when
    /// the pre-roll already consumed the whole asset.
    pub fn gap_source(&self) -> Option<(f64, f64)> {
        let start = self.pre;
        let end = (self.pre + self.gap).min(self.total);
        (end > start).then_some((start, end))
    }

    /// Source range of the post-roll slice: `[pre + gap, total)`.
    pub fn post_source(&self) -> Option<(f64, f64)> {
        (self.post > 0.0).then_some((self.pre + self.gap, self.total))
    }

    /// Whether the overlays together show the whole asset.
    pub fn is_exhaustive(&self) -> bool {
        self.pre + self.gap + self.post <= self.total + 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_partition() {
        let p = TransitionPartition::new(1.0, 0.4, 0.2);
        assert!((p.post - 0.4).abs() < 1e-9);
        assert_eq!(p.pre_source(), (0.0, 0.4));
        let (gap_start, gap_end) = p.gap_source().unwrap();
        assert!((gap_start - 0.4).abs() < 1e-9 && (gap_end - 0.6).abs() < 1e-9);
        let (post_start, post_end) = p.post_source().unwrap();
        assert!((post_start - 0.6).abs() < 1e-9 && (post_end - 1.0).abs() < 1e-9);
        assert!(p.is_exhaustive());
    }

    #[test]
    fn test_post_clamps_to_zero_when_pre_and_gap_cover_asset() {
        let p = TransitionPartition::new(0.5, 0.4, 0.2);
        assert_eq!(p.post, 0.0);
        assert!(p.post_source().is_none());
        let (start, end) = p.gap_source().unwrap();
        assert!((start - 0.4).abs() < 1e-9 && (end - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_gap_slice_disappears_when_pre_exceeds_asset() {
        let p = TransitionPartition::new(0.3, 0.4, 0.2);
        assert_eq!(p.pre_source(), (0.0, 0.3));
        assert!(p.gap_source().is_none());
        assert!(!p.is_exhaustive());
    }
}
