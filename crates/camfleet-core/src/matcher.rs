// ── Resolution matching ──
//
// Picks the advertised resolution closest to a target. Candidates whose
// aspect ratio is within tolerance of the target's are preferred by pixel
// count; only if none qualify does the closest shape win.

use crate::config::LOOSE_RATIO_TOLERANCE;
use crate::model::Resolution;

/// Two-tier best-fit resolution selector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionMatcher {
    ratio_tolerance: f64,
}

impl Default for ResolutionMatcher {
    fn default() -> Self {
        Self::new(LOOSE_RATIO_TOLERANCE)
    }
}

struct Candidate {
    resolution: Resolution,
    area_diff: u64,
    ratio_diff: f64,
}

impl ResolutionMatcher {
    pub fn new(ratio_tolerance: f64) -> Self {
        Self { ratio_tolerance }
    }

    pub fn ratio_tolerance(&self) -> f64 {
        self.ratio_tolerance
    }

    /// Best match for `target` among `available`, or [`Resolution::ZERO`]
    /// when `available` is empty. Ties keep the earliest candidate.
    #[allow(clippy::float_cmp)]
    pub fn best_match(&self, target: Resolution, available: &[Resolution]) -> Resolution {
        let target_area = target.area();
        let target_ratio = target.aspect_ratio();

        let candidates = available.iter().map(|&resolution| Candidate {
            resolution,
            area_diff: target_area.abs_diff(resolution.area()),
            ratio_diff: (target_ratio - resolution.aspect_ratio()).abs(),
        });

        let mut in_tolerance: Option<Candidate> = None;
        let mut closest_shape: Option<Candidate> = None;

        for c in candidates {
            if c.ratio_diff <= self.ratio_tolerance {
                if in_tolerance
                    .as_ref()
                    .is_none_or(|best| c.area_diff < best.area_diff)
                {
                    in_tolerance = Some(c);
                }
                continue;
            }
            let better = closest_shape.as_ref().is_none_or(|best| {
                c.ratio_diff < best.ratio_diff
                    || (c.ratio_diff == best.ratio_diff && c.area_diff < best.area_diff)
            });
            if better {
                closest_shape = Some(c);
            }
        }

        in_tolerance
            .or(closest_shape)
            .map_or(Resolution::ZERO, |c| c.resolution)
    }
}

/// [`ResolutionMatcher::best_match`] with an explicit tolerance.
pub fn match_resolution(
    target: Resolution,
    available: &[Resolution],
    ratio_tolerance: f64,
) -> Resolution {
    ResolutionMatcher::new(ratio_tolerance).best_match(target, available)
}
