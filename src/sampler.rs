//! Rejection sampling of points inside a region.
//!
//! Points are drawn in phases: one Gaussian phase per hotspot, then a
//! uniform phase over the bounding box. Each candidate is kept only if
//! the region contains it. Every phase has an attempt budget of
//! `attempt_multiplier * target`, so sampling always terminates; phases
//! that run out of attempts are reported in the returned [`SampleSet`]
//! instead of being padded.
//!
//! Phases run in parallel. Each one owns an RNG stream derived from the
//! master seed and its phase index, and results are concatenated in
//! phase order, so a fixed seed reproduces the exact same points.

use crate::error::SampleError;
use crate::types::GeneratedPoint;
use geo::{Point, Rect};
use rand::distributions::{Distribution, Uniform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use rayon::prelude::*;
use tracing::{debug, info, warn};

pub const DEFAULT_HOTSPOT_SHARE: f64 = 0.6;
pub const DEFAULT_ATTEMPT_MULTIPLIER: usize = 50;

/// What the sampler needs from a region. Coordinates are degrees,
/// x = longitude and y = latitude.
pub trait SampleArea: Sync {
    fn bounds(&self) -> Rect<f64>;
    fn centroid(&self) -> Point<f64>;
    fn contains(&self, longitude: f64, latitude: f64) -> bool;
}

/// A Gaussian bias center. `spread` is the per-axis standard deviation
/// in degrees; `weight` is relative to the other hotspots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hotspot {
    pub latitude: f64,
    pub longitude: f64,
    pub spread: f64,
    pub weight: f64,
}

impl Hotspot {
    pub fn new(latitude: f64, longitude: f64, spread: f64, weight: f64) -> Self {
        Self { latitude, longitude, spread, weight }
    }
}

/// The five activity centers placed on a region: its centroid, then
/// the north, south, east and west quarter points of the bounding box.
pub fn default_hotspots(area: &impl SampleArea) -> Vec<Hotspot> {
    let bbox = area.bounds();
    let center = area.centroid();
    let (min, max) = (bbox.min(), bbox.max());
    let lat_at = |f: f64| min.y + (max.y - min.y) * f;
    let lon_at = |f: f64| min.x + (max.x - min.x) * f;

    vec![
        Hotspot::new(center.y(), center.x(), 0.025, 0.3),
        Hotspot::new(lat_at(0.75), center.x(), 0.02, 0.2),
        Hotspot::new(lat_at(0.25), center.x(), 0.02, 0.15),
        Hotspot::new(center.y(), lon_at(0.75), 0.015, 0.2),
        Hotspot::new(center.y(), lon_at(0.25), 0.015, 0.15),
    ]
}

/// Splits `total` across `weights` proportionally, rounding down, and
/// hands the remainder to the heaviest weight (the first one on ties).
/// The result always sums to `total`.
pub fn allocate(total: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }

    let sum: f64 = weights.iter().sum();
    let mut targets: Vec<usize> = weights
        .iter()
        .map(|w| ((total as f64 * w / sum).floor() as usize).min(total))
        .collect();

    let max_idx = weights
        .iter()
        .enumerate()
        .fold(0, |best, (i, w)| if *w > weights[best] { i } else { best });

    let assigned: usize = targets.iter().sum();
    if assigned <= total {
        targets[max_idx] += total - assigned;
    } else {
        // Float rounding can push the floors a unit or two over.
        let mut excess = assigned - total;
        let take = excess.min(targets[max_idx]);
        targets[max_idx] -= take;
        excess -= take;
        for t in targets.iter_mut() {
            let take = excess.min(*t);
            *t -= take;
            excess -= take;
        }
    }

    targets
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    /// Fraction of points drawn around hotspots when hotspots are enabled.
    pub hotspot_share: f64,
    pub attempt_multiplier: usize,
    /// Master seed. Drawn from the thread RNG when absent.
    pub seed: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            hotspot_share: DEFAULT_HOTSPOT_SHARE,
            attempt_multiplier: DEFAULT_ATTEMPT_MULTIPLIER,
            seed: None,
        }
    }
}

impl SamplerConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), SampleError> {
        if !(0.0..=1.0).contains(&self.hotspot_share) {
            return Err(SampleError::InvalidShare(self.hotspot_share));
        }
        if self.attempt_multiplier == 0 {
            return Err(SampleError::ZeroAttemptMultiplier);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// Gaussian draws around the hotspot at this index.
    Hotspot(usize),
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub kind: PhaseKind,
    pub requested: usize,
    pub produced: usize,
    pub attempts: usize,
}

impl PhaseReport {
    pub fn shortfall(&self) -> usize {
        self.requested - self.produced
    }
}

/// Points produced for one region, plus how each phase went.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    pub points: Vec<GeneratedPoint>,
    pub phases: Vec<PhaseReport>,
    /// The master seed actually used; feed it back to reproduce the run.
    pub seed: u64,
}

impl SampleSet {
    pub fn requested(&self) -> usize {
        self.phases.iter().map(|p| p.requested).sum()
    }

    pub fn produced(&self) -> usize {
        self.points.len()
    }

    /// Missing point count, or `None` when every phase hit its target.
    pub fn shortfall(&self) -> Option<usize> {
        let missing = self.requested() - self.produced();
        (missing > 0).then_some(missing)
    }

    pub fn require_complete(self) -> Result<Self, SampleError> {
        match self.shortfall() {
            None => Ok(self),
            Some(_) => Err(SampleError::Shortfall {
                requested: self.requested(),
                produced: self.produced(),
            }),
        }
    }
}

enum Proposal {
    Gaussian { latitude: f64, longitude: f64, normal: Normal<f64> },
    Uniform { longitude: Uniform<f64>, latitude: Uniform<f64> },
}

impl Proposal {
    /// Returns (longitude, latitude).
    fn draw<R: Rng>(&self, rng: &mut R) -> (f64, f64) {
        match self {
            Proposal::Gaussian { latitude, longitude, normal } => {
                let dx = normal.sample(rng);
                let dy = normal.sample(rng);
                (longitude + dx, latitude + dy)
            }
            Proposal::Uniform { longitude, latitude } => (longitude.sample(rng), latitude.sample(rng)),
        }
    }
}

struct Phase {
    kind: PhaseKind,
    target: usize,
    proposal: Proposal,
}

pub struct PointSampler<'a, A: SampleArea> {
    area: &'a A,
    config: SamplerConfig,
}

impl<'a, A: SampleArea> PointSampler<'a, A> {
    pub fn new(area: &'a A, config: SamplerConfig) -> Self {
        Self { area, config }
    }

    /// Samples `num_points` points, biased toward the region's default
    /// hotspots when `with_hotspots` is set and uniform otherwise.
    pub fn sample(&self, num_points: usize, with_hotspots: bool) -> Result<SampleSet, SampleError> {
        let hotspots = if with_hotspots {
            default_hotspots(self.area)
        } else {
            Vec::new()
        };
        self.sample_with_hotspots(num_points, &hotspots)
    }

    /// Samples around a caller-chosen hotspot list. An empty list means
    /// purely uniform sampling.
    pub fn sample_with_hotspots(
        &self,
        num_points: usize,
        hotspots: &[Hotspot],
    ) -> Result<SampleSet, SampleError> {
        self.config.validate()?;
        validate_hotspots(hotspots)?;

        let seed = self.config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        if num_points == 0 {
            return Ok(SampleSet { points: Vec::new(), phases: Vec::new(), seed });
        }

        let phases = self.plan(num_points, hotspots)?;
        info!(
            "Sampling {} points in {} phase(s) (seed {})",
            num_points,
            phases.len(),
            seed
        );

        let results: Vec<(Vec<GeneratedPoint>, PhaseReport)> = phases
            .par_iter()
            .enumerate()
            .map(|(idx, phase)| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(idx as u64);
                self.run_phase(phase, &mut rng)
            })
            .collect();

        let mut points = Vec::with_capacity(num_points);
        let mut reports = Vec::with_capacity(results.len());
        for (phase_points, report) in results {
            if report.shortfall() > 0 {
                warn!(
                    "{:?} exhausted {} attempts: produced {} of {} points",
                    report.kind, report.attempts, report.produced, report.requested
                );
            }
            points.extend(phase_points);
            reports.push(report);
        }

        let set = SampleSet { points, phases: reports, seed };
        match set.shortfall() {
            Some(missing) => warn!(
                "Generated {} of {} points ({} short)",
                set.produced(),
                set.requested(),
                missing
            ),
            None => info!("Generated {} points", set.produced()),
        }
        Ok(set)
    }

    fn plan(&self, num_points: usize, hotspots: &[Hotspot]) -> Result<Vec<Phase>, SampleError> {
        let hotspot_total = if hotspots.is_empty() {
            0
        } else {
            ((num_points as f64 * self.config.hotspot_share) as usize).min(num_points)
        };
        let weights: Vec<f64> = hotspots.iter().map(|h| h.weight).collect();
        let targets = allocate(hotspot_total, &weights);

        let mut phases = Vec::with_capacity(hotspots.len() + 1);
        for (idx, (h, target)) in hotspots.iter().zip(targets).enumerate() {
            let normal = Normal::new(0.0, h.spread).map_err(|_| SampleError::InvalidHotspot {
                index: idx,
                reason: "spread must be positive",
            })?;
            phases.push(Phase {
                kind: PhaseKind::Hotspot(idx),
                target,
                proposal: Proposal::Gaussian {
                    latitude: h.latitude,
                    longitude: h.longitude,
                    normal,
                },
            });
        }

        let bbox = self.area.bounds();
        phases.push(Phase {
            kind: PhaseKind::Uniform,
            target: num_points - hotspot_total,
            proposal: Proposal::Uniform {
                longitude: Uniform::new_inclusive(bbox.min().x, bbox.max().x),
                latitude: Uniform::new_inclusive(bbox.min().y, bbox.max().y),
            },
        });

        Ok(phases)
    }

    fn run_phase<R: Rng>(&self, phase: &Phase, rng: &mut R) -> (Vec<GeneratedPoint>, PhaseReport) {
        let max_attempts = phase.target.saturating_mul(self.config.attempt_multiplier);
        let mut points = Vec::with_capacity(phase.target);
        let mut attempts = 0;

        while points.len() < phase.target && attempts < max_attempts {
            let (lon, lat) = phase.proposal.draw(rng);
            if self.area.contains(lon, lat) {
                points.push(GeneratedPoint::new(lat, lon));
            }
            attempts += 1;
        }

        debug!(
            "{:?}: {} / {} points after {} attempts",
            phase.kind,
            points.len(),
            phase.target,
            attempts
        );

        let report = PhaseReport {
            kind: phase.kind,
            requested: phase.target,
            produced: points.len(),
            attempts,
        };
        (points, report)
    }
}

fn validate_hotspots(hotspots: &[Hotspot]) -> Result<(), SampleError> {
    for (index, h) in hotspots.iter().enumerate() {
        if !(h.weight.is_finite() && h.weight > 0.0) {
            return Err(SampleError::InvalidHotspot { index, reason: "weight must be positive" });
        }
        if !(h.spread.is_finite() && h.spread > 0.0) {
            return Err(SampleError::InvalidHotspot { index, reason: "spread must be positive" });
        }
        if !(h.latitude.is_finite() && h.longitude.is_finite()) {
            return Err(SampleError::InvalidHotspot { index, reason: "center must be finite" });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use geo::{polygon, MultiPolygon};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn square(size: f64) -> Region {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: size),
            (x: size, y: size),
            (x: size, y: 0.0),
        ];
        Region::new("square", MultiPolygon::new(vec![poly])).unwrap()
    }

    fn seeded(seed: u64) -> SamplerConfig {
        SamplerConfig::default().with_seed(seed)
    }

    struct Counting<'a> {
        inner: &'a Region,
        calls: AtomicUsize,
    }

    impl SampleArea for Counting<'_> {
        fn bounds(&self) -> Rect<f64> {
            self.inner.bounds()
        }
        fn centroid(&self) -> Point<f64> {
            SampleArea::centroid(self.inner)
        }
        fn contains(&self, longitude: f64, latitude: f64) -> bool {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.inner.contains(longitude, latitude)
        }
    }

    #[test]
    fn uniform_square_matches_reference_scenario() {
        let region = square(10.0);
        let set = PointSampler::new(&region, seeded(7)).sample(1000, false).unwrap();

        assert_eq!(set.points.len(), 1000);
        assert_eq!(set.shortfall(), None);
        for p in &set.points {
            assert!((0.0..=10.0).contains(&p.latitude));
            assert!((0.0..=10.0).contains(&p.longitude));
        }

        let n = set.points.len() as f64;
        let mean_lat = set.points.iter().map(|p| p.latitude).sum::<f64>() / n;
        let mean_lon = set.points.iter().map(|p| p.longitude).sum::<f64>() / n;
        // Standard error of the mean is ~0.09 here.
        assert!((mean_lat - 5.0).abs() < 0.5, "mean latitude {mean_lat}");
        assert!((mean_lon - 5.0).abs() < 0.5, "mean longitude {mean_lon}");
    }

    #[test]
    fn every_point_is_contained() {
        // Concave L shape with a notch the bounding box covers.
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 0.4),
            (x: 0.4, y: 0.4),
            (x: 0.4, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let region = Region::new("ell", MultiPolygon::new(vec![poly])).unwrap();

        for with_hotspots in [false, true] {
            let set = PointSampler::new(&region, seeded(11)).sample(2000, with_hotspots).unwrap();
            assert!(!set.points.is_empty());
            for p in &set.points {
                assert!(region.contains(p.longitude, p.latitude), "{p:?} escaped");
            }
        }
    }

    #[test]
    fn uniform_mode_passes_chi_square() {
        let region = square(1.0);
        let set = PointSampler::new(&region, seeded(3)).sample(4000, false).unwrap();

        let bins = 4;
        let mut counts = vec![0usize; bins * bins];
        for p in &set.points {
            let i = ((p.longitude * bins as f64) as usize).min(bins - 1);
            let j = ((p.latitude * bins as f64) as usize).min(bins - 1);
            counts[j * bins + i] += 1;
        }

        let expected = set.points.len() as f64 / (bins * bins) as f64;
        let chi2: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        // 15 degrees of freedom; the 0.999 quantile is ~37.7.
        assert!(chi2 < 37.7, "chi-square {chi2} with counts {counts:?}");
    }

    #[test]
    fn hotspots_concentrate_density() {
        let region = square(1.0);
        let set = PointSampler::new(&region, seeded(5)).sample(5000, true).unwrap();
        assert_eq!(set.points.len(), 5000);

        let radius = 0.05;
        let count_near = |lat: f64, lon: f64| {
            set.points
                .iter()
                .filter(|p| (p.latitude - lat).abs() < radius && (p.longitude - lon).abs() < radius)
                .count()
        };

        let corners = [(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)];
        let corner_max = corners.iter().map(|&(lat, lon)| count_near(lat, lon)).max().unwrap();

        for h in default_hotspots(&region) {
            let near = count_near(h.latitude, h.longitude);
            assert!(
                near > 5 * corner_max.max(1),
                "hotspot at ({}, {}) has {near} points vs corner max {corner_max}",
                h.latitude,
                h.longitude
            );
        }
    }

    #[test]
    fn allocation_reconciles_exactly() {
        let weight_sets: [&[f64]; 4] = [
            &[0.3, 0.2, 0.15, 0.2, 0.15],
            &[1.0, 1.0, 1.0],
            &[0.1, 0.7, 0.2],
            &[3.0, 0.001, 17.5, 2.25],
        ];
        for weights in weight_sets {
            for total in weights.len()..500 {
                let targets = allocate(total, weights);
                assert_eq!(targets.iter().sum::<usize>(), total, "{weights:?} / {total}");
            }
        }
    }

    #[test]
    fn remainder_goes_to_heaviest_hotspot() {
        assert_eq!(allocate(6, &[0.3, 0.2, 0.15, 0.2, 0.15]), vec![4, 1, 0, 1, 0]);
        assert_eq!(allocate(6000, &[0.3, 0.2, 0.15, 0.2, 0.15]), vec![1800, 1200, 900, 1200, 900]);
        assert_eq!(allocate(10, &[1.0, 1.0, 1.0]), vec![4, 3, 3]);
        assert!(allocate(10, &[]).is_empty());
    }

    #[test]
    fn phase_targets_sum_to_request() {
        let region = square(10.0);
        for n in [5, 6, 17, 999, 10_000] {
            let set = PointSampler::new(&region, seeded(1)).sample(n, true).unwrap();
            assert_eq!(set.requested(), n);
            assert_eq!(set.phases.len(), 6);
            assert_eq!(set.phases[5].kind, PhaseKind::Uniform);
        }
    }

    #[test]
    fn same_seed_reproduces_points() {
        let region = square(1.0);
        let a = PointSampler::new(&region, seeded(42)).sample(3000, true).unwrap();
        let b = PointSampler::new(&region, seeded(42)).sample(3000, true).unwrap();
        assert_eq!(a.points, b.points);
        assert_eq!(a.seed, 42);

        let c = PointSampler::new(&region, seeded(43)).sample(3000, true).unwrap();
        assert_ne!(a.points, c.points);
    }

    #[test]
    fn zero_points_never_tests_containment() {
        let region = square(1.0);
        let counting = Counting { inner: &region, calls: AtomicUsize::new(0) };
        for with_hotspots in [false, true] {
            let set = PointSampler::new(&counting, seeded(1)).sample(0, with_hotspots).unwrap();
            assert!(set.points.is_empty());
            assert_eq!(set.shortfall(), None);
        }
        assert_eq!(counting.calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn sliver_reports_shortfall_and_terminates() {
        // Covers 5e-5 of its bounding box.
        let poly = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 0.001)];
        let region = Region::new("sliver", MultiPolygon::new(vec![poly])).unwrap();
        let counting = Counting { inner: &region, calls: AtomicUsize::new(0) };

        let set = PointSampler::new(&counting, seeded(9)).sample(10, false).unwrap();
        assert!(set.shortfall().is_some());
        assert_eq!(set.phases[0].attempts, 500);
        assert_eq!(counting.calls.load(Ordering::Relaxed), 500);

        let err = set.require_complete().unwrap_err();
        assert!(matches!(err, SampleError::Shortfall { requested: 10, produced } if produced < 10));
    }

    #[test]
    fn rejects_invalid_configuration() {
        let region = square(1.0);
        let bad_share = SamplerConfig { hotspot_share: 1.5, ..SamplerConfig::default() };
        assert_eq!(
            PointSampler::new(&region, bad_share).sample(10, true).unwrap_err(),
            SampleError::InvalidShare(1.5)
        );

        let no_attempts = SamplerConfig { attempt_multiplier: 0, ..SamplerConfig::default() };
        assert_eq!(
            PointSampler::new(&region, no_attempts).sample(10, true).unwrap_err(),
            SampleError::ZeroAttemptMultiplier
        );

        let hotspots = [Hotspot::new(0.5, 0.5, 0.1, 1.0), Hotspot::new(0.5, 0.5, 0.0, 1.0)];
        let err = PointSampler::new(&region, seeded(1))
            .sample_with_hotspots(10, &hotspots)
            .unwrap_err();
        assert!(matches!(err, SampleError::InvalidHotspot { index: 1, .. }));
    }

    #[test]
    fn default_hotspots_follow_centroid_and_bounds() {
        let region = square(10.0);
        let hs = default_hotspots(&region);
        assert_eq!(hs.len(), 5);
        assert_eq!((hs[0].latitude, hs[0].longitude), (5.0, 5.0));
        assert_eq!((hs[1].latitude, hs[1].longitude), (7.5, 5.0));
        assert_eq!((hs[2].latitude, hs[2].longitude), (2.5, 5.0));
        assert_eq!((hs[3].latitude, hs[3].longitude), (5.0, 7.5));
        assert_eq!((hs[4].latitude, hs[4].longitude), (5.0, 2.5));
        let total: f64 = hs.iter().map(|h| h.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
