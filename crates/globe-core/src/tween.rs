//! Time-based interpolation used by hover scale animation and camera focus.

use fnv::FnvHashMap;
use glam::Vec3;
use smallvec::SmallVec;

use crate::easing::Easing;
use crate::markers::MarkerObjectId;

pub trait Interpolate: Copy {
    fn interpolate(self, to: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(self, to: Self, t: f32) -> Self {
        self + (to - self) * t
    }
}

impl Interpolate for Vec3 {
    fn interpolate(self, to: Self, t: f32) -> Self {
        self.lerp(to, t)
    }
}

/// A single eased transition from `from` to `to` over `duration_ms`.
#[derive(Clone, Debug)]
pub struct Tween<T> {
    from: T,
    to: T,
    duration_ms: f64,
    elapsed_ms: f64,
    easing: Easing,
}

impl<T: Interpolate> Tween<T> {
    pub fn new(from: T, to: T, duration_ms: f64, easing: Easing) -> Self {
        Self {
            from,
            to,
            duration_ms: duration_ms.max(0.0),
            elapsed_ms: 0.0,
            easing,
        }
    }

    pub fn from(&self) -> T {
        self.from
    }

    pub fn to(&self) -> T {
        self.to
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration_ms
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }

    /// Linear time progress in \[0, 1\].
    pub fn progress(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0) as f32
        }
    }

    pub fn value(&self) -> T {
        let p = self.progress();
        if p >= 1.0 {
            return self.to;
        }
        self.from.interpolate(self.to, self.easing.apply(p))
    }

    pub fn advance(&mut self, dt_ms: f64) -> T {
        self.elapsed_ms = (self.elapsed_ms + dt_ms.max(0.0)).min(self.duration_ms);
        self.value()
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }
}

/// Scale animation attached to one marker render object.
#[derive(Clone, Debug)]
pub struct ScaleTween {
    pub target: MarkerObjectId,
    pub tween: Tween<f32>,
}

/// Active scale tweens, at most one per marker.
#[derive(Default, Debug)]
pub struct ScaleTweens {
    active: FnvHashMap<MarkerObjectId, ScaleTween>,
}

impl ScaleTweens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a tween on `target`, superseding any tween already running on it.
    pub fn start(
        &mut self,
        target: MarkerObjectId,
        from: f32,
        to: f32,
        duration_ms: f64,
        easing: Easing,
    ) {
        let tween = Tween::new(from, to, duration_ms, easing);
        if self.active.insert(target, ScaleTween { target, tween }).is_some() {
            log::debug!("[hover] tween on {:?} superseded", target);
        }
    }

    pub fn get(&self, target: MarkerObjectId) -> Option<&ScaleTween> {
        self.active.get(&target)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Advance every tween and report the new scale of each target.
    /// Finished tweens report their final value once and are dropped.
    pub fn advance(&mut self, dt_ms: f64) -> SmallVec<[(MarkerObjectId, f32); 4]> {
        let mut out = SmallVec::new();
        for (id, st) in self.active.iter_mut() {
            out.push((*id, st.tween.advance(dt_ms)));
        }
        self.active.retain(|_, st| !st.tween.is_finished());
        out
    }

    /// Drop tweens whose targets belong to another marker generation.
    pub fn retain_generation(&mut self, generation: u32) {
        self.active.retain(|id, _| id.generation() == generation);
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{ScaleTweens, Tween};
    use crate::easing::Easing;
    use crate::markers::MarkerObjectId;
    use glam::Vec3;

    #[test]
    fn tween_reaches_target_exactly() {
        let mut t = Tween::new(1.0_f32, 1.3, 200.0, Easing::CUBIC_IN_OUT);
        assert_eq!(t.value(), 1.0);
        t.advance(100.0);
        assert!((t.value() - 1.15).abs() < 1e-4);
        t.advance(500.0);
        assert!(t.is_finished());
        assert_eq!(t.value(), 1.3);
    }

    #[test]
    fn zero_duration_is_immediately_done() {
        let t = Tween::new(Vec3::ZERO, Vec3::X, 0.0, Easing::LINEAR);
        assert!(t.is_finished());
        assert_eq!(t.value(), Vec3::X);
    }

    #[test]
    fn new_tween_supersedes_previous_on_same_target() {
        let id = MarkerObjectId::new(1, 0);
        let mut tweens = ScaleTweens::new();
        tweens.start(id, 1.0, 1.3, 200.0, Easing::LINEAR);
        tweens.advance(50.0);
        tweens.start(id, 1.1, 1.0, 200.0, Easing::LINEAR);
        assert_eq!(tweens.len(), 1);
        assert_eq!(tweens.get(id).unwrap().tween.from(), 1.1);
    }

    #[test]
    fn finished_tweens_report_final_value_then_drop() {
        let a = MarkerObjectId::new(1, 0);
        let b = MarkerObjectId::new(1, 1);
        let mut tweens = ScaleTweens::new();
        tweens.start(a, 1.3, 1.0, 100.0, Easing::LINEAR);
        tweens.start(b, 1.0, 1.3, 300.0, Easing::LINEAR);

        let out = tweens.advance(150.0);
        assert_eq!(out.len(), 2);
        let a_val = out.iter().find(|(id, _)| *id == a).unwrap().1;
        assert_eq!(a_val, 1.0);
        assert_eq!(tweens.len(), 1);
        assert!(tweens.get(b).is_some());
    }

    #[test]
    fn retain_generation_drops_stale_targets() {
        let mut tweens = ScaleTweens::new();
        tweens.start(MarkerObjectId::new(1, 0), 1.0, 1.3, 100.0, Easing::LINEAR);
        tweens.start(MarkerObjectId::new(2, 0), 1.0, 1.3, 100.0, Easing::LINEAR);
        tweens.retain_generation(2);
        assert_eq!(tweens.len(), 1);
    }
}
