use std::f32::consts::PI;

/// Family of easing curves, named after the classic tweening equations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Quadratic,
    Cubic,
    Quartic,
    Quintic,
    Sinusoidal,
    Exponential,
    Circular,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EaseMode {
    In,
    Out,
    InOut,
}

/// A monotonic curve mapping \[0, 1\] onto \[0, 1\].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Easing {
    pub curve: Curve,
    pub mode: EaseMode,
}

impl Easing {
    pub const LINEAR: Easing = Easing::new(Curve::Linear, EaseMode::InOut);
    pub const CUBIC_OUT: Easing = Easing::new(Curve::Cubic, EaseMode::Out);
    pub const CUBIC_IN_OUT: Easing = Easing::new(Curve::Cubic, EaseMode::InOut);

    pub const fn new(curve: Curve, mode: EaseMode) -> Self {
        Self { curve, mode }
    }

    /// Parse the `["Cubic", "InOut"]` style descriptor used by host options.
    pub fn from_names(curve: &str, mode: &str) -> Option<Self> {
        let curve = match curve {
            "Linear" => Curve::Linear,
            "Quadratic" => Curve::Quadratic,
            "Cubic" => Curve::Cubic,
            "Quartic" => Curve::Quartic,
            "Quintic" => Curve::Quintic,
            "Sinusoidal" => Curve::Sinusoidal,
            "Exponential" => Curve::Exponential,
            "Circular" => Curve::Circular,
            _ => return None,
        };
        let mode = match mode {
            "In" => EaseMode::In,
            "Out" => EaseMode::Out,
            "InOut" | "None" => EaseMode::InOut,
            _ => return None,
        };
        Some(Self::new(curve, mode))
    }

    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let ease_in = |k: f32| ease_in(self.curve, k);
        let eased = match self.mode {
            EaseMode::In => ease_in(t),
            EaseMode::Out => 1.0 - ease_in(1.0 - t),
            EaseMode::InOut => {
                if t < 0.5 {
                    0.5 * ease_in(2.0 * t)
                } else {
                    1.0 - 0.5 * ease_in(2.0 - 2.0 * t)
                }
            }
        };
        eased.clamp(0.0, 1.0)
    }
}

impl Default for Easing {
    fn default() -> Self {
        Self::LINEAR
    }
}

#[inline]
fn ease_in(curve: Curve, k: f32) -> f32 {
    match curve {
        Curve::Linear => k,
        Curve::Quadratic => k * k,
        Curve::Cubic => k * k * k,
        Curve::Quartic => k * k * k * k,
        Curve::Quintic => k * k * k * k * k,
        Curve::Sinusoidal => 1.0 - (k * PI / 2.0).cos(),
        Curve::Exponential => {
            if k <= 0.0 {
                0.0
            } else {
                (2.0_f32).powf(10.0 * (k - 1.0))
            }
        }
        Curve::Circular => 1.0 - (1.0 - k * k).max(0.0).sqrt(),
    }
}
