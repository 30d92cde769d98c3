//! Easing functions for animation timing.
//!
//! This module implements two families of timing functions:
//! - Curves: Linear, Ease, EaseIn, EaseOut, EaseInOut, CubicBezier, Steps
//! - Framework easings with an [`EasingMode`]: Back, Bounce, Circle, Cubic,
//!   Elastic, Exponential, Power, Quadratic, Quartic, Quintic, Sine
//!
//! # Usage
//!
//! ```
//! use cadence_scene::animation::easing::{EasingFunction, EasingMode};
//!
//! let ease = EasingFunction::Ease;
//! let progress = ease.evaluate(0.5); // Get eased progress at 50%
//!
//! let back = EasingFunction::Back { amplitude: 1.0, mode: EasingMode::EaseIn };
//! let progress = back.evaluate(0.25); // Overshoots below zero
//! ```

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Position for stepped animations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepPosition {
    /// Jump at the start of each interval.
    Start,
    /// Jump at the end of each interval.
    #[default]
    End,
    /// Jump at both start and end.
    Both,
    /// No jump at start or end.
    None,
}

/// Which end of the curve a framework easing applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EasingMode {
    /// The base curve as is.
    EaseIn,
    /// The base curve mirrored: `1 - f(1 - t)`.
    #[default]
    EaseOut,
    /// EaseIn for the first half, EaseOut for the second.
    EaseInOut,
}

/// Easing function for animation timing.
///
/// Easing functions map a linear progress value (0.0 to 1.0) to an eased
/// output value. Some curves (`Back`, `Elastic`, bezier curves with
/// out-of-range y values) overshoot the [0, 1] range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EasingFunction {
    /// Linear interpolation (no easing).
    #[default]
    Linear,

    /// Slow start, fast middle, slow end: `cubic-bezier(0.25, 0.1, 0.25, 1.0)`.
    Ease,

    /// Slow start, accelerating: `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,

    /// Fast start, decelerating: `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,

    /// Slow start and end: `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,

    /// Custom cubic bezier curve.
    /// x values must be in [0, 1], y values can be any float.
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },

    /// Stepped animation with discrete jumps.
    Steps { count: u32, position: StepPosition },

    /// Retracts slightly before moving; `amplitude` scales the retraction.
    Back { amplitude: f64, mode: EasingMode },

    /// Bouncing effect.
    Bounce {
        bounces: u32,
        bounciness: f64,
        mode: EasingMode,
    },

    /// Circular curve.
    Circle { mode: EasingMode },

    /// `t^3`
    Cubic { mode: EasingMode },

    /// Damped oscillation.
    Elastic {
        oscillations: u32,
        springiness: f64,
        mode: EasingMode,
    },

    /// Exponential curve `(e^(k t) - 1) / (e^k - 1)`.
    Exponential { exponent: f64, mode: EasingMode },

    /// `t^power`
    Power { power: f64, mode: EasingMode },

    /// `t^2`
    Quadratic { mode: EasingMode },

    /// `t^4`
    Quartic { mode: EasingMode },

    /// `t^5`
    Quintic { mode: EasingMode },

    /// Sine curve.
    Sine { mode: EasingMode },
}

impl EasingFunction {
    /// Evaluate the easing function at the given progress.
    ///
    /// # Arguments
    /// * `t` - Progress value from 0.0 to 1.0
    ///
    /// # Returns
    /// Eased progress value (may be outside 0.0-1.0 for overshooting curves)
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);

        match *self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(x1, y1, x2, y2, t),
            Self::Steps { count, position } => stepped(count, position, t),
            Self::Back { amplitude, mode } => with_mode(mode, t, |t| back(amplitude, t)),
            Self::Bounce {
                bounces,
                bounciness,
                mode,
            } => with_mode(mode, t, |t| bounce(bounces, bounciness, t)),
            Self::Circle { mode } => with_mode(mode, t, |t| 1.0 - (1.0 - t * t).max(0.0).sqrt()),
            Self::Cubic { mode } => with_mode(mode, t, |t| t * t * t),
            Self::Elastic {
                oscillations,
                springiness,
                mode,
            } => with_mode(mode, t, |t| elastic(oscillations, springiness, t)),
            Self::Exponential { exponent, mode } => {
                with_mode(mode, t, |t| exponential(exponent, t))
            }
            Self::Power { power, mode } => with_mode(mode, t, |t| t.powf(power.max(0.0))),
            Self::Quadratic { mode } => with_mode(mode, t, |t| t * t),
            Self::Quartic { mode } => with_mode(mode, t, |t| t.powi(4)),
            Self::Quintic { mode } => with_mode(mode, t, |t| t.powi(5)),
            Self::Sine { mode } => with_mode(mode, t, |t| 1.0 - (PI / 2.0 * (1.0 - t)).sin()),
        }
    }

    /// Create a custom cubic bezier easing function.
    ///
    /// # Panics
    /// Panics if x1 or x2 are outside [0, 1].
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&x1) && (0.0..=1.0).contains(&x2),
            "Bezier x values must be in [0, 1]"
        );
        Self::CubicBezier { x1, y1, x2, y2 }
    }

    /// Create a stepped easing function.
    ///
    /// # Panics
    /// Panics if steps is 0.
    pub fn steps(steps: u32, position: StepPosition) -> Self {
        assert!(steps >= 1, "Steps must be at least 1");
        Self::Steps {
            count: steps,
            position,
        }
    }
}

/// Apply an easing mode to a base ease-in curve.
fn with_mode(mode: EasingMode, t: f64, f: impl Fn(f64) -> f64) -> f64 {
    match mode {
        EasingMode::EaseIn => f(t),
        EasingMode::EaseOut => 1.0 - f(1.0 - t),
        EasingMode::EaseInOut => {
            if t < 0.5 {
                f(t * 2.0) * 0.5
            } else {
                (1.0 - f((1.0 - t) * 2.0)) * 0.5 + 0.5
            }
        }
    }
}

fn back(amplitude: f64, t: f64) -> f64 {
    let amplitude = amplitude.max(0.0);
    t * t * t - t * amplitude * (t * PI).sin()
}

fn bounce(bounces: u32, bounciness: f64, t: f64) -> f64 {
    let bounces = bounces as f64;
    // A bounciness of exactly 1 makes the geometric series degenerate.
    let bounciness = if bounciness < 1.0 || (bounciness - 1.0).abs() < f64::EPSILON {
        1.001
    } else {
        bounciness
    };

    let pow = bounciness.powf(bounces);
    let one_minus_bounciness = 1.0 - bounciness;
    let sum_of_units = (1.0 - pow) / one_minus_bounciness + pow * 0.5;
    let unit_at_t = t * sum_of_units;

    let bounce_at_t = (-unit_at_t * one_minus_bounciness + 1.0).ln() / bounciness.ln();
    let start = bounce_at_t.floor();
    let end = start + 1.0;

    let start_time = (1.0 - bounciness.powf(start)) / (one_minus_bounciness * sum_of_units);
    let end_time = (1.0 - bounciness.powf(end)) / (one_minus_bounciness * sum_of_units);

    let mid_time = (start_time + end_time) * 0.5;
    let time_relative_to_peak = t - mid_time;
    let radius = mid_time - start_time;
    let amplitude = (1.0 / bounciness).powf(bounces - start);

    (-amplitude / (radius * radius))
        * (time_relative_to_peak - radius)
        * (time_relative_to_peak + radius)
}

fn elastic(oscillations: u32, springiness: f64, t: f64) -> f64 {
    let springiness = springiness.max(0.0);
    let expo = if springiness == 0.0 {
        t
    } else {
        ((springiness * t).exp() - 1.0) / (springiness.exp() - 1.0)
    };
    expo * ((2.0 * PI * oscillations as f64 + PI * 0.5) * t).sin()
}

fn exponential(exponent: f64, t: f64) -> f64 {
    if exponent == 0.0 {
        t
    } else {
        ((exponent * t).exp() - 1.0) / (exponent.exp() - 1.0)
    }
}

/// Evaluate a cubic bezier timing curve at `progress`.
///
/// Uses Newton-Raphson iteration to find the curve parameter whose x equals
/// the input progress, then evaluates y there. Spline key frames share this.
pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_y(y1, y2, t)
}

/// Solve for t in the bezier x equation using Newton-Raphson iteration.
fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    let mut t = target_x;

    for _ in 0..8 {
        let x = bezier_x(x1, x2, t) - target_x;
        if x.abs() < 1e-7 {
            break;
        }

        let dx = bezier_x_derivative(x1, x2, t);
        if dx.abs() < 1e-7 {
            break;
        }

        t -= x / dx;
        t = t.clamp(0.0, 1.0);
    }

    t
}

/// x(t) = 3(1-t)²t·x1 + 3(1-t)t²·x2 + t³
#[inline]
fn bezier_x(x1: f64, x2: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;

    3.0 * mt2 * t * x1 + 3.0 * mt * t2 * x2 + t3
}

#[inline]
fn bezier_y(y1: f64, y2: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;

    3.0 * mt2 * t * y1 + 3.0 * mt * t2 * y2 + t3
}

/// dx/dt = 3(1-t)²·x1 + 6(1-t)t·(x2-x1) + 3t²·(1-x2)
#[inline]
fn bezier_x_derivative(x1: f64, x2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * x1 + 6.0 * mt * t * (x2 - x1) + 3.0 * t * t * (1.0 - x2)
}

fn stepped(steps: u32, position: StepPosition, t: f64) -> f64 {
    if steps == 0 {
        return t;
    }

    let steps_f = steps as f64;

    match position {
        StepPosition::Start => (t * steps_f).ceil() / steps_f,
        StepPosition::End => (t * steps_f).floor() / steps_f,
        StepPosition::Both => {
            let total_steps = steps_f + 1.0;
            ((t * total_steps).floor() / steps_f).min(1.0)
        }
        StepPosition::None => {
            if steps == 1 {
                0.5
            } else {
                let effective_steps = steps_f - 1.0;
                ((t * steps_f).floor() / effective_steps).min(1.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_linear() {
        let ease = EasingFunction::Linear;
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(0.25), 0.25));
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
    }

    #[test]
    fn test_ease_curves() {
        let ease = EasingFunction::Ease;
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
        let mid = ease.evaluate(0.5);
        assert!(mid > 0.7 && mid < 0.9, "ease mid-point should be ~0.8, got {}", mid);

        assert!(EasingFunction::EaseIn.evaluate(0.25) < 0.25);
        assert!(EasingFunction::EaseOut.evaluate(0.25) > 0.25);

        let in_out = EasingFunction::EaseInOut;
        assert!(approx_eq(in_out.evaluate(0.5), 0.5));
        assert!(approx_eq(in_out.evaluate(0.25) + in_out.evaluate(0.75), 1.0));
    }

    #[test]
    fn test_custom_bezier() {
        let linear_bezier = EasingFunction::CubicBezier {
            x1: 0.0,
            y1: 0.0,
            x2: 1.0,
            y2: 1.0,
        };
        assert!(approx_eq(linear_bezier.evaluate(0.5), 0.5));
        assert!(approx_eq(cubic_bezier(0.4, 0.0, 0.2, 1.0, 1.0), 1.0));
    }

    #[test]
    fn test_steps() {
        let ease = EasingFunction::steps(4, StepPosition::End);
        assert!(approx_eq(ease.evaluate(0.24), 0.0));
        assert!(approx_eq(ease.evaluate(0.25), 0.25));
        assert!(approx_eq(ease.evaluate(0.99), 0.75));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));

        let ease = EasingFunction::steps(4, StepPosition::Start);
        assert!(approx_eq(ease.evaluate(0.01), 0.25));
        assert!(approx_eq(ease.evaluate(0.76), 1.0));
    }

    #[test]
    fn test_modes() {
        let ease_in = EasingFunction::Quadratic {
            mode: EasingMode::EaseIn,
        };
        let ease_out = EasingFunction::Quadratic {
            mode: EasingMode::EaseOut,
        };
        let in_out = EasingFunction::Quadratic {
            mode: EasingMode::EaseInOut,
        };
        assert!(approx_eq(ease_in.evaluate(0.5), 0.25));
        assert!(approx_eq(ease_out.evaluate(0.5), 0.75));
        assert!(approx_eq(in_out.evaluate(0.25), 0.125));
        assert!(approx_eq(in_out.evaluate(0.5), 0.5));
        assert!(approx_eq(in_out.evaluate(0.75), 0.875));
    }

    #[test]
    fn test_framework_endpoints() {
        let curves = [
            EasingFunction::Back {
                amplitude: 1.0,
                mode: EasingMode::EaseOut,
            },
            EasingFunction::Bounce {
                bounces: 3,
                bounciness: 2.0,
                mode: EasingMode::EaseOut,
            },
            EasingFunction::Circle {
                mode: EasingMode::EaseInOut,
            },
            EasingFunction::Cubic {
                mode: EasingMode::EaseIn,
            },
            EasingFunction::Elastic {
                oscillations: 3,
                springiness: 3.0,
                mode: EasingMode::EaseOut,
            },
            EasingFunction::Exponential {
                exponent: 2.0,
                mode: EasingMode::EaseIn,
            },
            EasingFunction::Power {
                power: 2.5,
                mode: EasingMode::EaseIn,
            },
            EasingFunction::Quartic {
                mode: EasingMode::EaseOut,
            },
            EasingFunction::Quintic {
                mode: EasingMode::EaseOut,
            },
            EasingFunction::Sine {
                mode: EasingMode::EaseIn,
            },
        ];
        for curve in curves {
            assert!(approx_eq(curve.evaluate(0.0), 0.0), "{curve:?} at 0");
            assert!(approx_eq(curve.evaluate(1.0), 1.0), "{curve:?} at 1");
        }
    }

    #[test]
    fn test_back_overshoots() {
        let back = EasingFunction::Back {
            amplitude: 1.0,
            mode: EasingMode::EaseIn,
        };
        assert!(back.evaluate(0.25) < 0.0);
    }

    #[test]
    fn test_sine_ease_in() {
        let sine = EasingFunction::Sine {
            mode: EasingMode::EaseIn,
        };
        let expected = 1.0 - (PI / 4.0).sin();
        assert!(approx_eq(sine.evaluate(0.5), expected));
    }

    #[test]
    fn test_clamping() {
        let ease = EasingFunction::Ease;
        assert!(approx_eq(ease.evaluate(-0.5), 0.0));
        assert!(approx_eq(ease.evaluate(1.5), 1.0));
    }

    #[test]
    fn test_default() {
        assert_eq!(EasingFunction::default(), EasingFunction::Linear);
        assert_eq!(EasingMode::default(), EasingMode::EaseOut);
        assert_eq!(StepPosition::default(), StepPosition::End);
    }

    #[test]
    #[should_panic(expected = "Bezier x values must be in [0, 1]")]
    fn test_invalid_bezier_x1() {
        EasingFunction::cubic_bezier(-0.1, 0.0, 0.5, 1.0);
    }

    #[test]
    #[should_panic(expected = "Steps must be at least 1")]
    fn test_invalid_steps() {
        EasingFunction::steps(0, StepPosition::End);
    }
}
