//! Curve projector.
//!
//! Pure mapping between a round multiplier and a 2-D flight-path
//! coordinate. The x axis is flight time, logarithmic in the multiplier
//! (the game multiplier grows ~10% per time unit); the rise above the
//! baseline grows with a super-linear power of that same time, so the
//! rendered curve visually accelerates. Used identically for the live
//! flight path (RUNNING) and the frozen crash path (COMPLETED).
//!
//! Contract: any multiplier ≥ 1.00 is valid input. Values below 1.00 are
//! clamped to 1.00 rather than rejected — the projector has no failure
//! modes and no side effects.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Per-time-unit multiplier growth factor; time = log base 1.10 of the
/// multiplier.
pub const GROWTH_BASE: f64 = 1.10;

/// Horizontal pixel offset of the launch point.
pub const X_ORIGIN: f64 = 50.0;

/// Horizontal pixels per time unit.
pub const X_SCALE: f64 = 15.0;

/// Exponent applied to flight time for the vertical rise.
pub const RISE_EXPONENT: f64 = 1.7;

/// Vertical pixels per (time unit)^RISE_EXPONENT.
pub const RISE_SCALE: f64 = 0.8;

/// Gap between the canvas bottom edge and the curve baseline.
pub const BASELINE_MARGIN: f64 = 50.0;

/// Approximate flight-time units elapsed per wall-clock second, used for
/// the second markers on the time axis.
pub const TIME_UNITS_PER_SECOND: f64 = 8.3;

/// Multiplier values that get a horizontal gridline and label.
pub const MULTIPLIER_GRIDLINES: &[f64] = &[1.5, 2.0, 3.0, 5.0, 10.0];

/// A projected point on the flight path.
///
/// `rise` is the distance above the baseline; screen-space y depends on
/// the canvas height, which only the renderer knows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub x: f64,
    pub rise: f64,
}

impl PathPoint {
    /// Screen-space y for a canvas of the given height (y grows downward).
    pub fn y(&self, canvas_height: f64) -> f64 {
        canvas_height - BASELINE_MARGIN - self.rise
    }
}

/// Clamp to the valid domain and convert for the log/pow math.
fn as_clamped_f64(multiplier: Decimal) -> f64 {
    multiplier.to_f64().map(|m| m.max(1.0)).unwrap_or(1.0)
}

/// Flight time (in curve time units) at which the given multiplier is
/// reached: `ln(m) / ln(1.10)`. Monotonic in the multiplier; 0.0 at 1.00x.
pub fn flight_time(multiplier: Decimal) -> f64 {
    as_clamped_f64(multiplier).ln() / GROWTH_BASE.ln()
}

/// Inverse of [`flight_time`]: the multiplier reached after `t` time
/// units. Negative times clamp to launch (1.00x).
pub fn multiplier_at_time(t: f64) -> Decimal {
    Decimal::from_f64(GROWTH_BASE.powf(t.max(0.0))).unwrap_or(Decimal::ONE)
}

/// Inverse of [`project`] along the time axis: the multiplier whose
/// projection lands at horizontal position `x`. Positions left of the
/// launch point clamp to 1.00x.
pub fn multiplier_at_x(x: f64) -> Decimal {
    multiplier_at_time((x - X_ORIGIN) / X_SCALE)
}

/// Project a multiplier onto the flight path.
pub fn project(multiplier: Decimal) -> PathPoint {
    let t = flight_time(multiplier);
    PathPoint {
        x: X_ORIGIN + t * X_SCALE,
        rise: t.powf(RISE_EXPONENT) * RISE_SCALE,
    }
}

/// Sample the path from launch up to (and including) `to_multiplier` in
/// multiplier increments of `step`. A non-positive step degenerates to
/// just the launch and end points.
pub fn path(to_multiplier: Decimal, step: Decimal) -> Vec<PathPoint> {
    let end = to_multiplier.max(Decimal::ONE);
    let mut points = vec![project(Decimal::ONE)];
    if step > Decimal::ZERO {
        let mut m = Decimal::ONE + step;
        while m < end {
            points.push(project(m));
            m += step;
        }
    }
    points.push(project(end));
    points
}

/// X position of the marker for `seconds` elapsed on the time axis.
pub fn second_marker_x(seconds: u32) -> f64 {
    X_ORIGIN + seconds as f64 * TIME_UNITS_PER_SECOND * X_SCALE
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
