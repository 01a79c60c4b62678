//! Rotation math for the spinner wheel.
//!
//! Angles are in degrees. In the unrotated wheel, wedge `i` of `n` covers
//! `[i * w - 90, (i + 1) * w - 90)` with `w = 360 / n`: wedge 0 starts under the pointer drawn at
//! the top (-90°) and wedges run clockwise. Rotating the wheel by `r` moves every wedge by `r`.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FULL_TURN: f64 = 360.0;
/// Extra whole turns added to every spin so the animation has some travel.
pub const MIN_FULL_SPINS: u32 = 3;
/// Jitter stays inside `(-w / JITTER_DIVISOR, w / JITTER_DIVISOR)`; anything below `w / 2` keeps
/// the pointer inside the winning wedge.
const JITTER_DIVISOR: f64 = 2.5;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpinError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpinOutcome {
    pub winning_index: usize,
    pub target_rotation_degrees: f64,
}

pub fn wedge_width(wedge_count: usize) -> f64 {
    FULL_TURN / wedge_count as f64
}

/// Largest jitter magnitude (exclusive) for a wheel of `wedge_count` wedges.
pub fn max_jitter(wedge_count: usize) -> f64 {
    wedge_width(wedge_count) / JITTER_DIVISOR
}

/// Rotation that brings the center of `winning_index` under the pointer.
pub fn alignment_rotation(wedge_count: usize, winning_index: usize) -> f64 {
    let w = wedge_width(wedge_count);
    -(winning_index as f64 * w + w / 2.0)
}

/// Uniform winner over `[0, wedge_count)`.
pub fn pick_winner<R: Rng + ?Sized>(wedge_count: usize, rng: &mut R) -> Result<usize, SpinError> {
    check_wedge_count(wedge_count)?;
    Ok(rng.gen_range(0..wedge_count))
}

pub fn compute_spin_target<R: Rng + ?Sized>(
    wedge_count: usize,
    winning_index: usize,
    current_rotation: f64,
    rng: &mut R,
) -> Result<f64, SpinError> {
    check_preconditions(wedge_count, winning_index)?;
    let bound = max_jitter(wedge_count);
    let jitter = rng.gen_range(-bound..bound);
    spin_target_with_jitter(wedge_count, winning_index, current_rotation, jitter)
}

/// Deterministic core of [`compute_spin_target`].
///
/// Returns `current + 1080 + d` where `d = (alignment + jitter - current) mod 360`, so the wheel
/// always moves forward by at least three turns and comes to rest with the pointer inside
/// `winning_index`.
pub fn spin_target_with_jitter(
    wedge_count: usize,
    winning_index: usize,
    current_rotation: f64,
    jitter: f64,
) -> Result<f64, SpinError> {
    check_preconditions(wedge_count, winning_index)?;
    if !current_rotation.is_finite() {
        return Err(SpinError::InvalidArgument(format!(
            "current rotation must be finite (got {current_rotation})"
        )));
    }
    let bound = max_jitter(wedge_count);
    if !jitter.is_finite() || jitter.abs() >= bound {
        return Err(SpinError::InvalidArgument(format!(
            "jitter must be within (-{bound}, {bound}) (got {jitter})"
        )));
    }

    let rest = alignment_rotation(wedge_count, winning_index) + jitter;
    let delta = (rest - current_rotation).rem_euclid(FULL_TURN);
    Ok(current_rotation + f64::from(MIN_FULL_SPINS) * FULL_TURN + delta)
}

/// Draws a winner and its target in one go.
pub fn spin<R: Rng + ?Sized>(
    wedge_count: usize,
    current_rotation: f64,
    rng: &mut R,
) -> Result<SpinOutcome, SpinError> {
    let winning_index = pick_winner(wedge_count, rng)?;
    let target_rotation_degrees =
        compute_spin_target(wedge_count, winning_index, current_rotation, rng)?;
    Ok(SpinOutcome {
        winning_index,
        target_rotation_degrees,
    })
}

/// Index of the wedge sitting under the pointer once the wheel is rotated by `rotation`.
pub fn wedge_under_pointer(wedge_count: usize, rotation: f64) -> Result<usize, SpinError> {
    check_wedge_count(wedge_count)?;
    let offset = pointer_offset(rotation);
    let idx = (offset / wedge_width(wedge_count)).floor() as usize;
    Ok(idx.min(wedge_count - 1))
}

/// Angle in `[0, 360)` from the leading edge of wedge 0 to the pointer, measured in the wheel's
/// own frame.
fn pointer_offset(rotation: f64) -> f64 {
    (-rotation).rem_euclid(FULL_TURN)
}

fn check_wedge_count(wedge_count: usize) -> Result<(), SpinError> {
    if wedge_count < 2 {
        return Err(SpinError::InvalidArgument(format!(
            "at least 2 wedges are required (got {wedge_count})"
        )));
    }
    Ok(())
}

fn check_preconditions(wedge_count: usize, winning_index: usize) -> Result<(), SpinError> {
    check_wedge_count(wedge_count)?;
    if winning_index >= wedge_count {
        return Err(SpinError::InvalidArgument(format!(
            "winning index {winning_index} out of range for {wedge_count} wedges"
        )));
    }
    Ok(())
}
