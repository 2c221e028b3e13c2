//! Proportional resize calculation.

use tracing::warn;

use crate::config::{ResizeConfig, ResizeMode};

/// Compute the output size and scale factor for a source of `orig_w` x `orig_h`.
///
/// Returns `(new_width, new_height, scale_factor)`. Disabled configs, and
/// `MaxSide` on an image already within bounds, return the source size with a
/// factor of `1.0`. Every resulting side is at least one pixel.
///
/// This never fails: a degenerate config (zero target, zero source side, a
/// result that does not fit in `u32`) logs a warning and falls back to the
/// identity, so a bad resize cannot abort a batch.
#[must_use]
pub fn calculate_resize(orig_w: u32, orig_h: u32, config: &ResizeConfig) -> (u32, u32, f64) {
    if !config.enabled {
        return (orig_w, orig_h, 1.0);
    }

    match try_resize(orig_w, orig_h, config) {
        Some(result) => result,
        None => {
            warn!(
                orig_w,
                orig_h,
                mode = ?config.mode,
                value = config.value,
                "resize calculation failed, keeping original size"
            );
            (orig_w, orig_h, 1.0)
        }
    }
}

fn try_resize(orig_w: u32, orig_h: u32, config: &ResizeConfig) -> Option<(u32, u32, f64)> {
    if orig_w == 0 || orig_h == 0 || config.value == 0 {
        return None;
    }

    let target = f64::from(config.value);
    let (w, h) = (f64::from(orig_w), f64::from(orig_h));

    let (new_w, new_h, scale) = match config.mode {
        ResizeMode::MaxSide => {
            if orig_w.max(orig_h) <= config.value {
                return Some((orig_w, orig_h, 1.0));
            }
            if orig_w >= orig_h {
                let scale = target / w;
                (config.value, scaled_side(h, scale)?, scale)
            } else {
                let scale = target / h;
                (scaled_side(w, scale)?, config.value, scale)
            }
        }
        ResizeMode::ExactWidth => {
            let scale = target / w;
            (config.value, scaled_side(h, scale)?, scale)
        }
        ResizeMode::ExactHeight => {
            let scale = target / h;
            (scaled_side(w, scale)?, config.value, scale)
        }
    };

    Some((new_w, new_h, scale))
}

/// Scale one side, round, and floor at one pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_side(side: f64, scale: f64) -> Option<u32> {
    let scaled = (side * scale).round();
    if !scaled.is_finite() || scaled > f64::from(u32::MAX) {
        return None;
    }
    Some((scaled as u32).max(1))
}
