//! Parsers for external tool output.

use crate::core::RawCropBox;

/// Parse `identify -format %wx%h` output into (width, height).
pub fn identify_dimensions(output: &str) -> Option<(u32, u32)> {
    let mut parts = output.trim().split('x');
    let width = parts.next()?.trim().parse().ok()?;
    let height = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((width, height))
}

const UPPER_LEFT_MARKER: &str = "Upper Left Corner: ";
const LOWER_RIGHT_MARKER: &str = "Lower Right Corner: ";

fn corner_after(line: &str, marker: &str) -> Option<(i32, i32)> {
    let rest = &line[line.find(marker)? + marker.len()..];
    let mut parts = rest.trim().split(',');
    let x = parts.next()?.trim().parse().ok()?;
    let y = parts.next()?.trim().parse().ok()?;
    Some((x, y))
}

/// Parse innercrop corner output into raw margins.
///
/// The detector reports the content bounding box as two corners; right and
/// bottom margins are the distances from the far edges, so a corner outside
/// the frame yields a negative margin.
pub fn innercrop_corners(output: &str, width: u32, height: u32) -> Option<RawCropBox> {
    let mut upper_left = None;
    let mut lower_right = None;
    for line in output.lines() {
        if line.contains(UPPER_LEFT_MARKER) {
            upper_left = corner_after(line, UPPER_LEFT_MARKER);
        } else if line.contains(LOWER_RIGHT_MARKER) {
            lower_right = corner_after(line, LOWER_RIGHT_MARKER);
        }
    }
    let (nw_x, nw_y) = upper_left?;
    let (se_x, se_y) = lower_right?;
    Some(RawCropBox {
        left: nw_x,
        top: nw_y,
        right: width as i32 - se_x,
        bottom: height as i32 - se_y,
    })
}

/// Parse `-format %[deskew:angle]` output into a signed angle in degrees.
pub fn skew_angle(output: &str) -> Option<f64> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}
