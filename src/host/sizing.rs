use serde::{Deserialize, Serialize};

pub const MIN_HEIGHT: u32 = 200;
pub const MAX_HEIGHT: u32 = 600;
pub const WIDTH_FRACTION: f64 = 0.92;
pub const RELATIVE_HEIGHT_FRACTION: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel size handed to the document generator. Always pre-clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

/// Computes the map container for `viewport`, honouring an explicit height
/// when the caller supplied one.
pub fn container_size(viewport: Viewport, requested_height: Option<u32>) -> ContainerSize {
    let width = ((f64::from(viewport.width) * WIDTH_FRACTION).round() as u32).min(viewport.width);
    let height = requested_height
        .unwrap_or_else(|| (f64::from(viewport.height) * RELATIVE_HEIGHT_FRACTION).round() as u32);

    ContainerSize {
        width,
        height: clamp_height(height),
    }
}

pub fn clamp_height(height: u32) -> u32 {
    height.clamp(MIN_HEIGHT, MAX_HEIGHT)
}

#[cfg(test)]
mod tests {
    use super::{MAX_HEIGHT, MIN_HEIGHT, Viewport, clamp_height, container_size};

    #[test]
    fn out_of_range_heights_clamp_to_nearest_bound() {
        assert_eq!(clamp_height(0), MIN_HEIGHT);
        assert_eq!(clamp_height(MIN_HEIGHT - 1), MIN_HEIGHT);
        assert_eq!(clamp_height(MAX_HEIGHT + 1), MAX_HEIGHT);
        assert_eq!(clamp_height(u32::MAX), MAX_HEIGHT);
    }

    #[test]
    fn in_range_heights_pass_through() {
        for height in [MIN_HEIGHT, 320, 451, MAX_HEIGHT] {
            assert_eq!(clamp_height(height), height);
        }
    }

    #[test]
    fn explicit_height_wins_over_viewport_ratio() {
        let size = container_size(Viewport::new(400, 800), Some(250));
        assert_eq!(size.height, 250);
        assert_eq!(size.width, 368);

        let size = container_size(Viewport::new(400, 800), Some(5_000));
        assert_eq!(size.height, MAX_HEIGHT);
    }

    #[test]
    fn relative_height_is_clamped_too() {
        assert_eq!(container_size(Viewport::new(400, 800), None).height, 320);
        assert_eq!(container_size(Viewport::new(400, 300), None).height, MIN_HEIGHT);
        assert_eq!(container_size(Viewport::new(400, 4_000), None).height, MAX_HEIGHT);
    }

    #[test]
    fn width_never_exceeds_viewport() {
        assert_eq!(container_size(Viewport::new(0, 800), None).width, 0);
        assert_eq!(container_size(Viewport::new(1, 800), None).width, 1);
        assert!(container_size(Viewport::new(1_366, 800), None).width <= 1_366);
    }
}
