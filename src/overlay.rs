//! Overlay projection from the virtual detection space onto the display.
//!
//! The video surface scales its image with aspect-preserving "fit", so the
//! picture can be letterboxed inside its container. Boxes have to follow the
//! same scale and centering offsets to land on the right pixels.

use serde::{Deserialize, Serialize};

use crate::telemetry::{Detection, VIRTUAL_HEIGHT, VIRTUAL_WIDTH};

/// On-screen rectangle of the element displaying the video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rect anchored at the origin.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    fn is_drawable(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }
}

impl Default for DisplayRect {
    fn default() -> Self {
        Self::sized(VIRTUAL_WIDTH, VIRTUAL_HEIGHT)
    }
}

/// Screen-space box plus its caption, ready for the display surface to draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
}

/// Scale and letterbox offsets for one display rect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FitTransform {
    fn apply(&self, bbox: &[f64; 4]) -> (f64, f64, f64, f64) {
        let [x1, y1, x2, y2] = *bbox;
        (
            self.offset_x + x1 * self.scale,
            self.offset_y + y1 * self.scale,
            (x2 - x1) * self.scale,
            (y2 - y1) * self.scale,
        )
    }
}

/// Maps detection boxes from a fixed virtual space to display coordinates.
///
/// Stateless: callers re-run [`OverlayProjector::project`] whenever either the
/// detections or the display rect change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayProjector {
    virtual_width: f64,
    virtual_height: f64,
}

impl OverlayProjector {
    pub fn new(virtual_width: f64, virtual_height: f64) -> Self {
        Self {
            virtual_width,
            virtual_height,
        }
    }

    /// Compute the fit transform, or `None` for a display with no area.
    pub fn fit(&self, display: DisplayRect) -> Option<FitTransform> {
        if !display.is_drawable() || self.virtual_width <= 0.0 || self.virtual_height <= 0.0 {
            return None;
        }

        let scale = (display.width / self.virtual_width).min(display.height / self.virtual_height);
        Some(FitTransform {
            scale,
            offset_x: display.x + (display.width - self.virtual_width * scale) / 2.0,
            offset_y: display.y + (display.height - self.virtual_height * scale) / 2.0,
        })
    }

    /// Rect actually covered by the fitted image (container minus letterbox).
    pub fn content_rect(&self, display: DisplayRect) -> Option<DisplayRect> {
        self.fit(display).map(|fit| DisplayRect {
            x: fit.offset_x,
            y: fit.offset_y,
            width: self.virtual_width * fit.scale,
            height: self.virtual_height * fit.scale,
        })
    }

    pub fn project(&self, display: DisplayRect, detections: &[Detection]) -> Vec<OverlayBox> {
        let Some(fit) = self.fit(display) else {
            return Vec::new();
        };

        detections
            .iter()
            .map(|detection| {
                let (x, y, width, height) = fit.apply(&detection.bbox);
                OverlayBox {
                    x,
                    y,
                    width,
                    height,
                    label: format!(
                        "{} {:.2}",
                        detection.class_name,
                        detection.clamped_confidence()
                    ),
                }
            })
            .collect()
    }
}

impl Default for OverlayProjector {
    fn default() -> Self {
        Self::new(VIRTUAL_WIDTH, VIRTUAL_HEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame() -> Detection {
        Detection::new([0.0, 0.0, 640.0, 480.0], "person", 0.91)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn full_frame_box_covers_matching_aspect_display() {
        let projector = OverlayProjector::default();
        for (w, h) in [(640.0, 480.0), (1280.0, 960.0), (320.0, 240.0), (1000.0, 750.0)] {
            let boxes = projector.project(DisplayRect::sized(w, h), &[full_frame()]);
            assert_eq!(boxes.len(), 1);
            assert_close(boxes[0].x, 0.0);
            assert_close(boxes[0].y, 0.0);
            assert_close(boxes[0].width, w);
            assert_close(boxes[0].height, h);
        }
    }

    #[test]
    fn full_frame_box_matches_content_rect_when_letterboxed() {
        let projector = OverlayProjector::default();
        for display in [
            DisplayRect::sized(1000.0, 480.0),
            DisplayRect::sized(640.0, 900.0),
            DisplayRect::new(25.0, 40.0, 1920.0, 1080.0),
            DisplayRect::new(-10.0, 5.0, 333.0, 777.0),
        ] {
            let content = projector.content_rect(display).unwrap();
            let boxes = projector.project(display, &[full_frame()]);
            assert_close(boxes[0].x, content.x);
            assert_close(boxes[0].y, content.y);
            assert_close(boxes[0].width, content.width);
            assert_close(boxes[0].height, content.height);
        }
    }

    #[test]
    fn pillarbox_offsets_are_centered() {
        let projector = OverlayProjector::default();
        let fit = projector.fit(DisplayRect::sized(1000.0, 480.0)).unwrap();
        assert_close(fit.scale, 1.0);
        assert_close(fit.offset_x, 180.0);
        assert_close(fit.offset_y, 0.0);

        let boxes = projector.project(
            DisplayRect::sized(1000.0, 480.0),
            &[Detection::new([10.0, 10.0, 50.0, 50.0], "person", 0.91)],
        );
        assert_close(boxes[0].x, 190.0);
        assert_close(boxes[0].y, 10.0);
        assert_close(boxes[0].width, 40.0);
        assert_close(boxes[0].height, 40.0);
    }

    #[test]
    fn letterbox_scales_down_and_offsets_vertically() {
        let projector = OverlayProjector::default();
        let boxes = projector.project(
            DisplayRect::sized(320.0, 400.0),
            &[Detection::new([100.0, 100.0, 200.0, 300.0], "car", 0.5)],
        );
        // scale 0.5, image 320x240 centered in 400 => 80px bars
        assert_close(boxes[0].x, 50.0);
        assert_close(boxes[0].y, 130.0);
        assert_close(boxes[0].width, 50.0);
        assert_close(boxes[0].height, 100.0);
    }

    #[test]
    fn label_uses_clamped_confidence() {
        let projector = OverlayProjector::default();
        let boxes = projector.project(
            DisplayRect::default(),
            &[
                Detection::new([0.0; 4], "person", 0.9134),
                Detection::new([0.0; 4], "dog", 1.8),
            ],
        );
        assert_eq!(boxes[0].label, "person 0.91");
        assert_eq!(boxes[1].label, "dog 1.00");
    }

    #[test]
    fn empty_display_projects_nothing() {
        let projector = OverlayProjector::default();
        assert!(projector
            .project(DisplayRect::sized(0.0, 480.0), &[full_frame()])
            .is_empty());
        assert!(projector
            .project(DisplayRect::sized(f64::NAN, 480.0), &[full_frame()])
            .is_empty());
        assert!(projector.content_rect(DisplayRect::sized(10.0, -1.0)).is_none());
    }
}
