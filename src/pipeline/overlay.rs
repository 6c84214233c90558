//! Bounding-box and label overlay for detector hits.

use super::detector::Detection;
use super::surface::{Surface, RED};

const STROKE_WIDTH: u32 = 3;
/// 5x7 glyphs at this scale approximate a 24px font.
const LABEL_SCALE: u32 = 3;

/// Draw each detection as a stroked rectangle with a label, in list order.
/// Later detections paint over earlier ones; inverted rectangles are handed
/// to the stroke primitive as given.
pub fn draw_detections(surface: &mut Surface, detections: &[Detection]) {
    let width = surface.width() as f64;
    let height = surface.height() as f64;

    for detection in detections {
        let x = (width * detection.left) as f32;
        let y = (height * detection.top) as f32;
        let w = (width * (detection.right - detection.left)) as f32;
        let h = (height * (detection.bottom - detection.top)) as f32;

        surface.stroke_rect(x, y, w, h, STROKE_WIDTH, RED);

        let label = format!("{} ({})", detection.label, detection.confidence);
        surface.draw_text(&label, x + 5.0, y + 30.0, LABEL_SCALE, RED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::surface::Color;
    use image::Rgba;

    const WHITE: Color = Rgba([255, 255, 255, 255]);

    fn detection(left: f64, top: f64, right: f64, bottom: f64) -> Detection {
        Detection {
            left,
            top,
            right,
            bottom,
            label: "person".to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn rectangle_lands_on_the_normalised_coordinates() {
        let mut surface = Surface::blank(200, 100, WHITE);
        draw_detections(&mut surface, &[detection(0.1, 0.2, 0.5, 0.7)]);

        // Pixel rect: x = 200*0.1 = 20, y = 100*0.2 = 20,
        // w = 200*0.4 = 80, h = 100*0.5 = 50.
        assert_eq!(surface.pixel(20, 20), RED);
        assert_eq!(surface.pixel(99, 20), RED);
        assert_eq!(surface.pixel(20, 69), RED);
        assert_eq!(surface.pixel(19, 20), WHITE);
        assert_eq!(surface.pixel(100, 20), WHITE);
    }

    #[test]
    fn inverted_rectangles_render_without_panicking() {
        let mut surface = Surface::blank(100, 100, WHITE);
        // right < left and bottom < top.
        draw_detections(&mut surface, &[detection(0.8, 0.9, 0.2, 0.1)]);
        assert_eq!(surface.pixel(20, 10), RED);
    }

    #[test]
    fn detections_draw_in_list_order() {
        let mut surface = Surface::blank(100, 100, WHITE);
        draw_detections(
            &mut surface,
            &[detection(0.0, 0.0, 0.3, 0.3), detection(0.5, 0.5, 0.9, 0.9)],
        );
        assert_eq!(surface.pixel(0, 0), RED);
        assert_eq!(surface.pixel(50, 50), RED);
    }

    #[test]
    fn degenerate_zero_area_detection_is_harmless() {
        let mut surface = Surface::blank(100, 100, WHITE);
        draw_detections(&mut surface, &[detection(0.5, 0.5, 0.5, 0.5)]);
        // A zero-area box paints no stroke bands but must not panic.
        assert_eq!(surface.pixel(50, 50), WHITE);
    }
}
