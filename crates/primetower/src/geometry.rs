use kurbo::Point;
use std::f64::consts::PI;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Vertices of a regular polygon approximating a circle.
///
/// Vertex `i` sits at angle `2*pi*i/num_faces`; coordinates are rounded to
/// 3 decimals so the emitted G-code is reproducible.
pub fn ring(center: Point, radius: f64, num_faces: usize) -> Vec<Point> {
    (0..num_faces)
        .map(|i| {
            let alpha = 2.0 * PI * i as f64 / num_faces as f64;
            Point::new(
                round3(center.x + radius * alpha.cos()),
                round3(center.y + radius * alpha.sin()),
            )
        })
        .collect()
}

/// Zig-zag between two concentric rings: `r1[0], r2[0], r1[1], r2[1], ...`.
pub fn ladder(center: Point, r1: f64, r2: f64, num_faces: usize) -> Vec<Point> {
    ring(center, r1, num_faces)
        .into_iter()
        .zip(ring(center, r2, num_faces))
        .flat_map(|(inner, outer)| [inner, outer])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_vertex_count_and_radius() {
        let center = Point::new(100.0, 50.0);
        for faces in [1, 3, 8, 36] {
            let vertices = ring(center, 12.5, faces);
            assert_eq!(vertices.len(), faces);
            for v in &vertices {
                assert!((v.distance(center) - 12.5).abs() <= 0.001);
            }
        }
    }

    #[test]
    fn test_ring_starts_on_positive_x_axis() {
        let vertices = ring(Point::new(1.0, 2.0), 3.0, 4);
        assert_eq!(vertices[0], Point::new(4.0, 2.0));
        assert_eq!(vertices[1], Point::new(1.0, 5.0));
        assert_eq!(vertices[2], Point::new(-2.0, 2.0));
        assert_eq!(vertices[3], Point::new(1.0, -1.0));
    }

    #[test]
    fn test_ring_rounds_to_three_decimals() {
        for v in ring(Point::ZERO, 7.0, 7) {
            assert_eq!(v.x, round3(v.x));
            assert_eq!(v.y, round3(v.y));
        }
    }

    #[test]
    fn test_ladder_alternates_rings() {
        let center = Point::new(0.0, 0.0);
        let inner = ring(center, 5.0, 6);
        let outer = ring(center, 5.4, 6);
        let zigzag = ladder(center, 5.0, 5.4, 6);

        assert_eq!(zigzag.len(), 12);
        for i in 0..6 {
            assert_eq!(zigzag[2 * i], inner[i]);
            assert_eq!(zigzag[2 * i + 1], outer[i]);
        }
    }
}
