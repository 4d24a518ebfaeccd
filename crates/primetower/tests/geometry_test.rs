use kurbo::Point;
use primetower::*;

#[test]
fn test_ring_vertices_on_circle() {
    let center = Point::new(100.0, 50.0);
    let vertices = ring(center, 7.5, 36);

    assert_eq!(vertices.len(), 36);
    for vertex in &vertices {
        // coordinates are rounded to 3 decimals
        assert!((vertex.distance(center) - 7.5).abs() < 2e-3);
    }
    assert_eq!(vertices[0], Point::new(107.5, 50.0));
}

#[test]
fn test_ladder_alternates_rings() {
    let center = Point::new(0.0, 0.0);
    let inner = ring(center, 3.0, 8);
    let outer = ring(center, 4.0, 8);
    let ladder = ladder(center, 3.0, 4.0, 8);

    assert_eq!(ladder.len(), 16);
    for i in 0..8 {
        assert_eq!(ladder[2 * i], inner[i]);
        assert_eq!(ladder[2 * i + 1], outer[i]);
    }
}
