use glam::{DVec2, Vec2};

/// A control point of the blend space. `track` is `None` for the bounding corners that only
/// exist while triangulating.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    pub position: Vec2,
    pub track: Option<usize>,
}

impl Node {
    pub fn new(position: Vec2, track: usize) -> Self {
        Self {
            position,
            track: Some(track),
        }
    }

    pub fn sentinel(position: Vec2) -> Self {
        Self {
            position,
            track: None,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.track.is_none()
    }

    pub(crate) fn key(&self) -> [u32; 2] {
        [self.position.x.to_bits(), self.position.y.to_bits()]
    }

    pub(crate) fn dvec(&self) -> DVec2 {
        self.position.as_dvec2()
    }
}

/// Twice the signed area of `abc`, positive when counter-clockwise.
pub(crate) fn orient(a: DVec2, b: DVec2, c: DVec2) -> f64 {
    (b - a).perp_dot(c - a)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub center: DVec2,
    pub radius: f64,
}

impl Circle {
    /// Strictly inside, ignoring points within `tolerance` of the rim.
    pub fn contains(&self, p: DVec2, tolerance: f64) -> bool {
        self.center.distance(p) < self.radius - tolerance
    }
}

/// Three nodes in counter-clockwise order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub nodes: [Node; 3],
}

impl Triangle {
    /// Reorders the corners to be counter-clockwise.
    pub fn new(a: Node, b: Node, c: Node) -> Self {
        if orient(a.dvec(), b.dvec(), c.dvec()) < 0.0 {
            Self { nodes: [a, c, b] }
        } else {
            Self { nodes: [a, b, c] }
        }
    }

    fn corners(&self) -> [DVec2; 3] {
        self.nodes.map(|node| node.dvec())
    }

    pub fn area(&self) -> f64 {
        let [a, b, c] = self.corners();
        0.5 * orient(a, b, c)
    }

    pub fn centroid(&self) -> Vec2 {
        let [a, b, c] = self.nodes.map(|node| node.position);
        (a + b + c) / 3.0
    }

    pub fn has_sentinel(&self) -> bool {
        self.nodes.iter().any(Node::is_sentinel)
    }

    pub fn has_node(&self, node: &Node) -> bool {
        self.nodes.iter().any(|n| n.key() == node.key())
    }

    /// Directed edges following the winding.
    pub fn edges(&self) -> [(Node, Node); 3] {
        let [a, b, c] = self.nodes;
        [(a, b), (b, c), (c, a)]
    }

    /// Weights of the three corners for `p`. All are non-negative iff `p` lies inside.
    /// A degenerate triangle yields NaN weights, which never pass a `>=` test.
    pub fn barycentric(&self, p: Vec2) -> [f32; 3] {
        self.barycentric_f64(p.as_dvec2()).map(|w| w as f32)
    }

    pub(crate) fn barycentric_f64(&self, p: DVec2) -> [f64; 3] {
        let [a, b, c] = self.corners();
        let total = orient(a, b, c);
        let wa = orient(p, b, c) / total;
        let wb = orient(a, p, c) / total;
        [wa, wb, 1.0 - wa - wb]
    }

    /// None for collinear corners.
    pub fn circumcircle(&self) -> Option<Circle> {
        let [a, b, c] = self.corners();
        let d = 2.0 * orient(a, b, c);
        if d.abs() < f64::EPSILON {
            return None;
        }
        let (ab, ac) = (b - a, c - a);
        let center = a + DVec2::new(
            ac.y * ab.length_squared() - ab.y * ac.length_squared(),
            ab.x * ac.length_squared() - ac.x * ab.length_squared(),
        ) / d;
        Some(Circle {
            center,
            radius: center.distance(a),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Triangle {
        Triangle::new(
            Node::new(Vec2::new(0.0, 0.0), 0),
            Node::new(Vec2::new(0.0, 1.0), 2),
            Node::new(Vec2::new(1.0, 0.0), 1),
        )
    }

    #[test]
    fn constructor_winds_counter_clockwise() {
        let triangle = unit();
        assert!(triangle.area() > 0.0);
        assert_eq!(triangle.nodes[1].track, Some(1));
        assert!((triangle.area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn centroid_weights_are_thirds() {
        let triangle = unit();
        let weights = triangle.barycentric(triangle.centroid());
        for w in weights {
            assert!((w - 1.0 / 3.0).abs() < 1e-6);
        }
        let outside = triangle.barycentric(Vec2::new(1.0, 1.0));
        assert!(outside.iter().any(|w| *w < 0.0));
    }

    #[test]
    fn circumcircle_passes_through_corners() {
        let circle = unit().circumcircle().unwrap();
        assert!(circle.center.abs_diff_eq(DVec2::new(0.5, 0.5), 1e-12));
        assert!((circle.radius - 0.5f64.sqrt()).abs() < 1e-12);
        assert!(circle.contains(DVec2::new(0.9, 0.9), 1e-4));
        assert!(!circle.contains(DVec2::new(1.0, 1.0), 1e-4));

        let flat = Triangle::new(
            Node::new(Vec2::ZERO, 0),
            Node::new(Vec2::X, 1),
            Node::new(Vec2::new(2.0, 0.0), 2),
        );
        assert!(flat.circumcircle().is_none());
    }
}
