use anim_viewer::blend_space::{
    triangulation::{locate, triangulate},
    Node,
};
use glam::{DVec2, Vec2};
use proptest::{
    prelude::*,
    sample::{subsequence, Index},
};

fn grid() -> Vec<Vec2> {
    let mut points = Vec::new();
    for i in -4..=4 {
        for j in -4..=4 {
            points.push(Vec2::new(i as f32 / 4.0, j as f32 / 4.0));
        }
    }
    points
}

fn cross(o: DVec2, a: DVec2, b: DVec2) -> f64 {
    (a - o).perp_dot(b - o)
}

/// Andrew's monotone chain, counter-clockwise without collinear points.
fn convex_hull(points: &[Vec2]) -> Vec<DVec2> {
    let mut sorted: Vec<DVec2> = points.iter().map(|p| p.as_dvec2()).collect();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    let mut lower: Vec<DVec2> = Vec::new();
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<DVec2> = Vec::new();
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

fn polygon_area(polygon: &[DVec2]) -> f64 {
    let n = polygon.len();
    (0..n)
        .map(|i| polygon[i].perp_dot(polygon[(i + 1) % n]))
        .sum::<f64>()
        * 0.5
}

fn to_nodes(points: &[Vec2]) -> Vec<Node> {
    points
        .iter()
        .enumerate()
        .map(|(track, p)| Node::new(*p, track))
        .collect()
}

fn lattice_points() -> impl Strategy<Value = Vec<Vec2>> {
    subsequence(grid(), 3..24).prop_shuffle()
}

/// Continuous coordinates at several magnitudes, shifted by up to fifty times the scale.
fn scattered_points() -> impl Strategy<Value = Vec<Vec2>> {
    (
        prop::collection::vec((-1.0f32..1.0, -1.0f32..1.0), 3..30),
        prop::sample::select(vec![1e-3f32, 1e-2, 1.0, 100.0]),
        (-50.0f32..50.0, -50.0f32..50.0),
    )
        .prop_map(|(points, scale, (dx, dy))| {
            let offset = Vec2::new(dx, dy) * scale;
            points
                .into_iter()
                .map(|(x, y)| Vec2::new(x, y) * scale + offset)
                .collect()
        })
}

fn bounding_extent(points: &[Vec2]) -> f64 {
    let min = points.iter().copied().fold(Vec2::splat(f32::MAX), Vec2::min);
    let max = points.iter().copied().fold(Vec2::splat(f32::MIN), Vec2::max);
    (max - min).max_element() as f64
}

/// Skips slivers whose hull is too thin to hold a query off the boundary.
fn assume_area(points: &[Vec2]) -> Result<f64, TestCaseError> {
    let hull_area = polygon_area(&convex_hull(points));
    let extent = bounding_extent(points);
    if hull_area > 1e-3 * extent * extent {
        Ok(hull_area)
    } else {
        Err(TestCaseError::reject("hull is too thin"))
    }
}

fn check_tiling(points: &[Vec2]) -> Result<(), TestCaseError> {
    let hull_area = assume_area(points)?;
    let extent = bounding_extent(points);
    let triangles = triangulate(&to_nodes(points));
    prop_assert!(triangles.iter().all(|t| !t.has_sentinel()));
    prop_assert!(triangles.iter().all(|t| t.area() > 0.0));
    let total: f64 = triangles.iter().map(|t| t.area()).sum();
    prop_assert!(
        (total - hull_area).abs() < 1e-6 * extent * extent,
        "triangle area {} vs hull area {}",
        total,
        hull_area
    );
    Ok(())
}

fn check_query(points: &[Vec2], picks: [Index; 3], mix: [f32; 3]) -> Result<(), TestCaseError> {
    assume_area(points)?;
    let total: f32 = mix.iter().sum();
    prop_assume!(total > 1e-3);

    let corners = picks.map(|index| *index.get(points));
    let mixed = corners
        .iter()
        .zip(mix)
        .fold(Vec2::ZERO, |acc, (corner, w)| acc + *corner * (w / total));
    // pull off the hull boundary so rounding cannot push the query outside
    let inner = points.iter().copied().sum::<Vec2>() / points.len() as f32;
    let query = mixed.lerp(inner, 0.05);

    let triangles = triangulate(&to_nodes(points));
    let (idx, weights) = locate(&triangles, query)
        .ok_or_else(|| TestCaseError::fail(format!("{} not located", query)))?;
    prop_assert!(idx < triangles.len());
    prop_assert!(weights.iter().all(|w| *w >= 0.0));
    prop_assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);

    let covering = triangles
        .iter()
        .filter(|t| t.barycentric(query).iter().all(|w| *w > 1e-4))
        .count();
    prop_assert!(covering <= 1, "{} triangles cover {}", covering, query);
    Ok(())
}

fn check_centroids(points: &[Vec2]) -> Result<(), TestCaseError> {
    // f32 centroids of needle triangles far from the origin round off their own edges
    let extent = bounding_extent(points);
    let triangles = triangulate(&to_nodes(points));
    for triangle in triangles.iter().filter(|t| t.area() > 1e-3 * extent * extent) {
        let weights = triangle.barycentric(triangle.centroid());
        prop_assert!(weights.iter().all(|w| *w > 0.0));
        prop_assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
    Ok(())
}

proptest! {
    #[test]
    fn lattice_triangles_tile_the_convex_hull(points in lattice_points()) {
        check_tiling(&points)?;
    }

    #[test]
    fn scattered_triangles_tile_the_convex_hull(points in scattered_points()) {
        check_tiling(&points)?;
    }

    #[test]
    fn centroid_weights_are_positive(points in lattice_points()) {
        check_centroids(&points)?;
    }

    #[test]
    fn scattered_centroid_weights_are_positive(points in scattered_points()) {
        check_centroids(&points)?;
    }

    #[test]
    fn lattice_queries_resolve_to_one_triangle(
        points in lattice_points(),
        picks in prop::array::uniform3(any::<Index>()),
        mix in prop::array::uniform3(0.0f32..1.0),
    ) {
        check_query(&points, picks, mix)?;
    }

    #[test]
    fn scattered_queries_resolve_to_one_triangle(
        points in scattered_points(),
        picks in prop::array::uniform3(any::<Index>()),
        mix in prop::array::uniform3(0.0f32..1.0),
    ) {
        check_query(&points, picks, mix)?;
    }
}

#[test]
fn hull_helper_matches_square() {
    let square = [
        Vec2::new(-1.0, -1.0),
        Vec2::new(1.0, -1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(-1.0, 1.0),
        Vec2::new(0.0, -1.0),
        Vec2::ZERO,
    ];
    assert_eq!(convex_hull(&square).len(), 4);
    assert!((polygon_area(&convex_hull(&square)) - 4.0).abs() < 1e-12);
}
