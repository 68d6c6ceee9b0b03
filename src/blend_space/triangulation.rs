use std::collections::{HashMap, HashSet};

use glam::{DVec2, Vec2};
use log::{debug, warn};

use super::triangle::{orient, Node, Triangle};

/// Points this close to a circumcircle rim count as outside. Distances and areas are measured
/// after fitting the points into `[-1, 1]²`.
const CIRCUMCIRCLE_TOLERANCE: f64 = 1e-4;
/// Accepted barycentric undershoot when locating a query on a shared edge.
const LOCATE_TOLERANCE: f32 = 1e-5;
const MIN_TRIANGLE_AREA: f64 = 1e-9;
const DUPLICATE_DISTANCE: f32 = 1e-6;
const SENTINEL_SCALE: f32 = 1000.0;

/// Maps the bounding box of the control points onto `[-1, 1]²`. Every tolerance below is
/// applied in this frame, so they scale with the spread of the points.
struct UnitFrame {
    center: Vec2,
    half_extent: f32,
}

impl UnitFrame {
    fn fit(points: &[Node]) -> Self {
        let (min, max) = points.iter().fold(
            (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
            |(min, max), node| (min.min(node.position), max.max(node.position)),
        );
        let half_extent = 0.5 * (max - min).max_element();
        Self {
            center: (min + max) * 0.5,
            half_extent: if half_extent > 0.0 { half_extent } else { 1.0 },
        }
    }

    fn to_unit(&self, node: &Node) -> Node {
        Node {
            position: (node.position - self.center) / self.half_extent,
            ..*node
        }
    }
}

fn sentinel_corners(points: &[Node]) -> [Node; 4] {
    let (min, max) = points.iter().fold(
        (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
        |(min, max), node| (min.min(node.position), max.max(node.position)),
    );
    let center = (min + max) * 0.5;
    let half = SENTINEL_SCALE * (max - min).max_element().max(1.0);
    [
        Node::sentinel(center + Vec2::new(-half, -half)),
        Node::sentinel(center + Vec2::new(half, -half)),
        Node::sentinel(center + Vec2::new(half, half)),
        Node::sentinel(center + Vec2::new(-half, half)),
    ]
}

/// Incremental Delaunay triangulation of the control points.
///
/// The returned triangles reference the given nodes only and cover their convex hull. Duplicate
/// points are skipped with a warning, as is any point that ends up outside every triangle.
pub fn triangulate(points: &[Node]) -> Vec<Triangle> {
    if points.is_empty() {
        return Vec::new();
    }
    let frame = UnitFrame::fit(points);
    let unit: Vec<Node> = points.iter().map(|node| frame.to_unit(node)).collect();

    let [s0, s1, s2, s3] = sentinel_corners(&unit);
    let mut triangles = vec![Triangle::new(s0, s1, s2), Triangle::new(s0, s2, s3)];
    let mut inserted: Vec<Node> = Vec::with_capacity(points.len());
    let mut originals: HashMap<[u32; 2], Node> = HashMap::with_capacity(points.len());

    for (&point, &original) in unit.iter().zip(points) {
        if let Some(existing) = inserted
            .iter()
            .find(|n| n.position.distance(point.position) < DUPLICATE_DISTANCE)
        {
            warn!(
                "blend space: point {} (clip {:?}) duplicates clip {:?}, skipped",
                original.position, original.track, existing.track
            );
            continue;
        }
        if insert(&mut triangles, point) {
            inserted.push(point);
            originals.insert(point.key(), original);
        } else {
            warn!(
                "blend space: point {} (clip {:?}) is inside no circumcircle, skipped",
                original.position, original.track
            );
        }
    }

    triangles.retain(|triangle| !triangle.has_sentinel());
    fill_hull_pockets(&inserted, &mut triangles);

    for node in &inserted {
        if !triangles.iter().any(|triangle| triangle.has_node(node)) {
            let original = originals.get(&node.key()).unwrap_or(node);
            warn!(
                "blend space: point {} (clip {:?}) is not part of any triangle",
                original.position, original.track
            );
        }
    }
    if triangles.is_empty() {
        warn!(
            "blend space: {} control points span no area, lookups will keep the default clip",
            inserted.len()
        );
    }
    debug!(
        "blend space: {} triangles over {} points",
        triangles.len(),
        inserted.len()
    );
    // a uniform scale keeps the winding
    triangles
        .into_iter()
        .map(|triangle| Triangle {
            nodes: triangle
                .nodes
                .map(|node| originals.get(&node.key()).copied().unwrap_or(node)),
        })
        .collect()
}

/// Bowyer-Watson step. Returns false when no triangle was invalidated by `point`.
fn insert(triangles: &mut Vec<Triangle>, point: Node) -> bool {
    let p = point.dvec();
    let (bad, good): (Vec<Triangle>, Vec<Triangle>) =
        triangles.drain(..).partition(|triangle| {
            triangle
                .circumcircle()
                .is_some_and(|circle| circle.contains(p, CIRCUMCIRCLE_TOLERANCE))
                || triangle.barycentric_f64(p).iter().all(|w| *w >= 0.0)
        });
    *triangles = good;
    if bad.is_empty() {
        return false;
    }

    let mut seen = HashSet::new();
    let mut star: Vec<(f64, Node)> = bad
        .iter()
        .flat_map(|triangle| triangle.nodes)
        .filter(|node| seen.insert(node.key()))
        .map(|node| {
            let d = node.dvec() - p;
            (d.y.atan2(d.x), node)
        })
        .collect();
    star.sort_by(|a, b| a.0.total_cmp(&b.0));

    for i in 0..star.len() {
        let a = star[i].1;
        let b = star[(i + 1) % star.len()].1;
        // the closing pair can wrap by more than half a turn on a degenerate cavity
        if 0.5 * orient(p, a.dvec(), b.dvec()) > MIN_TRIANGLE_AREA {
            triangles.push(Triangle { nodes: [point, a, b] });
        }
    }
    true
}

/// Edges used by exactly one triangle, in winding direction.
fn boundary_edges(triangles: &[Triangle]) -> Vec<(Node, Node)> {
    let directed: HashSet<([u32; 2], [u32; 2])> = triangles
        .iter()
        .flat_map(Triangle::edges)
        .map(|(a, b)| (a.key(), b.key()))
        .collect();
    triangles
        .iter()
        .flat_map(Triangle::edges)
        .filter(|(a, b)| !directed.contains(&(b.key(), a.key())))
        .collect()
}

fn segments_cross(a: DVec2, b: DVec2, c: DVec2, d: DVec2) -> bool {
    let d1 = orient(a, b, c);
    let d2 = orient(a, b, d);
    let d3 = orient(c, d, a);
    let d4 = orient(c, d, b);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

/// Next triangle that fills a reflex notch of the boundary, if any.
fn pocket_ear(points: &[Node], boundary: &[(Node, Node)]) -> Option<Triangle> {
    let mut outgoing: HashMap<[u32; 2], Vec<Node>> = HashMap::new();
    for (from, to) in boundary {
        outgoing.entry(from.key()).or_default().push(*to);
    }
    for &(a, b) in boundary {
        // pinched boundary vertices have several ways out; leave them alone
        let Some([c]) = outgoing.get(&b.key()).map(Vec::as_slice) else {
            continue;
        };
        let c = *c;
        if c.key() == a.key() {
            continue;
        }
        let (pa, pb, pc) = (a.dvec(), b.dvec(), c.dvec());
        if orient(pa, pb, pc) > -MIN_TRIANGLE_AREA {
            continue;
        }
        let ear = Triangle { nodes: [a, c, b] };
        let swallows_point = points.iter().any(|node| {
            !ear.has_node(node) && ear.barycentric_f64(node.dvec()).iter().all(|w| *w > 1e-9)
        });
        if swallows_point {
            continue;
        }
        let crosses_boundary = boundary.iter().any(|(e0, e1)| {
            let shares_end = [a.key(), c.key()].contains(&e0.key())
                || [a.key(), c.key()].contains(&e1.key());
            !shares_end && segments_cross(pa, pc, e0.dvec(), e1.dvec())
        });
        if !crosses_boundary {
            return Some(ear);
        }
    }
    None
}

/// Fills notches between the triangulated region and the convex hull of `points`.
///
/// With far-away sentinel corners this rarely has anything to do, but thin hull triangles
/// whose circumcircle reached a sentinel are dropped together with it.
fn fill_hull_pockets(points: &[Node], triangles: &mut Vec<Triangle>) {
    let max_ears = 4 * points.len() + 16;
    for _ in 0..max_ears {
        let boundary = boundary_edges(triangles);
        match pocket_ear(points, &boundary) {
            Some(ear) => {
                debug!(
                    "blend space: hull repair added clips {:?}",
                    ear.nodes.map(|n| n.track)
                );
                triangles.push(ear);
            }
            None => return,
        }
    }
    warn!("blend space: hull repair stopped after {} triangles", max_ears);
}

/// First triangle containing `p`, with its clamped and renormalised corner weights.
pub fn locate(triangles: &[Triangle], p: Vec2) -> Option<(usize, [f32; 3])> {
    triangles.iter().enumerate().find_map(|(idx, triangle)| {
        let weights = triangle.barycentric(p);
        if !weights.iter().all(|w| *w >= -LOCATE_TOLERANCE) {
            return None;
        }
        let clamped = weights.map(|w| w.max(0.0));
        let total: f32 = clamped.iter().sum();
        Some((idx, clamped.map(|w| w / total)))
    })
}
