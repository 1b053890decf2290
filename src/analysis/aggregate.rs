//! Groups pairwise incident overlaps into maximal overlap regions.

use std::collections::{BTreeMap, HashMap};

use geo::{Area, BoundingRect, Polygon};
use itertools::Itertools;
use rayon::prelude::*;
use rstar::{RTree, RTreeObject, AABB};

use super::geometry::{self, Footprint};

/// An area covered by two or more incident footprints.
#[derive(Debug, Clone)]
pub struct OverlapRegion {
    /// Contributing incident indices, ascending and distinct.
    pub members: Vec<usize>,
    /// Projected geometry in kilometres.
    pub polygon: Polygon<f64>,
    pub area_km2: f64,
}

/// Regions plus the ground they cover.
#[derive(Debug, Clone, Default)]
pub struct Overlaps {
    pub regions: Vec<OverlapRegion>,
    /// Area in km² covered by at least two footprints, counted once.
    pub overlapped_km2: f64,
}

/// A single polygon of one pairwise intersection.
struct Piece {
    members: [usize; 2],
    polygon: Polygon<f64>,
}

struct Envelope {
    slot: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for Envelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Computes the overlap regions among `footprints`.
///
/// Every pair of footprints is intersected; each resulting piece is a
/// candidate. Candidates whose geometries overlap each other form one
/// component. A component reports the area shared by all of its incidents,
/// so three incidents overlapping in a common centre become one
/// three-incident region no larger than the smallest of them. When the
/// incidents of a component share no common area, its pairwise pieces are
/// reported instead. Candidates that never overlap stay separate, even when
/// they come from the same incident pair.
pub fn overlap_regions(footprints: &[Footprint]) -> Overlaps {
    if footprints.len() < 2 {
        return Overlaps::default();
    }

    let shapes: Vec<&Polygon<f64>> = footprints.iter().map(|f| &f.polygon).collect();
    let pieces: Vec<Piece> = candidate_pairs(&shapes)
        .into_par_iter()
        .map(|(a, b)| {
            let (lo, hi) = ordered(footprints[a].incident, footprints[b].incident);
            geometry::overlap(shapes[a], shapes[b])
                .into_iter()
                .map(|polygon| Piece {
                    members: [lo, hi],
                    polygon,
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect();

    log::debug!(
        "{} footprints produced {} pairwise overlap pieces",
        footprints.len(),
        pieces.len()
    );

    let piece_shapes: Vec<&Polygon<f64>> = pieces.iter().map(|p| &p.polygon).collect();
    let joined: Vec<(usize, usize)> = candidate_pairs(&piece_shapes)
        .into_par_iter()
        .filter(|&(a, b)| !geometry::overlap(piece_shapes[a], piece_shapes[b]).is_empty())
        .collect();

    let mut groups = DisjointSet::new(pieces.len());
    for (a, b) in joined {
        groups.union(a, b);
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for slot in 0..pieces.len() {
        components.entry(groups.find(slot)).or_default().push(slot);
    }

    let outlines: HashMap<usize, &Polygon<f64>> =
        footprints.iter().map(|f| (f.incident, &f.polygon)).collect();

    let mut overlaps = Overlaps::default();
    for slots in components.into_values() {
        let (regions, covered_km2) = merge_component(&pieces, &slots, &outlines);
        overlaps.regions.extend(regions);
        overlaps.overlapped_km2 += covered_km2;
    }
    overlaps
}

/// Regions of one component and the area its pieces cover.
fn merge_component(
    pieces: &[Piece],
    slots: &[usize],
    outlines: &HashMap<usize, &Polygon<f64>>,
) -> (Vec<OverlapRegion>, f64) {
    if let [only] = slots {
        let region = piece_region(&pieces[*only]);
        let covered_km2 = region.area_km2;
        return (vec![region], covered_km2);
    }

    let members: Vec<usize> = slots
        .iter()
        .map(|&slot| pieces[slot].members.iter().copied())
        .kmerge()
        .dedup()
        .collect();
    let covered_km2 = geometry::area_km2(&geometry::union_all(
        slots.iter().map(|&slot| &pieces[slot].polygon),
    ));

    let core = geometry::common_area(members.iter().filter_map(|m| outlines.get(m).copied()));
    if core.is_empty() {
        log::debug!("Incidents {members:?} overlap pairwise without a shared core");
        let regions = slots.iter().map(|&slot| piece_region(&pieces[slot])).collect();
        return (regions, covered_km2);
    }

    let regions = core
        .into_iter()
        .map(|polygon| OverlapRegion {
            members: members.clone(),
            area_km2: polygon.unsigned_area(),
            polygon,
        })
        .collect();
    (regions, covered_km2)
}

fn piece_region(piece: &Piece) -> OverlapRegion {
    OverlapRegion {
        members: piece.members.to_vec(),
        area_km2: piece.polygon.unsigned_area(),
        polygon: piece.polygon.clone(),
    }
}

/// Index pairs `(a, b)`, `a < b`, whose bounding boxes intersect.
fn candidate_pairs(shapes: &[&Polygon<f64>]) -> Vec<(usize, usize)> {
    let entries: Vec<Envelope> = shapes
        .iter()
        .enumerate()
        .filter_map(|(slot, shape)| {
            shape.bounding_rect().map(|rect| Envelope {
                slot,
                aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            })
        })
        .collect();
    let tree = RTree::bulk_load(entries);

    let mut pairs = Vec::new();
    for entry in tree.iter() {
        for other in tree.locate_in_envelope_intersecting(&entry.aabb) {
            if other.slot > entry.slot {
                pairs.push((entry.slot, other.slot));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

#[inline]
fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Union-find whose representative is always the smallest member, which
/// keeps component order stable.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            let (lo, hi) = ordered(ra, rb);
            self.parent[hi] = lo;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn rect(incident: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> Footprint {
        Footprint {
            incident,
            polygon: polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)],
        }
    }

    fn assert_within_smallest_member(footprints: &[Footprint], regions: &[OverlapRegion]) {
        for region in regions {
            let smallest = region
                .members
                .iter()
                .filter_map(|m| footprints.iter().find(|f| f.incident == *m))
                .map(|f| f.polygon.unsigned_area())
                .fold(f64::INFINITY, f64::min);
            assert!(
                region.area_km2 <= smallest + 1e-9,
                "region {:?} has {} km2, smallest member {smallest} km2",
                region.members,
                region.area_km2
            );
        }
    }

    #[test]
    fn fewer_than_two_footprints() {
        assert!(overlap_regions(&[]).regions.is_empty());
        assert!(overlap_regions(&[rect(0, 0.0, 0.0, 1.0, 1.0)]).regions.is_empty());
    }

    #[test]
    fn disjoint_footprints() {
        let footprints = [rect(0, 0.0, 0.0, 1.0, 1.0), rect(1, 5.0, 5.0, 6.0, 6.0)];
        let overlaps = overlap_regions(&footprints);
        assert!(overlaps.regions.is_empty());
        assert_eq!(overlaps.overlapped_km2, 0.0);
    }

    #[test]
    fn three_way_overlap_is_one_region() {
        let footprints = [
            rect(0, 0.0, 0.0, 2.0, 2.0),
            rect(1, 1.0, 0.0, 3.0, 2.0),
            rect(2, 0.5, 1.0, 2.5, 3.0),
        ];
        let overlaps = overlap_regions(&footprints);
        let regions = &overlaps.regions;

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].members, vec![0, 1, 2]);
        // Shared centre [1, 2] x [1, 2].
        assert!((regions[0].area_km2 - 1.0).abs() < 1e-9);
        // Union of the three pairwise overlaps.
        assert!((overlaps.overlapped_km2 - 3.0).abs() < 1e-9);
        assert_within_smallest_member(&footprints, regions);
    }

    #[test]
    fn small_area_inside_two_large_bounds_the_region() {
        let footprints = [
            rect(0, 0.9, 0.9, 1.1, 1.1),
            rect(1, 0.0, 0.0, 2.0, 2.0),
            rect(2, 0.1, 0.0, 2.1, 2.0),
        ];
        let overlaps = overlap_regions(&footprints);

        assert_eq!(overlaps.regions.len(), 1);
        assert_eq!(overlaps.regions[0].members, vec![0, 1, 2]);
        assert!((overlaps.regions[0].area_km2 - 0.04).abs() < 1e-9);
        assert!((overlaps.overlapped_km2 - 3.8).abs() < 1e-9);
        assert_within_smallest_member(&footprints, &overlaps.regions);
    }

    #[test]
    fn component_without_shared_core_keeps_pairs() {
        let footprints = [
            rect(0, 0.0, 0.0, 2.0, 1.0),
            rect(1, 1.0, 0.0, 3.0, 1.0),
            rect(2, 1.5, 0.0, 4.0, 1.0),
            rect(3, 2.5, 0.0, 5.0, 1.0),
        ];
        let overlaps = overlap_regions(&footprints);
        let members: Vec<Vec<usize>> = overlaps.regions.iter().map(|r| r.members.clone()).collect();

        assert_eq!(members, vec![vec![0, 1], vec![0, 2], vec![1, 2], vec![1, 3], vec![2, 3]]);
        assert!((overlaps.overlapped_km2 - 3.0).abs() < 1e-9);
        assert_within_smallest_member(&footprints, &overlaps.regions);
    }

    #[test]
    fn chain_without_shared_area_stays_split() {
        let footprints = [
            rect(0, 0.0, 0.0, 2.0, 2.0),
            rect(1, 1.0, 0.0, 3.0, 2.0),
            rect(2, 2.5, 0.0, 4.5, 2.0),
        ];
        let regions = overlap_regions(&footprints).regions;

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].members, vec![0, 1]);
        assert_eq!(regions[1].members, vec![1, 2]);
    }

    #[test]
    fn split_pair_overlap_reports_each_piece() {
        let u_shape = Footprint {
            incident: 0,
            polygon: polygon![
                (x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 3.0), (x: 2.0, y: 3.0),
                (x: 2.0, y: 1.0), (x: 1.0, y: 1.0), (x: 1.0, y: 3.0), (x: 0.0, y: 3.0),
            ],
        };
        let bar = rect(1, -1.0, 2.0, 4.0, 2.5);
        let regions = overlap_regions(&[u_shape, bar]).regions;

        assert_eq!(regions.len(), 2);
        for region in &regions {
            assert_eq!(region.members, vec![0, 1]);
            assert!((region.area_km2 - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn members_follow_incident_indices_not_slots() {
        let footprints = [rect(4, 0.0, 0.0, 2.0, 2.0), rect(2, 1.0, 1.0, 3.0, 3.0)];
        let regions = overlap_regions(&footprints).regions;

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].members, vec![2, 4]);
    }

    #[test]
    fn disjoint_set_roots_at_smallest() {
        let mut set = DisjointSet::new(5);
        set.union(4, 2);
        set.union(2, 3);
        assert_eq!(set.find(4), 2);
        assert_eq!(set.find(3), 2);
        set.union(3, 0);
        assert_eq!(set.find(4), 0);
    }
}
