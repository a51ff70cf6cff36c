use crate::device::Device;
use crate::geometry::CellBox;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

/// Position of a device, keyed by its slot in the device slice the index was built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceLocation {
    pub slot: usize,
    pub position: [f64; 2],
}

impl RTreeObject for DeviceLocation {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for DeviceLocation {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Build an R*-tree over device positions via bulk_load (O(n log n)).
pub fn build_index(devices: &[Device]) -> RTree<DeviceLocation> {
    let locations = devices
        .iter()
        .enumerate()
        .map(|(slot, d)| DeviceLocation {
            slot,
            position: d.position(),
        })
        .collect();
    RTree::bulk_load(locations)
}

/// Slots of devices inside the closed box, ascending.
pub fn query_box(tree: &RTree<DeviceLocation>, bbox: &CellBox) -> Vec<usize> {
    let envelope = AABB::from_corners(bbox.min, bbox.max);
    let mut slots: Vec<usize> = tree
        .locate_in_envelope(&envelope)
        .map(|loc| loc.slot)
        .collect();
    slots.sort_unstable();
    slots
}

/// Slots of devices whose uncertainty disc (radius = accuracy) touches the box, ascending.
/// `max_accuracy` bounds the envelope search; the exact test uses each device's own radius.
pub fn query_near_box(
    tree: &RTree<DeviceLocation>,
    devices: &[Device],
    bbox: &CellBox,
    max_accuracy: f64,
) -> Vec<usize> {
    let envelope = AABB::from_corners(
        [bbox.min[0] - max_accuracy, bbox.min[1] - max_accuracy],
        [bbox.max[0] + max_accuracy, bbox.max[1] + max_accuracy],
    );
    let mut slots: Vec<usize> = tree
        .locate_in_envelope(&envelope)
        .filter(|loc| bbox.distance_to(loc.position) <= devices[loc.slot].accuracy())
        .map(|loc| loc.slot)
        .collect();
    slots.sort_unstable();
    slots
}

/// Slots of devices within `radius` of `center`, ascending.
pub fn query_radius(tree: &RTree<DeviceLocation>, center: [f64; 2], radius: f64) -> Vec<usize> {
    let mut slots: Vec<usize> = tree
        .locate_within_distance(center, radius * radius)
        .map(|loc| loc.slot)
        .collect();
    slots.sort_unstable();
    slots
}
