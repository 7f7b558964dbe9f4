//! Landmark topology: which landmark index is which anatomical point.
//!
//! The geometry extractor never hard-codes indices; it reads them from a
//! [`LandmarkTopology`] so a detector with a different point layout only
//! needs a new constant here.

/// Index of each anatomical point the measurements use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LandmarkTopology {
    pub forehead_left: usize,
    pub forehead_right: usize,
    pub jaw_left: usize,
    pub jaw_right: usize,
    pub cheek_left: usize,
    pub cheek_right: usize,
    pub forehead_center: usize,
    pub chin: usize,
}

impl LandmarkTopology {
    /// Minimum landmark count that covers every index in this topology.
    pub fn required_len(&self) -> usize {
        [
            self.forehead_left,
            self.forehead_right,
            self.jaw_left,
            self.jaw_right,
            self.cheek_left,
            self.cheek_right,
            self.forehead_center,
            self.chin,
        ]
        .into_iter()
        .max()
        .map_or(0, |max| max + 1)
    }

    /// The four measured spans as landmark index pairs, in
    /// (forehead, jawline, cheekbone, length) order.
    pub fn measurement_segments(&self) -> [(usize, usize); 4] {
        [
            (self.forehead_left, self.forehead_right),
            (self.jaw_left, self.jaw_right),
            (self.cheek_left, self.cheek_right),
            (self.forehead_center, self.chin),
        ]
    }
}

/// Number of points produced by the 468-point face mesh model.
pub const FACE_MESH_LANDMARKS: usize = 468;

/// Anatomical points in the 468-point face mesh.
pub const FACE_MESH: LandmarkTopology = LandmarkTopology {
    forehead_left: 67,
    forehead_right: 296,
    jaw_left: 172,
    jaw_right: 397,
    cheek_left: 123,
    cheek_right: 352,
    forehead_center: 10,
    chin: 152,
};

/// Face silhouette contour of the face mesh, as a closed loop of indices.
const FACE_OVAL_LOOP: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, 361, 288, 397, 365, 379, 378, 400, 377, 152,
    148, 176, 149, 150, 136, 172, 58, 132, 93, 234, 127, 162, 21, 54, 103, 67, 109,
];

/// Face-oval edges for the overlay renderer.
pub fn face_oval_connections() -> Vec<(usize, usize)> {
    FACE_OVAL_LOOP
        .iter()
        .zip(FACE_OVAL_LOOP.iter().cycle().skip(1))
        .map(|(&a, &b)| (a, b))
        .collect()
}

/// Edges drawn over an analyzed face: the silhouette plus the measured spans.
pub fn overlay_connections(topology: &LandmarkTopology) -> Vec<(usize, usize)> {
    let mut edges = face_oval_connections();
    edges.extend(topology.measurement_segments());
    edges
}
