//! Parameter vector layout.
//!
//! The optimizer works on a flat vector partitioned as
//!
//! ```text
//! [ points (N_p · d) | unknown views (6 each) | unknown camera intrinsics (K_c each) ]
//!   0                  first_view_offset        first_camera_offset
//! ```
//!
//! where `d` is 3 for Euclidean and 4 for homogeneous points. Each unknown view stores its
//! Rodrigues rotation followed by its translation. Known views and cameras take no slots.

use crate::scene::SceneStructureMetric;

/// Number of parameters of an unknown view: Rodrigues rotation (3) and translation (3).
pub const VIEW_PARAMETER_COUNT: usize = 6;

/// Where an element's parameters live inside its block of the parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSlot {
    /// Known element, not part of the parameter vector.
    Fixed,
    /// Unknown element occupying `width` parameters starting at `offset` within its block.
    Free { offset: usize, width: usize },
}

impl ParameterSlot {
    pub fn is_free(&self) -> bool {
        matches!(self, ParameterSlot::Free { .. })
    }

    /// Block-relative offset of a free slot.
    pub fn offset(&self) -> Option<usize> {
        match self {
            ParameterSlot::Fixed => None,
            ParameterSlot::Free { offset, .. } => Some(*offset),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            ParameterSlot::Fixed => 0,
            ParameterSlot::Free { width, .. } => *width,
        }
    }
}

/// Offsets of every unknown inside the flat parameter vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterLayout {
    /// Coordinates per point, 3 or 4
    pub point_dim: usize,
    /// Number of points in the structure
    pub num_points: usize,
    /// One slot per view, offsets relative to `first_view_offset`
    pub views: Vec<ParameterSlot>,
    /// One slot per camera, offsets relative to `first_camera_offset`
    pub cameras: Vec<ParameterSlot>,
    /// Absolute index of the first view parameter
    pub first_view_offset: usize,
    /// Absolute index of the first camera parameter
    pub first_camera_offset: usize,
    /// Length of the parameter vector
    pub total_parameter_count: usize,
}

impl ParameterLayout {
    /// Derive the layout from the known/unknown composition of `structure`.
    pub fn new(structure: &SceneStructureMetric) -> Self {
        let point_dim = structure.point_dim();
        let num_points = structure.points.len();
        let first_view_offset = num_points * point_dim;

        let mut next = 0;
        let views = structure
            .views
            .iter()
            .map(|view| {
                if view.world_to_view.is_known() {
                    return ParameterSlot::Fixed;
                }
                let slot = ParameterSlot::Free {
                    offset: next,
                    width: VIEW_PARAMETER_COUNT,
                };
                next += VIEW_PARAMETER_COUNT;
                slot
            })
            .collect();
        let first_camera_offset = first_view_offset + next;

        let mut next = 0;
        let cameras = structure
            .cameras
            .iter()
            .map(|camera| {
                let width = camera.unknown_parameter_count();
                if camera.model.is_known() {
                    return ParameterSlot::Fixed;
                }
                let slot = ParameterSlot::Free {
                    offset: next,
                    width,
                };
                next += width;
                slot
            })
            .collect();
        let total_parameter_count = first_camera_offset + next;

        Self {
            point_dim,
            num_points,
            views,
            cameras,
            first_view_offset,
            first_camera_offset,
            total_parameter_count,
        }
    }

    /// Length N of the parameter vector.
    pub fn input_dimension(&self) -> usize {
        self.total_parameter_count
    }

    /// Columns of the point block, `num_points · point_dim`.
    pub fn point_parameter_count(&self) -> usize {
        self.first_view_offset
    }

    /// Columns taken by unknown views.
    pub fn view_parameter_count(&self) -> usize {
        self.first_camera_offset - self.first_view_offset
    }

    /// Columns taken by unknown camera intrinsics.
    pub fn camera_parameter_count(&self) -> usize {
        self.total_parameter_count - self.first_camera_offset
    }

    /// Absolute index of the first coordinate of `point`.
    pub fn point_offset(&self, point: usize) -> usize {
        point * self.point_dim
    }

    /// Absolute index of the first parameter of an unknown view.
    pub fn view_offset(&self, view: usize) -> Option<usize> {
        self.views
            .get(view)
            .and_then(ParameterSlot::offset)
            .map(|offset| self.first_view_offset + offset)
    }

    /// Absolute index of the first intrinsic of an unknown camera.
    pub fn camera_offset(&self, camera: usize) -> Option<usize> {
        self.cameras
            .get(camera)
            .and_then(ParameterSlot::offset)
            .map(|offset| self.first_camera_offset + offset)
    }
}
