//! Per-view lists of observed points.

use nalgebra::Vector2;

/// A single observation of a point inside one view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub point: usize,
    pub pixel: Vector2<f64>,
}

/// Observations made from one view, in the order they contribute Jacobian rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationView {
    pub observations: Vec<Observation>,
}

impl ObservationView {
    pub fn add(&mut self, point: usize, pixel: Vector2<f64>) {
        self.observations.push(Observation { point, pixel });
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }
}

/// Observations for every view of a scene, indexed like the scene's views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneObservations {
    pub views: Vec<ObservationView>,
}

impl SceneObservations {
    /// Empty observation lists for `num_views` views.
    pub fn new(num_views: usize) -> Self {
        Self {
            views: vec![ObservationView::default(); num_views],
        }
    }

    /// Total number of observations over all views.
    pub fn observation_count(&self) -> usize {
        self.views.iter().map(ObservationView::len).sum()
    }

    /// Record that `view` observes `point` at `pixel`.
    ///
    /// # Panics
    ///
    /// Panics if `view` is out of range.
    pub fn add(&mut self, view: usize, point: usize, pixel: Vector2<f64>) {
        self.views[view].add(point, pixel);
    }

    /// Iterate over `(view, observation)` pairs in Jacobian row order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Observation)> {
        self.views
            .iter()
            .enumerate()
            .flat_map(|(view, obs)| obs.iter().map(move |o| (view, o)))
    }
}
