//! Nearest-neighbour search over the data points of a map-view.
//!
//! The tree answers "which data points are close to this position" queries used by pick
//! callbacks. Candidates are first restricted to an axis-aligned box around the query point and
//! then refined by their euclidean distance. A point is inside the search radius `d` only if its
//! distance is strictly less than `d`, both for the box and for the circle.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use eomaps_types::cartesian::Point2d;
use log::error;

use crate::data_manager::Coordinates;
use crate::error::EomapsError;

/// Search radius of a [`SearchTree`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchRadius {
    /// Radius in plot-projection units.
    Absolute(f64),
    /// Multiple of the estimated radius of the plotted shapes.
    Multiple(f64),
}

impl Default for SearchRadius {
    fn default() -> Self {
        Self::Multiple(50.0)
    }
}

impl Display for SearchRadius {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchRadius::Absolute(v) => write!(f, "{v}"),
            SearchRadius::Multiple(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<f64> for SearchRadius {
    fn from(value: f64) -> Self {
        Self::Absolute(value)
    }
}

impl FromStr for SearchRadius {
    type Err = EomapsError;

    /// Numeric strings are interpreted as a multiple of the estimated shape radius.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(SearchRadius::Multiple)
            .ok_or_else(|| EomapsError::Generic(format!("invalid search radius: {s:?}")))
    }
}

/// Nearest-neighbour index over scattered or gridded coordinates.
#[derive(Debug)]
pub struct SearchTree {
    coords: Option<Coordinates>,
    radius: SearchRadius,
    estimated_radius: Option<(f64, f64)>,
    d: f64,
    x_sorted: Option<Vec<usize>>,
}

impl Default for SearchTree {
    fn default() -> Self {
        Self {
            coords: None,
            radius: SearchRadius::default(),
            estimated_radius: None,
            d: f64::INFINITY,
            x_sorted: None,
        }
    }
}

impl SearchTree {
    /// Creates an empty tree. Queries return `None` until coordinates are set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coordinates to search in.
    ///
    /// The acceleration index is dropped only if the coordinate arrays differ from the current
    /// ones.
    pub fn set_coordinates(&mut self, coords: Coordinates) {
        let unchanged = self
            .coords
            .as_ref()
            .is_some_and(|current| current.same_arrays(&coords));
        if !unchanged {
            self.x_sorted = None;
        }

        self.coords = Some(coords);
    }

    /// Coordinates the tree searches in.
    pub fn coordinates(&self) -> Option<&Coordinates> {
        self.coords.as_ref()
    }

    /// Drops the acceleration index. It is rebuilt on the next query.
    pub fn invalidate(&mut self) {
        self.x_sorted = None;
    }

    /// Sets the estimated `(rx, ry)` radius of the plotted shapes and resolves the search radius
    /// again.
    pub fn set_estimated_radius(&mut self, radius: Option<(f64, f64)>) {
        self.estimated_radius = radius;
        self.set_search_radius(self.radius);
    }

    /// Sets the search radius.
    ///
    /// If the radius is a [`SearchRadius::Multiple`] but no shape radius estimate is available,
    /// the search is unbounded.
    pub fn set_search_radius(&mut self, radius: impl Into<SearchRadius>) {
        self.radius = radius.into();
        self.d = match self.radius {
            SearchRadius::Absolute(d) => d,
            SearchRadius::Multiple(factor) => match self.estimated_radius {
                Some((rx, ry)) if rx.is_finite() && ry.is_finite() => factor * rx.max(ry),
                _ => {
                    error!(
                        "Unable to estimate the search radius from {}; using an infinite radius",
                        self.radius
                    );
                    f64::INFINITY
                }
            },
        };
    }

    /// The configured search radius.
    pub fn search_radius(&self) -> SearchRadius {
        self.radius
    }

    /// The resolved search distance in plot-projection units.
    pub fn d(&self) -> f64 {
        self.d
    }

    /// Returns flat indices of up to `k` data points within distance `d` of `point`.
    ///
    /// If `d` is `None` the configured search radius is used. If `k > 1` and
    /// `pick_relative_to_closest` is set, the nearest point is found first and the `k` nearest
    /// points are then searched around that point instead of the original position.
    ///
    /// Returns `None` if no point is found. For `k == 1` the result contains exactly the nearest
    /// point; for `k > 1` the order of the returned indices is unspecified.
    pub fn query(
        &mut self,
        point: Point2d,
        k: usize,
        d: Option<f64>,
        pick_relative_to_closest: bool,
    ) -> Option<Vec<usize>> {
        let d = d.unwrap_or(self.d);
        if k == 0 || d.is_nan() {
            return None;
        }

        if k > 1 && pick_relative_to_closest {
            let closest = *self.query(point, 1, Some(d), false)?.first()?;
            let anchor = self.coords.as_ref()?.position(closest)?;
            return self.query(anchor, k, Some(d), false);
        }

        let mut candidates = self.candidates(point, d);
        if candidates.is_empty() {
            return None;
        }

        if k == 1 {
            return candidates
                .iter()
                .min_by(|a, b| compare_distance(a, b))
                .map(|(index, _)| vec![*index]);
        }

        if candidates.len() > k {
            candidates.select_nth_unstable_by(k - 1, compare_distance);
            candidates.truncate(k);
        }

        Some(candidates.into_iter().map(|(index, _)| index).collect())
    }

    fn candidates(&mut self, point: Point2d, d: f64) -> Vec<(usize, f64)> {
        self.ensure_index();
        let Some(coords) = &self.coords else {
            return vec![];
        };

        let d_sq = d * d;
        let mut result = vec![];

        match coords {
            Coordinates::Scattered { x, y } => {
                let Some(sorted) = &self.x_sorted else {
                    return vec![];
                };

                let start = sorted.partition_point(|&i| x[i] <= point.x - d);
                let end = sorted.partition_point(|&i| x[i] < point.x + d);
                for &i in sorted.get(start..end).unwrap_or_default() {
                    let (dx, dy) = (x[i] - point.x, y[i] - point.y);
                    if dy.abs() < d {
                        let dist_sq = dx * dx + dy * dy;
                        if dist_sq < d_sq {
                            result.push((i, dist_sq));
                        }
                    }
                }
            }
            Coordinates::Gridded { x, y } => {
                let ny = y.len();
                let ix = axis_candidates(x, point.x, d);
                let iy = axis_candidates(y, point.y, d);
                for &(i, dx) in &ix {
                    for &(j, dy) in &iy {
                        let dist_sq = dx * dx + dy * dy;
                        if dist_sq < d_sq {
                            result.push((i * ny + j, dist_sq));
                        }
                    }
                }
            }
        }

        result
    }

    fn ensure_index(&mut self) {
        if self.x_sorted.is_some() {
            return;
        }

        // Points without a y coordinate are not indexed.
        if let Some(Coordinates::Scattered { x, y }) = &self.coords {
            let n = x.len().min(y.len());
            let mut sorted: Vec<usize> = (0..n).filter(|&i| !x[i].is_nan()).collect();
            sorted.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
            self.x_sorted = Some(sorted);
        }
    }
}

fn axis_candidates(axis: &[f64], value: f64, d: f64) -> Vec<(usize, f64)> {
    axis.iter()
        .enumerate()
        .filter_map(|(i, v)| {
            let delta = v - value;
            (delta.abs() < d).then_some((i, delta))
        })
        .collect()
}

fn compare_distance(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}
