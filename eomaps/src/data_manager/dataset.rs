use std::fmt::{Display, Formatter};
use std::sync::Arc;

use eomaps_types::cartesian::{Point2d, Rect};

use crate::error::EomapsError;

/// Identifier of a data point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataId {
    /// Numeric id.
    Index(usize),
    /// Named id.
    Name(String),
}

impl Display for DataId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataId::Index(v) => write!(f, "{v}"),
            DataId::Name(v) => write!(f, "{v}"),
        }
    }
}

impl From<usize> for DataId {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&str> for DataId {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for DataId {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

/// Coordinates of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Coordinates {
    /// One `(x[i], y[i])` pair per data point.
    Scattered {
        /// X coordinates.
        x: Arc<[f64]>,
        /// Y coordinates.
        y: Arc<[f64]>,
    },
    /// Regular grid: data point `(i, j)` is located at `(x[i], y[j])` and stored at the flat
    /// index `i * y.len() + j`.
    Gridded {
        /// X axis.
        x: Arc<[f64]>,
        /// Y axis.
        y: Arc<[f64]>,
    },
}

impl Coordinates {
    /// Scattered coordinates. Fails if `x` and `y` differ in length.
    pub fn scattered(
        x: impl Into<Arc<[f64]>>,
        y: impl Into<Arc<[f64]>>,
    ) -> Result<Self, EomapsError> {
        let (x, y) = (x.into(), y.into());
        check_pairs(&x, &y)?;
        Ok(Self::Scattered { x, y })
    }

    /// Gridded coordinates.
    pub fn gridded(x: impl Into<Arc<[f64]>>, y: impl Into<Arc<[f64]>>) -> Self {
        Self::Gridded {
            x: x.into(),
            y: y.into(),
        }
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        match self {
            Coordinates::Scattered { x, .. } => x.len(),
            Coordinates::Gridded { x, y } => x.len() * y.len(),
        }
    }

    /// Returns true if there are no data points.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of the data: `(n, 1)` for scattered and `(x.len(), y.len())` for gridded data.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Coordinates::Scattered { x, .. } => (x.len(), 1),
            Coordinates::Gridded { x, y } => (x.len(), y.len()),
        }
    }

    /// Position of the data point with the given flat index.
    pub fn position(&self, index: usize) -> Option<Point2d> {
        match self {
            Coordinates::Scattered { x, y } => Some(Point2d::new(*x.get(index)?, *y.get(index)?)),
            Coordinates::Gridded { x, y } => {
                if y.is_empty() {
                    return None;
                }
                let (i, j) = (index / y.len(), index % y.len());
                Some(Point2d::new(*x.get(i)?, *y.get(j)?))
            }
        }
    }

    /// Bounding box of all finite coordinates.
    pub fn bounds(&self) -> Option<Rect> {
        let (x, y) = self.axes();
        Rect::from_coordinates(x, y)
    }

    /// The raw x and y arrays.
    pub fn axes(&self) -> (&[f64], &[f64]) {
        match self {
            Coordinates::Scattered { x, y } | Coordinates::Gridded { x, y } => (x, y),
        }
    }

    pub(crate) fn same_arrays(&self, other: &Coordinates) -> bool {
        match (self, other) {
            (
                Coordinates::Scattered { x: x1, y: y1 },
                Coordinates::Scattered { x: x2, y: y2 },
            )
            | (Coordinates::Gridded { x: x1, y: y1 }, Coordinates::Gridded { x: x2, y: y2 }) => {
                Arc::ptr_eq(x1, x2) && Arc::ptr_eq(y1, y2)
            }
            _ => false,
        }
    }
}

fn check_pairs(x: &[f64], y: &[f64]) -> Result<(), EomapsError> {
    if x.len() != y.len() {
        return Err(EomapsError::Generic(format!(
            "x and y must have the same length, got {} and {}",
            x.len(),
            y.len()
        )));
    }

    Ok(())
}

/// A dataset attached to a map-view.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Coordinates in the plot projection.
    pub coords: Coordinates,
    /// Coordinates in the input projection, if the data was reprojected.
    pub original: Option<Coordinates>,
    /// Data values, one per data point (flat, row-major for gridded data).
    pub values: Arc<[f64]>,
    /// Identifiers, one per data point.
    pub ids: Arc<[DataId]>,
}

impl Dataset {
    /// Creates a dataset with index-based ids.
    pub fn new(coords: Coordinates, values: impl Into<Arc<[f64]>>) -> Result<Self, EomapsError> {
        let ids: Arc<[DataId]> = (0..coords.len()).map(DataId::Index).collect();
        Self::with_ids(coords, values, ids)
    }

    /// Creates a dataset with explicit ids.
    pub fn with_ids(
        coords: Coordinates,
        values: impl Into<Arc<[f64]>>,
        ids: impl Into<Arc<[DataId]>>,
    ) -> Result<Self, EomapsError> {
        let values = values.into();
        let ids = ids.into();

        if let Coordinates::Scattered { x, y } = &coords {
            check_pairs(x, y)?;
        }

        let n = coords.len();
        if values.len() != n || ids.len() != n {
            return Err(EomapsError::Generic(format!(
                "expected {n} values and ids, got {} values and {} ids",
                values.len(),
                ids.len()
            )));
        }

        Ok(Self {
            coords,
            original: None,
            values,
            ids,
        })
    }

    /// Sets the coordinates in the input projection.
    pub fn with_original(mut self, original: Coordinates) -> Self {
        self.original = Some(original);
        self
    }

    /// Number of data points.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Returns true if the dataset has no points.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// The part of a dataset that is currently visible.
#[derive(Debug, Clone)]
pub struct DataSubset {
    /// Visible coordinates.
    pub coords: Coordinates,
    /// Visible values.
    pub values: Arc<[f64]>,
    /// Visible ids.
    pub ids: Arc<[DataId]>,
}

impl DataSubset {
    pub(crate) fn empty(gridded: bool) -> Self {
        let empty: Arc<[f64]> = Arc::from(Vec::new());
        let coords = if gridded {
            Coordinates::gridded(empty.clone(), empty)
        } else {
            Coordinates::Scattered {
                x: empty.clone(),
                y: empty,
            }
        };

        Self {
            coords,
            values: Arc::from(Vec::new()),
            ids: Arc::from(Vec::new()),
        }
    }

    /// Number of visible data points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
