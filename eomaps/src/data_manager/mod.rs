//! Datasets attached to map-views and the extent-dependent slicing of their points.

mod dataset;

use std::fmt::Debug;
use std::sync::Arc;

pub use dataset::{Coordinates, DataId, DataSubset, Dataset};
use eomaps_types::cartesian::Rect;
use log::{debug, info, warn};
use maybe_sync::{MaybeSend, MaybeSync};
use parking_lot::RwLock;

use crate::blit::{BlitManager, FetchHook};
use crate::color::Color;
use crate::error::EomapsError;
use crate::layer_name::ALL_LAYER;
use crate::render::ArtistRef;
use crate::view::AxesId;

/// Fraction of the data extent used as margin if the shape cannot estimate its radius.
const FALLBACK_MARGIN: f64 = 0.05;

/// Generator of the drawable collection representing a dataset.
///
/// Shapes turn the visible subset of a dataset into an artist (ellipses, rectangles, rasters
/// etc.). Geometry generation itself happens outside of this crate.
pub trait Shape: Debug + MaybeSend + MaybeSync {
    /// Name of the shape.
    fn name(&self) -> &str;

    /// Raster and mesh shapes are drawn with a single subdivision and tolerate much larger
    /// datasets.
    fn is_raster(&self) -> bool {
        false
    }

    /// Estimated `(rx, ry)` radius of a single shape in plot-projection units.
    fn radius(&self, dataset: &Dataset) -> Option<(f64, f64)>;

    /// Creates the collection for the given subset. `n` is the number of subdivisions used to
    /// approximate curved geometries.
    fn create_collection(&self, subset: &DataSubset, n: usize) -> Result<ArtistRef, EomapsError>;

    /// Colour used to draw the given value.
    fn value_color(&self, _value: f64) -> Option<Color> {
        None
    }
}

/// Data manager shared between a map-view and the blit manager's before-fetch hooks.
pub type SharedDataManager = Arc<RwLock<DataManager>>;

type CollectionHook = Box<dyn FnOnce(&ArtistRef)>;

/// Keeps the dataset of one map-view and the collection currently drawn for it.
pub struct DataManager {
    layer: String,
    axes: AxesId,
    dataset: Option<Dataset>,
    shape: Option<Arc<dyn Shape>>,
    bounds: Option<Rect>,
    margin: (f64, f64),
    last_extent: Option<Rect>,
    current: Option<DataSubset>,
    collection: Option<ArtistRef>,
    drawn_extent: Option<Rect>,
    dynamic: bool,
    pickable: bool,
    n: usize,
    on_next_collection: Vec<CollectionHook>,
}

impl Debug for DataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataManager")
            .field("layer", &self.layer)
            .field("axes", &self.axes)
            .field("points", &self.dataset.as_ref().map(Dataset::len))
            .field("shape", &self.shape.as_ref().map(|s| s.name().to_string()))
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

impl DataManager {
    /// Creates a data manager for the map-view on the given layer and axes.
    pub fn new(layer: impl Into<String>, axes: AxesId) -> Self {
        Self {
            layer: layer.into(),
            axes,
            dataset: None,
            shape: None,
            bounds: None,
            margin: (0.0, 0.0),
            last_extent: None,
            current: None,
            collection: None,
            drawn_extent: None,
            dynamic: false,
            pickable: false,
            n: 0,
            on_next_collection: vec![],
        }
    }

    /// Creates a shared data manager.
    pub fn new_shared(layer: impl Into<String>, axes: AxesId) -> SharedDataManager {
        Arc::new(RwLock::new(Self::new(layer, axes)))
    }

    /// Layer the dataset is drawn on.
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Axes the dataset is drawn in.
    pub fn axes(&self) -> AxesId {
        self.axes
    }

    /// The attached dataset.
    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    /// The shape used to draw the dataset.
    pub fn shape(&self) -> Option<&Arc<dyn Shape>> {
        self.shape.as_ref()
    }

    /// Bounds of the dataset in plot-projection units.
    pub fn bounds(&self) -> Option<Rect> {
        self.bounds
    }

    /// Margin added to extents before checking containment.
    pub fn margin(&self) -> (f64, f64) {
        self.margin
    }

    /// The collection currently representing the dataset.
    pub fn collection(&self) -> Option<&ArtistRef> {
        self.collection.as_ref()
    }

    /// Number of subdivisions used for the current collection.
    pub fn subdivisions(&self) -> usize {
        self.n
    }

    /// Whether the collection is registered as a dynamic artist instead of a background artist.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Sets whether the collection is registered as a dynamic artist.
    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// Attaches a dataset, replacing the previous one.
    ///
    /// The previous collection is removed from the blit manager and the dataset's layer is
    /// scheduled for a refetch so that the new collection is created on the next draw.
    pub fn set_dataset(&mut self, dataset: Dataset, shape: Arc<dyn Shape>, bm: &mut BlitManager) {
        self.cleanup(bm);

        self.bounds = dataset.coords.bounds();
        self.margin = match (shape.radius(&dataset), self.bounds) {
            (Some((rx, ry)), _) if rx.is_finite() && ry.is_finite() => (2.0 * rx, 2.0 * ry),
            (_, Some(bounds)) => (
                bounds.width() * FALLBACK_MARGIN,
                bounds.height() * FALLBACK_MARGIN,
            ),
            _ => (0.0, 0.0),
        };

        debug!(
            "Dataset with {} points attached to layer {:?}, margin {:?}",
            dataset.len(),
            self.layer,
            self.margin
        );

        self.dataset = Some(dataset);
        self.shape = Some(shape);
        bm.refetch_layer(&self.layer);
    }

    /// Returns the part of the dataset visible in the given extent.
    ///
    /// Returns `None` if no dataset is attached. If the extent contains the whole dataset, the
    /// subset shares the dataset's arrays. The result is reused until the extent changes.
    pub fn current_subset(&mut self, extent: Rect) -> Option<DataSubset> {
        let dataset = self.dataset.as_ref()?;

        if self.last_extent == Some(extent) {
            if let Some(current) = &self.current {
                return Some(current.clone());
            }
        }

        let gridded = matches!(dataset.coords, Coordinates::Gridded { .. });
        let (mx, my) = self.margin;

        let subset = match self.bounds {
            None => DataSubset::empty(gridded),
            Some(bounds) if !extent.intersects(&bounds.expand(mx, my)) => {
                DataSubset::empty(gridded)
            }
            Some(bounds) if extent.contains_rect(&bounds.expand(mx, my)) => DataSubset {
                coords: dataset.coords.clone(),
                values: dataset.values.clone(),
                ids: dataset.ids.clone(),
            },
            Some(_) => mask(dataset, extent.expand(mx, my)),
        };

        self.last_extent = Some(extent);
        self.current = Some(subset.clone());

        Some(subset)
    }

    /// Returns true if the collection has to be created again before fetching `layer`.
    pub fn redraw_required(&self, layer: &str, extent: Rect, layout_editing: bool) -> bool {
        if self.dataset.is_none() || layout_editing {
            return false;
        }

        if layer != ALL_LAYER && self.layer != ALL_LAYER && layer != self.layer {
            return false;
        }

        let Some(collection) = &self.collection else {
            return true;
        };

        if !collection.is_visible() {
            return false;
        }

        if !collection.has_axes() {
            return true;
        }

        self.drawn_extent != Some(extent)
    }

    /// Returns true if the collections of the dataset respond to pick events.
    pub fn is_pickable(&self) -> bool {
        self.pickable
    }

    /// Makes the current and all future collections of the dataset pickable.
    pub fn set_pickable(&mut self, pickable: bool) {
        self.pickable = pickable;
        if let Some(collection) = &self.collection {
            collection.set_pickable(pickable);
        }
    }

    /// Registers an action executed once with the next collection created for the dataset.
    pub fn on_next_collection(&mut self, hook: impl FnOnce(&ArtistRef) + 'static) {
        self.on_next_collection.push(Box::new(hook));
    }

    /// Re-creates the collection for the current extent if required.
    ///
    /// Executed by the blit manager before the background of `layer` is fetched.
    pub fn on_fetch_bg(&mut self, layer: &str, bm: &mut BlitManager) {
        let Some(extent) = bm.view(self.axes).map(|view| view.extent()) else {
            return;
        };

        if !self.redraw_required(layer, extent, bm.layout_editing()) {
            return;
        }

        let Some(subset) = self.current_subset(extent) else {
            return;
        };
        let Some(shape) = self.shape.clone() else {
            return;
        };

        self.n = estimate_subdivisions(subset.len(), shape.is_raster());
        warn_dataset_size(subset.len(), shape.as_ref());

        self.remove_collection(bm);

        let collection = match shape.create_collection(&subset, self.n) {
            Ok(collection) => collection,
            Err(err) => {
                warn!("Failed to create the {} collection: {err}", shape.name());
                return;
            }
        };

        if self.dynamic {
            bm.add_artist(collection.clone(), &self.layer);
        } else {
            bm.add_bg_artist(collection.clone(), &self.layer, false);
        }

        if self.pickable {
            collection.set_pickable(true);
        }
        self.collection = Some(collection.clone());
        self.drawn_extent = Some(extent);

        for hook in std::mem::take(&mut self.on_next_collection) {
            hook(&collection);
        }
    }

    /// Removes the collection from the blit manager and forgets the dataset.
    pub fn cleanup(&mut self, bm: &mut BlitManager) {
        self.remove_collection(bm);
        self.dataset = None;
        self.shape = None;
        self.bounds = None;
        self.last_extent = None;
        self.current = None;
        self.drawn_extent = None;
    }

    fn remove_collection(&mut self, bm: &mut BlitManager) {
        let Some(collection) = self.collection.take() else {
            return;
        };

        if self.dynamic {
            bm.remove_artist(&collection, Some(&self.layer));
        } else {
            bm.remove_bg_artist(&collection, Some(&self.layer), false);
        }
        collection.detach();
    }
}

impl FetchHook for SharedDataManager {
    fn before_fetch(&mut self, layer: &str, bm: &mut BlitManager) {
        self.write().on_fetch_bg(layer, bm);
    }
}

/// Number of subdivisions used to approximate curved shapes for a dataset of the given size.
pub fn estimate_subdivisions(points: usize, is_raster: bool) -> usize {
    if is_raster {
        return 1;
    }

    match points {
        0..=9 => 100,
        10..=99 => 75,
        100..=999 => 50,
        1_000..=9_999 => 20,
        _ => 12,
    }
}

fn warn_dataset_size(points: usize, shape: &dyn Shape) {
    if points < 100_000 {
        return;
    }

    if shape.is_raster() {
        if points >= 5_000_000 {
            warn!(
                "Plotting {points} points with the {} shape might take a while",
                shape.name()
            );
        }
    } else if points >= 500_000 {
        warn!(
            "Plotting {points} points with the {} shape is slow, consider using a raster shape",
            shape.name()
        );
    } else {
        info!(
            "Plotting {points} points with the {} shape, a raster shape would be faster",
            shape.name()
        );
    }
}

fn mask(dataset: &Dataset, extent: Rect) -> DataSubset {
    match &dataset.coords {
        Coordinates::Scattered { x, y } => {
            let selected: Vec<usize> = (0..x.len().min(y.len()))
                .filter(|&i| extent.contains(&(x[i], y[i])))
                .collect();

            DataSubset {
                coords: Coordinates::Scattered {
                    x: selected.iter().map(|&i| x[i]).collect(),
                    y: selected.iter().map(|&i| y[i]).collect(),
                },
                values: selected.iter().map(|&i| dataset.values[i]).collect(),
                ids: selected.iter().map(|&i| dataset.ids[i].clone()).collect(),
            }
        }
        Coordinates::Gridded { x, y } => {
            let ny = y.len();
            let ix: Vec<usize> = (0..x.len())
                .filter(|&i| extent.x_min <= x[i] && x[i] <= extent.x_max)
                .collect();
            let iy: Vec<usize> = (0..ny)
                .filter(|&j| extent.y_min <= y[j] && y[j] <= extent.y_max)
                .collect();

            let flat: Vec<usize> = ix
                .iter()
                .flat_map(|&i| iy.iter().map(move |&j| i * ny + j))
                .collect();

            DataSubset {
                coords: Coordinates::gridded(
                    ix.iter().map(|&i| x[i]).collect::<Vec<_>>(),
                    iy.iter().map(|&j| y[j]).collect::<Vec<_>>(),
                ),
                values: flat.iter().map(|&i| dataset.values[i]).collect(),
                ids: flat.iter().map(|&i| dataset.ids[i].clone()).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blit::BlitManager;
    use crate::render::Artist;
    use crate::tests::{TestArtist, TestShape};
    use crate::view::MapView;
    use eomaps_types::geo::Crs;

    fn dataset() -> Dataset {
        Dataset::with_ids(
            Coordinates::scattered(vec![0.0, 10.0, 0.0], vec![0.0, 0.0, 10.0])
                .expect("same length"),
            vec![1.0, 2.0, 3.0],
            vec![DataId::from("a"), DataId::from("b"), DataId::from("c")],
        )
        .expect("valid dataset")
    }

    fn manager(bm: &mut BlitManager) -> DataManager {
        let mut dm = DataManager::new("base", AxesId(0));
        dm.set_dataset(dataset(), Arc::new(TestShape::new(0.5)), bm);
        dm
    }

    fn blit_manager(extent: Rect) -> BlitManager {
        let mut bm = BlitManager::default();
        bm.set_view(AxesId(0), MapView::new(extent, Crs::WEB_MERCATOR));
        bm
    }

    #[test]
    fn margin_from_shape_radius() {
        let mut bm = BlitManager::default();
        let dm = manager(&mut bm);
        assert_eq!(dm.margin(), (1.0, 1.0));
        assert_eq!(dm.bounds(), Some(Rect::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn pass_through_shares_arrays() {
        let mut bm = BlitManager::default();
        let mut dm = manager(&mut bm);
        let subset = dm
            .current_subset(Rect::new(-100.0, -100.0, 100.0, 100.0))
            .expect("dataset is attached");

        let dataset = dm.dataset().expect("dataset is attached");
        assert!(Arc::ptr_eq(&subset.values, &dataset.values));
        assert!(Arc::ptr_eq(&subset.ids, &dataset.ids));
        assert!(subset.coords.same_arrays(&dataset.coords));
    }

    #[test]
    fn extent_outside_of_data() {
        let mut bm = BlitManager::default();
        let mut dm = manager(&mut bm);
        let subset = dm
            .current_subset(Rect::new(50.0, 50.0, 60.0, 60.0))
            .expect("dataset is attached");
        assert!(subset.is_empty());
    }

    #[test]
    fn masked_subset() {
        let mut bm = BlitManager::default();
        let mut dm = manager(&mut bm);
        let subset = dm
            .current_subset(Rect::new(-5.0, -5.0, 5.0, 5.0))
            .expect("dataset is attached");
        assert_eq!(&subset.values[..], &[1.0]);
        assert_eq!(&subset.ids[..], &[DataId::from("a")]);

        // within the margin
        let subset = dm
            .current_subset(Rect::new(-5.0, -5.0, 9.5, 5.0))
            .expect("dataset is attached");
        assert_eq!(&subset.values[..], &[1.0, 2.0]);
    }

    #[test]
    fn subset_is_reused_for_same_extent() {
        let mut bm = BlitManager::default();
        let mut dm = manager(&mut bm);
        let extent = Rect::new(-5.0, -5.0, 5.0, 5.0);
        let first = dm.current_subset(extent).expect("dataset is attached");
        let second = dm.current_subset(extent).expect("dataset is attached");
        assert!(Arc::ptr_eq(&first.values, &second.values));
    }

    #[test]
    fn gridded_subset() {
        let mut bm = BlitManager::default();
        let mut dm = DataManager::new("base", AxesId(0));
        let dataset = Dataset::new(
            Coordinates::gridded(vec![0.0, 1.0, 2.0], vec![0.0, 10.0]),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        )
        .expect("valid dataset");
        dm.set_dataset(dataset, Arc::new(TestShape::new(0.1)), &mut bm);

        let subset = dm
            .current_subset(Rect::new(0.5, 5.0, 3.0, 15.0))
            .expect("dataset is attached");
        assert_eq!(subset.coords.shape(), (2, 1));
        assert_eq!(&subset.values[..], &[3.0, 5.0]);
    }

    #[test]
    fn subdivision_thresholds() {
        assert_eq!(estimate_subdivisions(5, false), 100);
        assert_eq!(estimate_subdivisions(50, false), 75);
        assert_eq!(estimate_subdivisions(500, false), 50);
        assert_eq!(estimate_subdivisions(5_000, false), 20);
        assert_eq!(estimate_subdivisions(50_000, false), 12);
        assert_eq!(estimate_subdivisions(5, true), 1);
    }

    #[test]
    fn redraw_required() {
        let extent = Rect::new(-100.0, -100.0, 100.0, 100.0);
        let mut bm = blit_manager(extent);
        let mut dm = DataManager::new("base", AxesId(0));
        assert!(!dm.redraw_required("base", extent, false));

        dm.set_dataset(dataset(), Arc::new(TestShape::new(0.5)), &mut bm);
        assert!(dm.redraw_required("base", extent, false));
        assert!(dm.redraw_required("all", extent, false));
        assert!(!dm.redraw_required("other", extent, false));
        assert!(!dm.redraw_required("base", extent, true));

        dm.on_fetch_bg("base", &mut bm);
        assert!(!dm.redraw_required("base", extent, false));
        assert!(dm.redraw_required("base", Rect::new(0.0, 0.0, 1.0, 1.0), false));

        let collection = dm.collection().expect("collection is created").clone();
        collection.set_visible(false);
        assert!(!dm.redraw_required("base", Rect::new(0.0, 0.0, 1.0, 1.0), false));

        collection.set_visible(true);
        collection.detach();
        assert!(dm.redraw_required("base", extent, false));
    }

    #[test]
    fn fetch_hook_registers_collection() {
        let extent = Rect::new(-100.0, -100.0, 100.0, 100.0);
        let mut bm = blit_manager(extent);
        let mut dm = manager(&mut bm);

        dm.on_fetch_bg("base", &mut bm);
        assert_eq!(dm.subdivisions(), 100);
        assert_eq!(bm.get_bg_artists("base").len(), 1);

        // unchanged extent keeps the collection
        let first = dm.collection().expect("collection is created").clone();
        dm.on_fetch_bg("base", &mut bm);
        let second = dm.collection().expect("collection is created").clone();
        assert!(Arc::ptr_eq(&first, &second));

        bm.set_view(
            AxesId(0),
            MapView::new(Rect::new(-5.0, -5.0, 5.0, 5.0), Crs::WEB_MERCATOR),
        );
        dm.on_fetch_bg("base", &mut bm);
        assert_eq!(bm.get_bg_artists("base").len(), 1);
        assert!(!first.has_axes());

        let artist = first.as_any().downcast_ref::<TestArtist>();
        assert!(artist.is_some_and(|a| a.is_detached()));
    }

    #[test]
    fn dynamic_collection() {
        let extent = Rect::new(-100.0, -100.0, 100.0, 100.0);
        let mut bm = blit_manager(extent);
        let mut dm = manager(&mut bm);
        dm.set_dynamic(true);

        dm.on_fetch_bg("base", &mut bm);
        assert!(bm.get_bg_artists("base").is_empty());
        assert_eq!(bm.get_artists("base").len(), 1);

        let mut bm2 = blit_manager(extent);
        dm.cleanup(&mut bm2);
        assert!(dm.dataset().is_none());
    }

    #[test]
    fn collection_hooks_run_once() {
        let extent = Rect::new(-100.0, -100.0, 100.0, 100.0);
        let mut bm = blit_manager(extent);
        let mut dm = manager(&mut bm);

        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let hook_counter = counter.clone();
        dm.on_next_collection(move |_| {
            hook_counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        });

        dm.on_fetch_bg("base", &mut bm);
        bm.set_view(
            AxesId(0),
            MapView::new(Rect::new(-5.0, -5.0, 5.0, 5.0), Crs::WEB_MERCATOR),
        );
        dm.on_fetch_bg("base", &mut bm);
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
