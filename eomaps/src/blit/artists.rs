use ahash::AHashMap;

use crate::render::{is_inset_artist, same_artist, ArtistRef};

/// Artists of one category (background or dynamic) grouped by layer.
///
/// Each layer keeps its artists in insertion order without duplicates.
#[derive(Debug, Default)]
pub struct ArtistRegistry {
    layers: AHashMap<String, Vec<ArtistRef>>,
}

impl ArtistRegistry {
    /// Adds the artist to the layer. Returns false if it is already there.
    pub fn add(&mut self, artist: ArtistRef, layer: &str) -> bool {
        let artists = self.layers.entry(layer.to_string()).or_default();
        if artists.iter().any(|a| same_artist(a, &artist)) {
            return false;
        }

        artists.push(artist);
        true
    }

    /// Removes the artist from the given layer, or from the first layer containing it if no
    /// layer is given. Returns the layer the artist was removed from.
    pub fn remove(&mut self, artist: &ArtistRef, layer: Option<&str>) -> Option<String> {
        let layer = match layer {
            Some(layer) => layer.to_string(),
            None => self.find_layer(artist)?,
        };

        let artists = self.layers.get_mut(&layer)?;
        let position = artists.iter().position(|a| same_artist(a, artist))?;
        artists.remove(position);
        if artists.is_empty() {
            self.layers.remove(&layer);
        }

        Some(layer)
    }

    /// Layer the artist belongs to.
    pub fn find_layer(&self, artist: &ArtistRef) -> Option<String> {
        self.layers
            .iter()
            .find(|(_, artists)| artists.iter().any(|a| same_artist(a, artist)))
            .map(|(layer, _)| layer.clone())
    }

    /// Artists of the layer in insertion order.
    pub fn get(&self, layer: &str) -> &[ArtistRef] {
        self.layers.get(layer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if the layer has at least one artist.
    pub fn contains_layer(&self, layer: &str) -> bool {
        self.layers.get(layer).is_some_and(|a| !a.is_empty())
    }

    /// Names of all layers with artists.
    pub fn layers(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.keys().map(String::as_str)
    }

    /// Artists of the layer sorted by z-order. Inset artists come after other artists with the
    /// same z-order; otherwise the insertion order is kept.
    pub fn sorted(&self, layer: &str) -> Vec<ArtistRef> {
        let mut artists = self.get(layer).to_vec();
        sort_by_stacking(&mut artists);
        artists
    }
}

/// Sorts artists by z-order, putting inset artists after other artists with the same z-order.
/// The sort is stable.
pub fn sort_by_stacking(artists: &mut [ArtistRef]) {
    artists.sort_by(|a, b| {
        a.zorder()
            .total_cmp(&b.zorder())
            .then(is_inset_artist(a.as_ref()).cmp(&is_inset_artist(b.as_ref())))
    });
}
