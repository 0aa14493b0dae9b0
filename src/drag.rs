//! Drag gesture translation for the layout editor.
//!
//! The drag-capture layer (pointer tracking, keyboard reordering, a DnD
//! library) reports only two integers on drop: the source index and the
//! destination index. This module derives the intended full id order with
//! array-splice semantics and delegates to
//! [`LayoutStore::reorder`](crate::store::LayoutStore::reorder); it never
//! mutates layout state itself, keeping the consistency logic in one
//! place.

use crate::store::LayoutStore;
use crate::LayoutError;

/// Derives the id order after moving the item at `source` to
/// `destination`.
///
/// Splice semantics: the id at `source` is removed and re-inserted at
/// `destination`, shifting the items between them (not a swap). Returns
/// `None` when the move is a no-op (`source == destination`) or either
/// index is out of range.
pub fn spliced_order(ids: &[String], source: usize, destination: usize) -> Option<Vec<String>> {
    if source == destination || source >= ids.len() || destination >= ids.len() {
        return None;
    }
    let mut ordered: Vec<String> = ids.to_vec();
    let moved = ordered.remove(source);
    ordered.insert(destination, moved);
    Some(ordered)
}

/// Translates drop events into reorder intents for a [`LayoutStore`].
#[derive(Debug, Clone)]
pub struct DragController {
    store: LayoutStore,
}

impl DragController {
    /// Creates a controller over the given store.
    pub fn new(store: LayoutStore) -> Self {
        Self { store }
    }

    /// Handles the end of a drag gesture.
    ///
    /// No-op when `destination` is `None` (the drag was cancelled outside
    /// any drop target) or when the splice would not change the order.
    /// Otherwise forwards the derived full id order to the store.
    ///
    /// # Errors
    ///
    /// Propagates [`LayoutStore::reorder`] errors unchanged.
    pub async fn on_drag_end(
        &self,
        source: usize,
        destination: Option<usize>,
    ) -> Result<(), LayoutError> {
        let Some(destination) = destination else {
            tracing::trace!(source, "drag cancelled outside drop targets");
            return Ok(());
        };

        let ids = self.store.instance_ids().await;
        match spliced_order(&ids, source, destination) {
            Some(ordered) => self.store.reorder(&ordered).await,
            None => Ok(()),
        }
    }
}
