use std::{collections::BTreeMap, sync::Arc};

use shared::domain::{DatasetDescriptor, DatasetId, DatasetPhase, SourceRef};

use crate::{SubVisFactory, SubVisualization};

/// One loadable dataset bound to one sub-visualization instance. Owned
/// exclusively by the registry; the controller keeps only the current id.
#[derive(Clone)]
pub struct DatasetHandle {
    pub id: DatasetId,
    pub title: String,
    pub source: SourceRef,
    pub vis: Arc<dyn SubVisualization>,
}

impl DatasetHandle {
    pub fn from_descriptor(
        descriptor: &DatasetDescriptor,
        vis: Arc<dyn SubVisualization>,
    ) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.title.clone(),
            source: descriptor.source.clone(),
            vis,
        }
    }

    /// Mirrors the sub-visualization's own lifecycle phase.
    pub fn phase(&self) -> DatasetPhase {
        self.vis.current_phase()
    }
}

#[derive(Default)]
pub struct DatasetRegistry {
    handles: BTreeMap<DatasetId, DatasetHandle>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handle, assigning `count() + 1` when the candidate carries the
    /// unassigned sentinel. Returns false on an id collision; the existing
    /// entry is kept.
    pub fn register(&mut self, mut handle: DatasetHandle) -> bool {
        if handle.id.is_unassigned() {
            handle.id = DatasetId(self.count() as i64 + 1);
        }
        if self.handles.contains_key(&handle.id) {
            return false;
        }
        self.handles.insert(handle.id, handle);
        true
    }

    /// Destroys all handles and re-registers the configured list, ids 1..N
    /// in declaration order for sentinel descriptors.
    pub fn reset(&mut self, descriptors: &[DatasetDescriptor], factory: &dyn SubVisFactory) {
        self.handles.clear();
        for descriptor in descriptors {
            let vis = factory.create(descriptor);
            self.register(DatasetHandle::from_descriptor(descriptor, vis));
        }
    }

    pub fn count(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn get(&self, id: DatasetId) -> Option<&DatasetHandle> {
        self.handles.get(&id)
    }

    /// Ascending-id iteration, restartable and finite.
    pub fn iter(&self) -> impl Iterator<Item = &DatasetHandle> {
        self.handles.values()
    }

    pub fn ids(&self) -> Vec<DatasetId> {
        self.handles.keys().copied().collect()
    }
}
