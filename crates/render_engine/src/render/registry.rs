//! Dense indices for resource identities
//!
//! The registry maps every pipeline, vertex buffer, vertex declaration and
//! render layer seen in a frame to a small zero-based index, in the order
//! they were first registered. Sorting keys are built from these indices
//! instead of from the handles themselves, so equal resources sort next to
//! each other regardless of how their handles compare.
//!
//! The four namespaces are independent: the same raw value registered as a
//! layer and as something else gets two unrelated indices.

use std::collections::HashMap;
use std::hash::Hash;

use crate::render::resources::{BufferHandle, PipelineHandle, VertexDeclarationHandle};

#[derive(Debug)]
struct IndexTable<K> {
    name: &'static str,
    indices: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash + std::fmt::Debug> IndexTable<K> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            indices: HashMap::new(),
        }
    }

    fn register(&mut self, key: K) -> usize {
        let next = self.indices.len();
        *self.indices.entry(key).or_insert(next)
    }

    fn fetch(&self, key: K) -> usize {
        match self.indices.get(&key) {
            Some(&index) => index,
            None => panic!("{} {:?} was not registered", self.name, key),
        }
    }

    fn len(&self) -> usize {
        self.indices.len()
    }

    fn clear(&mut self) {
        self.indices.clear();
    }
}

/// Per-frame identity to index tables
///
/// Registration and lookup are two separate phases: the forward pass
/// registers every queued element before it computes any sorting key.
#[derive(Debug)]
pub struct RenderQueueRegistry {
    layers: IndexTable<i32>,
    pipelines: IndexTable<PipelineHandle>,
    vertex_buffers: IndexTable<BufferHandle>,
    vertex_declarations: IndexTable<VertexDeclarationHandle>,
}

impl Default for RenderQueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueueRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            layers: IndexTable::new("render layer"),
            pipelines: IndexTable::new("pipeline"),
            vertex_buffers: IndexTable::new("vertex buffer"),
            vertex_declarations: IndexTable::new("vertex declaration"),
        }
    }

    /// Register a render layer; returns its index
    pub fn register_layer(&mut self, layer: i32) -> usize {
        self.layers.register(layer)
    }

    /// Register a pipeline; returns its index
    pub fn register_pipeline(&mut self, pipeline: PipelineHandle) -> usize {
        self.pipelines.register(pipeline)
    }

    /// Register a vertex buffer; returns its index
    pub fn register_vertex_buffer(&mut self, buffer: BufferHandle) -> usize {
        self.vertex_buffers.register(buffer)
    }

    /// Register a vertex declaration; returns its index
    pub fn register_vertex_declaration(&mut self, declaration: VertexDeclarationHandle) -> usize {
        self.vertex_declarations.register(declaration)
    }

    /// Index of a registered layer
    ///
    /// # Panics
    ///
    /// Panics if the layer was not registered since the last [`clear`](Self::clear).
    pub fn fetch_layer_index(&self, layer: i32) -> usize {
        self.layers.fetch(layer)
    }

    /// Index of a registered pipeline
    ///
    /// # Panics
    ///
    /// Panics if the pipeline was not registered since the last [`clear`](Self::clear).
    pub fn fetch_pipeline_index(&self, pipeline: PipelineHandle) -> usize {
        self.pipelines.fetch(pipeline)
    }

    /// Index of a registered vertex buffer
    ///
    /// # Panics
    ///
    /// Panics if the buffer was not registered since the last [`clear`](Self::clear).
    pub fn fetch_vertex_buffer_index(&self, buffer: BufferHandle) -> usize {
        self.vertex_buffers.fetch(buffer)
    }

    /// Index of a registered vertex declaration
    ///
    /// # Panics
    ///
    /// Panics if the declaration was not registered since the last [`clear`](Self::clear).
    pub fn fetch_vertex_declaration_index(&self, declaration: VertexDeclarationHandle) -> usize {
        self.vertex_declarations.fetch(declaration)
    }

    /// Number of distinct pipelines registered
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of distinct layers registered
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Forget every registration
    pub fn clear(&mut self) {
        self.layers.clear();
        self.pipelines.clear();
        self.vertex_buffers.clear();
        self.vertex_declarations.clear();
    }
}
