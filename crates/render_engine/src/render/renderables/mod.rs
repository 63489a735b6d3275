//! # Renderables
//!
//! Scene-side objects that know how to turn themselves into
//! [`RenderElement`]s for a given render pass. A renderable is shared by
//! every scene node that draws it; the per-node parts (transform, skeleton,
//! clipping) are passed in as [`ElementData`].

mod model;
mod sliced_sprite;
mod sprite;
mod text_sprite;

pub use model::Model;
pub use sliced_sprite::{Corner, SlicedSprite};
pub use sprite::Sprite;
pub use text_sprite::{Glyph, TextSprite};

use std::sync::Arc;

use crate::foundation::math::{BoundingBox, Recti};
use crate::render::element::RenderElement;
use crate::render::instances::{SkeletonInstance, WorldInstance};
use crate::render::material::MaterialInstance;

/// Per-node data a renderable is drawn with
#[derive(Debug, Clone, Copy)]
pub struct ElementData<'a> {
    /// Transform of the node
    pub world_instance: &'a Arc<WorldInstance>,
    /// Skeleton of the node, when skinned
    pub skeleton_instance: Option<&'a Arc<SkeletonInstance>>,
    /// Clipping rectangle of the node
    pub scissor_box: Option<Recti>,
}

impl<'a> ElementData<'a> {
    /// Data of an unskinned, unclipped node
    pub const fn new(world_instance: &'a Arc<WorldInstance>) -> Self {
        Self {
            world_instance,
            skeleton_instance: None,
            scissor_box: None,
        }
    }
}

/// Something that produces render elements
pub trait InstancedRenderable {
    /// Append the elements drawn in render pass `pass_index`
    ///
    /// Materials without a pipeline for that pass contribute nothing.
    fn build_elements(&self, pass_index: usize, element_data: &ElementData<'_>, elements: &mut Vec<RenderElement>);

    /// Number of materials used
    fn material_count(&self) -> usize;

    /// Material at `index`
    fn material(&self, index: usize) -> Option<&Arc<MaterialInstance>>;

    /// Object-space bounds
    fn bounding_box(&self) -> BoundingBox;

    /// Coarse sort order
    fn render_layer(&self) -> i32;
}
