//! Mesh models

use std::sync::Arc;

use super::{ElementData, InstancedRenderable};
use crate::foundation::math::BoundingBox;
use crate::render::element::{RenderElement, RenderSubmesh, SubmeshGeometry};
use crate::render::material::MaterialInstance;

#[derive(Debug, Clone)]
struct ModelSubmesh {
    geometry: SubmeshGeometry,
    material: Arc<MaterialInstance>,
}

/// A mesh made of submeshes, each drawn with its own material
#[derive(Debug, Clone)]
pub struct Model {
    submeshes: Vec<ModelSubmesh>,
    bounding_box: BoundingBox,
    render_layer: i32,
}

impl Model {
    /// Create an empty model with the given bounds
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            submeshes: Vec::new(),
            bounding_box,
            render_layer: 0,
        }
    }

    /// Set the render layer
    pub fn with_render_layer(mut self, render_layer: i32) -> Self {
        self.render_layer = render_layer;
        self
    }

    /// Append a submesh; returns its index
    pub fn add_submesh(&mut self, geometry: SubmeshGeometry, material: Arc<MaterialInstance>) -> usize {
        self.submeshes.push(ModelSubmesh { geometry, material });
        self.submeshes.len() - 1
    }

    /// Replace the material of a submesh
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set_material(&mut self, index: usize, material: Arc<MaterialInstance>) {
        self.submeshes[index].material = material;
    }

    /// Number of submeshes
    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }
}

impl InstancedRenderable for Model {
    fn build_elements(&self, pass_index: usize, element_data: &ElementData<'_>, elements: &mut Vec<RenderElement>) {
        for submesh in &self.submeshes {
            let Some(pipeline) = submesh.material.pipeline(pass_index) else {
                continue;
            };

            elements.push(RenderElement::Submesh(RenderSubmesh {
                render_layer: self.render_layer,
                material_instance: Arc::clone(&submesh.material),
                pipeline,
                world_instance: Arc::clone(element_data.world_instance),
                skeleton_instance: element_data.skeleton_instance.cloned(),
                geometry: submesh.geometry,
                scissor_box: element_data.scissor_box,
            }));
        }
    }

    fn material_count(&self) -> usize {
        self.submeshes.len()
    }

    fn material(&self, index: usize) -> Option<&Arc<MaterialInstance>> {
        self.submeshes.get(index).map(|submesh| &submesh.material)
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    fn render_layer(&self) -> i32 {
        self.render_layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Recti};
    use crate::render::backends::HeadlessDevice;
    use crate::render::instances::WorldInstance;
    use crate::render::material::{Material, MaterialPass};
    use crate::render::resources::{
        BufferInfo, BufferType, PipelineLayoutInfo, RenderDevice, RenderPipelineInfo,
    };

    #[test]
    fn test_one_element_per_submesh_with_pipeline() {
        let mut device = HeadlessDevice::new();
        let layout = device.create_pipeline_layout(&PipelineLayoutInfo::default()).unwrap();
        let pipeline = device
            .create_render_pipeline(&RenderPipelineInfo {
                layout,
                vertex_declarations: Vec::new(),
            })
            .unwrap();
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Vertex, 64)).unwrap();

        let drawn = Arc::new(MaterialInstance::new(Arc::new(
            Material::new("drawn").with_pass(0, MaterialPass::new(pipeline)),
        )));
        let depth_only = Arc::new(MaterialInstance::new(Arc::new(
            Material::new("depth").with_pass(1, MaterialPass::new(pipeline)),
        )));

        let mut model = Model::new(BoundingBox::zero()).with_render_layer(2);
        model.add_submesh(SubmeshGeometry::non_indexed(buffer, 3), drawn);
        model.add_submesh(SubmeshGeometry::non_indexed(buffer, 6), depth_only);

        let world = Arc::new(WorldInstance::create(&mut device, Mat4::identity()).unwrap());
        let mut data = ElementData::new(&world);
        data.scissor_box = Some(Recti::new(0, 0, 32, 32));

        let mut elements = Vec::new();
        model.build_elements(0, &data, &mut elements);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].render_layer(), 2);
        assert_eq!(elements[0].scissor_box(), Some(Recti::new(0, 0, 32, 32)));

        elements.clear();
        model.build_elements(1, &data, &mut elements);
        assert_eq!(elements.len(), 1);
        assert_eq!(model.material_count(), 2);
    }
}
