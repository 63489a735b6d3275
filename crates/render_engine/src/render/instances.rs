//! Per-object and per-viewer GPU data
//!
//! World, skeleton and viewer instances each own one uniform buffer and know
//! how to stage their CPU-side data into it for a frame. Element renderers
//! only look at the buffer handle and size when filling shader bindings, and
//! at the instance id when deciding whether a binding can be reused.

use crate::foundation::collections::IdAllocator;
use crate::foundation::math::{Mat4, Vec2, Vec3};
use crate::render::frame::RenderFrame;
use crate::render::resources::{BufferInfo, BufferType, RenderBufferView, RenderDevice};
use crate::render::RenderResult;

static INSTANCE_IDS: IdAllocator = IdAllocator::new();

const MATRIX_SIZE: u64 = 64;

fn matrix_floats(matrices: &[&Mat4]) -> Vec<f32> {
    matrices.iter().flat_map(|matrix| matrix.as_slice().iter().copied()).collect()
}

/// Transform data of one drawn object
#[derive(Debug)]
pub struct WorldInstance {
    id: u64,
    instance_buffer: RenderBufferView,
    world_matrix: Mat4,
}

impl WorldInstance {
    /// World matrix followed by its inverse
    pub const BUFFER_SIZE: u64 = 2 * MATRIX_SIZE;

    /// Create the instance and its uniform buffer
    pub fn create(device: &mut dyn RenderDevice, world_matrix: Mat4) -> RenderResult<Self> {
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Uniform, Self::BUFFER_SIZE))?;

        Ok(Self {
            id: INSTANCE_IDS.allocate(),
            instance_buffer: RenderBufferView::whole(buffer, Self::BUFFER_SIZE),
            world_matrix,
        })
    }

    /// Stable identity of this instance
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Uniform buffer holding the instance data
    pub const fn instance_buffer(&self) -> RenderBufferView {
        self.instance_buffer
    }

    /// Current world matrix
    pub const fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }

    /// Replace the world matrix; takes effect on the next upload
    pub fn set_world_matrix(&mut self, world_matrix: Mat4) {
        self.world_matrix = world_matrix;
    }

    /// Stage the instance data for this frame
    pub fn upload(&self, frame: &mut RenderFrame<'_>) {
        let inverse = self.world_matrix.try_inverse().unwrap_or_else(Mat4::identity);
        let data = matrix_floats(&[&self.world_matrix, &inverse]);
        frame.upload(bytemuck::cast_slice(&data), self.instance_buffer);
    }
}

/// Joint matrices of one skinned object
#[derive(Debug)]
pub struct SkeletonInstance {
    id: u64,
    skeletal_buffer: RenderBufferView,
    joint_matrices: Vec<Mat4>,
}

impl SkeletonInstance {
    /// Create the instance with identity joints
    pub fn create(device: &mut dyn RenderDevice, joint_count: usize) -> RenderResult<Self> {
        let size = MATRIX_SIZE * joint_count.max(1) as u64;
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Uniform, size))?;

        Ok(Self {
            id: INSTANCE_IDS.allocate(),
            skeletal_buffer: RenderBufferView::whole(buffer, size),
            joint_matrices: vec![Mat4::identity(); joint_count.max(1)],
        })
    }

    /// Stable identity of this instance
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Uniform buffer holding the joint matrices
    pub const fn skeletal_buffer(&self) -> RenderBufferView {
        self.skeletal_buffer
    }

    /// Joint matrices
    pub fn joint_matrices(&self) -> &[Mat4] {
        &self.joint_matrices
    }

    /// Mutable joint matrices; changes take effect on the next upload
    pub fn joint_matrices_mut(&mut self) -> &mut [Mat4] {
        &mut self.joint_matrices
    }

    /// Stage the joint matrices for this frame
    pub fn upload(&self, frame: &mut RenderFrame<'_>) {
        let joints: Vec<&Mat4> = self.joint_matrices.iter().collect();
        let data = matrix_floats(&joints);
        frame.upload(bytemuck::cast_slice(&data), self.skeletal_buffer);
    }
}

/// Camera data of one viewer and the size of the target it renders to
#[derive(Debug)]
pub struct ViewerInstance {
    id: u64,
    viewer_buffer: RenderBufferView,
    target_size: Vec2,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    eye_position: Vec3,
}

impl ViewerInstance {
    /// Projection, view and view-projection matrices, target size, eye position
    pub const BUFFER_SIZE: u64 = 3 * MATRIX_SIZE + 16 + 16;

    /// Create the viewer and its uniform buffer
    pub fn create(device: &mut dyn RenderDevice, target_size: Vec2) -> RenderResult<Self> {
        let buffer = device.create_buffer(&BufferInfo::new(BufferType::Uniform, Self::BUFFER_SIZE))?;

        Ok(Self {
            id: INSTANCE_IDS.allocate(),
            viewer_buffer: RenderBufferView::whole(buffer, Self::BUFFER_SIZE),
            target_size,
            view_matrix: Mat4::identity(),
            projection_matrix: Mat4::identity(),
            eye_position: Vec3::zeros(),
        })
    }

    /// Stable identity of this viewer
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Uniform buffer holding the viewer data
    pub const fn viewer_buffer(&self) -> RenderBufferView {
        self.viewer_buffer
    }

    /// Size of the render target in pixels
    pub const fn target_size(&self) -> Vec2 {
        self.target_size
    }

    /// Resize the render target
    pub fn set_target_size(&mut self, target_size: Vec2) {
        self.target_size = target_size;
    }

    /// Set the view matrix and the eye position it was built from
    pub fn set_view(&mut self, view_matrix: Mat4, eye_position: Vec3) {
        self.view_matrix = view_matrix;
        self.eye_position = eye_position;
    }

    /// Set the projection matrix
    pub fn set_projection_matrix(&mut self, projection_matrix: Mat4) {
        self.projection_matrix = projection_matrix;
    }

    /// Stage the viewer data for this frame
    pub fn upload(&self, frame: &mut RenderFrame<'_>) {
        let view_projection = self.projection_matrix * self.view_matrix;
        let mut data = matrix_floats(&[&self.projection_matrix, &self.view_matrix, &view_projection]);
        data.extend_from_slice(&[self.target_size.x, self.target_size.y, 0.0, 0.0]);
        data.extend_from_slice(&[self.eye_position.x, self.eye_position.y, self.eye_position.z, 0.0]);
        frame.upload(bytemuck::cast_slice(&data), self.viewer_buffer);
    }
}
