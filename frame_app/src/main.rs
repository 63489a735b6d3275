//! Headless frame driver
//!
//! Builds a small scene (two meshes, a row of sprites, a nine-slice panel
//! and a line of text), then pushes a few frames through the forward pass
//! into a recording command buffer and logs what the render queue produced.
//!
//! Usage: `frame_app [config.toml|config.ron]`

use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use render_engine::foundation::logging;
use render_engine::prelude::*;
use render_engine::render::backends::RecordedCommand;
use render_engine::render::element::SubmeshGeometry;
use render_engine::render::material::{EngineShaderBinding, MaterialPass};
use render_engine::render::renderables::{Corner, Glyph};
use render_engine::render::resources::{
    BindingSlot, BindingType, BufferInfo, BufferType, IndexType, PipelineLayoutInfo, RenderPipeline,
    RenderPipelineInfo, TextureInfo,
};
use render_engine::render::FrameToken;

const FRAME_COUNT: usize = 6;
const FORWARD_PASS_INDEX: usize = 0;
const TARGET_SIZE: (f32, f32) = (800.0, 600.0);

/// Application errors
#[derive(Debug, thiserror::Error)]
enum AppError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The renderer failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// A renderable placed in the scene
struct Node {
    renderable: Box<dyn InstancedRenderable>,
    world: Arc<WorldInstance>,
    scissor_box: Option<Recti>,
}

/// Everything created during the setup frame
struct Scene {
    defaults: DefaultResources,
    viewer: ViewerInstance,
    nodes: Vec<Node>,
}

fn load_config() -> Result<RendererConfig, AppError> {
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading renderer configuration from {}", path);
            RendererConfig::load_from_file(&path)?
        }
        None => RendererConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn material(name: &str, pipeline: RenderPipeline) -> Material {
    Material::new(name)
        .with_engine_binding(EngineShaderBinding::InstanceDataUbo, 0)
        .with_engine_binding(EngineShaderBinding::ViewerDataUbo, 1)
        .with_engine_binding(EngineShaderBinding::OverlayTexture, 2)
        .with_texture_slot("BaseColorMap", 3)
        .with_pass(FORWARD_PASS_INDEX, MaterialPass::new(pipeline))
}

fn node(renderable: impl InstancedRenderable + 'static, world: WorldInstance) -> Node {
    Node {
        renderable: Box::new(renderable),
        world: Arc::new(world),
        scissor_box: None,
    }
}

fn build_scene(
    device: &mut HeadlessDevice,
    scheduler: &mut FrameScheduler,
    config: &RendererConfig,
) -> Result<Scene, AppError> {
    let mut frame = scheduler.begin_frame(device)?;
    let defaults = DefaultResources::create(&mut frame, config)?;

    let texture = |binding_index| BindingSlot {
        index: binding_index,
        binding_type: BindingType::Texture,
    };
    let uniform = |binding_index| BindingSlot {
        index: binding_index,
        binding_type: BindingType::UniformBuffer,
    };

    let device = frame.device();
    let layout = device.create_pipeline_layout(&PipelineLayoutInfo {
        sets: vec![vec![uniform(0), uniform(1), texture(2), texture(3)]],
    })?;
    let mesh_pipeline = device.create_render_pipeline(&RenderPipelineInfo {
        layout,
        vertex_declarations: Vec::new(),
    })?;
    let sprite_pipeline = device.create_render_pipeline(&RenderPipelineInfo {
        layout,
        vertex_declarations: vec![defaults.sprite_vertex_declaration],
    })?;

    let panel_texture = device.create_texture(&TextureInfo::new_2d(96, 96))?;
    let latin_atlas = device.create_texture(&TextureInfo::new_2d(512, 512))?;
    let symbol_atlas = device.create_texture(&TextureInfo::new_2d(256, 256))?;

    let cube_vertices = device.create_buffer(&BufferInfo::new(BufferType::Vertex, 24 * 32))?;
    let cube_indices = device.create_buffer(&BufferInfo::new(BufferType::Index, 36 * 2))?;

    let mesh_material = Arc::new(MaterialInstance::new(Arc::new(material("mesh", mesh_pipeline))));
    let sprite_material = Arc::new(MaterialInstance::new(Arc::new(material("sprite", sprite_pipeline))));
    let text_material = Arc::new(MaterialInstance::new(Arc::new(material("text", sprite_pipeline))));

    let mut panel_instance = MaterialInstance::new(Arc::new(material("panel", sprite_pipeline)));
    panel_instance.set_texture_property("BaseColorMap", panel_texture, None);
    let panel_material = Arc::new(panel_instance);

    let mut viewer = ViewerInstance::create(device, Vec2::new(TARGET_SIZE.0, TARGET_SIZE.1))?;
    viewer.set_projection_matrix(Mat4::new_orthographic(0.0, TARGET_SIZE.0, 0.0, TARGET_SIZE.1, -1.0, 1.0));

    let mut nodes = Vec::new();

    let mut cube = Model::new(BoundingBox::from_point(Vec3::new(-1.0, -1.0, -1.0)));
    cube.add_submesh(
        SubmeshGeometry::indexed(cube_vertices, cube_indices, IndexType::U16, 36),
        Arc::clone(&mesh_material),
    );
    for x in [200.0, 600.0] {
        let world = WorldInstance::create(device, Mat4::new_translation(&Vec3::new(x, 300.0, 0.0)))?;
        nodes.push(node(cube.clone(), world));
    }

    for column in 0..8u8 {
        let mut sprite = Sprite::new(Arc::clone(&sprite_material), defaults.sprite_vertex_declaration);
        sprite.set_size(Vec2::new(32.0, 32.0));
        sprite.set_color(Color::new(f32::from(column) / 8.0, 0.5, 1.0, 1.0));
        sprite.set_render_layer(1);
        let world = WorldInstance::create(
            device,
            Mat4::new_translation(&Vec3::new(40.0 + f32::from(column) * 48.0, 40.0, 0.0)),
        )?;
        nodes.push(node(sprite, world));
    }

    let mut panel = SlicedSprite::new(panel_material, defaults.sprite_vertex_declaration);
    let corner = Corner::new(Vec2::new(16.0, 16.0), Vec2::new(1.0 / 6.0, 1.0 / 6.0));
    panel.set_corners(corner, corner);
    panel.set_size(Vec2::new(320.0, 160.0));
    panel.set_texture_rect(Rectf::new(0.0, 0.0, 96.0, 96.0), &*device);
    panel.set_render_layer(2);
    let world = WorldInstance::create(device, Mat4::new_translation(&Vec3::new(240.0, 400.0, 0.0)))?;
    let mut panel_node = node(panel, world);
    panel_node.scissor_box = Some(Recti::new(240, 400, 320, 160));
    nodes.push(panel_node);

    let mut text = TextSprite::new(text_material, defaults.sprite_vertex_declaration);
    let glyphs: Vec<Glyph> = "render queue!"
        .chars()
        .enumerate()
        .filter(|(_, character)| !character.is_whitespace())
        .map(|(index, character)| Glyph {
            atlas: if character.is_ascii_alphabetic() { latin_atlas } else { symbol_atlas },
            bounds: Rectf::new(index as f32 * 10.0, 0.0, 10.0, 16.0),
            texture_coords: Rectf::new(0.0, 0.0, 1.0 / 32.0, 1.0 / 16.0),
            color: Color::BLACK,
        })
        .collect();
    text.update(&glyphs);
    text.set_render_layer(2);
    let world = WorldInstance::create(device, Mat4::new_translation(&Vec3::new(256.0, 460.0, 0.0)))?;
    nodes.push(node(text, world));

    viewer.upload(&mut frame);
    for node in &nodes {
        node.world.upload(&mut frame);
    }

    let mut commands = RecordingCommandBuffer::new();
    frame.flush_transfers(&mut commands);
    frame.submit();
    log::info!(
        "Scene ready: {} nodes, {} setup commands",
        nodes.len(),
        commands.commands().len()
    );

    Ok(Scene { defaults, viewer, nodes })
}

fn run() -> Result<(), AppError> {
    let config = load_config()?;
    let mut device = HeadlessDevice::new();
    let mut scheduler = FrameScheduler::new(&config);
    let scene = build_scene(&mut device, &mut scheduler, &config)?;

    let mut pass = ForwardPass::new(
        ElementRendererRegistry::with_default_renderers(scene.defaults, &config),
        &config,
    );
    let mut queue = RenderQueue::new();
    let mut elements = Vec::new();
    let mut in_flight: VecDeque<FrameToken> = VecDeque::new();
    let mut rng = rand::thread_rng();

    for frame_number in 0..FRAME_COUNT {
        // Stand-in for waiting on the oldest frame's fence
        if in_flight.len() >= config.frames_in_flight {
            if let Some(token) = in_flight.pop_front() {
                scheduler.complete(token, &mut device);
            }
        }

        let mut frame = scheduler.begin_frame(&mut device)?;

        elements.clear();
        for node in &scene.nodes {
            let element_data = ElementData {
                world_instance: &node.world,
                skeleton_instance: None,
                scissor_box: node.scissor_box,
            };
            node.renderable.build_elements(FORWARD_PASS_INDEX, &element_data, &mut elements);
        }

        // Renderables arrive in no particular order; sorting must recover the batches
        elements.shuffle(&mut rng);
        queue.clear();
        for element in elements.drain(..) {
            queue.insert(element, RenderStates::default());
        }

        let mut commands = RecordingCommandBuffer::new();
        pass.prepare(&scene.viewer, &mut queue, &mut frame)?;
        frame.flush_transfers(&mut commands);
        pass.render(&scene.viewer, &queue, &mut commands);
        pass.reset(&mut frame);
        in_flight.push_back(frame.submit());

        let stats = pass.stats();
        let draws = commands.count_matching(|c| matches!(c, RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }));
        let binds = commands.count_matching(|c| {
            matches!(
                c,
                RecordedCommand::BindPipeline(_)
                    | RecordedCommand::BindShaderBinding { .. }
                    | RecordedCommand::BindIndexBuffer { .. }
                    | RecordedCommand::BindVertexBuffer { .. }
                    | RecordedCommand::SetScissor(_)
            )
        });
        log::info!(
            "Frame {}: {} elements in {} batches, {} draws, {} binds, {} shader bindings ({} reused)",
            frame_number,
            stats.elements,
            stats.batches,
            draws,
            binds,
            stats.shader_bindings,
            stats.shader_bindings_reused
        );
    }

    scheduler.complete_all(&mut device);
    pass.release_resources(&mut device);

    let mut frame = scheduler.begin_frame(&mut device)?;
    scene.defaults.release(&mut frame);
    frame.submit();
    let released = scheduler.complete_all(&mut device);

    log::info!(
        "Shutdown: released {} default resources, {} buffers and {} shader bindings still alive",
        released,
        device.live_buffers(),
        device.live_shader_bindings()
    );

    Ok(())
}

fn main() {
    logging::init_with_level(logging::LevelFilter::Info);

    if let Err(error) = run() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}
