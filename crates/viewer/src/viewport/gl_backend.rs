//! OpenGL backend for the interactive viewport
//!
//! The viewer runs on the UI thread without a current GL context, so uploads
//! and frames are queued in a shared [`GlScene`] and replayed by an egui paint
//! callback that owns the context. A CPU mirror keeps a copy of every resource
//! so captures can read pixels back without touching the GPU.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use glam::{Mat4, Vec3};
use glow::HasContext;
use image::RgbaImage;

use super::mesh::{hex_to_rgb, LineMeshData, MeshData, TriangleData, LINE_STRIDE, MESH_STRIDE};
use super::renderer::{DrawItem, Frame, GpuHandle, Material, Primitive, RenderBackend};
use super::software::{
    SoftwareBackend, DIR_INTENSITY, GROUND_COLOR, HEMI_INTENSITY, LIGHT_POSITION, SKY_COLOR,
};
use crate::error::ViewerError;

/// Clipping planes the mesh and line shaders evaluate
const MAX_CLIP_PLANES: usize = 6;

// ── Resource queue ───────────────────────────────────────────

enum Payload {
    Mesh(MeshData),
    Lines(LineMeshData),
    Triangles(TriangleData),
    Texture(RgbaImage),
}

enum Command {
    Upload(GpuHandle, Payload),
    Release(GpuHandle),
}

/// State shared between the viewer thread and the paint callback
#[derive(Default)]
struct GlScene {
    /// Applied in order on the next paint
    commands: Vec<Command>,
    /// Last submitted frame and the size in pixels its insets refer to
    frame: Option<(Frame, [u32; 2])>,
}

/// [`RenderBackend`] drawing through glow inside an egui paint callback
pub struct GlBackend {
    mirror: SoftwareBackend,
    scene: Arc<Mutex<GlScene>>,
    renderer: Arc<Mutex<GlRenderer>>,
}

impl GlBackend {
    /// Compile the shaders on `gl`. Must be called with the context current.
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self, ViewerError> {
        let renderer = GlRenderer::new(gl).map_err(ViewerError::Initialization)?;
        tracing::info!(width, height, "GL backend ready");
        Ok(Self {
            mirror: SoftwareBackend::new(width, height),
            scene: Arc::new(Mutex::new(GlScene::default())),
            renderer: Arc::new(Mutex::new(renderer)),
        })
    }

    fn queue(&self, command: Command) {
        match self.scene.lock() {
            Ok(mut scene) => scene.commands.push(command),
            Err(e) => tracing::error!("GL scene lock poisoned: {e}"),
        }
    }

    fn upload(&mut self, handle: GpuHandle, payload: Payload) -> GpuHandle {
        self.queue(Command::Upload(handle, payload));
        handle
    }

    /// Paint the last submitted frame into `rect`
    pub fn paint_callback(&self, rect: egui::Rect) -> egui::PaintCallback {
        let scene = self.scene.clone();
        let renderer = self.renderer.clone();
        egui::PaintCallback {
            rect,
            callback: Arc::new(eframe::egui_glow::CallbackFn::new(move |info, painter| {
                let gl = painter.gl();
                let clip = info.clip_rect_in_pixels();
                let viewport = [clip.left_px, clip.from_bottom_px, clip.width_px, clip.height_px];

                let (Ok(mut scene), Ok(mut r)) = (scene.lock(), renderer.lock()) else {
                    tracing::error!("GL state lock poisoned, frame skipped");
                    return;
                };
                for command in scene.commands.drain(..) {
                    r.apply(gl, command);
                }
                if let Some((frame, size)) = scene.frame.as_ref() {
                    r.paint(gl, frame, *size, viewport);
                }
            })),
        }
    }

    /// Free every GPU object. Call once with the context current, at exit.
    pub fn destroy(&self, gl: &glow::Context) {
        if let Ok(mut renderer) = self.renderer.lock() {
            renderer.destroy(gl);
        }
    }
}

impl RenderBackend for GlBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuHandle {
        let handle = self.mirror.upload_mesh(mesh);
        self.upload(handle, Payload::Mesh(mesh.clone()))
    }

    fn upload_lines(&mut self, lines: &LineMeshData) -> GpuHandle {
        let handle = self.mirror.upload_lines(lines);
        self.upload(handle, Payload::Lines(lines.clone()))
    }

    fn upload_triangles(&mut self, triangles: &TriangleData) -> GpuHandle {
        let handle = self.mirror.upload_triangles(triangles);
        self.upload(handle, Payload::Triangles(triangles.clone()))
    }

    fn upload_texture(&mut self, texture: &RgbaImage) -> GpuHandle {
        let handle = self.mirror.upload_texture(texture);
        self.upload(handle, Payload::Texture(texture.clone()))
    }

    fn release(&mut self, handle: GpuHandle) {
        self.mirror.release(handle);
        self.queue(Command::Release(handle));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.mirror.resize(width, height);
    }

    fn size(&self) -> [u32; 2] {
        self.mirror.size()
    }

    fn render(&mut self, frame: &Frame) {
        let size = self.mirror.size();
        match self.scene.lock() {
            Ok(mut scene) => scene.frame = Some((frame.clone(), size)),
            Err(e) => tracing::error!("GL scene lock poisoned: {e}"),
        }
    }

    /// Rasterize the last frame on the CPU mirror
    fn read_pixels(&mut self) -> RgbaImage {
        let frame = self
            .scene
            .lock()
            .ok()
            .and_then(|scene| scene.frame.as_ref().map(|(frame, _)| frame.clone()));
        if let Some(frame) = frame {
            self.mirror.render(&frame);
        }
        self.mirror.read_pixels()
    }

    fn live_resources(&self) -> usize {
        self.mirror.live_resources()
    }
}

// ── GPU handles ──────────────────────────────────────────────

struct GpuMesh {
    vao: glow::VertexArray,
    _vbo: glow::Buffer,
    ibo: glow::Buffer,
    index_count: i32,
}

struct GpuLines {
    vao: glow::VertexArray,
    _vbo: glow::Buffer,
    vertex_count: i32,
}

struct GpuTexture {
    texture: glow::Texture,
    width: u32,
    height: u32,
}

enum GpuResource {
    Mesh(GpuMesh),
    Lines(GpuLines),
    Texture(GpuTexture),
}

/// Four-vertex streaming buffer for sprites and textured quads
struct GpuQuad {
    vao: glow::VertexArray,
    vbo: glow::Buffer,
}

/// Per-pass camera uniforms
struct Pass {
    vp: Mat4,
    eye: Vec3,
    /// Pass extent in frame pixels
    size: [f32; 2],
}

// ── GL renderer ──────────────────────────────────────────────

struct GlRenderer {
    mesh_program: glow::Program,
    line_program: glow::Program,
    texture_program: glow::Program,
    quad: GpuQuad,
    resources: HashMap<GpuHandle, GpuResource>,
}

impl GlRenderer {
    fn new(gl: &glow::Context) -> Result<Self, String> {
        let mesh_program = compile_program(gl, MESH_VERT, MESH_FRAG)?;
        let line_program = compile_program(gl, LINE_VERT, LINE_FRAG)?;
        let texture_program = compile_program(gl, TEXTURE_VERT, TEXTURE_FRAG)?;
        let quad = create_quad(gl)?;
        Ok(Self {
            mesh_program,
            line_program,
            texture_program,
            quad,
            resources: HashMap::new(),
        })
    }

    fn apply(&mut self, gl: &glow::Context, command: Command) {
        match command {
            Command::Upload(handle, payload) => {
                let resource = match payload {
                    Payload::Mesh(mesh) => upload_mesh(gl, &mesh.vertices, &mesh.indices).map(GpuResource::Mesh),
                    Payload::Triangles(tris) => {
                        let (vertices, indices) = flat_shaded(&tris);
                        upload_mesh(gl, &vertices, &indices).map(GpuResource::Mesh)
                    }
                    Payload::Lines(lines) => upload_lines(gl, &lines).map(GpuResource::Lines),
                    Payload::Texture(image) => upload_texture(gl, &image).map(GpuResource::Texture),
                };
                match resource {
                    Ok(resource) => {
                        self.resources.insert(handle, resource);
                    }
                    Err(e) => tracing::error!(?handle, "GPU upload failed: {e}"),
                }
            }
            Command::Release(handle) => {
                if let Some(resource) = self.resources.remove(&handle) {
                    delete_resource(gl, resource);
                }
            }
        }
    }

    /// Render `frame`, laid out for `size` frame pixels, into `viewport`
    /// ([x, y, width, height] in physical pixels, origin bottom-left)
    fn paint(&self, gl: &glow::Context, frame: &Frame, size: [u32; 2], viewport: [i32; 4]) {
        let [x, y, w, h] = viewport;
        if w <= 0 || h <= 0 || size[0] == 0 || size[1] == 0 {
            return;
        }
        let background = frame.effective_background();

        unsafe {
            gl.viewport(x, y, w, h);
            gl.scissor(x, y, w, h);
            gl.enable(glow::SCISSOR_TEST);
            gl.clear_color(background[0], background[1], background[2], 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            gl.depth_func(glow::LEQUAL);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.front_face(glow::CCW);
            gl.cull_face(glow::BACK);
        }

        let [fw, fh] = size.map(|v| v as f32);
        let main = Pass {
            vp: frame.projection * frame.view,
            eye: frame.camera_position,
            size: [fw, fh],
        };
        self.draw_items(gl, &main, frame.sorted_items());

        // Inset rectangles are in frame pixels with a top-left origin
        let sx = w as f32 / fw;
        let sy = h as f32 / fh;
        for inset in &frame.insets {
            let [ix, iy, iw, ih] = inset.rect.map(|v| v as f32);
            let rect = [
                x + (ix * sx).round() as i32,
                y + ((fh - iy - ih) * sy).round() as i32,
                (iw * sx).round() as i32,
                (ih * sy).round() as i32,
            ];
            unsafe {
                gl.viewport(rect[0], rect[1], rect[2], rect[3]);
                gl.scissor(rect[0], rect[1], rect[2], rect[3]);
                gl.depth_mask(true);
                gl.clear(glow::DEPTH_BUFFER_BIT);
            }
            let pass = Pass {
                vp: inset.projection * inset.view,
                eye: inset.view.inverse().w_axis.truncate(),
                size: [iw, ih],
            };
            self.draw_items(gl, &pass, inset.sorted_items());
        }

        unsafe {
            gl.depth_mask(true);
            gl.polygon_mode(glow::FRONT_AND_BACK, glow::FILL);
            gl.disable(glow::CULL_FACE);
            gl.disable(glow::BLEND);
            gl.disable(glow::DEPTH_TEST);
            gl.disable(glow::SCISSOR_TEST);
            gl.use_program(None);
        }
    }

    fn draw_items(&self, gl: &glow::Context, pass: &Pass, items: Vec<&DrawItem>) {
        for item in items {
            let Some(resource) = self.resources.get(&item.handle) else {
                continue;
            };
            unsafe { apply_material_state(gl, &item.material) };
            match (&item.primitive, resource) {
                (Primitive::Triangles, GpuResource::Mesh(mesh)) => self.draw_mesh(gl, pass, item, mesh),
                (Primitive::Lines, GpuResource::Lines(lines)) => self.draw_lines(gl, pass, item, lines),
                (Primitive::Sprite { center, height_px }, GpuResource::Texture(tex)) => {
                    let image = [tex.width, tex.height];
                    if let Some(corners) = sprite_corners(pass, *center + item.offset, *height_px, image) {
                        self.draw_quad(gl, &Mat4::IDENTITY, item, corners, tex);
                    }
                }
                (Primitive::TexturedQuad { corners }, GpuResource::Texture(tex)) => {
                    let corners = corners.map(|c| c + item.offset);
                    self.draw_quad(gl, &pass.vp, item, corners, tex);
                }
                _ => tracing::warn!(handle = ?item.handle, "draw item does not match resource kind"),
            }
        }
    }

    fn draw_mesh(&self, gl: &glow::Context, pass: &Pass, item: &DrawItem, mesh: &GpuMesh) {
        let program = self.mesh_program;
        let m = &item.material;
        unsafe {
            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_vp", &pass.vp);
            set_uniform_vec3(gl, program, "u_offset", &item.offset);
            set_uniform_vec3(gl, program, "u_color", &Vec3::from(m.color));
            set_uniform_f32(gl, program, "u_alpha", material_alpha(m));
            set_uniform_i32(gl, program, "u_lit", m.lit as i32);
            set_uniform_vec3(gl, program, "u_eye", &pass.eye);
            set_uniform_vec3(gl, program, "u_light_dir", &LIGHT_POSITION.normalize());
            set_uniform_vec3(gl, program, "u_sky", &(Vec3::from(hex_to_rgb(SKY_COLOR)) * HEMI_INTENSITY));
            set_uniform_vec3(gl, program, "u_ground", &(Vec3::from(hex_to_rgb(GROUND_COLOR)) * HEMI_INTENSITY));
            set_uniform_f32(gl, program, "u_dir_intensity", DIR_INTENSITY);
            set_uniform_f32(gl, program, "u_metalness", m.metalness);
            set_uniform_f32(gl, program, "u_roughness", m.roughness);
            set_clip_planes(gl, program, m);

            gl.bind_vertex_array(Some(mesh.vao));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(mesh.ibo));
            gl.draw_elements(glow::TRIANGLES, mesh.index_count, glow::UNSIGNED_INT, 0);
            gl.bind_vertex_array(None);
        }
    }

    fn draw_lines(&self, gl: &glow::Context, pass: &Pass, item: &DrawItem, lines: &GpuLines) {
        let program = self.line_program;
        let m = &item.material;
        unsafe {
            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_vp", &pass.vp);
            set_uniform_vec3(gl, program, "u_offset", &item.offset);
            set_uniform_vec3(gl, program, "u_color", &Vec3::from(m.color));
            set_uniform_f32(gl, program, "u_alpha", material_alpha(m));
            set_uniform_i32(gl, program, "u_vertex_colors", m.vertex_colors as i32);
            set_clip_planes(gl, program, m);

            gl.bind_vertex_array(Some(lines.vao));
            gl.draw_arrays(glow::LINES, 0, lines.vertex_count);
            gl.bind_vertex_array(None);
        }
    }

    /// Draw `corners` (counter-clockwise from the image's bottom-left) with the texture
    fn draw_quad(&self, gl: &glow::Context, vp: &Mat4, item: &DrawItem, corners: [Vec3; 4], tex: &GpuTexture) {
        const UV: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
        let mut vertices = [0.0_f32; 20];
        for (i, (c, uv)) in corners.iter().zip(UV).enumerate() {
            vertices[i * 5..i * 5 + 5].copy_from_slice(&[c.x, c.y, c.z, uv[0], uv[1]]);
        }
        let program = self.texture_program;
        unsafe {
            gl.use_program(Some(program));
            set_uniform_mat4(gl, program, "u_vp", vp);
            set_uniform_vec3(gl, program, "u_tint", &Vec3::from(item.material.color));
            set_uniform_f32(gl, program, "u_opacity", item.material.opacity);
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(tex.texture));
            set_uniform_i32(gl, program, "u_texture", 0);

            gl.bind_vertex_array(Some(self.quad.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.quad.vbo));
            gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytemuck_cast_slice(&vertices));
            gl.draw_arrays(glow::TRIANGLE_FAN, 0, 4);
            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    fn destroy(&mut self, gl: &glow::Context) {
        for (_, resource) in self.resources.drain() {
            delete_resource(gl, resource);
        }
        unsafe {
            gl.delete_vertex_array(self.quad.vao);
            gl.delete_buffer(self.quad.vbo);
            gl.delete_program(self.mesh_program);
            gl.delete_program(self.line_program);
            gl.delete_program(self.texture_program);
        }
    }
}

unsafe fn apply_material_state(gl: &glow::Context, m: &Material) {
    if m.depth_test {
        gl.enable(glow::DEPTH_TEST);
    } else {
        gl.disable(glow::DEPTH_TEST);
    }
    gl.depth_mask(m.depth_write);
    if m.double_sided {
        gl.disable(glow::CULL_FACE);
    } else {
        gl.enable(glow::CULL_FACE);
    }
    let mode = if m.wireframe { glow::LINE } else { glow::FILL };
    gl.polygon_mode(glow::FRONT_AND_BACK, mode);
}

fn material_alpha(m: &Material) -> f32 {
    if m.is_transparent() {
        m.opacity
    } else {
        1.0
    }
}

/// Screen-aligned quad `height_px` tall around `center`, in NDC. `image` is
/// the texture size and sets the aspect ratio.
fn sprite_corners(pass: &Pass, center: Vec3, height_px: f32, image: [u32; 2]) -> Option<[Vec3; 4]> {
    let [tw, th] = image;
    if th == 0 || height_px <= 0.0 {
        return None;
    }
    let clip = pass.vp * center.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let [vw, vh] = pass.size;
    let half_h = height_px / vh.max(1.0);
    let half_w = height_px * tw as f32 / th as f32 / vw.max(1.0);
    Some([
        Vec3::new(ndc.x - half_w, ndc.y - half_h, ndc.z),
        Vec3::new(ndc.x + half_w, ndc.y - half_h, ndc.z),
        Vec3::new(ndc.x + half_w, ndc.y + half_h, ndc.z),
        Vec3::new(ndc.x - half_w, ndc.y + half_h, ndc.z),
    ])
}

/// Expand a triangle list into the indexed mesh layout with face normals
fn flat_shaded(tris: &TriangleData) -> (Vec<f32>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(tris.positions.len() * MESH_STRIDE);
    for tri in tris.positions.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(Vec3::from);
        let n = (b - a).cross(c - a).normalize_or_zero();
        for p in [a, b, c] {
            vertices.extend_from_slice(&[p.x, p.y, p.z, n.x, n.y, n.z]);
        }
    }
    let indices = (0..(vertices.len() / MESH_STRIDE) as u32).collect();
    (vertices, indices)
}

// ── GPU upload ───────────────────────────────────────────────

fn upload_mesh(gl: &glow::Context, vertices: &[f32], indices: &[u32]) -> Result<GpuMesh, String> {
    unsafe {
        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer()?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck_cast_slice(vertices), glow::STATIC_DRAW);

        let stride = (MESH_STRIDE * 4) as i32;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // normal: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 3 * 4);

        let ibo = gl.create_buffer()?;
        gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ibo));
        gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck_cast_slice(indices), glow::STATIC_DRAW);

        gl.bind_vertex_array(None);

        Ok(GpuMesh {
            vao,
            _vbo: vbo,
            ibo,
            index_count: indices.len() as i32,
        })
    }
}

fn upload_lines(gl: &glow::Context, data: &LineMeshData) -> Result<GpuLines, String> {
    unsafe {
        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer()?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck_cast_slice(&data.vertices), glow::STATIC_DRAW);

        let stride = (LINE_STRIDE * 4) as i32;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // color: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 4, glow::FLOAT, false, stride, 3 * 4);

        gl.bind_vertex_array(None);

        Ok(GpuLines {
            vao,
            _vbo: vbo,
            vertex_count: (data.vertices.len() / LINE_STRIDE) as i32,
        })
    }
}

fn upload_texture(gl: &glow::Context, image: &RgbaImage) -> Result<GpuTexture, String> {
    unsafe {
        let texture = gl.create_texture()?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
        // Row 0 is the top of the image, so v = 0 samples the top
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            image.width() as i32,
            image.height() as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(image.as_raw())),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok(GpuTexture {
            texture,
            width: image.width(),
            height: image.height(),
        })
    }
}

fn create_quad(gl: &glow::Context) -> Result<GpuQuad, String> {
    unsafe {
        let vao = gl.create_vertex_array()?;
        gl.bind_vertex_array(Some(vao));

        let vbo = gl.create_buffer()?;
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
        gl.buffer_data_size(glow::ARRAY_BUFFER, 20 * 4, glow::DYNAMIC_DRAW);

        let stride = 5 * 4;
        // position: location 0
        gl.enable_vertex_attrib_array(0);
        gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
        // uv: location 1
        gl.enable_vertex_attrib_array(1);
        gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, 3 * 4);

        gl.bind_vertex_array(None);
        Ok(GpuQuad { vao, vbo })
    }
}

fn delete_resource(gl: &glow::Context, resource: GpuResource) {
    unsafe {
        match resource {
            GpuResource::Mesh(mesh) => {
                gl.delete_vertex_array(mesh.vao);
                gl.delete_buffer(mesh._vbo);
                gl.delete_buffer(mesh.ibo);
            }
            GpuResource::Lines(lines) => {
                gl.delete_vertex_array(lines.vao);
                gl.delete_buffer(lines._vbo);
            }
            GpuResource::Texture(tex) => gl.delete_texture(tex.texture),
        }
    }
}

// ── Shader compilation ───────────────────────────────────────

fn compile_program(gl: &glow::Context, vert_src: &str, frag_src: &str) -> Result<glow::Program, String> {
    unsafe {
        let program = gl.create_program()?;
        let mut shaders = Vec::with_capacity(2);
        for (kind, src) in [(glow::VERTEX_SHADER, vert_src), (glow::FRAGMENT_SHADER, frag_src)] {
            let shader = gl.create_shader(kind)?;
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                let log = gl.get_shader_info_log(shader);
                tracing::error!("Shader compile error: {log}");
                return Err(log);
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }

        gl.link_program(program);
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            tracing::error!("Program link error: {log}");
            return Err(log);
        }
        Ok(program)
    }
}

// ── Uniform setters ──────────────────────────────────────────

fn set_uniform_mat4(gl: &glow::Context, program: glow::Program, name: &str, mat: &Mat4) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_matrix_4_f32_slice(loc.as_ref(), false, &mat.to_cols_array());
    }
}

fn set_uniform_vec3(gl: &glow::Context, program: glow::Program, name: &str, v: &Vec3) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_3_f32(loc.as_ref(), v.x, v.y, v.z);
    }
}

fn set_uniform_f32(gl: &glow::Context, program: glow::Program, name: &str, v: f32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_f32(loc.as_ref(), v);
    }
}

fn set_uniform_i32(gl: &glow::Context, program: glow::Program, name: &str, v: i32) {
    unsafe {
        let loc = gl.get_uniform_location(program, name);
        gl.uniform_1_i32(loc.as_ref(), v);
    }
}

fn set_clip_planes(gl: &glow::Context, program: glow::Program, m: &Material) {
    let planes: Vec<f32> = m
        .clipping_planes
        .iter()
        .take(MAX_CLIP_PLANES)
        .flat_map(|p| [p.normal.x, p.normal.y, p.normal.z, p.constant])
        .collect();
    set_uniform_i32(gl, program, "u_plane_count", (planes.len() / 4) as i32);
    if !planes.is_empty() {
        unsafe {
            let loc = gl.get_uniform_location(program, "u_planes");
            gl.uniform_4_f32_slice(loc.as_ref(), &planes);
        }
    }
}

// ── Byte cast helper ─────────────────────────────────────────

fn bytemuck_cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, std::mem::size_of_val(slice)) }
}

// ── Shaders ──────────────────────────────────────────────────

const MESH_VERT: &str = r#"#version 330 core
uniform mat4 u_vp;
uniform vec3 u_offset;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;

out vec3 v_world;
out vec3 v_normal;

void main() {
    v_world = a_position + u_offset;
    v_normal = a_normal;
    gl_Position = u_vp * vec4(v_world, 1.0);
}
"#;

const MESH_FRAG: &str = r#"#version 330 core
uniform vec3 u_color;
uniform float u_alpha;
uniform int u_lit;
uniform vec3 u_eye;
uniform vec3 u_light_dir;
uniform vec3 u_sky;
uniform vec3 u_ground;
uniform float u_dir_intensity;
uniform float u_metalness;
uniform float u_roughness;
uniform vec4 u_planes[6];
uniform int u_plane_count;

in vec3 v_world;
in vec3 v_normal;

out vec4 frag_color;

void main() {
    for (int i = 0; i < u_plane_count; i++) {
        if (dot(u_planes[i].xyz, v_world) + u_planes[i].w < 0.0) discard;
    }
    if (u_lit == 0) {
        frag_color = vec4(u_color, u_alpha);
        return;
    }
    vec3 n = normalize(v_normal);
    if (!gl_FrontFacing) n = -n;
    vec3 hemi = mix(u_ground, u_sky, n.y * 0.5 + 0.5);
    float ndl = max(dot(n, u_light_dir), 0.0);
    vec3 view = normalize(u_eye - v_world);
    vec3 halfway = normalize(u_light_dir + view);
    float shininess = (1.0 - u_roughness) * 64.0 + 1.0;
    float specular = (1.0 - u_roughness) * 0.5 * pow(max(dot(n, halfway), 0.0), shininess);
    vec3 diffuse = u_color * (hemi + vec3(ndl * u_dir_intensity)) * (1.0 - u_metalness * 0.5);
    frag_color = vec4(clamp(diffuse + vec3(specular), 0.0, 1.0), u_alpha);
}
"#;

const LINE_VERT: &str = r#"#version 330 core
uniform mat4 u_vp;
uniform vec3 u_offset;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec4 a_color;

out vec3 v_world;
out vec4 v_color;

void main() {
    v_world = a_position + u_offset;
    v_color = a_color;
    gl_Position = u_vp * vec4(v_world, 1.0);
}
"#;

const LINE_FRAG: &str = r#"#version 330 core
uniform vec3 u_color;
uniform float u_alpha;
uniform int u_vertex_colors;
uniform vec4 u_planes[6];
uniform int u_plane_count;

in vec3 v_world;
in vec4 v_color;

out vec4 frag_color;

void main() {
    for (int i = 0; i < u_plane_count; i++) {
        if (dot(u_planes[i].xyz, v_world) + u_planes[i].w < 0.0) discard;
    }
    vec3 rgb = u_vertex_colors != 0 ? v_color.rgb : u_color;
    frag_color = vec4(rgb, u_alpha);
}
"#;

const TEXTURE_VERT: &str = r#"#version 330 core
uniform mat4 u_vp;

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_uv;

out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = u_vp * vec4(a_position, 1.0);
}
"#;

const TEXTURE_FRAG: &str = r#"#version 330 core
uniform sampler2D u_texture;
uniform vec3 u_tint;
uniform float u_opacity;

in vec2 v_uv;

out vec4 frag_color;

void main() {
    vec4 texel = texture(u_texture, v_uv);
    float a = texel.a * u_opacity;
    if (a <= 0.0) discard;
    frag_color = vec4(texel.rgb * u_tint, a);
}
"#;
