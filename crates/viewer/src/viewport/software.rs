//! Deterministic CPU rasterizer implementing [`RenderBackend`]
//!
//! Depth-buffered triangles with hemisphere + directional lighting, line
//! segments, textured quads and screen-space sprites. Clipping planes are
//! evaluated per fragment on the interpolated world position.

use std::collections::BTreeMap;

use glam::{Mat4, Vec2, Vec3, Vec4};
use image::{Rgba, RgbaImage};

use super::mesh::{hex_to_rgb, LineMeshData, MeshData, TriangleData};
use super::renderer::{DrawItem, Frame, GpuHandle, Material, Primitive, RenderBackend};

pub(crate) const HEMI_INTENSITY: f32 = 0.9;
pub(crate) const DIR_INTENSITY: f32 = 1.0;
pub(crate) const SKY_COLOR: u32 = 0xffffff;
pub(crate) const GROUND_COLOR: u32 = 0x222244;
pub(crate) const LIGHT_POSITION: Vec3 = Vec3::new(300.0, 400.0, 300.0);

/// Texture coordinates of a quad's corners, v = 0 at the top of the image
const QUAD_UV: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 0.0),
];

enum Resource {
    Mesh(MeshData),
    Lines(LineMeshData),
    Triangles(TriangleData),
    Texture(RgbaImage),
}

/// Color + depth buffers
struct Raster {
    width: u32,
    height: u32,
    color: Vec<Vec3>,
    depth: Vec<f32>,
    /// Active viewport [x, y, width, height] in pixels
    viewport: [f32; 4],
    /// Fragments outside [x0, y0, x1, y1) are dropped
    scissor: [i64; 4],
}

impl Raster {
    fn new(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        Self {
            width,
            height,
            color: vec![Vec3::ZERO; n],
            depth: vec![f32::INFINITY; n],
            viewport: [0.0, 0.0, width as f32, height as f32],
            scissor: [0, 0, width as i64, height as i64],
        }
    }

    fn clear(&mut self, rgb: [f32; 3]) {
        self.color.fill(Vec3::from(rgb));
        self.depth.fill(f32::INFINITY);
        self.reset_viewport();
    }

    fn reset_viewport(&mut self) {
        self.viewport = [0.0, 0.0, self.width as f32, self.height as f32];
        self.scissor = [0, 0, self.width as i64, self.height as i64];
    }

    /// Restrict drawing to `rect` and clear its depth
    fn set_viewport(&mut self, rect: [u32; 4]) {
        let (w, h) = (self.width as i64, self.height as i64);
        let x0 = (rect[0] as i64).min(w);
        let y0 = (rect[1] as i64).min(h);
        let x1 = (rect[0] as i64 + rect[2] as i64).min(w);
        let y1 = (rect[1] as i64 + rect[3] as i64).min(h);
        self.viewport = rect.map(|v| v as f32);
        self.scissor = [x0, y0, x1, y1];
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            self.depth[row + x0 as usize..row + x1 as usize].fill(f32::INFINITY);
        }
    }

    /// Depth test, blend and depth write for one fragment
    fn fragment(&mut self, x: i64, y: i64, z: f32, rgb: Vec3, alpha: f32, material: &Material) {
        let [x0, y0, x1, y1] = self.scissor;
        if x < x0 || y < y0 || x >= x1 || y >= y1 {
            return;
        }
        if !(0.0..=1.0).contains(&z) {
            return;
        }
        let idx = y as usize * self.width as usize + x as usize;
        // LessEqual: coplanar overlays drawn after the surface they cover pass
        if material.depth_test && z > self.depth[idx] {
            return;
        }
        let dst = self.color[idx];
        self.color[idx] = if alpha < 1.0 {
            rgb * alpha + dst * (1.0 - alpha)
        } else {
            rgb
        };
        if material.depth_write {
            self.depth[idx] = z;
        }
    }

    fn to_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for (px, c) in img.pixels_mut().zip(self.color.iter()) {
            let c = c.clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            *px = Rgba([c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]);
        }
        img
    }
}

#[derive(Clone, Copy, Debug)]
struct ClipVertex {
    clip: Vec4,
    world: Vec3,
    normal: Vec3,
    color: Vec4,
    uv: Vec2,
}

impl ClipVertex {
    fn new(vp: &Mat4, world: Vec3, normal: Vec3) -> Self {
        Self {
            clip: *vp * world.extend(1.0),
            world,
            normal,
            color: Vec4::ONE,
            uv: Vec2::ZERO,
        }
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            clip: self.clip.lerp(other.clip, t),
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
            color: self.color.lerp(other.color, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }
}

/// Vertex after the perspective divide, attributes pre-divided by w
#[derive(Clone, Copy, Debug)]
struct ScreenVertex {
    pos: Vec2,
    z: f32,
    inv_w: f32,
    world_w: Vec3,
    normal_w: Vec3,
    uv_w: Vec2,
    color: Vec4,
}

struct Shading {
    camera_position: Vec3,
    light_dir: Vec3,
    sky: Vec3,
    ground: Vec3,
}

impl Shading {
    fn new(camera_position: Vec3) -> Self {
        Self {
            camera_position,
            light_dir: LIGHT_POSITION.normalize(),
            sky: Vec3::from(hex_to_rgb(SKY_COLOR)),
            ground: Vec3::from(hex_to_rgb(GROUND_COLOR)),
        }
    }

    fn shade(&self, material: &Material, world: Vec3, normal: Vec3) -> Vec3 {
        let base = Vec3::from(material.color);
        if !material.lit {
            return base;
        }
        let n = normal.normalize_or_zero();
        let hemi = self.ground.lerp(self.sky, n.y * 0.5 + 0.5) * HEMI_INTENSITY;
        let ndl = n.dot(self.light_dir).max(0.0);
        let view = (self.camera_position - world).normalize_or_zero();
        let half = (self.light_dir + view).normalize_or_zero();
        let shininess = (1.0 - material.roughness) * 64.0 + 1.0;
        let specular = (1.0 - material.roughness) * 0.5 * n.dot(half).max(0.0).powf(shininess);
        let diffuse = base * (hemi + Vec3::splat(ndl * DIR_INTENSITY)) * (1.0 - material.metalness * 0.5);
        (diffuse + Vec3::splat(specular)).clamp(Vec3::ZERO, Vec3::ONE)
    }
}

fn material_alpha(material: &Material) -> f32 {
    if material.is_transparent() {
        material.opacity
    } else {
        1.0
    }
}

/// Headless rasterizer for tests, captures and thumbnails
pub struct SoftwareBackend {
    raster: Raster,
    resources: BTreeMap<u64, Resource>,
    next_id: u64,
    last_frame: RgbaImage,
}

impl SoftwareBackend {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1), height.max(1));
        Self {
            raster: Raster::new(w, h),
            resources: BTreeMap::new(),
            next_id: 1,
            last_frame: RgbaImage::new(w, h),
        }
    }

    fn insert(&mut self, resource: Resource) -> GpuHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.resources.insert(id, resource);
        GpuHandle(id)
    }
}

impl RenderBackend for SoftwareBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> GpuHandle {
        self.insert(Resource::Mesh(mesh.clone()))
    }

    fn upload_lines(&mut self, lines: &LineMeshData) -> GpuHandle {
        self.insert(Resource::Lines(lines.clone()))
    }

    fn upload_triangles(&mut self, triangles: &TriangleData) -> GpuHandle {
        self.insert(Resource::Triangles(triangles.clone()))
    }

    fn upload_texture(&mut self, texture: &RgbaImage) -> GpuHandle {
        self.insert(Resource::Texture(texture.clone()))
    }

    fn release(&mut self, handle: GpuHandle) {
        if self.resources.remove(&handle.0).is_none() {
            tracing::warn!(?handle, "release of unknown resource");
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1), height.max(1));
        if w == self.raster.width && h == self.raster.height {
            return;
        }
        self.raster = Raster::new(w, h);
        self.last_frame = RgbaImage::new(w, h);
    }

    fn size(&self) -> [u32; 2] {
        [self.raster.width, self.raster.height]
    }

    fn render(&mut self, frame: &Frame) {
        self.raster.clear(frame.effective_background());
        let vp = frame.projection * frame.view;
        let shading = Shading::new(frame.camera_position);
        draw_pass(&mut self.raster, &self.resources, &vp, &shading, frame.sorted_items());

        for inset in &frame.insets {
            self.raster.set_viewport(inset.rect);
            let vp = inset.projection * inset.view;
            let eye = inset.view.inverse().w_axis.truncate();
            draw_pass(&mut self.raster, &self.resources, &vp, &Shading::new(eye), inset.sorted_items());
        }
        self.raster.reset_viewport();

        self.last_frame = self.raster.to_image();
    }

    fn read_pixels(&mut self) -> RgbaImage {
        self.last_frame.clone()
    }

    fn live_resources(&self) -> usize {
        self.resources.len()
    }
}

fn draw_pass(
    raster: &mut Raster,
    resources: &BTreeMap<u64, Resource>,
    vp: &Mat4,
    shading: &Shading,
    items: Vec<&DrawItem>,
) {
    for item in items {
        let Some(resource) = resources.get(&item.handle.0) else {
            continue;
        };
        match (&item.primitive, resource) {
            (Primitive::Triangles, Resource::Mesh(mesh)) => {
                draw_mesh(raster, vp, shading, item, mesh);
            }
            (Primitive::Triangles, Resource::Triangles(tris)) => {
                draw_triangle_list(raster, vp, shading, item, tris);
            }
            (Primitive::Lines, Resource::Lines(lines)) => {
                draw_lines(raster, vp, item, lines);
            }
            (Primitive::Sprite { center, height_px }, Resource::Texture(tex)) => {
                draw_sprite(raster, vp, item, *center, *height_px, tex);
            }
            (Primitive::TexturedQuad { corners }, Resource::Texture(tex)) => {
                draw_textured_quad(raster, vp, item, corners, tex);
            }
            _ => tracing::warn!(handle = ?item.handle, "draw item does not match resource kind"),
        }
    }
}

// ── Triangles ────────────────────────────────────────────────

fn draw_mesh(raster: &mut Raster, vp: &Mat4, shading: &Shading, item: &DrawItem, mesh: &MeshData) {
    let alpha = material_alpha(&item.material);
    let shade = |world: Vec3, normal: Vec3, _: Vec2| {
        Some((shading.shade(&item.material, world, normal), alpha))
    };
    for tri in mesh.indices.chunks_exact(3) {
        let verts = [tri[0], tri[1], tri[2]].map(|i| {
            ClipVertex::new(vp, mesh.position(i as usize) + item.offset, mesh.normal(i as usize))
        });
        draw_triangle(raster, item, verts, &shade);
    }
}

fn draw_triangle_list(
    raster: &mut Raster,
    vp: &Mat4,
    shading: &Shading,
    item: &DrawItem,
    tris: &TriangleData,
) {
    let alpha = material_alpha(&item.material);
    let shade = |world: Vec3, normal: Vec3, _: Vec2| {
        Some((shading.shade(&item.material, world, normal), alpha))
    };
    for tri in tris.positions.chunks_exact(3) {
        let p = [Vec3::from(tri[0]), Vec3::from(tri[1]), Vec3::from(tri[2])].map(|v| v + item.offset);
        let normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
        let verts = p.map(|world| ClipVertex::new(vp, world, normal));
        draw_triangle(raster, item, verts, &shade);
    }
}

fn draw_textured_quad(raster: &mut Raster, vp: &Mat4, item: &DrawItem, corners: &[Vec3; 4], tex: &RgbaImage) {
    if tex.width() == 0 || tex.height() == 0 {
        return;
    }
    let p = corners.map(|c| c + item.offset);
    let normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
    let mut verts = p.map(|world| ClipVertex::new(vp, world, normal));
    for (v, uv) in verts.iter_mut().zip(QUAD_UV) {
        v.uv = uv;
    }

    let tint = Vec3::from(item.material.color);
    let opacity = item.material.opacity;
    let shade = |_: Vec3, _: Vec3, uv: Vec2| {
        let texel = sample(tex, uv);
        let a = texel.w * opacity;
        (a > 0.0).then(|| (texel.truncate() * tint, a))
    };
    draw_triangle(raster, item, [verts[0], verts[1], verts[2]], &shade);
    draw_triangle(raster, item, [verts[0], verts[2], verts[3]], &shade);
}

/// Nearest-texel lookup, `uv` in [0, 1] with v = 0 at the top row
fn sample(tex: &RgbaImage, uv: Vec2) -> Vec4 {
    let tx = ((uv.x * tex.width() as f32).max(0.0) as u32).min(tex.width() - 1);
    let ty = ((uv.y * tex.height() as f32).max(0.0) as u32).min(tex.height() - 1);
    let [r, g, b, a] = tex.get_pixel(tx, ty).0;
    Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
}

/// Sutherland-Hodgman against the near plane (z + w >= 0)
fn clip_near(poly: &[ClipVertex]) -> Vec<ClipVertex> {
    let mut out = Vec::with_capacity(poly.len() + 2);
    for i in 0..poly.len() {
        let a = &poly[i];
        let b = &poly[(i + 1) % poly.len()];
        let da = a.clip.z + a.clip.w;
        let db = b.clip.z + b.clip.w;
        if da >= 0.0 {
            out.push(*a);
        }
        if (da >= 0.0) != (db >= 0.0) {
            out.push(a.lerp(b, da / (da - db)));
        }
    }
    out
}

fn to_screen(v: &ClipVertex, viewport: [f32; 4]) -> ScreenVertex {
    let [vx, vy, vw, vh] = viewport;
    let inv_w = 1.0 / v.clip.w;
    let ndc = v.clip.truncate() * inv_w;
    ScreenVertex {
        pos: Vec2::new(vx + (ndc.x + 1.0) * 0.5 * vw, vy + (1.0 - ndc.y) * 0.5 * vh),
        z: ndc.z * 0.5 + 0.5,
        inv_w,
        world_w: v.world * inv_w,
        normal_w: v.normal * inv_w,
        uv_w: v.uv * inv_w,
        color: v.color,
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Fragment color and alpha from world position, normal and texture
/// coordinate; `None` discards the fragment
type FragmentShader<'a> = dyn Fn(Vec3, Vec3, Vec2) -> Option<(Vec3, f32)> + 'a;

fn draw_triangle(raster: &mut Raster, item: &DrawItem, verts: [ClipVertex; 3], shade: &FragmentShader<'_>) {
    let poly = clip_near(&verts);
    if poly.len() < 3 {
        return;
    }
    let screen: Vec<ScreenVertex> = poly.iter().map(|v| to_screen(v, raster.viewport)).collect();

    for i in 1..screen.len() - 1 {
        let s = [screen[0], screen[i], screen[i + 1]];
        if item.material.wireframe {
            for (a, b) in [(s[0], s[1]), (s[1], s[2]), (s[2], s[0])] {
                raster_segment(raster, &item.material, a, b, |world, normal, _| {
                    shade(world, normal, Vec2::ZERO).map_or(Vec3::ZERO, |(rgb, _)| rgb)
                });
            }
        } else {
            fill_triangle(raster, &item.material, s, shade);
        }
    }
}

fn fill_triangle(raster: &mut Raster, material: &Material, s: [ScreenVertex; 3], shade: &FragmentShader<'_>) {
    let area = edge(s[0].pos, s[1].pos, s[2].pos);
    if area.abs() < 1e-9 {
        return;
    }
    // NDC counter-clockwise becomes clockwise once screen y points down
    let front_facing = area < 0.0;
    if !front_facing && !material.double_sided {
        return;
    }

    let [sx0, sy0, sx1, sy1] = raster.scissor;
    let min = s[0].pos.min(s[1].pos).min(s[2].pos);
    let max = s[0].pos.max(s[1].pos).max(s[2].pos);
    let x0 = (min.x.floor() as i64).max(sx0);
    let y0 = (min.y.floor() as i64).max(sy0);
    let x1 = (max.x.ceil() as i64).min(sx1 - 1);
    let y1 = (max.y.ceil() as i64).min(sy1 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(s[1].pos, s[2].pos, p) / area;
            let w1 = edge(s[2].pos, s[0].pos, p) / area;
            let w2 = edge(s[0].pos, s[1].pos, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }
            let z = w0 * s[0].z + w1 * s[1].z + w2 * s[2].z;
            let inv_w = w0 * s[0].inv_w + w1 * s[1].inv_w + w2 * s[2].inv_w;
            let world = (s[0].world_w * w0 + s[1].world_w * w1 + s[2].world_w * w2) / inv_w;
            if !material.clipping_planes.iter().all(|plane| plane.keeps(world)) {
                continue;
            }
            let mut normal = (s[0].normal_w * w0 + s[1].normal_w * w1 + s[2].normal_w * w2) / inv_w;
            if !front_facing {
                normal = -normal;
            }
            let uv = (s[0].uv_w * w0 + s[1].uv_w * w1 + s[2].uv_w * w2) / inv_w;
            if let Some((rgb, alpha)) = shade(world, normal, uv) {
                raster.fragment(x, y, z, rgb, alpha, material);
            }
        }
    }
}

// ── Lines ────────────────────────────────────────────────────

/// Clip a segment to the view volume in homogeneous coordinates
fn clip_segment(a: &ClipVertex, b: &ClipVertex) -> Option<(ClipVertex, ClipVertex)> {
    let (ca, cb) = (a.clip, b.clip);
    let bounds = [
        (ca.w + ca.x, cb.w + cb.x),
        (ca.w - ca.x, cb.w - cb.x),
        (ca.w + ca.y, cb.w + cb.y),
        (ca.w - ca.y, cb.w - cb.y),
        (ca.w + ca.z, cb.w + cb.z),
        (ca.w - ca.z, cb.w - cb.z),
    ];
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for (da, db) in bounds {
        if da < 0.0 && db < 0.0 {
            return None;
        }
        if da < 0.0 {
            t0 = t0.max(da / (da - db));
        } else if db < 0.0 {
            t1 = t1.min(da / (da - db));
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((a.lerp(b, t0), a.lerp(b, t1)))
}

fn draw_lines(raster: &mut Raster, vp: &Mat4, item: &DrawItem, lines: &LineMeshData) {
    let material = &item.material;
    let alpha = material_alpha(material);
    for (start, end, color) in lines.segments() {
        let make = |p: Vec3| ClipVertex {
            color: Vec4::from(color),
            ..ClipVertex::new(vp, p + item.offset, Vec3::ZERO)
        };
        let Some((a, b)) = clip_segment(&make(start), &make(end)) else {
            continue;
        };
        let sa = to_screen(&a, raster.viewport);
        let sb = to_screen(&b, raster.viewport);
        raster_segment_alpha(raster, material, sa, sb, alpha, |_, _, c| {
            if material.vertex_colors {
                c.truncate()
            } else {
                Vec3::from(material.color)
            }
        });
    }
}

fn raster_segment(
    raster: &mut Raster,
    material: &Material,
    a: ScreenVertex,
    b: ScreenVertex,
    shade: impl Fn(Vec3, Vec3, Vec4) -> Vec3,
) {
    raster_segment_alpha(raster, material, a, b, material_alpha(material), shade);
}

/// DDA line walk with perspective-correct world position
fn raster_segment_alpha(
    raster: &mut Raster,
    material: &Material,
    a: ScreenVertex,
    b: ScreenVertex,
    alpha: f32,
    shade: impl Fn(Vec3, Vec3, Vec4) -> Vec3,
) {
    let delta = b.pos - a.pos;
    let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0);
    // Off-screen guard for segments that survived clipping with huge extents
    if steps > 16.0 * (raster.width + raster.height) as f32 {
        return;
    }
    let n = steps as i64;
    for i in 0..=n {
        let t = i as f32 / steps;
        let p = a.pos + delta * t;
        let z = a.z + (b.z - a.z) * t;
        let inv_w = a.inv_w + (b.inv_w - a.inv_w) * t;
        let world = a.world_w.lerp(b.world_w, t) / inv_w;
        if !material.clipping_planes.iter().all(|plane| plane.keeps(world)) {
            continue;
        }
        let normal = a.normal_w.lerp(b.normal_w, t) / inv_w;
        let color = a.color.lerp(b.color, t);
        let rgb = shade(world, normal, color);
        raster.fragment(p.x.floor() as i64, p.y.floor() as i64, z, rgb, alpha, material);
    }
}

// ── Sprites ──────────────────────────────────────────────────

fn draw_sprite(
    raster: &mut Raster,
    vp: &Mat4,
    item: &DrawItem,
    center: Vec3,
    height_px: f32,
    tex: &RgbaImage,
) {
    if tex.width() == 0 || tex.height() == 0 || height_px <= 0.0 {
        return;
    }
    let clip = *vp * (center + item.offset).extend(1.0);
    if clip.w <= 0.0 {
        return;
    }
    let [vx, vy, vw, vh] = raster.viewport;
    let ndc = clip.truncate() / clip.w;
    let cx = vx + (ndc.x + 1.0) * 0.5 * vw;
    let cy = vy + (1.0 - ndc.y) * 0.5 * vh;
    let z = ndc.z * 0.5 + 0.5;

    let h = height_px;
    let w = h * tex.width() as f32 / tex.height() as f32;
    let left = cx - w * 0.5;
    let top = cy - h * 0.5;

    let tint = Vec3::from(item.material.color);
    let [sx0, sy0, sx1, sy1] = raster.scissor;
    let x0 = (left.floor() as i64).max(sx0);
    let y0 = (top.floor() as i64).max(sy0);
    let x1 = ((left + w).ceil() as i64).min(sx1 - 1);
    let y1 = ((top + h).ceil() as i64).min(sy1 - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let u = (x as f32 + 0.5 - left) / w;
            let v = (y as f32 + 0.5 - top) / h;
            if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                continue;
            }
            let texel = sample(tex, Vec2::new(u, v));
            let a = texel.w * item.material.opacity;
            if a <= 0.0 {
                continue;
            }
            raster.fragment(x, y, z.clamp(0.0, 1.0), texel.truncate() * tint, a, &item.material);
        }
    }
}
