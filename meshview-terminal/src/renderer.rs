/// ASCII rasterizer for terminal rendering
use crossterm::{
    cursor, queue,
    style::{self, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal,
};
use meshview_core::material::Side;
use meshview_core::session::{Frame, FrameContent, RenderSurface};
use meshview_core::{Camera, Color, Material, SurfaceError, Surface};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use std::io::Write;

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Terminal cells are roughly twice as tall as they are wide.
///
/// Sizes exchanged through [`RenderSurface`] are in half-cell units vertically
/// so the camera's aspect ratio matches what ends up on screen.
pub const CELL_ASPECT: u32 = 2;

const AMBIENT: f32 = 0.3;
const DIFFUSE: f32 = 0.7;
const SHININESS: i32 = 16;

const GRID_Y: f32 = -1.0;
const GRID_HALF_SIZE: i32 = 10;
const GRID_COLOR: Color = Color::new(0.376, 0.376, 0.376);
const GRID_SEGMENTS: i32 = 40;

/// Bias that lets wireframe edges win against the faces they outline.
const EDGE_DEPTH_BIAS: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    glyph: char,
    color: Color,
    depth: f32,
    shade: f32,
}

impl Cell {
    fn blank(background: Color) -> Self {
        Self {
            glyph: ' ',
            color: background,
            depth: f32::INFINITY,
            shade: 0.0,
        }
    }
}

/// Projected vertex: screen x, screen y, depth
type ScreenPoint = (f32, f32, f32);

/// ASCII renderer that converts frames to terminal characters
pub struct AsciiRenderer<W: Write> {
    writer: W,
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    background: Color,
    fixed_size: Option<(u16, u16)>,
    attached: bool,
    status: String,
}

impl<W: Write> AsciiRenderer<W> {
    /// Renderer sized to the terminal when attached.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            width: 0,
            height: 0,
            cells: Vec::new(),
            background: Color::new(0.0, 0.0, 0.0),
            fixed_size: None,
            attached: false,
            status: String::new(),
        }
    }

    /// Renderer with a fixed size in cells, independent of any terminal.
    pub fn with_size(writer: W, columns: u16, rows: u16) -> Self {
        Self {
            fixed_size: Some((columns, rows)),
            ..Self::new(writer)
        }
    }

    /// Text drawn over the first row of every frame.
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn set_cells(&mut self, columns: usize, rows: usize) {
        self.width = columns;
        self.height = rows;
        self.cells = vec![Cell::blank(self.background); columns * rows];
    }

    pub fn clear(&mut self, background: Color) {
        self.background = background;
        self.cells.fill(Cell::blank(background));
    }

    /// Glyph at a cell, for inspection.
    pub fn glyph_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.cells[y * self.width + x].glyph)
    }

    /// Number of cells that received model, marker or grid output
    pub fn covered_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.glyph != ' ').count()
    }

    fn draw_grid(&mut self, camera: &Camera) {
        let view_projection = camera.projection_matrix() * camera.view_matrix();
        let extent = GRID_HALF_SIZE as f32;
        for i in -GRID_HALF_SIZE..=GRID_HALF_SIZE {
            let offset = i as f32;
            let lines = [
                (Point3::new(offset, GRID_Y, -extent), Point3::new(offset, GRID_Y, extent)),
                (Point3::new(-extent, GRID_Y, offset), Point3::new(extent, GRID_Y, offset)),
            ];
            for (start, end) in lines {
                // Short segments so lines passing behind the camera still show their visible part.
                for s in 0..GRID_SEGMENTS {
                    let a = start + (end - start) * (s as f32 / GRID_SEGMENTS as f32);
                    let b = start + (end - start) * ((s + 1) as f32 / GRID_SEGMENTS as f32);
                    let projected = (
                        camera.project_with(&view_projection, &a, self.width as u32, self.height as u32),
                        camera.project_with(&view_projection, &b, self.width as u32, self.height as u32),
                    );
                    if let (Some(p0), Some(p1)) = projected {
                        self.draw_line(p0, p1, GRID_COLOR, Some('.'));
                    }
                }
            }
        }
    }

    fn draw_surface(&mut self, surface: &Surface, model: &Matrix4<f32>, material: &Material, camera: &Camera) {
        let mvp = camera.projection_matrix() * camera.view_matrix() * model;
        let normal_matrix: Matrix3<f32> = model.fixed_view::<3, 3>(0, 0).into_owned();
        let light = Vector3::new(0.0, 1.0, 1.0).normalize();

        'triangles: for triangle in surface.triangles() {
            let world = triangle.vertices.map(|v| model.transform_point(&v.position));
            let Some(face) = (world[1] - world[0]).cross(&(world[2] - world[0])).try_normalize(f32::EPSILON) else {
                continue;
            };
            let to_eye = (camera.position - world[0]).try_normalize(f32::EPSILON).unwrap_or(face);
            let facing = face.dot(&to_eye);
            if material.side == Side::Front && facing < 0.0 {
                continue;
            }

            let mut screen = [(0.0, 0.0, 0.0); 3];
            for (slot, vertex) in screen.iter_mut().zip(&triangle.vertices) {
                match camera.project_with(&mvp, &vertex.position, self.width as u32, self.height as u32) {
                    Some(point) => *slot = point,
                    None => continue 'triangles,
                }
            }

            if material.wireframe {
                for (a, b) in [(0, 1), (1, 2), (2, 0)] {
                    self.draw_line(screen[a], screen[b], material.color, None);
                }
                continue;
            }

            let vertex_normal: Vector3<f32> = triangle.vertices.iter().map(|v| v.normal).sum();
            let mut normal = (normal_matrix * vertex_normal)
                .try_normalize(f32::EPSILON)
                .unwrap_or(face);
            if facing < 0.0 {
                normal = -normal;
            }
            let intensity = shade(&normal, &light, &to_eye, material);
            self.fill_triangle(&screen, intensity, material);
        }
    }

    fn fill_triangle(&mut self, coords: &[ScreenPoint; 3], intensity: f32, material: &Material) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);
        if self.width == 0 || self.height == 0 {
            return;
        }

        // Bounding box clipped to the screen
        let min_x = (v0.0.min(v1.0).min(v2.0).floor() as i32).max(0);
        let max_x = (v0.0.max(v1.0).max(v2.0).ceil() as i32).min(self.width as i32 - 1);
        let min_y = (v0.1.min(v1.1).min(v2.1).floor() as i32).max(0);
        let max_y = (v0.1.max(v1.1).max(v2.1).ceil() as i32).min(self.height as i32 - 1);

        let lit = material.color.scaled(intensity);
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), p) else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let cell = &mut self.cells[y as usize * self.width + x as usize];
                if depth >= cell.depth {
                    continue;
                }
                if material.depth_write {
                    *cell = Cell {
                        glyph: ramp(intensity),
                        color: lit,
                        depth,
                        shade: intensity,
                    };
                } else {
                    let alpha = material.opacity;
                    cell.shade = cell.shade * (1.0 - alpha) + intensity * alpha;
                    cell.color = lit.over(cell.color, alpha);
                    cell.glyph = ramp(cell.shade);
                }
            }
        }
    }

    /// Draw a depth-tested line. Without a fixed glyph the slope picks one.
    fn draw_line(&mut self, a: ScreenPoint, b: ScreenPoint, color: Color, glyph: Option<char>) {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as i32;
        let glyph = glyph.unwrap_or_else(|| slope_glyph(dx, dy));

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            // Nearest cell center, the same sampling rule as fill_triangle
            let x = (a.0 + dx * t - 0.5).round();
            let y = (a.1 + dy * t - 0.5).round();
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }
            let depth = a.2 + (b.2 - a.2) * t;
            let cell = &mut self.cells[y as usize * self.width + x as usize];
            if depth - EDGE_DEPTH_BIAS < cell.depth {
                *cell = Cell {
                    glyph,
                    color,
                    depth,
                    shade: 1.0,
                };
            }
        }
    }

    fn draw_label(&mut self, label: &str, color: Color) {
        if self.height == 0 {
            return;
        }
        let row = self.height.saturating_sub(2);
        let text: Vec<char> = label.chars().take(self.width).collect();
        let start = (self.width - text.len()) / 2;
        for (i, glyph) in text.into_iter().enumerate() {
            self.cells[row * self.width + start + i] = Cell {
                glyph,
                color,
                depth: f32::NEG_INFINITY,
                shade: 1.0,
            };
        }
    }

    /// Write the cell buffer and status line to the terminal.
    pub fn present(&mut self) -> std::io::Result<()> {
        queue!(self.writer, cursor::MoveTo(0, 0), SetBackgroundColor(term_color(self.background)))?;
        for y in 0..self.height {
            queue!(self.writer, cursor::MoveTo(0, y as u16))?;
            let mut current = None;
            for cell in &self.cells[y * self.width..(y + 1) * self.width] {
                if current != Some(cell.color) {
                    queue!(self.writer, SetForegroundColor(term_color(cell.color)))?;
                    current = Some(cell.color);
                }
                queue!(self.writer, Print(cell.glyph))?;
            }
        }

        if !self.status.is_empty() {
            let status: String = self.status.chars().take(self.width).collect();
            queue!(
                self.writer,
                cursor::MoveTo(0, 0),
                SetForegroundColor(style::Color::Yellow),
                Print(status)
            )?;
        }
        queue!(self.writer, ResetColor)?;
        self.writer.flush()
    }
}

impl<W: Write> RenderSurface for AsciiRenderer<W> {
    fn attach(&mut self) -> Result<(u32, u32), SurfaceError> {
        let (columns, rows) = match self.fixed_size {
            Some(size) => size,
            None => terminal::size()?,
        };
        self.set_cells(columns as usize, rows as usize);
        self.attached = true;
        Ok((u32::from(columns), u32::from(rows) * CELL_ASPECT))
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.set_cells(width as usize, (height / CELL_ASPECT) as usize);
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SurfaceError> {
        if !self.attached {
            return Err(SurfaceError::Detached);
        }
        self.clear(frame.background);
        if frame.show_grid {
            self.draw_grid(frame.camera);
        }

        match &frame.content {
            FrameContent::Empty => {}
            FrameContent::Model(mesh) => {
                let model = mesh.transform().model_matrix();
                for surface in mesh.surfaces() {
                    self.draw_surface(&surface.geometry, &model, surface.material(), frame.camera);
                }
            }
            FrameContent::Marker(marker) => {
                self.draw_surface(marker.surface, &marker.model_matrix, &marker.material, frame.camera);
                self.draw_label(&marker.label, marker.material.color);
            }
        }

        self.present()?;
        Ok(())
    }

    fn detach(&mut self) {
        self.attached = false;
        self.cells.clear();
    }
}

/// Ambient plus diffuse from a fixed light, with a highlight scaled by the material.
fn shade(normal: &Vector3<f32>, light: &Vector3<f32>, to_eye: &Vector3<f32>, material: &Material) -> f32 {
    let diffuse = normal.dot(light).max(0.0);
    let half = (light + to_eye).try_normalize(f32::EPSILON).unwrap_or(*light);
    let highlight = normal.dot(&half).max(0.0).powi(SHININESS) * material.specular();
    (AMBIENT + DIFFUSE * diffuse + highlight).clamp(0.0, 1.0)
}

fn ramp(intensity: f32) -> char {
    let index = (intensity.clamp(0.0, 1.0) * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

fn slope_glyph(dx: f32, dy: f32) -> char {
    if dx.abs() > 2.0 * dy.abs() {
        '-'
    } else if dy.abs() > 2.0 * dx.abs() {
        '|'
    } else if (dx < 0.0) != (dy < 0.0) {
        // Screen y grows downward.
        '/'
    } else {
        '\\'
    }
}

fn term_color(color: Color) -> style::Color {
    let (r, g, b) = color.to_rgb8();
    style::Color::Rgb { r, g, b }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(v0: (f32, f32), v1: (f32, f32), v2: (f32, f32), p: (f32, f32)) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
