//! Concrete rendering surfaces
//!
//! Both surfaces are cheap handles over shared state, so a caller can keep a
//! clone for inspection after handing one to a [`RenderBridge`](super::RenderBridge).

use std::cell::RefCell;
use std::rc::Rc;

use super::{Affine, Point, RenderError, ShapeId, ShapeStyle, Surface};

/// A shape as recorded by a surface
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedShape {
    pub id: ShapeId,
    pub points: Vec<Point>,
    pub style: ShapeStyle,
    pub transform: Affine,
}

impl RecordedShape {
    /// Points after applying the current transform
    pub fn world_points(&self) -> Vec<Point> {
        self.points.iter().map(|p| self.transform.apply(*p)).collect()
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    width: f64,
    height: f64,
    shapes: Vec<RecordedShape>,
    next_id: usize,
    clears: usize,
    transform_updates: usize,
}

impl SurfaceState {
    fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    fn create_polyline(&mut self, points: &[Point], style: &ShapeStyle) -> ShapeId {
        let id = ShapeId(self.next_id);
        self.next_id += 1;
        self.shapes.push(RecordedShape {
            id,
            points: points.to_vec(),
            style: style.clone(),
            transform: Affine::IDENTITY,
        });
        id
    }

    fn set_transform(&mut self, shape: ShapeId, matrix: Affine) -> Result<(), RenderError> {
        let recorded = self
            .shapes
            .iter_mut()
            .find(|s| s.id == shape)
            .ok_or(RenderError::ShapeNotFound(shape))?;
        recorded.transform = matrix;
        self.transform_updates += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.shapes.clear();
        self.clears += 1;
    }
}

/// Headless surface that records shapes and their transforms
#[derive(Debug, Clone)]
pub struct MemorySurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl MemorySurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(SurfaceState::new(width, height))),
        }
    }

    /// Snapshot of all shapes currently on the surface
    pub fn shapes(&self) -> Vec<RecordedShape> {
        self.state.borrow().shapes.clone()
    }

    /// Current transform of a shape
    pub fn transform_of(&self, shape: ShapeId) -> Option<Affine> {
        self.state
            .borrow()
            .shapes
            .iter()
            .find(|s| s.id == shape)
            .map(|s| s.transform)
    }

    /// How many times the surface was cleared
    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    /// How many transform replacements were applied
    pub fn transform_updates(&self) -> usize {
        self.state.borrow().transform_updates
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> (f64, f64) {
        let state = self.state.borrow();
        (state.width, state.height)
    }

    fn clear(&mut self) {
        self.state.borrow_mut().clear();
    }

    fn create_polyline(&mut self, points: &[Point], style: &ShapeStyle) -> ShapeId {
        self.state.borrow_mut().create_polyline(points, style)
    }

    fn set_transform(&mut self, shape: ShapeId, matrix: Affine) -> Result<(), RenderError> {
        self.state.borrow_mut().set_transform(shape, matrix)
    }
}

/// Surface that can rasterize its shapes into a character grid
#[derive(Debug, Clone)]
pub struct AsciiSurface {
    inner: MemorySurface,
    columns: usize,
    rows: usize,
}

impl AsciiSurface {
    /// `columns` x `rows` character cells covering the whole surface
    pub fn new(width: f64, height: f64, columns: usize, rows: usize) -> Self {
        Self {
            inner: MemorySurface::new(width, height),
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    /// Render all shapes; the surface's y axis points down the screen
    pub fn render(&self) -> String {
        let mut grid = vec![vec![' '; self.columns]; self.rows];
        let (width, height) = self.inner.size();
        let sx = self.columns as f64 / width;
        let sy = self.rows as f64 / height;

        for shape in self.inner.shapes() {
            let cells: Vec<Point> = shape
                .world_points()
                .into_iter()
                .map(|p| Point::new(p.x * sx, p.y * sy))
                .collect();
            for segment in cells.windows(2) {
                self.plot_segment(&mut grid, segment[0], segment[1]);
            }
        }

        let border = format!("+{}+", "-".repeat(self.columns));
        let mut out = String::with_capacity((self.columns + 3) * (self.rows + 2));
        out.push_str(&border);
        out.push('\n');
        for row in grid {
            out.push('|');
            out.extend(row);
            out.push_str("|\n");
        }
        out.push_str(&border);
        out
    }

    fn plot_segment(&self, grid: &mut [Vec<char>], from: Point, to: Point) {
        let steps = (to.x - from.x).abs().max((to.y - from.y).abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            if x < 0.0 || y < 0.0 {
                continue;
            }
            let (col, row) = (x.floor() as usize, y.floor() as usize);
            if row < self.rows && col < self.columns {
                grid[row][col] = '#';
            }
        }
    }

    /// Underlying recording surface
    pub fn recorder(&self) -> &MemorySurface {
        &self.inner
    }
}

impl Surface for AsciiSurface {
    fn size(&self) -> (f64, f64) {
        self.inner.size()
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn create_polyline(&mut self, points: &[Point], style: &ShapeStyle) -> ShapeId {
        self.inner.create_polyline(points, style)
    }

    fn set_transform(&mut self, shape: ShapeId, matrix: Affine) -> Result<(), RenderError> {
        self.inner.set_transform(shape, matrix)
    }
}
