//! Rendering
//!
//! The render bridge owns the displayed vehicle shape and exposes a single
//! mutation, [`RenderBridge::set_pose`]. Drawing itself is delegated to a
//! [`Surface`] implementation.

pub mod surface;

pub use surface::{AsciiSurface, MemorySurface};

use serde::{Deserialize, Serialize};

use crate::config::DisplayConfig;
use crate::kinematics::Pose;

/// Errors reported by a rendering surface
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Shape {0} not found on surface")]
    ShapeNotFound(ShapeId),
}

/// Identifier of a shape created on a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShapeId(pub usize);

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 2D affine matrix.
///
/// Maps `(x, y)` to `(xx*x + xy*y + dx, yx*x + yy*y + dy)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub xx: f64,
    pub xy: f64,
    pub yx: f64,
    pub yy: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        xx: 1.0,
        xy: 0.0,
        yx: 0.0,
        yy: 1.0,
        dx: 0.0,
        dy: 0.0,
    };

    /// Rotation about the origin by `angle` radians
    pub fn rotate(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            xx: cos,
            xy: -sin,
            yx: sin,
            yy: cos,
            dx: 0.0,
            dy: 0.0,
        }
    }

    /// Translation by `(dx, dy)`
    pub fn translate(dx: f64, dy: f64) -> Self {
        Self {
            dx,
            dy,
            ..Self::IDENTITY
        }
    }

    /// Matrix product `self * other`: `other` is applied first
    pub fn multiply(&self, other: &Affine) -> Self {
        Self {
            xx: self.xx * other.xx + self.xy * other.yx,
            xy: self.xx * other.xy + self.xy * other.yy,
            yx: self.yx * other.xx + self.yy * other.yx,
            yy: self.yx * other.xy + self.yy * other.yy,
            dx: self.xx * other.dx + self.xy * other.dy + self.dx,
            dy: self.yx * other.dx + self.yy * other.dy + self.dy,
        }
    }

    /// Transform a point
    pub fn apply(&self, p: Point) -> Point {
        Point {
            x: self.xx * p.x + self.xy * p.y + self.dx,
            y: self.yx * p.x + self.yy * p.y + self.dy,
        }
    }

    /// Rotate about the local origin, then move to the pose's position
    pub fn for_pose(pose: &Pose) -> Self {
        Affine::translate(pose.x, pose.y).multiply(&Affine::rotate(pose.heading))
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Stroke and fill used for a shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    pub stroke_color: String,
    pub stroke_width: f64,
    pub fill_color: String,
}

/// A 2D drawing surface
pub trait Surface {
    /// Surface dimensions `(width, height)`
    fn size(&self) -> (f64, f64);

    /// Remove all drawn content
    fn clear(&mut self);

    /// Create a polyline shape with the identity transform
    fn create_polyline(&mut self, points: &[Point], style: &ShapeStyle) -> ShapeId;

    /// Replace a shape's transform (not composed with the previous one)
    fn set_transform(&mut self, shape: ShapeId, matrix: Affine) -> Result<(), RenderError>;
}

/// Owns the vehicle shape on a surface
pub struct RenderBridge {
    surface: Box<dyn Surface>,
    outline: Vec<Point>,
    style: ShapeStyle,
    shape: Option<ShapeId>,
    pose: Pose,
}

impl RenderBridge {
    pub fn new(surface: Box<dyn Surface>, outline: Vec<Point>, style: ShapeStyle) -> Self {
        Self {
            surface,
            outline,
            style,
            shape: None,
            pose: Pose::default(),
        }
    }

    /// Build a bridge using the configured outline and colors
    pub fn from_config(surface: Box<dyn Surface>, display: &DisplayConfig) -> Self {
        Self::new(surface, display.outline.clone(), display.shape_style())
    }

    /// Move the vehicle shape to `pose`
    pub fn set_pose(&mut self, pose: Pose) -> Result<(), RenderError> {
        self.pose = pose;
        let shape = match self.shape {
            Some(shape) => shape,
            None => self.draw_vehicle(),
        };
        self.surface.set_transform(shape, Affine::for_pose(&pose))
    }

    /// Clear the surface and redraw the vehicle at `pose`
    pub fn reset(&mut self, pose: Pose) -> Result<(), RenderError> {
        self.surface.clear();
        self.shape = None;
        self.set_pose(pose)
    }

    /// Pose currently displayed
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn shape(&self) -> Option<ShapeId> {
        self.shape
    }

    pub fn surface_size(&self) -> (f64, f64) {
        self.surface.size()
    }

    fn draw_vehicle(&mut self) -> ShapeId {
        let shape = self.surface.create_polyline(&self.outline, &self.style);
        self.shape = Some(shape);
        shape
    }
}

impl std::fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBridge")
            .field("shape", &self.shape)
            .field("pose", &self.pose)
            .finish()
    }
}
