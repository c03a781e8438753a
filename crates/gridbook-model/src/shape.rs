//! Floating objects drawn over the grid: raster images and simple vector forms.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::color::{Color, Paint};
use crate::input::InputDescriptor;
use crate::style::VerticalAlign;

/// Preset geometry of a vector form.
///
/// Only the first four kinds are rasterized with their own outline on export; everything else is
/// kept by name and drawn as a rectangle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Geometry {
    #[default]
    Rect,
    RoundRect,
    Ellipse,
    Triangle,
    Line,
    Other(String),
}

impl Geometry {
    pub fn as_str(&self) -> &str {
        match self {
            Geometry::Rect => "rect",
            Geometry::RoundRect => "roundRect",
            Geometry::Ellipse => "ellipse",
            Geometry::Triangle => "triangle",
            Geometry::Line => "line",
            Geometry::Other(name) => name,
        }
    }
}

impl From<String> for Geometry {
    fn from(value: String) -> Self {
        match value.as_str() {
            "rect" => Geometry::Rect,
            "roundRect" => Geometry::RoundRect,
            "ellipse" => Geometry::Ellipse,
            "triangle" => Geometry::Triangle,
            "line" => Geometry::Line,
            _ => Geometry::Other(value),
        }
    }
}

impl From<&str> for Geometry {
    fn from(value: &str) -> Self {
        Geometry::from(value.to_string())
    }
}

impl From<Geometry> for String {
    fn from(value: Geometry) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Text drawn inside a vector form. Paragraphs are separated by `\n`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRun {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Font size in points.
    pub size: f64,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub align: TextAlign,
    #[serde(default)]
    pub vertical: VerticalAlign,
}

impl Default for TextRun {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: None,
            size: 11.0,
            bold: false,
            align: TextAlign::Center,
            vertical: VerticalAlign::Center,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorForm {
    #[serde(rename = "shapeType", default)]
    pub geometry: Geometry,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Paint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Paint>,
    /// Stroke width in pixels.
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// Preset dash name (`dash`, `sysDot`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_dash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextRun>,
}

fn default_stroke_width() -> f64 {
    1.0
}

impl Default for VectorForm {
    fn default() -> Self {
        Self {
            geometry: Geometry::Rect,
            fill: None,
            stroke: None,
            stroke_width: default_stroke_width(),
            stroke_dash: None,
            text: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShapeKind {
    /// Encoded raster payload as a `data:image/<fmt>;base64,...` URL.
    Image { src: String },
    Form(VectorForm),
}

/// A positioned floating object. Coordinates are absolute sheet pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: String,
    #[serde(flatten)]
    pub kind: ShapeKind,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Clockwise rotation in degrees.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_h: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub flip_v: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "inputConfig")]
    pub input: Option<InputDescriptor>,
    #[serde(default, skip_serializing_if = "CellValue::is_empty")]
    pub value: CellValue,
}

fn default_opacity() -> f64 {
    1.0
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Shape {
    pub fn new(id: impl Into<String>, kind: ShapeKind, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            w,
            h,
            rotation: 0.0,
            flip_h: false,
            flip_v: false,
            opacity: default_opacity(),
            input: None,
            value: CellValue::Empty,
        }
    }

    pub fn image(id: impl Into<String>, src: impl Into<String>, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(id, ShapeKind::Image { src: src.into() }, x, y, w, h)
    }

    pub fn form(id: impl Into<String>, form: VectorForm, x: i32, y: i32, w: i32, h: i32) -> Self {
        Self::new(id, ShapeKind::Form(form), x, y, w, h)
    }

    pub fn is_image(&self) -> bool {
        matches!(self.kind, ShapeKind::Image { .. })
    }

    /// Prefix used when generating ids for this kind of shape.
    pub fn id_prefix(&self) -> &'static str {
        match self.kind {
            ShapeKind::Image { .. } => "img",
            ShapeKind::Form(_) => "shp",
        }
    }
}
