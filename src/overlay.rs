//! Overlay drawing.
//!
//! `DrawSurface` is the drawing collaborator the frame processor renders onto.
//! `SvgOverlay` is the bundled implementation; it builds an SVG document the
//! size of the video frame that a compositor can lay over the image.

use std::fmt::Write as _;

use crate::detect::{Pose, SKELETON_EDGES};

/// Default minimum keypoint score for drawing.
pub const DEFAULT_KEYPOINT_DRAW_THRESHOLD: f32 = 0.2;

const KEYPOINT_RADIUS: f32 = 5.0;
const EDGE_WIDTH: f32 = 2.0;
const TEXT_SIZE: f32 = 16.0;

/// Paint style for one primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Style {
    pub fill: Option<&'static str>,
    pub fill_opacity: f32,
    pub stroke: Option<&'static str>,
    pub stroke_width: f32,
    pub font_size: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            fill_opacity: 1.0,
            stroke: None,
            stroke_width: 1.0,
            font_size: TEXT_SIZE,
        }
    }
}

/// Drawing primitives. Coordinates are `(x, y)` image pixels.
pub trait DrawSurface {
    fn circle(&mut self, center: (f32, f32), radius: f32, style: &Style);
    fn line(&mut self, from: (f32, f32), to: (f32, f32), style: &Style);
    fn text(&mut self, origin: (f32, f32), text: &str, style: &Style);
}

/// White text with a one-pixel black drop shadow.
pub fn shadow_text(surface: &mut dyn DrawSurface, x: f32, y: f32, text: &str) {
    let shadow = Style {
        fill: Some("black"),
        ..Style::default()
    };
    let front = Style {
        fill: Some("white"),
        ..Style::default()
    };
    surface.text((x + 1.0, y + 1.0), text, &shadow);
    surface.text((x, y), text, &front);
}

/// Draw keypoints scoring at least `threshold`, then every skeleton edge whose
/// two ends were drawn.
pub fn draw_pose(surface: &mut dyn DrawSurface, pose: &Pose, threshold: f32) {
    let mut drawn = std::collections::BTreeMap::new();
    for (part, keypoint) in &pose.keypoints {
        if keypoint.score < threshold {
            continue;
        }
        // Keypoints are (row, col); surfaces take (x, y).
        let xy = (keypoint.col.trunc(), keypoint.row.trunc());
        drawn.insert(*part, xy);
        let style = Style {
            fill: Some("cyan"),
            fill_opacity: keypoint.score,
            stroke: Some("yellow"),
            ..Style::default()
        };
        surface.circle(xy, KEYPOINT_RADIUS, &style);
    }

    let edge_style = Style {
        stroke: Some("yellow"),
        stroke_width: EDGE_WIDTH,
        ..Style::default()
    };
    for (a, b) in SKELETON_EDGES.iter() {
        let (Some(from), Some(to)) = (drawn.get(a), drawn.get(b)) else {
            continue;
        };
        surface.line(*from, *to, &edge_style);
    }
}

// ----------------------------------------------------------------------------
// SVG surface
// ----------------------------------------------------------------------------

pub struct SvgOverlay {
    width: u32,
    height: u32,
    elements: String,
    count: usize,
}

impl SvgOverlay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            elements: String::new(),
            count: 0,
        }
    }

    /// Number of primitives drawn so far.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Drop all primitives, keeping the canvas size.
    pub fn clear(&mut self) {
        self.elements.clear();
        self.count = 0;
    }

    /// Render the complete SVG document.
    pub fn finish(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">{body}</svg>",
            w = self.width,
            h = self.height,
            body = self.elements
        )
    }

    fn push_paint(&mut self, style: &Style) {
        match style.fill {
            Some(fill) => {
                let _ = write!(self.elements, " fill=\"{}\"", fill);
                if style.fill_opacity < 1.0 {
                    let _ = write!(self.elements, " fill-opacity=\"{:.3}\"", style.fill_opacity);
                }
            }
            None => self.elements.push_str(" fill=\"none\""),
        }
        if let Some(stroke) = style.stroke {
            let _ = write!(
                self.elements,
                " stroke=\"{}\" stroke-width=\"{}\"",
                stroke, style.stroke_width
            );
        }
    }
}

impl DrawSurface for SvgOverlay {
    fn circle(&mut self, center: (f32, f32), radius: f32, style: &Style) {
        let _ = write!(
            self.elements,
            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\"",
            center.0, center.1, radius
        );
        self.push_paint(style);
        self.elements.push_str("/>");
        self.count += 1;
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), style: &Style) {
        let _ = write!(
            self.elements,
            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"",
            from.0, from.1, to.0, to.1
        );
        self.push_paint(style);
        self.elements.push_str("/>");
        self.count += 1;
    }

    fn text(&mut self, origin: (f32, f32), text: &str, style: &Style) {
        let _ = write!(
            self.elements,
            "<text x=\"{}\" y=\"{}\" font-size=\"{}\" style=\"font-family:sans-serif\"",
            origin.0, origin.1, style.font_size
        );
        self.push_paint(style);
        let _ = write!(self.elements, ">{}</text>", escape_xml(text));
        self.count += 1;
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
