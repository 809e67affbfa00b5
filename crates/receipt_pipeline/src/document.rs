//! Receipt outline detection and perspective correction
//!
//! A receipt photographed on a table is usually a skewed quadrilateral. We
//! find the largest four-cornered contour in an edge map of a downscaled copy,
//! then warp the original image so that the receipt fills an upright
//! rectangle.

use crate::error::{PipelineError, Result};
use crate::preprocess::{ensure_not_empty, threshold_local};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Height the image is scaled to before edge detection
pub const DETECTION_HEIGHT: u32 = 500;

/// Widest working copy allowed, as a multiple of the detection height
const MAX_DETECTION_ASPECT: u32 = 4;

/// Sigma OpenCV derives for a 5x5 Gaussian kernel
const EDGE_BLUR_SIGMA: f32 = 1.1;
const CANNY_LOW: f32 = 75.0;
const CANNY_HIGH: f32 = 200.0;
/// Only the largest few contours are considered as the receipt outline
const CANDIDATE_CONTOURS: usize = 5;
/// Polygon approximation tolerance as a fraction of the perimeter
const APPROX_EPSILON_FRACTION: f64 = 0.02;

const LOCAL_BLOCK_SIZE: u32 = 11;
const LOCAL_OFFSET: i32 = 10;

/// Four corners of a receipt, in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl Quad {
    /// Corners clockwise from the top-left
    pub fn corners(&self) -> [(f32, f32); 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Size of the upright rectangle the quad maps onto
    pub fn output_size(&self) -> (u32, u32) {
        let width_bottom = distance(self.bottom_right, self.bottom_left);
        let width_top = distance(self.top_right, self.top_left);
        let height_right = distance(self.top_right, self.bottom_right);
        let height_left = distance(self.top_left, self.bottom_left);

        let width = (width_bottom as u32).max(width_top as u32);
        let height = (height_right as u32).max(height_left as u32);
        (width, height)
    }

    fn scaled(&self, ratio: f32) -> Self {
        let scale = |(x, y): (f32, f32)| (x * ratio, y * ratio);
        Self {
            top_left: scale(self.top_left),
            top_right: scale(self.top_right),
            bottom_right: scale(self.bottom_right),
            bottom_left: scale(self.bottom_left),
        }
    }
}

/// Order four arbitrary corner points
///
/// The top-left has the smallest `x + y` and the bottom-right the largest;
/// the top-right has the smallest `y - x` and the bottom-left the largest.
pub fn order_points(points: &[(f32, f32); 4]) -> Quad {
    let sum = |p: &(f32, f32)| p.0 + p.1;
    let diff = |p: &(f32, f32)| p.1 - p.0;

    Quad {
        top_left: extreme(points, sum, false),
        bottom_right: extreme(points, sum, true),
        top_right: extreme(points, diff, false),
        bottom_left: extreme(points, diff, true),
    }
}

fn extreme<F>(points: &[(f32, f32); 4], key: F, largest: bool) -> (f32, f32)
where
    F: Fn(&(f32, f32)) -> f32,
{
    let mut best = points[0];
    for p in &points[1..] {
        let better = if largest {
            key(p) > key(&best)
        } else {
            key(p) < key(&best)
        };
        if better {
            best = *p;
        }
    }
    best
}

/// Locate the receipt outline in `image`
///
/// Returns the corners in the coordinates of the full-size image.
pub fn find_document_quad(image: &DynamicImage, detection_height: u32) -> Result<Quad> {
    ensure_not_empty(image)?;
    if detection_height == 0 {
        return Err(PipelineError::Config(
            "detection height must be greater than zero".to_string(),
        ));
    }
    let (width, height) = image.dimensions();
    let ratio = height as f32 / detection_height as f32;
    let resized_width = ((width as f32 / ratio).round() as u32).max(1);
    if resized_width > MAX_DETECTION_ASPECT * detection_height {
        return Err(PipelineError::InvalidImage(format!(
            "{}x{} is too wide to hold a receipt outline",
            width, height
        )));
    }
    let resized = image.resize_exact(resized_width, detection_height, FilterType::Triangle);

    let edges = edge_map(&resized.to_luma8());
    let quad = largest_quadrilateral(&edges).ok_or(PipelineError::NoDocumentContour)?;
    debug!(?quad, ratio, "found receipt outline");

    Ok(quad.scaled(ratio))
}

/// Warp the quad of `gray` onto an upright rectangle
pub fn four_point_transform(gray: &GrayImage, quad: &Quad) -> Result<GrayImage> {
    let (width, height) = quad.output_size();
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "receipt outline collapses to {}x{}",
            width, height
        )));
    }

    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let target = [(0.0, 0.0), (max_x, 0.0), (max_x, max_y), (0.0, max_y)];
    let projection = Projection::from_control_points(quad.corners(), target).ok_or_else(|| {
        PipelineError::InvalidImage("receipt outline is degenerate".to_string())
    })?;

    let mut warped = GrayImage::new(width, height);
    warp_into(
        gray,
        &projection,
        Interpolation::Bilinear,
        Luma([0u8]),
        &mut warped,
    );
    Ok(warped)
}

/// Find the receipt, flatten it and apply a local threshold
pub fn flatten_document(image: &DynamicImage, detection_height: u32) -> Result<GrayImage> {
    let quad = find_document_quad(image, detection_height)?;
    let warped = four_point_transform(&image.to_luma8(), &quad)?;
    threshold_local(&warped, LOCAL_BLOCK_SIZE, LOCAL_OFFSET)
}

fn edge_map(gray: &GrayImage) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, EDGE_BLUR_SIGMA);
    canny(&blurred, CANNY_LOW, CANNY_HIGH)
}

fn largest_quadrilateral(edges: &GrayImage) -> Option<Quad> {
    let mut contours: Vec<(f64, Vec<Point<i32>>)> = find_contours::<i32>(edges)
        .into_iter()
        .filter(|c| c.points.len() >= 4)
        .map(|c| (polygon_area(&c.points), c.points))
        .collect();
    contours.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (area, points) in contours.into_iter().take(CANDIDATE_CONTOURS) {
        let epsilon = APPROX_EPSILON_FRACTION * arc_length(&points, true);
        if epsilon <= 0.0 {
            continue;
        }
        let approx = approximate_closed_polygon(&points, epsilon);
        if approx.len() == 4 {
            let corners = [
                to_f32(approx[0]),
                to_f32(approx[1]),
                to_f32(approx[2]),
                to_f32(approx[3]),
            ];
            return Some(order_points(&corners));
        }
        debug!(area, vertices = approx.len(), "contour is not a quadrilateral");
    }

    warn!("no four-cornered contour among the largest candidates");
    None
}

/// Douglas-Peucker over a closed contour
///
/// The contour is split at the point farthest from its start so both halves
/// are open curves, then the start vertex is dropped if it lies on the line
/// between its neighbours.
fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            squared_distance(start, **a).cmp(&squared_distance(start, **b))
        })
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut closing: Vec<Point<i32>> = points[far..].to_vec();
    closing.push(start);

    let mut polygon = approximate_polygon_dp(&points[..=far], epsilon, false);
    let second = approximate_polygon_dp(&closing, epsilon, false);
    polygon.pop();
    polygon.extend_from_slice(&second[..second.len() - 1]);

    if polygon.len() > 3 {
        let prev = polygon[polygon.len() - 1];
        let next = polygon[1];
        if perpendicular_distance(polygon[0], prev, next) <= epsilon {
            polygon.remove(0);
        }
    }
    polygon
}

/// Absolute area enclosed by a closed contour (shoelace formula)
fn polygon_area(points: &[Point<i32>]) -> f64 {
    let n = points.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
        })
        .sum();
    (twice as f64 / 2.0).abs()
}

fn perpendicular_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (squared_distance(p, a) as f64).sqrt();
    }
    (dy * (p.x - a.x) as f64 - dx * (p.y - a.y) as f64).abs() / len
}

fn squared_distance(a: Point<i32>, b: Point<i32>) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

fn to_f32(p: Point<i32>) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}
