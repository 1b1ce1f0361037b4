//! Path geometry and arc-length sampling
//!
//! [`PathState`] decomposes a [`Path`] into line, quadratic and cubic segments,
//! approximates its arc length, and resolves a percent along the path to a point.
//! An optional lookup table trades memory for constant-time queries.

use cadence_core::{EngineConfig, PathConfig};
use smallvec::SmallVec;
use thiserror::Error;
use std::mem;
use tracing::{debug, warn};

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other`
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

/// Path drawing command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathElement {
    Move(Point),
    Line(Point),
    QuadCurve {
        control: Point,
        end: Point,
    },
    CubicCurve {
        control1: Point,
        control2: Point,
        end: Point,
    },
    Close,
}

/// A 2D path composed of elements
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    elements: SmallVec<[PathElement; 16]>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a path from raw elements, without validation
    pub fn from_elements(elements: impl IntoIterator<Item = PathElement>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
        }
    }

    pub fn push(&mut self, element: PathElement) {
        self.elements.push(element);
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Builder for constructing paths
pub struct PathBuilder {
    path: Path,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self { path: Path::new() }
    }

    pub fn move_to(mut self, x: f64, y: f64) -> Self {
        self.path.push(PathElement::Move(Point::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: f64, y: f64) -> Self {
        self.path.push(PathElement::Line(Point::new(x, y)));
        self
    }

    pub fn quad_to(mut self, cx: f64, cy: f64, x: f64, y: f64) -> Self {
        self.path.push(PathElement::QuadCurve {
            control: Point::new(cx, cy),
            end: Point::new(x, y),
        });
        self
    }

    pub fn cubic_to(mut self, c1x: f64, c1y: f64, c2x: f64, c2y: f64, x: f64, y: f64) -> Self {
        self.path.push(PathElement::CubicCurve {
            control1: Point::new(c1x, c1y),
            control2: Point::new(c2x, c2y),
            end: Point::new(x, y),
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.path.push(PathElement::Close);
        self
    }

    pub fn build(self) -> Path {
        self.path
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while decomposing a path
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PathError {
    /// A drawing element appeared before any `Move`
    #[error("Element {index} has no current point")]
    MissingCurrentPoint { index: usize },
}

/// Handling of percents outside the path range
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EdgeBehavior {
    /// Clamp into the edge range
    #[default]
    StopAtEdges,
    /// Treat the path as a loop; overshoot wraps around
    ContiguousEdges,
}

#[derive(Clone, Copy, Debug)]
enum SegmentKind {
    Line,
    Quad(Point),
    Cubic(Point, Point),
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    from: Point,
    to: Point,
    kind: SegmentKind,
    length: f64,
}

impl Segment {
    fn point_at(&self, t: f64) -> Point {
        let p0 = self.from;
        let p3 = self.to;
        match self.kind {
            SegmentKind::Line => p0.lerp(p3, t),
            SegmentKind::Quad(c) => {
                let mt = 1.0 - t;
                Point::new(
                    mt * mt * p0.x + 2.0 * mt * t * c.x + t * t * p3.x,
                    mt * mt * p0.y + 2.0 * mt * t * c.y + t * t * p3.y,
                )
            }
            SegmentKind::Cubic(c1, c2) => {
                let mt = 1.0 - t;
                let a = mt * mt * mt;
                let b = 3.0 * mt * mt * t;
                let c = 3.0 * mt * t * t;
                let d = t * t * t;
                Point::new(
                    a * p0.x + b * c1.x + c * c2.x + d * p3.x,
                    a * p0.y + b * c1.y + c * c2.y + d * p3.y,
                )
            }
        }
    }

    /// Euclidean length for lines, `steps` chord samples for curves
    fn measure(&self, steps: usize) -> f64 {
        match self.kind {
            SegmentKind::Line => self.from.distance(self.to),
            _ => {
                let steps = steps.max(1);
                let mut previous = self.from;
                let mut length = 0.0;
                for i in 1..=steps {
                    let point = self.point_at(i as f64 / steps as f64);
                    length += previous.distance(point);
                    previous = point;
                }
                length
            }
        }
    }
}

fn decompose(elements: &[PathElement], steps: usize) -> Result<Vec<Segment>, PathError> {
    let mut segments = Vec::with_capacity(elements.len());
    let mut current: Option<Point> = None;
    let mut subpath_start: Option<Point> = None;

    for (index, element) in elements.iter().enumerate() {
        let (to, kind) = match *element {
            PathElement::Move(point) => {
                current = Some(point);
                subpath_start = Some(point);
                continue;
            }
            PathElement::Line(point) => (point, SegmentKind::Line),
            PathElement::QuadCurve { control, end } => (end, SegmentKind::Quad(control)),
            PathElement::CubicCurve {
                control1,
                control2,
                end,
            } => (end, SegmentKind::Cubic(control1, control2)),
            PathElement::Close => match subpath_start {
                Some(start) => (start, SegmentKind::Line),
                None => return Err(PathError::MissingCurrentPoint { index }),
            },
        };

        let from = current.ok_or(PathError::MissingCurrentPoint { index })?;
        let mut segment = Segment {
            from,
            to,
            kind,
            length: 0.0,
        };
        segment.length = segment.measure(steps);
        segments.push(segment);
        current = Some(to);
    }

    Ok(segments)
}

/// Arc-length sampler over a path
pub struct PathState {
    path: Path,
    segments: Vec<Segment>,
    error: Option<PathError>,
    length: f64,
    lookup_table: Option<Vec<Point>>,
    /// Capacity requested for the lookup table, if one was built
    lookup_capacity: Option<Option<usize>>,
    edge_behavior: EdgeBehavior,
    config: PathConfig,
    /// Sampling settings were given at construction
    config_set: bool,
}

impl PathState {
    pub fn new(path: Path) -> Self {
        let mut state = Self::with_config(path, &EngineConfig::default().path);
        state.config_set = false;
        state
    }

    pub fn with_config(path: Path, config: &PathConfig) -> Self {
        let mut state = Self {
            path: Path::new(),
            segments: Vec::new(),
            error: None,
            length: 0.0,
            lookup_table: None,
            lookup_capacity: None,
            edge_behavior: EdgeBehavior::StopAtEdges,
            config: config.clone(),
            config_set: true,
        };
        state.set_path(path);
        state
    }

    /// Replace the path, rebuilding the segment cache and dropping any lookup table
    pub fn set_path(&mut self, path: Path) {
        match decompose(path.elements(), self.config.curve_length_generation_steps) {
            Ok(segments) => {
                self.length = segments.iter().map(|s| s.length).sum();
                self.segments = segments;
                self.error = None;
            }
            Err(err) => {
                warn!(%err, "malformed path");
                self.segments.clear();
                self.length = 0.0;
                self.error = Some(err);
            }
        }
        self.path = path;
        self.lookup_table = None;
        self.lookup_capacity = None;
    }

    pub fn config(&self) -> &PathConfig {
        &self.config
    }

    /// Adopt `config` unless sampling settings were given at construction.
    ///
    /// A change rebuilds the segment cache and any lookup table.
    pub fn apply_config(&mut self, config: &PathConfig) {
        if self.config_set || self.config == *config {
            return;
        }
        self.config = config.clone();
        let capacity = self.lookup_capacity;
        let path = mem::replace(&mut self.path, Path::new());
        self.set_path(path);
        if let Some(capacity) = capacity {
            self.setup_performance_mode(capacity);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn elements(&self) -> &[PathElement] {
        self.path.elements()
    }

    /// Approximate arc length of the current path
    pub fn length(&self) -> f64 {
        self.length
    }

    /// The decomposition error, if the path is malformed
    pub fn error(&self) -> Option<PathError> {
        self.error
    }

    /// Arc length of arbitrary elements using this state's curve sampling
    pub fn calculate_length(&self, elements: &[PathElement]) -> Result<f64, PathError> {
        let segments = decompose(elements, self.config.curve_length_generation_steps)?;
        Ok(segments.iter().map(|s| s.length).sum())
    }

    pub fn edge_behavior(&self) -> EdgeBehavior {
        self.edge_behavior
    }

    pub fn set_edge_behavior(&mut self, behavior: EdgeBehavior) {
        self.edge_behavior = behavior;
    }

    fn first_point(&self) -> Option<Point> {
        self.path.elements().iter().find_map(|e| match e {
            PathElement::Move(point) => Some(*point),
            _ => None,
        })
    }

    /// Point at `percent` of the arc length, walking the segments.
    ///
    /// Returns `None` outside `0..=1` or for a malformed path.
    pub fn point(&self, percent: f64) -> Option<Point> {
        if !(0.0..=1.0).contains(&percent) || self.error.is_some() {
            return None;
        }
        let Some(last) = self.segments.last() else {
            return self.first_point();
        };
        if self.length <= 0.0 {
            return Some(self.segments[0].from);
        }
        if percent == 1.0 {
            return Some(last.to);
        }

        let target = percent * self.length;
        let mut travelled = 0.0;
        for segment in &self.segments {
            if segment.length > 0.0 && travelled + segment.length >= target {
                let t = (target - travelled) / segment.length;
                return Some(segment.point_at(t.clamp(0.0, 1.0)));
            }
            travelled += segment.length;
        }
        Some(last.to)
    }

    /// Point at `percent` through the lookup table, falling back to [`point`](Self::point)
    pub fn lookup_point(&self, percent: f64) -> Option<Point> {
        let Some(table) = self.lookup_table.as_ref() else {
            return self.point(percent);
        };
        if !(0.0..=1.0).contains(&percent) || table.is_empty() {
            return None;
        }
        let index = (((table.len() - 1) as f64) * percent).floor() as usize;
        table.get(index.min(table.len() - 1)).copied()
    }

    /// Precompute `capacity` evenly spaced points (default `ceil(length * precision)`).
    ///
    /// The table is complete when this returns.
    pub fn setup_performance_mode(&mut self, capacity: Option<usize>) {
        if self.error.is_some() {
            warn!("performance mode skipped for malformed path");
            return;
        }

        self.lookup_capacity = Some(capacity);
        let capacity = capacity
            .unwrap_or_else(|| (self.length * self.config.lookup_table_precision).ceil() as usize)
            .max(1);
        let table = self.sample_uniform(capacity);
        debug!(capacity, length = self.length, "built path lookup table");
        self.lookup_table = Some(table);
    }

    /// Single forward pass over the segments
    fn sample_uniform(&self, count: usize) -> Vec<Point> {
        let mut table = Vec::with_capacity(count);
        let Some(fallback) = self.segments.first().map(|s| s.from).or_else(|| self.first_point()) else {
            return table;
        };

        let mut segment_index = 0;
        let mut travelled = 0.0;
        for i in 0..count {
            let percent = if count == 1 {
                0.0
            } else {
                i as f64 / (count - 1) as f64
            };
            let target = percent * self.length;

            while segment_index + 1 < self.segments.len()
                && travelled + self.segments[segment_index].length < target
            {
                travelled += self.segments[segment_index].length;
                segment_index += 1;
            }

            let point = match self.segments.get(segment_index) {
                Some(segment) if segment.length > 0.0 => {
                    let t = ((target - travelled) / segment.length).clamp(0.0, 1.0);
                    segment.point_at(t)
                }
                Some(segment) => segment.from,
                None => fallback,
            };
            table.push(point);
        }
        table
    }

    pub fn clear_performance_mode(&mut self) {
        self.lookup_table = None;
        self.lookup_capacity = None;
    }

    pub fn is_performance_mode(&self) -> bool {
        self.lookup_table.is_some()
    }

    /// Number of lookup table entries, `0` outside performance mode
    pub fn lookup_table_len(&self) -> usize {
        self.lookup_table.as_ref().map_or(0, |t| t.len())
    }

    /// Map `percent` through the edge behavior without sampling
    pub fn edge_percent(&self, percent: f64, start_edge: f64, end_edge: f64) -> f64 {
        match self.edge_behavior {
            EdgeBehavior::StopAtEdges => {
                percent.clamp(start_edge.min(end_edge), start_edge.max(end_edge))
            }
            EdgeBehavior::ContiguousEdges => {
                if percent > 1.0 {
                    (percent - 1.0).min(1.0)
                } else if percent < 0.0 {
                    1.0 - percent.abs().min(1.0)
                } else {
                    percent
                }
            }
        }
    }

    /// Resolve `percent` after edge handling, using the lookup table when present
    pub fn move_point(&self, percent: f64, start_edge: f64, end_edge: f64) -> Option<Point> {
        let percent = self.edge_percent(percent, start_edge, end_edge);
        if self.is_performance_mode() {
            self.lookup_point(percent)
        } else {
            self.point(percent)
        }
    }
}
