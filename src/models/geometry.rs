/// Axis-aligned rectangle in viewport pixels, as returned by a
/// bounding-client-rect query.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, right: f64, bottom: f64) -> Self {
        Self {
            top,
            left,
            right,
            bottom,
        }
    }

    /// Build from an origin and a size.
    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            right: left + width,
            bottom: top + height,
        }
    }

    pub fn width(&self) -> f64 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.bottom - self.top).max(0.0)
    }

    /// A detached element reports an all-zero rect.
    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 || self.height() == 0.0
    }

    /// Translate into the coordinate space of `container`.
    pub fn relative_to(&self, container: &Rect) -> Rect {
        Rect {
            top: self.top - container.top,
            left: self.left - container.left,
            right: self.right - container.left,
            bottom: self.bottom - container.top,
        }
    }
}
