//! The projection interface shared by every map family.

/// Rectangle in projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Extent centred on the origin.
    pub fn symmetric(half_width: f64, half_height: f64) -> Self {
        Self::new(-half_width, -half_height, half_width, half_height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive containment with a tolerance relative to the extent size,
    /// so grid points lying on the map edge count as inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let tol_x = self.width().abs() * 1e-9;
        let tol_y = self.height().abs() * 1e-9;
        x >= self.min_x - tol_x
            && x <= self.max_x + tol_x
            && y >= self.min_y - tol_y
            && y <= self.max_y + tol_y
    }

    /// Corners in drawing order, closed.
    pub fn outline(&self) -> Vec<(f64, f64)> {
        vec![
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
            (self.min_x, self.min_y),
        ]
    }
}

/// Forward transform from geographic to projected coordinates.
///
/// Implementations are stateless after construction and shared between the
/// plotting workers.
pub trait MapProjection: Send + Sync {
    /// Project a point given in degrees. `None` when the point cannot be
    /// shown at all, e.g. the far side of the globe in a perspective view.
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)>;

    /// Rectangle enclosing the map region.
    fn extent(&self) -> Extent;

    /// Closed outline of the map region in projected coordinates.
    fn boundary(&self) -> Vec<(f64, f64)> {
        self.extent().outline()
    }

    /// Project and keep only points inside the map region.
    fn forward_in_region(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let (x, y) = self.forward(lon, lat)?;
        (x.is_finite() && y.is_finite() && self.extent().contains(x, y)).then_some((x, y))
    }
}
