use std::fmt;

use serde::{Deserialize, Serialize};

use crate::modules::error::RegionError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub const fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        distance(self, other)
    }

    /// Bearing from `self` towards `target`, in degrees.
    pub fn bearing_to(self, target: Point) -> f64 {
        (target.y - self.y).atan2(target.x - self.x).to_degrees()
    }

    /// Point reached by travelling `distance` along `heading` degrees.
    pub fn advance(self, heading: f64, distance: f64) -> Point {
        let radians = heading.to_radians();
        Point {
            x: self.x + distance * radians.cos(),
            y: self.y + distance * radians.sin(),
        }
    }

    fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// A labeled area of the environment. Extents are validated on construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Region {
    Circle {
        center: Point,
        radius: f64,
        label: String,
    },
    Rectangle {
        top_left: Point,
        width: f64,
        height: f64,
        label: String,
    },
}

impl Region {
    pub fn circle(center: Point, radius: f64, label: impl Into<String>) -> Result<Self, RegionError> {
        let label = label.into();
        if !center.is_finite() || !radius.is_finite() {
            return Err(RegionError::NonFinite { label });
        }
        if radius <= 0.0 {
            return Err(RegionError::InvalidRadius { label, radius });
        }
        Ok(Region::Circle {
            center,
            radius,
            label,
        })
    }

    pub fn rectangle(
        top_left: Point,
        width: f64,
        height: f64,
        label: impl Into<String>,
    ) -> Result<Self, RegionError> {
        let label = label.into();
        if !top_left.is_finite() || !width.is_finite() || !height.is_finite() {
            return Err(RegionError::NonFinite { label });
        }
        if width <= 0.0 || height <= 0.0 {
            return Err(RegionError::InvalidExtents {
                label,
                width,
                height,
            });
        }
        Ok(Region::Rectangle {
            top_left,
            width,
            height,
            label,
        })
    }

    pub fn contains(&self, point: Point) -> bool {
        match self {
            Region::Circle { center, radius, .. } => {
                let dx = point.x - center.x;
                let dy = point.y - center.y;
                dx * dx + dy * dy <= radius * radius
            }
            Region::Rectangle {
                top_left,
                width,
                height,
                ..
            } => {
                point.x >= top_left.x
                    && point.x <= top_left.x + width
                    && point.y >= top_left.y
                    && point.y <= top_left.y + height
            }
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Region::Circle { label, .. } | Region::Rectangle { label, .. } => label,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Circle {
                center,
                radius,
                label,
            } => write!(f, "circle `{}` at {} r={}", label, center, radius),
            Region::Rectangle {
                top_left,
                width,
                height,
                label,
            } => write!(
                f,
                "rectangle `{}` at {} {}x{}",
                label, top_left, width, height
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0);
        assert_eq!(Point::new(1.0, 1.0).distance_to(Point::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn circle_membership_includes_boundary() {
        let circle = Region::circle(Point::new(0.0, 0.0), 2.0, "zone").unwrap();
        assert!(circle.contains(Point::new(0.0, 0.0)));
        assert!(circle.contains(Point::new(2.0, 0.0)));
        assert!(!circle.contains(Point::new(2.0, 0.1)));
        assert_eq!(circle.label(), "zone");
    }

    #[test]
    fn rectangle_membership_uses_inclusive_bounds() {
        let rect = Region::rectangle(Point::new(1.0, 1.0), 4.0, 2.0, "dock").unwrap();
        assert!(rect.contains(Point::new(1.0, 1.0)));
        assert!(rect.contains(Point::new(5.0, 3.0)));
        assert!(rect.contains(Point::new(3.0, 2.0)));
        assert!(!rect.contains(Point::new(0.9, 2.0)));
        assert!(!rect.contains(Point::new(3.0, 3.1)));
    }

    #[test]
    fn invalid_extents_are_rejected() {
        assert!(matches!(
            Region::circle(Point::origin(), 0.0, "c"),
            Err(RegionError::InvalidRadius { .. })
        ));
        assert!(matches!(
            Region::rectangle(Point::origin(), 1.0, -1.0, "r"),
            Err(RegionError::InvalidExtents { .. })
        ));
        assert!(matches!(
            Region::circle(Point::new(f64::NAN, 0.0), 1.0, "n"),
            Err(RegionError::NonFinite { .. })
        ));
    }

    #[test]
    fn advance_follows_heading() {
        let p = Point::origin().advance(90.0, 2.0);
        assert!(p.x.abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
        assert_eq!(Point::origin().bearing_to(Point::new(0.0, -1.0)), -90.0);
    }
}
