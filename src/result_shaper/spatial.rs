//! Spatial points.
//!
//! Geographic points (SRID 4326 / 4979) are exposed as
//! `{longitude, latitude, height, crs, srid}`, cartesian points (7203 / 9157)
//! as `{x, y, z, crs, srid}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::errors::ShapeError;

pub const WGS84_2D: u32 = 4326;
pub const WGS84_3D: u32 = 4979;
pub const CARTESIAN_2D: u32 = 7203;
pub const CARTESIAN_3D: u32 = 9157;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub srid: u32,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn is_geographic(&self) -> bool {
        matches!(self.srid, WGS84_2D | WGS84_3D)
    }

    pub fn crs(&self) -> &'static str {
        match self.srid {
            WGS84_2D => "wgs-84",
            WGS84_3D => "wgs-84-3d",
            CARTESIAN_3D => "cartesian-3d",
            _ => "cartesian",
        }
    }

    /// Read a point from either external shape. The SRID is inferred from
    /// the coordinate names and dimensionality unless given explicitly.
    pub fn from_json(value: &Value) -> Result<Self, ShapeError> {
        let object = value.as_object().ok_or_else(|| ShapeError::InvalidPoint {
            reason: format!("expected an object, got {}", value),
        })?;
        let coordinate = |key: &str| object.get(key).and_then(Value::as_f64);
        let explicit_srid = object
            .get("srid")
            .and_then(Value::as_u64)
            .and_then(|s| u32::try_from(s).ok());

        let (x, y, z, geographic) = match (coordinate("longitude"), coordinate("latitude")) {
            (Some(lon), Some(lat)) => (lon, lat, coordinate("height"), true),
            _ => match (coordinate("x"), coordinate("y")) {
                (Some(x), Some(y)) => (x, y, coordinate("z"), false),
                _ => {
                    return Err(ShapeError::InvalidPoint {
                        reason: "missing coordinates".to_string(),
                    })
                }
            },
        };

        let srid = explicit_srid.unwrap_or(match (geographic, z.is_some()) {
            (true, false) => WGS84_2D,
            (true, true) => WGS84_3D,
            (false, false) => CARTESIAN_2D,
            (false, true) => CARTESIAN_3D,
        });
        Ok(Point { srid, x, y, z })
    }

    pub fn to_external(&self) -> Value {
        if self.is_geographic() {
            json!({
                "longitude": self.x,
                "latitude": self.y,
                "height": self.z,
                "crs": self.crs(),
                "srid": self.srid,
            })
        } else {
            json!({
                "x": self.x,
                "y": self.y,
                "z": self.z,
                "crs": self.crs(),
                "srid": self.srid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_round_trip() {
        let input = json!({"longitude": 13.4, "latitude": 52.5});
        let point = Point::from_json(&input).unwrap();
        assert_eq!(point.srid, WGS84_2D);
        assert_eq!(
            point.to_external(),
            json!({"longitude": 13.4, "latitude": 52.5, "height": null, "crs": "wgs-84", "srid": 4326})
        );
        assert_eq!(Point::from_json(&point.to_external()).unwrap(), point);
    }

    #[test]
    fn test_cartesian_3d() {
        let point = Point::from_json(&json!({"x": 1.0, "y": 2.0, "z": 3.0})).unwrap();
        assert_eq!(point.srid, CARTESIAN_3D);
        assert_eq!(point.to_external()["crs"], json!("cartesian-3d"));
    }

    #[test]
    fn test_invalid_points() {
        assert!(Point::from_json(&json!({"x": 1.0})).is_err());
        assert!(Point::from_json(&json!("POINT(1 2)")).is_err());
    }
}
