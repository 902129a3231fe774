use std::fmt;
use std::str::FromStr;

use super::error::FlowError;
use super::style::StylePatch;

/// A geographic position in degrees. Only ever handed to the map host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoCoordinate {
	/// Latitude in degrees.
	pub lat: f64,
	/// Longitude in degrees.
	pub lng: f64,
}

impl GeoCoordinate {
	/// Creates a coordinate from latitude and longitude.
	pub const fn new(lat: f64, lng: f64) -> Self {
		Self { lat, lng }
	}
}

impl From<(f64, f64)> for GeoCoordinate {
	fn from((lat, lng): (f64, f64)) -> Self {
		Self { lat, lng }
	}
}

/// A point in layer pixels, y growing downward.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenPoint {
	/// Horizontal pixel offset.
	pub x: f64,
	/// Vertical pixel offset.
	pub y: f64,
}

impl ScreenPoint {
	/// Creates a point from pixel offsets.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// True when neither coordinate is NaN or infinite.
	pub fn is_finite(&self) -> bool {
		self.x.is_finite() && self.y.is_finite()
	}
}

/// Resolved direction of a flow: along the segment, against it, or none.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
	/// From `end` to `start` (`-1`).
	Backward,
	/// No direction; the arrow collapses (`0`).
	None,
	/// From `start` to `end` (`1`).
	Forward,
}

impl Direction {
	/// Sign of `value`, with zero mapping to [`Direction::None`].
	pub fn from_sign(value: f64) -> Self {
		if value < 0.0 {
			Self::Backward
		} else if value > 0.0 {
			Self::Forward
		} else {
			Self::None
		}
	}

	/// `-1.0`, `0.0` or `1.0`.
	pub fn sign(self) -> f64 {
		match self {
			Self::Backward => -1.0,
			Self::None => 0.0,
			Self::Forward => 1.0,
		}
	}
}

impl TryFrom<i64> for Direction {
	type Error = FlowError;

	fn try_from(raw: i64) -> Result<Self, Self::Error> {
		match raw {
			-1 => Ok(Self::Backward),
			0 => Ok(Self::None),
			1 => Ok(Self::Forward),
			other => Err(FlowError::InvalidDirection {
				given: other.to_string(),
			}),
		}
	}
}

/// The `dir` option: a fixed direction, or derived from the value's sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DirSetting {
	/// Use the sign of the flow value.
	#[default]
	Auto,
	/// Always use this direction.
	Fixed(Direction),
}

impl DirSetting {
	/// Resolves the setting against a flow value.
	pub fn resolve(self, value: f64) -> Direction {
		match self {
			Self::Auto => Direction::from_sign(value),
			Self::Fixed(dir) => dir,
		}
	}
}

impl From<Direction> for DirSetting {
	fn from(dir: Direction) -> Self {
		Self::Fixed(dir)
	}
}

impl TryFrom<i64> for DirSetting {
	type Error = FlowError;

	fn try_from(raw: i64) -> Result<Self, Self::Error> {
		Direction::try_from(raw).map(Self::Fixed)
	}
}

impl FromStr for DirSetting {
	type Err = FlowError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		if trimmed.eq_ignore_ascii_case("auto") {
			return Ok(Self::Auto);
		}
		trimmed
			.parse::<i64>()
			.map_err(|_| FlowError::InvalidDirection { given: s.to_owned() })
			.and_then(Self::try_from)
	}
}

impl fmt::Display for DirSetting {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Auto => f.write_str("auto"),
			Self::Fixed(dir) => write!(f, "{}", dir.sign() as i64),
		}
	}
}

/// One flow to draw: endpoints plus the options that differ from the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowLink {
	/// Where the flow starts.
	pub start: GeoCoordinate,
	/// Where the flow ends.
	pub end: GeoCoordinate,
	/// Style options merged over the defaults.
	pub style: StylePatch,
}

/// A labelled marker drawn under the flows.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
	/// Label text.
	pub name: String,
	/// Marker position.
	pub coord: GeoCoordinate,
}

/// Input of the flow map component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowData {
	/// Flows, in drawing order.
	pub flows: Vec<FlowLink>,
	/// Markers.
	pub places: Vec<Place>,
}
