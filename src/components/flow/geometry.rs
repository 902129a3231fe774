//! Turns two projected endpoints and a style into line and arrow geometry.

use log::debug;

use super::style::FlowStyle;
use super::types::{Direction, ScreenPoint};

/// The arrow outline, authored pointing along +x and centred on the origin.
pub const ARROW_GLYPH: [ScreenPoint; 3] = [
	ScreenPoint::new(-10.0, -10.0),
	ScreenPoint::new(-10.0, 10.0),
	ScreenPoint::new(10.0, 0.0),
];

const ARROW_SCALE: f64 = 0.35;
const ARROW_EXPONENT: f64 = 2.0 / 3.0;

/// Rotation then non-uniform scale applied to [`ARROW_GLYPH`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ArrowTransform {
	/// Rotation in degrees, clockwise on screen.
	pub rotate: f64,
	/// Horizontal scale. Negative mirrors the arrow, zero hides its tip.
	pub scale_x: f64,
	/// Vertical scale.
	pub scale_y: f64,
}

impl ArrowTransform {
	/// Maps a glyph-space point to anchor-relative screen space.
	pub fn apply(&self, p: ScreenPoint) -> ScreenPoint {
		let (sx, sy) = (p.x * self.scale_x, p.y * self.scale_y);
		let (sin, cos) = self.rotate.to_radians().sin_cos();
		ScreenPoint::new(sx * cos - sy * sin, sx * sin + sy * cos)
	}

	/// `rotate(a) scale(sx,sy)` in SVG transform syntax.
	pub fn to_svg(&self) -> String {
		format!(
			"rotate({}) scale({},{})",
			self.rotate, self.scale_x, self.scale_y
		)
	}

	/// True when no component is NaN or infinite.
	pub fn is_finite(&self) -> bool {
		self.rotate.is_finite() && self.scale_x.is_finite() && self.scale_y.is_finite()
	}
}

/// Everything derived from one projection of a segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowGeometry {
	/// Projected start point.
	pub start: ScreenPoint,
	/// Projected end point.
	pub end: ScreenPoint,
	/// Anchor of the arrow.
	pub midpoint: ScreenPoint,
	/// Angle of `end - start`, in `[-90, 270)`.
	pub angle_degrees: f64,
	/// Stroke width of the line.
	pub weight: f64,
	/// Resolved direction.
	pub direction: Direction,
	/// Transform of the arrow glyph.
	pub arrow: ArrowTransform,
	/// True when the endpoints did not define an angle.
	pub degenerate: bool,
}

impl FlowGeometry {
	/// Whether `p` is on the line (within `slop` pixels of its stroke) or
	/// inside the arrow.
	pub fn hit(&self, p: ScreenPoint, slop: f64) -> bool {
		self.arrow_contains(p)
			|| distance_to_segment(p, self.start, self.end) <= self.weight / 2.0 + slop
	}

	/// Whether `p` lies inside the transformed arrow glyph. A collapsed arrow
	/// contains nothing.
	pub fn arrow_contains(&self, p: ScreenPoint) -> bool {
		if self.arrow.scale_x == 0.0 || self.arrow.scale_y == 0.0 {
			return false;
		}
		let [a, b, c] = ARROW_GLYPH.map(|v| {
			let q = self.arrow.apply(v);
			ScreenPoint::new(self.midpoint.x + q.x, self.midpoint.y + q.y)
		});
		let (d1, d2, d3) = (cross(a, b, p), cross(b, c, p), cross(c, a, p));
		let negative = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
		let positive = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
		!(negative && positive)
	}
}

fn cross(o: ScreenPoint, a: ScreenPoint, b: ScreenPoint) -> f64 {
	(a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn distance_to_segment(p: ScreenPoint, a: ScreenPoint, b: ScreenPoint) -> f64 {
	let (dx, dy) = (b.x - a.x, b.y - a.y);
	let len2 = dx * dx + dy * dy;
	let t = if len2 > 0.0 {
		(((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
	} else {
		0.0
	};
	(p.x - a.x - t * dx).hypot(p.y - a.y - t * dy)
}

/// Stroke width for `style`, always within the thickness bounds.
pub fn weight(style: &FlowStyle) -> f64 {
	let ratio = (style.value.abs() / style.max_value.abs()).clamp(0.0, 1.0);
	let ratio = if ratio.is_nan() { 0.0 } else { ratio };
	style.min_thickness + ratio * (style.max_thickness - style.min_thickness)
}

/// Angle of the vector `from -> to` in screen degrees.
///
/// Matches `atan(dy / dx)` with 180° added when `dx < 0`, so results lie in
/// `[-90, 270)`. Returns `None` when the angle is undefined.
pub fn angle_degrees(from: ScreenPoint, to: ScreenPoint) -> Option<f64> {
	let (dx, dy) = (to.x - from.x, to.y - from.y);
	if !dx.is_finite() || !dy.is_finite() || (dx == 0.0 && dy == 0.0) {
		return None;
	}
	let angle = dy.atan2(dx).to_degrees();
	Some(if angle < -90.0 { angle + 360.0 } else { angle })
}

/// Resolves the segment between two projected points.
///
/// Coincident or non-finite endpoints yield angle 0 and a zero-sized arrow
/// anchored on `start` (or the origin when `start` itself is not finite).
pub fn resolve(start: ScreenPoint, end: ScreenPoint, style: &FlowStyle) -> FlowGeometry {
	let weight = weight(style);
	let direction = style.dir.resolve(style.value);
	let extent = ARROW_SCALE * weight.powf(ARROW_EXPONENT);

	match angle_degrees(start, end) {
		Some(angle) => FlowGeometry {
			start,
			end,
			// halve first: the sum can overflow where the difference does not
			midpoint: ScreenPoint::new(start.x / 2.0 + end.x / 2.0, start.y / 2.0 + end.y / 2.0),
			angle_degrees: angle,
			weight,
			direction,
			arrow: ArrowTransform {
				rotate: angle,
				scale_x: extent * direction.sign(),
				scale_y: extent,
			},
			degenerate: false,
		},
		None => {
			debug!("Degenerate flow geometry between {start:?} and {end:?}");
			let anchor = if start.is_finite() {
				start
			} else {
				ScreenPoint::default()
			};
			FlowGeometry {
				start: anchor,
				end: if end.is_finite() { end } else { anchor },
				midpoint: anchor,
				angle_degrees: 0.0,
				weight,
				direction,
				arrow: ArrowTransform::default(),
				degenerate: true,
			}
		}
	}
}
