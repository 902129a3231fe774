//! Animated application of resolved geometry to the two rendering primitives.

use std::time::Duration;

use super::geometry::{ArrowTransform, FlowGeometry};
use super::style::FlowStyle;
use super::types::ScreenPoint;

/// Target attributes of the line primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct LineTarget {
	/// Stroke width in pixels.
	pub width: f64,
	/// Stroke color token.
	pub color: String,
	/// Stroke opacity.
	pub opacity: f64,
}

/// Target attributes of the arrow primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct ArrowTarget {
	/// Glyph transform relative to the anchor.
	pub transform: ArrowTransform,
	/// Fill color token.
	pub color: String,
	/// Fill opacity.
	pub opacity: f64,
}

/// A stroke-capable line owned by one flow segment.
pub trait LinePrimitive {
	/// Moves the line. Not animated.
	fn set_endpoints(&mut self, start: ScreenPoint, end: ScreenPoint);

	/// Drives width, color and opacity to `target` over `duration`.
	/// A later call replaces the target of an unfinished one.
	fn animate(&mut self, target: LineTarget, duration: Duration);
}

/// The fillable arrow glyph owned by one flow segment.
pub trait ArrowPrimitive {
	/// Moves the glyph origin. Not animated.
	fn set_anchor(&mut self, anchor: ScreenPoint);

	/// Drives transform, fill and opacity to `target` over `duration`.
	/// A later call replaces the target of an unfinished one.
	fn animate(&mut self, target: ArrowTarget, duration: Duration);
}

/// Pushes `geometry` and the style's paint to both primitives.
pub fn apply<L, A>(
	line: &mut L,
	arrow: &mut A,
	geometry: &FlowGeometry,
	style: &FlowStyle,
	duration: Duration,
) where
	L: LinePrimitive + ?Sized,
	A: ArrowPrimitive + ?Sized,
{
	let (line_target, arrow_target) = targets(geometry, style);
	line.set_endpoints(geometry.start, geometry.end);
	arrow.set_anchor(geometry.midpoint);
	arrow.animate(arrow_target, duration);
	line.animate(line_target, duration);
}

/// The attribute targets both primitives should converge to.
pub fn targets(geometry: &FlowGeometry, style: &FlowStyle) -> (LineTarget, ArrowTarget) {
	(
		LineTarget {
			width: geometry.weight,
			color: style.color.clone(),
			opacity: style.opacity,
		},
		ArrowTarget {
			transform: geometry.arrow,
			color: style.color.clone(),
			opacity: style.opacity,
		},
	)
}

pub fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

/// Values a [`Tween`] can blend. `t` is in `0..=1`, and the result must lie
/// between `from` and `to` for every component.
pub trait Interpolate: Clone {
	fn interpolate(from: &Self, to: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
	fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
		if t >= 1.0 { *to } else { from + (to - from) * t }
	}
}

impl Interpolate for ArrowTransform {
	fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
		// shortest arc
		let delta = (to.rotate - from.rotate + 180.0).rem_euclid(360.0) - 180.0;
		let rotate = if t >= 1.0 {
			to.rotate
		} else {
			from.rotate + delta * t
		};
		Self {
			rotate,
			scale_x: f64::interpolate(&from.scale_x, &to.scale_x, t),
			scale_y: f64::interpolate(&from.scale_y, &to.scale_y, t),
		}
	}
}

/// Eased transition of one attribute that can be retargeted mid-flight.
#[derive(Clone, Debug)]
pub struct Tween<T> {
	from: T,
	to: T,
	elapsed: f64,
	duration: f64,
}

impl<T: Interpolate> Tween<T> {
	/// A tween already settled on `value`.
	pub fn settled(value: T) -> Self {
		Self {
			from: value.clone(),
			to: value,
			elapsed: 0.0,
			duration: 0.0,
		}
	}

	/// Restarts from the current value towards `target`.
	pub fn retarget(&mut self, target: T, duration: Duration) {
		self.from = self.current();
		self.to = target;
		self.elapsed = 0.0;
		self.duration = duration.as_secs_f64();
	}

	/// Advances by `dt` seconds. Returns true while still moving.
	pub fn tick(&mut self, dt: f64) -> bool {
		if self.is_done() {
			return false;
		}
		self.elapsed = (self.elapsed + dt.max(0.0)).min(self.duration);
		!self.is_done()
	}

	pub fn progress(&self) -> f64 {
		if self.duration <= 0.0 {
			1.0
		} else {
			(self.elapsed / self.duration).clamp(0.0, 1.0)
		}
	}

	pub fn is_done(&self) -> bool {
		self.progress() >= 1.0
	}

	pub fn current(&self) -> T {
		T::interpolate(&self.from, &self.to, ease_out_cubic(self.progress()))
	}

	pub fn target(&self) -> &T {
		&self.to
	}
}
