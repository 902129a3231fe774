//! Style options for a flow segment and their functional merge.

use std::time::Duration;

use log::warn;

use super::error::{FlowError, FlowResult};
use super::types::DirSetting;

/// Transition used when a style update does not name one.
pub const DEFAULT_TRANSITION: Duration = Duration::from_millis(750);

/// Fully resolved style of a flow segment.
///
/// A `FlowStyle` that exists outside this module has passed [`FlowStyle::validate`]
/// whenever it came from [`FlowStyle::merged`] or a segment constructor.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowStyle {
	/// Stroke and fill color token, passed through to the renderer.
	pub color: String,
	/// Signed magnitude. Drives thickness and, with `dir = auto`, direction.
	pub value: f64,
	/// Magnitude at which the line reaches `max_thickness`.
	pub max_value: f64,
	/// Stroke width for a zero value.
	pub min_thickness: f64,
	/// Stroke width for `|value| >= |max_value|`.
	pub max_thickness: f64,
	/// Opacity of both line and arrow, in `0..=1`.
	pub opacity: f64,
	/// Direction override.
	pub dir: DirSetting,
	/// Duration of animated style updates.
	pub transition: Duration,
}

impl Default for FlowStyle {
	fn default() -> Self {
		Self {
			color: "blue".into(),
			value: 0.2,
			max_value: 1.0,
			min_thickness: 1.0,
			max_thickness: 20.0,
			opacity: 1.0,
			dir: DirSetting::Auto,
			transition: DEFAULT_TRANSITION,
		}
	}
}

impl FlowStyle {
	/// Checks every option, returning the first violation.
	pub fn validate(&self) -> FlowResult<()> {
		if self.color.trim().is_empty() {
			return Err(FlowError::config("color must not be empty"));
		}
		if !self.value.is_finite() {
			return Err(FlowError::config(format!(
				"value must be finite, got {}",
				self.value
			)));
		}
		if !self.max_value.is_finite() || self.max_value == 0.0 {
			return Err(FlowError::config(format!(
				"maxValue must be finite and non-zero, got {}",
				self.max_value
			)));
		}
		if !self.min_thickness.is_finite() || !self.max_thickness.is_finite() {
			return Err(FlowError::config("thickness bounds must be finite"));
		}
		if self.min_thickness < 0.0 || self.min_thickness > self.max_thickness {
			return Err(FlowError::config(format!(
				"thickness bounds must satisfy 0 <= min <= max, got {}..{}",
				self.min_thickness, self.max_thickness
			)));
		}
		if !(0.0..=1.0).contains(&self.opacity) {
			return Err(FlowError::config(format!(
				"opacity must be within 0..=1, got {}",
				self.opacity
			)));
		}
		Ok(())
	}

	/// Returns a new style with `patch` applied, or the validation error.
	/// `self` is never modified.
	pub fn merged(&self, patch: &StylePatch) -> FlowResult<Self> {
		let next = Self {
			color: patch.color.clone().unwrap_or_else(|| self.color.clone()),
			value: patch.value.unwrap_or(self.value),
			max_value: patch.max_value.unwrap_or(self.max_value),
			min_thickness: patch.min_thickness.unwrap_or(self.min_thickness),
			max_thickness: patch.max_thickness.unwrap_or(self.max_thickness),
			opacity: patch.opacity.unwrap_or(self.opacity),
			dir: patch.dir.unwrap_or(self.dir),
			transition: patch.transition.unwrap_or(self.transition),
		};
		next.validate().inspect_err(|e| warn!("Rejected flow style: {e}"))?;
		Ok(next)
	}
}

/// A partial style. Unset fields keep their current value when merged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StylePatch {
	/// See [`FlowStyle::color`].
	pub color: Option<String>,
	/// See [`FlowStyle::value`].
	pub value: Option<f64>,
	/// See [`FlowStyle::max_value`].
	pub max_value: Option<f64>,
	/// See [`FlowStyle::min_thickness`].
	pub min_thickness: Option<f64>,
	/// See [`FlowStyle::max_thickness`].
	pub max_thickness: Option<f64>,
	/// See [`FlowStyle::opacity`].
	pub opacity: Option<f64>,
	/// See [`FlowStyle::dir`].
	pub dir: Option<DirSetting>,
	/// See [`FlowStyle::transition`].
	pub transition: Option<Duration>,
}

impl StylePatch {
	/// An empty patch.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the color token.
	pub fn color(mut self, color: impl Into<String>) -> Self {
		self.color = Some(color.into());
		self
	}

	/// Sets the signed value.
	pub fn value(mut self, value: f64) -> Self {
		self.value = Some(value);
		self
	}

	/// Sets the value mapped to `max_thickness`.
	pub fn max_value(mut self, max_value: f64) -> Self {
		self.max_value = Some(max_value);
		self
	}

	/// Sets both thickness bounds.
	pub fn thickness(mut self, min: f64, max: f64) -> Self {
		self.min_thickness = Some(min);
		self.max_thickness = Some(max);
		self
	}

	/// Sets the opacity of line and arrow.
	pub fn opacity(mut self, opacity: f64) -> Self {
		self.opacity = Some(opacity);
		self
	}

	/// Sets the direction, `auto` or fixed.
	pub fn dir(mut self, dir: impl Into<DirSetting>) -> Self {
		self.dir = Some(dir.into());
		self
	}

	/// Parses `dir` from its textual form (`"-1"`, `"0"`, `"1"`, `"auto"`).
	pub fn dir_str(self, dir: &str) -> FlowResult<Self> {
		Ok(self.dir(dir.parse::<DirSetting>()?))
	}

	/// Sets the default animation duration.
	pub fn transition(mut self, transition: Duration) -> Self {
		self.transition = Some(transition);
		self
	}

	/// True when no field is set.
	pub fn is_empty(&self) -> bool {
		*self == Self::default()
	}
}

impl From<FlowStyle> for StylePatch {
	fn from(style: FlowStyle) -> Self {
		Self {
			color: Some(style.color),
			value: Some(style.value),
			max_value: Some(style.max_value),
			min_thickness: Some(style.min_thickness),
			max_thickness: Some(style.max_thickness),
			opacity: Some(style.opacity),
			dir: Some(style.dir),
			transition: Some(style.transition),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow::types::Direction;

	#[test]
	fn builder_sets_each_field() {
		let patch = StylePatch::new()
			.color("red")
			.value(2.0)
			.max_value(4.0)
			.thickness(1.0, 3.0)
			.opacity(0.5)
			.dir(Direction::Backward)
			.transition(Duration::from_millis(10));
		assert!(!patch.is_empty());
		assert!(StylePatch::new().is_empty());
		let style = FlowStyle::default().merged(&patch).unwrap();
		assert_eq!(StylePatch::from(style), patch);
	}

	#[test]
	fn defaults_match_documented_options() {
		let style = FlowStyle::default();
		assert_eq!(style.color, "blue");
		assert_eq!(style.value, 0.2);
		assert_eq!(style.max_value, 1.0);
		assert_eq!((style.min_thickness, style.max_thickness), (1.0, 20.0));
		assert_eq!(style.opacity, 1.0);
		assert_eq!(style.dir, DirSetting::Auto);
		assert_eq!(style.transition, Duration::from_millis(750));
		assert!(style.validate().is_ok());
	}

	#[test]
	fn merge_only_touches_patched_fields() {
		let base = FlowStyle::default();
		let next = base
			.merged(&StylePatch::new().value(-0.5).color("#ff0000"))
			.unwrap();
		assert_eq!(next.value, -0.5);
		assert_eq!(next.color, "#ff0000");
		assert_eq!(next.max_thickness, base.max_thickness);
		assert_eq!(next.dir, base.dir);
		// base is untouched
		assert_eq!(base, FlowStyle::default());
	}

	#[test]
	fn empty_patch_is_identity() {
		let base = FlowStyle::default()
			.merged(&StylePatch::new().value(3.0).max_value(4.0))
			.unwrap();
		assert!(StylePatch::new().is_empty());
		assert_eq!(base.merged(&StylePatch::new()).unwrap(), base);
	}

	#[test]
	fn zero_max_value_is_rejected() {
		let err = FlowStyle::default()
			.merged(&StylePatch::new().max_value(0.0))
			.unwrap_err();
		assert!(matches!(err, FlowError::InvalidConfiguration { .. }));
	}

	#[test]
	fn out_of_range_options_are_rejected() {
		let base = FlowStyle::default();
		let bad = [
			StylePatch::new().value(f64::NAN),
			StylePatch::new().max_value(f64::INFINITY),
			StylePatch::new().thickness(5.0, 2.0),
			StylePatch::new().thickness(-1.0, 2.0),
			StylePatch::new().opacity(1.5),
			StylePatch::new().opacity(-0.1),
			StylePatch::new().color("  "),
		];
		for patch in bad {
			assert!(
				matches!(
					base.merged(&patch),
					Err(FlowError::InvalidConfiguration { .. })
				),
				"{patch:?}"
			);
		}
	}

	#[test]
	fn negative_max_value_is_accepted() {
		let style = FlowStyle::default()
			.merged(&StylePatch::new().max_value(-2.0))
			.unwrap();
		assert_eq!(style.max_value, -2.0);
	}

	#[test]
	fn dir_str_parses_or_rejects() {
		let patch = StylePatch::new().dir_str("-1").unwrap();
		assert_eq!(patch.dir, Some(DirSetting::Fixed(Direction::Backward)));
		assert!(matches!(
			StylePatch::new().dir_str("2"),
			Err(FlowError::InvalidDirection { .. })
		));
	}

	#[test]
	fn full_patch_reproduces_style() {
		let style = FlowStyle {
			color: "green".into(),
			value: -4.0,
			max_value: 8.0,
			min_thickness: 2.0,
			max_thickness: 12.0,
			opacity: 0.5,
			dir: DirSetting::Fixed(Direction::None),
			transition: Duration::ZERO,
		};
		let merged = FlowStyle::default()
			.merged(&StylePatch::from(style.clone()))
			.unwrap();
		assert_eq!(merged, style);
	}
}
