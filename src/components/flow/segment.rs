//! A directed, value-weighted segment between two map coordinates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::{debug, trace, warn};

use super::error::FlowResult;
use super::geometry::{self, FlowGeometry};
use super::style::{FlowStyle, StylePatch};
use super::transition::{self, ArrowPrimitive, LinePrimitive};
use super::types::{GeoCoordinate, ScreenPoint};

/// Token returned by [`MapHost::subscribe`].
///
/// Ids are unique across every host in the process, so one map can never
/// hold a token minted for another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
	/// Mints an id no host has handed out yet.
	pub fn fresh() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// The map a segment is drawn on: projection, view-change subscriptions and
/// a factory for the two rendering primitives.
pub trait MapHost {
	/// Line handle type.
	type Line: LinePrimitive;
	/// Arrow handle type.
	type Arrow: ArrowPrimitive;

	/// Projects a coordinate into layer pixels for the current view.
	fn project(&self, coord: GeoCoordinate) -> ScreenPoint;

	/// Registers interest in view changes (pan, zoom, resize). The id must
	/// come from [`SubscriptionId::fresh`].
	fn subscribe(&mut self) -> SubscriptionId;

	/// Drops a subscription. Unknown ids are ignored.
	fn unsubscribe(&mut self, id: SubscriptionId);

	/// Whether `id` is still registered.
	fn is_subscribed(&self, id: SubscriptionId) -> bool;

	/// Creates the line primitive for a newly attached segment.
	fn create_line(&mut self) -> Self::Line;

	/// Creates the arrow primitive for a newly attached segment.
	fn create_arrow(&mut self) -> Self::Arrow;
}

struct Attachment<H: MapHost> {
	line: H::Line,
	arrow: H::Arrow,
	subscription: SubscriptionId,
	start: ScreenPoint,
	end: ScreenPoint,
}

/// A flow between two fixed coordinates.
///
/// Starts detached. [`attach`](Self::attach) creates the primitives and shows
/// the flow immediately; view changes snap it to the new projection and
/// [`set_style`](Self::set_style) animates it to the new style.
pub struct FlowSegment<H: MapHost> {
	start: GeoCoordinate,
	end: GeoCoordinate,
	style: FlowStyle,
	attachment: Option<Attachment<H>>,
}

impl<H: MapHost> FlowSegment<H> {
	/// Creates a detached segment after validating `style`.
	pub fn new(start: GeoCoordinate, end: GeoCoordinate, style: FlowStyle) -> FlowResult<Self> {
		style.validate()?;
		Ok(Self {
			start,
			end,
			style,
			attachment: None,
		})
	}

	/// Creates a detached segment from the default style merged with `patch`.
	pub fn with_patch(
		start: GeoCoordinate,
		end: GeoCoordinate,
		patch: &StylePatch,
	) -> FlowResult<Self> {
		Self::new(start, end, FlowStyle::default().merged(patch)?)
	}

	/// The start coordinate.
	pub fn start(&self) -> GeoCoordinate {
		self.start
	}

	/// The end coordinate.
	pub fn end(&self) -> GeoCoordinate {
		self.end
	}

	/// The current style.
	pub fn style(&self) -> &FlowStyle {
		&self.style
	}

	/// Whether the segment is on a map.
	pub fn is_attached(&self) -> bool {
		self.attachment.is_some()
	}

	/// The subscription held while attached.
	pub fn subscription(&self) -> Option<SubscriptionId> {
		self.attachment.as_ref().map(|a| a.subscription)
	}

	/// Geometry for the last projection, or `None` when detached.
	pub fn geometry(&self) -> Option<FlowGeometry> {
		self.attachment
			.as_ref()
			.map(|a| geometry::resolve(a.start, a.end, &self.style))
	}

	/// Puts the segment on `host` and shows it without animation.
	///
	/// A segment already on `host` is detached from it first. To move a
	/// segment between maps, [`detach`](Self::detach) it from the old one
	/// before attaching; otherwise the old map keeps a subscription nobody
	/// answers.
	pub fn attach(&mut self, host: &mut H) {
		if let Some(previous) = self.subscription() {
			if host.is_subscribed(previous) {
				self.detach(host);
			} else {
				warn!("Re-attaching flow whose subscription {previous:?} is not held by this map");
				self.attachment = None;
			}
		}
		let subscription = host.subscribe();
		let mut attachment = Attachment {
			line: host.create_line(),
			arrow: host.create_arrow(),
			subscription,
			start: host.project(self.start),
			end: host.project(self.end),
		};
		debug!(
			"Attached flow {:?} -> {:?} ({subscription:?})",
			self.start, self.end
		);
		Self::render(&mut attachment, &self.style, Duration::ZERO);
		self.attachment = Some(attachment);
	}

	/// Removes the segment from `host`, releasing its primitives. No-op when
	/// already detached.
	pub fn detach(&mut self, host: &mut H) {
		if let Some(attachment) = self.attachment.take() {
			host.unsubscribe(attachment.subscription);
			debug!("Detached flow ({:?})", attachment.subscription);
		}
	}

	/// View-change handler: reprojects and snaps to the new position.
	pub fn on_view_change(&mut self, host: &H) {
		let Some(attachment) = self.attachment.as_mut() else {
			return;
		};
		if !host.is_subscribed(attachment.subscription) {
			return;
		}
		attachment.start = host.project(self.start);
		attachment.end = host.project(self.end);
		Self::render(attachment, &self.style, Duration::ZERO);
	}

	/// Merges `patch` into the style and animates over the resulting
	/// `transition`. The previous style is kept when the merge is rejected.
	pub fn set_style(&mut self, patch: &StylePatch) -> FlowResult<()> {
		let style = self.style.merged(patch)?;
		let duration = style.transition;
		self.replace_style(style, duration);
		Ok(())
	}

	/// Like [`set_style`](Self::set_style) with an explicit duration.
	pub fn set_style_with_duration(
		&mut self,
		patch: &StylePatch,
		duration: Duration,
	) -> FlowResult<()> {
		let style = self.style.merged(patch)?;
		self.replace_style(style, duration);
		Ok(())
	}

	fn replace_style(&mut self, style: FlowStyle, duration: Duration) {
		debug!("Flow style -> value {} (dir {})", style.value, style.dir);
		self.style = style;
		if let Some(attachment) = self.attachment.as_mut() {
			Self::render(attachment, &self.style, duration);
		}
	}

	fn render(attachment: &mut Attachment<H>, style: &FlowStyle, duration: Duration) {
		let geometry = geometry::resolve(attachment.start, attachment.end, style);
		trace!(
			"Flow {:?} -> {:?}, arrow {}",
			geometry.start,
			geometry.end,
			geometry.arrow.to_svg()
		);
		transition::apply(
			&mut attachment.line,
			&mut attachment.arrow,
			&geometry,
			style,
			duration,
		);
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::RefCell;
	use std::collections::BTreeSet;
	use std::rc::Rc;

	use approx::assert_relative_eq;

	use super::*;
	use crate::components::flow::error::FlowError;
	use crate::components::flow::transition::{ArrowTarget, LineTarget};
	use crate::components::flow::types::Direction;

	#[derive(Clone, Debug, PartialEq)]
	pub enum Call {
		Endpoints(ScreenPoint, ScreenPoint),
		Line(LineTarget, Duration),
		Anchor(ScreenPoint),
		Arrow(ArrowTarget, Duration),
	}

	pub type Log = Rc<RefCell<Vec<Call>>>;

	pub struct FakeLine(pub Log);
	pub struct FakeArrow(pub Log);

	impl LinePrimitive for FakeLine {
		fn set_endpoints(&mut self, start: ScreenPoint, end: ScreenPoint) {
			self.0.borrow_mut().push(Call::Endpoints(start, end));
		}
		fn animate(&mut self, target: LineTarget, duration: Duration) {
			self.0.borrow_mut().push(Call::Line(target, duration));
		}
	}

	impl ArrowPrimitive for FakeArrow {
		fn set_anchor(&mut self, anchor: ScreenPoint) {
			self.0.borrow_mut().push(Call::Anchor(anchor));
		}
		fn animate(&mut self, target: ArrowTarget, duration: Duration) {
			self.0.borrow_mut().push(Call::Arrow(target, duration));
		}
	}

	/// Projects (lat, lng) to (lng * scale, -lat * scale).
	pub struct FakeMap {
		pub scale: f64,
		pub log: Log,
		pub subscribers: BTreeSet<SubscriptionId>,
		pub created: usize,
	}

	impl FakeMap {
		pub fn new(scale: f64) -> Self {
			Self {
				scale,
				log: Log::default(),
				subscribers: BTreeSet::new(),
				created: 0,
			}
		}

		pub fn calls(&self) -> Vec<Call> {
			self.log.borrow().clone()
		}

		pub fn clear(&self) {
			self.log.borrow_mut().clear();
		}

		pub fn last_line(&self) -> Option<(LineTarget, Duration)> {
			self.log.borrow().iter().rev().find_map(|c| match c {
				Call::Line(t, d) => Some((t.clone(), *d)),
				_ => None,
			})
		}

		pub fn last_arrow(&self) -> Option<(ArrowTarget, Duration)> {
			self.log.borrow().iter().rev().find_map(|c| match c {
				Call::Arrow(t, d) => Some((t.clone(), *d)),
				_ => None,
			})
		}
	}

	impl MapHost for FakeMap {
		type Line = FakeLine;
		type Arrow = FakeArrow;

		fn project(&self, coord: GeoCoordinate) -> ScreenPoint {
			ScreenPoint::new(coord.lng * self.scale, -coord.lat * self.scale)
		}
		fn subscribe(&mut self) -> SubscriptionId {
			let id = SubscriptionId::fresh();
			self.subscribers.insert(id);
			id
		}
		fn unsubscribe(&mut self, id: SubscriptionId) {
			self.subscribers.remove(&id);
		}
		fn is_subscribed(&self, id: SubscriptionId) -> bool {
			self.subscribers.contains(&id)
		}
		fn create_line(&mut self) -> FakeLine {
			self.created += 1;
			FakeLine(self.log.clone())
		}
		fn create_arrow(&mut self) -> FakeArrow {
			self.created += 1;
			FakeArrow(self.log.clone())
		}
	}

	const PARIS: GeoCoordinate = GeoCoordinate::new(48.85, 2.35);
	const NORTH_OF_PARIS: GeoCoordinate = GeoCoordinate::new(48.87, 2.36);

	fn paris_flow() -> FlowSegment<FakeMap> {
		FlowSegment::with_patch(
			PARIS,
			NORTH_OF_PARIS,
			&StylePatch::new()
				.value(0.5)
				.max_value(1.0)
				.thickness(2.0, 10.0),
		)
		.unwrap()
	}

	#[test]
	fn attach_renders_immediately() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		assert!(map.calls().is_empty());

		flow.attach(&mut map);
		assert!(flow.is_attached());
		assert_eq!(map.subscribers.len(), 1);
		assert_eq!(map.created, 2);

		let (line, line_d) = map.last_line().unwrap();
		assert_eq!(line_d, Duration::ZERO);
		assert_relative_eq!(line.width, 6.0);
		assert_eq!(line.color, "blue");

		let (arrow, arrow_d) = map.last_arrow().unwrap();
		assert_eq!(arrow_d, Duration::ZERO);
		let extent = 0.35 * 6f64.powf(2.0 / 3.0);
		assert_relative_eq!(arrow.transform.scale_x, extent);
		assert_relative_eq!(arrow.transform.scale_y, extent);
	}

	#[test]
	fn paris_scenario_geometry() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);

		let g = flow.geometry().unwrap();
		assert_relative_eq!(g.weight, 6.0);
		assert_eq!(g.direction, Direction::Forward);
		// (2350, -48850) -> (2360, -48870): right and up on screen
		assert_relative_eq!(g.midpoint.x, 2355.0, epsilon = 1e-6);
		assert_relative_eq!(g.midpoint.y, -48860.0, epsilon = 1e-6);
		assert_relative_eq!(g.angle_degrees, (-20f64).atan2(10.0).to_degrees(), epsilon = 1e-6);
	}

	#[test]
	fn view_change_snaps_without_animation() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		map.clear();

		map.scale = 2000.0;
		flow.on_view_change(&map);
		let calls = map.calls();
		assert!(calls.contains(&Call::Endpoints(
			map.project(PARIS),
			map.project(NORTH_OF_PARIS)
		)));
		assert_eq!(map.last_line().unwrap().1, Duration::ZERO);
		assert_eq!(map.last_arrow().unwrap().1, Duration::ZERO);
	}

	#[test]
	fn set_style_animates_with_configured_transition() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		map.clear();

		flow.set_style(&StylePatch::new().value(-1.0).color("red"))
			.unwrap();
		let (line, d) = map.last_line().unwrap();
		assert_eq!(d, Duration::from_millis(750));
		assert_relative_eq!(line.width, 10.0);
		assert_eq!(line.color, "red");
		let (arrow, _) = map.last_arrow().unwrap();
		assert!(arrow.transform.scale_x < 0.0);
		assert_eq!(arrow.color, "red");

		flow.set_style(&StylePatch::new().transition(Duration::from_millis(200)))
			.unwrap();
		assert_eq!(map.last_line().unwrap().1, Duration::from_millis(200));
	}

	#[test]
	fn explicit_zero_duration_update() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		flow.set_style_with_duration(&StylePatch::new().opacity(0.3), Duration::ZERO)
			.unwrap();
		let (line, d) = map.last_line().unwrap();
		assert_eq!(d, Duration::ZERO);
		assert_eq!(line.opacity, 0.3);
	}

	#[test]
	fn unchanged_style_is_idempotent() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		flow.set_style(&StylePatch::new()).unwrap();
		let first = (map.last_line().unwrap().0, map.last_arrow().unwrap().0);
		let geometry = flow.geometry();

		let same = StylePatch::from(flow.style().clone());
		for _ in 0..5 {
			flow.set_style(&same).unwrap();
		}
		let again = (map.last_line().unwrap().0, map.last_arrow().unwrap().0);
		assert_eq!(first, again);
		assert_eq!(flow.geometry(), geometry);
	}

	#[test]
	fn zero_max_value_rejected_before_rendering() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		map.clear();

		let before = flow.style().clone();
		let err = flow
			.set_style(&StylePatch::new().max_value(0.0).value(3.0))
			.unwrap_err();
		assert!(matches!(err, FlowError::InvalidConfiguration { .. }));
		assert!(map.calls().is_empty());
		assert_eq!(flow.style(), &before);

		let built = FlowSegment::<FakeMap>::with_patch(
			PARIS,
			NORTH_OF_PARIS,
			&StylePatch::new().max_value(0.0),
		);
		assert!(matches!(built, Err(FlowError::InvalidConfiguration { .. })));
	}

	#[test]
	fn invalid_style_rejected_by_constructor() {
		let style = FlowStyle {
			opacity: 2.0,
			..FlowStyle::default()
		};
		assert!(FlowSegment::<FakeMap>::new(PARIS, NORTH_OF_PARIS, style).is_err());
	}

	#[test]
	fn detached_style_update_only_stores() {
		let map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.set_style(&StylePatch::new().value(0.1)).unwrap();
		assert_eq!(flow.style().value, 0.1);
		assert!(flow.geometry().is_none());
		assert!(map.calls().is_empty());
	}

	#[test]
	fn detach_is_idempotent() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		flow.detach(&mut map);
		assert!(!flow.is_attached());
		assert!(map.subscribers.is_empty());
		flow.detach(&mut map);
		assert!(!flow.is_attached());

		map.clear();
		flow.on_view_change(&map);
		assert!(map.calls().is_empty());
	}

	#[test]
	fn stale_subscription_ignores_view_changes() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		let sub = flow.subscription().unwrap();
		map.unsubscribe(sub);
		map.clear();
		flow.on_view_change(&map);
		assert!(map.calls().is_empty());
	}

	#[test]
	fn reattach_replaces_subscription() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = paris_flow();
		flow.attach(&mut map);
		let first = flow.subscription().unwrap();
		flow.attach(&mut map);
		let second = flow.subscription().unwrap();
		assert_ne!(first, second);
		assert_eq!(map.subscribers.len(), 1);
		assert!(map.is_subscribed(second));
	}

	#[test]
	fn moving_between_maps_leaves_other_flows_subscribed() {
		let (mut a, mut b) = (FakeMap::new(1000.0), FakeMap::new(1000.0));
		let (mut moved, mut resident) = (paris_flow(), paris_flow());
		moved.attach(&mut a);
		resident.attach(&mut b);
		assert_ne!(moved.subscription(), resident.subscription());

		moved.attach(&mut b);
		let kept = resident.subscription().unwrap();
		assert!(b.is_subscribed(kept));
		assert!(b.is_subscribed(moved.subscription().unwrap()));
		assert_eq!(b.subscribers.len(), 2);

		b.clear();
		b.scale = 2000.0;
		resident.on_view_change(&b);
		assert_eq!(b.last_line().unwrap().1, Duration::ZERO);
		assert!(b.calls().contains(&Call::Endpoints(
			b.project(PARIS),
			b.project(NORTH_OF_PARIS)
		)));
	}

	#[test]
	fn subscription_ids_are_unique_across_maps() {
		let (mut a, mut b) = (FakeMap::new(1.0), FakeMap::new(1.0));
		let (x, y) = (a.subscribe(), b.subscribe());
		assert_ne!(x, y);
		b.unsubscribe(x);
		assert!(b.is_subscribed(y));
		assert!(a.is_subscribed(x));
	}

	#[test]
	fn coincident_endpoints_render_finite_values() {
		let mut map = FakeMap::new(1000.0);
		let mut flow = FlowSegment::with_patch(PARIS, PARIS, &StylePatch::new()).unwrap();
		flow.attach(&mut map);
		let (arrow, _) = map.last_arrow().unwrap();
		assert_eq!(arrow.transform.scale_x, 0.0);
		assert_eq!(arrow.transform.scale_y, 0.0);
		assert!(arrow.transform.rotate.is_finite());
		assert!(map.last_line().unwrap().0.width.is_finite());
	}
}
