use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::time::Duration;

use log::{info, warn};

use super::geometry::ArrowTransform;
use super::layer::{FlowId, FlowLayer};
use super::segment::{FlowSegment, MapHost, SubscriptionId};
use super::style::{FlowStyle, StylePatch};
use super::transition::{ArrowPrimitive, ArrowTarget, LinePrimitive, LineTarget, Tween};
use super::types::{FlowData, FlowLink, GeoCoordinate, Place, ScreenPoint};

pub const MIN_ZOOM: f64 = 5.0;
pub const MAX_ZOOM: f64 = 2000.0;
const INITIAL_ZOOM: f64 = 60.0;
/// Extra pixels around a line that still count as hitting it.
pub const HIT_SLOP: f64 = 4.0;
/// A press that moves further than this is a pan, not a click.
const CLICK_TOLERANCE: f64 = 3.0;

/// Pixels per degree, and the screen position of (0, 0).
#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
	pub moved: bool,
}

#[derive(Clone, Debug)]
pub struct LineState {
	pub start: ScreenPoint,
	pub end: ScreenPoint,
	pub width: Tween<f64>,
	pub opacity: Tween<f64>,
	pub color: String,
}

#[derive(Clone, Debug)]
pub struct ArrowState {
	pub anchor: ScreenPoint,
	pub transform: Tween<ArrowTransform>,
	pub opacity: Tween<f64>,
	pub color: String,
}

impl LineState {
	fn tick(&mut self, dt: f64) -> bool {
		let width = self.width.tick(dt);
		let opacity = self.opacity.tick(dt);
		width || opacity
	}
}

impl ArrowState {
	fn tick(&mut self, dt: f64) -> bool {
		let transform = self.transform.tick(dt);
		let opacity = self.opacity.tick(dt);
		transform || opacity
	}
}

/// Line handle. Dropping it removes the line from the canvas.
pub struct CanvasLine(Rc<RefCell<LineState>>);

/// Arrow handle. Dropping it removes the arrow from the canvas.
pub struct CanvasArrow(Rc<RefCell<ArrowState>>);

impl LinePrimitive for CanvasLine {
	fn set_endpoints(&mut self, start: ScreenPoint, end: ScreenPoint) {
		let mut line = self.0.borrow_mut();
		line.start = start;
		line.end = end;
	}

	fn animate(&mut self, target: LineTarget, duration: Duration) {
		let mut line = self.0.borrow_mut();
		line.width.retarget(target.width, duration);
		line.opacity.retarget(target.opacity, duration);
		line.color = target.color;
	}
}

impl ArrowPrimitive for CanvasArrow {
	fn set_anchor(&mut self, anchor: ScreenPoint) {
		self.0.borrow_mut().anchor = anchor;
	}

	fn animate(&mut self, target: ArrowTarget, duration: Duration) {
		let mut arrow = self.0.borrow_mut();
		arrow.transform.retarget(target.transform, duration);
		arrow.opacity.retarget(target.opacity, duration);
		arrow.color = target.color;
	}
}

/// Canvas-backed map: a linear lng/lat view plus the live primitives.
pub struct CanvasMap {
	pub transform: ViewTransform,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	pub places: Vec<Place>,
	subscribers: BTreeSet<SubscriptionId>,
	lines: Vec<Weak<RefCell<LineState>>>,
	arrows: Vec<Weak<RefCell<ArrowState>>>,
}

impl CanvasMap {
	/// A view of `width` x `height` pixels centred on `center`.
	pub fn new(center: GeoCoordinate, width: f64, height: f64) -> Self {
		Self {
			transform: ViewTransform {
				x: width / 2.0 - center.lng * INITIAL_ZOOM,
				y: height / 2.0 + center.lat * INITIAL_ZOOM,
				k: INITIAL_ZOOM,
			},
			pan: PanState::default(),
			width,
			height,
			places: Vec::new(),
			subscribers: BTreeSet::new(),
			lines: Vec::new(),
			arrows: Vec::new(),
		}
	}

	pub fn screen_to_geo(&self, sx: f64, sy: f64) -> GeoCoordinate {
		GeoCoordinate::new(
			(self.transform.y - sy) / self.transform.k,
			(sx - self.transform.x) / self.transform.k,
		)
	}

	/// Advances every transition. Returns true while any is still running.
	pub fn tick(&mut self, dt: f64) -> bool {
		self.lines.retain(|w| w.strong_count() > 0);
		self.arrows.retain(|w| w.strong_count() > 0);
		let mut running = false;
		for line in self.lines.iter().filter_map(Weak::upgrade) {
			running |= line.borrow_mut().tick(dt);
		}
		for arrow in self.arrows.iter().filter_map(Weak::upgrade) {
			running |= arrow.borrow_mut().tick(dt);
		}
		running
	}

	pub fn visit_lines(&self, mut f: impl FnMut(&LineState)) {
		for line in self.lines.iter().filter_map(Weak::upgrade) {
			f(&line.borrow());
		}
	}

	pub fn visit_arrows(&self, mut f: impl FnMut(&ArrowState)) {
		for arrow in self.arrows.iter().filter_map(Weak::upgrade) {
			f(&arrow.borrow());
		}
	}

	pub fn live_primitives(&self) -> usize {
		self.lines.iter().filter(|w| w.strong_count() > 0).count()
			+ self.arrows.iter().filter(|w| w.strong_count() > 0).count()
	}
}

impl MapHost for CanvasMap {
	type Line = CanvasLine;
	type Arrow = CanvasArrow;

	fn project(&self, coord: GeoCoordinate) -> ScreenPoint {
		ScreenPoint::new(
			self.transform.x + coord.lng * self.transform.k,
			self.transform.y - coord.lat * self.transform.k,
		)
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

	fn create_line(&mut self) -> CanvasLine {
		let line = Rc::new(RefCell::new(LineState {
			start: ScreenPoint::default(),
			end: ScreenPoint::default(),
			width: Tween::settled(0.0),
			opacity: Tween::settled(0.0),
			color: String::new(),
		}));
		self.lines.push(Rc::downgrade(&line));
		CanvasLine(line)
	}

	fn create_arrow(&mut self) -> CanvasArrow {
		let arrow = Rc::new(RefCell::new(ArrowState {
			anchor: ScreenPoint::default(),
			transform: Tween::settled(ArrowTransform::default()),
			opacity: Tween::settled(0.0),
			color: String::new(),
		}));
		self.arrows.push(Rc::downgrade(&arrow));
		CanvasArrow(arrow)
	}
}

/// Everything the flow map component mutates between frames.
pub struct FlowMapState {
	pub layer: FlowLayer<CanvasMap>,
	links: Vec<(FlowLink, Option<FlowId>)>,
	hovered: Option<usize>,
}

impl FlowMapState {
	pub fn new(data: &FlowData, width: f64, height: f64) -> Self {
		let mut map = CanvasMap::new(center_of(data), width, height);
		map.places = data.places.clone();
		let mut state = Self {
			layer: FlowLayer::new(map),
			links: Vec::new(),
			hovered: None,
		};
		state.rebuild(data);
		state
	}

	/// Brings the layer in line with `data`. Style-only changes animate;
	/// any change of endpoints rebuilds the segments.
	pub fn sync(&mut self, data: &FlowData) {
		self.layer.host_mut().places = data.places.clone();
		let same_endpoints = self.links.len() == data.flows.len()
			&& self
				.links
				.iter()
				.zip(&data.flows)
				.all(|((old, _), new)| old.start == new.start && old.end == new.end);
		if !same_endpoints {
			self.rebuild(data);
			return;
		}

		// a rejected link that became valid has to be drawn in its own slot
		let revived = self.links.iter().zip(&data.flows).any(|((old, id), new)| {
			id.is_none()
				&& old.style != new.style
				&& FlowStyle::default().merged(&new.style).is_ok()
		});
		if revived {
			self.rebuild(data);
			return;
		}

		for ((old, id), new) in self.links.iter_mut().zip(&data.flows) {
			if old.style == new.style {
				continue;
			}
			let Some(existing) = *id else {
				*old = new.clone();
				continue;
			};
			// the incoming patch is relative to the defaults, not the last patch
			match self.layer.set_style(existing, &restate(&new.style)) {
				Ok(_) => *old = new.clone(),
				Err(e) => warn!("Ignoring style update for {:?} -> {:?}: {e}", new.start, new.end),
			}
		}
	}

	fn rebuild(&mut self, data: &FlowData) {
		self.layer.clear();
		self.links = data
			.flows
			.iter()
			.map(|link| {
				let id = match FlowSegment::with_patch(link.start, link.end, &link.style) {
					Ok(segment) => Some(self.layer.add(segment)),
					Err(e) => {
						warn!("Skipping flow {:?} -> {:?}: {e}", link.start, link.end);
						None
					}
				};
				(link.clone(), id)
			})
			.collect();
		info!(
			"Flow layer holds {} segments ({} primitives)",
			self.layer.len(),
			self.layer.host().live_primitives()
		);
	}

	pub fn map(&self) -> &CanvasMap {
		self.layer.host()
	}

	/// Index into `FlowData::flows` of the topmost flow under (x, y).
	pub fn flow_at(&self, x: f64, y: f64) -> Option<usize> {
		let p = ScreenPoint::new(x, y);
		// later flows are drawn on top
		self.links.iter().enumerate().rev().find_map(|(i, (_, id))| {
			let geometry = self.layer.get((*id)?)?.geometry()?;
			geometry.hit(p, HIT_SLOP).then_some(i)
		})
	}

	pub fn hovered(&self) -> Option<usize> {
		self.hovered
	}

	/// Returns true when the hovered flow changed.
	pub fn set_hover(&mut self, flow: Option<usize>) -> bool {
		if self.hovered == flow {
			return false;
		}
		self.hovered = flow;
		true
	}

	/// Whether the last press moved far enough to count as a pan.
	pub fn was_dragged(&self) -> bool {
		self.map().pan.moved
	}

	pub fn tick(&mut self, dt: f64) -> bool {
		self.layer.host_mut().tick(dt)
	}

	pub fn begin_pan(&mut self, x: f64, y: f64) {
		let map = self.layer.host_mut();
		map.pan = PanState {
			active: true,
			start_x: x,
			start_y: y,
			transform_start_x: map.transform.x,
			transform_start_y: map.transform.y,
			moved: false,
		};
	}

	pub fn pan_to(&mut self, x: f64, y: f64) {
		let map = self.layer.host_mut();
		if !map.pan.active {
			return;
		}
		let (dx, dy) = (x - map.pan.start_x, y - map.pan.start_y);
		map.pan.moved |= dx.hypot(dy) > CLICK_TOLERANCE;
		map.transform.x = map.pan.transform_start_x + dx;
		map.transform.y = map.pan.transform_start_y + dy;
		self.layer.view_changed();
	}

	pub fn end_pan(&mut self) {
		self.layer.host_mut().pan.active = false;
	}

	/// Zooms by `factor` keeping the point under (x, y) fixed.
	pub fn zoom_at(&mut self, x: f64, y: f64, factor: f64) {
		let map = self.layer.host_mut();
		let under = map.screen_to_geo(x, y);
		let k = (map.transform.k * factor).clamp(MIN_ZOOM, MAX_ZOOM);
		map.transform = ViewTransform {
			x: x - under.lng * k,
			y: y + under.lat * k,
			k,
		};
		self.layer.view_changed();
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		let map = self.layer.host_mut();
		map.width = width;
		map.height = height;
		self.layer.view_changed();
	}
}

/// A patch that sets every field `patch` leaves unset back to its default.
fn restate(patch: &StylePatch) -> StylePatch {
	let defaults = StylePatch::from(FlowStyle::default());
	StylePatch {
		color: patch.color.clone().or(defaults.color),
		value: patch.value.or(defaults.value),
		max_value: patch.max_value.or(defaults.max_value),
		min_thickness: patch.min_thickness.or(defaults.min_thickness),
		max_thickness: patch.max_thickness.or(defaults.max_thickness),
		opacity: patch.opacity.or(defaults.opacity),
		dir: patch.dir.or(defaults.dir),
		transition: patch.transition.or(defaults.transition),
	}
}

fn center_of(data: &FlowData) -> GeoCoordinate {
	let coords: Vec<_> = data
		.flows
		.iter()
		.flat_map(|l| [l.start, l.end])
		.chain(data.places.iter().map(|p| p.coord))
		.collect();
	if coords.is_empty() {
		return GeoCoordinate::new(0.0, 0.0);
	}
	let n = coords.len() as f64;
	GeoCoordinate::new(
		coords.iter().map(|c| c.lat).sum::<f64>() / n,
		coords.iter().map(|c| c.lng).sum::<f64>() / n,
	)
}
