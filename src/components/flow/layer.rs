use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;

use super::error::FlowResult;
use super::segment::{FlowSegment, MapHost};
use super::style::StylePatch;

/// Handle to a segment inside a [`FlowLayer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(u64);

/// A map host together with the segments drawn on it.
///
/// Owns the dispatch of view changes: the host only records subscriptions,
/// and [`FlowLayer::view_changed`] forwards the notification to every
/// subscribed segment.
pub struct FlowLayer<H: MapHost> {
	host: H,
	segments: BTreeMap<FlowId, FlowSegment<H>>,
	next_id: u64,
}

impl<H: MapHost> FlowLayer<H> {
	/// Wraps `host` with no segments.
	pub fn new(host: H) -> Self {
		Self {
			host,
			segments: BTreeMap::new(),
			next_id: 0,
		}
	}

	/// Attaches `segment` to the host and keeps it.
	pub fn add(&mut self, mut segment: FlowSegment<H>) -> FlowId {
		segment.attach(&mut self.host);
		let id = FlowId(self.next_id);
		self.next_id += 1;
		self.segments.insert(id, segment);
		id
	}

	/// Detaches and returns the segment.
	pub fn remove(&mut self, id: FlowId) -> Option<FlowSegment<H>> {
		let mut segment = self.segments.remove(&id)?;
		segment.detach(&mut self.host);
		Some(segment)
	}

	/// Detaches every segment.
	pub fn clear(&mut self) {
		let ids: Vec<_> = self.segments.keys().copied().collect();
		for id in ids {
			self.remove(id);
		}
	}

	/// The segment behind `id`.
	pub fn get(&self, id: FlowId) -> Option<&FlowSegment<H>> {
		self.segments.get(&id)
	}

	/// Animated style update of one segment. Returns `Ok(false)` for an
	/// unknown id.
	pub fn set_style(&mut self, id: FlowId, patch: &StylePatch) -> FlowResult<bool> {
		match self.segments.get_mut(&id) {
			Some(segment) => segment.set_style(patch).map(|_| true),
			None => Ok(false),
		}
	}

	/// Style update with an explicit duration.
	pub fn set_style_with_duration(
		&mut self,
		id: FlowId,
		patch: &StylePatch,
		duration: Duration,
	) -> FlowResult<bool> {
		match self.segments.get_mut(&id) {
			Some(segment) => segment.set_style_with_duration(patch, duration).map(|_| true),
			None => Ok(false),
		}
	}

	/// Notifies subscribed segments that the projection changed.
	pub fn view_changed(&mut self) {
		for segment in self.segments.values_mut() {
			segment.on_view_change(&self.host);
		}
	}

	/// Segment ids in insertion order.
	pub fn ids(&self) -> impl Iterator<Item = FlowId> + '_ {
		self.segments.keys().copied()
	}

	/// Number of segments.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// True when the layer holds no segment.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// The underlying host.
	pub fn host(&self) -> &H {
		&self.host
	}

	/// Mutable host access, e.g. to change the view before [`Self::view_changed`].
	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}
}

impl<H: MapHost> Drop for FlowLayer<H> {
	fn drop(&mut self) {
		if !self.segments.is_empty() {
			debug!("Dropping flow layer with {} segments", self.segments.len());
		}
		self.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::flow::error::FlowError;
	use crate::components::flow::segment::tests::{Call, FakeMap};
	use crate::components::flow::types::GeoCoordinate;

	fn segment(lat: f64) -> FlowSegment<FakeMap> {
		FlowSegment::with_patch(
			GeoCoordinate::new(lat, 0.0),
			GeoCoordinate::new(lat, 1.0),
			&StylePatch::new(),
		)
		.unwrap()
	}

	#[test]
	fn add_attaches_and_remove_detaches() {
		let mut layer = FlowLayer::new(FakeMap::new(10.0));
		let a = layer.add(segment(0.0));
		let b = layer.add(segment(1.0));
		assert_eq!(layer.len(), 2);
		assert!(layer.get(a).unwrap().is_attached());
		assert_eq!(layer.host().subscribers.len(), 2);

		let removed = layer.remove(a).unwrap();
		assert!(!removed.is_attached());
		assert_eq!(layer.host().subscribers.len(), 1);
		assert!(layer.get(a).is_none());
		assert_eq!(layer.ids().collect::<Vec<_>>(), vec![b]);
		assert!(layer.remove(a).is_none());
	}

	#[test]
	fn view_change_reaches_every_segment() {
		let mut layer = FlowLayer::new(FakeMap::new(10.0));
		layer.add(segment(0.0));
		layer.add(segment(1.0));
		layer.host().clear();

		layer.host_mut().scale = 20.0;
		layer.view_changed();
		let endpoints = layer
			.host()
			.calls()
			.into_iter()
			.filter(|c| matches!(c, Call::Endpoints(..)))
			.count();
		assert_eq!(endpoints, 2);
	}

	#[test]
	fn set_style_by_id() {
		let mut layer = FlowLayer::new(FakeMap::new(10.0));
		let id = layer.add(segment(0.0));
		assert!(layer.set_style(id, &StylePatch::new().value(0.9)).unwrap());
		assert_eq!(layer.get(id).unwrap().style().value, 0.9);

		assert!(matches!(
			layer.set_style(id, &StylePatch::new().max_value(0.0)),
			Err(FlowError::InvalidConfiguration { .. })
		));
		let missing = FlowId(99);
		assert!(!layer.set_style(missing, &StylePatch::new()).unwrap());
		assert!(
			layer
				.set_style_with_duration(id, &StylePatch::new(), Duration::ZERO)
				.unwrap()
		);
	}

	#[test]
	fn clear_releases_everything() {
		let mut layer = FlowLayer::new(FakeMap::new(10.0));
		layer.add(segment(0.0));
		layer.add(segment(2.0));
		layer.clear();
		assert!(layer.is_empty());
		assert!(layer.host().subscribers.is_empty());
	}
}
