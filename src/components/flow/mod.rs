//! Directed flow segments on a map: a line whose width encodes a value and a
//! midpoint arrow whose orientation encodes its direction.
//!
//! [`FlowSegment`] is host-agnostic. It talks to the map through [`MapHost`]
//! and to the drawn primitives through [`LinePrimitive`] and
//! [`ArrowPrimitive`]. [`FlowMapCanvas`] is a ready-made host on an HTML
//! canvas.

mod component;
mod error;
mod geometry;
mod layer;
mod render;
mod segment;
mod state;
mod style;
mod transition;
mod types;

pub use component::FlowMapCanvas;
pub use error::{FlowError, FlowResult};
pub use geometry::{ARROW_GLYPH, ArrowTransform, FlowGeometry, angle_degrees, resolve, weight};
pub use layer::{FlowId, FlowLayer};
pub use segment::{FlowSegment, MapHost, SubscriptionId};
pub use style::{DEFAULT_TRANSITION, FlowStyle, StylePatch};
pub use transition::{ArrowPrimitive, ArrowTarget, LinePrimitive, LineTarget, apply, targets};
pub use types::{DirSetting, Direction, FlowData, FlowLink, GeoCoordinate, Place, ScreenPoint};
