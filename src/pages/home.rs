use leptos::prelude::*;

use crate::components::flow::{FlowData, FlowLink, FlowMapCanvas, GeoCoordinate, Place, StylePatch};

const CITIES: &[(&str, f64, f64)] = &[
	("Paris", 48.8566, 2.3522),
	("Lille", 50.6292, 3.0573),
	("Lyon", 45.7640, 4.8357),
	("Marseille", 43.2965, 5.3698),
	("Bordeaux", 44.8378, -0.5792),
	("Nantes", 47.2184, -1.5536),
	("Strasbourg", 48.5734, 7.7521),
	("Toulouse", 43.6047, 1.4442),
	("Brussels", 50.8503, 4.3517),
	("Geneva", 46.2044, 6.1432),
];

/// Pairs of indices into `CITIES`.
const LINKS: &[(usize, usize)] = &[
	(1, 0),
	(8, 1),
	(0, 2),
	(2, 3),
	(2, 9),
	(0, 5),
	(5, 4),
	(4, 7),
	(7, 3),
	(6, 0),
	(6, 2),
];

const MAX_FLOW: f64 = 3000.0;

fn coord(i: usize) -> GeoCoordinate {
	let (_, lat, lng) = CITIES[i];
	GeoCoordinate::new(lat, lng)
}

/// Simple pseudo-random number generator (deterministic for consistency).
fn rand_simple(seed: usize) -> f64 {
	let x = ((seed + 1) * 9301 + 49297) % 233280;
	(x as f64) / 233280.0
}

/// Sample exchanges in MW; the sign says which way power flows.
fn generate_sample_data(round: usize) -> FlowData {
	let flows = LINKS
		.iter()
		.enumerate()
		.map(|(i, &(a, b))| {
			let r = rand_simple(round * LINKS.len() + i);
			let value = (r * 2.0 - 1.0) * MAX_FLOW;
			let color = if value.abs() > 0.75 * MAX_FLOW {
				"#d62728"
			} else {
				"#1f77b4"
			};
			FlowLink {
				start: coord(a),
				end: coord(b),
				style: StylePatch::new()
					.value(value)
					.max_value(MAX_FLOW)
					.thickness(2.0, 14.0)
					.color(color)
					.opacity(0.85),
			}
		})
		.collect();

	let places = CITIES
		.iter()
		.map(|&(name, lat, lng)| Place {
			name: name.into(),
			coord: GeoCoordinate::new(lat, lng),
		})
		.collect();

	FlowData { flows, places }
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let round = RwSignal::new(0usize);
	let graph_data = Signal::derive(move || generate_sample_data(round.get()));
	let selected = RwSignal::new(None::<usize>);
	let hovered = RwSignal::new(None::<usize>);

	let describe = move |i: usize| {
		let (a, b) = LINKS[i];
		let value = graph_data
			.with(|d| d.flows.get(i).and_then(|f| f.style.value))
			.unwrap_or(0.0);
		let (from, to) = if value < 0.0 { (b, a) } else { (a, b) };
		format!("{} to {}: {:.0} MW", CITIES[from].0, CITIES[to].0, value.abs())
	};

	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-map">
				<FlowMapCanvas
					data=graph_data
					fullscreen=true
					on_flow_click={move |i: usize| selected.set(Some(i))}
					on_flow_hover={move |h: Option<usize>| hovered.set(h)}
				/>
				<div class="map-overlay">
					<h1>"Power Flows"</h1>
					<p class="subtitle">"Drag to pan. Scroll to zoom. Click a flow."</p>
					<p class="selection">{move || hovered.get().or(selected.get()).map(describe)}</p>
					<button on:click=move |_| round.update(|r| *r += 1)>"Next hour"</button>
				</div>
			</div>
		</ErrorBoundary>
	}
}
