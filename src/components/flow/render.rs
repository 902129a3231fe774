use std::f64::consts::PI;

use web_sys::CanvasRenderingContext2d;

use super::geometry::ARROW_GLYPH;
use super::segment::MapHost;
use super::state::CanvasMap;

const BACKGROUND: &str = "#f4f1ea";
const PLACE_RADIUS: f64 = 3.5;

pub fn render(map: &CanvasMap, ctx: &CanvasRenderingContext2d) {
	ctx.set_global_alpha(1.0);
	ctx.set_fill_style_str(BACKGROUND);
	ctx.fill_rect(0.0, 0.0, map.width, map.height);
	draw_places(map, ctx);
	draw_lines(map, ctx);
	draw_arrows(map, ctx);
	ctx.set_global_alpha(1.0);
}

fn draw_places(map: &CanvasMap, ctx: &CanvasRenderingContext2d) {
	ctx.set_font("11px sans-serif");
	for place in &map.places {
		let p = map.project(place.coord);
		ctx.begin_path();
		let _ = ctx.arc(p.x, p.y, PLACE_RADIUS, 0.0, 2.0 * PI);
		ctx.set_fill_style_str("#555");
		ctx.fill();
		ctx.set_fill_style_str("#333");
		let _ = ctx.fill_text(&place.name, p.x + PLACE_RADIUS + 3.0, p.y - 3.0);
	}
}

fn draw_lines(map: &CanvasMap, ctx: &CanvasRenderingContext2d) {
	ctx.set_line_cap("round");
	map.visit_lines(|line| {
		let width = line.width.current();
		if width <= 0.0 || line.color.is_empty() {
			return;
		}
		ctx.set_global_alpha(line.opacity.current());
		ctx.set_stroke_style_str(&line.color);
		ctx.set_line_width(width);
		ctx.begin_path();
		ctx.move_to(line.start.x, line.start.y);
		ctx.line_to(line.end.x, line.end.y);
		ctx.stroke();
	});
}

fn draw_arrows(map: &CanvasMap, ctx: &CanvasRenderingContext2d) {
	map.visit_arrows(|arrow| {
		let t = arrow.transform.current();
		// zero scale means no visible tip
		if t.scale_x == 0.0 || t.scale_y == 0.0 || arrow.color.is_empty() {
			return;
		}
		ctx.save();
		ctx.set_global_alpha(arrow.opacity.current());
		ctx.set_fill_style_str(&arrow.color);
		let _ = ctx.translate(arrow.anchor.x, arrow.anchor.y);
		let _ = ctx.rotate(t.rotate.to_radians());
		let _ = ctx.scale(t.scale_x, t.scale_y);
		ctx.begin_path();
		let [first, rest @ ..] = ARROW_GLYPH;
		ctx.move_to(first.x, first.y);
		for p in rest {
			ctx.line_to(p.x, p.y);
		}
		ctx.close_path();
		ctx.fill();
		ctx.restore();
	});
}
