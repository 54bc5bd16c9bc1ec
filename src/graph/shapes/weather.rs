//! Weather composite panel
//!
//! Rounded card with an optional provider icon and a column of readings.
//! Each piece may carry an absolute layout box (panel-local or screen-space,
//! auto-translated); pieces without a box flow top-down with margin-based
//! alignment.

use super::circle::circle_clip;
use super::rectangle::rectangle_clip;
use crate::graph::color::{esc_path, esc_text, ff_color, font_opt};
use crate::graph::{enable_window, GraphBuilder};
use crate::timeline::{HorizontalAlign, LayoutBox, VerticalAlign, WeatherTrack};

/// Resolved panel-local box in whole pixels.
type PanelBox = (i64, i64, i64, i64);

/// Horizontal anchor expression for a flowed piece.
fn anchor_x(expr_w: &str, panel_w: i64, margin: i64, align: HorizontalAlign) -> String {
    match align {
        HorizontalAlign::Center => format!("({panel_w}-{expr_w})/2"),
        HorizontalAlign::Right => format!("{panel_w}-{expr_w}-{margin}"),
        HorizontalAlign::Left => format!("{margin}"),
    }
}

/// Accept a panel-local or screen-space layout box; translate screen-space
/// ones by the track position. Boxes that still fall outside the panel are
/// discarded and the piece falls back to flow layout.
fn local_box(
    layout: &std::collections::HashMap<String, LayoutBox>,
    key: &str,
    panel_w: i64,
    panel_h: i64,
    track_x: i64,
    track_y: i64,
) -> Option<PanelBox> {
    let b = layout.get(key)?;
    if b.width <= 0.0 || b.height <= 0.0 {
        return None;
    }
    let mut bx = b.x;
    let mut by = b.y;
    if bx >= panel_w as f64 || by >= panel_h as f64 {
        bx -= track_x as f64;
        by -= track_y as f64;
    }
    if bx < 0.0 || by < 0.0 || bx + b.width > panel_w as f64 || by + b.height > panel_h as f64 {
        return None;
    }
    Some((
        bx.round() as i64,
        by.round() as i64,
        b.width.round() as i64,
        b.height.round() as i64,
    ))
}

/// drawtext position expressions centering the text inside a box.
fn center_exprs(b: PanelBox) -> (String, String) {
    let (bx, by, bw, bh) = b;
    (
        format!("{bx} + ( {bw} - text_w )/2"),
        format!("{by} + ( {bh} - text_h )/2"),
    )
}

struct TextPiece<'a> {
    text: &'a str,
    size: i64,
    color: &'a str,
    box_key: &'a str,
    default_y_top: i64,
    label: &'a str,
}

pub(crate) fn emit_weather(g: &mut GraphBuilder, t: &WeatherTrack) {
    let x = t.x.round() as i64;
    let y = t.y.round() as i64;
    let w = (t.width.round() as i64).max(1);
    let h = (t.height.round() as i64).max(1);
    let enable = enable_window(t.timing.start, t.timing.end);
    let fps = g.fps();
    let hf = h as f64;

    let cols = &t.colors;
    let col_bg = cols.background.as_deref().filter(|c| !c.is_empty());
    let col_txt = cols.text.as_deref().unwrap_or("#000000");
    let col_high = cols.highlight.as_deref().unwrap_or(col_txt);
    let col_icon_bg = cols.icon_bg.as_deref().unwrap_or("#DDDDDD");
    let col_attr = cols.attribution.as_deref().unwrap_or("#666666");
    let col_border = cols.border.as_deref().filter(|c| !c.is_empty());

    let fsz = |configured: Option<u32>, fraction: f64, cap: f64, floor: i64| -> i64 {
        configured
            .map(|v| v as f64)
            .unwrap_or((hf * fraction).min(cap))
            .round()
            .max(floor as f64) as i64
    };
    let fs = &t.font_sizes;
    let fs_location = fsz(fs.location, 0.18, 64.0, 10);
    let fs_summary = fsz(fs.summary, 0.14, 48.0, 10);
    let fs_date = fsz(fs.date, 0.12, 36.0, 8);
    let fs_attr = fsz(fs.attribution, 0.10, 28.0, 8);
    let fs_temp = fsz(fs.temperature, 0.22, 72.0, 10);
    let fs_maxt = fsz(fs.max_temp, 0.14, 48.0, 10);
    let fs_mint = fsz(fs.min_temp, 0.14, 48.0, 10);
    let fs_hum = fsz(fs.humidity, 0.14, 44.0, 10);
    let fs_wspd = fsz(fs.wind_speed, 0.14, 44.0, 10);
    let fs_wdir = fsz(fs.wind_direction, 0.14, 44.0, 10);

    let icon_size = t
        .icon_size
        .map(|v| v as f64)
        .unwrap_or((hf * 0.35).min(120.0))
        .round()
        .max(1.0) as i64;

    let sc = &t.show_components;
    let h_align = t.horizontal_align;
    let v_align = t.vertical_align;
    let data = &t.data;

    let margin = ((hf * 0.08).round() as i64).max(6);
    let radius = ((w.min(h)) as f64 * 0.08).round() as i64;
    let font = font_opt(t.font_path.as_deref(), t.font_family.as_deref());

    // Transparent panel canvas.
    let n = g.vcount();
    let base = format!("wx_base_{n}");
    g.add(format!("color=c=black@0:s={w}x{h}:r={fps},format=rgba[{base}]"));
    let mut vo = format!("[v{n}_wx_0]");
    g.add(format!("[{base}]copy{vo}"));
    g.bump();

    // Rounded background.
    if let Some(bg) = col_bg {
        let n = g.vcount();
        let label = format!("wx_bg_{n}");
        g.add(rectangle_clip(&label, w, h, Some(bg), 1.0, fps, radius, 0, false));
        let out = format!("[v{n}_wx_bg]");
        g.add(format!("{vo}[{label}]overlay=0:0{out}"));
        vo = out;
        g.bump();
    }

    // Border frame.
    if let Some(border) = col_border {
        let n = g.vcount();
        let label = format!("wx_bo_{n}");
        g.add(rectangle_clip(&label, w, h, Some(border), 1.0, fps, radius, 1, true));
        let out = format!("[v{n}_wx_bo]");
        g.add(format!("{vo}[{label}]overlay=0:0{out}"));
        vo = out;
        g.bump();
    }

    // Icon: provider image when available, else a colored circle.
    if sc.icon {
        let icon_box = local_box(&t.layout, "icon", w, h, x, y);
        let image_url = t
            .image
            .as_ref()
            .and_then(|i| i.url.as_deref())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| {
                data.icon
                    .as_deref()
                    .filter(|c| !c.is_empty())
                    .map(|code| format!("https://openweathermap.org/img/wn/{code}@2x.png"))
            });

        if let Some(url) = image_url {
            let n = g.vcount();
            let label = format!("wx_im_{n}");
            g.add(format!(
                "movie='{}',scale={icon_size}:{icon_size}[{label}]",
                esc_path(&url)
            ));
            let (ix, iy) = match icon_box {
                Some((bx, by, bw, bh)) => (bx + (bw - icon_size) / 2, by + (bh - icon_size) / 2),
                None => (margin, margin),
            };
            let out = format!("[v{n}_wx_icon]");
            g.add(format!("{vo}[{label}]overlay={ix}:{iy}{out}"));
            vo = out;
            g.bump();
        } else {
            let r = (icon_size / 2).max(1);
            let d = r * 2;
            let n = g.vcount();
            let label = format!("wx_icon_{n}");
            g.add(circle_clip(&label, d, r, Some(col_icon_bg), 1.0, fps));
            let (ix, iy) = match icon_box {
                Some((bx, by, bw, bh)) => (bx + (bw - d) / 2, by + (bh - d) / 2),
                None => {
                    let iy = match v_align {
                        VerticalAlign::Middle => (h - d) / 2,
                        VerticalAlign::Bottom => h - d - margin,
                        VerticalAlign::Top => margin,
                    };
                    (margin, iy)
                }
            };
            let out = format!("[v{n}_wx_icon]");
            g.add(format!("{vo}[{label}]overlay={ix}:{iy}{out}"));
            vo = out;
            g.bump();
        }
    }

    // Flowed pieces advance this cursor when they have no layout box.
    let mut y_cursor = margin;

    let draw = |g: &mut GraphBuilder, vo: &str, piece: TextPiece<'_>| -> String {
        let txt = esc_text(piece.text);
        let n = g.vcount();
        let out = format!("[{}_{n}]", piece.label);
        let (x_expr, y_expr) = match local_box(&t.layout, piece.box_key, w, h, x, y) {
            Some(b) => center_exprs(b),
            None => (
                anchor_x("text_w", w, margin, h_align),
                format!("{}", piece.default_y_top),
            ),
        };
        g.add(format!(
            "{vo}drawtext={font}:text='{txt}':fontsize={}:fontcolor={}:x={x_expr}:y={y_expr}{out}",
            piece.size,
            ff_color(Some(piece.color), None)
        ));
        g.bump();
        out
    };

    let loc_text = t
        .location
        .as_deref()
        .or(t.name.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();
    if sc.location && !loc_text.is_empty() {
        vo = draw(
            g,
            &vo,
            TextPiece {
                text: &loc_text,
                size: fs_location,
                color: col_high,
                box_key: "location",
                default_y_top: y_cursor,
                label: "wx_loc",
            },
        );
        y_cursor += fs_location + (margin as f64 * 0.5) as i64;
    }

    let summary_text = data.summary.as_deref().unwrap_or("").trim().to_string();
    if sc.summary && !summary_text.is_empty() {
        vo = draw(
            g,
            &vo,
            TextPiece {
                text: &summary_text,
                size: fs_summary,
                color: col_txt,
                box_key: "summary",
                default_y_top: y_cursor,
                label: "wx_sum",
            },
        );
        y_cursor += fs_summary + (margin as f64 * 0.4) as i64;
    }

    if sc.temperature {
        if let Some(temp) = data.temperature {
            let color = cols.temperature.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("{}°", temp.round() as i64),
                    size: fs_temp,
                    color,
                    box_key: "temperature",
                    default_y_top: y_cursor,
                    label: "wx_temp",
                },
            );
            y_cursor += fs_temp + (margin as f64 * 0.3) as i64;
        }
    }

    if sc.max_temp {
        if let Some(v) = data.max_temp {
            let color = cols.max_temp.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("H: {}°", v.round() as i64),
                    size: fs_maxt,
                    color,
                    box_key: "maxTemp",
                    default_y_top: y_cursor,
                    label: "wx_maxt",
                },
            );
            y_cursor += fs_maxt + (margin as f64 * 0.2) as i64;
        }
    }

    if sc.min_temp {
        if let Some(v) = data.min_temp {
            let color = cols.min_temp.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("L: {}°", v.round() as i64),
                    size: fs_mint,
                    color,
                    box_key: "minTemp",
                    default_y_top: y_cursor,
                    label: "wx_mint",
                },
            );
            y_cursor += fs_mint + (margin as f64 * 0.2) as i64;
        }
    }

    if sc.humidity {
        if let Some(v) = data.humidity {
            let color = cols.humidity.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("Humidity: {}%", v.round() as i64),
                    size: fs_hum,
                    color,
                    box_key: "humidity",
                    default_y_top: y_cursor,
                    label: "wx_hum",
                },
            );
            y_cursor += fs_hum + (margin as f64 * 0.2) as i64;
        }
    }

    if sc.wind_speed {
        if let Some(v) = data.wind_speed {
            let color = cols.wind_speed.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("Wind: {}", v),
                    size: fs_wspd,
                    color,
                    box_key: "windSpeed",
                    default_y_top: y_cursor,
                    label: "wx_wspd",
                },
            );
            y_cursor += fs_wspd + (margin as f64 * 0.2) as i64;
        }
    }

    if sc.wind_direction {
        if let Some(v) = data.wind_direction.as_deref().filter(|v| !v.is_empty()) {
            let color = cols.wind_direction.as_deref().unwrap_or(col_txt);
            vo = draw(
                g,
                &vo,
                TextPiece {
                    text: &format!("Direction: {}", v),
                    size: fs_wdir,
                    color,
                    box_key: "windDirection",
                    default_y_top: y_cursor,
                    label: "wx_wdir",
                },
            );
            y_cursor += fs_wdir + (margin as f64 * 0.2) as i64;
        }
    }

    // Date: explicit text or a per-frame local-time clock.
    if sc.date {
        let color = cols.date.as_deref().unwrap_or(col_txt);
        let n = g.vcount();
        let out = format!("[v{n}_wx_date]");
        let (x_expr, y_expr) = match local_box(&t.layout, "date", w, h, x, y) {
            Some(b) => center_exprs(b),
            None => (
                anchor_x("text_w", w, margin, h_align),
                format!("{}", y_cursor),
            ),
        };
        let text = match data.date_text.as_deref().filter(|d| !d.is_empty()) {
            Some(date_text) => esc_text(date_text),
            None => "%{localtime\\:%Y-%m-%d %H\\:%M}".to_string(),
        };
        g.add(format!(
            "{vo}drawtext={font}:text='{text}':fontsize={fs_date}:fontcolor={}:x={x_expr}:y={y_expr}{out}",
            ff_color(Some(color), None)
        ));
        vo = out;
        g.bump();
        y_cursor += fs_date + (margin as f64 * 0.3) as i64;
    }
    let _ = y_cursor;

    // Attribution pinned to the bottom unless a box says otherwise.
    if sc.attribution {
        let attr_text = data
            .attribution_text
            .as_deref()
            .or(t.name.as_deref())
            .unwrap_or("Weather")
            .trim()
            .to_string();
        let attr_text = if attr_text.is_empty() {
            "Weather".to_string()
        } else {
            attr_text
        };
        let n = g.vcount();
        let out = format!("[v{n}_wx_attr]");
        let (x_expr, y_expr) = match local_box(&t.layout, "attribution", w, h, x, y) {
            Some(b) => center_exprs(b),
            None => (format!("{margin}"), format!("{}", h - fs_attr - margin)),
        };
        g.add(format!(
            "{vo}drawtext={font}:text='{}':fontsize={fs_attr}:fontcolor={}:x={x_expr}:y={y_expr}{out}",
            esc_text(&attr_text),
            ff_color(Some(col_attr), None)
        ));
        vo = out;
        g.bump();
    }

    // Panel opacity, then composite onto the main chain.
    let opacity = t.opacity.clamp(0.0, 1.0);
    let n = g.vcount();
    let alpha_out = format!("[v{n}_wx_alpha]");
    g.add(format!(
        "{vo}format=rgba,colorchannelmixer=aa={opacity:.3}{alpha_out}"
    ));
    vo = alpha_out;
    g.bump();

    let n = g.vcount();
    let out = format!("[v{n}_wx_out]");
    g.add(format!("{}{vo}overlay={x}:{y}:{enable}{out}", g.last()));
    g.set_last(out);
    g.bump();
}
