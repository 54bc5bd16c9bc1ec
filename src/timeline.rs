//! Timeline data model and validation
//!
//! The timeline is the declarative input describing the output frame by
//! frame: a canvas plus z-ordered tracks. Tracks are a tagged sum; each
//! variant carries exactly the fields that track type understands, with
//! optional fields normalized to defaults during deserialization. Validation
//! happens once here; everything downstream (localizer, graph assembler,
//! dispatcher) consumes the typed value and never re-checks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RenderError, Result};

/// Smallest accepted canvas edge in pixels.
pub const MIN_CANVAS_DIM: u32 = 16;

fn default_fps() -> u32 {
    30
}

fn default_one() -> f64 {
    1.0
}

fn default_font_size() -> u32 {
    48
}

fn default_padding() -> u32 {
    6
}

/// How a background image is fitted onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundFit {
    #[default]
    Cover,
    Contain,
    Stretch,
}

/// Timeline root: canvas, timing, background, and the track list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Total duration in seconds; 0 means "one frame minimum" at render time.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
    #[serde(default = "default_one")]
    pub background_opacity: f64,
    #[serde(default)]
    pub background_fit: BackgroundFit,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Timing and ordering fields shared by every track variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackTiming {
    pub id: String,
    /// Seconds into the timeline this track becomes visible/audible.
    pub start: f64,
    /// Seconds into the timeline this track stops contributing.
    pub end: f64,
    /// Rendering order within a phase; lower first, ties keep input order.
    pub z: i32,
}

/// Placement on the canvas for media tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
}

/// Text styling shared by text and datetime tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub bg_color: Option<String>,
    #[serde(default = "default_padding")]
    pub padding: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    #[serde(flatten)]
    pub place: Placement,
    pub src: String,
    #[serde(default = "default_one")]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub src_in: Option<f64>,
    #[serde(default)]
    pub src_out: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub src: String,
    #[serde(default = "default_one")]
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub src_in: Option<f64>,
    #[serde(default)]
    pub src_out: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    #[serde(flatten)]
    pub place: Placement,
    pub src: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    #[serde(flatten)]
    pub style: TextStyle,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTimeTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    #[serde(flatten)]
    pub style: TextStyle,
    pub x: f64,
    pub y: f64,
    /// Render a live clock instead of the literal text.
    #[serde(default)]
    pub is_live: bool,
    /// Evaluate the clock in UTC rather than server-local time.
    #[serde(default)]
    pub use_utc: bool,
    /// strftime-style format for the live clock.
    #[serde(default)]
    pub ff_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    /// Center X in canvas pixels.
    pub x: f64,
    /// Center Y in canvas pixels.
    pub y: f64,
    pub radius: f64,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub outline_width: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

/// Which way a triangle points inside its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriangleDirection {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriangleTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub direction: TriangleDirection,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub outline_width: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectangleTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub border_radius: f64,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub outline_width: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    /// Start anchor X; the line extends from here.
    pub x: f64,
    /// Start anchor Y.
    pub y: f64,
    pub length: f64,
    pub thickness: f64,
    /// Degrees, clockwise.
    pub rotation: f64,
    pub color: String,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EllipseTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub outline: Option<String>,
    #[serde(default)]
    pub outline_width: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
}

/// Togglable pieces of a sign panel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignComponents {
    #[serde(default)]
    pub text: bool,
    #[serde(default)]
    pub icon: bool,
    #[serde(default)]
    pub arrow: bool,
    #[serde(default)]
    pub symbol: bool,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub border: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignColors {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub arrow: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SignFontSizes {
    #[serde(default)]
    pub text: Option<u32>,
    #[serde(default)]
    pub symbol: Option<u32>,
}

/// Optional image settings on composite panels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelImage {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub border_radius: Option<u32>,
    #[serde(default)]
    pub border_width: Option<u32>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub symbol_type: Option<String>,
    #[serde(default)]
    pub custom_symbol: Option<String>,
    #[serde(default)]
    pub show_components: SignComponents,
    #[serde(default)]
    pub colors: SignColors,
    #[serde(default)]
    pub font_sizes: SignFontSizes,
    #[serde(default)]
    pub icon_size: Option<u32>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default)]
    pub image: Option<PanelImage>,
}

fn default_true() -> bool {
    true
}

/// Togglable pieces of a weather panel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherComponents {
    #[serde(default = "default_true")]
    pub location: bool,
    #[serde(default)]
    pub summary: bool,
    #[serde(default)]
    pub temperature: bool,
    #[serde(default)]
    pub max_temp: bool,
    #[serde(default)]
    pub min_temp: bool,
    #[serde(default)]
    pub humidity: bool,
    #[serde(default)]
    pub wind_speed: bool,
    #[serde(default)]
    pub wind_direction: bool,
    #[serde(default)]
    pub icon: bool,
    #[serde(default)]
    pub date: bool,
    #[serde(default)]
    pub attribution: bool,
}

impl Default for WeatherComponents {
    fn default() -> Self {
        Self {
            location: true,
            summary: false,
            temperature: false,
            max_temp: false,
            min_temp: false,
            humidity: false,
            wind_speed: false,
            wind_direction: false,
            icon: false,
            date: false,
            attribution: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherColors {
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub border: Option<String>,
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub max_temp: Option<String>,
    #[serde(default)]
    pub min_temp: Option<String>,
    #[serde(default)]
    pub humidity: Option<String>,
    #[serde(default)]
    pub wind_speed: Option<String>,
    #[serde(default)]
    pub wind_direction: Option<String>,
    #[serde(default)]
    pub icon_bg: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherFontSizes {
    #[serde(default)]
    pub location: Option<u32>,
    #[serde(default)]
    pub summary: Option<u32>,
    #[serde(default)]
    pub temperature: Option<u32>,
    #[serde(default)]
    pub max_temp: Option<u32>,
    #[serde(default)]
    pub min_temp: Option<u32>,
    #[serde(default)]
    pub humidity: Option<u32>,
    #[serde(default)]
    pub wind_speed: Option<u32>,
    #[serde(default)]
    pub wind_direction: Option<u32>,
    #[serde(default)]
    pub date: Option<u32>,
    #[serde(default)]
    pub attribution: Option<u32>,
}

/// Absolute box assigned to one weather piece, panel-local or screen-space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayoutBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Weather readings supplied by the client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherData {
    #[serde(default)]
    pub summary: Option<String>,
    /// Provider icon code, e.g. "01d".
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_temp: Option<f64>,
    #[serde(default)]
    pub min_temp: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<String>,
    #[serde(default)]
    pub date_text: Option<String>,
    #[serde(default)]
    pub attribution_text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlign {
    #[default]
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherTrack {
    #[serde(flatten)]
    pub timing: TrackTiming,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub horizontal_align: HorizontalAlign,
    #[serde(default)]
    pub vertical_align: VerticalAlign,
    #[serde(default)]
    pub show_components: WeatherComponents,
    #[serde(default)]
    pub colors: WeatherColors,
    #[serde(default)]
    pub font_sizes: WeatherFontSizes,
    #[serde(default)]
    pub icon_size: Option<u32>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_path: Option<String>,
    #[serde(default)]
    pub image: Option<PanelImage>,
    #[serde(default)]
    pub layout: HashMap<String, LayoutBox>,
    #[serde(default)]
    pub data: WeatherData,
}

/// A timed, z-ordered layer within a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Track {
    Video(VideoTrack),
    Audio(AudioTrack),
    Image(ImageTrack),
    Text(TextTrack),
    Datetime(DateTimeTrack),
    Circle(CircleTrack),
    Triangle(TriangleTrack),
    Rectangle(RectangleTrack),
    Line(LineTrack),
    Ellipse(EllipseTrack),
    Sign(SignTrack),
    Weather(WeatherTrack),
}

impl Track {
    /// Timing fields common to every variant.
    pub fn timing(&self) -> &TrackTiming {
        match self {
            Track::Video(t) => &t.timing,
            Track::Audio(t) => &t.timing,
            Track::Image(t) => &t.timing,
            Track::Text(t) => &t.timing,
            Track::Datetime(t) => &t.timing,
            Track::Circle(t) => &t.timing,
            Track::Triangle(t) => &t.timing,
            Track::Rectangle(t) => &t.timing,
            Track::Line(t) => &t.timing,
            Track::Ellipse(t) => &t.timing,
            Track::Sign(t) => &t.timing,
            Track::Weather(t) => &t.timing,
        }
    }

    /// Whether this variant consumes an engine input slot.
    pub fn is_media(&self) -> bool {
        matches!(self, Track::Video(_) | Track::Audio(_) | Track::Image(_))
    }

    /// Source reference for media tracks.
    pub fn src(&self) -> Option<&str> {
        match self {
            Track::Video(t) => Some(&t.src),
            Track::Audio(t) => Some(&t.src),
            Track::Image(t) => Some(&t.src),
            _ => None,
        }
    }
}

impl Timeline {
    /// Deserialize a timeline from JSON, mapping serde errors into the
    /// validation taxonomy (unknown track `type` included).
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| RenderError::Validation(e.to_string()))
    }

    /// Duration used for input looping and `-t`: at least one frame.
    pub fn positive_duration(&self) -> f64 {
        if self.duration > 0.0 {
            self.duration
        } else {
            self.one_frame_duration()
        }
    }

    /// Shortest representable duration at this frame rate.
    pub fn one_frame_duration(&self) -> f64 {
        (1.0 / self.fps.max(1) as f64).max(0.0334)
    }

    /// Tracks sorted by `z` ascending; the sort is stable so equal `z`
    /// keeps submission order.
    pub fn tracks_by_z(&self) -> Vec<&Track> {
        let mut sorted: Vec<&Track> = self.tracks.iter().collect();
        sorted.sort_by_key(|t| t.timing().z);
        sorted
    }

    /// Check every invariant the graph assembler relies on.
    pub fn validate(&self) -> Result<()> {
        if self.width < MIN_CANVAS_DIM || self.height < MIN_CANVAS_DIM {
            return Err(RenderError::Validation(format!(
                "canvas must be at least {MIN_CANVAS_DIM}x{MIN_CANVAS_DIM}, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(RenderError::Validation("fps must be positive".into()));
        }
        if self.duration < 0.0 {
            return Err(RenderError::Validation(
                "duration must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.background_opacity) {
            return Err(RenderError::Validation(
                "backgroundOpacity must be within 0..1".into(),
            ));
        }

        for track in &self.tracks {
            self.validate_track(track)?;
        }
        Ok(())
    }

    fn validate_track(&self, track: &Track) -> Result<()> {
        let timing = track.timing();
        let id = timing.id.as_str();
        if timing.start < 0.0 || timing.end < 0.0 {
            return Err(RenderError::field(id, "times must be non-negative"));
        }
        if timing.end < timing.start {
            return Err(RenderError::field(id, "end must be >= start"));
        }
        if self.duration > 0.0 && (timing.start > self.duration || timing.end > self.duration) {
            return Err(RenderError::field(
                id,
                format!("exceeds timeline duration ({}s)", self.duration),
            ));
        }

        match track {
            Track::Video(t) => {
                validate_media_size(id, t.place.w, t.place.h)?;
                validate_volume(id, t.volume)?;
                validate_trim(id, t.src_in, t.src_out)?;
            }
            Track::Audio(t) => {
                validate_volume(id, t.volume)?;
                validate_trim(id, t.src_in, t.src_out)?;
            }
            Track::Image(t) => validate_media_size(id, t.place.w, t.place.h)?,
            Track::Text(_) | Track::Datetime(_) => {}
            Track::Circle(t) => {
                if t.radius < 0.5 {
                    return Err(RenderError::field(id, "radius must be >= 0.5"));
                }
                validate_opacity(id, t.opacity)?;
            }
            Track::Triangle(t) => {
                validate_shape_size(id, t.width, t.height)?;
                validate_opacity(id, t.opacity)?;
            }
            Track::Rectangle(t) => {
                validate_shape_size(id, t.width, t.height)?;
                if t.border_radius < 0.0 {
                    return Err(RenderError::field(id, "borderRadius must be >= 0"));
                }
                validate_opacity(id, t.opacity)?;
            }
            Track::Line(t) => {
                if t.length < 1.0 {
                    return Err(RenderError::field(id, "length must be >= 1"));
                }
                if t.thickness < 1.0 {
                    return Err(RenderError::field(id, "thickness must be >= 1"));
                }
                validate_opacity(id, t.opacity)?;
            }
            Track::Ellipse(t) => {
                validate_shape_size(id, t.width, t.height)?;
                validate_opacity(id, t.opacity)?;
            }
            Track::Sign(t) => {
                validate_shape_size(id, t.width, t.height)?;
                validate_opacity(id, t.opacity)?;
            }
            Track::Weather(t) => {
                validate_shape_size(id, t.width, t.height)?;
                validate_opacity(id, t.opacity)?;
                for (key, bx) in &t.layout {
                    if bx.width < 1.0 || bx.height < 1.0 {
                        return Err(RenderError::field(
                            id,
                            format!("layout box '{}' must have positive size", key),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn validate_media_size(id: &str, w: f64, h: f64) -> Result<()> {
    if w <= 0.0 || h <= 0.0 {
        return Err(RenderError::field(id, "media size must be positive"));
    }
    Ok(())
}

fn validate_shape_size(id: &str, w: f64, h: f64) -> Result<()> {
    if w < 1.0 || h < 1.0 {
        return Err(RenderError::field(id, "width and height must be >= 1"));
    }
    Ok(())
}

fn validate_volume(id: &str, volume: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&volume) {
        return Err(RenderError::field(id, "volume must be within 0..1"));
    }
    Ok(())
}

fn validate_opacity(id: &str, opacity: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&opacity) {
        return Err(RenderError::field(id, "opacity must be within 0..1"));
    }
    Ok(())
}

fn validate_trim(id: &str, src_in: Option<f64>, src_out: Option<f64>) -> Result<()> {
    if let Some(si) = src_in {
        if si < 0.0 {
            return Err(RenderError::field(id, "srcIn must be >= 0"));
        }
    }
    if let Some(so) = src_out {
        if so < 0.0 {
            return Err(RenderError::field(id, "srcOut must be >= 0"));
        }
    }
    if let (Some(si), Some(so)) = (src_in, src_out) {
        if so <= si {
            return Err(RenderError::field(id, "srcOut must be > srcIn"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(tracks: serde_json::Value) -> serde_json::Value {
        json!({
            "width": 320,
            "height": 240,
            "fps": 30,
            "duration": 2.0,
            "tracks": tracks,
        })
    }

    #[test]
    fn test_defaults_applied() {
        let tl = Timeline::from_json(json!({"width": 320, "height": 240})).unwrap();
        assert_eq!(tl.fps, 30);
        assert_eq!(tl.duration, 0.0);
        assert_eq!(tl.background_opacity, 1.0);
        assert_eq!(tl.background_fit, BackgroundFit::Cover);
        assert!(tl.tracks.is_empty());
        tl.validate().unwrap();
    }

    #[test]
    fn test_unknown_track_type_rejected() {
        let err = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "hologram", "start": 0, "end": 1, "z": 0}
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("hologram") || err.to_string().contains("unknown"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "text", "start": 0, "end": 1, "z": 0,
             "x": 10, "y": 20, "text": "hi", "futureField": true}
        ])))
        .unwrap();
        assert_eq!(tl.tracks.len(), 1);
        tl.validate().unwrap();
    }

    #[test]
    fn test_text_track_defaults() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "text", "start": 0, "end": 1, "z": 0,
             "x": 40, "y": 100, "text": "hello", "color": "#ff0000"}
        ])))
        .unwrap();
        match &tl.tracks[0] {
            Track::Text(t) => {
                assert_eq!(t.style.font_size, 48);
                assert_eq!(t.style.padding, 6);
                assert_eq!(t.style.text.as_deref(), Some("hello"));
            }
            other => panic!("expected text track, got {:?}", other),
        }
    }

    #[test]
    fn test_end_before_start_rejected() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "text", "start": 1.0, "end": 0.5, "z": 0, "x": 0, "y": 0}
        ])))
        .unwrap();
        let err = tl.validate().unwrap_err();
        assert!(err.to_string().contains("end must be >= start"));
    }

    #[test]
    fn test_track_beyond_duration_rejected() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "text", "start": 0.0, "end": 3.5, "z": 0, "x": 0, "y": 0}
        ])))
        .unwrap();
        let err = tl.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds timeline duration"));
    }

    #[test]
    fn test_zero_duration_allows_any_window() {
        let mut tl = Timeline::from_json(minimal(json!([
            {"id": "t1", "type": "text", "start": 0.0, "end": 99.0, "z": 0, "x": 0, "y": 0}
        ])))
        .unwrap();
        tl.duration = 0.0;
        tl.validate().unwrap();
    }

    #[test]
    fn test_small_canvas_rejected() {
        let tl = Timeline::from_json(json!({"width": 8, "height": 240})).unwrap();
        assert!(tl.validate().is_err());
    }

    #[test]
    fn test_video_needs_positive_size() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "v1", "type": "video", "start": 0, "end": 1, "z": 0,
             "src": "a.mp4", "x": 0, "y": 0, "w": 0, "h": 100}
        ])))
        .unwrap();
        assert!(tl.validate().is_err());
    }

    #[test]
    fn test_video_trim_window_must_be_forward() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "v1", "type": "video", "start": 0, "end": 1, "z": 0,
             "src": "a.mp4", "x": 0, "y": 0, "w": 10, "h": 10,
             "srcIn": 3.0, "srcOut": 1.0}
        ])))
        .unwrap();
        let err = tl.validate().unwrap_err();
        assert!(err.to_string().contains("srcOut must be > srcIn"));
    }

    #[test]
    fn test_tracks_by_z_is_stable() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "a", "type": "text", "start": 0, "end": 1, "z": 1, "x": 0, "y": 0},
            {"id": "b", "type": "text", "start": 0, "end": 1, "z": 0, "x": 0, "y": 0},
            {"id": "c", "type": "text", "start": 0, "end": 1, "z": 1, "x": 0, "y": 0}
        ])))
        .unwrap();
        let order: Vec<&str> = tl
            .tracks_by_z()
            .iter()
            .map(|t| t.timing().id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_positive_duration_floor() {
        let mut tl = Timeline::from_json(json!({"width": 320, "height": 240})).unwrap();
        assert!(tl.positive_duration() >= 0.0334);
        tl.duration = 2.5;
        assert_eq!(tl.positive_duration(), 2.5);
        tl.duration = 0.0;
        tl.fps = 10;
        assert_eq!(tl.positive_duration(), 0.1);
    }

    #[test]
    fn test_weather_track_parses() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "w1", "type": "weather", "start": 0, "end": 1, "z": 0,
             "x": 10, "y": 10, "width": 300, "height": 200,
             "showComponents": {"temperature": true, "icon": true},
             "data": {"temperature": 21.4, "icon": "01d"},
             "layout": {"icon": {"x": 4, "y": 4, "width": 64, "height": 64}}}
        ])))
        .unwrap();
        match &tl.tracks[0] {
            Track::Weather(w) => {
                assert!(w.show_components.temperature);
                assert!(w.show_components.location);
                assert_eq!(w.data.temperature, Some(21.4));
                assert!(w.layout.contains_key("icon"));
            }
            other => panic!("expected weather track, got {:?}", other),
        }
        tl.validate().unwrap();
    }

    #[test]
    fn test_sign_track_parses() {
        let tl = Timeline::from_json(minimal(json!([
            {"id": "s1", "type": "sign", "start": 0, "end": 1, "z": 2,
             "x": 50, "y": 60, "width": 200, "height": 100, "rotation": 15.0,
             "text": "STOP", "symbolType": "copyright",
             "showComponents": {"background": true, "text": true},
             "colors": {"background": "#ffcc00", "text": "#000000"}}
        ])))
        .unwrap();
        match &tl.tracks[0] {
            Track::Sign(s) => {
                assert!(s.show_components.background);
                assert_eq!(s.rotation, 15.0);
                assert_eq!(s.symbol_type.as_deref(), Some("copyright"));
            }
            other => panic!("expected sign track, got {:?}", other),
        }
    }
}
