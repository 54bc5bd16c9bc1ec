//! Base canvas and background image filters

use super::color::ff_color;
use super::GraphBuilder;
use crate::timeline::BackgroundFit;

/// Solid color base the whole frame composites onto.
pub(crate) fn emit_base(g: &mut GraphBuilder, width: u32, height: u32, bg_color: Option<&str>) {
    let color = ff_color(Some(bg_color.unwrap_or("#000000")), None);
    let fps = g.fps();
    g.add(format!("color=c={color}:s={width}x{height}:r={fps}[base]"));
    g.set_last("[base]".to_string());
}

/// Optional background image, scaled per the fit mode and blended by opacity.
pub(crate) fn emit_background_image(
    g: &mut GraphBuilder,
    input_idx: usize,
    width: u32,
    height: u32,
    fit: BackgroundFit,
    opacity: f64,
) {
    let vin = format!("[{input_idx}:v]");
    let tmp = "[bgscaled]";
    let alpha = opacity.clamp(0.0, 1.0);

    match fit {
        BackgroundFit::Cover => g.add(format!(
            "{vin}scale={width}:{height}:force_original_aspect_ratio=increase,\
             crop={width}:{height},format=rgba,colorchannelmixer=aa={alpha}{tmp}"
        )),
        BackgroundFit::Contain => g.add(format!(
            "{vin}scale={width}:{height}:force_original_aspect_ratio=decrease,\
             format=rgba,colorchannelmixer=aa={alpha}{tmp}"
        )),
        BackgroundFit::Stretch => g.add(format!(
            "{vin}scale={width}:{height},format=rgba,colorchannelmixer=aa={alpha}{tmp}"
        )),
    }

    let out = "[vbg]";
    g.add(format!("{}{tmp}overlay=0:0{out}", g.last()));
    g.set_last(out.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphOptions;

    fn builder() -> GraphBuilder {
        GraphBuilder::new_for_tests(30, GraphOptions::default())
    }

    #[test]
    fn test_base_color() {
        let mut g = builder();
        emit_base(&mut g, 320, 240, Some("#112233"));
        assert_eq!(g.filters_for_tests(), &["color=c=0x112233:s=320x240:r=30[base]"]);
        assert_eq!(g.last(), "[base]");
    }

    #[test]
    fn test_base_defaults_to_black() {
        let mut g = builder();
        emit_base(&mut g, 320, 240, None);
        assert!(g.filters_for_tests()[0].starts_with("color=c=0x000000"));
    }

    #[test]
    fn test_cover_scales_then_crops() {
        let mut g = builder();
        emit_base(&mut g, 320, 240, None);
        emit_background_image(&mut g, 0, 320, 240, BackgroundFit::Cover, 0.8);
        let filters = g.filters_for_tests();
        assert!(filters[1].contains("force_original_aspect_ratio=increase"));
        assert!(filters[1].contains("crop=320:240"));
        assert!(filters[1].contains("colorchannelmixer=aa=0.8"));
        assert_eq!(filters[2], "[base][bgscaled]overlay=0:0[vbg]");
        assert_eq!(g.last(), "[vbg]");
    }

    #[test]
    fn test_contain_keeps_aspect_without_crop() {
        let mut g = builder();
        emit_base(&mut g, 320, 240, None);
        emit_background_image(&mut g, 0, 320, 240, BackgroundFit::Contain, 1.0);
        let filters = g.filters_for_tests();
        assert!(filters[1].contains("force_original_aspect_ratio=decrease"));
        assert!(!filters[1].contains("crop="));
    }

    #[test]
    fn test_stretch_scales_exactly() {
        let mut g = builder();
        emit_base(&mut g, 320, 240, None);
        emit_background_image(&mut g, 0, 320, 240, BackgroundFit::Stretch, 1.0);
        let filters = g.filters_for_tests();
        assert!(filters[1].starts_with("[0:v]scale=320:240,format=rgba"));
    }
}
