//! Audio mix stage
//!
//! Collected taps are mixed into a single `[aout]` pad. A lone tap maps
//! straight through without an amix node.

/// Build the mix filters for the collected taps.
///
/// Returns the extra filter statements and the final audio label to map.
pub(crate) fn mix_filters(taps: &[String]) -> (Vec<String>, String) {
    match taps.len() {
        0 => (
            vec!["anullsrc=channel_layout=stereo:sample_rate=48000[aout]".to_string()],
            "[aout]".to_string(),
        ),
        1 => (Vec::new(), taps[0].clone()),
        n => (
            vec![format!(
                "{}amix=inputs={}:normalize=1[aout]",
                taps.concat(),
                n
            )],
            "[aout]".to_string(),
        ),
    }
}
