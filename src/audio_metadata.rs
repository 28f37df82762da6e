use std::io::Cursor;
use symphonia::core::{
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use tracing::debug;

/// Best-effort duration extraction from uploaded audio bytes.
///
/// Probes the container with symphonia and reads the frame count and time
/// base off the default track. Any probe or metadata failure yields None;
/// the track then keeps its placeholder duration and nothing downstream
/// treats that as an error.
pub fn extract_duration_seconds(data: &[u8], extension: &str) -> Option<i64> {
    let cursor = Cursor::new(data.to_vec());
    let media_source = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(extension);

    let probed = match symphonia::default::get_probe().format(
        &hint,
        media_source,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(probed) => probed,
        Err(e) => {
            debug!("Failed to probe audio format: {}", e);
            return None;
        }
    };

    let track = probed.format.default_track()?;
    let params = &track.codec_params;

    let n_frames = params.n_frames?;
    let time_base = params.time_base?;

    let time = time_base.calc_time(n_frames);
    let seconds = time.seconds as i64;

    debug!("Extracted audio duration: {}s", seconds);
    Some(seconds)
}
