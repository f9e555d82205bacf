use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_probe;

/// Longest we wait for a container probe before calling the duration unknown.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Whole seconds of `path`, probed off the caller's thread.
pub fn probe_duration(path: &Path, timeout: Duration) -> Option<u32> {
    let owned = path.to_path_buf();
    let result = run_with_timeout(timeout, move || duration_seconds(&owned));
    if result.is_none() {
        log::debug!("duration of {} is unknown", path.display());
    }
    result
}

pub(crate) fn run_with_timeout<F>(timeout: Duration, job: F) -> Option<u32>
where
    F: FnOnce() -> Option<u32> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(String::from("duration-probe"))
        .spawn(move || {
            let _ = tx.send(job());
        });
    if let Err(err) = spawned {
        log::warn!("failed to start duration probe: {err}");
        return None;
    }

    match rx.recv_timeout(timeout) {
        Ok(seconds) => seconds,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("duration probe timed out after {timeout:?}");
            None
        }
        Err(RecvTimeoutError::Disconnected) => None,
    }
}

/// Blocking symphonia probe of the default track's length.
pub fn duration_seconds(path: &Path) -> Option<u32> {
    let file = File::open(path).ok()?;
    let source = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(OsStr::to_str) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    probed
        .format
        .default_track()
        .and_then(|track| codec_duration_seconds(&track.codec_params))
}

fn codec_duration_seconds(codec_params: &CodecParameters) -> Option<u32> {
    if let (Some(time_base), Some(frame_count)) = (codec_params.time_base, codec_params.n_frames) {
        let time = time_base.calc_time(frame_count);
        let mut seconds = time.seconds as u32;
        if time.frac >= 0.5 {
            seconds = seconds.saturating_add(1);
        }
        return Some(seconds);
    }

    if let Some((frame_count, sample_rate)) = codec_params
        .n_frames
        .zip(codec_params.sample_rate)
        .filter(|(_, sample_rate)| *sample_rate > 0)
    {
        let seconds = ((frame_count as f64) / (sample_rate as f64)).round();
        return Some(seconds.clamp(0.0, u32::MAX as f64) as u32);
    }

    None
}
