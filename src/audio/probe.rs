use bytes::Bytes;
use symphonia::core::{
    errors::Error,
    meta::{MetadataRevision, StandardTagKey},
};

use crate::audio::processor::{OpenedTrack, open_reader};

/// Metadata read from a container before playback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbedInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub duration_ms: u64,
}

/// Reads tags and duration. Falls back to summing packet durations when the
/// container does not declare a frame count, e.g. headerless MP3.
///
/// Walks the whole buffer in the worst case, so call it off the async runtime.
pub fn probe(data: Bytes) -> Result<ProbedInfo, Error> {
    let OpenedTrack {
        mut format,
        track_id,
        outer_tags,
        ..
    } = open_reader(data)?;
    let mut info = ProbedInfo::default();

    if let Some(revision) = format.metadata().current() {
        apply_tags(&mut info, revision);
    }
    if let Some(revision) = &outer_tags {
        apply_tags(&mut info, revision);
    }

    let Some(track) = format.tracks().iter().find(|t| t.id == track_id) else {
        return Ok(info);
    };
    let params = track.codec_params.clone();

    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            info.duration_ms = frames * 1000 / rate as u64;
            return Ok(info);
        }
    }

    let mut total_ts = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => total_ts += packet.dur,
            Ok(_) => {}
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(Error::ResetRequired) => break,
            Err(e) => return Err(e),
        }
    }

    info.duration_ms = match (params.time_base, params.sample_rate) {
        (Some(tb), _) => {
            let time = tb.calc_time(total_ts);
            time.seconds * 1000 + (time.frac * 1000.0) as u64
        }
        (None, Some(rate)) if rate > 0 => total_ts * 1000 / rate as u64,
        _ => 0,
    };
    Ok(info)
}

fn apply_tags(info: &mut ProbedInfo, revision: &MetadataRevision) {
    for tag in revision.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) if info.title.is_none() => {
                info.title = Some(tag.value.to_string());
            }
            Some(StandardTagKey::Artist) if info.author.is_none() => {
                info.author = Some(tag.value.to_string());
            }
            _ => {}
        }
    }
}
