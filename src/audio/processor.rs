//! Decode loop turning an in-memory container into 48 kHz stereo PCM blocks.

use std::io::Cursor;

use bytes::Bytes;
use flume::{Receiver, Sender};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions},
    errors::Error,
    formats::{FormatOptions, FormatReader, SeekMode, SeekTo},
    io::MediaSourceStream,
    meta::{MetadataOptions, MetadataRevision},
    units::Time,
};
use tracing::{debug, warn};

use crate::audio::{
    constants::TARGET_SAMPLE_RATE,
    format::AudioFormat,
    resample::{LinearResampler, linear::to_stereo},
};

#[derive(Debug, Clone, PartialEq)]
pub enum DecoderCommand {
    /// Seek to the given position in milliseconds.
    Seek(u64),
    Stop,
}

/// What the decoder thread sends to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBlock {
    /// Interleaved 48 kHz stereo samples.
    Pcm(Vec<i16>),
    /// Everything sent before this predates the last `Seek`.
    Flushed,
    /// The track ran out. The decoder keeps waiting for a `Seek` or `Stop`.
    EndOfStream,
}

#[derive(Debug, PartialEq)]
enum CommandOutcome {
    Continue,
    Stop,
}

#[derive(Debug, PartialEq)]
enum DecodeEnd {
    EndOfStream,
    Stopped,
}

/// A probed container positioned at its first audio track.
pub(crate) struct OpenedTrack {
    pub format: Box<dyn FormatReader>,
    pub decoder: Box<dyn Decoder>,
    pub track_id: u32,
    /// Tags found outside the container itself, e.g. ID3v2 on MP3.
    pub outer_tags: Option<MetadataRevision>,
}

/// Opens a format reader and decoder for the first audio track in `data`.
pub(crate) fn open_reader(data: Bytes) -> Result<OpenedTrack, Error> {
    let hint = AudioFormat::detect(&data[..data.len().min(16)]).hint();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let mut probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions {
            enable_gapless: true,
            ..Default::default()
        },
        &MetadataOptions::default(),
    )?;

    let outer_tags = probed
        .metadata
        .get()
        .and_then(|m| m.current().cloned());

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(Error::Unsupported("no audio track"))?;
    let track_id = track.id;
    let decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    Ok(OpenedTrack {
        format,
        decoder,
        track_id,
        outer_tags,
    })
}

/// Owns one decode session. Runs on its own thread; exits when the stream
/// receives `Stop` or when the consuming side hangs up. Reaching the end of
/// the track only parks it until the next command.
pub struct AudioProcessor {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    resampler: Option<LinearResampler>,
    sample_buf: Option<SampleBuffer<i16>>,
    pcm_tx: Sender<DecodedBlock>,
    cmd_rx: Receiver<DecoderCommand>,
}

impl AudioProcessor {
    pub fn new(
        data: Bytes,
        pcm_tx: Sender<DecodedBlock>,
        cmd_rx: Receiver<DecoderCommand>,
    ) -> Result<Self, Error> {
        let OpenedTrack {
            format,
            decoder,
            track_id,
            ..
        } = open_reader(data)?;
        Ok(Self {
            format,
            decoder,
            track_id,
            resampler: None,
            sample_buf: None,
            pcm_tx,
            cmd_rx,
        })
    }

    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            if self.decode_until_end()? == DecodeEnd::Stopped {
                debug!("decoder stopped");
                return Ok(());
            }

            debug!("decoder reached end of stream");
            if self.pcm_tx.send(DecodedBlock::EndOfStream).is_err() {
                return Ok(());
            }

            match self.cmd_rx.recv() {
                Ok(DecoderCommand::Seek(ms)) => self.seek(ms),
                Ok(DecoderCommand::Stop) | Err(_) => {
                    debug!("decoder stopped");
                    return Ok(());
                }
            }
        }
    }

    fn decode_until_end(&mut self) -> Result<DecodeEnd, Error> {
        loop {
            if self.check_commands() == CommandOutcome::Stop {
                return Ok(DecodeEnd::Stopped);
            }

            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(DecodeEnd::EndOfStream);
                }
                Err(e) => return Err(e),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::DecodeError(e)) => {
                    warn!("skipping undecodable packet: {e}");
                    continue;
                }
                Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(DecodeEnd::EndOfStream);
                }
                Err(e) => return Err(e),
            };

            let spec = *decoded.spec();
            let mut buf = self
                .sample_buf
                .take()
                .filter(|b| b.capacity() >= decoded.capacity() * spec.channels.count())
                .unwrap_or_else(|| SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
            buf.copy_interleaved_ref(decoded);

            let stereo = to_stereo(buf.samples(), spec.channels.count());
            self.sample_buf = Some(buf);
            if stereo.is_empty() {
                continue;
            }

            let resampler = self
                .resampler
                .get_or_insert_with(|| LinearResampler::new(spec.rate, TARGET_SAMPLE_RATE, 2));
            let block = if resampler.is_passthrough() {
                stereo
            } else {
                let mut out = Vec::with_capacity(stereo.len() * 2);
                resampler.process(&stereo, &mut out);
                out
            };

            if !block.is_empty() && self.pcm_tx.send(DecodedBlock::Pcm(block)).is_err() {
                return Ok(DecodeEnd::Stopped);
            }
        }
    }

    fn check_commands(&mut self) -> CommandOutcome {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(DecoderCommand::Seek(ms)) => self.seek(ms),
                Ok(DecoderCommand::Stop) | Err(flume::TryRecvError::Disconnected) => {
                    return CommandOutcome::Stop;
                }
                Err(flume::TryRecvError::Empty) => return CommandOutcome::Continue,
            }
        }
    }

    fn seek(&mut self, ms: u64) {
        let target = SeekTo::Time {
            time: Time::from(ms as f64 / 1000.0),
            track_id: Some(self.track_id),
        };
        match self.format.seek(SeekMode::Coarse, target) {
            Ok(_) => {
                self.decoder.reset();
                if let Some(resampler) = self.resampler.as_mut() {
                    resampler.reset();
                }
            }
            Err(e) => warn!("seek to {}ms failed: {}", ms, e),
        }
        let _ = self.pcm_tx.send(DecodedBlock::Flushed);
    }
}
