use bytes::Bytes;
use flume::{Receiver, Sender, TryRecvError};
use tracing::warn;

use crate::audio::{
    constants::FRAME_SIZE_SAMPLES,
    processor::{AudioProcessor, DecodedBlock, DecoderCommand},
};

/// 20 ms of interleaved 48 kHz stereo PCM.
pub type PcmFrame = Vec<i16>;

/// Result of asking a stream for its next frame without blocking.
#[derive(Debug, PartialEq)]
pub enum FramePoll {
    Ready(PcmFrame),
    /// Nothing decoded yet; try again next tick.
    Pending,
    Finished,
    Failed(String),
}

/// A started track producing PCM frames.
pub trait TrackStream: Send {
    fn poll_frame(&mut self) -> FramePoll;
    /// Returns `false` when the stream can no longer seek, e.g. its decoder
    /// has exited. The caller has to reopen the track instead.
    fn seek(&mut self, position_ms: u64) -> bool;
}

/// Re-frames variable-sized PCM blocks from a decoder thread into exact
/// 20 ms frames.
pub struct DecodedStream {
    pcm_rx: Receiver<DecodedBlock>,
    cmd_tx: Sender<DecoderCommand>,
    err_rx: Receiver<String>,
    pending: Vec<i16>,
    /// Seeks whose flush marker has not come back yet.
    unflushed_seeks: u32,
    ended: bool,
}

impl DecodedStream {
    pub fn new(
        pcm_rx: Receiver<DecodedBlock>,
        cmd_tx: Sender<DecoderCommand>,
        err_rx: Receiver<String>,
    ) -> Self {
        Self {
            pcm_rx,
            cmd_tx,
            err_rx,
            pending: Vec::with_capacity(FRAME_SIZE_SAMPLES * 2),
            unflushed_seeks: 0,
            ended: false,
        }
    }

    /// Starts decoding `data` on a dedicated thread.
    pub fn spawn(data: Bytes, buffer_blocks: usize, start_ms: u64) -> Self {
        let (pcm_tx, pcm_rx) = flume::bounded(buffer_blocks.max(1));
        let (cmd_tx, cmd_rx) = flume::unbounded();
        let (err_tx, err_rx) = flume::bounded(1);

        let thread_err_tx = err_tx.clone();
        let spawned = std::thread::Builder::new()
            .name("decoder".into())
            .spawn(move || {
                // Hold the channel open until the error is queued so the reader
                // never sees the hang-up first.
                let hold = pcm_tx.clone();
                let result = AudioProcessor::new(data, pcm_tx, cmd_rx)
                    .and_then(|mut processor| processor.run());
                if let Err(e) = result {
                    warn!("decoder failed: {}", e);
                    let _ = thread_err_tx.send(e.to_string());
                }
                drop(hold);
            });
        if let Err(e) = spawned {
            let _ = err_tx.send(format!("failed to start decoder thread: {e}"));
        }

        let mut stream = Self::new(pcm_rx, cmd_tx, err_rx);
        if start_ms > 0 {
            stream.seek(start_ms);
        }
        stream
    }

    fn take_frame(&mut self) -> PcmFrame {
        self.pending.drain(..FRAME_SIZE_SAMPLES).collect()
    }

    /// Pads what is left into one last frame, or reports the end.
    fn finish(&mut self) -> FramePoll {
        if self.unflushed_seeks > 0 || self.pending.is_empty() {
            return FramePoll::Finished;
        }
        let mut tail = std::mem::take(&mut self.pending);
        tail.resize(FRAME_SIZE_SAMPLES, 0);
        FramePoll::Ready(tail)
    }
}

impl TrackStream for DecodedStream {
    fn poll_frame(&mut self) -> FramePoll {
        loop {
            if self.unflushed_seeks == 0 && self.pending.len() >= FRAME_SIZE_SAMPLES {
                return FramePoll::Ready(self.take_frame());
            }
            if self.ended {
                return self.finish();
            }

            match self.pcm_rx.try_recv() {
                Ok(DecodedBlock::Flushed) => {
                    self.unflushed_seeks = self.unflushed_seeks.saturating_sub(1);
                    self.pending.clear();
                }
                Ok(DecodedBlock::Pcm(block)) => {
                    if self.unflushed_seeks == 0 {
                        self.pending.extend_from_slice(&block);
                    }
                }
                // An end marker sent before a pending seek is stale.
                Ok(DecodedBlock::EndOfStream) => self.ended = self.unflushed_seeks == 0,
                Err(TryRecvError::Empty) => return FramePoll::Pending,
                Err(TryRecvError::Disconnected) => {
                    if let Ok(err) = self.err_rx.try_recv() {
                        return FramePoll::Failed(err);
                    }
                    return self.finish();
                }
            }
        }
    }

    fn seek(&mut self, position_ms: u64) -> bool {
        if self.cmd_tx.send(DecoderCommand::Seek(position_ms)).is_err() {
            return false;
        }
        self.unflushed_seeks += 1;
        self.ended = false;
        self.pending.clear();
        true
    }
}

impl Drop for DecodedStream {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(DecoderCommand::Stop);
    }
}
