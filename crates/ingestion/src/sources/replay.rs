//! Replay byte source
//!
//! Plays a raw capture (bytes exactly as they came off the radar UART) back
//! in fixed-size chunks at a fixed interval.

use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::time::Duration;

use bytes::BytesMut;
use contracts::ByteSource;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: PathBuf,
    pub chunk_size: usize,
    pub chunk_interval: Duration,
    pub loop_playback: bool,
}

pub struct ReplayByteSource {
    config: ReplayConfig,
    file: Option<File>,
    next_chunk: Instant,
    finished: bool,
    passes: u64,
}

impl ReplayByteSource {
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            file: None,
            next_chunk: Instant::now(),
            finished: false,
            passes: 0,
        }
    }

    /// True once a non-looping capture has been fully played
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    async fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = File::open(&self.config.path).await?;
            info!(path = %self.config.path.display(), "replay capture opened");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("replay file unavailable"))
    }
}

impl ByteSource for ReplayByteSource {
    fn describe(&self) -> String {
        format!("replay({})", self.config.path.display())
    }

    async fn read(&mut self, buf: &mut BytesMut, timeout: Duration) -> io::Result<usize> {
        if self.finished {
            sleep(timeout).await;
            return Ok(0);
        }

        let now = Instant::now();
        if self.next_chunk > now {
            let wait = self.next_chunk - now;
            if wait > timeout {
                sleep(timeout).await;
                return Ok(0);
            }
            sleep(wait).await;
        }
        self.next_chunk = Instant::now() + self.config.chunk_interval;

        let chunk = self.config.chunk_size as u64;
        let n = {
            let file = self.file().await?;
            file.take(chunk).read_buf(buf).await?
        };
        if n > 0 {
            return Ok(n);
        }

        self.passes += 1;
        if self.config.loop_playback {
            debug!(passes = self.passes, "replay capture rewound");
            self.file().await?.seek(SeekFrom::Start(0)).await?;
        } else {
            info!(path = %self.config.path.display(), "replay capture finished");
            self.finished = true;
        }
        Ok(0)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.file = None;
        Ok(())
    }
}
