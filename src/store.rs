//! File-backed calibration record and time-bucketed sample log.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    num::NonZeroU64,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    calibration::CalibrationOffsets,
    fusion::{CurrentEstimate, RANGE_COUNT},
    meter::{OffsetStore, SampleSink},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: line {line} is not an integer offset", path.display())]
    Malformed { path: PathBuf, line: usize },
    #[error("{}: expected 3 offsets, found {found}", path.display())]
    Truncated { path: PathBuf, found: usize },
    #[error("{}: line {line} follows the third offset", path.display())]
    Trailing { path: PathBuf, line: usize },
}

impl StoreError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Directory holding one `<bucket start>.bin` file per bucket
    pub directory: PathBuf,
    pub bucket_secs: NonZeroU64,
    pub calibration_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("power"),
            bucket_secs: NonZeroU64::MIN,
            calibration_path: PathBuf::from("calibration.txt"),
        }
    }
}

impl LogConfig {
    pub fn sample_log(&self) -> BucketedLog<SystemClock> {
        BucketedLog::new(&self.directory, self.bucket_secs, SystemClock)
    }

    pub fn calibration_file(&self) -> CalibrationFile {
        CalibrationFile::new(&self.calibration_path)
    }
}

/// Plain-text calibration record: one offset per line, channel order. A
/// missing file means the meter has never been calibrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationFile {
    path: PathBuf,
}

impl CalibrationFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deleting the record makes the next start recalibrate.
    pub fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                Err(StoreError::io(&self.path)(err))
            }
            _ => Ok(()),
        }
    }

    fn parse(&self, text: &str) -> Result<CalibrationOffsets, StoreError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let mut offsets = [0; RANGE_COUNT];
        for (found, slot) in offsets.iter_mut().enumerate() {
            let Some((index, line)) = lines.next() else {
                return Err(StoreError::Truncated {
                    path: self.path.clone(),
                    found,
                });
            };
            *slot = line.trim().parse().map_err(|_| StoreError::Malformed {
                path: self.path.clone(),
                line: index + 1,
            })?;
        }

        if let Some((index, _)) = lines.next() {
            return Err(StoreError::Trailing {
                path: self.path.clone(),
                line: index + 1,
            });
        }
        Ok(CalibrationOffsets(offsets))
    }
}

impl OffsetStore for CalibrationFile {
    type Error = StoreError;

    fn load(&mut self) -> Result<Option<CalibrationOffsets>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("calibration record {} not found", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(StoreError::io(&self.path)(err)),
        };

        let offsets = self.parse(&text)?;
        log::info!("calibration record {} loaded", self.path.display());
        Ok(Some(offsets))
    }

    fn save(&mut self, offsets: &CalibrationOffsets) -> Result<(), StoreError> {
        let mut text = String::new();
        for offset in offsets.0 {
            text.push_str(&offset.to_string());
            text.push('\n');
        }

        fs::write(&self.path, text).map_err(StoreError::io(&self.path))?;
        log::info!("calibration record {} written", self.path.display());
        Ok(())
    }
}

/// Seconds since the Unix epoch.
pub trait Clock {
    fn unix_secs(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

struct Bucket {
    start: u64,
    path: PathBuf,
    writer: BufWriter<File>,
    points: u64,
}

/// Appends each estimate as a little-endian `i32`, with no header or
/// framing, to `<directory>/<bucket start>.bin`. A new file starts whenever
/// the clock enters a new bucket.
pub struct BucketedLog<C: Clock> {
    directory: PathBuf,
    bucket_secs: NonZeroU64,
    clock: C,
    current: Option<Bucket>,
}

impl<C: Clock> BucketedLog<C> {
    pub fn new(directory: impl Into<PathBuf>, bucket_secs: NonZeroU64, clock: C) -> Self {
        Self {
            directory: directory.into(),
            bucket_secs,
            clock,
            current: None,
        }
    }

    /// Start of the bucket containing `unix_secs`.
    pub fn bucket_start(&self, unix_secs: u64) -> u64 {
        unix_secs - unix_secs % self.bucket_secs.get()
    }

    pub fn bucket_path(&self, start: u64) -> PathBuf {
        self.directory.join(format!("{start}.bin"))
    }

    /// Path of the bucket being written, if one is open.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|bucket| bucket.path.as_path())
    }

    /// Points written into the open bucket.
    pub fn current_points(&self) -> u64 {
        self.current.as_ref().map_or(0, |bucket| bucket.points)
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        if let Some(bucket) = self.current.as_mut() {
            bucket.writer.flush().map_err(StoreError::io(&bucket.path))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        if let Some(mut bucket) = self.current.take() {
            bucket.writer.flush().map_err(StoreError::io(&bucket.path))?;
            log::info!("{}: {} points saved", bucket.path.display(), bucket.points);
        }
        Ok(())
    }

    fn open(&mut self, start: u64) -> Result<(), StoreError> {
        self.close()?;

        fs::create_dir_all(&self.directory).map_err(StoreError::io(&self.directory))?;
        let path = self.bucket_path(start);
        // Appending keeps samples already written if the same bucket is
        // reopened
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(StoreError::io(&path))?;

        log::debug!("opened {}", path.display());
        self.current = Some(Bucket {
            start,
            path,
            writer: BufWriter::new(file),
            points: 0,
        });
        Ok(())
    }
}

impl<C: Clock> SampleSink for BucketedLog<C> {
    type Error = StoreError;

    fn open_bucket(&mut self) -> Result<(), StoreError> {
        let start = self.bucket_start(self.clock.unix_secs());
        self.open(start)
    }

    fn append(&mut self, estimate: CurrentEstimate) -> Result<(), StoreError> {
        let start = self.bucket_start(self.clock.unix_secs());
        if self.current.as_ref().map(|bucket| bucket.start) != Some(start) {
            self.open(start)?;
        }

        let Some(bucket) = self.current.as_mut() else {
            return Ok(());
        };
        bucket
            .writer
            .write_all(&estimate.to_le_bytes())
            .map_err(StoreError::io(&bucket.path))?;
        bucket.points += 1;
        Ok(())
    }
}

impl<C: Clock> Drop for BucketedLog<C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("closing sample log failed: {err}");
        }
    }
}
