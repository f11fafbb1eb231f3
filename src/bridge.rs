//! Producer and consumer endpoints over the shared mailbox.
//!
//! The host process owns a [`ProducerEndpoint`]: it creates the named segment
//! (or reattaches to a stale one), posts jobs and reads the talking flag. The
//! worker process owns a [`ConsumerEndpoint`]: it opens the existing segment,
//! takes jobs and publishes the talking flag.
//!
//! Neither endpoint blocks. When the segment cannot be created, opened or
//! mapped the endpoint is "not connected" and every operation is a no-op.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};

use memmap2::{MmapMut, MmapOptions};

use crate::mailbox::{
    decode_bounded, default_segment_path, encode_bounded, Job, HAS_NEW_JOB_OFFSET,
    IS_AUDIO_PLAYING_OFFSET, MAILBOX_SIZE, SPEED_OFFSET, TEXT_CAPACITY, TEXT_OFFSET,
    VOICE_ID_CAPACITY, VOICE_ID_OFFSET,
};

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("I/O error on shared segment {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Shared segment {} is {len} bytes, expected at least {expected}", .path.display())]
    SegmentTooSmall {
        path: PathBuf,
        len: u64,
        expected: usize,
    },
}

impl BridgeError {
    fn io(path: &Path, source: io::Error) -> Self {
        BridgeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A mapped view of the mailbox record.
struct Mailbox {
    base: NonNull<u8>,
    // Keeps the mapping alive; `base` points into it.
    _map: MmapMut,
}

// The mapping is process-wide memory; the raw pointer is only a view of it.
unsafe impl Send for Mailbox {}

impl Mailbox {
    fn map(file: &File, path: &Path) -> Result<Self, BridgeError> {
        let mut map = unsafe { MmapOptions::new().len(MAILBOX_SIZE).map_mut(file) }
            .map_err(|e| BridgeError::io(path, e))?;
        let base = NonNull::new(map.as_mut_ptr())
            .ok_or_else(|| BridgeError::io(path, io::Error::other("null mapping")))?;
        Ok(Self { base, _map: map })
    }

    fn flag(&self, offset: usize) -> &AtomicBool {
        debug_assert!(offset < MAILBOX_SIZE);
        // SAFETY: offset is inside the mapping, AtomicBool has alignment 1 and
        // the byte only ever holds 0 or 1 once initialised by the producer.
        unsafe { AtomicBool::from_ptr(self.base.as_ptr().add(offset).cast()) }
    }

    fn has_new_job(&self) -> &AtomicBool {
        self.flag(HAS_NEW_JOB_OFFSET)
    }

    fn is_audio_playing(&self) -> &AtomicBool {
        self.flag(IS_AUDIO_PLAYING_OFFSET)
    }

    fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= MAILBOX_SIZE);
        // SAFETY: bounds checked above; only the side that currently owns the
        // payload (per the has_new_job handshake) writes it.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.base.as_ptr().add(offset), bytes.len())
        }
    }

    fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        assert!(offset + out.len() <= MAILBOX_SIZE);
        // SAFETY: as in write_bytes.
        unsafe {
            ptr::copy_nonoverlapping(self.base.as_ptr().add(offset), out.as_mut_ptr(), out.len())
        }
    }

    fn write_field(&self, offset: usize, capacity: usize, value: &str) {
        let mut field = vec![0u8; capacity];
        let len = encode_bounded(value.as_bytes(), &mut field);
        // Only the payload and its terminator are touched.
        self.write_bytes(offset, &field[..=len]);
    }

    fn read_field(&self, offset: usize, capacity: usize) -> String {
        let mut field = vec![0u8; capacity];
        self.read_bytes(offset, &mut field);
        decode_bounded(&field)
    }

    fn write_speed(&self, speed: f32) {
        self.write_bytes(SPEED_OFFSET, &speed.to_ne_bytes());
    }

    fn read_speed(&self) -> f32 {
        let mut raw = [0u8; 4];
        self.read_bytes(SPEED_OFFSET, &mut raw);
        f32::from_ne_bytes(raw)
    }

    fn reset(&self) {
        self.has_new_job().store(false, Ordering::Relaxed);
        self.is_audio_playing().store(false, Ordering::Relaxed);
        self.write_field(TEXT_OFFSET, TEXT_CAPACITY, "");
        self.write_field(VOICE_ID_OFFSET, VOICE_ID_CAPACITY, "");
        self.write_speed(1.0);
        std::sync::atomic::fence(Ordering::Release);
    }
}

/// Create the segment file, or open it if it is already there.
///
/// Returns the file and whether this call created it.
fn create_or_open(path: &Path) -> Result<(File, bool), BridgeError> {
    let created = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path);

    let (file, created) = match created {
        Ok(file) => (file, true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            log::info!("Shared segment {} already exists, reattaching", path.display());
            (open_existing(path)?, false)
        }
        Err(e) => return Err(BridgeError::io(path, e)),
    };

    let len = file.metadata().map_err(|e| BridgeError::io(path, e))?.len();
    if len < MAILBOX_SIZE as u64 {
        file.set_len(MAILBOX_SIZE as u64)
            .map_err(|e| BridgeError::io(path, e))?;
    }
    Ok((file, created))
}

fn open_existing(path: &Path) -> Result<File, BridgeError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| BridgeError::io(path, e))
}

/// Host side of the mailbox.
pub struct ProducerEndpoint {
    mailbox: Option<Mailbox>,
    path: PathBuf,
}

impl ProducerEndpoint {
    /// Create (or reattach to) the default named segment.
    pub fn new() -> Self {
        Self::open_or_create(&default_segment_path())
    }

    /// Create (or reattach to) the segment at `path`.
    ///
    /// Fields are initialised only when this call created the segment; a
    /// leftover segment keeps whatever state it held.
    pub fn open_or_create(path: &Path) -> Self {
        let mailbox = match create_or_open(path)
            .and_then(|(file, created)| Ok((Mailbox::map(&file, path)?, created)))
        {
            Ok((mailbox, created)) => {
                if created {
                    mailbox.reset();
                }
                log::info!("Producer attached to {}", path.display());
                Some(mailbox)
            }
            Err(e) => {
                log::error!("Producer could not attach: {e}");
                None
            }
        };

        Self {
            mailbox,
            path: path.to_path_buf(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.mailbox.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Post a job.
    ///
    /// If the previous job has not been taken yet the new one is dropped and
    /// `false` is returned. Text and voice id are truncated to their buffer
    /// capacity minus the terminator.
    pub fn send(&self, text: &str, voice_id: &str, speed: f32) -> bool {
        let Some(mailbox) = &self.mailbox else {
            return false;
        };
        if mailbox.has_new_job().load(Ordering::Acquire) {
            log::debug!("Mailbox busy, dropping job");
            return false;
        }

        mailbox.write_field(TEXT_OFFSET, TEXT_CAPACITY, text);
        mailbox.write_field(VOICE_ID_OFFSET, VOICE_ID_CAPACITY, voice_id);
        mailbox.write_speed(speed);
        mailbox.has_new_job().store(true, Ordering::Release);
        true
    }

    /// Whether the worker currently reports audio playback.
    pub fn is_talking(&self) -> bool {
        self.mailbox
            .as_ref()
            .is_some_and(|m| m.is_audio_playing().load(Ordering::Acquire))
    }

    /// Whether a posted job is still waiting to be taken.
    pub fn has_pending_job(&self) -> bool {
        self.mailbox
            .as_ref()
            .is_some_and(|m| m.has_new_job().load(Ordering::Acquire))
    }

    /// Unmap the segment and remove its backing name.
    pub fn release(mut self) -> io::Result<()> {
        if self.mailbox.take().is_none() {
            return Ok(());
        }
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Default for ProducerEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the mailbox.
pub struct ConsumerEndpoint {
    mailbox: Option<Mailbox>,
}

impl ConsumerEndpoint {
    /// Open the default named segment.
    pub fn new() -> Self {
        Self::open(&default_segment_path())
    }

    /// Open an existing segment at `path`. Contents are never initialised here.
    pub fn open(path: &Path) -> Self {
        let mailbox = open_existing(path).and_then(|file| {
            let len = file.metadata().map_err(|e| BridgeError::io(path, e))?.len();
            if len < MAILBOX_SIZE as u64 {
                return Err(BridgeError::SegmentTooSmall {
                    path: path.to_path_buf(),
                    len,
                    expected: MAILBOX_SIZE,
                });
            }
            Mailbox::map(&file, path)
        });

        let mailbox = match mailbox {
            Ok(mailbox) => {
                log::info!("Consumer attached to {}", path.display());
                Some(mailbox)
            }
            Err(e) => {
                log::error!("Consumer could not attach: {e}");
                None
            }
        };
        Self { mailbox }
    }

    pub fn is_connected(&self) -> bool {
        self.mailbox.is_some()
    }

    /// Take the pending job, if any, and mark the mailbox free again.
    pub fn check_for_job(&self) -> Option<Job> {
        let mailbox = self.mailbox.as_ref()?;
        if !mailbox.has_new_job().load(Ordering::Acquire) {
            return None;
        }

        let job = Job {
            text: mailbox.read_field(TEXT_OFFSET, TEXT_CAPACITY),
            voice_id: mailbox.read_field(VOICE_ID_OFFSET, VOICE_ID_CAPACITY),
            speed: mailbox.read_speed(),
        };
        mailbox.has_new_job().store(false, Ordering::Release);
        Some(job)
    }

    pub fn set_talking_state(&self, talking: bool) {
        if let Some(mailbox) = &self.mailbox {
            mailbox.is_audio_playing().store(talking, Ordering::Release);
        }
    }
}

impl Default for ConsumerEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn producer_initialises_fresh_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailbox");
        let producer = ProducerEndpoint::open_or_create(&path);

        assert!(producer.is_connected());
        assert!(!producer.has_pending_job());
        assert!(!producer.is_talking());

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), MAILBOX_SIZE);
        assert_eq!(&bytes[SPEED_OFFSET..], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn producer_reattaches_without_reinitialising() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailbox");

        let first = ProducerEndpoint::open_or_create(&path);
        assert!(first.send("left over", "4", 0.5));
        drop(first);

        let second = ProducerEndpoint::open_or_create(&path);
        assert!(second.has_pending_job());

        let consumer = ConsumerEndpoint::open(&path);
        let job = consumer.check_for_job().unwrap();
        assert_eq!(job.text, "left over");
        assert_eq!(job.voice_id, "4");
        assert_eq!(job.speed, 0.5);
    }

    #[test]
    fn consumer_without_segment_is_disconnected() {
        let dir = tempdir().unwrap();
        let consumer = ConsumerEndpoint::open(&dir.path().join("missing"));

        assert!(!consumer.is_connected());
        assert_eq!(consumer.check_for_job(), None);
        consumer.set_talking_state(true);
    }

    #[test]
    fn consumer_rejects_short_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, [0u8; 16]).unwrap();

        assert!(!ConsumerEndpoint::open(&path).is_connected());
    }

    #[test]
    fn disconnected_producer_is_a_no_op() {
        let dir = tempdir().unwrap();
        let producer = ProducerEndpoint::open_or_create(&dir.path().join("no/such/dir"));

        assert!(!producer.is_connected());
        assert!(!producer.send("hello", "1", 1.0));
        assert!(!producer.is_talking());
        assert!(producer.release().is_ok());
    }

    #[test]
    fn talking_flag_is_independent_of_job_flag() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailbox");
        let producer = ProducerEndpoint::open_or_create(&path);
        let consumer = ConsumerEndpoint::open(&path);

        consumer.set_talking_state(true);
        assert!(producer.is_talking());
        assert!(!producer.has_pending_job());

        assert!(producer.send("next", "1", 1.0));
        consumer.set_talking_state(false);
        assert!(!producer.is_talking());
        assert!(producer.has_pending_job());
    }

    #[test]
    fn release_removes_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mailbox");
        let producer = ProducerEndpoint::open_or_create(&path);
        assert!(path.exists());

        producer.release().unwrap();
        assert!(!path.exists());
    }
}
