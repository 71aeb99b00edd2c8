//! Packet-trace capture of Diameter frames.
//!
//! Serialized messages are written to a libpcap file with link type
//! DLT_USER_15 so the trace can be opened offline with a Diameter dissector
//! bound to that slot. The writer owns the file exclusively and is fed
//! through a bounded channel; a periodic flush keeps the trace durable on
//! graceful exit.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;

pub const LINKTYPE_USER15: u32 = 162; // DLT_USER_15
pub const SNAP_LEN: u32 = 65536;

const QUEUE_CAPACITY: usize = 1000;
const FLUSH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct CaptureRecord {
    pub bytes: Vec<u8>,
    pub timestamp: SystemTime,
}

impl CaptureRecord {
    pub fn now(bytes: Vec<u8>) -> CaptureRecord {
        CaptureRecord {
            bytes,
            timestamp: SystemTime::now(),
        }
    }
}

pub struct PcapWriter {
    file: File,
}

impl PcapWriter {
    /// Creates the capture file and writes the global header.
    pub async fn create(path: &str) -> std::io::Result<PcapWriter> {
        let file = File::create(path).await?;
        let mut writer = PcapWriter { file };
        writer.write_file_header().await?;
        Ok(writer)
    }

    async fn write_file_header(&mut self) -> std::io::Result<()> {
        let mut b = Vec::with_capacity(24);
        b.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes()); // magic
        b.extend_from_slice(&2u16.to_le_bytes()); // version major
        b.extend_from_slice(&4u16.to_le_bytes()); // version minor
        b.extend_from_slice(&0i32.to_le_bytes()); // thiszone
        b.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
        b.extend_from_slice(&SNAP_LEN.to_le_bytes());
        b.extend_from_slice(&LINKTYPE_USER15.to_le_bytes());
        self.file.write_all(&b).await?;
        self.file.sync_data().await
    }

    /// Appends one record; captured length and wire length are both the
    /// full frame length.
    pub async fn write_record(&mut self, record: &CaptureRecord) -> std::io::Result<()> {
        let elapsed = record
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut b = Vec::with_capacity(16 + record.bytes.len());
        b.extend_from_slice(&(elapsed.as_secs() as u32).to_le_bytes());
        b.extend_from_slice(&elapsed.subsec_micros().to_le_bytes());
        b.extend_from_slice(&(record.bytes.len() as u32).to_le_bytes());
        b.extend_from_slice(&(record.bytes.len() as u32).to_le_bytes());
        b.extend_from_slice(&record.bytes);
        self.file.write_all(&b).await
    }

    pub async fn sync(&mut self) -> std::io::Result<()> {
        self.file.sync_data().await
    }
}

/// Starts the capture writer task.
///
/// Returns `None` when the file cannot be created; capture then stays
/// disabled for the rest of the process. Write failures on the running task
/// drop the record (the trace is best effort).
pub async fn start(path: &str) -> Option<(mpsc::Sender<CaptureRecord>, JoinHandle<()>)> {
    let mut writer = match PcapWriter::create(path).await {
        Ok(writer) => writer,
        Err(e) => {
            log::error!("Client create pcap file failed ({}).", e);
            return None;
        }
    };
    log::info!("Client create pcap file({}) success.", path);

    let (tx, mut rx) = mpsc::channel::<CaptureRecord>(QUEUE_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
        loop {
            tokio::select! {
                record = rx.recv() => match record {
                    Some(record) => {
                        if let Err(e) = writer.write_record(&record).await {
                            log::debug!("pcap write failed ({}), record dropped", e);
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    let _ = writer.sync().await;
                }
            }
        }
        let _ = writer.sync().await;
    });

    Some((tx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> String {
        let mut path = std::env::temp_dir();
        path.push(format!("ccg-pcap-{}-{}", std::process::id(), name));
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_file_header_shape() {
        let path = temp_path("header");
        {
            let _writer = PcapWriter::create(&path).await.unwrap();
        }
        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(bytes.len(), 24);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 0xa1b2c3d4);
        assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bytes[6..8].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 65536);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 162);
    }

    #[tokio::test]
    async fn test_one_record_per_frame() {
        let path = temp_path("records");
        let (tx, handle) = start(&path).await.unwrap();
        tx.send(CaptureRecord::now(vec![1, 2, 3])).await.unwrap();
        tx.send(CaptureRecord::now(vec![4, 5, 6, 7, 8])).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();

        // global header, then two records
        let mut offset = 24;
        let mut lengths = Vec::new();
        while offset < bytes.len() {
            let incl =
                u32::from_le_bytes(bytes[offset + 8..offset + 12].try_into().unwrap()) as usize;
            let orig =
                u32::from_le_bytes(bytes[offset + 12..offset + 16].try_into().unwrap()) as usize;
            assert_eq!(incl, orig);
            lengths.push(incl);
            offset += 16 + incl;
        }
        assert_eq!(offset, bytes.len());
        assert_eq!(lengths, vec![3, 5]);
    }

    #[tokio::test]
    async fn test_create_failure_disables_capture() {
        assert!(start("/nonexistent-dir/trace.pcap").await.is_none());
    }
}
