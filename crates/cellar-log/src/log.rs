use std::io::{self, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cellar_types::{validate_log_name, Codec, JsonCodec};

use crate::config::{LogConfig, SyncMode, TornTailPolicy};
use crate::error::{LogError, LogResult};
use crate::frame::{encode_frame, parse_frames, ParsedFrames};

/// Durable, single-writer queue of `T` records.
///
/// Each record is codec-encoded and written as one length-prefixed frame at
/// the end of `<dir>/<name>`. [`AppendLog::flush`] drains the log: it returns
/// every record in append order and truncates the file. Appends and drains
/// are mutually exclusive.
///
/// Opening a file that ends in a torn record repairs it under
/// [`TornTailPolicy::Discard`] (the partial bytes are cut off) or fails under
/// [`TornTailPolicy::Error`]. An append that fails midway is rolled back, so
/// the file never gains a partial frame from this process.
///
/// Only one `AppendLog` per file should be open at a time.
pub struct AppendLog<T, C = JsonCodec> {
    name: String,
    path: PathBuf,
    config: LogConfig,
    codec: C,
    file: Mutex<File>,
    _element: PhantomData<fn() -> T>,
}

impl<T> AppendLog<T, JsonCodec>
where
    T: Serialize + DeserializeOwned,
{
    /// Open (or create) the log `name` with the JSON codec.
    pub async fn open(name: &str, config: LogConfig) -> LogResult<Self> {
        Self::open_with_codec(name, config, JsonCodec).await
    }
}

impl<T, C> AppendLog<T, C>
where
    T: Serialize + DeserializeOwned,
    C: Codec,
{
    /// Open (or create) the log `name` with a custom codec.
    ///
    /// The name follows the same rules as object keys. Existing records are
    /// kept; a torn trailing record is handled per [`LogConfig::torn_tail`].
    pub async fn open_with_codec(name: &str, config: LogConfig, codec: C) -> LogResult<Self> {
        validate_log_name(name)?;
        config.validate()?;

        fs::create_dir_all(&config.dir)
            .await
            .map_err(|source| LogError::Creation {
                path: config.dir.clone(),
                source,
            })?;

        let path = config.dir.join(name);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| LogError::Creation {
                path: path.clone(),
                source,
            })?;

        if let Some(torn) = read_frames(&mut file).await?.torn_tail {
            match config.torn_tail {
                TornTailPolicy::Discard => {
                    warn!(log = name, offset = torn.offset, reason = %torn, "cutting torn trailing record");
                    file.set_len(torn.offset).await?;
                    if config.sync_mode == SyncMode::EveryWrite {
                        file.sync_data().await?;
                    }
                }
                TornTailPolicy::Error => {
                    return Err(LogError::CorruptLog {
                        offset: torn.offset,
                        reason: torn.to_string(),
                    });
                }
            }
        }
        let existing = file.metadata().await?.len();

        info!(log = name, path = %path.display(), existing, codec = codec.name(), "append log opened");
        Ok(Self {
            name: name.to_string(),
            path,
            config,
            codec,
            file: Mutex::new(file),
            _element: PhantomData,
        })
    }

    /// Append one record at the end of the log.
    pub async fn append(&self, element: &T) -> LogResult<()> {
        let payload = self
            .codec
            .encode(element)
            .map_err(|e| LogError::Serialize(e.reason().to_string()))?;
        let frame = encode_frame(&payload, self.config.max_record_size)?;

        let mut file = self.file.lock().await;
        append_frame(&mut *file, &frame, self.config.sync_mode == SyncMode::EveryWrite).await?;

        debug!(log = %self.name, len = payload.len(), "record appended");
        Ok(())
    }

    /// Drain the log: every record in append order, then an empty file.
    ///
    /// If any record fails to decode, nothing is truncated and the error names
    /// the record's index.
    pub async fn flush(&self) -> LogResult<Vec<T>> {
        let mut file = self.file.lock().await;
        let records = self.read_records(&mut file).await?;

        let elements = records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                self.codec.decode(record).map_err(|e| LogError::Decode {
                    index,
                    reason: e.reason().to_string(),
                })
            })
            .collect::<LogResult<Vec<T>>>()?;

        self.truncate(&mut file).await?;
        debug!(log = %self.name, records = elements.len(), "log drained");
        Ok(elements)
    }

    /// Drain the log without decoding. Recovers records written by an older
    /// version of `T`.
    pub async fn flush_raw(&self) -> LogResult<Vec<Vec<u8>>> {
        let mut file = self.file.lock().await;
        let records = self.read_records(&mut file).await?;
        self.truncate(&mut file).await?;

        debug!(log = %self.name, records = records.len(), "log drained raw");
        Ok(records.into_iter().map(|record| record.to_vec()).collect())
    }

    /// Current size of the log file in bytes.
    pub async fn len_bytes(&self) -> LogResult<u64> {
        let file = self.file.lock().await;
        Ok(file.metadata().await?.len())
    }

    /// Returns `true` if the log holds no bytes.
    pub async fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len_bytes().await? == 0)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    async fn read_records(&self, file: &mut File) -> LogResult<Vec<Bytes>> {
        let parsed = read_frames(file).await?;
        if let Some(torn) = parsed.torn_tail {
            match self.config.torn_tail {
                TornTailPolicy::Discard => {
                    warn!(log = %self.name, offset = torn.offset, reason = %torn, "discarding torn trailing record");
                }
                TornTailPolicy::Error => {
                    return Err(LogError::CorruptLog {
                        offset: torn.offset,
                        reason: torn.to_string(),
                    });
                }
            }
        }
        Ok(parsed.records)
    }

    async fn truncate(&self, file: &mut File) -> LogResult<()> {
        file.set_len(0).await?;
        file.seek(SeekFrom::Start(0)).await?;
        if self.config.sync_mode == SyncMode::EveryWrite {
            file.sync_data().await?;
        }
        Ok(())
    }
}

async fn read_frames(file: &mut File) -> io::Result<ParsedFrames> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut data = Vec::new();
    file.read_to_end(&mut data).await?;
    Ok(parse_frames(Bytes::from(data)))
}

/// Destination of appended frames.
#[async_trait]
trait FrameSink: Send {
    async fn end_offset(&mut self) -> io::Result<u64>;

    async fn write_frame(&mut self, frame: &[u8], sync: bool) -> io::Result<()>;

    async fn cut_to(&mut self, len: u64) -> io::Result<()>;
}

#[async_trait]
impl FrameSink for File {
    async fn end_offset(&mut self) -> io::Result<u64> {
        Ok(self.metadata().await?.len())
    }

    async fn write_frame(&mut self, frame: &[u8], sync: bool) -> io::Result<()> {
        self.write_all(frame).await?;
        self.flush().await?;
        if sync {
            self.sync_data().await?;
        }
        Ok(())
    }

    async fn cut_to(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len).await
    }
}

/// Write one frame, cutting the sink back to its previous end if any step
/// fails.
async fn append_frame<S: FrameSink + ?Sized>(sink: &mut S, frame: &[u8], sync: bool) -> io::Result<()> {
    let before = sink.end_offset().await?;
    if let Err(err) = sink.write_frame(frame, sync).await {
        if let Err(rollback) = sink.cut_to(before).await {
            warn!(len = before, error = %rollback, "could not roll back failed append");
        }
        return Err(err);
    }
    Ok(())
}

impl<T, C: Codec> std::fmt::Debug for AppendLog<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendLog")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("codec", &self.codec.name())
            .field("sync_mode", &self.config.sync_mode)
            .finish()
    }
}
