//! The run tree builder.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;
use tokio::io::AsyncBufRead;
use tracing::{debug, trace};

use crate::error::{LogError, Result};
use crate::log_line::LogLine;
use crate::reader::{AsyncLogReader, LogReader};
use crate::run::ClientRun;
use crate::LineType;

/// A parsed client log: the client runs found so far and their slots and
/// unit runs.
///
/// Lines are consumed strictly in order. Each call to [`append`](Self::append)
/// files one line under the node it belongs to; [`finish`](Self::finish)
/// closes whatever is still open when the stream ends.
#[derive(Debug, Default)]
pub struct FoldingLog {
    client_runs: Vec<ClientRun>,
    next_index: u64,
}

impl FoldingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a log file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_source(path)?;
        let file = File::open(path)?;

        let mut log = Self::new();
        log.read(&mut LogReader::new(BufReader::new(file)))?;
        Ok(log)
    }

    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        check_source(path)?;
        let file = tokio::fs::File::open(path).await?;

        let mut log = Self::new();
        log.read_async(&mut AsyncLogReader::new(tokio::io::BufReader::new(file)))
            .await?;
        Ok(log)
    }

    /// Parse log text held in memory.
    pub fn from_text(text: &str) -> Self {
        let mut log = Self::new();
        let reader = LogReader::new(Cursor::new(text.as_bytes()));
        for line in reader.flatten() {
            log.append(line);
        }
        log.finish();
        log
    }

    /// Consume the reader to end of stream.
    ///
    /// On an I/O error the lines read so far stay in the log.
    pub fn read<R: BufRead>(&mut self, reader: &mut LogReader<R>) -> Result<()> {
        loop {
            match reader.read_line() {
                Ok(Some(line)) => self.append(line),
                Ok(None) => break,
                Err(source) => {
                    return Err(LogError::Read {
                        index: self.next_index,
                        source,
                    })
                }
            }
        }
        self.finish();
        Ok(())
    }

    pub async fn read_async<R>(&mut self, reader: &mut AsyncLogReader<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            match reader.read_line().await {
                Ok(Some(line)) => self.append(line),
                Ok(None) => break,
                Err(source) => {
                    return Err(LogError::Read {
                        index: self.next_index,
                        source,
                    })
                }
            }
        }
        self.finish();
        Ok(())
    }

    /// File one line under its client, slot and unit run.
    pub fn append(&mut self, mut line: LogLine) {
        line.set_index(self.next_index);
        self.next_index += 1;

        let index = line.index();
        let line_type = line.line_type();
        trace!(index, line_type = %line_type, "Appending line");

        let tag = line.dialect().unit_tag(line.raw());
        let client = self.ensure_client_run(index);

        let Some(tag) = tag else {
            client.push_line(line);
            return;
        };

        let slot = client.slot_run_entry(tag.folding_slot);
        let unit = slot.unit_run_entry(tag.queue_index, index);
        unit.push_line(line);
        if line_type == LineType::WorkUnitCleaningUp {
            unit.complete(index);
            debug!(
                folding_slot = tag.folding_slot,
                queue_index = tag.queue_index,
                end_index = index,
                "Unit run completed"
            );
        }

        slot.mark_dirty();
        client.mark_dirty();
    }

    /// Close the unit runs still open in the latest client run at their last
    /// line. They stay incomplete.
    pub fn finish(&mut self) {
        if let Some(client) = self.client_runs.last_mut() {
            close_open_unit_runs(client);
        }
        debug!(
            lines = self.next_index,
            client_runs = self.client_runs.len(),
            "Finished reading log"
        );
    }

    /// Discard every client run. The next line read is index 0 again.
    pub fn clear(&mut self) {
        self.client_runs.clear();
        self.next_index = 0;
    }

    pub fn client_runs(&self) -> &[ClientRun] {
        &self.client_runs
    }

    /// Number of lines appended since creation or the last clear.
    pub fn line_count(&self) -> u64 {
        self.next_index
    }

    fn ensure_client_run(&mut self, index: u64) -> &mut ClientRun {
        if self.client_runs.is_empty() {
            debug!(start_index = index, "Client run opened");
            self.client_runs.push(ClientRun::new(index));
        }
        let last = self.client_runs.len() - 1;
        &mut self.client_runs[last]
    }
}

fn close_open_unit_runs(client: &mut ClientRun) {
    for slot in client.slot_runs_mut() {
        for unit in slot.open_unit_runs_mut() {
            unit.close_at_last_line();
        }
    }
}

fn check_source(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(LogError::SourceNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(LogError::NotAFile(path.to_path_buf()));
    }
    Ok(())
}
