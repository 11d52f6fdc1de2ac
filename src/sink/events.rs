// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 越线事件日志 (JSON Lines)

use super::TickSink;
use crate::detection::{CrossingEvent, Heading, Point2, TrackId};
use crate::error::Result;
use crate::pipeline::TickResult;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct EventRecord {
    timestamp: String,
    frame_seq: u64,
    object_id: TrackId,
    centroid: Point2,
    direction: Heading,
    total_count: u64,
}

impl From<&CrossingEvent> for EventRecord {
    fn from(event: &CrossingEvent) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            frame_seq: event.frame_seq,
            object_id: event.object_id,
            centroid: event.centroid,
            direction: event.heading,
            total_count: event.total_count,
        }
    }
}

pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    written: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!("📝 事件日志: {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TickSink for JsonLinesSink<W> {
    fn on_tick(&mut self, result: &TickResult) -> Result<()> {
        for event in &result.new_crossings {
            serde_json::to_writer(&mut self.writer, &EventRecord::from(event))?;
            self.writer.write_all(b"\n")?;
            self.written += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
