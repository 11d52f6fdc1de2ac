// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 图像序列帧源
//! Reads png/jpg/bmp files from a directory in file-name order

use super::FrameSource;
use crate::error::Result;
use crate::frame::Frame;
use log::{debug, info};
use std::path::{Path, PathBuf};

const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("📂 图像序列: {} ({} 帧)", dir.display(), files.len());
        Ok(Self {
            dir,
            files,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<Result<Frame>> {
        let path = self.files.get(self.next)?;
        let seq = self.next as u64;
        self.next += 1;
        debug!("读取帧 {}: {}", seq, path.display());
        Some(
            image::open(path)
                .map(|img| Frame::from_dynamic(seq, img))
                .map_err(Into::into),
        )
    }

    fn describe(&self) -> String {
        format!("image sequence {}", self.dir.display())
    }
}
