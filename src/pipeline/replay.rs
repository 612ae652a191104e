use crate::detection::{Detection, Detector};
use crate::pipeline::runner::FrameSource;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Offline frame source: a JSON lines file, every line holds the detections of one frame
///
pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
    dimensions: (u32, u32),
    line: usize,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>, dimensions: (u32, u32)) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Unable to open frame source {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            dimensions,
            line: 0,
        })
    }
}

impl FrameSource for ReplaySource {
    type Frame = Vec<Detection>;

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn next_frame(&mut self) -> Result<Option<Self::Frame>> {
        let Some(line) = self.lines.next() else {
            return Ok(None);
        };
        self.line += 1;
        let line = line?;
        if line.trim().is_empty() {
            return Ok(Some(Vec::default()));
        }
        let frame = serde_json::from_str(&line)
            .with_context(|| format!("Malformed frame at line {}", self.line))?;
        Ok(Some(frame))
    }
}

/// Detector for replayed frames which already carry their detections
///
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayDetector;

impl Detector for ReplayDetector {
    type Frame = Vec<Detection>;

    fn detect(&mut self, frame: &Self::Frame) -> Vec<Detection> {
        frame.clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::Detector;
    use crate::pipeline::replay::{ReplayDetector, ReplaySource};
    use crate::pipeline::runner::FrameSource;
    use std::io::Write;

    #[test]
    fn replay() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"[{{"box":{{"x_min":1,"y_min":2,"x_max":11,"y_max":12}},"score":0.9,"class_id":0}}]"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, "[]").unwrap();
        writeln!(file, "{{oops").unwrap();

        let mut source = ReplaySource::open(file.path(), (640, 480)).unwrap();
        assert_eq!(source.dimensions(), (640, 480));
        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(ReplayDetector.detect(&first).len(), 1);
        assert!(source.next_frame().unwrap().unwrap().is_empty());
        assert!(source.next_frame().unwrap().unwrap().is_empty());
        assert!(source.next_frame().is_err());
        assert!(source.next_frame().unwrap().is_none());

        assert!(ReplaySource::open("/nonexistent/frames.jsonl", (1, 1)).is_err());
    }
}
