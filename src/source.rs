//! Frame sources. A source yields, frame by frame, what the external detector found.

use serde_derive::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;

pub trait VideoSource {
    /// Reported frame rate, `None` when unknown
    fn fps(&self) -> Option<f32>;

    /// `Ok(None)` on end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;

    fn release(&mut self) {}
}

impl<S: VideoSource + ?Sized> VideoSource for Box<S> {
    fn fps(&self) -> Option<f32> {
        (**self).fps()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Pre-recorded frames held in memory
#[derive(Debug)]
pub struct MemorySource {
    fps: Option<f32>,
    frames: std::vec::IntoIter<Frame>,
}

impl MemorySource {
    pub fn new(fps: Option<f32>, frames: Vec<Frame>) -> Self {
        Self {
            fps,
            frames: frames.into_iter(),
        }
    }

    /// Numbers the frames from 0 in the given order.
    pub fn from_detections(fps: Option<f32>, detections: Vec<Vec<Detection>>) -> Self {
        let frames = detections
            .into_iter()
            .enumerate()
            .map(|(idx, dets)| Frame::new(idx as u64, dets))
            .collect();

        Self::new(fps, frames)
    }
}

impl VideoSource for MemorySource {
    fn fps(&self) -> Option<f32> {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        Ok(self.frames.next())
    }

    fn release(&mut self) {
        self.frames = Vec::new().into_iter();
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDetection {
    Object(Detection),
    Corners([f32; 4]),
}

impl From<RawDetection> for Detection {
    fn from(raw: RawDetection) -> Self {
        match raw {
            RawDetection::Object(det) => det,
            RawDetection::Corners(c) => c.into(),
        }
    }
}

/// Replays a recorded detector output, one frame per line:
///
/// ```text
/// 0: [{"x1": 100.0, "y1": 200.0, "x2": 140.0, "y2": 230.0}]
/// 1: [[101.0, 201.0, 142.0, 231.0]]
/// [{"x1": 102.0, "y1": 202.0, "x2": 144.0, "y2": 232.0, "p": 0.8}]
/// ```
///
/// The `<frame>:` prefix is optional; without it frames are numbered by line. A blank line
/// is a frame without detections.
pub struct DetectionLog<R> {
    fps: Option<f32>,
    lines: Option<Lines<R>>,
    next_index: u64,
}

impl DetectionLog<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, fps: Option<f32>) -> Result<Self, Error> {
        let file = File::open(path.as_ref())?;
        log::info!("DetectionLog: replaying {}", path.as_ref().display());

        Ok(Self::from_reader(BufReader::new(file), fps))
    }
}

impl<R: BufRead> DetectionLog<R> {
    pub fn from_reader(reader: R, fps: Option<f32>) -> Self {
        Self {
            fps,
            lines: Some(reader.lines()),
            next_index: 0,
        }
    }
}

impl<R: BufRead> VideoSource for DetectionLog<R> {
    fn fps(&self) -> Option<f32> {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        let lines = match self.lines.as_mut() {
            Some(lines) => lines,
            None => return Ok(None),
        };

        let line = match lines.next() {
            Some(line) => line?,
            None => return Ok(None),
        };

        let frame = parse_line(&line, self.next_index)?;
        self.next_index = frame.index + 1;

        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.lines = None;
    }
}

fn parse_line(line: &str, fallback_index: u64) -> Result<Frame, Error> {
    let line = line.trim();

    if line.is_empty() {
        return Ok(Frame::new(fallback_index, Vec::new()));
    }

    let (index, vector) = if line.starts_with('[') {
        (fallback_index, line)
    } else if let Some(idx) = line.find(':') {
        let (prefix, rest) = line.split_at(idx);
        let index = prefix
            .trim()
            .parse()
            .map_err(|_| Error::Source(format!("bad frame number {:?}", prefix.trim())))?;

        (index, rest[1..].trim())
    } else {
        return Err(Error::Source(format!("unrecognised detection line {:?}", line)));
    };

    let detections = if vector.is_empty() {
        Vec::new()
    } else {
        serde_json::from_str::<Vec<RawDetection>>(vector)?
            .into_iter()
            .map(Into::into)
            .collect()
    };

    Ok(Frame::new(index, detections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_all_line_forms() {
        let text = "5: [{\"x1\": 1.0, \"y1\": 2.0, \"x2\": 3.0, \"y2\": 4.0}]\n\
                    [[10, 20, 30, 40], [0, 0, 5, 5]]\n\
                    \n\
                    9:\n";
        let mut log = DetectionLog::from_reader(Cursor::new(text), Some(25.0));

        let f = log.next_frame().unwrap().unwrap();
        assert_eq!(f.index, 5);
        assert_eq!(f.detections, vec![Detection::new(1.0, 2.0, 3.0, 4.0)]);

        let f = log.next_frame().unwrap().unwrap();
        assert_eq!(f.index, 6);
        assert_eq!(f.detections[0], Detection::new(10.0, 20.0, 30.0, 40.0));
        assert_eq!(f.len(), 2);

        let f = log.next_frame().unwrap().unwrap();
        assert_eq!(f.index, 7);
        assert!(f.is_empty());

        let f = log.next_frame().unwrap().unwrap();
        assert_eq!(f.index, 9);
        assert!(f.is_empty());

        assert!(log.next_frame().unwrap().is_none());
        assert_eq!(log.fps(), Some(25.0));
    }

    #[test]
    fn garbage_is_a_source_error() {
        let mut log = DetectionLog::from_reader(Cursor::new("hello\n"), None);

        assert!(matches!(log.next_frame(), Err(Error::Source(_))));

        let mut log = DetectionLog::from_reader(Cursor::new("1: [{\"x1\": 1}]\n"), None);
        assert!(matches!(log.next_frame(), Err(Error::Json(_))));
    }

    #[test]
    fn released_source_ends() {
        let mut log = DetectionLog::from_reader(Cursor::new("[]\n[]\n"), None);

        log.next_frame().unwrap();
        log.release();
        assert!(log.next_frame().unwrap().is_none());

        let mut mem = MemorySource::from_detections(None, vec![vec![], vec![]]);
        assert_eq!(mem.next_frame().unwrap().unwrap().index, 0);
        mem.release();
        assert!(mem.next_frame().unwrap().is_none());
    }
}
