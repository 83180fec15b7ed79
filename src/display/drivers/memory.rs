/*
 *  display/drivers/memory.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  In-memory panel for headless runs and testing without hardware
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::display::error::DisplayError;
use crate::display::framebuffer::DisplayFrame;
use crate::display::traits::{PanelCapabilities, PanelDriver};

/// In-memory panel
///
/// This panel simulates an LED matrix without requiring hardware. It's used for:
/// - Unit and integration tests
/// - Headless runs (optionally writing every shown frame as a PPM image)
///
/// Every operation is recorded in a shared state so tests can inspect what
/// the compositor pushed while the panel itself is owned elsewhere.
#[derive(Debug, Clone)]
pub struct MemoryPanel {
    /// Panel capabilities
    capabilities: PanelCapabilities,

    /// Write each shown frame here as PPM
    snapshot: Option<PathBuf>,

    /// Shared state for inspection
    state: Arc<Mutex<MemoryPanelState>>,
}

/// Recorded panel activity (shared for inspection in tests)
#[derive(Debug, Default)]
pub struct MemoryPanelState {
    /// Number of times init() was called
    pub init_count: usize,

    /// Number of frames latched via show()
    pub show_count: usize,

    /// Number of times clear() was called
    pub clear_count: usize,

    /// Every brightness value set, in order
    pub brightness_history: Vec<u8>,

    /// Last frame latched onto the panel
    pub last_frame: Option<DisplayFrame>,

    /// Keep every shown frame (off by default, frames are large)
    pub record_frames: bool,
    pub frames: Vec<DisplayFrame>,

    /// Simulate failures (for error testing)
    pub simulate_show_failure: bool,
    pub simulate_init_failure: bool,
}

impl MemoryPanelState {
    pub fn last_brightness(&self) -> Option<u8> {
        self.brightness_history.last().copied()
    }
}

impl MemoryPanel {
    /// Create a memory panel of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            capabilities: PanelCapabilities {
                width,
                height,
                supports_brightness: true,
            },
            snapshot: None,
            state: Arc::new(Mutex::new(MemoryPanelState::default())),
        }
    }

    /// Write every shown frame to `path` as a PPM image
    pub fn with_snapshot<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.snapshot = Some(path.into());
        self
    }

    /// Record every shown frame, not just the last one
    pub fn recording(self) -> Self {
        self.lock().record_frames = true;
        self
    }

    /// Get reference to state for inspection
    pub fn state(&self) -> Arc<Mutex<MemoryPanelState>> {
        Arc::clone(&self.state)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryPanelState> {
        // a panicked test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Save a frame as a binary PPM (P6) image
    pub fn save_to_ppm(frame: &DisplayFrame, path: &Path) -> std::io::Result<()> {
        let (w, h) = frame.dimensions();
        let mut file = BufWriter::new(File::create(path)?);

        // PPM header
        write!(file, "P6\n{} {}\n255\n", w, h)?;
        file.write_all(&frame.to_rgb_bytes())?;
        file.flush()
    }
}

impl PanelDriver for MemoryPanel {
    fn capabilities(&self) -> &PanelCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let mut state = self.lock();

        if state.simulate_init_failure {
            return Err(DisplayError::InitializationFailed("Simulated init failure".to_string()));
        }

        state.init_count += 1;
        Ok(())
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), DisplayError> {
        if percent > 100 {
            return Err(DisplayError::InvalidBrightness(percent));
        }
        self.lock().brightness_history.push(percent);
        Ok(())
    }

    fn show(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        let expected = self.dimensions();
        if frame.dimensions() != expected {
            return Err(DisplayError::FrameSizeMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }

        {
            let mut state = self.lock();
            if state.simulate_show_failure {
                return Err(DisplayError::Communication("Simulated show failure".to_string()));
            }
            state.show_count += 1;
            if state.record_frames {
                state.frames.push(frame.clone());
            }
            state.last_frame = Some(frame.clone());
        } // release before file I/O

        if let Some(path) = self.snapshot.as_ref() {
            debug!("Writing panel snapshot to {}", path.display());
            Self::save_to_ppm(frame, path)?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let (w, h) = self.dimensions();
        let mut state = self.lock();
        state.clear_count += 1;
        state.last_frame = Some(DisplayFrame::new(w, h));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::{Rgb888, RgbColor};

    #[test]
    fn test_memory_panel_init() {
        let mut panel = MemoryPanel::new(64, 32);
        let state = panel.state();
        assert_eq!(state.lock().unwrap().init_count, 0);

        panel.init().unwrap();
        assert_eq!(state.lock().unwrap().init_count, 1);
        assert_eq!(panel.dimensions(), (64, 32));
    }

    #[test]
    fn test_memory_panel_show_records_frames() {
        let mut panel = MemoryPanel::new(4, 4).recording();
        let mut frame = DisplayFrame::new(4, 4);
        frame.set_pixel(0, 0, Rgb888::GREEN);

        panel.show(&frame).unwrap();
        panel.show(&DisplayFrame::new(4, 4)).unwrap();

        let state = panel.state();
        let state = state.lock().unwrap();
        assert_eq!(state.show_count, 2);
        assert_eq!(state.frames.len(), 2);
        assert_eq!(state.frames[0].lit_count(), 1);
        assert_eq!(state.last_frame.as_ref().map(|f| f.lit_count()), Some(0));
    }

    #[test]
    fn test_memory_panel_rejects_wrong_size() {
        let mut panel = MemoryPanel::new(64, 32);
        let err = panel.show(&DisplayFrame::new(32, 32)).unwrap_err();
        assert!(matches!(err, DisplayError::FrameSizeMismatch { .. }));
    }

    #[test]
    fn test_memory_panel_brightness() {
        let mut panel = MemoryPanel::new(8, 8);
        panel.set_brightness(50).unwrap();
        panel.set_brightness(12).unwrap();
        assert!(panel.set_brightness(101).is_err());

        let state = panel.state();
        assert_eq!(state.lock().unwrap().brightness_history, vec![50, 12]);
        assert_eq!(state.lock().unwrap().last_brightness(), Some(12));
    }

    #[test]
    fn test_memory_panel_simulated_failure() {
        let mut panel = MemoryPanel::new(2, 2);
        panel.state().lock().unwrap().simulate_show_failure = true;
        assert!(panel.show(&DisplayFrame::new(2, 2)).is_err());

        panel.state().lock().unwrap().simulate_show_failure = false;
        assert!(panel.show(&DisplayFrame::new(2, 2)).is_ok());
    }

    #[test]
    fn test_snapshot_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");
        let mut panel = MemoryPanel::new(2, 1).with_snapshot(&path);
        let mut frame = DisplayFrame::new(2, 1);
        frame.set_pixel(1, 0, Rgb888::new(10, 20, 30));

        panel.show(&frame).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n2 1\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[0, 0, 0, 10, 20, 30]);
    }
}
