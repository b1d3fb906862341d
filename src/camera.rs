// src/camera.rs
//
// Server-local capture. A `CameraCapture` is owned by the session that
// started it: a reader thread keeps the latest frame, and `stop()` joins
// that thread before the handle is dropped or replaced.

use crate::error::CaptureError;
use crate::preprocessing::flip_horizontal;
use crate::types::{CameraConfig, Frame};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

const READ_INTERVAL: Duration = Duration::from_millis(10);

/// Anything that yields frames: a camera device, a test fixture.
pub trait FrameSource: Send + 'static {
    /// `Ok(None)` means the stream has ended.
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;
}

#[derive(Default)]
struct LatestFrame {
    seq: u64,
    frame: Option<Frame>,
}

pub struct CameraCapture {
    stopped: Arc<AtomicBool>,
    latest: Arc<Mutex<LatestFrame>>,
    frames_read: Arc<AtomicU64>,
    /// Why the reader thread quit on its own, if it did.
    failure: Arc<Mutex<Option<CaptureError>>>,
    thread: Option<JoinHandle<()>>,
}

impl CameraCapture {
    pub fn start(mut source: Box<dyn FrameSource>, mirror: bool) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let latest = Arc::new(Mutex::new(LatestFrame::default()));
        let frames_read = Arc::new(AtomicU64::new(0));
        let failure = Arc::new(Mutex::new(None));

        let thread = {
            let stopped = stopped.clone();
            let latest = latest.clone();
            let frames_read = frames_read.clone();
            let failure = failure.clone();
            std::thread::spawn(move || {
                while !stopped.load(Ordering::Acquire) {
                    match source.read() {
                        Ok(Some(mut frame)) => {
                            if mirror {
                                flip_horizontal(&mut frame);
                            }
                            let mut slot = latest.lock();
                            slot.seq += 1;
                            slot.frame = Some(frame);
                            frames_read.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(None) => {
                            info!("Camera stream ended");
                            *failure.lock() = Some(CaptureError::Ended);
                            break;
                        }
                        Err(e) => {
                            warn!("Camera read failed: {}", e);
                            *failure.lock() = Some(e);
                            break;
                        }
                    }
                    std::thread::sleep(READ_INTERVAL);
                }
                stopped.store(true, Ordering::Release);
                debug!("Camera reader thread exiting");
            })
        };

        Self {
            stopped,
            latest,
            frames_read,
            failure,
            thread: Some(thread),
        }
    }

    /// Latest frame newer than `after`, with its sequence number.
    pub fn next_frame(&self, after: u64) -> Option<(u64, Frame)> {
        let slot = self.latest.lock();
        match &slot.frame {
            Some(frame) if slot.seq > after => Some((slot.seq, frame.clone())),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::Acquire)
    }

    /// Flag observers can poll to learn the capture is gone.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read.load(Ordering::Relaxed)
    }

    /// The read error or end of stream that stopped the reader thread.
    /// `None` while running or after an explicit stop.
    pub fn take_failure(&self) -> Option<CaptureError> {
        self.failure.lock().take()
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    /// `stop()` on the blocking pool, for async callers.
    pub async fn release(self) {
        if let Err(e) = tokio::task::spawn_blocking(move || self.stop()).await {
            warn!("Failed to stop camera: {}", e);
        }
    }

    fn shutdown(&mut self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Camera reader thread panicked");
            }
            info!("Camera released");
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Open the configured camera device.
#[cfg(feature = "camera")]
pub fn open_camera(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    opencv_source::OpenCvCamera::open(config).map(|c| Box::new(c) as Box<dyn FrameSource>)
}

#[cfg(not(feature = "camera"))]
pub fn open_camera(_config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    Err(CaptureError::Unsupported)
}

#[cfg(feature = "camera")]
mod opencv_source {
    use super::FrameSource;
    use crate::error::CaptureError;
    use crate::types::{CameraConfig, Frame};
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture},
    };
    use tracing::{debug, info};

    pub struct OpenCvCamera {
        cap: VideoCapture,
    }

    impl OpenCvCamera {
        pub fn open(config: &CameraConfig) -> Result<Self, CaptureError> {
            let backends: &[i32] = if cfg!(windows) {
                &[videoio::CAP_DSHOW, videoio::CAP_MSMF]
            } else {
                &[videoio::CAP_ANY]
            };

            for index in [config.index, config.index + 1] {
                for &backend in backends {
                    debug!("Trying camera index {} with backend {}", index, backend);
                    match Self::try_open(index, backend) {
                        Ok(Some(mut cap)) => {
                            cap.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)
                                .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
                            cap.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)
                                .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
                            cap.set(videoio::CAP_PROP_FPS, config.fps as f64)
                                .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
                            info!("✓ Camera opened: index {}", index);
                            return Ok(Self { cap });
                        }
                        Ok(None) => {}
                        Err(e) => debug!("Camera index {} failed: {}", index, e),
                    }
                }
            }

            Err(CaptureError::Unavailable(
                "check that a camera is connected and not in use by another program".to_string(),
            ))
        }

        fn try_open(index: i32, backend: i32) -> opencv::Result<Option<VideoCapture>> {
            let mut cap = VideoCapture::new(index, backend)?;
            if !cap.is_opened()? {
                return Ok(None);
            }
            // Confirm the device actually delivers frames
            let mut probe = Mat::default();
            if cap.read(&mut probe)? && !probe.empty() {
                Ok(Some(cap))
            } else {
                cap.release()?;
                Ok(None)
            }
        }
    }

    impl FrameSource for OpenCvCamera {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            let mut mat = Mat::default();
            let grabbed = self
                .cap
                .read(&mut mat)
                .map_err(|e| CaptureError::Read(e.to_string()))?;
            if !grabbed || mat.empty() {
                return Ok(None);
            }

            let mut rgb = Mat::default();
            imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
                .map_err(|e| CaptureError::Read(e.to_string()))?;
            let data = rgb
                .data_bytes()
                .map_err(|e| CaptureError::Read(e.to_string()))?
                .to_vec();

            Ok(Some(Frame::new(data, rgb.cols() as usize, rgb.rows() as usize)))
        }
    }

    impl Drop for OpenCvCamera {
        fn drop(&mut self) {
            let _ = self.cap.release();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Instant;

    /// Yields `remaining` solid frames, then ends the stream.
    pub(crate) struct FakeSource {
        pub remaining: Option<u32>,
        pub value: u8,
    }

    impl FrameSource for FakeSource {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            match &mut self.remaining {
                Some(0) => Ok(None),
                Some(n) => {
                    *n -= 1;
                    Ok(Some(Frame::new(vec![self.value; 4 * 2 * 3], 4, 2)))
                }
                None => Ok(Some(Frame::new(vec![self.value; 4 * 2 * 3], 4, 2))),
            }
        }
    }

    /// Yields `frames` solid frames, then fails like an unplugged device.
    pub(crate) struct FailingSource {
        pub frames: u32,
    }

    impl FrameSource for FailingSource {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            if self.frames == 0 {
                return Err(CaptureError::Read("device unplugged".to_string()));
            }
            self.frames -= 1;
            Ok(Some(Frame::new(vec![200; 4 * 2 * 3], 4, 2)))
        }
    }

    /// Every read takes `delay`, like a device waiting on its next frame.
    pub(crate) struct SlowSource {
        pub delay: Duration,
    }

    impl FrameSource for SlowSource {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            std::thread::sleep(self.delay);
            Ok(Some(Frame::new(vec![1; 4 * 2 * 3], 4, 2)))
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_capture_delivers_new_frames_only() {
        let capture = CameraCapture::start(
            Box::new(FakeSource {
                remaining: None,
                value: 7,
            }),
            false,
        );

        assert!(wait_for(|| capture.next_frame(0).is_some()));
        let (seq, frame) = capture.next_frame(0).unwrap();
        assert_eq!(frame.width, 4);
        assert!(frame.data.iter().all(|&v| v == 7));

        assert!(wait_for(|| capture.next_frame(seq).is_some()));
        capture.stop();
    }

    #[test]
    fn test_stop_releases_thread() {
        let capture = CameraCapture::start(
            Box::new(FakeSource {
                remaining: None,
                value: 1,
            }),
            true,
        );
        let signal = capture.stop_signal();
        assert!(capture.is_running());
        capture.stop();
        assert!(signal.load(Ordering::Acquire));
    }

    #[test]
    fn test_end_of_stream_stops_capture() {
        let capture = CameraCapture::start(
            Box::new(FakeSource {
                remaining: Some(2),
                value: 1,
            }),
            false,
        );
        assert!(wait_for(|| !capture.is_running()));
        assert_eq!(capture.frames_read(), 2);
    }

    #[test]
    fn test_read_error_stops_capture() {
        let capture = CameraCapture::start(Box::new(FailingSource { frames: 0 }), false);
        assert!(wait_for(|| !capture.is_running()));
        assert!(capture.next_frame(0).is_none());
        assert!(matches!(capture.take_failure(), Some(CaptureError::Read(_))));
        assert!(capture.take_failure().is_none());
    }

    #[test]
    fn test_failure_only_recorded_when_reader_quits() {
        let ended = CameraCapture::start(
            Box::new(FakeSource {
                remaining: Some(1),
                value: 1,
            }),
            false,
        );
        assert!(wait_for(|| !ended.is_running()));
        assert!(matches!(ended.take_failure(), Some(CaptureError::Ended)));

        let stopped = CameraCapture::start(
            Box::new(FakeSource {
                remaining: None,
                value: 1,
            }),
            false,
        );
        let failure = stopped.failure.clone();
        stopped.stop();
        assert!(failure.lock().is_none());
    }

    #[tokio::test]
    async fn test_release_does_not_block_executor() {
        let capture = CameraCapture::start(
            Box::new(SlowSource {
                delay: Duration::from_millis(300),
            }),
            false,
        );
        let signal = capture.stop_signal();
        // let the reader thread enter its first read
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ticks = Arc::new(AtomicU64::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };

        capture.release().await;
        ticker.abort();
        assert!(signal.load(Ordering::Acquire));
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[cfg(not(feature = "camera"))]
    #[test]
    fn test_open_without_camera_support() {
        assert!(matches!(
            open_camera(&CameraConfig::default()),
            Err(CaptureError::Unsupported)
        ));
    }
}
