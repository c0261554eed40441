//! Producer/consumer buffers between sensor callbacks and the stepping thread.
use super::SensorKind;
use crate::{
    base::{CollisionEvent, RawImage},
    PitlaneError,
};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use image::RgbImage;
use log::{debug, trace, warn};
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

/// Accumulated collision impulses below this value are treated as sensor noise.
pub const COLLISION_THRESHOLD: f64 = 2_000.0;

/// A decoded camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    /// Simulation frame in which the image was taken.
    pub frame: u64,

    /// RGB image.
    pub image: RgbImage,
}

impl SensorFrame {
    /// Converts a BGRA frame delivered by the simulator into RGB.
    pub fn from_bgra(raw: &RawImage) -> Result<Self, PitlaneError> {
        let expected = raw.width as usize * raw.height as usize * 4;
        if raw.bgra.len() != expected {
            return Err(PitlaneError::Simulator(format!(
                "frame {} has {} bytes, expected {} for {}x{} BGRA",
                raw.frame,
                raw.bgra.len(),
                expected,
                raw.width,
                raw.height
            )));
        }
        let rgb: Vec<u8> = raw
            .bgra
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect();
        let image = RgbImage::from_raw(raw.width, raw.height, rgb).ok_or_else(|| {
            PitlaneError::Simulator(format!("frame {} could not be converted", raw.frame))
        })?;
        Ok(Self {
            frame: raw.frame,
            image,
        })
    }

    /// A black frame, used as a placeholder when deriving report schemas.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            frame: 0,
            image: RgbImage::new(width, height),
        }
    }
}

/// Producer side of a [`SensorChannel`], moved into the sensor callback.
#[derive(Debug, Clone)]
pub struct FrameSink {
    kind: SensorKind,
    sender: Sender<SensorFrame>,
}

impl FrameSink {
    /// Converts and enqueues a frame.
    ///
    /// Called on the simulator's delivery thread. It never blocks; malformed
    /// frames and frames arriving after the channel was dropped are discarded.
    pub fn on_frame(&self, raw: RawImage) {
        match SensorFrame::from_bgra(&raw) {
            Ok(frame) => {
                if self.sender.send(frame).is_err() {
                    debug!("Sensor {} closed, dropped frame {}", self.kind, raw.frame);
                }
            }
            Err(e) => warn!("Sensor {} dropped a frame: {}", self.kind, e),
        }
    }
}

/// Asynchronous delivery buffer of one camera sensor.
///
/// Frames enter an unbounded FIFO queue through [`FrameSink::on_frame`]. The
/// stepping thread moves them one by one into the retained buffer with
/// [`SensorChannel::drain_one`] and evicts them with [`SensorChannel::release`].
/// The retained buffer never holds more than `window` frames.
///
/// [`SensorChannel::fetch`] pulls the next frame out of the queue without
/// retaining it yet. A fetched frame is the one the next
/// [`SensorChannel::drain_one`] retains, so several channels can be fetched
/// first and drained only once all of them have a frame.
#[derive(Debug)]
pub struct SensorChannel {
    kind: SensorKind,
    receiver: Receiver<SensorFrame>,
    staged: Option<SensorFrame>,
    retained: VecDeque<SensorFrame>,
    window: usize,
    timeout: Duration,
}

impl SensorChannel {
    /// Creates a channel and the sink feeding it.
    ///
    /// `window` is the retention window, `timeout` bounds the wait in
    /// [`SensorChannel::drain_one`].
    pub fn new(kind: SensorKind, window: usize, timeout: Duration) -> (Self, FrameSink) {
        let (sender, receiver) = unbounded();
        let channel = Self {
            kind,
            receiver,
            staged: None,
            retained: VecDeque::with_capacity(window),
            window,
            timeout,
        };
        (channel, FrameSink { kind, sender })
    }

    /// Global indexes `[step, step + window)` labelling the frames of a step.
    ///
    /// A pure function of its arguments, independent of the buffer contents.
    pub fn indices_for_step(step: usize, window: usize) -> Vec<usize> {
        (step..step + window).collect()
    }

    /// Kind of the sensor.
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Retention window.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of frames waiting, fetched or still in the queue.
    pub fn queued(&self) -> usize {
        self.receiver.len() + self.staged.is_some() as usize
    }

    /// Number of retained frames.
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Copies of the retained frames, oldest first.
    pub fn retained(&self) -> Vec<SensorFrame> {
        self.retained.iter().cloned().collect()
    }

    /// Whether the frame taken in simulation frame `frame` is retained.
    pub fn retains(&self, frame: u64) -> bool {
        self.retained.iter().any(|f| f.frame == frame)
    }

    /// Most recently retained frame.
    pub fn newest(&self) -> Option<&SensorFrame> {
        self.retained.back()
    }

    /// Pulls the next frame from the queue and holds it for
    /// [`SensorChannel::drain_one`].
    ///
    /// Does nothing if a frame is already held. Blocks like
    /// [`SensorChannel::drain_one`].
    pub fn fetch(&mut self) -> Result<(), PitlaneError> {
        if self.staged.is_some() {
            return Ok(());
        }
        match self.receiver.recv_timeout(self.timeout) {
            Ok(frame) => {
                self.staged = Some(frame);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(PitlaneError::SensorTimeout {
                kind: self.kind,
                timeout: self.timeout,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(PitlaneError::SensorDisconnected(self.kind))
            }
        }
    }

    /// Moves exactly one frame from the queue to the tail of the retained buffer.
    ///
    /// Blocks until a frame arrives or the timeout of the channel elapses. The
    /// world must have been ticked before calling this, otherwise no frame will
    /// arrive.
    pub fn drain_one(&mut self) -> Result<(), PitlaneError> {
        if self.retained.len() >= self.window {
            return Err(PitlaneError::RetentionExceeded {
                kind: self.kind,
                window: self.window,
            });
        }
        self.fetch()?;
        if let Some(frame) = self.staged.take() {
            trace!("Sensor {} retained frame {}", self.kind, frame.frame);
            self.retained.push_back(frame);
        }
        Ok(())
    }

    /// Evicts the oldest retained frame, passing it to `save` first.
    ///
    /// The frame is evicted even if `save` fails; the error is returned
    /// afterwards. Releasing an empty buffer does nothing.
    pub fn release(&mut self, save: Option<&dyn Fn(&SensorFrame) -> Result<()>>) -> Result<()> {
        let frame = match self.retained.pop_front() {
            Some(frame) => frame,
            None => {
                debug!("Sensor {} has no retained frame to release", self.kind);
                return Ok(());
            }
        };
        match save {
            Some(save) => save(&frame),
            None => Ok(()),
        }
    }

    /// Drops the fetched frame and the frames waiting in the queue without
    /// blocking.
    ///
    /// Returns the number of dropped frames.
    pub fn discard_pending(&mut self) -> usize {
        self.staged.take().is_some() as usize + self.receiver.try_iter().count()
    }

    /// Drops queued and retained frames.
    pub fn clear(&mut self) -> usize {
        let n = self.retained.len() + self.discard_pending();
        self.retained.clear();
        n
    }
}

/// Running total of collision impulses, shared with the collision callback.
#[derive(Debug, Clone, Default)]
pub struct CollisionAccumulator(Arc<Mutex<f64>>);

impl CollisionAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the impulse of a collision, the sum of its normal impulse components.
    pub fn record(&self, event: &CollisionEvent) {
        let impulse = event.normal_impulse.component_sum();
        debug!("Collision in frame {}, impulse {}", event.frame, impulse);
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) += impulse;
    }

    /// Sum of all recorded impulses.
    pub fn total(&self) -> f64 {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accumulated impulse, or 0 while it stays below [`COLLISION_THRESHOLD`].
    pub fn magnitude(&self) -> f64 {
        let total = self.total();
        if total > COLLISION_THRESHOLD {
            total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Vector3;
    use std::cell::RefCell;

    fn raw(frame: u64) -> RawImage {
        RawImage {
            frame,
            width: 2,
            height: 1,
            bgra: vec![1, 2, 3, 255, 4, 5, 6, 255],
        }
    }

    fn channel(window: usize) -> (SensorChannel, FrameSink) {
        SensorChannel::new(SensorKind::Rgb, window, Duration::from_millis(50))
    }

    #[test_log::test]
    fn indices_do_not_depend_on_buffer() {
        assert_eq!(SensorChannel::indices_for_step(5, 3), vec![5, 6, 7]);
        assert!(SensorChannel::indices_for_step(5, 0).is_empty());
    }

    #[test_log::test]
    fn bgra_is_converted_to_rgb() {
        let frame = SensorFrame::from_bgra(&raw(7)).unwrap();
        assert_eq!(frame.frame, 7);
        assert_eq!(frame.image.as_raw(), &vec![3, 2, 1, 6, 5, 4]);

        let mut bad = raw(8);
        bad.bgra.pop();
        assert!(SensorFrame::from_bgra(&bad).is_err());
    }

    #[test_log::test]
    fn round_trip_leaves_channel_empty() {
        let (mut channel, sink) = channel(1);
        for i in 0..10 {
            sink.on_frame(raw(i));
        }
        assert_eq!(channel.queued(), 10);

        let saved = RefCell::new(vec![]);
        for _ in 0..10 {
            channel.drain_one().unwrap();
            assert_eq!(channel.retained_len(), 1);
            channel
                .release(Some(&|f: &SensorFrame| {
                    saved.borrow_mut().push(f.frame);
                    Ok(())
                }))
                .unwrap();
        }
        assert_eq!(channel.queued(), 0);
        assert_eq!(channel.retained_len(), 0);
        assert_eq!(saved.into_inner(), (0..10).collect::<Vec<_>>());
    }

    #[test_log::test]
    fn frames_from_another_thread_keep_arrival_order() {
        let (mut channel, sink) = channel(1);
        let handle = std::thread::spawn(move || {
            for i in 0..100 {
                sink.on_frame(raw(i));
            }
        });
        for i in 0..100 {
            channel.drain_one().unwrap();
            assert_eq!(channel.retained()[0].frame, i);
            channel.release(None).unwrap();
        }
        handle.join().unwrap();
    }

    #[test_log::test]
    fn drain_times_out_without_frames() {
        let (mut channel, _sink) = channel(1);
        match channel.drain_one() {
            Err(PitlaneError::SensorTimeout { kind, .. }) => assert_eq!(kind, SensorKind::Rgb),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test_log::test]
    fn drain_reports_disconnected_producer() {
        let (mut channel, sink) = channel(1);
        drop(sink);
        assert!(matches!(
            channel.drain_one(),
            Err(PitlaneError::SensorDisconnected(SensorKind::Rgb))
        ));
    }

    #[test_log::test]
    fn retention_window_is_enforced() {
        let (mut channel, sink) = channel(2);
        for i in 0..3 {
            sink.on_frame(raw(i));
        }
        channel.drain_one().unwrap();
        channel.drain_one().unwrap();
        assert!(matches!(
            channel.drain_one(),
            Err(PitlaneError::RetentionExceeded { window: 2, .. })
        ));
        assert_eq!(channel.queued(), 1);
    }

    #[test_log::test]
    fn failed_save_still_evicts() {
        let (mut channel, sink) = channel(1);
        sink.on_frame(raw(0));
        channel.drain_one().unwrap();
        let result = channel.release(Some(&|_: &SensorFrame| anyhow::bail!("disk full")));
        assert!(result.is_err());
        assert_eq!(channel.retained_len(), 0);
    }

    #[test_log::test]
    fn fetched_frame_waits_for_lagging_channel() {
        let (mut rgb, rgb_sink) = channel(2);
        let (mut depth, depth_sink) =
            SensorChannel::new(SensorKind::Depth, 2, Duration::from_millis(50));
        rgb_sink.on_frame(raw(0));

        rgb.fetch().unwrap();
        assert!(matches!(
            depth.fetch(),
            Err(PitlaneError::SensorTimeout {
                kind: SensorKind::Depth,
                ..
            })
        ));
        assert_eq!(rgb.retained_len(), 0);
        assert_eq!(rgb.queued(), 1);

        rgb_sink.on_frame(raw(1));
        depth_sink.on_frame(raw(0));
        rgb.fetch().unwrap();
        depth.fetch().unwrap();
        rgb.drain_one().unwrap();
        depth.drain_one().unwrap();
        assert_eq!(rgb.newest().map(|f| f.frame), Some(0));
        assert_eq!(depth.newest().map(|f| f.frame), Some(0));
        assert_eq!(rgb.queued(), 1);
        assert_eq!(rgb.discard_pending(), 1);
    }

    #[test_log::test]
    fn clear_drops_everything() {
        let (mut channel, sink) = channel(1);
        for i in 0..4 {
            sink.on_frame(raw(i));
        }
        channel.drain_one().unwrap();
        assert_eq!(channel.clear(), 4);
        assert_eq!(channel.queued(), 0);
        assert_eq!(channel.retained_len(), 0);
    }

    #[test_log::test]
    fn collisions_below_threshold_are_noise() {
        let acc = CollisionAccumulator::new();
        let hit = |x| CollisionEvent {
            frame: 1,
            normal_impulse: Vector3::new(x, 0.0, 0.0),
        };
        assert_eq!(acc.total(), 0.0);
        acc.record(&hit(1500.0));
        assert_eq!(acc.magnitude(), 0.0);
        acc.clone().record(&hit(600.0));
        assert_eq!(acc.total(), 2100.0);
        assert_eq!(acc.magnitude(), 2100.0);
    }
}
