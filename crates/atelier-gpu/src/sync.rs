//! Frame synchronization primitives.
//!
//! The engine's frame fence is a Vulkan timeline semaphore: a monotonically
//! increasing 64-bit counter the queue signals on completion and the CPU
//! waits on. [`FrameRing`] records which fence value covers each frame
//! slot's last submission and refuses to hand a slot back out until the GPU
//! has reached that value, so per-frame command allocators and constant
//! buffers can never be reset while still in use.

use crate::error::{GpuError, Result};
use ash::vk;
use std::sync::Arc;
use std::time::Duration;

/// Default fence wait timeout. A wait exceeding this is treated as a
/// device-lost-grade failure rather than spinning forever.
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Signal/wait interface of the frame fence.
///
/// [`TimelineFence`] implements this against the device; tests drive the
/// ring with a simulated fence instead.
pub trait FenceOps {
    /// Post the next fence value on the queue and return it. Successive
    /// calls return values increasing by exactly 1.
    fn signal(&mut self) -> Result<u64>;

    /// The counter value the GPU has reached.
    fn completed(&self) -> Result<u64>;

    /// Block until the counter reaches `value`, or fail with
    /// [`GpuError::SynchronizationTimeout`].
    fn wait(&self, value: u64) -> Result<()>;

    /// The most recently signaled target value.
    fn last_signaled(&self) -> u64;
}

/// Timeline-semaphore frame fence bound to one queue.
pub struct TimelineFence {
    device: Arc<ash::Device>,
    queue: vk::Queue,
    semaphore: vk::Semaphore,
    last_signaled: u64,
    timeout: Duration,
}

impl TimelineFence {
    /// Create a fence with its counter at zero.
    ///
    /// # Safety
    /// The device and queue must be valid, and the device must have been
    /// created with the timeline-semaphore feature enabled.
    pub unsafe fn new(
        device: Arc<ash::Device>,
        queue: vk::Queue,
        timeout: Duration,
    ) -> Result<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore = device
            .create_semaphore(&create_info, None)
            .map_err(|e| GpuError::ResourceCreation(format!("timeline semaphore: {e}")))?;

        Ok(Self {
            device,
            queue,
            semaphore,
            last_signaled: 0,
            timeout,
        })
    }

    /// The underlying semaphore, for inclusion in command submissions.
    pub fn semaphore(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Wait until every value signaled so far has completed.
    pub fn flush(&self) -> Result<()> {
        if self.last_signaled == 0 {
            return Ok(());
        }
        self.wait(self.last_signaled)
    }

    /// Destroy the semaphore.
    ///
    /// # Safety
    /// No queue work referencing the semaphore may be pending.
    pub unsafe fn destroy(&self) {
        self.device.destroy_semaphore(self.semaphore, None);
    }
}

impl FenceOps for TimelineFence {
    fn signal(&mut self) -> Result<u64> {
        let value = self.last_signaled + 1;

        let signal_info = vk::SemaphoreSubmitInfo::default()
            .semaphore(self.semaphore)
            .value(value)
            .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS);
        let submit_info =
            vk::SubmitInfo2::default().signal_semaphore_infos(std::slice::from_ref(&signal_info));

        // A signal-only submission after the frame's work; queue ordering
        // guarantees the value is reached only once that work completes.
        unsafe {
            self.device
                .queue_submit2(self.queue, &[submit_info], vk::Fence::null())?;
        }

        self.last_signaled = value;
        Ok(value)
    }

    fn completed(&self) -> Result<u64> {
        let value = unsafe { self.device.get_semaphore_counter_value(self.semaphore)? };
        Ok(value)
    }

    fn wait(&self, value: u64) -> Result<()> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);

        let timeout_ns = u64::try_from(self.timeout.as_nanos()).unwrap_or(u64::MAX);
        match unsafe { self.device.wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(GpuError::SynchronizationTimeout {
                value,
                waited_ms: self.timeout.as_millis() as u64,
            }),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    fn last_signaled(&self) -> u64 {
        self.last_signaled
    }
}

/// Create a binary semaphore (swapchain acquire/present handoff).
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_binary_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = device
        .create_semaphore(&create_info, None)
        .map_err(|e| GpuError::ResourceCreation(format!("binary semaphore: {e}")))?;
    Ok(semaphore)
}

/// Exclusive token for one frame slot.
///
/// A slot can only be obtained through [`FrameRing::acquire`], which waits
/// for the slot's previous submission first. The token is consumed by
/// [`FrameRing::submit`], so resetting a slot's resources ahead of its fence
/// is unreachable through this API.
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
}

impl FrameSlot {
    /// Index of this slot within the ring.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Ring of per-frame resource slots gated on the frame fence.
pub struct FrameRing {
    last_submitted: Vec<u64>,
    cursor: usize,
}

impl FrameRing {
    /// Create a ring for the given number of frames in flight.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight >= 1, "ring needs at least one slot");
        Self {
            last_submitted: vec![0; frames_in_flight],
            cursor: 0,
        }
    }

    /// Number of frames in flight.
    pub fn frames_in_flight(&self) -> usize {
        self.last_submitted.len()
    }

    /// Fence value recorded against a slot's last submission (0 if the slot
    /// has never been submitted).
    pub fn last_submitted(&self, index: usize) -> u64 {
        self.last_submitted[index]
    }

    /// Wait for the next slot's previous submission to retire, then hand the
    /// slot out.
    ///
    /// Returns [`GpuError::InvalidState`] if the fence reports a completed
    /// value below the slot's recorded value after the wait; that indicates
    /// a broken fence and is fatal.
    pub fn acquire<F: FenceOps>(&mut self, fence: &F) -> Result<FrameSlot> {
        let index = self.cursor;
        let pending = self.last_submitted[index];

        if pending > 0 {
            fence.wait(pending)?;
            let completed = fence.completed()?;
            if completed < pending {
                return Err(GpuError::InvalidState(format!(
                    "frame slot {index} released before fence value {pending} completed (fence at {completed})"
                )));
            }
        }

        Ok(FrameSlot { index })
    }

    /// Record the fence value covering work submitted from this slot and
    /// advance the ring. Consumes the slot token.
    pub fn submit(&mut self, slot: FrameSlot, fence_value: u64) {
        self.last_submitted[slot.index] = fence_value;
        self.cursor = (slot.index + 1) % self.last_submitted.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fence backed by a simulated queue; `retire` stands in for GPU
    /// progress.
    struct SimFence {
        target: u64,
        completed: u64,
    }

    impl SimFence {
        fn new() -> Self {
            Self {
                target: 0,
                completed: 0,
            }
        }

        fn retire(&mut self, value: u64) {
            self.completed = self.completed.max(value);
        }
    }

    impl FenceOps for SimFence {
        fn signal(&mut self) -> Result<u64> {
            self.target += 1;
            Ok(self.target)
        }

        fn completed(&self) -> Result<u64> {
            Ok(self.completed)
        }

        fn wait(&self, value: u64) -> Result<()> {
            if self.completed >= value {
                Ok(())
            } else {
                Err(GpuError::SynchronizationTimeout {
                    value,
                    waited_ms: 0,
                })
            }
        }

        fn last_signaled(&self) -> u64 {
            self.target
        }
    }

    #[test]
    fn signal_values_increase_by_one() {
        let mut fence = SimFence::new();
        assert_eq!(fence.signal().unwrap(), 1);
        assert_eq!(fence.signal().unwrap(), 2);
        assert_eq!(fence.signal().unwrap(), 3);
        assert_eq!(fence.last_signaled(), 3);
    }

    #[test]
    fn fresh_slots_need_no_wait() {
        let fence = SimFence::new();
        let mut ring = FrameRing::new(3);

        // Nothing submitted yet, so all three slots come out immediately.
        for expected in 0..3 {
            let slot = ring.acquire(&fence).unwrap();
            assert_eq!(slot.index(), expected);
            ring.submit(slot, 0);
        }
    }

    #[test]
    fn slot_reuse_waits_for_recorded_value() {
        let mut fence = SimFence::new();
        let mut ring = FrameRing::new(2);

        let slot = ring.acquire(&fence).unwrap();
        let value = fence.signal().unwrap();
        ring.submit(slot, value);

        let slot = ring.acquire(&fence).unwrap();
        let value = fence.signal().unwrap();
        ring.submit(slot, value);

        // Slot 0's value (1) has not retired; acquiring it must fail.
        assert!(matches!(
            ring.acquire(&fence),
            Err(GpuError::SynchronizationTimeout { value: 1, .. })
        ));

        // Once the simulated queue retires value 1, slot 0 is available.
        fence.retire(1);
        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn three_frame_submit_and_wait_scenario() {
        let mut fence = SimFence::new();
        let mut ring = FrameRing::new(3);

        // Submit three frames; signals return 1, 2, 3.
        for expected in 1..=3u64 {
            let slot = ring.acquire(&fence).unwrap();
            let value = fence.signal().unwrap();
            assert_eq!(value, expected);
            ring.submit(slot, value);
        }

        // Waiting on value 2 only succeeds once the queue reports >= 2.
        assert!(fence.wait(2).is_err());
        fence.retire(2);
        fence.wait(2).unwrap();

        // Frame 0 submitted value 1; with completed >= 1 its slot is
        // acquirable (and therefore resettable).
        assert!(fence.completed().unwrap() >= ring.last_submitted(0));
        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn slot_parked_behind_unsignaled_value_is_withheld() {
        let mut fence = SimFence::new();
        let mut ring = FrameRing::new(2);

        // Work reached the queue but the signal was lost; the slot is
        // parked behind the value that would have been signaled.
        let slot = ring.acquire(&fence).unwrap();
        ring.submit(slot, fence.last_signaled() + 1);

        // The other slot is unaffected.
        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 1);
        ring.submit(slot, 0);

        // The parked slot never comes back out while the fence sits below
        // the parked value.
        assert!(matches!(
            ring.acquire(&fence),
            Err(GpuError::SynchronizationTimeout { value: 1, .. })
        ));

        fence.retire(1);
        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn abandoned_slot_is_reissued() {
        let fence = SimFence::new();
        let mut ring = FrameRing::new(3);

        // Dropping the token without submitting (e.g. swapchain out of
        // date) leaves the cursor in place.
        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 0);
        drop(slot);

        let slot = ring.acquire(&fence).unwrap();
        assert_eq!(slot.index(), 0);
    }
}
