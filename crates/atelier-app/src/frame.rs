//! Per-frame context and the frame state machine.

use ash::vk;
use atelier_gpu::FrameConstants;

/// Where the frame loop currently is.
///
/// `Idle → Recording → Submitted → Idle`, entered fresh each frame.
/// Recording only begins after the frame slot's allocator has been handed
/// out (which implies the fence wait for its previous submission), and the
/// transition back to Idle happens at present, after the queue has the
/// work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Recording,
    Submitted,
}

impl FramePhase {
    /// Validate a transition, returning the new phase.
    pub fn advance(self, next: Self) -> Result<Self, InvalidTransition> {
        let valid = matches!(
            (self, next),
            (Self::Idle, Self::Recording)
                | (Self::Recording, Self::Submitted)
                | (Self::Submitted, Self::Idle)
        );
        if valid {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

/// A frame-phase transition that is not part of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: FramePhase,
    pub to: FramePhase,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid frame transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Context for the current frame being rendered.
pub struct FrameContext {
    /// Command buffer for recording rendering commands.
    pub command_buffer: vk::CommandBuffer,
    /// Index of the frame slot in the ring.
    pub slot_index: usize,
    /// Index of the acquired back buffer.
    pub back_buffer_index: u32,
    /// The back buffer image for this frame.
    pub back_buffer: vk::Image,
    /// Render-target view for the back buffer.
    pub rtv: vk::ImageView,
    /// Depth-stencil view for the main target.
    pub dsv: vk::ImageView,
    /// Current target extent.
    pub extent: vk::Extent2D,
    /// Per-frame constants; the app fills the camera matrices before
    /// returning from `render`, and the loop uploads them afterwards.
    pub constants: FrameConstants,
    /// Delta time since last frame in seconds.
    pub dt: f32,
    /// Current frame number.
    pub frame_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_transitions_are_valid() {
        let phase = FramePhase::Idle;
        let phase = phase.advance(FramePhase::Recording).unwrap();
        let phase = phase.advance(FramePhase::Submitted).unwrap();
        let phase = phase.advance(FramePhase::Idle).unwrap();
        assert_eq!(phase, FramePhase::Idle);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        assert!(FramePhase::Idle.advance(FramePhase::Submitted).is_err());
        assert!(FramePhase::Recording.advance(FramePhase::Idle).is_err());
        assert!(FramePhase::Submitted.advance(FramePhase::Recording).is_err());
    }

    #[test]
    fn reentering_the_same_phase_is_rejected() {
        assert!(FramePhase::Recording
            .advance(FramePhase::Recording)
            .is_err());
    }
}
