use ash::prelude::VkResult;
use ash::vk;
use log::error;

/// Where `FramePipeline::frame` currently is. Re-enters `Idle` on every call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameState {
  Idle,
  ComputeSubmitted,
  ImageAcquired { image_idx: u32 },
  GraphicsSubmitted { image_idx: u32 },
  Presented,
  /// Surface is stale, frames are dropped till size-dependent resources are rebuilt
  Recreating,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameEvent {
  BeginFrame,
  SurfaceZeroSized,
  ComputeSubmitted,
  ImageAcquired { image_idx: u32 },
  AcquireStale,
  GraphicsSubmitted,
  Presented,
  PresentStale,
  Recreated,
}

impl FrameState {
  pub fn next(self, event: FrameEvent) -> FrameState {
    use FrameEvent as E;
    use FrameState as S;

    match (self, event) {
      (S::Idle | S::Presented, E::BeginFrame) => S::Idle,
      (S::Recreating, E::BeginFrame) => S::Recreating,
      (S::Idle, E::SurfaceZeroSized) => S::Idle,
      (S::Idle, E::ComputeSubmitted) => S::ComputeSubmitted,
      (S::ComputeSubmitted, E::ImageAcquired { image_idx }) => S::ImageAcquired { image_idx },
      (S::ComputeSubmitted, E::AcquireStale) => S::Recreating,
      (S::ImageAcquired { image_idx }, E::GraphicsSubmitted) => S::GraphicsSubmitted { image_idx },
      (S::GraphicsSubmitted { .. }, E::Presented) => S::Presented,
      (S::GraphicsSubmitted { .. }, E::PresentStale) => S::Recreating,
      // resize notification can come between frames
      (S::Idle | S::Presented | S::Recreating, E::Recreated) => S::Idle,
      (state, event) => {
        error!("Invalid frame state transition {:?} + {:?}", state, event);
        debug_assert!(false, "Invalid frame state transition");
        S::Recreating
      }
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
  StaleAcquire,
  StalePresent,
  SuboptimalPresent,
  ZeroSizedSurface,
  /// Previous frame went stale and nobody recreated the resources yet
  PendingRecreation,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
  Presented,
  Dropped(DropReason),
}

impl FrameOutcome {
  /// Caller should recreate swapchain and `FramePipeline` resources
  pub fn needs_recreation(&self) -> bool {
    match self {
      FrameOutcome::Presented => false,
      FrameOutcome::Dropped(DropReason::ZeroSizedSurface) => false,
      FrameOutcome::Dropped(_) => true,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
  /// Suboptimal images are still rendered to, recreation happens after present
  Acquired { image_idx: u32, suboptimal: bool },
  Stale,
}

pub fn classify_acquire(result: VkResult<(u32, bool)>) -> AcquireOutcome {
  match result {
    Ok((image_idx, suboptimal)) => AcquireOutcome::Acquired {
      image_idx,
      suboptimal,
    },
    Err(_) => AcquireOutcome::Stale,
  }
}

/// Anything except out-of-date is a real error
pub fn classify_present(result: VkResult<bool>) -> anyhow::Result<FrameOutcome> {
  match result {
    Ok(false) => Ok(FrameOutcome::Presented),
    Ok(true) => Ok(FrameOutcome::Dropped(DropReason::SuboptimalPresent)),
    Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameOutcome::Dropped(DropReason::StalePresent)),
    Err(err) => Err(anyhow::anyhow!("Failed to present swapchain image: {}", err)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn happy_path_returns_to_idle() {
    let s = FrameState::Idle
      .next(FrameEvent::BeginFrame)
      .next(FrameEvent::ComputeSubmitted)
      .next(FrameEvent::ImageAcquired { image_idx: 2 });
    assert_eq!(s, FrameState::ImageAcquired { image_idx: 2 });
    let s = s.next(FrameEvent::GraphicsSubmitted);
    assert_eq!(s, FrameState::GraphicsSubmitted { image_idx: 2 });
    let s = s.next(FrameEvent::Presented);
    assert_eq!(s, FrameState::Presented);
    assert_eq!(s.next(FrameEvent::BeginFrame), FrameState::Idle);
  }

  #[test]
  fn stale_acquire_drops_frame_until_recreated() {
    let s = FrameState::Idle
      .next(FrameEvent::ComputeSubmitted)
      .next(FrameEvent::AcquireStale);
    assert_eq!(s, FrameState::Recreating);
    // frames keep being dropped
    assert_eq!(s.next(FrameEvent::BeginFrame), FrameState::Recreating);
    assert_eq!(s.next(FrameEvent::Recreated), FrameState::Idle);
  }

  #[test]
  fn stale_present_goes_to_recreating() {
    let s = FrameState::GraphicsSubmitted { image_idx: 0 }.next(FrameEvent::PresentStale);
    assert_eq!(s, FrameState::Recreating);
  }

  #[test]
  fn zero_sized_surface_stays_idle() {
    let s = FrameState::Idle.next(FrameEvent::SurfaceZeroSized);
    assert_eq!(s, FrameState::Idle);
  }

  #[test]
  #[cfg(debug_assertions)]
  #[should_panic]
  fn invalid_transition_panics_in_debug() {
    FrameState::Idle.next(FrameEvent::Presented);
  }

  #[test]
  fn acquire_classification() {
    assert_eq!(
      classify_acquire(Ok((1, false))),
      AcquireOutcome::Acquired {
        image_idx: 1,
        suboptimal: false
      }
    );
    assert_eq!(
      classify_acquire(Ok((3, true))),
      AcquireOutcome::Acquired {
        image_idx: 3,
        suboptimal: true
      }
    );
    assert_eq!(
      classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)),
      AcquireOutcome::Stale
    );
    assert_eq!(
      classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
      AcquireOutcome::Stale
    );
  }

  #[test]
  fn present_classification() {
    assert_eq!(classify_present(Ok(false)).unwrap(), FrameOutcome::Presented);
    assert_eq!(
      classify_present(Ok(true)).unwrap(),
      FrameOutcome::Dropped(DropReason::SuboptimalPresent)
    );
    assert_eq!(
      classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
      FrameOutcome::Dropped(DropReason::StalePresent)
    );
    assert!(classify_present(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
  }

  #[test]
  fn zero_sized_surface_does_not_need_recreation() {
    assert!(!FrameOutcome::Dropped(DropReason::ZeroSizedSurface).needs_recreation());
    assert!(FrameOutcome::Dropped(DropReason::StaleAcquire).needs_recreation());
    assert!(!FrameOutcome::Presented.needs_recreation());
  }
}
