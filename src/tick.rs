//! # Multi-Tick Capture Controller
//!
//! Captures a whole engine tick. A request made at tick `T` begins the capture on tick `T+1` and ends it on tick `T+2`,
//! so the capture spans every render command enqueued in between, regardless of which viewport issued it.

use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
	Idle,
	/// A capture was requested at `tick`.
	CaptureRequested { tick: u64 },
	/// A capture requested at `requested` began at `began`.
	Capturing { requested: u64, began: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
	BeginCapture,
	EndCapture,
}

/// Single flight state machine: at most one capture is in flight and each accepted request yields exactly one begin and one end.
#[derive(Debug)]
pub struct FrameCaptureController {
	state: CaptureState,
}

impl Default for FrameCaptureController {
	fn default() -> Self { FrameCaptureController::new() }
}

impl FrameCaptureController {
	pub fn new() -> FrameCaptureController {
		FrameCaptureController { state: CaptureState::Idle }
	}

	pub fn state(&self) -> CaptureState { self.state }

	pub fn is_idle(&self) -> bool { self.state == CaptureState::Idle }

	/// The tick the in flight capture was requested at. Tick zero is a valid request tick, so idle is `None`.
	pub fn tick_number(&self) -> Option<u64> {
		match self.state {
			CaptureState::Idle => None,
			CaptureState::CaptureRequested { tick } => Some(tick),
			CaptureState::Capturing { requested, .. } => Some(requested),
		}
	}

	/// Requests a capture of the next tick. Returns `false`, changing nothing, if a capture is already in flight.
	pub fn request(&mut self, tick: u64) -> bool {
		if !self.is_idle() {
			if let Some(requested) = self.tick_number() {
				debug!("Ignoring capture request at tick {}, a capture requested at tick {} is in flight", tick, requested);
			}

			return false;
		}

		self.state = CaptureState::CaptureRequested { tick };

		true
	}

	/// Advances the state machine to `tick` and returns what the caller must do on this tick.
	pub fn on_tick(&mut self, tick: u64) -> Option<TickAction> {
		match self.state {
			CaptureState::CaptureRequested { tick: requested } if tick > requested => {
				self.state = CaptureState::Capturing { requested, began: tick };
				Some(TickAction::BeginCapture)
			}
			CaptureState::Capturing { began, .. } if tick > began => {
				self.state = CaptureState::Idle;
				Some(TickAction::EndCapture)
			}
			_ => None,
		}
	}
}
