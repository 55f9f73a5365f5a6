//! Controller input sampling.
//!
//! Action state is synced once per rendering tick, then each hand's grip
//! pose and float actions are read. The trigger is turned into an edge
//! model with hysteresis so a value hovering around a single threshold
//! cannot chatter.

use tracing::{debug, trace, warn};

use crate::locomotion::WorldTransform;
use crate::pose::Pose;
use crate::xr::runtime::{ActionSync, FloatAction, XrRuntime};
use crate::XrError;

/// Trigger value above which a released trigger counts as pressed.
pub const TRIGGER_PRESS: f32 = 0.7;
/// Trigger value below which a pressed trigger counts as released.
pub const TRIGGER_RELEASE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    /// Sub-action path for this hand.
    pub fn path(self) -> &'static str {
        match self {
            Hand::Left => "/user/hand/left",
            Hand::Right => "/user/hand/right",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

/// Debounced trigger state. The `Just*` states last exactly one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerEdge {
    #[default]
    Released,
    JustPressed,
    Pressed,
    JustReleased,
}

impl TriggerEdge {
    /// Next edge state given the previous one and the current raw value.
    pub fn next(self, value: f32) -> Self {
        use TriggerEdge::*;
        if value > TRIGGER_PRESS {
            match self {
                Released | JustReleased => JustPressed,
                JustPressed | Pressed => Pressed,
            }
        } else if value < TRIGGER_RELEASE {
            match self {
                Pressed | JustPressed => JustReleased,
                Released | JustReleased => Released,
            }
        } else {
            self.settle()
        }
    }

    /// Drop a one-tick edge into its steady state.
    pub fn settle(self) -> Self {
        match self {
            TriggerEdge::JustPressed => TriggerEdge::Pressed,
            TriggerEdge::JustReleased => TriggerEdge::Released,
            steady => steady,
        }
    }

    pub fn is_down(self) -> bool {
        matches!(self, TriggerEdge::JustPressed | TriggerEdge::Pressed)
    }
}

/// Last sampled state of one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerState {
    /// Stage-space grip pose.
    pub local_pose: Pose,
    /// Grip pose after locomotion is applied.
    pub world_pose: Pose,
    pub visible: bool,
    pub stick_x: f32,
    pub stick_y: f32,
    pub trigger_value: f32,
    pub trigger_edge: TriggerEdge,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            local_pose: Pose::identity(),
            world_pose: Pose::identity(),
            visible: false,
            stick_x: 0.0,
            stick_y: 0.0,
            trigger_value: 0.0,
            trigger_edge: TriggerEdge::Released,
        }
    }
}

impl ControllerState {
    fn hide(&mut self) {
        self.visible = false;
        self.trigger_edge = self.trigger_edge.settle();
    }
}

fn read_values<R: XrRuntime + ?Sized>(runtime: &mut R, hand: Hand) -> Result<(f32, f32, f32), XrError> {
    Ok((
        runtime.float_action(FloatAction::StickX, hand)?,
        runtime.float_action(FloatAction::StickY, hand)?,
        runtime.float_action(FloatAction::Trigger, hand)?,
    ))
}

/// Samples both controllers once per rendering tick.
#[derive(Debug, Default)]
pub struct ControllerInputSampler {
    states: [ControllerState; 2],
}

impl ControllerInputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> &[ControllerState; 2] {
        &self.states
    }

    pub fn state(&self, hand: Hand) -> &ControllerState {
        &self.states[hand.index()]
    }

    /// Sync actions and sample both hands for `time`.
    pub fn sample_frame<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        time: i64,
    ) -> &[ControllerState; 2] {
        match runtime.sync_actions() {
            Ok(ActionSync::Synced) => {
                for hand in Hand::ALL {
                    self.sample(runtime, hand, time);
                }
            }
            Ok(ActionSync::NotFocused) => {
                trace!("XR input: session not focused, no input this tick");
                self.hide_all();
            }
            Err(e) => {
                warn!("XR input: {}", e);
                self.hide_all();
            }
        }
        &self.states
    }

    /// Sample one hand. Actions must already be synced for this tick.
    pub fn sample<R: XrRuntime + ?Sized>(
        &mut self,
        runtime: &mut R,
        hand: Hand,
        time: i64,
    ) -> &ControllerState {
        let state = &mut self.states[hand.index()];

        let location = match runtime.locate_hand(hand, time) {
            Ok(location) => location,
            Err(e) => {
                warn!("XR input: {} controller: {}", hand.as_str(), e);
                state.hide();
                return state;
            }
        };
        if !location.position_valid {
            if state.visible {
                debug!("XR input: {} controller lost tracking", hand.as_str());
            }
            state.hide();
            return state;
        }

        state.local_pose.position = location.pose.position;
        if location.orientation_valid {
            state.local_pose.orientation = location.pose.orientation;
        }
        state.visible = true;

        match read_values(runtime, hand) {
            Ok((x, y, trigger)) => {
                state.stick_x = x;
                state.stick_y = y;
                state.trigger_value = trigger;
                state.trigger_edge = state.trigger_edge.next(trigger);
                trace!(
                    "XR input: {} X {:.2} Y {:.2} trigger {:.2}",
                    hand.as_str(),
                    x,
                    y,
                    trigger
                );
            }
            Err(e) => {
                warn!("XR input: {} controller: {}", hand.as_str(), e);
                state.hide();
            }
        }
        state
    }

    /// Recompute world-space grip poses after locomotion moved.
    pub fn update_world_poses(&mut self, world: &WorldTransform) {
        for state in &mut self.states {
            state.world_pose = world.place(&state.local_pose);
        }
    }

    fn hide_all(&mut self) {
        for state in &mut self.states {
            state.hide();
        }
    }
}
