//! Suggested interaction-profile bindings.
//!
//! Each profile maps the grip pose and three float actions onto the
//! physical inputs of one controller family. Inputs are relative to the
//! hand paths (`/user/hand/{left,right}`); both hands get the same suffix.

use crate::input::Hand;
use crate::xr::runtime::FloatAction;

pub const POSE_ACTION: &str = "grip_pose";
pub const POSE_ACTION_LOCALIZED: &str = "Grip Pose";
pub const ACTION_SET: &str = "viewer";
pub const ACTION_SET_LOCALIZED: &str = "Viewer";

/// Input suffixes for one interaction profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileBinding {
    pub profile: &'static str,
    pub pose: &'static str,
    pub stick_x: &'static str,
    pub stick_y: &'static str,
    pub trigger: &'static str,
}

impl ProfileBinding {
    pub fn input_for(&self, action: FloatAction) -> &'static str {
        match action {
            FloatAction::StickX => self.stick_x,
            FloatAction::StickY => self.stick_y,
            FloatAction::Trigger => self.trigger,
        }
    }

    /// Full binding paths for `hand`: (action name, input path).
    pub fn paths(&self, hand: Hand) -> Vec<(&'static str, String)> {
        let mut out = vec![(POSE_ACTION, format!("{}{}", hand.path(), self.pose))];
        for action in FloatAction::ALL {
            out.push((action.name(), format!("{}{}", hand.path(), self.input_for(action))));
        }
        out
    }
}

pub const VALVE_INDEX: ProfileBinding = ProfileBinding {
    profile: "/interaction_profiles/valve/index_controller",
    pose: "/input/grip/pose",
    stick_x: "/input/thumbstick/x",
    stick_y: "/input/thumbstick/y",
    trigger: "/input/trigger/value",
};

/// Vive wands have a trackpad in place of a stick.
pub const HTC_VIVE: ProfileBinding = ProfileBinding {
    profile: "/interaction_profiles/htc/vive_controller",
    pose: "/input/grip/pose",
    stick_x: "/input/trackpad/x",
    stick_y: "/input/trackpad/y",
    trigger: "/input/trigger/value",
};

pub const OCULUS_TOUCH: ProfileBinding = ProfileBinding {
    profile: "/interaction_profiles/oculus/touch_controller",
    pose: "/input/grip/pose",
    stick_x: "/input/thumbstick/x",
    stick_y: "/input/thumbstick/y",
    trigger: "/input/trigger/value",
};

pub const MICROSOFT_MOTION: ProfileBinding = ProfileBinding {
    profile: "/interaction_profiles/microsoft/motion_controller",
    pose: "/input/grip/pose",
    stick_x: "/input/thumbstick/x",
    stick_y: "/input/thumbstick/y",
    trigger: "/input/trigger/value",
};

pub fn default_bindings() -> Vec<ProfileBinding> {
    vec![VALVE_INDEX, HTC_VIVE, OCULUS_TOUCH, MICROSOFT_MOTION]
}
