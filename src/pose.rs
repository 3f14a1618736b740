use crate::{error::Error, point::Point};
use num_traits::FromPrimitive;
use ordered_float::NotNan;
use std::{fmt, str::FromStr};

/// Body parts reported by the upstream pose estimator, in the order it
/// reports them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, num_derive::FromPrimitive)]
pub(crate) enum LandmarkKind {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

pub(crate) const NUM_LANDMARKS: usize = 33;

const LANDMARK_NAMES: [&str; NUM_LANDMARKS] = [
    "nose",
    "left_eye_inner",
    "left_eye",
    "left_eye_outer",
    "right_eye_inner",
    "right_eye",
    "right_eye_outer",
    "left_ear",
    "right_ear",
    "mouth_left",
    "mouth_right",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_pinky",
    "right_pinky",
    "left_index",
    "right_index",
    "left_thumb",
    "right_thumb",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
    "left_heel",
    "right_heel",
    "left_foot_index",
    "right_foot_index",
];

impl LandmarkKind {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        self as usize
    }

    pub(crate) fn from_idx(idx: usize) -> Result<Self, Error> {
        Self::from_usize(idx).ok_or(Error::ConvertUSizeToLandmarkKind(idx))
    }

    pub(crate) fn name(self) -> &'static str {
        LANDMARK_NAMES[self.idx()]
    }
}

impl fmt::Display for LandmarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LandmarkKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        LANDMARK_NAMES
            .iter()
            .position(|&candidate| candidate == name)
            .ok_or_else(|| Error::UnknownLandmark(s.to_owned()))
            .and_then(Self::from_idx)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub(crate) struct Landmark {
    pub(crate) point: Point,
    pub(crate) visibility: f32,
}

impl Landmark {
    pub(crate) fn new(x: f32, y: f32, visibility: f32) -> Result<Self, Error> {
        let visibility = NotNan::new(visibility)
            .map_err(|e| Error::ConstructNotNan(e, visibility))?
            .into_inner()
            .clamp(0.0, 1.0);
        Ok(Self {
            point: Point::new(x, y)?,
            visibility,
        })
    }
}

pub(crate) type Landmarks = [Landmark; NUM_LANDMARKS];

/// One frame's worth of landmarks. Every landmark kind is always present;
/// an undetected body part shows up as low visibility.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Snapshot {
    landmarks: Landmarks,
}

impl Snapshot {
    pub(crate) fn new(landmarks: Landmarks) -> Self {
        Self { landmarks }
    }

    #[inline]
    pub(crate) fn get(&self, kind: LandmarkKind) -> Landmark {
        self.landmarks[kind.idx()]
    }

    #[inline]
    pub(crate) fn point(&self, kind: LandmarkKind) -> Point {
        self.get(kind).point
    }

    /// Mean visibility over `kinds`. An empty selection is fully visible.
    pub(crate) fn mean_visibility(&self, kinds: &[LandmarkKind]) -> f32 {
        if kinds.is_empty() {
            return 1.0;
        }
        let total: f32 = kinds.iter().map(|&kind| self.get(kind).visibility).sum();
        total / kinds.len() as f32
    }

    /// Copy of this snapshot with the visibility of `kinds` zeroed.
    pub(crate) fn exclude(&self, kinds: &[LandmarkKind]) -> Self {
        let mut landmarks = self.landmarks;
        for &kind in kinds {
            landmarks[kind.idx()].visibility = 0.0;
        }
        Self { landmarks }
    }

    #[cfg(test)]
    pub(crate) fn with(mut self, kind: LandmarkKind, x: f32, y: f32, visibility: f32) -> Self {
        self.landmarks[kind.idx()] = Landmark::new(x, y, visibility).unwrap();
        self
    }

    #[cfg(test)]
    pub(crate) fn with_visibility(mut self, kinds: &[LandmarkKind], visibility: f32) -> Self {
        for &kind in kinds {
            self.landmarks[kind.idx()].visibility = visibility;
        }
        self
    }

    /// Applies `p * scale + offset` to every landmark.
    #[cfg(test)]
    pub(crate) fn transformed(mut self, scale: f32, offset: (f32, f32)) -> Self {
        let offset = Point::new(offset.0, offset.1).unwrap();
        for landmark in self.landmarks.iter_mut() {
            landmark.point = landmark.point * scale + offset;
        }
        self
    }
}

impl TryFrom<Vec<Landmark>> for Snapshot {
    type Error = Error;

    fn try_from(landmarks: Vec<Landmark>) -> Result<Self, Self::Error> {
        let got = landmarks.len();
        Landmarks::try_from(landmarks)
            .map(Self::new)
            .map_err(|_| Error::InvalidInput {
                expected: NUM_LANDMARKS,
                got,
            })
    }
}

pub(crate) mod constants {
    use crate::pose::LandmarkKind::{self, *};

    /// Landmarks no move rule ever reads. Their visibility is zeroed before
    /// classification unless configured otherwise.
    pub(crate) const DEFAULT_EXCLUDED_LANDMARKS: [LandmarkKind; 20] = [
        LeftEyeInner,
        LeftEye,
        LeftEyeOuter,
        RightEyeInner,
        RightEye,
        RightEyeOuter,
        LeftEar,
        RightEar,
        MouthLeft,
        MouthRight,
        LeftPinky,
        RightPinky,
        LeftIndex,
        RightIndex,
        LeftThumb,
        RightThumb,
        LeftHeel,
        RightHeel,
        LeftFootIndex,
        RightFootIndex,
    ];
}

/// Snapshots of canonical poses shared by the tests of several modules.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Landmark, LandmarkKind::*, Snapshot, NUM_LANDMARKS};

    /// Upright, arms hanging, feet apart. No move rule fires on it.
    pub(crate) fn standing() -> Snapshot {
        let face = Landmark::new(0.5, 0.1, 1.0).unwrap();
        Snapshot::new([face; NUM_LANDMARKS])
            .with(LeftShoulder, 0.6, 0.3, 1.0)
            .with(RightShoulder, 0.4, 0.3, 1.0)
            .with(LeftElbow, 0.62, 0.45, 1.0)
            .with(RightElbow, 0.38, 0.45, 1.0)
            .with(LeftWrist, 0.63, 0.58, 1.0)
            .with(RightWrist, 0.37, 0.58, 1.0)
            .with(LeftHip, 0.56, 0.5, 1.0)
            .with(RightHip, 0.44, 0.5, 1.0)
            .with(LeftKnee, 0.57, 0.72, 1.0)
            .with(RightKnee, 0.43, 0.72, 1.0)
            .with(LeftAnkle, 0.58, 0.92, 1.0)
            .with(RightAnkle, 0.42, 0.92, 1.0)
    }

    pub(crate) fn jumping() -> Snapshot {
        standing()
            .with(LeftAnkle, 0.58, 0.3, 0.99)
            .with(RightAnkle, 0.42, 0.3, 0.99)
            .with(LeftKnee, 0.57, 0.6, 0.99)
            .with(RightKnee, 0.43, 0.6, 0.99)
    }

    pub(crate) fn crouching() -> Snapshot {
        standing()
            .with(Nose, 0.5, 0.45, 1.0)
            .with(LeftHip, 0.56, 0.7, 1.0)
            .with(RightHip, 0.44, 0.7, 1.0)
            .with(LeftKnee, 0.57, 0.75, 1.0)
            .with(RightKnee, 0.43, 0.75, 1.0)
    }

    pub(crate) fn leaning_left() -> Snapshot {
        standing()
            .with(LeftAnkle, 0.4, 0.92, 1.0)
            .with(RightAnkle, 0.3, 0.92, 1.0)
    }

    pub(crate) fn leaning_right() -> Snapshot {
        standing()
            .with(LeftAnkle, 0.7, 0.92, 1.0)
            .with(RightAnkle, 0.6, 0.92, 1.0)
    }

    pub(crate) fn left_arm_extended() -> Snapshot {
        standing()
            .with(LeftShoulder, 0.2, 0.5, 1.0)
            .with(LeftElbow, 0.4, 0.5, 1.0)
            .with(LeftWrist, 0.6, 0.5, 1.0)
    }

    pub(crate) fn right_arm_extended() -> Snapshot {
        standing()
            .with(RightShoulder, 0.8, 0.3, 1.0)
            .with(RightElbow, 0.6, 0.3, 1.0)
            .with(RightWrist, 0.4, 0.3, 1.0)
    }

    pub(crate) fn left_leg_raised() -> Snapshot {
        standing().with(LeftAnkle, 0.9, 0.55, 1.0)
    }

    pub(crate) fn right_leg_raised() -> Snapshot {
        standing().with(RightAnkle, 0.1, 0.55, 1.0)
    }

    pub(crate) fn right_arm_overhead() -> Snapshot {
        standing()
            .with(RightElbow, 0.4, 0.07, 1.0)
            .with(RightWrist, 0.4, 0.02, 1.0)
            .with_visibility(&[LeftWrist, LeftElbow], 0.0)
    }

    pub(crate) fn forearms_together() -> Snapshot {
        standing()
            .with(LeftElbow, 0.7, 0.4, 1.0)
            .with(RightElbow, 0.3, 0.4, 1.0)
            .with(LeftWrist, 0.53, 0.4, 1.0)
            .with(RightWrist, 0.47, 0.4, 1.0)
    }

    pub(crate) fn guarding() -> Snapshot {
        standing()
            .with(RightElbow, 0.35, 0.2, 1.0)
            .with(RightWrist, 0.4, 0.05, 1.0)
    }
}
