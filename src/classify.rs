use crate::{
    config::Tolerances,
    moves::{Move, MoveSet},
    point::Point,
    pose::{LandmarkKind, LandmarkKind::*, Snapshot},
};
use tracing::trace;

type Detect = fn(&Classifier, &Snapshot) -> bool;

/// A move together with the landmarks gating it and the geometric test that
/// decides it.
pub(crate) struct Rule {
    pub(crate) kind: Move,
    /// Landmarks whose mean visibility must reach the threshold before the
    /// geometry is looked at.
    pub(crate) landmarks: &'static [LandmarkKind],
    detect: Detect,
}

pub(crate) static RULES: [Rule; 11] = [
    Rule {
        kind: Move::Up,
        landmarks: &[LeftAnkle, RightAnkle, LeftKnee, RightKnee],
        detect: Classifier::up,
    },
    Rule {
        kind: Move::Down,
        landmarks: &[LeftHip, RightHip, LeftKnee, RightKnee, Nose],
        detect: Classifier::down,
    },
    Rule {
        kind: Move::Left,
        landmarks: &[LeftAnkle, RightAnkle, RightHip],
        detect: Classifier::left,
    },
    Rule {
        kind: Move::Right,
        landmarks: &[LeftAnkle, RightAnkle, LeftHip],
        detect: Classifier::right,
    },
    Rule {
        kind: Move::FrontPunch,
        landmarks: &[LeftWrist, LeftElbow, LeftShoulder],
        detect: Classifier::front_punch,
    },
    Rule {
        kind: Move::BackPunch,
        landmarks: &[RightWrist, RightElbow, RightShoulder],
        detect: Classifier::back_punch,
    },
    Rule {
        kind: Move::FrontKick,
        landmarks: &[LeftHip, LeftAnkle],
        detect: Classifier::front_kick,
    },
    Rule {
        kind: Move::BackKick,
        landmarks: &[RightHip, RightAnkle],
        detect: Classifier::back_kick,
    },
    // each arm is gated separately inside the test
    Rule {
        kind: Move::Throw,
        landmarks: &[Nose],
        detect: Classifier::throw,
    },
    Rule {
        kind: Move::Tag,
        landmarks: &[LeftWrist, RightWrist, LeftElbow, RightElbow],
        detect: Classifier::tag,
    },
    Rule {
        kind: Move::Block,
        landmarks: &[Nose],
        detect: Classifier::block,
    },
];

const ARMS: [(LandmarkKind, LandmarkKind); 2] =
    [(RightWrist, RightElbow), (LeftWrist, LeftElbow)];

#[inline]
fn abs_sin(angle: f32) -> f32 {
    angle.sin().abs()
}

/// `numerator / denominator`, or `None` when the denominator is degenerate.
fn ratio(numerator: f32, denominator: f32) -> Option<f32> {
    let value = numerator / denominator;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Decides, frame by frame, which moves a snapshot shows. Holds no state
/// between frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Classifier {
    threshold: f32,
    tolerances: Tolerances,
}

impl Classifier {
    pub(crate) fn new(threshold: f32, tolerances: Tolerances) -> Self {
        Self {
            threshold,
            tolerances,
        }
    }

    pub(crate) fn classify(&self, snapshot: &Snapshot) -> MoveSet {
        RULES
            .iter()
            .filter(|rule| self.detects(rule, snapshot))
            .map(|rule| rule.kind)
            .collect()
    }

    pub(crate) fn detects(&self, rule: &Rule, snapshot: &Snapshot) -> bool {
        let visibility = snapshot.mean_visibility(rule.landmarks);
        if visibility < self.threshold {
            trace!(
                rule = %rule.kind,
                visibility,
                threshold = self.threshold,
                "landmarks not visible enough"
            );
            return false;
        }
        (rule.detect)(self, snapshot)
    }

    /// Ankles above knees.
    fn up(&self, snapshot: &Snapshot) -> bool {
        let ankles = snapshot.point(LeftAnkle).y() + snapshot.point(RightAnkle).y();
        let knees = snapshot.point(LeftKnee).y() + snapshot.point(RightKnee).y();
        ankles < knees
    }

    /// Hips sink toward the knees: hip-to-nose over knee-to-nose grows.
    fn down(&self, snapshot: &Snapshot) -> bool {
        let nose = snapshot.point(Nose).y();
        let hips = snapshot.point(LeftHip).midpoint(snapshot.point(RightHip)).y();
        let knees = snapshot
            .point(LeftKnee)
            .midpoint(snapshot.point(RightKnee))
            .y();
        ratio((hips - nose).abs(), (knees - nose).abs())
            .map_or(false, |value| value > self.tolerances.crouch_ratio)
    }

    fn left(&self, snapshot: &Snapshot) -> bool {
        self.sidestep(snapshot, snapshot.point(RightHip), |feet, hip| feet < hip)
    }

    fn right(&self, snapshot: &Snapshot) -> bool {
        self.sidestep(snapshot, snapshot.point(LeftHip), |feet, hip| feet > hip)
    }

    /// Both legs stay upright while the feet shift to one side of `hip`.
    fn sidestep<F>(&self, snapshot: &Snapshot, hip: Point, beside: F) -> bool
    where
        F: Fn(f32, f32) -> bool,
    {
        let left_ankle = snapshot.point(LeftAnkle);
        let right_ankle = snapshot.point(RightAnkle);
        let upright = [left_ankle, right_ankle]
            .iter()
            .all(|ankle| abs_sin(ankle.angle_to(hip)) > self.tolerances.stance_verticality);
        upright && beside(left_ankle.midpoint(right_ankle).x(), hip.x())
    }

    fn front_punch(&self, snapshot: &Snapshot) -> bool {
        self.extended_arm(snapshot, LeftWrist, LeftElbow, LeftShoulder)
    }

    fn back_punch(&self, snapshot: &Snapshot) -> bool {
        self.extended_arm(snapshot, RightWrist, RightElbow, RightShoulder)
    }

    /// Wrist and shoulder on opposite sides of the elbow, whole arm level.
    fn extended_arm(
        &self,
        snapshot: &Snapshot,
        wrist: LandmarkKind,
        elbow: LandmarkKind,
        shoulder: LandmarkKind,
    ) -> bool {
        let wrist = snapshot.point(wrist);
        let elbow = snapshot.point(elbow);
        let shoulder = snapshot.point(shoulder);

        let straight = abs_sin(elbow.angle_to(wrist) + elbow.angle_to(shoulder));
        let level = abs_sin(wrist.angle_to(shoulder));
        trace!(straight, level, "arm extension");

        straight < self.tolerances.straight_arm && level < self.tolerances.level_arm
    }

    fn front_kick(&self, snapshot: &Snapshot) -> bool {
        self.raised_leg(snapshot, LeftHip, LeftAnkle)
    }

    fn back_kick(&self, snapshot: &Snapshot) -> bool {
        self.raised_leg(snapshot, RightHip, RightAnkle)
    }

    /// Leg swung away from vertical.
    fn raised_leg(&self, snapshot: &Snapshot, hip: LandmarkKind, ankle: LandmarkKind) -> bool {
        let slope = abs_sin(snapshot.point(ankle).angle_to(snapshot.point(hip)));
        slope < self.tolerances.kick_slope
    }

    /// Wrist above elbow above head, on either arm.
    fn throw(&self, snapshot: &Snapshot) -> bool {
        let nose = snapshot.point(Nose).y();
        self.any_arm(snapshot, |wrist, elbow| wrist < elbow && elbow < nose)
    }

    /// Wrist above head with the elbow below it, on either arm.
    fn block(&self, snapshot: &Snapshot) -> bool {
        let nose = snapshot.point(Nose).y();
        self.any_arm(snapshot, |wrist, elbow| wrist < nose && nose < elbow)
    }

    /// Whether any sufficiently visible arm satisfies `pose`, given the wrist
    /// and elbow heights.
    fn any_arm<F>(&self, snapshot: &Snapshot, pose: F) -> bool
    where
        F: Fn(f32, f32) -> bool,
    {
        ARMS.iter().any(|&(wrist, elbow)| {
            snapshot.mean_visibility(&[wrist, elbow]) >= self.threshold
                && pose(snapshot.point(wrist).y(), snapshot.point(elbow).y())
        })
    }

    /// Forearms level and meeting in front of the body.
    fn tag(&self, snapshot: &Snapshot) -> bool {
        let left_wrist = snapshot.point(LeftWrist);
        let right_wrist = snapshot.point(RightWrist);
        let left_elbow = snapshot.point(LeftElbow);
        let right_elbow = snapshot.point(RightElbow);
        let wrists = left_wrist.midpoint(right_wrist);

        let level = abs_sin(left_elbow.angle_to(wrists) + right_elbow.angle_to(wrists));
        let gap = ratio(
            (right_wrist.x() - left_wrist.x()).abs(),
            (right_elbow.x() - left_elbow.x()).abs(),
        );
        trace!(level, ?gap, "forearms");

        level < self.tolerances.forearm_level
            && gap.map_or(false, |gap| gap < self.tolerances.wrist_gap)
    }
}
