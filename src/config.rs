use crate::{
    action::{Action, ActionTable},
    error::Error,
    moves::Move,
    pose::{constants::DEFAULT_EXCLUDED_LANDMARKS, LandmarkKind},
};
use std::{collections::BTreeMap, path::Path};

pub(crate) const DEFAULT_VISIBILITY_THRESHOLD: f32 = 0.9;

const DEFAULT_STRAIGHT_ARM: f32 = 0.18;
const DEFAULT_LEVEL_ARM: f32 = 0.18;
const DEFAULT_KICK_SLOPE: f32 = 0.7;
const DEFAULT_CROUCH_RATIO: f32 = 0.7;
const DEFAULT_STANCE_VERTICALITY: f32 = 0.9;
const DEFAULT_FOREARM_LEVEL: f32 = 0.18;
const DEFAULT_WRIST_GAP: f32 = 0.3;

/// Bands the move rules compare their ratios and sines against.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Tolerances {
    /// Upper bound on |sin| of the elbow angle sum for a straight arm.
    pub(crate) straight_arm: f32,
    /// Upper bound on |sin| of the wrist-to-shoulder slope for a level arm.
    pub(crate) level_arm: f32,
    /// Upper bound on |sin| of the ankle-to-hip slope for a kick.
    pub(crate) kick_slope: f32,
    /// Lower bound on hip-to-nose over knee-to-nose for a crouch.
    pub(crate) crouch_ratio: f32,
    /// Lower bound on |sin| of both ankle-to-hip slopes for a sidestep.
    pub(crate) stance_verticality: f32,
    /// Upper bound on |sin| of the forearm angle sum for a tag.
    pub(crate) forearm_level: f32,
    /// Upper bound on wrist gap over elbow gap for a tag.
    pub(crate) wrist_gap: f32,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            straight_arm: DEFAULT_STRAIGHT_ARM,
            level_arm: DEFAULT_LEVEL_ARM,
            kick_slope: DEFAULT_KICK_SLOPE,
            crouch_ratio: DEFAULT_CROUCH_RATIO,
            stance_verticality: DEFAULT_STANCE_VERTICALITY,
            forearm_level: DEFAULT_FOREARM_LEVEL,
            wrist_gap: DEFAULT_WRIST_GAP,
        }
    }
}

impl Tolerances {
    /// Every band must be a finite, non-negative number.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        [
            ("straight_arm", self.straight_arm),
            ("level_arm", self.level_arm),
            ("kick_slope", self.kick_slope),
            ("crouch_ratio", self.crouch_ratio),
            ("stance_verticality", self.stance_verticality),
            ("forearm_level", self.forearm_level),
            ("wrist_gap", self.wrist_gap),
        ]
        .iter()
        .try_for_each(|&(name, value)| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidTolerance(name, value))
            }
        })
    }
}

/// Contents of the optional TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) visibility_threshold: Option<f32>,
    pub(crate) tolerances: Tolerances,
    pub(crate) keys: BTreeMap<String, String>,
    pub(crate) default_action: Option<String>,
    pub(crate) excluded_landmarks: Option<Vec<String>>,
}

impl FileConfig {
    pub(crate) fn load<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::ReadConfig(e, path.to_owned()))?;
        toml::from_str(&content).map_err(|e| Error::ParseConfig(e, path.to_owned()))
    }
}

/// Per-move key overrides from the command line or the environment.
#[derive(Debug, Clone, Default, structopt::StructOpt)]
pub(crate) struct KeyBindings {
    /// Key for UP (jump).
    #[structopt(long = "key-up", env = "UP")]
    up: Option<String>,
    /// Key for DOWN (crouch).
    #[structopt(long = "key-down", env = "DOWN")]
    down: Option<String>,
    /// Key for LEFT.
    #[structopt(long = "key-left", env = "LEFT")]
    left: Option<String>,
    /// Key for RIGHT.
    #[structopt(long = "key-right", env = "RIGHT")]
    right: Option<String>,
    /// Key for FRONT_PUNCH.
    #[structopt(long = "key-front-punch", env = "FRONT_PUNCH")]
    front_punch: Option<String>,
    /// Key for BACK_PUNCH.
    #[structopt(long = "key-back-punch", env = "BACK_PUNCH")]
    back_punch: Option<String>,
    /// Key for FRONT_KICK.
    #[structopt(long = "key-front-kick", env = "FRONT_KICK")]
    front_kick: Option<String>,
    /// Key for BACK_KICK.
    #[structopt(long = "key-back-kick", env = "BACK_KICK")]
    back_kick: Option<String>,
    /// Key for THROW.
    #[structopt(long = "key-throw", env = "THROW")]
    throw: Option<String>,
    /// Key for TAG.
    #[structopt(long = "key-tag", env = "TAG")]
    tag: Option<String>,
    /// Key for BLOCK.
    #[structopt(long = "key-block", env = "BLOCK")]
    block: Option<String>,
    /// Key for FLIP_STANCE.
    #[structopt(long = "key-flip-stance", env = "FLIP_STANCE")]
    flip_stance: Option<String>,
    /// Key for PAUSE.
    #[structopt(long = "key-pause", env = "PAUSE")]
    pause: Option<String>,
    /// Key for BACK.
    #[structopt(long = "key-back", env = "BACK")]
    back: Option<String>,
}

impl KeyBindings {
    fn overrides(&self) -> impl Iterator<Item = (Move, &str)> + '_ {
        vec![
            (Move::Up, &self.up),
            (Move::Down, &self.down),
            (Move::Left, &self.left),
            (Move::Right, &self.right),
            (Move::FrontPunch, &self.front_punch),
            (Move::BackPunch, &self.back_punch),
            (Move::FrontKick, &self.front_kick),
            (Move::BackKick, &self.back_kick),
            (Move::Throw, &self.throw),
            (Move::Tag, &self.tag),
            (Move::Block, &self.block),
            (Move::FlipStance, &self.flip_stance),
            (Move::Pause, &self.pause),
            (Move::Back, &self.back),
        ]
        .into_iter()
        .filter_map(|(kind, key)| key.as_deref().map(|key| (kind, key)))
    }
}

/// Everything the classifier, mapper and pipeline need, resolved once at
/// startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub(crate) visibility_threshold: f32,
    pub(crate) tolerances: Tolerances,
    pub(crate) actions: ActionTable,
    pub(crate) excluded_landmarks: Vec<LandmarkKind>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            tolerances: Tolerances::default(),
            actions: ActionTable::default(),
            excluded_landmarks: DEFAULT_EXCLUDED_LANDMARKS.to_vec(),
        }
    }
}

impl Config {
    /// Layers built-in defaults, then `file`, then command line and
    /// environment overrides.
    pub(crate) fn resolve(
        file: Option<FileConfig>,
        threshold: Option<f32>,
        keys: &KeyBindings,
    ) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(file) = file {
            config.tolerances = file.tolerances;
            if let Some(threshold) = file.visibility_threshold {
                config.visibility_threshold = threshold;
            }
            if let Some(default_action) = file.default_action {
                let default_action = Action::new(default_action);
                default_action.validate()?;
                config.actions.set_default(default_action);
            }
            for (name, key) in &file.keys {
                config.actions.bind(name.parse()?, Action::new(key));
            }
            if let Some(excluded) = file.excluded_landmarks {
                config.excluded_landmarks = excluded
                    .iter()
                    .map(|name| name.parse())
                    .collect::<Result<_, _>>()?;
            }
        }

        for (kind, key) in keys.overrides() {
            config.actions.bind(kind, Action::new(key));
        }

        if let Some(threshold) = threshold {
            config.visibility_threshold = threshold;
        }

        if !(0.0..=1.0).contains(&config.visibility_threshold) {
            return Err(Error::ThresholdOutOfRange(config.visibility_threshold));
        }
        config.tolerances.validate()?;
        Move::ALL
            .iter()
            .try_for_each(|&kind| config.actions.get(kind).validate())?;

        Ok(config)
    }
}
