use crate::{
    error::Error,
    moves::{Move, MoveSet, NUM_MOVES},
};
use std::fmt;

/// A key name is one printable ASCII word: `space`, `f12`, `ctrlright`.
pub(crate) fn is_key_name(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_graphic())
}

/// A key name (`space`, `ctrlright`) or a `+`-joined key combination
/// (`ctrl+c`). The empty action presses nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(transparent)]
pub(crate) struct Action(String);

impl Action {
    pub(crate) fn new<S>(key: S) -> Self
    where
        S: AsRef<str>,
    {
        Self(key.as_ref().trim().to_lowercase())
    }

    pub(crate) fn noop() -> Self {
        Self::default()
    }

    pub(crate) fn is_noop(&self) -> bool {
        self.keys().next().is_none()
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Individual key names, in press order.
    pub(crate) fn keys(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.0.split('+').map(str::trim).filter(|key| !key.is_empty())
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        match self.keys().find(|key| !is_key_name(key)) {
            Some(key) => Err(Error::InvalidKey(key.to_owned())),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Action {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Total mapping from every move to an action. Moves without a binding
/// resolve to the table's default action.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActionTable {
    bindings: [Option<Action>; NUM_MOVES],
    default: Action,
}

impl ActionTable {
    /// A table with no bindings at all.
    pub(crate) fn unbound(default: Action) -> Self {
        Self {
            bindings: Default::default(),
            default,
        }
    }

    pub(crate) fn with_binding(mut self, kind: Move, action: Action) -> Self {
        self.bind(kind, action);
        self
    }

    pub(crate) fn bind(&mut self, kind: Move, action: Action) {
        self.bindings[kind.idx()] = Some(action);
    }

    pub(crate) fn set_default(&mut self, default: Action) {
        self.default = default;
    }

    pub(crate) fn get(&self, kind: Move) -> &Action {
        self.bindings[kind.idx()].as_ref().unwrap_or(&self.default)
    }

    /// Actions for `moves`, in vocabulary order.
    pub(crate) fn map_moves(&self, moves: &MoveSet) -> Vec<Action> {
        moves.iter().map(|kind| self.get(kind).clone()).collect()
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        constants::DEFAULT_BINDINGS.iter().fold(
            Self::unbound(Action::noop()),
            |table, &(kind, key)| table.with_binding(kind, Action::new(key)),
        )
    }
}

pub(crate) mod constants {
    use crate::moves::{Move, Move::*, NUM_MOVES};

    /// Arrow keys for movement, a/s/z/x/d/c for attacks.
    pub(crate) const DEFAULT_BINDINGS: [(Move, &str); NUM_MOVES] = [
        (Up, "up"),
        (Down, "down"),
        (Left, "left"),
        (Right, "right"),
        (FrontPunch, "a"),
        (BackPunch, "s"),
        (FrontKick, "z"),
        (BackKick, "x"),
        (Throw, "d"),
        (Tag, "c"),
        (Block, "space"),
        (FlipStance, "ctrlright"),
        (Pause, "tab"),
        (Back, "backspace"),
    ];
}
