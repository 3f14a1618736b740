use crate::error::Error;
use bitvec::{bitvec, vec::BitVec};
use num_traits::FromPrimitive;
use std::{fmt, str::FromStr};

/// The gesture vocabulary. Declaration order is the order in which moves are
/// reported and mapped.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    num_derive::FromPrimitive,
    serde::Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Move {
    Up,
    Down,
    Left,
    Right,
    FrontPunch,
    BackPunch,
    FrontKick,
    BackKick,
    Throw,
    Tag,
    Block,
    // Reserved: bindable, never detected.
    FlipStance,
    Pause,
    Back,
}

pub(crate) const NUM_MOVES: usize = 14;

const MOVE_NAMES: [&str; NUM_MOVES] = [
    "UP",
    "DOWN",
    "LEFT",
    "RIGHT",
    "FRONT_PUNCH",
    "BACK_PUNCH",
    "FRONT_KICK",
    "BACK_KICK",
    "THROW",
    "TAG",
    "BLOCK",
    "FLIP_STANCE",
    "PAUSE",
    "BACK",
];

impl Move {
    pub(crate) const ALL: [Move; NUM_MOVES] = [
        Move::Up,
        Move::Down,
        Move::Left,
        Move::Right,
        Move::FrontPunch,
        Move::BackPunch,
        Move::FrontKick,
        Move::BackKick,
        Move::Throw,
        Move::Tag,
        Move::Block,
        Move::FlipStance,
        Move::Pause,
        Move::Back,
    ];

    #[inline]
    pub(crate) fn idx(self) -> usize {
        self as usize
    }

    pub(crate) fn from_idx(idx: usize) -> Result<Self, Error> {
        Self::from_usize(idx).ok_or(Error::ConvertUSizeToMove(idx))
    }

    pub(crate) fn name(self) -> &'static str {
        MOVE_NAMES[self.idx()]
    }

    pub(crate) fn is_reserved(self) -> bool {
        matches!(self, Move::FlipStance | Move::Pause | Move::Back)
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Move {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_uppercase().replace('-', "_");
        MOVE_NAMES
            .iter()
            .position(|&candidate| candidate == name)
            .ok_or_else(|| Error::UnknownMove(s.to_owned()))
            .and_then(Self::from_idx)
    }
}

/// Moves detected in a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MoveSet {
    bits: BitVec,
}

impl Default for MoveSet {
    fn default() -> Self {
        Self {
            bits: bitvec![0; NUM_MOVES],
        }
    }
}

impl MoveSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, kind: Move) {
        self.bits.set(kind.idx(), true);
    }

    pub(crate) fn contains(&self, kind: Move) -> bool {
        self.bits[kind.idx()]
    }

    /// Members in vocabulary order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Move> + '_ {
        Move::ALL.iter().copied().filter(move |&kind| self.contains(kind))
    }

    pub(crate) fn len(&self) -> usize {
        self.iter().count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl FromIterator<Move> for MoveSet {
    fn from_iter<I: IntoIterator<Item = Move>>(iter: I) -> Self {
        let mut set = Self::new();
        iter.into_iter().for_each(|kind| set.insert(kind));
        set
    }
}

impl fmt::Display for MoveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.iter().map(Move::name).collect::<Vec<_>>();
        write!(f, "[{}]", names.join(", "))
    }
}

impl serde::Serialize for MoveSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::{Move, MoveSet, NUM_MOVES};
    use crate::error::Error;

    mod move_tests {
        use super::*;

        #[test]
        fn all_is_in_declaration_order() {
            for (idx, kind) in Move::ALL.iter().enumerate() {
                assert_eq!(kind.idx(), idx);
                assert_eq!(Move::from_idx(idx).unwrap(), *kind);
            }
            assert!(Move::from_idx(NUM_MOVES).is_err());
        }

        #[test]
        fn parse_names() {
            assert_eq!("FRONT_PUNCH".parse::<Move>().unwrap(), Move::FrontPunch);
            assert_eq!("back-kick".parse::<Move>().unwrap(), Move::BackKick);
            assert_eq!(" up ".parse::<Move>().unwrap(), Move::Up);
            assert!(matches!(
                "uppercut".parse::<Move>(),
                Err(Error::UnknownMove(_))
            ));
        }

        #[test]
        fn display_matches_parse() {
            for kind in Move::ALL.iter().copied() {
                assert_eq!(kind.to_string().parse::<Move>().unwrap(), kind);
            }
        }

        #[test]
        fn reserved_moves() {
            let reserved = Move::ALL
                .iter()
                .copied()
                .filter(|kind| kind.is_reserved())
                .collect::<Vec<_>>();
            assert_eq!(reserved, vec![Move::FlipStance, Move::Pause, Move::Back]);
        }

        #[test]
        fn serializes_as_upper_snake_case() {
            assert_eq!(
                serde_json::to_string(&Move::FrontKick).unwrap(),
                "\"FRONT_KICK\""
            );
        }
    }

    mod move_set_tests {
        use super::*;

        #[test]
        fn empty() {
            let set = MoveSet::new();
            assert!(set.is_empty());
            assert_eq!(set.len(), 0);
            assert_eq!(set.to_string(), "[]");
        }

        #[test]
        fn duplicates_collapse() {
            let set = vec![Move::Tag, Move::Tag, Move::Up]
                .into_iter()
                .collect::<MoveSet>();
            assert_eq!(set.len(), 2);
            assert!(set.contains(Move::Tag));
            assert!(set.contains(Move::Up));
            assert!(!set.contains(Move::Down));
        }

        #[test]
        fn iterates_in_vocabulary_order() {
            let set = vec![Move::Block, Move::FrontKick, Move::Up]
                .into_iter()
                .collect::<MoveSet>();
            assert_eq!(
                set.iter().collect::<Vec<_>>(),
                vec![Move::Up, Move::FrontKick, Move::Block]
            );
            assert_eq!(set.to_string(), "[UP, FRONT_KICK, BLOCK]");
        }

        #[test]
        fn insertion_order_does_not_matter() {
            let a = vec![Move::Throw, Move::Left].into_iter().collect::<MoveSet>();
            let b = vec![Move::Left, Move::Throw].into_iter().collect::<MoveSet>();
            assert_eq!(a, b);
        }

        #[test]
        fn serializes_as_list() {
            let set = vec![Move::BackPunch, Move::Down]
                .into_iter()
                .collect::<MoveSet>();
            assert_eq!(
                serde_json::to_string(&set).unwrap(),
                r#"["DOWN","BACK_PUNCH"]"#
            );
        }
    }
}
