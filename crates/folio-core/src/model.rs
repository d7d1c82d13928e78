//! Play corpus data model.
//!
//! These types are the shape of `plays.json`: the transform writes them, the
//! navigation store reads them, and the browser UI consumes the exported
//! TypeScript bindings. Wire names are camelCase.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use ts_rs::TS;

/// Largest integer an f64 represents exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Numeric position taken from the source export: a line index, act, scene or
/// sentence number.
///
/// Any finite value is allowed, including fractions and negatives. Values are
/// totally ordered by magnitude and whole numbers serialize as JSON integers,
/// so `1` stays `1` rather than `1.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ordinal(f64);

impl Ordinal {
    /// `None` for NaN and infinities. Negative zero folds into zero.
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_whole(self) -> bool {
        self.0.fract() == 0.0
    }
}

impl From<u32> for Ordinal {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

impl PartialEq for Ordinal {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Ordinal {}

impl Hash for Ordinal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Ord for Ordinal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Ordinal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Ordinal {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .and_then(Ordinal::new)
            .ok_or_else(|| format!("expected a finite number, got {raw:?}"))
    }
}

impl Serialize for Ordinal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() && self.0.abs() <= MAX_EXACT_INTEGER {
            serializer.serialize_i64(self.0 as i64)
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Ordinal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Ordinal::new(value).ok_or_else(|| de::Error::custom("expected a finite number"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    #[ts(type = "number")]
    pub global_index: Ordinal,
    #[ts(type = "number")]
    pub sentence: Ordinal,
    pub character: String,
    pub sex: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Scene {
    #[ts(type = "number")]
    pub number: Ordinal,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Act {
    #[ts(type = "number")]
    pub number: Ordinal,
    pub scenes: Vec<Scene>,
}

impl Act {
    pub fn scene(&self, number: Ordinal) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.number == number)
    }

    pub fn first_scene_number(&self) -> Option<Ordinal> {
        self.scenes.first().map(|scene| scene.number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CharacterSummary {
    pub name: String,
    pub sex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Play {
    pub id: String,
    pub name: String,
    pub genre: String,
    pub characters: Vec<CharacterSummary>,
    pub acts: Vec<Act>,
}

impl Play {
    pub fn act(&self, number: Ordinal) -> Option<&Act> {
        self.acts.iter().find(|act| act.number == number)
    }

    pub fn has_act(&self, number: Ordinal) -> bool {
        self.act(number).is_some()
    }

    pub fn first_act_number(&self) -> Option<Ordinal> {
        self.acts.first().map(|act| act.number)
    }

    /// Lines in document order: acts, then scenes, then sentences, as stored.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.acts
            .iter()
            .flat_map(|act| act.scenes.iter())
            .flat_map(|scene| scene.lines.iter())
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }
}

/// Root document of the JSON artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Corpus {
    pub plays: Vec<Play>,
}

impl Corpus {
    pub fn play(&self, id: &str) -> Option<&Play> {
        self.plays.iter().find(|play| play.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.play(id).is_some()
    }
}

/// Remembered navigation for one play. `scene_by_act` is keyed by the act
/// number as written (`"2"`, `"1.5"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PlayViewState {
    #[ts(type = "number | null")]
    pub act: Option<Ordinal>,
    #[ts(type = "Record<string, number | null>")]
    pub scene_by_act: BTreeMap<String, Option<Ordinal>>,
    pub scroll_by_scene: BTreeMap<String, f64>,
}

impl PlayViewState {
    pub fn scene_for_act(&self, act: Ordinal) -> Option<Ordinal> {
        self.scene_by_act.get(&act.to_string()).copied().flatten()
    }

    pub fn remember_scene(&mut self, act: Ordinal, scene: Option<Ordinal>) {
        self.scene_by_act.insert(act.to_string(), scene);
    }
}

/// Composite key for per-scene scroll offsets, e.g. `"2-3"`.
pub fn scene_key(act: Option<Ordinal>, scene: Option<Ordinal>) -> Option<String> {
    match (act, scene) {
        (Some(act), Some(scene)) => Some(format!("{act}-{scene}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: u32) -> Ordinal {
        Ordinal::from(value)
    }

    fn line(global_index: u32, sentence: u32) -> Line {
        Line {
            global_index: n(global_index),
            sentence: n(sentence),
            character: "HAMLET".to_string(),
            sex: None,
            text: format!("line {global_index}"),
        }
    }

    #[test]
    fn line_serializes_with_camel_case_keys() {
        let json = serde_json::to_string(&line(7, 2)).expect("serialize line");
        assert_eq!(
            json,
            r#"{"globalIndex":7,"sentence":2,"character":"HAMLET","sex":null,"text":"line 7"}"#
        );
    }

    #[test]
    fn play_lines_follow_storage_order() {
        let play = Play {
            id: "hamlet".to_string(),
            name: "Hamlet".to_string(),
            genre: "Tragedy".to_string(),
            characters: Vec::new(),
            acts: vec![
                Act {
                    number: n(1),
                    scenes: vec![
                        Scene {
                            number: n(1),
                            lines: vec![line(0, 1), line(1, 2)],
                        },
                        Scene {
                            number: n(2),
                            lines: vec![line(2, 3)],
                        },
                    ],
                },
                Act {
                    number: n(2),
                    scenes: vec![Scene {
                        number: n(1),
                        lines: vec![line(3, 1)],
                    }],
                },
            ],
        };

        let order: Vec<Ordinal> = play.lines().map(|line| line.global_index).collect();
        assert_eq!(order, vec![n(0), n(1), n(2), n(3)]);
        assert_eq!(play.line_count(), 4);
        assert_eq!(play.first_act_number(), Some(n(1)));
        assert_eq!(play.act(n(2)).and_then(Act::first_scene_number), Some(n(1)));
    }

    #[test]
    fn scene_key_requires_both_parts() {
        assert_eq!(scene_key(Some(n(2)), Some(n(3))).as_deref(), Some("2-3"));
        assert_eq!(scene_key(None, Some(n(3))), None);
        assert_eq!(scene_key(Some(n(2)), None), None);
    }

    #[test]
    fn ordinals_keep_fractions_and_negatives() {
        let half: Ordinal = "1.5".parse().expect("fraction");
        let negative: Ordinal = " -3 ".parse().expect("negative");
        assert_eq!(half.to_string(), "1.5");
        assert_eq!(negative.to_string(), "-3");
        assert!(negative < n(0) && n(1) < half && half < n(2));
        assert!("inf".parse::<Ordinal>().is_err());
        assert!("NaN".parse::<Ordinal>().is_err());
        assert_eq!(Ordinal::new(-0.0), Some(n(0)));
    }

    #[test]
    fn whole_ordinals_serialize_as_integers() {
        let values = vec![
            n(2),
            Ordinal::new(1.5).expect("finite"),
            Ordinal::new(-3.0).expect("finite"),
        ];
        let json = serde_json::to_string(&values).expect("serialize ordinals");
        assert_eq!(json, "[2,1.5,-3]");
        let decoded: Vec<Ordinal> = serde_json::from_str(&json).expect("deserialize ordinals");
        assert_eq!(decoded, values);
    }

    #[test]
    fn view_state_remembers_scene_per_act() {
        let mut state = PlayViewState::default();
        state.remember_scene(Ordinal::new(1.5).expect("finite"), Some(n(2)));
        state.remember_scene(n(3), None);

        assert_eq!(state.scene_for_act(Ordinal::new(1.5).expect("finite")), Some(n(2)));
        assert_eq!(state.scene_for_act(n(3)), None);
        assert_eq!(state.scene_for_act(n(4)), None);
        let json = serde_json::to_string(&state).expect("serialize view state");
        assert!(json.contains(r#""sceneByAct":{"1.5":2,"3":null}"#));
    }
}
