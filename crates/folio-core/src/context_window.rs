use crate::model::{Ordinal, Play};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const DEFAULT_CONTEXT_RADIUS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ContextLine {
    #[ts(type = "number")]
    pub global_index: Ordinal,
    #[ts(type = "number")]
    pub sentence: Ordinal,
    pub character: String,
    pub text: String,
}

/// Lines within `radius` positions of `global_index` in document order.
///
/// The window crosses scene and act boundaries and is clipped at both ends of
/// the play. Empty when the play is absent or the index is not in it.
pub fn build_context_window(
    play: Option<&Play>,
    global_index: Ordinal,
    radius: usize,
) -> Vec<ContextLine> {
    let Some(play) = play else {
        return Vec::new();
    };
    let lines: Vec<_> = play.lines().collect();
    let Some(position) = lines.iter().position(|line| line.global_index == global_index) else {
        return Vec::new();
    };

    let start = position.saturating_sub(radius);
    let end = position.saturating_add(radius).min(lines.len() - 1);
    lines[start..=end]
        .iter()
        .map(|line| ContextLine {
            global_index: line.global_index,
            sentence: line.sentence,
            character: line.character.clone(),
            text: line.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Act, Line, Scene};

    fn n(value: u32) -> Ordinal {
        Ordinal::from(value)
    }

    fn build_test_play(count: u32) -> Play {
        let lines: Vec<Line> = (0..count)
            .map(|index| Line {
                global_index: n(index),
                sentence: n(index + 1),
                character: "PROSPERO".to_string(),
                sex: None,
                text: format!("line {index}"),
            })
            .collect();
        let (first, second) = lines.split_at(lines.len() / 2);
        Play {
            id: "tempest".to_string(),
            name: "The Tempest".to_string(),
            genre: "Comedy".to_string(),
            characters: Vec::new(),
            acts: vec![
                Act {
                    number: n(1),
                    scenes: vec![Scene {
                        number: n(1),
                        lines: first.to_vec(),
                    }],
                },
                Act {
                    number: n(2),
                    scenes: vec![Scene {
                        number: n(1),
                        lines: second.to_vec(),
                    }],
                },
            ],
        }
    }

    fn indices(window: &[ContextLine]) -> Vec<f64> {
        window.iter().map(|line| line.global_index.value()).collect()
    }

    fn range(from: u32, to: u32) -> Vec<f64> {
        (from..=to).map(f64::from).collect()
    }

    #[test]
    fn window_is_clipped_at_document_start() {
        let play = build_test_play(100);
        let window = build_context_window(Some(&play), n(3), 5);
        assert_eq!(indices(&window), range(0, 8));
    }

    #[test]
    fn window_is_clipped_at_document_end() {
        let play = build_test_play(100);
        let window = build_context_window(Some(&play), n(97), 5);
        assert_eq!(indices(&window), range(92, 99));
    }

    #[test]
    fn window_spans_act_boundaries() {
        let play = build_test_play(100);
        let window = build_context_window(Some(&play), n(50), 2);
        assert_eq!(indices(&window), range(48, 52));
        assert_eq!(window[2].text, "line 50");
    }

    #[test]
    fn missing_target_or_play_yields_empty_window() {
        let play = build_test_play(100);
        assert!(build_context_window(Some(&play), n(400), 5).is_empty());
        assert!(build_context_window(None, n(3), 5).is_empty());
        assert!(build_context_window(Some(&build_test_play(0)), n(0), 5).is_empty());
    }

    #[test]
    fn zero_radius_returns_only_the_target() {
        let play = build_test_play(10);
        assert_eq!(indices(&build_context_window(Some(&play), n(4), 0)), vec![4.0]);
    }
}
