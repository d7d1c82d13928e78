//! Play/act/scene selection with per-play remembered view state.
//!
//! `PlayStore` owns the loaded corpus and a single active selection. Each play
//! keeps a `PlayViewState` so switching away and back restores the last act,
//! the last scene visited in each act and the scroll offset of each scene.
//! Every resolution step is a pure function of (corpus, remembered snapshot,
//! requested target), so replaying the same commands yields the same state.

use crate::context_window::{ContextLine, build_context_window};
use crate::model::{Act, Corpus, Line, Ordinal, Play, PlayViewState, Scene, scene_key};
use crate::source::CorpusSource;
use crate::text_utils::{Highlighter, contains_folded, normalize_query};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::mpsc::{Receiver, Sender, channel};
use tracing::{debug, info, warn};
use ts_rs::TS;

/// Reads the live scroll offset of the visible scene container.
pub type ScrollProvider = Box<dyn Fn() -> Option<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollProviderHandle(u64);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub play_id: Option<String>,
    #[ts(type = "number | null")]
    pub act: Option<Ordinal>,
    #[ts(type = "number | null")]
    pub scene: Option<Ordinal>,
}

impl Selection {
    pub fn is_complete(&self) -> bool {
        self.play_id.is_some() && self.act.is_some() && self.scene.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct PlaySummary {
    pub id: String,
    pub name: String,
    pub genre: String,
    pub act_count: usize,
    pub character_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct LineView {
    #[ts(type = "number")]
    pub global_index: Ordinal,
    #[ts(type = "number")]
    pub sentence: Ordinal,
    pub character: String,
    pub text: String,
    pub highlighted_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSnapshot {
    pub selection: Selection,
    pub loading: bool,
    pub error: Option<String>,
    pub sidebar_open: bool,
    pub play_search: String,
    pub line_search: String,
    pub plays: Vec<PlaySummary>,
    #[ts(type = "Array<number>")]
    pub acts: Vec<Ordinal>,
    #[ts(type = "Array<number>")]
    pub scenes: Vec<Ordinal>,
    pub lines: Vec<LineView>,
    pub stored_scroll: f64,
}

#[derive(Debug, Clone)]
pub enum NavigationCommand {
    GetSnapshot,
    SelectPlay { play_id: String },
    SelectAct { act: Ordinal },
    SelectScene { scene: Ordinal },
    PersistScroll,
    SetPlaySearch { query: String },
    SetLineSearch { query: String },
    ToggleSidebar,
}

impl NavigationCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::GetSnapshot => "nav_get_snapshot",
            Self::SelectPlay { .. } => "nav_select_play",
            Self::SelectAct { .. } => "nav_select_act",
            Self::SelectScene { .. } => "nav_select_scene",
            Self::PersistScroll => "nav_persist_scroll",
            Self::SetPlaySearch { .. } => "nav_set_play_search",
            Self::SetLineSearch { .. } => "nav_set_line_search",
            Self::ToggleSidebar => "nav_toggle_sidebar",
        }
    }
}

pub const INIT_ACTION: &str = "nav_init";

#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub action: &'static str,
    pub snapshot: NavigationSnapshot,
}

/// Navigation state for one reader instance.
///
/// Constructed once by the application root and passed by reference to
/// whatever drives it; there is no process-wide instance.
pub struct PlayStore {
    corpus: Corpus,
    loading: bool,
    error: Option<String>,
    play_search: String,
    line_search: String,
    sidebar_open: bool,
    selection: Selection,
    snapshots: HashMap<String, PlayViewState>,
    scroll_provider: Option<(ScrollProviderHandle, ScrollProvider)>,
    next_provider_id: u64,
    subscribers: Vec<Sender<NavigationEvent>>,
}

impl Default for PlayStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayStore {
    pub fn new() -> Self {
        Self {
            corpus: Corpus::default(),
            loading: true,
            error: None,
            play_search: String::new(),
            line_search: String::new(),
            sidebar_open: true,
            selection: Selection::default(),
            snapshots: HashMap::new(),
            scroll_provider: None,
            next_provider_id: 1,
            subscribers: Vec::new(),
        }
    }

    /// Load the corpus and settle on a valid selection.
    pub fn init(&mut self, source: &dyn CorpusSource) -> NavigationEvent {
        self.loading = true;
        self.error = None;
        match source.load() {
            Ok(corpus) => {
                info!(
                    source = %source.describe(),
                    plays = corpus.plays.len(),
                    "Loaded play corpus"
                );
                self.apply_corpus(corpus);
            }
            Err(err) => {
                warn!(source = %source.describe(), "Failed to load corpus: {err:#}");
                self.error = Some(err.to_string());
            }
        }
        self.loading = false;
        let event = NavigationEvent {
            action: INIT_ACTION,
            snapshot: self.snapshot(),
        };
        self.notify(&event);
        event
    }

    fn apply_corpus(&mut self, corpus: Corpus) {
        self.corpus = corpus;
        let Some(first_id) = self.corpus.plays.first().map(|play| play.id.clone()) else {
            self.selection = Selection::default();
            return;
        };

        let surviving = self
            .selection
            .play_id
            .clone()
            .filter(|id| self.corpus.contains(id));
        match surviving {
            None => self.select_play_with(&first_id, false),
            Some(play_id) => {
                let (next_act, next_scene) = match self.corpus.play(&play_id) {
                    Some(play) => {
                        let act = self.resolve_act(play);
                        (act, act.and_then(|act| self.resolve_scene(play, act)))
                    }
                    None => (None, None),
                };
                self.set_act(&play_id, next_act);
                self.set_scene(&play_id, next_scene);
            }
        }
    }

    pub fn apply_command(&mut self, command: NavigationCommand) -> NavigationEvent {
        let action = command.action();
        match command {
            NavigationCommand::GetSnapshot => {}
            NavigationCommand::SelectPlay { play_id } => self.select_play(&play_id),
            NavigationCommand::SelectAct { act } => self.select_act(act),
            NavigationCommand::SelectScene { scene } => self.select_scene(scene),
            NavigationCommand::PersistScroll => self.persist_current_scroll(None),
            NavigationCommand::SetPlaySearch { query } => self.set_play_search(query),
            NavigationCommand::SetLineSearch { query } => self.set_line_search(query),
            NavigationCommand::ToggleSidebar => self.toggle_sidebar(),
        }
        let event = NavigationEvent {
            action,
            snapshot: self.snapshot(),
        };
        self.notify(&event);
        event
    }

    /// Receive every event produced by `init` and `apply_command`.
    pub fn subscribe(&mut self) -> Receiver<NavigationEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self, event: &NavigationEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn select_play(&mut self, play_id: &str) {
        self.select_play_with(play_id, true);
    }

    fn select_play_with(&mut self, play_id: &str, remember_current: bool) {
        if let Some(current_id) = self.selection.play_id.clone() {
            if current_id == play_id {
                return;
            }
            if remember_current {
                self.persist_current_scroll(Some(&current_id));
                let (act, scene) = (self.selection.act, self.selection.scene);
                self.record_scene_selection(&current_id, act, scene);
            }
        }

        self.selection.play_id = Some(play_id.to_string());
        let (next_act, next_scene) = match self.corpus.play(play_id) {
            Some(play) => {
                let act = self.resolve_act(play);
                (act, act.and_then(|act| self.resolve_scene(play, act)))
            }
            None => {
                debug!(play_id, "Selected play is not in the corpus");
                self.selection.act = None;
                self.selection.scene = None;
                return;
            }
        };
        self.set_act(play_id, next_act);
        self.set_scene(play_id, next_scene);
        debug!(play_id, act = ?next_act, scene = ?next_scene, "Selected play");
    }

    pub fn select_act(&mut self, act: Ordinal) {
        let Some(play) = self.current_play() else {
            return;
        };
        let resolved = if play.has_act(act) {
            Some(act)
        } else {
            play.first_act_number()
        };
        if self.selection.act == resolved {
            return;
        }
        let play_id = play.id.clone();
        let next_scene = resolved.and_then(|act| self.resolve_scene(play, act));

        self.persist_current_scroll(None);
        self.set_act(&play_id, resolved);
        self.set_scene(&play_id, next_scene);
        debug!(play_id, act = ?resolved, scene = ?next_scene, "Selected act");
    }

    pub fn select_scene(&mut self, scene: Ordinal) {
        let Some(act) = self.current_act() else {
            return;
        };
        let resolved = if act.scene(scene).is_some() {
            Some(scene)
        } else {
            act.first_scene_number()
        };
        if self.selection.scene == resolved {
            return;
        }
        let Some(play_id) = self.selection.play_id.clone() else {
            return;
        };

        self.persist_current_scroll(None);
        self.set_scene(&play_id, resolved);
        debug!(play_id, scene = ?resolved, "Selected scene");
    }

    fn resolve_act(&self, play: &Play) -> Option<Ordinal> {
        self.snapshots
            .get(&play.id)
            .and_then(|state| state.act)
            .filter(|act| play.has_act(*act))
            .or_else(|| play.first_act_number())
    }

    fn resolve_scene(&self, play: &Play, act_number: Ordinal) -> Option<Ordinal> {
        let act = play.act(act_number)?;
        self.snapshots
            .get(&play.id)
            .and_then(|state| state.scene_for_act(act_number))
            .filter(|scene| act.scene(*scene).is_some())
            .or_else(|| act.first_scene_number())
    }

    fn set_act(&mut self, play_id: &str, act: Option<Ordinal>) {
        self.selection.act = act;
        self.snapshots.entry(play_id.to_string()).or_default().act = act;
    }

    fn set_scene(&mut self, play_id: &str, scene: Option<Ordinal>) {
        self.selection.scene = scene;
        let act = self.selection.act;
        self.record_scene_selection(play_id, act, scene);
    }

    fn record_scene_selection(
        &mut self,
        play_id: &str,
        act: Option<Ordinal>,
        scene: Option<Ordinal>,
    ) {
        let Some(act) = act else {
            return;
        };
        self.snapshots
            .entry(play_id.to_string())
            .or_default()
            .remember_scene(act, scene);
    }

    /// Install the reader for the visible scroll container, replacing any
    /// previous one.
    pub fn register_scroll_provider(
        &mut self,
        provider: impl Fn() -> Option<f64> + 'static,
    ) -> ScrollProviderHandle {
        let handle = ScrollProviderHandle(self.next_provider_id);
        self.next_provider_id += 1;
        self.scroll_provider = Some((handle, Box::new(provider)));
        handle
    }

    /// Clear the provider slot if `handle` is still the active provider.
    pub fn unregister_scroll_provider(&mut self, handle: ScrollProviderHandle) {
        if matches!(&self.scroll_provider, Some((current, _)) if *current == handle) {
            self.scroll_provider = None;
        }
    }

    pub fn has_scroll_provider(&self) -> bool {
        self.scroll_provider.is_some()
    }

    pub fn persist_current_scroll(&mut self, play_id: Option<&str>) {
        let Some((_, provider)) = &self.scroll_provider else {
            return;
        };
        let Some(play_id) = play_id
            .map(str::to_string)
            .or_else(|| self.selection.play_id.clone())
        else {
            return;
        };
        let Some(key) = scene_key(self.selection.act, self.selection.scene) else {
            return;
        };
        let Some(offset) = provider().filter(|offset| offset.is_finite()) else {
            return;
        };
        self.snapshots
            .entry(play_id)
            .or_default()
            .scroll_by_scene
            .insert(key, offset);
    }

    pub fn get_stored_scroll(
        &self,
        play_id: &str,
        act: Option<Ordinal>,
        scene: Option<Ordinal>,
    ) -> f64 {
        let Some(key) = scene_key(act, scene) else {
            return 0.0;
        };
        self.snapshots
            .get(play_id)
            .and_then(|state| state.scroll_by_scene.get(&key))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn view_state(&self, play_id: &str) -> Option<&PlayViewState> {
        self.snapshots.get(play_id)
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn plays(&self) -> &[Play] {
        &self.corpus.plays
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_play_id(&self) -> Option<&str> {
        self.selection.play_id.as_deref()
    }

    pub fn selected_act_number(&self) -> Option<Ordinal> {
        self.selection.act
    }

    pub fn selected_scene_number(&self) -> Option<Ordinal> {
        self.selection.scene
    }

    pub fn current_play(&self) -> Option<&Play> {
        self.corpus.play(self.selection.play_id.as_deref()?)
    }

    pub fn acts(&self) -> &[Act] {
        self.current_play()
            .map(|play| play.acts.as_slice())
            .unwrap_or_default()
    }

    pub fn current_act(&self) -> Option<&Act> {
        self.current_play()?.act(self.selection.act?)
    }

    pub fn scenes(&self) -> &[Scene] {
        self.current_act()
            .map(|act| act.scenes.as_slice())
            .unwrap_or_default()
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.current_act()?.scene(self.selection.scene?)
    }

    pub fn sidebar_open(&self) -> bool {
        self.sidebar_open
    }

    pub fn toggle_sidebar(&mut self) {
        self.sidebar_open = !self.sidebar_open;
    }

    pub fn play_search(&self) -> &str {
        &self.play_search
    }

    pub fn set_play_search(&mut self, query: String) {
        self.play_search = query;
    }

    pub fn line_search(&self) -> &str {
        &self.line_search
    }

    pub fn set_line_search(&mut self, query: String) {
        self.line_search = query;
    }

    /// Plays whose name or genre contains the play search query.
    pub fn filtered_plays(&self) -> Vec<&Play> {
        let Some(query) = normalize_query(&self.play_search) else {
            return self.corpus.plays.iter().collect();
        };
        self.corpus
            .plays
            .iter()
            .filter(|play| {
                contains_folded(&play.name, &query) || contains_folded(&play.genre, &query)
            })
            .collect()
    }

    /// Lines of the current scene whose text or speaker contains the line
    /// search query.
    pub fn lines(&self) -> Vec<&Line> {
        let Some(scene) = self.current_scene() else {
            return Vec::new();
        };
        let Some(query) = normalize_query(&self.line_search) else {
            return scene.lines.iter().collect();
        };
        scene
            .lines
            .iter()
            .filter(|line| {
                contains_folded(&line.text, &query) || contains_folded(&line.character, &query)
            })
            .collect()
    }

    pub fn highlighter(&self) -> Highlighter {
        Highlighter::new(&self.line_search)
    }

    pub fn highlight(&self, text: &str) -> String {
        self.highlighter().apply(text)
    }

    /// Neighborhood of a line in the current play, for grounding explanations.
    pub fn context_window(&self, global_index: Ordinal, radius: usize) -> Vec<ContextLine> {
        build_context_window(self.current_play(), global_index, radius)
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        let highlighter = self.highlighter();
        let stored_scroll = match self.selection.play_id.as_deref() {
            Some(play_id) => {
                self.get_stored_scroll(play_id, self.selection.act, self.selection.scene)
            }
            None => 0.0,
        };
        NavigationSnapshot {
            selection: self.selection.clone(),
            loading: self.loading,
            error: self.error.clone(),
            sidebar_open: self.sidebar_open,
            play_search: self.play_search.clone(),
            line_search: self.line_search.clone(),
            plays: self
                .filtered_plays()
                .into_iter()
                .map(|play| PlaySummary {
                    id: play.id.clone(),
                    name: play.name.clone(),
                    genre: play.genre.clone(),
                    act_count: play.acts.len(),
                    character_count: play.characters.len(),
                })
                .collect(),
            acts: self.acts().iter().map(|act| act.number).collect(),
            scenes: self.scenes().iter().map(|scene| scene.number).collect(),
            lines: self
                .lines()
                .into_iter()
                .map(|line| LineView {
                    global_index: line.global_index,
                    sentence: line.sentence,
                    character: line.character.clone(),
                    text: line.text.clone(),
                    highlighted_text: highlighter.apply(&line.text),
                })
                .collect(),
            stored_scroll,
        }
    }
}
