//! Core engine for the play reader: the CSV transform that produces
//! `plays.json`, the navigation store over the loaded corpus, context-window
//! extraction and the explanation chat registry.

pub mod bindings;
pub mod cache;
pub mod config;
pub mod context_window;
pub mod explain;
pub mod model;
pub mod navigation;
pub mod source;
pub mod text_utils;
pub mod transform;
