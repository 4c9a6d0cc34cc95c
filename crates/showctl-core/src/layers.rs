//! Closed layer and transition-speed tables, and cursor selectors.
//!
//! Both tables are fixed enumerations validated case-insensitively; an
//! invalid name or index is a caller error (boolean-false contract), never
//! a fault.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five fixed master layers of a document, in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Text,
    Overlay,
    Normal,
    Underlay,
    Audio,
}

impl Layer {
    /// All layers in table order (indices 1 through 5).
    pub const ALL: [Layer; 5] = [
        Layer::Text,
        Layer::Overlay,
        Layer::Normal,
        Layer::Underlay,
        Layer::Audio,
    ];

    /// 1-based index within the master layer table.
    pub fn index(self) -> i32 {
        match self {
            Layer::Text => 1,
            Layer::Overlay => 2,
            Layer::Normal => 3,
            Layer::Underlay => 4,
            Layer::Audio => 5,
        }
    }

    pub fn from_index(index: i32) -> Option<Self> {
        match index {
            1 => Some(Layer::Text),
            2 => Some(Layer::Overlay),
            3 => Some(Layer::Normal),
            4 => Some(Layer::Underlay),
            5 => Some(Layer::Audio),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Layer::Text => "text",
            Layer::Overlay => "overlay",
            Layer::Normal => "normal",
            Layer::Underlay => "underlay",
            Layer::Audio => "audio",
        }
    }

    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Layer::ALL.into_iter().find(|layer| layer.name() == lower)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Transition speed of a document, a closed five-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionSpeed {
    Slowest,
    Slow,
    Normal,
    Faster,
    Fastest,
}

impl TransitionSpeed {
    pub const ALL: [TransitionSpeed; 5] = [
        TransitionSpeed::Slowest,
        TransitionSpeed::Slow,
        TransitionSpeed::Normal,
        TransitionSpeed::Faster,
        TransitionSpeed::Fastest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransitionSpeed::Slowest => "slowest",
            TransitionSpeed::Slow => "slow",
            TransitionSpeed::Normal => "normal",
            TransitionSpeed::Faster => "faster",
            TransitionSpeed::Fastest => "fastest",
        }
    }

    /// Case-insensitive name lookup.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        TransitionSpeed::ALL
            .into_iter()
            .find(|speed| speed.name() == lower)
    }
}

impl fmt::Display for TransitionSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Selects a document by 1-based index or by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentSelector {
    Index(i32),
    Name(String),
}

impl fmt::Display for DocumentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSelector::Index(index) => write!(f, "#{}", index),
            DocumentSelector::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// Selects a layer by 1-based index or by (case-insensitive) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerSelector {
    Index(i32),
    Name(String),
}

impl LayerSelector {
    /// Resolve against the fixed table. `None` for anything outside it.
    pub fn resolve(&self) -> Option<Layer> {
        match self {
            LayerSelector::Index(index) => Layer::from_index(*index),
            LayerSelector::Name(name) => Layer::from_name(name),
        }
    }
}

impl From<Layer> for LayerSelector {
    fn from(layer: Layer) -> Self {
        LayerSelector::Name(layer.name().to_string())
    }
}
