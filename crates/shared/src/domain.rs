use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NO_NUMBER: &str = "(no number)";
pub const UNNAMED: &str = "Unnamed";
pub const GROUP_CUE_TYPE: &str = "Group";
pub const NESTING_MARKER: &str = "--> ";

/// A show document open in the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
}

/// One cue as reported by the controller, children included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueNode {
    pub id: String,
    pub number: String,
    pub name: String,
    pub cue_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CueNode>,
}

impl CueNode {
    pub fn is_group(&self) -> bool {
        self.cue_type == GROUP_CUE_TYPE
    }
}

/// A single cue reading (selected or active cue) without structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CueSample {
    pub id: Option<String>,
    pub number: String,
    pub name: String,
    pub cue_type: String,
}

/// Index path from the top-level cue list down to a cue, 1-based.
///
/// Paths compare lexicographically, which is exactly depth-first traversal
/// order regardless of how many children a group has.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CuePath(pub Vec<u32>);

impl CuePath {
    pub fn root(index: u32) -> Self {
        Self(vec![index])
    }

    pub fn child(&self, index: u32) -> Self {
        let mut path = self.0.clone();
        path.push(index);
        Self(path)
    }

    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }
}

impl fmt::Display for CuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
            first = false;
        }
        Ok(())
    }
}

/// An addressable entry of the flattened cue list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    pub id: String,
    pub number: String,
    pub display_name: String,
    pub original_name: String,
    pub position: CuePath,
    pub depth: usize,
    pub cue_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CueType {
    Known(String),
    Unknown,
    Error,
}

impl CueType {
    pub fn from_controller(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
            Self::Unknown
        } else if trimmed.eq_ignore_ascii_case("error") {
            Self::Error
        } else {
            Self::Known(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(name) => name,
            Self::Unknown => "unknown",
            Self::Error => "error",
        }
    }
}

impl Serialize for CueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CueType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_controller(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub number: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cue_type: CueType,
}

impl CueRef {
    fn sentinel(number: &str, name: impl Into<String>, cue_type: CueType) -> Self {
        Self {
            id: None,
            number: number.to_string(),
            name: name.into(),
            cue_type,
        }
    }

    pub fn empty() -> Self {
        Self::sentinel("", "", CueType::Unknown)
    }

    pub fn no_next() -> Self {
        Self::sentinel("--", "No next cue", CueType::Unknown)
    }

    pub fn nothing_selected() -> Self {
        Self::sentinel("--", "No selection or active cue", CueType::Unknown)
    }

    pub fn error(message: &str) -> Self {
        let short: String = message.chars().take(30).collect();
        Self::sentinel("ERR", format!("Error: {short}"), CueType::Error)
    }

    pub fn error_next() -> Self {
        Self::sentinel("ERR", "Error", CueType::Error)
    }

    pub fn from_sample(sample: &CueSample) -> Self {
        Self {
            id: sample.id.clone(),
            number: sample.number.clone(),
            name: sample.name.clone(),
            cue_type: CueType::from_controller(&sample.cue_type),
        }
    }

    pub fn from_cue(cue: &Cue) -> Self {
        Self {
            id: Some(cue.id.clone()),
            number: cue.number.clone(),
            name: cue.original_name.clone(),
            cue_type: CueType::from_controller(&cue.cue_type),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Selected,
    Active,
    Nothing,
    Error,
    Empty,
}

/// Cached current/next cue for the connected workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub current: CueRef,
    pub next: CueRef,
    pub source: SelectionSource,
    pub refreshed_at: DateTime<Utc>,
}

impl SelectionState {
    pub fn empty() -> Self {
        Self {
            current: CueRef::empty(),
            next: CueRef::empty(),
            source: SelectionSource::Empty,
            refreshed_at: Utc::now(),
        }
    }

    pub fn from_selected(current: CueRef, next: Option<CueRef>) -> Self {
        let next = match (&current.id, next) {
            (Some(_), Some(next)) => next,
            _ => CueRef::no_next(),
        };
        Self {
            current,
            next,
            source: SelectionSource::Selected,
            refreshed_at: Utc::now(),
        }
    }

    pub fn from_active(current: CueRef) -> Self {
        Self {
            current,
            next: CueRef::no_next(),
            source: SelectionSource::Active,
            refreshed_at: Utc::now(),
        }
    }

    pub fn nothing() -> Self {
        Self {
            current: CueRef::nothing_selected(),
            next: CueRef::no_next(),
            source: SelectionSource::Nothing,
            refreshed_at: Utc::now(),
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            current: CueRef::error(message),
            next: CueRef::error_next(),
            source: SelectionSource::Error,
            refreshed_at: Utc::now(),
        }
    }

    /// Equality ignoring the sample timestamp.
    pub fn same_cues(&self, other: &Self) -> bool {
        self.current == other.current && self.next == other.next && self.source == other.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_paths_order_past_one_hundred_children() {
        let group = CuePath::root(1);
        let late_child = group.child(150);
        let next_top = CuePath::root(2);
        assert!(group < group.child(1));
        assert!(group.child(99) < late_child);
        assert!(late_child < next_top);
        assert_eq!(late_child.to_string(), "1.150");
        assert_eq!(late_child.depth(), 1);
    }

    #[test]
    fn selected_state_without_id_has_no_next() {
        let current = CueRef {
            id: None,
            number: "3".into(),
            name: "Fade".into(),
            cue_type: CueType::Known("Fade".into()),
        };
        let stale_next = CueRef {
            id: Some("x".into()),
            number: "4".into(),
            name: "Stale".into(),
            cue_type: CueType::Unknown,
        };
        let state = SelectionState::from_selected(current, Some(stale_next));
        assert_eq!(state.next, CueRef::no_next());
    }

    #[test]
    fn error_sentinel_truncates_message() {
        let cue = CueRef::error("a very long error message that keeps going and going");
        assert_eq!(cue.number, "ERR");
        assert_eq!(cue.name, "Error: a very long error message that");
        assert_eq!(cue.cue_type, CueType::Error);
    }

    #[test]
    fn cue_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&CueRef::no_next()).expect("json");
        assert_eq!(json, r#"{"number":"--","name":"No next cue","type":"unknown"}"#);
    }
}
