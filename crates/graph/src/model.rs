//! Core domain models for the workflow canvas.
//!
//! These types are the source of truth for what a graph looks like in
//! memory.  Every type is a plain value: the stores hand out clones, and
//! commands keep clones as snapshots, so nothing outside a store ever
//! aliases live state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a step, unique within one graph instance.
pub type StepId = u32;

/// Identifier of a comment, unique within one graph instance.
pub type CommentId = u32;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Canvas position of a step's top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub left: f64,
    pub top: f64,
}

impl Position {
    pub fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }

    /// Translate by `offset`.
    pub fn offset_by(self, offset: Position) -> Self {
        Self {
            left: self.left + offset.left,
            top: self.top + offset.top,
        }
    }
}

/// Axis-aligned rectangle enclosing a set of canvas elements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Bounds {
    /// A zero-area box at `point`.
    pub fn at(point: Position) -> Self {
        Self {
            left: point.left,
            top: point.top,
            right: point.left,
            bottom: point.top,
        }
    }

    /// Grow the box so it also covers `point`.
    pub fn include(&mut self, point: Position) {
        self.left = self.left.min(point.left);
        self.top = self.top.min(point.top);
        self.right = self.right.max(point.left);
        self.bottom = self.bottom.max(point.top);
    }

    pub fn center(&self) -> Position {
        Position {
            left: (self.left + self.right) / 2.0,
            top: (self.top + self.bottom) / 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// The receiving end of a connection: a named input on a step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InputTerminal {
    pub step_id: StepId,
    pub input_name: String,
}

/// The sending end of a connection: a named output on a step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputTerminal {
    pub step_id: StepId,
    pub output_name: String,
}

/// Directed edge from one step's output to another step's input.
///
/// Connections have no id of their own; the pair of terminals is the
/// identity.  At most one connection may end on a given input terminal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub input: InputTerminal,
    pub output: OutputTerminal,
}

impl Connection {
    pub fn new(
        output_step: StepId,
        output_name: impl Into<String>,
        input_step: StepId,
        input_name: impl Into<String>,
    ) -> Self {
        Self {
            input: InputTerminal {
                step_id: input_step,
                input_name: input_name.into(),
            },
            output: OutputTerminal {
                step_id: output_step,
                output_name: output_name.into(),
            },
        }
    }

    /// Whether either end of the connection sits on `step_id`.
    pub fn touches(&self, step_id: StepId) -> bool {
        self.input.step_id == step_id || self.output.step_id == step_id
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// What kind of module a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Tool,
    Subworkflow,
    DataInput,
    DataCollectionInput,
    ParameterInput,
    Pause,
}

/// Input port metadata, as described by the module service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInput {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub optional: bool,
}

/// Output port metadata, as described by the module service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// A single node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub name: String,
    /// Reference to the remote content this step runs (tool id, stored
    /// workflow id, ...).
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub position: Position,
    /// Upstream references keyed by input name.  Kept in sync with the
    /// connection store by [`crate::GraphStores`].
    #[serde(default)]
    pub input_connections: BTreeMap<String, Vec<OutputTerminal>>,
    #[serde(default)]
    pub inputs: Vec<StepInput>,
    #[serde(default)]
    pub outputs: Vec<StepOutput>,
    #[serde(default)]
    pub tool_state: Value,
    #[serde(default)]
    pub config_form: Value,
}

impl Step {
    /// A fresh, unconnected step.  The id is assigned on insertion.
    pub fn new(step_type: StepType, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            step_type,
            name: name.into(),
            content_id: None,
            label: None,
            annotation: None,
            position: Position::default(),
            input_connections: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            tool_state: Value::Null,
            config_form: Value::Null,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.position = Position::new(left, top);
        self
    }

    /// Every connection implied by `input_connections`.
    pub fn connections(&self) -> Vec<Connection> {
        self.input_connections
            .iter()
            .flat_map(|(input_name, sources)| {
                sources.iter().map(move |source| Connection {
                    input: InputTerminal {
                        step_id: self.id,
                        input_name: input_name.clone(),
                    },
                    output: source.clone(),
                })
            })
            .collect()
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|i| i.name == name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentColor {
    #[default]
    None,
    Black,
    Blue,
    Turquoise,
    Green,
    Lime,
    Orange,
    Yellow,
    Red,
    Pink,
}

/// Type-specific payload of a comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommentData {
    Text {
        text: String,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        italic: bool,
        size: f64,
    },
    Markdown {
        text: String,
    },
    Frame {
        title: String,
    },
    Freehand {
        thickness: f64,
        line: Vec<[f64; 2]>,
    },
}

impl CommentData {
    pub fn is_freehand(&self) -> bool {
        matches!(self, CommentData::Freehand { .. })
    }
}

/// A free-floating annotation on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub position: [f64; 2],
    pub size: [f64; 2],
    #[serde(default)]
    pub color: CommentColor,
    #[serde(flatten)]
    pub data: CommentData,
}

impl Comment {
    pub fn new(data: CommentData, position: [f64; 2], size: [f64; 2]) -> Self {
        Self {
            id: 0,
            position,
            size,
            color: CommentColor::None,
            data,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(
            CommentData::Text {
                text: text.into(),
                bold: false,
                italic: false,
                size: 1.0,
            },
            [0.0, 0.0],
            [200.0, 50.0],
        )
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Multi-selection plus the single "active" step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub steps: BTreeSet<StepId>,
    pub comments: BTreeSet<CommentId>,
    pub active_step: Option<StepId>,
}

impl Selection {
    pub fn of(steps: impl IntoIterator<Item = StepId>, comments: impl IntoIterator<Item = CommentId>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            comments: comments.into_iter().collect(),
            active_step: None,
        }
    }

    /// True when nothing is multi-selected.  The active step does not count.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.comments.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Serialized graphs
// ---------------------------------------------------------------------------

/// A serialized graph or subset of one.
///
/// Used for clipboard data, for the payload sent to the remote workflow
/// service, and as the on-disk document the CLI loads.  Connections are
/// carried in each step's `input_connections`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialGraph {
    #[serde(default)]
    pub steps: BTreeMap<StepId, Step>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl PartialGraph {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty() && self.comments.is_empty()
    }
}

/// Deep copy of all four stores at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub steps: BTreeMap<StepId, Step>,
    pub connections: Vec<Connection>,
    pub comments: BTreeMap<CommentId, Comment>,
    pub selection: Selection,
}

impl GraphSnapshot {
    /// Take a document as written, without the repairs loading it into
    /// stores would make.  Dangling references stay visible to validation.
    pub fn from_document(document: &PartialGraph) -> Self {
        let mut connections: Vec<Connection> = document.steps.values().flat_map(Step::connections).collect();
        connections.sort();
        Self {
            steps: document.steps.clone(),
            connections,
            comments: document.comments.iter().map(|c| (c.id, c.clone())).collect(),
            selection: Selection::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comment_serializes_with_type_tag_and_data() {
        let mut comment = Comment::text("hello");
        comment.id = 3;
        let value = serde_json::to_value(&comment).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["data"]["text"], "hello");
        assert_eq!(value["id"], 3);

        let back: Comment = serde_json::from_value(value).unwrap();
        assert_eq!(back, comment);
    }

    #[test]
    fn step_connections_are_derived_from_input_connections() {
        let mut step = Step::new(StepType::Tool, "cat");
        step.id = 7;
        step.input_connections.insert(
            "input1".into(),
            vec![OutputTerminal { step_id: 2, output_name: "out_file1".into() }],
        );

        assert_eq!(step.connections(), vec![Connection::new(2, "out_file1", 7, "input1")]);
    }

    #[test]
    fn step_deserializes_with_defaults() {
        let step: Step = serde_json::from_value(json!({
            "id": 1,
            "type": "data_input",
            "name": "Input dataset",
        }))
        .unwrap();
        assert_eq!(step.step_type, StepType::DataInput);
        assert!(step.label.is_none());
        assert!(step.input_connections.is_empty());
    }

    #[test]
    fn bounds_center() {
        let mut bounds = Bounds::at(Position::new(0.0, 10.0));
        bounds.include(Position::new(100.0, 50.0));
        assert_eq!(bounds.center(), Position::new(50.0, 30.0));
    }
}
