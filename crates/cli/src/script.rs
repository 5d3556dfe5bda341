//! Editing scripts: a JSON list of operations replayed against a graph.
//!
//! ```json
//! [
//!   { "op": "select", "steps": [5], "comments": [9] },
//!   { "op": "duplicate", "offset": { "left": 0, "top": 120 } },
//!   { "op": "undo" }
//! ]
//! ```

use serde::{Deserialize, Serialize};

use graph::{CommentColor, CommentId, Position, StepId};
use history::actions::{InputMapping, OutputMapping};

/// One user edit, as the canvas would issue it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    /// Add steps and comments to the selection.
    Select {
        #[serde(default)]
        steps: Vec<StepId>,
        #[serde(default)]
        comments: Vec<CommentId>,
    },
    ClearSelection,
    /// Duplicate the selection at `offset` from the originals.
    Duplicate {
        #[serde(default)]
        offset: Position,
    },
    DeleteSelection,
    /// Drag the selection to `offset` from where the drag started.
    /// Consecutive moves extend the same drag until a flush.
    Move { offset: Position },
    /// End the current drag.
    Flush,
    Undo,
    Redo,
    ChangeCommentColor {
        comment_id: CommentId,
        color: CommentColor,
    },
    /// Extract the selection into a subworkflow stored by an offline
    /// stand-in for the server.
    ExtractSubworkflow {
        name: String,
        #[serde(default)]
        inputs: Vec<InputMapping>,
        #[serde(default)]
        outputs: Vec<OutputMapping>,
    },
}

pub fn parse_script(json: &str) -> Result<Vec<Operation>, serde_json::Error> {
    serde_json::from_str(json)
}
