use crate::error::GeometryError;
use crate::models::SelectionResult;

/// Result of one query, as reported to the user
#[derive(Debug)]
pub enum Outcome {
    /// No region drawn yet
    NothingDrawn,
    /// Regions drawn, but no unit intersects them
    NoMatch,
    Found(SelectionResult),
    /// Drawn input was unusable; the user may redraw and retry
    Failed(GeometryError),
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::NothingDrawn => "nothing_drawn",
            Outcome::NoMatch => "no_match",
            Outcome::Found(_) => "found",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn result(&self) -> Option<&SelectionResult> {
        match self {
            Outcome::Found(result) => Some(result),
            _ => None,
        }
    }

    /// User-facing summary. The found count is of matched records, so two
    /// units sharing a name count twice.
    pub fn message(&self) -> String {
        match self {
            Outcome::NothingDrawn => "No region has been drawn on the map yet.".to_string(),
            Outcome::NoMatch => "No commune lies within the drawn regions.".to_string(),
            Outcome::Found(result) => format!(
                "Found {} communes within the drawn regions.",
                result.matched_count()
            ),
            Outcome::Failed(e) => format!("Could not process the drawn regions: {e}"),
        }
    }
}
