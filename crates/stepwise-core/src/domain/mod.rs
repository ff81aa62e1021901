/// Step and step sequence models
pub mod step;

/// Per-step outcomes and run summaries
pub mod outcome;
