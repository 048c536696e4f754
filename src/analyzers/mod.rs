//! Grouped statistics over the loaded experiment tables.
//!
//! Computes per-school means, joins environmental and growth summaries on
//! the school key, ranks schools to find the optimal target concentration,
//! and assembles the full study report.

pub mod aggregate;
pub mod best;
pub mod report;
pub mod types;
pub mod utility;
