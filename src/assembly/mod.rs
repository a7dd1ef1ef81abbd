//! The assembly pipeline: tag/tree identity resolution, splits, property
//! and primary timelines, implied-absence rows, and derived views.

pub mod observations;
pub mod primary;
pub mod properties;
pub mod reassemble;
pub mod split;
pub mod survey;
pub mod treebuilder;
pub mod tree_outputs;
pub mod trees;

pub use observations::{assemble_observations, compute_observation_id, ObservationRow};
pub use reassemble::assemble_dataset;
pub use survey::SurveyCatalog;
pub use tree_outputs::{build_retag_suggestions, build_tree_view, RetagSuggestion, TreeViewRow};
pub use treebuilder::{assign_tree_uids, build_alias_resolver, tree_uid_for_tag, AliasResolver};
pub use trees::generate_implied_rows;
