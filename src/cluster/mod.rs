// Failure clustering by inferred error signature
//
// Unexpected failures of the current run are labelled by pattern-matching
// the first line of their error text against an ordered signature list, then
// grouped by a deterministic hash of that label.
//
// Clusters hold their member results; results point back at clusters only
// through a ClusterIndex (test id → ClusterRef), never by embedding the
// member list twice.

mod clusterer;
mod signature;

pub use clusterer::{ClusterIndex, ClusterRef, FailureCluster, FailureClusterer};
pub use signature::{cluster_id, infer_error_type, UNKNOWN_ERROR};
