use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cluster::signature::{cluster_id, infer_error_type};
use crate::model::{TestOutcome, TestResult, TestStatus};

/// Unexpected failures sharing one inferred error signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureCluster {
    /// Content hash of the error-type label
    pub id: String,
    /// Representative label, taken from the first member
    pub error_type: String,
    pub count: usize,
    pub tests: Vec<TestResult>,
}

/// Back-reference from a result to its cluster, without the member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRef {
    pub id: String,
    pub error_type: String,
    pub count: usize,
}

impl From<&FailureCluster> for ClusterRef {
    fn from(cluster: &FailureCluster) -> Self {
        Self {
            id: cluster.id.clone(),
            error_type: cluster.error_type.clone(),
            count: cluster.count,
        }
    }
}

/// Lookup from test id to the cluster its failure belongs to
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    by_test: HashMap<String, ClusterRef>,
}

impl ClusterIndex {
    pub fn get(&self, test_id: &str) -> Option<&ClusterRef> {
        self.by_test.get(test_id)
    }

    pub fn len(&self) -> usize {
        self.by_test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_test.is_empty()
    }
}

/// Groups a run's unexpected failures by error signature
///
/// # Example
/// ```
/// use vigia::cluster::FailureClusterer;
/// use vigia::model::{TestOutcome, TestResult, TestStatus};
///
/// let results = vec![
///     TestResult::new("a", TestStatus::Failed, 10)
///         .with_error("TimeoutError: page.click exceeded")
///         .with_outcome(TestOutcome::Unexpected),
///     TestResult::new("b", TestStatus::TimedOut, 30_000)
///         .with_outcome(TestOutcome::Unexpected),
///     TestResult::new("c", TestStatus::Failed, 10)
///         .with_error("TypeError: cannot read properties of undefined"),
/// ];
///
/// let clusters = FailureClusterer::new().cluster(&results);
/// assert_eq!(clusters.len(), 2);
/// assert_eq!(clusters[0].error_type, "TimeoutError");
/// assert_eq!(clusters[0].count, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FailureClusterer;

impl FailureClusterer {
    pub fn new() -> Self {
        Self
    }

    /// Failed or timed out, and not an expected failure
    pub fn is_clusterable(result: &TestResult) -> bool {
        matches!(result.status, TestStatus::Failed | TestStatus::TimedOut)
            && result.outcome != Some(TestOutcome::Expected)
    }

    /// Build clusters in order of first appearance
    pub fn cluster(&self, results: &[TestResult]) -> Vec<FailureCluster> {
        let mut clusters: Vec<FailureCluster> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for result in results.iter().filter(|r| Self::is_clusterable(r)) {
            let error_type = infer_error_type(result.error.as_deref(), result.status);
            let id = cluster_id(&error_type);

            match positions.get(&id) {
                Some(&idx) => {
                    let cluster = &mut clusters[idx];
                    cluster.count += 1;
                    cluster.tests.push(result.clone());
                }
                None => {
                    positions.insert(id.clone(), clusters.len());
                    clusters.push(FailureCluster {
                        id,
                        error_type,
                        count: 1,
                        tests: vec![result.clone()],
                    });
                }
            }
        }

        tracing::debug!(clusters = clusters.len(), "failure clustering complete");
        clusters
    }

    /// Index every clustered test id back to its cluster
    pub fn index(clusters: &[FailureCluster]) -> ClusterIndex {
        let mut by_test = HashMap::new();
        for cluster in clusters {
            let reference = ClusterRef::from(cluster);
            for test in &cluster.tests {
                by_test.insert(test.test_id.clone(), reference.clone());
            }
        }
        ClusterIndex { by_test }
    }

    /// Clusters sorted by descending member count, at most `limit`
    ///
    /// Ties keep their order of first appearance.
    pub fn largest_clusters(clusters: &[FailureCluster], limit: usize) -> Vec<&FailureCluster> {
        let mut ranked: Vec<&FailureCluster> = clusters.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(limit);
        ranked
    }
}
