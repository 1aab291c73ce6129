//! Deep crawl engine (§4.7): BFS/DFS/Best-First strategies sharing one node
//! lifecycle, a canonicalized-URL visited set, and a JSON-serializable,
//! resumable snapshot.

mod frontier;
mod score;

pub use frontier::{BestFirst, Bfs, Dfs};
pub use score::UrlScorer;

use crate::config::RunConfig;
use crate::dispatcher::RunOne;
use crate::error::CrawlError;
use crate::result::CrawlResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One entry waiting to be visited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontierNode {
    pub url: String,
    pub depth: u32,
    pub score: f64,
    /// Insertion order, used to break score ties in `BestFirst` and as the
    /// sole order for BFS/DFS.
    pub sequence: u64,
}

/// The full traversal state, serializable so a caller can persist it after
/// every node (`on_state_change`) and resume a crawl later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepCrawlSnapshot {
    pub visited: Vec<String>,
    pub frontier: Vec<FrontierNode>,
    pub pages_crawled: usize,
}

/// Invoked after each node finishes, for real-time persistence. Not boxed
/// into the snapshot itself — supplied per `run` call.
pub type OnStateChange = Arc<dyn Fn(&DeepCrawlSnapshot) + Send + Sync>;

/// Shared by `Bfs`, `Dfs`, and `BestFirst`: only the frontier's pop/push
/// order differs between them.
#[async_trait]
pub trait DeepCrawlStrategy: Send + Sync {
    async fn run(
        &self,
        start_url: String,
        config: RunConfig,
        runner: Arc<dyn RunOne>,
        resume_state: Option<DeepCrawlSnapshot>,
        on_state_change: Option<OnStateChange>,
    ) -> Result<Vec<CrawlResult>, CrawlError>;
}

/// A frontier's insertion/removal discipline. `Bfs` = FIFO, `Dfs` = LIFO,
/// `BestFirst` = priority by `(score desc, sequence asc)`.
pub(crate) trait FrontierQueue: Send {
    fn push(&mut self, node: FrontierNode);
    fn pop(&mut self) -> Option<FrontierNode>;
    fn snapshot(&self) -> Vec<FrontierNode>;
    fn restore(&mut self, nodes: Vec<FrontierNode>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_round_trips_through_json() {
        let snapshot = DeepCrawlSnapshot {
            visited: vec!["https://x.test/a".into()],
            frontier: vec![FrontierNode {
                url: "https://x.test/b".into(),
                depth: 1,
                score: 0.5,
                sequence: 3,
            }],
            pages_crawled: 1,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: DeepCrawlSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.visited, snapshot.visited);
        assert_eq!(back.frontier.len(), 1);
    }
}
