//! The three frontier disciplines and the node lifecycle loop they share
//! (§4.7): pop, crawl via the orchestrator, extract links, score, push.

use super::{DeepCrawlSnapshot, DeepCrawlStrategy, FrontierNode, FrontierQueue, OnStateChange, UrlScorer};
use crate::config::RunConfig;
use crate::dispatcher::RunOne;
use crate::error::CrawlError;
use crate::result::{CrawlResult, LinkItem};
use async_trait::async_trait;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;

struct BfsQueue(VecDeque<FrontierNode>);
impl FrontierQueue for BfsQueue {
    fn push(&mut self, node: FrontierNode) {
        self.0.push_back(node);
    }
    fn pop(&mut self) -> Option<FrontierNode> {
        self.0.pop_front()
    }
    fn snapshot(&self) -> Vec<FrontierNode> {
        self.0.iter().cloned().collect()
    }
    fn restore(&mut self, nodes: Vec<FrontierNode>) {
        self.0 = nodes.into();
    }
}

struct DfsQueue(Vec<FrontierNode>);
impl FrontierQueue for DfsQueue {
    fn push(&mut self, node: FrontierNode) {
        self.0.push(node);
    }
    fn pop(&mut self) -> Option<FrontierNode> {
        self.0.pop()
    }
    fn snapshot(&self) -> Vec<FrontierNode> {
        self.0.clone()
    }
    fn restore(&mut self, nodes: Vec<FrontierNode>) {
        self.0 = nodes;
    }
}

#[derive(Clone, PartialEq)]
struct ScoredNode(FrontierNode);

impl Eq for ScoredNode {}
impl Ord for ScoredNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Higher score first; for ties, earlier insertion (smaller
        // sequence) first.
        self.0
            .score
            .partial_cmp(&other.0.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| other.0.sequence.cmp(&self.0.sequence))
    }
}
impl PartialOrd for ScoredNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct BestFirstQueue(BinaryHeap<ScoredNode>);
impl FrontierQueue for BestFirstQueue {
    fn push(&mut self, node: FrontierNode) {
        self.0.push(ScoredNode(node));
    }
    fn pop(&mut self) -> Option<FrontierNode> {
        self.0.pop().map(|s| s.0)
    }
    fn snapshot(&self) -> Vec<FrontierNode> {
        self.0.iter().map(|s| s.0.clone()).collect()
    }
    fn restore(&mut self, nodes: Vec<FrontierNode>) {
        self.0 = nodes.into_iter().map(ScoredNode).collect();
    }
}

/// The node lifecycle shared by all three strategies (§4.7): pop, crawl,
/// extract links, score, push, stop on empty/`max_pages`/external signal.
async fn run_loop(
    mut frontier: impl FrontierQueue,
    start_url: String,
    config: RunConfig,
    runner: Arc<dyn RunOne>,
    max_depth: u32,
    max_pages: Option<usize>,
    include_external: bool,
    scorer: UrlScorer,
    resume_state: Option<DeepCrawlSnapshot>,
    on_state_change: Option<OnStateChange>,
) -> Result<Vec<CrawlResult>, CrawlError> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut sequence: u64 = 0;
    let mut results = Vec::new();

    match resume_state {
        Some(state) => {
            for url in &state.visited {
                visited.insert(url.clone());
            }
            sequence = state.frontier.iter().map(|n| n.sequence).max().unwrap_or(0) + 1;
            frontier.restore(state.frontier);
        }
        None => {
            let canonical = crate::url::canonicalize(&start_url).unwrap_or_else(|_| start_url.clone());
            visited.insert(canonical);
            frontier.push(FrontierNode {
                url: start_url,
                depth: 0,
                score: 0.0,
                sequence,
            });
            sequence += 1;
        }
    }

    loop {
        if let Some(limit) = max_pages {
            if results.len() >= limit {
                break;
            }
        }
        let Some(node) = frontier.pop() else {
            break;
        };

        let result = match runner.run_one(node.url.clone(), config.clone(), None).await {
            Ok(result) => result,
            Err(e) => CrawlResult::failure(&node.url, e.to_string()),
        };

        if result.success && node.depth < max_depth {
            let candidates: Vec<&LinkItem> = if include_external {
                result.links.internal.iter().chain(result.links.external.iter()).collect()
            } else {
                result.links.internal.iter().collect()
            };
            for link in candidates {
                let canonical = match crate::url::canonicalize(&link.href) {
                    Ok(c) => c,
                    Err(_) => continue,
                };
                if visited.contains(&canonical) {
                    continue;
                }
                visited.insert(canonical);
                let score = scorer.score(&link.href, &link.text);
                frontier.push(FrontierNode {
                    url: link.href.clone(),
                    depth: node.depth + 1,
                    score,
                    sequence,
                });
                sequence += 1;
            }
        }

        results.push(result);

        if let Some(callback) = &on_state_change {
            let snapshot = DeepCrawlSnapshot {
                visited: visited.iter().cloned().collect(),
                frontier: frontier.snapshot(),
                pages_crawled: results.len(),
            };
            callback(&snapshot);
        }
    }

    Ok(results)
}

/// FIFO frontier: shallower pages are visited before deeper ones at the
/// same insertion rate.
pub struct Bfs {
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    pub include_external: bool,
}

impl Default for Bfs {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: None,
            include_external: false,
        }
    }
}

#[async_trait]
impl DeepCrawlStrategy for Bfs {
    async fn run(
        &self,
        start_url: String,
        config: RunConfig,
        runner: Arc<dyn RunOne>,
        resume_state: Option<DeepCrawlSnapshot>,
        on_state_change: Option<OnStateChange>,
    ) -> Result<Vec<CrawlResult>, CrawlError> {
        run_loop(
            BfsQueue(VecDeque::new()),
            start_url,
            config,
            runner,
            self.max_depth,
            self.max_pages,
            self.include_external,
            UrlScorer::intrinsic_only(),
            resume_state,
            on_state_change,
        )
        .await
    }
}

/// LIFO frontier: the most recently discovered link is visited next.
pub struct Dfs {
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    pub include_external: bool,
}

impl Default for Dfs {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: None,
            include_external: false,
        }
    }
}

#[async_trait]
impl DeepCrawlStrategy for Dfs {
    async fn run(
        &self,
        start_url: String,
        config: RunConfig,
        runner: Arc<dyn RunOne>,
        resume_state: Option<DeepCrawlSnapshot>,
        on_state_change: Option<OnStateChange>,
    ) -> Result<Vec<CrawlResult>, CrawlError> {
        run_loop(
            DfsQueue(Vec::new()),
            start_url,
            config,
            runner,
            self.max_depth,
            self.max_pages,
            self.include_external,
            UrlScorer::intrinsic_only(),
            resume_state,
            on_state_change,
        )
        .await
    }
}

/// Priority frontier ordered by `(score desc, insertion asc)`, scored via
/// `UrlScorer`.
pub struct BestFirst {
    pub max_depth: u32,
    pub max_pages: Option<usize>,
    pub include_external: bool,
    pub scorer: UrlScorer,
}

impl BestFirst {
    pub fn new(query: &str) -> Self {
        Self {
            max_depth: 2,
            max_pages: None,
            include_external: false,
            scorer: UrlScorer::new(query),
        }
    }
}

#[async_trait]
impl DeepCrawlStrategy for BestFirst {
    async fn run(
        &self,
        start_url: String,
        config: RunConfig,
        runner: Arc<dyn RunOne>,
        resume_state: Option<DeepCrawlSnapshot>,
        on_state_change: Option<OnStateChange>,
    ) -> Result<Vec<CrawlResult>, CrawlError> {
        run_loop(
            BestFirstQueue(BinaryHeap::new()),
            start_url,
            config,
            runner,
            self.max_depth,
            self.max_pages,
            self.include_external,
            self.scorer.clone(),
            resume_state,
            on_state_change,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A tiny fake site: each URL "links to" the ones listed for it.
    struct FakeSite {
        links: std::collections::HashMap<String, Vec<String>>,
        visits: Mutex<Vec<String>>,
    }

    impl RunOne for FakeSite {
        fn run_one(
            &self,
            url: String,
            _config: RunConfig,
            _proxy: Option<crate::config::ProxyConfig>,
        ) -> std::pin::Pin<Box<dyn Future<Output = Result<CrawlResult, CrawlError>> + Send>> {
            let targets = self.links.get(&url).cloned().unwrap_or_default();
            self.visits.lock().unwrap().push(url.clone());
            Box::pin(async move {
                let mut result = CrawlResult::failure(&url, "placeholder");
                result.success = true;
                result.error_message = None;
                result.links.internal = targets
                    .into_iter()
                    .map(|href| LinkItem {
                        href,
                        text: String::new(),
                        ..Default::default()
                    })
                    .collect();
                Ok(result)
            })
        }
    }

    #[tokio::test]
    async fn bfs_visits_all_reachable_pages_once() {
        let mut links = std::collections::HashMap::new();
        links.insert("https://x.test/".to_string(), vec!["https://x.test/a".into(), "https://x.test/b".into()]);
        links.insert("https://x.test/a".to_string(), vec!["https://x.test/c".into()]);
        let site = Arc::new(FakeSite {
            links,
            visits: Mutex::new(Vec::new()),
        });

        let strategy = Bfs {
            max_depth: 3,
            max_pages: None,
            include_external: false,
        };
        let results = strategy
            .run("https://x.test/".into(), RunConfig::default(), site.clone(), None, None)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
    }

    #[tokio::test]
    async fn max_pages_stops_early() {
        let mut links = std::collections::HashMap::new();
        links.insert("https://x.test/".to_string(), vec!["https://x.test/a".into(), "https://x.test/b".into()]);
        let site = Arc::new(FakeSite {
            links,
            visits: Mutex::new(Vec::new()),
        });

        let strategy = Bfs {
            max_depth: 3,
            max_pages: Some(1),
            include_external: false,
        };
        let results = strategy
            .run("https://x.test/".into(), RunConfig::default(), site, None, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn resume_state_skips_already_visited() {
        let mut links = std::collections::HashMap::new();
        links.insert("https://x.test/a".to_string(), vec!["https://x.test/b".into()]);
        let site = Arc::new(FakeSite {
            links,
            visits: Mutex::new(Vec::new()),
        });

        let resume = DeepCrawlSnapshot {
            visited: vec!["https://x.test/".into()],
            frontier: vec![FrontierNode {
                url: "https://x.test/a".into(),
                depth: 1,
                score: 0.0,
                sequence: 0,
            }],
            pages_crawled: 1,
        };

        let strategy = Bfs {
            max_depth: 3,
            max_pages: None,
            include_external: false,
        };
        let results = strategy
            .run(
                "https://x.test/".into(),
                RunConfig::default(),
                site,
                Some(resume),
                None,
            )
            .await
            .unwrap();

        // Only "/a" and "/b" are crawled this run; "/" was already visited.
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn on_state_change_fires_after_each_node() {
        let mut links = std::collections::HashMap::new();
        links.insert("https://x.test/".to_string(), vec!["https://x.test/a".into()]);
        let site = Arc::new(FakeSite {
            links,
            visits: Mutex::new(Vec::new()),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let callback: OnStateChange = Arc::new(move |_snapshot| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let strategy = Bfs {
            max_depth: 2,
            max_pages: None,
            include_external: false,
        };
        strategy
            .run("https://x.test/".into(), RunConfig::default(), site, None, Some(callback))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
