//! robots.txt compliance (`check_robots_txt` in `RunConfig`), a simplified
//! same-shape port of `spider::packages::robotparser`: entries, rule lines,
//! crawl-delay, queried through an async `fetch_and_check`.

use dashmap::DashMap;
use percent_encoding::percent_decode;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleLine {
    path: String,
    allowance: bool,
}

impl RuleLine {
    fn new(path: &str, allowance: bool) -> Self {
        RuleLine {
            path: path.to_string(),
            allowance: (path.is_empty() && !allowance) || allowance,
        }
    }

    fn applies_to(&self, filename: &str) -> bool {
        self.path == "*" || filename.starts_with(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Entry {
    useragents: Vec<String>,
    rulelines: Vec<RuleLine>,
    crawl_delay: Option<Duration>,
}

impl Entry {
    fn applies_to(&self, useragent: &str) -> bool {
        let ua = useragent.split('/').next().unwrap_or_default().to_lowercase();
        self.useragents.iter().any(|agent| agent == "*" || ua.contains(agent))
    }

    fn allowance(&self, filename: &str) -> bool {
        for line in &self.rulelines {
            if line.applies_to(filename) {
                return line.allowance;
            }
        }
        true
    }

    fn has_wildcard_useragent(&self) -> bool {
        self.useragents.iter().any(|a| a == "*")
    }

    fn is_empty(&self) -> bool {
        self.useragents.is_empty() && self.rulelines.is_empty()
    }
}

/// One fetched-and-parsed robots.txt, frozen after `read`/`parse`.
#[derive(Debug, Clone, Default)]
struct RobotFile {
    entries: Vec<Entry>,
    default_entry: Entry,
    disallow_all: bool,
    allow_all: bool,
}

impl RobotFile {
    fn add_entry(&mut self, entry: Entry) {
        if entry.has_wildcard_useragent() {
            if self.default_entry.is_empty() {
                self.default_entry = entry;
            }
        } else {
            self.entries.push(entry);
        }
    }

    fn parse(lines: &str) -> Self {
        let mut file = RobotFile::default();
        let mut state = 0u8;
        let mut entry = Entry::default();

        for raw_line in lines.split('\n') {
            let mut line = raw_line;
            if let Some(i) = line.find('#') {
                line = &line[..i];
            }
            line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = String::from_utf8(percent_decode(value.trim().as_bytes()).collect())
                .unwrap_or_default();

            match key.as_str() {
                "user-agent" => {
                    if state == 2 {
                        file.add_entry(std::mem::take(&mut entry));
                    }
                    entry.useragents.push(value.to_lowercase());
                    state = 1;
                }
                "disallow" if state != 0 => {
                    entry.rulelines.push(RuleLine::new(&value, false));
                    state = 2;
                }
                "allow" if state != 0 => {
                    entry.rulelines.push(RuleLine::new(&value, true));
                    state = 2;
                }
                "crawl-delay" if state != 0 => {
                    if let Ok(delay_s) = value.parse::<f64>() {
                        entry.crawl_delay = Some(Duration::from_secs_f64(delay_s.max(0.0)));
                    }
                    state = 2;
                }
                _ => {}
            }
        }
        if state == 2 {
            file.add_entry(entry);
        }
        file
    }

    fn can_fetch(&self, user_agent: &str, url: &str) -> bool {
        if self.disallow_all {
            return false;
        }
        if self.allow_all {
            return true;
        }
        let decoded =
            String::from_utf8(percent_decode(url.trim().as_bytes()).collect()).unwrap_or_default();
        let path = if decoded.is_empty() { "/" } else { &decoded };

        for entry in &self.entries {
            if entry.applies_to(user_agent) {
                return entry.allowance(path);
            }
        }
        if !self.default_entry.is_empty() {
            return self.default_entry.allowance(path);
        }
        true
    }

    fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        for entry in &self.entries {
            if entry.applies_to(user_agent) {
                return entry.crawl_delay;
            }
        }
        self.default_entry.crawl_delay
    }
}

/// Fetches and caches robots.txt per origin, answering `can_fetch` queries.
/// One instance is shared across every `arun` issued by a crawler.
pub struct RobotsChecker {
    cache: DashMap<String, RobotFile>,
}

impl RobotsChecker {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    fn origin(url: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        Some(match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        })
    }

    /// Fetch (if not already cached) and check whether `user_agent` may
    /// crawl `url`. A fetch error is treated as "allow" — robots.txt absence
    /// or unreachability is not itself a crawl-blocking condition.
    pub async fn is_allowed(&self, client: &reqwest::Client, url: &str, user_agent: &str) -> bool {
        let Some(origin) = Self::origin(url) else {
            return true;
        };
        if self.cache.get(&origin).is_none() {
            let robots_url = format!("{origin}/robots.txt");
            let file = match client.get(&robots_url).send().await {
                Ok(response) => match response.status() {
                    status if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN => {
                        RobotFile {
                            disallow_all: true,
                            ..Default::default()
                        }
                    }
                    status if status.is_client_error() => RobotFile {
                        allow_all: true,
                        ..Default::default()
                    },
                    status if status.is_success() => match response.text().await {
                        Ok(body) => RobotFile::parse(&body),
                        Err(_) => RobotFile {
                            allow_all: true,
                            ..Default::default()
                        },
                    },
                    _ => RobotFile {
                        allow_all: true,
                        ..Default::default()
                    },
                },
                Err(_) => RobotFile {
                    allow_all: true,
                    ..Default::default()
                },
            };
            self.cache.insert(origin.clone(), file);
        }
        self.cache
            .get(&origin)
            .map(|file| file.can_fetch(user_agent, url))
            .unwrap_or(true)
    }

    pub fn crawl_delay(&self, url: &str, user_agent: &str) -> Option<Duration> {
        let origin = Self::origin(url)?;
        self.cache.get(&origin)?.crawl_delay(user_agent)
    }
}

impl Default for RobotsChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disallow_rule_blocks_matching_prefix() {
        let file = RobotFile::parse("User-agent: *\nDisallow: /private\n");
        assert!(!file.can_fetch("any-bot", "/private/data"));
        assert!(file.can_fetch("any-bot", "/public"));
    }

    #[test]
    fn specific_user_agent_overrides_wildcard() {
        let file = RobotFile::parse(
            "User-agent: *\nDisallow: /\n\nUser-agent: GoodBot\nDisallow:\nAllow: /\n",
        );
        assert!(!file.can_fetch("OtherBot", "/anything"));
        assert!(file.can_fetch("GoodBot/1.0", "/anything"));
    }

    #[test]
    fn crawl_delay_is_parsed() {
        let file = RobotFile::parse("User-agent: *\nCrawl-delay: 2.5\n");
        assert_eq!(file.crawl_delay("any-bot"), Some(Duration::from_secs_f64(2.5)));
    }

    #[test]
    fn empty_file_allows_everything() {
        let file = RobotFile::parse("");
        assert!(file.can_fetch("any-bot", "/x"));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let file = RobotFile::parse("# comment\n\nUser-agent: *\n# another\nDisallow: /x\n");
        assert!(!file.can_fetch("any-bot", "/x"));
        assert!(file.can_fetch("any-bot", "/y"));
    }
}
