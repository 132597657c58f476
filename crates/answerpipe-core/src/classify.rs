//! Heuristic "does this query need live web search?" classifier.
//!
//! This is approximate. It matches plain lowercase substrings/prefixes against
//! small lexicons, so it will misfire on some queries (e.g. "new" inside
//! "renewable"). When unsure it says yes: an unnecessary search costs less
//! than a stale answer.
//!
//! The policy is an ordered rule list evaluated first-match-wins:
//! recency > search intent > knowledge prefix > default (search).

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Query mentions something time-sensitive.
    Recency,
    /// Query reads like a lookup / shopping / comparison request.
    SearchIntent,
    /// Query starts like a stable-knowledge question.
    KnowledgePrefix,
    /// Nothing matched.
    Default,
}

impl Rule {
    pub fn verdict(self) -> bool {
        !matches!(self, Self::KnowledgePrefix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub use_web_search: bool,
    pub rule: Rule,
    /// Lexicon entry that fired (absent for [`Rule::Default`]).
    pub matched: Option<String>,
}

const RECENCY_BASE: &[&str] = &[
    "latest",
    "recent",
    "current",
    "now",
    "today",
    "this year",
    "news",
    "breaking",
    "updates",
    "happening",
    "trending",
    "new",
    "just",
    "price",
    "stock",
    "weather",
    "forecast",
    "schedule",
    "events",
    "who won",
    "who is",
    "what happened",
    "when did",
    "status of",
];

const SEARCH_INTENT: &[&str] = &[
    "find",
    "search",
    "look up",
    "reviews",
    "comparison",
    "compare",
    "vs",
    "best",
    "top",
    "list of",
    "guide",
    "tutorial",
    "how to",
    "where can i",
    "where to",
    "contact",
    "address",
    "phone",
    "buy",
    "purchase",
    "store",
    "shop",
    "available",
];

const KNOWLEDGE_PREFIXES: &[&str] = &[
    "what is",
    "define",
    "explain",
    "how does",
    "why does",
    "what does",
    "capital of",
    "president of",
    "author of",
    "invented",
    "discovered",
    "formula",
    "equation",
    "rule",
    "law",
    "theory",
    "principle",
    "meaning of",
    "difference between",
    "history of",
    "origin of",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPolicy {
    /// Evaluation order. [`Rule::Default`] entries are ignored; the default
    /// verdict always applies last.
    pub rules: Vec<Rule>,
    pub recency: Vec<String>,
    pub search_intent: Vec<String>,
    pub knowledge_prefixes: Vec<String>,
}

impl SearchPolicy {
    pub const DEFAULT_ORDER: [Rule; 3] = [Rule::Recency, Rule::SearchIntent, Rule::KnowledgePrefix];

    /// Default lexicons, with `year - 1` and `year` as recency markers.
    pub fn for_year(year: i32) -> Self {
        let mut recency: Vec<String> = RECENCY_BASE.iter().map(|s| s.to_string()).collect();
        recency.push((year - 1).to_string());
        recency.push(year.to_string());
        Self {
            rules: Self::DEFAULT_ORDER.to_vec(),
            recency,
            search_intent: SEARCH_INTENT.iter().map(|s| s.to_string()).collect(),
            knowledge_prefixes: KNOWLEDGE_PREFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn classify(&self, query: &str) -> Classification {
        let q = query.trim().to_lowercase();
        for rule in &self.rules {
            if let Some(term) = self.first_match(*rule, &q) {
                return Classification {
                    use_web_search: rule.verdict(),
                    rule: *rule,
                    matched: Some(term.to_string()),
                };
            }
        }
        Classification {
            use_web_search: Rule::Default.verdict(),
            rule: Rule::Default,
            matched: None,
        }
    }

    pub fn needs_web_search(&self, query: &str) -> bool {
        self.classify(query).use_web_search
    }

    fn first_match<'a>(&'a self, rule: Rule, q: &str) -> Option<&'a str> {
        let (terms, prefix_only) = match rule {
            Rule::Recency => (&self.recency, false),
            Rule::SearchIntent => (&self.search_intent, false),
            Rule::KnowledgePrefix => (&self.knowledge_prefixes, true),
            Rule::Default => return None,
        };
        terms
            .iter()
            .map(|t| t.as_str())
            .filter(|t| !t.is_empty())
            .find(|t| {
                if prefix_only {
                    q.starts_with(t)
                } else {
                    q.contains(t)
                }
            })
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self::for_year(current_year())
    }
}

/// Classify with the default policy.
pub fn needs_web_search(query: &str) -> bool {
    SearchPolicy::default().needs_web_search(query)
}

fn current_year() -> i32 {
    Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SearchPolicy {
        SearchPolicy::for_year(2025)
    }

    #[test]
    fn pure_knowledge_question_skips_search() {
        let c = policy().classify("What is the capital of France?");
        assert!(!c.use_web_search);
        assert_eq!(c.rule, Rule::KnowledgePrefix);
        assert_eq!(c.matched.as_deref(), Some("what is"));
    }

    #[test]
    fn recency_marker_wins() {
        let c = policy().classify("latest news on the election");
        assert!(c.use_web_search);
        assert_eq!(c.rule, Rule::Recency);
        assert_eq!(c.matched.as_deref(), Some("latest"));
    }

    #[test]
    fn knowledge_prefix_with_recency_marker_searches() {
        let c = policy().classify("  What is the weather in Oslo  ");
        assert!(c.use_web_search);
        assert_eq!(c.rule, Rule::Recency);
    }

    #[test]
    fn search_intent_beats_knowledge_prefix() {
        let c = policy().classify("explain and compare rust async runtimes");
        assert!(c.use_web_search);
        assert_eq!(c.rule, Rule::SearchIntent);
    }

    #[test]
    fn near_present_years_are_recency_markers() {
        let p = policy();
        assert_eq!(p.classify("what is the 2024 roadmap").rule, Rule::Recency);
        assert_eq!(p.classify("define 2025 holidays").rule, Rule::Recency);
        assert_eq!(p.classify("what is the 1066 battle").rule, Rule::KnowledgePrefix);
    }

    #[test]
    fn unknown_queries_default_to_search() {
        let c = policy().classify("rust borrow checker");
        assert!(c.use_web_search);
        assert_eq!(c.rule, Rule::Default);
        assert_eq!(c.matched, None);
        assert!(policy().needs_web_search(""));
    }

    #[test]
    fn rule_order_is_tunable() {
        let mut p = policy();
        p.rules = vec![Rule::KnowledgePrefix, Rule::Recency];
        assert!(!p.needs_web_search("what is the latest rust release"));
        p.rules.clear();
        assert!(p.needs_web_search("what is a monad"));
    }

    #[test]
    fn empty_lexicon_entries_never_match() {
        let mut p = policy();
        p.recency.push(String::new());
        assert_eq!(p.classify("what is a monad").rule, Rule::KnowledgePrefix);
    }

    #[test]
    fn default_policy_tracks_the_clock() {
        let year = Utc::now().year();
        let p = SearchPolicy::default();
        assert!(p.recency.contains(&year.to_string()));
        assert!(p.recency.contains(&(year - 1).to_string()));
        assert_eq!(
            p.classify(&format!("what is planned for {year}")).rule,
            Rule::Recency
        );
    }

    #[test]
    fn free_function_uses_default_policy() {
        assert!(!needs_web_search("What is the capital of France?"));
        assert!(needs_web_search("latest news on the election"));
    }
}
