//! Static capability catalog.
//!
//! The set of capabilities is fixed for a build. Which of them a server exposes is decided
//! by [`crate::registry::compute_active_set`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    WebSearch,
    GetCodeContext,
    CompanyResearch,
    Crawling,
    LinkedinSearch,
    DeepResearcherStart,
    DeepResearcherCheck,
}

impl CapabilityId {
    pub const ALL: [Self; 7] = [
        Self::WebSearch,
        Self::GetCodeContext,
        Self::CompanyResearch,
        Self::Crawling,
        Self::LinkedinSearch,
        Self::DeepResearcherStart,
        Self::DeepResearcherCheck,
    ];

    /// Stable wire id (tool name).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSearch => "web_search",
            Self::GetCodeContext => "get_code_context",
            Self::CompanyResearch => "company_research",
            Self::Crawling => "crawling",
            Self::LinkedinSearch => "linkedin_search",
            Self::DeepResearcherStart => "deep_researcher_start",
            Self::DeepResearcherCheck => "deep_researcher_check",
        }
    }

    pub fn descriptor(self) -> &'static CapabilityDescriptor {
        // The catalog is indexed in `ALL` order.
        &catalog()[self as usize]
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub id: CapabilityId,
    pub display_name: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
}

pub fn catalog() -> &'static [CapabilityDescriptor] {
    &[
        CapabilityDescriptor {
            id: CapabilityId::WebSearch,
            display_name: "Web Search",
            description: "Search the web and return the most relevant pages with cleaned text content. Use for current information, news, and general lookups.",
            default_enabled: true,
        },
        CapabilityDescriptor {
            id: CapabilityId::GetCodeContext,
            display_name: "Code Context Search",
            description: "Find code examples, API usage and documentation snippets for libraries, SDKs and frameworks. Returns a condensed, token-bounded context block.",
            default_enabled: true,
        },
        CapabilityDescriptor {
            id: CapabilityId::CompanyResearch,
            display_name: "Company Research",
            description: "Research a company by name: business overview, products, funding and recent news from company-focused sources.",
            default_enabled: false,
        },
        CapabilityDescriptor {
            id: CapabilityId::Crawling,
            display_name: "Crawl URL",
            description: "Fetch the full text content of a specific URL (articles, docs pages, PDFs).",
            default_enabled: false,
        },
        CapabilityDescriptor {
            id: CapabilityId::LinkedinSearch,
            display_name: "LinkedIn Search",
            description: "Search LinkedIn for people profiles or company pages.",
            default_enabled: false,
        },
        CapabilityDescriptor {
            id: CapabilityId::DeepResearcherStart,
            display_name: "Deep Research: Start",
            description: "Start a long-running deep research task for a complex question. Returns a task id; poll it with deep_researcher_check until it completes.",
            default_enabled: false,
        },
        CapabilityDescriptor {
            id: CapabilityId::DeepResearcherCheck,
            display_name: "Deep Research: Check",
            description: "Check a deep research task started with deep_researcher_start. Returns the final report when completed, or a status telling you to poll again.",
            default_enabled: false,
        },
    ]
}
