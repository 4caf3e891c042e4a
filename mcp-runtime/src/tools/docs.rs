//! Documentation catalog, search and live page fetches from the docs site.

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Value, json};
use slide_core::error::tool_codes;
use slide_core::policy::tools;

use crate::args::{Args, optional_string, required_string};
use crate::context::ToolContext;
use crate::enrich::render;
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, properties, require_when};

const OPENAPI_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
const PREVIEW_RADIUS: usize = 50;

/// Sections in display order, each with its description and topics.
const SECTIONS: &[(&str, &str, &[&str])] = &[
    (
        "Getting Started",
        "Initial setup guides and tutorials for new users getting started with Slide backup solutions",
        &["Introduction to Slide", "Quick Start Guide", "Installation", "Initial Setup", "First Backup"],
    ),
    (
        "Slide Console",
        "Web console interface documentation - how to manage and configure your Slide infrastructure through the UI. Includes managing networks on Slide devices/cloud",
        &[
            "Dashboard Overview",
            "Protected Systems",
            "Slide Boxes",
            "Snapshots",
            "Restores",
            "Alerts",
            "Users",
            "Clients",
            "Networks (Managing Networks)",
            "My Settings",
        ],
    ),
    (
        "Product",
        "Technical product documentation including system requirements, networking prerequisites, and core product features",
        &[
            "Backups",
            "Slide Agent",
            "Networking (Requirements)",
            "Product Specifications",
            "System Requirements",
            "Security Features",
        ],
    ),
    (
        "Billing",
        "Billing, subscription management, quotes, invoices, and payment-related documentation",
        &["Quotes", "Subscriptions", "Invoices", "Payment Methods", "Billing Overview"],
    ),
    (
        "API",
        "Developer documentation for the Slide API - endpoints, authentication, examples, and SDKs",
        &["API Overview", "Authentication", "Endpoints", "Rate Limits", "Examples", "SDKs and Libraries"],
    ),
    (
        "Troubleshooting",
        "Common issues, error codes, and problem-solving guides for various Slide components",
        &[
            "Common Issues",
            "Error Codes",
            "Performance Issues",
            "Network Problems",
            "Agent Issues",
            "Restore Problems",
        ],
    ),
    (
        "Best Practices",
        "Recommended approaches for backup strategies, retention, security, and performance optimization",
        &[
            "Backup Strategies",
            "Retention Policies",
            "Network Configuration",
            "Security Recommendations",
            "Performance Optimization",
        ],
    ),
];

const TOPIC_DESCRIPTIONS: &[(&str, &str)] = &[
    ("Networks (Managing Networks)", "How to create, configure, and manage virtual networks on Slide devices and in the Slide cloud through the console"),
    ("Networking (Requirements)", "Network infrastructure requirements, firewall rules, port configurations, and connectivity prerequisites for using Slide devices"),
    ("Backups", "Core backup functionality - types of backups, backup processes, scheduling, and verification"),
    ("Restores", "How to restore data from backups - file-level, image-level, and bare metal restore procedures"),
    ("Alerts", "Configuring and managing system alerts, notifications, and monitoring thresholds"),
    ("Users", "User management within the Slide console - creating users, permissions, and access control"),
    ("Clients", "Managing client organizations and multi-tenancy features in Slide"),
];

/// Locally cached pages, keyed by the snake_case form of their topic.
const CONTENT: &[(&str, &str)] = &[
    (
        "api_authentication",
        "# API Authentication\n\nThe Slide API uses API keys for authentication. All API requests must include your API key in the Authorization header.\n\n## Getting Your API Key\n1. Log into the Slide Console\n2. Navigate to My Settings > API Keys\n3. Click \"Generate New API Key\"\n4. Copy and securely store your API key\n\n## Using Your API Key\nInclude your API key in all API requests:\n- Header: Authorization: Bearer YOUR_API_KEY\n\n## Security Best Practices\n- Never share your API key\n- Rotate keys regularly\n- Use environment variables to store keys\n- Restrict API key permissions when possible",
    ),
    (
        "backup_overview",
        "# Backups Overview\n\nSlide provides automated, secure backups for your systems with the following features:\n\n## Key Features\n- Incremental backups to minimize bandwidth\n- End-to-end encryption\n- Flexible scheduling options\n- Multiple retention policies\n- Point-in-time recovery\n\n## Backup Types\n1. **Full Backups**: Complete system backup\n2. **Incremental Backups**: Only changed data since last backup\n3. **Differential Backups**: Changes since last full backup\n\n## Backup Process\n1. Agent scans for changes\n2. Data is encrypted locally\n3. Compressed data is transmitted\n4. Backup is verified and stored\n5. Retention policies are applied",
    ),
    (
        "restore_process",
        "# Restore Process\n\nSlide offers multiple restore options to meet different recovery needs.\n\n## Restore Types\n1. **File-Level Restore**: Restore individual files or folders\n2. **Image-Level Restore**: Full system restore\n3. **Bare Metal Restore**: Complete system recovery to new hardware\n\n## File Restore Steps\n1. Navigate to Restores in the console\n2. Select the snapshot to restore from\n3. Browse and select files/folders\n4. Choose restore destination\n5. Initiate restore\n\n## Best Practices\n- Test restores regularly\n- Document restore procedures\n- Maintain restore media\n- Keep network configurations updated",
    ),
    (
        "network_configuration",
        "# Network Configuration\n\nProper network configuration ensures reliable and secure backups.\n\n## Network Requirements\n- Minimum 1 Mbps upload bandwidth\n- Stable internet connection\n- Firewall rules for Slide services\n\n## Port Requirements\n- Outbound HTTPS (443) for API communication\n- Outbound TCP 8443 for backup data\n- No inbound ports required\n\n## Firewall Configuration\nAllow outbound connections to:\n- api.slide.com (API endpoints)\n- backup.slide.com (Backup destinations)\n- *.slide.com (CDN and auxiliary services)\n\n## VPN and Proxy Support\n- HTTP/HTTPS proxy supported\n- SOCKS proxy configuration available\n- Split-tunnel VPN compatible",
    ),
    (
        "snapshot_management",
        "# Snapshot Management\n\nSnapshots are point-in-time copies of your protected systems.\n\n## Understanding Snapshots\n- Created after each successful backup\n- Immutable once created\n- Contain full system state at backup time\n- Support instant recovery\n\n## Snapshot Features\n1. **Browse**: Explore snapshot contents\n2. **Search**: Find specific files across snapshots\n3. **Compare**: See changes between snapshots\n4. **Export**: Download snapshot data\n\n## Retention Policies\n- Daily snapshots: Keep for X days\n- Weekly snapshots: Keep for Y weeks\n- Monthly snapshots: Keep for Z months\n- Custom policies available\n\n## Best Practices\n- Regular snapshot verification\n- Appropriate retention periods\n- Monitor storage usage\n- Document important snapshots",
    ),
];

const DESCRIPTION: &str = "Access Slide documentation and API reference with enhanced contextual information. This tool provides comprehensive access to:
- Documentation sections and topics from docs.slide.tech with disambiguating descriptions
- Search functionality across all documentation with context-aware results
- Complete OpenAPI specification from http://api.slide.tech/openapi.json
- Direct CURL access to fetch live content from docs.slide.tech

Usage patterns:
- Start with 'list_sections' to explore available documentation with descriptions
- Use 'search_docs' to find information on specific topics with contextual results
- Use 'get_api_reference' to retrieve the complete, authoritative OpenAPI spec
- For specific documentation pages, use 'curl_docs' to fetch live content from docs.slide.tech
- When get_content returns \"Content not available in local cache\", use the suggested curl_docs operation
- Remember to use slide_* tools for actual API calls, not raw HTTP requests

curl_docs operation:
- Fetches live content directly from https://docs.slide.tech/
- Automatically cleans HTML to reduce context window usage
- Only allows docs.slide.tech URLs
- Example paths: \"getting-started/\", \"backups/\", \"api/\", \"networks/\"";

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::DOCS,
        DESCRIPTION,
        json!({
            "type": "object",
            "properties": properties(&[json!({
                "operation": {"type": "string", "description": "The documentation operation to perform"},
                "section": {"type": "string", "description": "Documentation section name (for get_topics operation)"},
                "topic": {"type": "string", "description": "Specific topic to retrieve content for (for get_content operation)"},
                "query": {"type": "string", "description": "Search query to find relevant documentation (for search_docs operation)"},
                "endpoint": {"type": "string", "description": "Specific API endpoint to get reference for (optional for get_api_reference). Only used when the live OpenAPI spec is unavailable"},
                "path": {"type": "string", "description": "The path to fetch content from docs.slide.tech (e.g., 'getting-started/', 'backups/', 'networks/', 'api/'). Required for curl_docs operation. Do not include the domain, just the path portion."}
            })]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get_topics", &["section"]),
                ("search_docs", &["query"]),
                ("get_content", &["topic"]),
                ("curl_docs", &["path"]),
            ]),
        }),
    )
    .operation(op!("list_sections", list_sections))
    .operation(op!("get_topics", get_topics))
    .operation(op!("search_docs", search_docs))
    .operation(op!("get_content", get_content))
    .operation(op!("get_api_reference", get_api_reference))
    .operation(op!("curl_docs", curl_docs))
}

fn topic_description(topic: &str) -> Option<&'static str> {
    TOPIC_DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, description)| *description)
}

fn section_for_topic(topic: &str) -> &'static str {
    SECTIONS
        .iter()
        .find(|(_, _, topics)| topics.iter().any(|t| t.eq_ignore_ascii_case(topic)))
        .map_or("General", |(name, _, _)| *name)
}

fn topic_value(topic: &str) -> Value {
    let mut value = json!({"name": topic});
    if let Some(description) = topic_description(topic) {
        value["description"] = json!(description);
    }
    value
}

async fn list_sections(_ctx: &ToolContext, _args: &Args) -> Result<String, ToolError> {
    let sections: Vec<Value> = SECTIONS
        .iter()
        .map(|(name, description, topics)| {
            json!({"name": name, "description": description, "topic_count": topics.len()})
        })
        .collect();
    render(&json!({
        "sections": sections,
        "_metadata": {
            "description": "Available documentation sections from docs.slide.tech with contextual descriptions",
            "usage": "Use 'get_topics' operation to see topics within a section. Pay attention to descriptions to choose the right section.",
            "note": "Some sections have similar names but different purposes - check descriptions carefully"
        }
    }))
}

async fn get_topics(_ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let section = required_string(args, "section")?;
    let (name, description, topics) = SECTIONS
        .iter()
        .find(|(name, _, _)| *name == section)
        .ok_or_else(|| ToolError::invalid("section", format!("section '{section}' not found")))?;
    let topics: Vec<Value> = topics.iter().map(|t| topic_value(t)).collect();
    render(&json!({
        "section": name,
        "section_description": description,
        "topics": topics,
        "_metadata": {
            "description": format!("Topics available in the '{name}' section"),
            "usage": "Use 'get_content' operation to retrieve specific topic content",
            "note": "Topics with descriptions have been clarified to avoid ambiguity"
        }
    }))
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Up to 50 bytes either side of the first match, single-lined, with
/// ellipses where the content was cut.
pub fn content_preview(content: &str, query: &str) -> String {
    let Some(index) = content
        .to_ascii_lowercase()
        .find(&query.to_ascii_lowercase())
    else {
        return String::new();
    };
    let start = floor_boundary(content, index.saturating_sub(PREVIEW_RADIUS));
    let end = ceil_boundary(
        content,
        (index + query.len() + PREVIEW_RADIUS).min(content.len()),
    );
    let mut preview = content[start..end].to_string();
    if start > 0 {
        preview.insert_str(0, "...");
    }
    if end < content.len() {
        preview.push_str("...");
    }
    preview.replace('\n', " ")
}

pub fn search(query: &str) -> Vec<Value> {
    let needle = query.to_lowercase();
    let mut results = Vec::new();
    for (section, description, topics) in SECTIONS {
        let section_hit = section.to_lowercase().contains(&needle);
        for topic in *topics {
            if !section_hit && !topic.to_lowercase().contains(&needle) {
                continue;
            }
            let mut hit = json!({
                "section": section,
                "section_description": description,
                "topic": topic,
                "type": "topic_match",
            });
            if let Some(topic_description) = topic_description(topic) {
                hit["topic_description"] = json!(topic_description);
            }
            results.push(hit);
        }
    }
    for (key, content) in CONTENT {
        if !content.to_lowercase().contains(&needle) {
            continue;
        }
        let title = content
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("# "))
            .unwrap_or("Unknown");
        results.push(json!({
            "content_key": key,
            "title": title,
            "type": "content_match",
            "preview": content_preview(content, &needle),
        }));
    }
    results
}

async fn search_docs(_ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = required_string(args, "query")?.to_lowercase();
    let results = search(&query);
    render(&json!({
        "query": query,
        "result_count": results.len(),
        "results": results,
        "_metadata": {
            "description": "Search results from Slide documentation with contextual information",
            "note": "Results include section and topic descriptions to help identify the correct documentation"
        }
    }))
}

async fn get_content(_ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let topic = required_string(args, "topic")?;
    let key = topic.replace(' ', "_").to_lowercase();
    if let Some((_, content)) = CONTENT.iter().find(|(k, _)| *k == key) {
        return render(&json!({
            "topic": topic,
            "content": content,
            "_metadata": {"source": "docs.slide.tech", "format": "markdown"}
        }));
    }

    let section_path = section_for_topic(&topic).replace(' ', "-").to_lowercase();
    let topic_path = topic.replace(' ', "-").to_lowercase();
    render(&json!({
        "topic": topic,
        "error": "Content not available in local cache",
        "suggestion": {
            "operation": "curl_docs",
            "description": "Use the curl_docs operation to fetch live content from docs.slide.tech",
            "possible_paths": [format!("{topic_path}/"), format!("{section_path}/{topic_path}/")],
            "example": format!("Use: {{\"operation\": \"curl_docs\", \"path\": \"{topic_path}/\"}}"),
        },
        "_metadata": {
            "note": "Use curl_docs to fetch specific pages from docs.slide.tech"
        }
    }))
}

fn api_reference_fallback(ctx: &ToolContext, endpoint: Option<&str>) -> Value {
    let mut reference = json!({
        "base_url": "https://api.slide.com/v1",
        "authentication": {
            "type": "Bearer Token",
            "header": "Authorization: Bearer YOUR_API_KEY"
        },
        "common_endpoints": {
            "agents": "/agent - Agent management",
            "backups": "/backup - Backup operations",
            "snapshots": "/snapshot - Snapshot management",
            "restores": "/restore - Restore operations",
            "devices": "/device - Device management",
            "clients": "/client - Client management",
            "networks": "/network - Network configuration",
            "alerts": "/alert - Alert management"
        },
        "rate_limits": {
            "requests_per_minute": 60,
            "requests_per_hour": 1000,
            "burst_limit": 10
        },
        "_metadata": {
            "description": "Basic API reference (fallback - OpenAPI spec unavailable)",
            "docs_url": "https://docs.slide.tech/api",
            "openapi_url": ctx.sources.openapi_url,
            "note": "Use slide_* tools for direct API access with proper authentication"
        }
    });
    if let Some(endpoint) = endpoint {
        reference["endpoint_details"] = json!(format!(
            "For detailed information about the '{endpoint}' endpoint, use the appropriate slide_* tool or visit https://docs.slide.tech/api/{endpoint}"
        ));
    }
    reference
}

async fn get_api_reference(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let endpoint = optional_string(args, "endpoint")?;
    let url = &ctx.sources.openapi_url;
    let spec = match ctx.fetch_text(url, OPENAPI_TIMEOUT).await {
        Ok(body) => serde_json::from_str::<Value>(&body)
            .inspect_err(|e| tracing::warn!(event = "openapi_parse_failed", error = %e))
            .ok(),
        Err(e) => {
            tracing::warn!(event = "openapi_fetch_failed", error = %e);
            None
        }
    };
    let Some(spec) = spec else {
        return render(&api_reference_fallback(ctx, endpoint.as_deref()));
    };
    render(&json!({
        "openapi_spec": spec,
        "_metadata": {
            "source": url,
            "description": "Complete OpenAPI 3.0 specification for the Slide API",
            "usage_notes": [
                "This is the authoritative API documentation",
                "All endpoints, parameters, and schemas are defined here",
                "Use the slide_* tools to make actual API calls",
                "Authentication is handled automatically by the slide_* tools"
            ]
        }
    }))
}

/// Resolves `path` under the docs site, refusing anything that would leave it.
pub fn docs_url(docs_base: &str, path: &str) -> Result<url::Url, ToolError> {
    let rejected = || {
        ToolError::invalid(
            "path",
            "invalid path: only docs.slide.tech URLs are allowed",
        )
    };
    let base = url::Url::parse(&format!("{}/", docs_base.trim_end_matches('/')))
        .map_err(|_| rejected())?;
    let url = base
        .join(path.trim_start_matches('/'))
        .map_err(|_| rejected())?;
    if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
        return Err(rejected());
    }
    Ok(url)
}

static NOISE_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "nav", "header", "footer"]
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid block regex"))
        .collect()
});
static NOISE_OPENERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:script|style|nav|header|footer)\b[^>]*>").expect("valid opener regex")
});
static NOISE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<([a-z][a-z0-9]*)\b[^>]*\bclass="md-(?:search|dialog|sidebar)[^"]*"[^>]*>"#)
        .expect("valid class regex")
});
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid space regex"));

const MAIN_CONTENT: &str = r#"class="md-content__inner md-typeset">"#;

/// Drops scripts, styles, site chrome and search/sidebar widgets, keeps the
/// main article when the page has one and squeezes whitespace.
pub fn clean_html(html: &str) -> String {
    let mut html = html.to_string();
    for block in NOISE_BLOCKS.iter() {
        html = block.replace_all(&html, "").into_owned();
    }
    html = NOISE_OPENERS.replace_all(&html, "").into_owned();

    while let Some(captures) = NOISE_CLASS.captures(&html) {
        let (Some(open), Some(tag)) = (captures.get(0), captures.get(1)) else {
            break;
        };
        let close = format!("</{}>", tag.as_str());
        let end = html[open.end()..]
            .find(&close)
            .map_or(open.end(), |offset| open.end() + offset + close.len());
        html.replace_range(open.start()..end, "");
    }

    if let Some(start) = html.find(MAIN_CONTENT) {
        if let Some(end) = html[start..].find("</article>") {
            html = format!("{}</article>", &html[start..start + end]);
        }
    }

    let html = BLANK_RUNS.replace_all(&html, "\n");
    SPACE_RUNS.replace_all(&html, " ").into_owned()
}

async fn curl_docs(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let path = required_string(args, "path")?;
    let url = docs_url(&ctx.sources.docs_base, &path)?;
    let page = ctx
        .fetch_page(url.as_str(), PAGE_TIMEOUT)
        .await
        .map_err(|e| ToolError::new(tool_codes::FETCH_ERROR, e))?;
    render(&json!({
        "url": url.as_str(),
        "status": page.status,
        "content": clean_html(&page.body),
        "_metadata": {
            "source": "docs.slide.tech",
            "fetched_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "content_type": page.content_type,
            "processing_note": "HTML has been cleaned and simplified to reduce context window usage"
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn search_is_case_insensitive_over_topics_and_content() {
        let results = search("retention");
        assert!(results
            .iter()
            .any(|r| r["type"] == "topic_match" && r["topic"] == "Retention Policies"));
        let content = results
            .iter()
            .find(|r| r["content_key"] == "snapshot_management")
            .expect("content hit");
        assert_eq!(content["title"], "Snapshot Management");
        let preview = content["preview"].as_str().expect("preview");
        assert!(preview.starts_with("...") && !preview.contains('\n'));
    }

    #[test]
    fn section_matches_return_every_topic() {
        let results = search("billing");
        let topics = results
            .iter()
            .filter(|r| r["section"] == "Billing")
            .count();
        assert_eq!(topics, 5);
    }

    #[test]
    fn docs_url_stays_on_the_docs_site() {
        let base = "https://docs.slide.tech";
        assert_eq!(
            docs_url(base, "/backups/").expect("ok").as_str(),
            "https://docs.slide.tech/backups/"
        );
        assert!(docs_url(base, "https://evil.example/").is_err());
        assert_eq!(
            docs_url(base, "//evil.example/x").expect("ok").as_str(),
            "https://docs.slide.tech/evil.example/x"
        );
        assert!(docs_url("http://127.0.0.1:9/docs", "../secret").is_err());
    }

    #[test]
    fn clean_html_strips_noise_and_keeps_the_article() {
        let html = concat!(
            "<html><head><style>body{}</style><script>alert(1)</script></head><body>",
            "<header>top</header><div class=\"md-sidebar md-sidebar--primary\">nav</div>",
            "<div class=\"md-content__inner md-typeset\"><h1>Backups</h1>\n\n\n\n<p>Text  here</p></article>",
            "<footer>bottom</footer></body></html>"
        );
        assert_eq!(
            clean_html(html),
            "class=\"md-content__inner md-typeset\"><h1>Backups</h1>\n<p>Text here</p></article>"
        );
    }

    #[tokio::test]
    async fn get_content_suggests_curl_paths_for_uncached_topics() {
        let server = MockServer::start().await;
        let out = get_content(&context_for(&server), &args(json!({"topic": "Slide Boxes"})))
            .await
            .expect("suggestion");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["error"], "Content not available in local cache");
        assert_eq!(
            value["suggestion"]["possible_paths"],
            json!(["slide-boxes/", "slide-console/slide-boxes/"])
        );
    }

    #[tokio::test]
    async fn api_reference_falls_back_when_openapi_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let out = get_api_reference(&context_for(&server), &args(json!({"endpoint": "agent"})))
            .await
            .expect("fallback");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["rate_limits"]["requests_per_minute"], 60);
        assert!(value["endpoint_details"].as_str().expect("details").contains("'agent'"));
    }

    #[tokio::test]
    async fn curl_docs_fetches_and_cleans_a_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs/backups/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<nav>menu</nav><p>Backups  run nightly</p>"),
            )
            .mount(&server)
            .await;
        let out = curl_docs(&context_for(&server), &args(json!({"path": "backups/"})))
            .await
            .expect("page");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["content"], "<p>Backups run nightly</p>");
        assert_eq!(value["status"], 200);
        assert_eq!(value["_metadata"]["content_type"], "text/html");
    }
}
