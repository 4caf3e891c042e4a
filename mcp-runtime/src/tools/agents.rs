use serde_json::{Value, json};
use slide_core::models::{Agent, AgentPairCode, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_bool, pick, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::AGENTS,
        "Manage agents - software installed on computers that get backed up to Slide devices. Supports list, get, create, pair, update, add_passphrase, and delete_passphrase operations. Includes support for VSS writer configuration and passphrase management.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["id", "hostname", "name"]),
                json!({
                    "device_id": {"type": "string", "description": "Filter by device ID for 'list', required for 'create' and 'pair'"},
                    "client_id": {"type": "string", "description": "Filter by client ID for 'list'"},
                    "agent_id": {"type": "string", "description": "ID of the agent - required for 'get', 'update' and the passphrase operations"},
                    "display_name": {"type": "string", "description": "Display name for the agent - required for 'create', optional for 'update'"},
                    "pair_code": {"type": "string", "description": "Pair code generated during agent creation - required for 'pair'"},
                    "passphrase_name": {"type": "string", "description": "Friendly name for the passphrase - required for 'add_passphrase'"},
                    "passphrase": {"type": "string", "description": "The passphrase to add for 'add_passphrase', or the current passphrase for 'delete_passphrase'"},
                    "agent_passphrase_id": {"type": "string", "description": "ID of the passphrase to delete - required for 'delete_passphrase'"},
                    "vss_writer_configs": {
                        "type": "array",
                        "description": "VSS writer configurations - used with 'update'",
                        "items": {
                            "type": "object",
                            "properties": {
                                "writer_id": {"type": "string"},
                                "excluded": {"type": "boolean"}
                            },
                            "required": ["writer_id", "excluded"]
                        }
                    },
                    "sealed": {"type": "boolean", "description": "Set to false to unseal an agent with a user-managed passphrase - used with 'update'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get", &["agent_id"]),
                ("create", &["display_name", "device_id"]),
                ("pair", &["pair_code", "device_id"]),
                ("update", &["agent_id"]),
                ("add_passphrase", &["agent_id", "passphrase_name", "passphrase"]),
                ("delete_passphrase", &["agent_id", "agent_passphrase_id", "passphrase"]),
            ]),
        }),
    )
    .operation(op!("list", list))
    .operation(op!("get", get))
    .operation(op!("create", create))
    .operation(op!("pair", pair))
    .operation(op!("update", update))
    .operation(op!("add_passphrase", add_passphrase))
    .operation(op!("delete_passphrase", delete_passphrase))
}

async fn list(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &["device_id", "client_id"], None)?;
    let page: Page<Agent> = ctx.api.list("/v1/agent", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "display_name",
            "When referring to agents, use the display name as the primary identifier. If display name is blank, use hostname instead. Agent IDs are internal identifiers not commonly used by humans.",
        )
        .workflow("Agents are backup software installed on computers. They connect to devices (Slide appliances) to store backups."),
    )?)
}

async fn get(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let agent_id = required_string(args, "agent_id")?;
    let agent: Agent = ctx.api.get(&format!("/v1/agent/{agent_id}")).await?;
    render(&agent)
}

async fn create(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let body = json!({
        "display_name": required_string(args, "display_name")?,
        "device_id": required_string(args, "device_id")?,
    });
    let created: AgentPairCode = ctx.api.post("/v1/agent", Some(&body)).await?;
    render(&created)
}

async fn pair(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let body = json!({
        "pair_code": required_string(args, "pair_code")?,
        "device_id": required_string(args, "device_id")?,
    });
    let agent: Agent = ctx.api.post("/v1/agent/pair", Some(&body)).await?;
    render(&agent)
}

async fn update(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let agent_id = required_string(args, "agent_id")?;
    optional_bool(args, "sealed")?;
    if let Some(configs) = args.get("vss_writer_configs") {
        validate_vss_writer_configs(configs)?;
    }
    let body = pick(args, &["display_name", "vss_writer_configs", "sealed"]);
    if body.is_empty() {
        return Err(ToolError::invalid(
            "display_name",
            "at least one of display_name, vss_writer_configs or sealed is required",
        ));
    }
    let agent: Agent = ctx
        .api
        .patch(&format!("/v1/agent/{agent_id}"), &Value::Object(body))
        .await?;
    render(&agent)
}

fn validate_vss_writer_configs(configs: &Value) -> Result<(), ToolError> {
    let field = "vss_writer_configs";
    let items = configs
        .as_array()
        .ok_or_else(|| ToolError::invalid(field, "vss_writer_configs must be an array"))?;
    for item in items {
        let writer_ok = item.get("writer_id").and_then(Value::as_str).is_some();
        let excluded_ok = item.get("excluded").and_then(Value::as_bool).is_some();
        if !writer_ok || !excluded_ok {
            return Err(ToolError::invalid(
                field,
                "each vss_writer_configs entry needs a string writer_id and a boolean excluded",
            ));
        }
    }
    Ok(())
}

async fn add_passphrase(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let agent_id = required_string(args, "agent_id")?;
    let body = json!({
        "name": required_string(args, "passphrase_name")?,
        "passphrase": required_string(args, "passphrase")?,
    });
    let created: Value = ctx
        .api
        .post(&format!("/v1/agent/{agent_id}/passphrase"), Some(&body))
        .await?;
    render(&created)
}

async fn delete_passphrase(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let agent_id = required_string(args, "agent_id")?;
    let passphrase_id = required_string(args, "agent_passphrase_id")?;
    let body = json!({ "passphrase": required_string(args, "passphrase")? });
    ctx.api
        .delete(
            &format!("/v1/agent/{agent_id}/passphrase/{passphrase_id}"),
            Some(&body),
        )
        .await?;
    render(&json!({"message": "Agent passphrase deleted successfully"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn list_enriches_with_display_name_guidance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agent"))
            .and(query_param("device_id", "d_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"agent_id": "a_1", "display_name": "FS01"}]
            })))
            .mount(&server)
            .await;

        let out = list(&context_for(&server), &args(json!({"device_id": "d_1"})))
            .await
            .expect("list");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["data"][0]["display_name"], "FS01");
        assert_eq!(value["_metadata"]["primary_identifier"], "display_name");
    }

    #[tokio::test]
    async fn add_passphrase_posts_name_and_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agent/a_1/passphrase"))
            .and(body_json(json!({"name": "vault", "passphrase": "s3cret"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({"agent_passphrase_id": "ap_1"})),
            )
            .mount(&server)
            .await;

        let out = add_passphrase(
            &context_for(&server),
            &args(json!({"agent_id": "a_1", "passphrase_name": "vault", "passphrase": "s3cret"})),
        )
        .await
        .expect("added");
        assert!(out.contains("ap_1"));
    }

    #[tokio::test]
    async fn update_needs_a_field_to_change() {
        let server = MockServer::start().await;
        let err = update(&context_for(&server), &args(json!({"agent_id": "a_1"})))
            .await
            .expect_err("empty patch");
        assert!(err.message.contains("at least one of"));

        let err = update(
            &context_for(&server),
            &args(json!({"agent_id": "a_1", "vss_writer_configs": [{"writer_id": "w"}]})),
        )
        .await
        .expect_err("bad vss");
        assert!(err.message.contains("writer_id"));
    }

    #[tokio::test]
    async fn create_requires_device() {
        let server = MockServer::start().await;
        let err = create(&context_for(&server), &args(json!({"display_name": "x"})))
            .await
            .expect_err("missing device");
        assert_eq!(err.message, "device_id is required");
    }
}
