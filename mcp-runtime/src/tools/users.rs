//! Users, billing accounts and clients behind one tool.

use serde_json::{Value, json};
use slide_core::models::{Account, Client, Page, User};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_string_array, pick, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::USER_MANAGEMENT,
        "Manage users, accounts and clients. Users are people with access to the Slide console, accounts are billing organizations, and clients group devices and agents for MSP customers.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["id", "name"]),
                json!({
                    "user_id": {"type": "string", "description": "ID of the user - required for 'get_user'"},
                    "account_id": {"type": "string", "description": "ID of the account - required for 'get_account' and 'update_account'"},
                    "alert_emails": {"type": "array", "description": "List of email addresses for alerts - required for 'update_account'", "items": {"type": "string"}},
                    "client_id": {"type": "string", "description": "ID of the client - required for 'get_client', 'update_client' and 'delete_client'"},
                    "name": {"type": "string", "description": "Name of the client - required for 'create_client'"},
                    "comments": {"type": "string", "description": "Comments about the client - used with 'create_client' and 'update_client'"}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get_user", &["user_id"]),
                ("get_account", &["account_id"]),
                ("update_account", &["account_id", "alert_emails"]),
                ("get_client", &["client_id"]),
                ("create_client", &["name"]),
                ("update_client", &["client_id"]),
                ("delete_client", &["client_id"]),
            ]),
        }),
    )
    .operation(op!("list_users", list_users))
    .operation(op!("get_user", get_user))
    .operation(op!("list_accounts", list_accounts))
    .operation(op!("get_account", get_account))
    .operation(op!("update_account", update_account))
    .operation(op!("list_clients", list_clients))
    .operation(op!("get_client", get_client))
    .operation(op!("create_client", create_client))
    .operation(op!("update_client", update_client))
    .operation(op!("delete_client", delete_client))
}

async fn list_users(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("id"))?;
    let page: Page<User> = ctx.api.list("/v1/user", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "display_name",
            "Users with access to the Slide system. Check role_id for permissions level.",
        )
        .workflow("Users can be account owners, admins, technicians, or read-only. Email is used for notifications."),
    )?)
}

async fn get_user(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let user_id = required_string(args, "user_id")?;
    let user: User = ctx.api.get(&format!("/v1/user/{user_id}")).await?;
    render(&user)
}

async fn list_accounts(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("name"))?;
    let page: Page<Account> = ctx.api.list("/v1/account", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "account_name",
            "Billing accounts that contain devices and users. Each account has contact info and alert settings.",
        )
        .workflow("Accounts are the top-level organization unit. Devices and users belong to accounts."),
    )?)
}

async fn get_account(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let account_id = required_string(args, "account_id")?;
    let account: Account = ctx.api.get(&format!("/v1/account/{account_id}")).await?;
    render(&account)
}

async fn update_account(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let account_id = required_string(args, "account_id")?;
    let alert_emails =
        optional_string_array(args, "alert_emails")?.ok_or_else(|| ToolError::missing("alert_emails"))?;
    let account: Account = ctx
        .api
        .patch(
            &format!("/v1/account/{account_id}"),
            &json!({"alert_emails": alert_emails}),
        )
        .await?;
    render(&account)
}

async fn list_clients(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("id"))?;
    let page: Page<Client> = ctx.api.list("/v1/client", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "name",
            "Clients represent end customers or organizational units within an MSP environment.",
        )
        .workflow("Clients group devices and agents for easier management. Useful for MSPs managing multiple customers."),
    )?)
}

async fn get_client(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let client_id = required_string(args, "client_id")?;
    let client: Client = ctx.api.get(&format!("/v1/client/{client_id}")).await?;
    render(&client)
}

async fn create_client(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let mut body = pick(args, &["comments"]);
    body.insert("name".to_string(), Value::String(required_string(args, "name")?));
    let client: Client = ctx
        .api
        .post("/v1/client", Some(&Value::Object(body)))
        .await?;
    render(&client)
}

async fn update_client(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let client_id = required_string(args, "client_id")?;
    let body = pick(args, &["name", "comments"]);
    let client: Client = ctx
        .api
        .patch(&format!("/v1/client/{client_id}"), &Value::Object(body))
        .await?;
    render(&client)
}

async fn delete_client(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let client_id = required_string(args, "client_id")?;
    ctx.api
        .delete(&format!("/v1/client/{client_id}"), None)
        .await?;
    render(&json!({"message": "Client deleted successfully"}))
}
