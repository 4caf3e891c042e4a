use serde_json::json;
use slide_core::models::{FileRestore, FileRestoreEntry, ImageExport, ImageExportEntry, Page};
use slide_core::policy::tools;

use crate::args::{Args, ListQuery, optional_integer, optional_string_array, required_string};
use crate::context::ToolContext;
use crate::enrich::{Metadata, list_envelope, render};
use crate::error::ToolError;
use crate::registry::{ToolSpec, op, paging_properties, properties, require_when};

pub const IMAGE_TYPES: [&str; 7] = [
    "vhdx",
    "vhdx-dynamic",
    "vhd",
    "vmdk",
    "vmdk-flat",
    "qcow2",
    "raw",
];

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        tools::RESTORES,
        "Manage restore operations - both file restores (for browsing/downloading individual files) and image exports (for downloading full disk images). Supports operations for both file restores and image exports.",
        json!({
            "type": "object",
            "properties": properties(&[
                json!({"operation": {"type": "string", "description": "The operation to perform"}}),
                paging_properties(&["id"]),
                json!({
                    "file_restore_id": {"type": "string", "description": "ID of the file restore - required for get_file, delete_file and browse_file"},
                    "path": {"type": "string", "description": "Path to browse within the restore - required for browse_file"},
                    "image_export_id": {"type": "string", "description": "ID of the image export - required for get_image, delete_image and browse_image"},
                    "image_type": {"type": "string", "description": "Type of image to create - required for create_image", "enum": IMAGE_TYPES},
                    "snapshot_id": {"type": "string", "description": "ID of the snapshot to restore from - required for create_file and create_image"},
                    "device_id": {"type": "string", "description": "ID of the device to restore to - required for create_file and create_image"},
                    "boot_mods": {"type": "array", "description": "Optional boot modifications for create_image", "items": {"type": "string"}}
                }),
            ]),
            "required": ["operation"],
            "allOf": require_when(&[
                ("get_file", &["file_restore_id"]),
                ("create_file", &["snapshot_id", "device_id"]),
                ("delete_file", &["file_restore_id"]),
                ("browse_file", &["file_restore_id", "path"]),
                ("get_image", &["image_export_id"]),
                ("create_image", &["snapshot_id", "device_id", "image_type"]),
                ("delete_image", &["image_export_id"]),
                ("browse_image", &["image_export_id"]),
            ]),
        }),
    )
    .operation(op!("list_files", list_files))
    .operation(op!("get_file", get_file))
    .operation(op!("create_file", create_file))
    .operation(op!("delete_file", delete_file))
    .operation(op!("browse_file", browse_file))
    .operation(op!("list_images", list_images))
    .operation(op!("get_image", get_image))
    .operation(op!("create_image", create_image))
    .operation(op!("delete_image", delete_image))
    .operation(op!("browse_image", browse_image))
}

fn browse_query(args: &Args) -> Result<ListQuery, ToolError> {
    let mut query = ListQuery::default();
    if let Some(limit) = optional_integer(args, "limit")? {
        query.push("limit", limit.to_string());
    }
    if let Some(offset) = optional_integer(args, "offset")? {
        query.push("offset", offset.to_string());
    }
    Ok(query)
}

async fn list_files(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("id"))?;
    let page: Page<FileRestore> = ctx.api.list("/v1/restore/file", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "file_restore_id",
            "File restores allow browsing and downloading files from snapshots.",
        )
        .workflow("Create file restores from snapshots, then browse to find and download specific files."),
    )?)
}

async fn get_file(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "file_restore_id")?;
    let restore: FileRestore = ctx.api.get(&format!("/v1/restore/file/{id}")).await?;
    render(&restore)
}

async fn create_file(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let body = json!({
        "snapshot_id": required_string(args, "snapshot_id")?,
        "device_id": required_string(args, "device_id")?,
    });
    let restore: FileRestore = ctx.api.post("/v1/restore/file", Some(&body)).await?;
    render(&restore)
}

async fn delete_file(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "file_restore_id")?;
    ctx.api.delete(&format!("/v1/restore/file/{id}"), None).await?;
    render(&json!({"message": "File restore deleted successfully"}))
}

async fn browse_file(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "file_restore_id")?;
    let path = required_string(args, "path")?;
    let mut query = ListQuery::default().with("path", path);
    for (key, value) in browse_query(args)?.pairs() {
        query.push(key.clone(), value.clone());
    }
    let page: Page<FileRestoreEntry> = ctx
        .api
        .list(&format!("/v1/restore/file/{id}/browse"), &query)
        .await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "path",
            "File listing from the restored snapshot. Use download_uris to download files.",
        )
        .workflow("Navigate directories by changing the path parameter. Files have download URIs for retrieval."),
    )?)
}

async fn list_images(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let query = ListQuery::from_args(args, &[], Some("id"))?;
    let page: Page<ImageExport> = ctx.api.list("/v1/restore/image", &query).await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "image_export_id",
            "Image exports create downloadable disk images from snapshots.",
        )
        .workflow("Create image exports to get VHDX, VHD, or RAW disk images for importing into other systems."),
    )?)
}

async fn get_image(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "image_export_id")?;
    let export: ImageExport = ctx.api.get(&format!("/v1/restore/image/{id}")).await?;
    render(&export)
}

async fn create_image(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let image_type = required_string(args, "image_type")?;
    if !IMAGE_TYPES.contains(&image_type.as_str()) {
        return Err(ToolError::invalid(
            "image_type",
            format!(
                "invalid image_type '{image_type}'. Valid options: {}",
                IMAGE_TYPES.join(", ")
            ),
        ));
    }
    let mut body = json!({
        "snapshot_id": required_string(args, "snapshot_id")?,
        "device_id": required_string(args, "device_id")?,
        "image_type": image_type,
    });
    if let Some(boot_mods) = optional_string_array(args, "boot_mods")? {
        body["boot_mods"] = json!(boot_mods);
    }
    let export: ImageExport = ctx.api.post("/v1/restore/image", Some(&body)).await?;
    render(&export)
}

async fn delete_image(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "image_export_id")?;
    ctx.api.delete(&format!("/v1/restore/image/{id}"), None).await?;
    render(&json!({"message": "Image export deleted successfully"}))
}

async fn browse_image(ctx: &ToolContext, args: &Args) -> Result<String, ToolError> {
    let id = required_string(args, "image_export_id")?;
    let query = browse_query(args)?;
    let page: Page<ImageExportEntry> = ctx
        .api
        .list(&format!("/v1/restore/image/{id}/browse"), &query)
        .await?;
    render(&list_envelope(
        &page,
        Metadata::new(
            "disk_id",
            "Available disk images from the export. Use download_uris to download image files.",
        )
        .workflow("Each disk from the original system becomes a separate downloadable image file."),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{args, context_for};
    use serde_json::Value;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn browse_file_sends_path_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/restore/file/fr_1/browse"))
            .and(query_param("path", "C/Users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pagination": {"total": 1},
                "data": [{"name": "report.docx", "path": "C/Users/report.docx", "type": "file"}]
            })))
            .mount(&server)
            .await;

        let out = browse_file(
            &context_for(&server),
            &args(json!({"file_restore_id": "fr_1", "path": "C/Users"})),
        )
        .await
        .expect("browse");
        let value: Value = serde_json::from_str(&out).expect("json");
        assert_eq!(value["data"][0]["name"], "report.docx");
        assert_eq!(value["_metadata"]["primary_identifier"], "path");
    }

    #[tokio::test]
    async fn create_image_rejects_unknown_type_before_calling_api() {
        let server = MockServer::start().await;
        let err = create_image(
            &context_for(&server),
            &args(json!({"snapshot_id": "s", "device_id": "d", "image_type": "iso"})),
        )
        .await
        .expect_err("bad type");
        assert!(err.message.starts_with("invalid image_type 'iso'"));
    }

    #[tokio::test]
    async fn delete_reports_success_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/restore/image/ie_1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let out = delete_image(&context_for(&server), &args(json!({"image_export_id": "ie_1"})))
            .await
            .expect("deleted");
        assert!(out.contains("Image export deleted successfully"));
    }
}
