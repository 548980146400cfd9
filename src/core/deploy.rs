//! Code deploy reconciliation for a remote FaaS function.
//!
//! Given a packaged artifact and deployment coordinates, converge the
//! remote function to match: create it if absent, otherwise re-assert its
//! configuration and upload the new code, publishing a version either way,
//! then point the stage alias at that version. Safe to run repeatedly and
//! safe to run concurrently across independent function/stage/region
//! units, since each run owns its Event.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::event::Event;
use crate::provider::Provider;

/// Platform ceiling on the compressed archive (50 MiB).
pub const MAX_ARCHIVE_BYTES: u64 = 52_428_800;

const SERVICE: &str = "Lambda";

/// Function configuration re-asserted on every deploy so drift is
/// corrected even when only the code changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub handler: String,
    pub runtime: String,
    pub role: String,
    pub memory_size: u64,
    pub timeout: u64,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Concatenate artifact entries into a single in-memory DEFLATE archive.
pub fn package_archive(entries: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, contents) in entries {
        let contents = contents.as_str().ok_or_else(|| {
            Error::Validation(format!("Package entry '{name}' must be file contents"))
        })?;
        writer
            .start_file(name, options)
            .map_err(|e| Error::Archive(e.to_string()))?;
        writer.write_all(contents.as_bytes())?;
    }

    let cursor = writer.finish().map_err(|e| Error::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

struct Coordinates {
    name: String,
    stage: String,
    region: String,
    dist: String,
    entries: Map<String, Value>,
    spec: FunctionSpec,
}

impl Coordinates {
    fn from_event(evt: &Event) -> Result<Self> {
        let entries = evt
            .option("package")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| Error::Validation("Missing required option 'package'".into()))?;
        let spec: FunctionSpec = serde_json::from_value(
            evt.option("function")
                .cloned()
                .ok_or_else(|| Error::Validation("Missing required option 'function'".into()))?,
        )
        .map_err(|e| Error::Validation(format!("Invalid 'function' option: {e}")))?;

        Ok(Self {
            name: evt.require_str("name")?.to_string(),
            stage: evt.require_str("stage")?.to_string(),
            region: evt.require_str("region")?.to_string(),
            dist: evt.require_str("dist")?.to_string(),
            entries,
            spec,
        })
    }
}

/// The create-or-update-and-alias reconciler.
pub struct Deployer {
    provider: Arc<dyn Provider>,
    size_limit: u64,
}

impl Deployer {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self::with_size_limit(provider, MAX_ARCHIVE_BYTES)
    }

    /// Override the archive ceiling; the default is the platform constant.
    pub fn with_size_limit(provider: Arc<dyn Provider>, size_limit: u64) -> Self {
        Self {
            provider,
            size_limit,
        }
    }

    /// Run one reconciliation and merge the outcome into `event.data`:
    /// `function_name`, `archive_path`, `version`, `alias`, `alias_arn`.
    pub async fn deploy(&self, mut evt: Event) -> Result<Event> {
        let coords = Coordinates::from_event(&evt)?;

        // Packaging and the size ceiling come before any remote call.
        let archive = package_archive(&coords.entries)?;
        if archive.len() as u64 > self.size_limit {
            return Err(Error::ArtifactTooLarge {
                size: archive.len() as u64,
                limit: self.size_limit,
            });
        }

        let archive_path = Path::new(&coords.dist).join("package.zip");
        tokio::fs::write(&archive_path, &archive).await?;
        log_debug!(
            "deploy",
            "\"{} - {} - {}\": compressed package written to {}",
            coords.stage,
            coords.region,
            coords.name,
            archive_path.display()
        );

        let version = self.provision(&coords, &archive).await?;
        let (alias, alias_arn) = self.reconcile_alias(&coords, &version).await?;
        log_status!(
            "deploy",
            "{}: version {} live at alias '{}'",
            coords.name,
            version,
            alias
        );

        evt.set_data("function_name", coords.name.clone());
        evt.set_data("archive_path", archive_path.display().to_string());
        evt.set_data("version", version);
        evt.set_data("alias", alias);
        evt.set_data("alias_arn", alias_arn);
        Ok(evt)
    }

    /// Create the function, or update configuration then code; either way a
    /// new version is published and returned.
    async fn provision(&self, coords: &Coordinates, archive: &[u8]) -> Result<String> {
        let existing = match self
            .request(
                coords,
                "getFunction",
                json!({ "FunctionName": coords.name, "Qualifier": "$LATEST" }),
            )
            .await
        {
            Ok(current) => Some(current),
            Err(failure) if failure.is_not_found() => None,
            Err(failure) => return Err(failure.into()),
        };

        let spec = &coords.spec;
        let description = spec
            .description
            .clone()
            .unwrap_or_else(|| format!("skiff function for stage: {}", coords.stage));
        let vpc_config = json!({
            "SecurityGroupIds": spec.security_group_ids,
            "SubnetIds": spec.subnet_ids,
        });

        if existing.is_none() {
            log_debug!(
                "deploy",
                "\"{} - {} - {}\": creating function...",
                coords.stage,
                coords.region,
                coords.name
            );

            let params = json!({
                "Code": { "ZipFile": BASE64.encode(archive) },
                "FunctionName": coords.name,
                "Handler": spec.handler,
                "Role": spec.role,
                "Runtime": spec.runtime,
                "Description": description,
                "MemorySize": spec.memory_size,
                "Publish": true,
                "Timeout": spec.timeout,
                "VpcConfig": vpc_config,
            });
            let created = self
                .request(coords, "createFunction", params)
                .await
                .map_err(Error::from)?;
            return field_str(&created, "Version", "createFunction");
        }

        // Configuration first, then code: two sequential calls, so a
        // code-only deploy still corrects configuration drift.
        log_debug!(
            "deploy",
            "\"{} - {} - {}\": updating function configuration...",
            coords.stage,
            coords.region,
            coords.name
        );
        let params = json!({
            "FunctionName": coords.name,
            "Description": description,
            "Handler": spec.handler,
            "MemorySize": spec.memory_size,
            "Role": spec.role,
            "Timeout": spec.timeout,
            "VpcConfig": vpc_config,
        });
        self.request(coords, "updateFunctionConfiguration", params)
            .await
            .map_err(Error::from)?;

        log_debug!(
            "deploy",
            "\"{} - {} - {}\": updating function code...",
            coords.stage,
            coords.region,
            coords.name
        );
        let params = json!({
            "FunctionName": coords.name,
            "Publish": true,
            "ZipFile": BASE64.encode(archive),
        });
        let updated = self
            .request(coords, "updateFunctionCode", params)
            .await
            .map_err(Error::from)?;
        field_str(&updated, "Version", "updateFunctionCode")
    }

    /// Point the stage-derived alias at the published version, creating it
    /// on first deploy.
    async fn reconcile_alias(
        &self,
        coords: &Coordinates,
        version: &str,
    ) -> Result<(String, String)> {
        let alias = coords.stage.to_lowercase();

        let alias_exists = match self
            .request(
                coords,
                "getAlias",
                json!({ "FunctionName": coords.name, "Name": alias }),
            )
            .await
        {
            Ok(_) => true,
            Err(failure) if failure.is_not_found() => false,
            Err(failure) => return Err(failure.into()),
        };

        let operation = if alias_exists { "updateAlias" } else { "createAlias" };
        log_debug!(
            "deploy",
            "\"{} - {} - {}\": {} alias '{}' for version {}",
            coords.stage,
            coords.region,
            coords.name,
            if alias_exists { "updating" } else { "creating" },
            alias,
            version
        );

        let params = json!({
            "FunctionName": coords.name,
            "FunctionVersion": version,
            "Name": alias,
            "Description": format!("Stage: {}", coords.stage),
        });
        let response = self
            .request(coords, operation, params)
            .await
            .map_err(Error::from)?;
        let alias_arn = field_str(&response, "AliasArn", operation)?;
        Ok((alias, alias_arn))
    }

    async fn request(
        &self,
        coords: &Coordinates,
        operation: &str,
        params: Value,
    ) -> std::result::Result<Value, crate::provider::ProviderFailure> {
        self.provider
            .request(SERVICE, operation, params, &coords.stage, &coords.region)
            .await
    }
}

fn field_str(response: &Value, key: &str, operation: &str) -> Result<String> {
    response
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::Provider {
            service: SERVICE.to_string(),
            operation: operation.to_string(),
            message: format!("response missing '{key}'"),
        })
}
