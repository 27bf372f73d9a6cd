//! Lab lookup tools backed by the content API.
//!
//! `get_lab` greets the user with a lab from the configured account;
//! `get_modules` and `get_units` walk the hierarchy of the account the
//! assistant names. Content lookup failures are returned as user-facing
//! text, not errors.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{Tool, ToolValue};
use crate::content::ContentSource;
use crate::error::{LookupError, ToolError};

/// Account identifiers arrive as JSON strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AccountId {
    Text(String),
    Number(serde_json::Number),
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(
    tool: &str,
    args: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// User-facing replacement for a failed content lookup.
fn lookup_failed(tool: &str, subject: &str, err: &LookupError) -> ToolValue {
    tracing::error!(tool = %tool, subject = %subject, error = %err, "Content lookup failed");
    ToolValue::Text(format!(
        "Lo siento, hubo un problema al buscar el laboratorio para la identificacion '{subject}'. Intenta nuevamente con un numero que este registrado en la plataforma."
    ))
}

/// `name` is canonical; `id` is accepted for older assistant prompts.
/// When both are present, `name` wins.
#[derive(Debug, Deserialize)]
struct GetLabArgs {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<AccountId>,
}

impl GetLabArgs {
    fn lab_name(self, tool: &str) -> Result<String, ToolError> {
        self.name
            .or_else(|| self.id.map(|id| id.to_string()))
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: tool.to_string(),
                reason: "missing field `name`".to_string(),
            })
    }
}

/// Greets the user with the display name of a lab looked up by internal name.
#[derive(Debug)]
pub struct GetLabTool {
    content: Arc<dyn ContentSource>,
    account_id: String,
}

impl GetLabTool {
    pub fn new(content: Arc<dyn ContentSource>, account_id: impl Into<String>) -> Self {
        Self {
            content,
            account_id: account_id.into(),
        }
    }
}

#[async_trait]
impl Tool for GetLabTool {
    fn name(&self) -> &str {
        "get_lab"
    }

    fn description(&self) -> &str {
        "Look up a laboratory by its internal name and return a welcome message."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Internal name of the laboratory."
                }
            },
            "required": ["name"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolValue, ToolError> {
        let lab_name = parse_args::<GetLabArgs>(self.name(), args)?.lab_name(self.name())?;

        let hierarchy = match self.content.fetch_hierarchy(&self.account_id).await {
            Ok(h) => h,
            Err(e) => return Ok(lookup_failed(self.name(), &lab_name, &e)),
        };

        let message = match hierarchy.labs_named(&lab_name).next() {
            Some(lab) => format!("Bienvenido al laboratorio: {}", lab.display_name),
            None => format!(
                "No se encontró el laboratorio con id: '{lab_name}'. Por favor verifica que el id sea correcto."
            ),
        };
        Ok(ToolValue::Text(message))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetModulesArgs {
    id: AccountId,
    lab_name: String,
}

/// Lists the module display names of a lab.
#[derive(Debug)]
pub struct GetModulesTool {
    content: Arc<dyn ContentSource>,
}

impl GetModulesTool {
    pub fn new(content: Arc<dyn ContentSource>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl Tool for GetModulesTool {
    fn name(&self) -> &str {
        "get_modules"
    }

    fn description(&self) -> &str {
        "List the modules of a laboratory, identified by its display name."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Account identifier on the content platform."
                },
                "labName": {
                    "type": "string",
                    "description": "Display name of the laboratory."
                }
            },
            "required": ["id", "labName"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolValue, ToolError> {
        let args: GetModulesArgs = parse_args(self.name(), args)?;
        let account_id = args.id.to_string();

        let hierarchy = match self.content.fetch_hierarchy(&account_id).await {
            Ok(h) => h,
            Err(e) => return Ok(lookup_failed(self.name(), &account_id, &e)),
        };

        Ok(match hierarchy.lab_by_display_name(&args.lab_name) {
            Some(lab) => ToolValue::List(
                lab.modules
                    .iter()
                    .map(|m| m.display_name.clone())
                    .collect(),
            ),
            None => ToolValue::Text(format!("Laboratorio '{}' no encontrado.", args.lab_name)),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetUnitsArgs {
    id: AccountId,
    lab_name: String,
    module_name: String,
}

/// Lists the challenge names of a module.
#[derive(Debug)]
pub struct GetUnitsTool {
    content: Arc<dyn ContentSource>,
}

impl GetUnitsTool {
    pub fn new(content: Arc<dyn ContentSource>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl Tool for GetUnitsTool {
    fn name(&self) -> &str {
        "get_units"
    }

    fn description(&self) -> &str {
        "List the challenges of a module inside a laboratory, both identified by display name."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "id": {
                    "type": "string",
                    "description": "Account identifier on the content platform."
                },
                "labName": {
                    "type": "string",
                    "description": "Display name of the laboratory."
                },
                "moduleName": {
                    "type": "string",
                    "description": "Display name of the module."
                }
            },
            "required": ["id", "labName", "moduleName"]
        })
    }

    async fn call(&self, args: serde_json::Value) -> Result<ToolValue, ToolError> {
        let args: GetUnitsArgs = parse_args(self.name(), args)?;
        let account_id = args.id.to_string();

        let hierarchy = match self.content.fetch_hierarchy(&account_id).await {
            Ok(h) => h,
            Err(e) => return Ok(lookup_failed(self.name(), &account_id, &e)),
        };

        let module = hierarchy
            .lab_by_display_name(&args.lab_name)
            .and_then(|lab| lab.module_by_display_name(&args.module_name));

        Ok(match module {
            Some(module) => {
                ToolValue::List(module.challenges.iter().map(|c| c.name.clone()).collect())
            }
            None => ToolValue::Text(format!("Módulo '{}' no encontrado.", args.module_name)),
        })
    }
}
