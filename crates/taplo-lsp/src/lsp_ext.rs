//! Requests and notifications beyond the standard protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::request::Request;
use url::Url;

pub enum ConvertToJson {}

impl Request for ConvertToJson {
    type Params = ConvertParams;
    type Result = ConvertResponse;
    const METHOD: &'static str = "taplo/convertToJson";
}

pub enum ConvertToToml {}

impl Request for ConvertToToml {
    type Params = ConvertParams;
    type Result = ConvertResponse;
    const METHOD: &'static str = "taplo/convertToToml";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertParams {
    pub text: String,
}

/// Either the converted text or why the conversion failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub enum ListSchemas {}

impl Request for ListSchemas {
    type Params = DocumentUriParams;
    type Result = ListSchemasResponse;
    const METHOD: &'static str = "taplo/listSchemas";
}

pub enum AssociatedSchema {}

impl Request for AssociatedSchema {
    type Params = DocumentUriParams;
    type Result = AssociatedSchemaResponse;
    const METHOD: &'static str = "taplo/associatedSchema";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUriParams {
    pub document_uri: Url,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub url: Url,
    pub meta: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSchemasResponse {
    pub schemas: Vec<SchemaInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociatedSchemaResponse {
    pub schema: Option<SchemaInfo>,
}

pub enum AssociateSchema {}

impl Notification for AssociateSchema {
    type Params = AssociateSchemaParams;
    const METHOD: &'static str = "taplo/associateSchema";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateSchemaParams {
    /// The document the association was made from.
    pub document_uri: Option<Url>,
    pub schema_uri: Url,
    pub rule: AssociationRuleParams,
    pub priority: Option<i32>,
    pub meta: Option<Value>,
}

/// `{ "glob": ... }`, `{ "regex": ... }` or `{ "url": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociationRuleParams {
    Glob(String),
    Regex(String),
    Url(Url),
}

/// Sent to the client for messages the user should see.
pub enum MessageWithOutput {}

impl Notification for MessageWithOutput {
    type Params = MessageWithOutputParams;
    const METHOD: &'static str = "taplo/messageWithOutput";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageWithOutputParams {
    pub kind: MessageKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Info,
    Warn,
    Error,
}

/// Sent to the client when the schema of an open document changes.
pub enum DidChangeSchemaAssociation {}

impl Notification for DidChangeSchemaAssociation {
    type Params = DidChangeSchemaAssociationParams;
    const METHOD: &'static str = "taplo/didChangeSchemaAssociation";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidChangeSchemaAssociationParams {
    pub document_uri: Url,
    pub schema_uri: Option<Url>,
    pub meta: Option<Value>,
}
