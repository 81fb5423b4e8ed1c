//! LSP server implementation

use std::sync::Arc;

use serde_json::{Value, json};
use taplo_config::{Environment, InitConfig, NativeEnvironment};
use taplo_convert::{ConvertOptions, from_json, is_json, is_toml, to_json};
use taplo_schema::{
    AssociationRule, PRIORITY_MANUAL, SOURCE_MANUAL, SchemaAssociation, SchemaCache, SchemaState,
};
use tokio::sync::Mutex;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::request::Request;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, ClientSocket, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use crate::lsp_ext::{
    AssociateSchema, AssociateSchemaParams, AssociatedSchema, AssociatedSchemaResponse,
    AssociationRuleParams, ConvertParams, ConvertResponse, ConvertToJson, ConvertToToml,
    DidChangeSchemaAssociation, DidChangeSchemaAssociationParams, DocumentUriParams, ListSchemas,
    ListSchemasResponse, MessageKind, MessageWithOutput, MessageWithOutputParams, SchemaInfo,
};
use crate::position::{full_range, position_to_offset};
use crate::session::{ClientSupport, Session};
use crate::{completion, hover, outline};

/// The TOML language server
pub struct TaploLanguageServer<E: Environment> {
    /// LSP client for sending notifications
    client: Client,
    session: Arc<Mutex<Session<E>>>,
}

impl<E: Environment> TaploLanguageServer<E> {
    pub fn new(client: Client, env: E) -> Self {
        Self {
            client,
            session: Arc::new(Mutex::new(Session::new(env))),
        }
    }

    async fn show(&self, kind: MessageKind, message: String) {
        self.client
            .send_notification::<MessageWithOutput>(MessageWithOutputParams { kind, message })
            .await;
    }

    /// Send everything collected while the session was locked.
    ///
    /// Callers release the session lock first, so a slow client never
    /// holds up the other handlers.
    async fn flush(&self, outbox: Outbox) {
        for (kind, message) in outbox.messages {
            self.show(kind, message).await;
        }
        for params in outbox.associations {
            self.client
                .send_notification::<DidChangeSchemaAssociation>(params)
                .await;
        }
        for (uri, diagnostics, version) in outbox.diagnostics {
            self.client
                .publish_diagnostics(uri, diagnostics, version)
                .await;
        }
    }

    /// Queue diagnostics for `uri`.
    ///
    /// Documents with a schema are validated in a background task, so a
    /// schema that has to be fetched does not hold up other messages. The
    /// task publishes nothing if the document changed in the meantime.
    fn validate(&self, session: &Session<E>, uri: &Url, outbox: &mut Outbox) {
        let Some(document) = session.documents.get(uri) else {
            return;
        };
        match session.schema_for(uri) {
            None => outbox.diagnostics.push((
                uri.clone(),
                document.diagnostics(uri),
                Some(document.version),
            )),
            Some(schema) => {
                tokio::spawn(validate_with_schema(
                    self.client.clone(),
                    self.session.clone(),
                    session.cache.clone(),
                    uri.clone(),
                    document.version,
                    schema,
                ));
            }
        }
    }

    fn validate_all(&self, session: &Session<E>, outbox: &mut Outbox) {
        for uri in session.documents.keys() {
            self.validate(session, uri, outbox);
        }
    }

    /// Reload the configuration file, queueing problems for the user.
    async fn reload_config(&self, session: &mut Session<E>, outbox: &mut Outbox) {
        if let Err(error) = session.load_config().await {
            warn!(%error, "failed to load configuration file");
            outbox.message(
                MessageKind::Error,
                format!("failed to load configuration: {error}"),
            );
        }
    }

    fn apply_settings(&self, session: &mut Session<E>, outbox: &mut Outbox) {
        for error in session.apply_lsp_config() {
            outbox.message(
                MessageKind::Warn,
                format!("invalid schema association: {error}"),
            );
        }
    }

    /// Ask the client for our settings section, if it supports that.
    async fn pull_settings(&self) {
        let section = {
            let session = self.session.lock().await;
            if !session.client.configuration {
                return;
            }
            session.init_config.configuration_section.clone()
        };

        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(section),
        }];
        let settings = match self.client.configuration(items).await {
            Ok(mut values) if !values.is_empty() => values.swap_remove(0),
            Ok(_) => return,
            Err(error) => {
                warn!(%error, "workspace/configuration failed");
                return;
            }
        };

        let mut outbox = Outbox::default();
        {
            let mut session = self.session.lock().await;
            if let Err(error) = session.lsp_config.update_from_json(&settings) {
                outbox.message(MessageKind::Error, format!("invalid settings: {error}"));
            } else {
                self.apply_settings(&mut session, &mut outbox);
                self.reload_config(&mut session, &mut outbox).await;
                self.validate_all(&session, &mut outbox);
            }
        }
        self.flush(outbox).await;
    }

    async fn watch_config_files(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: taplo_config::CONFIG_FILE_NAMES
                .iter()
                .map(|name| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(format!("**/{name}")),
                    kind: None,
                })
                .collect(),
        };
        let register_options = match serde_json::to_value(options) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "watcher registration");
                return;
            }
        };
        let registration = Registration {
            id: "taplo-config-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: Some(register_options),
        };
        if let Err(error) = self.client.register_capability(vec![registration]).await {
            warn!(%error, "client/registerCapability failed");
        }
    }

    /// `taplo/convertToJson`
    pub async fn convert_to_json(&self, params: ConvertParams) -> Result<ConvertResponse> {
        if !is_toml(&params.text) && is_json(&params.text) {
            return Ok(ConvertResponse {
                text: Some(params.text),
                error: None,
            });
        }

        let (parse, dom) = taplo_dom::parse(&params.text);
        let mut problems: Vec<String> = parse.errors().iter().map(|e| e.message.clone()).collect();
        problems.extend(dom.errors().iter().map(|e| e.to_string()));
        if !problems.is_empty() {
            return Ok(ConvertResponse {
                text: None,
                error: Some(format!("invalid TOML: {}", problems.join("; "))),
            });
        }

        Ok(match to_json(&dom) {
            Ok(text) => ConvertResponse {
                text: Some(text),
                error: None,
            },
            Err(error) => ConvertResponse {
                text: None,
                error: Some(error.to_string()),
            },
        })
    }

    /// `taplo/convertToToml`
    pub async fn convert_to_toml(&self, params: ConvertParams) -> Result<ConvertResponse> {
        if !is_json(&params.text) && is_toml(&params.text) {
            return Ok(ConvertResponse {
                text: Some(params.text),
                error: None,
            });
        }

        Ok(match from_json(&params.text, &ConvertOptions::default()) {
            Ok(converted) => {
                for warning in &converted.warnings {
                    warn!(%warning, "lossy conversion to TOML");
                }
                ConvertResponse {
                    text: Some(converted.toml),
                    error: None,
                }
            }
            Err(error) => ConvertResponse {
                text: None,
                error: Some(error.to_string()),
            },
        })
    }

    /// `taplo/listSchemas`: every associated schema, each once.
    pub async fn list_schemas(&self, params: DocumentUriParams) -> Result<ListSchemasResponse> {
        debug!(uri = %params.document_uri, "listing schemas");
        let session = self.session.lock().await;
        let mut schemas: Vec<SchemaInfo> = Vec::new();
        for (_, association) in session.associations.list() {
            if !schemas.iter().any(|s| s.url == association.url) {
                schemas.push(SchemaInfo {
                    url: association.url.clone(),
                    meta: association.meta.clone(),
                });
            }
        }
        Ok(ListSchemasResponse { schemas })
    }

    /// `taplo/associatedSchema`
    pub async fn associated_schema(&self, params: DocumentUriParams) -> Result<AssociatedSchemaResponse> {
        let session = self.session.lock().await;
        let schema = session
            .association_for(&params.document_uri)
            .map(|association| SchemaInfo {
                url: association.url.clone(),
                meta: association.meta.clone(),
            });
        Ok(AssociatedSchemaResponse { schema })
    }

    /// `taplo/associateSchema`: add an association and revalidate the open
    /// documents it matches. Associating again under the same rule replaces
    /// the earlier schema.
    pub async fn associate_schema(&self, params: AssociateSchemaParams) {
        let rule = match &params.rule {
            AssociationRuleParams::Glob(glob) => AssociationRule::glob(glob),
            AssociationRuleParams::Regex(regex) => AssociationRule::regex(regex),
            AssociationRuleParams::Url(url) => Ok(AssociationRule::Url(url.clone())),
        };
        let rule = match rule {
            Ok(rule) => rule,
            Err(error) => {
                self.show(MessageKind::Error, format!("invalid schema association: {error}"))
                    .await;
                return;
            }
        };

        let mut meta = match params.meta {
            Some(Value::Object(map)) => Value::Object(map),
            _ => json!({}),
        };
        meta["source"] = json!(SOURCE_MANUAL);

        let mut outbox = Outbox::default();
        let mut session = self.session.lock().await;
        let affected: Vec<Url> = session
            .documents
            .keys()
            .filter(|uri| rule.is_match(uri))
            .cloned()
            .collect();
        info!(
            schema = %params.schema_uri,
            from = ?params.document_uri,
            documents = affected.len(),
            "schema associated"
        );
        session.associations.replace(
            rule,
            SchemaAssociation {
                url: params.schema_uri,
                meta,
                priority: params.priority.unwrap_or(PRIORITY_MANUAL),
            },
        );

        for uri in &affected {
            let association = session.association_for(uri).cloned();
            outbox.associations.push(DidChangeSchemaAssociationParams {
                document_uri: uri.clone(),
                schema_uri: association.as_ref().map(|a| a.url.clone()),
                meta: association.map(|a| a.meta),
            });
            self.validate(&session, uri, &mut outbox);
        }
        drop(session);
        self.flush(outbox).await;
    }
}

/// Validate one version of a document against its schema and publish the
/// result, unless the document or its schema changed while loading.
async fn validate_with_schema<E: Environment>(
    client: Client,
    session: Arc<Mutex<Session<E>>>,
    cache: SchemaCache<E>,
    uri: Url,
    version: i32,
    schema_url: Url,
) {
    let failed_before = matches!(cache.state(&schema_url), SchemaState::FetchFailed { .. });
    let loaded = cache.resolver(&schema_url).await;

    let (diagnostics, failure) = {
        let session = session.lock().await;
        let Some(document) = session
            .documents
            .get(&uri)
            .filter(|document| document.version == version)
        else {
            debug!(%uri, version, "discarding validation of an outdated document");
            return;
        };
        if session.schema_for(&uri).as_ref() != Some(&schema_url) {
            debug!(%uri, "discarding validation against a replaced schema");
            return;
        }

        let mut diagnostics = document.diagnostics(&uri);
        let mut failure = None;
        match loaded {
            Ok((schema, resolver)) => {
                diagnostics.extend(document.schema_diagnostics(&schema, &resolver));
            }
            Err(error) if !failed_before => {
                failure = Some(format!("failed to load schema {schema_url}: {error}"));
            }
            Err(_) => {}
        }
        (diagnostics, failure)
    };

    if let Some(message) = failure {
        client
            .send_notification::<MessageWithOutput>(MessageWithOutputParams {
                kind: MessageKind::Error,
                message,
            })
            .await;
    }
    client
        .publish_diagnostics(uri, diagnostics, Some(version))
        .await;
}

/// Notifications queued while the session is locked.
#[derive(Default)]
struct Outbox {
    messages: Vec<(MessageKind, String)>,
    associations: Vec<DidChangeSchemaAssociationParams>,
    diagnostics: Vec<(Url, Vec<Diagnostic>, Option<i32>)>,
}

impl Outbox {
    fn message(&mut self, kind: MessageKind, message: String) {
        self.messages.push((kind, message));
    }
}

#[tower_lsp::async_trait]
impl<E: Environment> LanguageServer for TaploLanguageServer<E> {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let init_config = match params.initialization_options {
            Some(options) => serde_json::from_value(options).unwrap_or_else(|error| {
                warn!(%error, "invalid initialization options");
                InitConfig::default()
            }),
            None => InitConfig::default(),
        };

        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|folder| folder.uri.clone())
            .or(params.root_uri);

        let workspace = params.capabilities.workspace.as_ref();
        let client = ClientSupport {
            configuration: workspace.and_then(|w| w.configuration).unwrap_or(false),
            watch_files: workspace
                .and_then(|w| w.did_change_watched_files.as_ref())
                .and_then(|d| d.dynamic_registration)
                .unwrap_or(false),
        };

        {
            let mut session = self.session.lock().await;
            session.cache.set_cache_path(
                init_config
                    .cache_path
                    .clone()
                    .or_else(SchemaCache::<E>::default_cache_path),
            );
            session.associations.add_builtins();
            session.init_config = init_config;
            session.root = root;
            session.client = client;
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                // Full document sync - we get the whole document on each change
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        [".", "=", "[", "{", ",", "\""]
                            .into_iter()
                            .map(String::from)
                            .collect(),
                    ),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                document_formatting_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "taplo-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let mut outbox = Outbox::default();
        let watch_files = {
            let mut session = self.session.lock().await;
            self.apply_settings(&mut session, &mut outbox);
            self.reload_config(&mut session, &mut outbox).await;
            session.client.watch_files
        };
        self.flush(outbox).await;
        if watch_files {
            self.watch_config_files().await;
        }
        self.pull_settings().await;
        info!("TOML language server initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        let mut outbox = Outbox::default();
        {
            let mut session = self.session.lock().await;
            session.open_document(&document.uri, document.text, document.version);
            self.validate(&session, &document.uri, &mut outbox);
        }
        self.flush(outbox).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // With FULL sync, the last change holds the entire document
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let mut outbox = Outbox::default();
        {
            let mut session = self.session.lock().await;
            if session.update_document(&uri, change.text, version) {
                self.validate(&session, &uri, &mut outbox);
            }
        }
        self.flush(outbox).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.session.lock().await.close_document(&uri);

        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let mut session = self.session.lock().await;
        let section = session.init_config.configuration_section.clone();
        let settings = match params.settings {
            Value::Null if session.client.configuration => {
                drop(session);
                self.pull_settings().await;
                return;
            }
            Value::Object(mut map) if map.contains_key(&section) => {
                map.remove(&section).unwrap_or_default()
            }
            settings => settings,
        };

        let mut outbox = Outbox::default();
        if let Err(error) = session.lsp_config.update_from_json(&settings) {
            outbox.message(MessageKind::Error, format!("invalid settings: {error}"));
        } else {
            self.apply_settings(&mut session, &mut outbox);
            self.reload_config(&mut session, &mut outbox).await;
            self.validate_all(&session, &mut outbox);
        }
        drop(session);
        self.flush(outbox).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let mut session = self.session.lock().await;
        let changed = params.changes.iter().any(|change| {
            session
                .env
                .to_file_path(&change.uri)
                .is_some_and(|path| session.is_config_file(&path))
        });
        if !changed {
            return;
        }
        let mut outbox = Outbox::default();
        self.reload_config(&mut session, &mut outbox).await;
        self.validate_all(&session, &mut outbox);
        drop(session);
        self.flush(outbox).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some((schema_url, cache)) = self.schema_of(&uri).await else {
            return Ok(None);
        };
        let (schema, resolver) = match cache.resolver(&schema_url).await {
            Ok(loaded) => loaded,
            Err(error) => {
                debug!(%error, "no schema for completion");
                return Ok(None);
            }
        };

        let session = self.session.lock().await;
        let Some(document) = session.documents.get(&uri) else {
            return Ok(None);
        };
        let offset = position_to_offset(&document.text, position);
        let items = completion::completions(
            document,
            offset,
            &schema,
            &resolver,
            session.lsp_config.completion.max_keys,
        );
        if items.is_empty() {
            Ok(None)
        } else {
            Ok(Some(CompletionResponse::Array(items)))
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some((schema_url, cache)) = self.schema_of(&uri).await else {
            return Ok(None);
        };
        let Ok((schema, resolver)) = cache.resolver(&schema_url).await else {
            return Ok(None);
        };

        let session = self.session.lock().await;
        let Some(document) = session.documents.get(&uri) else {
            return Ok(None);
        };
        let offset = position_to_offset(&document.text, position);
        Ok(hover::hover(document, offset, &schema, &resolver))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let uri = params.text_document.uri;

        let session = self.session.lock().await;
        let Some(document) = session.documents.get(&uri) else {
            return Ok(None);
        };

        // Only format if document parsed successfully
        if !document.parse.is_ok() {
            return Ok(None);
        }

        let (options, scopes) = session.format_options(&uri, &params.options);
        let formatted = taplo_format::format_syntax(&document.parse.syntax(), options, &scopes);

        // Only return an edit if the content changed
        if formatted == document.text {
            return Ok(None);
        }

        // Replace the entire document
        Ok(Some(vec![TextEdit {
            range: full_range(&document.text),
            new_text: formatted,
        }]))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let session = self.session.lock().await;
        let Some(document) = session.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };

        let symbols = outline::document_symbols(document);

        if symbols.is_empty() {
            Ok(None)
        } else {
            Ok(Some(DocumentSymbolResponse::Nested(symbols)))
        }
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let session = self.session.lock().await;
        let Some(document) = session.documents.get(&params.text_document.uri) else {
            return Ok(None);
        };
        Ok(Some(outline::folding_ranges(document)))
    }
}

impl<E: Environment> TaploLanguageServer<E> {
    /// The schema of an open document, and the cache to load it from.
    async fn schema_of(&self, uri: &Url) -> Option<(Url, SchemaCache<E>)> {
        let session = self.session.lock().await;
        if !session.documents.contains_key(uri) {
            return None;
        }
        Some((session.schema_for(uri)?, session.cache.clone()))
    }
}

/// Build the service with the custom methods registered.
pub fn service<E: Environment>(env: E) -> (LspService<TaploLanguageServer<E>>, ClientSocket) {
    LspService::build(|client| TaploLanguageServer::new(client, env))
        .custom_method(ConvertToJson::METHOD, TaploLanguageServer::<E>::convert_to_json)
        .custom_method(ConvertToToml::METHOD, TaploLanguageServer::<E>::convert_to_toml)
        .custom_method(ListSchemas::METHOD, TaploLanguageServer::<E>::list_schemas)
        .custom_method(AssociatedSchema::METHOD, TaploLanguageServer::<E>::associated_schema)
        .custom_method(AssociateSchema::METHOD, TaploLanguageServer::<E>::associate_schema)
        .finish()
}

/// Run the LSP server on stdin/stdout
pub async fn run() -> eyre::Result<()> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = service(NativeEnvironment::new());
    Server::new(stdin, stdout, socket).serve(service).await;

    Ok(())
}
