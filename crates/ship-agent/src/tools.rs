//! Tool dispatcher for model-requested invocations
//!
//! Tool identity is a closed enum: every name the model may call maps to
//! exactly one handler, and unknown names become an error tool-result fed
//! back to the model rather than a crash.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use ship_ai::{CompletionRequest, Content, Message, ModelClient};
use ship_storage::Storage;

use crate::{
    bus::RoomEmitter,
    error::{Error, Result},
    events::ShipEvent,
    request::{ShipRequest, ShipType},
};

/// Every tool the model may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    WebSearch,
    ImageAnalysis,
    StartPortfolio,
    StartLandingPage,
    StartEmailTemplate,
    /// Code generation and deployment. The only terminal tool: its completion
    /// ends the conversation loop.
    Cto,
}

impl ToolKind {
    pub const ALL: [ToolKind; 6] = [
        ToolKind::WebSearch,
        ToolKind::ImageAnalysis,
        ToolKind::StartPortfolio,
        ToolKind::StartLandingPage,
        ToolKind::StartEmailTemplate,
        ToolKind::Cto,
    ];

    /// Wire name used in API calls
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "search_tool",
            ToolKind::ImageAnalysis => "image_analysis_tool",
            ToolKind::StartPortfolio => "start_shipping_portfolio_tool",
            ToolKind::StartLandingPage => "start_shipping_landing_page_tool",
            ToolKind::StartEmailTemplate => "start_shipping_email_template_tool",
            ToolKind::Cto => "cto_tool",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Whether dispatching this tool ends the conversation loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolKind::Cto)
    }

    fn description(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "Search the web for content to use in the website",
            ToolKind::ImageAnalysis => {
                "Analyze one of the images the user attached to the request. \
                 Pass the zero-based index of the image."
            }
            ToolKind::StartPortfolio => {
                "Capture the gathered requirements for the user's portfolio website"
            }
            ToolKind::StartLandingPage => {
                "Capture the gathered requirements for the user's landing page"
            }
            ToolKind::StartEmailTemplate => {
                "Capture the gathered requirements for the user's email template"
            }
            ToolKind::Cto => {
                "Generate and deploy the website. Provide a project name and the \
                 complete set of files, including index.html."
            }
        }
    }

    fn input_schema(&self) -> serde_json::Value {
        match self {
            ToolKind::WebSearch => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" }
                },
                "required": ["query"]
            }),
            ToolKind::ImageAnalysis => json!({
                "type": "object",
                "properties": {
                    "index": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Zero-based index of the attached image"
                    }
                },
                "required": ["index"]
            }),
            ToolKind::StartPortfolio | ToolKind::StartLandingPage | ToolKind::StartEmailTemplate => {
                json!({
                    "type": "object",
                    "properties": {
                        "requirements": {
                            "type": "string",
                            "description": "Summary of the gathered requirements"
                        }
                    },
                    "required": ["requirements"]
                })
            }
            ToolKind::Cto => json!({
                "type": "object",
                "properties": {
                    "project_name": { "type": "string", "description": "Name for the site" },
                    "files": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": { "type": "string" },
                                "content": { "type": "string" }
                            },
                            "required": ["path", "content"]
                        }
                    }
                },
                "required": ["project_name", "files"]
            }),
        }
    }
}

/// A model-requested invocation, consumed exactly once.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// What a dispatch produced.
#[derive(Debug)]
pub struct ToolOutcome {
    /// Content appended verbatim as the tool result
    pub content: Vec<Content>,
    pub is_error: bool,
    /// True when the invoked tool ends the loop
    pub terminal: bool,
}

impl ToolOutcome {
    fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
            terminal: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(message)],
            is_error: true,
            terminal: false,
        }
    }
}

/// Web search collaborator used by the search tool.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<String>;
}

/// Search provider for deployments without a search backend configured.
pub struct DisabledSearch;

#[async_trait]
impl SearchProvider for DisabledSearch {
    async fn search(&self, _query: &str) -> Result<String> {
        Ok("Web search is not configured on this deployment. Proceed with the \
            information the user already provided."
            .to_string())
    }
}

/// Everything a handler may touch during one dispatch.
pub struct RequestContext<'a> {
    pub request: &'a ShipRequest,
    pub emitter: &'a RoomEmitter,
    pub client: &'a Arc<dyn ModelClient>,
}

#[derive(Deserialize)]
struct CtoInput {
    project_name: String,
    files: Vec<SiteFile>,
}

#[derive(Deserialize)]
struct SiteFile {
    path: String,
    content: String,
}

/// Routes each tool call to its handler.
pub struct Toolbox {
    storage: Arc<dyn Storage>,
    search: Arc<dyn SearchProvider>,
    validators: HashMap<ToolKind, jsonschema::Validator>,
}

impl Toolbox {
    pub fn new(storage: Arc<dyn Storage>, search: Arc<dyn SearchProvider>) -> Self {
        let mut validators = HashMap::new();
        for kind in ToolKind::ALL {
            match jsonschema::validator_for(&kind.input_schema()) {
                Ok(validator) => {
                    validators.insert(kind, validator);
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid input schema for '{}', skipping validation: {}",
                        kind.name(),
                        e
                    );
                }
            }
        }
        Self {
            storage,
            search,
            validators,
        }
    }

    /// Tool definitions advertised to the model for a given ship type.
    ///
    /// Only the matching start tool is exposed; the free-form `prompt` type
    /// gets none.
    pub fn api_tools(&self, ship_type: ShipType) -> Vec<ship_ai::Tool> {
        let mut kinds = vec![ToolKind::WebSearch, ToolKind::ImageAnalysis];
        match ship_type {
            ShipType::Portfolio => kinds.push(ToolKind::StartPortfolio),
            ShipType::LandingPage => kinds.push(ToolKind::StartLandingPage),
            ShipType::EmailTemplate => kinds.push(ToolKind::StartEmailTemplate),
            ShipType::Prompt => {}
        }
        kinds.push(ToolKind::Cto);

        kinds
            .into_iter()
            .map(|k| ship_ai::Tool::new(k.name(), k.description(), k.input_schema()))
            .collect()
    }

    /// Execute one tool call and return its result content.
    ///
    /// Unknown tools and invalid arguments become error tool-results fed back
    /// to the model; handler failures propagate to the driver.
    pub async fn dispatch(&self, call: &ToolCall, ctx: &RequestContext<'_>) -> Result<ToolOutcome> {
        let Some(kind) = ToolKind::from_name(&call.name) else {
            tracing::warn!(tool = %call.name, "unknown tool requested");
            return Ok(ToolOutcome::error(format!("Unknown tool: {}", call.name)));
        };

        if let Some(validator) = self.validators.get(&kind) {
            let errors: Vec<String> = validator
                .iter_errors(&call.input)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            if !errors.is_empty() {
                return Ok(ToolOutcome::error(format!(
                    "Tool argument validation failed:\n{}",
                    errors.join("\n")
                )));
            }
        }

        match kind {
            ToolKind::WebSearch => self.web_search(call).await,
            ToolKind::ImageAnalysis => self.analyze_image(call, ctx).await,
            ToolKind::StartPortfolio | ToolKind::StartLandingPage | ToolKind::StartEmailTemplate => {
                Ok(start_shipping(ctx.request.ship_type))
            }
            ToolKind::Cto => self.deploy(call, ctx).await,
        }
    }

    async fn web_search(&self, call: &ToolCall) -> Result<ToolOutcome> {
        let query = call
            .input
            .get("query")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let results = self.search.search(query).await?;
        Ok(ToolOutcome::text(results))
    }

    async fn analyze_image(&self, call: &ToolCall, ctx: &RequestContext<'_>) -> Result<ToolOutcome> {
        let index = call
            .input
            .get("index")
            .and_then(|v| v.as_u64())
            .unwrap_or_default() as usize;

        let Some(image) = ctx.request.images.get(index) else {
            return Ok(ToolOutcome::error(format!(
                "No attached image at index {} ({} attached)",
                index,
                ctx.request.images.len()
            )));
        };

        // One-off single-turn analysis, outside the main conversation.
        let mut analysis = CompletionRequest::default();
        analysis.push(Message::user_with_content(vec![
            Content::image(&image.media_type, &image.data),
            Content::text(
                "Describe this image for a web designer: subject, layout, colors, \
                 and any text it contains.",
            ),
        ]));
        let completion = ctx.client.send_message(analysis).await?;
        Ok(ToolOutcome::text(completion.into_message().text()))
    }

    async fn deploy(&self, call: &ToolCall, ctx: &RequestContext<'_>) -> Result<ToolOutcome> {
        let input: CtoInput = serde_json::from_value(call.input.clone())
            .map_err(|e| Error::tool(call.name.clone(), e.to_string()))?;

        let existing = self.storage.list_folders("sites").await?;
        let slug = unique_slug(&input.project_name, &existing);

        ctx.emitter.emit(ShipEvent::Progress {
            message: format!("Deploying {}...", slug),
        });

        for file in &input.files {
            self.storage
                .save_file(&format!("sites/{}/{}", slug, file.path), file.content.as_bytes())
                .await?;
            ctx.emitter.emit(ShipEvent::Progress {
                message: format!("Wrote {}", file.path),
            });
        }

        tracing::info!(
            %slug,
            files = input.files.len(),
            room_id = %ctx.request.room_id,
            "website deployed"
        );
        ctx.emitter.emit(ShipEvent::WebsiteDeployed { slug: slug.clone() });

        Ok(ToolOutcome {
            content: vec![Content::text(format!("Deployed to /site/{}", slug))],
            is_error: false,
            terminal: true,
        })
    }
}

fn start_shipping(ship_type: ShipType) -> ToolOutcome {
    ToolOutcome::text(format!(
        "Requirements captured for the {}. Coordinate with the cto_tool to \
         generate and deploy the website.",
        ship_type.label()
    ))
}

static SLUG_INVALID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Turn a project name into a URL slug, suffixing on collision.
fn unique_slug(project_name: &str, existing: &[String]) -> String {
    let base = SLUG_INVALID
        .replace_all(&project_name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string();
    let base = if base.is_empty() { "site".to_string() } else { base };

    if !existing.iter().any(|e| e == &base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !existing.iter().any(|e| e == &candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use ship_ai::{Completion, Role, StopReason};
    use ship_storage::FileStream;
    use std::collections::HashMap;

    /// In-memory storage for dispatcher tests.
    #[derive(Default)]
    struct MemStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl Storage for MemStorage {
        async fn save_file(&self, path: &str, content: &[u8]) -> ship_storage::Result<()> {
            self.files.lock().insert(path.to_string(), content.to_vec());
            Ok(())
        }

        async fn get_file(&self, path: &str) -> ship_storage::Result<Vec<u8>> {
            self.files
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| ship_storage::Error::DirectoryNotFound(path.to_string()))
        }

        async fn list_folders(&self, prefix: &str) -> ship_storage::Result<Vec<String>> {
            let files = self.files.lock();
            let mut names: Vec<String> = files
                .keys()
                .filter_map(|k| k.strip_prefix(&format!("{}/", prefix)))
                .filter_map(|rest| rest.split('/').next())
                .map(String::from)
                .collect();
            names.sort();
            names.dedup();
            Ok(names)
        }

        async fn create_zip_from_directory(&self, path: &str) -> ship_storage::Result<Vec<u8>> {
            Err(ship_storage::Error::DirectoryNotFound(path.to_string()))
        }

        async fn get_file_stream(&self, _path: &str) -> ship_storage::Result<FileStream> {
            Ok(FileStream::missing())
        }
    }

    struct EchoClient;

    #[async_trait]
    impl ModelClient for EchoClient {
        async fn send_message(
            &self,
            _request: CompletionRequest,
        ) -> ship_ai::Result<Completion> {
            Ok(Completion {
                role: Role::Assistant,
                content: vec![Content::text("a minimalist hero section in blue")],
                stop_reason: Some(StopReason::EndTurn),
                usage: Default::default(),
            })
        }
    }

    fn request() -> ShipRequest {
        ShipRequest {
            room_id: "room-1".into(),
            user_id: "user-1".into(),
            ship_type: ShipType::Portfolio,
            message: "build it".into(),
            images: vec![crate::request::ImageUpload {
                media_type: "image/png".into(),
                data: "aGVsbG8=".into(),
                caption: None,
            }],
            api_key_override: None,
        }
    }

    fn toolbox() -> Toolbox {
        Toolbox::new(Arc::new(MemStorage::default()), Arc::new(DisabledSearch))
    }

    async fn dispatch(
        toolbox: &Toolbox,
        name: &str,
        input: serde_json::Value,
    ) -> (Result<ToolOutcome>, Vec<ShipEvent>) {
        let bus = Arc::new(crate::bus::EventBus::new());
        let mut rx = bus.subscribe("room-1");
        let emitter = bus.emitter("room-1");
        let request = request();
        let client: Arc<dyn ModelClient> = Arc::new(EchoClient);
        let ctx = RequestContext {
            request: &request,
            emitter: &emitter,
            client: &client,
        };
        let call = ToolCall {
            id: "tu_1".into(),
            name: name.into(),
            input,
        };
        let result = toolbox.dispatch(&call, &ctx).await;

        let mut events = vec![];
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    #[test]
    fn test_tool_names_round_trip() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ToolKind::from_name("nonexistent_tool"), None);
    }

    #[test]
    fn test_only_cto_is_terminal() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.is_terminal(), kind == ToolKind::Cto);
        }
    }

    #[test]
    fn test_api_tools_match_ship_type() {
        let toolbox = toolbox();

        let names: Vec<String> = toolbox
            .api_tools(ShipType::Portfolio)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(names.contains(&"start_shipping_portfolio_tool".to_string()));
        assert!(!names.contains(&"start_shipping_landing_page_tool".to_string()));
        assert!(names.contains(&"cto_tool".to_string()));

        let names: Vec<String> = toolbox
            .api_tools(ShipType::Prompt)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(!names.iter().any(|n| n.starts_with("start_shipping")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result_not_failure() {
        let toolbox = toolbox();
        let (result, _) = dispatch(&toolbox, "mystery_tool", json!({})).await;
        let outcome = result.unwrap();
        assert!(outcome.is_error);
        assert!(!outcome.terminal);
    }

    #[tokio::test]
    async fn test_invalid_arguments_rejected_by_schema() {
        let toolbox = toolbox();
        let (result, _) = dispatch(&toolbox, "search_tool", json!({"query": 42})).await;
        let outcome = result.unwrap();
        assert!(outcome.is_error);
        let text = outcome.content[0].as_text().unwrap();
        assert!(text.contains("validation failed"), "got: {}", text);
    }

    #[tokio::test]
    async fn test_start_shipping_mentions_cto() {
        let toolbox = toolbox();
        let (result, _) = dispatch(
            &toolbox,
            "start_shipping_portfolio_tool",
            json!({"requirements": "dark theme, three projects"}),
        )
        .await;
        let outcome = result.unwrap();
        assert!(!outcome.is_error);
        assert!(!outcome.terminal);
        assert!(outcome.content[0].as_text().unwrap().contains("cto_tool"));
    }

    #[tokio::test]
    async fn test_image_analysis_out_of_range() {
        let toolbox = toolbox();
        let (result, _) = dispatch(&toolbox, "image_analysis_tool", json!({"index": 5})).await;
        let outcome = result.unwrap();
        assert!(outcome.is_error);
    }

    #[tokio::test]
    async fn test_image_analysis_uses_model() {
        let toolbox = toolbox();
        let (result, _) = dispatch(&toolbox, "image_analysis_tool", json!({"index": 0})).await;
        let outcome = result.unwrap();
        assert!(!outcome.is_error);
        assert!(outcome.content[0].as_text().unwrap().contains("hero section"));
    }

    #[tokio::test]
    async fn test_cto_deploys_and_emits_events() {
        let storage = Arc::new(MemStorage::default());
        let toolbox = Toolbox::new(storage.clone(), Arc::new(DisabledSearch));

        let (result, events) = dispatch(
            &toolbox,
            "cto_tool",
            json!({
                "project_name": "My Photo Site!",
                "files": [
                    {"path": "index.html", "content": "<html></html>"},
                    {"path": "style.css", "content": "body {}"}
                ]
            }),
        )
        .await;

        let outcome = result.unwrap();
        assert!(outcome.terminal);
        assert!(!outcome.is_error);

        let deployed: Vec<&ShipEvent> = events
            .iter()
            .filter(|e| matches!(e, ShipEvent::WebsiteDeployed { .. }))
            .collect();
        assert_eq!(deployed.len(), 1);
        match deployed[0] {
            ShipEvent::WebsiteDeployed { slug } => assert_eq!(slug, "my-photo-site"),
            _ => unreachable!(),
        }

        let files = storage.files.lock();
        assert!(files.contains_key("sites/my-photo-site/index.html"));
        assert!(files.contains_key("sites/my-photo-site/style.css"));
    }

    #[test]
    fn test_unique_slug_sanitizes() {
        assert_eq!(unique_slug("My Photo Site!", &[]), "my-photo-site");
        assert_eq!(unique_slug("  --  ", &[]), "site");
        assert_eq!(unique_slug("Ünïcode Çafe", &[]), "n-code-afe");
    }

    #[test]
    fn test_unique_slug_suffixes_on_collision() {
        let existing = vec!["demo".to_string(), "demo-2".to_string()];
        assert_eq!(unique_slug("demo", &existing), "demo-3");
    }
}
