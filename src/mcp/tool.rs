//! Typed tool definitions and their conversion into protocol tools.
//!
//! Tool authors write ordinary async functions taking a [`RequestContext`]
//! and a `Deserialize` argument struct. [`convert_tool`] turns such a
//! function into a [`Tool`] descriptor for `tools/list` and a type-erased
//! [`ToolHandler`] for `tools/call`, capturing the decode and encode steps
//! for that pair of types.
//!
//! ```text
//! arguments (JSON) ──decode──▶ Args ──handler──▶ Output ──encode──▶ CallToolResult
//!         │                                                   │
//!         └─ ToolError::Binding                               └─ ToolError::Serialization
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::mcp::context::RequestContext;

/// Future returned by a [`ToolHandler`].
pub type ToolFuture = BoxFuture<'static, Result<CallToolResult, ToolError>>;

/// The type-erased invocation adapter stored in the registry.
pub type ToolHandler = Arc<dyn Fn(RequestContext, Value) -> ToolFuture + Send + Sync>;

type TypedHandler<A, R> =
    Arc<dyn Fn(RequestContext, A) -> BoxFuture<'static, Result<R, ToolError>> + Send + Sync>;

/// Behavioural hints advertised with a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The tool does not modify its environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// The tool may perform destructive updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Repeating a call with the same arguments has no additional effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
    /// The tool talks to external entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_world_hint: Option<bool>,
}

/// A tool descriptor as returned by `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
    /// Behavioural hints.
    pub annotations: ToolAnnotations,
}

impl Tool {
    /// Whether the tool declares itself read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.annotations.read_only_hint == Some(true)
    }
}

/// JSON Schema type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A string parameter.
    String,
    /// A numeric parameter.
    Number,
    /// A boolean parameter.
    Boolean,
}

impl ParamKind {
    const fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// A declared input parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    name: String,
    kind: ParamKind,
    required: bool,
    description: Option<String>,
}

impl ToolParam {
    fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
        }
    }

    /// Declares a string parameter.
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::String)
    }

    /// Declares a numeric parameter.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Number)
    }

    /// Declares a boolean parameter.
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Boolean)
    }

    /// Marks the parameter as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attaches a description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An option applied while building a [`Tool`].
///
/// Options are applied in order, so later options override earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOption {
    /// Sets the description.
    Description(String),
    /// Sets the title annotation.
    Title(String),
    /// Sets the read-only hint.
    ReadOnlyHint(bool),
    /// Sets the destructive hint.
    DestructiveHint(bool),
    /// Sets the idempotent hint.
    IdempotentHint(bool),
    /// Sets the open-world hint.
    OpenWorldHint(bool),
    /// Declares (or redeclares) an input parameter.
    Param(ToolParam),
}

impl From<ToolParam> for ToolOption {
    fn from(param: ToolParam) -> Self {
        Self::Param(param)
    }
}

/// Content item in a tool call result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// The protocol-native result of a tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Whether the tool reports a domain-level failure.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful result with no content.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            content: Vec::new(),
            is_error: false,
        }
    }

    /// A successful single-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// A single-text result flagged as a tool-level error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }
}

/// Wraps a serialisable value returned by a tool handler.
///
/// The value is encoded as compact JSON and returned as one text item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structured<T>(pub T);

/// Conversion of a handler's return value into a [`CallToolResult`].
pub trait ToolOutput {
    /// Encodes the value.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Serialization`] if the value cannot be encoded.
    fn into_call_result(self) -> Result<CallToolResult, ToolError>;
}

impl ToolOutput for CallToolResult {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        Ok(self)
    }
}

impl ToolOutput for Box<CallToolResult> {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        Ok(*self)
    }
}

impl ToolOutput for () {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        Ok(CallToolResult::empty())
    }
}

impl<T: ToolOutput> ToolOutput for Option<T> {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        self.map_or_else(|| Ok(CallToolResult::empty()), ToolOutput::into_call_result)
    }
}

impl<T: Serialize> ToolOutput for Structured<T> {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        serde_json::to_string(&self.0)
            .map(CallToolResult::text)
            .map_err(ToolError::Serialization)
    }
}

impl ToolOutput for Value {
    fn into_call_result(self) -> Result<CallToolResult, ToolError> {
        Structured(self).into_call_result()
    }
}

/// A typed tool before type erasure.
pub struct ToolDefinition<A, R> {
    name: String,
    description: String,
    handler: TypedHandler<A, R>,
    options: Vec<ToolOption>,
    _types: PhantomData<fn(A) -> R>,
}

impl<A, R> ToolDefinition<A, R>
where
    A: DeserializeOwned + Send + 'static,
    R: ToolOutput + Send + 'static,
{
    /// Creates a tool definition from an async handler.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
        options: Vec<ToolOption>,
    ) -> Self
    where
        F: Fn(RequestContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(
                move |ctx: RequestContext, args: A| -> BoxFuture<'static, Result<R, ToolError>> {
                    Box::pin(handler(ctx, args))
                },
            ),
            options,
            _types: PhantomData,
        }
    }

    /// The tool's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the descriptor and the erased invocation adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] if the name, description or
    /// options are malformed.
    pub fn convert(self) -> Result<(Tool, ToolHandler), ToolError> {
        let handler = self.handler;
        convert_tool(
            self.name,
            self.description,
            move |ctx, args| handler(ctx, args),
            self.options,
        )
    }
}

/// Converts a typed handler into a protocol [`Tool`] and a [`ToolHandler`].
///
/// The base options (description, title = name, idempotent hint) are
/// applied before `options`.
///
/// # Errors
///
/// Returns [`ToolError::InvalidDefinition`] if `name` or `description` is
/// empty or an option declares a parameter without a name.
pub fn convert_tool<A, R, F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    handler: F,
    options: Vec<ToolOption>,
) -> Result<(Tool, ToolHandler), ToolError>
where
    A: DeserializeOwned + Send + 'static,
    R: ToolOutput + Send + 'static,
    F: Fn(RequestContext, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, ToolError>> + Send + 'static,
{
    let name = name.into();
    let description = description.into();

    if name.trim().is_empty() {
        return Err(ToolError::InvalidDefinition {
            message: "tool name must not be empty".to_string(),
        });
    }
    if description.trim().is_empty() {
        return Err(ToolError::InvalidDefinition {
            message: format!("tool '{name}' must have a description"),
        });
    }

    let base_options = [
        ToolOption::Description(description),
        ToolOption::Title(name.clone()),
        ToolOption::IdempotentHint(true),
    ];
    let tool = build_tool(&name, base_options.into_iter().chain(options))?;

    let tool_name = name;
    let handler = Arc::new(handler);
    let erased: ToolHandler = Arc::new(move |ctx: RequestContext, arguments: Value| -> ToolFuture {
        let handler = Arc::clone(&handler);
        let tool_name = tool_name.clone();
        Box::pin(async move {
            let arguments = if arguments.is_null() {
                Value::Object(Map::new())
            } else {
                arguments
            };
            let args: A = serde_json::from_value(arguments).map_err(|source| ToolError::Binding {
                tool: tool_name,
                source,
            })?;

            handler(ctx, args).await?.into_call_result()
        })
    });

    Ok((tool, erased))
}

fn build_tool(
    name: &str,
    options: impl IntoIterator<Item = ToolOption>,
) -> Result<Tool, ToolError> {
    let mut description = String::new();
    let mut annotations = ToolAnnotations::default();
    let mut params: Vec<ToolParam> = Vec::new();

    for option in options {
        match option {
            ToolOption::Description(d) => description = d,
            ToolOption::Title(t) => annotations.title = Some(t),
            ToolOption::ReadOnlyHint(b) => annotations.read_only_hint = Some(b),
            ToolOption::DestructiveHint(b) => annotations.destructive_hint = Some(b),
            ToolOption::IdempotentHint(b) => annotations.idempotent_hint = Some(b),
            ToolOption::OpenWorldHint(b) => annotations.open_world_hint = Some(b),
            ToolOption::Param(param) => {
                if param.name.trim().is_empty() {
                    return Err(ToolError::InvalidDefinition {
                        message: format!("tool '{name}' declares a parameter without a name"),
                    });
                }
                match params.iter_mut().find(|p| p.name == param.name) {
                    Some(existing) => *existing = param,
                    None => params.push(param),
                }
            }
        }
    }

    Ok(Tool {
        name: name.to_string(),
        description,
        input_schema: input_schema(&params),
        annotations,
    })
}

fn input_schema(params: &[ToolParam]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in params {
        let mut property = Map::new();
        property.insert(
            "type".to_string(),
            Value::String(param.kind.schema_type().to_string()),
        );
        if let Some(description) = &param.description {
            property.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        properties.insert(param.name.clone(), Value::Object(property));
        if param.required {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct EchoArgs {
        message: String,
    }

    #[derive(Debug, Serialize)]
    struct Echo {
        message: String,
        backend: Option<String>,
    }

    async fn echo(ctx: RequestContext, args: EchoArgs) -> Result<Structured<Echo>, ToolError> {
        Ok(Structured(Echo {
            message: args.message,
            backend: ctx.backend_url().map(str::to_string),
        }))
    }

    fn context() -> RequestContext {
        RequestContext::default().with_backend("http://oap:12800/graphql", false)
    }

    #[test]
    fn base_options_applied() {
        let (tool, _) = convert_tool("echo", "Echo a message", echo, Vec::new()).unwrap();

        assert_eq!(tool.name, "echo");
        assert_eq!(tool.description, "Echo a message");
        assert_eq!(tool.annotations.title.as_deref(), Some("echo"));
        assert_eq!(tool.annotations.idempotent_hint, Some(true));
        assert_eq!(tool.annotations.read_only_hint, None);
        assert_eq!(tool.input_schema, json!({"type": "object", "properties": {}}));
    }

    #[test]
    fn caller_options_override() {
        let (tool, _) = convert_tool(
            "echo",
            "Echo a message",
            echo,
            vec![
                ToolOption::Title("Echo it back".to_string()),
                ToolOption::IdempotentHint(false),
                ToolOption::ReadOnlyHint(true),
                ToolParam::string("message")
                    .required()
                    .description("Text to echo")
                    .into(),
            ],
        )
        .unwrap();

        assert_eq!(tool.annotations.title.as_deref(), Some("Echo it back"));
        assert_eq!(tool.annotations.idempotent_hint, Some(false));
        assert!(tool.is_read_only());
        assert_eq!(
            tool.input_schema,
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Text to echo"}
                },
                "required": ["message"]
            })
        );
    }

    #[test]
    fn redeclared_param_replaces_earlier() {
        let (tool, _) = convert_tool(
            "echo",
            "Echo a message",
            echo,
            vec![
                ToolParam::number("message").required().into(),
                ToolParam::string("message").into(),
            ],
        )
        .unwrap();

        assert_eq!(
            tool.input_schema,
            json!({"type": "object", "properties": {"message": {"type": "string"}}})
        );
    }

    #[test]
    fn rejects_empty_name_and_description() {
        assert!(matches!(
            convert_tool("", "desc", echo, Vec::new()),
            Err(ToolError::InvalidDefinition { .. })
        ));
        assert!(matches!(
            convert_tool("echo", "  ", echo, Vec::new()),
            Err(ToolError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn rejects_unnamed_param() {
        let result = convert_tool(
            "echo",
            "Echo a message",
            echo,
            vec![ToolParam::boolean("").into()],
        );
        assert!(matches!(result, Err(ToolError::InvalidDefinition { .. })));
    }

    #[tokio::test]
    async fn structured_output_is_compact_json_text() {
        let (_, handler) = convert_tool("echo", "Echo a message", echo, Vec::new()).unwrap();

        let result = handler(context(), json!({"message": "hi"})).await.unwrap();

        assert_eq!(
            result,
            CallToolResult::text(r#"{"message":"hi","backend":"http://oap:12800/graphql"}"#)
        );
    }

    #[tokio::test]
    async fn missing_field_is_binding_error() {
        let (_, handler) = convert_tool("echo", "Echo a message", echo, Vec::new()).unwrap();

        let err = handler(context(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Binding { ref tool, .. } if tool == "echo"));
        assert!(err.to_string().contains("message"));
    }

    #[tokio::test]
    async fn null_arguments_bind_as_empty_object() {
        #[derive(Deserialize)]
        struct NoArgs {}

        let (_, handler) = convert_tool(
            "noop",
            "Does nothing",
            |_ctx, _args: NoArgs| async { Ok::<_, ToolError>(()) },
            Vec::new(),
        )
        .unwrap();

        let result = handler(context(), Value::Null).await.unwrap();
        assert_eq!(result, CallToolResult::empty());
    }

    #[tokio::test]
    async fn native_result_passes_through() {
        let (_, handler) = convert_tool(
            "native",
            "Returns a native result",
            |_ctx, _args: Value| async { Ok::<_, ToolError>(CallToolResult::error("no such trace")) },
            Vec::new(),
        )
        .unwrap();

        let result = handler(context(), json!({})).await.unwrap();
        assert_eq!(result, CallToolResult::error("no such trace"));

        let (_, boxed) = convert_tool(
            "boxed",
            "Returns a boxed native result",
            |_ctx, _args: Value| async {
                Ok::<_, ToolError>(Box::new(CallToolResult::text("boxed")))
            },
            Vec::new(),
        )
        .unwrap();
        let result = boxed(context(), json!({})).await.unwrap();
        assert_eq!(result, CallToolResult::text("boxed"));
    }

    #[tokio::test]
    async fn none_is_empty_success() {
        let (_, handler) = convert_tool(
            "maybe",
            "Maybe returns something",
            |_ctx, _args: Value| async { Ok::<_, ToolError>(None::<Structured<u32>>) },
            Vec::new(),
        )
        .unwrap();

        let result = handler(context(), json!({})).await.unwrap();
        assert!(result.content.is_empty());
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn handler_error_is_verbatim() {
        let (_, handler) = convert_tool(
            "fails",
            "Always fails",
            |_ctx, _args: Value| async { Err::<(), _>(ToolError::execution("backend down")) },
            Vec::new(),
        )
        .unwrap();

        let err = handler(context(), json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "backend down");
    }

    #[tokio::test]
    async fn unserialisable_output_is_serialization_error() {
        let (_, handler) = convert_tool(
            "bad",
            "Returns a map with non-string keys",
            |_ctx, _args: Value| async {
                let mut map = BTreeMap::new();
                map.insert((1, 2), "pair");
                Ok::<_, ToolError>(Structured(map))
            },
            Vec::new(),
        )
        .unwrap();

        let err = handler(context(), json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Serialization(_)));
    }

    #[tokio::test]
    async fn definition_converts() {
        let definition = ToolDefinition::new("echo", "Echo a message", echo, Vec::new());
        assert_eq!(definition.name(), "echo");

        let (tool, handler) = definition.convert().unwrap();
        assert_eq!(tool.name, "echo");
        let result = handler(context(), json!({"message": "again"})).await.unwrap();
        assert_eq!(result.content.len(), 1);
    }
}
