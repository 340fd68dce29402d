//! Semantic classification of a span

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Start,
    Service,
    Endpoint,
    Database,
    DatabaseStatement,
    Queue,
    QueueConsumer,
    Actor,
    Workflow,
    Activity,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Service => "service",
            Self::Endpoint => "endpoint",
            Self::Database => "database",
            Self::DatabaseStatement => "database_statement",
            Self::Queue => "queue",
            Self::QueueConsumer => "queue_consumer",
            Self::Actor => "actor",
            Self::Workflow => "workflow",
            Self::Activity => "activity",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallKind {
    Sync,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

/// A detected component, unique by id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub group_id: String,
    pub kind: ComponentKind,
    pub stack: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanDescription {
    /// `group:component`
    pub id: String,
    pub group: Group,
    pub component: Component,
    pub operation: String,
    pub response: String,
    pub call_kind: CallKind,
    pub is_client: bool,
}

impl SpanDescription {
    /// Build a description.
    ///
    /// A service without a group becomes its own group with an `Internal`
    /// component. The id is taken before an empty component name is
    /// replaced by `Unknown`.
    pub fn new(
        group: impl Into<String>,
        component: impl Into<String>,
        operation: impl Into<String>,
        kind: ComponentKind,
        call_kind: CallKind,
    ) -> Self {
        let mut group = group.into();
        let mut component = component.into();

        if kind == ComponentKind::Service && group.is_empty() {
            group = component;
            component = "Internal".to_string();
        }

        let id = format!("{}:{}", group, component);
        if component.is_empty() {
            component = "Unknown".to_string();
        }

        Self {
            component: Component {
                id: id.clone(),
                name: component,
                group_id: group.clone(),
                kind,
                stack: String::new(),
            },
            group: Group {
                id: group.clone(),
                name: group,
            },
            id,
            operation: operation.into(),
            response: String::new(),
            call_kind,
            is_client: false,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.component.stack = stack.into();
        self
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = response.into();
        self
    }

    pub fn client(mut self, is_client: bool) -> Self {
        self.is_client = is_client;
        self
    }
}
