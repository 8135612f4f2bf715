//! Custom function registration ahead of rule evaluation.

use std::future::Future;

use forms_common::FormsError;

/// Loads the custom functions module a form's rules reference into the
/// rule engine.
pub trait FunctionRegistrar {
    /// Load the module at `path`, resolved against `code_base_path` when given.
    fn register(
        &self,
        path: &str,
        code_base_path: Option<&str>,
    ) -> impl Future<Output = Result<(), FormsError>>;
}

/// Registrar for native hosts, whose models carry their functions compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRegistrar;

impl BuiltinRegistrar {
    pub fn new() -> Self {
        Self
    }
}

impl FunctionRegistrar for BuiltinRegistrar {
    async fn register(&self, path: &str, code_base_path: Option<&str>) -> Result<(), FormsError> {
        tracing::debug!(path, ?code_base_path, "native build: no module to load");
        Ok(())
    }
}

/// Outcome of the worker's single registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Registration {
    #[default]
    Pending,
    Ready,
    /// Nothing that needs the rule engine can run any more.
    Failed,
}

impl Registration {
    pub fn is_pending(&self) -> bool {
        matches!(self, Registration::Pending)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Registration::Ready)
    }
}
