//! Window, notification, and process-lifecycle hooks of the host application.

use anyhow::Result;
use async_trait::async_trait;

/// Host application services the session calls into.
#[async_trait]
pub trait AppShell: Send + Sync {
    /// Whether the main window currently has focus.
    async fn is_focused(&self) -> Result<bool>;

    async fn notify(&self, title: &str, body: &str) -> Result<()>;

    /// Restarts the application.
    async fn relaunch(&self) -> Result<()>;

    /// Exits the application with `code`.
    async fn exit(&self, code: i32) -> Result<()>;

    /// Registers or unregisters the application to start with the system.
    async fn set_auto_start(&self, enabled: bool) -> Result<()>;
}

/// Shell for running without a UI: always focused, never notifies,
/// and leaves process lifecycle to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessShell;

#[async_trait]
impl AppShell for HeadlessShell {
    async fn is_focused(&self) -> Result<bool> {
        Ok(true)
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!(title, body, "notification");
        Ok(())
    }

    async fn relaunch(&self) -> Result<()> {
        tracing::info!("relaunch requested");
        Ok(())
    }

    async fn exit(&self, code: i32) -> Result<()> {
        tracing::info!(code, "exit requested");
        Ok(())
    }

    async fn set_auto_start(&self, enabled: bool) -> Result<()> {
        tracing::debug!(enabled, "auto start ignored without a desktop shell");
        Ok(())
    }
}
