//! Desktop shell bridge.
//!
//! The packaged desktop app talks to the backend through three window
//! messages (`minimize`, `maximize`, `close`) and a notification bridge.
//! The real window is owned by the desktop runtime and reached through
//! [`WindowHandle`]; [`HeadlessWindow`] keeps the same state in memory for
//! server deployments and tests.

use crate::errors::ServiceError;
use async_trait::async_trait;
use axum::{
    extract::Request,
    http::Method,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumString};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

const RECENT_NOTIFICATIONS: usize = 50;

/// Inter-process message sent by the window chrome
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct IpcMessage {
    pub channel: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ShellCommand {
    Minimize,
    Maximize,
    Close,
}

impl TryFrom<&IpcMessage> for ShellCommand {
    type Error = ServiceError;

    fn try_from(message: &IpcMessage) -> Result<Self, Self::Error> {
        ShellCommand::from_str(message.channel.trim()).map_err(|_| {
            ServiceError::ValidationError(format!("unknown IPC channel: {}", message.channel))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WindowState {
    pub minimized: bool,
    pub maximized: bool,
    pub closed: bool,
}

#[async_trait]
pub trait WindowHandle: Send + Sync {
    async fn minimize(&self);
    /// Maximizes, or restores when already maximized
    async fn toggle_maximize(&self);
    async fn close(&self);
    async fn state(&self) -> WindowState;
}

#[derive(Debug, Default)]
pub struct HeadlessWindow {
    state: RwLock<WindowState>,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WindowHandle for HeadlessWindow {
    async fn minimize(&self) {
        self.state.write().await.minimized = true;
    }

    async fn toggle_maximize(&self) {
        let mut state = self.state.write().await;
        state.maximized = !state.maximized;
        state.minimized = false;
    }

    async fn close(&self) {
        self.state.write().await.closed = true;
    }

    async fn state(&self) -> WindowState {
        *self.state.read().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShellSnapshot {
    pub window: WindowState,
    pub notifications: Vec<Notification>,
}

/// Window control plus the notification bridge
pub struct Shell {
    window: Arc<dyn WindowHandle>,
    notifications: broadcast::Sender<Notification>,
    recent: RwLock<VecDeque<Notification>>,
}

impl Shell {
    pub fn new(window: Arc<dyn WindowHandle>) -> Self {
        let (notifications, _) = broadcast::channel(64);
        Self {
            window,
            notifications,
            recent: RwLock::new(VecDeque::with_capacity(RECENT_NOTIFICATIONS)),
        }
    }

    pub fn headless() -> Self {
        Self::new(Arc::new(HeadlessWindow::new()))
    }

    /// Applies a window command and returns the resulting state
    pub async fn dispatch(&self, command: ShellCommand) -> Result<WindowState, ServiceError> {
        if self.window.state().await.closed {
            return Err(ServiceError::InvalidOperation("window is closed".into()));
        }

        info!(command = %command, "shell command");
        match command {
            ShellCommand::Minimize => self.window.minimize().await,
            ShellCommand::Maximize => self.window.toggle_maximize().await,
            ShellCommand::Close => self.window.close().await,
        }
        Ok(self.window.state().await)
    }

    pub async fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => warn!(title = %notification.title, "{}", notification.body),
            _ => info!(title = %notification.title, "{}", notification.body),
        }

        {
            let mut recent = self.recent.write().await;
            if recent.len() == RECENT_NOTIFICATIONS {
                recent.pop_front();
            }
            recent.push_back(notification.clone());
        }

        // no subscribers is fine
        if self.notifications.send(notification).is_err() {
            debug!("no shell notification subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    pub async fn snapshot(&self) -> ShellSnapshot {
        ShellSnapshot {
            window: self.window.state().await,
            notifications: self.recent.read().await.iter().cloned().collect(),
        }
    }
}

/// Forwards a toast to the shell for every API write that fails
pub async fn write_feedback_middleware(request: Request, next: Next) -> Response {
    let shell = request.extensions().get::<Arc<Shell>>().cloned();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let is_write = matches!(
        method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    let status = response.status();
    if let (Some(shell), true) = (shell, is_write) {
        if status.is_client_error() || status.is_server_error() {
            shell
                .notify(Notification::new(
                    NotificationLevel::Error,
                    "Operation failed",
                    format!("{} {} returned {}", method, path, status),
                ))
                .await;
        }
    }

    response
}
