use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use strum::EnumString;
use tokio::task::JoinSet;

use crate::config::{Config, TelegramConfig};
use crate::metrics::{MetricsSource, OpenTsdbClient};
use crate::service::{RenderedReport, ReportFormat, ReportService};
use crate::window::build_window;

const TELEGRAM_API: &str = "https://api.telegram.org";
const PHOTO_NAME: &str = "z.png";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub type ChatId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum BotCommand {
    #[strum(serialize = "/followers_txt")]
    FollowersText,
    #[strum(serialize = "/followers")]
    FollowersImage,
}

impl BotCommand {
    /// Case-insensitive; accepts the `/command@botname` form used in groups.
    pub fn parse(text: &str) -> Option<Self> {
        let lowered = text.trim().to_lowercase();
        let command = lowered.split('@').next().unwrap_or_default();
        command.parse().ok()
    }

    pub fn format(self) -> ReportFormat {
        match self {
            BotCommand::FollowersText => ReportFormat::Text,
            BotCommand::FollowersImage => ReportFormat::Image,
        }
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Outbound side of the chat platform.
pub trait ChatTransport: Send + Sync {
    fn send_text(&self, chat_id: ChatId, html: &str) -> impl Future<Output = Result<()>> + Send;

    fn send_photo(
        &self,
        chat_id: ChatId,
        file_name: &str,
        png: Vec<u8>,
    ) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("{TELEGRAM_API}/bot{}", config.token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response: ApiResponse<T> = request.send().await?.json().await?;
        if !response.ok {
            bail!(
                "Telegram API error: {}",
                response.description.unwrap_or_default()
            );
        }
        response.result.context("Telegram API returned no result")
    }

    /// Long-poll for updates starting at `offset`, waiting at most `wait`.
    pub async fn get_updates(&self, offset: i64, wait: Duration) -> Result<Vec<Update>> {
        let request = self
            .http
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset), ("timeout", wait.as_secs() as i64)])
            .timeout(wait + SEND_TIMEOUT);
        self.call(request).await
    }
}

impl ChatTransport for TelegramClient {
    async fn send_text(&self, chat_id: ChatId, html: &str) -> Result<()> {
        let request = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&json!({ "chat_id": chat_id, "text": html, "parse_mode": "HTML" }))
            .timeout(SEND_TIMEOUT);
        self.call::<Value>(request).await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, file_name: &str, png: Vec<u8>) -> Result<()> {
        let photo = reqwest::multipart::Part::bytes(png)
            .file_name(file_name.to_string())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);
        let request = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .timeout(SEND_TIMEOUT);
        self.call::<Value>(request).await?;
        Ok(())
    }
}

pub struct CommandHandler<S, T> {
    service: Arc<ReportService<S>>,
    transport: Arc<T>,
    weeks_ago: i64,
}

impl<S, T> CommandHandler<S, T>
where
    S: MetricsSource + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(service: Arc<ReportService<S>>, transport: Arc<T>, weeks_ago: i64) -> Self {
        Self {
            service,
            transport,
            weeks_ago,
        }
    }

    /// Answer one message. Returns whether it was a recognised command.
    pub async fn handle(&self, message: &Message) -> Result<bool> {
        let chat_id = message.chat.id;
        debug!("Message from {} chat {chat_id}", message.chat.kind);
        let Some(command) = message.text.as_deref().and_then(BotCommand::parse) else {
            return Ok(false);
        };
        info!("{command:?} requested in chat {chat_id}");

        let report = self
            .service
            .build_report(self.weeks_ago, command.format())
            .await?;
        match report {
            RenderedReport::Text(text) => {
                let html = format!("<pre>{}</pre>", escape_html(&text));
                self.transport.send_text(chat_id, &html).await?;
            }
            RenderedReport::Image(png) => {
                self.transport.send_photo(chat_id, PHOTO_NAME, png).await?;
            }
        }
        Ok(true)
    }
}

/// Offset that confirms every update in `backlog`.
pub fn resume_offset(backlog: &[Update]) -> i64 {
    backlog
        .iter()
        .map(|update| update.update_id + 1)
        .max()
        .unwrap_or(0)
}

/// Spawn one task per message into `tasks` and return the next polling offset.
pub fn dispatch<S, T>(
    handler: &Arc<CommandHandler<S, T>>,
    updates: Vec<Update>,
    offset: i64,
    tasks: &mut JoinSet<()>,
) -> i64
where
    S: MetricsSource + 'static,
    T: ChatTransport + 'static,
{
    let next_offset = offset.max(resume_offset(&updates));
    for update in updates {
        let Some(message) = update.message else {
            continue;
        };
        let handler = Arc::clone(handler);
        tasks.spawn(async move {
            if let Err(err) = handler.handle(&message).await {
                error!("Failed to answer chat {}: {err:#}", message.chat.id);
            }
        });
    }
    next_offset
}

/// Poll Telegram and answer commands until Ctrl-C.
pub async fn run_bot(config: &Config) -> Result<()> {
    config.require_telegram()?;
    build_window(config.report.weeks_ago)?;

    let source = OpenTsdbClient::new(&config.metrics)?;
    let service =
        Arc::new(ReportService::new(source).with_font_family(&config.report.font_family));
    let telegram = Arc::new(TelegramClient::new(&config.telegram)?);
    let handler = Arc::new(CommandHandler::new(
        service,
        Arc::clone(&telegram),
        config.report.weeks_ago,
    ));

    // Commands sent while the bot was offline are confirmed, not answered.
    let mut offset = match telegram.get_updates(-1, Duration::ZERO).await {
        Ok(backlog) => resume_offset(&backlog),
        Err(err) => {
            warn!("Could not skip pending updates: {err:#}");
            0
        }
    };

    info!("Listening ...");
    let poll_timeout = Duration::from_secs(config.telegram.poll_timeout_secs);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down, waiting for {} report(s) in flight", in_flight.len());
                while in_flight.join_next().await.is_some() {}
                return Ok(());
            }
            Some(finished) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = finished {
                    error!("Report task failed: {err}");
                }
            }
            polled = telegram.get_updates(offset, poll_timeout) => match polled {
                Ok(updates) => {
                    offset = dispatch(&handler, updates, offset, &mut in_flight);
                }
                Err(err) => {
                    warn!("getUpdates failed: {err:#}");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}
