// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push notifications.
//!
//! Delivery is fire-and-forget: a failed push is logged and never fails the
//! mutation that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{MissionType, User, WeeklyWinner};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("push request failed: {0}")]
    Request(String),

    #[error("push endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Payload handed to the push provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub device_token: String,
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

/// Delivery channel for push messages.
#[async_trait]
pub trait PushDispatcher: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<(), NotifyError>;
}

/// Posts messages as JSON to a push gateway.
#[derive(Clone)]
pub struct HttpPushDispatcher {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPushDispatcher {
    pub fn new(endpoint: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl PushDispatcher for HttpPushDispatcher {
    async fn send(&self, message: &PushMessage) -> Result<(), NotifyError> {
        let mut request = self.http.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected { status, body })
    }
}

/// Logs messages instead of delivering them (no push gateway configured).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl PushDispatcher for LogDispatcher {
    async fn send(&self, message: &PushMessage) -> Result<(), NotifyError> {
        tracing::info!(
            title = %message.title,
            kind = message.data.get("type").map(String::as_str).unwrap_or(""),
            "Push notification (not delivered, no endpoint configured)"
        );
        Ok(())
    }
}

/// A user-facing notification, before it is addressed to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    LevelUp { level: u32 },
    DailyBonus { xp: u32 },
    WeeklyWinner { weekly_xp: u64 },
    MissionReminder { mission_type: MissionType },
    DailySummary { completed: usize, total: usize },
    StreakWarning { streak: u32 },
    Test,
}

impl Notification {
    /// Value of the `type` data field.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::LevelUp { .. } => "level_up",
            Notification::DailyBonus { .. } => "daily_bonus",
            Notification::WeeklyWinner { .. } => "weekly_winner",
            Notification::MissionReminder { .. } => "mission_reminder",
            Notification::DailySummary { .. } => "daily_summary",
            Notification::StreakWarning { .. } => "streak_warning",
            Notification::Test => "test",
        }
    }

    pub fn to_message(&self, device_token: &str) -> PushMessage {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), self.kind().to_string());

        let (title, body) = match self {
            Notification::LevelUp { level } => {
                data.insert("level".to_string(), level.to_string());
                ("Level up!".to_string(), format!("You reached level {level}!"))
            }
            Notification::DailyBonus { xp } => {
                data.insert("xp".to_string(), xp.to_string());
                (
                    "Daily bonus!".to_string(),
                    format!("You completed every mission today and earned +{xp} bonus XP!"),
                )
            }
            Notification::WeeklyWinner { weekly_xp } => (
                "Congratulations, champion!".to_string(),
                format!("You won this week's squad ranking with {weekly_xp} XP!"),
            ),
            Notification::MissionReminder { mission_type } => {
                data.insert("mission_type".to_string(), mission_type.to_string());
                let (title, body) = match mission_type {
                    MissionType::Breakfast => {
                        ("Good morning!", "Log your breakfast and earn 50 XP!")
                    }
                    MissionType::Lunch => ("Lunch time!", "Don't forget to log your lunch!"),
                    MissionType::Dinner => ("Dinner time!", "Complete your dinner mission!"),
                    _ => ("Mission reminder", "You still have missions to complete today."),
                };
                (title.to_string(), body.to_string())
            }
            Notification::DailySummary { completed, total } => {
                let remaining = total.saturating_sub(*completed);
                let mut body = format!(
                    "You completed {completed}/{total} missions. {remaining} to go!"
                );
                if (1..=2).contains(&remaining) {
                    body.push_str(" Finish them for the daily bonus!");
                }
                ("Daily summary".to_string(), body)
            }
            Notification::StreakWarning { streak } => (
                "Your streak is at risk!".to_string(),
                format!("You have a {streak}-day streak. Complete a mission to keep it!"),
            ),
            Notification::Test => (
                "Test notification".to_string(),
                "If you can see this, notifications are working!".to_string(),
            ),
        };

        PushMessage {
            device_token: device_token.to_string(),
            title,
            body,
            data,
        }
    }
}

/// Addresses notifications to users and absorbs delivery failures.
#[derive(Clone)]
pub struct Notifier {
    dispatcher: Arc<dyn PushDispatcher>,
}

impl Notifier {
    pub fn new(dispatcher: Arc<dyn PushDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Send to one user. Returns true when the dispatcher accepted it.
    pub async fn notify(&self, user: &User, notification: &Notification) -> bool {
        if !user.can_receive_push() {
            tracing::debug!(
                user_id = %user.id,
                kind = notification.kind(),
                "Skipping push: notifications disabled or no device token"
            );
            return false;
        }
        let Some(token) = user.device_token.as_deref() else {
            return false;
        };

        match self.dispatcher.send(&notification.to_message(token)).await {
            Ok(()) => {
                tracing::debug!(user_id = %user.id, kind = notification.kind(), "Push sent");
                true
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %user.id,
                    kind = notification.kind(),
                    error = %e,
                    "Push delivery failed"
                );
                false
            }
        }
    }

    pub async fn level_up(&self, user: &User, level: u32) -> bool {
        self.notify(user, &Notification::LevelUp { level }).await
    }

    pub async fn daily_bonus(&self, user: &User, xp: u32) -> bool {
        self.notify(user, &Notification::DailyBonus { xp }).await
    }

    pub async fn weekly_winner(&self, user: &User, winner: &WeeklyWinner) -> bool {
        self.notify(
            user,
            &Notification::WeeklyWinner {
                weekly_xp: winner.weekly_xp,
            },
        )
        .await
    }
}
