// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! NutriGame: gamified healthy-eating missions for squads
//!
//! This crate provides the backend API: daily missions that earn XP, levels
//! and streaks, a daily completion bonus, weekly squad leaderboards and the
//! scheduled jobs that roll them over.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{Db, DocumentStore};
use services::{
    CodeGenerator, MissionLedger, Notifier, PushDispatcher, RankingService, ScheduledJobs,
    SquadRegistry, UserService,
};
use std::sync::Arc;
use time_utils::Clock;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub clock: Arc<dyn Clock>,
    pub notifier: Notifier,
    pub missions: MissionLedger,
    pub ranking: RankingService,
    pub squads: SquadRegistry,
    pub users: UserService,
    pub jobs: ScheduledJobs,
}

impl AppState {
    /// Wire every service onto one store, clock and push dispatcher.
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<dyn PushDispatcher>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        let db = Db::new(store, config.retry_policy());
        let notifier = Notifier::new(dispatcher);
        let ranking = RankingService::new(db.clone(), clock.clone(), config.ranking_page_size);
        let missions = MissionLedger::new(
            db.clone(),
            clock.clone(),
            ranking.clone(),
            notifier.clone(),
        );
        let squads = SquadRegistry::new(
            db.clone(),
            clock.clone(),
            codes,
            config.squad_max_members,
        );
        let users = UserService::new(db.clone(), clock.clone(), squads.clone());
        let jobs = ScheduledJobs::new(db.clone(), clock.clone(), ranking.clone(), notifier.clone());

        Self {
            config,
            db,
            clock,
            notifier,
            missions,
            ranking,
            squads,
            users,
            jobs,
        }
    }
}
