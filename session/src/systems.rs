use {
    crate::{
        ActiveSession, AutosaveTimer, LOAD_FAILED_REASON, LoadingProfile, PendingSave, Player,
        ProfileFlushes, SessionError, SessionRegistry, SessionSettings, spawn_release,
    },
    bevy::{
        platform::collections::HashSet,
        prelude::*,
        tasks::{IoTaskPool, block_on, futures_lite::future},
    },
    chrono::Utc,
    profile_store::{ProfileStoreHandle, StoreError},
    progress_components::AccountProgress,
    progression::{apply_account_click, level_progress, validate_progress},
    progression_resources::ProgressionConfig,
    session_events::{
        CandyLeveledUp, ClickRequested, PlayerJoined, PlayerLeft, ProfileLoaded,
        ProfileSaveFailed, SessionRejected, StateUpdated, VisualRefresh,
    },
    std::time::Duration,
};

pub fn start_autosave_timer(mut commands: Commands, settings: Res<SessionSettings>) {
    commands.insert_resource(AutosaveTimer::new(Duration::from_secs_f32(
        settings.autosave_interval_secs,
    )));
}

/// Starts a session for every newly joined player.
///
/// A join from a player whose old session ends later this frame is held
/// until the next frame. The load itself waits for any final save of the
/// same key that is still running.
pub fn begin_sessions(
    mut commands: Commands,
    mut joined: MessageReader<PlayerJoined>,
    mut left: MessageReader<PlayerLeft>,
    mut deferred: Local<Vec<PlayerJoined>>,
    mut registry: ResMut<SessionRegistry>,
    flushes: Res<ProfileFlushes>,
    store: Res<ProfileStoreHandle>,
    settings: Res<SessionSettings>,
) {
    let leaving: HashSet<_> = left
        .read()
        .map(|PlayerLeft { player_id }| *player_id)
        .collect();
    let held_back = std::mem::take(&mut *deferred);

    for join in held_back.into_iter().chain(joined.read().cloned()) {
        let player_id = join.player_id;
        if registry.players.contains_key(&player_id) {
            if leaving.contains(&player_id) {
                debug!(
                    "{} ({player_id}) rejoined before their session ended",
                    join.username
                );
                deferred.push(join);
            } else {
                warn!(
                    "{} ({player_id}) joined twice, keeping the existing session",
                    join.username
                );
            }
            continue;
        }
        let username = join.username;

        let key = player_id.profile_key();
        let task = if flushes.is_pending(&key) {
            debug!("waiting for the final save of {key} before loading");
            None
        } else {
            Some(IoTaskPool::get().spawn(store.load(&key)))
        };
        let entity = commands
            .spawn((
                Player {
                    id: player_id,
                    username: username.clone(),
                    key,
                },
                LoadingProfile {
                    task,
                    timeout: Timer::from_seconds(settings.load_timeout_secs, TimerMode::Once),
                },
            ))
            .id();
        registry.players.insert(player_id, entity);
        debug!("loading profile for {username} ({player_id})");
    }
}

/// Activates sessions whose load resolved, rejects failed or timed out ones.
pub fn resolve_profile_loads(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<ProgressionConfig>,
    store: Res<ProfileStoreHandle>,
    flushes: Res<ProfileFlushes>,
    mut registry: ResMut<SessionRegistry>,
    mut loading: Query<(Entity, &Player, &mut LoadingProfile)>,
    mut state_updated: MessageWriter<StateUpdated>,
    mut visual_refresh: MessageWriter<VisualRefresh>,
    mut rejected: MessageWriter<SessionRejected>,
) {
    for (entity, player, mut load) in &mut loading {
        if load.task.is_none() && !flushes.is_pending(&player.key) {
            load.task = Some(IoTaskPool::get().spawn(store.load(&player.key)));
        }
        let claimed = load.task.is_some();
        let polled = match load.task.as_mut() {
            Some(task) => block_on(future::poll_once(task)),
            None => None,
        };
        let outcome = match polled {
            Some(loaded) => prepare_profile(&config, player, loaded),
            None => {
                if !load.timeout.tick(time.delta()).just_finished() {
                    continue;
                }
                Err(SessionError::LoadTimedOut(load.timeout.duration()))
            }
        };

        match outcome {
            Ok((mut progress, is_new)) => {
                let now = Utc::now();
                progress.player_id = player.id;
                progress.username = player.username.clone();
                progress.stats.last_login = Some(now);

                if is_new {
                    info!("created profile for {} ({})", player.username, player.id);
                } else {
                    info!("loaded data for {} ({})", player.username, player.id);
                }
                debug!(
                    "initial candy state for {}: level {}, points per click {}",
                    player.username, progress.candy.level, progress.candy.points_per_click
                );

                state_updated.write(state_snapshot(&config, &progress));
                visual_refresh.write(VisualRefresh {
                    player_id: player.id,
                    level: progress.candy.level,
                });
                commands.entity(entity).remove::<LoadingProfile>().insert((
                    progress,
                    ActiveSession {
                        started_at: now,
                        dirty: true,
                    },
                ));
                commands.trigger(ProfileLoaded {
                    player_id: player.id,
                    entity,
                    is_new,
                });
            }
            Err(error) => {
                warn!(
                    "rejecting session for {} ({}): {error}",
                    player.username, player.id
                );
                rejected.write(SessionRejected {
                    player_id: player.id,
                    reason: LOAD_FAILED_REASON.to_string(),
                });
                registry.players.remove(&player.id);
                commands.entity(entity).despawn();
                if claimed {
                    spawn_release(&store, &player.key);
                }
            }
        }
    }
}

fn prepare_profile(
    config: &ProgressionConfig,
    player: &Player,
    loaded: Result<Option<AccountProgress>, StoreError>,
) -> Result<(AccountProgress, bool), SessionError> {
    match loaded? {
        Some(progress) => {
            validate_progress(config, &progress)?;
            Ok((progress, false))
        }
        None => Ok((
            AccountProgress::new(
                player.id,
                player.username.clone(),
                config.starting_points_per_click,
                Utc::now(),
            ),
            true,
        )),
    }
}

/// Applies click requests in arrival order. Clicks for players without an
/// active session are dropped.
pub fn apply_clicks(
    mut commands: Commands,
    mut clicks: MessageReader<ClickRequested>,
    registry: Res<SessionRegistry>,
    config: Res<ProgressionConfig>,
    mut sessions: Query<(&mut AccountProgress, &mut ActiveSession)>,
    mut state_updated: MessageWriter<StateUpdated>,
    mut visual_refresh: MessageWriter<VisualRefresh>,
) {
    for ClickRequested { player_id } in clicks.read() {
        let Some(entity) = registry.get(*player_id) else {
            trace!("dropping click from {player_id}: no session");
            continue;
        };
        let Ok((mut progress, mut session)) = sessions.get_mut(entity) else {
            trace!("dropping click from {player_id}: profile still loading");
            continue;
        };

        let outcome = apply_account_click(&config, &mut progress, Utc::now());
        session.dirty = true;
        state_updated.write(state_snapshot(&config, &progress));

        if outcome.level_changed {
            let level = progress.candy.level;
            let reached_max = level >= config.max_level;
            if reached_max {
                info!(
                    "{} reached maximum candy level {level}!",
                    progress.username
                );
            } else {
                info!("{} leveled up to candy level {level}", progress.username);
            }

            visual_refresh.write(VisualRefresh {
                player_id: *player_id,
                level,
            });
            commands.trigger(CandyLeveledUp {
                player_id: *player_id,
                level,
                reached_max,
            });
        }
    }
}

/// Ends sessions of players that left.
///
/// An active profile gets a final save, issued after any in-flight autosave
/// resolves, and is then released. The flush is tracked in
/// [`ProfileFlushes`] until it settles. A pending load is cancelled and its
/// key released.
pub fn end_sessions(
    mut commands: Commands,
    mut left: MessageReader<PlayerLeft>,
    mut registry: ResMut<SessionRegistry>,
    mut flushes: ResMut<ProfileFlushes>,
    store: Res<ProfileStoreHandle>,
    mut sessions: Query<(
        &Player,
        Option<&AccountProgress>,
        Option<&ActiveSession>,
        Option<&mut PendingSave>,
        Option<&LoadingProfile>,
    )>,
) {
    for PlayerLeft { player_id } in left.read() {
        let Some(entity) = registry.players.remove(player_id) else {
            debug!("{player_id} left without a session");
            continue;
        };
        let Ok((player, progress, session, pending, loading)) = sessions.get_mut(entity) else {
            continue;
        };

        match (progress, session) {
            (Some(progress), Some(session)) => {
                let mut last = progress.clone();
                let played = (Utc::now() - session.started_at).num_seconds().max(0) as u64;
                last.stats.playtime_secs = last.stats.playtime_secs.saturating_add(played);

                let in_flight = pending.and_then(|mut pending| pending.0.take());
                let earlier_flush = flushes.pending.remove(&player.key);
                let save = store.save(&player.key, &last);
                let release = store.release(&player.key);
                let key = player.key.clone();
                let flush = IoTaskPool::get().spawn(async move {
                    if let Some(earlier_flush) = earlier_flush {
                        earlier_flush.await;
                    }
                    if let Some(in_flight) = in_flight
                        && let Err(error) = in_flight.await
                    {
                        warn!("autosave for {key} failed: {error}");
                    }
                    if let Err(error) = save.await {
                        error!("final save for {key} failed: {error}");
                    }
                    if let Err(error) = release.await {
                        warn!("failed to release profile {key}: {error}");
                    }
                });
                flushes.pending.insert(player.key.clone(), flush);
                info!("released data for {}", player.username);
            }
            _ => {
                debug!("{} left before their profile loaded", player.username);
                if loading.is_some_and(|loading| loading.task.is_some()) {
                    spawn_release(&store, &player.key);
                }
            }
        }

        commands.entity(entity).despawn();
    }
}

/// Issues a save for every dirty profile each time the autosave timer fires.
pub fn autosave_profiles(
    mut commands: Commands,
    time: Res<Time>,
    mut timer: ResMut<AutosaveTimer>,
    store: Res<ProfileStoreHandle>,
    mut sessions: Query<
        (Entity, &Player, &AccountProgress, &mut ActiveSession),
        Without<PendingSave>,
    >,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }

    for (entity, player, progress, mut session) in &mut sessions {
        if !session.dirty {
            continue;
        }
        session.dirty = false;
        let task = IoTaskPool::get().spawn(store.save(&player.key, progress));
        commands.entity(entity).insert(PendingSave(Some(task)));
        trace!("autosaving {}", player.key);
    }
}

/// Reports resolved autosaves. A failed save leaves the session running.
pub fn poll_pending_saves(
    mut commands: Commands,
    mut saves: Query<(Entity, &Player, &mut PendingSave)>,
) {
    for (entity, player, mut pending) in &mut saves {
        let result = match pending.0.as_mut() {
            Some(task) => match block_on(future::poll_once(task)) {
                Some(result) => result,
                None => continue,
            },
            None => Ok(()),
        };
        commands.entity(entity).remove::<PendingSave>();

        match result {
            Ok(()) => trace!("saved {}", player.key),
            Err(error) => {
                warn!("autosave for {} failed: {error}", player.key);
                commands.trigger(ProfileSaveFailed {
                    player_id: player.id,
                    error: error.to_string(),
                });
            }
        }
    }
}

/// Forgets final saves that have settled, letting their keys load again.
pub fn poll_profile_flushes(mut flushes: ResMut<ProfileFlushes>) {
    flushes.pending.retain(|key, flush| {
        let settled = block_on(future::poll_once(flush)).is_some();
        if settled {
            trace!("final save for {key} settled");
        }
        !settled
    });
}

fn state_snapshot(config: &ProgressionConfig, progress: &AccountProgress) -> StateUpdated {
    StateUpdated {
        player_id: progress.player_id,
        progress: progress.clone(),
        next_level: level_progress(config, &progress.candy),
    }
}
