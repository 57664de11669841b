//! Watch page wiring
//!
//! Connects one catalog title to a player: loads the saved position, starts
//! the progress worker and the player task, and counts a view each time
//! playback actually starts.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::Movie;
use crate::config::PlaybackConfig;
use crate::db::Database;
use crate::error::Result;
use crate::player::{
    spawn_player, MediaSource, PlaybackController, PlaybackSurface, PlayerEvent, PlayerHandle,
};
use crate::progress::{spawn_progress_worker, ProgressHandle, ProgressStore, ResumePoint};
use crate::types::{MovieId, ViewerId};

/// A mounted player for one title.
#[derive(Debug)]
pub struct WatchPage {
    movie: Movie,
    viewer: Option<ViewerId>,
    resume: ResumePoint,
    player: PlayerHandle,
    progress: ProgressHandle,
    events: mpsc::UnboundedReceiver<PlayerEvent>,
    player_task: JoinHandle<()>,
    progress_task: JoinHandle<()>,
    listener_task: JoinHandle<()>,
}

impl WatchPage {
    /// Mount a player for `movie_id` on `surface`.
    ///
    /// Returns `Ok(None)` when the title does not exist. A title without a
    /// playable source still mounts, but its player stays idle.
    pub async fn open<S>(
        db: &Database,
        viewer: Option<ViewerId>,
        movie_id: &MovieId,
        config: &PlaybackConfig,
        surface: S,
    ) -> Result<Option<Self>>
    where
        S: PlaybackSurface + 'static,
    {
        let Some(movie) = db.get_movie(movie_id).await? else {
            debug!("Movie {} not found", movie_id);
            return Ok(None);
        };

        let store = ProgressStore::new(
            Arc::new(db.clone()),
            viewer.clone(),
            Some(movie.id.clone()),
            config.policy(),
        );
        let resume = store.load_progress().await;
        let (progress, progress_task) = spawn_progress_worker(store);

        let (mut controller, controller_events) =
            PlaybackController::new(surface, Arc::new(progress.clone()), config.timings());
        match movie.playable_url() {
            Some(url) => controller.load_source(
                MediaSource::new(url)
                    .with_poster(movie.poster_url.clone())
                    .with_title(Some(movie.title.clone())),
            ),
            None => warn!("Movie {} has no playable source", movie.id),
        }
        controller.set_saved_progress(resume.progress_seconds());

        let (player, player_task) = spawn_player(controller);

        let (forward, events) = mpsc::unbounded_channel();
        let listener_task = tokio::spawn(listen(
            db.clone(),
            movie.id.clone(),
            controller_events,
            forward,
        ));

        info!(
            "Opened \"{}\" for {}",
            movie.title,
            viewer.as_ref().map_or("anonymous viewer", ViewerId::as_str)
        );

        Ok(Some(Self {
            movie,
            viewer,
            resume,
            player,
            progress,
            events,
            player_task,
            progress_task,
            listener_task,
        }))
    }

    #[must_use]
    pub const fn movie(&self) -> &Movie {
        &self.movie
    }

    #[must_use]
    pub const fn viewer(&self) -> Option<&ViewerId> {
        self.viewer.as_ref()
    }

    /// Saved position found when the page was opened.
    #[must_use]
    pub const fn resume_point(&self) -> &ResumePoint {
        &self.resume
    }

    /// Whether the title has a source the player could bind.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.movie.playable_url().is_some()
    }

    #[must_use]
    pub const fn player(&self) -> &PlayerHandle {
        &self.player
    }

    /// Next notification from the player; `None` once it has stopped.
    pub async fn next_event(&mut self) -> Option<PlayerEvent> {
        self.events.recv().await
    }

    /// Unmount the player and wait until its final save has landed.
    pub async fn close(self) {
        let Self {
            player,
            progress,
            player_task,
            progress_task,
            listener_task,
            ..
        } = self;

        player.dispose();
        if let Err(e) = player_task.await {
            warn!("Player task failed: {}", e);
        }
        progress.flush().await;
        drop(progress);

        if let Err(e) = progress_task.await {
            warn!("Progress worker failed: {}", e);
        }
        if let Err(e) = listener_task.await {
            warn!("Event listener failed: {}", e);
        }
    }
}

async fn listen(
    db: Database,
    movie: MovieId,
    mut events: mpsc::UnboundedReceiver<PlayerEvent>,
    forward: mpsc::UnboundedSender<PlayerEvent>,
) {
    while let Some(event) = events.recv().await {
        if event == PlayerEvent::Started {
            match db.increment_view_count(&movie).await {
                Ok(true) => debug!("Counted a view of {}", movie),
                Ok(false) => warn!("Movie {} vanished before its view was counted", movie),
                Err(e) => warn!("Failed to count view of {}: {}", movie, e),
            }
        }
        let _ = forward.send(event);
    }
}
