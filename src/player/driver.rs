//! Task that owns a controller and serializes everything sent to it

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::controller::{MediaSource, PlaybackController, ResumeChoice, Wakeup};
use super::session::PlaybackSession;
use super::surface::PlaybackSurface;
use crate::types::WholeSeconds;

/// Requests accepted by a running player.
#[derive(Debug)]
pub enum PlayerCommand {
    LoadSource(MediaSource),
    SetSavedProgress(WholeSeconds),
    Play,
    TogglePlay,
    Pause,
    ResolveResumePrompt(ResumeChoice),
    DismissResumePrompt,
    Seek(f64),
    Skip(f64),
    SkipForward,
    SkipBack,
    SetVolume(f64),
    ToggleMute,
    ToggleFullscreen,
    Interact,
    PointerLeft,
    BeforeUnload,
    Snapshot(oneshot::Sender<PlaybackSession>),
    Dispose,
}

/// Cloneable remote control of a spawned player.
///
/// All methods return immediately. Once the player has stopped they do
/// nothing.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerCommand>,
}

impl PlayerHandle {
    fn send(&self, command: PlayerCommand) {
        if let Err(e) = self.tx.send(command) {
            debug!("Player stopped, dropping {:?}", e.0);
        }
    }

    pub fn load_source(&self, source: MediaSource) {
        self.send(PlayerCommand::LoadSource(source));
    }

    pub fn set_saved_progress(&self, seconds: WholeSeconds) {
        self.send(PlayerCommand::SetSavedProgress(seconds));
    }

    pub fn play(&self) {
        self.send(PlayerCommand::Play);
    }

    pub fn toggle_play(&self) {
        self.send(PlayerCommand::TogglePlay);
    }

    pub fn pause(&self) {
        self.send(PlayerCommand::Pause);
    }

    pub fn resolve_resume_prompt(&self, choice: ResumeChoice) {
        self.send(PlayerCommand::ResolveResumePrompt(choice));
    }

    pub fn dismiss_resume_prompt(&self) {
        self.send(PlayerCommand::DismissResumePrompt);
    }

    pub fn seek(&self, seconds: f64) {
        self.send(PlayerCommand::Seek(seconds));
    }

    pub fn skip(&self, delta_seconds: f64) {
        self.send(PlayerCommand::Skip(delta_seconds));
    }

    pub fn skip_forward(&self) {
        self.send(PlayerCommand::SkipForward);
    }

    pub fn skip_back(&self) {
        self.send(PlayerCommand::SkipBack);
    }

    pub fn set_volume(&self, volume: f64) {
        self.send(PlayerCommand::SetVolume(volume));
    }

    pub fn toggle_mute(&self) {
        self.send(PlayerCommand::ToggleMute);
    }

    pub fn toggle_fullscreen(&self) {
        self.send(PlayerCommand::ToggleFullscreen);
    }

    pub fn interact(&self) {
        self.send(PlayerCommand::Interact);
    }

    pub fn pointer_left(&self) {
        self.send(PlayerCommand::PointerLeft);
    }

    pub fn before_unload(&self) {
        self.send(PlayerCommand::BeforeUnload);
    }

    /// Current session state, or `None` once the player has stopped.
    pub async fn snapshot(&self) -> Option<PlaybackSession> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(PlayerCommand::Snapshot(tx)).ok()?;
        rx.await.ok()
    }

    /// Dispose the controller and stop the task.
    pub fn dispose(&self) {
        self.send(PlayerCommand::Dispose);
    }

    /// Whether the player task is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

enum Step {
    Command(Option<PlayerCommand>),
    Wakeup(Wakeup),
}

/// Run `controller` on its own task.
///
/// The task stops, disposing the controller, on [`PlayerHandle::dispose`]
/// or once every handle is dropped.
pub fn spawn_player<S>(controller: PlaybackController<S>) -> (PlayerHandle, JoinHandle<()>)
where
    S: PlaybackSurface + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(controller, rx));
    (PlayerHandle { tx }, task)
}

async fn run<S: PlaybackSurface>(
    mut controller: PlaybackController<S>,
    mut commands: mpsc::UnboundedReceiver<PlayerCommand>,
) {
    loop {
        let step = tokio::select! {
            command = commands.recv() => Step::Command(command),
            wakeup = controller.next_wakeup() => Step::Wakeup(wakeup),
        };

        match step {
            Step::Command(None | Some(PlayerCommand::Dispose)) => break,
            Step::Command(Some(command)) => apply(&mut controller, command),
            Step::Wakeup(wakeup) => controller.handle_wakeup(wakeup),
        }
    }

    controller.dispose();
    debug!("Player task finished");
}

fn apply<S: PlaybackSurface>(controller: &mut PlaybackController<S>, command: PlayerCommand) {
    match command {
        PlayerCommand::LoadSource(source) => controller.load_source(source),
        PlayerCommand::SetSavedProgress(seconds) => controller.set_saved_progress(seconds),
        PlayerCommand::Play => controller.request_play(),
        PlayerCommand::TogglePlay => controller.toggle_play(),
        PlayerCommand::Pause => controller.pause(),
        PlayerCommand::ResolveResumePrompt(choice) => controller.resolve_resume_prompt(choice),
        PlayerCommand::DismissResumePrompt => controller.dismiss_resume_prompt(),
        PlayerCommand::Seek(seconds) => controller.seek(seconds),
        PlayerCommand::Skip(delta) => controller.skip(delta),
        PlayerCommand::SkipForward => controller.skip_forward(),
        PlayerCommand::SkipBack => controller.skip_back(),
        PlayerCommand::SetVolume(volume) => controller.set_volume(volume),
        PlayerCommand::ToggleMute => controller.toggle_mute(),
        PlayerCommand::ToggleFullscreen => controller.toggle_fullscreen(),
        PlayerCommand::Interact => controller.interact(),
        PlayerCommand::PointerLeft => controller.pointer_left(),
        PlayerCommand::BeforeUnload => controller.before_unload(),
        PlayerCommand::Snapshot(reply) => {
            let _ = reply.send(controller.session().clone());
        }
        // Handled by the loop
        PlayerCommand::Dispose => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::player::controller::{PlayerEvent, PlayerTimings};
    use crate::player::session::PlayerPhase;
    use crate::player::testing::{FakeSurface, RecordingSink, SinkCall};

    fn spawn(saved: i64) -> (PlayerHandle, JoinHandle<()>, FakeSurface, RecordingSink, mpsc::UnboundedReceiver<PlayerEvent>) {
        let surface = FakeSurface::new();
        let sink = RecordingSink::default();
        let (controller, events) = PlaybackController::new(
            surface.clone(),
            Arc::new(sink.clone()),
            PlayerTimings::default(),
        );
        let (handle, task) = spawn_player(controller);
        handle.load_source(MediaSource::new("https://cdn.example.com/a.mp4"));
        handle.set_saved_progress(WholeSeconds::new(saved));
        (handle, task, surface, sink, events)
    }

    #[tokio::test]
    async fn test_commands_reach_controller() {
        let (handle, _task, surface, _sink, mut events) = spawn(0);

        handle.play();
        assert_eq!(events.recv().await, Some(PlayerEvent::PlayingChanged(true)));
        assert_eq!(events.recv().await, Some(PlayerEvent::Started));

        let session = handle.snapshot().await.unwrap();
        assert_eq!(session.phase, PlayerPhase::Playing);
        assert_eq!(surface.plays(), 1);
    }

    #[tokio::test]
    async fn test_resume_prompt_round_trip() {
        let (handle, _task, surface, _sink, mut events) = spawn(90);

        handle.play();
        assert_eq!(
            events.recv().await,
            Some(PlayerEvent::ResumePromptShown {
                saved: WholeSeconds::new(90)
            })
        );

        handle.resolve_resume_prompt(ResumeChoice::Resume);
        assert_eq!(events.recv().await, Some(PlayerEvent::PlayingChanged(true)));
        assert_eq!(surface.seeks(), vec![90.0]);
    }

    #[tokio::test]
    async fn test_dismissed_prompt_round_trip() {
        let (handle, _task, surface, _sink, mut events) = spawn(90);

        handle.play();
        assert!(matches!(
            events.recv().await,
            Some(PlayerEvent::ResumePromptShown { .. })
        ));

        handle.dismiss_resume_prompt();
        let session = handle.snapshot().await.unwrap();
        // No metadata has arrived yet
        assert_eq!(session.phase, PlayerPhase::Loading);
        assert!(session.resume_dialog_shown);
        assert_eq!(surface.plays(), 0);
        assert!(surface.seeks().is_empty());
    }

    #[tokio::test]
    async fn test_dispose_stops_task_and_saves() {
        let (handle, task, surface, sink, _events) = spawn(0);
        handle.seek(0.0);
        handle.before_unload();
        assert!(handle.snapshot().await.is_some());

        handle.dispose();
        task.await.unwrap();

        assert!(!handle.is_running());
        assert!(handle.snapshot().await.is_none());
        assert!(!surface.subscribed());
        // before_unload saved; dispose skipped since nothing was watched
        assert_eq!(sink.calls(), vec![SinkCall::Save(0.0, 0.0)]);
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_task() {
        let (handle, task, surface, _sink, _events) = spawn(0);
        drop(handle);
        task.await.unwrap();
        assert!(!surface.subscribed());
    }
}
