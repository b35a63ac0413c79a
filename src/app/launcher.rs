use std::process::{Command as ProcessCommand, ExitStatus, Stdio};

use anyhow::{Context, Result, anyhow};
use log::info;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use super::episode::Episode;
use super::player::PlaybackQueueController;

/// Something that can play one episode to completion.
pub(crate) trait MediaLauncher {
    /// Returns `Ok(false)` when playback was interrupted or failed.
    fn play(&mut self, episode: &Episode) -> Result<bool>;
}

/// Runs a configured player command with the episode URL appended.
#[derive(Debug, Clone)]
pub(crate) struct ExternalPlayer {
    command: Vec<String>,
}

impl ExternalPlayer {
    pub(crate) fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    pub(crate) fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }
}

impl MediaLauncher for ExternalPlayer {
    fn play(&mut self, episode: &Episode) -> Result<bool> {
        let mut cmd = build_player_command(&self.command, &episode.url)?;
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let status = with_sigint_ignored(|| run_interactive_cmd(cmd, self.program()))?;
        Ok(status.success())
    }
}

pub(crate) fn build_player_command(command: &[String], url: &str) -> Result<ProcessCommand> {
    let Some((program, args)) = command.split_first() else {
        return Err(anyhow!("player_command is empty; set it in the config file"));
    };
    let mut cmd = ProcessCommand::new(program);
    cmd.args(args).arg(url);
    Ok(cmd)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QueueRunOutcome {
    pub(crate) played: usize,
    pub(crate) reached_end: bool,
}

/// Plays from the current entry onwards while the controller says playing.
/// The end of the queue and any interrupted playback stop the run and clear
/// the playing flag.
pub(crate) fn play_through_queue(
    controller: &mut PlaybackQueueController,
    launcher: &mut dyn MediaLauncher,
) -> Result<QueueRunOutcome> {
    let mut played = 0;
    loop {
        let state = controller.state();
        if !state.is_playing {
            return Ok(QueueRunOutcome {
                played,
                reached_end: false,
            });
        }
        let Some(episode) = state.current_episode().cloned() else {
            return Ok(QueueRunOutcome {
                played,
                reached_end: true,
            });
        };

        info!("launching player for {}", episode.title);
        let finished = match launcher.play(&episode) {
            Ok(finished) => finished,
            Err(err) => {
                controller.toggle_playing();
                return Err(err);
            }
        };
        if !finished {
            controller.toggle_playing();
            return Ok(QueueRunOutcome {
                played,
                reached_end: false,
            });
        }

        played += 1;
        if !controller.advance() {
            controller.toggle_playing();
            return Ok(QueueRunOutcome {
                played,
                reached_end: true,
            });
        }
    }
}

#[cfg(unix)]
struct ScopedSigaction {
    signum: libc::c_int,
    old_action: libc::sigaction,
}

#[cfg(unix)]
impl ScopedSigaction {
    fn ignore(signum: libc::c_int) -> Result<Self> {
        unsafe {
            let mut new_action: libc::sigaction = std::mem::zeroed();
            new_action.sa_sigaction = libc::SIG_IGN;
            libc::sigemptyset(&mut new_action.sa_mask);
            new_action.sa_flags = 0;

            let mut old_action: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(signum, &new_action, &mut old_action) != 0 {
                return Err(anyhow!("failed to update signal action for {signum}"));
            }

            Ok(Self { signum, old_action })
        }
    }
}

#[cfg(unix)]
impl Drop for ScopedSigaction {
    fn drop(&mut self) {
        unsafe {
            let _ = libc::sigaction(self.signum, &self.old_action, std::ptr::null_mut());
        }
    }
}

// Hands the terminal to the player's process group and takes it back on drop.
#[cfg(unix)]
struct TerminalForegroundGuard {
    stdin_fd: libc::c_int,
    parent_pgrp: libc::pid_t,
    child_foreground: bool,
}

#[cfg(unix)]
impl TerminalForegroundGuard {
    fn new(stdin_fd: libc::c_int, parent_pgrp: libc::pid_t) -> Self {
        Self {
            stdin_fd,
            parent_pgrp,
            child_foreground: false,
        }
    }

    fn handoff_to_child(&mut self, child_pgrp: libc::pid_t) {
        self.child_foreground = unsafe { libc::tcsetpgrp(self.stdin_fd, child_pgrp) == 0 };
    }
}

#[cfg(unix)]
impl Drop for TerminalForegroundGuard {
    fn drop(&mut self) {
        if !self.child_foreground {
            return;
        }
        unsafe {
            let _ = libc::tcsetpgrp(self.stdin_fd, self.parent_pgrp);
        }
    }
}

#[cfg(unix)]
fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    let _sigint_guard = ScopedSigaction::ignore(libc::SIGINT)?;
    f()
}

#[cfg(not(unix))]
fn with_sigint_ignored<F, R>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R>,
{
    f()
}

#[cfg(unix)]
fn run_interactive_cmd(mut cmd: ProcessCommand, program: &str) -> Result<ExitStatus> {
    let stdin_fd = libc::STDIN_FILENO;
    let parent_pgrp = unsafe { libc::tcgetpgrp(stdin_fd) };
    if parent_pgrp == -1 {
        return cmd
            .status()
            .with_context(|| format!("failed to launch {program}"));
    }

    let _sigttou_guard = ScopedSigaction::ignore(libc::SIGTTOU)?;
    let mut terminal_guard = TerminalForegroundGuard::new(stdin_fd, parent_pgrp);

    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_DFL);
            libc::signal(libc::SIGQUIT, libc::SIG_DFL);
            libc::signal(libc::SIGTSTP, libc::SIG_DFL);
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    let child_pgid = child.id() as libc::pid_t;
    terminal_guard.handoff_to_child(child_pgid);
    child
        .wait()
        .with_context(|| format!("failed waiting on {program}"))
}

#[cfg(not(unix))]
fn run_interactive_cmd(mut cmd: ProcessCommand, program: &str) -> Result<ExitStatus> {
    cmd.status()
        .with_context(|| format!("failed to launch {program}"))
}
