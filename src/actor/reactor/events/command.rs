use std::ops::ControlFlow;

use tracing::{debug, info, trace};

use crate::actor::reactor::{Command, Reactor};
use crate::common::config::Action;
use crate::common::util;
use crate::layout_engine::Direction;
use crate::sys::display::Display;

pub struct CommandEventHandler;

impl CommandEventHandler {
    /// Runs the first binding matching the key event, if any.
    pub fn handle_key_press<D: Display>(
        reactor: &mut Reactor<D>,
        keycode: u8,
        state: u16,
    ) -> ControlFlow<()> {
        let binding = reactor
            .config
            .keys
            .iter()
            .find(|(hotkey, _)| hotkey.matches(&reactor.keymap, keycode, state))
            .map(|(hotkey, action)| (*hotkey, action.clone()));
        let Some((hotkey, action)) = binding else {
            trace!(keycode, state, "No binding for key");
            return ControlFlow::Continue(());
        };
        debug!(%hotkey, ?action, "Key binding fired");
        match action {
            Action::Command(cmd) => Self::handle_command(reactor, cmd),
            Action::Program(program) => {
                util::spawn_program(&program);
                ControlFlow::Continue(())
            }
        }
    }

    pub fn handle_command<D: Display>(reactor: &mut Reactor<D>, cmd: Command) -> ControlFlow<()> {
        info!(?cmd, "Running command");
        match cmd {
            Command::Shutdown => {
                Self::shutdown(reactor);
                return ControlFlow::Break(());
            }
            Command::CloseWindow => Self::close_window(reactor),
            Command::SwitchTilingMode => Self::switch_tiling_mode(reactor),
            Command::MoveWindowLeft => Self::move_window(reactor, Direction::Left),
            Command::MoveWindowRight => Self::move_window(reactor, Direction::Right),
            Command::MoveWindowUp => Self::move_window(reactor, Direction::Up),
            Command::MoveWindowDown => Self::move_window(reactor, Direction::Down),
            Command::MoveFocusLeft => Self::move_focus(reactor, Direction::Left),
            Command::MoveFocusRight => Self::move_focus(reactor, Direction::Right),
            Command::MoveFocusUp => Self::move_focus(reactor, Direction::Up),
            Command::MoveFocusDown => Self::move_focus(reactor, Direction::Down),
            Command::SwitchWorkspaceLeft => {
                reactor.workspaces.move_left(&mut reactor.display, &mut reactor.focused)
            }
            Command::SwitchWorkspaceRight => {
                reactor.workspaces.move_right(&mut reactor.display, &mut reactor.focused)
            }
            Command::SwitchWorkspace(index) => {
                reactor.workspaces.move_to(index, &mut reactor.display, &mut reactor.focused)
            }
            Command::DumpTree => info!(
                "Workspace {}:\n{}",
                reactor.workspaces.active_index(),
                reactor.workspaces.current().draw_trees()
            ),
        }
        ControlFlow::Continue(())
    }

    /// Destroys every window of the current workspace. Other workspaces are
    /// left alone.
    fn shutdown<D: Display>(reactor: &mut Reactor<D>) {
        let mut closed = 0;
        for screen in &mut reactor.workspaces.current_mut().screens {
            closed += screen.close_all_windows(&mut reactor.display).len();
        }
        reactor.focused = None;
        info!(closed, "Shutting down");
    }

    fn close_window<D: Display>(reactor: &mut Reactor<D>) {
        let Some(wid) = reactor.focused else {
            debug!("No focused window to close");
            return;
        };
        reactor.display.destroy(wid);
        reactor.forget_window(wid);
    }

    fn switch_tiling_mode<D: Display>(reactor: &mut Reactor<D>) {
        let focused = reactor.focused;
        let workspace = reactor.workspaces.current_mut();
        let index = focused.and_then(|wid| workspace.screen_of(wid)).unwrap_or(0);
        if let Some(screen) = workspace.screens.get_mut(index) {
            screen.switch_tiling_mode(&mut reactor.display, focused);
        }
    }

    fn move_window<D: Display>(reactor: &mut Reactor<D>, direction: Direction) {
        let moved = reactor.with_focused_screen(|screen, display, wid| {
            screen.paint(display, Some(wid), |tree, p| tree.move_window(wid, direction, p))
        });
        if moved.is_none() {
            debug!(?direction, "No focused window to move");
        }
    }

    fn move_focus<D: Display>(reactor: &mut Reactor<D>, direction: Direction) {
        let target = reactor
            .with_focused_screen(|screen, _, wid| screen.tree.focus_candidate(wid, direction))
            .flatten();
        match target {
            Some(wid) => reactor.set_focus(Some(wid)),
            None => debug!(?direction, "No window to focus in that direction"),
        }
    }
}
