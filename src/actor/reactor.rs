//! The Reactor owns all window manager state and handles one event at a
//! time, to completion, before looking at the next one.

mod error;
mod events {
    pub mod command;
    pub mod window;
}


use std::ops::ControlFlow;

pub use error::ReactorError;
use events::command::CommandEventHandler;
use events::window::WindowEventHandler;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::VariantNames;
use tracing::{debug, info, instrument, trace, warn};

use crate::actor;
use crate::common::config::Config;
use crate::model::screen::{Screen, ScreenInfo, Setup};
use crate::model::workspace::Workspaces;
use crate::sys::display::{Display, EventMask, WindowId};
use crate::sys::geometry::Rect;
use crate::sys::hotkey::KeyMap;

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A client asked for a window to be mapped.
    MapRequest(WindowId),
    WindowDestroyed(WindowId),
    /// A client asked for its window to have this geometry.
    ConfigureRequest {
        window: WindowId,
        rect: Rect,
    },
    /// The pointer entered a window we selected `ENTER_WINDOW` on.
    PointerEntered(WindowId),
    KeyPress {
        keycode: u8,
        state: u16,
    },
    KeyRelease {
        keycode: u8,
        state: u16,
    },
    Command(Command),
    /// Leave without touching any windows.
    Exit,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, strum_macros::VariantNames)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Shutdown,
    CloseWindow,
    SwitchTilingMode,
    MoveWindowLeft,
    MoveWindowRight,
    MoveWindowUp,
    MoveWindowDown,
    MoveFocusLeft,
    MoveFocusRight,
    MoveFocusUp,
    MoveFocusDown,
    SwitchWorkspaceLeft,
    SwitchWorkspaceRight,
    SwitchWorkspace(usize),
    DumpTree,
}

static COMMAND_VARIANTS: Lazy<Vec<String>> = Lazy::new(|| {
    Command::VARIANTS
        .iter()
        .map(|v| {
            let mut out = String::with_capacity(v.len());
            for (i, ch) in v.chars().enumerate() {
                if ch.is_uppercase() {
                    if i != 0 {
                        out.push('_');
                    }
                    out.extend(ch.to_lowercase());
                } else {
                    out.push(ch);
                }
            }
            out
        })
        .collect()
});

impl Command {
    pub fn snake_case_variants() -> &'static [String] { &COMMAND_VARIANTS }
}

const ROOT_EVENTS: EventMask = EventMask::SUBSTRUCTURE_REDIRECT
    .union(EventMask::SUBSTRUCTURE_NOTIFY)
    .union(EventMask::ENTER_WINDOW);

pub struct Reactor<D: Display> {
    config: Config,
    display: D,
    screens: Vec<ScreenInfo>,
    /// Root of the first screen; keys are grabbed here and it takes focus
    /// when no window does.
    root: WindowId,
    workspaces: Workspaces,
    keymap: KeyMap,
    focused: Option<WindowId>,
}

impl<D: Display> Reactor<D> {
    /// Takes over window management on every screen, allocates colors, and
    /// grabs the configured keys. The first workspace is shown.
    pub fn new(config: Config, mut display: D, setup: Setup) -> Result<Self, ReactorError> {
        let Some(primary) = setup.screens.first().copied() else {
            return Err(ReactorError::NoScreens);
        };

        for screen in &setup.screens {
            display
                .change_root_attributes(screen.root, ROOT_EVENTS)
                .map_err(|_| ReactorError::AnotherWmRunning)?;
        }

        let mut styles = Vec::with_capacity(setup.screens.len());
        for info in &setup.screens {
            let focus = display.alloc_color(info.colormap, config.layout.focus_color)?;
            let normal = display.alloc_color(info.colormap, config.layout.normal_color)?;
            styles.push(info.style(&config.layout, focus, normal));
        }
        for (info, style) in setup.screens.iter().zip(&styles) {
            debug!(root = ?info.root, ?style, "Screen metrics");
        }

        let count = setup.max_keycode.saturating_sub(setup.min_keycode).saturating_add(1);
        let mapping = display.get_keyboard_mapping(setup.min_keycode, count)?;
        let keymap = KeyMap::from_mapping(&mapping);

        let screens = setup.screens;
        let workspaces = Workspaces::new(config.workspaces.count, || {
            screens.iter().zip(&styles).map(|(info, style)| Screen::new(*info, *style)).collect()
        });

        let mut reactor = Reactor {
            config,
            display,
            screens,
            root: primary.root,
            workspaces,
            keymap,
            focused: None,
        };
        reactor.grab_keys();
        reactor.workspaces.current_mut().show(&mut reactor.display, &mut reactor.focused);
        reactor.display.flush();
        info!(
            screens = reactor.screens.len(),
            workspaces = reactor.workspaces.len(),
            "Window manager started"
        );
        Ok(reactor)
    }

    fn grab_keys(&mut self) {
        let root = self.root;
        for (hotkey, action) in &self.config.keys {
            let Some(keycode) = self.keymap.keycode(hotkey.key) else {
                warn!(%hotkey, ?action, "Key is not on the keyboard, binding ignored");
                continue;
            };
            for mask in hotkey.modifiers.grab_masks() {
                self.display.grab_key(root, mask, keycode);
            }
            trace!(%hotkey, keycode, "Grabbed key");
        }
    }

    /// Handles events until an exit is requested or every sender is gone.
    pub async fn run(mut self, mut events: Receiver) {
        while let Some((span, event)) = events.recv().await {
            let _guard = span.enter();
            let flow = self.handle_event(event);
            self.display.flush();
            if flow.is_break() {
                break;
            }
        }
    }

    fn log_event(&self, event: &Event) {
        match event {
            Event::PointerEntered(..) | Event::KeyRelease { .. } => trace!(?event, "Event"),
            _ => debug!(?event, "Event"),
        }
    }

    #[instrument(name = "reactor::handle_event", skip(self))]
    fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        self.log_event(&event);
        match event {
            Event::MapRequest(wid) => WindowEventHandler::handle_map_request(self, wid),
            Event::WindowDestroyed(wid) => WindowEventHandler::handle_window_destroyed(self, wid),
            Event::ConfigureRequest { window, rect } => {
                WindowEventHandler::handle_configure_request(self, window, rect)
            }
            Event::PointerEntered(wid) => WindowEventHandler::handle_pointer_entered(self, wid),
            Event::KeyPress { keycode, state } => {
                return CommandEventHandler::handle_key_press(self, keycode, state);
            }
            Event::KeyRelease { .. } => {}
            Event::Command(cmd) => return CommandEventHandler::handle_command(self, cmd),
            Event::Exit => {
                info!("Exit requested");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn root_window(&self) -> WindowId { self.root }

    /// Moves input focus, recoloring the borders of the old and new window.
    /// `None` gives focus to the root window.
    fn set_focus(&mut self, wid: Option<WindowId>) {
        let previous = std::mem::replace(&mut self.focused, wid);
        match wid {
            Some(wid) => self.display.set_input_focus(wid),
            None => self.display.set_input_focus(self.root_window()),
        }
        for wid in [previous, wid].into_iter().flatten() {
            self.redraw_window(wid);
        }
        debug!(?previous, focused = ?wid, "Focus changed");
    }

    /// Focuses some remaining window of the current workspace, or the root
    /// window if it is empty.
    fn focus_any(&mut self) {
        let next = self.workspaces.current().last_window();
        self.set_focus(next);
    }

    fn redraw_window(&mut self, wid: WindowId) {
        let Some((ws, screen)) = self.workspaces.find_window(wid) else { return };
        let focused = self.focused;
        if let Some(screen) = self.workspaces.screen_mut(ws, screen) {
            screen.paint(&mut self.display, focused, |tree, p| tree.redraw_window(wid, p));
        }
    }

    /// Stops managing `wid` wherever it lives. Focus moves on when it was
    /// the focused window.
    fn forget_window(&mut self, wid: WindowId) -> bool {
        let Some((ws, screen)) = self.workspaces.find_window(wid) else { return false };
        let focused = self.focused;
        if let Some(screen) = self.workspaces.screen_mut(ws, screen) {
            screen.paint(&mut self.display, focused, |tree, p| tree.remove_window(wid, p));
        }
        debug!(?wid, workspace = ws, "Window removed");
        if self.focused == Some(wid) {
            self.focused = None;
            self.focus_any();
        }
        true
    }

    /// Runs `f` on the focused window and the screen of the current
    /// workspace showing it.
    fn with_focused_screen<R>(
        &mut self,
        f: impl FnOnce(&mut Screen, &mut dyn Display, WindowId) -> R,
    ) -> Option<R> {
        let wid = self.focused?;
        let workspace = self.workspaces.current_mut();
        let index = workspace.screen_of(wid)?;
        let screen = workspace.screens.get_mut(index)?;
        Some(f(screen, &mut self.display, wid))
    }
}
