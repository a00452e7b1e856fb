//! Virtual desktops. Every workspace owns one tiling tree per screen; only
//! the active one is mapped.

use tracing::{debug, info};

use crate::model::screen::Screen;
use crate::sys::display::{Display, WindowId};

pub struct Workspace {
    pub screens: Vec<Screen>,
    /// Window that had focus when this workspace was last hidden.
    pub focus_window: Option<WindowId>,
}

impl Workspace {
    pub fn new(screens: Vec<Screen>) -> Self { Workspace { screens, focus_window: None } }

    pub fn contains_window(&self, wid: WindowId) -> bool {
        self.screens.iter().any(|s| s.contains_window(wid))
    }

    pub fn screen_of(&self, wid: WindowId) -> Option<usize> {
        self.screens.iter().position(|s| s.contains_window(wid))
    }

    pub fn windows(&self) -> Vec<WindowId> { self.screens.iter().flat_map(|s| s.windows()).collect() }

    /// The window that gets focus when nothing else is a better candidate.
    pub fn last_window(&self) -> Option<WindowId> {
        self.screens.iter().rev().find_map(|s| s.tree.last_window())
    }

    /// Maps and lays out every window, then restores the remembered focus.
    /// The windows have to be viewable before they can take input focus.
    pub fn show(&mut self, display: &mut dyn Display, focused: &mut Option<WindowId>) {
        let remembered = self.focus_window.take().filter(|&wid| self.contains_window(wid));
        for screen in &mut self.screens {
            for wid in screen.windows() {
                display.map(wid);
            }
            screen.paint(display, remembered, |tree, p| tree.redraw_all(p));
        }
        *focused = remembered;
        match remembered {
            Some(wid) => display.set_input_focus(wid),
            None => {
                if let Some(screen) = self.screens.first() {
                    display.set_input_focus(screen.root_window());
                }
            }
        }
    }

    /// Unmaps every window and remembers the focused one.
    pub fn hide(&mut self, display: &mut dyn Display, focused: &mut Option<WindowId>) {
        for screen in &self.screens {
            screen.for_each_window(|wid| display.unmap(wid));
        }
        self.focus_window = focused.take();
    }

    pub fn draw_trees(&self) -> String {
        self.screens
            .iter()
            .enumerate()
            .map(|(i, s)| format!("screen {i}:\n{}", s.tree.draw_tree()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A fixed ring of workspaces, exactly one of which is active.
pub struct Workspaces {
    slots: Vec<Workspace>,
    active: usize,
}

impl Workspaces {
    /// Creates `count` workspaces, each with its own set of screens. The
    /// first one is active but not shown yet.
    pub fn new(count: usize, mut make_screens: impl FnMut() -> Vec<Screen>) -> Self {
        let slots = (0..count.max(1)).map(|_| Workspace::new(make_screens())).collect();
        Workspaces { slots, active: 0 }
    }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn active_index(&self) -> usize { self.active }

    pub fn current(&self) -> &Workspace { &self.slots[self.active] }

    pub fn current_mut(&mut self) -> &mut Workspace { &mut self.slots[self.active] }

    pub fn move_left(&mut self, display: &mut dyn Display, focused: &mut Option<WindowId>) {
        let target = (self.active + self.slots.len() - 1) % self.slots.len();
        self.move_to(target, display, focused);
    }

    pub fn move_right(&mut self, display: &mut dyn Display, focused: &mut Option<WindowId>) {
        let target = (self.active + 1) % self.slots.len();
        self.move_to(target, display, focused);
    }

    /// Hides the active workspace and shows `index`, wrapping around the
    /// slot count.
    pub fn move_to(&mut self, index: usize, display: &mut dyn Display, focused: &mut Option<WindowId>) {
        let target = index % self.slots.len();
        if target == self.active {
            debug!(target, "Workspace is already active");
            return;
        }
        info!(from = self.active, to = target, "Switching workspace");
        self.slots[self.active].hide(display, focused);
        self.active = target;
        self.slots[self.active].show(display, focused);
    }

    /// Locates a window across all workspaces as (workspace, screen).
    pub fn find_window(&self, wid: WindowId) -> Option<(usize, usize)> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(w, ws)| ws.screen_of(wid).map(|s| (w, s)))
    }

    pub fn for_each_window(&self, mut f: impl FnMut(WindowId)) {
        for ws in &self.slots {
            for screen in &ws.screens {
                screen.for_each_window(&mut f);
            }
        }
    }

    pub fn screen_mut(&mut self, workspace: usize, screen: usize) -> Option<&mut Screen> {
        self.slots.get_mut(workspace)?.screens.get_mut(screen)
    }

    /// Every tree's invariants, plus uniqueness of windows across trees.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut seen = crate::common::collections::HashSet::default();
        for (w, ws) in self.slots.iter().enumerate() {
            for (s, screen) in ws.screens.iter().enumerate() {
                for issue in screen.tree.validate() {
                    issues.push(format!("workspace {w} screen {s}: {issue}"));
                }
            }
        }
        self.for_each_window(|wid| {
            if !seen.insert(wid) {
                issues.push(format!("{wid:?} is managed more than once"));
            }
        });
        issues
    }
}
