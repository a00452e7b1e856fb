use tracing::{debug, trace};

use crate::actor::reactor::Reactor;
use crate::sys::display::{Display, EventMask, WindowId};
use crate::sys::geometry::Rect;

pub struct WindowEventHandler;

impl WindowEventHandler {
    pub fn handle_map_request<D: Display>(reactor: &mut Reactor<D>, wid: WindowId) {
        if reactor.workspaces.find_window(wid).is_some() {
            debug!(?wid, "Map request for a window we already manage");
            return;
        }
        let attributes = match reactor.display.get_window_attributes(wid) {
            Ok(attributes) => attributes,
            Err(e) => {
                debug!(?wid, "Ignoring map request: {e}");
                return;
            }
        };
        if attributes.override_redirect {
            trace!(?wid, "Mapping override-redirect window without managing it");
            reactor.display.map(wid);
            return;
        }

        reactor.display.change_attributes(wid, EventMask::ENTER_WINDOW);
        let focused = reactor.focused;
        let Some(screen) = reactor.workspaces.current_mut().screens.first_mut() else { return };
        screen.add_window(&mut reactor.display, focused, wid);
        debug!(?wid, "Managing window");

        if reactor.focused.is_none() {
            reactor.set_focus(Some(wid));
        }
    }

    pub fn handle_window_destroyed<D: Display>(reactor: &mut Reactor<D>, wid: WindowId) {
        if !reactor.forget_window(wid) {
            trace!(?wid, "Destroyed window was not managed");
        }
    }

    /// Unmanaged windows get what they asked for. Managed windows are
    /// answered with their tile.
    pub fn handle_configure_request<D: Display>(
        reactor: &mut Reactor<D>,
        wid: WindowId,
        rect: Rect,
    ) {
        if reactor.workspaces.find_window(wid).is_some() {
            trace!(?wid, ?rect, "Keeping managed window in its tile");
            reactor.redraw_window(wid);
        } else {
            trace!(?wid, ?rect, "Granting configure request");
            reactor.display.move_resize(wid, rect);
        }
    }

    pub fn handle_pointer_entered<D: Display>(reactor: &mut Reactor<D>, wid: WindowId) {
        if reactor.focused == Some(wid) {
            return;
        }
        if reactor.workspaces.current().contains_window(wid) {
            reactor.set_focus(Some(wid));
        } else {
            trace!(?wid, "Pointer entered an unmanaged window");
        }
    }
}
