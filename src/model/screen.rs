use crate::common::config::LayoutSettings;
use crate::layout_engine::{LayoutTree, Painter, Style};
use crate::sys::display::{Display, Pixel, WindowId};
use crate::sys::geometry::Rect;

const FALLBACK_DPI: f64 = 96.0;
const MM_PER_INCH: f64 = 25.4;

/// What the display server reports about one of its screens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenInfo {
    pub root: WindowId,
    pub colormap: u32,
    pub width: i32,
    pub height: i32,
    pub mm_width: i32,
    pub mm_height: i32,
}

/// What the server reports when a connection is established.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Setup {
    pub screens: Vec<ScreenInfo>,
    pub min_keycode: u8,
    pub max_keycode: u8,
}

impl ScreenInfo {
    pub fn pixels_per_mm(&self) -> f64 {
        if self.mm_width > 0 {
            f64::from(self.width) / f64::from(self.mm_width)
        } else {
            FALLBACK_DPI / MM_PER_INCH
        }
    }

    /// Converts physical sizes from the settings into pixels for this screen.
    pub fn style(&self, settings: &LayoutSettings, focus_color: Pixel, normal_color: Pixel) -> Style {
        let ppmm = self.pixels_per_mm();
        Style {
            margin: (ppmm * settings.margin_mm).floor() as i32,
            border_width: ((ppmm * settings.border_mm).floor() as i32).max(1),
            focus_color,
            normal_color,
        }
    }
}

/// One physical output and the tiling tree laid out on it.
pub struct Screen {
    pub info: ScreenInfo,
    pub style: Style,
    pub tree: LayoutTree,
}

impl Screen {
    pub fn new(info: ScreenInfo, style: Style) -> Self {
        let m = style.margin;
        let rect = Rect::new(m, m, info.width - 2 * m, info.height - 2 * m);
        Screen { info, style, tree: LayoutTree::new(rect) }
    }

    pub fn root_window(&self) -> WindowId { self.info.root }

    /// Runs a tree operation with a painter for this screen.
    pub fn paint<R>(
        &mut self,
        display: &mut dyn Display,
        focused: Option<WindowId>,
        f: impl FnOnce(&mut LayoutTree, &mut Painter) -> R,
    ) -> R {
        let mut painter = Painter { display, style: &self.style, focused };
        f(&mut self.tree, &mut painter)
    }

    pub fn add_window(&mut self, display: &mut dyn Display, focused: Option<WindowId>, wid: WindowId) {
        self.paint(display, focused, |tree, p| tree.add_window(wid, p));
    }

    pub fn switch_tiling_mode(
        &mut self,
        display: &mut dyn Display,
        focused: Option<WindowId>,
    ) {
        self.paint(display, focused, |tree, p| tree.switch_tiling_mode(focused, p));
    }

    pub fn close_all_windows(&mut self, display: &mut dyn Display) -> Vec<WindowId> {
        self.paint(display, None, |tree, p| tree.close_all_windows(p))
    }

    pub fn windows(&self) -> Vec<WindowId> { self.tree.windows() }

    pub fn for_each_window(&self, f: impl FnMut(WindowId)) { self.tree.windows().into_iter().for_each(f) }

    pub fn contains_window(&self, wid: WindowId) -> bool { self.tree.contains_window(wid) }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::sys::display::testing::RecordingDisplay;

    fn info(width: i32, mm_width: i32) -> ScreenInfo {
        ScreenInfo {
            root: WindowId(1),
            colormap: 0x20,
            width,
            height: 1080,
            mm_width,
            mm_height: 300,
        }
    }

    #[test]
    fn metrics_scale_with_density() {
        let style = info(1920, 480).style(&LayoutSettings::default(), Pixel(1), Pixel(2));
        // 4 px/mm: 5mm margin and 0.5mm border.
        assert_eq!(style.margin, 20);
        assert_eq!(style.border_width, 2);
    }

    #[test]
    fn border_is_at_least_one_pixel() {
        let style = info(1024, 1024).style(&LayoutSettings::default(), Pixel(1), Pixel(2));
        assert_eq!(style.margin, 5);
        assert_eq!(style.border_width, 1);
    }

    #[test]
    fn unknown_physical_size_assumes_96_dpi() {
        let style = info(1920, 0).style(&LayoutSettings::default(), Pixel(1), Pixel(2));
        assert_eq!(style.margin, 18);
        assert_eq!(style.border_width, 1);
    }

    #[test]
    fn root_container_is_inset_by_margin() {
        let info = info(1920, 480);
        let screen = Screen::new(info, info.style(&LayoutSettings::default(), Pixel(1), Pixel(2)));
        let root = screen.tree.root();
        assert_eq!(screen.tree.tree().dimensions(root), Some(Rect::new(20, 20, 1880, 1040)));
        assert_eq!(screen.root_window(), WindowId(1));
    }

    #[test]
    fn windows_are_laid_out_inside_the_margin() {
        let info = info(1920, 480);
        let mut screen =
            Screen::new(info, info.style(&LayoutSettings::default(), Pixel(1), Pixel(2)));
        let mut display = RecordingDisplay::new();
        screen.add_window(&mut display, None, WindowId(5));
        screen.add_window(&mut display, None, WindowId(6));
        assert_eq!(screen.windows(), vec![WindowId(5), WindowId(6)]);
        assert_eq!(screen.tree.geometry(WindowId(5)), Some(Rect::new(20, 20, 930, 1040)));
        assert_eq!(screen.tree.geometry(WindowId(6)), Some(Rect::new(970, 20, 930, 1040)));
    }
}
