use thiserror::Error;

use crate::sys::display::DisplayError;

#[derive(Debug, Error)]
pub enum ReactorError {
    #[error("Another window manager is already running")]
    AnotherWmRunning,
    #[error("Display request failed: {0}")]
    Display(#[from] DisplayError),
    #[error("The display server reported no screens")]
    NoScreens,
}
