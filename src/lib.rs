pub mod actor;
pub mod layout_engine;

pub mod common {
    pub mod collections;
    pub mod config;
    pub mod log;
    pub mod util;
}

pub mod model {
    pub mod screen;
    pub mod tree;
    pub mod workspace;
}

pub mod sys {
    pub mod display;
    pub mod geometry;
    pub mod hotkey;
    pub mod x11;
}
