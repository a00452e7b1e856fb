use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use bitflags::bitflags;
use tracing::error;
use xkbcommon::xkb;

use crate::common::collections::{HashMap, hash_map};
use crate::sys::display::KeyboardMapping;

bitflags! {
    /// Modifier state bits as reported in X11 key events.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u16 {
        const SHIFT = 1;
        const CAPS_LOCK = 2;
        const CONTROL = 4;
        const ALT = 8;
        const NUM_LOCK = 16;
        const SUPER = 64;
        const SCROLL_LOCK = 128;
    }
}

impl Modifiers {
    /// Lock keys that must not influence whether a binding matches.
    pub const LOCKS: Modifiers = Modifiers::CAPS_LOCK
        .union(Modifiers::NUM_LOCK)
        .union(Modifiers::SCROLL_LOCK);

    /// Every combination of lock keys a binding has to be grabbed with so it
    /// fires regardless of lock state.
    pub const LOCK_COMBINATIONS: [Modifiers; 8] = [
        Modifiers::empty(),
        Modifiers::CAPS_LOCK,
        Modifiers::NUM_LOCK,
        Modifiers::CAPS_LOCK.union(Modifiers::NUM_LOCK),
        Modifiers::SCROLL_LOCK,
        Modifiers::CAPS_LOCK.union(Modifiers::SCROLL_LOCK),
        Modifiers::NUM_LOCK.union(Modifiers::SCROLL_LOCK),
        Modifiers::LOCKS,
    ];

    pub fn parse_name(name: &str) -> Option<Modifiers> {
        match name.to_lowercase().as_str() {
            "shift" => Some(Modifiers::SHIFT),
            "capslock" => Some(Modifiers::CAPS_LOCK),
            "control" | "ctrl" => Some(Modifiers::CONTROL),
            "alt" => Some(Modifiers::ALT),
            "numlock" => Some(Modifiers::NUM_LOCK),
            "super" => Some(Modifiers::SUPER),
            "scrollock" | "scrolllock" => Some(Modifiers::SCROLL_LOCK),
            _ => None,
        }
    }

    /// Resolves a list of modifier names. Unknown names are logged and
    /// contribute no bits.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Modifiers {
        let mut mods = Modifiers::empty();
        for name in names {
            match Modifiers::parse_name(name.as_ref()) {
                Some(m) => mods.insert(m),
                None => error!("Unknown modifier {:?} in key binding", name.as_ref()),
            }
        }
        mods
    }

    /// Key event state with lock keys masked out.
    pub fn from_state(state: u16) -> Modifiers {
        Modifiers::from_bits_truncate(state).difference(Modifiers::LOCKS)
    }

    /// The masks a binding with these modifiers is grabbed with. Lock
    /// combinations that overlap the binding's own bits are skipped.
    pub fn grab_masks(self) -> impl Iterator<Item = Modifiers> {
        Modifiers::LOCK_COMBINATIONS
            .into_iter()
            .filter(move |locks| !self.intersects(*locks))
            .map(move |locks| self | locks)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        for (name, flag) in [
            ("Super", Modifiers::SUPER),
            ("Control", Modifiers::CONTROL),
            ("Alt", Modifiers::ALT),
            ("Shift", Modifiers::SHIFT),
            ("CapsLock", Modifiers::CAPS_LOCK),
            ("NumLock", Modifiers::NUM_LOCK),
            ("ScrollLock", Modifiers::SCROLL_LOCK),
        ] {
            if self.contains(flag) {
                parts.push(name);
            }
        }
        write!(f, "{}", parts.join(" + "))
    }
}

/// An X11 keysym value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KeySym(pub u32);

impl FromStr for KeySym {
    type Err = anyhow::Error;

    /// Accepts a single printable character, a `0x` literal, or any X keysym
    /// name known to xkbcommon.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            // Latin-1 keysyms share their code points.
            if (' '..='~').contains(&ch) {
                return Ok(KeySym(ch as u32));
            }
        }
        if let Some(hex) = s.strip_prefix("0x") {
            return u32::from_str_radix(hex, 16)
                .map(KeySym)
                .map_err(|_| anyhow!("Invalid keysym literal: {}", s));
        }
        match xkb::keysym_from_name(s, xkb::KEYSYM_NO_FLAGS).raw() {
            0 => Err(anyhow!("Unrecognized key symbol: {}", s)),
            sym => Ok(KeySym(sym)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub key: KeySym,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, key: KeySym) -> Self { Self { modifiers, key } }

    /// Whether a key event with the given keycode and state triggers this
    /// hotkey.
    pub fn matches(&self, keymap: &KeyMap, keycode: u8, state: u16) -> bool {
        keymap.keycode(self.key) == Some(keycode) && Modifiers::from_state(state) == self.modifiers
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "0x{:x}", self.key.0)
        } else {
            write!(f, "{} + 0x{:x}", self.modifiers, self.key.0)
        }
    }
}

/// Keysym to keycode lookup built from the server's keyboard mapping.
#[derive(Debug, Default, Clone)]
pub struct KeyMap {
    codes: HashMap<u32, u8>,
}

impl KeyMap {
    /// The lowest keycode listing a keysym wins; empty (zero) entries are
    /// skipped.
    pub fn from_mapping(mapping: &KeyboardMapping) -> KeyMap {
        let mut codes = HashMap::default();
        let per_code = usize::from(mapping.keysyms_per_keycode.max(1));
        for (i, syms) in mapping.keysyms.chunks(per_code).enumerate() {
            let Ok(offset) = u8::try_from(i) else { break };
            let Some(keycode) = mapping.min_keycode.checked_add(offset) else { break };
            for &sym in syms {
                if sym == 0 {
                    continue;
                }
                if let hash_map::Entry::Vacant(entry) = codes.entry(sym) {
                    entry.insert(keycode);
                }
            }
        }
        KeyMap { codes }
    }

    pub fn keycode(&self, sym: KeySym) -> Option<u8> { self.codes.get(&sym.0).copied() }

    pub fn is_empty(&self) -> bool { self.codes.is_empty() }
}
