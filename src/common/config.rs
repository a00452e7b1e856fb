use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::actor::reactor::Command;
use crate::sys::display::Rgb;
use crate::sys::hotkey::{Hotkey, KeySym, Modifiers};

const MAX_WORKSPACES: usize = 32;

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("airwm").join("config.toml"))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    startup_applications: Vec<String>,
    #[serde(default)]
    layout: LayoutSettings,
    #[serde(default)]
    workspaces: WorkspaceSettings,
    #[serde(default)]
    keybindings: Vec<KeyBinding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Programs launched once at startup, in order.
    pub startup_applications: Vec<String>,
    pub layout: LayoutSettings,
    pub workspaces: WorkspaceSettings,
    /// Bindings as written, kept for validation and display.
    pub keybindings: Vec<KeyBinding>,
    /// Resolved bindings in configuration order. The first match wins.
    pub keys: Vec<(Hotkey, Action)>,
}

/// Physical sizes are in millimeters and converted per screen.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayoutSettings {
    #[serde(default = "default_margin_mm")]
    pub margin_mm: f64,
    #[serde(default = "default_border_mm")]
    pub border_mm: f64,
    #[serde(default = "default_focus_color")]
    pub focus_color: Rgb,
    #[serde(default = "default_normal_color")]
    pub normal_color: Rgb,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            margin_mm: default_margin_mm(),
            border_mm: default_border_mm(),
            focus_color: default_focus_color(),
            normal_color: default_normal_color(),
        }
    }
}

impl LayoutSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !self.margin_mm.is_finite() || self.margin_mm < 0.0 {
            issues.push(format!("layout.margin_mm must be non-negative, got {}", self.margin_mm));
        }
        if !self.border_mm.is_finite() || self.border_mm < 0.0 {
            issues.push(format!("layout.border_mm must be non-negative, got {}", self.border_mm));
        }
        if self.focus_color == self.normal_color {
            issues.push("layout.focus_color is the same as layout.normal_color".to_string());
        }
        issues
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSettings {
    #[serde(default = "default_workspace_count")]
    pub count: usize,
}

impl Default for WorkspaceSettings {
    fn default() -> Self { Self { count: default_workspace_count() } }
}

impl WorkspaceSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.count == 0 {
            issues.push("workspaces.count must be at least 1".to_string());
        }
        if self.count > MAX_WORKSPACES {
            issues.push(format!(
                "workspaces.count ({}) should not exceed {MAX_WORKSPACES}",
                self.count
            ));
        }
        issues
    }
}

/// One `[[keybindings]]` entry. Exactly one of `command` and `program` must
/// be present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KeyBinding {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub command: Option<Command>,
    pub program: Option<String>,
}

/// What a key binding does when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Command(Command),
    Program(String),
}

impl KeyBinding {
    fn resolve(&self) -> anyhow::Result<(Hotkey, Action)> {
        let key: KeySym = self.key.parse()?;
        let modifiers = Modifiers::from_names(&self.modifiers);
        let action = match (&self.command, &self.program) {
            (Some(command), None) => Action::Command(command.clone()),
            (None, Some(program)) => Action::Program(program.clone()),
            (Some(_), Some(_)) => {
                bail!("Key binding `{}` has both a command and a program", self.key)
            }
            (None, None) => bail!("Key binding `{}` has neither a command nor a program", self.key),
        };
        Ok((Hotkey::new(modifiers, key), action))
    }
}

fn default_margin_mm() -> f64 { 5.0 }

fn default_border_mm() -> f64 { 0.5 }

fn default_focus_color() -> Rgb { Rgb::new(0x5e, 0x81, 0xac) }

fn default_normal_color() -> Rgb { Rgb::new(0x3b, 0x42, 0x52) }

fn default_workspace_count() -> usize { 10 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Could not read {}: {e}", path.display()))?;
        Self::parse(&buf)
    }

    pub fn default() -> Config {
        Self::parse(include_str!("../../airwm.default.toml")).unwrap_or_else(|e| {
            error!("Bundled default config is invalid, starting without key bindings: {e:#}");
            Config {
                startup_applications: Vec::new(),
                layout: LayoutSettings::default(),
                workspaces: WorkspaceSettings::default(),
                keybindings: Vec::new(),
                keys: Vec::new(),
            }
        })
    }

    /// Loads `path` if it exists, the bundled defaults otherwise.
    pub fn read_or_default(path: Option<&Path>) -> anyhow::Result<Config> {
        match path {
            Some(path) if path.exists() => Self::read(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        issues.extend(self.layout.validate());
        issues.extend(self.workspaces.validate());

        for (i, app) in self.startup_applications.iter().enumerate() {
            if app.trim().is_empty() {
                issues.push(format!("startup_applications[{i}] is empty"));
            }
        }

        for binding in &self.keybindings {
            for name in &binding.modifiers {
                if Modifiers::parse_name(name).is_none() {
                    issues.push(format!(
                        "Key binding `{}` uses unknown modifier `{name}`",
                        binding.key
                    ));
                }
            }
            if let Some(Command::SwitchWorkspace(n)) = binding.command {
                if n >= self.workspaces.count {
                    issues.push(format!(
                        "Key binding `{}` switches to workspace {n}, but only {} exist",
                        binding.key, self.workspaces.count
                    ));
                }
            }
            if let Some(program) = &binding.program {
                if program.trim().is_empty() {
                    issues.push(format!("Key binding `{}` has an empty program", binding.key));
                }
            }
        }

        for (i, (hotkey, _)) in self.keys.iter().enumerate() {
            if self.keys[..i].iter().any(|(earlier, _)| earlier == hotkey) {
                issues.push(format!(
                    "Key binding `{}` is shadowed by an earlier binding for the same keys",
                    self.keybindings[i].key
                ));
            }
        }

        issues
    }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        let file = match toml::from_str::<ConfigFile>(buf) {
            Ok(file) => file,
            Err(e) => {
                let msg = e.to_string();
                match Self::extract_unknown_variant(&msg).and_then(|u| Self::suggest_similar_command(&u))
                {
                    Some(suggestion) => bail!("{msg}\nDid you mean `{suggestion}`?"),
                    None => bail!("{msg}"),
                }
            }
        };
        let mut keys = Vec::with_capacity(file.keybindings.len());
        for binding in &file.keybindings {
            keys.push(binding.resolve()?);
        }
        Ok(Config {
            startup_applications: file.startup_applications,
            layout: file.layout,
            workspaces: file.workspaces,
            keybindings: file.keybindings,
            keys,
        })
    }

    // Pulls the offending token out of a serde "unknown variant" message.
    fn extract_unknown_variant(err: &str) -> Option<String> {
        let rest = &err[err.find("unknown variant")?..];
        let open = rest.find('`')? + 1;
        let close = rest[open..].find('`')? + open;
        Some(rest[open..close].to_string())
    }

    // Returns the closest known command name, if it is close enough to be a
    // plausible typo.
    fn suggest_similar_command(unknown: &str) -> Option<String> {
        let unknown = unknown.to_lowercase();
        let (best, dist) = Command::snake_case_variants()
            .iter()
            .map(|cand| (cand, Self::levenshtein(&unknown, cand)))
            .min_by_key(|&(_, dist)| dist)?;
        let threshold = std::cmp::max(3usize, best.len() / 2);
        (dist <= threshold).then(|| best.clone())
    }

    fn levenshtein(a: &str, b: &str) -> usize {
        let b: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        let mut cur = vec![0; b.len() + 1];
        for (i, ca) in a.chars().enumerate() {
            cur[0] = i + 1;
            for (j, &cb) in b.iter().enumerate() {
                let cost = if ca == cb { 0 } else { 1 };
                cur[j + 1] = (prev[j + 1] + 1).min(cur[j] + 1).min(prev[j] + cost);
            }
            std::mem::swap(&mut prev, &mut cur);
        }
        prev[b.len()]
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn bundled_default_config_is_valid() {
        let config = Config::parse(include_str!("../../airwm.default.toml")).unwrap();
        let issues = config.validate();
        assert!(issues.is_empty(), "Expected no issues, got: {:?}", issues);
        assert!(!config.keys.is_empty());
        assert_eq!(config.workspaces.count, 10);
    }

    #[test]
    fn default_config_comes_from_bundled_file() {
        let config = Config::default();
        let bundled = Config::parse(include_str!("../../airwm.default.toml")).unwrap();
        assert_eq!(config.keys, bundled.keys);
        assert!(!config.keys.is_empty());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.layout, LayoutSettings::default());
        assert_eq!(config.layout.margin_mm, 5.0);
        assert_eq!(config.layout.border_mm, 0.5);
        assert_eq!(config.layout.focus_color, Rgb::new(0x5e, 0x81, 0xac));
        assert_eq!(config.workspaces.count, 10);
        assert!(config.keys.is_empty());
        assert!(config.startup_applications.is_empty());
    }

    #[test]
    fn parses_bindings_in_order() {
        let toml = r##"
            startup_applications = ["xterm", "xsetroot -solid '#222222'"]

            [layout]
            margin_mm = 2.5
            focus_color = "#ff0000"

            [[keybindings]]
            key = "Return"
            modifiers = ["super"]
            program = "xterm"

            [[keybindings]]
            key = "q"
            modifiers = ["super", "shift"]
            command = "shutdown"

            [[keybindings]]
            key = "3"
            modifiers = ["super"]
            command = { switch_workspace = 2 }
        "##;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.startup_applications.len(), 2);
        assert_eq!(config.layout.margin_mm, 2.5);
        assert_eq!(config.layout.border_mm, 0.5);
        assert_eq!(config.layout.focus_color, Rgb::new(0xff, 0, 0));
        assert_eq!(
            config.keys,
            vec![
                (
                    Hotkey::new(Modifiers::SUPER, KeySym(0xff0d)),
                    Action::Program("xterm".to_string())
                ),
                (
                    Hotkey::new(Modifiers::SUPER | Modifiers::SHIFT, KeySym('q' as u32)),
                    Action::Command(Command::Shutdown)
                ),
                (
                    Hotkey::new(Modifiers::SUPER, KeySym('3' as u32)),
                    Action::Command(Command::SwitchWorkspace(2))
                ),
            ]
        );
        assert!(config.validate().is_empty());
    }

    #[test]
    fn unknown_modifier_contributes_no_bits() {
        let toml = r#"
            [[keybindings]]
            key = "a"
            modifiers = ["hyper", "control"]
            command = "close_window"
        "#;
        let config = Config::parse(toml).unwrap();
        assert_eq!(config.keys[0].0.modifiers, Modifiers::CONTROL);
        let issues = config.validate();
        assert_eq!(1, issues.len());
        assert!(issues[0].contains("unknown modifier `hyper`"));
    }

    #[test]
    fn binding_needs_exactly_one_action() {
        let both = r#"
            [[keybindings]]
            key = "a"
            command = "close_window"
            program = "xterm"
        "#;
        assert!(Config::parse(both).is_err());
        let neither = r#"
            [[keybindings]]
            key = "a"
        "#;
        assert!(Config::parse(neither).is_err());
    }

    #[test]
    fn unknown_key_symbol_is_an_error() {
        let toml = r#"
            [[keybindings]]
            key = "NotAKey"
            command = "close_window"
        "#;
        let err = Config::parse(toml).unwrap_err();
        assert!(err.to_string().contains("NotAKey"), "{err}");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::parse("[layout]\ngap = 3\n").is_err());
        assert!(Config::parse("focus_follows_mouse = true\n").is_err());
    }

    #[test]
    fn misspelled_command_gets_a_suggestion() {
        let toml = r#"
            [[keybindings]]
            key = "h"
            command = "move_focus_lefft"
        "#;
        let err = Config::parse(toml).unwrap_err().to_string();
        assert!(err.contains("Did you mean `move_focus_left`?"), "{err}");
    }

    #[test]
    fn levenshtein_suggests() {
        let err = "unknown variant `swich_tiling_mode`, expected one of `shutdown`";
        let token = Config::extract_unknown_variant(err).unwrap();
        assert_eq!(token, "swich_tiling_mode");
        assert_eq!(
            Config::suggest_similar_command(&token).as_deref(),
            Some("switch_tiling_mode")
        );
        assert_eq!(Config::suggest_similar_command("launch_rockets_now_please"), None);
    }

    #[test]
    fn workspace_count_validation() {
        let mut settings = WorkspaceSettings::default();
        settings.count = 0;
        assert!(settings.validate().iter().any(|i| i.contains("at least 1")));
        settings.count = 100;
        assert!(settings.validate().iter().any(|i| i.contains("should not exceed")));
    }

    #[test]
    fn switch_workspace_out_of_range() {
        let toml = r#"
            [workspaces]
            count = 3

            [[keybindings]]
            key = "5"
            command = { switch_workspace = 4 }
        "#;
        let issues = Config::parse(toml).unwrap().validate();
        assert!(issues.iter().any(|i| i.contains("only 3 exist")), "{issues:?}");
    }

    #[test]
    fn shadowed_bindings_are_reported() {
        let toml = r#"
            [[keybindings]]
            key = "a"
            modifiers = ["super"]
            command = "close_window"

            [[keybindings]]
            key = "a"
            modifiers = ["super"]
            command = "shutdown"
        "#;
        let issues = Config::parse(toml).unwrap().validate();
        assert_eq!(1, issues.len(), "{issues:?}");
        assert!(issues[0].contains("shadowed"));
    }

    #[test]
    fn negative_sizes_are_reported() {
        let mut layout = LayoutSettings::default();
        layout.margin_mm = -1.0;
        layout.border_mm = f64::NAN;
        assert_eq!(2, layout.validate().len());
    }

    #[test]
    fn reads_from_disk_or_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workspaces]\ncount = 4").unwrap();
        let config = Config::read_or_default(Some(file.path())).unwrap();
        assert_eq!(config.workspaces.count, 4);

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let config = Config::read_or_default(Some(&missing)).unwrap();
        assert_eq!(config.workspaces.count, 10);
        assert!(Config::read(&missing).is_err());
    }
}
