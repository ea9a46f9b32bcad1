//! Script variables layered over the process environment

use std::collections::BTreeMap;
use std::process::Command;

/// Variables visible to expansion and child processes.
///
/// Assignments are kept in an overlay; the process environment itself is
/// never modified. An unset entry masks a variable inherited from the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    overlay: BTreeMap<String, Option<String>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` can be assigned
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && !name.contains('=') && !name.contains('\0')
    }

    pub fn get(&self, name: &str) -> Option<String> {
        match self.overlay.get(name) {
            Some(value) => value.clone(),
            None => std::env::var(name).ok(),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.overlay.insert(name.into(), Some(value.into()));
    }

    pub fn unset(&mut self, name: impl Into<String>) {
        self.overlay.insert(name.into(), None);
    }

    /// Make the overlay visible to a child process
    pub fn apply_to(&self, command: &mut Command) {
        for (name, value) in &self.overlay {
            match value {
                Some(value) => {
                    command.env(name, value);
                }
                None => {
                    command.env_remove(name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_shadows_environment() {
        let mut vars = Variables::new();
        let path = std::env::var("PATH").ok();
        assert_eq!(vars.get("PATH"), path);

        vars.set("PATH", "/nowhere");
        assert_eq!(vars.get("PATH").as_deref(), Some("/nowhere"));

        vars.unset("PATH");
        assert_eq!(vars.get("PATH"), None);
        assert_eq!(std::env::var("PATH").ok(), path);
    }

    #[test]
    fn test_name_validation() {
        assert!(Variables::is_valid_name("FOO_1"));
        assert!(!Variables::is_valid_name(""));
        assert!(!Variables::is_valid_name("A=B"));
    }

    #[test]
    fn test_child_sees_overlay() {
        let mut vars = Variables::new();
        vars.set("UD_TEST_CHILD_VAR", "hello");
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf %s \"$UD_TEST_CHILD_VAR\"");
        vars.apply_to(&mut cmd);
        let out = cmd.output().unwrap();
        assert_eq!(String::from_utf8_lossy(&out.stdout), "hello");
    }
}
