use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// User-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: variables captured at startup, consulted before the live process environment.
/// - `should_exit`: set by `exit` so the control loop knows to terminate.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<String, String>,
    /// When set to true, indicates that the control loop should exit.
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        Self {
            vars: stdenv::vars().collect(),
            should_exit: false,
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Directory `cd` changes to when given no argument.
    pub fn home(&self) -> Option<PathBuf> {
        self.get_var("HOME").map(PathBuf::from)
    }

    /// The first `PATH` entry with a trailing separator, used to qualify program names.
    pub fn search_path_prefix(&self) -> Option<String> {
        let path = self.get_var("PATH")?;
        let first = path.split(':').next().unwrap_or_default();
        if first.is_empty() {
            None
        } else {
            Some(format!("{first}/"))
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::collections::HashMap;

    fn empty_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            should_exit: false,
        }
    }

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = empty_env();

        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
    }

    #[test]
    fn test_search_path_prefix_uses_first_segment() {
        let mut env = empty_env();
        env.set_var("PATH", "/opt/tools/bin:/usr/bin:/bin");
        assert_eq!(env.search_path_prefix(), Some("/opt/tools/bin/".to_string()));

        env.set_var("PATH", "/bin");
        assert_eq!(env.search_path_prefix(), Some("/bin/".to_string()));

        env.set_var("PATH", ":/bin");
        assert_eq!(env.search_path_prefix(), None);
    }

    #[test]
    fn test_home_comes_from_vars() {
        let mut env = empty_env();
        env.set_var("HOME", "/home/somebody");
        assert_eq!(env.home(), Some("/home/somebody".into()));
    }
}
