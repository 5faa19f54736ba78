use std::{
    env,
    path::{Component, Path, PathBuf},
};

use nix::unistd::{Uid, User};

use crate::error::{PathError, PathResult};

pub trait PathResolver {
    /// Resolves a path string that may contain environment variables
    ///
    /// This method expands environment variables in the format `$VAR` or `${VAR}`, resolves tilde
    /// (`~`) to the user's home directory when it appears at the start of the path, and converts
    /// relative paths to absolute paths based on the current working directory.
    ///
    /// # Errors
    ///
    /// * [`PathError::Empty`] if the path is empty
    /// * [`PathError::CurrentDir`] if the current directory cannot be determined
    /// * [`PathError::MissingEnvVar`] if the environment variables are undefined
    ///
    /// # Example
    ///
    /// ```
    /// use tapfeed_utils::error::PathResult;
    /// use tapfeed_utils::path::{PathResolver, SystemPathResolver};
    ///
    /// fn main() -> PathResult<()> {
    ///     let resolver = SystemPathResolver;
    ///     let resolved = resolver.resolve_path("$HOME/.cache/tapfeed")?;
    ///     println!("Resolved path is {:#?}", resolved);
    ///     Ok(())
    /// }
    /// ```
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf>;

    /// Returns the user's home directory
    ///
    /// Checks `HOME` first and falls back to the password database entry of the current user.
    fn home_dir(&self) -> PathBuf;

    /// `XDG_CONFIG_HOME`, defaulting to `$HOME/.config`
    fn xdg_config_home(&self) -> PathBuf;

    /// `XDG_DATA_HOME`, defaulting to `$HOME/.local/share`
    fn xdg_data_home(&self) -> PathBuf;

    /// `XDG_CACHE_HOME`, defaulting to `$HOME/.cache`
    fn xdg_cache_home(&self) -> PathBuf;
}

/// The default [`PathResolver`] implementation using environment variables and filesystem calls.
pub struct SystemPathResolver;

impl PathResolver for SystemPathResolver {
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf> {
        let path = path.trim();

        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let resolved = self.expand_variables(path)?;
        let path_buf = PathBuf::from(resolved);

        if path_buf.is_absolute() {
            Ok(path_buf)
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(path_buf))
                .map_err(|err| PathError::CurrentDir { source: err })
        }
    }

    fn home_dir(&self) -> PathBuf {
        env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
            User::from_uid(Uid::current())
                .ok()
                .flatten()
                .map(|user| user.dir)
                .unwrap_or_else(|| PathBuf::from("/"))
        })
    }

    fn xdg_config_home(&self) -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".config"))
    }

    fn xdg_data_home(&self) -> PathBuf {
        env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".local/share"))
    }

    fn xdg_cache_home(&self) -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".cache"))
    }
}

impl SystemPathResolver {
    /// Expands a leading `~` and every `$VAR` or `${VAR}` reference in `input`.
    ///
    /// A `$` not followed by a variable name is kept literally.
    fn expand_variables(&self, input: &str) -> PathResult<String> {
        let (mut expanded, mut rest) = match input.strip_prefix('~') {
            Some(rest) => (self.home_dir().to_string_lossy().into_owned(), rest),
            None => (String::new(), input),
        };

        while let Some(dollar) = rest.find('$') {
            expanded.push_str(&rest[..dollar]);
            let after = &rest[dollar + 1..];

            let (name, tail) = match after.strip_prefix('{') {
                Some(braced) => {
                    let end = braced.find('}').ok_or_else(|| {
                        PathError::UnclosedVariable {
                            input: rest[dollar..].to_string(),
                        }
                    })?;
                    (&braced[..end], &braced[end + 1..])
                }
                None => {
                    let end = after
                        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                        .unwrap_or(after.len());
                    after.split_at(end)
                }
            };

            if name.is_empty() {
                expanded.push('$');
            } else {
                expanded.push_str(&self.lookup_var(name, input)?);
            }
            rest = tail;
        }

        expanded.push_str(rest);
        Ok(expanded)
    }

    /// The XDG variables fall back to their defaults when unset; anything else must be set.
    fn lookup_var(&self, name: &str, input: &str) -> PathResult<String> {
        let dir = match name {
            "HOME" => self.home_dir(),
            "XDG_CONFIG_HOME" => self.xdg_config_home(),
            "XDG_DATA_HOME" => self.xdg_data_home(),
            "XDG_CACHE_HOME" => self.xdg_cache_home(),
            _ => {
                return env::var(name).map_err(|_| {
                    PathError::MissingEnvVar {
                        input: input.into(),
                        var: name.into(),
                    }
                });
            }
        };
        Ok(dir.to_string_lossy().into_owned())
    }
}

/// Makes `path` absolute against the current directory and folds `.` and `..` components
/// lexically, without touching the filesystem or following symlinks.
pub fn normalize_absolute<P: AsRef<Path>>(path: P) -> PathResult<PathBuf> {
    let path = path.as_ref();
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map_err(|err| PathError::CurrentDir { source: err })?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// See [`PathResolver::resolve_path`].
pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    SystemPathResolver.resolve_path(path)
}

/// See [`PathResolver::home_dir`].
pub fn home_dir() -> PathBuf {
    SystemPathResolver.home_dir()
}

/// See [`PathResolver::xdg_config_home`].
pub fn xdg_config_home() -> PathBuf {
    SystemPathResolver.xdg_config_home()
}

/// See [`PathResolver::xdg_data_home`].
pub fn xdg_data_home() -> PathBuf {
    SystemPathResolver.xdg_data_home()
}

/// See [`PathResolver::xdg_cache_home`].
pub fn xdg_cache_home() -> PathBuf {
    SystemPathResolver.xdg_cache_home()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn setup_test_env(vars: &[(&str, &str)]) {
        for (var, value) in vars {
            env::set_var(*var, *value);
        }
    }

    fn cleanup_test_env(vars: &[&str]) {
        for key in vars {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_expand_variables_simple() {
        setup_test_env(&[("TAPFEED_TEST_VAR", "test_value")]);
        let resolver = SystemPathResolver;
        let result = resolver.expand_variables("$TAPFEED_TEST_VAR/path").unwrap();
        assert_eq!(result, "test_value/path");

        let result = resolver.expand_variables("${TAPFEED_TEST_VAR}/path").unwrap();
        assert_eq!(result, "test_value/path");

        let result = resolver.expand_variables("a$/b/${TAPFEED_TEST_VAR}x").unwrap();
        assert_eq!(result, "a$/b/test_valuex");
        cleanup_test_env(&["TAPFEED_TEST_VAR"]);
    }

    #[test]
    #[serial]
    fn test_expand_variables_errors() {
        let resolver = SystemPathResolver;
        assert!(matches!(
            resolver.expand_variables("${TAPFEED_TEST_VAR"),
            Err(PathError::UnclosedVariable { .. })
        ));
        assert!(matches!(
            resolver.expand_variables("$THIS_VAR_DOESNT_EXIST"),
            Err(PathError::MissingEnvVar { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_xdg_directories() {
        setup_test_env(&[("HOME", "/tmp/home")]);
        cleanup_test_env(&["XDG_CONFIG_HOME", "XDG_DATA_HOME", "XDG_CACHE_HOME"]);

        let resolver = SystemPathResolver;
        let home = resolver.home_dir();
        assert_eq!(home, PathBuf::from("/tmp/home"));
        assert_eq!(resolver.xdg_config_home(), home.join(".config"));
        assert_eq!(resolver.xdg_data_home(), home.join(".local/share"));
        assert_eq!(resolver.xdg_cache_home(), home.join(".cache"));

        setup_test_env(&[("XDG_CACHE_HOME", "/tmp/cache")]);
        assert_eq!(resolver.xdg_cache_home(), PathBuf::from("/tmp/cache"));

        cleanup_test_env(&["XDG_CACHE_HOME", "HOME"]);
    }

    #[test]
    #[serial]
    fn test_resolve_path() {
        setup_test_env(&[("HOME", "/tmp/home")]);
        let resolver = SystemPathResolver;

        assert!(matches!(resolver.resolve_path(""), Err(PathError::Empty)));
        assert_eq!(
            resolver.resolve_path("/absolute/path").unwrap(),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolver.resolve_path("~/cache").unwrap(),
            PathBuf::from("/tmp/home/cache")
        );
        assert_eq!(
            resolver.resolve_path("$HOME/cache").unwrap(),
            PathBuf::from("/tmp/home/cache")
        );

        let relative = resolver.resolve_path("relative/path").unwrap();
        assert!(relative.is_absolute());
        assert!(relative.ends_with("relative/path"));

        cleanup_test_env(&["HOME"]);
    }

    #[test]
    fn test_normalize_absolute() {
        assert_eq!(
            normalize_absolute("/cache/api-source/./org/../org/repo").unwrap(),
            PathBuf::from("/cache/api-source/org/repo")
        );
        assert!(normalize_absolute("relative").unwrap().is_absolute());
    }
}
