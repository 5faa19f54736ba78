use std::{os::unix::fs::MetadataExt as _, path::Path};

use nix::{sys::utsname::uname, unistd::geteuid};

/// Retrieves the platform tag used to key per-platform variations.
///
/// Linux is tagged `<arch>_linux`. macOS is tagged by release codename, `arm64_sonoma` on
/// Apple Silicon and a bare `sonoma` on Intel, the way the metadata feed names them. A macOS
/// release without a known codename falls back to `<arch>_macos`, which matches no variation.
pub fn platform_tag() -> String {
    let os = std::env::consts::OS;
    let darwin_major = if os == "macos" { darwin_major() } else { None };
    platform_tag_for(std::env::consts::ARCH, os, darwin_major)
}

fn platform_tag_for(arch: &str, os: &str, darwin_major: Option<u32>) -> String {
    let arch = match arch {
        "aarch64" => "arm64",
        other => other,
    };

    match (os, darwin_major.and_then(macos_codename)) {
        ("macos", Some(codename)) if arch == "x86_64" => codename.to_string(),
        ("macos", Some(codename)) => format!("{arch}_{codename}"),
        _ => format!("{arch}_{os}"),
    }
}

/// Major version of the running Darwin kernel, e.g. `23` on macOS 14.
fn darwin_major() -> Option<u32> {
    let uts = uname().ok()?;
    uts.release().to_str()?.split('.').next()?.parse().ok()
}

fn macos_codename(darwin_major: u32) -> Option<&'static str> {
    let codename = match darwin_major {
        18 => "mojave",
        19 => "catalina",
        20 => "big_sur",
        21 => "monterey",
        22 => "ventura",
        23 => "sonoma",
        24 => "sequoia",
        25 => "tahoe",
        _ => return None,
    };
    Some(codename)
}

/// Returns `true` when the process runs as root but `prefix` is owned by someone else.
///
/// A `prefix` that does not exist yet is judged by its nearest existing ancestor, which is
/// where it would be created. Such runs must never create cache files that the owning user
/// could not later replace.
pub fn running_as_root_but_not_owned_by_root<P: AsRef<Path>>(prefix: P) -> bool {
    elevated_without_ownership(geteuid().as_raw(), owner_uid(prefix.as_ref()))
}

/// Owner of `path`, or of its nearest existing ancestor.
fn owner_uid(path: &Path) -> Option<u32> {
    path.ancestors()
        .find_map(|ancestor| std::fs::metadata(ancestor).ok())
        .map(|meta| meta.uid())
}

fn elevated_without_ownership(euid: u32, owner_uid: Option<u32>) -> bool {
    euid == 0 && owner_uid.is_some_and(|owner| owner != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_tag() {
        #[cfg(target_arch = "x86_64")]
        #[cfg(target_os = "linux")]
        assert_eq!(platform_tag(), "x86_64_linux");

        #[cfg(target_arch = "aarch64")]
        #[cfg(target_os = "linux")]
        assert_eq!(platform_tag(), "arm64_linux");
    }

    #[test]
    fn test_platform_tag_for() {
        assert_eq!(platform_tag_for("aarch64", "linux", None), "arm64_linux");
        assert_eq!(platform_tag_for("x86_64", "linux", None), "x86_64_linux");
    }

    #[test]
    fn test_platform_tag_for_macos_codenames() {
        assert_eq!(platform_tag_for("aarch64", "macos", Some(23)), "arm64_sonoma");
        assert_eq!(platform_tag_for("aarch64", "macos", Some(24)), "arm64_sequoia");
        assert_eq!(platform_tag_for("x86_64", "macos", Some(22)), "ventura");
        assert_eq!(platform_tag_for("aarch64", "macos", Some(99)), "arm64_macos");
        assert_eq!(platform_tag_for("x86_64", "macos", None), "x86_64_macos");
    }

    #[test]
    fn test_owner_uid_of_missing_path_uses_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let owner = std::fs::metadata(dir.path()).unwrap().uid();

        let missing = dir.path().join("cache/tapfeed/api");
        assert!(!missing.exists());
        assert_eq!(owner_uid(&missing), Some(owner));
        assert_eq!(owner_uid(dir.path()), Some(owner));
    }

    #[test]
    fn test_missing_prefix_is_judged_by_parent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created-yet/cache");

        assert_eq!(
            running_as_root_but_not_owned_by_root(&missing),
            running_as_root_but_not_owned_by_root(dir.path())
        );
        assert!(!missing.exists());
    }

    #[test]
    fn test_elevated_without_ownership() {
        assert!(elevated_without_ownership(0, Some(1000)));
        assert!(!elevated_without_ownership(0, Some(0)));
        assert!(!elevated_without_ownership(0, None));
        assert!(!elevated_without_ownership(1000, Some(1000)));
        assert!(!elevated_without_ownership(1000, Some(0)));
    }
}
