//! Remote command templates
//!
//! Every value interpolated into a command goes through [`shell_quote`].

/// Quote a value for a POSIX shell
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Succeeds when `program` resolves on the remote PATH
pub fn check_executable(program: &str) -> String {
    format!("command -v {}", shell_quote(program))
}

/// Creates the directory if missing, then checks it is writable
pub fn ensure_writable_dir(dir: &str) -> String {
    let dir = shell_quote(dir);
    format!("mkdir -p {dir} && test -w {dir}")
}

/// Shows repository candidates for a package
pub fn package_policy(package: &str) -> String {
    format!("apt-cache policy {}", shell_quote(package))
}

/// Installs from the configured repositories without prompting
pub fn install_from_repository(package: &str, version: Option<&str>) -> String {
    let target = match version {
        Some(v) => format!("{package}={v}"),
        None => package.to_string(),
    };
    format!(
        "DEBIAN_FRONTEND=noninteractive apt-get install -y {}",
        shell_quote(&target)
    )
}

/// Installs a local `.deb`
pub fn install_deb(path: &str) -> String {
    format!("DEBIAN_FRONTEND=noninteractive dpkg -i {}", shell_quote(path))
}

/// Downloads `url` to `path` on the remote host
pub fn download(url: &str, path: &str) -> String {
    format!("wget -q -O {} {}", shell_quote(path), shell_quote(url))
}

pub fn remove_file(path: &str) -> String {
    format!("rm -f {}", shell_quote(path))
}

/// A command plus whatever must be written to its stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegedCommand {
    pub command: String,
    pub input: Option<String>,
}

/// Wraps a command so it runs as root
///
/// Root logins run the command unchanged. Other users go through `sudo`,
/// fed the login password on stdin when one is known and non-interactive
/// otherwise. The password never appears in the command line.
pub fn privileged(
    command: &str,
    username: &str,
    sudo_password: Option<&str>,
) -> PrivilegedCommand {
    if username == "root" {
        return PrivilegedCommand {
            command: command.to_string(),
            input: None,
        };
    }
    match sudo_password {
        Some(password) => PrivilegedCommand {
            command: format!("sudo -S -p '' sh -c {}", shell_quote(command)),
            input: Some(format!("{password}\n")),
        },
        None => PrivilegedCommand {
            command: format!("sudo -n sh -c {}", shell_quote(command)),
            input: None,
        },
    }
}

/// Interprets `apt-cache policy` output
///
/// Unknown packages produce empty output or an `N:` notice. When a version is
/// requested it must appear in the version table.
pub fn policy_lists_package(output: &str, version: Option<&str>) -> bool {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed.starts_with("N:") {
        return false;
    }
    if trimmed.contains("Candidate: (none)") {
        return false;
    }
    match version {
        Some(v) => trimmed
            .lines()
            .any(|line| line.split_whitespace().any(|token| token == v)),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn repository_install_pins_version() {
        assert_eq!(
            install_from_repository("ahenk", Some("1.2")),
            "DEBIAN_FRONTEND=noninteractive apt-get install -y 'ahenk=1.2'"
        );
        assert!(install_from_repository("ahenk", None).ends_with("-y 'ahenk'"));
    }

    #[test]
    fn privileged_wrapping_by_user() {
        let root = privileged("dpkg -i x", "root", Some("pw"));
        assert_eq!(root.command, "dpkg -i x");
        assert_eq!(root.input, None);

        let keyed = privileged("dpkg -i x", "admin", None);
        assert_eq!(keyed.command, "sudo -n sh -c 'dpkg -i x'");
        assert_eq!(keyed.input, None);

        let wrapped = privileged("dpkg -i x", "admin", Some("pw"));
        assert_eq!(wrapped.command, "sudo -S -p '' sh -c 'dpkg -i x'");
        assert_eq!(wrapped.input.as_deref(), Some("pw\n"));
    }

    #[test]
    fn sudo_password_stays_off_the_command_line() {
        let wrapped = privileged(&install_deb("/tmp/x.deb"), "admin", Some("S3cretPw"));
        assert!(!wrapped.command.contains("S3cretPw"));
        assert_eq!(wrapped.input.as_deref(), Some("S3cretPw\n"));
    }

    #[test]
    fn policy_detection() {
        let listed = "ahenk:\n  Installed: (none)\n  Candidate: 1.2\n  Version table:\n     1.2 500\n";
        assert!(policy_lists_package(listed, None));
        assert!(policy_lists_package(listed, Some("1.2")));
        assert!(!policy_lists_package(listed, Some("1.3")));
        assert!(!policy_lists_package("", None));
        assert!(!policy_lists_package("N: Unable to locate package nope", None));
    }
}
