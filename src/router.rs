//! Turns a submitted line into either a local directive or a process invocation.
//!
//! Unix-like hosts hand the whole line to `bash` so the shell's own parser handles
//! quoting, pipes and globs. Windows-like hosts get an argument vector built here;
//! plain commands are split on single spaces, so quoted arguments containing
//! spaces are not preserved.

use serde::Serialize;
use std::str::FromStr;

const UNIX_SHELL: &str = "bash";
const WINDOWS_SHELL: &str = "powershell";
const POWERSHELL_PREFIX: &str = "powershell ";
const CD_PREFIX: &str = "cd ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostPlatform {
    Unix,
    Windows,
}

impl HostPlatform {
    pub fn detect() -> Self {
        if cfg!(windows) {
            HostPlatform::Windows
        } else {
            HostPlatform::Unix
        }
    }

    /// Directory a new session shows until the real cwd has been resolved.
    pub fn placeholder_directory(&self) -> &'static str {
        match self {
            HostPlatform::Unix => "/home",
            HostPlatform::Windows => "C:\\",
        }
    }

    pub fn shell_program(&self) -> &'static str {
        match self {
            HostPlatform::Unix => UNIX_SHELL,
            HostPlatform::Windows => WINDOWS_SHELL,
        }
    }
}

impl FromStr for HostPlatform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(HostPlatform::detect()),
            "unix" | "linux" | "mac" | "macos" => Ok(HostPlatform::Unix),
            "windows" => Ok(HostPlatform::Windows),
            _ => Err(anyhow::anyhow!("Invalid shell platform: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Clear,
    ChangeDirectory { path: String },
    Execute(Invocation),
}

/// Classifies `raw` for `platform`. Matching is done on the trimmed, lower-cased
/// line; the directory argument keeps its original case and the invocation is
/// built from `raw` as typed.
pub fn classify(raw: &str, platform: HostPlatform) -> Dispatch {
    let trimmed = raw.trim();
    let lowered = trimmed.to_lowercase();

    if lowered == "clear" || lowered == "cls" {
        return Dispatch::Clear;
    }

    if let Some(path) = strip_prefix_ignore_case(trimmed, CD_PREFIX) {
        return Dispatch::ChangeDirectory {
            path: path.to_string(),
        };
    }

    Dispatch::Execute(build_invocation(raw, platform))
}

pub fn build_invocation(raw: &str, platform: HostPlatform) -> Invocation {
    match platform {
        HostPlatform::Unix => Invocation {
            program: UNIX_SHELL.to_string(),
            args: vec![raw.to_string()],
        },
        HostPlatform::Windows => {
            let args = match strip_prefix_ignore_case(raw, POWERSHELL_PREFIX) {
                Some(command) => vec![
                    "-NoProfile".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Bypass".to_string(),
                    "-Command".to_string(),
                    command.to_string(),
                ],
                None => raw.split(' ').map(str::to_string).collect(),
            };
            Invocation {
                program: WINDOWS_SHELL.to_string(),
                args,
            }
        }
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn clear_and_cls_are_local_in_any_case() {
        for input in ["clear", "CLS", "  Clear  ", "cls"] {
            assert_eq!(classify(input, HostPlatform::Unix), Dispatch::Clear);
            assert_eq!(classify(input, HostPlatform::Windows), Dispatch::Clear);
        }
    }

    #[test]
    fn clear_with_arguments_is_a_command() {
        assert!(matches!(
            classify("clear -x", HostPlatform::Unix),
            Dispatch::Execute(_)
        ));
    }

    #[test]
    fn cd_keeps_the_original_case_of_its_argument() {
        assert_eq!(
            classify("CD ../Src", HostPlatform::Unix),
            Dispatch::ChangeDirectory { path: "../Src".to_string() }
        );
        assert_eq!(
            classify("  cd C:\\Users  ", HostPlatform::Windows),
            Dispatch::ChangeDirectory { path: "C:\\Users".to_string() }
        );
    }

    #[test]
    fn bare_cd_is_passed_to_the_shell() {
        assert!(matches!(classify("cd", HostPlatform::Unix), Dispatch::Execute(_)));
    }

    #[test]
    fn unix_passes_the_whole_line_as_one_argument() {
        assert_eq!(
            classify("ls -la | grep foo", HostPlatform::Unix),
            Dispatch::Execute(Invocation {
                program: "bash".to_string(),
                args: args(&["ls -la | grep foo"]),
            })
        );
    }

    #[test]
    fn unix_invocation_uses_the_untrimmed_input() {
        let invocation = build_invocation("  echo hi ", HostPlatform::Unix);
        assert_eq!(invocation.args, args(&["  echo hi "]));
    }

    #[test]
    fn windows_powershell_prefix_builds_a_command_invocation() {
        assert_eq!(
            classify("powershell Get-ChildItem", HostPlatform::Windows),
            Dispatch::Execute(Invocation {
                program: "powershell".to_string(),
                args: args(&["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", "Get-ChildItem"]),
            })
        );
        let upper = build_invocation("PowerShell Get-Date -Format o", HostPlatform::Windows);
        assert_eq!(upper.args.last().map(String::as_str), Some("Get-Date -Format o"));
    }

    #[test]
    fn windows_splits_on_single_spaces_without_quoting() {
        let invocation = build_invocation("echo \"a b\"  c", HostPlatform::Windows);
        assert_eq!(invocation.program, "powershell");
        assert_eq!(invocation.args, args(&["echo", "\"a", "b\"", "", "c"]));
    }

    #[test]
    fn platform_parses_from_config_strings() {
        assert_eq!("Windows".parse::<HostPlatform>().unwrap(), HostPlatform::Windows);
        assert_eq!("linux".parse::<HostPlatform>().unwrap(), HostPlatform::Unix);
        assert_eq!("auto".parse::<HostPlatform>().unwrap(), HostPlatform::detect());
        assert!("beos".parse::<HostPlatform>().is_err());
    }
}
