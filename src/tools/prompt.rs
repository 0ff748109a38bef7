use std::time::Duration;

/// Foreground commands slower than this are reported in the next prompt.
pub const SLOW_COMMAND: Duration = Duration::from_secs(2);

/// `<user@host:path>` with an optional `name : Ns` for a slow command.
pub fn render(user: &str, host: &str, path: &str, slow: Option<(&str, Duration)>) -> String {
    match slow {
        Some((name, elapsed)) => {
            format!("<{user}@{host}:{path} {name} : {}s> ", elapsed.as_secs())
        }
        None => format!("<{user}@{host}:{path}> "),
    }
}

pub fn user_name() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .unwrap_or_else(|| "user".to_string())
}

pub fn host_name() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_prompt() {
        assert_eq!(render("me", "box", "~/src", None), "<me@box:~/src> ");
    }

    #[test]
    fn slow_command_is_shown_in_whole_seconds() {
        assert_eq!(
            render("me", "box", "~", Some(("sleep", Duration::from_millis(5300)))),
            "<me@box:~ sleep : 5s> "
        );
    }
}
