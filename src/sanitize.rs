//! Turns stored file names back into something fit for a save dialog.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("token pattern is valid")
});
static HYPHENS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("valid"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid"));

/// Removes every uniqueness token (plus the whitespace that separated it from
/// the title), then collapses doubled hyphens and spaces and trims.
///
/// The pass is repeated until nothing changes, so the function is idempotent
/// even when collapsing would expose a new token.
pub fn strip_token(name: &str) -> String {
    let mut current = name.to_owned();
    loop {
        let next = strip_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn strip_once(name: &str) -> String {
    let without_token = TOKEN.replace_all(name, "");
    let hyphens = HYPHENS.replace_all(&without_token, "-");
    let spaces = SPACES.replace_all(&hyphens, " ");
    spaces.trim().to_owned()
}
