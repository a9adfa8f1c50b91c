//! Neutralising messaging-platform addressing directives.
//!
//! Text that ends up in prompts or in posted notifications must never carry a
//! live mention: `<!here>`, `<!channel>`, `<!everyone>`, `<@USER>`,
//! `<!subteam^GROUP>` and bare `@` all notify third parties when posted.
//! Every `@` is replaced by the full-width `＠` (U+FF20), which renders the
//! same but is inert.

/// Full-width commercial at.
pub const SAFE_AT: char = '＠';

const USER_OPEN: &str = "<@";
const GROUP_OPEN: &str = "<!subteam^";

/// Rewrite every addressing directive in `text` into inert text.
///
/// `users` resolves a user id to a display name; unresolved users are
/// rendered as `＠<id>`. `groups` resolves a user-group id for directives
/// that carry no label; unresolved groups keep their id.
pub fn sanitize<U, G>(text: &str, users: U, groups: G) -> String
where
    U: Fn(&str) -> Option<String>,
    G: Fn(&str) -> Option<String>,
{
    let text = text
        .replace("<!here>", "[group] ＠here")
        .replace("<!channel>", "[group] ＠channel")
        .replace("<!everyone>", "[group] ＠everyone");

    let text = replace_directives(&text, USER_OPEN, |inner| {
        let id = inner.split('|').next().unwrap_or(inner);
        match users(id) {
            Some(name) => format!("[user] {SAFE_AT}{name}"),
            None => format!("{SAFE_AT}{id}"),
        }
    });

    let text = replace_directives(&text, GROUP_OPEN, |inner| {
        let name = match inner.split_once('|') {
            Some((_, label)) if !label.is_empty() => label.to_string(),
            Some((id, _)) => groups(id).unwrap_or_else(|| id.to_string()),
            None => groups(inner).unwrap_or_else(|| inner.to_string()),
        };
        format!("[group] {SAFE_AT}{name}")
    });

    text.replace('@', &SAFE_AT.to_string())
}

/// [`sanitize`] without user or group directories.
pub fn sanitize_plain(text: &str) -> String {
    sanitize(text, |_| None, |_| None)
}

/// User ids referenced through `<@ID>` / `<@ID|label>` directives, in order of
/// appearance and without duplicates.
pub fn referenced_user_ids(text: &str) -> Vec<String> {
    referenced_ids(text, USER_OPEN, true)
}

/// Ids of `<!subteam^ID>` directives without a label. Labelled group
/// mentions already carry their name.
pub fn referenced_group_ids(text: &str) -> Vec<String> {
    referenced_ids(text, GROUP_OPEN, false)
}

fn referenced_ids(text: &str, open: &str, include_labelled: bool) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find('>') else {
            break;
        };
        let inner = &after_open[..end];
        let (id, label) = inner.split_once('|').unwrap_or((inner, ""));
        let wanted = include_labelled || label.is_empty();
        if wanted && !id.is_empty() && !ids.iter().any(|known| known == id) {
            ids.push(id.to_string());
        }
        rest = &after_open[end + 1..];
    }
    ids
}

/// Replace each `open ... >` span with `render(inner)`. An unterminated
/// directive is left untouched.
fn replace_directives<F>(text: &str, open: &str, mut render: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find('>') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&render(&after_open[..end]));
        rest = &after_open[end + 1..];
    }
    out.push_str(rest);
    out
}
