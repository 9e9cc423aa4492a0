//! Server-rendered HTML. Pages are assembled with `format!`; every
//! user-supplied string goes through [`escape`].

use std::fmt::Write;

use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::CookieJar;

use quill_db::models::{ChapterRow, DraftRow, NovelRow, SettingsRow, UserRow};
use quill_types::models::{AuthorStats, NovelStatus, Role};

use crate::admin::Overview;
use crate::catalog::{ChapterView, NovelDetail};
use crate::drafts::DraftEditor;
use crate::flash;
use crate::guard::Capability;
use crate::middleware::Session;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Plain text to paragraphs, one per blank-line-separated block.
fn paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p).replace('\n', "<br>")))
        .collect()
}

fn nav(viewer: Option<&Session>) -> String {
    match viewer {
        None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
        Some(session) => {
            let mut links = String::from(
                r#"<a href="/author/dashboard">Dashboard</a> <a href="/author/settings">Settings</a> "#,
            );
            if session.role.is_admin() {
                links.push_str(r#"<a href="/admin">Admin</a> "#);
            }
            let _ = write!(
                links,
                r#"<span class="user">{}</span> <a href="/logout">Log out</a>"#,
                escape(&session.username)
            );
            links
        }
    }
}

fn page(title: &str, nav: &str, flashes: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Quill</title>
<style>
body {{ font-family: Georgia, serif; max-width: 52rem; margin: 0 auto; padding: 1rem; }}
header {{ display: flex; justify-content: space-between; border-bottom: 1px solid #ccc; }}
.flash {{ padding: .5rem; margin: .5rem 0; }}
.success {{ background: #e6f4ea; }} .info {{ background: #e8f0fe; }}
.warning {{ background: #fef7e0; }} .danger {{ background: #fce8e6; }}
.inline {{ display: inline; }}
textarea {{ width: 100%; min-height: 12rem; }}
</style>
</head>
<body>
<header><a href="/"><strong>Quill</strong></a><nav>{nav}</nav></header>
{flashes}
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    )
}

/// Wrap a page body in the site layout, draining queued flash messages.
pub fn render(jar: CookieJar, viewer: Option<&Session>, title: &str, body: String) -> Response {
    let (jar, flashes) = flash::take(jar);
    let flashes: String = flashes
        .iter()
        .map(|f| format!(r#"<div class="flash {}">{}</div>"#, f.level.as_str(), escape(&f.message)))
        .collect();
    (jar, Html(page(title, &nav(viewer), &flashes, &body))).into_response()
}

pub fn not_found(what: &str) -> String {
    page(
        "Not found",
        "",
        "",
        &format!(r#"<h1>Not found</h1><p>That {} does not exist.</p><p><a href="/">Home</a></p>"#, escape(what)),
    )
}

pub fn internal_error() -> String {
    page(
        "Error",
        "",
        "",
        r#"<h1>Something went wrong</h1><p>Please try again later.</p><p><a href="/">Home</a></p>"#,
    )
}

// -- Public pages --

fn novel_card(novel: &NovelRow) -> String {
    let cover = if novel.cover_image.is_empty() {
        String::new()
    } else {
        format!(r#"<img src="{}" alt="" width="96"> "#, escape(&novel.cover_image))
    };
    format!(
        r#"<li>{cover}<a href="/novel/{id}">{title}</a> by {author} <small>({status}, updated {updated})</small></li>"#,
        id = novel.id,
        title = escape(&novel.title),
        author = escape(&novel.author_username),
        status = novel.status,
        updated = escape(&novel.updated_at),
    )
}

pub fn index(novels: &[NovelRow]) -> String {
    if novels.is_empty() {
        return "<h1>Latest novels</h1><p>Nothing published yet.</p>".into();
    }
    let items: String = novels.iter().map(novel_card).collect();
    format!("<h1>Latest novels</h1><ul>{items}</ul>")
}

pub fn register_form() -> String {
    r#"<h1>Register</h1>
<form method="post" action="/register">
<label>Username <input name="username" required></label><br>
<label>Email <input name="email" type="email" required></label><br>
<label>Password <input name="password" type="password" required></label><br>
<button>Register</button>
</form>"#
        .into()
}

pub fn login_form() -> String {
    r#"<h1>Log in</h1>
<form method="post" action="/login">
<label>Username <input name="username" required></label><br>
<label>Password <input name="password" type="password" required></label><br>
<button>Log in</button>
</form>"#
        .into()
}

fn toc(novel_id: i64, chapters: &[ChapterRow]) -> String {
    let items: String = chapters
        .iter()
        .map(|c| {
            format!(
                r#"<li><a href="/read/{novel_id}/{n}">Chapter {n}: {title}</a></li>"#,
                n = c.chapter_number,
                title = escape(&c.title),
            )
        })
        .collect();
    format!("<ol class=\"toc\">{items}</ol>")
}

fn comment_form(novel_id: i64, chapter_id: Option<i64>) -> String {
    let chapter = chapter_id
        .map(|id| format!(r#"<input type="hidden" name="chapter_id" value="{id}">"#))
        .unwrap_or_default();
    format!(
        r#"<form method="post" action="/comment/{novel_id}">{chapter}
<textarea name="content" required></textarea><br><button>Post comment</button></form>"#
    )
}

pub fn novel_detail(detail: &NovelDetail, viewer: Option<&Session>) -> String {
    let novel = &detail.novel;
    let mut out = format!(
        "<h1>{}</h1><p>by {} · {}</p>{}",
        escape(&novel.title),
        escape(&novel.author_username),
        novel.status,
        paragraphs(&novel.description),
    );

    if let Some(session) = viewer {
        if session.can(Capability::Owner(novel.author_id)) {
            let _ = write!(
                out,
                r#"<p><a href="/author/novel/{id}/chapter/new">New chapter</a> · <a href="/author/novel/{id}/drafts">Drafts</a></p>"#,
                id = novel.id
            );
        }
        if session.can(Capability::OwnerOrAdmin(novel.author_id)) {
            let _ = write!(out, r#"<p><a href="/author/novel/{}/edit">Edit novel</a></p>"#, novel.id);
        }
    }

    out.push_str("<h2>Chapters</h2>");
    if detail.chapters.is_empty() {
        out.push_str("<p>No chapters yet.</p>");
    } else {
        out.push_str(&toc(novel.id, &detail.chapters));
    }

    out.push_str("<h2>Recent comments</h2>");
    for c in &detail.comments {
        let _ = write!(
            out,
            "<div class=\"comment\"><strong>{}</strong> <small>{}</small><p>{}</p></div>",
            escape(&c.username),
            escape(&c.created_at),
            escape(&c.content),
        );
    }
    if viewer.is_some() {
        out.push_str(&comment_form(novel.id, None));
    } else {
        out.push_str(r#"<p><a href="/login">Log in</a> to comment.</p>"#);
    }
    out
}

pub fn read(novel: &NovelRow, view: &ChapterView, chapters: &[ChapterRow], viewer: Option<&Session>) -> String {
    let chapter = &view.chapter;
    let link = |c: &Option<ChapterRow>, label: &str| match c {
        Some(c) => format!(r#"<a href="/read/{}/{}">{label}</a>"#, novel.id, c.chapter_number),
        None => String::new(),
    };

    let mut out = format!(
        r#"<p><a href="/novel/{id}">{novel}</a></p><h1>Chapter {n}: {title}</h1>{content}"#,
        id = novel.id,
        novel = escape(&novel.title),
        n = chapter.chapter_number,
        title = escape(&chapter.title),
        content = paragraphs(&chapter.content),
    );
    if !chapter.author_note.trim().is_empty() {
        let _ = write!(out, r#"<aside class="note"><h3>Author's note</h3>{}</aside>"#, paragraphs(&chapter.author_note));
    }
    let _ = write!(
        out,
        r#"<nav class="pager">{} {}</nav>"#,
        link(&view.prev, "← Previous"),
        link(&view.next, "Next →")
    );

    if let Some(session) = viewer {
        if session.can(Capability::OwnerOrAdmin(novel.author_id)) {
            let _ = write!(
                out,
                r#"<p><a href="/author/chapter/{id}/edit">Edit chapter</a>
<form method="post" action="/author/chapter/{id}/delete" class="inline"><button>Delete chapter</button></form></p>"#,
                id = chapter.id
            );
        }
        out.push_str(&comment_form(novel.id, Some(chapter.id)));
    }

    let _ = write!(out, "<details><summary>Contents</summary>{}</details>", toc(novel.id, chapters));
    out
}

// -- Authoring --

pub fn dashboard(novels: &[NovelRow], stats: &AuthorStats) -> String {
    let mut out = format!(
        r#"<h1>Your novels</h1>
<p>{} novels · {} ongoing · {} chapters · {} comments</p>
<p><a href="/author/novel/new">Start a new novel</a></p>"#,
        novels.len(),
        stats.ongoing_novels,
        stats.total_chapters,
        stats.total_comments,
    );
    out.push_str("<ul>");
    for n in novels {
        let _ = write!(
            out,
            r#"<li><a href="/novel/{id}">{title}</a> ({status})
 <a href="/author/novel/{id}/edit">edit</a>
 <a href="/author/novel/{id}/chapter/new">new chapter</a>
 <a href="/author/novel/{id}/drafts">drafts</a>
 <form method="post" action="/author/novel/{id}/delete" class="inline"><button>delete</button></form></li>"#,
            id = n.id,
            title = escape(&n.title),
            status = n.status,
        );
    }
    out.push_str("</ul>");
    out
}

pub fn novel_form(existing: Option<&NovelRow>) -> String {
    let (action, heading) = match existing {
        Some(n) => (format!("/author/novel/{}/edit", n.id), "Edit novel"),
        None => ("/author/novel/new".to_string(), "New novel"),
    };
    let field = |get: fn(&NovelRow) -> &str| existing.map(|n| escape(get(n))).unwrap_or_default();

    let status = match existing {
        None => String::new(),
        Some(n) => {
            let options: String = [NovelStatus::Ongoing, NovelStatus::Completed]
                .iter()
                .map(|s| {
                    let selected = if *s == n.status { " selected" } else { "" };
                    format!(r#"<option value="{s}"{selected}>{s}</option>"#)
                })
                .collect();
            format!(r#"<label>Status <select name="status">{options}</select></label><br>"#)
        }
    };

    format!(
        r#"<h1>{heading}</h1>
<form method="post" action="{action}">
<label>Title <input name="title" value="{title}" required></label><br>
<label>Description<br><textarea name="description">{description}</textarea></label><br>
<label>Cover image URL <input name="cover_image" value="{cover}"></label><br>
{status}<button>Save</button>
</form>"#,
        title = field(|n| n.title.as_str()),
        description = field(|n| n.description.as_str()),
        cover = field(|n| n.cover_image.as_str()),
    )
}

pub fn chapter_form(novel: &NovelRow, existing: Option<&ChapterRow>) -> String {
    let (action, heading) = match existing {
        Some(c) => (format!("/author/chapter/{}/edit", c.id), format!("Edit chapter {}", c.chapter_number)),
        None => (format!("/author/novel/{}/chapter/new", novel.id), "New chapter".to_string()),
    };
    let field = |get: fn(&ChapterRow) -> &str| existing.map(|c| escape(get(c))).unwrap_or_default();

    format!(
        r#"<p><a href="/novel/{novel_id}">{novel}</a></p>
<h1>{heading}</h1>
<form method="post" action="{action}">
<label>Title <input name="title" value="{title}" required></label><br>
<label>Content<br><textarea name="content">{content}</textarea></label><br>
<label>Author's note<br><textarea name="author_note">{note}</textarea></label><br>
<button>Save</button>
</form>"#,
        novel_id = novel.id,
        novel = escape(&novel.title),
        title = field(|c| c.title.as_str()),
        content = field(|c| c.content.as_str()),
        note = field(|c| c.author_note.as_str()),
    )
}

pub fn drafts(novel: &NovelRow, drafts: &[DraftRow]) -> String {
    let mut out = format!(
        r#"<p><a href="/novel/{id}">{title}</a></p><h1>Drafts</h1>
<p><a href="/author/novel/{id}/draft/new">New draft</a></p><ul>"#,
        id = novel.id,
        title = escape(&novel.title),
    );
    for d in drafts {
        let state = match d.chapter_number {
            Some(n) if d.is_published => format!("published as chapter {n}"),
            _ => "unpublished".to_string(),
        };
        let _ = write!(
            out,
            r#"<li><a href="/author/draft/{id}">{title}</a> <small>{state}, saved {updated}</small>
 <form method="post" action="/author/draft/{id}/delete" class="inline"><button>delete</button></form></li>"#,
            id = d.id,
            title = escape(&d.title),
            updated = escape(&d.updated_at),
        );
    }
    out.push_str("</ul>");
    out
}

const EDITOR_SCRIPT: &str = r#"<script>
(function () {
  const form = document.getElementById('draft');
  const status = document.getElementById('save-status');
  let timer = null;
  async function save() {
    const body = { title: form.title.value, content: form.content.value };
    const resp = await fetch(form.dataset.save, {
      method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body)
    });
    const data = await resp.json();
    status.textContent = data.success ? 'Saved ' + data.updated_at : 'Save failed: ' + data.error;
  }
  form.addEventListener('input', function () {
    clearTimeout(timer);
    timer = setTimeout(save, 1500);
  });
  const assist = document.getElementById('assist');
  if (assist) {
    assist.addEventListener('click', async function () {
      const prompt = document.getElementById('assist-prompt').value;
      const out = document.getElementById('assist-result');
      out.textContent = 'Thinking...';
      const resp = await fetch('/author/ai/assist', {
        method: 'POST', headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ prompt: prompt, context: form.content.value })
      });
      const data = await resp.json();
      out.textContent = data.success ? data.result : data.error;
    });
  }
})();
</script>"#;

pub fn draft_editor(editor: &DraftEditor) -> String {
    let draft = &editor.draft;
    if draft.is_published {
        return format!(
            r#"<p><a href="/author/novel/{novel_id}/drafts">{novel} drafts</a></p>
<h1>{title}</h1>
<p>Published as <a href="/read/{novel_id}/{n}">chapter {n}</a>; the draft is read-only.</p>
{content}"#,
            novel_id = editor.novel.id,
            novel = escape(&editor.novel.title),
            title = escape(&draft.title),
            n = draft.chapter_number.unwrap_or_default(),
            content = paragraphs(&draft.content),
        );
    }

    let ai_configured = editor
        .settings
        .openai_api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty());
    let assist = if ai_configured {
        r#"<section><h2>Writing assistant</h2>
<input id="assist-prompt" placeholder="What should the assistant do?"> <button type="button" id="assist">Ask</button>
<pre id="assist-result"></pre></section>"#
            .to_string()
    } else {
        r#"<p><a href="/author/settings">Configure AI settings</a> to use the writing assistant.</p>"#.to_string()
    };
    let publish = format!(
        r#"<form method="post" action="/author/draft/{}/publish"><button>Publish as next chapter</button></form>"#,
        draft.id
    );

    format!(
        r#"<p><a href="/author/novel/{novel_id}/drafts">{novel} drafts</a></p>
<form id="draft" data-save="/author/draft/{id}/save" onsubmit="return false">
<input name="title" value="{title}"><br>
<textarea name="content">{content}</textarea>
</form>
<p id="save-status">Last saved {updated}</p>
{publish}
{assist}
{script}"#,
        novel_id = editor.novel.id,
        novel = escape(&editor.novel.title),
        id = draft.id,
        title = escape(&draft.title),
        content = escape(&draft.content),
        updated = escape(&draft.updated_at),
        script = EDITOR_SCRIPT,
    )
}

pub fn settings(user: &UserRow, settings: &SettingsRow) -> String {
    let opt = |v: &Option<String>| v.as_deref().map(escape).unwrap_or_default();
    format!(
        r#"<h1>Settings</h1>
<p>Signed in as {username} ({email})</p>
<form method="post" action="/author/settings">
<h2>Profile</h2>
<label>Nickname <input name="nickname" value="{nickname}"></label>
<h2>Change password</h2>
<label>Current password <input name="current_password" type="password"></label><br>
<label>New password <input name="new_password" type="password"></label><br>
<label>Confirm new password <input name="confirm_password" type="password"></label>
<h2>AI assistant</h2>
<label>API key <input name="openai_api_key" type="password" value="{key}"></label><br>
<label>Base URL <input name="openai_base_url" value="{base}" placeholder="https://api.deepseek.com"></label><br>
<label>Model <input name="openai_model" value="{model}" placeholder="gpt-3.5-turbo"></label><br>
<button>Save settings</button>
</form>"#,
        username = escape(&user.username),
        email = escape(&user.email),
        nickname = opt(&settings.nickname),
        key = opt(&settings.openai_api_key),
        base = opt(&settings.openai_base_url),
        model = opt(&settings.openai_model),
    )
}

// -- Administration --

pub fn admin(overview: &Overview, viewer: &Session) -> String {
    let s = &overview.stats;
    let mut out = format!(
        r#"<h1>Administration</h1>
<p>{} users ({} readers, {} admins, {} super admins)</p>
<p>{} novels ({} ongoing, {} completed) · {} chapters · {} comments</p>
<h2>Users</h2><table><tr><th>User</th><th>Email</th><th>Role</th><th>Joined</th></tr>"#,
        s.total_users,
        s.reader_count,
        s.admin_count,
        s.super_admin_count,
        s.total_novels,
        s.ongoing_novels,
        s.completed_novels,
        s.total_chapters,
        s.total_comments,
    );

    let may_assign = viewer.can(Capability::SuperAdmin);
    for u in &overview.users {
        let role = if may_assign {
            let options: String = Role::ALL
                .iter()
                .map(|r| {
                    let selected = if *r == u.role { " selected" } else { "" };
                    format!(r#"<option value="{r}"{selected}>{r}</option>"#)
                })
                .collect();
            format!(
                r#"<form method="post" action="/admin/user/{}/role" class="inline"><select name="role">{options}</select><button>Set</button></form>"#,
                u.id
            )
        } else {
            u.role.to_string()
        };
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&u.username),
            escape(&u.email),
            role,
            escape(&u.created_at),
        );
    }
    out.push_str("</table><h2>Novels</h2><ul>");
    for n in &overview.novels {
        out.push_str(&novel_card(n));
    }
    out.push_str("</ul>");
    out
}
