//! The single HTML page the form-based flow renders.

use axum::response::Html;

/// What the page shows below the form.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub download_url: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
    pub success: bool,
}

impl PageContext {
    pub fn ready(download_url: &str, filename: &str) -> Self {
        Self {
            download_url: Some(download_url.to_owned()),
            filename: Some(filename.to_owned()),
            error: None,
            success: true,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

pub fn render(ctx: &PageContext) -> Html<String> {
    let mut notice = String::new();
    if ctx.success
        && let (Some(url), Some(filename)) = (&ctx.download_url, &ctx.filename)
    {
        notice = format!(
            r#"<p class="success">Ready: <a href="{}" download="{}">{}</a></p>"#,
            escape(url),
            escape(filename),
            escape(filename)
        );
    } else if let Some(error) = &ctx.error {
        notice = format!(r#"<p class="error">{}</p>"#, escape(error));
    }

    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>fetchtube</title>
</head>
<body>
<h1>fetchtube</h1>
<form method="post" action="/download">
<input type="url" name="url" placeholder="https://" required>
<button type="submit">Download</button>
</form>
{notice}
</body>
</html>
"#
    ))
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_has_only_the_form() {
        let Html(body) = render(&PageContext::default());
        assert!(body.contains(r#"action="/download""#));
        assert!(!body.contains("class=\"error\""));
        assert!(!body.contains("class=\"success\""));
    }

    #[test]
    fn success_links_the_file() {
        let Html(body) = render(&PageContext::ready("/download/a b.mp4", "a.mp4"));
        assert!(body.contains(r#"href="/download/a b.mp4""#));
        assert!(body.contains(">a.mp4</a>"));
    }

    #[test]
    fn error_text_is_escaped() {
        let Html(body) = render(&PageContext::failed("<script>x</script>"));
        assert!(body.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!body.contains("<script>"));
    }
}
