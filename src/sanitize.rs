use regex::{Captures, Regex};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeConfig {
    pub disabled: bool,
}

pub const HTML_COMMENT_MARKER: &str = "[HTML_COMMENT]";
pub const HTML_ELEMENT_MARKER: &str = "[HTML_ELEMENT]";
pub const SMALL_TEXT_MARKER: &str = "[SMALL_TEXT]";
const DEFAULT_SUMMARY: &str = "Collapsed section";

const PAIRED_ELEMENTS: [&str; 7] = ["script", "style", "iframe", "object", "embed", "svg", "math"];

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static PAIRED_ELEMENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PAIRED_ELEMENTS
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>")).expect("valid regex")
        })
        .collect()
});

// Openers, self-closing forms and closers left after paired removal, plus <link>.
static STRAY_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)</?(?:script|style|iframe|object|embed|svg|math|link)\b[^>]*>")
        .expect("valid regex")
});

static SMALL_FONT_OPEN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<([a-z][a-z0-9-]*)\b[^>]*\bstyle\s*=\s*(?:"[^"]*?|'[^']*?)font-size\s*:\s*(?:0\.\d+|[0-3])\s*(?:px|pt|em|%)[^>]*>"#,
    )
    .expect("valid regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([a-zA-Z][a-zA-Z0-9-]*)(\s[^<>]*?)?(/?)>").expect("valid regex")
});

static HIDING_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\s+(?:style|class|hidden|data-[\w.:-]*)\b(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?"#,
    )
    .expect("valid regex")
});

static DETAILS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<details\b[^>]*>(.*?)</details\s*>").expect("valid regex")
});

static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<summary\b[^>]*>(.*?)</summary\s*>").expect("valid regex")
});

static MANY_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));
static MANY_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {15,}").expect("valid regex"));
static MANY_TABS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\t{6,}").expect("valid regex"));

pub fn sanitize(input: &str, config: &SanitizeConfig) -> String {
    if config.disabled || input.is_empty() {
        return input.to_string();
    }
    let text = remove_invisible_characters(input);
    let text = remove_markup(&text);
    // Runs ahead of attribute stripping, which would otherwise erase the style
    // attribute it looks for.
    let text = replace_small_text(&text);
    let text = strip_hiding_attributes(&text);
    // Dropping <summary> can splice its neighbours into a new comment or tag.
    let mut text = expand_details(&text);
    loop {
        let next = remove_markup(&text);
        if next == text {
            break;
        }
        text = next;
    }
    collapse_whitespace(&text)
}

fn remove_markup(s: &str) -> String {
    let text = HTML_COMMENT.replace_all(s, HTML_COMMENT_MARKER);
    remove_dangerous_elements(&text)
}

pub fn is_invisible(c: char) -> bool {
    matches!(c as u32,
        0x200B..=0x200F | 0x2028..=0x202E | 0x2060..=0x2064 | 0xFEFF)
}

fn remove_invisible_characters(s: &str) -> String {
    s.chars().filter(|c| !is_invisible(*c)).collect()
}

fn remove_dangerous_elements(s: &str) -> String {
    let mut text = s.to_string();
    for re in PAIRED_ELEMENT_RES.iter() {
        text = re.replace_all(&text, HTML_ELEMENT_MARKER).into_owned();
    }
    STRAY_ELEMENT
        .replace_all(&text, HTML_ELEMENT_MARKER)
        .into_owned()
}

/// Replace each element whose inline style sets a tiny font size, through its
/// matching close tag when there is one.
fn replace_small_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(caps) = SMALL_FONT_OPEN_TAG.captures(rest) {
        let Some(open) = caps.get(0) else { break };
        let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        out.push_str(&rest[..open.start()]);
        out.push_str(SMALL_TEXT_MARKER);
        let after_open = &rest[open.end()..];
        let self_closing = open.as_str().ends_with("/>");
        let consumed = if self_closing {
            0
        } else {
            find_close_tag(after_open, name).unwrap_or(0)
        };
        rest = &after_open[consumed..];
    }
    out.push_str(rest);
    out
}

/// Byte offset just past `</name>` in `s`, case-insensitive.
fn find_close_tag(s: &str, name: &str) -> Option<usize> {
    let needle = format!("</{}", name.to_ascii_lowercase());
    let lower = s.to_ascii_lowercase();
    let mut from = 0;
    while let Some(idx) = lower[from..].find(&needle) {
        let start = from + idx;
        let after = start + needle.len();
        let tail = &lower[after..];
        let trimmed = tail.trim_start();
        if trimmed.starts_with('>') {
            return Some(after + (tail.len() - trimmed.len()) + 1);
        }
        from = after;
    }
    None
}

fn strip_hiding_attributes(s: &str) -> String {
    TAG.replace_all(s, |caps: &Captures| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(attrs) = caps.get(2) else {
            return whole.to_string();
        };
        if !HIDING_ATTR.is_match(attrs.as_str()) {
            return whole.to_string();
        }
        let kept = HIDING_ATTR.replace_all(attrs.as_str(), "");
        format!("<{}{}{}>", &caps[1], kept, &caps[3])
    })
    .into_owned()
}

fn expand_details(s: &str) -> String {
    DETAILS
        .replace_all(s, |caps: &Captures| {
            let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let summary = SUMMARY
                .captures(inner)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
            let body = SUMMARY.replace(inner, "");
            format!("\n\n**{}:**\n{}\n\n", summary, body.trim())
        })
        .into_owned()
}

fn collapse_whitespace(s: &str) -> String {
    let s = MANY_NEWLINES.replace_all(s, "\n\n\n");
    let s = MANY_SPACES.replace_all(&s, " ".repeat(14).as_str());
    MANY_TABS.replace_all(&s, "\t\t\t\t\t").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(s: &str) -> String {
        sanitize(s, &SanitizeConfig::default())
    }

    #[test]
    fn disabled_or_empty_passes_through() {
        let raw = "<script>x</script>\u{200B}";
        assert_eq!(sanitize(raw, &SanitizeConfig { disabled: true }), raw);
        assert_eq!(run(""), "");
    }

    #[test]
    fn strips_invisible_characters() {
        assert_eq!(run("a\u{200B}b\u{202E}c\u{2063}d\u{FEFF}e"), "abcde");
        assert!(run("\u{200F}x\u{2028}").chars().all(|c| !is_invisible(c)));
    }

    #[test]
    fn replaces_html_comments_non_greedy() {
        assert_eq!(
            run("a<!-- one -->b<!-- two -->c"),
            "a[HTML_COMMENT]b[HTML_COMMENT]c"
        );
    }

    #[test]
    fn replaces_dangerous_elements() {
        assert_eq!(
            run("x<script type=\"a\">alert(1)</script>y"),
            "x[HTML_ELEMENT]y"
        );
        assert_eq!(run("<STYLE>p{}</STYLE>"), "[HTML_ELEMENT]");
        assert_eq!(
            run("<link rel=\"stylesheet\" href=\"x\">ok"),
            "[HTML_ELEMENT]ok"
        );
        assert_eq!(run("<embed src=\"a\"/>"), "[HTML_ELEMENT]");
        let out = run("<svg><style>a</style></svg>");
        assert!(!out.to_lowercase().contains("<svg"));
        assert!(!out.to_lowercase().contains("<style"));
    }

    #[test]
    fn invisible_chars_cannot_smuggle_tags() {
        let out = run("<scr\u{200B}ipt>bad()</scr\u{200B}ipt>");
        assert_eq!(out, "[HTML_ELEMENT]");
    }

    #[test]
    fn strips_only_hiding_attributes() {
        assert_eq!(
            run(r#"<span class="x" data-id='1' title="t" hidden>hi</span>"#),
            r#"<span title="t">hi</span>"#
        );
        assert_eq!(run(r#"<a href="u">l</a>"#), r#"<a href="u">l</a>"#);
    }

    #[test]
    fn expands_details_sections() {
        assert_eq!(
            run("<details><summary>More</summary>hidden body</details>"),
            "\n\n**More:**\nhidden body\n\n"
        );
        assert_eq!(
            run("<details>just body</details>"),
            "\n\n**Collapsed section:**\njust body\n\n"
        );
    }

    #[test]
    fn replaces_tiny_text() {
        assert_eq!(
            run(r#"a<span style="font-size:0px">secret</span>b"#),
            "a[SMALL_TEXT]b"
        );
        assert_eq!(
            run(r#"<p style='color:red; font-size: 0.5em'>x</p>"#),
            "[SMALL_TEXT]"
        );
        assert_eq!(
            run(r#"<p style="font-size: 12px">big</p>"#),
            "<p>big</p>"
        );
    }

    #[test]
    fn collapses_whitespace_runs() {
        assert_eq!(run("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(run(&format!("a{}b", " ".repeat(40))), format!("a{}b", " ".repeat(14)));
        assert_eq!(run("a\t\t\t\t\t\t\t\tb"), "a\t\t\t\t\tb");
        assert_eq!(run("a   b"), "a   b");
    }

    #[test]
    fn summary_removal_cannot_assemble_markup() {
        let out = run("<details><scr<summary>S</summary>ipt>alert(1)</script></details>");
        assert!(!out.to_lowercase().contains("<script"), "{:?}", out);
        assert_eq!(out, "\n\n**S:**\n[HTML_ELEMENT]alert(1)[HTML_ELEMENT]\n\n");

        let out = run("<details><!-<summary>S</summary>- hidden --></details>");
        assert!(!out.contains("<!--"), "{:?}", out);
        assert_eq!(out, "\n\n**S:**\n[HTML_COMMENT]\n\n");
    }

    #[test]
    fn deterministic() {
        let s = "<details><summary>S</summary><!-- c --><b class=x>t</b></details>";
        assert_eq!(run(s), run(s));
    }
}
