use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// One comic page, the atomic navigable item. Immutable after manifest load.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Strip {
    pub id: String,
    pub title: String,
    pub episode: String,
    #[serde(default)]
    pub episode_title: Option<String>,
    pub file: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Strip {
    /// Label shown above the strip title, e.g. `"ep1 · Beginnings"`.
    /// An empty episode title behaves the same as a missing one.
    pub fn episode_label(&self) -> String {
        match self.episode_title.as_deref().filter(|t| !t.is_empty()) {
            Some(title) => format!("{} \u{b7} {}", self.episode, title),
            None => self.episode.clone(),
        }
    }

    /// Notes URL, treating an empty string as no notes.
    pub fn notes_url(&self) -> Option<&str> {
        self.notes.as_deref().filter(|u| !u.is_empty())
    }
}

/// The static site manifest. `strips` order defines navigation order.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    pub subtitle: String,
    pub strips: Vec<Strip>,
}

/// A named grouping of strips sharing an `episode` key, derived from the
/// manifest once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub strips: Vec<Strip>,
}

impl Episode {
    pub fn heading(&self) -> String {
        format!("{} \u{2014} {} ({})", self.id, self.title, self.strips.len())
    }
}

/// Groups strips by `episode`, preserving first-seen order of episodes and
/// manifest order of strips within each.
pub fn group_episodes(strips: &[Strip]) -> Vec<Episode> {
    let mut episodes: Vec<Episode> = Vec::new();
    for strip in strips {
        match episodes.iter_mut().find(|ep| ep.id == strip.episode) {
            Some(ep) => ep.strips.push(strip.clone()),
            None => episodes.push(Episode {
                id: strip.episode.clone(),
                title: strip
                    .episode_title
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(&strip.episode)
                    .to_string(),
                strips: vec![strip.clone()],
            }),
        }
    }
    episodes
}

/// The one piece of mutable navigation state: a position inside the loaded
/// manifest. Transitions are pure; the component owns the signal it feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub index: usize,
    pub total: usize,
}

impl ViewState {
    /// Prev/next transition. Out-of-range targets are a no-op, not a wrap.
    pub fn step(self, dir: i32) -> Option<Self> {
        let next = self.index as i64 + dir as i64;
        if next < 0 || next >= self.total as i64 {
            return None;
        }
        Some(Self {
            index: next as usize,
            total: self.total,
        })
    }

    /// Transition for an externally changed hash. `None` when the target is
    /// out of range or already current, which short-circuits the re-render
    /// triggered by our own fragment writes.
    pub fn jump(self, index: usize) -> Option<Self> {
        if index >= self.total || index == self.index {
            return None;
        }
        Some(Self {
            index,
            total: self.total,
        })
    }

    pub fn at_first(&self) -> bool {
        self.index == 0
    }

    pub fn at_last(&self) -> bool {
        self.index + 1 == self.total
    }

    pub fn counter(&self) -> String {
        format!("{} / {}", self.index + 1, self.total)
    }
}

/// Resolves a URL fragment (with or without the leading `#`) to a strip
/// position. Unknown or empty fragments resolve to nothing.
pub fn resolve_hash(strips: &[Strip], hash: &str) -> Option<usize> {
    let id = hash.strip_prefix('#').unwrap_or(hash);
    if id.is_empty() {
        return None;
    }
    strips.iter().position(|s| s.id == id)
}

/// Arrow-key navigation must not hijack text editing.
pub fn is_text_entry_tag(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("input") || tag.eq_ignore_ascii_case("textarea")
}

/// Renders the restricted Markdown subset used by strip notes: paragraphs,
/// bold, italic, line breaks. Content is escaped before any substitution so
/// manifest or notes text can never introduce executable markup. Total:
/// worst case produces oddly escaped text.
pub fn render_markdown(text: &str) -> String {
    static RE_PARA: OnceLock<Regex> = OnceLock::new();
    static RE_BOLD: OnceLock<Regex> = OnceLock::new();
    static RE_ITALIC: OnceLock<Regex> = OnceLock::new();

    let re_para = RE_PARA.get_or_init(|| Regex::new(r"\n{2,}").unwrap());
    let re_bold = RE_BOLD.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
    let re_italic = RE_ITALIC.get_or_init(|| Regex::new(r"\*(.+?)\*").unwrap());

    re_para
        .split(text)
        .map(|para| {
            let escaped = escape_html(para.trim());
            let strong = re_bold.replace_all(&escaped, "<strong>$1</strong>");
            let em = re_italic.replace_all(&strong, "<em>$1</em>");
            format!("<p>{}</p>", em.replace('\n', "<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// What the notes panel should show for one fetch outcome. `None` input
/// means the fetch failed (network error or non-success status).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotesView {
    Hidden,
    Shown(String),
}

pub fn notes_view(fetched: Option<&str>) -> NotesView {
    match fetched.map(str::trim) {
        Some(body) if !body.is_empty() => NotesView::Shown(render_markdown(body)),
        _ => NotesView::Hidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(id: &str, episode: &str, episode_title: Option<&str>) -> Strip {
        Strip {
            id: id.to_string(),
            title: format!("Strip {id}"),
            episode: episode.to_string(),
            episode_title: episode_title.map(str::to_string),
            file: format!("strips/{id}.svg"),
            notes: None,
        }
    }

    fn fixture() -> Vec<Strip> {
        vec![
            strip("s1", "ep1", Some("Beginnings")),
            strip("s2", "ep1", Some("Beginnings")),
            strip("s3", "ep2", None),
        ]
    }

    #[test]
    fn step_clamps_at_boundaries() {
        let first = ViewState { index: 0, total: 3 };
        assert_eq!(first.step(-1), None);
        assert_eq!(first.step(1), Some(ViewState { index: 1, total: 3 }));

        let last = ViewState { index: 2, total: 3 };
        assert_eq!(last.step(1), None);
        assert_eq!(last.step(-1), Some(ViewState { index: 1, total: 3 }));
    }

    #[test]
    fn jump_ignores_current_and_out_of_range() {
        let state = ViewState { index: 1, total: 3 };
        assert_eq!(state.jump(1), None);
        assert_eq!(state.jump(3), None);
        assert_eq!(state.jump(0), Some(ViewState { index: 0, total: 3 }));
    }

    #[test]
    fn hash_round_trips_for_every_strip() {
        let strips = fixture();
        for (i, s) in strips.iter().enumerate() {
            let fragment = format!("#{}", s.id);
            assert_eq!(resolve_hash(&strips, &fragment), Some(i));
        }
    }

    #[test]
    fn unknown_or_empty_hash_resolves_to_nothing() {
        let strips = fixture();
        assert_eq!(resolve_hash(&strips, "#nope"), None);
        assert_eq!(resolve_hash(&strips, "#"), None);
        assert_eq!(resolve_hash(&strips, ""), None);
    }

    #[test]
    fn counter_is_one_based() {
        let state = ViewState {
            index: 2,
            total: 10,
        };
        assert_eq!(state.counter(), "3 / 10");
        assert!(!state.at_first());
        assert!(!state.at_last());
        assert!(ViewState { index: 0, total: 10 }.at_first());
        assert!(ViewState { index: 9, total: 10 }.at_last());
    }

    #[test]
    fn groups_strips_by_episode_in_first_seen_order() {
        let episodes = group_episodes(&fixture());
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].id, "ep1");
        assert_eq!(episodes[0].title, "Beginnings");
        assert_eq!(episodes[0].strips.len(), 2);
        assert_eq!(episodes[0].strips[0].id, "s1");
        assert_eq!(episodes[0].strips[1].id, "s2");
        assert_eq!(episodes[1].id, "ep2");
        assert_eq!(episodes[1].title, "ep2");
        assert_eq!(episodes[1].strips.len(), 1);
        assert_eq!(episodes[1].heading(), "ep2 \u{2014} ep2 (1)");
    }

    #[test]
    fn episode_label_falls_back_to_bare_id() {
        let with_title = strip("s1", "ep1", Some("Beginnings"));
        assert_eq!(with_title.episode_label(), "ep1 \u{b7} Beginnings");

        let without = strip("s3", "ep2", None);
        assert_eq!(without.episode_label(), "ep2");

        let empty = strip("s4", "ep3", Some(""));
        assert_eq!(empty.episode_label(), "ep3");
    }

    #[test]
    fn renders_bold_and_italic_in_one_paragraph() {
        assert_eq!(
            render_markdown("**a** and *b*"),
            "<p><strong>a</strong> and <em>b</em></p>"
        );
    }

    #[test]
    fn emphasis_is_non_greedy() {
        assert_eq!(
            render_markdown("**a** x **b**"),
            "<p><strong>a</strong> x <strong>b</strong></p>"
        );
    }

    #[test]
    fn escapes_markup_before_substitution() {
        assert_eq!(render_markdown("<script>"), "<p>&lt;script&gt;</p>");
        assert_eq!(render_markdown("a & b"), "<p>a &amp; b</p>");
        // Ampersand is escaped first, so entity-looking input stays inert.
        assert_eq!(render_markdown("&lt;"), "<p>&amp;lt;</p>");
    }

    #[test]
    fn splits_paragraphs_on_blank_lines() {
        assert_eq!(
            render_markdown("Para1\n\nPara2"),
            "<p>Para1</p>\n<p>Para2</p>"
        );
        assert_eq!(
            render_markdown("Para1\n\n\n\nPara2"),
            "<p>Para1</p>\n<p>Para2</p>"
        );
    }

    #[test]
    fn single_newlines_become_line_breaks() {
        assert_eq!(render_markdown("line1\nline2"), "<p>line1<br>line2</p>");
    }

    #[test]
    fn notes_view_hides_failures_and_blank_bodies() {
        assert_eq!(notes_view(None), NotesView::Hidden);
        assert_eq!(notes_view(Some("")), NotesView::Hidden);
        assert_eq!(notes_view(Some("   \n\t ")), NotesView::Hidden);
    }

    #[test]
    fn notes_view_renders_non_empty_bodies() {
        assert_eq!(
            notes_view(Some("  **hi**  ")),
            NotesView::Shown("<p><strong>hi</strong></p>".to_string())
        );
    }

    #[test]
    fn strip_without_notes_has_no_url() {
        let mut s = strip("s1", "ep1", None);
        assert_eq!(s.notes_url(), None);
        s.notes = Some(String::new());
        assert_eq!(s.notes_url(), None);
        s.notes = Some("notes/s1.md".to_string());
        assert_eq!(s.notes_url(), Some("notes/s1.md"));
    }

    #[test]
    fn text_entry_tags_suppress_arrow_navigation() {
        assert!(is_text_entry_tag("INPUT"));
        assert!(is_text_entry_tag("TEXTAREA"));
        assert!(is_text_entry_tag("input"));
        assert!(!is_text_entry_tag("BODY"));
        assert!(!is_text_entry_tag("BUTTON"));
    }

    #[test]
    fn manifest_decodes_with_optional_fields_missing() {
        let json = r#"{
            "subtitle": "a weekly strip",
            "strips": [
                { "id": "s1", "title": "One", "episode": "ep1",
                  "episode_title": "Beginnings", "file": "strips/s1.svg",
                  "notes": "notes/s1.md" },
                { "id": "s2", "title": "Two", "episode": "ep1",
                  "file": "strips/s2.svg" }
            ]
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.subtitle, "a weekly strip");
        assert_eq!(manifest.strips.len(), 2);
        assert_eq!(manifest.strips[0].notes_url(), Some("notes/s1.md"));
        assert_eq!(manifest.strips[1].episode_title, None);
        assert_eq!(manifest.strips[1].notes_url(), None);
    }
}
