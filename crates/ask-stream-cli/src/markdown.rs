//! Markdown to ratatui text conversion.
//!
//! Converts answer markdown to styled ratatui Lines for terminal display
//! with syntax highlighting for code blocks. Link targets are printed after
//! the link text, resolved against the documentation site.

use std::sync::OnceLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const THEME: &str = "base16-ocean.dark";

/// Convert markdown text to styled ratatui Lines.
///
/// `available_width` is used to properly handle code blocks - code lines
/// longer than this will be truncated rather than wrapped to avoid
/// line number overlap issues.
pub fn render_markdown(text: &str, available_width: usize) -> Vec<Line<'static>> {
    let renderer = MarkdownRenderer::new(available_width);
    renderer.render(text)
}

/// Resolve a link target from an answer.
///
/// Absolute `http(s)` links are kept. Anything else is treated as a path on
/// the documentation site.
pub fn resolve_link(dest: &str) -> String {
    if dest.starts_with("http") || dest.starts_with('/') || dest.starts_with('#') {
        dest.to_string()
    } else {
        format!("/{dest}")
    }
}

/// Map a fence language to the one used for highlighting.
pub fn code_language(lang: &str) -> &str {
    match lang {
        // Canopy templates are Twig.
        "canvas" => "twig",
        other => other,
    }
}

/// Syntax highlighter using syntect.
struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
}

impl SyntaxHighlighter {
    /// Shared instance; loading the default sets is slow.
    fn shared() -> &'static Self {
        static HIGHLIGHTER: OnceLock<SyntaxHighlighter> = OnceLock::new();
        HIGHLIGHTER.get_or_init(|| Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
        })
    }

    /// Highlight code and return styled spans for each line.
    fn highlight(&self, code: &str, lang: &str) -> Vec<Vec<Span<'static>>> {
        let Some(theme) = self.theme_set.themes.get(THEME) else {
            return plain_lines(code);
        };
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut result = Vec::new();

        for line in LinesWithEndings::from(code) {
            let mut spans = Vec::new();

            match highlighter.highlight_line(line, &self.syntax_set) {
                Ok(ranges) => {
                    for (style, text) in ranges {
                        let fg = Color::Rgb(style.foreground.r, style.foreground.g, style.foreground.b);
                        let mut ratatui_style = Style::default().fg(fg);

                        if style.font_style.contains(FontStyle::BOLD) {
                            ratatui_style = ratatui_style.add_modifier(Modifier::BOLD);
                        }
                        if style.font_style.contains(FontStyle::ITALIC) {
                            ratatui_style = ratatui_style.add_modifier(Modifier::ITALIC);
                        }

                        let text = text.trim_end_matches(['\n', '\r']);
                        if !text.is_empty() {
                            spans.push(Span::styled(text.to_string(), ratatui_style));
                        }
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, lang, "Highlighting failed, using plain text");
                    spans.push(plain_span(line));
                }
            }

            result.push(spans);
        }

        result
    }
}

fn plain_span(line: &str) -> Span<'static> {
    Span::styled(
        line.trim_end_matches(['\n', '\r']).to_string(),
        Style::default().fg(Color::Yellow),
    )
}

fn plain_lines(code: &str) -> Vec<Vec<Span<'static>>> {
    LinesWithEndings::from(code).map(|line| vec![plain_span(line)]).collect()
}

/// Markdown renderer state.
struct MarkdownRenderer {
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    in_code_block: bool,
    code_block_content: String,
    code_block_lang: Option<String>,
    list_depth: usize,
    ordered_list_index: Option<u64>,
    link_target: Option<String>,
    available_width: usize,
}

impl MarkdownRenderer {
    fn new(available_width: usize) -> Self {
        Self {
            lines: Vec::new(),
            current_spans: Vec::new(),
            style_stack: vec![Style::default()],
            in_code_block: false,
            code_block_content: String::new(),
            code_block_lang: None,
            list_depth: 0,
            ordered_list_index: None,
            link_target: None,
            available_width,
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, modifier: Modifier) {
        let new_style = self.current_style().add_modifier(modifier);
        self.style_stack.push(new_style);
    }

    fn push_color_style(&mut self, fg: Color) {
        let new_style = self.current_style().fg(fg);
        self.style_stack.push(new_style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn flush_line(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = std::mem::take(&mut self.current_spans);
            self.lines.push(Line::from(spans));
        }
    }

    fn add_blank_line(&mut self) {
        self.flush_line();
        self.lines.push(Line::from(""));
    }

    fn add_text(&mut self, text: &str) {
        if self.in_code_block {
            self.code_block_content.push_str(text);
            return;
        }

        let style = self.current_style();

        let parts: Vec<&str> = text.split('\n').collect();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.flush_line();
                // Consecutive newlines are an intentional blank line.
                if part.is_empty() && i < parts.len() - 1 {
                    self.lines.push(Line::from(""));
                }
            }

            if !part.is_empty() {
                self.current_spans.push(Span::styled((*part).to_string(), style));
            }
        }
    }

    fn render_code_block(&mut self) {
        let content = std::mem::take(&mut self.code_block_content);
        let lang = self.code_block_lang.take().unwrap_or_default();

        self.flush_line();

        let gutter_style = Style::default().fg(Color::DarkGray);
        let line_num_style = Style::default().fg(Color::Rgb(100, 100, 100));

        let num_lines = content.lines().count();
        let show_line_nums = num_lines > 1;
        let line_num_width = if show_line_nums {
            num_lines.to_string().len()
        } else {
            0
        };

        // "│ " + line number + " │ ", or "│ " + padding
        let prefix_width = if show_line_nums {
            2 + line_num_width + 3
        } else {
            4
        };
        let max_code_width = self.available_width.saturating_sub(prefix_width + 2);

        let mut header = vec![Span::styled("┌", gutter_style)];
        let mut used = 1;
        if !lang.is_empty() {
            header.push(Span::styled("─ ", gutter_style));
            header.push(Span::styled(lang.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));
            header.push(Span::raw(" "));
            used += lang.chars().count() + 3;
        }
        header.push(Span::styled(
            "─".repeat(self.available_width.saturating_sub(used + 1).min(44)),
            gutter_style,
        ));
        self.lines.push(Line::from(header));

        let highlighted_lines = SyntaxHighlighter::shared().highlight(&content, &lang);

        for (i, highlighted_spans) in highlighted_lines.iter().enumerate() {
            let mut spans = vec![Span::styled("│ ", gutter_style)];

            if show_line_nums {
                spans.push(Span::styled(
                    format!("{:>width$}", i + 1, width = line_num_width),
                    line_num_style,
                ));
                spans.push(Span::styled(" │ ", gutter_style));
            }

            let code_width: usize = highlighted_spans.iter().map(Span::width).sum();

            if code_width <= max_code_width {
                spans.extend(highlighted_spans.iter().cloned());
            } else {
                let mut remaining = max_code_width.saturating_sub(1); // room for the ellipsis
                for span in highlighted_spans {
                    if remaining == 0 {
                        break;
                    }
                    let width = span.width();
                    if width <= remaining {
                        spans.push(span.clone());
                        remaining -= width;
                    } else {
                        let truncated: String = span.content.chars().take(remaining).collect();
                        spans.push(Span::styled(truncated, span.style));
                        remaining = 0;
                    }
                }
                spans.push(Span::styled("…", Style::default().fg(Color::DarkGray)));
            }

            self.lines.push(Line::from(spans));
        }

        self.lines.push(Line::from(vec![
            Span::styled("└", gutter_style),
            Span::styled("─".repeat(self.available_width.saturating_sub(2).min(44)), gutter_style),
        ]));
        self.lines.push(Line::from(""));
    }

    fn render(mut self, text: &str) -> Vec<Line<'static>> {
        let parser = Parser::new_ext(text, Options::empty());

        for event in parser {
            match event {
                Event::Start(tag) => self.handle_start_tag(tag),
                Event::End(tag) => self.handle_end_tag(tag),
                Event::Text(text) => self.add_text(&text),
                Event::Code(code) => {
                    self.current_spans.push(Span::styled(
                        format!("`{code}`"),
                        Style::default().fg(Color::Yellow).bg(Color::Rgb(40, 40, 40)),
                    ));
                }
                Event::SoftBreak => self.current_spans.push(Span::raw(" ")),
                Event::HardBreak => self.flush_line(),
                _ => {}
            }
        }

        // A fence still open mid-stream is shown as it stands.
        if self.in_code_block {
            self.in_code_block = false;
            self.render_code_block();
        }

        self.flush_line();

        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }

        self.lines
    }

    fn handle_start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                if !self.lines.is_empty() || !self.current_spans.is_empty() {
                    self.add_blank_line();
                }

                let prefix = format!("{} ", "#".repeat(level as usize));
                self.current_spans.push(Span::styled(prefix, Style::default().fg(Color::Magenta)));
                self.push_style(Modifier::BOLD);
                self.push_color_style(Color::Magenta);
            }
            Tag::Paragraph => {
                if !self.lines.is_empty() && !self.current_spans.is_empty() {
                    self.flush_line();
                }
            }
            Tag::CodeBlock(kind) => {
                self.in_code_block = true;
                self.code_block_content.clear();
                self.code_block_lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                        Some(code_language(&lang).to_string())
                    }
                    _ => None,
                };
            }
            Tag::List(first_item) => {
                self.list_depth += 1;
                self.ordered_list_index = first_item;
                if self.list_depth == 1 && !self.lines.is_empty() {
                    self.flush_line();
                }
            }
            Tag::Item => {
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                let bullet = if let Some(idx) = self.ordered_list_index.as_mut() {
                    let bullet = format!("{indent}{}. ", *idx);
                    *idx += 1;
                    bullet
                } else {
                    format!("{indent}• ")
                };
                self.current_spans.push(Span::styled(
                    bullet,
                    Style::default().fg(Color::Cyan),
                ));
            }
            Tag::Emphasis => {
                self.push_style(Modifier::ITALIC);
            }
            Tag::Strong => {
                self.push_style(Modifier::BOLD);
            }
            Tag::Link { dest_url, .. } => {
                self.push_style(Modifier::UNDERLINED);
                self.push_color_style(Color::Blue);
                self.link_target = Some(resolve_link(&dest_url));
            }
            _ => {}
        }
    }

    fn handle_end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style(); // color
                self.pop_style(); // bold
                self.flush_line();
            }
            TagEnd::Paragraph => {
                self.add_blank_line();
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.render_code_block();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.ordered_list_index = None;
                    self.add_blank_line();
                }
            }
            TagEnd::Item => {
                self.flush_line();
            }
            TagEnd::Emphasis | TagEnd::Strong => {
                self.pop_style();
            }
            TagEnd::Link => {
                self.pop_style(); // color
                self.pop_style(); // underline
                if let Some(target) = self.link_target.take() {
                    self.current_spans.push(Span::styled(
                        format!(" ({target})"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
            }
            _ => {}
        }
    }
}
