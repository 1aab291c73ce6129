//! Deterministic HTML → Markdown renderer.
//!
//! Walks the `scraper`/`ego_tree` DOM directly rather than pulling in a
//! separate markdown-conversion crate, since the pipeline already parses
//! with `scraper` for link/media extraction and wants one consistent tree
//! walk for both.

use super::MarkdownOptions;
use ego_tree::NodeRef;
use scraper::{Html, Node};
use unicode_width::UnicodeWidthStr;

/// Render `html` to Markdown under `options`.
pub fn convert(html: &str, options: &MarkdownOptions) -> String {
    let document = Html::parse_document(html);
    let mut w = Writer::new(options);
    w.walk_children(*document.root_element());
    w.finish()
}

struct Writer<'a> {
    options: &'a MarkdownOptions,
    out: String,
    list_stack: Vec<ListKind>,
}

#[derive(Clone, Copy)]
enum ListKind {
    Unordered,
    Ordered(usize),
}

impl<'a> Writer<'a> {
    fn new(options: &'a MarkdownOptions) -> Self {
        Self {
            options,
            out: String::new(),
            list_stack: Vec::new(),
        }
    }

    fn finish(mut self) -> String {
        if self.options.body_width > 0 {
            self.out = wrap(&self.out, self.options.body_width);
        }
        let collapsed = collapse_blank_lines(&self.out, self.options.single_line_break);
        collapsed.trim().to_string()
    }

    fn push_break(&mut self) {
        if !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        if !self.options.single_line_break && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }

    fn push_text(&mut self, text: &str) {
        let text = if self.options.escape_html {
            escape_markdown(text)
        } else {
            text.to_string()
        };
        self.out.push_str(&text);
    }

    fn walk_children(&mut self, node: NodeRef<'_, Node>) {
        for child in node.children() {
            self.walk(child);
        }
    }

    fn walk(&mut self, node: NodeRef<'_, Node>) {
        match node.value() {
            Node::Text(t) => {
                let collapsed = collapse_whitespace(t);
                if !collapsed.trim().is_empty() || collapsed == " " {
                    self.push_text(&collapsed);
                }
            }
            Node::Element(el) => self.element(node, &el.name.local),
            _ => {}
        }
    }

    fn element(&mut self, node: NodeRef<'_, Node>, tag: &str) {
        match tag {
            "script" | "style" | "noscript" | "template" => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                self.push_break();
                self.out.push_str(&"#".repeat(level));
                self.out.push(' ');
                self.walk_children(node);
                self.push_break();
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" => {
                self.push_break();
                self.walk_children(node);
                self.push_break();
            }
            "br" => {
                self.out.push_str("  \n");
            }
            "hr" => {
                self.push_break();
                self.out.push_str("---");
                self.push_break();
            }
            "strong" | "b" => {
                self.out.push_str("**");
                self.walk_children(node);
                self.out.push_str("**");
            }
            "em" | "i" => {
                self.out.push('*');
                self.walk_children(node);
                self.out.push('*');
            }
            "sub" if self.options.include_sup_sub => {
                self.out.push('~');
                self.walk_children(node);
                self.out.push('~');
            }
            "sup" if self.options.include_sup_sub => {
                self.out.push('^');
                self.walk_children(node);
                self.out.push('^');
            }
            "code" => {
                if self.options.mark_code {
                    self.out.push('`');
                    self.walk_children(node);
                    self.out.push('`');
                } else {
                    self.walk_children(node);
                }
            }
            "pre" => {
                self.push_break();
                self.out.push_str("```\n");
                self.walk_children(node);
                self.push_break();
                self.out.push_str("```");
                self.push_break();
            }
            "blockquote" => {
                self.push_break();
                let start = self.out.len();
                self.walk_children(node);
                let quoted: String = self.out[start..]
                    .lines()
                    .map(|l| format!("> {l}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.out.truncate(start);
                self.out.push_str(&quoted);
                self.push_break();
            }
            "ul" => {
                self.push_break();
                self.list_stack.push(ListKind::Unordered);
                self.walk_children(node);
                self.list_stack.pop();
                self.push_break();
            }
            "ol" => {
                self.push_break();
                self.list_stack.push(ListKind::Ordered(1));
                self.walk_children(node);
                self.list_stack.pop();
                self.push_break();
            }
            "li" => {
                let marker = match self.list_stack.last_mut() {
                    Some(ListKind::Unordered) => "- ".to_string(),
                    Some(ListKind::Ordered(n)) => {
                        let m = format!("{n}. ");
                        *n += 1;
                        m
                    }
                    None => "- ".to_string(),
                };
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.out.push_str(&marker);
                self.walk_children(node);
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            "a" => self.anchor(node),
            "img" => self.image(node),
            "table" => self.table(node),
            _ => self.walk_children(node),
        }
    }

    fn anchor(&mut self, node: NodeRef<'_, Node>) {
        let href = node
            .value()
            .as_element()
            .and_then(|e| e.attr("href"))
            .unwrap_or("");

        if self.options.ignore_mailto_links && href.starts_with("mailto:") {
            self.walk_children(node);
            return;
        }
        if self.options.ignore_links {
            self.walk_children(node);
            return;
        }
        if self.options.skip_internal_links && href.starts_with('#') {
            self.walk_children(node);
            return;
        }

        self.out.push('[');
        let start = self.out.len();
        self.walk_children(node);
        if self.out.len() == start {
            self.out.push_str(href);
        }
        self.out.push_str("](");
        self.out.push_str(href);
        self.out.push(')');
    }

    fn image(&mut self, node: NodeRef<'_, Node>) {
        if self.options.ignore_images {
            return;
        }
        let el = match node.value().as_element() {
            Some(e) => e,
            None => return,
        };
        let src = el.attr("src").unwrap_or("");
        let alt = el.attr("alt").unwrap_or("");
        self.out.push_str("![");
        self.out.push_str(alt);
        self.out.push_str("](");
        self.out.push_str(src);
        self.out.push(')');
    }

    fn table(&mut self, node: NodeRef<'_, Node>) {
        self.push_break();
        let mut rows: Vec<Vec<String>> = Vec::new();
        for row in node.descendants() {
            if let Some(el) = row.value().as_element() {
                if el.name() == "tr" {
                    let mut cells = Vec::new();
                    for cell in row.children() {
                        if let Some(cell_el) = cell.value().as_element() {
                            if cell_el.name() == "td" || cell_el.name() == "th" {
                                let mut sub = Writer::new(self.options);
                                sub.walk_children(cell);
                                cells.push(sub.finish().replace('\n', " "));
                            }
                        }
                    }
                    if !cells.is_empty() {
                        rows.push(cells);
                    }
                }
            }
        }
        if let Some(header) = rows.first() {
            self.out.push_str("| ");
            self.out.push_str(&header.join(" | "));
            self.out.push_str(" |\n");
            self.out.push_str("| ");
            self.out
                .push_str(&header.iter().map(|_| "---").collect::<Vec<_>>().join(" | "));
            self.out.push_str(" |\n");
            for row in &rows[1..] {
                self.out.push_str("| ");
                self.out.push_str(&row.join(" | "));
                self.out.push_str(" |\n");
            }
        }
        self.push_break();
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

fn collapse_blank_lines(text: &str, single_line_break: bool) -> String {
    let max_blank = if single_line_break { 0 } else { 1 };
    let mut out = String::new();
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run <= max_blank + 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '`' | '[' | ']' | '#' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn wrap(text: &str, width: usize) -> String {
    let mut out = String::new();
    for line in text.split('\n') {
        if line.starts_with('|') || line.starts_with('#') || line.starts_with("```") {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let mut current = String::new();
        for word in line.split(' ') {
            let candidate_width = if current.is_empty() {
                word.width()
            } else {
                current.width() + 1 + word.width()
            };
            if candidate_width > width && !current.is_empty() {
                out.push_str(&current);
                out.push('\n');
                current.clear();
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out.push_str(&current);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::MarkdownOptions;

    #[test]
    fn headings_and_paragraphs() {
        let html = "<h1>Title</h1><p>Hello <strong>world</strong></p>";
        let md = convert(html, &MarkdownOptions::default());
        assert!(md.contains("# Title"));
        assert!(md.contains("Hello **world**"));
    }

    #[test]
    fn ignore_links_keeps_text_only() {
        let html = r#"<a href="https://example.com">click</a>"#;
        let mut opts = MarkdownOptions::default();
        opts.ignore_links = true;
        let md = convert(html, &opts);
        assert_eq!(md, "click");
    }

    #[test]
    fn links_render_as_markdown() {
        let html = r#"<a href="https://example.com">click</a>"#;
        let md = convert(html, &MarkdownOptions::default());
        assert_eq!(md, "[click](https://example.com)");
    }
}
