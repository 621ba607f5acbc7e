//! Inline `<<<WARNING>>>...<<</WARNING>>>` protocol handling for executor output.
//!
//! Executors may embed warnings in their text stream. The payload of a
//! complete tag is hidden from the visible text and re-appended, packed into a
//! single tag, at the end of every rendered output. Anything that starts like
//! a tag but turns out not to be one is released verbatim and in order.

pub const OPEN_TAG: &str = "<<<WARNING>>>";
pub const CLOSE_TAG: &str = "<<</WARNING>>>";
/// Closing tag as it appears when the executor JSON-escaped the slash.
pub const CLOSE_TAG_ESCAPED: &str = "<<<\\/WARNING>>>";

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Passthrough,
    Buffering,
}

#[derive(Debug)]
pub struct WarningFilter {
    state: FilterState,
    side_buffer: String,
    visible: String,
    warnings: Vec<String>,
    advisory: Option<&'static str>,
}

impl Default for WarningFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl WarningFilter {
    pub fn new() -> Self {
        Self {
            state: FilterState::Passthrough,
            side_buffer: String::new(),
            visible: String::new(),
            warnings: Vec::new(),
            advisory: None,
        }
    }

    /// Line appended after the visible text on every render (brand advisory).
    pub fn set_advisory(&mut self, advisory: Option<&'static str>) {
        self.advisory = advisory;
    }

    /// Feed the next piece of decoded text and return the current rendering.
    pub fn add_chunk(&mut self, chunk: &str) -> String {
        self.feed(chunk);
        self.output(false)
    }

    fn feed(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if self.state == FilterState::Passthrough && chunk.starts_with('<') {
            self.state = FilterState::Buffering;
        }

        match self.state {
            FilterState::Passthrough => self.visible.push_str(chunk),
            FilterState::Buffering => {
                self.side_buffer.push_str(chunk);
                self.resolve_side_buffer();
            }
        }
    }

    fn resolve_side_buffer(&mut self) {
        let could_be_tag =
            OPEN_TAG.contains(self.side_buffer.as_str()) || self.side_buffer.contains(OPEN_TAG);
        if !could_be_tag {
            let released = std::mem::take(&mut self.side_buffer);
            self.visible.push_str(&released);
            self.state = FilterState::Passthrough;
            return;
        }

        let Some(open_at) = self.side_buffer.find(OPEN_TAG) else {
            return;
        };
        let payload_start = open_at + OPEN_TAG.len();
        let Some((close_at, close_len)) = find_close_tag(&self.side_buffer[payload_start..]) else {
            return;
        };

        let buffered = std::mem::take(&mut self.side_buffer);
        let payload_end = payload_start + close_at;
        let payload = buffered[payload_start..payload_end].replace(OPEN_TAG, "");

        self.visible.push_str(&buffered[..open_at]);
        self.warnings.push(payload.trim().to_string());
        self.state = FilterState::Passthrough;

        let rest = &buffered[payload_end + close_len..];
        if !rest.is_empty() {
            self.feed(rest);
        }
    }

    /// End of stream: an unfinished tag candidate is ordinary text after all.
    pub fn finish(&mut self) {
        if !self.side_buffer.is_empty() {
            let released = std::mem::take(&mut self.side_buffer);
            self.visible.push_str(&released);
        }
        self.state = FilterState::Passthrough;
    }

    /// Render visible text, then the advisory line, then the packed warnings.
    /// A trailing ellipsis marks output that is still streaming.
    pub fn output(&self, finalize: bool) -> String {
        let mut out = self.visible.clone();
        if !finalize {
            out.push_str(ELLIPSIS);
        }
        if let Some(advisory) = self.advisory {
            out.push_str("\n\n");
            out.push_str(advisory);
        }
        if !self.warnings.is_empty() {
            out.push_str(OPEN_TAG);
            out.push_str(&self.warnings.join("\n"));
            out.push_str(CLOSE_TAG);
        }
        out
    }

    #[cfg(test)]
    pub fn state(&self) -> FilterState {
        self.state
    }

    #[cfg(test)]
    pub fn visible(&self) -> &str {
        &self.visible
    }

    #[cfg(test)]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Earliest closing tag in `text`, either spelling: (offset, tag length).
fn find_close_tag(text: &str) -> Option<(usize, usize)> {
    let plain = text.find(CLOSE_TAG).map(|i| (i, CLOSE_TAG.len()));
    let escaped = text.find(CLOSE_TAG_ESCAPED).map(|i| (i, CLOSE_TAG_ESCAPED.len()));
    match (plain, escaped) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(filter: &mut WarningFilter, chunks: &[&str]) {
        for chunk in chunks {
            filter.add_chunk(chunk);
        }
    }

    #[test]
    fn test_plain_text_passes_through_with_ellipsis() {
        let mut filter = WarningFilter::new();
        assert_eq!(filter.add_chunk("Hel"), "Hel...");
        assert_eq!(filter.add_chunk("lo"), "Hello...");
        assert_eq!(filter.output(true), "Hello");
    }

    #[test]
    fn test_warning_between_runs_is_extracted() {
        let mut filter = WarningFilter::new();
        feed_all(
            &mut filter,
            &["Before ", "<<<WARNING>>>", "  disk almost full ", "<<</WARNING>>>", "after"],
        );
        assert_eq!(filter.visible(), "Before after");
        assert_eq!(filter.warnings(), ["disk almost full"]);
        assert_eq!(
            filter.output(true),
            "Before after<<<WARNING>>>disk almost full<<</WARNING>>>"
        );
    }

    #[test]
    fn test_warning_fed_char_by_char() {
        let text = "A<<<WARNING>>>careful<<</WARNING>>>B";
        let mut filter = WarningFilter::new();
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            filter.add_chunk(ch.encode_utf8(&mut buf));
        }
        assert_eq!(filter.visible(), "AB");
        assert_eq!(filter.warnings(), ["careful"]);
        assert_eq!(filter.state(), FilterState::Passthrough);
    }

    #[test]
    fn test_escaped_closing_tag() {
        let mut filter = WarningFilter::new();
        feed_all(&mut filter, &["<<<WARNING>>>", "escaped", "<<<\\/WARNING>>>"]);
        assert_eq!(filter.visible(), "");
        assert_eq!(filter.warnings(), ["escaped"]);
    }

    #[test]
    fn test_false_tag_prefix_is_flushed_verbatim() {
        let mut filter = WarningFilter::new();
        filter.add_chunk("x ");
        filter.add_chunk("<<");
        assert_eq!(filter.state(), FilterState::Buffering);
        assert_eq!(filter.output(false), "x ...");

        filter.add_chunk("b> bold");
        assert_eq!(filter.state(), FilterState::Passthrough);
        assert_eq!(filter.visible(), "x <<b> bold");
        assert!(filter.warnings().is_empty());
    }

    #[test]
    fn test_html_like_chunk_is_not_swallowed() {
        let mut filter = WarningFilter::new();
        filter.add_chunk("<div>");
        assert_eq!(filter.visible(), "<div>");
        assert_eq!(filter.state(), FilterState::Passthrough);
    }

    #[test]
    fn test_text_after_closing_tag_in_same_chunk() {
        let mut filter = WarningFilter::new();
        filter.add_chunk("<<<WARNING>>>w1<<</WARNING>>> tail");
        assert_eq!(filter.visible(), " tail");
        assert_eq!(filter.warnings(), ["w1"]);

        filter.add_chunk("<<<WARNING>>>w2<<</WARNING>>><b>x</b>");
        assert_eq!(filter.visible(), " tail<b>x</b>");
        assert_eq!(filter.warnings(), ["w1", "w2"]);
    }

    #[test]
    fn test_multiple_warnings_joined_with_newline() {
        let mut filter = WarningFilter::new();
        feed_all(
            &mut filter,
            &["<<<WARNING>>>one<<</WARNING>>>", "<<<WARNING>>>two<<</WARNING>>>", "ok"],
        );
        assert_eq!(
            filter.output(false),
            "ok...<<<WARNING>>>one\ntwo<<</WARNING>>>"
        );
    }

    #[test]
    fn test_finish_releases_unfinished_candidate() {
        let mut filter = WarningFilter::new();
        feed_all(&mut filter, &["done", "<<<WARN"]);
        assert_eq!(filter.output(true), "done");
        filter.finish();
        assert_eq!(filter.output(true), "done<<<WARN");
    }

    #[test]
    fn test_advisory_line_is_appended_before_warnings() {
        let mut filter = WarningFilter::new();
        filter.set_advisory(Some("[advice]"));
        feed_all(&mut filter, &["hi", "<<<WARNING>>>w<<</WARNING>>>"]);
        assert_eq!(filter.output(false), "hi...\n\n[advice]<<<WARNING>>>w<<</WARNING>>>");
        assert_eq!(filter.output(true), "hi\n\n[advice]<<<WARNING>>>w<<</WARNING>>>");
    }
}
