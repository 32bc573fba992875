use std::mem;

use crate::error::Result;
use crate::pipeline::{BoundedQueue, Transform};
use crate::xml::Token;

/// Progress through one `<si><t>text</t></si>` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Between records.
    Idle,
    /// After `<si>`.
    ItemOpen,
    /// After `<t>`.
    TextOpen,
    /// After the text run.
    TextRead,
    /// After `</t>`.
    TextClosed,
    /// After `</sst>`.
    Finished,
    /// Grammar violated; nothing more is emitted.
    Failed,
}

/// The token stream left the shared-strings grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unexpected {token} in state {state:?} after {consumed} tokens")]
pub struct GrammarViolation {
    /// Tokens accepted before the offending one.
    pub consumed: usize,
    pub state: RecordState,
    /// The offending token, rendered as markup.
    pub token: String,
}

/// Recognizes shared-string records and emits their text.
///
/// Text is held until the record's `</si>` so that an incomplete record
/// contributes nothing. The first undefined transition pins the machine in
/// [`RecordState::Failed`]; the violation is kept for diagnostics.
#[derive(Debug)]
pub struct RecordExtractor {
    state: RecordState,
    pending: String,
    consumed: usize,
    skip_whitespace: bool,
    violation: Option<GrammarViolation>,
}

impl Default for RecordExtractor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RecordExtractor {
    /// `skip_whitespace` tolerates whitespace-only text between records.
    pub fn new(skip_whitespace: bool) -> Self {
        Self {
            state: RecordState::Idle,
            pending: String::new(),
            consumed: 0,
            skip_whitespace,
            violation: None,
        }
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn violation(&self) -> Option<&GrammarViolation> {
        self.violation.as_ref()
    }

    /// Tokens accepted so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Advance by one token, returning a string when a record completes.
    pub fn step(&mut self, token: &Token) -> Option<String> {
        use RecordState::*;

        if self.state == Failed {
            return None;
        }

        let ignorable = matches!(self.state, Idle | ItemOpen | TextClosed | Finished);
        if self.skip_whitespace && ignorable && token.is_blank_text() {
            self.consumed += 1;
            return None;
        }

        let mut emitted = None;
        let next = match (self.state, token) {
            (Idle, t) if t.is_open("si") => Some(ItemOpen),
            (Idle, t) if t.is_close("sst") => Some(Finished),
            (ItemOpen, t) if t.is_open("t") => Some(TextOpen),
            (ItemOpen, t) if t.is_single("t") => {
                self.pending.clear();
                Some(TextClosed)
            }
            (TextOpen, Token::Text { text }) => {
                self.pending.clone_from(text);
                Some(TextRead)
            }
            (TextOpen, t) if t.is_close("t") => {
                self.pending.clear();
                Some(TextClosed)
            }
            (TextRead, t) if t.is_close("t") => Some(TextClosed),
            (TextClosed, t) if t.is_close("si") => {
                emitted = Some(mem::take(&mut self.pending));
                Some(Idle)
            }
            _ => None,
        };

        match next {
            Some(state) => {
                self.state = state;
                self.consumed += 1;
                emitted
            }
            None => {
                let violation = GrammarViolation {
                    consumed: self.consumed,
                    state: self.state,
                    token: token.to_string(),
                };
                tracing::debug!(%violation, "grammar violation");
                self.violation = Some(violation);
                self.state = Failed;
                self.pending.clear();
                None
            }
        }
    }
}

impl Transform<Token, String> for RecordExtractor {
    fn transform(&mut self, input: &mut BoundedQueue<Token>) -> Result<Vec<String>> {
        let mut out = Vec::new();
        while let Some(token) = input.pop() {
            out.extend(self.step(&token));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Tokenizer;
    use std::sync::{Arc, Mutex};

    fn run(extractor: &mut RecordExtractor, markup: &str) -> Vec<String> {
        Tokenizer::tokenize(markup)
            .unwrap()
            .iter()
            .filter_map(|t| extractor.step(t))
            .collect()
    }

    #[test]
    fn complete_records() {
        let mut extractor = RecordExtractor::default();
        let out = run(
            &mut extractor,
            r#"<si><t>a</t></si><si><t xml:space="preserve"> b </t></si></sst>"#,
        );
        assert_eq!(out, vec!["a", " b "]);
        assert_eq!(extractor.state(), RecordState::Finished);
        assert!(extractor.violation().is_none());
        assert_eq!(extractor.consumed(), 11);
    }

    #[test]
    fn missing_close_t_emits_nothing() {
        let mut extractor = RecordExtractor::default();
        let out = run(&mut extractor, "<si><t>a</si><si><t>b</t></si>");
        assert!(out.is_empty());
        assert_eq!(extractor.state(), RecordState::Failed);
        let violation = extractor.violation().unwrap();
        assert_eq!(violation.consumed, 3);
        assert_eq!(violation.state, RecordState::TextRead);
        assert_eq!(violation.token, "</si>");
    }

    #[test]
    fn empty_text_records() {
        let mut extractor = RecordExtractor::default();
        let out = run(&mut extractor, "<si><t/></si><si><t></t></si>");
        assert_eq!(out, vec!["", ""]);
    }

    #[test]
    fn whitespace_between_records_is_skipped_by_default() {
        let mut extractor = RecordExtractor::default();
        let out = run(
            &mut extractor,
            "\n  <si>\n    <t>a</t>\n  </si>\n</sst>\n",
        );
        assert_eq!(out, vec!["a"]);
        assert_eq!(extractor.state(), RecordState::Finished);
    }

    #[test]
    fn whitespace_between_records_is_a_violation_when_strict() {
        let mut extractor = RecordExtractor::new(false);
        let out = run(&mut extractor, "<si><t>a</t></si>\n<si><t>b</t></si>");
        assert_eq!(out, vec!["a"]);
        assert_eq!(extractor.state(), RecordState::Failed);
        assert_eq!(extractor.violation().unwrap().state, RecordState::Idle);
    }

    #[test]
    fn rich_text_runs_violate_the_grammar() {
        let mut extractor = RecordExtractor::default();
        let out = run(&mut extractor, "<si><r><t>a</t></r></si>");
        assert!(out.is_empty());
        assert_eq!(extractor.violation().unwrap().token, "<r>");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn violation_is_not_logged_as_a_warning() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut extractor = RecordExtractor::default();
            run(&mut extractor, "<si><r>");
            assert!(extractor.violation().is_some());
        });
        assert!(captured.0.lock().unwrap().is_empty());
    }

    #[test]
    fn content_after_root_close_is_a_violation() {
        let mut extractor = RecordExtractor::default();
        run(&mut extractor, "</sst><si>");
        assert_eq!(extractor.violation().unwrap().state, RecordState::Finished);
    }
}
