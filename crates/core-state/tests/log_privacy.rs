use core_events::{EditorEvent, Event, GenerationEvent};
use core_format::{FormatKind, MemoryClipboard};
use core_mention::{MemoryStore, SuggestionItem};
use core_state::{EditorSettings, EditorState};
use core_text::TextRange;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl<'a> Write for LockedWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

fn typed(text: &str, ch: char) -> Vec<Event> {
    vec![
        EditorEvent::TextChanged(text.to_string()).into(),
        EditorEvent::MentionKey {
            ch,
            cursor: text.len(),
        }
        .into(),
    ]
}

#[test]
fn trace_output_never_contains_document_text() {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .without_time()
        .with_writer(BufferWriter {
            inner: buffer.clone(),
        })
        .finish();

    with_default(subscriber, || {
        let mut s = EditorState::new(
            "confidential memo",
            EditorSettings::default(),
            Box::new(MemoryClipboard::new()),
            Box::new(MemoryStore::default()),
        );
        let mut events: Vec<Event> = vec![
            EditorEvent::CatalogLoaded(vec![SuggestionItem::new("p1", "Hidden Title", "hidden")])
                .into(),
            EditorEvent::SelectionChanged(TextRange::new(0, 12)).into(),
            EditorEvent::FormatCommand(FormatKind::Bold).into(),
        ];
        events.extend(typed("**confidential** memo @", '@'));
        events.extend(typed("**confidential** memo @hid", 'd'));
        events.push(EditorEvent::MentionSelect(0).into());
        let review: [Event; 4] = [
            GenerationEvent::Started { id: 1 }.into(),
            GenerationEvent::Token {
                id: 1,
                partial: "secretive rewrite".into(),
            }
            .into(),
            GenerationEvent::Finished { id: 1 }.into(),
            EditorEvent::AcceptReview.into(),
        ];
        events.extend(review);
        for event in &events {
            s.handle(event);
        }
        assert_eq!(s.text(), "secretive rewrite");
    });

    let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
    assert!(log_output.contains("format_applied"));
    assert!(log_output.contains("mention_committed"));
    for needle in ["confidential", "memo", "Hidden Title", "hid", "secretive"] {
        assert!(!log_output.contains(needle), "log leaked {needle:?}");
    }
}
