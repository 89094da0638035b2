use super::protocol::{parse_event_line, StreamEvent};
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use tracing::{debug, warn};

/// Carry-over buffer that turns arbitrary chunks into complete lines.
///
/// Works on bytes so a multi-byte character split across two chunks is
/// reassembled before it is decoded.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append a chunk and return every line it completed. The trailing
    /// partial line (if any) stays buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(to_line(&self.buf[start..end]));
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Flush whatever is left once the source has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = to_line(&self.buf);
        self.buf.clear();
        Some(line)
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Incremental chunk → event decoder.
///
/// Malformed payloads are logged and skipped; they never end the stream.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    lines: LineBuffer,
    skipped: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| self.decode_line(&line))
            .collect()
    }

    pub fn finish(&mut self) -> Vec<StreamEvent> {
        match self.lines.finish() {
            Some(line) => self.decode_line(&line).into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Number of event lines dropped because their payload did not parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn decode_line(&mut self, line: &str) -> Option<StreamEvent> {
        match parse_event_line(line)? {
            Ok(StreamEvent::Unknown) => {
                debug!("Ignoring stream event with unknown type: {:.200}", line);
                None
            }
            Ok(event) => Some(event),
            Err(e) => {
                self.skipped += 1;
                warn!("Skipping malformed stream event ({}): {:.200}", e, line);
                None
            }
        }
    }
}

/// One item of a decoded turn. `Completed` and `Failed` are terminal and
/// appear at most once, as the last item.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(StreamEvent),
    Completed,
    Failed(String),
}

impl Decoded {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decoded::Completed | Decoded::Failed(_))
    }
}

struct DecodeState<S> {
    source: S,
    decoder: StreamDecoder,
    pending: VecDeque<StreamEvent>,
    end: Option<Decoded>,
    closed: bool,
}

impl<S> DecodeState<S> {
    fn report_skipped(&self) {
        let skipped = self.decoder.skipped();
        if skipped > 0 {
            warn!("Stream ended with {} malformed event line(s) skipped", skipped);
        }
    }
}

/// Turn a chunk source into an ordered, lazy sequence of events.
///
/// A clean end of the source yields `Decoded::Completed`; the first source
/// error yields `Decoded::Failed(reason)`. Nothing follows either.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = Decoded>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = DecodeState {
        source,
        decoder: StreamDecoder::new(),
        pending: VecDeque::new(),
        end: None,
        closed: false,
    };

    futures_util::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((Decoded::Event(event), st));
            }
            if let Some(end) = st.end.take() {
                return Some((end, st));
            }
            if st.closed {
                return None;
            }
            match st.source.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.feed(chunk.as_ref());
                    st.pending.extend(events);
                }
                Some(Err(e)) => {
                    st.report_skipped();
                    st.closed = true;
                    st.end = Some(Decoded::Failed(e.to_string()));
                }
                None => {
                    let events = st.decoder.finish();
                    st.pending.extend(events);
                    st.report_skipped();
                    st.closed = true;
                    st.end = Some(Decoded::Completed);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::protocol::ActionKind;
    use futures_util::stream;

    fn token(s: &str) -> StreamEvent {
        StreamEvent::Token { content: s.into() }
    }

    async fn collect(chunks: Vec<Result<&'static str, &'static str>>) -> Vec<Decoded> {
        decode_stream(stream::iter(chunks)).collect().await
    }

    #[test]
    fn line_buffer_keeps_partial_line() {
        let mut buf = LineBuffer::default();
        assert_eq!(buf.push(b"data: {\"ty"), Vec::<String>::new());
        assert_eq!(buf.push(b"pe\": 1}\n\nnext"), vec!["data: {\"type\": 1}", ""]);
        assert_eq!(buf.finish().as_deref(), Some("next"));
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn line_buffer_strips_crlf_and_joins_split_utf8() {
        let mut buf = LineBuffer::default();
        let bytes = "café\r\n".as_bytes();
        // Split inside the two-byte 'é'.
        let (a, b) = bytes.split_at(4);
        assert!(buf.push(a).is_empty());
        assert_eq!(buf.push(b), vec!["café"]);
    }

    #[test]
    fn decoder_handles_events_split_across_chunks() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"data: {\"type\": \"tok").is_empty());
        let events = decoder.feed(b"en\", \"content\": \"Hi\"}\n\ndata: {\"type\": \"done\"}\n\n");
        assert_eq!(events, vec![token("Hi"), StreamEvent::Done]);
    }

    #[test]
    fn malformed_line_between_tokens_is_skipped() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b"data: {\"type\": \"token\", \"content\": \"a\"}\n\
              data: {\"type\": \"token\", \"content\": \n\
              data: {\"type\": \"token\", \"content\": \"b\"}\n",
        );
        assert_eq!(events, vec![token("a"), token("b")]);
        assert_eq!(decoder.skipped(), 1);
    }

    #[test]
    fn non_event_and_unknown_lines_produce_nothing() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(
            b": ping\nevent: update\ndata: {\"type\": \"heartbeat\"}\n\
              data: {\"type\": \"action\", \"action\": \"show_escalate_option\"}\n",
        );
        assert_eq!(
            events,
            vec![StreamEvent::Action {
                action: ActionKind::ShowEscalateOption
            }]
        );
        assert_eq!(decoder.skipped(), 0);
    }

    #[tokio::test]
    async fn clean_close_completes_and_flushes_trailing_line() {
        let items = collect(vec![
            Ok("data: {\"type\": \"token\", \"content\": \"Par\"}\n"),
            Ok("data: {\"type\": \"done\"}"),
        ])
        .await;
        assert_eq!(
            items,
            vec![
                Decoded::Event(token("Par")),
                Decoded::Event(StreamEvent::Done),
                Decoded::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn transport_error_is_terminal() {
        let items = collect(vec![
            Ok("data: {\"type\": \"token\", \"content\": \"Par\"}\n"),
            Err("connection reset"),
            Ok("data: {\"type\": \"token\", \"content\": \"never\"}\n"),
        ])
        .await;
        assert_eq!(
            items,
            vec![
                Decoded::Event(token("Par")),
                Decoded::Failed("connection reset".into()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_source_just_completes() {
        assert_eq!(collect(vec![]).await, vec![Decoded::Completed]);
    }
}
