/// Tracing setup and log redaction
///
/// All log output goes through [`RedactingMakeWriter`], which scrubs secrets
/// from each formatted event before it reaches stdout. Confirmation links are
/// the main concern: the raw token is part of the request path, and the
/// request span records the path.

use crate::config::LogFormat;
use regex::{Captures, Regex};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::{fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "atelier_api=debug,atelier_shared=info,tower_http=info";

const REDACTED: &str = "[REDACTED]";

/// Installs the global subscriber
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (json, pretty) = match format {
        LogFormat::Json => (
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(RedactingMakeWriter::new(io::stdout)),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(RedactingMakeWriter::new(io::stdout))),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(pretty)
        .try_init()?;

    Ok(())
}

/// Scrubs secrets out of a log line
pub fn redact(line: &str) -> String {
    let mut out = line.to_string();
    for rule in rules() {
        out = rule.apply(&out);
    }
    out
}

struct Rule {
    pattern: Regex,
    replace: fn(&Captures) -> String,
}

impl Rule {
    fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, |caps: &Captures| (self.replace)(caps))
            .into_owned()
    }
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

    RULES.get_or_init(|| {
        let specs: [(&str, fn(&Captures) -> String); 4] = [
            // Bearer credentials
            (r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*", |_| format!("Bearer {}", REDACTED)),
            // user:password@ in URLs
            (r"(?i)\b([a-z][a-z0-9+.\-]*://)[^/\s:@]+:[^/\s@]+@", |caps| {
                format!("{}{}@", &caps[1], REDACTED)
            }),
            // key=value and "key":"value" for sensitive keys
            (
                r#"(?i)("?\b(?:password|passwd|token|secret|authorization|cookie|api_key)[a-z_]*"?\s*[=:]\s*)("[^"]*"|[^\s,}]+)"#,
                |caps| {
                    if caps[2].starts_with('"') {
                        format!("{}\"{}\"", &caps[1], REDACTED)
                    } else {
                        format!("{}{}", &caps[1], REDACTED)
                    }
                },
            ),
            // Raw confirmation tokens and anything else shaped like one
            (r"\b[a-f0-9]{64}\b", |_| REDACTED.to_string()),
        ];

        specs
            .into_iter()
            .filter_map(|(pattern, replace)| {
                Regex::new(pattern).ok().map(|pattern| Rule { pattern, replace })
            })
            .collect()
    })
}

/// `MakeWriter` that redacts each event before handing it on
#[derive(Clone)]
pub struct RedactingMakeWriter<M> {
    inner: M,
}

impl<M> RedactingMakeWriter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}

/// Buffers one event and writes the redacted text when dropped
pub struct RedactingWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    fn drain(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.inner.write_all(redact(&text).as_bytes())?;
        self.inner.flush()
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.drain();
    }
}
